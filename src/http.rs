use std::time::Duration;

use crate::config::HttpConfig;
use crate::error::{Error, Result};

/// 음원 어댑터가 쓰는 GET 전송 계층.
/// 테스트에서는 준비된 응답을 돌려주는 구현으로 바꿔 끼운다.
pub trait Transport {
    fn get_text(&self, url: &str) -> Result<String>;
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// `reqwest` 블로킹 클라이언트 기반 전송 계층.
/// 재시도 없이 한 번만 요청하고, 시간 초과와 비정상 상태 코드는 모두 네트워크 오류다.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| Error::Network {
                url: String::new(),
                source,
            })?;

        Ok(Self { client })
    }

    fn send(&self, url: &str) -> Result<reqwest::blocking::Response> {
        log::debug!("GET {}", url);
        let resp = self.client.get(url).send().map_err(|source| Error::Network {
            url: url.to_string(),
            source,
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }
}

impl Transport for HttpTransport {
    fn get_text(&self, url: &str) -> Result<String> {
        self.send(url)?.text().map_err(|source| Error::Network {
            url: url.to_string(),
            source,
        })
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self.send(url)?.bytes().map_err(|source| Error::Network {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}
