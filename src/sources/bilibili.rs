use std::future::Future;
use std::io::Write;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::{HttpConfig, ProviderEndpoints};
use crate::error::{Error, Result};
use crate::models::Candidate;
use crate::sources::{
    encode, fill_template, html_text, parse_json, DownloadInfo, Source, StreamEntry, VideoSource,
};

/// 빌리빌리 영상 어댑터.
///
/// 요청은 비동기 클라이언트로 보내고, 각 공개 메서드가 현재 스레드 런타임의
/// `block_on` 한 곳에서 완료를 기다린다. 호출자는 항상 결과가 나온 뒤에 진행한다.
pub struct BilibiliSource {
    id: String,
    endpoints: ProviderEndpoints,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

#[derive(Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Deserialize)]
struct SearchData {
    #[serde(default)]
    result: Vec<VideoItem>,
}

#[derive(Deserialize)]
struct VideoItem {
    bvid: String,
    title: String,
    author: String,
}

#[derive(Deserialize)]
struct ViewData {
    cid: u64,
}

#[derive(Deserialize)]
struct PlayUrlData {
    #[serde(default)]
    quality: u32,
    #[serde(default)]
    durl: Vec<Durl>,
    dash: Option<Dash>,
}

#[derive(Deserialize)]
struct Durl {
    url: String,
}

#[derive(Deserialize)]
struct Dash {
    #[serde(default)]
    video: Vec<DashStream>,
    #[serde(default)]
    audio: Option<Vec<DashStream>>,
    #[serde(default)]
    flac: Option<DashFlac>,
}

#[derive(Deserialize)]
struct DashFlac {
    audio: Option<DashStream>,
}

/// 응답에 `baseUrl`과 `base_url`이 함께 오기도 하고 한쪽만 오기도 한다.
#[derive(Deserialize)]
struct DashStream {
    id: u32,
    #[serde(rename = "baseUrl")]
    base_url_camel: Option<String>,
    base_url: Option<String>,
    #[serde(default)]
    bandwidth: u64,
}

impl DashStream {
    fn into_entry(self) -> Result<StreamEntry> {
        let url = self
            .base_url_camel
            .or(self.base_url)
            .ok_or_else(|| Error::parse(format!("스트림 {}에 URL이 없습니다", self.id)))?;
        Ok(StreamEntry {
            url,
            quality: self.id,
            bandwidth: self.bandwidth,
        })
    }
}

/// 응답 봉투를 벗긴다. `code`가 0이 아니면 플랫폼이 거절한 것이다.
fn unwrap_envelope<T: DeserializeOwned>(body: &str) -> Result<T> {
    let env: Envelope<T> = parse_json(body)?;
    if env.code != 0 {
        return Err(Error::parse(format!("code {}: {}", env.code, env.message)));
    }
    env.data.ok_or_else(|| Error::parse("data 필드가 없습니다"))
}

fn parse_search(provider_id: &str, body: &str, count: usize) -> Result<Vec<Candidate>> {
    let data: SearchData = unwrap_envelope(body)?;
    Ok(data
        .result
        .into_iter()
        .take(count)
        .enumerate()
        .map(|(i, v)| Candidate::new(provider_id, v.bvid, html_text(&v.title), html_text(&v.author), i + 1))
        .collect())
}

fn parse_cid(body: &str) -> Result<u64> {
    let data: ViewData = unwrap_envelope(body)?;
    Ok(data.cid)
}

fn parse_download_info(body: &str) -> Result<DownloadInfo> {
    let data: PlayUrlData = unwrap_envelope(body)?;
    let mut info = DownloadInfo {
        combined: data
            .durl
            .into_iter()
            .map(|d| StreamEntry {
                url: d.url,
                quality: data.quality,
                bandwidth: 0,
            })
            .collect(),
        ..Default::default()
    };

    if let Some(dash) = data.dash {
        info.video = dash
            .video
            .into_iter()
            .map(DashStream::into_entry)
            .collect::<Result<_>>()?;
        info.audio = dash
            .audio
            .unwrap_or_default()
            .into_iter()
            .map(DashStream::into_entry)
            .collect::<Result<_>>()?;
        if let Some(flac) = dash.flac.and_then(|f| f.audio) {
            info.audio.push(flac.into_entry()?);
        }
    }
    Ok(info)
}

impl BilibiliSource {
    pub fn new(id: &str, endpoints: ProviderEndpoints, http: &HttpConfig) -> Result<Self> {
        let timeout = Duration::from_secs(http.timeout_secs);
        let client = reqwest::Client::builder()
            .user_agent(http.user_agent.as_str())
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|source| Error::Network {
                url: String::new(),
                source,
            })?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            id: id.to_string(),
            endpoints,
            client,
            runtime,
        })
    }

    /// 비동기 작업의 유일한 합류 지점.
    fn join<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response> {
        log::debug!("GET {}", url);
        let mut req = self.client.get(url);
        if let Some(referer) = self.endpoints.referer.as_deref() {
            req = req.header(reqwest::header::REFERER, referer);
        }
        let resp = req.send().await.map_err(|source| Error::Network {
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

    async fn get_text(&self, url: &str) -> Result<String> {
        self.send(url).await?.text().await.map_err(|source| Error::Network {
            url: url.to_string(),
            source,
        })
    }

    async fn search_async(&self, query: &str, count: usize) -> Result<Vec<Candidate>> {
        let url = fill_template(&self.endpoints.search, &[&encode(query), &count.to_string()])?;
        let body = self.get_text(&url).await?;
        parse_search(&self.id, &body, count)
    }

    async fn download_info_async(&self, bvid: &str) -> Result<DownloadInfo> {
        let info_template = self
            .endpoints
            .info
            .as_deref()
            .ok_or_else(|| Error::Config(format!("[api.{}] info 템플릿이 없습니다", self.id)))?;

        // 첫 번째 분P의 cid
        let view = self.get_text(&fill_template(info_template, &[bvid])?).await?;
        let cid = parse_cid(&view)?.to_string();

        let url = fill_template(&self.endpoints.direct_link, &[bvid, &cid])?;
        let body = self.get_text(&url).await?;
        parse_download_info(&body)
    }

    async fn fetch_stream_async(&self, url: &str, out: &mut dyn Write) -> Result<u64> {
        let mut resp = self.send(url).await?;
        let mut written = 0u64;
        while let Some(chunk) = resp.chunk().await.map_err(|source| Error::Network {
            url: url.to_string(),
            source,
        })? {
            out.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        out.flush()?;
        Ok(written)
    }
}

impl Source for BilibiliSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn window(&self) -> usize {
        self.endpoints.window()
    }

    fn search(&self, query: &str, count: usize) -> Result<Vec<Candidate>> {
        self.join(self.search_async(query, count))
    }
}

impl VideoSource for BilibiliSource {
    fn download_info(&self, content_id: &str) -> Result<DownloadInfo> {
        self.join(self.download_info_async(content_id))
    }

    fn fetch_stream(&self, url: &str, out: &mut dyn Write) -> Result<u64> {
        self.join(self.fetch_stream_async(url, out))
    }
}
