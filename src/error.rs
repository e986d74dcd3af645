use thiserror::Error;

/// 파이프라인 전 구간에서 쓰는 오류.
/// `Selection`만 사용자 입력 단계에서 복구 가능하고 나머지는 현재 요청을 중단한다.
#[derive(Error, Debug)]
pub enum Error {
    #[error("네트워크 오류 ({url}): {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} 응답: {url}")]
    Status { url: String, status: u16 },

    #[error("응답 파싱 오류: {0}")]
    Parse(String),

    #[error("잘못된 선택: {0}")]
    Selection(String),

    #[error("먹싱 실패: {0}")]
    Mux(String),

    #[error("설정 오류: {0}")]
    Config(String),

    #[error("파일 입출력 오류: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// 재입력으로 복구할 수 있는 오류인지 여부.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Selection(_))
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
