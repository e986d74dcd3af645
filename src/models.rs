use std::path::PathBuf;

/// 검색 결과 한 건. 어댑터가 만들고 이후에는 바뀌지 않는다.
/// `global_rank`는 어댑터 단계에서는 창 안의 순위(1부터)이고,
/// 집계기를 거치면 전체 순위로 바뀐다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub provider_id: String,
    pub track_id: String,
    pub title: String,
    pub artist: String,
    pub global_rank: usize,
}

impl Candidate {
    pub fn new(
        provider_id: &str,
        track_id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        rank: usize,
    ) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            track_id: track_id.into(),
            title: title.into(),
            artist: artist.into(),
            global_rank: rank,
        }
    }

    /// 저장 파일명의 기준이 되는 `"{title} - {artist}"`.
    pub fn stem(&self) -> String {
        format!("{} - {}", self.title, self.artist)
    }
}

/// 전체 순위를 되돌린 결과. 창 계산은 집계기 밖으로 새지 않는다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub provider_id: String,
    /// 공급자 창 안의 위치 (0부터).
    pub local_index: usize,
}

/// 직링크로 받은 미디어 바이트.
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
    pub mime: &'static str,
}

impl ResolvedMedia {
    /// 매직 바이트로 컨테이너를 판별한다. 모르는 형식은 mp3로 본다.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let (extension, mime) = if bytes.starts_with(b"fLaC") {
            ("flac", "audio/flac")
        } else if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
            ("m4a", "audio/mp4")
        } else {
            ("mp3", "audio/mpeg")
        };
        Self {
            bytes,
            extension,
            mime,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// 음성과 영상이 이미 한 컨테이너에 들어 있는 스트림 (FLV 계열).
    Combined,
    /// 적응형 전송. 영상과 음성을 따로 받아 합쳐야 한다.
    SeparateAudioVideo,
}

/// 영상 다운로드 서술자.
/// `SeparateAudioVideo`이면 `urls[0]`이 영상, `urls[1]`이 음성이다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub kind: StreamKind,
    pub urls: Vec<String>,
}

/// 파이프라인의 최종 산출물.
#[derive(Debug, Clone)]
pub struct PersistedFile {
    pub media: PathBuf,
    pub lyric: Option<PathBuf>,
}
