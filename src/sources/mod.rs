pub mod bilibili;
pub mod kugou;
pub mod kuwo;
pub mod netease;

use std::io::Write;
use std::rc::Rc;

use scraper::Html;
use serde_json::Value;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::Transport;
use crate::models::{Candidate, ResolvedMedia};

/// 검색 가능한 콘텐츠 공급자.
pub trait Source {
    /// 설정에서 쓰는 공급자 id.
    fn id(&self) -> &str;
    /// 집계 시 이 공급자에게 배정되는 순위 창 크기.
    fn window(&self) -> usize;
    /// 쿼리로 검색해 관련도 순서대로 후보를 돌려준다.
    /// 후보의 `global_rank`는 이 공급자 안에서의 순위(1부터)다.
    fn search(&self, query: &str, count: usize) -> Result<Vec<Candidate>>;
}

/// 음원 공급자. 검색, 직링크 해석, 가사 조회를 제공한다.
pub trait AudioSource: Source {
    /// 트랙 id의 음원 바이트를 받아온다.
    fn resolve_audio(&self, track_id: &str) -> Result<ResolvedMedia>;
    /// 트랙 id의 가사를 받아온다. 가사가 없으면 `Ok(None)`.
    fn resolve_lyric(&self, track_id: &str) -> Result<Option<String>>;
}

/// 스트림 후보 하나. 화질/음질 id가 높을수록, 같으면 대역폭이 클수록 좋다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub url: String,
    pub quality: u32,
    pub bandwidth: u64,
}

/// 영상 공급자가 돌려주는 다운로드 정보. 플랫폼 응답 형태와 무관하다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadInfo {
    /// 음성/영상이 합쳐진 단일 컨테이너 스트림들 (순서대로).
    pub combined: Vec<StreamEntry>,
    pub video: Vec<StreamEntry>,
    pub audio: Vec<StreamEntry>,
}

/// 영상 공급자.
pub trait VideoSource: Source {
    /// 콘텐츠 id의 다운로드 서술 문서를 받아온다. 바이트는 아직 받지 않는다.
    fn download_info(&self, content_id: &str) -> Result<DownloadInfo>;
    /// 스트림 하나를 `out`에 기록하고 기록한 바이트 수를 돌려준다.
    fn fetch_stream(&self, url: &str, out: &mut dyn Write) -> Result<u64>;
}

/// 직링크 엔드포인트의 응답 형태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectLink {
    /// 본문 자체가 음원 URL.
    PlainText,
    /// JSON 본문의 `url` 필드가 음원 URL. 배열이면 첫 항목.
    JsonUrl,
}

/// 직링크 엔드포인트를 호출해 음원 URL을 얻고, 그 URL에서 바이트를 받는다.
pub fn resolve_direct(
    transport: &dyn Transport,
    endpoint: &str,
    shape: DirectLink,
) -> Result<ResolvedMedia> {
    let body = transport.get_text(endpoint)?;
    let url = match shape {
        DirectLink::PlainText => body.trim().to_string(),
        DirectLink::JsonUrl => {
            let value: Value = parse_json(&body)?;
            match value.get("url") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Array(items)) => items
                    .first()
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                _ => String::new(),
            }
        }
    };

    if url.is_empty() || !url.starts_with("http") {
        return Err(Error::parse(format!("직링크 응답에 URL이 없습니다: {}", endpoint)));
    }

    log::debug!("직링크: {}", url);
    Ok(ResolvedMedia::from_bytes(transport.get_bytes(&url)?))
}

/// `%s`/`%d` 자리를 인자로 순서대로 채운다. `%%`는 `%` 그대로.
/// 자리와 인자의 개수가 다르면 설정 오류다.
pub fn fill_template(template: &str, args: &[&str]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = args.iter();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('s') | Some('d') => match rest.next() {
                Some(arg) => out.push_str(arg),
                None => {
                    return Err(Error::Config(format!(
                        "템플릿 자리가 인자보다 많습니다: {}",
                        template
                    )))
                }
            },
            // URL에 이미 인코딩된 `%E5` 같은 시퀀스는 그대로 둔다
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }

    if rest.next().is_some() {
        return Err(Error::Config(format!(
            "템플릿 자리가 인자보다 적습니다: {}",
            template
        )));
    }
    Ok(out)
}

/// 쿼리 문자열 자리에 넣을 값을 퍼센트 인코딩한다.
pub fn encode(query: &str) -> String {
    urlencoding::encode(query).into_owned()
}

pub fn parse_json<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| Error::parse(e.to_string()))
}

/// HTML 엔티티를 풀고 강조 태그 같은 마크업을 걷어낸 텍스트.
pub fn html_text(s: &str) -> String {
    if !s.contains('&') && !s.contains('<') {
        return s.to_string();
    }
    let fragment = Html::parse_fragment(s);
    fragment.root_element().text().collect::<String>().trim().to_string()
}

/// 설정에서 음원 공급자를 등록 순서대로 만든다.
pub fn build_audio_sources(
    config: &Config,
    providers: &[String],
    transport: Rc<dyn Transport>,
) -> Result<Vec<Box<dyn AudioSource>>> {
    let mut sources: Vec<Box<dyn AudioSource>> = Vec::new();

    for (i, id) in providers.iter().enumerate() {
        if providers[..i].contains(id) {
            return Err(Error::Config(format!("공급자가 두 번 지정되었습니다: {}", id)));
        }
        let endpoints = config.endpoints(id)?.clone();
        let kind = endpoints.kind(id).to_string();
        let source: Box<dyn AudioSource> = match kind.as_str() {
            "ncm" | "netease" => Box::new(netease::NeteaseSource::new(id, endpoints, transport.clone())),
            "kugou" => Box::new(kugou::KugouSource::new(id, endpoints, transport.clone())),
            "kuwo" => Box::new(kuwo::KuwoSource::new(id, endpoints, transport.clone())),
            other => {
                return Err(Error::Config(format!(
                    "[api.{}] 음원 어댑터 종류를 알 수 없습니다: {}",
                    id, other
                )))
            }
        };
        sources.push(source);
    }

    if sources.is_empty() {
        return Err(Error::Config("설정된 음원 공급자가 없습니다".to_string()));
    }
    Ok(sources)
}

/// 설정에서 영상 공급자를 만든다.
pub fn build_video_source(config: &Config) -> Result<Box<dyn VideoSource>> {
    let id = config.video.provider.as_str();
    let endpoints = config.endpoints(id)?.clone();
    let kind = endpoints.kind(id).to_string();
    match kind.as_str() {
        "bilibili" => Ok(Box::new(bilibili::BilibiliSource::new(
            id,
            endpoints,
            &config.http,
        )?)),
        other => Err(Error::Config(format!(
            "[api.{}] 영상 어댑터 종류를 알 수 없습니다: {}",
            id, other
        ))),
    }
}
