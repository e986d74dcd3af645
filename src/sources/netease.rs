use std::rc::Rc;

use serde::Deserialize;

use crate::config::ProviderEndpoints;
use crate::error::{Error, Result};
use crate::http::Transport;
use crate::models::{Candidate, ResolvedMedia};
use crate::sources::{encode, fill_template, parse_json, resolve_direct, AudioSource, DirectLink, Source};

/// 넷이즈 클라우드 뮤직 어댑터.
/// 검색은 `result.songs`, 직링크는 본문이 곧 URL, 가사는 `lrc.lyric`.
pub struct NeteaseSource {
    id: String,
    endpoints: ProviderEndpoints,
    transport: Rc<dyn Transport>,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: SearchResult,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    songs: Vec<NeteaseSong>,
}

#[derive(Deserialize)]
struct NeteaseSong {
    id: u64,
    name: String,
    artists: Vec<NeteaseArtist>,
}

#[derive(Deserialize)]
struct NeteaseArtist {
    name: String,
}

#[derive(Deserialize)]
struct LyricResponse {
    lrc: Option<LyricBody>,
}

#[derive(Deserialize)]
struct LyricBody {
    lyric: Option<String>,
}

impl NeteaseSource {
    pub fn new(id: &str, endpoints: ProviderEndpoints, transport: Rc<dyn Transport>) -> Self {
        Self {
            id: id.to_string(),
            endpoints,
            transport,
        }
    }

    fn parse_search(&self, body: &str) -> Result<Vec<Candidate>> {
        let resp: SearchResponse = parse_json(body)?;
        resp.result
            .songs
            .into_iter()
            .enumerate()
            .map(|(i, song)| {
                let artist = song
                    .artists
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::parse(format!("곡 {}에 아티스트가 없습니다", song.id)))?;
                Ok(Candidate::new(&self.id, song.id.to_string(), song.name, artist.name, i + 1))
            })
            .collect()
    }
}

impl Source for NeteaseSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn window(&self) -> usize {
        self.endpoints.window()
    }

    fn search(&self, query: &str, count: usize) -> Result<Vec<Candidate>> {
        let url = fill_template(&self.endpoints.search, &[&encode(query), &count.to_string()])?;
        let body = self.transport.get_text(&url)?;
        self.parse_search(&body)
    }
}

impl AudioSource for NeteaseSource {
    fn resolve_audio(&self, track_id: &str) -> Result<ResolvedMedia> {
        let url = fill_template(&self.endpoints.direct_link, &[track_id])?;
        resolve_direct(self.transport.as_ref(), &url, DirectLink::PlainText)
    }

    fn resolve_lyric(&self, track_id: &str) -> Result<Option<String>> {
        let Some(template) = self.endpoints.lyric.as_deref() else {
            return Ok(None);
        };
        let url = fill_template(template, &[track_id])?;
        let body = self.transport.get_text(&url)?;

        // 순음악 등은 `lrc` 자체가 빠져 있거나 본문이 JSON이 아니다
        let lyric = serde_json::from_str::<LyricResponse>(&body)
            .ok()
            .and_then(|r| r.lrc)
            .and_then(|l| l.lyric)
            .filter(|l| !l.trim().is_empty());
        Ok(lyric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::fake::FakeTransport;

    fn endpoints() -> ProviderEndpoints {
        ProviderEndpoints {
            kind: None,
            search: "https://ncm.test/search?s=%s&limit=%d".to_string(),
            direct_link: "https://ncm.test/url?id=%s".to_string(),
            lyric: Some("https://ncm.test/lyric?id=%s".to_string()),
            info: None,
            referer: None,
            window: None,
        }
    }

    const SEARCH_BODY: &str = r#"{"result":{"songs":[
        {"id":65766,"name":"富士山下","artists":[{"name":"陈奕迅"},{"name":"x"}]},
        {"id":1,"name":"富士山下 (Live)","artists":[{"name":"陈奕迅"}]}
    ],"songCount":2},"code":200}"#;

    #[test]
    fn test_search_maps_songs_in_order() {
        let t = FakeTransport::new().route(
            "https://ncm.test/search?s=%E5%AF%8C%E5%A3%AB%E5%B1%B1%E4%B8%8B&limit=10",
            SEARCH_BODY,
        );
        let src = NeteaseSource::new("ncm", endpoints(), Rc::new(t));
        let songs = src.search("富士山下", 10).unwrap();

        assert_eq!(songs.len(), 2);
        assert_eq!(songs[0].track_id, "65766");
        assert_eq!(songs[0].artist, "陈奕迅");
        assert_eq!(songs[0].global_rank, 1);
        assert_eq!(songs[1].title, "富士山下 (Live)");
        assert_eq!(songs[1].provider_id, "ncm");
    }

    #[test]
    fn test_search_without_songs_is_empty() {
        let src = NeteaseSource::new("ncm", endpoints(), Rc::new(FakeTransport::new()));
        assert!(src.parse_search(r#"{"result":{},"code":200}"#).unwrap().is_empty());
    }

    #[test]
    fn test_search_missing_result_is_parse_error() {
        let src = NeteaseSource::new("ncm", endpoints(), Rc::new(FakeTransport::new()));
        assert!(matches!(src.parse_search(r#"{"code":400}"#), Err(Error::Parse(_))));
        assert!(matches!(
            src.parse_search(r#"{"result":{"songs":[{"id":1,"name":"a","artists":[]}]}}"#),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_search_http_failure_is_network_error() {
        let src = NeteaseSource::new("ncm", endpoints(), Rc::new(FakeTransport::new()));
        assert!(matches!(
            src.search("x", 10),
            Err(Error::Status { status: 404, .. })
        ));
    }

    #[test]
    fn test_resolve_audio_follows_plain_link() {
        let t = FakeTransport::new()
            .route("https://ncm.test/url?id=65766", "https://m10.test/65766.mp3")
            .route("https://m10.test/65766.mp3", b"\xff\xfbaudio".to_vec());
        let src = NeteaseSource::new("ncm", endpoints(), Rc::new(t));
        let media = src.resolve_audio("65766").unwrap();
        assert_eq!(media.bytes, b"\xff\xfbaudio");
    }

    #[test]
    fn test_resolve_lyric_present_and_absent() {
        let t = FakeTransport::new()
            .route(
                "https://ncm.test/lyric?id=1",
                r#"{"lrc":{"version":3,"lyric":"[00:01.00]明知道"},"code":200}"#,
            )
            .route("https://ncm.test/lyric?id=2", r#"{"nolyric":true,"code":200}"#)
            .route("https://ncm.test/lyric?id=3", r#"{"lrc":{"lyric":""}}"#);
        let src = NeteaseSource::new("ncm", endpoints(), Rc::new(t));

        assert_eq!(src.resolve_lyric("1").unwrap().as_deref(), Some("[00:01.00]明知道"));
        assert_eq!(src.resolve_lyric("2").unwrap(), None);
        assert_eq!(src.resolve_lyric("3").unwrap(), None);
        assert!(src.resolve_lyric("4").is_err());
    }
}
