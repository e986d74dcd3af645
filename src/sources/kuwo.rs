use std::rc::Rc;

use serde::Deserialize;

use crate::config::ProviderEndpoints;
use crate::error::Result;
use crate::http::Transport;
use crate::models::{Candidate, ResolvedMedia};
use crate::sources::{
    encode, fill_template, html_text, parse_json, resolve_direct, AudioSource, DirectLink, Source,
};

/// 쿠워 뮤직 어댑터.
/// 검색 응답은 작은따옴표를 쓰는 유사 JSON이고 필드 값은 HTML 엔티티로 인코딩돼 있다.
pub struct KuwoSource {
    id: String,
    endpoints: ProviderEndpoints,
    transport: Rc<dyn Transport>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    abslist: Vec<KuwoSong>,
}

#[derive(Deserialize)]
struct KuwoSong {
    #[serde(rename = "MUSICRID")]
    music_rid: String,
    #[serde(rename = "NAME")]
    name: String,
    #[serde(rename = "ARTIST")]
    artist: String,
}

#[derive(Deserialize)]
struct LyricResponse {
    data: Option<LyricData>,
}

#[derive(Deserialize)]
struct LyricData {
    #[serde(default)]
    lrclist: Vec<LyricLine>,
}

#[derive(Deserialize)]
struct LyricLine {
    #[serde(rename = "lineLyric")]
    line_lyric: String,
    time: String,
}

impl KuwoSource {
    pub fn new(id: &str, endpoints: ProviderEndpoints, transport: Rc<dyn Transport>) -> Self {
        Self {
            id: id.to_string(),
            endpoints,
            transport,
        }
    }

    fn parse_search(&self, body: &str) -> Result<Vec<Candidate>> {
        let resp: SearchResponse = parse_json(&body.replace('\'', "\""))?;
        let songs = resp
            .abslist
            .into_iter()
            .enumerate()
            .map(|(i, song)| {
                Candidate::new(
                    &self.id,
                    html_text(&song.music_rid),
                    html_text(&song.name),
                    html_text(&song.artist),
                    i + 1,
                )
            })
            .collect();
        Ok(songs)
    }
}

/// 줄 단위 가사 목록을 `[mm:ss.xx]` 형식의 LRC 텍스트로 만든다.
fn to_lrc(lines: &[LyricLine]) -> String {
    lines
        .iter()
        .map(|line| {
            let secs: f64 = line.time.trim().parse().unwrap_or(0.0);
            let centis = (secs * 100.0).round() as u64;
            format!(
                "[{:02}:{:02}.{:02}]{}",
                centis / 6000,
                (centis / 100) % 60,
                centis % 100,
                line.line_lyric
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl Source for KuwoSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn window(&self) -> usize {
        self.endpoints.window()
    }

    fn search(&self, query: &str, count: usize) -> Result<Vec<Candidate>> {
        // 쿠워 검색은 (검색어, 페이지, 개수) 세 자리를 받는다
        let url = fill_template(
            &self.endpoints.search,
            &[&encode(query), "1", &count.to_string()],
        )?;
        let body = self.transport.get_text(&url)?;
        self.parse_search(&body)
    }
}

impl AudioSource for KuwoSource {
    fn resolve_audio(&self, track_id: &str) -> Result<ResolvedMedia> {
        let url = fill_template(&self.endpoints.direct_link, &[track_id])?;
        resolve_direct(self.transport.as_ref(), &url, DirectLink::PlainText)
    }

    fn resolve_lyric(&self, track_id: &str) -> Result<Option<String>> {
        let Some(template) = self.endpoints.lyric.as_deref() else {
            return Ok(None);
        };
        let music_id = track_id.strip_prefix("MUSIC_").unwrap_or(track_id);
        let url = fill_template(template, &[music_id])?;
        let body = self.transport.get_text(&url)?;

        let lyric = serde_json::from_str::<LyricResponse>(&body)
            .ok()
            .and_then(|r| r.data)
            .filter(|d| !d.lrclist.is_empty())
            .map(|d| to_lrc(&d.lrclist));
        Ok(lyric)
    }
}
