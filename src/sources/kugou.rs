use std::rc::Rc;

use serde::Deserialize;

use crate::config::ProviderEndpoints;
use crate::error::Result;
use crate::http::Transport;
use crate::models::{Candidate, ResolvedMedia};
use crate::sources::{
    encode, fill_template, html_text, parse_json, resolve_direct, AudioSource, DirectLink, Source,
};

/// 쿠거우 뮤직 어댑터. 트랙 id는 파일 해시다.
/// 직링크 엔드포인트는 `url` 필드를 담은 JSON을 돌려주므로 두 번 요청한다.
pub struct KugouSource {
    id: String,
    endpoints: ProviderEndpoints,
    transport: Rc<dyn Transport>,
}

#[derive(Deserialize)]
struct SearchResponse {
    data: SearchData,
}

#[derive(Deserialize)]
struct SearchData {
    #[serde(default)]
    lists: Vec<KugouSong>,
}

#[derive(Deserialize)]
struct KugouSong {
    #[serde(rename = "FileHash")]
    file_hash: String,
    #[serde(rename = "SongName")]
    song_name: String,
    #[serde(rename = "SingerName")]
    singer_name: String,
}

#[derive(Deserialize)]
struct LyricResponse {
    data: Option<LyricData>,
}

#[derive(Deserialize)]
struct LyricData {
    lyrics: Option<String>,
}

impl KugouSource {
    pub fn new(id: &str, endpoints: ProviderEndpoints, transport: Rc<dyn Transport>) -> Self {
        Self {
            id: id.to_string(),
            endpoints,
            transport,
        }
    }

    fn parse_search(&self, body: &str) -> Result<Vec<Candidate>> {
        let resp: SearchResponse = parse_json(body)?;
        let songs = resp
            .data
            .lists
            .into_iter()
            .enumerate()
            .map(|(i, song)| {
                // 검색어 강조용 <em> 태그가 섞여 온다
                Candidate::new(
                    &self.id,
                    song.file_hash,
                    html_text(&song.song_name),
                    html_text(&song.singer_name),
                    i + 1,
                )
            })
            .collect();
        Ok(songs)
    }
}

impl Source for KugouSource {
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

impl AudioSource for KugouSource {
    fn resolve_audio(&self, track_id: &str) -> Result<ResolvedMedia> {
        let url = fill_template(&self.endpoints.direct_link, &[track_id])?;
        resolve_direct(self.transport.as_ref(), &url, DirectLink::JsonUrl)
    }

    fn resolve_lyric(&self, track_id: &str) -> Result<Option<String>> {
        let Some(template) = self.endpoints.lyric.as_deref() else {
            return Ok(None);
        };
        let url = fill_template(template, &[track_id])?;
        let body = self.transport.get_text(&url)?;

        let lyric = serde_json::from_str::<LyricResponse>(&body)
            .ok()
            .and_then(|r| r.data)
            .and_then(|d| d.lyrics)
            .filter(|l| !l.trim().is_empty());
        Ok(lyric)
    }
}
