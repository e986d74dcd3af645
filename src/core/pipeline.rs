use std::path::{Path, PathBuf};

use crate::core::aggregator::{Aggregator, SearchResult};
use crate::core::library::Library;
use crate::core::stream::{self, Muxer};
use crate::core::{persister, resolver};
use crate::error::Result;
use crate::models::{Candidate, PersistedFile, Selection};
use crate::sources::{AudioSource, VideoSource};

/// 음원 경로: 검색 → 선택 → 직링크/가사 해석 → 저장. 단계는 순서대로만 진행한다.
pub struct AudioPipeline<'a> {
    sources: &'a [Box<dyn AudioSource>],
    library: &'a Library,
}

/// 가사 갱신 결과.
#[derive(Debug, Default)]
pub struct LyricRefresh {
    pub written: Vec<PathBuf>,
    /// 어느 공급자에서도 가사를 찾지 못한 줄기.
    pub missing: Vec<String>,
}

impl<'a> AudioPipeline<'a> {
    pub fn new(sources: &'a [Box<dyn AudioSource>], library: &'a Library) -> Self {
        Self { sources, library }
    }

    pub fn search(&self, query: &str) -> Result<SearchResult> {
        self.sources
            .iter()
            .fold(Aggregator::<dyn AudioSource>::new(), |agg, s| agg.register(s.as_ref()))
            .search(query)
    }

    /// 선택한 자리의 후보를 그 후보를 낸 공급자로 내려받는다.
    pub fn download(&self, result: &SearchResult, selection: &Selection) -> Result<PersistedFile> {
        let candidate = result.get(selection)?;
        log::debug!("{:?} → {}", selection, candidate.track_id);
        self.download_candidate(candidate)
    }

    pub fn download_candidate(&self, candidate: &Candidate) -> Result<PersistedFile> {
        let source = resolver::find_source(self.sources, &candidate.provider_id)?;
        let track = resolver::resolve_track(source, candidate)?;
        persister::persist_audio(self.library, candidate, &track.media, track.lyric.as_deref())
    }

    /// 가사 파일이 없는 음원마다 파일명 줄기로 검색해 가사를 채운다.
    /// 줄기가 같은 후보를 우선하고, 없으면 첫 후보를 쓴다. 기존 가사는 덮어쓰지 않는다.
    pub fn refresh_lyrics(&self) -> Result<LyricRefresh> {
        let mut report = LyricRefresh::default();

        for entry in self.library.audio_entries()?.into_iter().filter(|e| !e.has_lyric) {
            let mut found = None;
            for source in self.sources {
                let candidates = source.search(&entry.stem, source.window())?;
                let Some(best) = candidates
                    .iter()
                    .find(|c| persister::stem_for(c) == entry.stem)
                    .or_else(|| candidates.first())
                else {
                    continue;
                };
                if let Some(lyric) = resolver::resolve_lyric(source.as_ref(), &best.track_id)? {
                    found = Some(lyric);
                    break;
                }
            }

            match found {
                Some(lyric) => {
                    let path = persister::persist_lyric(self.library, &entry.stem, &lyric)?;
                    log::info!("가사 저장: {}", path.display());
                    report.written.push(path);
                }
                None => report.missing.push(entry.stem),
            }
        }
        Ok(report)
    }
}

/// 영상 경로: 서술 문서 → 스트림 판별 → 받기/먹싱 → `output`.
pub fn download_video(
    source: &dyn VideoSource,
    muxer: &dyn Muxer,
    content_id: &str,
    output: &Path,
) -> Result<PathBuf> {
    let descriptor = resolver::resolve_video(source, content_id)?;
    stream::assemble(source, &descriptor, muxer, output)
}

/// 짝이 되는 음원이 없는 가사 파일을 지운다. `confirm`이 거절한 파일은 남긴다.
pub fn prune_orphan_lyrics<F>(library: &Library, mut confirm: F) -> Result<Vec<PathBuf>>
where
    F: FnMut(&Path) -> Result<bool>,
{
    let mut removed = Vec::new();
    for path in library.orphan_lyrics()? {
        if confirm(&path)? {
            std::fs::remove_file(&path)?;
            log::info!("삭제: {}", path.display());
            removed.push(path);
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::config::ProviderEndpoints;
    use crate::error::Error;
    use crate::http::fake::FakeTransport;
    use crate::http::Transport;
    use crate::sources::kugou::KugouSource;
    use crate::sources::netease::NeteaseSource;

    fn endpoints(host: &str, search: &str) -> ProviderEndpoints {
        ProviderEndpoints {
            kind: None,
            search: format!("https://{}/search?{}", host, search),
            direct_link: format!("https://{}/url?id=%s", host),
            lyric: Some(format!("https://{}/lyric?id=%s", host)),
            info: None,
            referer: None,
            window: None,
        }
    }

    fn ncm_body(n: usize) -> String {
        let songs: Vec<String> = (1..=n)
            .map(|i| format!(r#"{{"id":{},"name":"富士山下 {}","artists":[{{"name":"陈奕迅"}}]}}"#, 100 + i, i))
            .collect();
        format!(r#"{{"result":{{"songs":[{}]}},"code":200}}"#, songs.join(","))
    }

    fn kugou_body(n: usize) -> String {
        let songs: Vec<String> = (1..=n)
            .map(|i| format!(r#"{{"FileHash":"H{}","SongName":"song {}","SingerName":"singer"}}"#, i, i))
            .collect();
        format!(r#"{{"data":{{"lists":[{}]}}}}"#, songs.join(","))
    }

    const NCM_SEARCH: &str = "https://ncm.test/search?s=%E5%AF%8C%E5%A3%AB%E5%B1%B1%E4%B8%8B&limit=10";
    const KUGOU_SEARCH: &str =
        "https://kugou.test/search?keyword=%E5%AF%8C%E5%A3%AB%E5%B1%B1%E4%B8%8B&pagesize=10";

    fn sources(transport: FakeTransport) -> Vec<Box<dyn AudioSource>> {
        let t: Rc<dyn Transport> = Rc::new(transport);
        vec![
            Box::new(NeteaseSource::new("ncm", endpoints("ncm.test", "s=%s&limit=%d"), t.clone())),
            Box::new(KugouSource::new("kugou", endpoints("kugou.test", "keyword=%s&pagesize=%d"), t)),
        ]
    }

    fn library_in(root: &Path) -> Library {
        Library {
            audio_dir: root.join("musics"),
            lyric_dir: root.join("lyrics"),
            video_dir: root.join("videos"),
        }
    }

    #[test]
    fn test_rank_in_first_window_downloads_with_lyric() {
        let t = FakeTransport::new()
            .route(NCM_SEARCH, ncm_body(10))
            .route(KUGOU_SEARCH, kugou_body(10))
            .route("https://ncm.test/url?id=103", "https://cdn.test/103.mp3")
            .route("https://cdn.test/103.mp3", b"ncm-103".to_vec())
            .route("https://ncm.test/lyric?id=103", r#"{"lrc":{"lyric":"[00:00.00]x"}}"#);
        let dir = tempfile::tempdir().unwrap();
        let lib = library_in(dir.path());
        let sources = sources(t);
        let pipeline = AudioPipeline::new(&sources, &lib);

        let result = pipeline.search("富士山下").unwrap();
        assert_eq!(result.candidates().count(), 20);

        let (selection, _) = result.select(3).unwrap();
        assert_eq!(selection.provider_id, "ncm");
        let saved = pipeline.download(&result, &selection).unwrap();
        assert_eq!(saved.media, lib.audio_dir.join("富士山下 3 - 陈奕迅.mp3"));
        assert_eq!(std::fs::read(&saved.media).unwrap(), b"ncm-103");
        assert_eq!(saved.lyric, Some(lib.lyric_dir.join("富士山下 3 - 陈奕迅.lrc")));
    }

    #[test]
    fn test_rank_in_second_window_uses_second_provider() {
        let t = FakeTransport::new()
            .route(NCM_SEARCH, ncm_body(10))
            .route(KUGOU_SEARCH, kugou_body(10))
            .route("https://kugou.test/url?id=H5", r#"{"url":"https://cdn.test/H5.mp3"}"#)
            .route("https://cdn.test/H5.mp3", b"kugou-5".to_vec())
            .route("https://kugou.test/lyric?id=H5", r#"{"data":{}}"#);
        let dir = tempfile::tempdir().unwrap();
        let lib = library_in(dir.path());
        let sources = sources(t);
        let pipeline = AudioPipeline::new(&sources, &lib);

        let result = pipeline.search("富士山下").unwrap();
        let (selection, _) = result.select(15).unwrap();
        assert_eq!(selection, Selection { provider_id: "kugou".to_string(), local_index: 4 });
        let saved = pipeline.download(&result, &selection).unwrap();

        assert_eq!(saved.media, lib.audio_dir.join("song 5 - singer.mp3"));
        assert_eq!(std::fs::read(&saved.media).unwrap(), b"kugou-5");
        assert!(saved.lyric.is_none());
        assert!(!lib.lyric_path("song 5 - singer").exists());
    }

    #[test]
    fn test_out_of_range_rank_is_recoverable() {
        let t = FakeTransport::new()
            .route(NCM_SEARCH, ncm_body(10))
            .route(KUGOU_SEARCH, kugou_body(10));
        let dir = tempfile::tempdir().unwrap();
        let lib = library_in(dir.path());
        let sources = sources(t);
        let pipeline = AudioPipeline::new(&sources, &lib);

        let result = pipeline.search("富士山下").unwrap();
        for rank in [0, 21] {
            assert!(result.select(rank).unwrap_err().is_recoverable());
        }
        let unknown = Selection { provider_id: "kuwo".to_string(), local_index: 0 };
        assert!(pipeline.download(&result, &unknown).unwrap_err().is_recoverable());
    }

    #[test]
    fn test_transport_failure_leaves_no_file() {
        let t = FakeTransport::new()
            .route(NCM_SEARCH, ncm_body(10))
            .route(KUGOU_SEARCH, kugou_body(10))
            .route("https://ncm.test/url?id=101", "https://cdn.test/gone.mp3");
        let dir = tempfile::tempdir().unwrap();
        let lib = library_in(dir.path());
        let sources = sources(t);
        let pipeline = AudioPipeline::new(&sources, &lib);

        let result = pipeline.search("富士山下").unwrap();
        let (selection, _) = result.select(1).unwrap();
        let err = pipeline.download(&result, &selection).unwrap_err();
        assert!(matches!(err, Error::Status { status: 404, .. }));
        assert!(lib.audio_entries().unwrap().is_empty());
    }

    #[test]
    fn test_scenario_c_replaces_existing_file() {
        let t = FakeTransport::new()
            .route("https://ncm.test/url?id=7", "https://cdn.test/7.mp3")
            .route("https://cdn.test/7.mp3", b"fresh".to_vec())
            .route("https://ncm.test/lyric?id=7", r#"{"nolyric":true}"#);
        let dir = tempfile::tempdir().unwrap();
        let lib = library_in(dir.path());
        std::fs::create_dir_all(&lib.audio_dir).unwrap();
        std::fs::write(lib.audio_dir.join("A - B.mp3"), b"stale").unwrap();
        let sources = sources(t);
        let pipeline = AudioPipeline::new(&sources, &lib);

        pipeline
            .download_candidate(&Candidate::new("ncm", "7", "A", "B", 1))
            .unwrap();

        let files: Vec<_> = std::fs::read_dir(&lib.audio_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![std::ffi::OsString::from("A - B.mp3")]);
        assert_eq!(std::fs::read(lib.audio_dir.join("A - B.mp3")).unwrap(), b"fresh");
    }

    #[test]
    fn test_refresh_lyrics_fills_missing_only() {
        let t = FakeTransport::new()
            .route(
                "https://ncm.test/search?s=Other%20-%20X&limit=10",
                r#"{"result":{"songs":[{"id":1,"name":"Nope","artists":[{"name":"Y"}]},{"id":2,"name":"Other","artists":[{"name":"X"}]}]}}"#,
            )
            .route("https://ncm.test/lyric?id=2", r#"{"lrc":{"lyric":"[00:00.00]other"}}"#)
            .route("https://ncm.test/search?s=Lost%20-%20Z&limit=10", r#"{"result":{}}"#)
            .route("https://kugou.test/search?keyword=Lost%20-%20Z&pagesize=10", r#"{"data":{"lists":[]}}"#);
        let dir = tempfile::tempdir().unwrap();
        let lib = library_in(dir.path());
        std::fs::create_dir_all(&lib.audio_dir).unwrap();
        std::fs::create_dir_all(&lib.lyric_dir).unwrap();
        std::fs::write(lib.audio_path("Has - Lyric", "mp3"), b"a").unwrap();
        std::fs::write(lib.lyric_path("Has - Lyric"), "keep").unwrap();
        std::fs::write(lib.audio_path("Other - X", "mp3"), b"b").unwrap();
        std::fs::write(lib.audio_path("Lost - Z", "mp3"), b"c").unwrap();

        let sources = sources(t);
        let report = AudioPipeline::new(&sources, &lib).refresh_lyrics().unwrap();

        assert_eq!(report.written, vec![lib.lyric_path("Other - X")]);
        assert_eq!(report.missing, vec!["Lost - Z".to_string()]);
        assert_eq!(std::fs::read_to_string(lib.lyric_path("Other - X")).unwrap(), "[00:00.00]other");
        assert_eq!(std::fs::read_to_string(lib.lyric_path("Has - Lyric")).unwrap(), "keep");
    }

    #[test]
    fn test_prune_respects_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let lib = library_in(dir.path());
        std::fs::create_dir_all(&lib.audio_dir).unwrap();
        std::fs::create_dir_all(&lib.lyric_dir).unwrap();
        std::fs::write(lib.audio_path("A - B", "mp3"), b"a").unwrap();
        std::fs::write(lib.lyric_path("A - B"), "a").unwrap();
        std::fs::write(lib.lyric_path("Gone - 1"), "x").unwrap();
        std::fs::write(lib.lyric_path("Gone - 2"), "y").unwrap();

        let removed = prune_orphan_lyrics(&lib, |p| {
            Ok(p.file_stem().unwrap().to_str().unwrap() == "Gone - 1")
        })
        .unwrap();

        assert_eq!(removed, vec![lib.lyric_path("Gone - 1")]);
        assert!(lib.lyric_path("Gone - 2").exists());
        assert!(lib.lyric_path("A - B").exists());
    }
}
