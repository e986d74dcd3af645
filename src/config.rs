use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_WINDOW: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub search: SearchConfig,
    /// 공급자 id별 엔드포인트 템플릿.
    #[serde(default)]
    pub api: BTreeMap<String, ProviderEndpoints>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub audio_dir: PathBuf,
    pub lyric_dir: PathBuf,
    pub video_dir: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            audio_dir: PathBuf::from("musics"),
            lyric_dir: PathBuf::from("lyrics"),
            video_dir: PathBuf::from("videos"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// 먹싱에 쓸 ffmpeg 실행 파일.
    pub ffmpeg: PathBuf,
    /// 영상 검색/다운로드에 쓸 공급자 id.
    pub provider: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            provider: "bilibili".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SearchConfig {
    /// 음원 공급자 등록 순서. 비어 있으면 `[api]`의 음원 공급자를 이름순으로 쓴다.
    pub providers: Vec<String>,
}

/// 공급자 하나의 엔드포인트 템플릿. `%s`/`%d` 자리에 순서대로 값이 들어간다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEndpoints {
    /// 어댑터 종류. 생략하면 공급자 id를 그대로 쓴다.
    pub kind: Option<String>,
    pub search: String,
    pub direct_link: String,
    pub lyric: Option<String>,
    /// 영상 공급자의 메타데이터 조회 템플릿.
    pub info: Option<String>,
    pub referer: Option<String>,
    pub window: Option<usize>,
}

impl ProviderEndpoints {
    pub fn kind<'a>(&'a self, id: &'a str) -> &'a str {
        self.kind.as_deref().unwrap_or(id)
    }

    pub fn window(&self) -> usize {
        self.window.unwrap_or(DEFAULT_WINDOW)
    }
}

impl Config {
    pub fn endpoints(&self, id: &str) -> Result<&ProviderEndpoints> {
        self.api
            .get(id)
            .ok_or_else(|| Error::Config(format!("[api.{}] 항목이 없습니다", id)))
    }

    /// 검색에 쓸 음원 공급자 id 목록을 등록 순서대로 반환한다.
    pub fn audio_providers(&self) -> Vec<String> {
        if !self.search.providers.is_empty() {
            return self.search.providers.clone();
        }
        self.api
            .iter()
            .filter(|(id, ep)| *id != &self.video.provider && ep.kind(id) != "bilibili")
            .map(|(id, _)| id.clone())
            .collect()
    }
}

fn home_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".config")
        .join("qria")
        .join("config.toml")
}

/// 설정 파일 위치를 결정한다: 명시한 경로, `./config.toml`, 홈 설정 순서.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let local = PathBuf::from("config.toml");
    if local.exists() {
        return local;
    }
    home_config_path()
}

/// 설정을 읽는다. 파일이 없으면 기본값, 형식이 잘못되면 오류.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        log::info!("설정 파일이 없어 기본값을 사용합니다: {}", path.display());
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[http]
timeout_secs = 5

[search]
providers = ["ncm", "kugou"]

[api.ncm]
search = "https://ncm.test/search?s=%s&limit=%d"
direct_link = "https://ncm.test/url?id=%s"
lyric = "https://ncm.test/lyric?id=%s"

[api.kugou]
search = "https://kugou.test/search?keyword=%s&pagesize=%d"
direct_link = "https://kugou.test/url?hash=%s"
window = 5

[api.bilibili]
search = "https://bili.test/search?keyword=%s&page=%d"
info = "https://bili.test/view?bvid=%s"
direct_link = "https://bili.test/playurl?bvid=%s&cid=%s"
referer = "https://www.bilibili.com"
"#;

    #[test]
    fn test_parse_sample() {
        let cfg = parse_config(SAMPLE).unwrap();
        assert_eq!(cfg.http.timeout_secs, 5);
        assert!(cfg.http.user_agent.starts_with("Mozilla/5.0"));
        assert_eq!(cfg.library.audio_dir, PathBuf::from("musics"));
        assert_eq!(cfg.audio_providers(), vec!["ncm", "kugou"]);

        let kugou = cfg.endpoints("kugou").unwrap();
        assert_eq!(kugou.window(), 5);
        assert_eq!(kugou.kind("kugou"), "kugou");
        assert!(kugou.lyric.is_none());
        assert_eq!(cfg.endpoints("ncm").unwrap().window(), DEFAULT_WINDOW);
    }

    #[test]
    fn test_audio_providers_default_excludes_video() {
        let mut cfg = parse_config(SAMPLE).unwrap();
        cfg.search.providers.clear();
        assert_eq!(cfg.audio_providers(), vec!["kugou", "ncm"]);
    }

    #[test]
    fn test_missing_provider_is_config_error() {
        let cfg = Config::default();
        assert!(matches!(cfg.endpoints("ncm"), Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_config_is_error() {
        assert!(matches!(parse_config("[api.ncm\n"), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("nope.toml")).unwrap();
        assert!(cfg.api.is_empty());
        assert_eq!(cfg.http.timeout_secs, 10);
    }
}
