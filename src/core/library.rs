use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::LibraryConfig;
use crate::error::Result;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4"];
pub const LYRIC_EXTENSION: &str = "lrc";

/// 로컬 라이브러리의 세 디렉토리. 필요할 때 만든다.
#[derive(Debug, Clone)]
pub struct Library {
    pub audio_dir: PathBuf,
    pub lyric_dir: PathBuf,
    pub video_dir: PathBuf,
}

/// 라이브러리의 음원 파일 하나.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioEntry {
    pub path: PathBuf,
    pub stem: String,
    pub has_lyric: bool,
}

impl AudioEntry {
    pub fn filename(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("알 수 없음")
    }
}

impl Library {
    pub fn new(config: &LibraryConfig) -> Self {
        Self {
            audio_dir: config.audio_dir.clone(),
            lyric_dir: config.lyric_dir.clone(),
            video_dir: config.video_dir.clone(),
        }
    }

    pub fn audio_path(&self, stem: &str, extension: &str) -> PathBuf {
        self.audio_dir.join(format!("{}.{}", stem, extension))
    }

    pub fn lyric_path(&self, stem: &str) -> PathBuf {
        self.lyric_dir.join(format!("{}.{}", stem, LYRIC_EXTENSION))
    }

    pub fn video_path(&self, stem: &str) -> PathBuf {
        self.video_dir.join(format!("{}.mp4", stem))
    }

    /// 음원 파일 목록 (이름순). 디렉토리가 없으면 빈 목록.
    pub fn audio_entries(&self) -> Result<Vec<AudioEntry>> {
        let entries = list_files(&self.audio_dir, AUDIO_EXTENSIONS)?
            .into_iter()
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?.to_string();
                let has_lyric = self.lyric_path(&stem).exists();
                Some(AudioEntry {
                    path,
                    stem,
                    has_lyric,
                })
            })
            .collect();
        Ok(entries)
    }

    pub fn videos(&self) -> Result<Vec<PathBuf>> {
        list_files(&self.video_dir, VIDEO_EXTENSIONS)
    }

    /// 같은 이름의 음원이 없는 가사 파일들.
    pub fn orphan_lyrics(&self) -> Result<Vec<PathBuf>> {
        let stems: HashSet<String> = self.audio_entries()?.into_iter().map(|e| e.stem).collect();
        let orphans = list_files(&self.lyric_dir, &[LYRIC_EXTENSION])?
            .into_iter()
            .filter(|path| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| !stems.contains(s))
                    .unwrap_or(false)
            })
            .collect();
        Ok(orphans)
    }
}

/// 디렉토리 바로 아래의 파일 중 확장자가 맞는 것 (대소문자 무시).
fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, extensions) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library_in(root: &Path) -> Library {
        Library {
            audio_dir: root.join("musics"),
            lyric_dir: root.join("lyrics"),
            video_dir: root.join("videos"),
        }
    }

    #[test]
    fn test_missing_dirs_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let lib = library_in(dir.path());
        assert!(lib.audio_entries().unwrap().is_empty());
        assert!(lib.videos().unwrap().is_empty());
        assert!(lib.orphan_lyrics().unwrap().is_empty());
    }

    #[test]
    fn test_audio_entries_and_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let lib = library_in(dir.path());
        std::fs::create_dir_all(&lib.audio_dir).unwrap();
        std::fs::create_dir_all(&lib.lyric_dir).unwrap();
        std::fs::write(lib.audio_path("A - B", "mp3"), b"a").unwrap();
        std::fs::write(lib.audio_path("C - D", "FLAC"), b"c").unwrap();
        std::fs::write(lib.audio_dir.join("notes.txt"), b"x").unwrap();
        std::fs::write(lib.lyric_path("A - B"), "[00:00]").unwrap();
        std::fs::write(lib.lyric_path("Gone - X"), "[00:00]").unwrap();

        let entries = lib.audio_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].stem, "A - B");
        assert!(entries[0].has_lyric);
        assert_eq!(entries[1].filename(), "C - D.FLAC");
        assert!(!entries[1].has_lyric);

        assert_eq!(lib.orphan_lyrics().unwrap(), vec![lib.lyric_path("Gone - X")]);
    }
}
