use std::path::Path;

use crate::core::library::Library;
use crate::error::Result;
use crate::models::{Candidate, PersistedFile, ResolvedMedia};

/// 라이브러리 디렉토리는 여러 OS에서 같이 쓰이므로 플랫폼과 관계없이 막는 문자들.
const RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// 파일명으로 쓸 수 없는 문자와 제어 문자를 `_`로 바꾸고,
/// 끝의 점과 공백은 걷어낸다 (Windows에서 지워지지 않는 이름이 된다).
pub fn sanitize_filename(s: &str) -> String {
    let replaced: String = s
        .chars()
        .map(|c| {
            if c.is_control() || RESERVED.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim_end_matches(['.', ' ']);
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// 후보의 저장용 파일명 줄기 `"{title} - {artist}"`.
pub fn stem_for(candidate: &Candidate) -> String {
    sanitize_filename(candidate.stem().trim())
}

/// 같은 이름의 파일이 있으면 지우고 새로 쓴다.
/// 지우기와 쓰기 사이에 중단되면 파일이 남지 않는다. 쓰다가 실패하면 쓰던 파일을 지운다.
fn replace_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if path.exists() {
        log::debug!("기존 파일 삭제: {}", path.display());
        std::fs::remove_file(path)?;
    }
    if let Err(e) = std::fs::write(path, contents) {
        let _ = std::fs::remove_file(path);
        return Err(e.into());
    }
    Ok(())
}

/// 가사 파일을 쓴다.
pub fn persist_lyric(library: &Library, stem: &str, lyric: &str) -> Result<std::path::PathBuf> {
    let path = library.lyric_path(stem);
    replace_file(&path, lyric.as_bytes())?;
    Ok(path)
}

/// 음원을 쓰고, 가사가 있으면 같은 줄기의 `.lrc`도 쓴다.
/// 가사 쓰기가 실패하면 방금 쓴 음원도 지워 반쪽 결과를 남기지 않는다.
pub fn persist_audio(
    library: &Library,
    candidate: &Candidate,
    media: &ResolvedMedia,
    lyric: Option<&str>,
) -> Result<PersistedFile> {
    let stem = stem_for(candidate);
    let media_path = library.audio_path(&stem, media.extension);
    replace_file(&media_path, &media.bytes)?;
    log::info!("저장: {}", media_path.display());

    let lyric_path = match lyric.filter(|l| !l.trim().is_empty()) {
        Some(text) => match persist_lyric(library, &stem, text) {
            Ok(path) => {
                log::info!("가사 저장: {}", path.display());
                Some(path)
            }
            Err(e) => {
                let _ = std::fs::remove_file(&media_path);
                return Err(e);
            }
        },
        None => {
            // 새 음원과 짝이 아닌 이전 가사는 남기지 않는다
            let stale = library.lyric_path(&stem);
            if stale.exists() {
                std::fs::remove_file(&stale)?;
                log::info!("이전 가사 삭제: {}", stale.display());
            }
            None
        }
    };

    Ok(PersistedFile {
        media: media_path,
        lyric: lyric_path,
    })
}
