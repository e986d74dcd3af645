use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::TempPath;

use crate::error::{Error, Result};
use crate::models::{StreamDescriptor, StreamKind};
use crate::sources::{DownloadInfo, StreamEntry, VideoSource};

/// 다운로드 정보로 스트림 형태를 판별한다.
///
/// 합쳐진 스트림이 있으면 `Combined`(첫 스트림만 사용), 없으면 가장 좋은 영상과
/// 가장 좋은 음성을 골라 `SeparateAudioVideo`. 둘 다 없으면 파싱 오류다.
/// 입력에만 의존하므로 같은 문서는 항상 같은 결과를 낸다.
pub fn classify(info: &DownloadInfo) -> Result<StreamDescriptor> {
    if let Some(first) = info.combined.first() {
        return Ok(StreamDescriptor {
            kind: StreamKind::Combined,
            urls: vec![first.url.clone()],
        });
    }

    match (best(&info.video), best(&info.audio)) {
        (Some(video), Some(audio)) => Ok(StreamDescriptor {
            kind: StreamKind::SeparateAudioVideo,
            urls: vec![video.url.clone(), audio.url.clone()],
        }),
        (Some(_), None) => Err(Error::parse("영상 스트림만 있고 음성 스트림이 없습니다")),
        _ => Err(Error::parse("다운로드 가능한 스트림이 없습니다")),
    }
}

/// 화질 id가 가장 높고, 같으면 대역폭이 가장 큰 스트림. 동률이면 앞선 것.
fn best(entries: &[StreamEntry]) -> Option<&StreamEntry> {
    entries.iter().reduce(|best, e| {
        if (e.quality, e.bandwidth) > (best.quality, best.bandwidth) {
            e
        } else {
            best
        }
    })
}

/// 재인코딩 없이 컨테이너를 다시 싸거나 스트림을 합치는 외부 도구.
pub trait Muxer {
    /// 단일 컨테이너를 출력 형식으로 다시 싼다.
    fn remux(&self, input: &Path, output: &Path) -> Result<()>;
    /// 영상과 음성 스트림을 하나의 컨테이너로 합친다.
    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;
}

pub struct FfmpegMuxer {
    program: PathBuf,
}

impl FfmpegMuxer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&OsStr]) -> Result<()> {
        log::debug!("{} {:?}", self.program.display(), args);
        let output = Command::new(&self.program)
            .args(["-y", "-hide_banner", "-loglevel", "error"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| Error::Mux(format!("{} 실행 실패: {}", self.program.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Mux(format!(
                "{} ({}): {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl Muxer for FfmpegMuxer {
    fn remux(&self, input: &Path, output: &Path) -> Result<()> {
        self.run(&[
            OsStr::new("-i"),
            input.as_os_str(),
            OsStr::new("-c"),
            OsStr::new("copy"),
            output.as_os_str(),
        ])
    }

    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        self.run(&[
            OsStr::new("-i"),
            video.as_os_str(),
            OsStr::new("-i"),
            audio.as_os_str(),
            OsStr::new("-c:v"),
            OsStr::new("copy"),
            OsStr::new("-c:a"),
            OsStr::new("copy"),
            output.as_os_str(),
        ])
    }
}

/// 스트림 하나를 출력 디렉토리의 임시 파일로 받는다.
/// 돌려받은 `TempPath`가 drop되면 파일이 지워지므로 어떤 경로로 끝나도 남지 않는다.
fn stage(source: &dyn VideoSource, url: &str, dir: &Path, suffix: &str) -> Result<TempPath> {
    let mut file = tempfile::Builder::new()
        .prefix(".qria-")
        .suffix(suffix)
        .tempfile_in(dir)?;
    let written = source.fetch_stream(url, file.as_file_mut())?;
    log::info!("{} 바이트를 받았습니다: {}", written, file.path().display());
    Ok(file.into_temp_path())
}

/// 서술자에 따라 스트림을 받아 `output` 하나로 만든다.
///
/// 임시 파일은 먹싱 성공 여부와 관계없이 지워진다. 같은 이름의 기존 출력은
/// 스트림을 모두 받은 뒤 먹싱 직전에 지우므로, 받기가 실패하면 그대로 남는다.
pub fn assemble(
    source: &dyn VideoSource,
    descriptor: &StreamDescriptor,
    muxer: &dyn Muxer,
    output: &Path,
) -> Result<PathBuf> {
    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    match (descriptor.kind, descriptor.urls.as_slice()) {
        (StreamKind::Combined, [url, ..]) => assemble_combined(source, url, &dir, muxer, output)?,
        (StreamKind::SeparateAudioVideo, [video, audio, ..]) => {
            assemble_separate(source, video, audio, &dir, muxer, output)?
        }
        (kind, urls) => {
            return Err(Error::parse(format!(
                "{:?} 스트림에 URL이 {}개뿐입니다",
                kind,
                urls.len()
            )))
        }
    }
    Ok(output.to_path_buf())
}

/// 기존 출력을 지우고 `build`로 새로 만든다. 실패하면 만들다 만 출력을 지운다.
fn write_output(output: &Path, build: impl FnOnce() -> Result<()>) -> Result<()> {
    if output.exists() {
        log::debug!("기존 파일 삭제: {}", output.display());
        std::fs::remove_file(output)?;
    }
    if let Err(e) = build() {
        if output.exists() {
            let _ = std::fs::remove_file(output);
        }
        return Err(e);
    }
    Ok(())
}

fn assemble_combined(
    source: &dyn VideoSource,
    url: &str,
    dir: &Path,
    muxer: &dyn Muxer,
    output: &Path,
) -> Result<()> {
    let staged = stage(source, url, dir, ".flv.tmp")?;
    write_output(output, || muxer.remux(&staged, output))?;
    staged.close()?;
    Ok(())
}

fn assemble_separate(
    source: &dyn VideoSource,
    video_url: &str,
    audio_url: &str,
    dir: &Path,
    muxer: &dyn Muxer,
    output: &Path,
) -> Result<()> {
    let video = stage(source, video_url, dir, ".video.tmp")?;
    let audio = stage(source, audio_url, dir, ".audio.tmp")?;
    write_output(output, || muxer.mux(&video, &audio, output))?;
    video.close()?;
    audio.close()?;
    Ok(())
}
