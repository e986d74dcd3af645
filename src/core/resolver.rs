use crate::core::stream;
use crate::error::{Error, Result};
use crate::models::{Candidate, ResolvedMedia, StreamDescriptor};
use crate::sources::{AudioSource, VideoSource};

/// 음원 한 곡의 해석 결과.
#[derive(Debug)]
pub struct ResolvedTrack {
    pub media: ResolvedMedia,
    pub lyric: Option<String>,
}

/// 공급자 id로 등록된 음원 어댑터를 찾는다.
pub fn find_source<'a>(
    sources: &'a [Box<dyn AudioSource>],
    provider_id: &str,
) -> Result<&'a dyn AudioSource> {
    sources
        .iter()
        .find(|s| s.id() == provider_id)
        .map(|s| s.as_ref())
        .ok_or_else(|| Error::Config(format!("등록되지 않은 공급자입니다: {}", provider_id)))
}

/// 가사를 가져온다. 가사가 없는 것은 정상 결과다.
pub fn resolve_lyric(source: &dyn AudioSource, track_id: &str) -> Result<Option<String>> {
    let lyric = source.resolve_lyric(track_id)?;
    if lyric.is_none() {
        log::info!("{}: {}의 가사가 없습니다", source.id(), track_id);
    }
    Ok(lyric)
}

/// 후보를 소유한 어댑터로 음원과 가사를 받아온다.
pub fn resolve_track(source: &dyn AudioSource, candidate: &Candidate) -> Result<ResolvedTrack> {
    log::info!(
        "{}에서 음원을 받는 중 (id: {})",
        candidate.provider_id,
        candidate.track_id
    );
    let media = source.resolve_audio(&candidate.track_id)?;
    log::info!("{} 바이트를 받았습니다 ({})", media.bytes.len(), media.mime);

    let lyric = resolve_lyric(source, &candidate.track_id)?;
    Ok(ResolvedTrack { media, lyric })
}

/// 영상은 두 단계다: 서술 문서를 받고, 바이트를 받기 전에 스트림 형태를 판별한다.
pub fn resolve_video(source: &dyn VideoSource, content_id: &str) -> Result<StreamDescriptor> {
    log::info!("{}에서 다운로드 정보를 받는 중 (id: {})", source.id(), content_id);
    let info = source.download_info(content_id)?;
    let descriptor = stream::classify(&info)?;
    log::info!("스트림 형태: {:?}", descriptor.kind);
    Ok(descriptor)
}
