use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};
use dialoguer::{Confirm, Input};

use crate::config::{self, Config};
use crate::core::aggregator::{Aggregator, SearchResult};
use crate::core::library::Library;
use crate::core::pipeline::{self, AudioPipeline};
use crate::core::persister;
use crate::core::stream::FfmpegMuxer;
use crate::http::{HttpTransport, Transport};
use crate::models::Selection;
use crate::sources::{self, AudioSource, VideoSource};

#[derive(Parser)]
#[command(name = "qria", about = "여러 음원/영상 플랫폼에서 검색해 내려받는 도구")]
pub struct Cli {
    /// 설정 파일 경로 (기본: ./config.toml, ~/.config/qria/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 음원 검색 후 선택한 곡과 가사를 저장
    Audio {
        /// 검색어. 생략하면 빈 값을 입력할 때까지 반복해서 묻는다
        query: Option<String>,
        /// 검색할 공급자 (순서대로 순위 창을 배정, 여러 번 지정 가능)
        #[arg(long = "provider", value_name = "ID")]
        providers: Vec<String>,
        /// 묻지 않고 바로 내려받을 순위
        #[arg(long)]
        rank: Option<usize>,
    },
    /// 영상 검색 후 선택한 영상을 MP4로 저장
    Video {
        /// 검색어
        query: Option<String>,
        /// 검색 없이 바로 내려받을 콘텐츠 id (BV 번호)
        #[arg(long, conflicts_with = "query")]
        bvid: Option<String>,
        /// 출력 파일 경로
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// 묻지 않고 바로 내려받을 순위
        #[arg(long)]
        rank: Option<usize>,
    },
    /// 가사 파일이 없는 음원의 가사를 채움
    Lyrics {
        #[arg(long = "provider", value_name = "ID")]
        providers: Vec<String>,
    },
    /// 짝이 되는 음원이 없는 가사 파일 삭제
    Prune {
        /// 확인 없이 삭제
        #[arg(long)]
        yes: bool,
    },
    /// 라이브러리의 음원/영상 목록 표시
    List,
    /// 현재 설정 표시
    Config,
}

pub fn run(cli: Cli) -> Result<()> {
    let path = config::config_path(cli.config.as_deref());
    let cfg = config::load_config(&path)
        .with_context(|| format!("설정 파일을 읽을 수 없습니다: {}", path.display()))?;

    match cli.command {
        Some(Commands::Audio {
            query,
            providers,
            rank,
        }) => cmd_audio(&cfg, query, &providers, rank),
        Some(Commands::Video {
            query,
            bvid,
            output,
            rank,
        }) => cmd_video(&cfg, query, bvid, output, rank),
        Some(Commands::Lyrics { providers }) => cmd_lyrics(&cfg, &providers),
        Some(Commands::Prune { yes }) => cmd_prune(&cfg, yes),
        Some(Commands::List) => cmd_list(&cfg),
        Some(Commands::Config) => cmd_config(&cfg, &path),
        None => cmd_audio(&cfg, None, &[], None),
    }
}

fn build_audio_sources(cfg: &Config, providers: &[String]) -> Result<Vec<Box<dyn AudioSource>>> {
    let providers = if providers.is_empty() {
        cfg.audio_providers()
    } else {
        providers.to_vec()
    };
    let transport: Rc<dyn Transport> =
        Rc::new(HttpTransport::new(&cfg.http).context("HTTP 클라이언트 생성에 실패했습니다")?);
    Ok(sources::build_audio_sources(cfg, &providers, transport)?)
}

fn print_candidates(result: &SearchResult) {
    let mut table = Table::new();
    table.set_header(vec!["번호", "공급자", "제목", "아티스트"]);
    for c in result.candidates() {
        table.add_row(vec![
            Cell::new(c.global_rank),
            Cell::new(&c.provider_id),
            Cell::new(&c.title),
            Cell::new(&c.artist),
        ]);
    }
    println!("{table}");
}

/// 순위를 고른다. `--rank`가 있으면 그대로 쓰고, 없으면 잘못된 입력마다 다시 묻는다.
/// 빈 입력은 취소로 보고 `None`을 돌려준다.
fn choose(result: &SearchResult, rank: Option<usize>) -> Result<Option<Selection>> {
    if let Some(rank) = rank {
        let (selection, _) = result.select(rank)?;
        return Ok(Some(selection));
    }

    loop {
        let input: String = Input::new()
            .with_prompt(format!("번호를 입력하세요 (1~{}, 빈 값은 취소)", result.layout.total()))
            .allow_empty(true)
            .interact_text()?;
        if input.trim().is_empty() {
            return Ok(None);
        }
        match result.select_input(&input) {
            Ok((selection, _)) => return Ok(Some(selection)),
            Err(e) if e.is_recoverable() => println!("입력 오류: {}", e),
            Err(e) => return Err(e.into()),
        }
    }
}

fn cmd_audio(
    cfg: &Config,
    query: Option<String>,
    providers: &[String],
    rank: Option<usize>,
) -> Result<()> {
    let sources = build_audio_sources(cfg, providers)?;
    let library = Library::new(&cfg.library);
    let pipeline = AudioPipeline::new(&sources, &library);

    if let Some(query) = query {
        return download_audio(&pipeline, &query, rank);
    }

    loop {
        let query: String = Input::new()
            .with_prompt("노래 제목 (빈 값은 종료)")
            .allow_empty(true)
            .interact_text()?;
        if query.trim().is_empty() {
            return Ok(());
        }
        download_audio(&pipeline, query.trim(), rank)?;
    }
}

fn download_audio(pipeline: &AudioPipeline, query: &str, rank: Option<usize>) -> Result<()> {
    let result = pipeline.search(query).context("검색에 실패했습니다")?;
    if result.is_empty() {
        println!("검색 결과가 없습니다.");
        return Ok(());
    }
    print_candidates(&result);

    let Some(selection) = choose(&result, rank)? else {
        println!("취소했습니다.");
        return Ok(());
    };

    let saved = pipeline.download(&result, &selection).with_context(|| {
        format!(
            "내려받기에 실패했습니다: {} {}번",
            selection.provider_id,
            selection.local_index + 1
        )
    })?;

    println!("저장했습니다: {}", saved.media.display());
    match saved.lyric {
        Some(lyric) => println!("가사: {}", lyric.display()),
        None => println!("가사가 없습니다."),
    }
    Ok(())
}

fn cmd_video(
    cfg: &Config,
    query: Option<String>,
    bvid: Option<String>,
    output: Option<PathBuf>,
    rank: Option<usize>,
) -> Result<()> {
    let source = sources::build_video_source(cfg)?;
    let library = Library::new(&cfg.library);
    let muxer = FfmpegMuxer::new(cfg.video.ffmpeg.clone());

    let (content_id, default_output) = match (bvid, query) {
        (Some(bvid), _) => {
            let out = library.video_path(&persister::sanitize_filename(&bvid));
            (bvid, out)
        }
        (None, Some(query)) => {
            let result = Aggregator::<dyn VideoSource>::new()
                .register(source.as_ref())
                .search(&query)
                .context("영상 검색에 실패했습니다")?;
            if result.is_empty() {
                println!("검색 결과가 없습니다.");
                return Ok(());
            }
            print_candidates(&result);

            let Some(selection) = choose(&result, rank)? else {
                println!("취소했습니다.");
                return Ok(());
            };
            let candidate = result.get(&selection)?;
            let out = library.video_path(&persister::stem_for(candidate));
            (candidate.track_id.clone(), out)
        }
        (None, None) => bail!("검색어 또는 --bvid가 필요합니다"),
    };

    let output = output.unwrap_or(default_output);
    let saved = pipeline::download_video(source.as_ref(), &muxer, &content_id, &output)
        .with_context(|| format!("영상 내려받기에 실패했습니다: {}", content_id))?;
    println!("저장했습니다: {}", saved.display());
    Ok(())
}

fn cmd_lyrics(cfg: &Config, providers: &[String]) -> Result<()> {
    let sources = build_audio_sources(cfg, providers)?;
    let library = Library::new(&cfg.library);
    let report = AudioPipeline::new(&sources, &library).refresh_lyrics()?;

    for path in &report.written {
        println!("가사 저장: {}", path.display());
    }
    for stem in &report.missing {
        println!("가사를 찾지 못했습니다: {}", stem);
    }
    println!(
        "\n완료! (저장: {}, 실패: {})",
        report.written.len(),
        report.missing.len()
    );
    Ok(())
}

fn cmd_prune(cfg: &Config, yes: bool) -> Result<()> {
    let library = Library::new(&cfg.library);
    let removed = pipeline::prune_orphan_lyrics(&library, |path| {
        if yes {
            return Ok(true);
        }
        Confirm::new()
            .with_prompt(format!("삭제할까요? {}", path.display()))
            .default(false)
            .interact()
            .map_err(|e| std::io::Error::other(e.to_string()).into())
    })?;

    println!("가사 파일 {}개를 삭제했습니다.", removed.len());
    Ok(())
}

fn cmd_list(cfg: &Config) -> Result<()> {
    let library = Library::new(&cfg.library);
    let audio = library.audio_entries()?;
    let videos = library.videos()?;

    if audio.is_empty() && videos.is_empty() {
        println!("라이브러리가 비어 있습니다.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["파일", "종류", "가사"]);
    for entry in &audio {
        let lyric = if entry.has_lyric { "있음" } else { "없음" };
        table.add_row(vec![Cell::new(entry.filename()), Cell::new("음원"), Cell::new(lyric)]);
    }
    for video in &videos {
        let name = video.file_name().and_then(|n| n.to_str()).unwrap_or("알 수 없음");
        table.add_row(vec![Cell::new(name), Cell::new("영상"), Cell::new("-")]);
    }
    println!("{table}");
    println!(
        "\n음원 {}개 (가사 있음: {}), 영상 {}개",
        audio.len(),
        audio.iter().filter(|e| e.has_lyric).count(),
        videos.len()
    );
    Ok(())
}

fn cmd_config(cfg: &Config, path: &std::path::Path) -> Result<()> {
    let state = if path.exists() { "" } else { " (없음, 기본값 사용)" };
    println!("설정 파일: {}{}", path.display(), state);
    println!("음원 공급자 순서: {}", cfg.audio_providers().join(", "));
    println!("영상 공급자: {} / ffmpeg: {}\n", cfg.video.provider, cfg.video.ffmpeg.display());

    if cfg.api.is_empty() {
        println!("[api] 항목이 없습니다. config.example.toml을 참고하세요.");
        return Ok(());
    }

    let present = |t: &Option<String>| if t.is_some() { "O" } else { "-" };
    let mut table = Table::new();
    table.set_header(vec!["id", "종류", "창", "search", "direct_link", "lyric", "info"]);
    for (id, ep) in &cfg.api {
        table.add_row(vec![
            Cell::new(id),
            Cell::new(ep.kind(id)),
            Cell::new(ep.window()),
            Cell::new("O"),
            Cell::new("O"),
            Cell::new(present(&ep.lyric)),
            Cell::new(present(&ep.info)),
        ]);
    }
    println!("{table}");
    Ok(())
}
