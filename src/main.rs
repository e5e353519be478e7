use anyhow::{bail, Context};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use media_downloader::config::{ENV_DIR, ENV_FFMPEG, ENV_FFPROBE, ENV_QUIET, ENV_YTDLP};
use media_downloader::downloader::tools::ToolManager;
use media_downloader::downloader::{EventReceiver, LogLevel, ProgressPhase};
use media_downloader::{
    DownloadRequest, Downloader, DownloaderConfig, MediaKind, OperationState, Session,
    SessionEvent, VideoInfo,
};

#[derive(Parser)]
#[command(name = "media-downloader", version, about = "Download video or audio through yt-dlp")]
struct Cli {
    #[command(flatten)]
    tools: ToolArgs,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ToolArgs {
    /// yt-dlp binary to use
    #[arg(long, global = true, env = ENV_YTDLP)]
    ytdlp: Option<PathBuf>,

    /// ffmpeg binary (used only together with --ffprobe)
    #[arg(long, global = true, env = ENV_FFMPEG)]
    ffmpeg: Option<PathBuf>,

    /// ffprobe binary (used only together with --ffmpeg)
    #[arg(long, global = true, env = ENV_FFPROBE)]
    ffprobe: Option<PathBuf>,

    /// Keep yt-dlp quiet apart from progress
    #[arg(
        long,
        global = true,
        env = ENV_QUIET,
        value_parser = BoolishValueParser::new(),
        action = ArgAction::SetTrue
    )]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show title, duration, uploader, views and upload date without downloading
    Info { url: String },
    /// Download and convert
    Download(DownloadArgs),
    /// Show which external tools were found
    Tools,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Video,
    Audio,
}

#[derive(Args)]
struct DownloadArgs {
    url: String,

    #[arg(long, value_enum, default_value = "video")]
    kind: Kind,

    /// Target format (mp4, mkv, webm, avi / mp3, wav, aac, m4a, ogg, flac)
    #[arg(long)]
    format: Option<String>,

    /// Best, Worst, 1080p, 720p, 480p, 360p / Best, 320k, 256k, 192k, 128k, 96k
    #[arg(long, default_value = "Best")]
    quality: String,

    /// Destination directory (defaults to the Downloads folder)
    #[arg(long, env = ENV_DIR)]
    dest: Option<PathBuf>,
}

fn build_config(args: &ToolArgs) -> DownloaderConfig {
    let mut config = DownloaderConfig::from_env();
    if let Some(path) = &args.ytdlp {
        config.ytdlp_path = Some(path.clone());
    }
    if let Some(path) = &args.ffmpeg {
        config.ffmpeg_path = Some(path.clone());
    }
    if let Some(path) = &args.ffprobe {
        config.ffprobe_path = Some(path.clone());
    }
    if args.quiet {
        config.quiet = true;
    }
    config
}

fn render_log(level: LogLevel, message: &str) {
    let tag = match level {
        LogLevel::Info => "info",
        LogLevel::Success => " ok ",
        LogLevel::Warning => "warn",
        LogLevel::Error => "fail",
    };
    eprintln!("[{}] {}", tag, message);
}

fn render_info(info: &VideoInfo, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(info)?);
        return Ok(());
    }
    println!("Title: {}", info.title);
    println!("Duration: {}", info.duration);
    println!("Uploader: {}", info.uploader);
    println!("{}", info.view_count_label());
    println!("Upload Date: {}", info.upload_date_label());
    Ok(())
}

async fn run_info(
    session: &mut Session,
    rx: &mut EventReceiver,
    url: String,
    json: bool,
) -> anyhow::Result<()> {
    let op = session.fetch_info(url);
    while let Some(event) = rx.recv().await {
        session.apply(&event);
        match event {
            SessionEvent::Log { level, message, .. } if level != LogLevel::Error => {
                render_log(level, &message)
            }
            SessionEvent::InfoFetched { op: done, result } if done == op => {
                let info = result?;
                return render_info(&info, json);
            }
            _ => {}
        }
    }
    bail!("worker stopped without a result")
}

async fn run_download(
    session: &mut Session,
    rx: &mut EventReceiver,
    request: DownloadRequest,
    json: bool,
) -> anyhow::Result<()> {
    let op = session.start_download(request)?;

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    bail!("worker stopped without a result");
                };
                session.apply(&event);
                match event {
                    SessionEvent::Progress { update, .. } => {
                        eprint!("\r{:<72}", update.status_line());
                        if update.phase == ProgressPhase::Finished {
                            eprintln!();
                        }
                        let _ = std::io::stderr().flush();
                    }
                    SessionEvent::Log { level, message, .. } => render_log(level, &message),
                    SessionEvent::Finished { op: done, result, .. } if done == op => {
                        if json {
                            println!("{}", serde_json::to_string_pretty(&result)?);
                        } else if result.success {
                            println!("{}", result.resolved_file_path.display());
                        }
                        if session.state() == OperationState::Failed {
                            let message = result
                                .error_message
                                .unwrap_or_else(|| "Download failed".to_string());
                            bail!(message);
                        }
                        return Ok(());
                    }
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if session.stop_requested() {
                    render_log(
                        LogLevel::Warning,
                        "Download stop requested; yt-dlp may keep running in the background",
                    );
                }
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        pretty_env_logger::formatted_builder()
            .filter_level(log::LevelFilter::Info)
            .init();
    } else {
        pretty_env_logger::init();
    }

    let cli = Cli::parse();
    let config = build_config(&cli.tools);

    match cli.command {
        Command::Tools => {
            let tools = ToolManager::new(config).get_all_tools().await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&tools)?);
            } else {
                for tool in tools {
                    println!(
                        "{:<8} {:<10} {}",
                        tool.name,
                        tool.version.as_deref().unwrap_or("missing"),
                        tool.path.map(|p| p.display().to_string()).unwrap_or_default()
                    );
                }
            }
            Ok(())
        }
        Command::Info { url } => {
            let (mut session, mut rx) = Session::new(Arc::new(Downloader::from_config(&config)));
            run_info(&mut session, &mut rx, url, cli.json).await
        }
        Command::Download(args) => {
            let kind = match args.kind {
                Kind::Video => MediaKind::Video,
                Kind::Audio => MediaKind::Audio,
            };
            let format = args
                .format
                .unwrap_or_else(|| kind.default_format().to_string());
            let dest = args.dest.unwrap_or_else(|| config.download_dir.clone());
            let request = DownloadRequest::new(args.url, kind, format, args.quality, dest)
                .context("invalid download request")?;

            let (mut session, mut rx) = Session::new(Arc::new(Downloader::from_config(&config)));
            run_download(&mut session, &mut rx, request, cli.json).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_tool_overrides_from_flags_and_env() {
        std::env::set_var(ENV_FFPROBE, "/env/ffprobe");
        std::env::set_var(ENV_QUIET, "yes");

        let cli = Cli::try_parse_from([
            "media-downloader",
            "--ffmpeg",
            "/flag/ffmpeg",
            "download",
            "https://x.test/v",
            "--kind",
            "audio",
        ])
        .unwrap();

        assert_eq!(cli.tools.ffmpeg, Some(PathBuf::from("/flag/ffmpeg")));
        assert_eq!(cli.tools.ffprobe, Some(PathBuf::from("/env/ffprobe")));
        assert!(cli.tools.quiet);

        let config = build_config(&cli.tools);
        assert_eq!(config.ffmpeg_path, Some(PathBuf::from("/flag/ffmpeg")));
        assert!(config.quiet);
        assert!(matches!(cli.command, Command::Download(ref args) if args.quality == "Best"));
    }
}
