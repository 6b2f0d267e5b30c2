//! # FrameChat Client
//!
//! ```sh
//! fc-client chat --name ann                     # Join the shared chat list
//! fc-client broadcast --resolution 720p         # Stream test-pattern stills
//! fc-client watch --out latest.jpg              # Save the latest received frame
//! ```
//!
//! The relay URL comes from `--relay` or `FC_CLIENT__RELAY_URL`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use fc_client::{
    Applied, CaptureConfig, ConsumerView, FrameConsumer, FrameProducer, ScreenshotExporter,
    Session, TestPatternDevice,
};
use fc_common::AppConfig;
use fc_protocol::{CompressionLevel, ResolutionPreset, SourceKind};

// ─── CLI ────────────────────────────────────────────────────────
#[derive(Parser, Debug)]
#[command(name = "fc-client", about = "FrameChat endpoint: chat, broadcast or watch")]
struct Args {
    /// Relay WebSocket URL
    #[arg(long, global = true)]
    relay: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Join the shared chat list
    Chat {
        /// Display name (falls back to FC_CLIENT__DISPLAY_NAME)
        #[arg(long)]
        name: Option<String>,
    },
    /// Capture stills and publish them to the relay
    Broadcast {
        #[arg(long)]
        source: Option<SourceKind>,
        #[arg(long)]
        resolution: Option<ResolutionPreset>,
        #[arg(long)]
        quality: Option<CompressionLevel>,
    },
    /// Save the most recent frame from the relay to a file
    Watch {
        #[arg(long, default_value = "latest.jpg")]
        out: PathBuf,
        #[arg(long, default_value_t = 1000)]
        every_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.client.log_level)),
        )
        .init();

    let relay_url = args
        .relay
        .clone()
        .unwrap_or_else(|| config.client.relay_url.clone());

    match args.command {
        Command::Chat { name } => {
            let name = name
                .or_else(|| config.client.display_name().map(str::to_string))
                .context("A display name is required (--name or FC_CLIENT__DISPLAY_NAME)")?;
            run_chat(&relay_url, &name).await
        }
        Command::Broadcast {
            source,
            resolution,
            quality,
        } => {
            let mut capture = CaptureConfig::from(&config.capture);
            if let Some(source) = source {
                capture.source = source;
            }
            if let Some(resolution) = resolution {
                capture.resolution = resolution;
            }
            if let Some(quality) = quality {
                capture.compression = quality;
            }
            run_broadcast(&relay_url, capture, &config.capture.export_dir).await
        }
        Command::Watch { out, every_ms } => {
            run_watch(&relay_url, &out, Duration::from_millis(every_ms.max(1))).await
        }
    }
}

// ─── Chat ───────────────────────────────────────────────────────

async fn run_chat(url: &str, name: &str) -> Result<()> {
    let mut session = Session::connect(url, name).await?;
    println!("Joined as '{}'. /edit N text, /delete N, /list, /quit", session.display_name());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            update = session.next_update() => match update {
                Some(applied) => print_update(&session, &applied),
                None => {
                    println!("Disconnected from relay");
                    break;
                }
            },
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !handle_chat_line(&mut session, line.trim_end()) {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    session.disconnect();
    Ok(())
}

/// Returns `false` when the user asked to quit.
fn handle_chat_line(session: &mut Session, line: &str) -> bool {
    let result = match line.split_once(' ').unwrap_or((line, "")) {
        ("/quit", _) => return false,
        ("", _) => Ok(()),
        ("/list", _) => {
            print_list(session);
            Ok(())
        }
        ("/delete", rest) => match parse_index(rest) {
            Some(index) => session.delete(index),
            None => {
                println!("usage: /delete N");
                Ok(())
            }
        },
        ("/edit", rest) => {
            let (index, text) = rest.split_once(' ').unwrap_or((rest, ""));
            match parse_index(index) {
                Some(index) if text.trim().is_empty() => session
                    .draft_for_edit(index)
                    .map(|draft| println!("[{index}] current text: {draft}")),
                Some(index) => session.edit(index, text),
                None => {
                    println!("usage: /edit N text");
                    Ok(())
                }
            }
        }
        _ => session.append(line),
    };

    if let Err(e) = result {
        println!("! {e}");
    }
    true
}

fn parse_index(s: &str) -> Option<usize> {
    s.trim().parse().ok()
}

fn print_update(session: &Session, applied: &Applied) {
    let rendered = session.rendered();
    match applied {
        Applied::Snapshot { .. } => print_list(session),
        Applied::Appended { index } => println!("[{index}] {}", rendered[*index]),
        Applied::Edited { index } => println!("[{index}] {} (edited)", rendered[*index]),
        Applied::Deleted { index } => println!("[{index}] removed"),
        Applied::Rejected { reason, .. } => println!("! {reason}"),
        Applied::Stale { .. } | Applied::Ignored => {}
    }
}

fn print_list(session: &Session) {
    for (index, message) in session.rendered().iter().enumerate() {
        println!("[{index}] {message}");
    }
}

// ─── Broadcast ──────────────────────────────────────────────────

async fn run_broadcast(url: &str, capture: CaptureConfig, export_dir: &Path) -> Result<()> {
    let link = fc_client::connect(url).await?;
    let (tx, mut rx) = link.into_parts();

    let mut producer = FrameProducer::new(TestPatternDevice::default(), capture, tx);
    let mut exporter = ScreenshotExporter::new(export_dir);
    if let Err(e) = producer.start().await {
        println!("! {e}");
    }
    println!("Broadcasting. /quality high|medium|low, /resolution 1080p|720p|480p, /snap, /stop, /start, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = rx.recv() => {
                if event.is_none() {
                    println!("Disconnected from relay");
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let (command, arg) = line.trim().split_once(' ').unwrap_or((line.trim(), ""));
                match command {
                    "/quit" => break,
                    "/stop" => producer.stop().await,
                    "/start" => {
                        if let Err(e) = producer.start().await {
                            println!("! {e}");
                        }
                    }
                    "/quality" => match arg.parse::<CompressionLevel>() {
                        Ok(level) => producer.set_compression(level),
                        Err(e) => println!("! {e}"),
                    },
                    "/resolution" => {
                        let preset = ResolutionPreset::from_label(arg);
                        if let Err(e) = producer.set_resolution(preset).await {
                            println!("! {e}");
                        }
                    }
                    "/snap" => match producer.capture_single_frame().await {
                        Ok(frame) => match exporter.export(&frame) {
                            Ok(path) => println!("Saved {}", path.display()),
                            Err(e) => println!("! {e}"),
                        },
                        Err(e) => println!("! {e}"),
                    },
                    "" => {}
                    other => println!("unknown command '{other}'"),
                }
            }
        }
    }

    producer.stop().await;
    Ok(())
}

// ─── Watch ──────────────────────────────────────────────────────

async fn run_watch(url: &str, out: &Path, every: Duration) -> Result<()> {
    let link = fc_client::connect(url).await?;
    let consumer = std::sync::Arc::new(FrameConsumer::new());
    let pump = tokio::spawn({
        let consumer = consumer.clone();
        async move { consumer.run(link).await }
    });

    let mut ticker = tokio::time::interval(every);
    let mut written: Option<fc_client::Frame> = None;
    loop {
        ticker.tick().await;
        match consumer.view() {
            ConsumerView::Waiting => tracing::debug!("Waiting for frames"),
            ConsumerView::Showing(frame) => {
                if written.as_ref() != Some(&frame) {
                    tokio::fs::write(out, &frame.data)
                        .await
                        .with_context(|| format!("Failed to write {}", out.display()))?;
                    tracing::info!(
                        path = %out.display(),
                        resolution = %frame.resolution(),
                        sequence = frame.sequence,
                        "Frame written"
                    );
                    written = Some(frame);
                }
            }
            ConsumerView::Disconnected => {
                println!("Not receiving: relay disconnected");
                break;
            }
        }
    }

    let _ = pump.await;
    Ok(())
}
