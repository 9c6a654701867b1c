use std::{io::Write, path::Path, sync::Arc};

use anyhow::Context;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
};
use tracing::{info, warn};

use tts_core::SpeechDispatcher;
use vtuber::{
    attachment::image_mime_for_path, forward_speaking, speech::build_engine, AppConfig, ConversationController,
    LoggingActuator, MessageStatus, Motion, MotionActuator, Role, SendOutcome, StreamConsumer, TranscriptEvent,
    TurnOutcome,
};

const HELP: &str = "\
commands:
  <text>          send a message with any staged images
  /attach <path>  stage an image file
  /paste <path>   stage file contents as if pasted from the clipboard
  /drop <n>       unstage image n
  /staged         list staged images
  /motion <name>  play a motion (ack, wave, heart, magic)
  /cancel         stop the answer in flight
  /reset          clear the conversation
  /stats          print turn metrics
  /quit           exit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    info!(
        "Backend {} | locale {} | voice hint {:?}",
        config.backend_url, config.speech.locale, config.speech.voice_hint
    );

    let engine = build_engine(&config)?;
    let dispatcher = SpeechDispatcher::new(Arc::new(engine), config.speech.clone());

    let actuator: Arc<dyn MotionActuator> = Arc::new(LoggingActuator);
    let _bridge = forward_speaking(dispatcher.subscribe_speaking(), actuator.clone());

    let consumer = StreamConsumer::connect(&config.backend_url, dispatcher)
        .with_context(|| format!("Invalid VTUBER_BACKEND_URL {}", config.backend_url))?;
    let controller = Arc::new(ConversationController::new(consumer, actuator, config.completion_motion));
    let _render = tokio::spawn(render(controller.subscribe()));

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !handle_line(&controller, line) {
            break;
        }
    }

    controller.cancel();
    info!("Bye");
    Ok(())
}

/// Returns false when the user wants to quit.
fn handle_line(controller: &Arc<ConversationController>, line: &str) -> bool {
    let (command, arg) = match line.split_once(' ') {
        Some((c, a)) => (c, a.trim()),
        None => (line, ""),
    };

    match command {
        "/quit" | "/exit" => return false,
        "/help" => println!("{HELP}"),
        "/attach" => match controller.stage_file(Path::new(arg)) {
            Ok(reference) => println!("staged {} ({})", reference.name, reference.preview_url()),
            Err(e) => println!("{e}"),
        },
        "/paste" => paste(controller, arg),
        "/drop" => match arg.parse::<usize>().ok().and_then(|n| controller.remove_staged(n)) {
            Some(reference) => println!("dropped {}", reference.name),
            None => println!("no staged image {arg}"),
        },
        "/staged" => {
            for (i, reference) in controller.staged().iter().enumerate() {
                println!("{i}: {} {}", reference.name, reference.preview_url());
            }
        }
        "/motion" => match arg.parse::<Motion>() {
            Ok(motion) => controller.play_motion(motion),
            Err(e) => println!("{e}"),
        },
        "/cancel" => {
            if !controller.cancel() {
                println!("nothing to cancel");
            }
        }
        "/reset" => {
            if controller.reset().is_ok() {
                println!("-- conversation cleared --");
            }
        }
        "/stats" => match serde_json::to_string_pretty(&controller.metrics().snapshot()) {
            Ok(json) => println!("{json}"),
            Err(e) => warn!("Failed to serialize metrics: {e}"),
        },
        _ if command.starts_with('/') => println!("unknown command {command}, try /help"),
        _ => {
            controller.stage_text(line);
            if let SendOutcome::Started(turn) = controller.submit() {
                tokio::spawn(async move {
                    if let TurnOutcome::Failed(reason) = turn.finished().await {
                        warn!("{reason}");
                    }
                });
            }
        }
    }
    true
}

fn paste(controller: &ConversationController, arg: &str) {
    let path = Path::new(arg);
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            println!("cannot read {arg}: {e}");
            return;
        }
    };
    let mime = image_mime_for_path(path).unwrap_or("application/octet-stream");
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pasted".to_string());
    match controller.stage_clipboard(name, mime, data) {
        Some(reference) => println!("staged {} ({})", reference.name, reference.preview_url()),
        None => println!("clipboard data is not an image"),
    }
}

/// Print the transcript as it changes. AI answers are printed as they grow.
async fn render(mut events: broadcast::Receiver<TranscriptEvent>) {
    let mut printed = String::new();
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Renderer skipped {n} transcript events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let mut out = std::io::stdout().lock();
        let _ = match event {
            TranscriptEvent::Appended { message, .. } => match message.role {
                Role::User => {
                    let images: Vec<_> = message.attachments.iter().map(|a| a.name.as_str()).collect();
                    if images.is_empty() {
                        writeln!(out, "you> {}", message.text)
                    } else {
                        writeln!(out, "you> {} [{}]", message.text, images.join(", "))
                    }
                }
                Role::Ai => {
                    printed.clear();
                    write!(out, "ai> ")
                }
            },
            TranscriptEvent::Updated { text, .. } => {
                let written = match text.strip_prefix(printed.as_str()) {
                    Some(delta) => write!(out, "{delta}"),
                    None => write!(out, "\nai> {text}"),
                };
                printed = text;
                written
            }
            TranscriptEvent::Finished { status, .. } => match status {
                MessageStatus::Cancelled => writeln!(out, " [cancelled]"),
                _ => writeln!(out),
            },
            TranscriptEvent::Cleared => Ok(()),
        };
        let _ = out.flush();
    }
}
