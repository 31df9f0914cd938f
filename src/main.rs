use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use travel_planner_client::channel::{ChannelTransport, SharedTransport, RECEIVE_MESSAGE_EVENT};
use travel_planner_client::cli::{resolve_config, Args, Command};
use travel_planner_client::{
    render, ChatMessage, ClientConfig, RealtimeChannel, SessionController, Tab, TripSession,
    UploadOutcome,
};

/// How long `chat` waits for the first connection before typing is allowed anyway.
const CHAT_CONNECT_GRACE: Duration = Duration::from_secs(3);

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn print_header(config: &ClientConfig) {
    println!("{}", "TRAVEL PLANNER".bright_cyan().bold());
    println!("{}: {}", "Backend".bright_yellow(), config.base_url);
}

fn print_notifications(controller: &SessionController) {
    for note in controller.take_notifications() {
        println!("{}", render::notification(&note));
    }
}

async fn run_probe(config: ClientConfig) -> bool {
    let controller = SessionController::new(config);
    let status = controller.probe().await;
    println!("{}", render::status_badge(status));
    status == travel_planner_client::ConnectivityStatus::Reachable
}

async fn run_upload(config: ClientConfig, path: &Path, tab: Tab) -> Result<bool, Box<dyn std::error::Error>> {
    let image = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.jpg")
        .to_string();

    let controller = SessionController::new(config);
    let probe = controller.spawn_probe();

    println!("{}", "Analyzing image...".bright_blue());
    let outcome = controller.upload_image(image, &filename).await;
    if let Ok(status) = probe.await {
        println!("{}", render::status_badge(status));
    }
    print_notifications(&controller);

    controller.select_tab(tab);
    let view = controller.view();
    println!();
    print!("{}", render::tab(view.active_tab, &controller.session()));
    Ok(matches!(outcome, UploadOutcome::Applied))
}

async fn run_chat(config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let local_author = config.display_name.clone();
    let channel = Arc::new(RealtimeChannel::connect(&config));
    let transport: SharedTransport = channel.clone();
    let controller = Arc::new(SessionController::new(config).with_channel(transport));
    let probe = controller.spawn_probe();

    if !channel.wait_connected(CHAT_CONNECT_GRACE).await {
        eprintln!(
            "{}",
            format!("  Not connected to {} yet; messages will be queued.", channel.url()).bright_yellow()
        );
    }
    if let Ok(status) = probe.await {
        println!("{}", render::status_badge(status));
    }
    println!("{}", "  Type a message and press Enter. Ctrl+D to leave.".bright_blue());

    // Printer: a second subscription so the relay's log and the screen stay
    // independent. Our own messages are printed when sent, not when echoed.
    let mut inbound = channel.subscribe();
    let printer_author = local_author.clone();
    let printer_ctl = Arc::clone(&controller);
    let printer = tokio::spawn(async move {
        loop {
            match inbound.recv().await {
                Ok(event) if event.event == RECEIVE_MESSAGE_EVENT => {
                    if let Ok(msg) = serde_json::from_value::<ChatMessage>(event.data) {
                        if !printer_ctl.is_own_message(&msg) {
                            println!("{}", render::chat_line(&msg, &printer_author));
                        }
                    }
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(sent) = controller.send_chat(&line) {
            println!("{}", render::chat_line(&sent, &local_author));
        }
    }

    controller.shutdown();
    printer.abort();
    channel.disconnect().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = resolve_config(&args)?;

    match &args.command {
        Command::Probe => {
            if !run_probe(config).await {
                std::process::exit(1);
            }
        }
        Command::Upload { path } => {
            print_header(&config);
            if !run_upload(config, path, Tab::Plan).await? {
                std::process::exit(1);
            }
        }
        Command::Session { path, tab } => {
            print_header(&config);
            if !run_upload(config, path, (*tab).into()).await? {
                std::process::exit(1);
            }
        }
        Command::Chat { .. } => {
            print_header(&config);
            run_chat(config).await?;
        }
        Command::Sample => {
            print!("{}", render::itinerary(&TripSession::sample()));
        }
    }

    Ok(())
}
