//! ochat - streaming chat client for an Ollama-style generation proxy

mod config;
mod ui;

use anyhow::Context;
use clap::Parser;
use ochat_ai::StreamClient;
use ochat_session::{ChatController, ChatEvent, HttpTransport, SessionState, SubmitOutcome};
use std::io::{self, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// ochat - chat with a language model over a streaming HTTP proxy
#[derive(Parser, Debug)]
#[command(name = "ochat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the proxy (default: config file, then http://10.100.201.91:8000)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Run in non-interactive mode with a single prompt
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// With --command, wait for the whole reply instead of streaming it
    #[arg(long, requires = "command")]
    no_stream: bool,

    /// Disable TUI mode (use simple stdin/stdout)
    #[arg(long)]
    no_tui: bool,

    /// Check that the proxy is up and exit
    #[arg(long)]
    health: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Verbose output (debug logs; written to ochat.log in TUI mode)
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool, use_tui: bool) -> anyhow::Result<()> {
    if !verbose {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ochat=debug,ochat_ai=debug,ochat_session=debug"));

    if use_tui {
        // Logging to stderr would draw over the TUI
        let dir = config::Config::config_dir();
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("ochat.log");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();

    let interactive = args.command.is_none() && !args.health;
    let use_tui = interactive && !args.no_tui && cfg.tui.unwrap_or(true);
    init_tracing(args.verbose, use_tui)?;

    let env_endpoint = std::env::var(config::ENDPOINT_ENV).ok();
    let endpoint = cfg.resolve_endpoint(args.endpoint.as_deref(), env_endpoint.as_deref());
    let client = StreamClient::parse_endpoint(&endpoint)
        .with_context(|| format!("Invalid endpoint {:?}", endpoint))?;
    tracing::debug!("using endpoint {}", client.endpoint());

    if args.health {
        return check_health(&client).await;
    }

    if let Some(command) = args.command {
        if args.no_stream {
            let reply = client.generate(&command).await?;
            println!("{}", reply);
            return Ok(());
        }
        let mut controller = ChatController::new(Arc::new(HttpTransport::new(client)));
        return run_command(&mut controller, &command).await;
    }

    let mut controller = ChatController::new(Arc::new(HttpTransport::new(client)));

    if use_tui {
        return ui::run_tui(&mut controller, cfg.theme(), &endpoint).await;
    }

    run_interactive(&mut controller, &endpoint).await
}

async fn check_health(client: &StreamClient) -> anyhow::Result<()> {
    match client.health().await {
        Ok(()) => {
            println!("{}: ok", client.endpoint());
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: {}", client.endpoint(), e.user_message());
            std::process::exit(1);
        }
    }
}

/// Print one chat event. `open_line` tracks whether the reply so far ends
/// mid-line.
fn print_event(event: ChatEvent, stdout: &mut io::Stdout, open_line: &mut bool) {
    match event {
        ChatEvent::Fragment { text } => {
            print!("{}", text);
            stdout.flush().ok();
            *open_line = !text.ends_with('\n');
        }
        ChatEvent::Malformed { message } => {
            eprintln!("\n[warning] {}", message);
        }
        ChatEvent::Error { message } => {
            eprintln!("Error: {}", message);
        }
        ChatEvent::TurnEnd { state } => {
            if *open_line {
                println!();
                *open_line = false;
            }
            if state == SessionState::Cancelled {
                eprintln!("[cancelled]");
            }
        }
        ChatEvent::TurnStart { .. } | ChatEvent::StreamOpened => {}
    }
}

/// Stream one turn to stdout. Ctrl+C cancels the turn instead of killing
/// the process.
async fn stream_turn(controller: &mut ChatController, prompt: &str) -> SubmitOutcome {
    let mut events = controller.subscribe();
    let handle = controller.handle();
    let mut stdout = io::stdout();
    let mut open_line = false;

    let mut turn = std::pin::pin!(controller.submit(prompt));
    let outcome = loop {
        tokio::select! {
            biased;

            outcome = &mut turn => break outcome,

            event = events.recv() => {
                if let Ok(event) = event {
                    print_event(event, &mut stdout, &mut open_line);
                }
            }

            _ = tokio::signal::ctrl_c() => {
                handle.abort();
            }
        }
    };

    while let Ok(event) = events.try_recv() {
        print_event(event, &mut stdout, &mut open_line);
    }
    outcome
}

async fn run_command(controller: &mut ChatController, command: &str) -> anyhow::Result<()> {
    match stream_turn(controller, command).await {
        SubmitOutcome::Finished(SessionState::Failed(kind)) => {
            // The error was already printed from the event stream
            tracing::debug!("command failed ({:?}): {:?}", kind, controller.error());
            std::process::exit(1);
        }
        SubmitOutcome::Ignored => anyhow::bail!("prompt is empty"),
        _ => Ok(()),
    }
}

async fn run_interactive(controller: &mut ChatController, endpoint: &str) -> anyhow::Result<()> {
    // Show minimal startup info (only if TTY)
    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        eprintln!("ochat ({})", endpoint);
        eprintln!("Ctrl+C cancels a reply, Ctrl+D or Ctrl+C at the prompt exits.");
        eprintln!();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(input) = line else {
            // EOF
            break;
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        println!();
        let outcome = stream_turn(controller, input).await;
        tracing::debug!("turn outcome: {:?}", outcome);
        println!();
    }

    Ok(())
}
