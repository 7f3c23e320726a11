//! lanlink - LAN session demo CLI
//!
//! A terminal stand-in for the game UI: host a session, join one, or browse
//! the LAN, with chat lines read from stdin.

use std::io::BufRead;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

use lanlink::network::{Session, SessionCallbacks, SessionConfig, SessionState, DEFAULT_PORT};

/// Update cadence; bounds how fast datagrams are drained
const TICK: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "lanlink")]
#[command(about = "LAN session discovery and messaging for real-time multiplayer games")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Host a session and chat with joined players
    Host {
        /// Game name shown in LAN browsers
        #[arg(short, long, default_value = "LAN Game")]
        name: String,

        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },

    /// Join a hosted session
    Join {
        /// Host address (IP or hostname)
        address: String,

        /// Host port
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Your player name
        #[arg(short = 'n', long, default_value = "Player")]
        name: String,
    },

    /// Browse the LAN for hosted sessions
    Discover {
        /// How long to listen for responses
        #[arg(short, long, default_value = "5")]
        seconds: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Host { name, port } => run_host(&name, port),
        Commands::Join {
            address,
            port,
            name,
        } => run_join(&address, port, &name),
        Commands::Discover { seconds } => run_discover(seconds),
    }
}

fn run_host(name: &str, port: u16) -> Result<()> {
    let mut session = Session::new(SessionConfig::default());
    session.set_callbacks(chat_callbacks());
    session.host_game(name, port)?;

    println!(
        "Hosting '{}' on port {} — type to chat, /quit to leave",
        session.game_name(),
        session.local_port()
    );
    chat_loop(&mut session)
}

fn run_join(address: &str, port: u16, name: &str) -> Result<()> {
    let mut session = Session::new(SessionConfig::default());
    session.set_callbacks(chat_callbacks());
    session.join_game(address, port, name)?;

    // The join response arrives through update
    let deadline = Instant::now() + Duration::from_secs(5);
    while session.state() == SessionState::Connecting {
        if Instant::now() > deadline {
            bail!("No answer from {address}:{port}");
        }
        session.update();
        thread::sleep(TICK);
    }

    println!(
        "Connected to {address}:{port} as player {} — type to chat, /quit to leave",
        session.local_player_id()
    );
    chat_loop(&mut session)
}

fn run_discover(seconds: u64) -> Result<()> {
    let mut session = Session::new(SessionConfig::default());
    session.start_discovery()?;

    let deadline = Instant::now() + Duration::from_secs(seconds);
    while Instant::now() < deadline {
        session.update();
        thread::sleep(TICK);
    }

    let games = session.discovered_games(usize::MAX);
    if games.is_empty() {
        println!("No games found");
        return Ok(());
    }
    for game in games {
        println!(
            "{:<24} {}:{} [{}/{}]",
            game.info.name,
            game.info.host_ip,
            game.info.host_port,
            game.info.current_players,
            game.info.max_players
        );
    }
    Ok(())
}

/// Callbacks printing session events to the terminal
fn chat_callbacks() -> SessionCallbacks {
    SessionCallbacks {
        on_player_joined: Some(Box::new(|id, name| println!("* {name} joined ({id})"))),
        on_player_left: Some(Box::new(|id| println!("* player {id} left"))),
        on_chat: Some(Box::new(|id, text| println!("<{id}> {text}"))),
        on_game_data: None,
        on_error: Some(Box::new(|msg| eprintln!("! {msg}"))),
    }
}

/// Drive the session at a fixed cadence while relaying stdin lines as chat.
fn chat_loop(session: &mut Session) -> Result<()> {
    let lines = spawn_stdin_reader();

    loop {
        session.update();

        while let Ok(line) = lines.try_recv() {
            let line = line.trim();
            if line == "/quit" {
                session.disconnect();
                let stats = session.statistics();
                println!(
                    "Sent {} messages ({} bytes), received {} ({} bytes), {} errors",
                    stats.messages_sent,
                    stats.bytes_sent,
                    stats.messages_received,
                    stats.bytes_received,
                    stats.errors
                );
                return Ok(());
            }
            if !line.is_empty() {
                if let Err(e) = session.send_chat(line) {
                    warn!("Chat not sent: {}", e);
                }
            }
        }

        thread::sleep(TICK);
    }
}

/// Read stdin on a separate thread so the update loop never blocks. The
/// session itself stays on this thread.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
