use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use flock_core::episode::Episode;
use flock_core::io::config::FlockConfig;
use flock_core::io::frame::make_frame;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "flockd", about = "Manual-play corridor streaming daemon")]
struct Args {
    /// Path to the config JSON document; defaults apply when omitted.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Optional override for the config seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Address to bind (defaults to 127.0.0.1).
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on for WebSocket clients.
    #[arg(long, default_value_t = 8787)]
    port: u16,

    /// Milliseconds to sleep between ticks.
    #[arg(long, default_value_t = 33u64)]
    tick_ms: u64,
}

#[derive(Clone)]
struct AppState {
    tx: broadcast::Sender<String>,
    episode: Arc<Mutex<Episode>>,
}

fn load_config(args: &Args) -> Result<FlockConfig> {
    let mut config = match &args.config {
        Some(path) => FlockConfig::load_from_path(path)?,
        None => FlockConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    Ok(config)
}

/// Advance the shared episode one tick, rolling over to a fresh run when the
/// previous one has ended, and return the frame line to broadcast.
fn advance(episode: &mut Episode, config: &FlockConfig, run: &mut u32) -> Result<String> {
    if episode.is_ended() {
        *run += 1;
        *episode = Episode::manual(config, *run)?;
        info!(run = *run, "starting a fresh run");
    }
    let report = episode.tick()?;
    let frame = make_frame(episode, report.events);
    Ok(frame.to_ndjson()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();

    let config = load_config(&args)?;
    let episode = Episode::manual(&config, 0)?;

    let (tx, _rx) = broadcast::channel::<String>(128);
    let episode_handle = Arc::new(Mutex::new(episode));
    let state = AppState {
        tx: tx.clone(),
        episode: Arc::clone(&episode_handle),
    };

    // Spawn ticking task.
    let tick_tx = tx.clone();
    let tick_handle = Arc::clone(&episode_handle);
    let tick_config = config.clone();
    let tick_interval = Duration::from_millis(args.tick_ms);
    tokio::spawn(async move {
        let mut run = 0u32;
        loop {
            let tick_result: Result<String> = {
                let mut episode = tick_handle.lock().await;
                advance(&mut episode, &tick_config, &mut run)
            };

            let line = match tick_result {
                Ok(line) => line,
                Err(err) => {
                    error!(?err, "tick failed");
                    break;
                }
            };

            if tick_tx.send(line).is_err() {
                tracing::trace!("no subscribers for this frame");
            }

            sleep(tick_interval).await;
        }
    });

    let app = Router::new()
        .route("/stream", get(ws_handler))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", args.bind, args.port))?;

    info!(%addr, "starting flockd");
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app.into_make_service())
        .await
        .context("server error")?;
    Ok(())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| async move { handle_socket(socket, state).await })
}

/// Frames flow out to the client; `jump` lines flow back in and queue a jump
/// on the live episode.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let mut rx = state.tx.subscribe();

    let forward = tokio::spawn(async move {
        while let Ok(line) = rx.recv().await {
            if sink.send(Message::Text(line)).await.is_err() {
                error!("websocket client disconnected");
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        if let Message::Text(text) = message {
            if text.trim() == "jump" {
                state.episode.lock().await.trigger_jump();
            }
        }
    }

    forward.abort();
}
