use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use improv_scene::{
    create_router, AppState, AudioBackendFactory, AudioBridge, AudioSource, Config,
    HttpCredentialFetcher, OutputContext, SceneSession, SessionStatus, WebSocketConnector,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "improv-scene", version, about = "Live voice improv scene with a realtime AI partner")]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(long, default_value = "config/improv-scene")]
    config: String,

    /// Replay a WAV file instead of using the microphone
    #[arg(long)]
    input_wav: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one scene in the terminal until Ctrl-C
    Run,
    /// Serve the scene control API
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Token endpoint: {}", cfg.credential.url);
    info!("Realtime model: {}", cfg.realtime.model);

    let source = match cli.input_wav {
        Some(path) => AudioSource::File(path),
        None => AudioSource::Microphone,
    };
    let scene = build_scene(&cfg, source)?;

    match cli.command {
        Command::Run => run(scene).await,
        Command::Serve => serve(scene, &cfg).await,
    }
}

fn build_scene(cfg: &Config, source: AudioSource) -> Result<SceneSession> {
    let capture = AudioBackendFactory::create_capture(source).context("Failed to create capture backend")?;
    let output = OutputContext::new(Arc::from(AudioBackendFactory::create_output()), cfg.audio.sample_rate);
    let bridge = AudioBridge::new(capture, output, cfg.capture_constraints());

    let fetcher = HttpCredentialFetcher::new(&cfg.credential.url, cfg.credential_timeout())
        .context("Failed to create token client")?;
    let connector = WebSocketConnector::new(&cfg.realtime.url, &cfg.realtime.model);

    Ok(SceneSession::new(
        cfg.session_config(),
        bridge,
        Arc::new(fetcher),
        Arc::new(connector),
    ))
}

async fn run(scene: SceneSession) -> Result<()> {
    let mut updates = scene.subscribe();

    if let Err(e) = scene.start().await {
        error!("Scene failed to start: {}", e);
        scene.stop().await;
        return Err(e).context("Failed to start scene");
    }

    info!("Scene active - speak to your partner (Ctrl-C to stop)");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut printed = 0;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();

                if state.transcript.len() > printed {
                    print!("{}", &state.transcript[printed..]);
                    std::io::stdout().flush().ok();
                    printed = state.transcript.len();
                }

                match state.status {
                    SessionStatus::Idle => {
                        info!("Scene ended by the remote service");
                        break;
                    }
                    SessionStatus::Error => {
                        error!("Scene failed: {}", state.error.unwrap_or_default());
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    println!();
    scene.stop().await;
    Ok(())
}

async fn serve(scene: SceneSession, cfg: &Config) -> Result<()> {
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Control API listening on http://{}", addr);

    axum::serve(listener, create_router(AppState::new(scene.clone())))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .context("HTTP server failed")?;

    scene.stop().await;
    Ok(())
}
