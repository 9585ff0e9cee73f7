use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use clap::Parser;
use secrecy::SecretString;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, oneshot, watch};
use tracing_subscriber::EnvFilter;
use turngate_api::DoorClient;
use turngate_core::onnx::{EmbedderProfile, OnnxEngine};
use turngate_core::{Debouncer, EmbeddingStore, FaceEngine};
use turngate_hw::Camera;

mod config;
mod engine;
mod roster;

use config::{Backend, Config, RosterConfig};
use engine::CaptureLoop;
use roster::Roster;

#[derive(Parser)]
#[command(name = "turngated", about = "Turnstile face access-control daemon")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "/etc/turngate/config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    tracing::info!(config = %cli.config.display(), "turngated starting");

    let client = Arc::new(DoorClient::new(
        &cfg.turnstile.host,
        cfg.turnstile.device_id,
        cfg.turnstile.login.clone(),
        SecretString::from(cfg.turnstile.password.clone()),
        Duration::from_secs(cfg.turnstile.request_timeout_secs),
    )?);
    client
        .authenticate()
        .await
        .context("initial controller authentication")?;

    let (initial_roster, initial_store) = load_state(&cfg, &client).await?;
    tracing::info!(
        users = initial_roster.enrolled_count(),
        embeddings = initial_store.len(),
        "roster and embeddings loaded"
    );
    let roster = Arc::new(ArcSwap::from_pointee(initial_roster));
    let store = Arc::new(ArcSwap::from_pointee(initial_store));

    let face_engine = build_face_engine(&cfg)?;
    let camera = Camera::open(&cfg.camera.device)?;

    let (pass_tx, pass_rx) = mpsc::channel(8);
    // The receiver side is the seam for a pull-based video responder;
    // it must stay alive or the channel closes.
    let (snapshot_tx, _snapshot_rx) = watch::channel(None);
    let shutdown = Arc::new(AtomicBool::new(false));

    let capture_loop = CaptureLoop {
        source: camera,
        face_engine,
        store: store.clone(),
        roster: roster.clone(),
        threshold: cfg.recognition.threshold,
        zone_mode: cfg.zones.mode,
        exit_zone: cfg.zones.exit,
        entrance_zone: cfg.zones.entrance,
        debouncer: Debouncer::new(Duration::from_secs(cfg.turnstile.min_time_diff_secs)),
        retry_attempts: cfg.capture.retry_attempts,
        retry_delay: Duration::from_millis(cfg.capture.retry_delay_ms),
        pass_tx,
        snapshot_tx,
        shutdown: shutdown.clone(),
    };

    // The camera API is blocking, so the loop gets its own OS thread.
    let (capture_done_tx, mut capture_done_rx) = oneshot::channel();
    let capture = std::thread::Builder::new()
        .name("turngate-capture".into())
        .spawn(move || {
            let _ = capture_done_tx.send(capture_loop.run());
        })?;

    let dispatcher = tokio::spawn(engine::dispatch_loop(pass_rx, client.clone()));

    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                break;
            }
            _ = hangup.recv() => {
                tracing::info!("SIGHUP received; resyncing roster and embeddings");
                match load_state(&cfg, &client).await {
                    Ok((new_roster, new_store)) => {
                        tracing::info!(
                            users = new_roster.enrolled_count(),
                            embeddings = new_store.len(),
                            "resync complete"
                        );
                        // Wholesale swap: the capture loop never sees a
                        // partially replaced store.
                        roster.store(Arc::new(new_roster));
                        store.store(Arc::new(new_store));
                    }
                    Err(err) => tracing::error!(
                        error = %err,
                        "resync failed; keeping previous roster and embeddings"
                    ),
                }
            }
            result = &mut capture_done_rx => {
                return match result {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(err)) => {
                        Err(anyhow::Error::new(err).context("capture loop failed"))
                    }
                    Err(_) => Err(anyhow::anyhow!("capture thread panicked")),
                };
            }
        }
    }

    // Graceful shutdown: no new frame is processed after the flag is
    // set; the dispatcher drains any in-flight actuation first.
    shutdown.store(true, Ordering::Relaxed);
    let _ = capture.join();
    let _ = dispatcher.await;

    tracing::info!("turngated stopped");
    Ok(())
}

/// Load the roster (file or remote) and the embedding store it keys.
/// Used at startup and for every SIGHUP resync; any failure leaves the
/// previously active state untouched.
async fn load_state(cfg: &Config, client: &DoorClient) -> Result<(Roster, EmbeddingStore)> {
    let roster = match &cfg.roster {
        RosterConfig::File { path, unknown_name } => Roster::load_file(path, unknown_name)?,
        RosterConfig::Remote { unknown_name } => {
            let staff = client
                .staff_list()
                .await
                .context("fetching staff roster")?;
            Roster::from_staff(staff, unknown_name)
        }
    };
    let store = EmbeddingStore::load_dir(&cfg.recognition.embeddings_dir, roster.enrolled_ids())?;
    Ok((roster, store))
}

fn build_face_engine(cfg: &Config) -> Result<Box<dyn FaceEngine + Send>> {
    let profile = match cfg.recognition.backend {
        Backend::Arcface => EmbedderProfile::ARCFACE,
        Backend::Facenet => EmbedderProfile::FACENET,
    };
    let face_engine = OnnxEngine::load(
        &cfg.recognition.detector_model.to_string_lossy(),
        &cfg.recognition.embedding_model.to_string_lossy(),
        profile,
    )?;
    Ok(Box::new(face_engine))
}
