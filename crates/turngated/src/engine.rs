//! The capture/decision loop and the actuation dispatch task.
//!
//! The loop runs on a dedicated thread and never waits on the
//! controller: admitted actuations are handed over an mpsc channel to
//! an async task owning the door client, and the latest decision
//! snapshot is published over a watch channel for the video surface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use turngate_api::DoorClient;
use turngate_core::zone::{FractionalRect, ZoneMode, Zones};
use turngate_core::{decide, Debouncer, DoorState, EmbeddingStore, FaceEngine, Rect, UserId};
use turngate_hw::{capture_with_retry, CameraError, Frame, FrameSource};

use crate::roster::Roster;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("frame source: {0}")]
    Source(#[from] CameraError),
}

/// A debounce-approved actuation, handed to the dispatch task.
#[derive(Debug, Clone)]
pub struct PassRequest {
    pub user_id: UserId,
    pub direction: DoorState,
    pub description: String,
    pub display_name: String,
}

/// Latest decision snapshot, published once per processed frame for a
/// pull-based streaming responder.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub frame: Frame,
    /// Matched ids in detection order (sentinel for strangers).
    pub recognized: Vec<UserId>,
    pub boxes: Vec<Rect>,
}

/// The per-frame capture/decision loop.
///
/// Single writer of the debounce memory; the embedding store and
/// roster are read through `ArcSwap`, so a concurrent sync replaces
/// them wholesale without the loop ever observing a partial state.
pub struct CaptureLoop<S: FrameSource> {
    pub source: S,
    pub face_engine: Box<dyn FaceEngine + Send>,
    pub store: Arc<ArcSwap<EmbeddingStore>>,
    pub roster: Arc<ArcSwap<Roster>>,
    pub threshold: f32,
    pub zone_mode: ZoneMode,
    pub exit_zone: FractionalRect,
    pub entrance_zone: FractionalRect,
    pub debouncer: Debouncer,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub pass_tx: mpsc::Sender<PassRequest>,
    pub snapshot_tx: watch::Sender<Option<Arc<Snapshot>>>,
    pub shutdown: Arc<AtomicBool>,
}

impl<S: FrameSource> CaptureLoop<S> {
    /// Run until shutdown is requested or the frame source is exhausted.
    ///
    /// Zones are resolved from the first captured frame's dimensions
    /// and stay fixed for the session. Detection failures skip the
    /// frame; capture failures beyond the retry budget are fatal.
    pub fn run(mut self) -> Result<(), EngineError> {
        tracing::info!("capture loop started");
        let mut zones: Option<Zones> = None;

        while !self.shutdown.load(Ordering::Relaxed) {
            let frame =
                capture_with_retry(&mut self.source, self.retry_attempts, self.retry_delay)?;

            let zones = *zones.get_or_insert_with(|| {
                let resolved = Zones::resolve(
                    &self.exit_zone,
                    &self.entrance_zone,
                    frame.width,
                    frame.height,
                );
                tracing::info!(
                    width = frame.width,
                    height = frame.height,
                    exit = ?resolved.exit,
                    entrance = ?resolved.entrance,
                    "zones resolved from first frame"
                );
                resolved
            });

            let detections = match self
                .face_engine
                .detect(&frame.data, frame.width, frame.height)
            {
                Ok(detections) => detections,
                Err(err) => {
                    tracing::warn!(error = %err, "detection failed; skipping frame");
                    continue;
                }
            };

            let store = self.store.load();
            let decision = decide(&detections, &store, self.threshold, &zones, self.zone_mode);

            let _ = self.snapshot_tx.send(Some(Arc::new(Snapshot {
                frame,
                recognized: decision.recognized.clone(),
                boxes: decision.boxes.clone(),
            })));

            if let Some((user_id, direction)) = decision.trigger {
                self.handle_trigger(user_id, direction);
            }
        }

        tracing::info!("capture loop exiting");
        Ok(())
    }

    fn handle_trigger(&mut self, user_id: UserId, direction: DoorState) {
        // The memory is written here, before the dispatch, so the next
        // frame cannot double-trigger while the controller call is in
        // flight.
        if !self.debouncer.admit(user_id, direction, Instant::now()) {
            tracing::debug!(
                user_id,
                direction = direction.label(),
                "trigger suppressed by debounce"
            );
            return;
        }

        let roster = self.roster.load();
        let display_name = roster.display_name(user_id).to_string();
        tracing::info!(
            user_id,
            name = %display_name,
            direction = direction.label(),
            "actuation admitted"
        );

        let request = PassRequest {
            user_id,
            direction,
            description: format!("camera {}", direction.label()),
            display_name,
        };

        // Never block detection on actuation: if the dispatch queue is
        // full the candidate is dropped and the next frame retries
        // naturally.
        if let Err(err) = self.pass_tx.try_send(request) {
            tracing::error!(
                user_id,
                direction = direction.label(),
                error = %err,
                "actuation dispatch failed; candidate dropped"
            );
        }
    }
}

/// Receive admitted actuations and perform the controller exchange.
///
/// Every failure is logged with the user and direction and then
/// dropped; a recoverable controller hiccup never takes the loop down.
pub async fn dispatch_loop(mut requests: mpsc::Receiver<PassRequest>, client: Arc<DoorClient>) {
    while let Some(request) = requests.recv().await {
        let Some(code) = request.direction.direction_code() else {
            continue;
        };
        match client
            .open_pass(request.user_id, code, &request.description)
            .await
        {
            Ok(()) => tracing::info!(
                user_id = request.user_id,
                name = %request.display_name,
                direction = request.direction.label(),
                "door opened"
            ),
            Err(err) => tracing::error!(
                user_id = request.user_id,
                name = %request.display_name,
                direction = request.direction.label(),
                error = %err,
                "door open failed; candidate dropped"
            ),
        }
    }
}
