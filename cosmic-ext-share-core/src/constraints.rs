//! Post-commit constraint applier
//!
//! Applies committed quality to a stream that is already live, in two steps:
//!
//! 1. Synchronously, patch the first negotiated video stream of the local
//!    user's connection (max frame rate and max resolution).
//! 2. After [`DEFAULT_RECONCILE_DELAY`], re-locate the connection and ask its
//!    video track to adopt matching constraints. The engine may not have
//!    created the final track at commit time, hence the delay.
//!
//! Step 2 is a single best-effort attempt. Its outcome is logged and never
//! reported to anyone. The spawned task is wrapped in a [`ReconcileTask`] so
//! the owning session can cancel it.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::{find_owned_connection, MediaEngine, MaxResolution, ResolutionKind};
use crate::settings::{DerivedQuality, StreamSettings};
use crate::{Result, ShareError};

/// Delay between commit and track reconciliation
pub const DEFAULT_RECONCILE_DELAY: Duration = Duration::from_millis(100);

/// Handle to a pending track reconciliation
#[derive(Debug)]
pub struct ReconcileTask {
    handle: JoinHandle<()>,
}

impl ReconcileTask {
    /// Abort the reconciliation if it has not run yet
    pub fn cancel(&self) {
        if !self.handle.is_finished() {
            debug!("Cancelling pending constraint reconciliation");
            self.handle.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task; `false` if it was cancelled
    pub async fn join(self) -> bool {
        match self.handle.await {
            Ok(()) => true,
            Err(e) if e.is_cancelled() => false,
            Err(e) => {
                error!("Constraint reconciliation task panicked: {}", e);
                false
            }
        }
    }
}

/// Slot for the reconciliation belonging to the current share session
///
/// Storing a new task cancels the one it replaces.
#[derive(Debug, Clone, Default)]
pub struct PendingReconcile {
    inner: Arc<Mutex<Option<ReconcileTask>>>,
}

impl PendingReconcile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, task: ReconcileTask) {
        if let Ok(mut slot) = self.inner.lock() {
            if let Some(previous) = slot.replace(task) {
                previous.cancel();
            }
        }
    }

    /// Cancel and forget the pending task, if any
    pub fn cancel(&self) -> bool {
        let task = self.inner.lock().ok().and_then(|mut slot| slot.take());
        match task {
            Some(task) => {
                let pending = !task.is_finished();
                task.cancel();
                pending
            }
            None => false,
        }
    }

    /// Take the task out of the slot without cancelling it
    pub fn take(&self) -> Option<ReconcileTask> {
        self.inner.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// Applies committed quality to the live connection and track
#[derive(Clone)]
pub struct ConstraintApplier {
    engine: Arc<dyn MediaEngine>,
    delay: Duration,
}

impl ConstraintApplier {
    pub fn new(engine: Arc<dyn MediaEngine>, delay: Duration) -> Self {
        Self { engine, delay }
    }

    /// Run step 1 now and schedule step 2
    ///
    /// Step 1 errors are logged; step 2 is scheduled regardless because the
    /// owning connection may appear before it runs.
    pub fn apply(&self, settings: &StreamSettings) -> ReconcileTask {
        let quality = settings.derive();

        match self.patch_connection(&quality) {
            Ok(true) => info!(
                "Patched stream parameters to {}x{} @ {}fps",
                quality.width, quality.height, quality.framerate
            ),
            Ok(false) => debug!("No owned connection to patch yet"),
            Err(e) => error!("Failed to patch stream parameters: {}", e),
        }

        let engine = self.engine.clone();
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match reconcile_track(engine.as_ref(), &quality).await {
                Ok(()) => info!(
                    "Applied track constraints {}x{} @ {}fps",
                    quality.width, quality.height, quality.framerate
                ),
                Err(e) => warn!("Failed to apply track constraints: {}", e),
            }
        });

        ReconcileTask { handle }
    }

    /// Overwrite the first video stream of the local user's connection
    ///
    /// Returns `false` when the local user owns no connection.
    pub fn patch_connection(&self, quality: &DerivedQuality) -> Result<bool> {
        let user_id = self.engine.local_user_id().ok_or(ShareError::NoLocalUser)?;
        let Some(connection) = find_owned_connection(self.engine.as_ref(), &user_id) else {
            return Ok(false);
        };

        let mut patched = false;
        connection.modify_video_streams(&mut |streams| {
            if let Some(first) = streams.first_mut() {
                first.max_frame_rate = quality.framerate;
                first.max_resolution = MaxResolution {
                    kind: ResolutionKind::Fixed,
                    width: quality.width,
                    height: quality.height,
                };
                patched = true;
            }
        });

        if !patched {
            warn!("Owned connection has no negotiated video stream");
        }
        Ok(patched)
    }
}

/// Step 2: apply matching constraints to the owning connection's track
pub async fn reconcile_track(engine: &dyn MediaEngine, quality: &DerivedQuality) -> Result<()> {
    let user_id = engine.local_user_id().ok_or(ShareError::NoLocalUser)?;
    let connection = find_owned_connection(engine, &user_id)
        .ok_or_else(|| ShareError::ConnectionNotFound(user_id.clone()))?;
    let track = connection.video_track().ok_or(ShareError::NoVideoTrack)?;

    let constraints = track.constraints().merged_with(quality);
    debug!("Applying track constraints: {:?}", constraints);
    track.apply_constraints(constraints).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        ConstrainValue, MediaConnection, ResizeMode, TrackConstraints, VideoStreamParameters,
    };
    use crate::memory::{InMemoryConnection, InMemoryEngine, InMemoryTrack};
    use crate::settings::{FrameRate, Resolution};

    fn settings_1080p60() -> StreamSettings {
        StreamSettings {
            resolution: Resolution::P1080,
            frame_rate: FrameRate::Fps60,
            ..StreamSettings::default()
        }
    }

    fn engine_with_owned_connection() -> (Arc<InMemoryEngine>, Arc<InMemoryConnection>) {
        let engine = Arc::new(InMemoryEngine::new(Some("456".to_string())));
        let connection = Arc::new(InMemoryConnection::new("456"));
        engine.add_connection(connection.clone());
        (engine, connection)
    }

    #[test]
    fn test_patch_first_stream() {
        let (engine, connection) = engine_with_owned_connection();
        connection.modify_video_streams(&mut |streams| {
            streams.push(VideoStreamParameters::default());
        });
        let applier = ConstraintApplier::new(engine, DEFAULT_RECONCILE_DELAY);

        let patched = applier
            .patch_connection(&settings_1080p60().derive())
            .unwrap();
        assert!(patched);

        let streams = connection.video_streams();
        assert_eq!(streams[0].max_frame_rate, 60);
        assert_eq!(streams[0].max_resolution.width, 1920);
        assert_eq!(streams[0].max_resolution.height, 1080);
        assert_eq!(streams[0].max_resolution.kind, ResolutionKind::Fixed);
        assert_eq!(streams[1], VideoStreamParameters::default());
    }

    #[test]
    fn test_patch_without_connection() {
        let engine = Arc::new(InMemoryEngine::new(Some("456".to_string())));
        engine.add_connection(Arc::new(InMemoryConnection::new("123")));
        let applier = ConstraintApplier::new(engine, DEFAULT_RECONCILE_DELAY);

        assert!(!applier.patch_connection(&settings_1080p60().derive()).unwrap());
    }

    #[test]
    fn test_patch_without_local_user() {
        let engine = Arc::new(InMemoryEngine::new(None));
        let applier = ConstraintApplier::new(engine, DEFAULT_RECONCILE_DELAY);

        let err = applier
            .patch_connection(&settings_1080p60().derive())
            .unwrap_err();
        assert!(matches!(err, ShareError::NoLocalUser));
    }

    #[tokio::test]
    async fn test_reconcile_applies_constraints() {
        let (engine, connection) = engine_with_owned_connection();
        let track = Arc::new(InMemoryTrack::new(TrackConstraints::default()));
        connection.set_video_track(track.clone());

        reconcile_track(engine.as_ref(), &settings_1080p60().derive())
            .await
            .unwrap();

        let applied = track.applied();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].frame_rate, Some(ConstrainValue::Value(60)));
        assert_eq!(applied[0].width, Some(ConstrainValue::pinned(1920)));
        assert_eq!(applied[0].height, Some(ConstrainValue::pinned(1080)));
        assert_eq!(applied[0].resize_mode, Some(ResizeMode::None));
    }

    #[tokio::test]
    async fn test_reconcile_without_track() {
        let (engine, _connection) = engine_with_owned_connection();
        let err = reconcile_track(engine.as_ref(), &settings_1080p60().derive())
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::NoVideoTrack));
    }

    #[tokio::test]
    async fn test_deferred_step_finds_late_connection() {
        let engine = Arc::new(InMemoryEngine::new(Some("456".to_string())));
        let applier = ConstraintApplier::new(engine.clone(), Duration::from_millis(20));

        let task = applier.apply(&settings_1080p60());

        // The connection shows up after commit but before the delay elapses
        let connection = Arc::new(InMemoryConnection::new("456"));
        let track = Arc::new(InMemoryTrack::new(TrackConstraints::default()));
        connection.set_video_track(track.clone());
        engine.add_connection(connection);

        assert!(task.join().await);
        assert_eq!(track.applied().len(), 1);
    }

    #[tokio::test]
    async fn test_deferred_failure_is_contained() {
        let (engine, connection) = engine_with_owned_connection();
        connection.set_video_track(Arc::new(InMemoryTrack::rejecting("overconstrained")));
        let applier = ConstraintApplier::new(engine, Duration::from_millis(1));

        // Completes normally even though the track rejected the request
        assert!(applier.apply(&settings_1080p60()).join().await);
    }

    #[tokio::test]
    async fn test_pending_reconcile_cancel() {
        let (engine, connection) = engine_with_owned_connection();
        let track = Arc::new(InMemoryTrack::new(TrackConstraints::default()));
        connection.set_video_track(track.clone());
        let applier = ConstraintApplier::new(engine, Duration::from_secs(60));

        let pending = PendingReconcile::new();
        pending.replace(applier.apply(&settings_1080p60()));
        assert!(pending.cancel());
        assert!(!pending.cancel());
        assert!(track.applied().is_empty());
    }

    #[tokio::test]
    async fn test_replace_cancels_previous() {
        let (engine, connection) = engine_with_owned_connection();
        let track = Arc::new(InMemoryTrack::new(TrackConstraints::default()));
        connection.set_video_track(track.clone());
        let slow = ConstraintApplier::new(engine.clone(), Duration::from_secs(60));
        let fast = ConstraintApplier::new(engine, Duration::from_millis(1));

        let pending = PendingReconcile::new();
        pending.replace(slow.apply(&settings_1080p60()));
        pending.replace(fast.apply(&StreamSettings {
            resolution: Resolution::P720,
            ..settings_1080p60()
        }));

        assert!(pending.take().unwrap().join().await);
        let applied = track.applied();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].height, Some(ConstrainValue::pinned(720)));
    }
}
