//! Virtual microphone lifecycle
//!
//! Screen shares with audio route application audio into a virtual audio
//! input ("virtual microphone") created by an out-of-process backend.
//!
//! ## Lifecycle
//!
//! - **Start**: requested by the picker when a commit has audio enabled. The
//!   backend gets the fixed [`VIRTUAL_MIC_LABEL`] and the workaround flag.
//! - **Stop**: requested when a stream owned by the local user closes. The
//!   owner is read from the stream key, see [`StreamKey`].
//!
//! The manager does not remember whether the device is running. Repeated
//! start/stop calls are the backend's business.
//!
//! ## Platform Support
//!
//! Only platforms where [`VirtualMicBackend::is_supported`] is true get a bus
//! listener; elsewhere [`VirtualMicManager::spawn`] returns `None`.

#[cfg(target_os = "linux")]
pub mod pactl;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::constraints::PendingReconcile;
use crate::engine::MediaEngine;
use crate::stream_key::StreamKey;
use crate::{Result, ShareError};

/// Device label handed to the backend on start
pub const VIRTUAL_MIC_LABEL: &str = "cosmic-ext-screen-share";

/// Notification that a stream has ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamClosed {
    pub stream_key: StreamKey,
}

impl StreamClosed {
    pub fn new(stream_key: impl Into<StreamKey>) -> Self {
        Self {
            stream_key: stream_key.into(),
        }
    }
}

/// Out-of-process virtual audio device
#[async_trait]
pub trait VirtualMicBackend: Send + Sync {
    /// Whether this platform can host the device at all
    fn is_supported(&self) -> bool {
        true
    }

    /// Create (or re-create) the device
    async fn start(&self, device_labels: Vec<String>, workaround: bool) -> Result<()>;

    /// Tear the device down
    async fn stop(&self) -> Result<()>;
}

/// Backend for hosts without a virtual audio device
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVirtualMic;

#[async_trait]
impl VirtualMicBackend for NoVirtualMic {
    fn is_supported(&self) -> bool {
        false
    }

    async fn start(&self, _device_labels: Vec<String>, _workaround: bool) -> Result<()> {
        Err(ShareError::Unsupported("virtual microphone".to_string()))
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

/// Starts and stops the virtual microphone
pub struct VirtualMicManager {
    backend: Arc<dyn VirtualMicBackend>,
    engine: Arc<dyn MediaEngine>,
    pending: PendingReconcile,
}

impl VirtualMicManager {
    pub fn new(
        backend: Arc<dyn VirtualMicBackend>,
        engine: Arc<dyn MediaEngine>,
        pending: PendingReconcile,
    ) -> Self {
        Self {
            backend,
            engine,
            pending,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.backend.is_supported()
    }

    /// Start the device for a committed stream
    pub async fn start(&self, workaround: bool) -> Result<()> {
        info!(
            "Starting virtual microphone '{}' (workaround: {})",
            VIRTUAL_MIC_LABEL, workaround
        );
        self.backend
            .start(vec![VIRTUAL_MIC_LABEL.to_string()], workaround)
            .await
    }

    /// React to a closed stream
    ///
    /// Returns `true` when the stream belonged to the local user and a stop
    /// was requested. A stop failure is logged and otherwise ignored.
    pub async fn handle_stream_closed(&self, event: &StreamClosed) -> bool {
        let ours = self
            .engine
            .local_user_id()
            .is_some_and(|local| event.stream_key.is_owned_by(&local));
        if !ours {
            debug!("Ignoring close of stream {} (not ours)", event.stream_key);
            return false;
        }

        info!(
            "Own stream {} closed, stopping virtual microphone",
            event.stream_key
        );
        if self.pending.cancel() {
            debug!("Cancelled reconciliation for closed stream");
        }
        if let Err(e) = self.backend.stop().await {
            warn!("Failed to stop virtual microphone: {}", e);
        }
        true
    }

    /// Listen for stream-closed notifications until the bus closes
    ///
    /// Returns `None` on platforms without a virtual audio backend.
    pub fn spawn(
        self: Arc<Self>,
        mut events: broadcast::Receiver<StreamClosed>,
    ) -> Option<JoinHandle<()>> {
        if !self.is_supported() {
            info!("Virtual microphone not supported on this platform");
            return None;
        }

        Some(tokio::spawn(async move {
            debug!("Virtual microphone manager listening for stream closures");
            loop {
                match events.recv().await {
                    Ok(event) => {
                        self.handle_stream_closed(&event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Missed {} stream-closed notifications", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Stream-closed bus closed, manager exiting");
                        break;
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryEngine;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Backend that counts calls and optionally fails
    #[derive(Default)]
    struct RecordingBackend {
        pub starts: Mutex<Vec<(Vec<String>, bool)>>,
        pub stops: AtomicUsize,
        pub fail_start: AtomicBool,
        pub fail_stop: AtomicBool,
        pub unsupported: bool,
    }

    #[async_trait]
    impl VirtualMicBackend for RecordingBackend {
        fn is_supported(&self) -> bool {
            !self.unsupported
        }

        async fn start(&self, device_labels: Vec<String>, workaround: bool) -> Result<()> {
            if let Ok(mut starts) = self.starts.lock() {
                starts.push((device_labels, workaround));
            }
            if self.fail_start.load(Ordering::SeqCst) {
                return Err(ShareError::VirtualMic("module load failed".to_string()));
            }
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if self.fail_stop.load(Ordering::SeqCst) {
                return Err(ShareError::VirtualMic("module unload failed".to_string()));
            }
            Ok(())
        }
    }

    fn manager(local_user: &str) -> (Arc<VirtualMicManager>, Arc<RecordingBackend>) {
        let backend = Arc::new(RecordingBackend::default());
        let engine = Arc::new(InMemoryEngine::new(Some(local_user.to_string())));
        let manager = Arc::new(VirtualMicManager::new(
            backend.clone(),
            engine,
            PendingReconcile::new(),
        ));
        (manager, backend)
    }

    #[tokio::test]
    async fn test_own_stream_close_stops_once() {
        let (manager, backend) = manager("456");
        assert!(manager.handle_stream_closed(&StreamClosed::new("call:123:456")).await);
        assert_eq!(backend.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_foreign_stream_close_is_ignored() {
        let (manager, backend) = manager("789");
        assert!(!manager.handle_stream_closed(&StreamClosed::new("call:123:456")).await);
        assert_eq!(backend.stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_local_user_ignores_close() {
        let backend = Arc::new(RecordingBackend::default());
        let manager = VirtualMicManager::new(
            backend.clone(),
            Arc::new(InMemoryEngine::new(None)),
            PendingReconcile::new(),
        );
        assert!(!manager.handle_stream_closed(&StreamClosed::new("call:1:2")).await);
        assert_eq!(backend.stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stop_failure_is_swallowed() {
        let (manager, backend) = manager("456");
        backend.fail_stop.store(true, Ordering::SeqCst);
        assert!(manager.handle_stream_closed(&StreamClosed::new("call:1:456")).await);
        assert_eq!(backend.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_uses_fixed_label() {
        let (manager, backend) = manager("456");
        manager.start(true).await.unwrap();

        let starts = backend.starts.lock().unwrap();
        assert_eq!(starts.len(), 1);
        assert_eq!(starts[0].0, vec![VIRTUAL_MIC_LABEL.to_string()]);
        assert!(starts[0].1);
    }

    #[tokio::test]
    async fn test_bus_listener() {
        let (manager, backend) = manager("456");
        let (tx, rx) = broadcast::channel(16);
        let handle = manager.spawn(rx).unwrap();

        tx.send(StreamClosed::new("call:123:789")).unwrap();
        tx.send(StreamClosed::new("call:123:456")).unwrap();
        drop(tx);

        handle.await.unwrap();
        assert_eq!(backend.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsupported_platform_does_not_listen() {
        let backend = Arc::new(RecordingBackend {
            unsupported: true,
            ..RecordingBackend::default()
        });
        let manager = Arc::new(VirtualMicManager::new(
            backend,
            Arc::new(InMemoryEngine::new(Some("456".to_string()))),
            PendingReconcile::new(),
        ));
        let (_tx, rx) = broadcast::channel(1);
        assert!(manager.spawn(rx).is_none());
    }
}
