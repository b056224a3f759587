//! In-process media engine
//!
//! Keeps connections and tracks in memory. Used by the terminal picker and
//! by tests to observe what the coordinator patches.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

use crate::engine::{
    MediaConnection, MediaEngine, TrackConstraints, VideoStreamParameters, VideoTrack,
};
use crate::{Result, ShareError};

/// Video track that records every constraint request it accepts
#[derive(Debug, Default)]
pub struct InMemoryTrack {
    constraints: Mutex<TrackConstraints>,
    applied: Mutex<Vec<TrackConstraints>>,
    reject_with: Option<String>,
}

impl InMemoryTrack {
    pub fn new(constraints: TrackConstraints) -> Self {
        Self {
            constraints: Mutex::new(constraints),
            applied: Mutex::new(Vec::new()),
            reject_with: None,
        }
    }

    /// Track that fails every `apply_constraints` call with `reason`
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self {
            reject_with: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Every constraint request accepted so far, oldest first
    pub fn applied(&self) -> Vec<TrackConstraints> {
        self.applied
            .lock()
            .map(|applied| applied.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl VideoTrack for InMemoryTrack {
    fn constraints(&self) -> TrackConstraints {
        self.constraints
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    async fn apply_constraints(&self, constraints: TrackConstraints) -> Result<()> {
        if let Some(reason) = &self.reject_with {
            return Err(ShareError::Constraint(reason.clone()));
        }

        let mut current = self
            .constraints
            .lock()
            .map_err(|_| ShareError::Constraint("track state poisoned".to_string()))?;
        *current = constraints.clone();
        drop(current);

        if let Ok(mut applied) = self.applied.lock() {
            applied.push(constraints);
        }
        Ok(())
    }
}

/// Connection with one negotiated video stream
pub struct InMemoryConnection {
    owner: String,
    streams: Mutex<Vec<VideoStreamParameters>>,
    track: RwLock<Option<Arc<dyn VideoTrack>>>,
}

impl InMemoryConnection {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            streams: Mutex::new(vec![VideoStreamParameters::default()]),
            track: RwLock::new(None),
        }
    }

    /// Attach (or replace) the connection's video track
    pub fn set_video_track(&self, track: Arc<dyn VideoTrack>) {
        if let Ok(mut slot) = self.track.write() {
            *slot = Some(track);
        }
    }

    /// Snapshot of the negotiated video streams
    pub fn video_streams(&self) -> Vec<VideoStreamParameters> {
        self.streams
            .lock()
            .map(|streams| streams.clone())
            .unwrap_or_default()
    }
}

impl MediaConnection for InMemoryConnection {
    fn owner_user_id(&self) -> String {
        self.owner.clone()
    }

    fn modify_video_streams(&self, f: &mut dyn FnMut(&mut Vec<VideoStreamParameters>)) {
        if let Ok(mut streams) = self.streams.lock() {
            f(&mut *streams);
        }
    }

    fn video_track(&self) -> Option<Arc<dyn VideoTrack>> {
        self.track.read().ok().and_then(|track| track.clone())
    }
}

/// Media engine holding a list of connections
#[derive(Default)]
pub struct InMemoryEngine {
    local_user_id: RwLock<Option<String>>,
    connections: RwLock<Vec<Arc<dyn MediaConnection>>>,
}

impl InMemoryEngine {
    pub fn new(local_user_id: Option<String>) -> Self {
        Self {
            local_user_id: RwLock::new(local_user_id),
            connections: RwLock::new(Vec::new()),
        }
    }

    pub fn set_local_user_id(&self, user_id: Option<String>) {
        if let Ok(mut slot) = self.local_user_id.write() {
            *slot = user_id;
        }
    }

    pub fn add_connection(&self, connection: Arc<dyn MediaConnection>) {
        debug!(
            "Adding in-memory connection owned by {}",
            connection.owner_user_id()
        );
        if let Ok(mut connections) = self.connections.write() {
            connections.push(connection);
        }
    }
}

impl MediaEngine for InMemoryEngine {
    fn local_user_id(&self) -> Option<String> {
        self.local_user_id.read().ok().and_then(|id| id.clone())
    }

    fn connections(&self) -> Vec<Arc<dyn MediaConnection>> {
        self.connections
            .read()
            .map(|connections| connections.clone())
            .unwrap_or_default()
    }
}
