//! Quality state and the connection-setup injection hook
//!
//! The host calls [`InjectionHook::apply`] synchronously right before it
//! computes the local capture and encode parameters of a connection. When no
//! settings have been committed yet the options pass through untouched.
//!
//! ## Bitrate
//!
//! Whenever an override is active the hook pins the bitrate bounds to
//! [`MIN_BITRATE`], [`MAX_BITRATE`] and [`TARGET_BITRATE`] (bits per second).

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::settings::{DerivedQuality, StreamSettings};

/// Lower bitrate bound in bits/second
pub const MIN_BITRATE: u64 = 1_000_000;

/// Upper bitrate bound in bits/second
pub const MAX_BITRATE: u64 = 25_000_000;

/// Target bitrate in bits/second
pub const TARGET_BITRATE: u64 = 15_000_000;

/// Last committed stream settings
///
/// Cloning the handle shares the slot. The last writer wins; nothing resets
/// the slot between streams.
#[derive(Debug, Clone, Default)]
pub struct QualityState {
    inner: Arc<RwLock<Option<StreamSettings>>>,
}

impl QualityState {
    /// Create an empty slot (no override)
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently committed settings, if any
    pub fn get(&self) -> Option<StreamSettings> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the committed settings
    pub fn set(&self, settings: StreamSettings) {
        debug!(
            "Quality override set to {}p @ {}fps",
            settings.resolution, settings.frame_rate
        );
        match self.inner.write() {
            Ok(mut guard) => *guard = Some(settings),
            Err(poisoned) => *poisoned.into_inner() = Some(settings),
        }
    }
}

/// Encoder bitrate bounds in bits/second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitrateBounds {
    pub min: u64,
    pub max: u64,
    pub target: u64,
}

impl BitrateBounds {
    /// Bounds applied while an override is active
    pub fn pinned() -> Self {
        Self {
            min: MIN_BITRATE,
            max: MAX_BITRATE,
            target: TARGET_BITRATE,
        }
    }
}

/// Frame rate and frame geometry of one side of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGeometry {
    pub framerate: u32,
    pub width: u32,
    pub height: u32,
    pub pixel_count: u64,
}

impl From<DerivedQuality> for VideoGeometry {
    fn from(quality: DerivedQuality) -> Self {
        Self {
            framerate: quality.framerate,
            width: quality.width,
            height: quality.height,
            pixel_count: quality.pixel_count,
        }
    }
}

/// Parameters the host is about to use for a connection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionSetupOptions {
    /// `None` leaves bitrate selection to the engine
    #[serde(default)]
    pub bitrate: Option<BitrateBounds>,

    /// Encoder side, only present for sending connections
    #[serde(default)]
    pub encode: Option<VideoGeometry>,

    pub capture: VideoGeometry,
}

/// Hook that injects committed quality into connection setup
#[derive(Debug, Clone)]
pub struct InjectionHook {
    state: QualityState,
}

impl InjectionHook {
    pub fn new(state: QualityState) -> Self {
        Self { state }
    }

    /// Apply the committed quality to `options`
    pub fn apply(&self, mut options: ConnectionSetupOptions) -> ConnectionSetupOptions {
        let Some(settings) = self.state.get() else {
            return options;
        };

        let geometry = VideoGeometry::from(settings.derive());
        options.bitrate = Some(BitrateBounds::pinned());
        if let Some(encode) = options.encode.as_mut() {
            *encode = geometry;
        }
        options.capture = geometry;

        debug!(
            "Injected {}x{} @ {}fps into connection setup (encode: {})",
            geometry.width,
            geometry.height,
            geometry.framerate,
            options.encode.is_some()
        );

        options
    }
}
