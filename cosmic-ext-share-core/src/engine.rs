//! Media engine boundary
//!
//! The coordinator never owns media connections. It reads and patches the
//! connections the engine exposes through [`MediaEngine`], and asks their
//! video tracks to adopt new [`TrackConstraints`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

use crate::settings::DerivedQuality;
use crate::Result;

/// How the engine treats a stream's maximum resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionKind {
    /// Follow the source size
    #[default]
    Source,
    /// Use the given width and height
    Fixed,
}

/// Maximum resolution of a negotiated video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MaxResolution {
    #[serde(rename = "type")]
    pub kind: ResolutionKind,
    pub width: u32,
    pub height: u32,
}

/// One negotiated video stream of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VideoStreamParameters {
    pub max_frame_rate: u32,
    pub max_resolution: MaxResolution,
}

/// A single constrainable numeric property
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstrainValue {
    Value(u32),
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ideal: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<u32>,
    },
}

impl ConstrainValue {
    /// `{min, ideal, max}` all set to `value`
    pub fn pinned(value: u32) -> Self {
        ConstrainValue::Range {
            min: Some(value),
            ideal: Some(value),
            max: Some(value),
        }
    }
}

/// Whether the media stack may rescale frames to satisfy constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeMode {
    None,
    CropAndScale,
}

/// Entry of the `advanced` constraint list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancedConstraint {
    pub width: u32,
    pub height: u32,
}

/// Constraint request for a media track
///
/// Keys this type does not model are kept in `other` so a merge never drops
/// them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<ConstrainValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<ConstrainValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<ConstrainValue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advanced: Vec<AdvancedConstraint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resize_mode: Option<ResizeMode>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl TrackConstraints {
    /// Current constraints overridden with the requested quality
    pub fn merged_with(&self, quality: &DerivedQuality) -> Self {
        Self {
            frame_rate: Some(ConstrainValue::Value(quality.framerate)),
            width: Some(ConstrainValue::pinned(quality.width)),
            height: Some(ConstrainValue::pinned(quality.height)),
            advanced: vec![AdvancedConstraint {
                width: quality.width,
                height: quality.height,
            }],
            resize_mode: Some(ResizeMode::None),
            other: self.other.clone(),
        }
    }
}

/// Video track of a live connection
#[async_trait]
pub trait VideoTrack: Send + Sync {
    /// Constraints currently in effect
    fn constraints(&self) -> TrackConstraints;

    /// Ask the media stack to adopt `constraints`
    async fn apply_constraints(&self, constraints: TrackConstraints) -> Result<()>;
}

/// A media session as seen by the coordinator
pub trait MediaConnection: Send + Sync {
    /// User id of the stream owner
    fn owner_user_id(&self) -> String;

    /// Run `f` over the negotiated video streams, in place
    fn modify_video_streams(&self, f: &mut dyn FnMut(&mut Vec<VideoStreamParameters>));

    /// First video track of the connection's input, if it exists yet
    fn video_track(&self) -> Option<Arc<dyn VideoTrack>>;
}

/// Read/write access to the engine's current connections
pub trait MediaEngine: Send + Sync {
    /// Id of the signed-in user
    fn local_user_id(&self) -> Option<String>;

    /// Snapshot of all current connections
    fn connections(&self) -> Vec<Arc<dyn MediaConnection>>;
}

/// First connection owned by `user_id`
///
/// Only one connection is expected per owner. When several match, the first
/// wins and a warning is logged.
pub fn find_owned_connection(
    engine: &dyn MediaEngine,
    user_id: &str,
) -> Option<Arc<dyn MediaConnection>> {
    let mut owned = engine
        .connections()
        .into_iter()
        .filter(|conn| conn.owner_user_id() == user_id);

    let first = owned.next()?;
    let extra = owned.count();
    if extra > 0 {
        warn!(
            "{} connections are owned by user {}, using the first one",
            extra + 1,
            user_id
        );
    }
    Some(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryConnection, InMemoryEngine};
    use crate::settings::{FrameRate, Resolution};
    use serde_json::json;

    #[test]
    fn test_merge_keeps_unknown_keys() {
        let current: TrackConstraints = serde_json::from_value(json!({
            "frameRate": 30,
            "deviceId": "screen:0:0",
            "width": { "max": 1280 }
        }))
        .unwrap();
        assert_eq!(
            current.width,
            Some(ConstrainValue::Range {
                min: None,
                ideal: None,
                max: Some(1280)
            })
        );

        let quality = DerivedQuality::new(Resolution::P1080, FrameRate::Fps60);
        let merged = current.merged_with(&quality);
        let json = serde_json::to_value(&merged).unwrap();

        assert_eq!(json["deviceId"], "screen:0:0");
        assert_eq!(json["frameRate"], 60);
        assert_eq!(json["width"], json!({ "min": 1920, "ideal": 1920, "max": 1920 }));
        assert_eq!(json["height"], json!({ "min": 1080, "ideal": 1080, "max": 1080 }));
        assert_eq!(json["advanced"], json!([{ "width": 1920, "height": 1080 }]));
        assert_eq!(json["resizeMode"], "none");
    }

    #[test]
    fn test_find_owned_connection_first_match() {
        let engine = InMemoryEngine::new(Some("456".to_string()));
        engine.add_connection(Arc::new(InMemoryConnection::new("123")));
        let first = Arc::new(InMemoryConnection::new("456"));
        let second = Arc::new(InMemoryConnection::new("456"));
        engine.add_connection(first.clone());
        engine.add_connection(second);

        let found = find_owned_connection(&engine, "456").unwrap();
        first.modify_video_streams(&mut |streams| streams[0].max_frame_rate = 7);

        let mut seen = 0;
        found.modify_video_streams(&mut |streams| seen = streams[0].max_frame_rate);
        assert_eq!(seen, 7);

        assert!(find_owned_connection(&engine, "789").is_none());
    }
}
