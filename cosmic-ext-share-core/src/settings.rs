//! Stream settings and the values derived from them
//!
//! [`StreamSettings`] is what the user commits in the picker. It is replaced
//! wholesale on every commit and never edited after that.
//! [`DerivedQuality`] is the geometry every consumer (injection hook,
//! constraint applier) computes from it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Result, ShareError};

/// Video aspect ratio used to derive width from height
const ASPECT_RATIO: f64 = 16.0 / 9.0;

/// Stream resolution, expressed as pixel height
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "480")]
    P480,
    #[serde(rename = "720")]
    P720,
    #[serde(rename = "1080")]
    P1080,
    #[serde(rename = "1440")]
    P1440,
    #[serde(rename = "2160")]
    P2160,
}

impl Resolution {
    /// All resolutions, lowest first
    pub const ALL: [Resolution; 5] = [
        Resolution::P480,
        Resolution::P720,
        Resolution::P1080,
        Resolution::P1440,
        Resolution::P2160,
    ];

    /// Highest resolution offered by the picker
    pub fn highest() -> Self {
        Resolution::P2160
    }

    /// Pixel height
    pub fn height(self) -> u32 {
        match self {
            Resolution::P480 => 480,
            Resolution::P720 => 720,
            Resolution::P1080 => 1080,
            Resolution::P1440 => 1440,
            Resolution::P2160 => 2160,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.height())
    }
}

impl FromStr for Resolution {
    type Err = ShareError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_end_matches('p');
        Resolution::ALL
            .into_iter()
            .find(|r| r.height().to_string() == trimmed)
            .ok_or_else(|| ShareError::Configuration(format!("Invalid resolution: {}", s)))
    }
}

/// Stream frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FrameRate {
    #[serde(rename = "15")]
    Fps15,
    #[serde(rename = "30")]
    Fps30,
    #[serde(rename = "60")]
    Fps60,
}

impl FrameRate {
    /// All frame rates, lowest first
    pub const ALL: [FrameRate; 3] = [FrameRate::Fps15, FrameRate::Fps30, FrameRate::Fps60];

    /// Highest frame rate offered by the picker
    pub fn highest() -> Self {
        FrameRate::Fps60
    }

    /// Frames per second
    pub fn fps(self) -> u32 {
        match self {
            FrameRate::Fps15 => 15,
            FrameRate::Fps30 => 30,
            FrameRate::Fps60 => 60,
        }
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fps())
    }
}

impl FromStr for FrameRate {
    type Err = ShareError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        FrameRate::ALL
            .into_iter()
            .find(|r| r.fps().to_string() == trimmed)
            .ok_or_else(|| ShareError::Configuration(format!("Invalid frame rate: {}", s)))
    }
}

/// Nature of the shared video content, passed on to the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentHint {
    /// Fast moving content (games, video)
    #[default]
    Motion,
    /// Fine detail such as text
    Detail,
}

impl ContentHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Motion => "motion",
            Self::Detail => "detail",
        }
    }
}

impl FromStr for ContentHint {
    type Err = ShareError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "motion" => Ok(Self::Motion),
            "detail" => Ok(Self::Detail),
            other => Err(ShareError::Configuration(format!(
                "Invalid content hint: {}",
                other
            ))),
        }
    }
}

/// Quality settings committed by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSettings {
    pub resolution: Resolution,

    #[serde(rename = "fps")]
    pub frame_rate: FrameRate,

    /// Share application audio through the virtual microphone
    pub audio: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hint: Option<ContentHint>,

    /// Ask the virtual audio backend to use its workaround mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workaround: Option<bool>,

    /// Only route the default speakers into the virtual microphone
    ///
    /// Carried in the [`StreamPick`] for the host's audio routing. The
    /// virtual microphone backend only creates the device and does not read
    /// it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_default_speakers: Option<bool>,
}

impl Default for StreamSettings {
    /// Picker defaults: highest resolution and frame rate, motion hint, audio on
    fn default() -> Self {
        Self {
            resolution: Resolution::highest(),
            frame_rate: FrameRate::highest(),
            audio: true,
            content_hint: Some(ContentHint::Motion),
            workaround: None,
            only_default_speakers: None,
        }
    }
}

impl StreamSettings {
    /// Compute the geometry these settings ask for
    pub fn derive(&self) -> DerivedQuality {
        DerivedQuality::new(self.resolution, self.frame_rate)
    }
}

/// Frame rate and geometry derived from a [`StreamSettings`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedQuality {
    pub framerate: u32,
    pub height: u32,
    pub width: u32,
    pub pixel_count: u64,
}

impl DerivedQuality {
    /// `width = round(height * 16 / 9)`, `pixel_count = width * height`
    pub fn new(resolution: Resolution, frame_rate: FrameRate) -> Self {
        let height = resolution.height();
        let width = (f64::from(height) * ASPECT_RATIO).round() as u32;
        Self {
            framerate: frame_rate.fps(),
            height,
            width,
            pixel_count: u64::from(width) * u64::from(height),
        }
    }
}

/// Something the user can share
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: String,
    pub name: String,
    /// Small preview image
    pub url: String,
}

/// The picker's result: what to share and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamPick {
    /// Id of the chosen [`Source`]
    pub id: String,

    #[serde(flatten)]
    pub settings: StreamSettings,
}
