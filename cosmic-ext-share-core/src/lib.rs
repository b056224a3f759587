//! COSMIC Share - Stream Configuration Coordinator
//!
//! This crate turns a user's screen share choices (source, resolution, frame
//! rate, audio) into configuration that is applied to a live media
//! connection and to a companion virtual microphone.
//!
//! ## Architecture
//!
//! ### Quality State & Injection Hook
//! - [`QualityState`] holds the last committed [`StreamSettings`]
//! - [`InjectionHook`] rewrites connection setup options from it, synchronously
//!
//! ### Picker Workflow
//! - [`picker::PickerWorkflow`] is the selection/settings state machine
//! - [`ShareCoordinator::open_screen_share_picker`] drives it from a
//!   [`picker::PickerUi`] and performs the commit
//!
//! ### Virtual Microphone
//! - [`virtmic::VirtualMicManager`] starts the device on commit and stops it
//!   when the local user's stream closes
//! - [`virtmic::pactl::PactlVirtualMic`] implements it on PipeWire (Linux)
//!
//! ### Constraint Applier
//! - [`constraints::ConstraintApplier`] patches the live connection, then
//!   reconciles the video track after a short delay
//!
//! ## Usage Example
//!
//! ```no_run
//! use cosmic_ext_share_core::memory::InMemoryEngine;
//! use cosmic_ext_share_core::picker::{PickerAction, PickerUi, PickerView, StaticThumbnails};
//! use cosmic_ext_share_core::virtmic::NoVirtualMic;
//! use cosmic_ext_share_core::{CoordinatorConfig, ShareCoordinator, Source};
//! use std::sync::Arc;
//!
//! struct CommitRightAway;
//!
//! #[async_trait::async_trait]
//! impl PickerUi for CommitRightAway {
//!     async fn present(&mut self, _view: PickerView) {}
//!     async fn next_action(&mut self) -> Option<PickerAction> {
//!         Some(PickerAction::Commit)
//!     }
//!     async fn close(&mut self) {}
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sources = vec![Source {
//!         id: "screen:0:0".to_string(),
//!         name: "Entire Screen".to_string(),
//!         url: String::new(),
//!     }];
//!
//!     let coordinator = ShareCoordinator::new(
//!         CoordinatorConfig::default(),
//!         Arc::new(InMemoryEngine::new(Some("456".to_string()))),
//!         Arc::new(NoVirtualMic),
//!         Arc::new(StaticThumbnails::new(&sources)),
//!     );
//!
//!     let pick = coordinator
//!         .open_screen_share_picker(sources, true, &mut CommitRightAway)
//!         .await?;
//!     println!("Sharing {} at {}p", pick.id, pick.settings.resolution);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod constraints;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod memory;
pub mod picker;
pub mod quality;
pub mod settings;
pub mod store;
pub mod stream_key;
pub mod virtmic;

pub use constraints::{ConstraintApplier, PendingReconcile, ReconcileTask};
pub use coordinator::{CoordinatorConfig, PickerConfig, ShareCoordinator};
pub use error::{Result, ShareError};
pub use quality::{ConnectionSetupOptions, InjectionHook, QualityState};
pub use settings::{
    ContentHint, DerivedQuality, FrameRate, Resolution, Source, StreamPick, StreamSettings,
};
pub use stream_key::StreamKey;
pub use virtmic::{StreamClosed, VirtualMicBackend, VirtualMicManager};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
