//! Share coordinator
//!
//! Owns everything one host needs to configure screen shares: the quality
//! state read by the injection hook, the virtual microphone manager, the
//! constraint applier and the pending reconciliation of the current session.
//!
//! ## Commit Sequence
//!
//! 1. Write the quality state (the hook sees it for any later negotiation)
//! 2. Start the virtual microphone when audio is on, and wait for it
//! 3. Patch the live connection and schedule track reconciliation
//! 4. Close the dialog and hand the [`StreamPick`] back
//!
//! A failed microphone start is returned to the caller. Nothing written in
//! step 1 is rolled back, on failure or on cancel.
//!
//! ## Concurrent Pickers
//!
//! Pickers opened on the same coordinator share its quality state, so the
//! later commit wins. Use separate coordinators for independent sessions.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::constraints::{ConstraintApplier, PendingReconcile, DEFAULT_RECONCILE_DELAY};
use crate::engine::MediaEngine;
use crate::picker::{
    PickerAction, PickerState, PickerUi, PickerWorkflow, ThumbnailProvider, Transition,
    DEFAULT_PREFERRED_SOURCE_PREFIXES,
};
use crate::quality::{InjectionHook, QualityState};
use crate::settings::{ContentHint, FrameRate, Resolution, Source, StreamPick, StreamSettings};
use crate::store::LastSettingsStore;
use crate::virtmic::{StreamClosed, VirtualMicBackend, VirtualMicManager};
use crate::{Result, ShareError};

/// Picker defaults and behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickerConfig {
    #[serde(default = "default_resolution")]
    pub default_resolution: Resolution,

    #[serde(default = "default_frame_rate")]
    pub default_frame_rate: FrameRate,

    #[serde(default)]
    pub default_content_hint: ContentHint,

    #[serde(default = "default_true")]
    pub default_audio: bool,

    /// Sources whose name starts with one of these are pre-selected
    #[serde(default = "default_preferred_prefixes")]
    pub preferred_source_prefixes: Vec<String>,

    /// Use the last committed settings as defaults
    #[serde(default)]
    pub remember_last_settings: bool,
}

fn default_resolution() -> Resolution {
    Resolution::highest()
}

fn default_frame_rate() -> FrameRate {
    FrameRate::highest()
}

fn default_true() -> bool {
    true
}

fn default_preferred_prefixes() -> Vec<String> {
    DEFAULT_PREFERRED_SOURCE_PREFIXES
        .iter()
        .map(|p| p.to_string())
        .collect()
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            default_resolution: default_resolution(),
            default_frame_rate: default_frame_rate(),
            default_content_hint: ContentHint::default(),
            default_audio: true,
            preferred_source_prefixes: default_preferred_prefixes(),
            remember_last_settings: false,
        }
    }
}

impl PickerConfig {
    /// Settings the form starts with
    pub fn default_settings(&self) -> StreamSettings {
        StreamSettings {
            resolution: self.default_resolution,
            frame_rate: self.default_frame_rate,
            audio: self.default_audio,
            content_hint: Some(self.default_content_hint),
            workaround: None,
            only_default_speakers: None,
        }
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub picker: PickerConfig,
    /// Delay before the track reconciliation runs
    pub reconcile_delay: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            picker: PickerConfig::default(),
            reconcile_delay: DEFAULT_RECONCILE_DELAY,
        }
    }
}

/// Entry point for screen share configuration
pub struct ShareCoordinator {
    config: CoordinatorConfig,
    quality: QualityState,
    virtual_mic: Arc<VirtualMicManager>,
    applier: ConstraintApplier,
    thumbnails: Arc<dyn ThumbnailProvider>,
    pending: PendingReconcile,
    store: Option<LastSettingsStore>,
}

impl ShareCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        engine: Arc<dyn MediaEngine>,
        virtual_mic: Arc<dyn VirtualMicBackend>,
        thumbnails: Arc<dyn ThumbnailProvider>,
    ) -> Self {
        let pending = PendingReconcile::new();
        let applier = ConstraintApplier::new(engine.clone(), config.reconcile_delay);
        let virtual_mic = Arc::new(VirtualMicManager::new(virtual_mic, engine, pending.clone()));

        Self {
            config,
            quality: QualityState::new(),
            virtual_mic,
            applier,
            thumbnails,
            pending,
            store: None,
        }
    }

    /// Persist commits to `store` (used only if `remember_last_settings`)
    pub fn with_settings_store(mut self, store: LastSettingsStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Handle on the committed quality
    pub fn quality(&self) -> &QualityState {
        &self.quality
    }

    /// Hook for the host's connection setup
    pub fn injection_hook(&self) -> InjectionHook {
        InjectionHook::new(self.quality.clone())
    }

    pub fn virtual_mic(&self) -> &Arc<VirtualMicManager> {
        &self.virtual_mic
    }

    /// Reconciliation of the most recent commit, if still tracked
    pub fn pending_reconcile(&self) -> &PendingReconcile {
        &self.pending
    }

    /// Subscribe the virtual microphone manager to the stream-closed bus
    ///
    /// Call once when the host is ready. `None` on unsupported platforms.
    pub fn listen_for_stream_closures(
        &self,
        events: broadcast::Receiver<StreamClosed>,
    ) -> Option<JoinHandle<()>> {
        self.virtual_mic.clone().spawn(events)
    }

    /// Settings the next picker starts with
    pub fn initial_settings(&self) -> StreamSettings {
        let remembered = match &self.store {
            Some(store) if self.config.picker.remember_last_settings => store.load(),
            _ => None,
        };
        remembered.unwrap_or_else(|| self.config.picker.default_settings())
    }

    /// Run the picker until the user commits or backs out
    ///
    /// Resolves exactly once: the committed [`StreamPick`], or
    /// [`ShareError::Aborted`] on cancel/close, or the virtual microphone's
    /// start error.
    pub async fn open_screen_share_picker<U>(
        &self,
        sources: Vec<Source>,
        skip_picker: bool,
        ui: &mut U,
    ) -> Result<StreamPick>
    where
        U: PickerUi + ?Sized,
    {
        let mut workflow = PickerWorkflow::new(
            sources,
            skip_picker,
            self.initial_settings(),
            &self.config.picker.preferred_source_prefixes,
        )?;

        let mut thumbnail: Option<(String, Option<String>)> = None;

        loop {
            let preview = self.preview_for(&workflow, &mut thumbnail).await;
            ui.present(workflow.view(preview)).await;

            let action = ui
                .next_action()
                .await
                .unwrap_or(PickerAction::CloseRequested);

            match workflow.apply(action) {
                Ok(Transition::Continue) => {}
                Ok(Transition::Cancelled) => {
                    debug!("Screen share picker cancelled");
                    ui.close().await;
                    return Err(ShareError::Aborted);
                }
                Ok(Transition::Submitted(pick)) => {
                    let result = self.commit(pick).await;
                    ui.close().await;
                    return result;
                }
                Err(e) => warn!("Ignoring picker action: {}", e),
            }
        }
    }

    /// Large thumbnail of the selected source, fetched once per selection
    async fn preview_for(
        &self,
        workflow: &PickerWorkflow,
        cache: &mut Option<(String, Option<String>)>,
    ) -> Option<String> {
        if workflow.skip_picker() || workflow.state() != PickerState::ConfiguringSettings {
            return None;
        }
        let selected = workflow.selected_id()?;

        if let Some((id, url)) = cache.as_ref() {
            if id == selected {
                return url.clone();
            }
        }

        let url = match self.thumbnails.large_thumbnail(selected).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Failed to fetch thumbnail for {}: {}", selected, e);
                None
            }
        };
        *cache = Some((selected.to_string(), url.clone()));
        url
    }

    async fn commit(&self, pick: StreamPick) -> Result<StreamPick> {
        info!(
            "Committing screen share of {}: {}p @ {}fps, audio: {}",
            pick.id, pick.settings.resolution, pick.settings.frame_rate, pick.settings.audio
        );
        self.quality.set(pick.settings.clone());

        if self.config.picker.remember_last_settings {
            if let Some(store) = &self.store {
                if let Err(e) = store.save(&pick.settings) {
                    warn!("Failed to remember stream settings: {}", e);
                }
            }
        }

        if pick.settings.audio {
            if self.virtual_mic.is_supported() {
                self.virtual_mic
                    .start(pick.settings.workaround.unwrap_or(false))
                    .await
                    .map_err(|e| {
                        error!("Failed to start virtual microphone: {}", e);
                        e
                    })?;
            } else {
                warn!("Stream audio requested but no virtual microphone is available");
            }
        }

        self.pending.replace(self.applier.apply(&pick.settings));
        Ok(pick)
    }
}
