//! Screen share picker workflow
//!
//! A small state machine that turns the user's actions into a [`StreamPick`]:
//!
//! ```text
//!  SelectingScreen ──select──▶ ConfiguringSettings ──commit──▶ Submitted
//!         ▲                          │
//!         └──────────back────────────┘      (any) ──cancel/close──▶ Cancelled
//! ```
//!
//! `back` only exists when the caller did not ask to skip the picker. The
//! machine itself is synchronous; [`crate::ShareCoordinator`] drives it from
//! a [`PickerUi`] and performs the commit side effects.

pub mod ui;

pub use ui::{PickerUi, StaticThumbnails, ThumbnailProvider};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::settings::{ContentHint, FrameRate, Resolution, Source, StreamPick, StreamSettings};
use crate::{Result, ShareError};

/// Name prefixes of screen-capture applications whose source is pre-selected
pub const DEFAULT_PREFERRED_SOURCE_PREFIXES: &[&str] = &["OBS"];

/// Picker workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickerState {
    SelectingScreen,
    ConfiguringSettings,
    Submitted,
    Cancelled,
}

impl PickerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PickerState::Submitted | PickerState::Cancelled)
    }
}

/// One edit of the settings form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsEdit {
    Resolution(Resolution),
    FrameRate(FrameRate),
    Audio(bool),
    ContentHint(ContentHint),
    Workaround(bool),
    OnlyDefaultSpeakers(bool),
}

/// Something the user did in the picker dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerAction {
    SelectSource(String),
    Edit(SettingsEdit),
    Back,
    Commit,
    Cancel,
    /// The surrounding dialog asked to close
    CloseRequested,
}

impl PickerAction {
    fn name(&self) -> &'static str {
        match self {
            PickerAction::SelectSource(_) => "select",
            PickerAction::Edit(_) => "edit",
            PickerAction::Back => "back",
            PickerAction::Commit => "commit",
            PickerAction::Cancel => "cancel",
            PickerAction::CloseRequested => "close",
        }
    }
}

/// Result of feeding one action to the workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Still open; render again
    Continue,
    /// The user committed
    Submitted(StreamPick),
    /// The user backed out
    Cancelled,
}

/// What the dialog should currently show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerView {
    pub state: PickerState,
    pub sources: Vec<Source>,
    pub selected: Option<Source>,
    pub settings: StreamSettings,
    /// Large thumbnail of the selected source, settings step only
    pub thumbnail: Option<String>,
    pub can_go_back: bool,
    pub can_commit: bool,
}

/// Picker state machine for one invocation
#[derive(Debug, Clone)]
pub struct PickerWorkflow {
    sources: Vec<Source>,
    skip_picker: bool,
    state: PickerState,
    selected: Option<String>,
    settings: StreamSettings,
}

impl PickerWorkflow {
    /// Start a workflow over `sources`
    ///
    /// The initial selection is the first source when `skip_picker` is set,
    /// otherwise the first source whose name starts with one of
    /// `preferred_prefixes`. A pre-filled selection opens directly on the
    /// settings step.
    pub fn new(
        sources: Vec<Source>,
        skip_picker: bool,
        settings: StreamSettings,
        preferred_prefixes: &[String],
    ) -> Result<Self> {
        if skip_picker && sources.is_empty() {
            return Err(ShareError::NoSources);
        }

        let selected = if skip_picker {
            sources.first().map(|s| s.id.clone())
        } else {
            sources
                .iter()
                .find(|s| preferred_prefixes.iter().any(|p| s.name.starts_with(p.as_str())))
                .map(|s| s.id.clone())
        };

        let state = if selected.is_some() {
            PickerState::ConfiguringSettings
        } else {
            PickerState::SelectingScreen
        };

        if let Some(id) = &selected {
            debug!("Pre-selected source {}", id);
        }

        Ok(Self {
            sources,
            skip_picker,
            state,
            selected,
            settings,
        })
    }

    pub fn state(&self) -> PickerState {
        self.state
    }

    pub fn skip_picker(&self) -> bool {
        self.skip_picker
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    pub fn can_go_back(&self) -> bool {
        self.state == PickerState::ConfiguringSettings && !self.skip_picker
    }

    pub fn can_commit(&self) -> bool {
        self.state == PickerState::ConfiguringSettings && self.selected.is_some()
    }

    /// Snapshot for rendering
    pub fn view(&self, thumbnail: Option<String>) -> PickerView {
        PickerView {
            state: self.state,
            sources: self.sources.clone(),
            selected: self
                .selected
                .as_ref()
                .and_then(|id| self.sources.iter().find(|s| &s.id == id))
                .cloned(),
            settings: self.settings.clone(),
            thumbnail,
            can_go_back: self.can_go_back(),
            can_commit: self.can_commit(),
        }
    }

    /// Feed one user action
    ///
    /// Rejected actions leave the workflow unchanged.
    pub fn apply(&mut self, action: PickerAction) -> Result<Transition> {
        if self.state.is_terminal() {
            return Err(self.invalid(&action));
        }

        match action {
            PickerAction::Cancel | PickerAction::CloseRequested => {
                self.state = PickerState::Cancelled;
                Ok(Transition::Cancelled)
            }
            PickerAction::SelectSource(id) if self.state == PickerState::SelectingScreen => {
                if !self.sources.iter().any(|s| s.id == id) {
                    return Err(ShareError::UnknownSource(id));
                }
                self.selected = Some(id);
                self.state = PickerState::ConfiguringSettings;
                Ok(Transition::Continue)
            }
            PickerAction::Edit(edit) if self.state == PickerState::ConfiguringSettings => {
                self.edit(edit);
                Ok(Transition::Continue)
            }
            PickerAction::Back if self.can_go_back() => {
                self.selected = None;
                self.state = PickerState::SelectingScreen;
                Ok(Transition::Continue)
            }
            PickerAction::Commit if self.can_commit() => {
                let Some(id) = self.selected.clone() else {
                    return Err(self.invalid(&PickerAction::Commit));
                };
                self.state = PickerState::Submitted;
                Ok(Transition::Submitted(StreamPick {
                    id,
                    settings: self.settings.clone(),
                }))
            }
            other => Err(self.invalid(&other)),
        }
    }

    fn edit(&mut self, edit: SettingsEdit) {
        match edit {
            SettingsEdit::Resolution(resolution) => self.settings.resolution = resolution,
            SettingsEdit::FrameRate(frame_rate) => self.settings.frame_rate = frame_rate,
            SettingsEdit::Audio(audio) => self.settings.audio = audio,
            SettingsEdit::ContentHint(hint) => self.settings.content_hint = Some(hint),
            SettingsEdit::Workaround(on) => self.settings.workaround = Some(on),
            SettingsEdit::OnlyDefaultSpeakers(on) => self.settings.only_default_speakers = Some(on),
        }
    }

    fn invalid(&self, action: &PickerAction) -> ShareError {
        ShareError::InvalidTransition {
            state: self.state,
            action: action.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> Vec<Source> {
        vec![
            Source {
                id: "screen:0:0".to_string(),
                name: "Entire Screen".to_string(),
                url: "data:image/png;base64,AAAA".to_string(),
            },
            Source {
                id: "window:42:0".to_string(),
                name: "Terminal".to_string(),
                url: "data:image/png;base64,BBBB".to_string(),
            },
        ]
    }

    fn prefixes() -> Vec<String> {
        DEFAULT_PREFERRED_SOURCE_PREFIXES
            .iter()
            .map(|p| p.to_string())
            .collect()
    }

    fn workflow(skip_picker: bool) -> PickerWorkflow {
        PickerWorkflow::new(sources(), skip_picker, StreamSettings::default(), &prefixes())
            .unwrap()
    }

    #[test]
    fn test_starts_selecting() {
        let flow = workflow(false);
        assert_eq!(flow.state(), PickerState::SelectingScreen);
        assert!(!flow.can_commit());
        assert!(!flow.can_go_back());
    }

    #[test]
    fn test_select_then_commit() {
        let mut flow = workflow(false);
        assert_eq!(
            flow.apply(PickerAction::SelectSource("window:42:0".to_string()))
                .unwrap(),
            Transition::Continue
        );
        assert_eq!(flow.state(), PickerState::ConfiguringSettings);

        flow.apply(PickerAction::Edit(SettingsEdit::Resolution(Resolution::P1080)))
            .unwrap();
        flow.apply(PickerAction::Edit(SettingsEdit::Audio(false)))
            .unwrap();

        match flow.apply(PickerAction::Commit).unwrap() {
            Transition::Submitted(pick) => {
                assert_eq!(pick.id, "window:42:0");
                assert_eq!(pick.settings.resolution, Resolution::P1080);
                assert_eq!(pick.settings.frame_rate, FrameRate::Fps60);
                assert!(!pick.settings.audio);
            }
            other => panic!("unexpected transition: {:?}", other),
        }
        assert_eq!(flow.state(), PickerState::Submitted);
    }

    #[test]
    fn test_unknown_source_rejected() {
        let mut flow = workflow(false);
        let err = flow
            .apply(PickerAction::SelectSource("window:1:0".to_string()))
            .unwrap_err();
        assert!(matches!(err, ShareError::UnknownSource(_)));
        assert_eq!(flow.state(), PickerState::SelectingScreen);
    }

    #[test]
    fn test_commit_requires_selection() {
        let mut flow = workflow(false);
        let err = flow.apply(PickerAction::Commit).unwrap_err();
        assert!(matches!(
            err,
            ShareError::InvalidTransition {
                state: PickerState::SelectingScreen,
                action: "commit"
            }
        ));
    }

    #[test]
    fn test_back_returns_to_selection() {
        let mut flow = workflow(false);
        flow.apply(PickerAction::SelectSource("screen:0:0".to_string()))
            .unwrap();
        flow.apply(PickerAction::Edit(SettingsEdit::FrameRate(FrameRate::Fps30)))
            .unwrap();
        assert!(flow.can_go_back());

        assert_eq!(flow.apply(PickerAction::Back).unwrap(), Transition::Continue);
        assert_eq!(flow.state(), PickerState::SelectingScreen);
        assert!(flow.selected_id().is_none());
        // Edits survive going back
        assert_eq!(flow.settings().frame_rate, FrameRate::Fps30);
    }

    #[test]
    fn test_skip_picker_has_no_back() {
        let mut flow = workflow(true);
        assert_eq!(flow.state(), PickerState::ConfiguringSettings);
        assert_eq!(flow.selected_id(), Some("screen:0:0"));
        assert!(!flow.view(None).can_go_back);

        assert!(flow.apply(PickerAction::Back).is_err());
        assert_eq!(flow.state(), PickerState::ConfiguringSettings);
    }

    #[test]
    fn test_skip_picker_without_sources() {
        let err = PickerWorkflow::new(Vec::new(), true, StreamSettings::default(), &prefixes())
            .unwrap_err();
        assert!(matches!(err, ShareError::NoSources));
    }

    #[test]
    fn test_capture_app_is_preselected() {
        let mut list = sources();
        list.push(Source {
            id: "window:7:0".to_string(),
            name: "OBS 30.1.2 - Profile: Untitled".to_string(),
            url: String::new(),
        });

        let flow =
            PickerWorkflow::new(list, false, StreamSettings::default(), &prefixes()).unwrap();
        assert_eq!(flow.selected_id(), Some("window:7:0"));
        assert_eq!(flow.state(), PickerState::ConfiguringSettings);
        assert!(flow.can_go_back());
    }

    #[test]
    fn test_cancel_and_close() {
        let mut flow = workflow(false);
        assert_eq!(flow.apply(PickerAction::Cancel).unwrap(), Transition::Cancelled);
        assert_eq!(flow.state(), PickerState::Cancelled);
        assert!(flow.apply(PickerAction::Commit).is_err());

        let mut flow = workflow(true);
        assert_eq!(
            flow.apply(PickerAction::CloseRequested).unwrap(),
            Transition::Cancelled
        );
    }

    #[test]
    fn test_no_actions_after_submit() {
        let mut flow = workflow(true);
        flow.apply(PickerAction::Commit).unwrap();
        assert!(flow.apply(PickerAction::Cancel).is_err());
        assert_eq!(flow.state(), PickerState::Submitted);
    }

    #[test]
    fn test_edits_only_while_configuring() {
        let mut flow = workflow(false);
        assert!(flow
            .apply(PickerAction::Edit(SettingsEdit::Audio(false)))
            .is_err());

        flow.apply(PickerAction::SelectSource("screen:0:0".to_string()))
            .unwrap();
        flow.apply(PickerAction::Edit(SettingsEdit::ContentHint(ContentHint::Detail)))
            .unwrap();
        flow.apply(PickerAction::Edit(SettingsEdit::Workaround(true)))
            .unwrap();
        flow.apply(PickerAction::Edit(SettingsEdit::OnlyDefaultSpeakers(true)))
            .unwrap();

        let view = flow.view(Some("file:///tmp/thumb.png".to_string()));
        assert_eq!(view.settings.content_hint, Some(ContentHint::Detail));
        assert_eq!(view.settings.workaround, Some(true));
        assert_eq!(view.settings.only_default_speakers, Some(true));
        assert_eq!(view.selected.unwrap().name, "Entire Screen");
        assert!(view.can_commit);
    }
}
