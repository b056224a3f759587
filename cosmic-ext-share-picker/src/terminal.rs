//! Terminal Picker
//!
//! Line-based [`PickerUi`] for the terminal. The dialog is printed to the
//! writer (stderr in the binary) and commands are read one per line:
//!
//! | Command | Effect |
//! |---------|--------|
//! | `<n>` / `select <n or id>` | pick a source |
//! | `res <480..2160>` | resolution |
//! | `fps <15/30/60>` | frame rate |
//! | `audio on/off` | share audio |
//! | `hint motion/detail` | content hint |
//! | `workaround on/off` | virtual mic workaround |
//! | `speakers on/off` | only default speakers |
//! | `back` / `share` / `cancel` | navigation |

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use cosmic_ext_share_core::picker::{PickerAction, PickerState, PickerUi, PickerView, SettingsEdit};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Picker dialog over a line reader and a writer
pub struct TerminalPicker<R, W> {
    input: R,
    output: W,
    view: Option<PickerView>,
}

impl<R, W> TerminalPicker<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            view: None,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    async fn write(&mut self, text: &str) {
        let result = async {
            self.output.write_all(text.as_bytes()).await?;
            self.output.flush().await
        }
        .await;
        if let Err(e) = result {
            warn!("Failed to write to terminal: {}", e);
        }
    }
}

#[async_trait]
impl<R, W> PickerUi for TerminalPicker<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn present(&mut self, view: PickerView) {
        let text = render(&view);
        self.view = Some(view);
        self.write(&text).await;
    }

    async fn next_action(&mut self) -> Option<PickerAction> {
        loop {
            self.write("> ").await;

            let mut line = String::new();
            match self.input.read_line(&mut line).await {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to read from terminal: {}", e);
                    return None;
                }
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let parsed = match &self.view {
                Some(view) => parse_command(line, view),
                None => Err(anyhow!("picker is not shown")),
            };
            match parsed {
                Ok(action) => {
                    debug!("Terminal action: {:?}", action);
                    return Some(action);
                }
                Err(e) => self.write(&format!("{}\n", e)).await,
            }
        }
    }

    async fn close(&mut self) {
        self.view = None;
        self.write("\n").await;
    }
}

/// Turn one input line into a picker action
pub fn parse_command(line: &str, view: &PickerView) -> Result<PickerAction> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default().to_lowercase();
    let argument = words.next();

    if command.parse::<usize>().is_ok() {
        return select(&command, view);
    }

    let action = match command.as_str() {
        "select" | "s" => select(required(argument, "select")?, view)?,
        "res" | "resolution" => PickerAction::Edit(SettingsEdit::Resolution(
            required(argument, "res")?
                .parse()
                .map_err(|e| anyhow!("{}", e))?,
        )),
        "fps" => PickerAction::Edit(SettingsEdit::FrameRate(
            required(argument, "fps")?
                .parse()
                .map_err(|e| anyhow!("{}", e))?,
        )),
        "hint" => PickerAction::Edit(SettingsEdit::ContentHint(
            required(argument, "hint")?
                .parse()
                .map_err(|e| anyhow!("{}", e))?,
        )),
        "audio" => PickerAction::Edit(SettingsEdit::Audio(switch(argument, "audio")?)),
        "workaround" => {
            PickerAction::Edit(SettingsEdit::Workaround(switch(argument, "workaround")?))
        }
        "speakers" => PickerAction::Edit(SettingsEdit::OnlyDefaultSpeakers(switch(
            argument, "speakers",
        )?)),
        "back" | "b" => PickerAction::Back,
        "share" | "commit" => PickerAction::Commit,
        "cancel" | "quit" | "q" => PickerAction::Cancel,
        other => bail!("Unknown command '{}'", other),
    };

    Ok(action)
}

fn required<'a>(argument: Option<&'a str>, command: &str) -> Result<&'a str> {
    argument.ok_or_else(|| anyhow!("'{}' needs a value", command))
}

fn switch(argument: Option<&str>, command: &str) -> Result<bool> {
    match required(argument, command)?.to_lowercase().as_str() {
        "on" | "yes" | "true" | "1" => Ok(true),
        "off" | "no" | "false" | "0" => Ok(false),
        other => bail!("'{}' expects on/off, got '{}'", command, other),
    }
}

/// Source by 1-based position or by id
fn select(target: &str, view: &PickerView) -> Result<PickerAction> {
    if let Ok(index) = target.parse::<usize>() {
        let source = index
            .checked_sub(1)
            .and_then(|i| view.sources.get(i))
            .ok_or_else(|| anyhow!("No source number {}", index))?;
        return Ok(PickerAction::SelectSource(source.id.clone()));
    }
    Ok(PickerAction::SelectSource(target.to_string()))
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn render(view: &PickerView) -> String {
    let mut text = String::new();

    match view.state {
        PickerState::SelectingScreen => {
            text.push_str("\nChoose what to share:\n");
            for (i, source) in view.sources.iter().enumerate() {
                text.push_str(&format!("  {}) {} [{}]\n", i + 1, source.name, source.id));
            }
            text.push_str("Type a number, or 'cancel'\n");
        }
        PickerState::ConfiguringSettings => {
            if let Some(source) = &view.selected {
                text.push_str(&format!("\nSharing: {}\n", source.name));
            }
            if let Some(thumbnail) = &view.thumbnail {
                text.push_str(&format!("Preview: {}\n", thumbnail));
            }

            let settings = &view.settings;
            text.push_str(&format!("  Resolution:  {}p\n", settings.resolution));
            text.push_str(&format!("  Frame rate:  {} fps\n", settings.frame_rate));
            text.push_str(&format!("  Audio:       {}\n", on_off(settings.audio)));
            if let Some(hint) = settings.content_hint {
                text.push_str(&format!("  Content:     {}\n", hint.as_str()));
            }
            if settings.audio {
                text.push_str(&format!(
                    "  Workaround:  {}\n",
                    on_off(settings.workaround.unwrap_or(false))
                ));
                text.push_str(&format!(
                    "  Speakers:    {}\n",
                    if settings.only_default_speakers.unwrap_or(false) {
                        "default only"
                    } else {
                        "all"
                    }
                ));
            }

            let mut commands = vec!["res", "fps", "audio", "hint", "share", "cancel"];
            if view.can_go_back {
                commands.insert(4, "back");
            }
            text.push_str(&format!("Commands: {}\n", commands.join(", ")));
        }
        PickerState::Submitted | PickerState::Cancelled => {}
    }

    text
}
