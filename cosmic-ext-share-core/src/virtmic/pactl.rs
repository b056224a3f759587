//! PipeWire virtual microphone through `pactl`
//!
//! Uses the PulseAudio compatibility layer of PipeWire:
//!
//! - a `module-null-sink` per device label; applications route their audio
//!   into the sink and its monitor becomes the microphone
//! - with the workaround flag, an extra `module-remap-source` on top of the
//!   monitor, for clients that hide monitor sources from their device list
//!
//! Loaded module ids are remembered so `stop` unloads exactly what `start`
//! created. Starting twice replaces the previous device; stopping with
//! nothing loaded does nothing. An unreachable sound server shows up as a
//! `start` error.

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::VirtualMicBackend;
use crate::{Result, ShareError};

/// Virtual microphone backed by PipeWire's pulse modules
#[derive(Debug, Default)]
pub struct PactlVirtualMic {
    modules: Mutex<Vec<u32>>,
}

impl PactlVirtualMic {
    pub fn new() -> Self {
        Self::default()
    }

    async fn load_module(args: &[String]) -> Result<u32> {
        debug!("pactl load-module {}", args.join(" "));
        let output = Command::new("pactl")
            .arg("load-module")
            .args(args)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ShareError::VirtualMic(format!(
                "load-module {} failed: {}",
                args.first().map(String::as_str).unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_module_id(&String::from_utf8_lossy(&output.stdout))
    }

    async fn unload_module(id: u32) -> Result<()> {
        debug!("pactl unload-module {}", id);
        let output = Command::new("pactl")
            .arg("unload-module")
            .arg(id.to_string())
            .output()
            .await?;

        if !output.status.success() {
            return Err(ShareError::VirtualMic(format!(
                "unload-module {} failed: {}",
                id,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn unload_all(modules: &mut Vec<u32>) -> Result<()> {
        let mut first_error = None;
        while let Some(id) = modules.pop() {
            if let Err(e) = Self::unload_module(id).await {
                warn!("Failed to unload module {}: {}", id, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl VirtualMicBackend for PactlVirtualMic {
    async fn start(&self, device_labels: Vec<String>, workaround: bool) -> Result<()> {
        let mut modules = self.modules.lock().await;
        if !modules.is_empty() {
            debug!("Virtual microphone already running, recreating it");
            Self::unload_all(&mut modules).await?;
        }

        for label in &device_labels {
            let id = Self::load_module(&null_sink_args(label)).await?;
            modules.push(id);

            if workaround {
                let id = Self::load_module(&remap_source_args(label)).await?;
                modules.push(id);
            }
        }

        info!(
            "Virtual microphone ready ({} modules loaded for {:?})",
            modules.len(),
            device_labels
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut modules = self.modules.lock().await;
        if modules.is_empty() {
            debug!("Virtual microphone not running");
            return Ok(());
        }

        Self::unload_all(&mut modules).await?;
        info!("Virtual microphone stopped");
        Ok(())
    }
}

fn null_sink_args(label: &str) -> Vec<String> {
    vec![
        "module-null-sink".to_string(),
        format!("sink_name={}", label),
        format!("sink_properties=device.description={}", label),
    ]
}

fn remap_source_args(label: &str) -> Vec<String> {
    vec![
        "module-remap-source".to_string(),
        format!("master={}.monitor", label),
        format!("source_name={}-mic", label),
        format!("source_properties=device.description={}-mic", label),
    ]
}

fn parse_module_id(stdout: &str) -> Result<u32> {
    stdout
        .trim()
        .parse()
        .map_err(|_| ShareError::VirtualMic(format!("unexpected pactl output: {:?}", stdout.trim())))
}
