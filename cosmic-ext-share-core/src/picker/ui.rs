//! Dialog and thumbnail boundaries of the picker

use async_trait::async_trait;
use std::collections::HashMap;

use super::{PickerAction, PickerView};
use crate::settings::Source;
use crate::{Result, ShareError};

/// Dialog that renders the picker and reports user actions
#[async_trait]
pub trait PickerUi: Send {
    /// Show (or refresh) the dialog with `view`
    async fn present(&mut self, view: PickerView);

    /// Next user action; `None` once the dialog is gone
    async fn next_action(&mut self) -> Option<PickerAction>;

    /// Dismiss the dialog
    async fn close(&mut self);
}

/// Provides large previews for the settings step
#[async_trait]
pub trait ThumbnailProvider: Send + Sync {
    /// URL of a large thumbnail for `source_id`
    async fn large_thumbnail(&self, source_id: &str) -> Result<String>;
}

/// Serves each source's own preview URL
#[derive(Debug, Clone, Default)]
pub struct StaticThumbnails {
    urls: HashMap<String, String>,
}

impl StaticThumbnails {
    pub fn new(sources: &[Source]) -> Self {
        Self {
            urls: sources
                .iter()
                .map(|s| (s.id.clone(), s.url.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl ThumbnailProvider for StaticThumbnails {
    async fn large_thumbnail(&self, source_id: &str) -> Result<String> {
        self.urls
            .get(source_id)
            .cloned()
            .ok_or_else(|| ShareError::Thumbnail(format!("no preview for {}", source_id)))
    }
}
