//! Seams for the document renderer and the verification image encoder.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("markup could not be parsed: {message}")]
    Markup { message: String },
    #[error("embedded image is not usable: {message}")]
    Image { message: String },
    #[error("document assembly failed: {message}")]
    Document { message: String },
}

impl RenderError {
    pub fn markup(message: impl Into<String>) -> Self {
        Self::Markup {
            message: message.into(),
        }
    }

    pub fn image(message: impl Into<String>) -> Self {
        Self::Image {
            message: message.into(),
        }
    }

    pub fn document(message: impl Into<String>) -> Self {
        Self::Document {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    #[error("image size {size} cannot hold the encoded payload")]
    InvalidSize { size: u32 },
    #[error("payload cannot be encoded: {message}")]
    Payload { message: String },
    #[error("image serialization failed: {message}")]
    Image { message: String },
}

/// Converts markup into PDF bytes.
///
/// Implementations must be deterministic for a given input and must fail
/// with [`RenderError`] rather than emit a partial document.
pub trait ContentRenderer: Send + Sync {
    fn render(&self, html: &str) -> Result<Vec<u8>, RenderError>;
}

/// Encodes a URL as a square machine-readable PNG, returned as a
/// `data:image/png;base64,` URI.
pub trait ImageEncoder: Send + Sync {
    fn encode(&self, url: &str, size: u32) -> Result<String, EncodeError>;
}

/// Run `renderer` on the blocking pool and record its latency.
pub async fn render_off_thread(
    renderer: Arc<dyn ContentRenderer>,
    html: String,
) -> Result<Vec<u8>, RenderError> {
    let started = Instant::now();
    let result = tokio::task::spawn_blocking(move || renderer.render(&html))
        .await
        .map_err(|err| RenderError::document(format!("render task aborted: {err}")))?;
    metrics::histogram!("certify_render_ms").record(started.elapsed().as_secs_f64() * 1000.0);
    result
}
