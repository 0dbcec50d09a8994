//! Error types for data loading and map rendering.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while fetching and decoding city records.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("data endpoint {url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed CSV payload: {0}")]
    Csv(#[from] csv::Error),

    #[error("unsupported data format: {0}")]
    UnsupportedFormat(String),
}

/// Errors reported by a map widget.
#[derive(Error, Debug)]
pub enum WidgetError {
    #[error("invalid container id: {0:?}")]
    InvalidContainer(String),

    #[error("invalid style document: {0}")]
    InvalidStyle(String),

    #[error("source {0:?} is already registered")]
    DuplicateSource(String),

    #[error("layer {layer:?} references unknown source {source_id:?}")]
    UnknownSource { layer: String, source_id: String },

    #[error("layer {0:?} is already registered")]
    DuplicateLayer(String),

    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the map renderer lifecycle.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("map construction failed: {0}")]
    Construct(#[source] WidgetError),

    #[error("failed to attach point layer: {0}")]
    Attach(#[source] WidgetError),

    #[error("map renderer has been disposed")]
    Disposed,
}
