// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Error taxonomy shared by the capture, inference and enrollment layers

use std::path::PathBuf;
use thiserror::Error;

/// Failures of a single capture source. Both variants are retried by the
/// owning pipeline and never reach subscribers.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera {index} unavailable: {reason}")]
    SourceUnavailable { index: u32, reason: String },

    #[error("failed to read frame from camera {index}: {reason}")]
    FrameReadFailure { index: u32, reason: String },
}

/// A frame or face crop could not be turned into JPEG bytes.
#[derive(Debug, Error)]
#[error("frame encoding failed: {0}")]
pub struct EncodeError(#[from] pub image::ImageError);

/// An inference adapter could not start. The affected feature is disabled;
/// raw video keeps streaming.
#[derive(Debug, Error)]
pub enum AdapterInitError {
    #[error("invalid detector setting `{setting}`: {reason}")]
    InvalidSetting { setting: &'static str, reason: String },

    #[error("reference image root {path:?} unusable: {source}")]
    ReferenceRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Problems with one reference image while rebuilding the identity store.
/// They skip the image, never the whole rebuild.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("no face found in reference image {path:?}")]
    EncodingMissing { path: PathBuf },

    #[error("reference image {path:?} unreadable: {reason}")]
    Unreadable { path: PathBuf, reason: String },
}

/// Errors reported back to the caller of an enrollment request.
#[derive(Debug, Error)]
pub enum EnrollError {
    #[error("person name must not be empty")]
    InvalidName,

    #[error("malformed image payload: {0}")]
    MalformedPayload(String),

    #[error("failed to decode image: {0}")]
    DecodeError(String),

    #[error("failed to store reference image: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}
