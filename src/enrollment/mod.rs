// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Enrollment of new reference identities
//!
//! `enroll` decodes the image, stores it as `<name>.jpg` in the reference
//! root and rebuilds the identity store before returning, so a caller can
//! rely on the new person being recognized on the next frame.

use base64::Engine as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::capture::decode_frame;
use crate::error::EnrollError;
use crate::inference::{IdentityAdapter, ReloadReport};
use crate::streaming::FrameEncoder;

/// A stored reference image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    pub name: String,
    pub path: PathBuf,
    /// `None` when no rebuild ran
    pub reload: Option<ReloadReport>,
}

pub struct EnrollmentService {
    images_dir: PathBuf,
    adapter: Option<Arc<dyn IdentityAdapter>>,
    encoder: FrameEncoder,
    /// One enrollment (write + rebuild) at a time
    lock: Mutex<()>,
}

impl EnrollmentService {
    /// `adapter` is `None` when face identification failed to start; images
    /// are then stored but nothing is rebuilt.
    pub fn new(images_dir: PathBuf, adapter: Option<Arc<dyn IdentityAdapter>>, encoder: FrameEncoder) -> Self {
        Self {
            images_dir,
            adapter,
            encoder,
            lock: Mutex::new(()),
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Store `image_bytes` (any supported still format) under `name`
    pub async fn enroll(&self, name: &str, image_bytes: &[u8]) -> Result<Enrollment, EnrollError> {
        let file_name = reference_file_name(name)?;
        let image = decode_frame(image_bytes).map_err(|e| EnrollError::DecodeError(e.to_string()))?;
        let jpeg = self.encoder.encode_jpeg(&image)?;

        let _guard = self.lock.lock().await;

        tokio::fs::create_dir_all(&self.images_dir).await?;
        let path = self.images_dir.join(&file_name);
        write_atomically(&path, &jpeg).await?;
        info!("Saved reference image for {} at {:?}", name.trim(), path);

        let reload = match &self.adapter {
            Some(adapter) => {
                let adapter = adapter.clone();
                let dir = self.images_dir.clone();
                match tokio::task::spawn_blocking(move || adapter.load_references(&dir)).await {
                    Ok(Ok(report)) => Some(report),
                    Ok(Err(e)) => {
                        warn!("Reference rebuild failed, previous identities stay active: {}", e);
                        None
                    }
                    Err(e) => {
                        warn!("Reference rebuild aborted: {}", e);
                        None
                    }
                }
            }
            None => {
                warn!("Face identification unavailable; {} saved without rebuilding references", name.trim());
                None
            }
        };

        Ok(Enrollment {
            name: name.trim().to_string(),
            path,
            reload,
        })
    }

    /// Enroll from a `data:image/...;base64,<payload>` URI
    pub async fn enroll_data_uri(&self, name: &str, data_uri: &str) -> Result<Enrollment, EnrollError> {
        let bytes = decode_data_uri(data_uri)?;
        self.enroll(name, &bytes).await
    }
}

/// Base64 payload after the first comma of a data URI
pub fn decode_data_uri(data_uri: &str) -> Result<Vec<u8>, EnrollError> {
    let (_, payload) = data_uri
        .split_once(',')
        .ok_or_else(|| EnrollError::MalformedPayload("expected a data URI".into()))?;

    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| EnrollError::MalformedPayload(e.to_string()))
}

/// `"Jane Doe"` -> `"Jane_Doe.jpg"`
pub fn reference_file_name(name: &str) -> Result<String, EnrollError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(EnrollError::InvalidName);
    }

    let mut file_name = String::with_capacity(trimmed.len() + 4);
    let mut in_gap = false;
    for c in trimmed.chars() {
        if c.is_whitespace() || c == '/' || c == '\\' {
            if !in_gap {
                file_name.push('_');
            }
            in_gap = true;
        } else {
            file_name.push(c);
            in_gap = false;
        }
    }
    file_name.push_str(".jpg");
    Ok(file_name)
}

/// Write via a sibling temp file so a failure leaves no partial image
async fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));

    if let Err(e) = tokio::fs::write(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}
