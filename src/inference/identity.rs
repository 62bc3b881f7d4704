// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Face identification against a directory of reference images
//!
//! The reference set is immutable once built. A reload builds a complete new
//! [`ReferenceIdentityStore`] and then swaps the shared `Arc`, so a frame in
//! flight keeps whichever store it started with.

use image::imageops::{self, FilterType};
use parking_lot::RwLock;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{BoundingBox, FaceEncoder, FaceEncoding, FaceObservation, UNKNOWN_NAME};
use crate::capture::{is_image_file, Frame};
use crate::config::IdentityConfig;
use crate::error::{AdapterInitError, ReferenceError};

/// Named encodings, one per usable reference image
#[derive(Debug, Clone, Default)]
pub struct ReferenceIdentityStore {
    names: Vec<String>,
    encodings: Vec<FaceEncoding>,
}

/// Outcome of one store rebuild
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub loaded: usize,
    pub skipped: Vec<PathBuf>,
}

impl ReferenceIdentityStore {
    /// Encode every image under `dir`. Images without a usable face are
    /// logged and left out.
    pub fn build(dir: &Path, encoder: &dyn FaceEncoder) -> Result<(Self, ReloadReport), AdapterInitError> {
        let root_error = |source| AdapterInitError::ReferenceRoot {
            path: dir.to_path_buf(),
            source,
        };

        std::fs::create_dir_all(dir).map_err(root_error)?;

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(root_error)? {
            let path = entry.map_err(root_error)?.path();
            if path.is_file() && is_image_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let results: Vec<_> = paths
            .par_iter()
            .map(|path| encode_reference(path, encoder).map_err(|e| (path.clone(), e)))
            .collect();

        let mut store = Self::default();
        let mut report = ReloadReport::default();

        for result in results {
            match result {
                Ok((name, encoding)) => {
                    debug!("Reference loaded: {}", name);
                    store.names.push(name);
                    store.encodings.push(encoding);
                    report.loaded += 1;
                }
                Err((path, e)) => {
                    warn!("Skipping reference image: {}", e);
                    report.skipped.push(path);
                }
            }
        }

        if store.is_empty() {
            warn!("No usable reference images in {:?}; every face will be {}", dir, UNKNOWN_NAME);
        }

        Ok((store, report))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Nearest reference within `tolerance`, else the unknown sentinel
    pub fn identify(&self, encoding: &FaceEncoding, tolerance: f32) -> &str {
        self.encodings
            .iter()
            .zip(&self.names)
            .map(|(reference, name)| (reference.distance(encoding), name))
            .filter(|(distance, _)| *distance <= tolerance)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, name)| name.as_str())
            .unwrap_or(UNKNOWN_NAME)
    }
}

fn encode_reference(path: &Path, encoder: &dyn FaceEncoder) -> Result<(String, FaceEncoding), ReferenceError> {
    let unreadable = |reason: String| ReferenceError::Unreadable {
        path: path.to_path_buf(),
        reason,
    };

    // Enrollment stores "Jane Doe" as Jane_Doe.jpg
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| unreadable("file name is not valid UTF-8".into()))?
        .replace('_', " ");

    let image = image::open(path).map_err(|e| unreadable(e.to_string()))?.to_rgb8();

    // The largest face in a reference photo is the person
    let encoding = encoder
        .locate(&image)
        .into_iter()
        .max_by_key(BoundingBox::area)
        .and_then(|face| encoder.encode(&image, &face))
        .ok_or_else(|| ReferenceError::EncodingMissing {
            path: path.to_path_buf(),
        })?;

    Ok((name, encoding))
}

/// Face identification engine
pub trait IdentityAdapter: Send + Sync {
    /// Rebuild the reference set from `dir` and publish it
    fn load_references(&self, dir: &Path) -> Result<ReloadReport, AdapterInitError>;

    /// Faces in `frame`, left to right, each named or "Unknown"
    fn detect(&self, frame: &Frame) -> Vec<FaceObservation>;
}

/// Matches located faces against the current reference store
pub struct FaceRecognizer {
    encoder: Arc<dyn FaceEncoder>,
    store: RwLock<Arc<ReferenceIdentityStore>>,
    tolerance: f32,
    frame_resizing: f32,
}

impl FaceRecognizer {
    /// Build a recognizer with an empty store
    pub fn new(encoder: Arc<dyn FaceEncoder>, config: &IdentityConfig) -> Result<Self, AdapterInitError> {
        if !(config.frame_resizing > 0.0 && config.frame_resizing <= 1.0) {
            return Err(AdapterInitError::InvalidSetting {
                setting: "frame_resizing",
                reason: format!("{} is outside (0, 1]", config.frame_resizing),
            });
        }
        if !(config.tolerance > 0.0) {
            return Err(AdapterInitError::InvalidSetting {
                setting: "tolerance",
                reason: format!("{} must be positive", config.tolerance),
            });
        }

        Ok(Self {
            encoder,
            store: RwLock::new(Arc::new(ReferenceIdentityStore::default())),
            tolerance: config.tolerance,
            frame_resizing: config.frame_resizing,
        })
    }

    /// Build a recognizer and load `config.images_dir`
    pub fn load(encoder: Arc<dyn FaceEncoder>, config: &IdentityConfig) -> Result<Self, AdapterInitError> {
        let recognizer = Self::new(encoder, config)?;
        recognizer.load_references(&config.images_dir)?;
        Ok(recognizer)
    }

    /// The store currently published
    pub fn store(&self) -> Arc<ReferenceIdentityStore> {
        self.store.read().clone()
    }

    fn downscale(&self, frame: &Frame) -> Option<Frame> {
        if self.frame_resizing >= 1.0 {
            return None;
        }
        let width = ((frame.width() as f32 * self.frame_resizing).round() as u32).max(1);
        let height = ((frame.height() as f32 * self.frame_resizing).round() as u32).max(1);
        Some(imageops::resize(frame, width, height, FilterType::Triangle))
    }
}

impl IdentityAdapter for FaceRecognizer {
    fn load_references(&self, dir: &Path) -> Result<ReloadReport, AdapterInitError> {
        let (store, report) = ReferenceIdentityStore::build(dir, self.encoder.as_ref())?;
        *self.store.write() = Arc::new(store);

        info!(
            "Reference store published: {} identities, {} skipped",
            report.loaded,
            report.skipped.len()
        );
        Ok(report)
    }

    fn detect(&self, frame: &Frame) -> Vec<FaceObservation> {
        // One snapshot per frame
        let store = self.store();

        let small = self.downscale(frame);
        let (located, scale) = match &small {
            Some(small) => (self.encoder.locate(small), 1.0 / self.frame_resizing),
            None => (self.encoder.locate(frame), 1.0),
        };

        located
            .into_iter()
            .map(|face| {
                let bbox = face.scaled(scale, frame.width(), frame.height());
                let name = self
                    .encoder
                    .encode(frame, &bbox)
                    .map(|encoding| store.identify(&encoding, self.tolerance).to_string())
                    .unwrap_or_else(|| UNKNOWN_NAME.to_string());
                FaceObservation { bbox, name }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{draw_face, FacePattern};
    use crate::inference::SkinToneEncoder;
    use image::Rgb;
    use tempfile::TempDir;

    fn portrait(pattern: FacePattern) -> Frame {
        let mut frame = Frame::from_pixel(320, 240, Rgb([40, 40, 40]));
        draw_face(&mut frame, 96, 64, 128, 128, pattern);
        frame
    }

    fn recognizer() -> FaceRecognizer {
        FaceRecognizer::new(Arc::new(SkinToneEncoder::default()), &IdentityConfig::default()).unwrap()
    }

    #[test]
    fn test_empty_root_is_created_and_everyone_unknown() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("images");
        let recognizer = recognizer();

        let report = recognizer.load_references(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(report.loaded, 0);

        let faces = recognizer.detect(&portrait(FacePattern::Horizontal));
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].name, UNKNOWN_NAME);
    }

    #[test]
    fn test_reference_without_face_is_skipped() {
        let tmp = TempDir::new().unwrap();
        portrait(FacePattern::Horizontal).save(tmp.path().join("Alice.png")).unwrap();
        Frame::from_pixel(64, 64, Rgb([40, 40, 40]))
            .save(tmp.path().join("Blank.png"))
            .unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(tmp.path().join("Broken.jpg"), "not an image").unwrap();

        let recognizer = recognizer();
        let report = recognizer.load_references(tmp.path()).unwrap();

        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(recognizer.store().names(), ["Alice".to_string()]);
    }

    #[test]
    fn test_recognizes_near_duplicate_and_rejects_stranger() {
        let tmp = TempDir::new().unwrap();
        portrait(FacePattern::Horizontal).save(tmp.path().join("Jane_Doe.png")).unwrap();

        let recognizer = recognizer();
        recognizer.load_references(tmp.path()).unwrap();

        let mut near = Frame::from_pixel(320, 240, Rgb([42, 38, 40]));
        draw_face(&mut near, 100, 64, 124, 128, FacePattern::Horizontal);
        let faces = recognizer.detect(&near);
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].name, "Jane Doe");
        assert!(faces[0].is_known());

        let stranger = recognizer.detect(&portrait(FacePattern::Vertical));
        assert_eq!(stranger[0].name, UNKNOWN_NAME);
    }

    #[test]
    fn test_reload_swaps_whole_store() {
        let old_dir = TempDir::new().unwrap();
        let new_dir = TempDir::new().unwrap();
        portrait(FacePattern::Horizontal).save(old_dir.path().join("Old.png")).unwrap();
        portrait(FacePattern::Horizontal).save(new_dir.path().join("New_A.png")).unwrap();
        portrait(FacePattern::Vertical).save(new_dir.path().join("New_B.png")).unwrap();

        let recognizer = Arc::new(recognizer());
        recognizer.load_references(old_dir.path()).unwrap();
        let before = recognizer.store();

        std::thread::scope(|scope| {
            let reader = recognizer.clone();
            scope.spawn(move || {
                for _ in 0..200 {
                    let names = reader.store().names().to_vec();
                    let old = names == ["Old".to_string()];
                    let new = names == ["New A".to_string(), "New B".to_string()];
                    assert!(old || new, "observed partial store {:?}", names);
                }
            });

            for i in 0..10 {
                let dir = if i % 2 == 0 { new_dir.path() } else { old_dir.path() };
                recognizer.load_references(dir).unwrap();
            }
        });

        // A snapshot taken earlier is untouched by later reloads
        assert_eq!(before.names(), ["Old".to_string()]);
    }

    #[test]
    fn test_invalid_resizing_fails_init() {
        let config = IdentityConfig {
            frame_resizing: 0.0,
            ..IdentityConfig::default()
        };
        assert!(FaceRecognizer::new(Arc::new(SkinToneEncoder::default()), &config).is_err());
    }
}
