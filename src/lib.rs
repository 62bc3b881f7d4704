// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! HomeWatch - home hazard and front-door watch service
//!
//! Two camera pipelines run side by side:
//! - a hazard pipeline that classifies fire and smoke and raises debounced
//!   alerts,
//! - an identity pipeline that names faces at the front door and announces
//!   each visitor once per window.
//!
//! Annotated frames are served to viewers as MJPEG; alerts and activity go
//! to WebSocket subscribers (and optionally MQTT). New people are enrolled
//! at runtime by uploading a reference photo.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       HomeWatch Engine                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────┐  ┌───────────┐  ┌──────────┐  ┌─────────────┐   │
//! │  │ Capture │→ │ Inference │→ │ Alerting │→ │ Dispatcher  │   │
//! │  └─────────┘  └───────────┘  └──────────┘  └─────────────┘   │
//! │       ↓             ↑                             ↓          │
//! │  ┌─────────┐  ┌────────────┐               ┌─────────────┐   │
//! │  │  MJPEG  │  │ Enrollment │ ←──────────── │  WebSocket  │   │
//! │  │ viewers │  └────────────┘               │    MQTT     │   │
//! │  └─────────┘                               └─────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod alerting;
pub mod capture;
pub mod config;
pub mod core;
pub mod enrollment;
pub mod error;
pub mod inference;
pub mod pipeline;
pub mod streaming;

// Re-exports for convenience
pub use config::Config;
pub use core::{Engine, NotificationDispatcher};
pub use enrollment::EnrollmentService;
pub use pipeline::Pipeline;

/// HomeWatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// HomeWatch name
pub const NAME: &str = "HomeWatch";
