// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Identity deduplication

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::trace;

/// Suppresses repeat sightings of a name within a window anchored at the
/// most recent new sighting.
///
/// Call [`DedupWindow::begin_frame`] once per frame, then
/// [`DedupWindow::admit`] for each name in that frame.
#[derive(Debug)]
pub struct DedupWindow {
    window: Duration,
    anchor: Option<DateTime<Utc>>,
    seen: HashMap<String, DateTime<Utc>>,
}

impl DedupWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            anchor: None,
            seen: HashMap::new(),
        }
    }

    /// Forget every name once the window has lapsed. The anchor stays put
    /// until a new name is admitted.
    pub fn begin_frame(&mut self, now: DateTime<Utc>) {
        if let Some(anchor) = self.anchor {
            if now - anchor > self.window && !self.seen.is_empty() {
                trace!("Dedup window lapsed, forgetting {} names", self.seen.len());
                self.seen.clear();
            }
        }
    }

    /// `true` when `name` is new in the current window
    pub fn admit(&mut self, name: &str, now: DateTime<Utc>) -> bool {
        if self.seen.contains_key(name) {
            return false;
        }
        self.seen.insert(name.to_string(), now);
        self.anchor = Some(now);
        true
    }

    pub fn anchor(&self) -> Option<DateTime<Utc>> {
        self.anchor
    }

    pub fn is_seen(&self, name: &str) -> bool {
        self.seen.contains_key(name)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}
