// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Per-loop frame pacing

use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use crate::config::PacingConfig;

/// Caps a capture loop near its target rate. Every cycle ends with at least
/// `min_yield` of sleep so the other pipeline and the transports get to run.
pub struct FrameScheduler {
    frame_budget: Duration,
    min_yield: Duration,
    cycle_start: Option<Instant>,
    total_frames: u64,
    deadline_misses: u64,
    worst_case: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingStats {
    pub total_frames: u64,
    pub deadline_misses: u64,
    pub worst_case: Duration,
}

impl FrameScheduler {
    pub fn new(config: &PacingConfig) -> Self {
        let fps = config.target_fps.max(1) as u64;

        Self {
            frame_budget: Duration::from_millis(1000 / fps),
            min_yield: Duration::from_millis(config.min_yield_ms),
            cycle_start: None,
            total_frames: 0,
            deadline_misses: 0,
            worst_case: Duration::ZERO,
        }
    }

    pub fn frame_budget(&self) -> Duration {
        self.frame_budget
    }

    pub fn begin_cycle(&mut self) {
        self.cycle_start = Some(Instant::now());
    }

    /// Sleep out the rest of the cycle budget
    pub async fn end_cycle(&mut self) {
        let elapsed = self
            .cycle_start
            .take()
            .map(|start| start.elapsed())
            .unwrap_or(Duration::ZERO);

        self.total_frames += 1;
        if elapsed > self.frame_budget {
            self.deadline_misses += 1;
            trace!("Frame cycle over budget: {:?}", elapsed);
        }
        if elapsed > self.worst_case {
            self.worst_case = elapsed;
        }

        let remaining = self.frame_budget.saturating_sub(elapsed);
        tokio::time::sleep(remaining.max(self.min_yield)).await;
    }

    pub fn stats(&self) -> PacingStats {
        PacingStats {
            total_frames: self.total_frames,
            deadline_misses: self.deadline_misses,
            worst_case: self.worst_case,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_from_fps() {
        let scheduler = FrameScheduler::new(&PacingConfig::default());
        assert_eq!(scheduler.frame_budget(), Duration::from_millis(33));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_sleeps_remaining_budget() {
        let mut scheduler = FrameScheduler::new(&PacingConfig::default());
        let start = Instant::now();

        scheduler.begin_cycle();
        tokio::time::sleep(Duration::from_millis(10)).await;
        scheduler.end_cycle().await;

        assert!(start.elapsed() >= Duration::from_millis(33));
        assert_eq!(scheduler.stats().total_frames, 1);
        assert_eq!(scheduler.stats().deadline_misses, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_still_yields() {
        let mut scheduler = FrameScheduler::new(&PacingConfig::default());

        scheduler.begin_cycle();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let before = Instant::now();
        scheduler.end_cycle().await;

        assert!(before.elapsed() >= Duration::from_millis(1));
        assert_eq!(scheduler.stats().deadline_misses, 1);
        assert!(scheduler.stats().worst_case >= Duration::from_millis(50));
    }
}
