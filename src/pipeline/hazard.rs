// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Hazard pipeline frame processing

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use super::FrameProcessor;
use crate::alerting::{HazardAlertMachine, HazardPolicy};
use crate::capture::Frame;
use crate::core::NotificationDispatcher;
use crate::inference::HazardDetector;

/// "User acknowledged" signal from a subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    /// Opaque context supplied by the client
    pub room: String,
}

/// Detector output through the alert state machine
pub struct HazardProcessor {
    detector: Box<dyn HazardDetector>,
    machine: HazardAlertMachine,
    dispatcher: Arc<NotificationDispatcher>,
    acknowledgements: mpsc::UnboundedReceiver<Acknowledgement>,
}

impl HazardProcessor {
    pub fn new(
        detector: Box<dyn HazardDetector>,
        policy: &HazardPolicy,
        dispatcher: Arc<NotificationDispatcher>,
        acknowledgements: mpsc::UnboundedReceiver<Acknowledgement>,
    ) -> Self {
        Self {
            detector,
            machine: HazardAlertMachine::new(policy),
            dispatcher,
            acknowledgements,
        }
    }

    fn drain_acknowledgements(&mut self) {
        while let Ok(ack) = self.acknowledgements.try_recv() {
            debug!("Acknowledgement from room {:?}", ack.room);
            self.machine.acknowledge();
        }
    }
}

impl FrameProcessor for HazardProcessor {
    fn name(&self) -> &'static str {
        self.detector.name()
    }

    fn process(&mut self, frame: Frame, now: DateTime<Utc>) -> Frame {
        self.drain_acknowledgements();

        let detection = self.detector.process(frame);
        for notification in self.machine.observe(detection.label.as_deref(), now) {
            self.dispatcher.publish(notification);
        }
        detection.annotated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AlertEvent, Notification};
    use crate::inference::HazardDetection;
    use chrono::Duration;
    use std::collections::VecDeque;

    /// Replays a fixed label per frame
    struct ScriptedDetector(VecDeque<Option<&'static str>>);

    impl HazardDetector for ScriptedDetector {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn process(&mut self, frame: Frame) -> HazardDetection {
            HazardDetection {
                annotated: frame,
                label: self.0.pop_front().flatten().map(str::to_string),
            }
        }
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<crate::core::Event>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push((*event.payload).clone());
        }
        out
    }

    #[test]
    fn test_edge_policy_publishes_transitions() {
        let dispatcher = Arc::new(NotificationDispatcher::default());
        let mut rx = dispatcher.subscribe();
        let (_tx, acks) = mpsc::unbounded_channel();

        let detector = ScriptedDetector(VecDeque::from([None, Some("Fire"), Some("Fire"), None]));
        let mut processor =
            HazardProcessor::new(Box::new(detector), &HazardPolicy::EdgeTriggered, dispatcher.clone(), acks);

        let start = Utc::now();
        for i in 0..4 {
            processor.process(Frame::new(4, 4), start + Duration::milliseconds(33 * i));
        }

        assert_eq!(
            drain(&mut rx),
            vec![
                Notification::HazardAlert(AlertEvent::raised("Fire")),
                Notification::HazardCleared(AlertEvent::cleared("Fire")),
                Notification::HazardCleared(AlertEvent::cleared("Smoke")),
            ]
        );
    }

    #[test]
    fn test_acknowledgement_reaches_cooldown_machine() {
        let dispatcher = Arc::new(NotificationDispatcher::default());
        let mut rx = dispatcher.subscribe();
        let (tx, acks) = mpsc::unbounded_channel();

        let detector = ScriptedDetector(VecDeque::from([Some("Smoke"); 3]));
        let mut processor = HazardProcessor::new(
            Box::new(detector),
            &HazardPolicy::Cooldown { cooldown_secs: 60.0 },
            dispatcher.clone(),
            acks,
        );

        let start = Utc::now();
        processor.process(Frame::new(4, 4), start);
        processor.process(Frame::new(4, 4), start + Duration::seconds(1));
        assert_eq!(drain(&mut rx).len(), 1);

        tx.send(Acknowledgement { room: "kitchen".into() }).unwrap();
        processor.process(Frame::new(4, 4), start + Duration::seconds(2));
        assert_eq!(
            drain(&mut rx),
            vec![Notification::HazardAlert(AlertEvent::raised("Smoke"))]
        );
    }
}
