// src/presence.rs - Debounced hand visibility
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PresenceState {
    pub detected: bool,
    pub last_detected_at_ms: Option<f64>,
}

/// Shows the target as soon as a hand is seen, hides it only after
/// `hysteresis_ms` of continuous silence.
#[derive(Debug, Clone)]
pub struct PresenceGate {
    state: PresenceState,
    hysteresis_ms: f64,
}

impl PresenceGate {
    pub fn new(hysteresis_ms: f64) -> Self {
        Self {
            state: PresenceState::default(),
            hysteresis_ms,
        }
    }

    pub fn update(&mut self, has_detection: bool, now_ms: f64) -> bool {
        if has_detection {
            self.state.last_detected_at_ms = Some(now_ms);
            if !self.state.detected {
                debug!("Hand visible at {:.1} ms", now_ms);
                self.state.detected = true;
            }
        } else if self.state.detected {
            let silent_for = self
                .state
                .last_detected_at_ms
                .map(|last| now_ms - last)
                .unwrap_or(f64::INFINITY);

            if silent_for > self.hysteresis_ms {
                debug!("Hand lost after {:.1} ms of silence", silent_for);
                self.state.detected = false;
            }
        }

        self.state.detected
    }

    pub fn is_visible(&self) -> bool {
        self.state.detected
    }

    pub fn state(&self) -> PresenceState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = PresenceState::default();
    }
}
