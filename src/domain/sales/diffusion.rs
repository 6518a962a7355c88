//! Objection diffusion sub-machine.
//!
//! Tracks how far the current objection has been worked through:
//! diffused (acknowledged), isolated (confirmed as the only blocker),
//! resolved. Agreement abandons the protocol and starts over.

use serde::{Deserialize, Serialize};

use super::signal::{DiffusionHint, UserIntent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffusionStep {
    #[default]
    Idle,
    Diffused,
    Isolated,
    Resolved,
}

impl DiffusionStep {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn is_active(&self) -> bool {
        *self != DiffusionStep::Idle
    }

    /// Applies the turn's hint, then lets agreement reset an active protocol.
    pub fn advance(self, hint: DiffusionHint, intent: UserIntent) -> Self {
        self.apply_hint(hint).settle(intent)
    }

    /// Applies only the hint. `Resolved` on this value means the protocol
    /// completed this turn, even if [`settle`](Self::settle) then resets it.
    pub fn apply_hint(self, hint: DiffusionHint) -> Self {
        match hint {
            DiffusionHint::NotApplicable => self,
            DiffusionHint::Repeated => DiffusionStep::Diffused,
            DiffusionHint::Diffused => self.max(DiffusionStep::Diffused),
            DiffusionHint::Isolated => self.max(DiffusionStep::Isolated),
            DiffusionHint::Resolved => DiffusionStep::Resolved,
        }
    }

    pub fn settle(self, intent: UserIntent) -> Self {
        if intent == UserIntent::Agreement && self.is_active() {
            DiffusionStep::Idle
        } else {
            self
        }
    }
}
