//! Applies one turn's signal to the session state.
//!
//! Runs exactly once per turn, before the decision engine, in a fixed order:
//! profile merge, new-information streak, depth ratchet, diffusion step,
//! closing step, then the turn counters.

use super::session::SessionState;
use super::signal::{ComprehensionSignal, DiffusionHint};
use super::diffusion::DiffusionStep;
use super::profile::ProfileField;

/// Stateless signal applier.
#[derive(Debug, Clone, Copy)]
pub struct StateTracker {
    max_probe_attempts: u32,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self { max_probe_attempts: 2 }
    }
}

impl StateTracker {
    pub fn new(max_probe_attempts: u32) -> Self {
        Self { max_probe_attempts }
    }

    /// Updates `state` with `signal`.
    pub fn update(&self, state: &mut SessionState, signal: &ComprehensionSignal) {
        let ignored = state.profile.merge(&signal.profile_updates);
        if !ignored.is_empty() {
            tracing::debug!(session_id = %state.session_id, ?ignored, "Ignored unknown profile keys");
        }
        if signal.has_objection() {
            state
                .profile
                .append(ProfileField::ObjectionsEncountered, signal.objection.as_str());
        }

        state.no_new_info_streak = if signal.new_information {
            0
        } else {
            state.no_new_info_streak + 1
        };

        state.deepest_depth = state.deepest_depth.max(signal.depth);

        let hinted = state.diffusion_step.apply_hint(signal.diffusion);
        if hinted == DiffusionStep::Resolved {
            state.full_diffusion_reached = true;
        }
        if signal.diffusion == DiffusionHint::Resolved && signal.has_objection() {
            state
                .profile
                .append(ProfileField::ObjectionsResolved, signal.objection.as_str());
        }
        state.diffusion_step = hinted.settle(signal.intent);

        if state.stage.is_closing_sequence() {
            let before = state.closing.step;
            state.closing = state.closing.advance(signal, self.max_probe_attempts);
            if state.closing.step != before {
                tracing::debug!(
                    session_id = %state.session_id,
                    from = ?before,
                    to = ?state.closing.step,
                    "Closing sequence moved"
                );
            }
        }

        state.consecutive_thin_turns = if signal.is_thin() {
            state.consecutive_thin_turns + 1
        } else {
            0
        };
        state.turns_in_stage += 1;
        state.turn_number += 1;
    }
}
