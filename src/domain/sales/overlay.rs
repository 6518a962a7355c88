//! Second pass over the engine's decision.
//!
//! Recognises micro-situations the stage rules do not cover and attaches a
//! [`Playbook`] for them. Overriding playbooks also force the action to STAY.

use std::collections::BTreeSet;

use super::catalog::PhaseCatalog;
use super::criteria::CriterionId;
use super::decision::{Decision, DecisionAction};
use super::playbook::Playbook;
use super::session::SessionState;
use super::signal::{ComprehensionSignal, DiffusionHint, UserIntent};
use super::stage::Stage;

/// Inputs visible to overlay guards.
pub struct OverlayContext<'a> {
    pub state: &'a SessionState,
    pub signal: &'a ComprehensionSignal,
    pub decision: &'a Decision,
    pub critical_stage: bool,
    pub thin_streak: u32,
}

/// A playbook and the situation that calls for it.
#[derive(Clone, Copy)]
pub struct PlaybookTrigger {
    pub playbook: Playbook,
    pub guard: fn(&OverlayContext<'_>) -> bool,
}

impl std::fmt::Debug for PlaybookTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PlaybookTrigger").field(&self.playbook).finish()
    }
}

fn hard_refusal_in_late_stage(ctx: &OverlayContext<'_>) -> bool {
    ctx.state.stage.is_late() && ctx.signal.intent == UserIntent::Refusal
}

fn repeated_objection_after_full_diffusion(ctx: &OverlayContext<'_>) -> bool {
    ctx.state.stage.is_late()
        && ctx.signal.has_objection()
        && ctx.signal.diffusion == DiffusionHint::Repeated
        && ctx.state.full_diffusion_reached
}

fn spontaneous_buy_signal(ctx: &OverlayContext<'_>) -> bool {
    ctx.signal.buying_signal
        && ctx.state.stage != Stage::Commitment
        && !ctx.signal.criteria.is_met(CriterionId::PriceStated)
}

fn isolated_objection_with_agreement(ctx: &OverlayContext<'_>) -> bool {
    ctx.signal.diffusion == DiffusionHint::Isolated && ctx.signal.intent == UserIntent::Agreement
}

fn disengaging(ctx: &OverlayContext<'_>) -> bool {
    ctx.state.consecutive_thin_turns >= ctx.thin_streak
}

fn thin_probe_in_critical_stage(ctx: &OverlayContext<'_>) -> bool {
    ctx.decision.action == DecisionAction::Probe && ctx.signal.is_thin() && ctx.critical_stage
}

/// The built-in trigger table, in priority order.
pub const STANDARD_TRIGGERS: [PlaybookTrigger; 6] = [
    PlaybookTrigger {
        playbook: Playbook::GracefulExit,
        guard: hard_refusal_in_late_stage,
    },
    PlaybookTrigger {
        playbook: Playbook::GracefulAlternative,
        guard: repeated_objection_after_full_diffusion,
    },
    PlaybookTrigger {
        playbook: Playbook::DontOversell,
        guard: spontaneous_buy_signal,
    },
    PlaybookTrigger {
        playbook: Playbook::ResolveAndClose,
        guard: isolated_objection_with_agreement,
    },
    PlaybookTrigger {
        playbook: Playbook::EnergyShift,
        guard: disengaging,
    },
    PlaybookTrigger {
        playbook: Playbook::SpecificProbe,
        guard: thin_probe_in_critical_stage,
    },
];

#[derive(Debug, Clone)]
pub struct SituationOverlay {
    triggers: Vec<PlaybookTrigger>,
    critical_stages: BTreeSet<Stage>,
    thin_streak: u32,
}

impl SituationOverlay {
    pub fn new(catalog: &PhaseCatalog, thin_streak: u32) -> Self {
        Self {
            triggers: STANDARD_TRIGGERS.to_vec(),
            critical_stages: catalog
                .specs()
                .iter()
                .filter(|s| s.critical)
                .map(|s| s.stage)
                .collect(),
            thin_streak,
        }
    }

    /// Returns the decision, possibly rewritten by the first matching
    /// available playbook.
    pub fn apply(&self, state: &SessionState, signal: &ComprehensionSignal, decision: Decision) -> Decision {
        if decision.playbook.is_some()
            || matches!(decision.action, DecisionAction::Advance | DecisionAction::End)
        {
            return decision;
        }

        let ctx = OverlayContext {
            state,
            signal,
            decision: &decision,
            critical_stage: self.critical_stages.contains(&state.stage),
            thin_streak: self.thin_streak,
        };
        let chosen = self
            .triggers
            .iter()
            .filter(|t| state.playbooks.is_available(t.playbook) && t.playbook.is_supported_by(&state.profile))
            .find(|t| (t.guard)(&ctx))
            .map(|t| t.playbook);

        match chosen {
            Some(playbook) => {
                tracing::debug!(session_id = %state.session_id, %playbook, "Overlay attached playbook");
                Self::attach(state, decision, playbook)
            }
            None => decision,
        }
    }

    fn attach(state: &SessionState, mut decision: Decision, playbook: Playbook) -> Decision {
        if playbook.spec().overrides_action && decision.action != DecisionAction::Stay {
            if decision.action == DecisionAction::Reroute {
                decision.retry_count_after = state.retry_count;
            }
            decision.action = DecisionAction::Stay;
            decision.target_stage = state.stage;
        }
        decision.reason = format!("{} [playbook: {}]", decision.reason, playbook);
        decision.with_playbook(Some(playbook))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sales::decision::RuleId;
    use crate::domain::sales::signal::{ObjectionCategory, Richness};

    fn overlay() -> SituationOverlay {
        SituationOverlay::new(PhaseCatalog::standard(), 3)
    }

    fn state_in(stage: Stage) -> SessionState {
        let mut state = SessionState::start();
        state.stage = stage;
        state.turns_in_stage = 3;
        state.retry_count = 2;
        state
    }

    fn stay(stage: Stage) -> Decision {
        Decision::new(RuleId::Objection, DecisionAction::Stay, stage, 2, "engine")
    }

    mod triggers {
        use super::*;

        #[test]
        fn refusal_in_late_stage_exits_gracefully() {
            let state = state_in(Stage::Commitment);
            let signal = ComprehensionSignal::default().with_intent(UserIntent::Refusal);
            let decision = overlay().apply(&state, &signal, stay(Stage::Commitment));
            assert_eq!(decision.playbook, Some(Playbook::GracefulExit));
        }

        #[test]
        fn refusal_early_is_ignored() {
            let state = state_in(Stage::Situation);
            let signal = ComprehensionSignal::default().with_intent(UserIntent::Refusal);
            let decision = overlay().apply(&state, &signal, stay(Stage::Situation));
            assert_eq!(decision.playbook, None);
        }

        #[test]
        fn repeated_objection_after_full_diffusion_offers_alternative() {
            let mut state = state_in(Stage::Ownership);
            state.full_diffusion_reached = true;
            let signal = ComprehensionSignal::default()
                .with_intent(UserIntent::Objection)
                .with_objection(ObjectionCategory::Price, "still too much")
                .with_diffusion(DiffusionHint::Repeated);
            let decision = overlay().apply(&state, &signal, stay(Stage::Ownership));
            assert_eq!(decision.playbook, Some(Playbook::GracefulAlternative));
            assert_eq!(decision.action, DecisionAction::Stay);
        }

        #[test]
        fn repeated_objection_without_full_diffusion_is_ignored() {
            let state = state_in(Stage::Ownership);
            let signal = ComprehensionSignal::default()
                .with_objection(ObjectionCategory::Price, "too much")
                .with_diffusion(DiffusionHint::Repeated);
            let decision = overlay().apply(&state, &signal, stay(Stage::Ownership));
            assert_eq!(decision.playbook, None);
        }

        #[test]
        fn buy_signal_before_price_does_not_oversell() {
            let state = state_in(Stage::Consequence);
            let signal = ComprehensionSignal::default().with_buying_signal();
            let decision = overlay().apply(&state, &signal, stay(Stage::Consequence));
            assert_eq!(decision.playbook, Some(Playbook::DontOversell));
        }

        #[test]
        fn isolated_objection_with_agreement_closes() {
            let state = state_in(Stage::Ownership);
            let signal = ComprehensionSignal::default()
                .with_intent(UserIntent::Agreement)
                .with_diffusion(DiffusionHint::Isolated);
            let decision = overlay().apply(&state, &signal, stay(Stage::Ownership));
            assert_eq!(decision.playbook, Some(Playbook::ResolveAndClose));
        }

        #[test]
        fn three_thin_turns_shift_energy() {
            let mut state = state_in(Stage::Situation);
            state.consecutive_thin_turns = 3;
            let signal = ComprehensionSignal::default().with_richness(Richness::Thin);
            let decision = overlay().apply(&state, &signal, stay(Stage::Situation));
            assert_eq!(decision.playbook, Some(Playbook::EnergyShift));
        }

        #[test]
        fn thin_probe_in_critical_stage_is_specific() {
            let state = state_in(Stage::ProblemAwareness);
            let signal = ComprehensionSignal::default().with_richness(Richness::Thin);
            let probe = Decision::new(RuleId::ThinResponse, DecisionAction::Probe, Stage::ProblemAwareness, 3, "thin");
            let decision = overlay().apply(&state, &signal, probe);
            assert_eq!(decision.playbook, Some(Playbook::SpecificProbe));
            assert_eq!(decision.action, DecisionAction::Probe);
        }
    }

    mod precedence {
        use super::*;

        #[test]
        fn advance_and_end_pass_through() {
            let state = state_in(Stage::Commitment);
            let signal = ComprehensionSignal::default().with_intent(UserIntent::Refusal);
            let end = Decision::new(RuleId::ExitCriteria, DecisionAction::End, Stage::Terminated, 2, "done");
            assert_eq!(overlay().apply(&state, &signal, end.clone()), end);
        }

        #[test]
        fn engine_playbook_is_kept() {
            let state = state_in(Stage::Ownership);
            let signal = ComprehensionSignal::default().with_intent(UserIntent::Refusal);
            let decision = stay(Stage::Ownership).with_playbook(Some(Playbook::OwnershipCeiling));
            assert_eq!(
                overlay().apply(&state, &signal, decision).playbook,
                Some(Playbook::OwnershipCeiling)
            );
        }

        #[test]
        fn retired_playbook_falls_through_to_next() {
            let mut state = state_in(Stage::Ownership);
            state.playbooks.retired.insert(Playbook::GracefulExit);
            state.consecutive_thin_turns = 3;
            let signal = ComprehensionSignal::default().with_intent(UserIntent::Refusal);
            let decision = overlay().apply(&state, &signal, stay(Stage::Ownership));
            assert_eq!(decision.playbook, Some(Playbook::EnergyShift));
        }

        #[test]
        fn all_exhausted_leaves_decision_unmodified() {
            let mut state = state_in(Stage::Ownership);
            state.playbooks.retired.extend(Playbook::ALL);
            state.consecutive_thin_turns = 5;
            let signal = ComprehensionSignal::default().with_intent(UserIntent::Refusal);
            let original = stay(Stage::Ownership);
            assert_eq!(overlay().apply(&state, &signal, original.clone()), original);
        }
    }

    mod overriding {
        use super::*;

        #[test]
        fn override_turns_reroute_into_stay_without_retry_change() {
            let state = state_in(Stage::Consequence);
            let signal = ComprehensionSignal::default()
                .with_buying_signal()
                .with_objection(ObjectionCategory::Timing, "but not now");
            let reroute = Decision::new(RuleId::Objection, DecisionAction::Reroute, Stage::ProblemAwareness, 0, "r");
            let decision = overlay().apply(&state, &signal, reroute);
            assert_eq!(decision.action, DecisionAction::Stay);
            assert_eq!(decision.target_stage, Stage::Consequence);
            assert_eq!(decision.retry_count_after, 2);
            assert_eq!(decision.playbook, Some(Playbook::DontOversell));
        }

        #[test]
        fn non_overriding_playbook_keeps_action() {
            let mut state = state_in(Stage::Situation);
            state.consecutive_thin_turns = 3;
            let glass = Decision::new(RuleId::Repetition, DecisionAction::BreakGlass, Stage::Situation, 3, "stuck");
            let decision = overlay().apply(&state, &ComprehensionSignal::default(), glass);
            assert_eq!(decision.action, DecisionAction::BreakGlass);
            assert_eq!(decision.retry_count_after, 3);
            assert_eq!(decision.playbook, Some(Playbook::EnergyShift));
        }
    }
}
