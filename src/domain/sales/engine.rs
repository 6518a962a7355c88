//! The decision engine.
//!
//! A pure function of the session state, the turn's signal, and the elapsed
//! session time. Twelve ordered checks are tried in turn and the first that
//! matches decides; the last one always matches.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::catalog::{CatalogError, PhaseCatalog, StageSpec};
use super::closing::ClosingStep;
use super::criteria::{CriteriaEvaluation, ExitCriteriaEvaluator};
use super::decision::{ContextKind, Decision, DecisionAction, ObjectionContext, RuleId};
use super::playbook::Playbook;
use super::router::{ObjectionRouter, Route};
use super::session::SessionState;
use super::signal::{ComprehensionSignal, Depth, ObjectionCategory, UserIntent};

/// Tunable heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineThresholds {
    /// Sessions older than this end on their next turn.
    pub session_ceiling_secs: u64,
    /// Retries past the budget after which the stage is left regardless.
    pub hard_ceiling_margin: u32,
    /// Turns needed to leave the pre-closing stage at moderate depth.
    pub depth_gate_moderate_turns: u32,
    /// Turns needed to leave the pre-closing stage at surface depth.
    pub depth_gate_surface_turns: u32,
    pub closing_ceiling_turns: u32,
    pub repetition_threshold: u32,
    /// Share of criteria met that allows a forced advance.
    pub advance_fraction: f64,
    pub thin_streak: u32,
    pub self_persuasion_attempts: u32,
}

impl Default for EngineThresholds {
    fn default() -> Self {
        Self {
            session_ceiling_secs: 30 * 60,
            hard_ceiling_margin: 2,
            depth_gate_moderate_turns: 3,
            depth_gate_surface_turns: 4,
            closing_ceiling_turns: 8,
            repetition_threshold: 2,
            advance_fraction: 0.5,
            thin_streak: 3,
            self_persuasion_attempts: 2,
        }
    }
}

impl EngineThresholds {
    pub fn session_ceiling(&self) -> Duration {
        Duration::from_secs(self.session_ceiling_secs)
    }
}

/// Everything a rule may look at. Built once per turn.
pub struct RuleContext<'a> {
    pub state: &'a SessionState,
    pub signal: &'a ComprehensionSignal,
    /// `None` only for the terminal stage.
    pub spec: Option<&'a StageSpec>,
    pub evaluation: CriteriaEvaluation,
    pub elapsed: Duration,
    pub catalog: &'a PhaseCatalog,
    pub router: &'a ObjectionRouter,
    pub thresholds: &'a EngineThresholds,
}

impl RuleContext<'_> {
    fn stay(&self, rule: RuleId, retry_increment: u32, reason: impl Into<String>) -> Decision {
        Decision::new(
            rule,
            DecisionAction::Stay,
            self.state.stage,
            self.state.retry_count + retry_increment,
            reason,
        )
    }

    fn break_glass(&self, rule: RuleId, reason: impl Into<String>) -> Decision {
        Decision::new(
            rule,
            DecisionAction::BreakGlass,
            self.state.stage,
            self.state.retry_count + 1,
            reason,
        )
    }

    /// Moves to the next stage, or ends when there is none.
    fn advance(&self, rule: RuleId, reason: impl Into<String>) -> Decision {
        let next = self.state.stage.next();
        if next.is_terminal() {
            Decision::new(rule, DecisionAction::End, next, self.state.retry_count, reason)
        } else {
            Decision::new(rule, DecisionAction::Advance, next, 0, reason)
        }
    }

    /// Ends where the conversation stands; counters are kept for the archive.
    fn end(&self, rule: RuleId, reason: impl Into<String>) -> Decision {
        Decision::new(rule, DecisionAction::End, self.state.stage, self.state.retry_count, reason)
    }

    /// Retry count has reached `max_retries + hard_ceiling_margin`.
    fn at_hard_ceiling(&self) -> bool {
        self.spec
            .is_some_and(|spec| self.state.retry_count >= spec.max_retries + self.thresholds.hard_ceiling_margin)
    }

    fn available(&self, playbook: Playbook) -> Option<Playbook> {
        (self.state.playbooks.is_available(playbook) && playbook.is_supported_by(&self.state.profile))
            .then_some(playbook)
    }

    fn criteria_summary(&self) -> String {
        format!("{}/{}", self.evaluation.met_count(), self.evaluation.total_count())
    }

    fn objection_context(&self, kind: ContextKind) -> ObjectionContext {
        ObjectionContext::new(kind, self.signal.objection, self.signal.objection_detail.clone())
    }
}

/// One guarded check of the engine cascade.
pub trait DecisionRule: Send + Sync {
    fn id(&self) -> RuleId;

    /// Returns a decision if this rule's guard matches.
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Decision>;
}

/// 1. Session-duration ceiling.
pub struct SessionCeilingRule;

impl DecisionRule for SessionCeilingRule {
    fn id(&self) -> RuleId {
        RuleId::SessionCeiling
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Decision> {
        (ctx.elapsed > ctx.thresholds.session_ceiling()).then(|| {
            ctx.end(
                self.id(),
                format!(
                    "Session exceeded {}s limit ({}s elapsed)",
                    ctx.thresholds.session_ceiling_secs,
                    ctx.elapsed.as_secs()
                ),
            )
        })
    }
}

/// 2. Nothing left to do after the terminal stage.
pub struct TerminalStageRule;

impl DecisionRule for TerminalStageRule {
    fn id(&self) -> RuleId {
        RuleId::TerminalStage
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Decision> {
        ctx.state
            .stage
            .is_terminal()
            .then(|| ctx.end(self.id(), "Session already terminated"))
    }
}

/// 3. Objection handling.
pub struct ObjectionRule;

impl DecisionRule for ObjectionRule {
    fn id(&self) -> RuleId {
        RuleId::Objection
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Decision> {
        let objection = ctx.signal.objection;
        if !objection.is_present() {
            return None;
        }
        let stage = ctx.state.stage;

        if stage.is_late() {
            return Some(
                ctx.stay(self.id(), 0, format!("{} objection in {}; diffusing", objection, stage))
                    .with_context(ctx.objection_context(ContextKind::Diffuse)),
            );
        }
        if objection == ObjectionCategory::Authority {
            return Some(
                ctx.stay(self.id(), 0, "Authority objection; clarifying the decision process")
                    .with_context(ctx.objection_context(ContextKind::Authority)),
            );
        }
        if ctx.signal.is_agreeing() {
            return Some(
                ctx.stay(self.id(), 0, format!("Agreeing with a {} caveat", objection))
                    .with_context(ctx.objection_context(ContextKind::Caveat)),
            );
        }

        let decision = match ctx.router.route(objection, stage) {
            Route::Back(target) => Decision::new(
                self.id(),
                DecisionAction::Reroute,
                target,
                0,
                format!("{} objection; routing back to {}", objection, target),
            )
            .with_context(ctx.objection_context(ContextKind::Reroute)),
            Route::InPlace => ctx
                .stay(self.id(), 0, format!("{} objection; no earlier stage addresses it", objection))
                .with_context(ctx.objection_context(ContextKind::InPlace)),
        };
        Some(decision)
    }
}

/// 4. The prospect did not follow.
pub struct ConfusionRule;

impl DecisionRule for ConfusionRule {
    fn id(&self) -> RuleId {
        RuleId::Confusion
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Decision> {
        (ctx.signal.intent == UserIntent::Confusion).then(|| {
            ctx.stay(self.id(), 0, "Prospect is confused; restating simply")
                .with_context(ObjectionContext::bare(ContextKind::Confusion))
                .with_playbook(ctx.available(Playbook::ConfusionRecovery))
        })
    }
}

/// 5. Gap builder: the next stage needs profile fields we do not have.
///
/// Only holds a stage whose exit criteria are all met, and lets go once the
/// prospect stops adding information, so it never outranks checks 9 to 11.
pub struct GapBuilderRule;

impl DecisionRule for GapBuilderRule {
    fn id(&self) -> RuleId {
        RuleId::GapBuilder
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Decision> {
        if !ctx.evaluation.all_met() || ctx.state.no_new_info_streak >= ctx.thresholds.repetition_threshold {
            return None;
        }
        let next = ctx.catalog.spec(ctx.state.stage.next())?;
        let missing = ctx.state.profile.first_missing(&next.required_profile_fields)?;
        Some(ctx.stay(
            self.id(),
            0,
            format!("{} needs {} before it can start", next.stage, missing),
        ))
    }
}

/// 6. Minimum dwell time.
pub struct MinimumTurnsRule;

impl DecisionRule for MinimumTurnsRule {
    fn id(&self) -> RuleId {
        RuleId::MinimumTurns
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Decision> {
        let spec = ctx.spec?;
        (ctx.state.turns_in_stage < spec.min_turns).then(|| {
            ctx.stay(
                self.id(),
                0,
                format!("Minimum turns not reached: {}/{}", ctx.state.turns_in_stage, spec.min_turns),
            )
        })
    }
}

/// 7. All exit criteria met, subject to the pre-closing depth gate.
pub struct ExitCriteriaRule;

impl ExitCriteriaRule {
    fn depth_gate_passes(ctx: &RuleContext<'_>) -> bool {
        let turns = ctx.state.turns_in_stage;
        match ctx.state.deepest_depth {
            Depth::Deep => true,
            Depth::Moderate => turns >= ctx.thresholds.depth_gate_moderate_turns,
            Depth::Surface => turns >= ctx.thresholds.depth_gate_surface_turns,
        }
    }
}

impl DecisionRule for ExitCriteriaRule {
    fn id(&self) -> RuleId {
        RuleId::ExitCriteria
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Decision> {
        if !ctx.evaluation.all_met() {
            return None;
        }
        if ctx.state.stage.is_pre_closing() && !Self::depth_gate_passes(ctx) {
            return Some(ctx.stay(
                self.id(),
                0,
                format!(
                    "Criteria met but engagement too shallow ({} after {} turns)",
                    ctx.state.deepest_depth, ctx.state.turns_in_stage
                ),
            ));
        }
        Some(ctx.advance(
            self.id(),
            format!("All {} exit criteria met", ctx.evaluation.total_count()),
        ))
    }
}

/// 8. Too long in the closing stage.
///
/// Stands aside once the retry count reaches the hard ceiling so the retry
/// budget check can move the conversation on. This departs from strict
/// first-match order on purpose: without it the closing stage never leaves.
pub struct ClosingCeilingRule;

impl DecisionRule for ClosingCeilingRule {
    fn id(&self) -> RuleId {
        RuleId::ClosingCeiling
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Decision> {
        let applies = ctx.state.stage.is_closing_sequence()
            && ctx.state.turns_in_stage >= ctx.thresholds.closing_ceiling_turns
            && !ctx.at_hard_ceiling();
        applies.then(|| {
            ctx.stay(
                self.id(),
                1,
                format!("{} turns in {}; wrapping up", ctx.state.turns_in_stage, ctx.state.stage),
            )
            .with_context(ObjectionContext::bare(ContextKind::Ceiling))
            .with_playbook(ctx.available(Playbook::OwnershipCeiling))
        })
    }
}

/// 9. Thin reply in a critical stage.
///
/// Like check 8, stands aside at the hard ceiling.
pub struct ThinResponseRule;

impl DecisionRule for ThinResponseRule {
    fn id(&self) -> RuleId {
        RuleId::ThinResponse
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Decision> {
        let spec = ctx.spec?;
        (spec.critical && ctx.signal.is_thin() && !ctx.at_hard_ceiling()).then(|| {
            Decision::new(
                self.id(),
                DecisionAction::Probe,
                ctx.state.stage,
                ctx.state.retry_count + 1,
                format!("Thin reply in critical stage {}", ctx.state.stage),
            )
            .with_probe_target(ctx.evaluation.most_evidenced_missing)
        })
    }
}

/// 10. No new information for several turns.
///
/// Below the advance fraction it breaks glass, except at the hard ceiling
/// where check 11 takes over.
pub struct RepetitionRule;

impl DecisionRule for RepetitionRule {
    fn id(&self) -> RuleId {
        RuleId::Repetition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Decision> {
        let streak = ctx.state.no_new_info_streak;
        if streak < ctx.thresholds.repetition_threshold {
            return None;
        }
        let decision = if ctx.evaluation.fraction() >= ctx.thresholds.advance_fraction {
            ctx.advance(
                self.id(),
                format!("{} turns without new information, {} criteria met; moving on", streak, ctx.criteria_summary()),
            )
        } else if ctx.at_hard_ceiling() {
            return None;
        } else {
            ctx.break_glass(
                self.id(),
                format!("{} turns without new information, only {} criteria met", streak, ctx.criteria_summary()),
            )
        };
        Some(decision)
    }
}

/// 11. Retry budget exhausted.
pub struct RetryBudgetRule;

impl DecisionRule for RetryBudgetRule {
    fn id(&self) -> RuleId {
        RuleId::RetryBudget
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Decision> {
        let spec = ctx.spec?;
        let retries = ctx.state.retry_count;
        if retries < spec.max_retries {
            return None;
        }
        let decision = if ctx.evaluation.fraction() >= ctx.thresholds.advance_fraction {
            ctx.advance(
                self.id(),
                format!("{} retries with {} criteria met; moving on", retries, ctx.criteria_summary()),
            )
        } else if ctx.at_hard_ceiling() {
            ctx.advance(
                self.id(),
                format!("Hard ceiling: {} retries, well past budget of {}", retries, spec.max_retries),
            )
        } else {
            ctx.break_glass(
                self.id(),
                format!("{} retries, only {} criteria met; changing angle", retries, ctx.criteria_summary()),
            )
        };
        Some(decision)
    }
}

/// 12. Nothing else applied.
pub struct DefaultStayRule;

impl DefaultStayRule {
    pub fn decide(&self, ctx: &RuleContext<'_>) -> Decision {
        ctx.stay(
            RuleId::DefaultStay,
            1,
            format!("Exit criteria not met: {}", ctx.criteria_summary()),
        )
        .with_probe_target(ctx.evaluation.most_evidenced_missing)
    }
}

/// The ordered check cascade.
pub struct DecisionEngine {
    catalog: PhaseCatalog,
    router: ObjectionRouter,
    thresholds: EngineThresholds,
    rules: Vec<Box<dyn DecisionRule>>,
}

impl fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("rules", &self.rules.iter().map(|r| r.id()).collect::<Vec<_>>())
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::with_parts(
            PhaseCatalog::standard().clone(),
            ObjectionRouter::standard(),
            EngineThresholds::default(),
        )
    }
}

impl DecisionEngine {
    /// Builds an engine, validating the catalog and routes.
    pub fn new(
        catalog: PhaseCatalog,
        router: ObjectionRouter,
        thresholds: EngineThresholds,
    ) -> Result<Self, CatalogError> {
        catalog.validate()?;
        router.validate()?;
        Ok(Self::with_parts(catalog, router, thresholds))
    }

    fn with_parts(catalog: PhaseCatalog, router: ObjectionRouter, thresholds: EngineThresholds) -> Self {
        Self {
            catalog,
            router,
            thresholds,
            rules: vec![
                Box::new(SessionCeilingRule),
                Box::new(TerminalStageRule),
                Box::new(ObjectionRule),
                Box::new(ConfusionRule),
                Box::new(GapBuilderRule),
                Box::new(MinimumTurnsRule),
                Box::new(ExitCriteriaRule),
                Box::new(ClosingCeilingRule),
                Box::new(ThinResponseRule),
                Box::new(RepetitionRule),
                Box::new(RetryBudgetRule),
            ],
        }
    }

    pub fn catalog(&self) -> &PhaseCatalog {
        &self.catalog
    }

    pub fn thresholds(&self) -> &EngineThresholds {
        &self.thresholds
    }

    /// Decides the turn. `state` must already carry this turn's signal.
    pub fn decide(&self, state: &SessionState, signal: &ComprehensionSignal, elapsed: Duration) -> Decision {
        let spec = self.catalog.spec(state.stage);
        let evaluation = match spec {
            Some(spec) => ExitCriteriaEvaluator.evaluate(spec, &signal.criteria),
            None => CriteriaEvaluation {
                met: Vec::new(),
                missing: Vec::new(),
                most_evidenced_missing: None,
            },
        };
        let ctx = RuleContext {
            state,
            signal,
            spec,
            evaluation,
            elapsed,
            catalog: &self.catalog,
            router: &self.router,
            thresholds: &self.thresholds,
        };

        let decision = self
            .rules
            .iter()
            .find_map(|rule| rule.evaluate(&ctx))
            .unwrap_or_else(|| DefaultStayRule.decide(&ctx));
        let decision = self.attach_bridge(&ctx, decision);

        tracing::debug!(
            session_id = %state.session_id,
            stage = %state.stage,
            rule = %decision.rule,
            action = %decision.action,
            target = %decision.target_stage,
            retry_count = decision.retry_count_after,
            "Engine decided"
        );
        if matches!(decision.rule, RuleId::Repetition | RuleId::RetryBudget) {
            tracing::warn!(
                session_id = %state.session_id,
                stage = %state.stage,
                action = %decision.action,
                reason = %decision.reason,
                "Forced move"
            );
        }
        decision
    }

    /// Decides and applies in one step, leaving `state` untouched.
    pub fn evaluate(
        &self,
        state: &SessionState,
        signal: &ComprehensionSignal,
        elapsed: Duration,
    ) -> (Decision, SessionState) {
        let decision = self.decide(state, signal, elapsed);
        let mut next = state.clone();
        next.apply_decision(&decision);
        (decision, next)
    }

    /// On the bridge step of the closing sequence a plain STAY uses the
    /// prospect's own words.
    fn attach_bridge(&self, ctx: &RuleContext<'_>, decision: Decision) -> Decision {
        let on_bridge = ctx.state.stage.is_closing_sequence() && ctx.state.closing.step == ClosingStep::Bridge;
        if on_bridge && decision.action == DecisionAction::Stay && decision.playbook.is_none() {
            let playbook = ctx.available(Playbook::BridgeWithTheirWords);
            decision.with_playbook(playbook)
        } else {
            decision
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sales::catalog::StageSpec;
    use crate::domain::sales::criteria::{CriteriaMap, CriterionId, CriterionResult};
    use crate::domain::sales::profile::ProfileField;
    use crate::domain::sales::signal::{Richness, UserIntent};
    use crate::domain::sales::stage::Stage;
    use proptest::prelude::*;

    fn engine() -> DecisionEngine {
        DecisionEngine::default()
    }

    fn spec(stage: Stage) -> StageSpec {
        PhaseCatalog::standard().spec(stage).cloned().unwrap()
    }

    /// State as the tracker leaves it: `turns` already counts this turn.
    fn state_at(stage: Stage, turns: u32) -> SessionState {
        let mut state = SessionState::start();
        state.stage = stage;
        state.turns_in_stage = turns;
        state.profile.append(ProfileField::PainPoints, "manual reporting");
        state
    }

    fn all_met(stage: Stage) -> ComprehensionSignal {
        ComprehensionSignal::default().with_criteria(CriteriaMap::all_met(&spec(stage).exit_criteria))
    }

    fn decide(state: &SessionState, signal: &ComprehensionSignal) -> Decision {
        engine().decide(state, signal, Duration::from_secs(60))
    }

    mod ending {
        use super::*;

        #[test]
        fn session_ceiling_ends_in_place() {
            let state = state_at(Stage::Situation, 2);
            let decision = engine().decide(&state, &all_met(Stage::Situation), Duration::from_secs(1801));
            assert_eq!(decision.action, DecisionAction::End);
            assert_eq!(decision.rule, RuleId::SessionCeiling);
            assert_eq!(decision.target_stage, Stage::Situation);
        }

        #[test]
        fn exactly_at_ceiling_continues() {
            let state = state_at(Stage::Situation, 2);
            let decision = engine().decide(&state, &all_met(Stage::Situation), Duration::from_secs(1800));
            assert_eq!(decision.action, DecisionAction::Advance);
        }

        #[test]
        fn terminal_stage_ends() {
            let state = state_at(Stage::Terminated, 0);
            let decision = decide(&state, &ComprehensionSignal::default());
            assert_eq!(decision.action, DecisionAction::End);
            assert_eq!(decision.rule, RuleId::TerminalStage);
            assert_eq!(decision.target_stage, Stage::Terminated);
        }

        #[test]
        fn completing_last_stage_ends_at_terminal() {
            let mut state = state_at(Stage::Commitment, 1);
            state.retry_count = 2;
            let decision = decide(&state, &all_met(Stage::Commitment));
            assert_eq!(decision.action, DecisionAction::End);
            assert_eq!(decision.target_stage, Stage::Terminated);
            assert_eq!(decision.retry_count_after, 2);
        }
    }

    mod objections {
        use super::*;

        fn objecting(objection: ObjectionCategory) -> ComprehensionSignal {
            ComprehensionSignal::default()
                .with_intent(UserIntent::Objection)
                .with_objection(objection, "detail")
        }

        #[test]
        fn late_stage_diffuses_without_retry() {
            let mut state = state_at(Stage::Ownership, 4);
            state.retry_count = 2;
            let decision = decide(&state, &objecting(ObjectionCategory::Price));
            assert_eq!(decision.action, DecisionAction::Stay);
            assert_eq!(decision.retry_count_after, 2);
            assert_eq!(decision.objection_context.unwrap().kind, ContextKind::Diffuse);
        }

        #[test]
        fn authority_stays_to_clarify() {
            let decision = decide(&state_at(Stage::Consequence, 2), &objecting(ObjectionCategory::Authority));
            assert_eq!(decision.action, DecisionAction::Stay);
            assert_eq!(decision.objection_context.unwrap().kind, ContextKind::Authority);
        }

        #[test]
        fn caveat_while_agreeing_stays() {
            let signal = ComprehensionSignal::default()
                .with_intent(UserIntent::Agreement)
                .with_objection(ObjectionCategory::Timing, "after the audit");
            let decision = decide(&state_at(Stage::Consequence, 2), &signal);
            assert_eq!(decision.action, DecisionAction::Stay);
            assert_eq!(decision.objection_context.unwrap().kind, ContextKind::Caveat);
        }

        #[test]
        fn reroutes_backward_and_resets_retry() {
            let mut state = state_at(Stage::Consequence, 2);
            state.retry_count = 3;
            let decision = decide(&state, &objecting(ObjectionCategory::Timing));
            assert_eq!(decision.action, DecisionAction::Reroute);
            assert_eq!(decision.target_stage, Stage::ProblemAwareness);
            assert_eq!(decision.retry_count_after, 0);
        }

        #[test]
        fn forward_route_stays_in_place() {
            let mut state = state_at(Stage::Situation, 1);
            state.retry_count = 1;
            let decision = decide(&state, &objecting(ObjectionCategory::Price));
            assert_eq!(decision.action, DecisionAction::Stay);
            assert_eq!(decision.target_stage, Stage::Situation);
            assert_eq!(decision.retry_count_after, 1);
            assert_eq!(decision.objection_context.unwrap().kind, ContextKind::InPlace);
        }

        #[test]
        fn objection_beats_met_criteria() {
            let signal = all_met(Stage::SolutionAwareness)
                .with_intent(UserIntent::Objection)
                .with_objection(ObjectionCategory::Timing, "later");
            let decision = decide(&state_at(Stage::SolutionAwareness, 3), &signal);
            assert_eq!(decision.action, DecisionAction::Reroute);
        }
    }

    mod holding {
        use super::*;

        #[test]
        fn confusion_attaches_recovery_playbook() {
            let signal = ComprehensionSignal::default().with_intent(UserIntent::Confusion);
            let decision = decide(&state_at(Stage::Situation, 3), &signal);
            assert_eq!(decision.rule, RuleId::Confusion);
            assert_eq!(decision.playbook, Some(Playbook::ConfusionRecovery));
            assert_eq!(decision.retry_count_after, 0);
        }

        #[test]
        fn retired_recovery_playbook_is_not_attached() {
            let mut state = state_at(Stage::Situation, 3);
            state.playbooks.retired.insert(Playbook::ConfusionRecovery);
            let signal = ComprehensionSignal::default().with_intent(UserIntent::Confusion);
            let decision = decide(&state, &signal);
            assert_eq!(decision.rule, RuleId::Confusion);
            assert_eq!(decision.playbook, None);
        }

        /// Standard catalog where entering SolutionAwareness needs pain points.
        fn gated_engine() -> DecisionEngine {
            let specs = PhaseCatalog::standard()
                .specs()
                .iter()
                .cloned()
                .map(|mut spec| {
                    if spec.stage == Stage::SolutionAwareness {
                        spec.required_profile_fields = vec![ProfileField::PainPoints];
                    }
                    spec
                })
                .collect();
            DecisionEngine::new(
                PhaseCatalog::from_specs(specs),
                ObjectionRouter::standard(),
                EngineThresholds::default(),
            )
            .unwrap()
        }

        fn without_pain_points(turns: u32) -> SessionState {
            let mut state = state_at(Stage::ProblemAwareness, turns);
            state.profile.pain_points.clear();
            state
        }

        #[test]
        fn gap_builder_blocks_advance_without_pain_points() {
            let state = without_pain_points(3);
            let decision = gated_engine().decide(&state, &all_met(Stage::ProblemAwareness), Duration::from_secs(60));
            assert_eq!(decision.rule, RuleId::GapBuilder);
            assert_eq!(decision.action, DecisionAction::Stay);
            assert_eq!(decision.retry_count_after, 0);
        }

        #[test]
        fn gap_builder_ignores_unfinished_stage() {
            let state = without_pain_points(3);
            let thin = ComprehensionSignal::default().with_richness(Richness::Thin);
            let decision = gated_engine().decide(&state, &thin, Duration::from_secs(60));
            assert_eq!(decision.rule, RuleId::ThinResponse);
            assert_eq!(decision.action, DecisionAction::Probe);
            assert_eq!(decision.retry_count_after, 1);
        }

        #[test]
        fn gap_builder_lets_go_when_prospect_repeats() {
            let mut state = without_pain_points(3);
            state.no_new_info_streak = 2;
            let decision = gated_engine().decide(&state, &all_met(Stage::ProblemAwareness), Duration::from_secs(60));
            assert_eq!(decision.rule, RuleId::ExitCriteria);
            assert_eq!(decision.action, DecisionAction::Advance);
            assert_eq!(decision.target_stage, Stage::SolutionAwareness);
        }

        #[test]
        fn standard_catalog_requires_no_profile_fields() {
            assert!(PhaseCatalog::standard()
                .specs()
                .iter()
                .all(|spec| spec.required_profile_fields.is_empty()));
        }

        #[test]
        fn minimum_turns_block_advance() {
            let decision = decide(&state_at(Stage::Connection, 1), &all_met(Stage::Connection));
            assert_eq!(decision.rule, RuleId::MinimumTurns);
            assert_eq!(decision.action, DecisionAction::Stay);
            assert_eq!(decision.retry_count_after, 0);
        }
    }

    mod advancing {
        use super::*;

        #[test]
        fn all_met_advances_with_zero_retry() {
            let mut state = state_at(Stage::Connection, 2);
            state.retry_count = 2;
            let decision = decide(&state, &all_met(Stage::Connection));
            assert_eq!(decision.action, DecisionAction::Advance);
            assert_eq!(decision.target_stage, Stage::Situation);
            assert_eq!(decision.retry_count_after, 0);
        }

        #[test]
        fn depth_gate_holds_shallow_pre_closing() {
            let mut state = state_at(Stage::Consequence, 3);
            state.deepest_depth = Depth::Surface;
            let decision = decide(&state, &all_met(Stage::Consequence));
            assert_eq!(decision.rule, RuleId::ExitCriteria);
            assert_eq!(decision.action, DecisionAction::Stay);
            assert_eq!(decision.retry_count_after, 0);
        }

        #[test]
        fn depth_gate_thresholds() {
            let cases = [
                (Depth::Deep, 2, DecisionAction::Advance),
                (Depth::Moderate, 2, DecisionAction::Stay),
                (Depth::Moderate, 3, DecisionAction::Advance),
                (Depth::Surface, 3, DecisionAction::Stay),
                (Depth::Surface, 4, DecisionAction::Advance),
            ];
            for (depth, turns, expected) in cases {
                let mut state = state_at(Stage::Consequence, turns);
                state.deepest_depth = depth;
                let decision = decide(&state, &all_met(Stage::Consequence));
                assert_eq!(decision.action, expected, "{:?} after {} turns", depth, turns);
            }
        }

        #[test]
        fn depth_gate_only_applies_to_pre_closing() {
            let state = state_at(Stage::SolutionAwareness, 2);
            let decision = decide(&state, &all_met(Stage::SolutionAwareness));
            assert_eq!(decision.action, DecisionAction::Advance);
        }
    }

    mod closing_ceiling {
        use super::*;

        #[test]
        fn long_closing_stage_stays_with_ceiling_playbook() {
            let mut state = state_at(Stage::Ownership, 8);
            state.retry_count = 1;
            let decision = decide(&state, &ComprehensionSignal::default());
            assert_eq!(decision.rule, RuleId::ClosingCeiling);
            assert_eq!(decision.action, DecisionAction::Stay);
            assert_eq!(decision.retry_count_after, 2);
            assert_eq!(decision.playbook, Some(Playbook::OwnershipCeiling));
            assert_eq!(decision.objection_context.unwrap().kind, ContextKind::Ceiling);
        }

        #[test]
        fn steps_aside_at_hard_ceiling() {
            let mut state = state_at(Stage::Ownership, 12);
            state.retry_count = 8;
            let decision = decide(&state, &ComprehensionSignal::default());
            assert_eq!(decision.rule, RuleId::RetryBudget);
            assert_eq!(decision.action, DecisionAction::Advance);
            assert_eq!(decision.target_stage, Stage::Commitment);
        }

        #[test]
        fn bridge_step_stay_gets_bridge_playbook() {
            let mut state = state_at(Stage::Ownership, 4);
            state.closing.step = ClosingStep::Bridge;
            let decision = decide(&state, &ComprehensionSignal::default());
            assert_eq!(decision.rule, RuleId::DefaultStay);
            assert_eq!(decision.playbook, Some(Playbook::BridgeWithTheirWords));
        }
    }

    mod stuck {
        use super::*;

        #[test]
        fn thin_reply_in_critical_stage_probes_most_evidenced() {
            let signal = ComprehensionSignal::default()
                .with_richness(Richness::Thin)
                .with_criteria(
                    CriteriaMap::new().with(CriterionId::PainIsCurrent, CriterionResult::partial("last week")),
                );
            let decision = decide(&state_at(Stage::ProblemAwareness, 3), &signal);
            assert_eq!(decision.action, DecisionAction::Probe);
            assert_eq!(decision.probe_target, Some(CriterionId::PainIsCurrent));
            assert_eq!(decision.retry_count_after, 1);
        }

        #[test]
        fn thin_reply_at_hard_ceiling_is_forced_on() {
            let mut state = state_at(Stage::ProblemAwareness, 8);
            state.retry_count = spec(Stage::ProblemAwareness).max_retries + 2;
            let signal = ComprehensionSignal::default().with_richness(Richness::Thin);
            let decision = decide(&state, &signal);
            assert_eq!(decision.rule, RuleId::RetryBudget);
            assert_eq!(decision.action, DecisionAction::Advance);
            assert_eq!(decision.target_stage, Stage::SolutionAwareness);
        }

        #[test]
        fn repetition_at_hard_ceiling_defers_to_retry_budget() {
            let mut state = state_at(Stage::Connection, 8);
            state.no_new_info_streak = 4;
            state.retry_count = spec(Stage::Connection).max_retries + 2;
            let decision = decide(&state, &ComprehensionSignal::default());
            assert_eq!(decision.rule, RuleId::RetryBudget);
            assert_eq!(decision.action, DecisionAction::Advance);
        }

        #[test]
        fn thin_reply_elsewhere_does_not_probe() {
            let signal = ComprehensionSignal::default().with_richness(Richness::Thin);
            let decision = decide(&state_at(Stage::Situation, 3), &signal);
            assert_eq!(decision.rule, RuleId::DefaultStay);
        }

        #[test]
        fn repetition_with_low_fraction_breaks_glass() {
            let mut state = state_at(Stage::Connection, 3);
            state.no_new_info_streak = 2;
            state.retry_count = 1;
            let signal = ComprehensionSignal::default().with_criteria(
                CriteriaMap::new().with(CriterionId::RoleShared, CriterionResult::met("ops")),
            );
            let decision = decide(&state, &signal);
            assert_eq!(decision.action, DecisionAction::BreakGlass);
            assert_eq!(decision.retry_count_after, 2);
        }

        #[test]
        fn repetition_with_half_met_forces_advance() {
            let mut state = state_at(Stage::Situation, 3);
            state.no_new_info_streak = 2;
            let signal = ComprehensionSignal::default().with_criteria(
                CriteriaMap::new().with(CriterionId::WorkflowDescribed, CriterionResult::met("spreadsheets")),
            );
            let decision = decide(&state, &signal);
            assert_eq!(decision.rule, RuleId::Repetition);
            assert_eq!(decision.action, DecisionAction::Advance);
            assert_eq!(decision.retry_count_after, 0);
        }

        #[test]
        fn retry_budget_breaks_glass_then_hard_ceiling_advances() {
            let budget = spec(Stage::Situation).max_retries;
            let mut state = state_at(Stage::Situation, 5);
            state.retry_count = budget;
            let decision = decide(&state, &ComprehensionSignal::default());
            assert_eq!(decision.action, DecisionAction::BreakGlass);
            assert_eq!(decision.retry_count_after, budget + 1);

            state.retry_count = budget + 2;
            let decision = decide(&state, &ComprehensionSignal::default());
            assert_eq!(decision.action, DecisionAction::Advance);
            assert_eq!(decision.retry_count_after, 0);
        }

        #[test]
        fn forced_advance_out_of_last_stage_ends() {
            let mut state = state_at(Stage::Commitment, 5);
            state.retry_count = 7;
            let decision = decide(&state, &ComprehensionSignal::default());
            assert_eq!(decision.action, DecisionAction::End);
            assert_eq!(decision.target_stage, Stage::Terminated);
        }

        #[test]
        fn default_stays_and_counts_retry() {
            let decision = decide(&state_at(Stage::Situation, 3), &ComprehensionSignal::default());
            assert_eq!(decision.rule, RuleId::DefaultStay);
            assert_eq!(decision.action, DecisionAction::Stay);
            assert_eq!(decision.retry_count_after, 1);
            assert_eq!(decision.probe_target, Some(CriterionId::WorkflowDescribed));
        }
    }

    mod construction {
        use super::*;

        #[test]
        fn rejects_incomplete_catalog() {
            let specs = PhaseCatalog::standard().specs()[..3].to_vec();
            let result = DecisionEngine::new(
                PhaseCatalog::from_specs(specs),
                ObjectionRouter::standard(),
                EngineThresholds::default(),
            );
            assert!(matches!(result, Err(CatalogError::MissingStage(Stage::SolutionAwareness))));
        }

        #[test]
        fn evaluate_leaves_input_untouched() {
            let state = state_at(Stage::Connection, 2);
            let (decision, next) = engine().evaluate(&state, &all_met(Stage::Connection), Duration::ZERO);
            assert_eq!(decision.action, DecisionAction::Advance);
            assert_eq!(state.stage, Stage::Connection);
            assert_eq!(next.stage, Stage::Situation);
            assert_eq!(next.turns_in_stage, 0);
        }
    }

    mod invariants {
        use super::*;

        fn any_stage() -> impl Strategy<Value = Stage> {
            (0u8..7).prop_map(|i| Stage::SEQUENCE[i as usize])
        }

        fn any_signal() -> impl Strategy<Value = ComprehensionSignal> {
            (
                prop_oneof![
                    Just(UserIntent::DirectAnswer),
                    Just(UserIntent::Agreement),
                    Just(UserIntent::Objection),
                    Just(UserIntent::Confusion),
                    Just(UserIntent::Refusal),
                    Just(UserIntent::Pushback),
                ],
                prop_oneof![
                    Just(ObjectionCategory::None),
                    Just(ObjectionCategory::Price),
                    Just(ObjectionCategory::Timing),
                    Just(ObjectionCategory::Authority),
                    Just(ObjectionCategory::Need),
                ],
                prop_oneof![Just(Richness::Thin), Just(Richness::Moderate), Just(Richness::Rich)],
                any::<bool>(),
                proptest::collection::vec(any::<bool>(), 4),
            )
                .prop_map(|(intent, objection, richness, new_info, met)| {
                    let mut signal = ComprehensionSignal::default()
                        .with_intent(intent)
                        .with_richness(richness)
                        .with_new_information(new_info);
                    signal.objection = objection;
                    for (id, is_met) in CriterionId::ALL.iter().zip(met.iter().cycle()) {
                        if *is_met {
                            signal.criteria.insert(*id, CriterionResult::met("x"));
                        }
                    }
                    signal
                })
        }

        fn any_state() -> impl Strategy<Value = SessionState> {
            (any_stage(), 0u32..12, 0u32..10, 0u32..4, any::<bool>()).prop_map(
                |(stage, turns, retries, streak, has_pain)| {
                    let mut state = state_at(stage, turns);
                    state.retry_count = retries;
                    state.no_new_info_streak = streak;
                    if !has_pain {
                        state.profile.pain_points.clear();
                    }
                    state
                },
            )
        }

        proptest! {
            #[test]
            fn retry_resets_iff_stage_changes(state in any_state(), signal in any_signal()) {
                let decision = decide(&state, &signal);
                if decision.action.changes_stage() {
                    prop_assert_eq!(decision.retry_count_after, 0);
                } else {
                    let delta = decision.retry_count_after as i64 - state.retry_count as i64;
                    prop_assert!(delta == 0 || delta == 1, "delta {} for {:?}", delta, decision.rule);
                }
            }

            #[test]
            fn never_advances_before_min_turns(state in any_state(), signal in any_signal()) {
                let min_turns = spec(state.stage).min_turns;
                let decision = decide(&state, &signal);
                if state.turns_in_stage < min_turns {
                    prop_assert_ne!(decision.action, DecisionAction::Advance);
                }
            }

            #[test]
            fn decide_is_deterministic(state in any_state(), signal in any_signal()) {
                prop_assert_eq!(decide(&state, &signal), decide(&state, &signal));
            }

            #[test]
            fn reroute_only_goes_backward(state in any_state(), signal in any_signal()) {
                let decision = decide(&state, &signal);
                if decision.action == DecisionAction::Reroute {
                    prop_assert!(decision.target_stage.precedes(&state.stage));
                }
            }
        }
    }
}
