//! One turn end to end: track, decide, overlay, apply.

use super::catalog::{CatalogError, PhaseCatalog};
use super::decision::Decision;
use super::engine::{DecisionEngine, EngineThresholds};
use super::overlay::SituationOverlay;
use super::router::ObjectionRouter;
use super::session::{AppliedDecision, SessionState};
use super::signal::ComprehensionSignal;
use super::tracker::StateTracker;
use crate::domain::foundation::Timestamp;

/// Result of running one turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub decision: Decision,
    pub state: SessionState,
    pub applied: AppliedDecision,
}

/// Stateless turn processor, shareable across sessions.
#[derive(Debug)]
pub struct TurnPipeline {
    tracker: StateTracker,
    engine: DecisionEngine,
    overlay: SituationOverlay,
}

impl Default for TurnPipeline {
    fn default() -> Self {
        let engine = DecisionEngine::default();
        Self::from_engine(engine)
    }
}

impl TurnPipeline {
    /// Builds a pipeline, validating the catalog and routes.
    pub fn new(
        catalog: PhaseCatalog,
        router: ObjectionRouter,
        thresholds: EngineThresholds,
    ) -> Result<Self, CatalogError> {
        DecisionEngine::new(catalog, router, thresholds).map(Self::from_engine)
    }

    fn from_engine(engine: DecisionEngine) -> Self {
        let thresholds = engine.thresholds();
        Self {
            tracker: StateTracker::new(thresholds.self_persuasion_attempts),
            overlay: SituationOverlay::new(engine.catalog(), thresholds.thin_streak),
            engine,
        }
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Runs one turn against `state` at time `now`. The input state is not
    /// modified; persist the returned state before the next turn.
    pub fn run_turn(&self, state: &SessionState, signal: &ComprehensionSignal, now: Timestamp) -> TurnOutcome {
        let mut next = state.clone();
        self.tracker.update(&mut next, signal);

        let elapsed = now.elapsed_since(&state.started_at);
        let decision = self.engine.decide(&next, signal, elapsed);
        let decision = self.overlay.apply(&next, signal, decision);

        let applied = next.apply_decision(&decision);
        next.last_turn_at = Some(now);

        if let Some((from, to)) = applied.stage_changed {
            tracing::info!(
                session_id = %next.session_id,
                %from,
                %to,
                action = %decision.action,
                "Stage transition"
            );
        }
        if applied.ended {
            tracing::info!(
                session_id = %next.session_id,
                stage = %next.stage,
                turns = next.turn_number,
                reason = %decision.reason,
                "Session ended"
            );
        }
        if let Some(playbook) = applied.retired_playbook {
            tracing::warn!(session_id = %next.session_id, %playbook, "Playbook retired");
        }

        TurnOutcome {
            decision,
            state: next,
            applied,
        }
    }
}
