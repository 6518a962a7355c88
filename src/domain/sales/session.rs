//! Per-conversation state.
//!
//! A [`SessionState`] is created at the first stage with every counter at
//! zero, updated by the tracker once per turn, then by
//! [`apply_decision`](SessionState::apply_decision). Stage-scoped counters
//! reset only when a decision moves the conversation to another stage.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{SessionId, SessionStatus, StateMachine, Timestamp, ValidationError};

use super::closing::ClosingSequence;
use super::decision::{Decision, DecisionAction};
use super::diffusion::DiffusionStep;
use super::playbook::{Playbook, PlaybookLedger};
use super::profile::ProspectProfile;
use super::signal::Depth;
use super::stage::Stage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub started_at: Timestamp,
    pub last_turn_at: Option<Timestamp>,

    pub stage: Stage,
    pub retry_count: u32,
    pub turns_in_stage: u32,
    pub turn_number: u32,
    pub no_new_info_streak: u32,
    pub consecutive_thin_turns: u32,

    /// Deepest emotional depth seen in the current stage.
    pub deepest_depth: Depth,
    pub diffusion_step: DiffusionStep,
    /// Set once diffusion reaches `Resolved` in the current stage.
    pub full_diffusion_reached: bool,
    pub closing: ClosingSequence,

    pub profile: ProspectProfile,
    pub playbooks: PlaybookLedger,
}

/// What applying a decision did to the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedDecision {
    pub stage_changed: Option<(Stage, Stage)>,
    pub ended: bool,
    pub retired_playbook: Option<Playbook>,
}

impl SessionState {
    pub fn new(session_id: SessionId, started_at: Timestamp) -> Self {
        Self {
            session_id,
            status: SessionStatus::Active,
            started_at,
            last_turn_at: None,
            stage: Stage::default(),
            retry_count: 0,
            turns_in_stage: 0,
            turn_number: 0,
            no_new_info_streak: 0,
            consecutive_thin_turns: 0,
            deepest_depth: Depth::Surface,
            diffusion_step: DiffusionStep::Idle,
            full_diffusion_reached: false,
            closing: ClosingSequence::default(),
            profile: ProspectProfile::default(),
            playbooks: PlaybookLedger::default(),
        }
    }

    /// Creates a fresh session starting now.
    pub fn start() -> Self {
        Self::new(SessionId::new(), Timestamp::now())
    }

    pub fn is_closed(&self) -> bool {
        !self.status.is_mutable()
    }

    /// Applies the engine's decision.
    pub fn apply_decision(&mut self, decision: &Decision) -> AppliedDecision {
        let mut applied = AppliedDecision {
            retired_playbook: self.playbooks.record(decision.playbook),
            ..Default::default()
        };
        self.retry_count = decision.retry_count_after;

        match decision.action {
            DecisionAction::Advance | DecisionAction::Reroute if decision.target_stage != self.stage => {
                applied.stage_changed = Some((self.stage, decision.target_stage));
                self.enter_stage(decision.target_stage);
            }
            DecisionAction::End => {
                self.stage = decision.target_stage;
                self.status = self
                    .status
                    .transition_to(SessionStatus::Completed)
                    .unwrap_or(self.status);
                applied.ended = true;
            }
            _ => {}
        }
        applied
    }

    /// Marks the session abandoned. Fails if it is already closed.
    pub fn abandon(&mut self) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(SessionStatus::Abandoned)?;
        Ok(())
    }

    fn enter_stage(&mut self, stage: Stage) {
        self.stage = stage;
        self.turns_in_stage = 0;
        self.deepest_depth = Depth::Surface;
        self.diffusion_step = DiffusionStep::Idle;
        self.full_diffusion_reached = false;
        self.closing = ClosingSequence::default();
    }
}
