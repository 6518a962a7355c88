//! The engine's per-turn output.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::criteria::CriterionId;
use super::playbook::Playbook;
use super::signal::ObjectionCategory;
use super::stage::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionAction {
    Advance,
    Stay,
    Probe,
    Reroute,
    BreakGlass,
    End,
}

impl DecisionAction {
    /// Actions that move the conversation to a different stage.
    pub fn changes_stage(&self) -> bool {
        matches!(self, DecisionAction::Advance | DecisionAction::Reroute)
    }
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DecisionAction::Advance => "ADVANCE",
            DecisionAction::Stay => "STAY",
            DecisionAction::Probe => "PROBE",
            DecisionAction::Reroute => "REROUTE",
            DecisionAction::BreakGlass => "BREAK_GLASS",
            DecisionAction::End => "END",
        };
        f.write_str(s)
    }
}

/// Why the engine is staying with (or routing away from) an objection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextKind {
    /// Late-stage objection: work the diffusion protocol.
    Diffuse,
    /// Someone else decides: clarify the decision process.
    Authority,
    /// An objection voiced while agreeing.
    Caveat,
    /// Routed back to the stage that addresses it.
    Reroute,
    /// No earlier stage addresses it: handle it here.
    InPlace,
    /// The prospect did not follow.
    Confusion,
    /// Too long in the closing stage.
    Ceiling,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectionContext {
    pub kind: ContextKind,
    pub objection: ObjectionCategory,
    pub detail: Option<String>,
}

impl ObjectionContext {
    pub fn new(kind: ContextKind, objection: ObjectionCategory, detail: Option<String>) -> Self {
        Self {
            kind,
            objection,
            detail,
        }
    }

    /// Context with no objection behind it.
    pub fn bare(kind: ContextKind) -> Self {
        Self::new(kind, ObjectionCategory::None, None)
    }
}

/// The numbered engine check that produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    SessionCeiling,
    TerminalStage,
    Objection,
    Confusion,
    GapBuilder,
    MinimumTurns,
    ExitCriteria,
    ClosingCeiling,
    ThinResponse,
    Repetition,
    RetryBudget,
    DefaultStay,
}

impl RuleId {
    /// Position in the priority order, starting at 1.
    pub fn check_number(&self) -> u8 {
        *self as u8 + 1
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "check {} ({:?})", self.check_number(), self)
    }
}

/// One turn's verdict, handed to the Response collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    pub target_stage: Stage,
    pub reason: String,
    pub objection_context: Option<ObjectionContext>,
    pub probe_target: Option<CriterionId>,
    pub retry_count_after: u32,
    pub playbook: Option<Playbook>,
    pub rule: RuleId,
}

impl Decision {
    pub fn new(
        rule: RuleId,
        action: DecisionAction,
        target_stage: Stage,
        retry_count_after: u32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            action,
            target_stage,
            reason: reason.into(),
            objection_context: None,
            probe_target: None,
            retry_count_after,
            playbook: None,
            rule,
        }
    }

    pub fn with_context(mut self, context: ObjectionContext) -> Self {
        self.objection_context = Some(context);
        self
    }

    pub fn with_probe_target(mut self, target: Option<CriterionId>) -> Self {
        self.probe_target = target;
        self
    }

    pub fn with_playbook(mut self, playbook: Option<Playbook>) -> Self {
        self.playbook = playbook;
        self
    }

    pub fn is_end(&self) -> bool {
        self.action == DecisionAction::End
    }
}
