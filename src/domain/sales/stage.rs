//! Conversation stages.
//!
//! Stages are the fixed NEPQ sequence a guided sales conversation walks
//! through. Their per-stage rules (criteria, dwell time, retry budget) live in
//! the [`PhaseCatalog`](super::PhaseCatalog); this module only knows the order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// A stage of the guided conversation.
///
/// The sequence is strictly ordered:
/// `Connection` → `Situation` → `ProblemAwareness` → `SolutionAwareness`
/// → `Consequence` → `Ownership` → `Commitment` → `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    /// Rapport, role and company context.
    #[default]
    Connection,
    /// Current operations and workflow.
    Situation,
    /// A real pain point in the prospect's own words.
    ProblemAwareness,
    /// The desired future state and the gap to it.
    SolutionAwareness,
    /// The cost of doing nothing.
    Consequence,
    /// Offer, price, and the closing sequence.
    Ownership,
    /// Contact details and link delivery.
    Commitment,
    /// Conversation over. Has no successor.
    Terminated,
}

impl Stage {
    /// Non-terminal stages in conversation order.
    pub const SEQUENCE: [Stage; 7] = [
        Stage::Connection,
        Stage::Situation,
        Stage::ProblemAwareness,
        Stage::SolutionAwareness,
        Stage::Consequence,
        Stage::Ownership,
        Stage::Commitment,
    ];

    /// Position in the sequence, `None` for the terminal stage.
    pub fn ordinal(&self) -> Option<u8> {
        Self::SEQUENCE
            .iter()
            .position(|s| s == self)
            .map(|i| i as u8)
    }

    /// Looks a stage up by ordinal.
    pub fn from_ordinal(ordinal: u8) -> Result<Self, ValidationError> {
        Self::SEQUENCE
            .get(ordinal as usize)
            .copied()
            .ok_or_else(|| {
                ValidationError::out_of_range(
                    "stage_ordinal",
                    0,
                    Self::SEQUENCE.len() as i32 - 1,
                    i32::from(ordinal),
                )
            })
    }

    /// The following stage; the last ordinal and the terminal stage lead to `Terminated`.
    pub fn next(&self) -> Stage {
        self.ordinal()
            .and_then(|i| Self::SEQUENCE.get(i as usize + 1).copied())
            .unwrap_or(Stage::Terminated)
    }

    /// Returns true if `self` sits strictly before `other` in the sequence.
    ///
    /// The terminal stage is never before anything.
    pub fn precedes(&self, other: &Stage) -> bool {
        match (self.ordinal(), other.ordinal()) {
            (Some(a), Some(b)) => a < b,
            (Some(_), None) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Terminated)
    }

    /// Late stages handle objections in place and never reroute backward.
    pub fn is_late(&self) -> bool {
        matches!(self, Stage::Ownership | Stage::Commitment)
    }

    /// The stage that runs the closing sequence sub-protocol.
    pub fn is_closing_sequence(&self) -> bool {
        matches!(self, Stage::Ownership)
    }

    /// The emotional stage whose exit into the closing stage is depth-gated.
    pub fn is_pre_closing(&self) -> bool {
        matches!(self, Stage::Consequence)
    }

    /// Wire name, as used by the Comprehension and Response collaborators.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Connection => "CONNECTION",
            Stage::Situation => "SITUATION",
            Stage::ProblemAwareness => "PROBLEM_AWARENESS",
            Stage::SolutionAwareness => "SOLUTION_AWARENESS",
            Stage::Consequence => "CONSEQUENCE",
            Stage::Ownership => "OWNERSHIP",
            Stage::Commitment => "COMMITMENT",
            Stage::Terminated => "TERMINATED",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::SEQUENCE
            .iter()
            .chain(std::iter::once(&Stage::Terminated))
            .find(|stage| stage.as_str() == wanted)
            .copied()
            .ok_or_else(|| ValidationError::unknown_stage(s))
    }
}
