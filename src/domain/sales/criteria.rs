//! Exit criteria and their evaluation.
//!
//! Each stage names a closed set of [`CriterionId`]s. The Comprehension
//! collaborator reports a [`CriterionResult`] per criterion; the
//! [`ExitCriteriaEvaluator`] turns that report into the numbers the decision
//! rules read.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::catalog::StageSpec;
use super::stage::Stage;

/// A named, boolean exit condition of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionId {
    // Connection
    RoleShared,
    CompanyOrIndustryShared,
    AiInterestStated,
    // Situation
    WorkflowDescribed,
    ConcreteDetailShared,
    // Problem awareness
    SpecificPainArticulated,
    PainIsCurrent,
    // Solution awareness
    DesiredStateDescribed,
    GapIsClear,
    // Consequence
    CostAcknowledged,
    UrgencyFelt,
    // Ownership
    CommitmentQuestionAsked,
    ProspectSelfPersuaded,
    PriceStated,
    DefinitiveResponse,
    // Commitment
    PositiveSignalOrHardNo,
    EmailCollected,
    PhoneCollected,
    LinkSent,
}

impl CriterionId {
    pub const ALL: [CriterionId; 19] = [
        CriterionId::RoleShared,
        CriterionId::CompanyOrIndustryShared,
        CriterionId::AiInterestStated,
        CriterionId::WorkflowDescribed,
        CriterionId::ConcreteDetailShared,
        CriterionId::SpecificPainArticulated,
        CriterionId::PainIsCurrent,
        CriterionId::DesiredStateDescribed,
        CriterionId::GapIsClear,
        CriterionId::CostAcknowledged,
        CriterionId::UrgencyFelt,
        CriterionId::CommitmentQuestionAsked,
        CriterionId::ProspectSelfPersuaded,
        CriterionId::PriceStated,
        CriterionId::DefinitiveResponse,
        CriterionId::PositiveSignalOrHardNo,
        CriterionId::EmailCollected,
        CriterionId::PhoneCollected,
        CriterionId::LinkSent,
    ];

    /// Wire key used in criteria maps.
    pub fn as_str(&self) -> &'static str {
        match self {
            CriterionId::RoleShared => "role_shared",
            CriterionId::CompanyOrIndustryShared => "company_or_industry_shared",
            CriterionId::AiInterestStated => "ai_interest_stated",
            CriterionId::WorkflowDescribed => "workflow_described",
            CriterionId::ConcreteDetailShared => "concrete_detail_shared",
            CriterionId::SpecificPainArticulated => "specific_pain_articulated",
            CriterionId::PainIsCurrent => "pain_is_current",
            CriterionId::DesiredStateDescribed => "desired_state_described",
            CriterionId::GapIsClear => "gap_is_clear",
            CriterionId::CostAcknowledged => "cost_acknowledged",
            CriterionId::UrgencyFelt => "urgency_felt",
            CriterionId::CommitmentQuestionAsked => "commitment_question_asked",
            CriterionId::ProspectSelfPersuaded => "prospect_self_persuaded",
            CriterionId::PriceStated => "price_stated",
            CriterionId::DefinitiveResponse => "definitive_response",
            CriterionId::PositiveSignalOrHardNo => "positive_signal_or_hard_no",
            CriterionId::EmailCollected => "email_collected",
            CriterionId::PhoneCollected => "phone_collected",
            CriterionId::LinkSent => "link_sent",
        }
    }

    /// The stage whose exit set contains this criterion.
    pub fn owning_stage(&self) -> Stage {
        use CriterionId::*;
        match self {
            RoleShared | CompanyOrIndustryShared | AiInterestStated => Stage::Connection,
            WorkflowDescribed | ConcreteDetailShared => Stage::Situation,
            SpecificPainArticulated | PainIsCurrent => Stage::ProblemAwareness,
            DesiredStateDescribed | GapIsClear => Stage::SolutionAwareness,
            CostAcknowledged | UrgencyFelt => Stage::Consequence,
            CommitmentQuestionAsked | ProspectSelfPersuaded | PriceStated | DefinitiveResponse => {
                Stage::Ownership
            }
            PositiveSignalOrHardNo | EmailCollected | PhoneCollected | LinkSent => Stage::Commitment,
        }
    }

    /// Short description of what the prospect must reveal, handed to the
    /// Response collaborator alongside a probe target.
    pub fn guidance(&self) -> &'static str {
        match self {
            CriterionId::RoleShared => "learn what they do and their role",
            CriterionId::CompanyOrIndustryShared => "learn their company or industry",
            CriterionId::AiInterestStated => "learn what brought them to the conversation",
            CriterionId::WorkflowDescribed => "understand how their current process works",
            CriterionId::ConcreteDetailShared => "get a concrete number, tool, or team detail",
            CriterionId::SpecificPainArticulated => "surface a specific problem in their own words",
            CriterionId::PainIsCurrent => "confirm the problem is happening now",
            CriterionId::DesiredStateDescribed => "have them describe what better looks like",
            CriterionId::GapIsClear => "make the gap between now and better explicit",
            CriterionId::CostAcknowledged => "have them acknowledge the cost of doing nothing",
            CriterionId::UrgencyFelt => "let them feel why it matters now",
            CriterionId::CommitmentQuestionAsked => "ask whether they feel this could be the answer",
            CriterionId::ProspectSelfPersuaded => "have them say why they would do it",
            CriterionId::PriceStated => "state the offer and its price",
            CriterionId::DefinitiveResponse => "get a clear yes or no on the offer",
            CriterionId::PositiveSignalOrHardNo => "confirm where they stand",
            CriterionId::EmailCollected => "collect their email",
            CriterionId::PhoneCollected => "collect their phone number",
            CriterionId::LinkSent => "send the link",
        }
    }
}

impl fmt::Display for CriterionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One criterion's report from the Comprehension collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriterionResult {
    pub met: bool,
    pub evidence: Option<String>,
}

impl CriterionResult {
    pub fn met(evidence: impl Into<String>) -> Self {
        Self {
            met: true,
            evidence: Some(evidence.into()),
        }
    }

    pub fn unmet() -> Self {
        Self::default()
    }

    /// Unmet, but with partial evidence.
    pub fn partial(evidence: impl Into<String>) -> Self {
        Self {
            met: false,
            evidence: Some(evidence.into()),
        }
    }

    fn evidence_len(&self) -> usize {
        self.evidence.as_deref().map(str::trim).map_or(0, str::len)
    }
}

/// Criterion reports keyed by wire name.
///
/// Keys are kept as strings so that unknown or foreign criteria in a payload
/// are ignored instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CriteriaMap(BTreeMap<String, CriterionResult>);

impl CriteriaMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: CriterionId, result: CriterionResult) -> Self {
        self.insert(id, result);
        self
    }

    pub fn insert(&mut self, id: CriterionId, result: CriterionResult) {
        self.0.insert(id.as_str().to_string(), result);
    }

    pub fn get(&self, id: CriterionId) -> Option<&CriterionResult> {
        self.0.get(id.as_str())
    }

    /// Missing keys count as unmet.
    pub fn is_met(&self, id: CriterionId) -> bool {
        self.get(id).map_or(false, |r| r.met)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Marks every listed criterion met with a placeholder evidence string.
    pub fn all_met(ids: &[CriterionId]) -> Self {
        ids.iter().fold(Self::new(), |map, id| {
            map.with(*id, CriterionResult::met(id.guidance()))
        })
    }
}

/// Result of scoring a criteria map against one stage's exit set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriteriaEvaluation {
    pub met: Vec<CriterionId>,
    /// Unmet criteria in catalog order.
    pub missing: Vec<CriterionId>,
    /// Unmet criterion with the most evidence behind it.
    pub most_evidenced_missing: Option<CriterionId>,
}

impl CriteriaEvaluation {
    pub fn met_count(&self) -> usize {
        self.met.len()
    }

    pub fn total_count(&self) -> usize {
        self.met.len() + self.missing.len()
    }

    /// An empty exit set is never satisfied.
    pub fn all_met(&self) -> bool {
        self.total_count() > 0 && self.missing.is_empty()
    }

    pub fn fraction(&self) -> f64 {
        match self.total_count() {
            0 => 0.0,
            total => self.met_count() as f64 / total as f64,
        }
    }
}

/// Scores criteria maps against a stage's exit set. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExitCriteriaEvaluator;

impl ExitCriteriaEvaluator {
    pub fn evaluate(&self, spec: &StageSpec, criteria: &CriteriaMap) -> CriteriaEvaluation {
        let (met, missing): (Vec<_>, Vec<_>) = spec
            .exit_criteria
            .iter()
            .copied()
            .partition(|id| criteria.is_met(*id));

        // Longest evidence wins; `max_by_key` keeps the last maximum, so walk
        // in reverse to favour catalog order on ties.
        let most_evidenced_missing = missing
            .iter()
            .rev()
            .filter_map(|id| {
                let len = criteria.get(*id).map_or(0, CriterionResult::evidence_len);
                (len > 0).then_some((*id, len))
            })
            .max_by_key(|(_, len)| *len)
            .map(|(id, _)| id)
            .or_else(|| missing.first().copied());

        CriteriaEvaluation {
            met,
            missing,
            most_evidenced_missing,
        }
    }
}
