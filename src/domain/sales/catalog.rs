//! The static stage catalog.
//!
//! One [`StageSpec`] per non-terminal stage: its exit criteria, dwell time,
//! retry budget, and the gap-builder fields the prospect profile must hold
//! before the stage can be entered. The catalog is built once, validated at
//! startup, and shared read-only afterwards.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;

use super::criteria::CriterionId;
use super::profile::ProfileField;
use super::signal::ObjectionCategory;
use super::stage::Stage;

/// Length guidance handed through to the Response collaborator untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResponseLength {
    pub max_sentences: u8,
    pub max_questions: u8,
}

impl ResponseLength {
    pub const fn new(max_sentences: u8, max_questions: u8) -> Self {
        Self {
            max_sentences,
            max_questions,
        }
    }
}

/// Rules for one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSpec {
    pub stage: Stage,
    pub purpose: &'static str,
    /// Exit criteria in priority order.
    pub exit_criteria: Vec<CriterionId>,
    /// Turns that must pass before the stage may be left on merit.
    pub min_turns: u32,
    pub max_retries: u32,
    /// Thin replies here are probed instead of waited out.
    pub critical: bool,
    /// Profile fields that must be known before this stage can be entered.
    pub required_profile_fields: Vec<ProfileField>,
    pub response_length: ResponseLength,
}

/// Errors raised when a catalog fails startup validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog has no entry for stage {0}")]
    MissingStage(Stage),

    #[error("catalog lists stage {0} more than once")]
    DuplicateStage(Stage),

    #[error("catalog entry for terminal stage {0} is not allowed")]
    TerminalEntry(Stage),

    #[error("stage {0} has no exit criteria")]
    NoExitCriteria(Stage),

    #[error("criterion {criterion} listed under {stage} belongs to {owner}")]
    ForeignCriterion {
        stage: Stage,
        criterion: CriterionId,
        owner: Stage,
    },

    #[error("stage {0} has a zero retry budget")]
    ZeroRetryBudget(Stage),

    #[error("objection {objection} cannot route to {stage}")]
    InvalidRoute {
        objection: ObjectionCategory,
        stage: Stage,
    },
}

/// Ordered table of stage rules.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseCatalog {
    specs: Vec<StageSpec>,
}

static STANDARD: Lazy<PhaseCatalog> = Lazy::new(PhaseCatalog::build_standard);

impl PhaseCatalog {
    /// Builds a catalog from explicit entries. Call [`validate`](Self::validate) before use.
    pub fn from_specs(specs: Vec<StageSpec>) -> Self {
        Self { specs }
    }

    /// The built-in NEPQ catalog.
    pub fn standard() -> &'static PhaseCatalog {
        &STANDARD
    }

    pub fn spec(&self, stage: Stage) -> Option<&StageSpec> {
        self.specs.iter().find(|s| s.stage == stage)
    }

    pub fn specs(&self) -> &[StageSpec] {
        &self.specs
    }

    /// Checks the catalog covers every stage exactly once with sane values.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = BTreeSet::new();
        for spec in &self.specs {
            if spec.stage.is_terminal() {
                return Err(CatalogError::TerminalEntry(spec.stage));
            }
            if !seen.insert(spec.stage) {
                return Err(CatalogError::DuplicateStage(spec.stage));
            }
            if spec.exit_criteria.is_empty() {
                return Err(CatalogError::NoExitCriteria(spec.stage));
            }
            if spec.max_retries == 0 {
                return Err(CatalogError::ZeroRetryBudget(spec.stage));
            }
            if let Some(criterion) = spec
                .exit_criteria
                .iter()
                .find(|c| c.owning_stage() != spec.stage)
            {
                return Err(CatalogError::ForeignCriterion {
                    stage: spec.stage,
                    criterion: *criterion,
                    owner: criterion.owning_stage(),
                });
            }
        }
        match Stage::SEQUENCE.iter().find(|s| !seen.contains(s)) {
            Some(missing) => Err(CatalogError::MissingStage(*missing)),
            None => Ok(()),
        }
    }

    fn build_standard() -> Self {
        use CriterionId::*;

        Self::from_specs(vec![
            StageSpec {
                stage: Stage::Connection,
                purpose: "Learn who they are and why they are here.",
                exit_criteria: vec![RoleShared, CompanyOrIndustryShared, AiInterestStated],
                min_turns: 2,
                max_retries: 3,
                critical: false,
                required_profile_fields: vec![],
                response_length: ResponseLength::new(3, 1),
            },
            StageSpec {
                stage: Stage::Situation,
                purpose: "Map their current operations.",
                exit_criteria: vec![WorkflowDescribed, ConcreteDetailShared],
                min_turns: 2,
                max_retries: 3,
                critical: false,
                required_profile_fields: vec![],
                response_length: ResponseLength::new(3, 1),
            },
            StageSpec {
                stage: Stage::ProblemAwareness,
                purpose: "Surface a real, current pain in their own words.",
                exit_criteria: vec![SpecificPainArticulated, PainIsCurrent],
                min_turns: 2,
                max_retries: 4,
                critical: true,
                required_profile_fields: vec![],
                response_length: ResponseLength::new(3, 1),
            },
            StageSpec {
                stage: Stage::SolutionAwareness,
                purpose: "Have them picture the better future and the gap to it.",
                exit_criteria: vec![DesiredStateDescribed, GapIsClear],
                min_turns: 2,
                max_retries: 3,
                critical: false,
                required_profile_fields: vec![],
                response_length: ResponseLength::new(3, 1),
            },
            StageSpec {
                stage: Stage::Consequence,
                purpose: "Make the cost of doing nothing real and personal.",
                exit_criteria: vec![CostAcknowledged, UrgencyFelt],
                min_turns: 2,
                max_retries: 4,
                critical: true,
                required_profile_fields: vec![],
                response_length: ResponseLength::new(3, 1),
            },
            StageSpec {
                stage: Stage::Ownership,
                purpose: "Present the offer, handle objections, get a definitive answer.",
                exit_criteria: vec![
                    CommitmentQuestionAsked,
                    ProspectSelfPersuaded,
                    PriceStated,
                    DefinitiveResponse,
                ],
                min_turns: 3,
                max_retries: 6,
                critical: true,
                required_profile_fields: vec![],
                response_length: ResponseLength::new(5, 1),
            },
            StageSpec {
                stage: Stage::Commitment,
                purpose: "Collect contact details and send the link.",
                exit_criteria: vec![PositiveSignalOrHardNo, EmailCollected, PhoneCollected, LinkSent],
                min_turns: 1,
                max_retries: 5,
                critical: false,
                required_profile_fields: vec![],
                response_length: ResponseLength::new(3, 1),
            },
        ])
    }
}
