//! Guided sales conversation domain.
//!
//! The decision engine and everything it reads: the stage catalog, the
//! per-turn comprehension signal, the session state with its two
//! sub-machines, and the situation overlay. Everything here is synchronous
//! and free of I/O.
//!
//! A turn flows through [`TurnPipeline::run_turn`]:
//! signal → [`StateTracker`] → [`DecisionEngine`] → [`SituationOverlay`] →
//! [`SessionState::apply_decision`].

mod catalog;
mod closing;
mod criteria;
mod decision;
mod diffusion;
mod engine;
mod overlay;
mod pipeline;
mod playbook;
mod profile;
mod router;
mod session;
mod signal;
mod stage;
mod tracker;

pub use catalog::{CatalogError, PhaseCatalog, ResponseLength, StageSpec};
pub use closing::{ClosingSequence, ClosingStep};
pub use criteria::{CriteriaEvaluation, CriteriaMap, CriterionId, CriterionResult, ExitCriteriaEvaluator};
pub use decision::{ContextKind, Decision, DecisionAction, ObjectionContext, RuleId};
pub use diffusion::DiffusionStep;
pub use engine::{DecisionEngine, DecisionRule, EngineThresholds, RuleContext};
pub use overlay::{OverlayContext, PlaybookTrigger, SituationOverlay, STANDARD_TRIGGERS};
pub use pipeline::{TurnOutcome, TurnPipeline};
pub use playbook::{Playbook, PlaybookLedger, PlaybookSpec};
pub use profile::{ProfileDelta, ProfileField, ProspectProfile};
pub use router::{ObjectionRouter, Route};
pub use session::{AppliedDecision, SessionState};
pub use signal::{ComprehensionSignal, Depth, DiffusionHint, ObjectionCategory, Richness, UserIntent};
pub use stage::Stage;
pub use tracker::StateTracker;
