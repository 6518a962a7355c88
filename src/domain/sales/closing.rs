//! Closing sequence sub-machine.
//!
//! Runs only inside the closing stage. The six steps are: ask the
//! commitment question, let the prospect persuade themselves, bridge with
//! their own words, present the offer with price, handle the objection,
//! then close or fall back to the lighter offer.

use serde::{Deserialize, Serialize};

use super::criteria::CriterionId;
use super::signal::{ComprehensionSignal, DiffusionHint, UserIntent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosingStep {
    #[default]
    NotStarted,
    CommitmentQuestion,
    SelfPersuasion,
    Bridge,
    PresentOffer,
    ObjectionHandling,
    CloseOrFallback,
}

impl ClosingStep {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// Closing step plus the self-persuasion probe counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClosingSequence {
    pub step: ClosingStep,
    pub probe_attempts: u32,
}

impl ClosingSequence {
    /// Computes the sequence after one closing-stage turn.
    pub fn advance(self, signal: &ComprehensionSignal, max_probe_attempts: u32) -> Self {
        let met = |id| signal.criteria.is_met(id);
        let positive = signal.is_agreeing() && !signal.has_objection();

        match self.step {
            ClosingStep::NotStarted => self.moved(ClosingStep::CommitmentQuestion),
            ClosingStep::CommitmentQuestion => {
                if met(CriterionId::CommitmentQuestionAsked) && positive {
                    self.moved(ClosingStep::SelfPersuasion)
                } else {
                    self
                }
            }
            ClosingStep::SelfPersuasion => {
                if met(CriterionId::ProspectSelfPersuaded) {
                    self.moved(ClosingStep::PresentOffer)
                } else if signal.is_thin() {
                    self.moved(ClosingStep::Bridge)
                } else {
                    let attempts = self.probe_attempts + 1;
                    if attempts >= max_probe_attempts {
                        self.moved(ClosingStep::Bridge)
                    } else {
                        Self {
                            probe_attempts: attempts,
                            ..self
                        }
                    }
                }
            }
            ClosingStep::Bridge => self.moved(ClosingStep::PresentOffer),
            ClosingStep::PresentOffer if met(CriterionId::PriceStated) => {
                if signal.has_objection() {
                    self.moved(ClosingStep::ObjectionHandling)
                } else if signal.intent == UserIntent::Agreement || met(CriterionId::DefinitiveResponse) {
                    self.moved(ClosingStep::CloseOrFallback)
                } else {
                    self
                }
            }
            ClosingStep::PresentOffer => self,
            ClosingStep::ObjectionHandling => {
                if signal.diffusion == DiffusionHint::Resolved || signal.intent == UserIntent::Agreement {
                    self.moved(ClosingStep::CloseOrFallback)
                } else {
                    self
                }
            }
            ClosingStep::CloseOrFallback => self,
        }
    }

    fn moved(self, step: ClosingStep) -> Self {
        Self {
            step,
            probe_attempts: if step == ClosingStep::SelfPersuasion {
                self.probe_attempts
            } else {
                0
            },
        }
    }
}
