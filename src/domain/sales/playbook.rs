//! Scripted micro-strategies and the per-session usage ledger.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::profile::{ProfileField, ProspectProfile};

/// A named micro-strategy the Response collaborator follows for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Playbook {
    ConfusionRecovery,
    BridgeWithTheirWords,
    ResolveAndClose,
    GracefulAlternative,
    DontOversell,
    GracefulExit,
    EnergyShift,
    SpecificProbe,
    OwnershipCeiling,
}

/// Static usage rules for a playbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybookSpec {
    /// Consecutive turns after which the playbook is retired for the session.
    pub max_consecutive_uses: u32,
    /// Whether attaching it forces the action to STAY.
    pub overrides_action: bool,
    pub requires: &'static [ProfileField],
}

impl Playbook {
    pub const ALL: [Playbook; 9] = [
        Playbook::ConfusionRecovery,
        Playbook::BridgeWithTheirWords,
        Playbook::ResolveAndClose,
        Playbook::GracefulAlternative,
        Playbook::DontOversell,
        Playbook::GracefulExit,
        Playbook::EnergyShift,
        Playbook::SpecificProbe,
        Playbook::OwnershipCeiling,
    ];

    pub fn spec(&self) -> PlaybookSpec {
        let (max_consecutive_uses, overrides_action, requires): (u32, bool, &'static [ProfileField]) =
            match self {
                Playbook::ConfusionRecovery => (2, true, &[]),
                Playbook::BridgeWithTheirWords => (1, true, &[ProfileField::PainPoints]),
                Playbook::ResolveAndClose => (1, false, &[]),
                Playbook::GracefulAlternative => (1, true, &[]),
                Playbook::DontOversell => (1, true, &[]),
                Playbook::GracefulExit => (1, true, &[]),
                Playbook::EnergyShift => (1, false, &[]),
                Playbook::SpecificProbe => (2, false, &[]),
                Playbook::OwnershipCeiling => (1, true, &[]),
            };
        PlaybookSpec {
            max_consecutive_uses,
            overrides_action,
            requires,
        }
    }

    /// One-line instruction for the Response collaborator.
    pub fn directive(&self) -> &'static str {
        match self {
            Playbook::ConfusionRecovery => {
                "Apologise briefly, restate the value in one sentence tied to their pain, ask a yes/no question."
            }
            Playbook::BridgeWithTheirWords => {
                "Connect the offer to the pain they described using their exact words, then ask yes/no."
            }
            Playbook::ResolveAndClose => {
                "Ask whether they would move forward if the objection were handled. One question."
            }
            Playbook::GracefulAlternative => {
                "Offer the free workshop as a positive option. One offer, no pressure."
            }
            Playbook::DontOversell => "They are ready. Present the offer and price directly, then stop.",
            Playbook::GracefulExit => "Accept the no warmly, offer one free resource, close.",
            Playbook::EnergyShift => {
                "Acknowledge the questions, share one observation, ask one easier question."
            }
            Playbook::SpecificProbe => "Ask about the most recent concrete time it happened.",
            Playbook::OwnershipCeiling => "Offer the free workshop once, then close either way.",
        }
    }

    /// Returns true if the profile holds everything the playbook templates on.
    pub fn is_supported_by(&self, profile: &ProspectProfile) -> bool {
        profile.first_missing(self.spec().requires).is_none()
    }
}

impl fmt::Display for Playbook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Playbook::ConfusionRecovery => "confusion_recovery",
            Playbook::BridgeWithTheirWords => "bridge_with_their_words",
            Playbook::ResolveAndClose => "resolve_and_close",
            Playbook::GracefulAlternative => "graceful_alternative",
            Playbook::DontOversell => "dont_oversell",
            Playbook::GracefulExit => "graceful_exit",
            Playbook::EnergyShift => "energy_shift",
            Playbook::SpecificProbe => "specific_probe",
            Playbook::OwnershipCeiling => "ownership_ceiling",
        };
        f.write_str(name)
    }
}

/// Per-session record of playbook use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybookLedger {
    pub last: Option<Playbook>,
    pub streak: u32,
    pub retired: BTreeSet<Playbook>,
}

impl PlaybookLedger {
    pub fn is_available(&self, playbook: Playbook) -> bool {
        !self.retired.contains(&playbook)
    }

    /// Records the playbook used this turn (or none). Returns the playbook
    /// retired by this use, if any.
    pub fn record(&mut self, used: Option<Playbook>) -> Option<Playbook> {
        let Some(playbook) = used else {
            self.last = None;
            self.streak = 0;
            return None;
        };

        self.streak = if self.last == Some(playbook) { self.streak + 1 } else { 1 };
        self.last = Some(playbook);

        if self.streak >= playbook.spec().max_consecutive_uses && self.retired.insert(playbook) {
            Some(playbook)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod table {
        use super::*;

        #[test]
        fn overriding_playbooks() {
            let overriding: Vec<_> = Playbook::ALL
                .iter()
                .filter(|p| p.spec().overrides_action)
                .copied()
                .collect();
            assert_eq!(
                overriding,
                vec![
                    Playbook::ConfusionRecovery,
                    Playbook::BridgeWithTheirWords,
                    Playbook::GracefulAlternative,
                    Playbook::DontOversell,
                    Playbook::GracefulExit,
                    Playbook::OwnershipCeiling,
                ]
            );
        }

        #[test]
        fn bridge_needs_pain_points() {
            let mut profile = ProspectProfile::default();
            assert!(!Playbook::BridgeWithTheirWords.is_supported_by(&profile));
            profile.append(ProfileField::PainPoints, "manual reporting");
            assert!(Playbook::BridgeWithTheirWords.is_supported_by(&profile));
            assert!(Playbook::GracefulExit.is_supported_by(&ProspectProfile::default()));
        }

        #[test]
        fn serializes_snake_case() {
            assert_eq!(
                serde_json::to_string(&Playbook::DontOversell).unwrap(),
                "\"dont_oversell\""
            );
            assert_eq!(Playbook::DontOversell.to_string(), "dont_oversell");
        }
    }

    mod ledger {
        use super::*;

        #[test]
        fn single_use_playbook_retires_immediately() {
            let mut ledger = PlaybookLedger::default();
            assert_eq!(ledger.record(Some(Playbook::EnergyShift)), Some(Playbook::EnergyShift));
            assert!(!ledger.is_available(Playbook::EnergyShift));
        }

        #[test]
        fn two_use_playbook_retires_on_second_consecutive_use() {
            let mut ledger = PlaybookLedger::default();
            assert_eq!(ledger.record(Some(Playbook::SpecificProbe)), None);
            assert!(ledger.is_available(Playbook::SpecificProbe));
            assert_eq!(ledger.record(Some(Playbook::SpecificProbe)), Some(Playbook::SpecificProbe));
            assert!(!ledger.is_available(Playbook::SpecificProbe));
        }

        #[test]
        fn gap_resets_streak() {
            let mut ledger = PlaybookLedger::default();
            ledger.record(Some(Playbook::ConfusionRecovery));
            ledger.record(None);
            assert_eq!(ledger.streak, 0);
            assert_eq!(ledger.record(Some(Playbook::ConfusionRecovery)), None);
            assert!(ledger.is_available(Playbook::ConfusionRecovery));
        }

        #[test]
        fn retirement_is_permanent() {
            let mut ledger = PlaybookLedger::default();
            ledger.record(Some(Playbook::GracefulExit));
            ledger.record(None);
            ledger.record(Some(Playbook::SpecificProbe));
            assert!(!ledger.is_available(Playbook::GracefulExit));
        }
    }
}
