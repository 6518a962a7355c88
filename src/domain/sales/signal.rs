//! The per-turn signal from the Comprehension collaborator.
//!
//! Signals arrive as JSON and are never rejected: every field has a default
//! and unrecognised category values fall back to that default.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::criteria::CriteriaMap;
use super::profile::ProfileDelta;

/// Declares a closed category enum that serializes as SCREAMING_SNAKE_CASE
/// and deserializes leniently, mapping unknown text to the default variant.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            #[default]
            $default:ident => $default_wire:literal,
            $($variant:ident => $wire:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        #[serde(from = "String", into = "&'static str")]
        pub enum $name {
            #[default]
            $default,
            $($variant),*
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $name::$default => $default_wire,
                    $($name::$variant => $wire),*
                }
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                let wanted = raw.trim().to_ascii_uppercase().replace(['-', ' '], "_");
                match wanted.as_str() {
                    $($wire => $name::$variant,)*
                    _ => $name::$default,
                }
            }
        }

        impl From<$name> for &'static str {
            fn from(value: $name) -> Self {
                value.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum! {
    /// What the prospect was doing with their reply.
    pub enum UserIntent {
        #[default]
        DirectAnswer => "DIRECT_ANSWER",
        Deflection => "DEFLECTION",
        Question => "QUESTION",
        Objection => "OBJECTION",
        SmallTalk => "SMALL_TALK",
        Agreement => "AGREEMENT",
        Pushback => "PUSHBACK",
        Confusion => "CONFUSION",
        Refusal => "REFUSAL",
    }
}

wire_enum! {
    /// Category of objection raised this turn, if any.
    pub enum ObjectionCategory {
        #[default]
        None => "NONE",
        Price => "PRICE",
        Timing => "TIMING",
        Authority => "AUTHORITY",
        Need => "NEED",
    }
}

wire_enum! {
    /// How much substance the reply carried.
    pub enum Richness {
        #[default]
        Moderate => "MODERATE",
        Thin => "THIN",
        Rich => "RICH",
    }
}

wire_enum! {
    /// Emotional depth of the reply. Ordered `Surface < Moderate < Deep`.
    pub enum Depth {
        #[default]
        Surface => "SURFACE",
        Moderate => "MODERATE",
        Deep => "DEEP",
    }
}

wire_enum! {
    /// Where the current objection sits in the diffusion protocol, as judged
    /// by the Comprehension collaborator.
    pub enum DiffusionHint {
        #[default]
        NotApplicable => "NOT_APPLICABLE",
        Diffused => "DIFFUSED",
        Isolated => "ISOLATED",
        Resolved => "RESOLVED",
        Repeated => "REPEATED",
    }
}

impl ObjectionCategory {
    pub fn is_present(&self) -> bool {
        !matches!(self, ObjectionCategory::None)
    }
}

/// One turn's structured reading of the prospect's message. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComprehensionSignal {
    pub intent: UserIntent,
    pub objection: ObjectionCategory,
    pub objection_detail: Option<String>,
    pub richness: Richness,
    pub depth: Depth,
    pub new_information: bool,
    pub diffusion: DiffusionHint,
    pub buying_signal: bool,
    pub criteria: CriteriaMap,
    pub profile_updates: ProfileDelta,
}

impl Default for ComprehensionSignal {
    fn default() -> Self {
        Self {
            intent: UserIntent::default(),
            objection: ObjectionCategory::default(),
            objection_detail: None,
            richness: Richness::default(),
            depth: Depth::default(),
            new_information: true,
            diffusion: DiffusionHint::default(),
            buying_signal: false,
            criteria: CriteriaMap::default(),
            profile_updates: ProfileDelta::default(),
        }
    }
}

impl ComprehensionSignal {
    pub fn with_intent(mut self, intent: UserIntent) -> Self {
        self.intent = intent;
        self
    }

    pub fn with_objection(mut self, objection: ObjectionCategory, detail: impl Into<String>) -> Self {
        self.objection = objection;
        self.objection_detail = Some(detail.into());
        self
    }

    pub fn with_richness(mut self, richness: Richness) -> Self {
        self.richness = richness;
        self
    }

    pub fn with_depth(mut self, depth: Depth) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_new_information(mut self, new_information: bool) -> Self {
        self.new_information = new_information;
        self
    }

    pub fn with_diffusion(mut self, diffusion: DiffusionHint) -> Self {
        self.diffusion = diffusion;
        self
    }

    pub fn with_buying_signal(mut self) -> Self {
        self.buying_signal = true;
        self
    }

    pub fn with_criteria(mut self, criteria: CriteriaMap) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn with_profile_updates(mut self, updates: ProfileDelta) -> Self {
        self.profile_updates = updates;
        self
    }

    pub fn has_objection(&self) -> bool {
        self.objection.is_present()
    }

    pub fn is_thin(&self) -> bool {
        self.richness == Richness::Thin
    }

    /// Agreement or a plain answer; an objection on such a turn is a caveat.
    pub fn is_agreeing(&self) -> bool {
        matches!(self.intent, UserIntent::Agreement | UserIntent::DirectAnswer)
    }
}
