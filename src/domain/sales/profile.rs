//! Accumulated knowledge about the prospect.
//!
//! The Comprehension collaborator sends free-form deltas each turn. Only
//! known fields are merged: list fields append without duplicates, scalar
//! fields are replaced when the incoming value is non-empty.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Everything learned about the prospect so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProspectProfile {
    pub name: Option<String>,
    pub role: Option<String>,
    pub company: Option<String>,
    pub industry: Option<String>,

    pub current_state: Option<String>,
    pub team_size: Option<String>,
    pub tools_mentioned: Vec<String>,

    pub pain_points: Vec<String>,
    pub frustrations: Vec<String>,

    pub desired_state: Option<String>,
    pub success_metrics: Vec<String>,

    pub cost_of_inaction: Option<String>,
    pub timeline_pressure: Option<String>,
    pub competitive_risk: Option<String>,

    pub decision_authority: Option<String>,
    pub decision_timeline: Option<String>,
    pub budget_signals: Option<String>,

    pub email: Option<String>,
    pub phone: Option<String>,

    pub objections_encountered: Vec<String>,
    pub objections_resolved: Vec<String>,
}

/// A named profile field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Name,
    Role,
    Company,
    Industry,
    CurrentState,
    TeamSize,
    ToolsMentioned,
    PainPoints,
    Frustrations,
    DesiredState,
    SuccessMetrics,
    CostOfInaction,
    TimelinePressure,
    CompetitiveRisk,
    DecisionAuthority,
    DecisionTimeline,
    BudgetSignals,
    Email,
    Phone,
    ObjectionsEncountered,
    ObjectionsResolved,
}

enum Slot<'a> {
    Scalar(&'a mut Option<String>),
    List(&'a mut Vec<String>),
}

enum View<'a> {
    Scalar(&'a Option<String>),
    List(&'a Vec<String>),
}

/// Maps each field to its struct member, once for reads and once for writes.
macro_rules! field_slots {
    ($($variant:ident => $kind:ident($member:ident)),* $(,)?) => {
        fn slot<'a>(&self, p: &'a mut ProspectProfile) -> Slot<'a> {
            match self {
                $(ProfileField::$variant => Slot::$kind(&mut p.$member),)*
            }
        }

        fn view<'a>(&self, p: &'a ProspectProfile) -> View<'a> {
            match self {
                $(ProfileField::$variant => View::$kind(&p.$member),)*
            }
        }
    };
}

impl ProfileField {
    pub const ALL: [ProfileField; 21] = [
        ProfileField::Name,
        ProfileField::Role,
        ProfileField::Company,
        ProfileField::Industry,
        ProfileField::CurrentState,
        ProfileField::TeamSize,
        ProfileField::ToolsMentioned,
        ProfileField::PainPoints,
        ProfileField::Frustrations,
        ProfileField::DesiredState,
        ProfileField::SuccessMetrics,
        ProfileField::CostOfInaction,
        ProfileField::TimelinePressure,
        ProfileField::CompetitiveRisk,
        ProfileField::DecisionAuthority,
        ProfileField::DecisionTimeline,
        ProfileField::BudgetSignals,
        ProfileField::Email,
        ProfileField::Phone,
        ProfileField::ObjectionsEncountered,
        ProfileField::ObjectionsResolved,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ProfileField::Name => "name",
            ProfileField::Role => "role",
            ProfileField::Company => "company",
            ProfileField::Industry => "industry",
            ProfileField::CurrentState => "current_state",
            ProfileField::TeamSize => "team_size",
            ProfileField::ToolsMentioned => "tools_mentioned",
            ProfileField::PainPoints => "pain_points",
            ProfileField::Frustrations => "frustrations",
            ProfileField::DesiredState => "desired_state",
            ProfileField::SuccessMetrics => "success_metrics",
            ProfileField::CostOfInaction => "cost_of_inaction",
            ProfileField::TimelinePressure => "timeline_pressure",
            ProfileField::CompetitiveRisk => "competitive_risk",
            ProfileField::DecisionAuthority => "decision_authority",
            ProfileField::DecisionTimeline => "decision_timeline",
            ProfileField::BudgetSignals => "budget_signals",
            ProfileField::Email => "email",
            ProfileField::Phone => "phone",
            ProfileField::ObjectionsEncountered => "objections_encountered",
            ProfileField::ObjectionsResolved => "objections_resolved",
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(
            self,
            ProfileField::ToolsMentioned
                | ProfileField::PainPoints
                | ProfileField::Frustrations
                | ProfileField::SuccessMetrics
                | ProfileField::ObjectionsEncountered
                | ProfileField::ObjectionsResolved
        )
    }

    field_slots! {
        Name => Scalar(name),
        Role => Scalar(role),
        Company => Scalar(company),
        Industry => Scalar(industry),
        CurrentState => Scalar(current_state),
        TeamSize => Scalar(team_size),
        ToolsMentioned => List(tools_mentioned),
        PainPoints => List(pain_points),
        Frustrations => List(frustrations),
        DesiredState => Scalar(desired_state),
        SuccessMetrics => List(success_metrics),
        CostOfInaction => Scalar(cost_of_inaction),
        TimelinePressure => Scalar(timeline_pressure),
        CompetitiveRisk => Scalar(competitive_risk),
        DecisionAuthority => Scalar(decision_authority),
        DecisionTimeline => Scalar(decision_timeline),
        BudgetSignals => Scalar(budget_signals),
        Email => Scalar(email),
        Phone => Scalar(phone),
        ObjectionsEncountered => List(objections_encountered),
        ObjectionsResolved => List(objections_resolved),
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ProfileField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|f| f.key() == s)
            .copied()
            .ok_or_else(|| ValidationError::invalid_format("profile_field", format!("unknown field '{}'", s)))
    }
}

/// Free-form profile updates for one turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileDelta(BTreeMap<String, Value>);

impl ProfileDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: ProfileField, value: impl Into<Value>) -> Self {
        self.0.insert(field.key().to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ProspectProfile {
    /// Returns true if the field holds a non-empty value.
    pub fn is_filled(&self, field: ProfileField) -> bool {
        match field.view(self) {
            View::Scalar(v) => v.as_deref().map_or(false, |s| !s.trim().is_empty()),
            View::List(v) => !v.is_empty(),
        }
    }

    /// Returns the first of `fields` that is still empty.
    pub fn first_missing(&self, fields: &[ProfileField]) -> Option<ProfileField> {
        fields.iter().copied().find(|f| !self.is_filled(*f))
    }

    /// Merges one turn's delta and returns the keys that were not recognised.
    pub fn merge(&mut self, delta: &ProfileDelta) -> Vec<String> {
        let mut ignored = Vec::new();
        for (key, value) in &delta.0 {
            match key.parse::<ProfileField>() {
                Ok(field) => self.merge_field(field, value),
                Err(_) => ignored.push(key.clone()),
            }
        }
        ignored
    }

    /// Appends a value to a list field, skipping duplicates and blanks.
    pub fn append(&mut self, field: ProfileField, item: &str) {
        if let Slot::List(list) = field.slot(self) {
            push_unique(list, item);
        }
    }

    fn merge_field(&mut self, field: ProfileField, value: &Value) {
        match field.slot(self) {
            Slot::Scalar(slot) => {
                if let Some(text) = scalar_text(value) {
                    *slot = Some(text);
                }
            }
            Slot::List(list) => match value {
                Value::Array(items) => {
                    for item in items.iter().filter_map(scalar_text) {
                        push_unique(list, &item);
                    }
                }
                other => {
                    if let Some(item) = scalar_text(other) {
                        push_unique(list, &item);
                    }
                }
            },
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    let item = item.trim();
    if !item.is_empty() && !list.iter().any(|existing| existing == item) {
        list.push(item.to_string());
    }
}
