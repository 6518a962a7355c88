//! Maps objection categories to the stage that addresses them.

use serde::Serialize;
use std::collections::BTreeMap;

use super::catalog::CatalogError;
use super::signal::ObjectionCategory;
use super::stage::Stage;

/// Where an objection should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Go back to this earlier stage.
    Back(Stage),
    /// Stay and handle it here.
    InPlace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectionRouter {
    routes: BTreeMap<ObjectionCategory, Stage>,
}

impl Default for ObjectionRouter {
    fn default() -> Self {
        Self::standard()
    }
}

impl ObjectionRouter {
    /// Price goes back to consequence, timing to problem awareness, need to
    /// solution awareness. Authority has no route.
    pub fn standard() -> Self {
        Self::from_routes([
            (ObjectionCategory::Price, Stage::Consequence),
            (ObjectionCategory::Timing, Stage::ProblemAwareness),
            (ObjectionCategory::Need, Stage::SolutionAwareness),
        ])
    }

    pub fn from_routes(routes: impl IntoIterator<Item = (ObjectionCategory, Stage)>) -> Self {
        Self {
            routes: routes.into_iter().collect(),
        }
    }

    pub fn target(&self, objection: ObjectionCategory) -> Option<Stage> {
        self.routes.get(&objection).copied()
    }

    /// Reroutes only when the mapped stage sits strictly behind `current`.
    pub fn route(&self, objection: ObjectionCategory, current: Stage) -> Route {
        match self.target(objection) {
            Some(target) if target.precedes(&current) => Route::Back(target),
            _ => Route::InPlace,
        }
    }

    /// Rejects routes for "no objection" or into the terminal stage.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for (objection, stage) in &self.routes {
            if !objection.is_present() || stage.is_terminal() {
                return Err(CatalogError::InvalidRoute {
                    objection: *objection,
                    stage: *stage,
                });
            }
        }
        Ok(())
    }
}
