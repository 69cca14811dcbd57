//! JSON renderer: structured output for tooling integration.
//!
//! Serializes the model directly; field names are camelCase.

use crate::model::{HtmlAnalysis, MigrationPlan};
use crate::pipeline::MigrationOutcome;
use crate::render::Renderer;
use serde::Serialize;

pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render_analysis(&self, analyses: &[HtmlAnalysis]) -> String {
        to_json(&analyses)
    }

    fn render_plan(&self, plan: &MigrationPlan) -> String {
        to_json(plan)
    }

    fn render_outcome(&self, outcome: &MigrationOutcome) -> String {
        to_json(outcome)
    }

    fn file_extension(&self) -> &str {
        "json"
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_string_pretty(value) {
        Ok(mut s) => {
            s.push('\n');
            s
        }
        Err(e) => format!("{{\"error\": {:?}}}\n", e.to_string()),
    }
}
