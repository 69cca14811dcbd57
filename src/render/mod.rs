//! Renderer module: trait-based format dispatch.

pub mod json;
pub mod markdown;
pub mod powershell;

use crate::model::{HtmlAnalysis, MigrationPlan};
use crate::pipeline::MigrationOutcome;
use anyhow::{anyhow, Result};

/// Turns pipeline products into one output format.
pub trait Renderer {
    fn render_analysis(&self, analyses: &[HtmlAnalysis]) -> String;
    fn render_plan(&self, plan: &MigrationPlan) -> String;
    fn render_outcome(&self, outcome: &MigrationOutcome) -> String;
    fn file_extension(&self) -> &str;
}

/// Create a renderer for the given format name.
pub fn create_renderer(format: &str) -> Result<Box<dyn Renderer>> {
    match format {
        "markdown" | "md" => Ok(Box::new(markdown::MarkdownRenderer)),
        "json" => Ok(Box::new(json::JsonRenderer)),
        "powershell" | "ps1" => Ok(Box::new(powershell::PowerShellRenderer)),
        _ => Err(anyhow!(
            "unknown format: {}. Use markdown, json, or powershell",
            format
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_formats() {
        assert_eq!(create_renderer("md").unwrap().file_extension(), "md");
        assert_eq!(create_renderer("json").unwrap().file_extension(), "json");
        assert_eq!(create_renderer("powershell").unwrap().file_extension(), "ps1");
        let err = create_renderer("html").err().unwrap();
        assert!(err.to_string().contains("unknown format: html"));
    }
}
