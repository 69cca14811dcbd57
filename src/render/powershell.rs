//! PowerShell renderer: the plan's extraction commands as a runnable script.
//!
//! Each command writes `temp_extract.txt`; the script moves that file to the
//! command's staging target under the project directory. Reports and analyses
//! render as comment blocks.

use crate::model::*;
use crate::pipeline::MigrationOutcome;
use crate::render::Renderer;

pub struct PowerShellRenderer;

impl Renderer for PowerShellRenderer {
    fn render_analysis(&self, analyses: &[HtmlAnalysis]) -> String {
        let mut out = String::from("# Analysis\n");
        for a in analyses {
            out.push_str(&format!(
                "# {}: {} lines, {} style, {} script, {} component(s), {} asset(s)\n",
                a.file_name,
                a.total_lines,
                a.css_blocks.len(),
                a.js_blocks.len(),
                a.components.len(),
                a.assets.len()
            ));
            for w in &a.warnings {
                out.push_str(&format!("#   warning line {}: {}\n", w.line, w.message));
            }
        }
        out
    }

    fn render_plan(&self, plan: &MigrationPlan) -> String {
        let mut out = String::new();
        out.push_str("# Extraction script: run from the source root.\n");
        out.push_str(&format!(
            "# {} source file(s), {} command(s)\n",
            plan.source_files.len(),
            plan.commands.len()
        ));
        out.push_str("param([string]$Project = \"migrated\")\n");
        out.push_str("$ErrorActionPreference = \"Stop\"\n");

        let mut current: Option<&str> = None;
        for cmd in &plan.commands {
            if current != Some(cmd.source.as_str()) {
                out.push_str(&format!("\n# --- {} ---\n", cmd.source));
                current = Some(cmd.source.as_str());
            }
            let target = ps_quote(&cmd.target.replace('/', "\\"));
            let dir = match cmd.target.rsplit_once('/') {
                Some((dir, _)) => ps_quote(&dir.replace('/', "\\")),
                None => "\"\"".to_string(),
            };
            out.push_str(&format!(
                "# {:?} lines {}-{}\n",
                cmd.purpose, cmd.start_line, cmd.end_line
            ));
            out.push_str(&cmd.text);
            out.push('\n');
            out.push_str(&format!(
                "New-Item -ItemType Directory -Force -Path (Join-Path $Project {dir}) | Out-Null\n"
            ));
            out.push_str(&format!(
                "Move-Item -Force \"temp_extract.txt\" (Join-Path $Project {target})\n"
            ));
        }
        out
    }

    fn render_outcome(&self, outcome: &MigrationOutcome) -> String {
        let mut out = String::from("# Migration report\n");
        out.push_str(&format!(
            "# status: {}\n",
            if outcome.validation.passed { "passed" } else { "blocked" }
        ));
        for e in &outcome.validation.report.entries {
            out.push_str(&format!(
                "# [{}] {}: {}\n",
                e.severity.as_str(),
                e.file,
                e.description.replace('\n', " ")
            ));
        }
        out
    }

    fn file_extension(&self) -> &str {
        "ps1"
    }
}

fn ps_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('`', "``").replace('"', "`\"").replace('$', "`$"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::generate_extract_command;

    #[test]
    fn script_moves_each_extract_to_its_target() {
        let plan = MigrationPlan {
            source_files: vec!["index.html".into()],
            commands: vec![PowerShellCommand {
                purpose: CommandPurpose::Css,
                source: "index.html".into(),
                target: ".migration/extracts/index/css-5-10.css".into(),
                start_line: 5,
                end_line: 10,
                text: generate_extract_command("index.html", 5, 10),
                columns: None,
            }],
            ..MigrationPlan::default()
        };
        let script = PowerShellRenderer.render_plan(&plan);
        assert!(script.contains("Get-Content \"index.html\" | Select-Object -Skip 4 -First 6"));
        assert!(script.contains(
            "Move-Item -Force \"temp_extract.txt\" (Join-Path $Project \".migration\\extracts\\index\\css-5-10.css\")"
        ));
        assert!(script.contains("# Css lines 5-10"));
    }
}
