//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};

use crate::assembly::{CloudAssembly, StackArtifact};
use crate::config::ValidationResult;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Stack row for table display.
#[derive(Tabled)]
struct StackRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Stack")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Resources")]
    resources: usize,
    #[tabled(rename = "Exports")]
    exports: usize,
    #[tabled(rename = "Depends on")]
    dependencies: String,
    #[tabled(rename = "Hash")]
    hash: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the stacks of an assembly in deployment order.
    #[must_use]
    pub fn format_stacks(&self, assembly: &CloudAssembly) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&StacksJson::from(assembly))
                .unwrap_or_default(),
            OutputFormat::Text => Self::format_stacks_text(assembly),
        }
    }

    fn format_stacks_text(assembly: &CloudAssembly) -> String {
        let mut output = String::new();
        let _ = write!(output, "\nStacks ({} in deployment order)\n\n", assembly.artifacts.len());

        let rows: Vec<StackRow> = assembly
            .artifacts
            .iter()
            .enumerate()
            .map(|(i, a)| StackRow {
                index: i + 1,
                name: a.name.clone(),
                kind: a.kind.to_string(),
                resources: a.resource_count,
                exports: a.export_count,
                dependencies: if a.dependencies.is_empty() {
                    String::from("-")
                } else {
                    a.dependencies.join(", ")
                },
                hash: a.short_hash(),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');
        Self::append_warnings(&mut output, &assembly.warnings);
        output
    }

    /// Formats the result of writing an assembly.
    #[must_use]
    pub fn format_synth(&self, assembly: &CloudAssembly, out_dir: &Path, written: &[PathBuf]) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "status": "success",
                    "outDir": out_dir.display().to_string(),
                    "files": written.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
                    "stacks": StacksJson::from(assembly).stacks,
                    "warnings": assembly.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = format!(
                    "{} Synthesized {} stacks to {}\n",
                    "✓".green(),
                    assembly.artifacts.len(),
                    out_dir.display()
                );
                for artifact in &assembly.artifacts {
                    let _ = writeln!(
                        output,
                        "   {} {}",
                        artifact.template_file(),
                        format!("({})", artifact.short_hash()).dimmed()
                    );
                }
                Self::append_warnings(&mut output, &assembly.warnings);
                output
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "missing": result.missing.iter().map(|f| f.env_var()).collect::<Vec<_>>(),
                    "invalid": result.invalid.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Configuration is valid\n", "✓".green())
                } else {
                    let mut output = format!("{} Configuration is invalid:\n", "✗".red());
                    for field in &result.missing {
                        let _ = writeln!(output, "   - {}", field.requirement());
                        let _ = writeln!(output, "     set {}", field.env_var().bold());
                    }
                    for err in &result.invalid {
                        let _ = writeln!(output, "   - {err}");
                    }
                    output
                };

                if show_warnings {
                    Self::append_warnings(&mut output, &result.warnings);
                } else if result.warning_count() > 0 {
                    let _ = writeln!(
                        output,
                        "   {} warning(s), use --warnings to show",
                        result.warning_count()
                    );
                }
                output
            }
        }
    }

    fn append_warnings(output: &mut String, warnings: &[String]) {
        if warnings.is_empty() {
            return;
        }
        let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
        for warning in warnings {
            let _ = writeln!(output, "   - {warning}");
        }
    }
}

// JSON serialization helpers

#[derive(serde::Serialize)]
struct StacksJson {
    stacks: Vec<StackJson>,
    warnings: Vec<String>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct StackJson {
    name: String,
    kind: String,
    environment: String,
    template_file: String,
    template_hash: String,
    resources: usize,
    exports: usize,
    dependencies: Vec<String>,
}

impl From<&StackArtifact> for StackJson {
    fn from(artifact: &StackArtifact) -> Self {
        Self {
            name: artifact.name.clone(),
            kind: artifact.kind.to_string(),
            environment: artifact.environment.to_string(),
            template_file: artifact.template_file(),
            template_hash: artifact.template_hash(),
            resources: artifact.resource_count,
            exports: artifact.export_count,
            dependencies: artifact.dependencies.clone(),
        }
    }
}

impl From<&CloudAssembly> for StacksJson {
    fn from(assembly: &CloudAssembly) -> Self {
        Self {
            stacks: assembly.artifacts.iter().map(StackJson::from).collect(),
            warnings: assembly.warnings.clone(),
        }
    }
}
