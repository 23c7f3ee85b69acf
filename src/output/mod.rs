use anyhow::Result;
use console::style;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::collector::CollectionResult;

pub mod formatters;
pub mod progress;

pub use formatters::*;
pub use progress::ProgressReporter;

/// Render a result in the requested format
pub fn render(result: &CollectionResult, format: OutputFormat) -> Result<String> {
    let content = match format {
        OutputFormat::Text => format_as_text(result),
        OutputFormat::Json => format_as_json(result)?,
        OutputFormat::Markdown => format_as_markdown(result),
    };
    Ok(content)
}

/// Save collection result to file
pub async fn save_to_file(result: &CollectionResult, path: &Path, format: OutputFormat) -> Result<()> {
    let content = render(result, format)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs_err::create_dir_all(parent)?;
    }

    fs_err::write(path, content)?;
    Ok(())
}

/// Print collection result to console
pub fn print_to_console(result: &CollectionResult, format: OutputFormat) -> Result<()> {
    let content = render(result, format)?;
    println!("{}", content);
    Ok(())
}

/// Put rendered content on the system clipboard
pub fn copy_to_clipboard(content: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new()?;
    clipboard.set_text(content.to_string())?;
    Ok(())
}

/// Run summary on stderr, so it never mixes with exported content on stdout
pub fn print_summary(result: &CollectionResult) {
    let counts = format!("{}/{}", result.success_count, result.outcomes.len());
    let counts = if result.failure_count == 0 {
        style(counts).green()
    } else {
        style(counts).yellow()
    };

    eprintln!(
        "{} Transcripts collected: {} in {:.1}s",
        style("✓").green().bold(),
        counts,
        result.elapsed_secs
    );

    for warning in &result.warnings {
        eprintln!("{} {}", style("⚠").yellow().bold(), warning);
    }
}

/// Print the per-video failure trail
pub fn print_diagnostics(result: &CollectionResult) {
    if result.diagnostics.is_empty() {
        eprintln!("{}", style("No failures recorded").dim());
        return;
    }

    eprintln!("{}", style("Failures:").bold());
    for line in result.diagnostic_trail() {
        eprintln!("  {} {}", style("✗").red(), line);
    }
}
