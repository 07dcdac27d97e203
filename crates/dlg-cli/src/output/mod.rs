//! Output formatting utilities for the CLI
//!
//! Tables for validation results, harvested variables as `NAME=value`
//! lines, and colored status messages.

use std::collections::HashMap;

use tabled::{settings::Style, Table, Tabled};

use dlg_core::ConnectionResult;

/// Format connection results as an ASCII table
///
/// Returns "No criteria to validate" for an empty list, which is what a
/// validator that failed or found nothing to probe produces.
pub fn format_results(results: &[ConnectionResult]) -> String {
    if results.is_empty() {
        return "No criteria to validate".to_string();
    }

    #[derive(Tabled)]
    struct ResultRow {
        #[tabled(rename = "CRITERIA")]
        criteria: String,
        #[tabled(rename = "VALIDATED")]
        validated: String,
        #[tabled(rename = "DURATION")]
        duration: String,
        #[tabled(rename = "DELEGATE")]
        delegate: String,
    }

    let rows: Vec<ResultRow> = results
        .iter()
        .map(|r| ResultRow {
            criteria: truncate(&r.criteria, 60),
            validated: if r.validated { "yes" } else { "no" }.to_string(),
            duration: format_millis(r.duration),
            delegate: r.delegate_id.to_string(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Harvested variables as sorted `NAME=value` lines
pub fn format_harvested(harvested: &HashMap<String, String>) -> String {
    let mut names: Vec<&String> = harvested.keys().collect();
    names.sort();
    names
        .into_iter()
        .map(|name| format!("{}={}", name, harvested[name]))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_millis(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else {
        format!("{:.1}s", ms as f64 / 1000.0)
    }
}

/// Truncate a string with ellipsis if too long
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix to stderr
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
