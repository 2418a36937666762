use console::style;
use std::fmt::Display;

/// Green bold: kept rows, committed runs
pub fn success<D: Display>(text: D) -> String {
    style(text).green().bold().to_string()
}

/// Red bold: deleted principals, failures
pub fn danger<D: Display>(text: D) -> String {
    style(text).red().bold().to_string()
}

/// Yellow: skipped specs, verifier warnings
pub fn warning<D: Display>(text: D) -> String {
    style(text).yellow().to_string()
}

/// White bold: section headers
pub fn header<D: Display>(text: D) -> String {
    style(text).white().bold().to_string()
}

/// Dim: secondary text
pub fn dim<D: Display>(text: D) -> String {
    style(text).dim().to_string()
}

/// Cyan: table names, identifiers
pub fn value<D: Display>(text: D) -> String {
    style(text).cyan().to_string()
}
