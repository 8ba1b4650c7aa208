//! Build diagnostic parsing
//!
//! Best-effort structuring of raw compiler output. The expected shape is
//! the clang/Metal dialect:
//!
//! ```text
//! shader.metal:15:23: error: use of undeclared identifier 'unknown_var'
//! ```
//!
//! Severity is decided by a table of known prefixes so new compiler
//! dialects can be added without touching control flow. Text that matches
//! nothing falls back to an error-severity diagnostic carrying the raw
//! message.

use std::fmt;

/// Severity of one build diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Additional information (`note:`)
    Info,
    /// Compilation warning; output still usable
    Warning,
    /// Compilation error
    Error,
    /// Fatal error; compilation produced nothing
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Fatal => write!(f, "fatal"),
        }
    }
}

/// One parsed compiler diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDiagnostic {
    /// Source file named by the diagnostic, when present
    pub file: Option<String>,
    /// 1-based line number, when present
    pub line: Option<u32>,
    /// 1-based column number, when present
    pub column: Option<u32>,
    /// Parsed severity; `Error` when nothing matched
    pub severity: Severity,
    /// The matched severity prefix (e.g. `fatal error`), when matched
    pub code: Option<String>,
    /// Message text after the severity prefix, or the raw input
    pub message: String,
}

impl fmt::Display for BuildDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(file), Some(line), Some(column)) = (&self.file, self.line, self.column) {
            write!(f, "{}:{}:{}: ", file, line, column)?;
        }
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Table-driven severity parser.
///
/// Rules are checked in order; custom rules added with
/// [`DiagnosticParser::with_severity_rule`] take precedence over the
/// built-in table.
pub struct DiagnosticParser {
    /// (prefix, severity), longest/most specific prefixes first
    severity_rules: Vec<(String, Severity)>,
}

impl Default for DiagnosticParser {
    fn default() -> Self {
        DiagnosticParser {
            severity_rules: vec![
                ("fatal error:".to_string(), Severity::Fatal),
                ("error:".to_string(), Severity::Error),
                ("warning:".to_string(), Severity::Warning),
                ("note:".to_string(), Severity::Info),
            ],
        }
    }
}

impl DiagnosticParser {
    /// Parser with the built-in clang/Metal prefix table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dialect-specific severity prefix, checked before the built-ins
    pub fn with_severity_rule(mut self, prefix: impl Into<String>, severity: Severity) -> Self {
        self.severity_rules.insert(0, (prefix.into(), severity));
        self
    }

    /// Parse one diagnostic line, best-effort.
    pub fn parse(&self, raw: &str) -> BuildDiagnostic {
        let text = raw.trim();
        let first_line = text.lines().next().unwrap_or("");

        let (location, rest) = split_location(first_line);
        let rest = rest.trim_start();

        let matched = self
            .severity_rules
            .iter()
            .find(|(prefix, _)| rest.starts_with(prefix.as_str()));

        match matched {
            Some((prefix, severity)) => {
                let message = rest[prefix.len()..].trim().to_string();
                let (file, line, column) = match location {
                    Some((f, l, c)) => (Some(f), Some(l), Some(c)),
                    None => (None, None, None),
                };
                BuildDiagnostic {
                    file,
                    line,
                    column,
                    severity: *severity,
                    code: Some(prefix.trim_end_matches(':').to_string()),
                    message,
                }
            }
            // Unparseable: keep the raw text, assume error severity
            None => BuildDiagnostic {
                file: None,
                line: None,
                column: None,
                severity: Severity::Error,
                code: None,
                message: text.to_string(),
            },
        }
    }
}

/// Split a leading `file:line:column:` location off a diagnostic line.
fn split_location(text: &str) -> (Option<(String, u32, u32)>, &str) {
    let mut indices = text.match_indices(':').map(|(i, _)| i);
    let (Some(first), Some(second), Some(third)) =
        (indices.next(), indices.next(), indices.next())
    else {
        return (None, text);
    };
    let file = &text[..first];
    let line = text[first + 1..second].parse::<u32>();
    let column = text[second + 1..third].parse::<u32>();
    match (line, column) {
        (Ok(line), Ok(column)) if !file.is_empty() => (
            Some((file.to_string(), line, column)),
            &text[third + 1..],
        ),
        _ => (None, text),
    }
}
