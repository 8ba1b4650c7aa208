//! Build-failure recovery for hot-reload artifacts
//!
//! Parses raw compiler diagnostics into structured form, classifies each
//! failure into a recovery strategy (fallback, retry, disable), and executes
//! the strategy against the injected artifact builder. Applied concretely to
//! shader compilation but written against the generic builder seam, so any
//! compiled artifact recovers the same way.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod diagnostic;
mod policy;

pub use diagnostic::{BuildDiagnostic, DiagnosticParser, Severity};
pub use policy::{
    RecoveryCase, RecoveryConfig, RecoveryOutcome, RecoveryPolicy, RecoveryResolution,
    RecoveryStats, RecoveryStrategy, StrategyRule,
};
