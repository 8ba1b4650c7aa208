//! Failure classification and recovery strategy execution
//!
//! Given a classified build failure, selects and executes a recovery
//! strategy against the injected artifact builder:
//!
//! - fatal diagnostics switch to the last-known-good artifact immediately
//!   and are never retried automatically;
//! - "undeclared identifier"-shaped errors are treated as possibly
//!   transient (a dependency not rebuilt yet) and retried under a bounded
//!   backoff budget;
//! - syntax and type errors are permanent source defects; retrying wastes
//!   cycles, so the fallback activates directly;
//! - anything else at error severity is retried; warnings and notes need
//!   no recovery.
//!
//! Repeated fallbacks trip a per-artifact circuit breaker: after the
//! configured number of consecutive fallbacks the artifact is surfaced as
//! permanently failed and automatic recovery stops until the breaker is
//! reset.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use hotswap_core::{ArtifactBuilder, ArtifactPath, BuildOutput, CancelToken};

use crate::diagnostic::{BuildDiagnostic, DiagnosticParser, Severity};

/// Recovery strategy for a classified failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// No recovery needed; compilation output still usable
    None,
    /// Swap in the last-known-good artifact
    Fallback,
    /// Rebuild after a backoff; the failure may be transient
    Retry,
    /// Mark the artifact unusable until manually cleared
    Disable,
    /// Extension point: compile a reduced artifact (not implemented)
    PartialCompile,
}

/// One message-substring classification rule
#[derive(Debug, Clone)]
pub struct StrategyRule {
    /// Substring searched for in the diagnostic message
    pub needle: String,
    /// Strategy selected when the substring matches
    pub strategy: RecoveryStrategy,
}

/// Budget and thresholds for recovery execution
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Rebuild attempts per failure before giving up
    pub max_retries: u32,
    /// Wait before each rebuild attempt
    pub backoff_ms: u64,
    /// Consecutive fallbacks that trip the circuit breaker
    pub breaker_threshold: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        RecoveryConfig {
            max_retries: 3,
            backoff_ms: 100,
            breaker_threshold: 3,
        }
    }
}

/// Observable recovery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Build failures handled
    pub total_errors: u64,
    /// Failures resolved by a successful rebuild
    pub auto_recoveries: u64,
    /// Times the fallback artifact was activated
    pub fallback_activations: u64,
}

/// The failure being recovered, with its classification
#[derive(Debug, Clone)]
pub struct RecoveryCase {
    /// Artifact whose build failed
    pub artifact: ArtifactPath,
    /// Parsed diagnostic
    pub diagnostic: BuildDiagnostic,
    /// Strategy the classifier selected
    pub strategy: RecoveryStrategy,
}

/// What recovery achieved for one failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Warning/info severity; nothing to recover
    NotNeeded,
    /// A retry rebuild succeeded; the new output is ready to adopt
    Recovered(BuildOutput),
    /// The previous known-good artifact is now active
    FallbackActive,
    /// The artifact is disabled until manually cleared
    Disabled,
    /// Every retry failed; the artifact stays on its old version
    RetriesExhausted,
    /// Circuit breaker open or no fallback available; automatic recovery
    /// has stopped for this artifact
    PermanentlyFailed,
    /// The selected strategy is a declared extension point
    Unsupported,
}

/// A handled failure: the case plus what came of it
#[derive(Debug, Clone)]
pub struct RecoveryResolution {
    /// The classified failure
    pub case: RecoveryCase,
    /// Result of executing the strategy
    pub outcome: RecoveryOutcome,
}

/// Classifies build failures and executes recovery strategies.
pub struct RecoveryPolicy {
    parser: DiagnosticParser,
    /// Message rules checked in order; first match wins
    rules: Vec<StrategyRule>,
    config: RecoveryConfig,
    // Counters are observational; relaxed ordering is sufficient
    total_errors: AtomicU64,
    auto_recoveries: AtomicU64,
    fallback_activations: AtomicU64,
    consecutive_fallbacks: DashMap<ArtifactPath, u32>,
    disabled: DashMap<ArtifactPath, ()>,
}

fn default_rules() -> Vec<StrategyRule> {
    let rule = |needle: &str, strategy| StrategyRule {
        needle: needle.to_string(),
        strategy,
    };
    vec![
        // Possibly transient: a dependency that has not been rebuilt yet
        rule("undeclared identifier", RecoveryStrategy::Retry),
        rule("undeclared type", RecoveryStrategy::Retry),
        rule("no matching function", RecoveryStrategy::Retry),
        // Permanent source defects
        rule("syntax error", RecoveryStrategy::Fallback),
        rule("invalid operands", RecoveryStrategy::Fallback),
        rule("type mismatch", RecoveryStrategy::Fallback),
    ]
}

impl RecoveryPolicy {
    /// Policy with the default parser and rule table
    pub fn new(config: RecoveryConfig) -> Self {
        RecoveryPolicy {
            parser: DiagnosticParser::new(),
            rules: default_rules(),
            config,
            total_errors: AtomicU64::new(0),
            auto_recoveries: AtomicU64::new(0),
            fallback_activations: AtomicU64::new(0),
            consecutive_fallbacks: DashMap::new(),
            disabled: DashMap::new(),
        }
    }

    /// Replace the diagnostic parser (dialect plug point)
    pub fn with_parser(mut self, parser: DiagnosticParser) -> Self {
        self.parser = parser;
        self
    }

    /// Add a classification rule checked before the built-in table
    pub fn with_rule(mut self, needle: impl Into<String>, strategy: RecoveryStrategy) -> Self {
        self.rules.insert(
            0,
            StrategyRule {
                needle: needle.into(),
                strategy,
            },
        );
        self
    }

    /// Select a strategy for a parsed diagnostic.
    pub fn classify(&self, diagnostic: &BuildDiagnostic) -> RecoveryStrategy {
        // Fatal failures always fall back; retrying a fatal is never safe
        if diagnostic.severity == Severity::Fatal {
            return RecoveryStrategy::Fallback;
        }
        if let Some(rule) = self
            .rules
            .iter()
            .find(|r| diagnostic.message.contains(r.needle.as_str()))
        {
            return rule.strategy;
        }
        match diagnostic.severity {
            Severity::Error => RecoveryStrategy::Retry,
            Severity::Warning | Severity::Info => RecoveryStrategy::None,
            Severity::Fatal => RecoveryStrategy::Fallback,
        }
    }

    /// Handle one build failure end to end: parse, classify, execute.
    pub fn handle_failure(
        &self,
        artifact: &ArtifactPath,
        raw_text: &str,
        builder: &dyn ArtifactBuilder,
        token: &CancelToken,
    ) -> RecoveryResolution {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
        let diagnostic = self.parser.parse(raw_text);
        let strategy = self.classify(&diagnostic);
        debug!(
            target: "hotswap::recovery",
            artifact = %artifact,
            %diagnostic,
            ?strategy,
            "classified build failure"
        );
        let case = RecoveryCase {
            artifact: artifact.clone(),
            diagnostic,
            strategy,
        };

        if strategy != RecoveryStrategy::None && self.breaker_open(artifact) {
            warn!(
                target: "hotswap::recovery",
                artifact = %artifact,
                threshold = self.config.breaker_threshold,
                "circuit breaker open; suppressing automatic recovery"
            );
            return RecoveryResolution {
                case,
                outcome: RecoveryOutcome::PermanentlyFailed,
            };
        }

        let outcome = match strategy {
            RecoveryStrategy::None => RecoveryOutcome::NotNeeded,
            RecoveryStrategy::Fallback => self.execute_fallback(artifact, builder),
            RecoveryStrategy::Retry => self.execute_retry(artifact, builder, token),
            RecoveryStrategy::Disable => {
                builder.disable(artifact);
                self.disabled.insert(artifact.clone(), ());
                info!(target: "hotswap::recovery", artifact = %artifact, "artifact disabled");
                RecoveryOutcome::Disabled
            }
            RecoveryStrategy::PartialCompile => {
                warn!(
                    target: "hotswap::recovery",
                    artifact = %artifact,
                    "partial compilation requested but not implemented"
                );
                RecoveryOutcome::Unsupported
            }
        };
        RecoveryResolution { case, outcome }
    }

    fn execute_fallback(
        &self,
        artifact: &ArtifactPath,
        builder: &dyn ArtifactBuilder,
    ) -> RecoveryOutcome {
        if builder.activate_fallback(artifact) {
            self.fallback_activations.fetch_add(1, Ordering::Relaxed);
            let streak = {
                let mut entry = self.consecutive_fallbacks.entry(artifact.clone()).or_insert(0);
                *entry += 1;
                *entry
            };
            warn!(
                target: "hotswap::recovery",
                artifact = %artifact,
                streak,
                "fallback artifact activated"
            );
            RecoveryOutcome::FallbackActive
        } else {
            error!(
                target: "hotswap::recovery",
                artifact = %artifact,
                "no fallback available for failed artifact"
            );
            RecoveryOutcome::PermanentlyFailed
        }
    }

    fn execute_retry(
        &self,
        artifact: &ArtifactPath,
        builder: &dyn ArtifactBuilder,
        token: &CancelToken,
    ) -> RecoveryOutcome {
        let backoff = Duration::from_millis(self.config.backoff_ms);
        for attempt in 1..=self.config.max_retries {
            if token.wait_for(backoff) {
                warn!(
                    target: "hotswap::recovery",
                    artifact = %artifact,
                    "retry cancelled"
                );
                return RecoveryOutcome::RetriesExhausted;
            }
            match builder.build(artifact) {
                Ok(output) => {
                    self.auto_recoveries.fetch_add(1, Ordering::Relaxed);
                    self.consecutive_fallbacks.remove(artifact);
                    info!(
                        target: "hotswap::recovery",
                        artifact = %artifact,
                        attempt,
                        version = %output.version,
                        "rebuild succeeded after retry"
                    );
                    return RecoveryOutcome::Recovered(output);
                }
                Err(failure) => {
                    debug!(
                        target: "hotswap::recovery",
                        artifact = %artifact,
                        attempt,
                        diagnostic = %failure.diagnostic_text,
                        "retry rebuild failed"
                    );
                }
            }
        }
        RecoveryOutcome::RetriesExhausted
    }

    fn breaker_open(&self, artifact: &ArtifactPath) -> bool {
        self.consecutive_fallbacks
            .get(artifact)
            .map(|streak| *streak >= self.config.breaker_threshold)
            .unwrap_or(false)
    }

    /// Whether the artifact is currently disabled
    pub fn is_disabled(&self, artifact: &ArtifactPath) -> bool {
        self.disabled.contains_key(artifact)
    }

    /// Manually mark an artifact unusable until cleared
    pub fn mark_disabled(&self, artifact: &ArtifactPath) {
        self.disabled.insert(artifact.clone(), ());
    }

    /// Manually re-enable a disabled artifact
    pub fn clear_disabled(&self, artifact: &ArtifactPath) {
        self.disabled.remove(artifact);
    }

    /// Reset the consecutive-fallback breaker for an artifact (e.g. after
    /// a successful commit)
    pub fn reset_breaker(&self, artifact: &ArtifactPath) {
        self.consecutive_fallbacks.remove(artifact);
    }

    /// Snapshot the observable counters
    pub fn stats(&self) -> RecoveryStats {
        RecoveryStats {
            total_errors: self.total_errors.load(Ordering::Relaxed),
            auto_recoveries: self.auto_recoveries.load(Ordering::Relaxed),
            fallback_activations: self.fallback_activations.load(Ordering::Relaxed),
        }
    }
}
