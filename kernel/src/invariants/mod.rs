// Invariant Framework
//
// Pure rules over an ordered sequence of messages. Used to vet message
// sequences that arrive from outside the repository (exports, seed files)
// before they are replayed into a table.

use crate::log::Message;

/// Result of invariant evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantResult {
    Pass,
    Fail(String),
}

/// Trait implemented by all invariants.
///
/// Invariants must be:
/// - Pure
/// - Deterministic
/// - Side-effect free
pub trait Invariant: Send + Sync {
    fn name(&self) -> &'static str;

    fn validate(&self, messages: &[Message]) -> InvariantResult;
}

/// Each qid is exactly one more than the qid before it.
pub struct GaplessQids;

impl Invariant for GaplessQids {
    fn name(&self) -> &'static str {
        "gapless-qids"
    }

    fn validate(&self, messages: &[Message]) -> InvariantResult {
        for pair in messages.windows(2) {
            let (previous, next) = (pair[0].qid, pair[1].qid);
            if previous.checked_add(1) != Some(next) {
                return InvariantResult::Fail(format!("qid {next} follows qid {previous}"));
            }
        }
        InvariantResult::Pass
    }
}

/// Invariant engine that evaluates a set of invariants.
#[derive(Default)]
pub struct InvariantEngine {
    invariants: Vec<Box<dyn Invariant>>,
}

impl InvariantEngine {
    /// Create an engine with no invariants.
    pub fn new() -> Self {
        Self {
            invariants: Vec::new(),
        }
    }

    /// Engine with the built-in sequence invariants registered.
    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        engine.register(GaplessQids);
        engine
    }

    /// Register an invariant.
    pub fn register<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Evaluate all invariants.
    ///
    /// Stops at the first failure.
    pub fn evaluate(&self, messages: &[Message]) -> Result<(), InvariantViolation> {
        for invariant in &self.invariants {
            match invariant.validate(messages) {
                InvariantResult::Pass => continue,
                InvariantResult::Fail(reason) => {
                    return Err(InvariantViolation {
                        invariant: invariant.name(),
                        reason,
                    })
                }
            }
        }
        Ok(())
    }
}

/// Returned when an invariant is violated.
#[derive(Debug, thiserror::Error)]
#[error("invariant `{invariant}` violated: {reason}")]
pub struct InvariantViolation {
    pub invariant: &'static str,
    pub reason: String,
}
