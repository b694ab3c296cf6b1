//! Success/failure classification of SQL client output
//!
//! `psql` exits 0 for several failure classes when running a script and only
//! reports them in its output, so the default classifier fails a run on a
//! non-zero exit status OR an `ERROR` signature in the captured text.

use crate::runner::CommandOutput;

/// Text the default classifier treats as an in-band failure
pub const DEFAULT_FAILURE_SIGNATURE: &str = "ERROR";

/// Classification of one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed(String),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// Decides whether a captured invocation succeeded
pub trait OutcomeClassifier: Send + Sync {
    fn classify(&self, output: &CommandOutput) -> Outcome;
}

/// Fails on any exit status other than 0
#[derive(Debug, Clone, Copy, Default)]
pub struct ExitStatus;

impl OutcomeClassifier for ExitStatus {
    fn classify(&self, output: &CommandOutput) -> Outcome {
        match output.exit_code {
            Some(0) => Outcome::Succeeded,
            Some(code) => Outcome::Failed(format!("exit status {}\n{}", code, output.text)),
            None => Outcome::Failed(format!("terminated by signal\n{}", output.text)),
        }
    }
}

/// Fails when the output contains a signature string. An empty signature never matches.
#[derive(Debug, Clone)]
pub struct OutputSignature {
    signature: String,
}

impl OutputSignature {
    pub fn new(signature: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
        }
    }
}

impl Default for OutputSignature {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_SIGNATURE)
    }
}

impl OutcomeClassifier for OutputSignature {
    fn classify(&self, output: &CommandOutput) -> Outcome {
        if !self.signature.is_empty() && output.text.contains(&self.signature) {
            Outcome::Failed(format!("\n{}", output.text))
        } else {
            Outcome::Succeeded
        }
    }
}

/// Fails when either classifier fails; the first one's detail wins
#[derive(Debug, Clone, Default)]
pub struct AnyFailure<A, B> {
    first: A,
    second: B,
}

impl<A, B> AnyFailure<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: OutcomeClassifier, B: OutcomeClassifier> OutcomeClassifier for AnyFailure<A, B> {
    fn classify(&self, output: &CommandOutput) -> Outcome {
        match self.first.classify(output) {
            Outcome::Succeeded => self.second.classify(output),
            failed => failed,
        }
    }
}

/// Exit status OR `ERROR` in the output
pub type PsqlClassifier = AnyFailure<ExitStatus, OutputSignature>;

pub fn default_classifier() -> PsqlClassifier {
    AnyFailure::new(ExitStatus, OutputSignature::default())
}
