/*
 * This modules contains the `EvaluationConfig` struct, which implements the default trait, and
 * its builder. The config can be passed to `evaluate_conf` or `Evaluator::new` to simplify their
 * arguments.
*/
use crate::evaluator::EvaluationMode;
use crate::metrics::UndefinedPolicy;
use either::Either as LeftOrRight;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// F-measure weight used when none is given: precision and recall weigh the same.
pub const DEFAULT_BETA: f64 = 1.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// Config struct holding every knob of an evaluation. It implements the default trait.
pub struct EvaluationConfig {
    /// Single-label or multi-label evaluation. Must match the mode of the outcome table.
    pub(crate) mode: EvaluationMode,
    /// What to do when a ratio has a zero denominator. The soft policy replaces it by 0.
    pub(crate) policy: UndefinedPolicy,
    /// Should the per-label values be emitted next to the macro averages?
    pub(crate) individual_label_measures: bool,
    /// One cutoff per label, applied to multi-label scores instead of the per-record
    /// thresholds. Only meaningful in multi-label mode.
    pub(crate) thresholds: Option<Vec<f64>>,
    /// Weight of recall in the F-measure. Must be finite and strictly positive.
    pub(crate) beta: f64,
    /// Can we use multiple cores to threshold multi-label scores? This option should be benched.
    pub(crate) parallel: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            mode: EvaluationMode::SingleLabel,
            policy: UndefinedPolicy::Soft,
            individual_label_measures: false,
            thresholds: None,
            beta: DEFAULT_BETA,
            parallel: false,
        }
    }
}

impl EvaluationConfig {
    pub fn new(mode: EvaluationMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }

    pub fn policy(&self) -> UndefinedPolicy {
        self.policy
    }

    pub fn individual_label_measures(&self) -> bool {
        self.individual_label_measures
    }

    pub fn thresholds(&self) -> Option<&[f64]> {
        self.thresholds.as_deref()
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }
}

impl<Policy> From<EvaluationConfigBuilder<Policy>> for EvaluationConfig
where
    Policy: Into<UndefinedPolicy>,
{
    fn from(value: EvaluationConfigBuilder<Policy>) -> Self {
        Self {
            mode: value.mode,
            policy: value.policy.either_into(),
            individual_label_measures: value.individual_label_measures,
            thresholds: value.thresholds,
            beta: value.beta,
            parallel: value.parallel,
        }
    }
}

impl Display for EvaluationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let string = format!("Evaluation mode: {}\n Policy when encountering a zero denominator: {:?}\n Individual label measures: {}\n Thresholds: {:?}\n Beta: {}\n Using parallel computations: {}", self.mode, self.policy, self.individual_label_measures, self.thresholds, self.beta, self.parallel);
        write!(f, "{}", string)
    }
}

/// This builder can be used to build and customize an `EvaluationConfig` structure. The policy
/// can be given as an `UndefinedPolicy` or as the soft evaluation flag (`true` is soft).
pub struct EvaluationConfigBuilder<Policy>
where
    Policy: Into<UndefinedPolicy>,
{
    mode: EvaluationMode,
    policy: LeftOrRight<Policy, UndefinedPolicy>,
    individual_label_measures: bool,
    thresholds: Option<Vec<f64>>,
    beta: f64,
    parallel: bool,
}

impl Default for EvaluationConfigBuilder<UndefinedPolicy> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Policy> EvaluationConfigBuilder<Policy>
where
    Policy: Into<UndefinedPolicy>,
{
    pub fn mode(mut self, mode: EvaluationMode) -> Self {
        self.mode = mode;
        self
    }
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = LeftOrRight::Left(policy);
        self
    }
    pub fn individual_label_measures(mut self, individual_label_measures: bool) -> Self {
        self.individual_label_measures = individual_label_measures;
        self
    }
    pub fn thresholds(mut self, thresholds: Vec<f64>) -> Self {
        self.thresholds = Some(thresholds);
        self
    }
    pub fn beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
    pub fn new() -> Self {
        Self {
            mode: EvaluationMode::SingleLabel,
            policy: LeftOrRight::Right(UndefinedPolicy::Soft),
            individual_label_measures: false,
            thresholds: None,
            beta: DEFAULT_BETA,
            parallel: false,
        }
    }
    pub fn build(self) -> EvaluationConfig {
        EvaluationConfig::from(self)
    }
}
