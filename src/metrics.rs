/*!
This module computes the metrics (accuracy, precision, recall, f-score) of contingency
tables. Every calculator is a pure function. A zero denominator is resolved by the
`UndefinedPolicy`: the soft policy yields `0`, the strict policy yields
`MetricValue::Undefined`.
*/
use crate::contingency::{Bipartition, ContingencyTable, ContingencyTables};
use crate::label_index::LabelIndex;
use crate::reporter::MetricKey;
use enum_iterator::Sequence;
use itertools::multizip;
use num::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Value of a single metric. `Undefined` is produced only by the strict policy, when the
/// defining ratio has a zero denominator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MetricValue {
    Defined(f64),
    Undefined,
}

impl MetricValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Returns the value, if defined.
    pub fn defined(&self) -> Option<f64> {
        match self {
            Self::Defined(v) => Some(*v),
            Self::Undefined => None,
        }
    }

    /// Converts into the external representation, where `Undefined` is NaN.
    pub fn to_f64(self) -> f64 {
        self.defined().unwrap_or(f64::NAN)
    }
}

impl From<MetricValue> for f64 {
    fn from(value: MetricValue) -> Self {
        value.to_f64()
    }
}

impl Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defined(v) => write!(f, "{}", v),
            Self::Undefined => write!(f, "NaN"),
        }
    }
}

/// What do we do when a ratio has a zero denominator?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Sequence)]
pub enum UndefinedPolicy {
    /// The degenerate ratio contributes `0` and the computation continues.
    #[default]
    Soft,
    /// The degenerate ratio is `Undefined`, and so is every macro average built on it.
    Strict,
}

/// `true` is the soft evaluation flag.
impl From<bool> for UndefinedPolicy {
    fn from(soft: bool) -> Self {
        if soft {
            Self::Soft
        } else {
            Self::Strict
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsingUndefinedPolicyError(String);

impl Display for ParsingUndefinedPolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not parse `{}` into an `UndefinedPolicy`", self.0)
    }
}
impl std::error::Error for ParsingUndefinedPolicyError {}

impl FromStr for UndefinedPolicy {
    type Err = ParsingUndefinedPolicyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "soft" | "lenient" => Ok(Self::Soft),
            "strict" => Ok(Self::Strict),
            _ => Err(ParsingUndefinedPolicyError(String::from(s))),
        }
    }
}

/// Every aggregate measure the evaluator can emit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Sequence,
)]
pub enum Measure {
    MacroPrecision,
    MacroRecall,
    MacroFScore,
    MacroAccuracy,
    MicroPrecision,
    MicroRecall,
    MicroFScore,
    SubsetAccuracy,
    HammingLoss,
}

impl Measure {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MacroPrecision => "MacroPrecision",
            Self::MacroRecall => "MacroRecall",
            Self::MacroFScore => "MacroFScore",
            Self::MacroAccuracy => "MacroAccuracy",
            Self::MicroPrecision => "MicroPrecision",
            Self::MicroRecall => "MicroRecall",
            Self::MicroFScore => "MicroFScore",
            Self::SubsetAccuracy => "SubsetAccuracy",
            Self::HammingLoss => "HammingLoss",
        }
    }
}

impl Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsingMeasureError(String);

impl Display for ParsingMeasureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Impossible to parse the string ({}) into a Measure", self.0)
    }
}
impl std::error::Error for ParsingMeasureError {}

impl FromStr for Measure {
    type Err = ParsingMeasureError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        enum_iterator::all::<Measure>()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParsingMeasureError(String::from(s)))
    }
}

/// Metric values computed by one calculator. Calculators never share a mutable result map:
/// each returns its own fragment and the evaluator merges them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricFragment(pub(crate) Vec<(MetricKey, MetricValue)>);

impl MetricFragment {
    fn push(&mut self, measure: Measure, value: MetricValue) {
        self.0.push((MetricKey::aggregate(measure), value))
    }

    fn push_label(&mut self, measure: Measure, label: &str, value: MetricValue) {
        log::trace!("{}_{} = {}", measure, label, value);
        self.0.push((MetricKey::per_label(measure, label), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(MetricKey, MetricValue)> {
        self.0.iter()
    }
}

impl IntoIterator for MetricFragment {
    type Item = (MetricKey, MetricValue);
    type IntoIter = std::vec::IntoIter<Self::Item>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

fn count_as_f64(count: usize) -> f64 {
    count.to_f64().unwrap_or(f64::MAX)
}

/// Divides two counts, resolving a zero denominator with `policy`.
pub fn ratio(numerator: usize, denominator: usize, policy: UndefinedPolicy) -> MetricValue {
    if denominator == 0 {
        return match policy {
            UndefinedPolicy::Soft => MetricValue::Defined(0.0),
            UndefinedPolicy::Strict => MetricValue::Undefined,
        };
    }
    MetricValue::Defined(count_as_f64(numerator) / count_as_f64(denominator))
}

/// (TP + TN) / N
pub fn accuracy(table: &ContingencyTable, policy: UndefinedPolicy) -> MetricValue {
    ratio(table.tp + table.tn, table.total(), policy)
}

/// TP / (TP + FP)
pub fn precision(table: &ContingencyTable, policy: UndefinedPolicy) -> MetricValue {
    ratio(table.tp, table.tp + table.fp, policy)
}

/// TP / (TP + FN)
pub fn recall(table: &ContingencyTable, policy: UndefinedPolicy) -> MetricValue {
    ratio(table.tp, table.tp + table.fn_, policy)
}

/// F-beta score of already resolved precision and recall values of the *same* table:
/// `(1 + b²)·P·R / (b²·P + R)`. With the strict policy, an undefined input makes the
/// result undefined.
pub fn f_score(
    precision: MetricValue,
    recall: MetricValue,
    beta: f64,
    policy: UndefinedPolicy,
) -> MetricValue {
    let (p, r) = match (precision, recall) {
        (MetricValue::Defined(p), MetricValue::Defined(r)) => (p, r),
        _ => match policy {
            UndefinedPolicy::Soft => (
                precision.defined().unwrap_or(0.0),
                recall.defined().unwrap_or(0.0),
            ),
            UndefinedPolicy::Strict => return MetricValue::Undefined,
        },
    };
    let beta2 = beta * beta;
    let denominator = beta2 * p + r;
    if denominator == 0.0 {
        return match policy {
            UndefinedPolicy::Soft => MetricValue::Defined(0.0),
            UndefinedPolicy::Strict => MetricValue::Undefined,
        };
    }
    MetricValue::Defined((1.0 + beta2) * p * r / denominator)
}

/// F-beta score of a single table.
pub fn f_score_of(table: &ContingencyTable, beta: f64, policy: UndefinedPolicy) -> MetricValue {
    f_score(precision(table, policy), recall(table, policy), beta, policy)
}

/// Arithmetic mean of per-label values. A single `Undefined` makes the mean `Undefined`; an
/// empty input is resolved with `policy`.
pub fn mean(values: &[MetricValue], policy: UndefinedPolicy) -> MetricValue {
    if values.is_empty() {
        return ratio(0, 0, policy);
    }
    let mut sum = 0.0;
    for value in values {
        match value {
            MetricValue::Defined(v) => sum += v,
            MetricValue::Undefined => return MetricValue::Undefined,
        }
    }
    MetricValue::Defined(sum / count_as_f64(values.len()))
}

/// Macro precision, recall and F-score: per-label values averaged over every label of the
/// index. The per-label values are emitted alongside when `individual` is set.
pub fn macro_measures(
    tables: &ContingencyTables,
    labels: &LabelIndex,
    beta: f64,
    policy: UndefinedPolicy,
    individual: bool,
) -> MetricFragment {
    let mut fragment = MetricFragment::default();
    let count = tables.len();
    let mut precisions = Vec::with_capacity(count);
    let mut recalls = Vec::with_capacity(count);
    let mut f_scores = Vec::with_capacity(count);
    for table in tables.iter() {
        let p = precision(table, policy);
        let r = recall(table, policy);
        precisions.push(p);
        recalls.push(r);
        f_scores.push(f_score(p, r, beta, policy));
    }
    fragment.push(Measure::MacroPrecision, mean(&precisions, policy));
    fragment.push(Measure::MacroRecall, mean(&recalls, policy));
    fragment.push(Measure::MacroFScore, mean(&f_scores, policy));
    if individual {
        for ((_, label), p, r, f) in multizip((labels.iter(), &precisions, &recalls, &f_scores)) {
            fragment.push_label(Measure::MacroPrecision, label, *p);
            fragment.push_label(Measure::MacroRecall, label, *r);
            fragment.push_label(Measure::MacroFScore, label, *f);
        }
    }
    fragment
}

/// Single-label accuracy from the per-label tables: the summed true positives (the trace of
/// the confusion matrix) over the number of instances.
pub fn single_label_accuracy(tables: &ContingencyTables, policy: UndefinedPolicy) -> MetricFragment {
    let correct: usize = tables.iter().map(|t| t.tp).sum();
    let mut fragment = MetricFragment::default();
    fragment.push(Measure::MacroAccuracy, ratio(correct, tables.instances(), policy));
    fragment
}

/// Multi-label accuracy: the mean of the per-label `(TP + TN) / N`.
pub fn multi_label_accuracy(
    tables: &ContingencyTables,
    labels: &LabelIndex,
    policy: UndefinedPolicy,
    individual: bool,
) -> MetricFragment {
    let accuracies: Vec<MetricValue> = tables.iter().map(|t| accuracy(t, policy)).collect();
    let mut fragment = MetricFragment::default();
    fragment.push(Measure::MacroAccuracy, mean(&accuracies, policy));
    if individual {
        for ((_, label), a) in labels.iter().zip(&accuracies) {
            fragment.push_label(Measure::MacroAccuracy, label, *a);
        }
    }
    fragment
}

/// Micro precision, recall and F-score, computed once from the pooled counts.
pub fn micro_measures(combined: &ContingencyTable, beta: f64, policy: UndefinedPolicy) -> MetricFragment {
    let p = precision(combined, policy);
    let r = recall(combined, policy);
    let mut fragment = MetricFragment::default();
    fragment.push(Measure::MicroPrecision, p);
    fragment.push(Measure::MicroRecall, r);
    fragment.push(Measure::MicroFScore, f_score(p, r, beta, policy));
    fragment
}

/// Fraction of instances whose whole predicted label set equals the gold label set.
pub fn subset_accuracy(bipartition: &Bipartition, policy: UndefinedPolicy) -> MetricFragment {
    let mut fragment = MetricFragment::default();
    fragment.push(
        Measure::SubsetAccuracy,
        ratio(bipartition.exact_matches(), bipartition.instances(), policy),
    );
    fragment
}

/// Fraction of wrong label decisions: `(FP + FN) / (N·L)` of the combined table.
pub fn hamming_loss(combined: &ContingencyTable, policy: UndefinedPolicy) -> MetricFragment {
    let mut fragment = MetricFragment::default();
    fragment.push(
        Measure::HammingLoss,
        ratio(combined.fp + combined.fn_, combined.total(), policy),
    );
    fragment
}
