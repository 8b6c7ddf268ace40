/*!
This library evaluates text classification outcomes. It reads the predictions and gold
standard of every classified instance and computes precision, recall, F-score and accuracy,
macro-averaged over the labels and micro-averaged over the pooled counts. It supports
single-label runs (one label per instance) and multi-label runs (a set of labels per
instance, possibly given as ranking scores and a threshold).

# Outcome files
Outcomes are read from a line-oriented text format:

```text
#ID=PREDICTION;GOLDSTANDARD;THRESHOLD
#labels 0=neg 1=pos
doc1=1;1;-1
doc2=0;1;-1
```

The legend maps label indices to URL-encoded labels. In multi-label mode the prediction and
the gold standard are `,`-joined vectors with one value per label, and the prediction of
label `k` is positive when its score is greater than or equal to the threshold.

# Terminology
* A contingency table holds the true positives, false positives, false negatives and true
    negatives of one label, or of every label pooled together (the combined table).
* A macro measure is the mean of the per-label values. A micro measure is computed once from
    the combined table.
* A zero denominator is not an error. Under the soft policy the ratio is `0`; under the strict
    policy it is `Undefined`, and so is every macro average it takes part in. `Undefined` is
    converted to `NaN` at the boundary.
*/

mod config;
mod contingency;
mod error;
mod evaluator;
mod label_index;
mod metrics;
mod outcome;
mod reporter;

use std::io::BufRead;

// The public api starts here
pub use config::{EvaluationConfig, EvaluationConfigBuilder, DEFAULT_BETA};

pub use contingency::{Bipartition, ConfusionMatrix, ContingencyTable, ContingencyTables};

pub use error::{EvaluationError, InvalidLabelSet, Result};

pub use evaluator::{EvaluationMode, Evaluator, ParsingEvaluationModeError};

pub use label_index::LabelIndex;

pub use metrics::{
    accuracy, f_score, f_score_of, hamming_loss, macro_measures, mean, micro_measures,
    multi_label_accuracy, precision, ratio, recall, single_label_accuracy, subset_accuracy,
    Measure, MetricFragment, MetricValue, ParsingMeasureError, ParsingUndefinedPolicyError,
    UndefinedPolicy,
};

pub use outcome::{Outcome, OutcomeRecord, OutcomeTable, NO_THRESHOLD, OUTCOME_HEADER};

pub use reporter::{EvaluationResult, MetricKey};

/// Builds the index of a label collection. Labels are sorted lexicographically, so the same
/// collection always yields the same indices.
///
/// ```rust
/// use tceval::build_label_index;
///
/// let index = build_label_index(["spam", "ham"]).unwrap();
/// assert_eq!(index.index_of("ham"), Some(0));
/// assert!(build_label_index(["ham", "ham"]).is_err());
/// ```
pub fn build_label_index<I, S>(labels: I) -> Result<LabelIndex>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    LabelIndex::new(labels)
}

/// Reads an outcome table from any line-oriented source, such as a `BufReader` over a file
/// or a byte slice.
pub fn load_outcome_table<R: BufRead>(source: R, mode: EvaluationMode) -> Result<OutcomeTable> {
    OutcomeTable::from_reader(source, mode)
}

/// Main entrypoint of the library. Evaluates `table` in the given `mode` and returns every
/// measure of that mode.
///
/// * `table`: Parsed outcomes.
/// * `mode`: Must match the mode the table was loaded with.
/// * `soft`: Resolve zero denominators to `0` instead of `Undefined`.
/// * `per_label`: Also emit the per-label values, keyed `<Measure>_<label>`.
/// * `thresholds`: One cutoff per label, overriding the per-record thresholds. Multi-label only.
///
/// # Example
/// ```rust
/// use tceval::{evaluate, load_outcome_table, EvaluationMode};
///
/// let content = "#ID=PREDICTION;GOLDSTANDARD;THRESHOLD
/// #labels 0=neg 1=pos
/// d1=1;1;-1
/// d2=0;1;-1
/// d3=0;0;-1
/// d4=1;0;-1
/// ";
/// let table = load_outcome_table(content.as_bytes(), EvaluationMode::SingleLabel).unwrap();
/// let result = evaluate(&table, EvaluationMode::SingleLabel, true, true, None).unwrap();
///
/// assert_eq!(result.value("MacroAccuracy"), Some(0.5));
/// assert_eq!(result.value("MacroPrecision_pos"), Some(0.5));
/// ```
pub fn evaluate(
    table: &OutcomeTable,
    mode: EvaluationMode,
    soft: bool,
    per_label: bool,
    thresholds: Option<Vec<f64>>,
) -> Result<EvaluationResult> {
    let mut builder = EvaluationConfigBuilder::new()
        .mode(mode)
        .policy(soft)
        .individual_label_measures(per_label);
    if let Some(thresholds) = thresholds {
        builder = builder.thresholds(thresholds);
    }
    evaluate_conf(table, builder.build())
}

/// Same as `evaluate`, but takes an `EvaluationConfig`.
///
/// ```rust
/// use tceval::{
///     evaluate_conf, load_outcome_table, EvaluationConfigBuilder, EvaluationMode, Measure,
///     MetricValue, UndefinedPolicy,
/// };
///
/// let content = "#labels 0=acq 1=earn
/// r1=0.8,0.3;1,0;0.5
/// r2=0.4,0.9;1,1;0.5
/// ";
/// let table = load_outcome_table(content.as_bytes(), EvaluationMode::MultiLabel).unwrap();
/// let config = EvaluationConfigBuilder::default()
///     .mode(EvaluationMode::MultiLabel)
///     .policy(UndefinedPolicy::Strict)
///     .build();
/// let result = evaluate_conf(&table, config).unwrap();
///
/// assert_eq!(result.get(Measure::SubsetAccuracy), Some(MetricValue::Defined(0.5)));
/// assert_eq!(result.get(Measure::MicroPrecision), Some(MetricValue::Defined(1.0)));
/// ```
pub fn evaluate_conf(table: &OutcomeTable, config: EvaluationConfig) -> Result<EvaluationResult> {
    Ok(Evaluator::new(table, config)?.calculate_evaluation_measures())
}
