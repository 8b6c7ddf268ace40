/*!
This module holds the result of an evaluation. It can be displayed as a two-column dataframe,
queried by measure, or consumed into a plain map of names to `f64`.
*/
use crate::metrics::{Measure, MetricFragment, MetricValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

/// Name of a metric in an `EvaluationResult`: an aggregate measure such as `MacroFScore`, or
/// a per-label entry such as `MacroFScore_spam`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetricKey {
    pub measure: Measure,
    pub label: Option<String>,
}

impl MetricKey {
    pub fn aggregate(measure: Measure) -> Self {
        Self {
            measure,
            label: None,
        }
    }

    pub fn per_label(measure: Measure, label: &str) -> Self {
        Self {
            measure,
            label: Some(String::from(label)),
        }
    }
}

impl Display for MetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{}_{}", self.measure, label),
            None => write!(f, "{}", self.measure),
        }
    }
}

/// Metric values of one evaluation, ordered by measure and then by label. Aggregates come
/// before their per-label entries.
///
/// # Example
///
/// ```rust
/// use tceval::{evaluate, EvaluationMode, Measure, MetricValue, OutcomeTable};
///
/// let table = OutcomeTable::from_label_pairs([
///     ("d1", "spam", "spam"),
///     ("d2", "ham", "spam"),
///     ("d3", "ham", "ham"),
///     ("d4", "ham", "ham"),
/// ])
/// .unwrap();
/// let result = evaluate(&table, EvaluationMode::SingleLabel, true, false, None).unwrap();
///
/// assert_eq!(result.get(Measure::MacroAccuracy), Some(MetricValue::Defined(0.75)));
/// assert_eq!(result.value("MicroPrecision"), Some(0.75));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvaluationResult {
    metrics: BTreeMap<MetricKey, MetricValue>,
}

impl EvaluationResult {
    /// Adds every value of a calculator's fragment. A key already present is overwritten.
    pub(crate) fn extend(&mut self, fragment: MetricFragment) {
        self.metrics.extend(fragment)
    }

    /// Value of an aggregate measure.
    pub fn get(&self, measure: Measure) -> Option<MetricValue> {
        self.metrics.get(&MetricKey::aggregate(measure)).copied()
    }

    /// Value of a per-label entry.
    pub fn get_label(&self, measure: Measure, label: &str) -> Option<MetricValue> {
        self.metrics
            .get(&MetricKey::per_label(measure, label))
            .copied()
    }

    /// Looks a metric up by its external name, e.g. `MacroRecall` or `MacroRecall_spam`.
    /// Undefined values are NaN.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.metrics
            .iter()
            .find(|(key, _)| key.to_string() == name)
            .map(|(_, value)| value.to_f64())
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetricKey, &MetricValue)> {
        self.metrics.iter()
    }
}

impl FromIterator<(MetricKey, MetricValue)> for EvaluationResult {
    fn from_iter<T: IntoIterator<Item = (MetricKey, MetricValue)>>(iter: T) -> Self {
        Self {
            metrics: iter.into_iter().collect(),
        }
    }
}

/// The external representation: metric names mapped to `f64`, `NaN` for undefined values.
impl From<EvaluationResult> for HashMap<String, f64> {
    fn from(value: EvaluationResult) -> Self {
        value
            .metrics
            .into_iter()
            .map(|(key, metric)| (key.to_string(), metric.to_f64()))
            .collect()
    }
}

impl From<EvaluationResult> for BTreeMap<String, f64> {
    fn from(value: EvaluationResult) -> Self {
        value
            .metrics
            .into_iter()
            .map(|(key, metric)| (key.to_string(), metric.to_f64()))
            .collect()
    }
}

/// The result acts as a dataframe when displayed.
impl Display for EvaluationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Measure, Value")?;
        for (key, value) in self.metrics.iter() {
            writeln!(f, "{}, {}", key, value)?
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_result() -> EvaluationResult {
        EvaluationResult::from_iter([
            (
                MetricKey::per_label(Measure::MacroRecall, "spam"),
                MetricValue::Undefined,
            ),
            (
                MetricKey::aggregate(Measure::MacroRecall),
                MetricValue::Undefined,
            ),
            (
                MetricKey::aggregate(Measure::MacroPrecision),
                MetricValue::Defined(0.5),
            ),
            (
                MetricKey::per_label(Measure::MacroRecall, "ham"),
                MetricValue::Defined(1.0),
            ),
        ])
    }

    #[test]
    fn test_key_names() {
        assert_eq!(
            MetricKey::aggregate(Measure::MicroFScore).to_string(),
            "MicroFScore"
        );
        assert_eq!(
            MetricKey::per_label(Measure::MacroFScore, "New York").to_string(),
            "MacroFScore_New York"
        );
    }

    #[test]
    fn test_lookups() {
        let result = build_result();
        assert_eq!(result.len(), 4);
        assert_eq!(
            result.get(Measure::MacroPrecision),
            Some(MetricValue::Defined(0.5))
        );
        assert_eq!(result.get(Measure::MicroRecall), None);
        assert_eq!(
            result.get_label(Measure::MacroRecall, "ham"),
            Some(MetricValue::Defined(1.0))
        );
        assert!(result.value("MacroRecall_spam").unwrap().is_nan());
        assert_eq!(result.value("MacroPrecision"), Some(0.5));
        assert_eq!(result.value("MacroPrecision_spam"), None);
    }

    #[test]
    fn test_into_map() {
        let map: HashMap<String, f64> = build_result().into();
        assert_eq!(map.len(), 4);
        assert_eq!(map["MacroRecall_ham"], 1.0);
        assert!(map["MacroRecall"].is_nan());
    }

    #[test]
    fn test_display() {
        let expected = "Measure, Value
MacroPrecision, 0.5
MacroRecall, NaN
MacroRecall_ham, 1
MacroRecall_spam, NaN
";
        assert_eq!(build_result().to_string(), expected);
    }
}
