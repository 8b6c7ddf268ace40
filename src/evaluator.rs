/*!
Orchestration of one evaluation run. An `Evaluator` is built over an `OutcomeTable` and an
`EvaluationConfig`; every unsupported configuration is rejected by `Evaluator::new`, before any
metric is computed. The derived counts are built once and owned by the evaluator, so the
outcome table can be shared by several evaluators.
*/
use crate::config::EvaluationConfig;
use crate::contingency::{Bipartition, ConfusionMatrix, ContingencyTables};
use crate::error::{EvaluationError, Result};
use crate::metrics::{
    hamming_loss, macro_measures, micro_measures, multi_label_accuracy, single_label_accuracy,
    subset_accuracy,
};
use crate::outcome::OutcomeTable;
use crate::reporter::EvaluationResult;
use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Does every instance carry exactly one label, or a set of labels?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Sequence)]
pub enum EvaluationMode {
    SingleLabel,
    MultiLabel,
}

impl Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleLabel => write!(f, "single-label"),
            Self::MultiLabel => write!(f, "multi-label"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsingEvaluationModeError(String);

impl Display for ParsingEvaluationModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not parse `{}` into an `EvaluationMode`", self.0)
    }
}
impl std::error::Error for ParsingEvaluationModeError {}

impl FromStr for EvaluationMode {
    type Err = ParsingEvaluationModeError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "singlelabel" | "single" => Ok(Self::SingleLabel),
            "multilabel" | "multi" => Ok(Self::MultiLabel),
            _ => Err(ParsingEvaluationModeError(String::from(s))),
        }
    }
}

/// Counts derived from the outcome table, per mode.
#[derive(Debug, Clone)]
enum Counts {
    SingleLabel {
        tables: ContingencyTables,
    },
    MultiLabel {
        tables: ContingencyTables,
        bipartition: Bipartition,
    },
}

impl Counts {
    fn tables(&self) -> &ContingencyTables {
        match self {
            Self::SingleLabel { tables } => tables,
            Self::MultiLabel { tables, .. } => tables,
        }
    }
}

/// A configured evaluation over one outcome table. Calling the `calculate_*` methods any
/// number of times yields identical results.
#[derive(Debug, Clone)]
pub struct Evaluator<'a> {
    table: &'a OutcomeTable,
    config: EvaluationConfig,
    counts: Counts,
}

impl<'a> Evaluator<'a> {
    /// Validates `config` against `table` and builds the contingency tables.
    pub fn new(table: &'a OutcomeTable, config: EvaluationConfig) -> Result<Self> {
        if config.mode != table.mode() {
            return Err(EvaluationError::unsupported(format!(
                "a {} evaluation cannot run over {} outcomes",
                config.mode,
                table.mode()
            )));
        }
        if !config.beta.is_finite() || config.beta <= 0.0 {
            return Err(EvaluationError::BetaNotPositive);
        }
        if config.thresholds().is_some() && config.mode == EvaluationMode::SingleLabel {
            return Err(EvaluationError::unsupported(
                "per-label thresholds only apply to multi-label evaluations",
            ));
        }
        let counts = match config.mode {
            EvaluationMode::SingleLabel => Counts::SingleLabel {
                tables: ConfusionMatrix::from_outcomes(table)?.decompose(),
            },
            EvaluationMode::MultiLabel => {
                let bipartition =
                    Bipartition::from_outcomes(table, config.thresholds(), config.parallel)?;
                Counts::MultiLabel {
                    tables: bipartition.decompose(),
                    bipartition,
                }
            }
        };
        log::debug!(
            "Configured a {} evaluation over {} instances and {} labels",
            config.mode,
            table.len(),
            table.labels().len()
        );
        Ok(Self {
            table,
            config,
            counts,
        })
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Per-label contingency tables, in label index order.
    pub fn contingency_tables(&self) -> &ContingencyTables {
        self.counts.tables()
    }

    /// Every measure of the configured mode: macro precision, recall, F-score and accuracy,
    /// the micro measures, and for multi-label runs the subset accuracy and Hamming loss.
    pub fn calculate_evaluation_measures(&self) -> EvaluationResult {
        log::debug!("Calculating {} evaluation measures", self.config.mode);
        let labels = self.table.labels();
        let policy = self.config.policy;
        let tables = self.counts.tables();
        let mut result = EvaluationResult::default();
        result.extend(macro_measures(
            tables,
            labels,
            self.config.beta,
            policy,
            self.config.individual_label_measures,
        ));
        match &self.counts {
            Counts::SingleLabel { tables } => {
                result.extend(single_label_accuracy(tables, policy));
            }
            Counts::MultiLabel {
                tables,
                bipartition,
            } => {
                result.extend(multi_label_accuracy(
                    tables,
                    labels,
                    policy,
                    self.config.individual_label_measures,
                ));
                result.extend(subset_accuracy(bipartition, policy));
                result.extend(hamming_loss(&tables.combined(), policy));
            }
        }
        result.extend(micro_measures(&tables.combined(), self.config.beta, policy));
        result
    }

    /// Micro precision, recall and F-score only, from the combined contingency table.
    pub fn calculate_micro_evaluation_measures(&self) -> EvaluationResult {
        log::debug!("Calculating {} micro measures", self.config.mode);
        let combined = self.counts.tables().combined();
        EvaluationResult::from_iter(micro_measures(
            &combined,
            self.config.beta,
            self.config.policy,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluationConfigBuilder;
    use crate::metrics::{Measure, MetricValue, UndefinedPolicy};
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    const MULTI: &str = "#ID=PREDICTION;GOLDSTANDARD;THRESHOLD
#labels 0=a 1=b 2=c
x=1,0,1;1,0,1;-1
y=1,0,0;1,1,0;-1
z=0,0,0;0,0,0;-1
";

    fn single_table() -> OutcomeTable {
        OutcomeTable::from_label_pairs([
            ("1", "a", "a"),
            ("2", "a", "a"),
            ("3", "b", "a"),
            ("4", "b", "b"),
            ("5", "c", "b"),
            ("6", "c", "c"),
            ("7", "a", "c"),
            ("8", "c", "c"),
        ])
        .unwrap()
    }

    fn multi_table() -> OutcomeTable {
        OutcomeTable::parse_str(MULTI, EvaluationMode::MultiLabel).unwrap()
    }

    fn value(result: &EvaluationResult, measure: Measure) -> f64 {
        result.get(measure).unwrap().defined().unwrap()
    }

    #[test]
    fn test_single_label_measures() {
        let table = single_table();
        let evaluator = Evaluator::new(&table, EvaluationConfig::default()).unwrap();
        let result = evaluator.calculate_evaluation_measures();
        assert_abs_diff_eq!(value(&result, Measure::MacroPrecision), 11.0 / 18.0, epsilon = 1e-12);
        assert_abs_diff_eq!(value(&result, Measure::MacroRecall), 11.0 / 18.0, epsilon = 1e-12);
        assert_abs_diff_eq!(value(&result, Measure::MacroFScore), 11.0 / 18.0, epsilon = 1e-12);
        assert_abs_diff_eq!(value(&result, Measure::MacroAccuracy), 0.625, epsilon = 1e-12);
        assert_abs_diff_eq!(value(&result, Measure::MicroPrecision), 0.625, epsilon = 1e-12);
        assert_abs_diff_eq!(value(&result, Measure::MicroRecall), 0.625, epsilon = 1e-12);
        assert_eq!(result.get(Measure::SubsetAccuracy), None);
        assert_eq!(result.get(Measure::HammingLoss), None);
        assert_eq!(result.len(), 7);
    }

    #[test]
    fn test_single_label_individual_measures() {
        let table = single_table();
        let config = EvaluationConfigBuilder::default()
            .individual_label_measures(true)
            .build();
        let result = Evaluator::new(&table, config)
            .unwrap()
            .calculate_evaluation_measures();
        assert_eq!(
            result.get_label(Measure::MacroPrecision, "b"),
            Some(MetricValue::Defined(0.5))
        );
        assert_eq!(result.get_label(Measure::MacroAccuracy, "b"), None);
        assert_eq!(result.len(), 7 + 3 * 3);
    }

    #[test]
    fn test_multi_label_measures() {
        let table = multi_table();
        let config = EvaluationConfig::new(EvaluationMode::MultiLabel);
        let result = Evaluator::new(&table, config)
            .unwrap()
            .calculate_evaluation_measures();
        assert_abs_diff_eq!(value(&result, Measure::MacroPrecision), 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(value(&result, Measure::MacroRecall), 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(value(&result, Measure::MacroFScore), 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(value(&result, Measure::MacroAccuracy), 8.0 / 9.0, epsilon = 1e-12);
        assert_abs_diff_eq!(value(&result, Measure::MicroPrecision), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(value(&result, Measure::MicroRecall), 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(value(&result, Measure::MicroFScore), 6.0 / 7.0, epsilon = 1e-12);
        assert_abs_diff_eq!(value(&result, Measure::SubsetAccuracy), 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(value(&result, Measure::HammingLoss), 1.0 / 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_multi_label_strict_poisons_macro_only() {
        let table = multi_table();
        let config = EvaluationConfigBuilder::new()
            .mode(EvaluationMode::MultiLabel)
            .policy(false)
            .individual_label_measures(true)
            .build();
        let result = Evaluator::new(&table, config)
            .unwrap()
            .calculate_evaluation_measures();
        assert_eq!(result.get(Measure::MacroPrecision), Some(MetricValue::Undefined));
        assert_eq!(result.get(Measure::MacroFScore), Some(MetricValue::Undefined));
        assert_eq!(
            result.get_label(Measure::MacroPrecision, "b"),
            Some(MetricValue::Undefined)
        );
        assert_abs_diff_eq!(value(&result, Measure::MacroRecall), 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(value(&result, Measure::MicroPrecision), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(value(&result, Measure::SubsetAccuracy), 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_micro_measures_only() {
        let table = multi_table();
        let config = EvaluationConfig::new(EvaluationMode::MultiLabel);
        let evaluator = Evaluator::new(&table, config).unwrap();
        let micro = evaluator.calculate_micro_evaluation_measures();
        assert_eq!(micro.len(), 3);
        let full = evaluator.calculate_evaluation_measures();
        for (key, value) in micro.iter() {
            assert_eq!(full.get(key.measure), Some(*value));
        }
    }

    #[rstest]
    #[case(UndefinedPolicy::Soft, MetricValue::Defined(0.0))]
    #[case(UndefinedPolicy::Strict, MetricValue::Undefined)]
    fn test_empty_table(#[case] policy: UndefinedPolicy, #[case] expected: MetricValue) {
        for mode in enum_iterator::all::<EvaluationMode>() {
            let table = OutcomeTable::parse_str("#labels 0=a 1=b\n", mode).unwrap();
            let config = EvaluationConfigBuilder::default()
                .mode(mode)
                .policy(policy)
                .build();
            let result = Evaluator::new(&table, config)
                .unwrap()
                .calculate_evaluation_measures();
            assert!(result.iter().all(|(_, value)| *value == expected));
        }
    }

    #[test]
    fn test_idempotence() {
        let table = multi_table();
        let config = EvaluationConfigBuilder::default()
            .mode(EvaluationMode::MultiLabel)
            .individual_label_measures(true)
            .build();
        let evaluator = Evaluator::new(&table, config).unwrap();
        assert_eq!(
            evaluator.calculate_evaluation_measures(),
            evaluator.calculate_evaluation_measures()
        );
    }

    #[rstest]
    #[case(EvaluationConfig::new(EvaluationMode::MultiLabel), true)]
    #[case(EvaluationConfigBuilder::default().thresholds(vec![0.5, 0.5, 0.5]).build(), true)]
    #[case(EvaluationConfigBuilder::default().mode(EvaluationMode::MultiLabel).build(), false)]
    fn test_single_label_configurations(#[case] config: EvaluationConfig, #[case] fails: bool) {
        let table = single_table();
        let res = Evaluator::new(&table, config);
        assert_eq!(
            matches!(res, Err(EvaluationError::UnsupportedEvaluationMode(_))),
            fails
        );
    }

    #[rstest]
    #[case(vec![0.5, 0.5])]
    #[case(vec![0.5, f64::NAN, 0.5])]
    #[case(vec![0.5, 0.5, 0.5, 0.5])]
    fn test_invalid_thresholds(#[case] thresholds: Vec<f64>) {
        let table = multi_table();
        let config = EvaluationConfigBuilder::default()
            .mode(EvaluationMode::MultiLabel)
            .thresholds(thresholds)
            .build();
        assert!(matches!(
            Evaluator::new(&table, config),
            Err(EvaluationError::UnsupportedEvaluationMode(_))
        ));
    }

    #[rstest]
    #[case(0.0)]
    #[case(-1.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn test_beta_not_positive(#[case] beta: f64) {
        let table = single_table();
        let config = EvaluationConfigBuilder::default().beta(beta).build();
        assert!(matches!(
            Evaluator::new(&table, config),
            Err(EvaluationError::BetaNotPositive)
        ));
    }

    #[test]
    fn test_ranking_scores_without_threshold() {
        let content = "#labels 0=a 1=b\nx=0.7,0.1;1,0;-1\n";
        let table = OutcomeTable::parse_str(content, EvaluationMode::MultiLabel).unwrap();
        let config = EvaluationConfig::new(EvaluationMode::MultiLabel);
        assert!(matches!(
            Evaluator::new(&table, config),
            Err(EvaluationError::UnsupportedEvaluationMode(_))
        ));
    }

    #[rstest]
    #[case("single-label", EvaluationMode::SingleLabel)]
    #[case("SingleLabel", EvaluationMode::SingleLabel)]
    #[case("multi_label", EvaluationMode::MultiLabel)]
    #[case("multi", EvaluationMode::MultiLabel)]
    fn test_mode_from_str(#[case] s: &str, #[case] expected: EvaluationMode) {
        assert_eq!(EvaluationMode::from_str(s), Ok(expected));
        assert_eq!(
            EvaluationMode::from_str(&expected.to_string()),
            Ok(expected)
        );
    }

    #[test]
    fn test_mode_from_str_fails() {
        assert!(EvaluationMode::from_str("regression").is_err());
    }
}
