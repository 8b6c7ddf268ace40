/*!
Counting structures derived from an `OutcomeTable`: the single-label confusion matrix, the
multi-label bipartition, and the per-label one-vs-rest contingency tables both decompose into.
*/
use crate::error::{EvaluationError, Result};
use crate::outcome::{is_bit, Outcome, OutcomeTable};
use ndarray::prelude::*;
use ndarray::Zip;
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Cutoff applied to multi-label predictions that carry no threshold. Such predictions are
/// 0/1 bipartitions already.
pub(crate) const BIT_CUTOFF: f64 = 0.5;

/// Binary contingency table of one label (or of all labels pooled together).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContingencyTable {
    pub tp: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tn: usize,
}

impl ContingencyTable {
    pub fn new(tp: usize, fp: usize, fn_: usize, tn: usize) -> Self {
        Self { tp, fp, fn_, tn }
    }

    /// TP + FP + FN + TN
    pub fn total(&self) -> usize {
        self.tp + self.fp + self.fn_ + self.tn
    }

    /// Counts the four cells over aligned predicted and gold decisions of one label. Both
    /// views come from the same `Bipartition`, so they have the same length.
    pub(crate) fn from_bits(predicted: ArrayView1<bool>, gold: ArrayView1<bool>) -> Self {
        Zip::from(predicted)
            .and(gold)
            .fold(Self::default(), |mut table, &p, &g| {
                match (p, g) {
                    (true, true) => table.tp += 1,
                    (true, false) => table.fp += 1,
                    (false, true) => table.fn_ += 1,
                    (false, false) => table.tn += 1,
                };
                table
            })
    }
}

impl Add for ContingencyTable {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            tp: self.tp + rhs.tp,
            fp: self.fp + rhs.fp,
            fn_: self.fn_ + rhs.fn_,
            tn: self.tn + rhs.tn,
        }
    }
}

impl AddAssign for ContingencyTable {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs
    }
}

impl Sum for ContingencyTable {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a ContingencyTable> for ContingencyTable {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// One contingency table per label, in label index order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContingencyTables {
    tables: Array1<ContingencyTable>,
    instances: usize,
}

impl ContingencyTables {
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn get(&self, label_index: usize) -> Option<&ContingencyTable> {
        self.tables.get(label_index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContingencyTable> {
        self.tables.iter()
    }

    /// Number of instances `N` the tables were counted over.
    pub fn instances(&self) -> usize {
        self.instances
    }

    /// Cell-wise sum of every table, used by the micro measures.
    pub fn combined(&self) -> ContingencyTable {
        self.tables.iter().sum()
    }
}

/// `L × L` counts of single-label outcomes. Rows are gold labels, columns are predictions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    matrix: Array2<usize>,
}

impl ConfusionMatrix {
    pub fn from_outcomes(table: &OutcomeTable) -> Result<Self> {
        let label_count = table.labels().len();
        let mut matrix: Array2<usize> = Array2::zeros((label_count, label_count));
        for (id, outcome) in table.iter() {
            match outcome {
                Outcome::SingleLabel { predicted, gold } => matrix[[*gold, *predicted]] += 1,
                Outcome::MultiLabel { .. } => {
                    return Err(EvaluationError::unsupported(format!(
                        "record `{}` is multi-label, a confusion matrix needs single-label outcomes",
                        id
                    )))
                }
            }
        }
        Ok(Self { matrix })
    }

    /// Count of instances with gold label `gold` that were predicted as `predicted`.
    pub fn get(&self, gold: usize, predicted: usize) -> Option<usize> {
        self.matrix.get([gold, predicted]).copied()
    }

    /// Correctly classified instances.
    pub fn trace(&self) -> usize {
        self.matrix.diag().sum()
    }

    /// Number of instances, `N`.
    pub fn total(&self) -> usize {
        self.matrix.sum()
    }

    /// One-vs-rest decomposition. For label `k`, TP is the diagonal cell, FP the rest of the
    /// column, FN the rest of the row and TN everything else.
    pub fn decompose(&self) -> ContingencyTables {
        let total = self.total();
        let predicted_sums = self.matrix.sum_axis(Axis(0));
        let gold_sums = self.matrix.sum_axis(Axis(1));
        let tables: Array1<ContingencyTable> = Zip::from(self.matrix.diag())
            .and(&predicted_sums)
            .and(&gold_sums)
            .map_collect(|&tp, &predicted, &gold| {
                let fp = predicted - tp;
                let fn_ = gold - tp;
                ContingencyTable::new(tp, fp, fn_, total - tp - fp - fn_)
            });
        ContingencyTables {
            tables,
            instances: total,
        }
    }
}

/// Thresholded multi-label decisions: an `N × L` boolean matrix of predictions and one of gold
/// labels, rows ordered by instance id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bipartition {
    predicted: Array2<bool>,
    gold: Array2<bool>,
}

impl Bipartition {
    /// Turns multi-label scores into decisions. The cutoff of label `k` is `thresholds[k]`
    /// when given, otherwise the threshold of the record. A record with neither must be a 0/1
    /// bipartition already. A prediction is positive when `score >= cutoff`.
    ///
    /// Fails with `UnsupportedEvaluationMode` when `thresholds` does not hold one finite value
    /// per label.
    pub fn from_outcomes(
        table: &OutcomeTable,
        thresholds: Option<&[f64]>,
        parallel: bool,
    ) -> Result<Self> {
        let label_count = table.labels().len();
        if let Some(thresholds) = thresholds {
            validate_thresholds(thresholds, label_count)?;
        }
        let mut rows = Vec::with_capacity(table.len());
        for (id, outcome) in table.iter() {
            match outcome {
                Outcome::MultiLabel {
                    predicted,
                    gold,
                    threshold,
                } => {
                    if thresholds.is_none()
                        && threshold.is_none()
                        && !predicted.iter().all(|&v| is_bit(v))
                    {
                        return Err(EvaluationError::unsupported(format!(
                            "record `{}` holds ranking scores but no threshold",
                            id
                        )));
                    }
                    rows.push((predicted.as_slice(), gold.as_slice(), *threshold));
                }
                Outcome::SingleLabel { .. } => {
                    return Err(EvaluationError::unsupported(format!(
                        "record `{}` is single-label, a bipartition needs multi-label outcomes",
                        id
                    )))
                }
            }
        }
        let shape = (rows.len(), label_count);
        let scores = Array2::from_shape_fn(shape, |(i, k)| rows[i].0[k]);
        let cutoffs = Array2::from_shape_fn(shape, |(i, k)| {
            thresholds
                .map(|t| t[k])
                .or(rows[i].2)
                .unwrap_or(BIT_CUTOFF)
        });
        let gold = Array2::from_shape_fn(shape, |(i, k)| rows[i].1[k] == 1.0);
        let decide = Zip::from(&scores).and(&cutoffs);
        let predicted = if parallel {
            decide.par_map_collect(|&score, &cutoff| score >= cutoff)
        } else {
            decide.map_collect(|&score, &cutoff| score >= cutoff)
        };
        log::trace!("Bipartition of shape {:?}", shape);
        Ok(Self { predicted, gold })
    }

    /// Number of instances, `N`.
    pub fn instances(&self) -> usize {
        self.predicted.nrows()
    }

    pub fn predicted(&self) -> ArrayView2<bool> {
        self.predicted.view()
    }

    pub fn gold(&self) -> ArrayView2<bool> {
        self.gold.view()
    }

    /// Instances whose predicted label set equals the gold label set.
    pub fn exact_matches(&self) -> usize {
        Zip::from(self.predicted.rows())
            .and(self.gold.rows())
            .fold(0, |count, p, g| count + usize::from(p == g))
    }

    /// One contingency table per label column.
    pub fn decompose(&self) -> ContingencyTables {
        let tables = Zip::from(self.predicted.columns())
            .and(self.gold.columns())
            .map_collect(ContingencyTable::from_bits);
        ContingencyTables {
            tables,
            instances: self.instances(),
        }
    }
}

/// One finite cutoff per label.
fn validate_thresholds(thresholds: &[f64], label_count: usize) -> Result<()> {
    if thresholds.len() != label_count {
        return Err(EvaluationError::unsupported(format!(
            "{} thresholds were given for {} labels",
            thresholds.len(),
            label_count
        )));
    }
    if thresholds.iter().any(|t| !t.is_finite()) {
        return Err(EvaluationError::unsupported("thresholds must be finite"));
    }
    Ok(())
}
