/*!
The outcome table: one (prediction, gold standard, threshold) record per classified instance,
keyed by instance id. Tables are read from the line-oriented outcome format

```text
#ID=PREDICTION;GOLDSTANDARD;THRESHOLD
#labels 0=neg 1=pos
doc1=1;1;-1
doc2=0;1;-1
```

In multi-label mode, prediction and gold standard are `,`-joined vectors of length `L`:
predictions may be ranking scores, the gold standard is a 0/1 bit-vector.
*/
use crate::error::{EvaluationError, Result};
use crate::evaluator::EvaluationMode;
use crate::label_index::{LabelIndex, LEGEND_PREFIX};
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

/// Header line written at the top of every outcome file.
pub const OUTCOME_HEADER: &str = "#ID=PREDICTION;GOLDSTANDARD;THRESHOLD";
/// Threshold value meaning "not applicable".
pub const NO_THRESHOLD: f64 = -1.0;

const FIELD_SEPARATOR: char = ';';
const VALUE_SEPARATOR: char = ',';

/// The outcome of a single classified instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Indices into the `LabelIndex` of the table.
    SingleLabel { predicted: usize, gold: usize },
    /// One value per label. Without a threshold the predictions must already be a 0/1
    /// bipartition.
    MultiLabel {
        predicted: Vec<f64>,
        gold: Vec<f64>,
        threshold: Option<f64>,
    },
}

impl Outcome {
    pub fn mode(&self) -> EvaluationMode {
        match self {
            Self::SingleLabel { .. } => EvaluationMode::SingleLabel,
            Self::MultiLabel { .. } => EvaluationMode::MultiLabel,
        }
    }

    /// Checks the outcome against the label index. `position` is the line (or record)
    /// number reported in errors.
    fn validate(&self, labels: &LabelIndex, position: usize) -> Result<()> {
        let label_count = labels.len();
        match self {
            Self::SingleLabel { predicted, gold } => {
                for &index in [predicted, gold] {
                    if index >= label_count {
                        return Err(EvaluationError::UnknownLabelIndex {
                            line: position,
                            index,
                            label_count,
                        });
                    }
                }
            }
            Self::MultiLabel {
                predicted,
                gold,
                threshold,
            } => {
                for values in [predicted, gold] {
                    if values.len() > label_count {
                        return Err(EvaluationError::UnknownLabelIndex {
                            line: position,
                            index: values.len() - 1,
                            label_count,
                        });
                    }
                    if values.len() < label_count {
                        return Err(EvaluationError::malformed(
                            position,
                            format!("expected {} values, found {}", label_count, values.len()),
                        ));
                    }
                    if values.iter().any(|v| !v.is_finite()) {
                        return Err(EvaluationError::malformed(position, "non-finite value"));
                    }
                }
                if !gold.iter().all(|&g| is_bit(g)) {
                    return Err(EvaluationError::malformed(
                        position,
                        "the gold standard must be a 0/1 vector",
                    ));
                }
                if threshold.is_some_and(|t| !t.is_finite()) {
                    return Err(EvaluationError::malformed(position, "non-finite threshold"));
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn is_bit(value: f64) -> bool {
    value == 0.0 || value == 1.0
}

/// A record handed to `OutcomeTable::from_records`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeRecord {
    pub id: String,
    pub outcome: Outcome,
}

impl OutcomeRecord {
    pub fn new(id: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            id: id.into(),
            outcome,
        }
    }
}

/// Parsed, immutable outcomes of one evaluation run.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeTable {
    mode: EvaluationMode,
    labels: LabelIndex,
    outcomes: BTreeMap<String, Outcome>,
}

impl OutcomeTable {
    /// Builds a table from records, validating every record against `labels`.
    pub fn from_records<I>(mode: EvaluationMode, labels: LabelIndex, records: I) -> Result<Self>
    where
        I: IntoIterator<Item = OutcomeRecord>,
    {
        let mut outcomes = BTreeMap::new();
        for (position, record) in records.into_iter().enumerate() {
            let outcome = normalize(record.outcome);
            if outcome.mode() != mode {
                return Err(EvaluationError::unsupported(format!(
                    "record `{}` is {} but the table is {}",
                    record.id,
                    outcome.mode(),
                    mode
                )));
            }
            outcome.validate(&labels, position + 1)?;
            if outcomes.contains_key(&record.id) {
                return Err(EvaluationError::DuplicateInstanceId(record.id));
            }
            outcomes.insert(record.id, outcome);
        }
        Ok(Self {
            mode,
            labels,
            outcomes,
        })
    }

    /// Builds a single-label table from `(id, predicted, gold)` label strings. The label
    /// index is the lexicographic union of every observed label.
    pub fn from_label_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, S, S)>,
        S: AsRef<str>,
    {
        let pairs: Vec<(S, S, S)> = pairs.into_iter().collect();
        let labels = LabelIndex::from_observed(
            pairs
                .iter()
                .flat_map(|(_, p, g)| [p.as_ref(), g.as_ref()]),
        )?;
        let mut records = Vec::with_capacity(pairs.len());
        for (position, (id, predicted, gold)) in pairs.iter().enumerate() {
            let index_of = |label: &str| {
                labels
                    .index_of(label)
                    .ok_or(EvaluationError::UnknownLabelIndex {
                        line: position + 1,
                        index: labels.len(),
                        label_count: labels.len(),
                    })
            };
            let predicted = index_of(predicted.as_ref())?;
            let gold = index_of(gold.as_ref())?;
            records.push(OutcomeRecord::new(
                id.as_ref(),
                Outcome::SingleLabel { predicted, gold },
            ));
        }
        Self::from_records(EvaluationMode::SingleLabel, labels, records)
    }

    /// Reads a table from an outcome file.
    pub fn from_path<P: AsRef<Path>>(path: P, mode: EvaluationMode) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), mode)
    }

    /// Parses an outcome file held in memory.
    pub fn parse_str(content: &str, mode: EvaluationMode) -> Result<Self> {
        Self::from_reader(content.as_bytes(), mode)
    }

    /// Reads a table from any line-oriented source, in one sequential pass.
    pub fn from_reader<R: BufRead>(source: R, mode: EvaluationMode) -> Result<Self> {
        let mut labels: Option<LabelIndex> = None;
        let mut outcomes = BTreeMap::new();
        let mut line_number = 0;
        for line in source.lines() {
            line_number += 1;
            let line = line.map_err(|err| match err.kind() {
                io::ErrorKind::InvalidData => {
                    EvaluationError::malformed(line_number, "the line is not valid UTF-8")
                }
                _ => EvaluationError::Io(err),
            })?;
            let content = line.trim();
            if content.is_empty() {
                continue;
            }
            if content.starts_with(LEGEND_PREFIX) {
                if labels.is_some() {
                    return Err(EvaluationError::malformed(line_number, "second `#labels` legend"));
                }
                labels = Some(LabelIndex::parse_legend(content, line_number)?);
                continue;
            }
            if content.starts_with('#') {
                log::trace!("Skipping comment on line {}", line_number);
                continue;
            }
            let labels = labels.as_ref().ok_or_else(|| {
                EvaluationError::malformed(line_number, "data line before the `#labels` legend")
            })?;
            let (id, outcome) = parse_data_line(content, line_number, mode)?;
            outcome.validate(labels, line_number)?;
            if outcomes.contains_key(id) {
                return Err(EvaluationError::DuplicateInstanceId(String::from(id)));
            }
            outcomes.insert(String::from(id), outcome);
        }
        let labels = labels
            .ok_or_else(|| EvaluationError::malformed(line_number, "missing `#labels` legend"))?;
        log::debug!(
            "Loaded {} {} outcomes over {} labels",
            outcomes.len(),
            mode,
            labels.len()
        );
        Ok(Self {
            mode,
            labels,
            outcomes,
        })
    }

    /// Writes the table in the outcome format. Reading the output back yields an equal
    /// table.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write!(writer, "{}", self)?;
        Ok(())
    }

    /// Combines the outcomes of two tables of the same mode, e.g. two cross-validation
    /// folds. Tables over different label sets are re-indexed onto the lexicographic union
    /// of both sets. A multi-label outcome scores a label it never declared as 0, both as
    /// prediction and as gold standard.
    pub fn merge(&self, other: &OutcomeTable) -> Result<OutcomeTable> {
        if self.mode != other.mode {
            return Err(EvaluationError::unsupported(format!(
                "cannot merge {} outcomes with {} outcomes",
                self.mode, other.mode
            )));
        }
        if let Some(id) = other.outcomes.keys().find(|id| self.outcomes.contains_key(*id)) {
            return Err(EvaluationError::DuplicateInstanceId(id.clone()));
        }
        if self.labels == other.labels {
            let mut outcomes = self.outcomes.clone();
            outcomes.extend(other.outcomes.clone());
            return Ok(Self {
                mode: self.mode,
                labels: self.labels.clone(),
                outcomes,
            });
        }
        let labels = LabelIndex::from_observed(
            self.labels
                .labels()
                .iter()
                .chain(other.labels.labels())
                .cloned(),
        )?;
        log::debug!(
            "Merging {} outcomes over {} and {} labels onto {} labels",
            self.mode,
            self.labels.len(),
            other.labels.len(),
            labels.len()
        );
        let mut outcomes = BTreeMap::new();
        for table in [self, other] {
            for (id, outcome) in table.outcomes.iter() {
                outcomes.insert(id.clone(), table.reindex(outcome, &labels)?);
            }
        }
        Ok(Self {
            mode: self.mode,
            labels,
            outcomes,
        })
    }

    fn reindex(&self, outcome: &Outcome, target: &LabelIndex) -> Result<Outcome> {
        let translate = |index: usize| {
            self.labels
                .label_of(index)
                .and_then(|label| target.index_of(label))
                .ok_or(EvaluationError::UnknownLabelIndex {
                    line: 0,
                    index,
                    label_count: self.labels.len(),
                })
        };
        match outcome {
            Outcome::SingleLabel { predicted, gold } => Ok(Outcome::SingleLabel {
                predicted: translate(*predicted)?,
                gold: translate(*gold)?,
            }),
            Outcome::MultiLabel {
                predicted,
                gold,
                threshold,
            } => {
                let spread = |values: &[f64]| -> Result<Vec<f64>> {
                    let mut spread = vec![0.0; target.len()];
                    for (index, value) in values.iter().enumerate() {
                        spread[translate(index)?] = *value;
                    }
                    Ok(spread)
                };
                Ok(Outcome::MultiLabel {
                    predicted: spread(predicted)?,
                    gold: spread(gold)?,
                    threshold: *threshold,
                })
            }
        }
    }

    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }

    pub fn labels(&self) -> &LabelIndex {
        &self.labels
    }

    /// Number of instances, `N`.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Outcome> {
        self.outcomes.get(id)
    }

    /// Outcomes ordered by instance id.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Outcome)> {
        self.outcomes.iter().map(|(id, o)| (id.as_str(), o))
    }
}

impl Display for OutcomeTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", OUTCOME_HEADER)?;
        writeln!(f, "{}", self.labels.to_legend())?;
        for (id, outcome) in self.iter() {
            match outcome {
                Outcome::SingleLabel { predicted, gold } => {
                    writeln!(f, "{}={};{};{}", id, predicted, gold, NO_THRESHOLD)?
                }
                Outcome::MultiLabel {
                    predicted,
                    gold,
                    threshold,
                } => writeln!(
                    f,
                    "{}={};{};{}",
                    id,
                    predicted.iter().join(","),
                    gold.iter().join(","),
                    threshold.unwrap_or(NO_THRESHOLD)
                )?,
            }
        }
        Ok(())
    }
}

/// The `-1` threshold sentinel is stored as `None`.
fn normalize(outcome: Outcome) -> Outcome {
    match outcome {
        Outcome::MultiLabel {
            predicted,
            gold,
            threshold,
        } => Outcome::MultiLabel {
            predicted,
            gold,
            threshold: threshold.filter(|t| *t != NO_THRESHOLD),
        },
        single => single,
    }
}

fn parse_data_line(content: &str, line: usize, mode: EvaluationMode) -> Result<(&str, Outcome)> {
    // ids may contain '=', the outcome starts after the last one
    let (id, data) = content
        .rsplit_once('=')
        .ok_or_else(|| EvaluationError::malformed(line, "missing `=` after the instance id"))?;
    if id.is_empty() {
        return Err(EvaluationError::malformed(line, "empty instance id"));
    }
    let mut fields = data.split(FIELD_SEPARATOR);
    let prediction = fields.next().unwrap_or_default();
    let gold = fields
        .next()
        .ok_or_else(|| EvaluationError::malformed(line, "missing gold standard field"))?;
    let threshold = match fields.next() {
        Some(field) => parse_threshold(field, line)?,
        None => None,
    };
    if mode == EvaluationMode::SingleLabel && threshold.is_some() {
        return Err(EvaluationError::malformed(
            line,
            "single-label outcomes take no threshold, expected -1",
        ));
    }
    if fields.next().is_some() {
        return Err(EvaluationError::malformed(line, "too many `;` separated fields"));
    }
    let outcome = match mode {
        EvaluationMode::SingleLabel => Outcome::SingleLabel {
            predicted: parse_index(prediction, line)?,
            gold: parse_index(gold, line)?,
        },
        EvaluationMode::MultiLabel => Outcome::MultiLabel {
            predicted: parse_values(prediction, line)?,
            gold: parse_values(gold, line)?,
            threshold,
        },
    };
    Ok((id, outcome))
}

fn parse_index(field: &str, line: usize) -> Result<usize> {
    field.trim().parse().map_err(|_| {
        EvaluationError::malformed(line, format!("`{}` is not a label index", field))
    })
}

fn parse_value(field: &str, line: usize) -> Result<f64> {
    field
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| EvaluationError::malformed(line, format!("`{}` is not a number", field)))
}

fn parse_values(field: &str, line: usize) -> Result<Vec<f64>> {
    field
        .split(VALUE_SEPARATOR)
        .map(|value| parse_value(value, line))
        .collect()
}

fn parse_threshold(field: &str, line: usize) -> Result<Option<f64>> {
    let threshold = parse_value(field, line)?;
    Ok(Some(threshold).filter(|t| *t != NO_THRESHOLD))
}
