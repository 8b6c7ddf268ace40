/*!
Bijection between label strings and dense indices in `[0, L)`. Every higher component refers
to labels through a `LabelIndex`.
*/
use crate::error::{EvaluationError, InvalidLabelSet, Result};
use ahash::AHashMap;
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

/// Prefix of the legend line of an outcome file.
pub(crate) const LEGEND_PREFIX: &str = "#labels";

#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    labels: Vec<String>,
    positions: AHashMap<String, usize>,
}

impl PartialEq for LabelIndex {
    fn eq(&self, other: &Self) -> bool {
        self.labels == other.labels
    }
}
impl Eq for LabelIndex {}

impl LabelIndex {
    /// Builds an index over `labels`, sorted lexicographically. Fails if the collection is
    /// empty or contains the same label twice.
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut sorted = BTreeSet::new();
        for label in labels {
            let label = label.into();
            if sorted.contains(&label) {
                return Err(InvalidLabelSet::DuplicateLabel(label).into());
            }
            sorted.insert(label);
        }
        Self::from_ordered(sorted.into_iter().collect())
    }

    /// Builds an index from every label observed, possibly many times. The result is the
    /// lexicographically sorted union.
    pub fn from_observed<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let union: BTreeSet<String> = labels.into_iter().map(Into::into).collect();
        Self::from_ordered(union.into_iter().collect())
    }

    /// Builds an index from explicit `(index, label)` pairs. The assignment is taken as is:
    /// indices must cover `0..L` exactly once and labels must be unique.
    pub fn from_legend<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, S)>,
        S: Into<String>,
    {
        let mut assigned = BTreeMap::new();
        for (idx, label) in entries {
            if assigned.insert(idx, label.into()).is_some() {
                return Err(InvalidLabelSet::DuplicateIndex(idx).into());
            }
        }
        let count = assigned.len();
        let mut labels = Vec::with_capacity(count);
        for expected in 0..count {
            labels.push(
                assigned
                    .remove(&expected)
                    .ok_or(InvalidLabelSet::MissingIndex(expected))?,
            );
        }
        Self::from_ordered(labels)
    }

    fn from_ordered(labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(InvalidLabelSet::Empty.into());
        }
        let mut positions = AHashMap::with_capacity(labels.len());
        for (idx, label) in labels.iter().enumerate() {
            if positions.insert(label.clone(), idx).is_some() {
                return Err(InvalidLabelSet::DuplicateLabel(label.clone()).into());
            }
        }
        Ok(Self { labels, positions })
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.positions.get(label).copied()
    }

    pub fn label_of(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Number of labels, `L`.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in index order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.labels.iter().map(String::as_str).enumerate()
    }

    /// Renders the legend line of an outcome file, e.g. `#labels 0=neg 1=pos`.
    pub fn to_legend(&self) -> String {
        let entries = self
            .iter()
            .map(|(idx, label)| format!("{}={}", idx, encode_label(label)))
            .join(" ");
        format!("{} {}", LEGEND_PREFIX, entries)
    }

    /// Parses a legend line. `line` is the 1-based position in the source, used for errors.
    pub(crate) fn parse_legend(content: &str, line: usize) -> Result<Self> {
        let body = content
            .strip_prefix(LEGEND_PREFIX)
            .ok_or_else(|| EvaluationError::malformed(line, "expected a `#labels` legend"))?;
        let mut entries = Vec::new();
        for token in body.split_whitespace() {
            let (idx, encoded) = token.split_once('=').ok_or_else(|| {
                EvaluationError::malformed(line, format!("legend entry `{}` has no `=`", token))
            })?;
            let idx: usize = idx.parse().map_err(|_| {
                EvaluationError::malformed(line, format!("legend index `{}` is not a number", idx))
            })?;
            let label = decode_label(encoded).ok_or_else(|| {
                EvaluationError::malformed(line, format!("legend label `{}` is not decodable", encoded))
            })?;
            entries.push((idx, label));
        }
        Self::from_legend(entries)
    }
}

impl Display for LabelIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_legend())
    }
}

/// Form-encodes a label: unreserved bytes are kept, a space becomes `+`, every other byte
/// becomes `%XX`.
pub(crate) fn encode_label(label: &str) -> String {
    let mut encoded = String::with_capacity(label.len());
    for byte in label.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'-' | b'*' | b'_' => {
                encoded.push(byte as char)
            }
            b' ' => encoded.push('+'),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

/// Inverse of `encode_label`. Returns `None` on a truncated escape or invalid UTF-8.
pub(crate) fn decode_label(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => decoded.push(b' '),
            b'%' => {
                let hex = encoded.get(i + 1..i + 3)?;
                if !hex.bytes().all(|h| h.is_ascii_hexdigit()) {
                    return None;
                }
                decoded.push(u8::from_str_radix(hex, 16).ok()?);
                i += 2;
            }
            b => decoded.push(b),
        }
        i += 1;
    }
    String::from_utf8(decoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{QuickCheck, TestResult};
    use rstest::rstest;

    #[test]
    fn test_lexicographic_order() {
        let index = LabelIndex::new(["spam", "ham", "eggs"]).unwrap();
        assert_eq!(index.labels(), &["eggs", "ham", "spam"]);
        assert_eq!(index.index_of("ham"), Some(1));
        assert_eq!(index.label_of(2), Some("spam"));
        assert_eq!(index.index_of("bacon"), None);
        assert_eq!(index.label_of(3), None);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_duplicates_are_rejected() {
        let res = LabelIndex::new(["a", "b", "a"]);
        assert!(matches!(
            res,
            Err(EvaluationError::InvalidLabelSet(InvalidLabelSet::DuplicateLabel(l))) if l == "a"
        ));
    }

    #[test]
    fn test_empty_is_rejected() {
        let res = LabelIndex::new(Vec::<String>::new());
        assert!(matches!(
            res,
            Err(EvaluationError::InvalidLabelSet(InvalidLabelSet::Empty))
        ));
        assert!(LabelIndex::from_observed(Vec::<&str>::new()).is_err());
    }

    #[test]
    fn test_from_observed_deduplicates() {
        let index = LabelIndex::from_observed(["b", "a", "b", "c", "a"]).unwrap();
        assert_eq!(index.labels(), &["a", "b", "c"]);
    }

    #[test]
    fn test_legend_overrides_lexicographic_order() {
        let index = LabelIndex::from_legend([(1, "alpha"), (0, "zulu")]).unwrap();
        assert_eq!(index.index_of("zulu"), Some(0));
        assert_eq!(index.index_of("alpha"), Some(1));
    }

    #[rstest]
    #[case(vec![(0, "a"), (0, "b")], InvalidLabelSet::DuplicateIndex(0))]
    #[case(vec![(0, "a"), (2, "b")], InvalidLabelSet::MissingIndex(1))]
    #[case(vec![(0, "a"), (1, "a")], InvalidLabelSet::DuplicateLabel(String::from("a")))]
    fn test_invalid_legends(#[case] entries: Vec<(usize, &str)>, #[case] expected: InvalidLabelSet) {
        match LabelIndex::from_legend(entries) {
            Err(EvaluationError::InvalidLabelSet(actual)) => assert_eq!(actual, expected),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[rstest]
    #[case("#labels 0=neg 1=pos", vec!["neg", "pos"])]
    #[case("#labels 1=pos 0=neg", vec!["neg", "pos"])]
    #[case("#labels 0=New+York 1=a%3Db", vec!["New York", "a=b"])]
    #[case("#labels 0=caf%C3%A9", vec!["café"])]
    fn test_parse_legend(#[case] line: &str, #[case] expected: Vec<&str>) {
        let index = LabelIndex::parse_legend(line, 2).unwrap();
        assert_eq!(index.labels(), expected.as_slice());
    }

    #[rstest]
    #[case("#labels 0neg")]
    #[case("#labels x=neg")]
    #[case("#labels 0=%4")]
    #[case("#labels 0=%+1")]
    #[case("#nolegend 0=a")]
    fn test_parse_malformed_legend(#[case] line: &str) {
        let res = LabelIndex::parse_legend(line, 7);
        assert!(matches!(
            res,
            Err(EvaluationError::MalformedOutcomeLine { line: 7, .. })
        ));
    }

    #[test]
    fn test_legend_round_trip() {
        let line = "#labels 0=zulu 1=New+York 2=a%3Db 3=x%2Fy";
        let index = LabelIndex::parse_legend(line, 1).unwrap();
        assert_eq!(index.to_legend(), line);
        assert_eq!(LabelIndex::parse_legend(&index.to_legend(), 1).unwrap(), index);
    }

    #[test]
    fn test_property_encoding_round_trip() {
        fn round_trip(label: String) -> TestResult {
            let encoded = encode_label(&label);
            if encoded.contains(char::is_whitespace) || encoded.contains('=') {
                return TestResult::failed();
            }
            TestResult::from_bool(decode_label(&encoded) == Some(label))
        }
        QuickCheck::new()
            .tests(2000)
            .quickcheck(round_trip as fn(String) -> TestResult)
    }
}
