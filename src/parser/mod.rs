//! LIBSVM-style data set parsing.
//!
//! Every non-blank line is one record: a label token followed by
//! whitespace-separated `index:value` pairs with strictly increasing
//! indices. Labels are arbitrary strings; the mapping to class ids happens
//! in [`crate::dataset`].

use pest::Parser;
use pest_derive::Parser;

use crate::errors::SvmError;

#[derive(Parser)]
#[grammar = "parser/libsvm.pest"]
struct LibsvmParser;

/// One parsed data set line.
#[derive(Clone, Debug, PartialEq)]
pub struct DataRecord {
    pub label: String,
    pub features: Vec<(u32, f64)>,
}

/// Parses a whole data set. Blank lines are skipped; line numbers in
/// errors are 1-based.
pub fn parse_records(input: &str) -> Result<Vec<DataRecord>, SvmError> {
    let mut records = Vec::new();
    for (number, raw) in input.lines().enumerate() {
        let line = number + 1;
        if raw.trim().is_empty() {
            continue;
        }
        records.push(parse_record(raw, line)?);
    }
    Ok(records)
}

fn parse_record(raw: &str, line: usize) -> Result<DataRecord, SvmError> {
    let mut parsed = LibsvmParser::parse(Rule::record, raw)
        .map_err(|_| SvmError::MalformedRecord { line })?;
    let record = parsed.next().ok_or(SvmError::MalformedRecord { line })?;

    let mut label = String::new();
    let mut features = Vec::new();
    let mut last_index: Option<u32> = None;

    for pair in record.into_inner() {
        match pair.as_rule() {
            Rule::label => label = pair.as_str().to_owned(),
            Rule::feature => {
                let mut parts = pair.into_inner();
                let index: u32 = parts
                    .next()
                    .and_then(|p| p.as_str().parse().ok())
                    .ok_or(SvmError::MalformedRecord { line })?;
                let value: f64 = parts
                    .next()
                    .and_then(|p| p.as_str().parse().ok())
                    .ok_or(SvmError::MalformedRecord { line })?;

                if let Some(last) = last_index {
                    if index <= last {
                        return Err(SvmError::UnorderedFeature { line, index });
                    }
                }
                last_index = Some(index);
                features.push((index, value));
            }
            Rule::EOI => {}
            _ => unreachable!("no other rules appear inside a record"),
        }
    }

    Ok(DataRecord { label, features })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_and_features() {
        let records = parse_records("setosa 1:0.5 3:-1.25 7:2e-3\n\nvirginica 2:.5\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].label, "setosa");
        assert_eq!(records[0].features, vec![(1, 0.5), (3, -1.25), (7, 0.002)]);
        assert_eq!(records[1].features, vec![(2, 0.5)]);
    }

    #[test]
    fn accepts_numeric_and_signed_labels() {
        let records = parse_records("+1 1:1\n-1 1:2\n3 2:0.5\n").unwrap();
        let labels: Vec<&str> = records.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["+1", "-1", "3"]);
    }

    #[test]
    fn rejects_garbage_with_the_line_number() {
        let err = parse_records("ok 1:1\nbad 2:x\n").unwrap_err();
        assert!(matches!(err, SvmError::MalformedRecord { line: 2 }));
    }

    #[test]
    fn rejects_unordered_feature_indices() {
        let err = parse_records("a 5:1 3:2\n").unwrap_err();
        assert!(matches!(err, SvmError::UnorderedFeature { line: 1, index: 3 }));
    }

    #[test]
    fn label_only_records_are_valid() {
        let records = parse_records("lonely\n").unwrap();
        assert_eq!(records[0].label, "lonely");
        assert!(records[0].features.is_empty());
    }
}
