//! File based regression assertions for a rebuilt backbone
//!
//! Two plain text formats are read:
//!
//! - usage assertions, tab separated:
//!   `id name rank acceptedName kingdom phylum class order family genus species`
//! - homonym counts, semicolon separated: `rank;name;expectedCount`
//!
//! Lines starting with `#` are comments. The [`FixtureRunner`] checks them
//! against any [`GraphValidator`] backend and, for the homonym counts,
//! against the matching index.

use crate::index::MatchingIndex;
use backbone_core::{BackboneError, BackboneResult, Classification, NameParser, NodeId, Rank};
use backbone_graph::record::clean_value;
use backbone_graph::{GraphValidator, ValidationIssue, ValidationReport};
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Columns a usage assertion row needs
pub const USAGE_COLUMNS: usize = 11;

/// Expected state of one usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageAssertion {
    /// Identifier of the row in the fixture, only used for reporting
    pub id: Option<String>,
    pub name: String,
    pub rank: Option<Rank>,
    /// Accepted name when the usage must be a synonym
    pub accepted_name: Option<String>,
    pub classification: Classification,
    /// Species the usage must be placed in, for infraspecific names
    pub species: Option<String>,
    /// 1-based line in the fixture file
    pub line: usize,
}

/// Expected number of usages sharing a name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomonymAssertion {
    pub rank: Option<Rank>,
    pub name: String,
    pub expected: usize,
    pub line: usize,
}

fn reader<R: Read>(input: R, delimiter: u8) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(input)
}

fn parse_rank(value: Option<String>, line: usize) -> BackboneResult<Option<Rank>> {
    value
        .map(|r| Rank::from_str(&r).map_err(|e| BackboneError::Parse(format!("line {}: {}", line, e))))
        .transpose()
}

fn line_of(record: &csv::StringRecord, fallback: usize) -> usize {
    record
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or(fallback)
}

/// Read usage assertions. Rows with fewer than eleven columns are skipped.
pub fn read_usage_assertions<R: Read>(input: R) -> BackboneResult<Vec<UsageAssertion>> {
    let mut rows = Vec::new();
    for (idx, record) in reader(input, b'\t').records().enumerate() {
        let record = record.map_err(|e| BackboneError::Parse(format!("usage assertions: {}", e)))?;
        let line = line_of(&record, idx + 1);
        if record.len() < USAGE_COLUMNS {
            debug!("Skipping short assertion row at line {}", line);
            continue;
        }
        let cell = |i: usize| clean_value(record.get(i));

        let Some(name) = cell(1) else {
            return Err(BackboneError::Parse(format!("line {}: missing name", line)));
        };
        let mut classification = Classification::new();
        for (col, rank) in (4..).zip([
            Rank::Kingdom,
            Rank::Phylum,
            Rank::Class,
            Rank::Order,
            Rank::Family,
            Rank::Genus,
        ]) {
            classification.set(rank, cell(col));
        }

        rows.push(UsageAssertion {
            id: cell(0),
            name,
            rank: parse_rank(cell(2), line)?,
            accepted_name: cell(3),
            classification,
            species: cell(10),
            line,
        });
    }
    Ok(rows)
}

/// Read homonym count assertions. The rank may be left blank.
pub fn read_homonym_assertions<R: Read>(input: R) -> BackboneResult<Vec<HomonymAssertion>> {
    let mut rows = Vec::new();
    for (idx, record) in reader(input, b';').records().enumerate() {
        let record = record.map_err(|e| BackboneError::Parse(format!("homonym assertions: {}", e)))?;
        let line = line_of(&record, idx + 1);
        if record.len() < 3 {
            continue;
        }
        let Some(name) = clean_value(record.get(1)) else {
            return Err(BackboneError::Parse(format!("line {}: missing name", line)));
        };
        let expected = clean_value(record.get(2))
            .ok_or_else(|| BackboneError::Parse(format!("line {}: missing count", line)))?
            .parse::<usize>()
            .map_err(|e| BackboneError::Parse(format!("line {}: {}", line, e)))?;
        rows.push(HomonymAssertion {
            rank: parse_rank(clean_value(record.get(0)), line)?,
            name,
            expected,
            line,
        });
    }
    Ok(rows)
}

pub fn read_usage_assertions_file<P: AsRef<Path>>(path: P) -> BackboneResult<Vec<UsageAssertion>> {
    read_usage_assertions(std::fs::File::open(path.as_ref())?)
}

pub fn read_homonym_assertions_file<P: AsRef<Path>>(path: P) -> BackboneResult<Vec<HomonymAssertion>> {
    read_homonym_assertions(std::fs::File::open(path.as_ref())?)
}

/// Runs fixture assertions against a validator backend and an optional index
pub struct FixtureRunner<'a> {
    validator: &'a dyn GraphValidator,
    index: Option<&'a MatchingIndex>,
    parser: NameParser,
}

impl<'a> FixtureRunner<'a> {
    pub fn new(validator: &'a dyn GraphValidator) -> Self {
        Self {
            validator,
            index: None,
            parser: NameParser::new(),
        }
    }

    /// Count homonyms through the index instead of the validator
    pub fn with_index(mut self, index: &'a MatchingIndex) -> Self {
        self.index = Some(index);
        self
    }

    /// Fixture names may carry an authorship
    fn canonical(&self, name: &str, rank: Option<Rank>) -> String {
        self.parser
            .parse(name, rank)
            .ok()
            .filter(|pn| pn.name_type.is_parsable())
            .map(|pn| pn.canonical_name())
            .unwrap_or_else(|| name.trim().to_string())
    }

    pub fn run_usages(&self, assertions: &[UsageAssertion]) -> ValidationReport {
        info!(
            "Running {} usage assertions on the {} backend",
            assertions.len(),
            self.validator.backend_name()
        );
        let mut report = ValidationReport::new();
        for assertion in assertions {
            let name = self.canonical(&assertion.name, assertion.rank);
            let accepted = assertion
                .accepted_name
                .as_deref()
                .map(|a| self.canonical(a, None));
            let issues = self.validator.assert_usage(
                &name,
                assertion.rank,
                accepted.as_deref(),
                &assertion.classification,
            );
            if !issues.is_empty() {
                warn!("Usage assertion at line {} failed for {}", assertion.line, name);
            }
            report.extend(issues);

            if let Some(species) = assertion.species.as_deref() {
                let infraspecific = assertion.rank.is_some_and(|r| r.is_infraspecific());
                if infraspecific && assertion.accepted_name.is_none() {
                    let species = self.canonical(species, Some(Rank::Species));
                    if let Some(key) = self.validator.find_usages(&name, assertion.rank).first() {
                        report.extend(self.validator.assert_parents_contain(*key, &species));
                    }
                }
            }
        }
        report
    }

    pub fn run_homonyms(&self, assertions: &[HomonymAssertion]) -> ValidationReport {
        info!("Running {} homonym assertions", assertions.len());
        let mut report = ValidationReport::new();
        for assertion in assertions {
            report.extend(self.assert_search_match(assertion.expected, &assertion.name, assertion.rank));
        }
        report
    }

    /// Exactly `expected` usages must carry `name`, optionally of `rank`
    pub fn assert_search_match(&self, expected: usize, name: &str, rank: Option<Rank>) -> Vec<ValidationIssue> {
        let name = self.canonical(name, rank);
        let (found, first): (usize, Option<NodeId>) = match self.index {
            Some(index) => (index.count_exact(&name, rank), None),
            None => {
                let keys = self.validator.find_usages(&name, rank);
                (keys.len(), keys.first().copied())
            }
        };
        if found == expected {
            return Vec::new();
        }
        let rank_label = rank.map(|r| format!("{} ", r)).unwrap_or_default();
        let issue = ValidationIssue::error(
            "assert_search_match",
            format!("expected {} usages of {}{}, found {}", expected, rank_label, name, found),
        );
        vec![match first {
            Some(key) => issue.at(key),
            None => issue,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const USAGES: &str = "# id\tname\trank\taccepted\tkingdom\tphylum\tclass\torder\tfamily\tgenus\tspecies
1\tOenanthe Vieillot, 1816\tgenus\t\tAnimalia\tChordata\tAves\tPasseriformes\tMuscicapidae\t\t
2\tPhellandrium aquaticum L.\tspecies\tOenanthe aquatica\tPlantae\t\t\t\tApiaceae\tOenanthe\t
short\trow

3\tAbies alba var. alba\tvariety\t\tPlantae\t\t\t\tPinaceae\tAbies\tAbies alba
";

    #[test]
    fn test_read_usage_assertions() {
        let rows = read_usage_assertions(USAGES.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);

        let first = &rows[0];
        assert_eq!(first.id.as_deref(), Some("1"));
        assert_eq!(first.name, "Oenanthe Vieillot, 1816");
        assert_eq!(first.rank, Some(Rank::Genus));
        assert_eq!(first.accepted_name, None);
        assert_eq!(first.classification.family.as_deref(), Some("Muscicapidae"));
        assert_eq!(first.classification.genus, None);
        assert_eq!(first.species, None);
        assert_eq!(first.line, 2);

        assert_eq!(rows[1].accepted_name.as_deref(), Some("Oenanthe aquatica"));
        assert_eq!(rows[2].rank, Some(Rank::Variety));
        assert_eq!(rows[2].species.as_deref(), Some("Abies alba"));
    }

    #[test]
    fn test_bad_rank_is_a_parse_error() {
        let input = "1\tAbies\tnot-a-rank\t\tPlantae\t\t\t\t\t\t\n";
        let err = read_usage_assertions(input.as_bytes()).unwrap_err();
        assert!(matches!(err, BackboneError::Parse(_)));
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_read_homonym_assertions() {
        let input = "# rank;name;count\ngenus;Oenanthe;2\n;Turdus;1\nfamily;Apiaceae\n";
        let rows = read_homonym_assertions(input.as_bytes()).unwrap();
        assert_eq!(
            rows,
            vec![
                HomonymAssertion {
                    rank: Some(Rank::Genus),
                    name: "Oenanthe".to_string(),
                    expected: 2,
                    line: 2,
                },
                HomonymAssertion {
                    rank: None,
                    name: "Turdus".to_string(),
                    expected: 1,
                    line: 3,
                },
            ]
        );
    }

    #[test]
    fn test_bad_count() {
        let err = read_homonym_assertions("genus;Oenanthe;two\n".as_bytes()).unwrap_err();
        assert!(matches!(err, BackboneError::Parse(_)));
    }
}
