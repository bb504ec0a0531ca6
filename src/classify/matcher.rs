//! Table-aware pattern matching over SQL text.
//!
//! Uses `regex` with the known table names escaped and joined into a single
//! alternation, in the order the caller supplied them.

use regex::Regex;
use std::ops::Range;

use crate::error::{RippleError, Result};

use super::{unique_in_order, Classification};

/// Keywords after which a read query names its tables.
const READ_KEYWORDS: &str = "FROM|JOIN|APPLY";

/// One table reference found in a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMatch {
    /// The keyword that introduced the table (`FROM`, `JOIN`, `APPLY` or `INSERT INTO`).
    pub keyword: String,
    /// The matched table name.
    pub table: String,
    /// Byte range of the table name inside the query.
    pub span: Range<usize>,
}

/// Classifier bound to a known table list.
///
/// The patterns are compiled once per table list; every call to a
/// `classify*` method runs the match afresh.
#[derive(Debug, Clone, Default)]
pub struct TableClassifier {
    tables: Vec<String>,
    patterns: Option<Patterns>,
}

#[derive(Debug, Clone)]
struct Patterns {
    read_start: Regex,
    read_ref: Regex,
    write: Regex,
}

impl TableClassifier {
    /// Builds a classifier for the given table names.
    ///
    /// An empty list yields a classifier that never matches. Empty names are
    /// rejected since they would match after every keyword.
    pub fn new<S: AsRef<str>>(tables: &[S]) -> Result<Self> {
        let tables: Vec<String> = tables.iter().map(|t| t.as_ref().to_string()).collect();

        if let Some(pos) = tables.iter().position(|t| t.is_empty()) {
            return Err(RippleError::classifier(format!(
                "table name at position {pos} is empty"
            )));
        }

        let patterns = if tables.is_empty() {
            None
        } else {
            Some(Patterns::compile(&tables)?)
        };

        Ok(Self { tables, patterns })
    }

    /// Returns the known tables in the order they were supplied.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    /// Classifies `query` as a read, a write, or neither.
    pub fn classify(&self, query: &str) -> Classification {
        if let Some(tables) = self.classify_read(query) {
            return Classification::Read { tables };
        }
        if let Some(table) = self.classify_write(query) {
            return Classification::Write { table };
        }
        Classification::Unclassified
    }

    /// Returns the tables a `SELECT` reads from, or `None` if it is not a
    /// read of any known table.
    pub fn classify_read(&self, query: &str) -> Option<Vec<String>> {
        let tables = unique_in_order(self.read_matches(query).into_iter().map(|m| m.table));
        if tables.is_empty() {
            None
        } else {
            Some(tables)
        }
    }

    /// Returns the table an `INSERT INTO` targets, or `None`.
    pub fn classify_write(&self, query: &str) -> Option<String> {
        self.write_match(query).map(|m| m.table)
    }

    /// Returns every `FROM`/`JOIN`/`APPLY` table reference, left to right,
    /// duplicates included. Empty unless the query starts with `SELECT`.
    pub fn read_matches(&self, query: &str) -> Vec<TableMatch> {
        let Some(patterns) = &self.patterns else {
            return Vec::new();
        };
        if !patterns.read_start.is_match(query) {
            return Vec::new();
        }

        patterns
            .read_ref
            .captures_iter(query)
            .filter_map(|caps| {
                let keyword = caps.name("keyword")?;
                let table = caps.name("table")?;
                Some(TableMatch {
                    keyword: keyword.as_str().to_string(),
                    table: table.as_str().to_string(),
                    span: table.range(),
                })
            })
            .collect()
    }

    /// Returns the target of an `INSERT INTO` statement, first match only.
    pub fn write_match(&self, query: &str) -> Option<TableMatch> {
        let patterns = self.patterns.as_ref()?;
        let caps = patterns.write.captures(query)?;
        let table = caps.name("table")?;
        Some(TableMatch {
            keyword: "INSERT INTO".to_string(),
            table: table.as_str().to_string(),
            span: table.range(),
        })
    }
}

impl Patterns {
    fn compile(tables: &[String]) -> Result<Self> {
        let alternation = tables
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");

        Ok(Self {
            read_start: build(r"^SELECT\b")?,
            read_ref: build(&format!(
                r"\b(?P<keyword>{READ_KEYWORDS})\s+(?P<table>{alternation})"
            ))?,
            write: build(&format!(r"^INSERT INTO\s+(?P<table>{alternation})"))?,
        })
    }
}

fn build(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| RippleError::classifier(format!("Invalid table pattern: {e}")))
}

/// Classifies a read without keeping a classifier around.
///
/// Returns `None` when the table list is invalid as well as on a miss.
pub fn classify_read<S: AsRef<str>>(query: &str, tables: &[S]) -> Option<Vec<String>> {
    TableClassifier::new(tables).ok()?.classify_read(query)
}

/// Classifies a write without keeping a classifier around.
pub fn classify_write<S: AsRef<str>>(query: &str, tables: &[S]) -> Option<String> {
    TableClassifier::new(tables).ok()?.classify_write(query)
}
