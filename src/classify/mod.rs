//! Query classification module.
//!
//! Decides whether a SQL statement reads or writes, and which of the known
//! tables it touches. This is a lexical heuristic over the literal text, not
//! a SQL parser: names that are substrings of one another can match
//! ambiguously, and unusual keyword placement is not understood.

mod matcher;

pub use matcher::{classify_read, classify_write, TableClassifier, TableMatch};

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

/// The outcome of classifying one query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A `SELECT` touching these tables, unique, in order of first appearance.
    Read { tables: Vec<String> },
    /// An `INSERT INTO` targeting a single table.
    Write { table: String },
    /// Neither shape matched.
    Unclassified,
}

impl Classification {
    /// Returns true for a read classification.
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Read { .. })
    }

    /// Returns true for a write classification.
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write { .. })
    }

    /// Returns the tables involved, in classification order.
    pub fn tables(&self) -> Vec<&str> {
        match self {
            Self::Read { tables } => tables.iter().map(String::as_str).collect(),
            Self::Write { table } => vec![table.as_str()],
            Self::Unclassified => Vec::new(),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { tables } => write!(f, "READ [{}]", tables.join(", ")),
            Self::Write { table } => write!(f, "WRITE [{}]", table),
            Self::Unclassified => write!(f, "UNCLASSIFIED"),
        }
    }
}

/// Removes duplicates while keeping the first occurrence of each item.
pub fn unique_in_order<T, I>(items: I) -> Vec<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
