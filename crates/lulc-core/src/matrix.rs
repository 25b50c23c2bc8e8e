//! Transition counts.
//!
//! While streaming, counts live in [`CountMatrix`], keyed by vocabulary index
//! with rows that grow on demand; nothing has to be backfilled when a later
//! block discovers a new class. [`TransitionMatrix`] is the dense, sorted
//! table materialised once the vocabularies are final.

use serde::Serialize;

use crate::class_value::ClassValue;
use crate::vocabulary::Vocabulary;

/// Index-keyed counts. Cells never incremented read as zero.
#[derive(Debug, Clone, Default)]
pub struct CountMatrix {
    rows: Vec<Vec<u64>>,
}

impl CountMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment(&mut self, from_idx: u32, to_idx: u32) {
        let (fi, ti) = (from_idx as usize, to_idx as usize);
        if fi >= self.rows.len() {
            self.rows.resize_with(fi + 1, Vec::new);
        }
        let row = &mut self.rows[fi];
        if ti >= row.len() {
            row.resize(ti + 1, 0);
        }
        row[ti] += 1;
    }

    pub fn get(&self, from_idx: u32, to_idx: u32) -> u64 {
        self.rows
            .get(from_idx as usize)
            .and_then(|row| row.get(to_idx as usize))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.rows.iter().flatten().sum()
    }

    /// Dense table over the full cross-product of both vocabularies, rows and
    /// columns in ascending class order.
    pub fn materialize(&self, from_vocab: &Vocabulary, to_vocab: &Vocabulary) -> TransitionMatrix {
        let from_sorted = from_vocab.sorted();
        let to_sorted = to_vocab.sorted();
        let mut counts = Vec::with_capacity(from_sorted.len() * to_sorted.len());
        for &(_, fi) in &from_sorted {
            for &(_, ti) in &to_sorted {
                counts.push(self.get(fi, ti));
            }
        }
        TransitionMatrix {
            from_values: from_sorted.into_iter().map(|(v, _)| v).collect(),
            to_values: to_sorted.into_iter().map(|(v, _)| v).collect(),
            counts,
        }
    }
}

/// Final from-class × to-class count table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionMatrix {
    from_values: Vec<ClassValue>,
    to_values: Vec<ClassValue>,
    /// Row-major, `from_values.len()` × `to_values.len()`.
    counts: Vec<u64>,
}

impl TransitionMatrix {
    pub fn from_values(&self) -> &[ClassValue] {
        &self.from_values
    }

    pub fn to_values(&self) -> &[ClassValue] {
        &self.to_values
    }

    pub fn is_empty(&self) -> bool {
        self.from_values.is_empty() && self.to_values.is_empty()
    }

    /// Count for a (from, to) pair; zero when either class was never seen.
    pub fn count(&self, from: impl Into<ClassValue>, to: impl Into<ClassValue>) -> u64 {
        let (from, to) = (from.into(), to.into());
        let (Ok(r), Ok(c)) = (
            self.from_values.binary_search(&from),
            self.to_values.binary_search(&to),
        ) else {
            return 0;
        };
        self.counts[r * self.to_values.len() + c]
    }

    /// Rows in ascending from-class order, each with counts in `to_values` order.
    pub fn rows(&self) -> impl Iterator<Item = (ClassValue, &[u64])> + '_ {
        let width = self.to_values.len().max(1);
        self.from_values
            .iter()
            .copied()
            .zip(self.counts.chunks(width).chain(std::iter::repeat(&[][..])))
    }

    pub fn row_sum(&self, from: impl Into<ClassValue>) -> u64 {
        let from = from.into();
        self.rows()
            .find(|(v, _)| *v == from)
            .map_or(0, |(_, counts)| counts.iter().sum())
    }

    pub fn column_sum(&self, to: impl Into<ClassValue>) -> u64 {
        let Ok(c) = self.to_values.binary_search(&to.into()) else {
            return 0;
        };
        self.rows().map(|(_, counts)| counts[c]).sum()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}
