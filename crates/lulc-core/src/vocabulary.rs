//! Growing set of observed class values, each mapped to a dense index.
//!
//! Indices are handed out in registration order and never change, so counts
//! stored by index stay valid as later blocks introduce new classes.

use std::collections::HashMap;

use crate::class_value::ClassValue;

#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    index: HashMap<ClassValue, u32>,
    values: Vec<ClassValue>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` if unseen; returns its index.
    pub fn insert(&mut self, value: ClassValue) -> u32 {
        if let Some(&idx) = self.index.get(&value) {
            return idx;
        }
        let idx = self.values.len() as u32;
        self.values.push(value);
        self.index.insert(value, idx);
        idx
    }

    /// Register every value of a block's distinct set; returns how many were new.
    pub fn extend_distinct(&mut self, distinct: &[ClassValue]) -> usize {
        let before = self.values.len();
        for &value in distinct {
            self.insert(value);
        }
        self.values.len() - before
    }

    #[inline]
    pub fn index_of(&self, value: ClassValue) -> Option<u32> {
        self.index.get(&value).copied()
    }

    pub fn value(&self, idx: u32) -> ClassValue {
        self.values[idx as usize]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// (value, index) pairs in ascending value order.
    pub fn sorted(&self) -> Vec<(ClassValue, u32)> {
        let mut pairs: Vec<(ClassValue, u32)> = self
            .values
            .iter()
            .enumerate()
            .map(|(i, &v)| (v, i as u32))
            .collect();
        pairs.sort_unstable_by_key(|&(v, _)| v);
        pairs
    }
}

/// Sorted distinct values of the unmasked cells of a block.
///
/// Sort-and-dedup over the block, the slice equivalent of an array "unique"
/// primitive; cells with `mask[i] == true` are skipped.
pub fn distinct_values(values: &[f64], mask: &[bool]) -> Vec<ClassValue> {
    let mut distinct: Vec<ClassValue> = values
        .iter()
        .zip(mask)
        .filter(|&(_, &masked)| !masked)
        .map(|(&v, _)| ClassValue::new(v))
        .collect();
    distinct.sort_unstable();
    distinct.dedup();
    distinct
}
