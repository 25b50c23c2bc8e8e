//! Transition codes written to the per-pixel raster.
//!
//! Code 0 means "unchanged" for every class. Each distinct changed pair gets
//! the next positive code the first time it is seen in pixel order; codes
//! are never reassigned. Cells that are nodata in both inputs get a reserved
//! negative code that is not part of the legend proper.

use std::collections::HashMap;

use serde::Serialize;

use crate::class_value::ClassValue;
use crate::error::{Result, TransitionError};

pub const UNCHANGED_CODE: i32 = 0;
pub const DEFAULT_NODATA_CODE: i32 = -1;

pub const UNCHANGED_LABEL: &str = "unchanged";
pub const NODATA_LABEL: &str = "nodata to nodata";

/// A changed (from, to) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Transition {
    pub from: ClassValue,
    pub to: ClassValue,
}

impl Transition {
    pub fn label(&self) -> String {
        format!("{} to {}", self.from, self.to)
    }
}

#[derive(Debug, Clone)]
pub struct Legend {
    /// Keyed by (from index, to index) into the engine's vocabularies.
    codes: HashMap<(u32, u32), i32>,
    /// `transitions[code - 1]`.
    transitions: Vec<Transition>,
    nodata_code: i32,
}

impl Legend {
    /// `nodata_code` must be negative so it can never collide with a minted code.
    pub fn new(nodata_code: i32) -> Result<Self> {
        if nodata_code >= 0 {
            return Err(TransitionError::InvalidArgument(format!(
                "nodata code must be negative, got {nodata_code}"
            )));
        }
        Ok(Self {
            codes: HashMap::new(),
            transitions: Vec::new(),
            nodata_code,
        })
    }

    pub fn nodata_code(&self) -> i32 {
        self.nodata_code
    }

    /// Code of a changed pair, minting the next one on first sight.
    pub fn code_for(&mut self, from_idx: u32, to_idx: u32, transition: Transition) -> Result<i32> {
        if let Some(&code) = self.codes.get(&(from_idx, to_idx)) {
            return Ok(code);
        }
        let code = i32::try_from(self.transitions.len() + 1)
            .map_err(|_| TransitionError::CodeSpaceExhausted)?;
        self.transitions.push(transition);
        self.codes.insert((from_idx, to_idx), code);
        Ok(code)
    }

    /// Number of real transition codes (excluding "unchanged").
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    pub fn transition(&self, code: i32) -> Option<Transition> {
        let idx = usize::try_from(code).ok()?.checked_sub(1)?;
        self.transitions.get(idx).copied()
    }

    /// Human-readable label of any code the raster can contain.
    pub fn label(&self, code: i32) -> Option<String> {
        match code {
            UNCHANGED_CODE => Some(UNCHANGED_LABEL.to_string()),
            c if c == self.nodata_code => Some(NODATA_LABEL.to_string()),
            c => self.transition(c).map(|t| t.label()),
        }
    }

    /// (code, label) rows in ascending code order, starting with "unchanged".
    pub fn entries(&self) -> impl Iterator<Item = (i32, String)> + '_ {
        std::iter::once((UNCHANGED_CODE, UNCHANGED_LABEL.to_string())).chain(
            self.transitions
                .iter()
                .enumerate()
                .map(|(i, t)| (i as i32 + 1, t.label())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(from: f64, to: f64) -> Transition {
        Transition {
            from: ClassValue::new(from),
            to: ClassValue::new(to),
        }
    }

    #[test]
    fn codes_follow_first_sight() {
        let mut legend = Legend::new(DEFAULT_NODATA_CODE).unwrap();
        assert_eq!(legend.code_for(0, 1, t(1.0, 2.0)).unwrap(), 1);
        assert_eq!(legend.code_for(1, 0, t(2.0, 1.0)).unwrap(), 2);
        assert_eq!(legend.code_for(0, 1, t(1.0, 2.0)).unwrap(), 1);
        assert_eq!(legend.transition_count(), 2);
    }

    #[test]
    fn labels() {
        let mut legend = Legend::new(-1).unwrap();
        legend.code_for(0, 1, t(1.0, 2.5)).unwrap();
        assert_eq!(legend.label(0).as_deref(), Some("unchanged"));
        assert_eq!(legend.label(1).as_deref(), Some("1 to 2.5"));
        assert_eq!(legend.label(-1).as_deref(), Some("nodata to nodata"));
        assert_eq!(legend.label(2), None);
        assert_eq!(legend.label(-7), None);
    }

    #[test]
    fn entries_start_with_unchanged() {
        let mut legend = Legend::new(-1).unwrap();
        legend.code_for(3, 4, t(-9999.0, 7.0)).unwrap();
        let entries: Vec<(i32, String)> = legend.entries().collect();
        assert_eq!(
            entries,
            vec![(0, "unchanged".to_string()), (1, "-9999 to 7".to_string())]
        );
    }

    #[test]
    fn non_negative_nodata_code_rejected() {
        assert!(matches!(
            Legend::new(0),
            Err(TransitionError::InvalidArgument(_))
        ));
        assert!(Legend::new(5).is_err());
    }
}
