use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Serialize, Serializer};

/// A raster cell value used as a land-cover class.
///
/// Equality is exact: `-0.0` equals `0.0` and every NaN equals every other
/// NaN, otherwise two values are the same class only if they are bitwise
/// identical. Ordering is total (NaN sorts after +inf).
#[derive(Debug, Clone, Copy)]
pub struct ClassValue(f64);

impl ClassValue {
    pub fn new(value: f64) -> Self {
        Self(canonical(value))
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

fn canonical(value: f64) -> f64 {
    if value.is_nan() {
        f64::NAN
    } else if value == 0.0 {
        0.0
    } else {
        value
    }
}

impl From<f64> for ClassValue {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl PartialEq for ClassValue {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for ClassValue {}

impl Hash for ClassValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for ClassValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClassValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for ClassValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ClassValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.is_finite() {
            serializer.serialize_f64(self.0)
        } else {
            serializer.collect_str(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn signed_zero_is_one_class() {
        assert_eq!(ClassValue::new(-0.0), ClassValue::new(0.0));
        let set: HashSet<ClassValue> = [ClassValue::new(-0.0), ClassValue::new(0.0)].into();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn nan_is_one_class() {
        let quiet = ClassValue::new(f64::NAN);
        let other = ClassValue::new(f64::from_bits(0x7ff8_0000_0000_0001));
        assert_eq!(quiet, other);
    }

    #[test]
    fn close_values_stay_distinct() {
        assert_ne!(ClassValue::new(1.0), ClassValue::new(1.0 + f64::EPSILON));
    }

    #[test]
    fn ordering_is_numeric_with_nan_last() {
        let mut values: Vec<ClassValue> = [10.0, f64::NAN, -3.0, 2.5, 0.0]
            .into_iter()
            .map(ClassValue::new)
            .collect();
        values.sort();
        let shown: Vec<String> = values.iter().map(ToString::to_string).collect();
        assert_eq!(shown, vec!["-3", "0", "2.5", "10", "NaN"]);
    }

    #[test]
    fn integral_values_print_without_fraction() {
        assert_eq!(ClassValue::new(12.0).to_string(), "12");
        assert_eq!(ClassValue::new(-9999.0).to_string(), "-9999");
    }

    #[test]
    fn serializes_as_number_or_string() {
        assert_eq!(serde_json::to_string(&ClassValue::new(3.0)).unwrap(), "3.0");
        assert_eq!(
            serde_json::to_string(&ClassValue::new(f64::NAN)).unwrap(),
            "\"NaN\""
        );
    }
}
