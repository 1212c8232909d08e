//! Ordered set of unique endpoint values.
//!
//! Binary search backs every insert, remove and boundary query, so the
//! endpoint index stays `O(log n)` per lookup no matter how many cues exist.

use std::cmp::Ordering;

use contracts::Interval;

/// Strictly ascending, duplicate-free sequence of `f64`.
///
/// NaN is never stored, and `-0.0` is folded into `0.0`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortedArrayBinary {
    array: Vec<f64>,
}

#[inline]
fn normalize(x: f64) -> f64 {
    // -0.0 + 0.0 == +0.0
    x + 0.0
}

impl SortedArrayBinary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from arbitrary values; duplicates and NaN are dropped.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut array: Vec<f64> = values
            .into_iter()
            .filter(|x| !x.is_nan())
            .map(normalize)
            .collect();
        array.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        array.dedup();
        Self { array }
    }

    fn search(&self, x: f64) -> Result<usize, usize> {
        self.array
            .binary_search_by(|probe| probe.partial_cmp(&x).unwrap_or(Ordering::Less))
    }

    /// Insert `x`; returns false if already present or NaN.
    pub fn insert(&mut self, x: f64) -> bool {
        if x.is_nan() {
            return false;
        }
        let x = normalize(x);
        match self.search(x) {
            Ok(_) => false,
            Err(pos) => {
                self.array.insert(pos, x);
                true
            }
        }
    }

    /// Remove `x`; returns false if it was not present.
    pub fn remove(&mut self, x: f64) -> bool {
        match self.search(x) {
            Ok(pos) => {
                self.array.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn has_element(&self, x: f64) -> bool {
        self.search(x).is_ok()
    }

    pub fn index_of(&self, x: f64) -> Option<usize> {
        self.search(x).ok()
    }

    /// Index of the largest element strictly less than `x`.
    pub fn lt_index_of(&self, x: f64) -> Option<usize> {
        self.array.partition_point(|e| *e < x).checked_sub(1)
    }

    /// Index of the largest element less than or equal to `x`.
    pub fn le_index_of(&self, x: f64) -> Option<usize> {
        self.array.partition_point(|e| *e <= x).checked_sub(1)
    }

    /// Index of the smallest element strictly greater than `x`.
    pub fn gt_index_of(&self, x: f64) -> Option<usize> {
        let i = self.array.partition_point(|e| *e <= x);
        (i < self.array.len()).then_some(i)
    }

    /// Index of the smallest element greater than or equal to `x`.
    pub fn ge_index_of(&self, x: f64) -> Option<usize> {
        let i = self.array.partition_point(|e| *e < x);
        (i < self.array.len()).then_some(i)
    }

    /// Elements covered by `interval`, honoring its inclusivity flags.
    ///
    /// `None` returns every element.
    pub fn lookup(&self, interval: Option<&Interval>) -> &[f64] {
        let Some(interval) = interval else {
            return &self.array;
        };
        let start = if interval.low_include() {
            self.ge_index_of(interval.low())
        } else {
            self.gt_index_of(interval.low())
        };
        let end = if interval.high_include() {
            self.le_index_of(interval.high())
        } else {
            self.lt_index_of(interval.high())
        };
        match (start, end) {
            (Some(start), Some(end)) if start <= end => &self.array[start..=end],
            _ => &[],
        }
    }

    pub fn minimum(&self) -> Option<f64> {
        self.array.first().copied()
    }

    pub fn maximum(&self) -> Option<f64> {
        self.array.last().copied()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.array.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.array
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.array.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn sample() -> SortedArrayBinary {
        SortedArrayBinary::from_values([1.0, 2.0, 3.0, 4.0, 7.0, 8.0])
    }

    #[test]
    fn test_boundary_queries() {
        let s = sample();
        // (x, le, lt, ge, gt)
        let cases = [
            (0.5, None, None, Some(0), Some(0)),
            (1.0, Some(0), None, Some(0), Some(1)),
            (3.5, Some(2), Some(2), Some(3), Some(3)),
            (4.0, Some(3), Some(2), Some(3), Some(4)),
            (8.0, Some(5), Some(4), Some(5), None),
            (8.5, Some(5), Some(5), None, None),
        ];
        for (x, le, lt, ge, gt) in cases {
            assert_eq!(s.le_index_of(x), le, "le {x}");
            assert_eq!(s.lt_index_of(x), lt, "lt {x}");
            assert_eq!(s.ge_index_of(x), ge, "ge {x}");
            assert_eq!(s.gt_index_of(x), gt, "gt {x}");
        }
    }

    #[test]
    fn test_empty_array_queries() {
        let s = SortedArrayBinary::new();
        assert_eq!(s.le_index_of(1.0), None);
        assert_eq!(s.ge_index_of(1.0), None);
        assert!(s.lookup(None).is_empty());
        assert_eq!(s.minimum(), None);
    }

    #[test]
    fn test_lookup_respects_inclusivity() {
        let s = sample();
        let lookup = |i: Interval| s.lookup(Some(&i)).to_vec();

        assert_eq!(lookup(Interval::from_bounds(3.0, 4.0).unwrap()), vec![3.0]);
        assert_eq!(lookup(Interval::closed(2.9, 4.1).unwrap()), vec![3.0, 4.0]);
        assert!(lookup(Interval::closed(3.1, 3.9).unwrap()).is_empty());
        assert!(lookup(Interval::open(1.0, 2.0).unwrap()).is_empty());
        assert_eq!(lookup(Interval::open(0.9, 2.1).unwrap()), vec![1.0, 2.0]);
        assert!(lookup(Interval::open(7.0, 8.0).unwrap()).is_empty());
        assert_eq!(lookup(Interval::open(6.9, 8.1).unwrap()), vec![7.0, 8.0]);
        assert_eq!(lookup(Interval::singular(7.0).unwrap()), vec![7.0]);
        assert_eq!(s.lookup(None).len(), 6);
    }

    #[test]
    fn test_insert_remove_duplicate_safe() {
        let mut s = SortedArrayBinary::new();
        assert!(s.insert(2.0));
        assert!(!s.insert(2.0));
        assert!(s.insert(-1.0));
        assert!(!s.insert(f64::NAN));
        assert_eq!(s.as_slice(), &[-1.0, 2.0]);
        assert!(s.remove(2.0));
        assert!(!s.remove(2.0));
        assert_eq!(s.index_of(-1.0), Some(0));
        assert!(!s.has_element(2.0));
    }

    #[test]
    fn test_negative_zero_folded() {
        let mut s = SortedArrayBinary::new();
        assert!(s.insert(-0.0));
        assert!(!s.insert(0.0));
        assert!(s.has_element(0.0));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_random_operations_keep_order() {
        let mut rng = rand::rng();
        let mut s = SortedArrayBinary::new();
        let mut model = std::collections::BTreeSet::new();

        for _ in 0..2000 {
            let x = rng.random_range(0..50) as f64 / 2.0;
            if rng.random_bool(0.6) {
                assert_eq!(s.insert(x), model.insert(x.to_bits()));
            } else {
                assert_eq!(s.remove(x), model.remove(&x.to_bits()));
            }
            assert!(s.as_slice().windows(2).all(|w| w[0] < w[1]));
        }
        assert_eq!(s.len(), model.len());

        for _ in 0..200 {
            let a = rng.random_range(-2.0..27.0);
            let b = rng.random_range(-2.0..27.0);
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let interval = Interval::new(low, high, rng.random_bool(0.5), rng.random_bool(0.5))
                .unwrap();
            let expected: Vec<f64> = s
                .iter()
                .filter(|x| interval.covers_point(*x))
                .collect();
            assert_eq!(s.lookup(Some(&interval)), expected.as_slice());
        }
    }
}
