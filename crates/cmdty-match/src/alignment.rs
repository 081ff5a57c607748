use thiserror::Error;

use crate::series::{Period, ReturnSeries};

/// Paired observations over the months where both series are defined.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPair {
    pub periods: Vec<Period>,
    pub left: Vec<f64>,
    pub right: Vec<f64>,
}

impl AlignedPair {
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignmentError {
    #[error("common overlap of {overlap} months is shorter than the required {required}")]
    InsufficientOverlap { overlap: usize, required: usize },
}

pub type AlignmentResult<T> = Result<T, AlignmentError>;

/// Intersects the defined months of two series, preserving chronological
/// order. Fails when fewer than `min_overlap` months are shared.
pub fn align(
    left: &ReturnSeries,
    right: &ReturnSeries,
    min_overlap: usize,
) -> AlignmentResult<AlignedPair> {
    let pair = intersect(left, right);
    if pair.len() < min_overlap {
        return Err(AlignmentError::InsufficientOverlap { overlap: pair.len(), required: min_overlap });
    }
    Ok(pair)
}

/// Number of months where both series carry a defined return.
pub fn overlap_len(left: &ReturnSeries, right: &ReturnSeries) -> usize {
    intersect(left, right).len()
}

fn intersect(left: &ReturnSeries, right: &ReturnSeries) -> AlignedPair {
    let capacity = left.defined_count().min(right.defined_count());
    let mut pair = AlignedPair {
        periods: Vec::with_capacity(capacity),
        left: Vec::with_capacity(capacity),
        right: Vec::with_capacity(capacity),
    };

    let lhs: Vec<(Period, f64)> = left.defined().collect();
    let rhs: Vec<(Period, f64)> = right.defined().collect();
    let (mut i, mut j) = (0usize, 0usize);
    while i < lhs.len() && j < rhs.len() {
        let (lp, lv) = lhs[i];
        let (rp, rv) = rhs[j];
        if lp < rp {
            i += 1;
        } else if rp < lp {
            j += 1;
        } else {
            pair.periods.push(lp);
            pair.left.push(lv);
            pair.right.push(rv);
            i += 1;
            j += 1;
        }
    }
    pair
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::IndexSemantics;

    fn series(start: (i32, u32), values: Vec<Option<f64>>) -> ReturnSeries {
        let start = Period::new(start.0, start.1).expect("valid period");
        ReturnSeries::from_dense("s", IndexSemantics::Excess, start, values)
    }

    #[test]
    fn intersect_skips_months_missing_on_either_side() {
        let a = series((2020, 1), vec![Some(0.1), None, Some(0.3), Some(0.4)]);
        let b = series((2020, 2), vec![Some(0.2), Some(0.3), None, Some(0.5)]);
        let pair = intersect(&a, &b);
        assert_eq!(pair.periods, vec![Period::new(2020, 3).expect("valid period")]);
        assert_eq!(pair.left, vec![0.3]);
        assert_eq!(pair.right, vec![0.3]);
    }
}
