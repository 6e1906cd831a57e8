//! Elementwise reductions over equal-length numeric sequences.
//!
//! These are the only reduction primitives of the pipeline. Group-by and
//! window collapse both partition records, project one attribute across the
//! partition as a set of sequences, and reduce with one of these.
//!
//! Missing entries (NaN) are skipped: they contribute nothing to a sum and
//! are left out of an average's denominator.

use crate::error::{TransformError, TransformResult};

fn check_shape<V: AsRef<[f64]>>(vectors: &[V]) -> TransformResult<usize> {
    let first = vectors.first().ok_or(TransformError::EmptyVectorSet)?;
    let len = first.as_ref().len();
    if let Some(bad) = vectors.iter().find(|v| v.as_ref().len() != len) {
        return Err(TransformError::LengthMismatch {
            expected: len,
            found: bad.as_ref().len(),
        });
    }
    Ok(len)
}

/// Elementwise sum.
pub fn vector_sum<V: AsRef<[f64]>>(vectors: &[V]) -> TransformResult<Vec<f64>> {
    let len = check_shape(vectors)?;
    let mut out = vec![0.0; len];
    for v in vectors {
        for (acc, x) in out.iter_mut().zip(v.as_ref()) {
            if !x.is_nan() {
                *acc += x;
            }
        }
    }
    Ok(out)
}

/// Elementwise arithmetic mean. A position missing from every input is NaN.
pub fn vector_avg<V: AsRef<[f64]>>(vectors: &[V]) -> TransformResult<Vec<f64>> {
    let len = check_shape(vectors)?;
    let mut sums = vec![0.0; len];
    let mut counts = vec![0usize; len];
    for v in vectors {
        for (i, x) in v.as_ref().iter().enumerate() {
            if !x.is_nan() {
                sums[i] += x;
                counts[i] += 1;
            }
        }
    }
    Ok(sums
        .into_iter()
        .zip(counts)
        .map(|(s, n)| if n == 0 { f64::NAN } else { s / n as f64 })
        .collect())
}

/// Elementwise minimum (NaN where every input is missing).
pub fn vector_min<V: AsRef<[f64]>>(vectors: &[V]) -> TransformResult<Vec<f64>> {
    fold_present(vectors, f64::min)
}

/// Elementwise maximum (NaN where every input is missing).
pub fn vector_max<V: AsRef<[f64]>>(vectors: &[V]) -> TransformResult<Vec<f64>> {
    fold_present(vectors, f64::max)
}

fn fold_present<V: AsRef<[f64]>>(vectors: &[V], pick: fn(f64, f64) -> f64) -> TransformResult<Vec<f64>> {
    let len = check_shape(vectors)?;
    let mut out = vec![f64::NAN; len];
    for v in vectors {
        for (acc, x) in out.iter_mut().zip(v.as_ref()) {
            if x.is_nan() {
                continue;
            }
            *acc = if acc.is_nan() { *x } else { pick(*acc, *x) };
        }
    }
    Ok(out)
}
