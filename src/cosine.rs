use crate::ratings::RatingRow;

/// Compute the magnitude (L2 norm) of a dense vector.
pub fn compute_magnitude(values: &[f64]) -> f64 {
	let mut sum: f64 = 0.0;
	for &v in values {
		sum += v * v;
	}
	sum.sqrt()
}

/// Compute the magnitude (L2 norm) of a sparse rating row.
pub fn row_magnitude(row: RatingRow<'_>) -> f64 {
	let mut sum: f64 = 0.0;
	for &v in row.values {
		let vf = v as f64;
		sum += vf * vf;
	}
	sum.sqrt()
}

/// Dot product of a dense vector with a sparse row. Columns past the end of
/// `dense` contribute nothing.
pub fn sparse_dot(dense: &[f64], row: RatingRow<'_>) -> f64 {
	let mut dot: f64 = 0.0;
	for (col, v) in row.iter() {
		if let Some(d) = dense.get(col) {
			dot += d * v as f64;
		}
	}
	dot
}

/// Cosine similarity using pre-computed magnitudes.
/// Returns 0.0 when either side has zero magnitude; otherwise clamped to
/// [-1.0, 1.0]. Non-finite inputs propagate so callers can reject them.
pub fn cosine_similarity_with_magnitude(
	dense: &[f64],
	row: RatingRow<'_>,
	mag_dense: f64,
	mag_row: f64,
) -> f64 {
	let denom = mag_dense * mag_row;
	if denom == 0.0 {
		return 0.0;
	}
	let result = sparse_dot(dense, row) / denom;
	if result.is_nan() {
		return result;
	}
	result.clamp(-1.0, 1.0)
}

/// Euclidean distance via `|a|^2 + |b|^2 - 2ab`, floored at zero. NaN
/// propagates like in the cosine case.
pub fn euclidean_distance_with_magnitude(
	dense: &[f64],
	row: RatingRow<'_>,
	mag_dense: f64,
	mag_row: f64,
) -> f64 {
	let squared = mag_dense * mag_dense + mag_row * mag_row - 2.0 * sparse_dot(dense, row);
	if squared < 0.0 {
		return 0.0;
	}
	squared.sqrt()
}
