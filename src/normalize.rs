use ndarray::Array3;

/// Linearly rescale an array to [0, 1]: `(x - min) / (max - min)`.
///
/// A constant-valued input has zero range and the division produces
/// non-finite values; callers feeding potentially degenerate volumes must
/// check for that themselves.
pub fn normalize(mut array: Array3<f32>) -> Array3<f32> {
    let min = array.fold(f32::INFINITY, |acc, &value| acc.min(value));
    let max = array.fold(f32::NEG_INFINITY, |acc, &value| acc.max(value));
    let range = max - min;
    array.mapv_inplace(|value| (value - min) / range);
    array
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_range_is_zero_to_one() {
        let array = Array3::from_shape_fn((2, 3, 3), |(z, y, x)| (z * 9 + y * 3 + x) as f32 - 4.0);
        let normalized = normalize(array);
        let min = normalized.fold(f32::INFINITY, |acc, &v| acc.min(v));
        let max = normalized.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
        assert_eq!(min, 0.0);
        assert_eq!(max, 1.0);
    }

    #[test]
    fn normalization_is_idempotent() {
        let array = Array3::from_shape_fn((1, 2, 4), |(_, y, x)| (y * 4 + x) as f32 * 3.5);
        let once = normalize(array);
        let twice = normalize(once.clone());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn constant_input_yields_non_finite_values() {
        let normalized = normalize(Array3::from_elem((2, 2, 2), 3.0));
        assert!(normalized.iter().all(|v| !v.is_finite()));
    }
}
