use nalgebra::Vector3;
use ndarray::Array3;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Trilinear interpolation at a continuous `(x, y, z)` index.
    ///
    /// Indices outside the volume extent return 0.0, the default value
    /// for voxels beyond the source field of view.
    #[inline]
    pub(crate) fn trilinear_interpolate(data: &Array3<f32>, index: Vector3<f64>) -> f32 {
        let (depth, height, width) = data.dim();
        let (x, y, z) = (index.x, index.y, index.z);

        if x < 0.0
            || y < 0.0
            || z < 0.0
            || x > (width - 1) as f64
            || y > (height - 1) as f64
            || z > (depth - 1) as f64
        {
            return 0.0;
        }

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let z0 = z.floor() as usize;
        let x1 = (x0 + 1).min(width - 1);
        let y1 = (y0 + 1).min(height - 1);
        let z1 = (z0 + 1).min(depth - 1);

        let dx = (x - x0 as f64) as f32;
        let dy = (y - y0 as f64) as f32;
        let dz = (z - z0 as f64) as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;
        let one_minus_dz = 1.0 - dz;

        let a00 = data[[z0, y0, x0]].mul_add(one_minus_dx, data[[z0, y0, x1]] * dx);
        let a01 = data[[z0, y1, x0]].mul_add(one_minus_dx, data[[z0, y1, x1]] * dx);
        let a10 = data[[z1, y0, x0]].mul_add(one_minus_dx, data[[z1, y0, x1]] * dx);
        let a11 = data[[z1, y1, x0]].mul_add(one_minus_dx, data[[z1, y1, x1]] * dx);

        let b0 = a00.mul_add(one_minus_dy, a01 * dy);
        let b1 = a10.mul_add(one_minus_dy, a11 * dy);

        b0.mul_add(one_minus_dz, b1 * dz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_indices_return_stored_values() {
        let mut data = Array3::<f32>::zeros((2, 2, 2));
        data[[1, 0, 1]] = 5.0;
        let value = Interpolator::trilinear_interpolate(&data, Vector3::new(1.0, 0.0, 1.0));
        assert_eq!(value, 5.0);
    }

    #[test]
    fn midpoint_blends_corner_values() {
        let mut data = Array3::<f32>::zeros((1, 1, 2));
        data[[0, 0, 1]] = 4.0;
        let value = Interpolator::trilinear_interpolate(&data, Vector3::new(0.5, 0.0, 0.0));
        assert!((value - 2.0).abs() < 1e-6);
    }

    #[test]
    fn outside_extent_is_zero() {
        let data = Array3::<f32>::from_elem((2, 2, 2), 7.0);
        assert_eq!(
            Interpolator::trilinear_interpolate(&data, Vector3::new(-0.1, 0.0, 0.0)),
            0.0
        );
        assert_eq!(
            Interpolator::trilinear_interpolate(&data, Vector3::new(0.0, 0.0, 1.5)),
            0.0
        );
    }
}
