use nalgebra::{Matrix3, Point3, Vector3};
use ndarray::Array3;

/// 3-D floating-point image with physical space metadata.
///
/// Voxel data is indexed `(z, y, x)`, slice-major, as produced by the
/// DICOM loader. `origin` is the physical position of voxel `(0, 0, 0)`,
/// `spacing` the voxel extent in mm along `(x, y, z)`, and `direction` the
/// orthonormal matrix whose columns are the x/y/z axis direction cosines.
///
/// Volumes are never mutated in place: every transform (resample, scale,
/// cast) produces a new `Volume`.
#[derive(Clone, Debug)]
pub struct Volume {
    pub data: Array3<f32>,
    pub origin: Point3<f64>,
    pub spacing: Vector3<f64>,
    pub direction: Matrix3<f64>,
}

impl Volume {
    pub fn new(
        data: Array3<f32>,
        origin: Point3<f64>,
        spacing: Vector3<f64>,
        direction: Matrix3<f64>,
    ) -> Self {
        Self {
            data,
            origin,
            spacing,
            direction,
        }
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Consume the volume, yielding the raw voxel array
    pub fn into_data(self) -> Array3<f32> {
        self.data
    }

    /// Map a continuous `(x, y, z)` voxel index to a physical point.
    pub fn index_to_world(&self, index: Vector3<f64>) -> Point3<f64> {
        self.origin + self.direction * index.component_mul(&self.spacing)
    }

    /// Map a physical point to a continuous `(x, y, z)` voxel index.
    ///
    /// Direction cosines are orthonormal, so the inverse of the direction
    /// matrix is its transpose.
    pub fn world_to_index(&self, point: Point3<f64>) -> Vector3<f64> {
        (self.direction.transpose() * (point - self.origin)).component_div(&self.spacing)
    }

    /// Apply an elementwise transform, producing a new volume on the same
    /// grid.
    pub fn map(&self, f: impl FnMut(f32) -> f32) -> Self {
        Self {
            data: self.data.mapv(f),
            origin: self.origin,
            spacing: self.spacing,
            direction: self.direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_volume() -> Volume {
        // 90 degree rotation about z, anisotropic spacing, offset origin.
        let direction = Matrix3::new(
            0.0, -1.0, 0.0, //
            1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0,
        );
        Volume::new(
            Array3::zeros((4, 8, 8)),
            Point3::new(10.0, -5.0, 2.5),
            Vector3::new(0.5, 0.5, 2.0),
            direction,
        )
    }

    #[test]
    fn world_index_round_trip() {
        let volume = toy_volume();
        let index = Vector3::new(3.0, 1.5, 2.0);
        let round_tripped = volume.world_to_index(volume.index_to_world(index));
        assert!((round_tripped - index).norm() < 1e-12);
    }

    #[test]
    fn index_to_world_matches_identity_grid() {
        let volume = Volume::new(
            Array3::zeros((2, 2, 2)),
            Point3::new(1.0, 2.0, 3.0),
            Vector3::new(1.0, 1.0, 1.0),
            Matrix3::identity(),
        );
        let point = volume.index_to_world(Vector3::new(1.0, 0.0, 1.0));
        assert_eq!(point, Point3::new(2.0, 2.0, 4.0));
    }

    #[test]
    fn map_produces_new_volume_on_same_grid() {
        let mut volume = toy_volume();
        volume.data.fill(2.0);
        let doubled = volume.map(|v| v * 2.0);
        assert_eq!(doubled.data[[0, 0, 0]], 4.0);
        assert_eq!(volume.data[[0, 0, 0]], 2.0);
        assert_eq!(doubled.origin, volume.origin);
        assert_eq!(doubled.spacing, volume.spacing);
    }
}
