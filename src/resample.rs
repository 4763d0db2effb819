use nalgebra::Vector3;
use ndarray::{Array3, Axis};
use rayon::prelude::*;

use crate::interpolator::Interpolator;
use crate::volume::Volume;

/// Resample `input` onto the grid of `reference` with trilinear
/// interpolation.
///
/// Every output voxel is mapped through physical space into the input
/// volume. Voxels that land outside the input field of view become 0, so
/// the first and last slices of the output may be empty when the
/// reference grid extends beyond the input.
pub fn resample(input: &Volume, reference: &Volume) -> Volume {
    let (depth, height, width) = reference.dim();
    let mut data = Array3::<f32>::zeros((depth, height, width));

    data.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(z, mut slice)| {
            for y in 0..height {
                for x in 0..width {
                    let world =
                        reference.index_to_world(Vector3::new(x as f64, y as f64, z as f64));
                    let index = input.world_to_index(world);
                    slice[[y, x]] = Interpolator::trilinear_interpolate(&input.data, index);
                }
            }
        });

    Volume::new(data, reference.origin, reference.spacing, reference.direction)
}
