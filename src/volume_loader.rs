use crate::{enums::SortBy, volume::Volume};

use dicom::{
    core::Tag,
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::PixelDecoder,
};
use dicom_dictionary_std::tags;
use nalgebra::{Matrix3, Point3, Vector3};
use ndarray::{Array2, Array3, s};
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("No slices match series {0}")]
    NoMatchingSeries(String),

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Missing spacing information")]
    MissingSpacing,

    #[error("Missing image orientation")]
    MissingOrientation,

    #[error("Missing image position")]
    MissingPosition,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from DICOM objects
    ///
    /// Slices are sorted, decoded to 32-bit float with the modality
    /// rescale applied, and stacked into a geometry-aware [`Volume`].
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - Slice of DICOM file objects
    /// * `sort_by` - Method to sort the slices
    ///
    /// # Errors
    ///
    /// Returns error if no valid images are found, dimensions are
    /// inconsistent, or the spatial metadata is incomplete
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let mut slices: Vec<_> = dicom_objects
            .par_iter()
            .filter_map(|dicom_object| Self::extract_slice_with_order(dicom_object, &sort_by))
            .collect();

        if slices.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        Self::sort_slices(&mut slices, sort_by);

        let objects: Vec<_> = slices.iter().map(|(_, _, object)| *object).collect();
        let images: Vec<_> = slices.into_iter().map(|(_, image, _)| image).collect();

        Self::validate_dimensions(&images)?;

        let volume_array = Self::build_volume_array(&images);
        let (origin, spacing, direction) = Self::get_geometry(&objects)?;

        Ok(Volume::new(volume_array, origin, spacing, direction))
    }

    /// Load a volume from file paths, optionally keeping only slices of
    /// one series
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path>],
        series_id: Option<&str>,
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let objects: Result<Vec<_>, _> =
            paths.iter().map(|path| open_file(path.as_ref())).collect();
        let mut objects = objects?;

        if let Some(id) = series_id {
            objects.retain(|object| {
                Self::get_str(object, tags::SERIES_INSTANCE_UID)
                    .is_some_and(|uid| uid.trim_end() == id)
            });
            if objects.is_empty() {
                return Err(VolumeLoaderError::NoMatchingSeries(id.to_string()));
            }
        }

        Self::load_from_dicom_objects(&objects, sort_by)
    }

    /// Load a volume from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        series_id: Option<&str>,
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let paths = Self::dicom_file_paths(path)?;

        if paths.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        Self::load_from_file_paths(&paths, series_id, sort_by)
    }

    /// The `.dcm` files in `path`, lexicographically sorted.
    ///
    /// Directory listing order is platform dependent; sorting keeps slice
    /// selection deterministic, in particular for callers that read
    /// series-level metadata from the first file.
    pub fn dicom_file_paths(path: impl AsRef<Path>) -> Result<Vec<PathBuf>, VolumeLoaderError> {
        let mut paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();
        paths.sort();

        Ok(paths)
    }

    #[allow(clippy::type_complexity)]
    fn extract_slice_with_order<'a>(
        dicom_object: &'a FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<(
        Option<f32>,
        Array2<f32>,
        &'a FileDicomObject<InMemDicomObject>,
    )> {
        let order = Self::get_sort_order(dicom_object, sort_by)?;
        let image_2d = Self::decode_image(dicom_object)?;
        Some((order, image_2d, dicom_object))
    }

    fn get_sort_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<Option<f32>> {
        match sort_by {
            SortBy::ImagePositionPatient => {
                let pos = Self::get_f64_multi(dicom_object, tags::IMAGE_POSITION_PATIENT)?;
                Some(pos.get(2).map(|z| *z as f32))
            }
            SortBy::TablePosition => {
                let pos = dicom_object
                    .element(tags::TABLE_POSITION)
                    .ok()?
                    .to_float32()
                    .ok();
                Some(pos)
            }
            SortBy::InstanceNumber => {
                let num = dicom_object
                    .element(tags::INSTANCE_NUMBER)
                    .ok()?
                    .to_int::<i32>()
                    .ok()
                    .map(|n| n as f32);
                Some(num)
            }
            SortBy::None => Some(Some(0.0)),
        }
    }

    fn decode_image(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<f32>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        pixel_data
            .to_ndarray::<f32>()
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    fn sort_slices(
        slices: &mut [(
            Option<f32>,
            Array2<f32>,
            &FileDicomObject<InMemDicomObject>,
        )],
        sort_by: SortBy,
    ) {
        if !matches!(sort_by, SortBy::None) {
            slices.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        }
    }

    fn validate_dimensions(images: &[Array2<f32>]) -> Result<(), VolumeLoaderError> {
        let first_dim = images[0].dim();
        if images.iter().any(|img| img.dim() != first_dim) {
            return Err(VolumeLoaderError::InconsistentDimensions);
        }
        Ok(())
    }

    fn build_volume_array(images: &[Array2<f32>]) -> Array3<f32> {
        let (height, width) = images[0].dim();
        let depth = images.len();
        let mut volume = Array3::<f32>::zeros((depth, height, width));

        for (i, image) in images.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(image);
        }

        volume
    }

    /// Physical geometry of the sorted slice stack.
    ///
    /// Orientation and in-plane spacing come from the first slice; the
    /// slice axis direction is the cross product of the row/column
    /// cosines. Slice spacing is the projected distance between the first
    /// and last slice positions, falling back to `SliceThickness` for
    /// single-slice (or stationary) stacks.
    fn get_geometry(
        objects: &[&FileDicomObject<InMemDicomObject>],
    ) -> Result<(Point3<f64>, Vector3<f64>, Matrix3<f64>), VolumeLoaderError> {
        let first = objects[0];

        let orientation = Self::get_f64_multi(first, tags::IMAGE_ORIENTATION_PATIENT)
            .ok_or(VolumeLoaderError::MissingOrientation)?;
        if orientation.len() != 6 {
            return Err(VolumeLoaderError::MissingOrientation);
        }
        let dir_x = Vector3::new(orientation[0], orientation[1], orientation[2]).normalize();
        let dir_y = Vector3::new(orientation[3], orientation[4], orientation[5]).normalize();
        let dir_z = dir_x.cross(&dir_y).normalize();
        let direction = Matrix3::from_columns(&[dir_x, dir_y, dir_z]);

        let position = Self::get_position(first).ok_or(VolumeLoaderError::MissingPosition)?;
        let origin = Point3::from(position);

        let pixel_spacing = Self::get_f64_multi(first, tags::PIXEL_SPACING)
            .ok_or(VolumeLoaderError::MissingSpacing)?;
        if pixel_spacing.len() != 2 {
            return Err(VolumeLoaderError::MissingSpacing);
        }
        // PixelSpacing is (row spacing, column spacing), i.e. (y, x).
        let dy = pixel_spacing[0];
        let dx = pixel_spacing[1];

        let dz = Self::get_slice_spacing(objects, &position, &dir_z)
            .or_else(|| Self::get_f64(first, tags::SLICE_THICKNESS))
            .unwrap_or(1.0);

        Ok((origin, Vector3::new(dx, dy, dz), direction))
    }

    fn get_slice_spacing(
        objects: &[&FileDicomObject<InMemDicomObject>],
        first_position: &Vector3<f64>,
        dir_z: &Vector3<f64>,
    ) -> Option<f64> {
        if objects.len() < 2 {
            return None;
        }
        let last_position = Self::get_position(objects[objects.len() - 1])?;
        let span = (last_position - first_position).dot(dir_z).abs();
        let spacing = span / (objects.len() - 1) as f64;
        (spacing > 0.0).then_some(spacing)
    }

    fn get_str(object: &FileDicomObject<InMemDicomObject>, tag: Tag) -> Option<String> {
        object.element(tag).ok()?.to_str().ok().map(|s| s.to_string())
    }

    fn get_f64(object: &FileDicomObject<InMemDicomObject>, tag: Tag) -> Option<f64> {
        object.element(tag).ok()?.to_float64().ok()
    }

    fn get_f64_multi(object: &FileDicomObject<InMemDicomObject>, tag: Tag) -> Option<Vec<f64>> {
        object.element(tag).ok()?.to_multi_float64().ok()
    }

    fn get_position(object: &FileDicomObject<InMemDicomObject>) -> Option<Vector3<f64>> {
        let position = Self::get_f64_multi(object, tags::IMAGE_POSITION_PATIENT)?;
        (position.len() == 3).then(|| Vector3::new(position[0], position[1], position[2]))
    }
}
