use std::path::Path;

use dicom::object::open_file;
use thiserror::Error;

use crate::enums::{ScaleMode, SortBy};
use crate::resample::resample;
use crate::scale::{PetMetadata, ScaleFactor};
use crate::volume::Volume;
use crate::volume_loader::{VolumeLoader, VolumeLoaderError};

#[derive(Debug, Error)]
pub enum PetLoadError {
    #[error("Volume loading failed: {0}")]
    Volume(#[from] VolumeLoaderError),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

/// A PET series scaled to SUV or activity concentration units.
///
/// Plain composition over the loaded image: the scaled volume, the headers
/// of the representative slice, the factor that was applied, and the most
/// recent resampled copy.
pub struct PetVolume {
    volume: Volume,
    metadata: PetMetadata,
    scale: ScaleFactor,
    resampled: Option<Volume>,
}

impl PetVolume {
    /// Read a PET DICOM series and scale it to SUV or activity
    /// concentration values.
    ///
    /// The vendor-precomputed factor from the private tags is preferred;
    /// otherwise the factor is derived from patient weight and
    /// radiopharmaceutical headers, substituting documented averages for
    /// missing fields (see [`ScaleFactor`]). Pixel values are decoded as
    /// 32-bit float, multiplied by the factor and made absolute, since the
    /// decoder may yield sign-inverted but magnitude-correct values.
    pub fn from_dicom_directory(
        path: impl AsRef<Path>,
        series_id: Option<&str>,
        mode: ScaleMode,
    ) -> Result<Self, PetLoadError> {
        let path = path.as_ref();
        let volume = VolumeLoader::load_from_directory(path, series_id, SortBy::default())?;

        // Series-level headers are constant across slices; the
        // lexicographically first file keeps the choice deterministic.
        let paths = VolumeLoader::dicom_file_paths(path)?;
        let first = paths.first().ok_or(VolumeLoaderError::NoValidImages)?;
        let representative = open_file(first)?;
        let metadata = PetMetadata::from_object(&representative);

        let scale = ScaleFactor::for_pet(&metadata, mode);
        let factor = scale.value as f32;
        let volume = volume.map(|value| (value * factor).abs());

        Ok(Self {
            volume,
            metadata,
            scale,
            resampled: None,
        })
    }

    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    pub fn into_volume(self) -> Volume {
        self.volume
    }

    pub fn metadata(&self) -> &PetMetadata {
        &self.metadata
    }

    pub fn scale(&self) -> &ScaleFactor {
        &self.scale
    }

    /// Re-grid the scaled volume onto `reference`'s geometry.
    ///
    /// The copy is cached and overwritten on each call. Slices near the
    /// physical extremes of the PET field of view may come out empty;
    /// this is expected interpolation behavior, not an error.
    pub fn resample_onto(&mut self, reference: &Volume) -> &Volume {
        let resampled = resample(&self.volume, reference);
        self.resampled.insert(resampled)
    }

    /// The most recent resampled copy, if any.
    pub fn resampled(&self) -> Option<&Volume> {
        self.resampled.as_ref()
    }
}
