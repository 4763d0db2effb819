use std::path::PathBuf;

use ndarray::{Array4, Array5, Axis, concatenate, stack};
use rayon::prelude::*;
use thiserror::Error;

use crate::enums::{ScaleMode, SortBy};
use crate::mask::{self, MaskError};
use crate::normalize::normalize;
use crate::pet::{PetLoadError, PetVolume};
use crate::resample::resample;
use crate::volume_loader::{VolumeLoader, VolumeLoaderError};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("PET loading failed: {0}")]
    Pet(#[from] PetLoadError),

    #[error("CT loading failed: {0}")]
    Ct(#[from] VolumeLoaderError),

    #[error("Mask loading failed: {0}")]
    Mask(#[from] MaskError),

    #[error("Patient volumes have mismatched shapes: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Empty patient table")]
    EmptyTable,
}

/// One row of the patient table: series directories and mask image base
/// names, all relative to the dataset root. The `.tif` extension is
/// appended to mask names by convention.
#[derive(Clone, Debug)]
pub struct PatientRecord {
    pub ct_series: String,
    pub pet_series: String,
    pub masks: [String; 3],
}

/// Assembles per-patient (PET, CT, mask) triples into one training batch.
///
/// The PET volume is the reference grid: the CT is loaded as a plain
/// intensity volume — it carries no radiopharmaceutical, so no SUV
/// scaling applies — and resampled onto the PET geometry. Both channels
/// are min-max normalized and the mask stacks are unioned at the PET
/// shape. One patient either contributes a complete `[1, 3, Z, Y, X]`
/// block or the whole build fails.
pub struct DatasetBuilder {
    root: PathBuf,
    mode: ScaleMode,
    epsilon: f32,
}

impl DatasetBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mode: ScaleMode::default(),
            epsilon: 0.5,
        }
    }

    /// Scale PET values to SUV (the default) or activity concentration.
    pub fn with_mode(mut self, mode: ScaleMode) -> Self {
        self.mode = mode;
        self
    }

    /// Threshold applied to the summed mask stacks.
    pub fn with_mask_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Build the `[N, 3, Z, Y, X]` batch, one block per record, in table
    /// order.
    ///
    /// Records are independent and processed in parallel; any single
    /// failure aborts the whole batch.
    pub fn build(&self, records: &[PatientRecord]) -> Result<Array5<f32>, DatasetError> {
        if records.is_empty() {
            return Err(DatasetError::EmptyTable);
        }

        let blocks = records
            .par_iter()
            .map(|record| self.build_patient(record))
            .collect::<Result<Vec<_>, _>>()?;

        let views: Vec<_> = blocks.iter().map(|block| block.view()).collect();
        Ok(concatenate(Axis(0), &views)?)
    }

    fn build_patient(&self, record: &PatientRecord) -> Result<Array5<f32>, DatasetError> {
        let pet = PetVolume::from_dicom_directory(
            self.root.join(&record.pet_series),
            None,
            self.mode,
        )?;
        let ct = VolumeLoader::load_from_directory(
            self.root.join(&record.ct_series),
            None,
            SortBy::default(),
        )?;
        let ct_on_pet = resample(&ct, pet.volume());

        let shape = pet.volume().dim();
        let mask_paths: Vec<PathBuf> = record
            .masks
            .iter()
            .map(|name| self.root.join(format!("{name}.tif")))
            .collect();
        let mask = mask::build_mask(&mask_paths, shape, self.epsilon)?;

        let pet_channel = normalize(pet.into_volume().into_data());
        let ct_channel = normalize(ct_on_pet.into_data());

        Ok(assemble_block(pet_channel, ct_channel, mask)?)
    }
}

/// Stack the three channels of one patient into a `[1, 3, Z, Y, X]` block.
fn assemble_block(
    pet: ndarray::Array3<f32>,
    ct: ndarray::Array3<f32>,
    mask: ndarray::Array3<f32>,
) -> Result<Array5<f32>, ndarray::ShapeError> {
    let stacked: Array4<f32> = stack(Axis(0), &[pet.view(), ct.view(), mask.view()])?;
    Ok(stacked.insert_axis(Axis(0)))
}
