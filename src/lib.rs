//! # PET/CT volume library
//!
//! This crate assembles SUV-normalized PET/CT training volumes from DICOM
//! series
//!
//! This library is part of the dicom-rs ecosystem and leverages its
//! components to read PET and CT series into volumes with physical
//! geometry (origin, spacing, direction cosines). PET pixel values are
//! rescaled to Standardized Uptake Values or activity concentration using
//! the vendor's precomputed private tags where present, and a factor
//! derived from patient weight and radiopharmaceutical headers otherwise,
//! with documented population averages filling any gaps. Volumes can be
//! resampled onto another volume's grid, tissue masks stored as
//! multi-page TIFF stacks are unioned into binary label volumes, and a
//! patient table is assembled into one `[N, 3, Z, Y, X]` batch of
//! (PET, CT, mask) triples. If the environment supports it, slices and
//! patients are processed in parallel using rayon. DICOM files are
//! assumed to have the following attributes:
//!  - Slices of one series share orientation, pixel spacing and
//!    dimensions
//!  - No multiframe (always the first frame is used)
//!  - Series-level metadata (patient, radiopharmaceutical) is constant
//!    across the slices of a series
//!
//! # Examples
//!
//! ## Assembling a one-patient batch
//!
//! Scale the PET series to SUV, resample the CT onto its grid, union the
//! three tissue masks and stack everything into a batch:
//!
//! ```no_run
//! # use petct_volume::dataset::{DatasetBuilder, PatientRecord};
//! let record = PatientRecord {
//!     ct_series: "patient01/ct".into(),
//!     pet_series: "patient01/pet".into(),
//!     masks: [
//!         "patient01/left_lung".into(),
//!         "patient01/nasal".into(),
//!         "patient01/right_lung".into(),
//!     ],
//! };
//! let batch = DatasetBuilder::new("/data/exports")
//!     .build(&[record])
//!     .expect("should have assembled the patient batch");
//! println!("{:?}", batch.shape());
//! ```
//!
//! ## Loading a single PET series
//!
//! ```no_run
//! # use petct_volume::enums::ScaleMode;
//! # use petct_volume::pet::PetVolume;
//! let pet = PetVolume::from_dicom_directory("pet", None, ScaleMode::Suv)
//!     .expect("should have loaded the PET series");
//! assert!(pet.scale().value > 0.0);
//! ```

pub mod dataset;
pub mod enums;
mod interpolator;
pub mod mask;
pub mod normalize;
pub mod pet;
pub mod resample;
pub mod scale;
pub mod volume;
pub mod volume_loader;
