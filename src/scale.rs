use chrono::NaiveTime;
use dicom::core::Tag;
use dicom::object::InMemDicomObject;
use dicom_dictionary_std::tags;
use tracing::warn;

use crate::enums::ScaleMode;

/// Vendor-precomputed rescale factors in the (7053,10xx) private group.
const SUV_FACTOR_TAG: Tag = Tag(0x7053, 0x1000);
const ACT_FACTOR_TAG: Tag = Tag(0x7053, 0x1009);

/// Population averages substituted when headers are incomplete.
const DEFAULT_WEIGHT_G: f64 = 75_000.0;
/// 90 min waiting time + 15 min preparation.
const DEFAULT_UPTAKE_S: f64 = 1.75 * 3600.0;
/// Fluorine-18.
const DEFAULT_HALF_LIFE_S: f64 = 6588.0;
/// 420 MBq.
const DEFAULT_DOSE_BQ: f64 = 420_000_000.0;

/// DICOM TM, `HHMMSS.ffffff`.
const TIME_FORMAT: &str = "%H%M%S%.f";

/// Patient and radiopharmaceutical headers read from one slice of a PET
/// series.
///
/// Series-level attributes are constant across slices, so any slice is
/// representative. Fields that are absent, unparsable or non-positive are
/// `None` and take their documented fallback during factor computation.
#[derive(Clone, Debug, Default)]
pub struct PetMetadata {
    pub patient_weight_kg: Option<f64>,
    pub acquisition_time: Option<NaiveTime>,
    pub injection_time: Option<NaiveTime>,
    pub half_life_s: Option<f64>,
    pub injected_dose_bq: Option<f64>,
    pub vendor_suv_factor: Option<f64>,
    pub vendor_act_factor: Option<f64>,
}

impl PetMetadata {
    pub fn from_object(object: &InMemDicomObject) -> Self {
        let radiopharmaceutical = object
            .element_opt(tags::RADIOPHARMACEUTICAL_INFORMATION_SEQUENCE)
            .ok()
            .flatten()
            .and_then(|element| element.value().items())
            .and_then(|items| items.first());

        Self {
            patient_weight_kg: read_f64(object, tags::PATIENT_WEIGHT),
            acquisition_time: read_time(object, tags::ACQUISITION_TIME),
            injection_time: radiopharmaceutical
                .and_then(|item| read_time(item, tags::RADIOPHARMACEUTICAL_START_TIME)),
            half_life_s: radiopharmaceutical
                .and_then(|item| read_f64(item, tags::RADIONUCLIDE_HALF_LIFE)),
            injected_dose_bq: radiopharmaceutical
                .and_then(|item| read_f64(item, tags::RADIONUCLIDE_TOTAL_DOSE)),
            vendor_suv_factor: read_f64(object, SUV_FACTOR_TAG),
            vendor_act_factor: read_f64(object, ACT_FACTOR_TAG),
        }
    }
}

/// How a scale factor was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provenance {
    /// Read verbatim from a vendor private tag.
    VendorTag,
    /// Derived from standard header fields, or their fallbacks.
    Calculated,
}

/// A recoverable metadata gap bridged by a documented substitute value.
#[derive(Clone, Debug, PartialEq)]
pub enum Fallback {
    /// `PatientWeight` absent or unusable.
    PatientWeight { substituted_g: f64 },
    /// Radiopharmaceutical timing or dose fields absent or unusable.
    DecayTiming {
        uptake_s: f64,
        half_life_s: f64,
        injected_dose_bq: f64,
    },
    /// Vendor factor tag absent; the factor was computed instead.
    VendorFactor,
}

/// Multiplicative factor converting raw PET pixel values to SUV or
/// activity concentration units, together with its provenance.
///
/// The value is strictly positive. `fallbacks` records every substitution
/// made along the way, so callers can inspect provenance without
/// capturing the log output.
#[derive(Clone, Debug)]
pub struct ScaleFactor {
    pub value: f64,
    pub provenance: Provenance,
    pub fallbacks: Vec<Fallback>,
}

impl ScaleFactor {
    /// True when the factor came straight from the vendor private tags
    /// rather than any computed or assumed path.
    pub fn is_measured(&self) -> bool {
        self.provenance == Provenance::VendorTag
    }

    /// Factor for a PET series: the vendor-precomputed value where a
    /// finite positive one exists, otherwise computed from the headers.
    pub fn for_pet(metadata: &PetMetadata, mode: ScaleMode) -> Self {
        let vendor = match mode {
            ScaleMode::Suv => metadata.vendor_suv_factor,
            ScaleMode::Act => metadata.vendor_act_factor,
        };

        match vendor.filter(|value| *value > 0.0) {
            Some(value) => Self {
                value,
                provenance: Provenance::VendorTag,
                fallbacks: Vec::new(),
            },
            None => {
                warn!("scale factor not available in DICOM headers, calculating from metadata");
                let mut factor = Self::compute(metadata, mode);
                factor.fallbacks.insert(0, Fallback::VendorFactor);
                factor
            }
        }
    }

    /// Derive the factor from patient weight and radiopharmaceutical
    /// headers.
    ///
    /// SUV mode returns `weight_g / (decay_factor * injected_dose)`, ACT
    /// mode `1 / decay_factor`. The uptake period is the time-of-day
    /// difference between injection and acquisition, assumed to fall on
    /// the same calendar day.
    pub fn compute(metadata: &PetMetadata, mode: ScaleMode) -> Self {
        let mut fallbacks = Vec::new();

        let weight_g = match metadata.patient_weight_kg.filter(|kg| *kg > 0.0) {
            Some(kg) => kg * 1000.0,
            None => {
                warn!(
                    "patient weight not present, taking {} kg",
                    DEFAULT_WEIGHT_G / 1000.0
                );
                fallbacks.push(Fallback::PatientWeight {
                    substituted_g: DEFAULT_WEIGHT_G,
                });
                DEFAULT_WEIGHT_G
            }
        };

        let timing = (
            metadata.acquisition_time,
            metadata.injection_time,
            metadata.half_life_s.filter(|s| *s > 0.0),
            metadata.injected_dose_bq.filter(|bq| *bq > 0.0),
        );
        let (decay_factor, decayed_dose_bq) = match timing {
            (Some(scan), Some(injection), Some(half_life_s), Some(dose_bq)) => {
                let a = decay(uptake_seconds(injection, scan), half_life_s);
                (a, a * dose_bq)
            }
            _ => {
                warn!("not enough radiopharmaceutical data available, taking average values");
                fallbacks.push(Fallback::DecayTiming {
                    uptake_s: DEFAULT_UPTAKE_S,
                    half_life_s: DEFAULT_HALF_LIFE_S,
                    injected_dose_bq: DEFAULT_DOSE_BQ,
                });
                let a = decay(DEFAULT_UPTAKE_S, DEFAULT_HALF_LIFE_S);
                (a, a * DEFAULT_DOSE_BQ)
            }
        };

        let value = match mode {
            ScaleMode::Suv => weight_g / decayed_dose_bq,
            ScaleMode::Act => 1.0 / decay_factor,
        };

        Self {
            value,
            provenance: Provenance::Calculated,
            fallbacks,
        }
    }
}

/// Fraction of the injected tracer still active after `elapsed_s`.
fn decay(elapsed_s: f64, half_life_s: f64) -> f64 {
    (-std::f64::consts::LN_2 * elapsed_s / half_life_s).exp()
}

/// Time-of-day difference in seconds, wrapping past midnight.
fn uptake_seconds(injection: NaiveTime, scan: NaiveTime) -> f64 {
    let mut elapsed = (scan - injection).num_seconds();
    if elapsed < 0 {
        elapsed += 86_400;
    }
    elapsed as f64
}

fn read_f64(object: &InMemDicomObject, tag: Tag) -> Option<f64> {
    object
        .element_opt(tag)
        .ok()
        .flatten()?
        .to_float64()
        .ok()
        .filter(|value| value.is_finite())
}

fn read_time(object: &InMemDicomObject, tag: Tag) -> Option<NaiveTime> {
    let raw = object.element_opt(tag).ok().flatten()?.to_str().ok()?;
    NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::core::value::DataSetSequence;
    use dicom::core::{DataElement, PrimitiveValue, VR};

    fn measured_metadata() -> PetMetadata {
        PetMetadata {
            patient_weight_kg: Some(70.0),
            acquisition_time: NaiveTime::from_hms_opt(11, 0, 0),
            injection_time: NaiveTime::from_hms_opt(10, 0, 0),
            half_life_s: Some(6588.0),
            injected_dose_bq: Some(400_000_000.0),
            ..PetMetadata::default()
        }
    }

    #[test]
    fn suv_factor_matches_hand_computed_value() {
        let factor = ScaleFactor::compute(&measured_metadata(), ScaleMode::Suv);
        let a = (-std::f64::consts::LN_2 * 3600.0 / 6588.0).exp();
        let expected = 70_000.0 / (a * 400_000_000.0);
        assert!((factor.value - expected).abs() < 1e-12);
        assert!(factor.value > 0.0);
        assert_eq!(factor.provenance, Provenance::Calculated);
        assert!(factor.fallbacks.is_empty());
    }

    #[test]
    fn act_factor_is_independent_of_weight_and_dose() {
        let mut heavy = measured_metadata();
        heavy.patient_weight_kg = Some(120.0);
        heavy.injected_dose_bq = Some(500_000_000.0);

        let reference = ScaleFactor::compute(&measured_metadata(), ScaleMode::Act);
        let other = ScaleFactor::compute(&heavy, ScaleMode::Act);

        let a = (-std::f64::consts::LN_2 * 3600.0 / 6588.0).exp();
        assert!((reference.value - 1.0 / a).abs() < 1e-12);
        assert_eq!(reference.value, other.value);
    }

    #[test]
    fn missing_weight_substitutes_default() {
        let mut metadata = measured_metadata();
        metadata.patient_weight_kg = None;
        let fallback = ScaleFactor::compute(&metadata, ScaleMode::Suv);

        let mut substituted = measured_metadata();
        substituted.patient_weight_kg = Some(75.0);
        let explicit = ScaleFactor::compute(&substituted, ScaleMode::Suv);

        assert_eq!(fallback.value, explicit.value);
        assert_eq!(
            fallback.fallbacks,
            vec![Fallback::PatientWeight {
                substituted_g: 75_000.0
            }]
        );
    }

    #[test]
    fn missing_timing_uses_average_decay() {
        let metadata = PetMetadata {
            patient_weight_kg: Some(75.0),
            ..PetMetadata::default()
        };
        let factor = ScaleFactor::compute(&metadata, ScaleMode::Suv);

        let a = (-std::f64::consts::LN_2 * 6300.0 / 6588.0).exp();
        let expected = 75_000.0 / (a * 420_000_000.0);
        assert!((factor.value - expected).abs() < 1e-12);
        assert_eq!(
            factor.fallbacks,
            vec![Fallback::DecayTiming {
                uptake_s: 6300.0,
                half_life_s: 6588.0,
                injected_dose_bq: 420_000_000.0
            }]
        );
    }

    #[test]
    fn non_positive_half_life_takes_fallback_path() {
        let mut metadata = measured_metadata();
        metadata.half_life_s = Some(0.0);
        let factor = ScaleFactor::compute(&metadata, ScaleMode::Suv);
        assert!(factor.value.is_finite());
        assert!(factor.value > 0.0);
        assert!(matches!(factor.fallbacks[0], Fallback::DecayTiming { .. }));
    }

    #[test]
    fn uptake_wraps_past_midnight() {
        let injection = NaiveTime::from_hms_opt(23, 30, 0).unwrap();
        let scan = NaiveTime::from_hms_opt(0, 30, 0).unwrap();
        assert_eq!(uptake_seconds(injection, scan), 3600.0);
    }

    #[test]
    fn vendor_factor_is_used_verbatim() {
        let metadata = PetMetadata {
            vendor_suv_factor: Some(0.00123),
            ..measured_metadata()
        };
        let factor = ScaleFactor::for_pet(&metadata, ScaleMode::Suv);
        assert_eq!(factor.value, 0.00123);
        assert!(factor.is_measured());
        assert!(factor.fallbacks.is_empty());
    }

    #[test]
    fn non_positive_vendor_factor_falls_back_to_computation() {
        let metadata = PetMetadata {
            vendor_suv_factor: Some(-1.0),
            ..measured_metadata()
        };
        let factor = ScaleFactor::for_pet(&metadata, ScaleMode::Suv);
        assert!(!factor.is_measured());
        assert_eq!(factor.fallbacks, vec![Fallback::VendorFactor]);
        assert!(factor.value > 0.0);
    }

    #[test]
    fn act_mode_reads_its_own_vendor_tag() {
        let metadata = PetMetadata {
            vendor_suv_factor: Some(0.5),
            vendor_act_factor: Some(2.0),
            ..measured_metadata()
        };
        let factor = ScaleFactor::for_pet(&metadata, ScaleMode::Act);
        assert_eq!(factor.value, 2.0);
    }

    #[test]
    fn metadata_is_extracted_from_dicom_headers() {
        let item = InMemDicomObject::from_element_iter([
            DataElement::new(
                tags::RADIOPHARMACEUTICAL_START_TIME,
                VR::TM,
                PrimitiveValue::from("100000.000000"),
            ),
            DataElement::new(
                tags::RADIONUCLIDE_HALF_LIFE,
                VR::DS,
                PrimitiveValue::from("6588"),
            ),
            DataElement::new(
                tags::RADIONUCLIDE_TOTAL_DOSE,
                VR::DS,
                PrimitiveValue::from("420000000"),
            ),
        ]);
        let object = InMemDicomObject::from_element_iter([
            DataElement::new(tags::PATIENT_WEIGHT, VR::DS, PrimitiveValue::from("70")),
            DataElement::new(
                tags::ACQUISITION_TIME,
                VR::TM,
                PrimitiveValue::from("110000.000000"),
            ),
            DataElement::new(
                tags::RADIOPHARMACEUTICAL_INFORMATION_SEQUENCE,
                VR::SQ,
                DataSetSequence::from(vec![item]),
            ),
            DataElement::new(SUV_FACTOR_TAG, VR::DS, PrimitiveValue::from("0.002")),
        ]);

        let metadata = PetMetadata::from_object(&object);
        assert_eq!(metadata.patient_weight_kg, Some(70.0));
        assert_eq!(metadata.acquisition_time, NaiveTime::from_hms_opt(11, 0, 0));
        assert_eq!(metadata.injection_time, NaiveTime::from_hms_opt(10, 0, 0));
        assert_eq!(metadata.half_life_s, Some(6588.0));
        assert_eq!(metadata.injected_dose_bq, Some(420_000_000.0));
        assert_eq!(metadata.vendor_suv_factor, Some(0.002));
        assert_eq!(metadata.vendor_act_factor, None);
    }

    #[test]
    fn absent_headers_extract_as_none() {
        let object = InMemDicomObject::new_empty();
        let metadata = PetMetadata::from_object(&object);
        assert!(metadata.patient_weight_kg.is_none());
        assert!(metadata.acquisition_time.is_none());
        assert!(metadata.injection_time.is_none());
        assert!(metadata.vendor_suv_factor.is_none());
    }
}
