/// Physical unit the PET pixel values are rescaled to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScaleMode {
    /// Standardized Uptake Value: activity concentration normalized by
    /// injected dose and body weight.
    #[default]
    Suv,
    /// Activity concentration, prior to dose/weight normalization.
    Act,
}

/// Slice ordering applied when stacking a DICOM series into a volume.
#[derive(Clone, Copy, Default)]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}
