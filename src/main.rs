use std::path::PathBuf;

use petct_volume::dataset::{DatasetBuilder, PatientRecord};

fn main() {
    tracing_subscriber::fmt().init();

    let mut args = std::env::args().skip(1);
    let root = args
        .next()
        .map(PathBuf::from)
        .expect("usage: petct-volume <root> <ct-series> <pet-series> <mask> <mask> <mask>");
    let record = PatientRecord {
        ct_series: args.next().expect("missing CT series directory"),
        pet_series: args.next().expect("missing PET series directory"),
        masks: [
            args.next().expect("missing first mask name"),
            args.next().expect("missing second mask name"),
            args.next().expect("missing third mask name"),
        ],
    };

    let batch = DatasetBuilder::new(root)
        .build(&[record])
        .expect("should have assembled the patient batch");
    println!("batch shape: {:?}", batch.shape());
}
