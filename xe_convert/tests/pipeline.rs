mod common;

use headfile::headfile::{Headfile, ToHeadfile};
use num_complex::Complex;
use xe_convert::config::{Config, ConvertSettings};
use xe_convert::dialect::GradientDelay;
use xe_convert::labels::ContrastLabel;
use xe_convert::pipeline::{Converter, DixonOptions, SubjectScans};
use xe_convert::record::fields;
use xe_convert::ConvertError;
use common::*;

fn converter() -> Converter {
    Converter::new(ConvertSettings::default()).unwrap()
}

fn count(labels:&[ContrastLabel],c:ContrastLabel) -> usize {
    labels.iter().filter(|l| **l == c).count()
}

#[test]
fn fast_dixon_on_prisma(){
    let record = converter().convert_dixon(&scan(dixon_header("20210809",12.0),4200,8),&DixonOptions::default()).unwrap();
    assert_eq!(record.scan_type,"fast");
    assert_eq!(record.gradient_delay,GradientDelay::new(-5,-5,-5));
    assert_eq!(count(&record.contrast_labels,ContrastLabel::Gas),2100);
    assert_eq!(count(&record.contrast_labels,ContrastLabel::Dissolved),2100);
    assert_eq!(record.n_imaging(),4200);
    assert_eq!(record.traj.as_ref().unwrap().dim(),(4200,8,3));
    assert_eq!(record.dissolved.as_ref().unwrap().n_projections(),2100);
}

#[test]
fn trio_gradient_delay_changes_at_the_end_of_2017(){
    let c = converter();
    let after = c.convert_dixon(&scan(dixon_header("20180102",20.0),2002,8),&DixonOptions::default()).unwrap();
    assert_eq!(after.gradient_delay,GradientDelay::new(0,-4,-3));
    assert_eq!(after.gas.as_ref().unwrap().n_projections(),1001);
    let before = c.convert_dixon(&scan(dixon_header("20171231",20.0),2002,8),&DixonOptions::default()).unwrap();
    assert_eq!(before.gradient_delay,GradientDelay::new(24,22,22));
    // the delay changes the trajectory, not the data
    assert_eq!(before.fids,after.fids);
    assert_ne!(before.traj,after.traj);
}

#[test]
fn medium_dixon_keeps_bonus_spectra(){
    let record = converter().convert_dixon(&scan(dixon_header("20220506",15.0),2430,8),&DixonOptions::default()).unwrap();
    assert_eq!(record.scan_type,"medium");
    assert_eq!(record.fids.nrows(),2430);
    assert_eq!(record.n_imaging(),2400);
    assert_eq!(record.gas.as_ref().unwrap().n_projections(),1200);
    assert_eq!(record.dissolved.as_ref().unwrap().n_projections(),1200);
    let h = record.to_hash();
    assert!(h[fields::BONUS_SPECTRA_LABELS].ends_with(&" 1".repeat(30)));
    assert_eq!(h[fields::N_FRAMES],"1200");
}

#[test]
fn unknown_layout_is_rejected(){
    match converter().convert_dixon(&scan(dixon_header("20220506",20.0),2004,8),&DixonOptions::default()) {
        Err(ConvertError::UnrecognizedDialect(q)) => {
            assert_eq!(q.total_count,2004);
            assert_eq!(q.flip_angle_dissolved,Some(20.0));
            assert_eq!(q.scan_date,date(2022,5,6));
        }
        other => panic!("expected an unrecognized dialect, got {:?}",other.map(|r| r.scan_type))
    }
}

#[test]
fn unsupported_excitation_offset_is_rejected(){
    let mut h = dixon_header("20220506",20.0);
    h.insert("Phoenix.sWipMemBlock.alFree.4".to_string(),"200".to_string());
    let r = converter().convert_dixon(&scan(h,2030,8),&DixonOptions::default());
    assert!(matches!(r,Err(ConvertError::InvalidExcitationFrequency {..})));
}

#[test]
fn missing_required_field_is_rejected(){
    let mut h = dixon_header("20220506",20.0);
    h.remove("Phoenix.alTE.0");
    match converter().convert_dixon(&scan(h,2030,8),&DixonOptions::default()) {
        Err(ConvertError::MissingRequiredMetadataField {field,tried}) => {
            assert_eq!(field,"te");
            assert_eq!(tried,vec![String::from("Phoenix.alTE.0")]);
        }
        other => panic!("expected a missing field, got {:?}",other.map(|r| r.scan_type))
    }
}

#[test]
fn noisy_dissolved_projections_are_counted(){
    let mut settings = ConvertSettings::default();
    settings.noise.enabled = true;
    let c = Converter::new(settings).unwrap();
    let mut input = scan(dixon_header("20220506",20.0),2002,16);
    let mut samples = input.raw.samples().to_owned();
    // dissolved acquisitions are the odd rows
    samples[[3,12]] = Complex::new(9.0,0.0);
    samples[[11,14]] = Complex::new(0.0,-9.0);
    input.raw = mr_data::raw::RawAcquisition::new(samples);
    let record = c.convert_dixon(&input,&DixonOptions::default()).unwrap();
    assert_eq!(record.n_dis_removed,2);
    assert_eq!(record.n_gas_removed,0);
    let dissolved = record.dissolved.as_ref().unwrap();
    assert_eq!(dissolved.n_projections(),999);
    assert_eq!(dissolved.trajectory().dim(),(999,16,3));
}

#[test]
fn subject_shares_one_scale(){
    let dir = tempfile::tempdir().unwrap();
    let mut settings = ConvertSettings::default();
    settings.subject_id = String::from("007-028B");
    settings.recon.recon_size = 128;
    let c = Converter::new(settings).unwrap();
    let scans = SubjectScans {
        dixon:Some((scan(dixon_header("20220506",20.0),2030,64),DixonOptions::default())),
        calibration:Some(scan(dixon_header("20220506",20.0),520,64)),
        proton:Some(scan(proton_header("20220506"),4601,32)),
    };
    let records = c.convert_subject(&scans).unwrap();
    // the proton scan uses the dixon scale even though it has fewer samples
    assert_eq!(records.scaling_factor,Some(0.5));
    let proton = records.proton.as_ref().unwrap();
    assert_eq!(proton.fids.nrows(),4600);
    assert_eq!(proton.traj.as_ref().unwrap().dim(),(4600,32,3));
    assert_eq!(proton.n_frames,4601);
    let calibration = records.calibration.as_ref().unwrap();
    assert_eq!(count(&calibration.contrast_labels,ContrastLabel::Gas),20);
    assert!(calibration.traj.is_none());

    let written = records.write_all(dir.path(),"007-028B").unwrap();
    assert_eq!(written.len(),3);
    let h = Headfile::existing(&dir.path().join("007-028B_proton.headfile")).unwrap().read().unwrap();
    assert_eq!(h[fields::SCAN_TYPE],"proton");
    assert_eq!(h[fields::FA_PROTON],"5");
    let tr:f64 = h[fields::TR_PROTON].parse().unwrap();
    assert!((tr - 0.0025).abs() < 1e-12);
    assert!(!h.contains_key(fields::FREQ_EXCITATION));
    let h = Headfile::existing(&dir.path().join("007-028B_dixon.headfile")).unwrap().read().unwrap();
    assert_eq!(h[fields::SUBJECT_ID],"007-028B");
    assert_eq!(h[fields::ORIENTATION],"coronal");
    assert_eq!(h[fields::TRAJ_DIS],"007-028B_dixon_traj_dis");
    assert!(dir.path().join("007-028B_dixon_fids_gas.cfl").exists());
}
