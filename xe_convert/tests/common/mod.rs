#![allow(dead_code)]

use chrono::NaiveDate;
use ndarray::Array2;
use num_complex::Complex;
use mr_data::raw::RawAcquisition;
use xe_convert::metadata::HeaderFields;
use xe_convert::pipeline::ScanInput;

/// header as the raw reader dumps it for a scan on `date` (yyyymmdd)
pub fn header(date:&str,flip_angles:&str) -> HeaderFields {
    let mut h = HeaderFields::new();
    let mut put = |k:&str,v:&str| {h.insert(k.to_string(),v.to_string());};
    put("MeasYaps.tReferenceImage0",&format!("\"1.3.12.2.1107.5.2.43.67010.{}0915463127418\"",date));
    put("Phoenix.sRXSPEC.alDwellTime.0","15000");
    put("Config.TR","7500");
    put("Dicom.lFrequency","34092008");
    put("Phoenix.sWipMemBlock.alFree.4","218");
    put("Dicom.flMagneticFieldStrength","2.89362");
    put("Meas.RORampTime","150");
    put("Meas.adFlipAngleDegree",flip_angles);
    put("Phoenix.alTE.0","450");
    put("Config.ReadFoV","400");
    put("Dicom.tOrientation","Coronal");
    put("Config.ProtocolName","5_xe_dixon");
    put("Dicom.SoftwareVersions","syngo MR E11");
    put("Dicom.Manufacturer","Siemens");
    put("Dicom.InstitutionName","Duke");
    h
}

pub fn dixon_header(date:&str,flip_dissolved:f64) -> HeaderFields {
    header(date,&format!("0.5 {}",flip_dissolved))
}

pub fn proton_header(date:&str) -> HeaderFields {
    let mut h = header(date,"5");
    h.remove("Phoenix.sWipMemBlock.alFree.4");
    h.insert("Config.TR".to_string(),"2500".to_string());
    h
}

/// decaying FIDs, acquisition i starts at amplitude 1 + i/n
pub fn fids(n:usize,p:usize) -> Array2<Complex<f32>> {
    Array2::from_shape_fn((n,p),|(i,j)| {
        let a = (1.0 + i as f32/n as f32)*(-(j as f32)/3.0).exp();
        Complex::new(a,0.5*a)
    })
}

pub fn scan(header:HeaderFields,n:usize,p:usize) -> ScanInput {
    ScanInput {
        header,
        raw:RawAcquisition::new(fids(n,p)),
        filename:Some(String::from("meas_MID00086_FID17782_5_xe_radial_Dixon.dat")),
    }
}

pub fn date(y:i32,m:u32,d:u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y,m,d).unwrap()
}
