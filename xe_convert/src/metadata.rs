//! Scanner header fields arrive as a flat `key=value` map dumped by the raw-file reader.
//! Every scalar is looked up through an ordered list of [Strategy]s; the first that yields a
//! value wins, and each field has an explicit policy for what happens when none do.

use std::collections::BTreeMap;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use tracing::{debug, info, warn};
use headfile::headfile::HeadfileMap;
use crate::config::PhysicsSettings;
use crate::error::{ConvertError, Result};
use crate::labels::ScanKind;

pub type HeaderFields = HeadfileMap;

/// scans after this date report the readout ramp time directly
const RAMP_TIME_SWITCH:u32 = 20180921;
/// scans before this date stored the dissolved flip angle in the WIP memory block
const LEGACY_FLIP_BEFORE:u32 = 20210530;
const DATE_PATTERN:&str = r"^(\d{4})(\d{2})(\d{2})";
const SUPPORTED_OFFSETS_PPM:[f64;2] = [208.0,218.0];

pub mod keys {
    pub const REFERENCE_IMAGE:&str = "MeasYaps.tReferenceImage0";
    pub const RO_RAMP_TIME:&str = "Meas.RORampTime";
    pub const REGRID_RAMP_TIME:&str = "Meas.alRegridRampupTime";
    pub const ORIENTATION:&str = "Dicom.tOrientation";
    pub const PROTOCOL_NAME:&str = "Config.ProtocolName";
    pub const SOFTWARE_VERSION:&str = "Dicom.SoftwareVersions";
    pub const SYSTEM_VENDOR:&str = "Dicom.Manufacturer";
    pub const INSTITUTION:&str = "Dicom.InstitutionName";
    pub const REMOVE_OS:&str = "Image.flagRemoveOS";
}

#[derive(Clone,Copy,Debug)]
enum Read {
    Whole,
    Token(usize),
}

/// one place a numeric value may be stored in the header
#[derive(Clone,Copy,Debug)]
pub struct Strategy {
    key:&'static str,
    read:Read,
    scale:f64,
    below:Option<f64>,
}

impl Strategy {
    pub const fn number(key:&'static str) -> Self {
        Self {key, read:Read::Whole, scale:1.0, below:None}
    }

    /// whitespace separated list, take the token at `index`
    pub const fn token(key:&'static str,index:usize) -> Self {
        Self {key, read:Read::Token(index), scale:1.0, below:None}
    }

    pub const fn scaled(mut self,scale:f64) -> Self {
        self.scale = scale;
        self
    }

    /// only accept raw values strictly below `limit`
    pub const fn below(mut self,limit:f64) -> Self {
        self.below = Some(limit);
        self
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn apply(&self,header:&HeaderFields) -> Option<f64> {
        let raw = header.get(self.key)?;
        let text = raw.trim().trim_matches('"');
        let value:f64 = match self.read {
            Read::Whole => text.parse().ok()?,
            Read::Token(index) => text.split_whitespace().nth(index)?.parse().ok()?,
        };
        if let Some(limit) = self.below {
            if !(value < limit) {
                return None
            }
        }
        Some(value*self.scale)
    }

    fn describe(&self) -> String {
        match self.read {
            Read::Whole => self.key.to_string(),
            Read::Token(i) => format!("{}[{}]",self.key,i),
        }
    }
}

const DWELL_TIME_US:&[Strategy] = &[
    Strategy::number("Phoenix.sRXSPEC.alDwellTime.0").scaled(1e-3),
    Strategy::token("Meas.alDwellTime",0).scaled(1e-3),
];
/// interleaved sequences: time between two FIDs of the same phase, seconds
const TR_INTERLEAVED_S:&[Strategy] = &[
    Strategy::number("Config.TR").scaled(2e-6),
    Strategy::token("Config.TR",0).scaled(2e-6),
];
const TR_PROTON_S:&[Strategy] = &[
    Strategy::token("Config.TR",0).scaled(1e-6),
    Strategy::number("Phoenix.alTR.0").scaled(1e-6),
];
const CENTER_FREQUENCY_HZ:&[Strategy] = &[
    Strategy::number("Dicom.lFrequency"),
    Strategy::number("Meas.lFrequency"),
];
const EXCITATION_PPM:&[Strategy] = &[
    Strategy::number("Phoenix.sWipMemBlock.alFree.4"),
    Strategy::number("MeasYaps.sWiPMemBlock.adFree.8"),
];
const FIELD_STRENGTH_T:&[Strategy] = &[
    Strategy::number("Dicom.flMagneticFieldStrength"),
];
const FLIP_DISSOLVED_LEGACY:&[Strategy] = &[
    Strategy::number("MeasYaps.sWipMemBlock.adFree.6"),
    Strategy::number("MeasYaps.sWiPMemBlock.adFree.6"),
];
const FLIP_DISSOLVED:&[Strategy] = &[
    Strategy::token("Meas.adFlipAngleDegree",1),
    Strategy::number("MeasYaps.adFlipAngleDegree.1"),
    Strategy::number("MeasYaps.adFlipAngleDegree.0"),
];
/// also used for the proton flip angle
const FLIP_GAS:&[Strategy] = &[
    Strategy::token("Meas.adFlipAngleDegree",0),
    Strategy::number("MeasYaps.adFlipAngleDegree.0").below(10.0),
    Strategy::number("MeasYaps.sWipMemBlock.adFree.5"),
    Strategy::number("MeasYaps.sWiPMemBlock.adFree.5"),
];
const TE_S:&[Strategy] = &[
    Strategy::number("Phoenix.alTE.0").scaled(1e-6),
];
const FOV_MM:&[Strategy] = &[
    Strategy::number("Config.ReadFoV"),
];

const DEFAULT_FIELD_STRENGTH_T:f64 = 3.0;
const DEFAULT_FOV_MM:f64 = 400.0;
const DEFAULT_FLIP_GAS:f64 = 0.5;
const DEFAULT_FLIP_PROTON:f64 = 5.0;
const DEFAULT_ORIENTATION:&str = "coronal";
const UNKNOWN:&str = "unknown";

/// outcome of running a strategy list
#[derive(Clone,Debug,PartialEq)]
pub enum Extraction<T> {
    Found {
        value:T,
        source:String,
    },
    Missing {
        tried:Vec<String>,
    },
}

impl<T> Extraction<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Extraction::Found {value,..} => Some(value),
            Extraction::Missing {..} => None,
        }
    }
}

/// where a metadata value came from
#[derive(Clone,Debug,PartialEq)]
pub enum Provenance {
    Header(String),
    Default(String),
}

pub fn first_number(header:&HeaderFields,strategies:&[Strategy]) -> Extraction<f64> {
    for strategy in strategies {
        if let Some(value) = strategy.apply(header) {
            return Extraction::Found {value, source:strategy.describe()}
        }
    }
    Extraction::Missing {tried:strategies.iter().map(|s| s.describe()).collect()}
}

pub fn first_text(header:&HeaderFields,keys:&[&'static str]) -> Extraction<String> {
    for key in keys {
        if let Some(value) = header.get(*key) {
            let value = value.trim().trim_matches('"');
            if !value.is_empty() {
                return Extraction::Found {value:value.to_string(), source:key.to_string()}
            }
        }
    }
    Extraction::Missing {tried:keys.iter().map(|k| k.to_string()).collect()}
}

/// yyyymmdd as an integer so date bounds can live in constant tables
pub fn date_key(date:NaiveDate) -> u32 {
    date.year() as u32*10000 + date.month()*100 + date.day()
}

/// the scan date is the leading `YYYYMMDD` of the last `.`-separated segment of the reference
/// image uid
pub fn parse_reference_date(reference:&str) -> Option<NaiveDate> {
    let segment = reference.trim().trim_matches('"').rsplit('.').next()?;
    let re = Regex::new(DATE_PATTERN).ok()?;
    let caps = re.captures(segment)?;
    let year:i32 = caps.get(1)?.as_str().parse().ok()?;
    let month:u32 = caps.get(2)?.as_str().parse().ok()?;
    let day:u32 = caps.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year,month,day)
}

/// the two dissolved-phase excitation offsets the protocol supports
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum ExcitationOffset {
    Ppm208,
    Ppm218,
}

impl ExcitationOffset {
    pub fn from_ppm(value:f64,source_key:&str) -> Result<Self> {
        const TOLERANCE:f64 = 1e-6;
        if (value - SUPPORTED_OFFSETS_PPM[0]).abs() < TOLERANCE {
            Ok(ExcitationOffset::Ppm208)
        }else if (value - SUPPORTED_OFFSETS_PPM[1]).abs() < TOLERANCE {
            Ok(ExcitationOffset::Ppm218)
        }else {
            Err(ConvertError::InvalidExcitationFrequency {value, source_key:source_key.to_string()})
        }
    }

    pub fn ppm(&self) -> f64 {
        match self {
            ExcitationOffset::Ppm208 => SUPPORTED_OFFSETS_PPM[0],
            ExcitationOffset::Ppm218 => SUPPORTED_OFFSETS_PPM[1],
        }
    }

    /// offset of the dissolved-phase excitation from the gas-phase center frequency
    pub fn hertz(&self,center_frequency_hz:f64) -> f64 {
        self.ppm()*center_frequency_hz*1e-6
    }
}

#[derive(Clone,Copy,Debug,PartialEq)]
pub enum FlipAngles {
    GasDissolved {
        gas:f64,
        dissolved:f64,
    },
    Proton(f64),
}

impl FlipAngles {
    pub fn dissolved(&self) -> Option<f64> {
        match self {
            FlipAngles::GasDissolved {dissolved,..} => Some(*dissolved),
            FlipAngles::Proton(_) => None,
        }
    }
}

/// repetition times in seconds
#[derive(Clone,Copy,Debug,PartialEq)]
pub enum RepetitionTime {
    GasDissolved {
        gas:f64,
        dissolved:f64,
    },
    Proton(f64),
}

#[derive(Clone,Debug,PartialEq)]
pub struct AcquisitionMetadata {
    pub kind:ScanKind,
    pub scan_date:NaiveDate,
    pub sample_time_us:f64,
    pub center_frequency_hz:f64,
    pub excitation:Option<ExcitationOffset>,
    pub flip_angles:FlipAngles,
    pub repetition_time:RepetitionTime,
    pub te_s:f64,
    pub ramp_time_us:f64,
    pub field_strength_t:f64,
    pub fov_mm:f64,
    pub orientation:String,
    pub protocol_name:String,
    pub software_version:String,
    pub system_vendor:String,
    pub institution:String,
    pub remove_oversampling:bool,
    pub provenance:BTreeMap<&'static str,Provenance>,
}

impl AcquisitionMetadata {
    pub fn scan_date_string(&self) -> String {
        self.scan_date.format("%Y-%m-%d").to_string()
    }
}

struct Extractor<'a> {
    header:&'a HeaderFields,
    provenance:BTreeMap<&'static str,Provenance>,
}

impl<'a> Extractor<'a> {

    fn new(header:&'a HeaderFields) -> Self {
        Self {header, provenance:BTreeMap::new()}
    }

    fn required(&mut self,field:&'static str,strategies:&[Strategy]) -> Result<f64> {
        match first_number(self.header,strategies) {
            Extraction::Found {value,source} => {
                self.provenance.insert(field,Provenance::Header(source));
                Ok(value)
            }
            Extraction::Missing {tried} => Err(ConvertError::MissingRequiredMetadataField {field,tried})
        }
    }

    /// optional number; `loud` fields warn when they fall back
    fn number_or(&mut self,field:&'static str,strategies:&[Strategy],default:f64,loud:bool) -> f64 {
        match first_number(self.header,strategies) {
            Extraction::Found {value,source} => {
                self.provenance.insert(field,Provenance::Header(source));
                value
            }
            Extraction::Missing {..} => {
                if loud {
                    warn!("could not find {} in header, using {}",field,default);
                }else {
                    info!("could not find {} in header, using {}",field,default);
                }
                self.provenance.insert(field,Provenance::Default(default.to_string()));
                default
            }
        }
    }

    fn text_or(&mut self,field:&'static str,key:&'static str,default:&str,loud:bool) -> String {
        match first_text(self.header,&[key]) {
            Extraction::Found {value,source} => {
                self.provenance.insert(field,Provenance::Header(source));
                value
            }
            Extraction::Missing {..} => {
                if loud {
                    warn!("could not find {} in header, using {}",field,default);
                }else {
                    debug!("could not find {} in header, using {}",field,default);
                }
                self.provenance.insert(field,Provenance::Default(default.to_string()));
                default.to_string()
            }
        }
    }

    fn scan_date(&mut self) -> Result<NaiveDate> {
        let date = self.header.get(keys::REFERENCE_IMAGE).and_then(|r| parse_reference_date(r));
        match date {
            Some(date) => {
                self.provenance.insert("scan_date",Provenance::Header(keys::REFERENCE_IMAGE.to_string()));
                Ok(date)
            }
            None => Err(ConvertError::MissingRequiredMetadataField {
                field:"scan_date",
                tried:vec![keys::REFERENCE_IMAGE.to_string()]
            })
        }
    }

    /// newer software reports the readout ramp directly, older software only the regridding
    /// ramp. Very short ramps are clamped to the hardware minimum.
    fn ramp_time(&mut self,scan_date:NaiveDate,min_ramp_time_us:f64) -> f64 {
        let readout = Strategy::number(keys::RO_RAMP_TIME);
        let regrid = Strategy::token(keys::REGRID_RAMP_TIME,0);
        let mut ramp = 0.0;
        let mut source = None;
        if let Some(value) = readout.apply(self.header) {
            if date_key(scan_date) > RAMP_TIME_SWITCH {
                self.provenance.insert("ramp_time",Provenance::Header(readout.describe()));
                return value
            }
            ramp = value;
            source = Some(readout.describe());
        }
        if let Some(value) = regrid.apply(self.header) {
            ramp = value;
            source = Some(regrid.describe());
        }
        if ramp < min_ramp_time_us {
            info!("ramp time {} us is below the minimum, using {} us",ramp,min_ramp_time_us);
            self.provenance.insert("ramp_time",Provenance::Default(min_ramp_time_us.to_string()));
            return min_ramp_time_us
        }
        if let Some(source) = source {
            self.provenance.insert("ramp_time",Provenance::Header(source));
        }
        ramp
    }

    fn flip_dissolved(&mut self,scan_date:NaiveDate) -> Result<f64> {
        let strategies:Vec<Strategy> = match date_key(scan_date) < LEGACY_FLIP_BEFORE {
            true => FLIP_DISSOLVED_LEGACY.iter().chain(FLIP_DISSOLVED.iter()).copied().collect(),
            false => FLIP_DISSOLVED.to_vec(),
        };
        self.required("fa_dis",&strategies)
    }

    fn remove_oversampling(&mut self) -> bool {
        match self.header.get(keys::REMOVE_OS).map(|v| v.trim().to_lowercase()) {
            Some(v) if v == "true" || v == "1" => {
                self.provenance.insert("removeos",Provenance::Header(keys::REMOVE_OS.to_string()));
                true
            }
            Some(v) if v == "false" || v == "0" => {
                self.provenance.insert("removeos",Provenance::Header(keys::REMOVE_OS.to_string()));
                false
            }
            _ => {
                self.provenance.insert("removeos",Provenance::Default(String::from("false")));
                false
            }
        }
    }
}

/// pull every scalar the conversion needs out of a flattened scanner header
pub fn extract_metadata(header:&HeaderFields,kind:ScanKind,physics:&PhysicsSettings) -> Result<AcquisitionMetadata> {
    let mut ex = Extractor::new(header);

    let scan_date = ex.scan_date()?;
    let sample_time_us = ex.required("sample_time",DWELL_TIME_US)?;
    let center_frequency_hz = ex.required("xe_center_frequency",CENTER_FREQUENCY_HZ)?;
    let te_s = ex.required("te",TE_S)?;

    let excitation = match kind {
        // proton scans do not excite the dissolved phase, keep the offset only when it is usable
        ScanKind::Proton => match first_number(header,EXCITATION_PPM) {
            Extraction::Found {value,source} => match ExcitationOffset::from_ppm(value,&source) {
                Ok(offset) => {
                    ex.provenance.insert("xe_dissolved_offset_frequency",Provenance::Header(source));
                    Some(offset)
                }
                Err(e) => {
                    debug!("ignoring excitation offset on proton scan: {}",e);
                    None
                }
            }
            Extraction::Missing {..} => None,
        }
        ScanKind::Dixon | ScanKind::Calibration => {
            let found = first_number(header,EXCITATION_PPM);
            match found {
                Extraction::Found {value,source} => {
                    let offset = ExcitationOffset::from_ppm(value,&source)?;
                    ex.provenance.insert("xe_dissolved_offset_frequency",Provenance::Header(source));
                    Some(offset)
                }
                Extraction::Missing {tried} => return Err(ConvertError::MissingRequiredMetadataField {
                    field:"xe_dissolved_offset_frequency",
                    tried
                })
            }
        }
    };

    let (flip_angles,repetition_time) = match kind {
        ScanKind::Proton => {
            let fa = ex.number_or("fa_proton",FLIP_GAS,DEFAULT_FLIP_PROTON,false);
            let tr = ex.required("tr_proton",TR_PROTON_S)?;
            (FlipAngles::Proton(fa),RepetitionTime::Proton(tr))
        }
        ScanKind::Dixon | ScanKind::Calibration => {
            let dissolved = ex.flip_dissolved(scan_date)?;
            let gas = ex.number_or("fa_gas",FLIP_GAS,DEFAULT_FLIP_GAS,false);
            let tr = ex.required("tr_dis",TR_INTERLEAVED_S)?;
            (FlipAngles::GasDissolved {gas,dissolved},RepetitionTime::GasDissolved {gas:tr,dissolved:tr})
        }
    };

    let ramp_time_us = ex.ramp_time(scan_date,physics.min_ramp_time_us);
    let field_strength_t = ex.number_or("field_strength",FIELD_STRENGTH_T,DEFAULT_FIELD_STRENGTH_T,true);
    let fov_mm = ex.number_or("fov",FOV_MM,DEFAULT_FOV_MM,true);
    let orientation = ex.text_or("orientation",keys::ORIENTATION,DEFAULT_ORIENTATION,true).to_lowercase();
    let protocol_name = ex.text_or("protocol_name",keys::PROTOCOL_NAME,UNKNOWN,true);
    let software_version = ex.text_or("software_version",keys::SOFTWARE_VERSION,UNKNOWN,true);
    let system_vendor = ex.text_or("system_vendor",keys::SYSTEM_VENDOR,UNKNOWN,false);
    let institution = ex.text_or("institution",keys::INSTITUTION,UNKNOWN,false);
    let remove_oversampling = ex.remove_oversampling();

    if kind != ScanKind::Proton {
        let expected_hz = physics.gyromagnetic_ratio_mhz_per_t*field_strength_t*1e6;
        if ((center_frequency_hz - expected_hz)/expected_hz).abs() > 0.05 {
            warn!("center frequency {} Hz is far from the 129Xe resonance at {} T ({} Hz)",center_frequency_hz,field_strength_t,expected_hz);
        }
    }

    Ok(AcquisitionMetadata {
        kind,
        scan_date,
        sample_time_us,
        center_frequency_hz,
        excitation,
        flip_angles,
        repetition_time,
        te_s,
        ramp_time_us,
        field_strength_t,
        fov_mm,
        orientation,
        protocol_name,
        software_version,
        system_vendor,
        institution,
        remove_oversampling,
        provenance:ex.provenance,
    })
}
