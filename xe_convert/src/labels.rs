use std::fmt;
use serde::{Deserialize, Serialize};

/// excitation type of a single FID
#[derive(Clone,Copy,Debug,PartialEq,Eq,Hash,Serialize,Deserialize)]
pub enum ContrastLabel {
    Proton,
    Gas,
    Dissolved,
}

impl ContrastLabel {
    pub fn code(&self) -> u8 {
        match self {
            ContrastLabel::Proton => 0,
            ContrastLabel::Gas => 1,
            ContrastLabel::Dissolved => 2,
        }
    }
}

#[derive(Clone,Copy,Debug,PartialEq,Eq,Hash,Serialize,Deserialize)]
pub enum BonusSpectraLabel {
    NotBonus,
    Bonus,
}

impl BonusSpectraLabel {
    pub fn code(&self) -> u8 {
        match self {
            BonusSpectraLabel::NotBonus => 0,
            BonusSpectraLabel::Bonus => 1,
        }
    }
}

/// the three protocols acquired for one subject
#[derive(Clone,Copy,Debug,PartialEq,Eq,Hash,Serialize,Deserialize)]
pub enum ScanKind {
    Dixon,
    Calibration,
    Proton,
}

impl fmt::Display for ScanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanKind::Dixon => "dixon",
            ScanKind::Calibration => "calibration",
            ScanKind::Proton => "proton",
        };
        write!(f,"{}",s)
    }
}

/// repetition speed of a dixon protocol
#[derive(Clone,Copy,Debug,PartialEq,Eq,Hash,Serialize,Deserialize)]
pub enum DixonSpeed {
    Normal,
    Medium,
    Fast,
}

impl DixonSpeed {
    pub fn as_str(&self) -> &'static str {
        match self {
            DixonSpeed::Normal => "normal",
            DixonSpeed::Medium => "medium",
            DixonSpeed::Fast => "fast",
        }
    }
}

pub fn contrast_codes(labels:&[ContrastLabel]) -> Vec<u8> {
    labels.iter().map(|l| l.code()).collect()
}

pub fn bonus_codes(labels:&[BonusSpectraLabel]) -> Vec<u8> {
    labels.iter().map(|l| l.code()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_serializer(){
        assert_eq!(contrast_codes(&[ContrastLabel::Proton,ContrastLabel::Gas,ContrastLabel::Dissolved]),vec![0,1,2]);
        assert_eq!(bonus_codes(&[BonusSpectraLabel::NotBonus,BonusSpectraLabel::Bonus]),vec![0,1]);
        assert_eq!(ScanKind::Calibration.to_string(),"calibration");
        assert_eq!(DixonSpeed::Medium.as_str(),"medium");
    }
}
