//! Acquisition dialects: which scanner software generation wrote a file, and therefore how
//! its acquisitions are laid out. Nothing in the file states this directly, so the dixon
//! layout is looked up from (dissolved flip angle, acquisition count, scan date).

use std::fmt;
use chrono::NaiveDate;
use tracing::info;
use crate::config::PhysicsSettings;
use crate::error::{ConvertError, Result};
use crate::labels::{BonusSpectraLabel, ContrastLabel, DixonSpeed, ScanKind};
use crate::metadata::date_key;
pub use crate::trajectory::GradientDelay;

const FLIP_TOLERANCE:f64 = 1e-3;
/// token marking files written by the older bandwidth-stepping sequence
const HALF_DWELL_FILENAME_TOKEN:&str = "BW";
/// proton files with one extra projection, only 4600 are usable
const PROTON_EXTRA_PROJECTION:usize = 4601;
/// proton files with 30 trailing bonus spectra
const PROTON_BONUS_SPECTRA:usize = 4630;
const PROTON_USABLE:usize = 4600;

/// how acquisitions outside the bonus tail are labeled
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum InterleavePattern {
    /// gas on even indices, dissolved on odd
    Alternating,
    /// dissolved acquisitions followed by a trailing block of gas acquisitions
    DissolvedThenGas {
        gas_tail:usize,
    },
    ProtonOnly,
}

/// trailing calibration spectra: `dissolved` acquisitions then `gas` acquisitions
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct BonusTail {
    pub dissolved:usize,
    pub gas:usize,
}

impl BonusTail {
    pub const STANDARD:BonusTail = BonusTail {dissolved:10, gas:20};

    pub const fn len(&self) -> usize {
        self.dissolved + self.gas
    }
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum BandwidthConvention {
    Standard,
    /// sample time already covers half the readout
    HalfDwell,
}

impl BandwidthConvention {
    /// readout bandwidth in Hz per pixel
    pub fn bandwidth(&self,sample_time_us:f64,n_points:usize) -> f64 {
        let st = sample_time_us*1e-6;
        let n = n_points as f64;
        match self {
            BandwidthConvention::Standard => 1.0/(2.0*st*n),
            BandwidthConvention::HalfDwell => 1.0/(n*st),
        }
    }
}

#[derive(Clone,Copy,Debug,PartialEq)]
pub struct DialectDescriptor {
    pub name:&'static str,
    pub kind:ScanKind,
    pub speed:Option<DixonSpeed>,
    pub pattern:InterleavePattern,
    pub bonus:Option<BonusTail>,
    pub gradient_delay:GradientDelay,
    pub expected_total_count:usize,
    /// leading acquisitions kept; the rest are discarded
    pub retained_count:usize,
    /// projections to generate a trajectory for, if the scan is imaged
    pub trajectory_frames:Option<usize>,
    pub bandwidth:BandwidthConvention,
}

impl DialectDescriptor {
    const fn dixon(name:&'static str,speed:DixonSpeed,total:usize,bonus:Option<BonusTail>,delay:GradientDelay) -> Self {
        let n_bonus = match bonus {
            Some(b) => b.len(),
            None => 0,
        };
        Self {
            name,
            kind:ScanKind::Dixon,
            speed:Some(speed),
            pattern:InterleavePattern::Alternating,
            bonus,
            gradient_delay:delay,
            expected_total_count:total,
            retained_count:total,
            trajectory_frames:Some((total - n_bonus)/2),
            bandwidth:BandwidthConvention::Standard,
        }
    }

    pub fn bonus_sample_count(&self) -> usize {
        self.bonus.map(|b| b.len()).unwrap_or(0)
    }

    /// acquisitions that carry imaging or spectroscopy signal
    pub fn physics_count(&self) -> usize {
        self.retained_count - self.bonus_sample_count()
    }

    pub fn discarded_count(&self) -> usize {
        self.expected_total_count - self.retained_count
    }

    /// gas and dissolved counts must match outside the bonus tail
    pub fn is_balanced(&self) -> bool {
        self.pattern == InterleavePattern::Alternating
    }

    fn in_bonus(&self,index:usize) -> Option<usize> {
        let start = self.physics_count();
        match self.bonus {
            Some(_) if index >= start && index < self.retained_count => Some(index - start),
            _ => None,
        }
    }

    /// label of retained acquisition `index`
    pub fn contrast_label(&self,index:usize) -> ContrastLabel {
        if let (Some(offset),Some(tail)) = (self.in_bonus(index),self.bonus) {
            return match offset < tail.dissolved {
                true => ContrastLabel::Dissolved,
                false => ContrastLabel::Gas,
            }
        }
        match self.pattern {
            InterleavePattern::Alternating => match index % 2 {
                0 => ContrastLabel::Gas,
                _ => ContrastLabel::Dissolved,
            }
            InterleavePattern::DissolvedThenGas {gas_tail} => match index + gas_tail >= self.retained_count {
                true => ContrastLabel::Gas,
                false => ContrastLabel::Dissolved,
            }
            InterleavePattern::ProtonOnly => ContrastLabel::Proton,
        }
    }

    pub fn bonus_label(&self,index:usize) -> BonusSpectraLabel {
        match self.in_bonus(index) {
            Some(_) => BonusSpectraLabel::Bonus,
            None => BonusSpectraLabel::NotBonus,
        }
    }

    /// record `scan_type`
    pub fn scan_type(&self) -> String {
        match (self.kind,self.speed) {
            (ScanKind::Dixon,Some(speed)) => speed.as_str().to_string(),
            (kind,_) => kind.to_string(),
        }
    }
}

/// bounds on the scan date as yyyymmdd, `after` exclusive, `through` inclusive
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct DateRange {
    pub after:Option<u32>,
    pub through:Option<u32>,
}

impl DateRange {
    pub const ANY:DateRange = DateRange {after:None, through:None};

    pub const fn after(date:u32) -> Self {
        Self {after:Some(date), through:None}
    }

    pub const fn through(date:u32) -> Self {
        Self {after:None, through:Some(date)}
    }

    pub fn contains(&self,date:NaiveDate) -> bool {
        let key = date_key(date);
        self.after.map_or(true,|a| key > a) && self.through.map_or(true,|t| key <= t)
    }

    /// number of bounds; more bounds is more specific
    pub fn specificity(&self) -> usize {
        self.after.is_some() as usize + self.through.is_some() as usize
    }

    pub fn overlaps(&self,other:&DateRange) -> bool {
        let lo = self.after.max(other.after).unwrap_or(0);
        let hi = match (self.through,other.through) {
            (Some(a),Some(b)) => a.min(b),
            (Some(a),None) | (None,Some(a)) => a,
            (None,None) => u32::MAX,
        };
        lo < hi
    }
}

#[derive(Clone,Copy,Debug,PartialEq)]
pub struct DialectRule {
    pub flip_angle:f64,
    pub total_count:usize,
    pub dates:DateRange,
    pub descriptor:DialectDescriptor,
}

impl DialectRule {
    fn matches(&self,flip_angle:f64,total_count:usize,scan_date:NaiveDate) -> bool {
        (self.flip_angle - flip_angle).abs() < FLIP_TOLERANCE
            && self.total_count == total_count
            && self.dates.contains(scan_date)
    }
}

const TRIO_DELAY:GradientDelay = GradientDelay::new(0,-4,-3);
const TRIO_2017_DELAY:GradientDelay = GradientDelay::new(24,22,22);
const PRISMA_DELAY:GradientDelay = GradientDelay::new(-5,-5,-5);

/// dixon layouts seen in the field, keyed on (dissolved flip angle, total acquisitions, date)
pub const DIXON_RULES:&[DialectRule] = &[
    DialectRule {
        flip_angle:20.0, total_count:2002, dates:DateRange::after(20171231),
        descriptor:DialectDescriptor::dixon("normal dixon, Trio",DixonSpeed::Normal,2002,None,TRIO_DELAY),
    },
    DialectRule {
        flip_angle:20.0, total_count:2002, dates:DateRange::through(20171231),
        descriptor:DialectDescriptor::dixon("normal dixon, Trio (2017 and earlier)",DixonSpeed::Normal,2002,None,TRIO_2017_DELAY),
    },
    DialectRule {
        flip_angle:12.0, total_count:4200, dates:DateRange::ANY,
        descriptor:DialectDescriptor::dixon("fast dixon, Prisma",DixonSpeed::Fast,4200,None,PRISMA_DELAY),
    },
    DialectRule {
        flip_angle:12.0, total_count:4230, dates:DateRange::ANY,
        descriptor:DialectDescriptor::dixon("fast dixon, Prisma with bonus spectra",DixonSpeed::Fast,4230,Some(BonusTail::STANDARD),PRISMA_DELAY),
    },
    DialectRule {
        flip_angle:15.0, total_count:2430, dates:DateRange::ANY,
        descriptor:DialectDescriptor::dixon("medium dixon, Prisma with bonus spectra",DixonSpeed::Medium,2430,Some(BonusTail::STANDARD),PRISMA_DELAY),
    },
    DialectRule {
        flip_angle:20.0, total_count:2030, dates:DateRange::ANY,
        descriptor:DialectDescriptor::dixon("normal dixon, Prisma with bonus spectra",DixonSpeed::Normal,2030,Some(BonusTail::STANDARD),PRISMA_DELAY),
    },
    // the trailing spectra of this sequence follow the same alternation as the imaging block
    DialectRule {
        flip_angle:20.0, total_count:2032, dates:DateRange::ANY,
        descriptor:DialectDescriptor::dixon("normal dixon, Trio with bonus spectra",DixonSpeed::Normal,2032,None,TRIO_DELAY),
    },
    DialectRule {
        flip_angle:20.0, total_count:2000, dates:DateRange::ANY,
        descriptor:DialectDescriptor::dixon("normal dixon, Trio 2007/2008",DixonSpeed::Normal,2000,None,TRIO_DELAY),
    },
];

/// everything the classifier looks at, kept whole for error reports
#[derive(Clone,Debug,PartialEq)]
pub struct DialectQuery {
    pub kind:ScanKind,
    pub flip_angle_dissolved:Option<f64>,
    pub total_count:usize,
    pub scan_date:NaiveDate,
    pub filename:Option<String>,
}

impl fmt::Display for DialectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{} scan with {} acquisitions",self.kind,self.total_count)?;
        if let Some(flip) = self.flip_angle_dissolved {
            write!(f,", dissolved flip angle {}",flip)?;
        }
        write!(f,", scanned {}",self.scan_date.format("%Y-%m-%d"))?;
        if let Some(name) = &self.filename {
            write!(f,", file {}",name)?;
        }
        Ok(())
    }
}

/// table-driven classifier; rules are tried most specific first and the first match wins
#[derive(Clone,Debug)]
pub struct DialectClassifier {
    rules:Vec<DialectRule>,
    calibration_gas_fids:usize,
    proton_delay:GradientDelay,
}

impl DialectClassifier {

    pub fn standard(physics:&PhysicsSettings) -> Self {
        Self::with_rules(DIXON_RULES.to_vec(),physics)
    }

    pub fn with_rules(mut rules:Vec<DialectRule>,physics:&PhysicsSettings) -> Self {
        // stable, so table order breaks ties
        rules.sort_by(|a,b| b.dates.specificity().cmp(&a.dates.specificity()));
        Self {
            rules,
            calibration_gas_fids:physics.calibration_gas_fids,
            proton_delay:GradientDelay::from(physics.proton_gradient_delay),
        }
    }

    pub fn rules(&self) -> &[DialectRule] {
        &self.rules
    }

    pub fn classify(&self,query:&DialectQuery) -> Result<DialectDescriptor> {
        let mut descriptor = match query.kind {
            ScanKind::Dixon => self.classify_dixon(query)?,
            ScanKind::Calibration => self.classify_calibration(query)?,
            ScanKind::Proton => self.classify_proton(query)?,
        };
        let half_dwell = query.filename.as_deref().map_or(false,|f| f.contains(HALF_DWELL_FILENAME_TOKEN));
        if half_dwell && descriptor.kind == ScanKind::Dixon {
            descriptor.bandwidth = BandwidthConvention::HalfDwell;
        }
        info!("{} classified as {}",query,descriptor.name);
        Ok(descriptor)
    }

    fn classify_dixon(&self,query:&DialectQuery) -> Result<DialectDescriptor> {
        let flip = query.flip_angle_dissolved.ok_or_else(|| ConvertError::UnrecognizedDialect(query.clone()))?;
        self.rules.iter()
            .find(|r| r.matches(flip,query.total_count,query.scan_date))
            .map(|r| r.descriptor)
            .ok_or_else(|| ConvertError::UnrecognizedDialect(query.clone()))
    }

    /// dissolved acquisitions closed by a fixed block of gas acquisitions
    fn classify_calibration(&self,query:&DialectQuery) -> Result<DialectDescriptor> {
        if query.total_count <= self.calibration_gas_fids {
            return Err(ConvertError::UnrecognizedDialect(query.clone()))
        }
        Ok(DialectDescriptor {
            name:"calibration",
            kind:ScanKind::Calibration,
            speed:None,
            pattern:InterleavePattern::DissolvedThenGas {gas_tail:self.calibration_gas_fids},
            bonus:None,
            gradient_delay:GradientDelay::ZERO,
            expected_total_count:query.total_count,
            retained_count:query.total_count,
            trajectory_frames:None,
            bandwidth:BandwidthConvention::Standard,
        })
    }

    fn classify_proton(&self,query:&DialectQuery) -> Result<DialectDescriptor> {
        let total = query.total_count;
        let (name,retained,frames) = match total {
            0 => return Err(ConvertError::UnrecognizedDialect(query.clone())),
            PROTON_EXTRA_PROJECTION => ("proton, extra projection",PROTON_USABLE,PROTON_EXTRA_PROJECTION),
            PROTON_BONUS_SPECTRA => ("proton with bonus spectra",PROTON_USABLE,PROTON_USABLE),
            _ => ("proton",total,total),
        };
        Ok(DialectDescriptor {
            name,
            kind:ScanKind::Proton,
            speed:None,
            pattern:InterleavePattern::ProtonOnly,
            bonus:None,
            gradient_delay:self.proton_delay,
            expected_total_count:total,
            retained_count:retained,
            trajectory_frames:Some(frames),
            bandwidth:BandwidthConvention::Standard,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn date(y:i32,m:u32,d:u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y,m,d).unwrap()
    }

    fn dixon(flip:f64,total:usize,on:NaiveDate) -> DialectQuery {
        DialectQuery {kind:ScanKind::Dixon, flip_angle_dissolved:Some(flip), total_count:total, scan_date:on, filename:None}
    }

    fn classifier() -> DialectClassifier {
        DialectClassifier::standard(&PhysicsSettings::default())
    }

    #[test]
    fn date_bounded_rules_come_first(){
        let c = classifier();
        assert_eq!(c.rules()[0].dates.specificity(),1);
        assert_eq!(c.rules()[1].dates.specificity(),1);
        assert!(c.rules()[2..].iter().all(|r| r.dates == DateRange::ANY));
    }

    #[test]
    fn rules_never_overlap(){
        for (i,a) in DIXON_RULES.iter().enumerate() {
            for b in &DIXON_RULES[i+1..] {
                let same_key = (a.flip_angle - b.flip_angle).abs() < FLIP_TOLERANCE && a.total_count == b.total_count;
                assert!(!(same_key && a.dates.overlaps(&b.dates)),"{} overlaps {}",a.descriptor.name,b.descriptor.name);
            }
        }
    }

    #[test]
    fn trio_delay_depends_on_date(){
        let c = classifier();
        let d = c.classify(&dixon(20.0,2002,date(2018,1,1))).unwrap();
        assert_eq!(d.gradient_delay,GradientDelay::new(0,-4,-3));
        let d = c.classify(&dixon(20.0,2002,date(2017,12,31))).unwrap();
        assert_eq!(d.gradient_delay,GradientDelay::new(24,22,22));
    }

    #[test]
    fn bonus_tail_layout(){
        let d = classifier().classify(&dixon(15.0,2430,date(2022,6,1))).unwrap();
        assert_eq!(d.bonus_sample_count(),30);
        assert_eq!(d.trajectory_frames,Some(1200));
        assert_eq!(d.contrast_label(0),ContrastLabel::Gas);
        assert_eq!(d.contrast_label(2399),ContrastLabel::Dissolved);
        assert_eq!(d.bonus_label(2399),BonusSpectraLabel::NotBonus);
        assert_eq!(d.contrast_label(2400),ContrastLabel::Dissolved);
        assert_eq!(d.contrast_label(2409),ContrastLabel::Dissolved);
        assert_eq!(d.contrast_label(2410),ContrastLabel::Gas);
        assert_eq!(d.bonus_label(2429),BonusSpectraLabel::Bonus);
        assert_eq!(d.scan_type(),"medium");
    }

    #[test]
    fn unknown_layouts_fail_closed(){
        let c = classifier();
        for q in [dixon(20.0,2004,date(2020,1,1)),dixon(13.0,4200,date(2020,1,1))] {
            match c.classify(&q) {
                Err(ConvertError::UnrecognizedDialect(found)) => assert_eq!(found,q),
                other => panic!("expected an unrecognized dialect, got {:?}",other)
            }
        }
        let mut q = dixon(12.0,4200,date(2020,1,1));
        q.flip_angle_dissolved = None;
        assert!(c.classify(&q).is_err());
    }

    #[test]
    fn calibration_layout(){
        let q = DialectQuery {kind:ScanKind::Calibration, flip_angle_dissolved:Some(20.0), total_count:520, scan_date:date(2021,1,1), filename:None};
        let d = classifier().classify(&q).unwrap();
        assert_eq!(d.contrast_label(499),ContrastLabel::Dissolved);
        assert_eq!(d.contrast_label(500),ContrastLabel::Gas);
        assert!(!d.is_balanced());
        let short = DialectQuery {total_count:20, ..q};
        assert!(classifier().classify(&short).is_err());
    }

    #[test]
    fn proton_layouts(){
        let q = |n| DialectQuery {kind:ScanKind::Proton, flip_angle_dissolved:None, total_count:n, scan_date:date(2021,1,1), filename:None};
        let d = classifier().classify(&q(4601)).unwrap();
        assert_eq!((d.retained_count,d.trajectory_frames),(4600,Some(4601)));
        let d = classifier().classify(&q(4630)).unwrap();
        assert_eq!((d.retained_count,d.trajectory_frames,d.discarded_count()),(4600,Some(4600),30));
        let d = classifier().classify(&q(1000)).unwrap();
        assert_eq!((d.retained_count,d.trajectory_frames),(1000,Some(1000)));
        assert_eq!(d.gradient_delay,GradientDelay::new(-5,-5,-5));
    }

    #[test]
    fn bandwidth_conventions(){
        let mut q = dixon(12.0,4200,date(2020,1,1));
        q.filename = Some(String::from("meas_MID00123_BW_dixon.dat"));
        let d = classifier().classify(&q).unwrap();
        assert_eq!(d.bandwidth,BandwidthConvention::HalfDwell);
        let bw = d.bandwidth.bandwidth(10.0,64);
        assert!((bw - 1562.5).abs() < 1e-9);
        assert!((BandwidthConvention::Standard.bandwidth(10.0,64) - 781.25).abs() < 1e-9);
    }
}
