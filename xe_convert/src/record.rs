//! The canonical acquisition record handed to the container writer. Scalars and label lists
//! go to a `key=value` headfile, arrays to `.cfl` pairs next to it.

use std::path::{Path, PathBuf};
use ndarray::{Array2, Array3};
use num_complex::Complex;
use tracing::info;
use headfile::headfile::{Headfile, HeadfileMap, ToHeadfile};
use mr_data::cfl;
use crate::dialect::GradientDelay;
use crate::error::{ConvertError, Result};
use crate::labels::{bonus_codes, contrast_codes, BonusSpectraLabel, ContrastLabel};
use crate::metadata::{AcquisitionMetadata, FlipAngles, RepetitionTime};
use crate::projection::ProjectionSet;

/// field names expected by the container writer
pub mod fields {
    pub const FIDS:&str = "fids";
    pub const FIDS_GAS:&str = "fids_gas";
    pub const FIDS_DIS:&str = "fids_dis";
    pub const TRAJ:&str = "traj";
    pub const TRAJ_GAS:&str = "traj_gas";
    pub const TRAJ_DIS:&str = "traj_dis";
    pub const CONTRAST_LABELS:&str = "contrast_labels";
    pub const BONUS_SPECTRA_LABELS:&str = "bonus_spectra_labels";
    pub const GRAD_DELAY_X:&str = "grad_delay_x";
    pub const GRAD_DELAY_Y:&str = "grad_delay_y";
    pub const GRAD_DELAY_Z:&str = "grad_delay_z";
    pub const SAMPLE_TIME:&str = "sample_time";
    pub const FREQ_CENTER:&str = "xe_center_frequency";
    pub const FREQ_EXCITATION:&str = "xe_dissolved_offset_frequency";
    pub const FA_GAS:&str = "fa_gas";
    pub const FA_DIS:&str = "fa_dis";
    pub const FA_PROTON:&str = "fa_proton";
    pub const TR_GAS:&str = "tr_gas";
    pub const TR_DIS:&str = "tr_dis";
    pub const TR_PROTON:&str = "tr_proton";
    pub const N_GAS_REMOVED:&str = "n_gas_removed";
    pub const N_DIS_REMOVED:&str = "n_dis_removed";
    pub const N_FRAMES:&str = "n_frames";
    pub const N_POINTS:&str = "n_points";
    pub const N_SKIP_START:&str = "n_skip_start";
    pub const N_SKIP_END:&str = "n_skip_end";
    pub const RAMP_TIME:&str = "ramp_time";
    pub const FOV:&str = "fov";
    pub const FIELD_STRENGTH:&str = "field_strength";
    pub const TE:&str = "te";
    pub const ORIENTATION:&str = "orientation";
    pub const PROTOCOL_NAME:&str = "protocol_name";
    pub const SOFTWARE_VERSION:&str = "software_version";
    pub const SCAN_DATE:&str = "scan_date";
    pub const SUBJECT_ID:&str = "subject_id";
    pub const SYSTEM_VENDOR:&str = "system_vendor";
    pub const INSTITUTION:&str = "institution";
    pub const SCAN_TYPE:&str = "scan_type";
    pub const BANDWIDTH:&str = "bandwidth";
    pub const REMOVEOS:&str = "removeos";
}

#[derive(Clone,Debug)]
pub struct CanonicalAcquisitionRecord {
    pub subject_id:String,
    pub scan_type:String,
    pub metadata:AcquisitionMetadata,
    /// retained acquisitions in scan order
    pub fids:Array2<Complex<f32>>,
    pub contrast_labels:Vec<ContrastLabel>,
    pub bonus_labels:Vec<BonusSpectraLabel>,
    /// one row per imaging acquisition; the bonus tail has no trajectory
    pub traj:Option<Array3<f64>>,
    /// per-phase projections after truncation and noise filtering
    pub gas:Option<ProjectionSet>,
    pub dissolved:Option<ProjectionSet>,
    pub gradient_delay:GradientDelay,
    pub n_frames:usize,
    pub n_gas_removed:usize,
    pub n_dis_removed:usize,
    pub n_skip_start:usize,
    pub n_skip_end:usize,
    pub bandwidth:Option<f64>,
}

impl CanonicalAcquisitionRecord {

    pub fn n_points(&self) -> usize {
        self.fids.ncols()
    }

    /// acquisitions outside the bonus tail
    pub fn n_imaging(&self) -> usize {
        self.bonus_labels.iter().filter(|b| **b == BonusSpectraLabel::NotBonus).count()
    }

    /// shape agreements every consumer relies on
    pub fn check_invariants(&self) -> Result<()> {
        let n = self.fids.nrows();
        let tail_start = self.bonus_labels.iter().position(|b| *b == BonusSpectraLabel::Bonus).unwrap_or(n);
        let bonus_is_tail = self.bonus_labels[tail_start.min(self.bonus_labels.len())..].iter().all(|b| *b == BonusSpectraLabel::Bonus);
        if self.contrast_labels.len() != n || self.bonus_labels.len() != n || !bonus_is_tail {
            let count = |c:ContrastLabel| self.contrast_labels.iter().filter(|l| **l == c).count();
            return Err(ConvertError::InconsistentAcquisitionCount {
                dialect:self.scan_type.clone(),
                total:n,
                gas:count(ContrastLabel::Gas),
                dissolved:count(ContrastLabel::Dissolved),
                proton:count(ContrastLabel::Proton),
                bonus:self.bonus_labels.iter().filter(|b| **b == BonusSpectraLabel::Bonus).count(),
                discarded:0,
            })
        }
        if let Some(traj) = &self.traj {
            let imaging = self.n_imaging();
            if traj.dim() != (imaging,self.n_points(),3) {
                return Err(ConvertError::TrajectoryShapeMismatch {
                    stage:"record",
                    expected:format!("[{}, {}, 3]",imaging,self.n_points()),
                    found:traj.shape().to_vec(),
                })
            }
        }
        Ok(())
    }

    fn array_base(output_base:&Path,field:&str) -> PathBuf {
        let stem = output_base.file_name().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        output_base.with_file_name(format!("{}_{}",stem,field))
    }

    /// Write `<base>.headfile` and one cfl pair per array. The headfile names each array file.
    pub fn write(&self,output_base:&Path) -> Result<PathBuf> {
        self.check_invariants()?;
        let mut hash = self.to_hash();

        let mut write_fids = |field:&str,data:&Array2<Complex<f32>>| -> Result<()> {
            let base = Self::array_base(output_base,field);
            cfl::write_cfl_2d(data,&base)?;
            hash.insert(field.to_string(),base.file_name().map(|s| s.to_string_lossy().to_string()).unwrap_or_default());
            Ok(())
        };
        write_fids(fields::FIDS,&self.fids)?;
        if let Some(gas) = &self.gas {
            write_fids(fields::FIDS_GAS,gas.data())?;
        }
        if let Some(dissolved) = &self.dissolved {
            write_fids(fields::FIDS_DIS,dissolved.data())?;
        }

        let mut write_traj = |field:&str,traj:&Array3<f64>| -> Result<()> {
            let base = Self::array_base(output_base,field);
            cfl::write_traj_cfl(traj,&base)?;
            hash.insert(field.to_string(),base.file_name().map(|s| s.to_string_lossy().to_string()).unwrap_or_default());
            Ok(())
        };
        if let Some(traj) = &self.traj {
            write_traj(fields::TRAJ,traj)?;
        }
        if let Some(gas) = &self.gas {
            write_traj(fields::TRAJ_GAS,gas.trajectory())?;
        }
        if let Some(dissolved) = &self.dissolved {
            write_traj(fields::TRAJ_DIS,dissolved.trajectory())?;
        }

        let path = output_base.with_extension("headfile");
        let hf = Headfile::new(&path).map_err(ConvertError::io(&path))?;
        hf.append(&hash).map_err(ConvertError::io(&path))?;
        info!("wrote {} record to {:?}",self.scan_type,path);
        Ok(path)
    }
}

impl ToHeadfile for CanonicalAcquisitionRecord {
    fn to_hash(&self) -> HeadfileMap {
        let m = &self.metadata;
        let mut h = HeadfileMap::new();
        let mut put = |k:&str,v:String| {h.insert(k.to_string(),v);};

        put(fields::SUBJECT_ID,self.subject_id.clone());
        put(fields::SCAN_TYPE,self.scan_type.clone());
        put(fields::SCAN_DATE,m.scan_date_string());
        put(fields::CONTRAST_LABELS,utils::vec_to_string(&contrast_codes(&self.contrast_labels)));
        put(fields::BONUS_SPECTRA_LABELS,utils::vec_to_string(&bonus_codes(&self.bonus_labels)));
        put(fields::GRAD_DELAY_X,self.gradient_delay.x.to_string());
        put(fields::GRAD_DELAY_Y,self.gradient_delay.y.to_string());
        put(fields::GRAD_DELAY_Z,self.gradient_delay.z.to_string());
        put(fields::SAMPLE_TIME,m.sample_time_us.to_string());
        put(fields::FREQ_CENTER,m.center_frequency_hz.to_string());
        if let Some(offset) = m.excitation {
            put(fields::FREQ_EXCITATION,offset.hertz(m.center_frequency_hz).to_string());
        }
        match m.flip_angles {
            FlipAngles::GasDissolved {gas,dissolved} => {
                put(fields::FA_GAS,gas.to_string());
                put(fields::FA_DIS,dissolved.to_string());
            }
            FlipAngles::Proton(fa) => put(fields::FA_PROTON,fa.to_string()),
        }
        match m.repetition_time {
            RepetitionTime::GasDissolved {gas,dissolved} => {
                put(fields::TR_GAS,gas.to_string());
                put(fields::TR_DIS,dissolved.to_string());
            }
            RepetitionTime::Proton(tr) => put(fields::TR_PROTON,tr.to_string()),
        }
        put(fields::N_GAS_REMOVED,self.n_gas_removed.to_string());
        put(fields::N_DIS_REMOVED,self.n_dis_removed.to_string());
        put(fields::N_FRAMES,self.n_frames.to_string());
        put(fields::N_POINTS,self.n_points().to_string());
        put(fields::N_SKIP_START,self.n_skip_start.to_string());
        put(fields::N_SKIP_END,self.n_skip_end.to_string());
        put(fields::RAMP_TIME,m.ramp_time_us.to_string());
        put(fields::FOV,m.fov_mm.to_string());
        put(fields::FIELD_STRENGTH,m.field_strength_t.to_string());
        put(fields::TE,m.te_s.to_string());
        put(fields::ORIENTATION,m.orientation.clone());
        put(fields::PROTOCOL_NAME,m.protocol_name.clone());
        put(fields::SOFTWARE_VERSION,m.software_version.clone());
        put(fields::SYSTEM_VENDOR,m.system_vendor.clone());
        put(fields::INSTITUTION,m.institution.clone());
        put(fields::REMOVEOS,m.remove_oversampling.to_string());
        if let Some(bw) = self.bandwidth {
            put(fields::BANDWIDTH,bw.to_string());
        }
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, PhysicsSettings};
    use crate::labels::ScanKind;
    use crate::metadata::{extract_metadata, tests::dixon_header};

    fn record() -> CanonicalAcquisitionRecord {
        let metadata = extract_metadata(&dixon_header("20220314","20"),ScanKind::Dixon,&PhysicsSettings::default()).unwrap();
        let n = 4;
        CanonicalAcquisitionRecord {
            subject_id:String::from("007-005B"),
            scan_type:String::from("normal"),
            metadata,
            fids:Array2::from_elem((n,8),Complex::new(1.0,-1.0)),
            contrast_labels:vec![ContrastLabel::Gas,ContrastLabel::Dissolved,ContrastLabel::Gas,ContrastLabel::Dissolved],
            bonus_labels:vec![BonusSpectraLabel::NotBonus;n],
            traj:Some(Array3::zeros((n,8,3))),
            gas:None,
            dissolved:None,
            gradient_delay:GradientDelay::new(0,-4,-3),
            n_frames:2,
            n_gas_removed:0,
            n_dis_removed:0,
            n_skip_start:0,
            n_skip_end:0,
            bandwidth:Some(781.25),
        }
    }

    #[test]
    fn headfile_fields(){
        let h = record().to_hash();
        assert_eq!(h[fields::CONTRAST_LABELS],"1 2 1 2");
        assert_eq!(h[fields::BONUS_SPECTRA_LABELS],"0 0 0 0");
        assert_eq!(h[fields::GRAD_DELAY_Y],"-4");
        assert_eq!(h[fields::FA_DIS],"20");
        assert_eq!(h[fields::SCAN_DATE],"2022-03-14");
        assert_eq!(h[fields::N_POINTS],"8");
        assert!(!h.contains_key(fields::FA_PROTON));
        let offset:f64 = h[fields::FREQ_EXCITATION].parse().unwrap();
        assert!((offset - 218.0*34092008.0*1e-6).abs() < 1e-6);
    }

    #[test]
    fn trajectory_must_follow_fids(){
        let mut r = record();
        r.traj = Some(Array3::zeros((3,8,3)));
        assert!(matches!(r.check_invariants(),Err(ConvertError::TrajectoryShapeMismatch {..})));
        let mut r = record();
        r.contrast_labels.pop();
        assert!(matches!(r.check_invariants(),Err(ConvertError::InconsistentAcquisitionCount {..})));
        let mut r = record();
        r.traj = None;
        r.bonus_labels[1] = BonusSpectraLabel::Bonus;
        assert!(r.check_invariants().is_err());
    }

    #[test]
    fn write_produces_headfile_and_arrays(){
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("subject_dixon");
        let path = record().write(&base).unwrap();
        let h = Headfile::existing(&path).unwrap().read().unwrap();
        assert_eq!(h[fields::FIDS],"subject_dixon_fids");
        assert_eq!(h[fields::TRAJ],"subject_dixon_traj");
        let fids = cfl::read_cfl_2d(&dir.path().join("subject_dixon_fids")).unwrap();
        assert_eq!(fids.dim(),(4,8));
        let traj = cfl::read_traj_cfl(&dir.path().join("subject_dixon_traj")).unwrap();
        assert_eq!(traj.dim(),(4,8,3));
    }
}
