//! Scan conversion: metadata, dialect, partition, trajectory, scaling, per-phase cleanup and
//! the final record. Each stage takes its inputs by reference and allocates its outputs, so
//! one `Converter` can serve any number of scans.

use std::path::{Path, PathBuf};
use ndarray::{s, Array3};
use tracing::info;
use mr_data::raw::RawAcquisition;
use crate::config::ConvertSettings;
use crate::dialect::{DialectClassifier, DialectDescriptor, DialectQuery};
use crate::error::{ConvertError, Result};
use crate::interleave::{interleave_fids, interleaved_trajectory, validate_external};
use crate::labels::ScanKind;
use crate::metadata::{extract_metadata, AcquisitionMetadata, HeaderFields};
use crate::noise::filter_noisy_projections;
use crate::partition::partition;
use crate::projection::ProjectionSet;
use crate::record::CanonicalAcquisitionRecord;
use crate::scaling::{normalize_fids, scale_trajectory, scaling_factor};
use crate::trajectory::{generate_trajectory, RadialTiming, TrajectoryParams, TrajectoryShape};

/// what the raw-file reader hands over for one scan
#[derive(Clone,Debug)]
pub struct ScanInput {
    pub header:HeaderFields,
    pub raw:RawAcquisition,
    /// scanner file name, some dialects are only told apart by it
    pub filename:Option<String>,
}

#[derive(Clone,Debug,Default)]
pub struct DixonOptions {
    /// (n_frames, n_points, 3) trajectory used instead of generating one
    pub external_trajectory:Option<Array3<f64>>,
    /// one divisor per dissolved-phase acquisition
    pub dissolved_normalization:Option<Vec<f32>>,
}

#[derive(Clone,Debug,Default)]
pub struct SubjectScans {
    pub dixon:Option<(ScanInput,DixonOptions)>,
    pub calibration:Option<ScanInput>,
    pub proton:Option<ScanInput>,
}

#[derive(Clone,Debug,Default)]
pub struct SubjectRecords {
    pub dixon:Option<CanonicalAcquisitionRecord>,
    pub calibration:Option<CanonicalAcquisitionRecord>,
    pub proton:Option<CanonicalAcquisitionRecord>,
    /// shared by every trajectory of the subject
    pub scaling_factor:Option<f64>,
}

impl SubjectRecords {
    /// write `<subject>_<scan>.headfile` (plus arrays) for every converted scan
    pub fn write_all(&self,output_dir:&Path,subject_id:&str) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(output_dir).map_err(ConvertError::io(output_dir))?;
        let scans = [
            (ScanKind::Dixon,&self.dixon),
            (ScanKind::Calibration,&self.calibration),
            (ScanKind::Proton,&self.proton),
        ];
        let mut written = vec![];
        for (kind,record) in scans {
            if let Some(record) = record {
                let base = output_dir.join(format!("{}_{}",subject_id,kind));
                written.push(record.write(&base)?);
            }
        }
        Ok(written)
    }
}

pub struct Converter {
    settings:ConvertSettings,
    classifier:DialectClassifier,
}

impl Converter {

    pub fn new(settings:ConvertSettings) -> Result<Self> {
        settings.validate()?;
        let classifier = DialectClassifier::standard(&settings.physics);
        Ok(Self {settings,classifier})
    }

    pub fn settings(&self) -> &ConvertSettings {
        &self.settings
    }

    pub fn classifier(&self) -> &DialectClassifier {
        &self.classifier
    }

    /// trajectory scale for a subject whose reference scan has `n_points` samples
    pub fn scaling_factor(&self,n_points:usize) -> f64 {
        scaling_factor(self.settings.recon.recon_size,n_points,self.settings.recon.scale_trajectory)
    }

    fn classify(&self,kind:ScanKind,metadata:&AcquisitionMetadata,input:&ScanInput) -> Result<DialectDescriptor> {
        let query = DialectQuery {
            kind,
            flip_angle_dissolved:metadata.flip_angles.dissolved(),
            total_count:input.raw.n_acquisitions(),
            scan_date:metadata.scan_date,
            filename:input.filename.clone(),
        };
        self.classifier.classify(&query)
    }

    fn trajectory_params(&self,metadata:&AcquisitionMetadata,dialect:&DialectDescriptor,n_frames:usize,n_points:usize) -> TrajectoryParams {
        TrajectoryParams {
            timing:RadialTiming {
                dwell_time_us:metadata.sample_time_us,
                ramp_time_us:metadata.ramp_time_us,
                plateau_time_us:self.settings.trajectory.plateau_time_us,
                decay_time_us:self.settings.trajectory.decay_time_us,
                n_points,
            },
            delay:dialect.gradient_delay,
            n_frames,
            traj_type:self.settings.trajectory.traj_type,
        }
    }

    fn generated_shape(&self,metadata:&AcquisitionMetadata,dialect:&DialectDescriptor,n_frames:usize,n_points:usize) -> Result<TrajectoryShape> {
        if !self.settings.trajectory.generate {
            return Err(ConvertError::InvalidConfig(format!(
                "trajectory generation is disabled and no trajectory was supplied for the {} scan",dialect.kind
            )))
        }
        Ok(generate_trajectory(&self.trajectory_params(metadata,dialect,n_frames,n_points)))
    }

    /// truncate then optionally filter one phase, returning the kept set and the removed count
    fn clean_phase(&self,set:ProjectionSet,phase:&str) -> Result<(ProjectionSet,usize)> {
        let t = &self.settings.truncation;
        let truncated = set.truncate(t.n_skip_start,t.n_skip_end)?;
        if !self.settings.noise.enabled {
            return Ok((truncated,0))
        }
        let (filtered,report) = filter_noisy_projections(&truncated,&self.settings.noise,phase)?;
        Ok((filtered,report.n_removed()))
    }

    pub fn convert_dixon(&self,input:&ScanInput,options:&DixonOptions) -> Result<CanonicalAcquisitionRecord> {
        let metadata = extract_metadata(&input.header,ScanKind::Dixon,&self.settings.physics)?;
        let dialect = self.classify(ScanKind::Dixon,&metadata,input)?;
        let parts = partition(&input.raw,&dialect)?;
        let n_points = input.raw.n_samples();
        let n_frames = dialect.trajectory_frames.unwrap_or_else(|| parts.n_gas());

        let phase_traj = match &options.external_trajectory {
            Some(traj) => {
                validate_external(traj,n_frames,n_points)?;
                info!("using supplied trajectory for {} frames",n_frames);
                traj.clone()
            }
            None => self.generated_shape(&metadata,&dialect,n_frames,n_points)?.stack(),
        };
        let factor = self.scaling_factor(n_points);
        let phase_traj = scale_trajectory(&phase_traj,factor);
        let shared = TrajectoryShape {
            x:phase_traj.slice(s![..,..,0]).to_owned(),
            y:phase_traj.slice(s![..,..,1]).to_owned(),
            z:phase_traj.slice(s![..,..,2]).to_owned(),
        };
        let traj = interleaved_trajectory(&shared);

        let dissolved = match &options.dissolved_normalization {
            Some(norm) => normalize_fids(&parts.dissolved,norm)?,
            None => parts.dissolved.clone(),
        };
        let imaging = interleave_fids(&parts.gas,&dissolved)?;
        let mut fids = parts.fids.clone();
        fids.slice_mut(s![0..imaging.nrows(),..]).assign(&imaging);

        let (gas,n_gas_removed) = self.clean_phase(ProjectionSet::new(parts.gas.clone(),phase_traj.clone())?,"gas")?;
        let (dissolved,n_dis_removed) = self.clean_phase(ProjectionSet::new(dissolved,phase_traj)?,"dissolved")?;

        let record = CanonicalAcquisitionRecord {
            subject_id:self.settings.subject_id.clone(),
            scan_type:dialect.scan_type(),
            bandwidth:Some(dialect.bandwidth.bandwidth(metadata.sample_time_us,n_points)),
            metadata,
            fids,
            contrast_labels:parts.contrast_labels,
            bonus_labels:parts.bonus_labels,
            traj:Some(traj),
            gas:Some(gas),
            dissolved:Some(dissolved),
            gradient_delay:dialect.gradient_delay,
            n_frames,
            n_gas_removed,
            n_dis_removed,
            n_skip_start:self.settings.truncation.n_skip_start,
            n_skip_end:self.settings.truncation.n_skip_end,
        };
        record.check_invariants()?;
        Ok(record)
    }

    pub fn convert_calibration(&self,input:&ScanInput) -> Result<CanonicalAcquisitionRecord> {
        let metadata = extract_metadata(&input.header,ScanKind::Calibration,&self.settings.physics)?;
        let dialect = self.classify(ScanKind::Calibration,&metadata,input)?;
        let parts = partition(&input.raw,&dialect)?;
        let record = CanonicalAcquisitionRecord {
            subject_id:self.settings.subject_id.clone(),
            scan_type:dialect.scan_type(),
            metadata,
            n_frames:parts.fids.nrows(),
            fids:parts.fids,
            contrast_labels:parts.contrast_labels,
            bonus_labels:parts.bonus_labels,
            traj:None,
            gas:None,
            dissolved:None,
            gradient_delay:dialect.gradient_delay,
            n_gas_removed:0,
            n_dis_removed:0,
            n_skip_start:0,
            n_skip_end:0,
            bandwidth:None,
        };
        record.check_invariants()?;
        Ok(record)
    }

    /// `scaling_factor` comes from the subject's dixon scan so both trajectories share a scale
    pub fn convert_proton(&self,input:&ScanInput,scaling_factor:f64) -> Result<CanonicalAcquisitionRecord> {
        let metadata = extract_metadata(&input.header,ScanKind::Proton,&self.settings.physics)?;
        let dialect = self.classify(ScanKind::Proton,&metadata,input)?;
        let parts = partition(&input.raw,&dialect)?;
        let n_points = input.raw.n_samples();
        let n_frames = dialect.trajectory_frames.unwrap_or(dialect.retained_count);
        // extra frames are generated so the directions match the scanner, then dropped
        let shape = self.generated_shape(&metadata,&dialect,n_frames,n_points)?.head(dialect.retained_count);
        let traj = scale_trajectory(&shape.stack(),scaling_factor);
        let record = CanonicalAcquisitionRecord {
            subject_id:self.settings.subject_id.clone(),
            scan_type:dialect.scan_type(),
            metadata,
            fids:parts.fids,
            contrast_labels:parts.contrast_labels,
            bonus_labels:parts.bonus_labels,
            traj:Some(traj),
            gas:None,
            dissolved:None,
            gradient_delay:dialect.gradient_delay,
            n_frames,
            n_gas_removed:0,
            n_dis_removed:0,
            n_skip_start:0,
            n_skip_end:0,
            bandwidth:None,
        };
        record.check_invariants()?;
        Ok(record)
    }

    /// Convert every scan a subject has. Any failing scan fails the subject.
    pub fn convert_subject(&self,scans:&SubjectScans) -> Result<SubjectRecords> {
        if scans.dixon.is_none() && scans.calibration.is_none() && scans.proton.is_none() {
            return Err(ConvertError::NoScans(self.settings.subject_id.clone()))
        }
        let mut records = SubjectRecords::default();

        match &scans.dixon {
            Some((input,options)) => {
                records.dixon = Some(self.convert_dixon(input,options)?);
                records.scaling_factor = Some(self.scaling_factor(input.raw.n_samples()));
            }
            None => info!("no dixon scan for {}",self.settings.subject_id),
        }
        match &scans.calibration {
            Some(input) => records.calibration = Some(self.convert_calibration(input)?),
            None => info!("no calibration scan for {}",self.settings.subject_id),
        }
        match &scans.proton {
            Some(input) => {
                let factor = records.scaling_factor.unwrap_or_else(|| self.scaling_factor(input.raw.n_samples()));
                records.scaling_factor = Some(factor);
                records.proton = Some(self.convert_proton(input,factor)?);
            }
            None => info!("no proton scan for {}",self.settings.subject_id),
        }
        Ok(records)
    }
}
