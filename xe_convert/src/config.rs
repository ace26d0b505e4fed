use std::path::Path;
use serde::{Deserialize, Serialize};
use toml;
use crate::error::{ConvertError, Result};
use crate::trajectory::TrajType;

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct ReconSettings {
    /// edge length of the reconstructed image matrix
    pub recon_size:usize,
    pub matrix_size:usize,
    pub scale_trajectory:bool,
}

impl Config for ReconSettings {
    fn default() -> Self {
        Self {
            recon_size: 64,
            matrix_size: 128,
            scale_trajectory: true,
        }
    }
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct TrajectorySettings {
    pub generate:bool,
    pub traj_type:TrajType,
    pub plateau_time_us:f64,
    pub decay_time_us:f64,
}

impl Config for TrajectorySettings {
    fn default() -> Self {
        Self {
            generate: true,
            traj_type: TrajType::HaltonSpiral,
            plateau_time_us: 2500.0,
            decay_time_us: 60.0,
        }
    }
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct NoiseFilterSettings {
    pub enabled:bool,
    /// number of samples at the start of each FID averaged into its leading-edge amplitude
    pub leading_points:usize,
    /// first sample of the tail searched for spikes
    pub tail_start:usize,
    /// a tail sample larger than this fraction of the mean leading-edge amplitude is a spike
    pub snr_threshold:f32,
    /// leading-edge amplitudes further than this many robust standard deviations from the
    /// median are outliers
    pub mad_threshold:f32,
    /// flagging more than this fraction of projections is treated as a classification error
    pub max_noise_fraction:f64,
}

impl Config for NoiseFilterSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            leading_points: 5,
            tail_start: 10,
            snr_threshold: 0.7,
            mad_threshold: 5.0,
            max_noise_fraction: 0.25,
        }
    }
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct TruncationSettings {
    pub n_skip_start:usize,
    pub n_skip_end:usize,
}

impl Config for TruncationSettings {
    fn default() -> Self {
        Self {
            n_skip_start: 0,
            n_skip_end: 0,
        }
    }
}

/// fixed physical and protocol constants
#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct PhysicsSettings {
    /// 129Xe gyromagnetic ratio
    pub gyromagnetic_ratio_mhz_per_t:f64,
    /// gas-phase FIDs closing a calibration scan
    pub calibration_gas_fids:usize,
    pub proton_gradient_delay:[i32;3],
    pub min_ramp_time_us:f64,
}

impl Config for PhysicsSettings {
    fn default() -> Self {
        Self {
            gyromagnetic_ratio_mhz_per_t: 11.777,
            calibration_gas_fids: 20,
            proton_gradient_delay: [-5,-5,-5],
            min_ramp_time_us: 100.0,
        }
    }
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct ConvertSettings {
    pub subject_id:String,
    pub recon:ReconSettings,
    pub trajectory:TrajectorySettings,
    pub noise:NoiseFilterSettings,
    pub truncation:TruncationSettings,
    pub physics:PhysicsSettings,
}

impl Config for ConvertSettings {
    fn default() -> Self {
        Self {
            subject_id: String::from("test"),
            recon: ReconSettings::default(),
            trajectory: TrajectorySettings::default(),
            noise: NoiseFilterSettings::default(),
            truncation: TruncationSettings::default(),
            physics: PhysicsSettings::default(),
        }
    }
}

impl ConvertSettings {
    /// reject settings that would make a stage divide by zero or accept nonsense bounds
    pub fn validate(&self) -> Result<()> {
        if self.recon.recon_size == 0 {
            return Err(ConvertError::InvalidConfig(String::from("recon.recon_size must be positive")))
        }
        if !(0.0..=1.0).contains(&self.noise.max_noise_fraction) {
            return Err(ConvertError::InvalidConfig(format!("noise.max_noise_fraction must be within [0,1], found {}",self.noise.max_noise_fraction)))
        }
        if self.noise.leading_points == 0 {
            return Err(ConvertError::InvalidConfig(String::from("noise.leading_points must be positive")))
        }
        if self.trajectory.plateau_time_us < 0.0 || self.trajectory.decay_time_us < 0.0 {
            return Err(ConvertError::InvalidConfig(String::from("trajectory timings cannot be negative")))
        }
        if self.physics.gyromagnetic_ratio_mhz_per_t <= 0.0 {
            return Err(ConvertError::InvalidConfig(String::from("physics.gyromagnetic_ratio_mhz_per_t must be positive")))
        }
        Ok(())
    }
}

impl ConfigFile for ConvertSettings {

    fn to_file(&self, filename: &Path) -> Result<()> {
        let t = toml::to_string_pretty(&self)?;
        let path = filename.with_extension(Self::file_ext());
        utils::write_to_file(filename,&Self::file_ext(),&t).map_err(ConvertError::io(&path))
    }

    fn from_file(filename: &Path) -> Result<Self> {
        let path = filename.with_extension(Self::file_ext());
        let t = utils::read_to_string(filename,&Self::file_ext()).map_err(ConvertError::io(&path))?;
        let settings:Self = toml::from_str(&t).map_err(|source| ConvertError::ConfigParse {path:path.clone(),source})?;
        settings.validate()?;
        Ok(settings)
    }

    fn file_ext() -> String {
        String::from("toml")
    }

}

pub trait Config {
    fn default() -> Self;
}

pub trait ConfigFile: Sized {
    fn to_file(&self, filename:&Path) -> Result<()>;
    fn from_file(filename:&Path) -> Result<Self>;
    fn file_ext() -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_round_trip_through_toml(){
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subject");
        let mut settings = ConvertSettings::default();
        settings.subject_id = String::from("007-005B");
        settings.noise.enabled = true;
        settings.to_file(&path).unwrap();
        let back = ConvertSettings::from_file(&path).unwrap();
        assert_eq!(back,settings);
        let text = std::fs::read_to_string(path.with_extension("toml")).unwrap();
        assert!(text.contains("haltonspiral"));
    }

    #[test]
    fn zero_recon_size_is_rejected(){
        let mut settings = ConvertSettings::default();
        settings.recon.recon_size = 0;
        assert!(matches!(settings.validate(),Err(ConvertError::InvalidConfig(_))));
    }

    #[test]
    fn corrupt_settings_name_the_file(){
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken");
        std::fs::write(path.with_extension("toml"),"subject_id = 3").unwrap();
        match ConvertSettings::from_file(&path) {
            Err(ConvertError::ConfigParse {path:p,..}) => assert_eq!(p,path.with_extension("toml")),
            other => panic!("expected a parse error, got {:?}",other)
        }
    }
}
