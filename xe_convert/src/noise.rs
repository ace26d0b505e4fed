//! Rejection of corrupted radial projections. A projection is noisy when its tail carries a
//! spike comparable to the FID peak, or when its leading-edge amplitude is a robust outlier
//! in the population.

use ndarray::{s, Array2};
use num_complex::Complex;
use tracing::{debug, info};
use utils::MAD_TO_SIGMA;
use crate::config::NoiseFilterSettings;
use crate::error::{ConvertError, Result};
use crate::projection::ProjectionSet;

#[derive(Clone,Debug,PartialEq,Eq)]
pub struct NoiseReport {
    /// removed row indices, ascending, relative to the filtered input
    pub removed:Vec<usize>,
    pub n_projections:usize,
}

impl NoiseReport {
    pub fn n_removed(&self) -> usize {
        self.removed.len()
    }
}

fn leading_amplitude(row:ndarray::ArrayView1<Complex<f32>>,n:usize) -> f32 {
    let n = n.min(row.len());
    if n == 0 {
        return 0.0
    }
    row.slice(s![0..n]).iter().map(|c| c.norm()).sum::<f32>()/n as f32
}

fn tail_peak(row:ndarray::ArrayView1<Complex<f32>>,start:usize) -> Option<f32> {
    if start >= row.len() {
        return None
    }
    row.slice(s![start..]).iter().map(|c| c.norm()).reduce(f32::max)
}

/// indices of noisy rows, ascending
pub fn noisy_projections(data:&Array2<Complex<f32>>,settings:&NoiseFilterSettings) -> Vec<usize> {
    let leading:Vec<f32> = data.outer_iter().map(|r| leading_amplitude(r,settings.leading_points)).collect();
    let mean_leading = match utils::mean(&leading) {
        Some(m) => m,
        None => return vec![],
    };
    let center = utils::median(&leading).unwrap_or(0.0);
    let spread = utils::median_absolute_deviation(&leading).unwrap_or(0.0)*MAD_TO_SIGMA;
    let spike_level = settings.snr_threshold*mean_leading;

    data.outer_iter().enumerate().filter_map(|(i,row)|{
        let spike = tail_peak(row,settings.tail_start).map_or(false,|peak| peak > spike_level);
        let outlier = spread > 0.0 && (leading[i] - center).abs() > settings.mad_threshold*spread;
        if spike || outlier {
            debug!("projection {} flagged (spike={}, outlier={})",i,spike,outlier);
            Some(i)
        }else {
            None
        }
    }).collect()
}

/// Remove noisy projections from a phase. Flagging more than the allowed fraction is treated
/// as an upstream error and nothing is removed.
pub fn filter_noisy_projections(set:&ProjectionSet,settings:&NoiseFilterSettings,phase:&str) -> Result<(ProjectionSet,NoiseReport)> {
    let n = set.n_projections();
    let removed = noisy_projections(set.data(),settings);
    if n > 0 && removed.len() as f64/n as f64 > settings.max_noise_fraction {
        return Err(ConvertError::ExcessiveNoiseFraction {
            phase:phase.to_string(),
            flagged:removed.len(),
            total:n,
            bound:settings.max_noise_fraction,
        })
    }
    info!("{}: removing {} of {} projections",phase,removed.len(),n);
    let filtered = set.without(&removed);
    Ok((filtered,NoiseReport {removed, n_projections:n}))
}
