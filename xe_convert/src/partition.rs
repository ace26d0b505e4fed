use ndarray::Array2;
use num_complex::Complex;
use tracing::info;
use mr_data::raw::RawAcquisition;
use crate::dialect::DialectDescriptor;
use crate::error::{ConvertError, Result};
use crate::labels::{BonusSpectraLabel, ContrastLabel};

/// Acquisitions split by contrast. Every array is a fresh copy in scan order; `fids` keeps all
/// retained acquisitions, bonus tail included, for the record.
#[derive(Clone,Debug)]
pub struct PartitionedAcquisition {
    pub contrast_labels:Vec<ContrastLabel>,
    pub bonus_labels:Vec<BonusSpectraLabel>,
    pub fids:Array2<Complex<f32>>,
    pub gas:Array2<Complex<f32>>,
    pub dissolved:Array2<Complex<f32>>,
    pub proton:Array2<Complex<f32>>,
    pub bonus:Array2<Complex<f32>>,
    pub n_discarded:usize,
}

impl PartitionedAcquisition {
    pub fn n_gas(&self) -> usize {
        self.gas.nrows()
    }

    pub fn n_dissolved(&self) -> usize {
        self.dissolved.nrows()
    }

    pub fn n_proton(&self) -> usize {
        self.proton.nrows()
    }

    pub fn n_bonus(&self) -> usize {
        self.bonus.nrows()
    }
}

#[derive(Default)]
struct Indices {
    gas:Vec<usize>,
    dissolved:Vec<usize>,
    proton:Vec<usize>,
    bonus:Vec<usize>,
}

pub fn partition(raw:&RawAcquisition,dialect:&DialectDescriptor) -> Result<PartitionedAcquisition> {
    let total = raw.n_acquisitions();
    let inconsistent = |idx:&Indices,discarded:usize| ConvertError::InconsistentAcquisitionCount {
        dialect:dialect.name.to_string(),
        total,
        gas:idx.gas.len(),
        dissolved:idx.dissolved.len(),
        proton:idx.proton.len(),
        bonus:idx.bonus.len(),
        discarded,
    };

    let mut idx = Indices::default();
    if total != dialect.expected_total_count || dialect.retained_count > total {
        return Err(inconsistent(&idx,0))
    }

    let retained = dialect.retained_count;
    let mut contrast_labels = Vec::with_capacity(retained);
    let mut bonus_labels = Vec::with_capacity(retained);
    for i in 0..retained {
        let contrast = dialect.contrast_label(i);
        let bonus = dialect.bonus_label(i);
        match (bonus,contrast) {
            (BonusSpectraLabel::Bonus,_) => idx.bonus.push(i),
            (_,ContrastLabel::Gas) => idx.gas.push(i),
            (_,ContrastLabel::Dissolved) => idx.dissolved.push(i),
            (_,ContrastLabel::Proton) => idx.proton.push(i),
        }
        contrast_labels.push(contrast);
        bonus_labels.push(bonus);
    }

    let discarded = total - retained;
    let counted = idx.gas.len() + idx.dissolved.len() + idx.proton.len() + idx.bonus.len() + discarded;
    if counted != total
        || idx.bonus.len() != dialect.bonus_sample_count()
        || (dialect.is_balanced() && idx.gas.len() != idx.dissolved.len()) {
        return Err(inconsistent(&idx,discarded))
    }

    info!("{}: gas={} dissolved={} proton={} bonus={} discarded={}",
        dialect.name,idx.gas.len(),idx.dissolved.len(),idx.proton.len(),idx.bonus.len(),discarded);

    let all:Vec<usize> = (0..retained).collect();
    Ok(PartitionedAcquisition {
        contrast_labels,
        bonus_labels,
        fids:raw.select(&all),
        gas:raw.select(&idx.gas),
        dissolved:raw.select(&idx.dissolved),
        proton:raw.select(&idx.proton),
        bonus:raw.select(&idx.bonus),
        n_discarded:discarded,
    })
}
