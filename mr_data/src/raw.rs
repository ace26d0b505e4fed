use std::path::Path;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use num_complex::Complex;
use crate::cfl::{self, CflError};

/// Raw FIDs exactly as the scanner delivered them, one row per acquisition in scan order.
/// The samples are never modified once loaded.
#[derive(Clone,Debug)]
pub struct RawAcquisition {
    samples:Array2<Complex<f32>>,
}

impl RawAcquisition {

    pub fn new(samples:Array2<Complex<f32>>) -> Self {
        Self {
            samples
        }
    }

    pub fn from_cfl(cfl_base:&Path) -> Result<Self,CflError> {
        Ok(Self::new(cfl::read_cfl_2d(cfl_base)?))
    }

    pub fn n_acquisitions(&self) -> usize {
        self.samples.len_of(Axis(0))
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len_of(Axis(1))
    }

    pub fn samples(&self) -> ArrayView2<Complex<f32>> {
        self.samples.view()
    }

    pub fn acquisition(&self,index:usize) -> ArrayView1<Complex<f32>> {
        self.samples.row(index)
    }

    /// copy the listed rows into a new array, in the order given
    pub fn select(&self,indices:&[usize]) -> Array2<Complex<f32>> {
        self.samples.select(Axis(0),indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    #[test]
    fn select_copies_rows_in_order(){
        let raw = RawAcquisition::new(Array::from_shape_fn((5,2),|(i,j)| Complex::new(i as f32,j as f32)));
        assert_eq!(raw.n_acquisitions(),5);
        assert_eq!(raw.n_samples(),2);
        let picked = raw.select(&[4,0]);
        assert_eq!(picked[[0,0]].re,4.0);
        assert_eq!(picked[[1,1]],Complex::new(0.0,1.0));
    }
}
