use ndarray::{Array2, Array3, Axis};
use num_complex::Complex;
use crate::error::{ConvertError, Result};

/// Common k-space scale for every trajectory of a subject. Scaled trajectories put the edge of
/// the sampled sphere at the edge of a `recon_size` matrix.
pub fn scaling_factor(recon_size:usize,n_points:usize,scale:bool) -> f64 {
    match scale {
        true => n_points as f64/recon_size as f64,
        false => 1.0,
    }
}

pub fn scale_trajectory(trajectory:&Array3<f64>,factor:f64) -> Array3<f64> {
    trajectory*factor
}

/// divide every FID by its own normalization value
pub fn normalize_fids(data:&Array2<Complex<f32>>,normalization:&[f32]) -> Result<Array2<Complex<f32>>> {
    if normalization.len() != data.nrows() {
        return Err(ConvertError::InvalidNormalization(format!(
            "{} normalization values for {} acquisitions",normalization.len(),data.nrows()
        )))
    }
    if let Some((i,v)) = normalization.iter().enumerate().find(|(_,v)| **v == 0.0 || !v.is_finite()) {
        return Err(ConvertError::InvalidNormalization(format!("entry {} is {}",i,v)))
    }
    let mut out = data.to_owned();
    for (mut row,n) in out.axis_iter_mut(Axis(0)).zip(normalization) {
        row.mapv_inplace(|c| c/ *n);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factor_follows_matrix_size(){
        assert_eq!(scaling_factor(64,64,true),1.0);
        assert_eq!(scaling_factor(128,64,true),0.5);
        assert_eq!(scaling_factor(128,64,false),1.0);
    }

    #[test]
    fn normalization_divides_rows(){
        let data = Array2::from_elem((2,3),Complex::new(4.0f32,2.0));
        let out = normalize_fids(&data,&[2.0,4.0]).unwrap();
        assert_eq!(out[[0,2]],Complex::new(2.0,1.0));
        assert_eq!(out[[1,0]],Complex::new(1.0,0.5));
    }

    #[test]
    fn bad_normalization_is_fatal(){
        let data = Array2::from_elem((2,3),Complex::new(1.0f32,0.0));
        assert!(matches!(normalize_fids(&data,&[1.0,0.0]),Err(ConvertError::InvalidNormalization(_))));
        assert!(matches!(normalize_fids(&data,&[1.0,f32::NAN]),Err(ConvertError::InvalidNormalization(_))));
        assert!(matches!(normalize_fids(&data,&[1.0]),Err(ConvertError::InvalidNormalization(_))));
    }
}
