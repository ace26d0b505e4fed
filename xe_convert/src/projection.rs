use ndarray::{s, Array2, Array3, Axis};
use num_complex::Complex;
use crate::error::{ConvertError, Result};

/// FIDs paired row for row with their trajectory. Every operation removes the same rows from
/// both, so the leading dimensions always agree.
#[derive(Clone,Debug,PartialEq)]
pub struct ProjectionSet {
    data:Array2<Complex<f32>>,
    trajectory:Array3<f64>,
}

impl ProjectionSet {
    pub fn new(data:Array2<Complex<f32>>,trajectory:Array3<f64>) -> Result<Self> {
        let (n,p) = data.dim();
        let t = trajectory.dim();
        if t != (n,p,3) {
            return Err(ConvertError::TrajectoryShapeMismatch {
                stage:"projection pairing",
                expected:format!("[{}, {}, 3]",n,p),
                found:trajectory.shape().to_vec(),
            })
        }
        Ok(Self {data,trajectory})
    }

    pub fn n_projections(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_points(&self) -> usize {
        self.data.ncols()
    }

    pub fn data(&self) -> &Array2<Complex<f32>> {
        &self.data
    }

    pub fn trajectory(&self) -> &Array3<f64> {
        &self.trajectory
    }

    pub fn into_parts(self) -> (Array2<Complex<f32>>,Array3<f64>) {
        (self.data,self.trajectory)
    }

    /// drop the first `skip_start` and last `skip_end` projections
    pub fn truncate(&self,skip_start:usize,skip_end:usize) -> Result<Self> {
        let n = self.n_projections();
        if skip_start + skip_end > n {
            return Err(ConvertError::InvalidTruncation {skip_start,skip_end,n_projections:n})
        }
        let end = n - skip_end;
        Ok(Self {
            data:self.data.slice(s![skip_start..end,..]).to_owned(),
            trajectory:self.trajectory.slice(s![skip_start..end,..,..]).to_owned(),
        })
    }

    /// copy of the set without the listed rows; indices must be sorted and in range
    pub fn without(&self,removed:&[usize]) -> Self {
        let keep:Vec<usize> = (0..self.n_projections()).filter(|i| removed.binary_search(i).is_err()).collect();
        Self {
            data:self.data.select(Axis(0),&keep),
            trajectory:self.trajectory.select(Axis(0),&keep),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n:usize,p:usize) -> ProjectionSet {
        let data = Array2::from_shape_fn((n,p),|(i,_)| Complex::new(i as f32,0.0));
        let traj = Array3::from_shape_fn((n,p,3),|(i,_,_)| i as f64);
        ProjectionSet::new(data,traj).unwrap()
    }

    #[test]
    fn pairing_requires_matching_shapes(){
        let data = Array2::<Complex<f32>>::zeros((4,8));
        assert!(ProjectionSet::new(data.clone(),Array3::zeros((4,8,3))).is_ok());
        assert!(ProjectionSet::new(data,Array3::zeros((5,8,3))).is_err());
    }

    #[test]
    fn truncate_removes_both_ends(){
        let t = numbered(10,3).truncate(2,3).unwrap();
        assert_eq!(t.n_projections(),5);
        assert_eq!(t.data()[[0,0]].re,2.0);
        assert_eq!(t.trajectory()[[4,0,0]],6.0);
        assert_eq!(numbered(10,3).truncate(0,0).unwrap(),numbered(10,3));
        assert_eq!(numbered(10,3).truncate(4,6).unwrap().n_projections(),0);
        assert!(matches!(numbered(10,3).truncate(6,5),Err(ConvertError::InvalidTruncation {..})));
    }

    #[test]
    fn without_keeps_order(){
        let t = numbered(6,2).without(&[1,4]);
        let rows:Vec<f32> = t.data().column(0).iter().map(|c| c.re).collect();
        assert_eq!(rows,vec![0.0,2.0,3.0,5.0]);
        assert_eq!(t.trajectory().dim(),(4,2,3));
    }
}
