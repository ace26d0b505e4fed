use ndarray::{Array, Array2, Array3, ArrayView, Axis, RemoveAxis};
use num_complex::Complex;
use crate::error::{ConvertError, Result};
use crate::trajectory::TrajectoryShape;

/// rows of `gas` on even indices, rows of `dissolved` on odd indices
fn interleave_rows<A,D>(stage:&'static str,gas:ArrayView<A,D>,dissolved:ArrayView<A,D>) -> Result<Array<A,D>>
where
    A:Clone + Default,
    D:RemoveAxis,
{
    if gas.shape() != dissolved.shape() {
        return Err(ConvertError::TrajectoryShapeMismatch {
            stage,
            expected:format!("{:?}",gas.shape()),
            found:dissolved.shape().to_vec(),
        })
    }
    let n = gas.len_of(Axis(0));
    let mut dim = gas.raw_dim();
    dim[0] = 2*n;
    let mut out = Array::<A,D>::default(dim);
    for (i,(g,d)) in gas.outer_iter().zip(dissolved.outer_iter()).enumerate() {
        out.index_axis_mut(Axis(0),2*i).assign(&g);
        out.index_axis_mut(Axis(0),2*i+1).assign(&d);
    }
    Ok(out)
}

/// FIDs in acquisition order of an alternating scan
pub fn interleave_fids(gas:&Array2<Complex<f32>>,dissolved:&Array2<Complex<f32>>) -> Result<Array2<Complex<f32>>> {
    interleave_rows("interleave",gas.view(),dissolved.view())
}

pub fn interleave_trajectories(gas:&Array3<f64>,dissolved:&Array3<f64>) -> Result<Array3<f64>> {
    interleave_rows("interleave",gas.view(),dissolved.view())
}

/// Both phases of an interleaved scan share one radial geometry, so the generated shape
/// is used for both: (n, p, 3) becomes (2n, p, 3).
pub fn interleaved_trajectory(shape:&TrajectoryShape) -> Array3<f64> {
    let stacked = shape.stack();
    let (n,p,_) = stacked.dim();
    let mut out = Array3::<f64>::zeros((2*n,p,3));
    for (i,frame) in stacked.outer_iter().enumerate() {
        out.index_axis_mut(Axis(0),2*i).assign(&frame);
        out.index_axis_mut(Axis(0),2*i+1).assign(&frame);
    }
    out
}

/// An imported trajectory replaces generation only if it has one (x, y, z) row per
/// acquisition and one coordinate per sample.
pub fn validate_external(trajectory:&Array3<f64>,n_frames:usize,n_points:usize) -> Result<()> {
    let found = trajectory.shape();
    if found != [n_frames,n_points,3] {
        return Err(ConvertError::TrajectoryShapeMismatch {
            stage:"external trajectory",
            expected:format!("[{}, {}, 3]",n_frames,n_points),
            found:found.to_vec(),
        })
    }
    if trajectory.iter().any(|v| !v.is_finite()) {
        return Err(ConvertError::TrajectoryShapeMismatch {
            stage:"external trajectory (non-finite coordinates)",
            expected:format!("[{}, {}, 3]",n_frames,n_points),
            found:found.to_vec(),
        })
    }
    Ok(())
}
