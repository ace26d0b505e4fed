//! Radial 3D k-space trajectories. A trajectory is the product of a per-frame unit direction
//! and a per-sample radial distance that accounts for the gradient ramp, plateau and decay.

use std::f64::consts::PI;
use ndarray::{s, Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// seed for the shuffled spiral ordering; fixed so trajectories are reproducible
const SPIRAL_RANDOM_SEED:u64 = 0x5E_1D_C0DE;
const GOLDEN_MEAN_1:f64 = 0.4656;
const GOLDEN_MEAN_2:f64 = 0.6823;

/// ordering of radial projection directions over the sphere
#[derive(Clone,Copy,Debug,PartialEq,Eq,Serialize,Deserialize)]
#[serde(rename_all="lowercase")]
pub enum TrajType {
    Spiral,
    Halton,
    HaltonSpiral,
    SpiralRandom,
    Archimedean,
    GoldenMean,
}

/// per-axis timing correction in dwell-time units, specific to scanner hardware
#[derive(Clone,Copy,Debug,PartialEq,Eq,Hash,Serialize,Deserialize)]
pub struct GradientDelay {
    pub x:i32,
    pub y:i32,
    pub z:i32,
}

impl GradientDelay {
    pub const fn new(x:i32,y:i32,z:i32) -> Self {
        Self {x,y,z}
    }

    pub const ZERO:GradientDelay = GradientDelay::new(0,0,0);

    pub fn as_array(&self) -> [i32;3] {
        [self.x,self.y,self.z]
    }
}

impl From<[i32;3]> for GradientDelay {
    fn from(d:[i32;3]) -> Self {
        Self::new(d[0],d[1],d[2])
    }
}

/// readout gradient timing, all times in microseconds
#[derive(Clone,Copy,Debug,PartialEq)]
pub struct RadialTiming {
    pub dwell_time_us:f64,
    pub ramp_time_us:f64,
    pub plateau_time_us:f64,
    pub decay_time_us:f64,
    pub n_points:usize,
}

/// Radial k-space distance of every sample, normalized by the number of samples.
///
/// Samples before the gradient starts sit at the center. During the ramp the distance grows
/// quadratically, linearly on the plateau, and the decay adds the area of the falling edge.
/// Samples past the end of the decay keep the final distance.
pub fn radial_distance(timing:&RadialTiming,delay_us:f64) -> Vec<f64> {
    let dwell = timing.dwell_time_us;
    let delay_npts = delay_us/dwell;
    let ramp_npts = timing.ramp_time_us/dwell;
    let plat_npts = timing.plateau_time_us/dwell;
    let decay_npts = timing.decay_time_us/dwell;

    let ramp_start = delay_npts;
    let plat_start = ramp_start + ramp_npts;
    let decay_start = plat_start + plat_npts;
    let decay_end = decay_start + decay_npts;

    let npts = timing.n_points as f64;
    (0..timing.n_points).map(|i|{
        let p = i as f64;
        let dist = if p < ramp_start {
            0.0
        }else if p < plat_start {
            let t = p - ramp_start;
            0.5*t*(t/ramp_npts)
        }else if p < decay_start {
            0.5*ramp_npts + (p - plat_start)
        }else if p < decay_end {
            let t = p - decay_start;
            0.5*ramp_npts + plat_npts + 0.5*t*(1.0 + (1.0 - t/decay_npts))
        }else {
            0.5*ramp_npts + plat_npts + 0.5*decay_npts
        };
        dist/npts
    }).collect()
}

/// radical inverse of `index` in `base`
pub fn halton(mut index:usize,base:usize) -> f64 {
    let mut f = 1.0;
    let mut r = 0.0;
    while index > 0 {
        f /= base as f64;
        r += f*(index % base) as f64;
        index /= base;
    }
    r
}

fn direction(z:f64,phi:f64) -> [f64;3] {
    let z = z.clamp(-1.0,1.0);
    let rho = (1.0 - z*z).max(0.0).sqrt();
    [rho*phi.cos(),rho*phi.sin(),z]
}

/// generalized spiral of evenly spread points from pole to pole
fn spiral_directions(n:usize) -> Vec<[f64;3]> {
    if n == 1 {
        return vec![[0.0,0.0,1.0]]
    }
    let mut phi = 0.0;
    (0..n).map(|k|{
        let h = -1.0 + 2.0*k as f64/(n - 1) as f64;
        if k == 0 || k == n - 1 {
            phi = 0.0;
        }else {
            phi = (phi + 3.6/(n as f64*(1.0 - h*h)).sqrt()) % (2.0*PI);
        }
        direction(h,phi)
    }).collect()
}

fn permute(points:&[[f64;3]],order:&[usize]) -> Vec<[f64;3]> {
    order.iter().map(|&i| points[i]).collect()
}

/// unit direction of every projection, shape (n, 3)
pub fn projection_directions(n:usize,traj_type:TrajType) -> Array2<f64> {
    let points:Vec<[f64;3]> = match traj_type {
        TrajType::Spiral => spiral_directions(n),
        TrajType::Halton => {
            (0..n).map(|k| direction(2.0*halton(k+1,2) - 1.0,2.0*PI*halton(k+1,3))).collect()
        }
        TrajType::HaltonSpiral => {
            // visit the spiral in the order of the base-2 halton sequence
            let mut order:Vec<usize> = (0..n).collect();
            order.sort_by(|&a,&b| halton(a+1,2).total_cmp(&halton(b+1,2)));
            permute(&spiral_directions(n),&order)
        }
        TrajType::SpiralRandom => {
            let mut order:Vec<usize> = (0..n).collect();
            let mut rng = StdRng::seed_from_u64(SPIRAL_RANDOM_SEED);
            order.shuffle(&mut rng);
            permute(&spiral_directions(n),&order)
        }
        TrajType::Archimedean => {
            let turns = (n as f64*PI).sqrt();
            (0..n).map(|k|{
                let z = -1.0 + (2*k + 1) as f64/n as f64;
                direction(z,turns*z.asin())
            }).collect()
        }
        TrajType::GoldenMean => {
            (0..n).map(|k|{
                let z = 2.0*((k as f64*GOLDEN_MEAN_1) % 1.0) - 1.0;
                direction(z,2.0*PI*((k as f64*GOLDEN_MEAN_2) % 1.0))
            }).collect()
        }
    };
    let mut out = Array2::<f64>::zeros((n,3));
    for (mut row,p) in out.outer_iter_mut().zip(points) {
        row[0] = p[0];
        row[1] = p[1];
        row[2] = p[2];
    }
    out
}

#[derive(Clone,Copy,Debug,PartialEq)]
pub struct TrajectoryParams {
    pub timing:RadialTiming,
    pub delay:GradientDelay,
    pub n_frames:usize,
    pub traj_type:TrajType,
}

/// per-axis coordinates, each of shape (n_frames, n_points)
#[derive(Clone,Debug,PartialEq)]
pub struct TrajectoryShape {
    pub x:Array2<f64>,
    pub y:Array2<f64>,
    pub z:Array2<f64>,
}

impl TrajectoryShape {
    pub fn n_frames(&self) -> usize {
        self.x.shape()[0]
    }

    pub fn n_points(&self) -> usize {
        self.x.shape()[1]
    }

    /// keep only the first `n` frames
    pub fn head(&self,n:usize) -> Self {
        let n = n.min(self.n_frames());
        Self {
            x:self.x.slice(s![0..n,..]).to_owned(),
            y:self.y.slice(s![0..n,..]).to_owned(),
            z:self.z.slice(s![0..n,..]).to_owned(),
        }
    }

    /// (n_frames, n_points, 3) with x, y, z on the last axis
    pub fn stack(&self) -> Array3<f64> {
        let mut out = Array3::<f64>::zeros((self.n_frames(),self.n_points(),3));
        out.index_axis_mut(Axis(2),0).assign(&self.x);
        out.index_axis_mut(Axis(2),1).assign(&self.y);
        out.index_axis_mut(Axis(2),2).assign(&self.z);
        out
    }
}

pub fn generate_trajectory(params:&TrajectoryParams) -> TrajectoryShape {
    let dirs = projection_directions(params.n_frames,params.traj_type);
    let dwell = params.timing.dwell_time_us;
    let axis = |col:usize,delay:i32| {
        // delays are stored in dwell-time units
        let radial = radial_distance(&params.timing,delay as f64*dwell);
        Array2::from_shape_fn((params.n_frames,params.timing.n_points),|(f,p)| dirs[[f,col]]*radial[p])
    };
    TrajectoryShape {
        x:axis(0,params.delay.x),
        y:axis(1,params.delay.y),
        z:axis(2,params.delay.z),
    }
}
