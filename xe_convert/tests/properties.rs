use ndarray::{Array2, Array3};
use num_complex::Complex;
use proptest::prelude::*;
use xe_convert::config::{Config, NoiseFilterSettings};
use xe_convert::interleave::{interleave_trajectories, interleaved_trajectory};
use xe_convert::noise::filter_noisy_projections;
use xe_convert::projection::ProjectionSet;
use xe_convert::scaling::scale_trajectory;
use xe_convert::trajectory::{generate_trajectory, GradientDelay, RadialTiming, TrajType, TrajectoryParams};

/// every row tagged with its index so order can be checked after removals
fn tagged(n:usize,p:usize) -> ProjectionSet {
    let data = Array2::from_shape_fn((n,p),|(i,j)| Complex::new(i as f32,j as f32));
    let traj = Array3::from_shape_fn((n,p,3),|(i,_,_)| i as f64);
    ProjectionSet::new(data,traj).unwrap()
}

proptest! {
    #[test]
    fn interleave_doubles_and_alternates(n in 1usize..40,p in 1usize..12) {
        let params = TrajectoryParams {
            timing:RadialTiming {dwell_time_us:10.0, ramp_time_us:100.0, plateau_time_us:2500.0, decay_time_us:60.0, n_points:p},
            delay:GradientDelay::new(0,-4,-3),
            n_frames:n,
            traj_type:TrajType::HaltonSpiral,
        };
        let shape = generate_trajectory(&params);
        let stacked = shape.stack();
        let out = interleaved_trajectory(&shape);
        prop_assert_eq!(out.dim(),(2*n,p,3));
        for i in 0..n {
            prop_assert_eq!(out.index_axis(ndarray::Axis(0),2*i),stacked.index_axis(ndarray::Axis(0),i));
            prop_assert_eq!(out.index_axis(ndarray::Axis(0),2*i+1),stacked.index_axis(ndarray::Axis(0),i));
        }
    }

    #[test]
    fn interleave_keeps_phase_identity(n in 1usize..30,p in 1usize..6) {
        let gas = Array3::from_elem((n,p,3),1.0);
        let dis = Array3::from_elem((n,p,3),2.0);
        let out = interleave_trajectories(&gas,&dis).unwrap();
        for (i,frame) in out.outer_iter().enumerate() {
            let expected = if i % 2 == 0 {1.0} else {2.0};
            prop_assert!(frame.iter().all(|v| *v == expected));
        }
    }

    #[test]
    fn truncation_law(n in 1usize..60,s in 0usize..60,e in 0usize..60) {
        prop_assume!(s < n && e < n);
        let set = tagged(n,3);
        match set.truncate(s,e) {
            Ok(t) => {
                prop_assert!(s + e <= n);
                prop_assert_eq!(t.n_projections(),n - s - e);
                prop_assert_eq!(t.trajectory().dim().0,t.data().nrows());
                for (k,row) in t.data().outer_iter().enumerate() {
                    prop_assert_eq!(row[0].re as usize,s + k);
                }
            }
            Err(_) => prop_assert!(s + e > n),
        }
    }

    #[test]
    fn scaling_composes(f1 in -4.0f64..4.0,f2 in -4.0f64..4.0) {
        let traj = Array3::from_shape_fn((5,7,3),|(i,j,k)| (i as f64 - 2.0)*0.1 + j as f64*0.01 - k as f64);
        let twice = scale_trajectory(&scale_trajectory(&traj,f1),f2);
        let once = scale_trajectory(&traj,f1*f2);
        for (a,b) in twice.iter().zip(once.iter()) {
            prop_assert!((a - b).abs() <= 1e-12*(1.0 + b.abs()));
        }
    }

    #[test]
    fn noise_filter_bookkeeping(n in 1usize..50,spikes in proptest::collection::vec(0usize..50,0..6)) {
        let p = 16;
        let mut data = Array2::from_shape_fn((n,p),|(_,j)| Complex::new((-(j as f32)/3.0).exp(),0.0));
        for s in &spikes {
            if *s < n {
                data[[*s,13]] = Complex::new(10.0,0.0);
            }
        }
        let traj = Array3::from_shape_fn((n,p,3),|(i,_,_)| i as f64);
        let set = ProjectionSet::new(data,traj).unwrap();
        let mut settings = NoiseFilterSettings::default();
        settings.max_noise_fraction = 1.0;
        let (out,report) = filter_noisy_projections(&set,&settings,"gas").unwrap();
        prop_assert_eq!(out.n_projections() + report.n_removed(),n);
        prop_assert_eq!(out.trajectory().dim().0,out.data().nrows());
        // survivors are exactly the rows not reported, in order
        let kept:Vec<usize> = out.trajectory().outer_iter().map(|f| f[[0,0]] as usize).collect();
        let expected:Vec<usize> = (0..n).filter(|i| !report.removed.contains(i)).collect();
        prop_assert_eq!(kept,expected);
        prop_assert!(report.removed.iter().all(|i| *i < n));
    }
}
