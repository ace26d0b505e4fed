use std::collections::HashMap;
use std::path::{Path,PathBuf};
use std::fs::File;
use std::io::{Read,Write};
use byteorder::{ByteOrder,LittleEndian};
use ndarray::{Array2, Array3};
use num_complex::Complex;

const DIMS_KEY:&str = "# Dimensions";

#[derive(Debug,thiserror::Error)]
pub enum CflError {
    #[error("cfl i/o failed for {path:?}: {source}")]
    Io {
        path:PathBuf,
        #[source]
        source:std::io::Error,
    },
    #[error("cfl header {0:?} has no dimension entry")]
    MissingDimensions(PathBuf),
    #[error("cannot parse dimension {token:?} in {path:?}")]
    BadDimension {
        path:PathBuf,
        token:String,
    },
    #[error("cfl {path:?} has dimensions {dims:?} which do not fit a {rank}-d array")]
    Rank {
        path:PathBuf,
        dims:Vec<usize>,
        rank:usize,
    },
    #[error("cfl {path:?} holds {found} complex values but header declares {expected}")]
    Size {
        path:PathBuf,
        expected:usize,
        found:usize,
    },
    #[error("trajectory must have 3 coordinates per point, found {0}")]
    TrajectoryAxes(usize),
}

fn io_err(path:&Path) -> impl FnOnce(std::io::Error) -> CflError + '_ {
    move |source| CflError::Io {path:path.to_owned(),source}
}

pub fn cfl_base_decode(cfl_base:&Path) -> (PathBuf,PathBuf) {
    (cfl_base.with_extension("hdr"),cfl_base.with_extension("cfl"))
}

pub fn load_cfl_header(cfl_base:&Path) -> Result<HashMap<String,String>,CflError> {
    let (hdr,_) = cfl_base_decode(cfl_base);
    let mut f = File::open(&hdr).map_err(io_err(&hdr))?;
    let mut s = String::new();
    f.read_to_string(&mut s).map_err(io_err(&hdr))?;
    let mut h = HashMap::<String,String>::new();
    let lines:Vec<&str> = s.lines().collect();
    lines.iter().enumerate().for_each( |(i,line)|
    {
        if line.starts_with('#'){
            if let Some(value) = lines.get(i+1) {
                h.insert(line.trim().to_string(),value.to_string());
            }
        }
    });
    Ok(h)
}

/// dimensions as written in the header, fastest-varying first
pub fn get_dims(cfl_base:&Path) -> Result<Vec<usize>,CflError> {
    let (hdr,_) = cfl_base_decode(cfl_base);
    let h = load_cfl_header(cfl_base)?;
    let d = h.get(DIMS_KEY).ok_or_else(|| CflError::MissingDimensions(hdr.clone()))?;
    d.split_whitespace().map(|token| token.parse::<usize>().map_err(|_| CflError::BadDimension {
        path:hdr.clone(),
        token:token.to_string()
    })).collect()
}

/// pad or trim singleton dimensions so the header fits the requested rank
fn fit_rank(cfl_base:&Path,dims:Vec<usize>,rank:usize) -> Result<Vec<usize>,CflError> {
    let mut fitted = dims.clone();
    while fitted.len() > rank {
        match fitted.last() {
            Some(1) => {fitted.pop();},
            _ => return Err(CflError::Rank {path:cfl_base.to_owned(),dims,rank})
        }
    }
    fitted.resize(rank,1);
    Ok(fitted)
}

pub fn write_cfl_header(dims:&[usize],cfl_base:&Path) -> Result<(),CflError> {
    let (hdr,_) = cfl_base_decode(cfl_base);
    let mut f = File::create(&hdr).map_err(io_err(&hdr))?;
    let mut padded = dims.to_vec();
    padded.resize(padded.len().max(5),1);
    let dim_str:Vec<String> = padded.iter().map(|d| d.to_string()).collect();
    let hdr_str = format!("{}\n{}\n",DIMS_KEY,dim_str.join(" "));
    f.write_all(hdr_str.as_bytes()).map_err(io_err(&hdr))
}

pub fn load(cfl:&Path) -> Result<Vec<f32>,CflError> {
    let mut f = File::open(cfl).map_err(io_err(cfl))?;
    let mut buf = Vec::<u8>::new();
    f.read_to_end(&mut buf).map_err(io_err(cfl))?;
    let mut fbuf:Vec<f32> = vec![0.0;buf.len()/4];
    LittleEndian::read_f32_into(&buf[0..fbuf.len()*4],&mut fbuf);
    Ok(fbuf)
}

pub fn write_data(flat:&[f32], cfl_base:&Path) -> Result<(),CflError> {
    let (_,cfl) = cfl_base_decode(cfl_base);
    let mut byte_buff:Vec<u8> = vec![0;flat.len()*4];
    LittleEndian::write_f32_into(flat,&mut byte_buff);
    let mut f = File::create(&cfl).map_err(io_err(&cfl))?;
    f.write_all(&byte_buff).map_err(io_err(&cfl))
}

fn complex_to_interleaved<'a>(values:impl Iterator<Item=&'a Complex<f32>>) -> Vec<f32> {
    values.flat_map(|c| [c.re,c.im]).collect()
}

fn interleaved_to_complex(flat:&[f32]) -> Vec<Complex<f32>> {
    flat.chunks_exact(2).map(|pair| Complex::new(pair[0],pair[1])).collect()
}

fn load_complex(cfl_base:&Path,expected:usize) -> Result<Vec<Complex<f32>>,CflError> {
    let (_,cfl) = cfl_base_decode(cfl_base);
    let values = interleaved_to_complex(&load(&cfl)?);
    if values.len() != expected {
        return Err(CflError::Size {path:cfl,expected,found:values.len()})
    }
    Ok(values)
}

/// write a (rows, samples) array. Samples are the fastest-varying dimension on disk.
pub fn write_cfl_2d(array:&Array2<Complex<f32>>,cfl_base:&Path) -> Result<(),CflError> {
    let (rows,samples) = array.dim();
    write_data(&complex_to_interleaved(array.iter()),cfl_base)?;
    write_cfl_header(&[samples,rows],cfl_base)
}

pub fn read_cfl_2d(cfl_base:&Path) -> Result<Array2<Complex<f32>>,CflError> {
    let dims = fit_rank(cfl_base,get_dims(cfl_base)?,2)?;
    let (samples,rows) = (dims[0],dims[1]);
    let values = load_complex(cfl_base,samples*rows)?;
    Array2::from_shape_vec((rows,samples),values).map_err(|_| CflError::Rank {
        path:cfl_base.to_owned(),
        dims,
        rank:2
    })
}

/// write a (projections, points, 3) trajectory the way bart expects it: complex values with
/// the coordinate axis fastest-varying
pub fn write_traj_cfl(trajectory:&Array3<f64>,cfl_base:&Path) -> Result<(),CflError> {
    let (projections,points,axes) = trajectory.dim();
    if axes != 3 {
        return Err(CflError::TrajectoryAxes(axes))
    }
    let flat:Vec<f32> = trajectory.iter().flat_map(|k| [*k as f32,0.0]).collect();
    write_data(&flat,cfl_base)?;
    write_cfl_header(&[3,points,projections],cfl_base)
}

pub fn read_traj_cfl(cfl_base:&Path) -> Result<Array3<f64>,CflError> {
    let dims = fit_rank(cfl_base,get_dims(cfl_base)?,3)?;
    if dims[0] != 3 {
        return Err(CflError::TrajectoryAxes(dims[0]))
    }
    let (points,projections) = (dims[1],dims[2]);
    let values = load_complex(cfl_base,3*points*projections)?;
    let coords:Vec<f64> = values.iter().map(|c| c.re as f64).collect();
    Array3::from_shape_vec((projections,points,3),coords).map_err(|_| CflError::Rank {
        path:cfl_base.to_owned(),
        dims,
        rank:3
    })
}
