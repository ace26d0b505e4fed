use std::path::Path;
use std::fs::File;
use std::io::{self, Write, Read};

/// scale factor relating the median absolute deviation to the standard deviation of a normal
/// population
pub const MAD_TO_SIGMA:f32 = 1.4826;

pub fn read_to_string(filepath:&Path,extension:&str) -> io::Result<String> {
    let p = filepath.with_extension(extension);
    let mut f = File::open(&p)?;
    let mut s = String::new();
    f.read_to_string(&mut s)?;
    Ok(s)
}

pub fn write_to_file(filepath:&Path,extension:&str,string:&str) -> io::Result<()> {
    let p = filepath.with_extension(extension);
    let mut f = File::create(p)?;
    f.write_all(string.as_bytes())
}

pub fn vec_to_string<T>(vec:&[T]) -> String
    where T:std::string::ToString {
    let vstr:Vec<String> = vec.iter().map(|num| num.to_string()).collect();
    return vstr.join(" ");
}

/// median of a set of values. NaNs are sorted to the end. Returns None for an empty set.
pub fn median(values:&[f32]) -> Option<f32> {
    if values.is_empty() {
        return None
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    match n % 2 {
        0 => Some(0.5*(sorted[n/2 - 1] + sorted[n/2])),
        _ => Some(sorted[n/2])
    }
}

/// median absolute deviation about the median
pub fn median_absolute_deviation(values:&[f32]) -> Option<f32> {
    let m = median(values)?;
    let deviations:Vec<f32> = values.iter().map(|v| (v - m).abs()).collect();
    median(&deviations)
}

pub fn mean(values:&[f32]) -> Option<f32> {
    match values.len() {
        0 => None,
        n => Some(values.iter().sum::<f32>()/n as f32)
    }
}
