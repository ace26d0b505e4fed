use std::path::{Path, PathBuf};
use std::process::ExitCode;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use headfile::headfile::Headfile;
use mr_data::cfl;
use mr_data::raw::RawAcquisition;
use xe_convert::config::{Config, ConfigFile, ConvertSettings};
use xe_convert::dialect::DialectQuery;
use xe_convert::error::{ConvertError, Result};
use xe_convert::labels::ScanKind;
use xe_convert::metadata::extract_metadata;
use xe_convert::pipeline::{Converter, DixonOptions, ScanInput, SubjectScans};

#[derive(clap::Parser,Debug)]
pub struct XeConvertArgs {
    #[command(subcommand)]
    pub action: XeConvertAction,
}

#[derive(clap::Subcommand,Debug)]
pub enum XeConvertAction {
    /// convert an interleaved gas/dissolved dixon acquisition
    Dixon(DixonArgs),
    /// convert a dynamic spectroscopy calibration acquisition
    Calibration(ScanArgs),
    /// convert a proton UTE acquisition
    Proton(ProtonArgs),
    /// convert every scan of a subject with one shared trajectory scale
    Subject(SubjectArgs),
    /// report which acquisition dialect a header and acquisition count resolve to
    Classify(ClassifyArgs),
    /// write the default settings to a file to modify for a new study
    NewConfig(NewConfigArgs),
}

#[derive(Clone,clap::Args,Debug)]
pub struct ScanArgs {
    /// flattened scanner header (key=value)
    header:PathBuf,
    /// raw samples as a cfl base path
    raw:PathBuf,
    /// base path of the record; a .headfile and cfl arrays are written next to it
    output_base:PathBuf,
    /// conversion settings (toml)
    #[clap(long)]
    config:Option<PathBuf>,
}

#[derive(Clone,clap::Args,Debug)]
pub struct DixonArgs {
    #[command(flatten)]
    scan:ScanArgs,
    /// use this (frames, points, 3) trajectory cfl instead of generating one
    #[clap(long)]
    trajectory:Option<PathBuf>,
    /// json list with one divisor per dissolved-phase acquisition
    #[clap(long)]
    normalization:Option<PathBuf>,
}

#[derive(Clone,clap::Args,Debug)]
pub struct ProtonArgs {
    #[command(flatten)]
    scan:ScanArgs,
    /// raw dixon samples of the same subject, used to share its trajectory scale
    #[clap(long)]
    dixon_raw:Option<PathBuf>,
}

#[derive(Clone,clap::Args,Debug)]
pub struct SubjectArgs {
    /// conversion settings (toml); the subject id is taken from here
    config:PathBuf,
    /// directory receiving <subject>_<scan> records
    output_dir:PathBuf,
    #[clap(long)]
    dixon_header:Option<PathBuf>,
    #[clap(long)]
    dixon_raw:Option<PathBuf>,
    #[clap(long)]
    trajectory:Option<PathBuf>,
    #[clap(long)]
    normalization:Option<PathBuf>,
    #[clap(long)]
    calibration_header:Option<PathBuf>,
    #[clap(long)]
    calibration_raw:Option<PathBuf>,
    #[clap(long)]
    proton_header:Option<PathBuf>,
    #[clap(long)]
    proton_raw:Option<PathBuf>,
}

#[derive(Clone,Copy,clap::ValueEnum,Debug)]
pub enum KindArg {
    Dixon,
    Calibration,
    Proton,
}

impl From<KindArg> for ScanKind {
    fn from(k:KindArg) -> Self {
        match k {
            KindArg::Dixon => ScanKind::Dixon,
            KindArg::Calibration => ScanKind::Calibration,
            KindArg::Proton => ScanKind::Proton,
        }
    }
}

#[derive(Clone,clap::Args,Debug)]
pub struct ClassifyArgs {
    header:PathBuf,
    n_acquisitions:usize,
    #[clap(long,value_enum,default_value="dixon")]
    kind:KindArg,
    /// scanner file name
    #[clap(long)]
    filename:Option<String>,
    #[clap(long)]
    config:Option<PathBuf>,
}

#[derive(Clone,clap::Args,Debug)]
pub struct NewConfigArgs {
    path:PathBuf,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let args = XeConvertArgs::parse();
    match run(args.action) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}",e);
            ExitCode::FAILURE
        }
    }
}

fn run(action:XeConvertAction) -> Result<()> {
    match action {
        XeConvertAction::Dixon(args) => {
            let converter = Converter::new(load_settings(args.scan.config.as_deref())?)?;
            let input = load_scan(&args.scan.header,&args.scan.raw)?;
            let options = dixon_options(args.trajectory.as_deref(),args.normalization.as_deref())?;
            converter.convert_dixon(&input,&options)?.write(&args.scan.output_base)?;
        }
        XeConvertAction::Calibration(args) => {
            let converter = Converter::new(load_settings(args.config.as_deref())?)?;
            let input = load_scan(&args.header,&args.raw)?;
            converter.convert_calibration(&input)?.write(&args.output_base)?;
        }
        XeConvertAction::Proton(args) => {
            let converter = Converter::new(load_settings(args.scan.config.as_deref())?)?;
            let input = load_scan(&args.scan.header,&args.scan.raw)?;
            let reference_points = match &args.dixon_raw {
                Some(dixon) => reference_n_points(dixon)?,
                None => input.raw.n_samples(),
            };
            let factor = converter.scaling_factor(reference_points);
            converter.convert_proton(&input,factor)?.write(&args.scan.output_base)?;
        }
        XeConvertAction::Subject(args) => {
            let settings = ConvertSettings::from_file(&args.config)?;
            let subject_id = settings.subject_id.clone();
            let converter = Converter::new(settings)?;
            let scans = SubjectScans {
                dixon:match optional_scan(args.dixon_header.as_deref(),args.dixon_raw.as_deref())? {
                    Some(input) => Some((input,dixon_options(args.trajectory.as_deref(),args.normalization.as_deref())?)),
                    None => None,
                },
                calibration:optional_scan(args.calibration_header.as_deref(),args.calibration_raw.as_deref())?,
                proton:optional_scan(args.proton_header.as_deref(),args.proton_raw.as_deref())?,
            };
            let records = converter.convert_subject(&scans)?;
            for path in records.write_all(&args.output_dir,&subject_id)? {
                info!("wrote {:?}",path);
            }
        }
        XeConvertAction::Classify(args) => {
            let settings = load_settings(args.config.as_deref())?;
            let header = read_header(&args.header)?;
            let kind = ScanKind::from(args.kind);
            let metadata = extract_metadata(&header,kind,&settings.physics)?;
            let converter = Converter::new(settings)?;
            let query = DialectQuery {
                kind,
                flip_angle_dissolved:metadata.flip_angles.dissolved(),
                total_count:args.n_acquisitions,
                scan_date:metadata.scan_date,
                filename:args.filename,
            };
            let d = converter.classifier().classify(&query)?;
            println!("dialect: {}",d.name);
            println!("scan type: {}",d.scan_type());
            println!("gradient delay: {:?}",d.gradient_delay.as_array());
            println!("bonus acquisitions: {}",d.bonus_sample_count());
            println!("retained acquisitions: {}",d.retained_count);
            if let Some(frames) = d.trajectory_frames {
                println!("trajectory frames: {}",frames);
            }
        }
        XeConvertAction::NewConfig(args) => {
            ConvertSettings::default().to_file(&args.path)?;
            info!("default settings written to {:?}",args.path.with_extension(ConvertSettings::file_ext()));
        }
    }
    Ok(())
}

fn load_settings(path:Option<&Path>) -> Result<ConvertSettings> {
    match path {
        Some(p) => ConvertSettings::from_file(p),
        None => Ok(ConvertSettings::default()),
    }
}

fn read_header(path:&Path) -> Result<xe_convert::metadata::HeaderFields> {
    Headfile::existing(path).and_then(|h| h.read()).map_err(ConvertError::io(path))
}

fn load_scan(header:&Path,raw:&Path) -> Result<ScanInput> {
    Ok(ScanInput {
        header:read_header(header)?,
        raw:RawAcquisition::from_cfl(raw)?,
        filename:raw.file_name().map(|f| f.to_string_lossy().to_string()),
    })
}

fn optional_scan(header:Option<&Path>,raw:Option<&Path>) -> Result<Option<ScanInput>> {
    match (header,raw) {
        (Some(h),Some(r)) => Ok(Some(load_scan(h,r)?)),
        (None,None) => Ok(None),
        _ => Err(ConvertError::InvalidConfig(String::from("a scan needs both a header and raw samples"))),
    }
}

fn dixon_options(trajectory:Option<&Path>,normalization:Option<&Path>) -> Result<DixonOptions> {
    let external_trajectory = match trajectory {
        Some(t) => Some(cfl::read_traj_cfl(t)?),
        None => None,
    };
    let dissolved_normalization = match normalization {
        Some(n) => {
            let text = std::fs::read_to_string(n).map_err(ConvertError::io(n))?;
            let values:Vec<f32> = serde_json::from_str(&text).map_err(|source| ConvertError::Json {path:n.to_owned(),source})?;
            Some(values)
        }
        None => None,
    };
    Ok(DixonOptions {external_trajectory,dissolved_normalization})
}

/// samples per acquisition of a raw cfl, read from its header only
fn reference_n_points(raw:&Path) -> Result<usize> {
    let dims = cfl::get_dims(raw)?;
    Ok(dims.first().copied().unwrap_or(0))
}
