mod stages;

use std::path::{Path, PathBuf};

use argh::FromArgs;
use log::info;
use nalgebra::Vector3;
use rnp_core::focus::FocusPolicy;
use rnp_core::manifest::DEFAULT_AABB_SCALE;
use rnp_core::normalize::{DEFAULT_TARGET_DISTANCE, NormalizeOptions, UpAxis};
use rnp_io::{ConvertOptions, MANIFEST_FILE, convert};
use thiserror::Error;

use crate::stages::Toolchain;

#[derive(Error, Debug, PartialEq)]
enum ArgError {
    #[error("--fallback-sharpness and --no-sharpness cannot be combined")]
    ConflictingFocus,

    #[error("--up requires --normalize")]
    UpWithoutNormalize,

    #[error("--fallback-sharpness must be a finite, non-negative score, got {0}")]
    InvalidFallback(f64),
}

#[derive(FromArgs)]
/// Prepare reconstructed camera poses for radiance field training.
struct Cli {
    #[argh(subcommand)]
    command: Subcommand,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Subcommand {
    Convert(ConvertArgs),
    Reconstruct(ReconstructArgs),
    Extract(ExtractArgs),
    Train(TrainArgs),
    Run(RunArgs),
}

#[derive(FromArgs)]
/// Write transforms.json for a sparse model exported as text.
#[argh(subcommand, name = "convert")]
struct ConvertArgs {
    /// directory holding cameras.txt and images.txt
    #[argh(positional)]
    model_dir: PathBuf,

    /// directory with the source images (default: <model_dir>/images)
    #[argh(option)]
    images: Option<PathBuf>,

    /// manifest path (default: <model_dir>/transforms.json)
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// scene bounding box scale, a power of two up to 128
    #[argh(option, default = "DEFAULT_AABB_SCALE")]
    aabb_scale: u32,

    /// recenter and rescale the camera rig
    #[argh(switch)]
    normalize: bool,

    /// up direction as "x,y,z" (default: mean camera up)
    #[argh(option, from_str_fn(parse_vec3))]
    up: Option<Vector3<f64>>,

    /// mean camera distance after normalization
    #[argh(option, default = "DEFAULT_TARGET_DISTANCE")]
    target_distance: f64,

    /// seed for the normalization's tie-breaking perturbation
    #[argh(option, default = "0")]
    seed: u64,

    /// score to use for images that fail to decode, instead of aborting
    #[argh(option)]
    fallback_sharpness: Option<f64>,

    /// do not read images; every frame gets the neutral score
    #[argh(switch)]
    no_sharpness: bool,
}

#[derive(FromArgs)]
/// Run COLMAP on a folder of images and export the model as text.
#[argh(subcommand, name = "reconstruct")]
struct ReconstructArgs {
    /// folder of input images
    #[argh(positional)]
    images: PathBuf,

    /// colmap workspace, cleared of previous models first
    #[argh(positional)]
    workspace: PathBuf,

    /// colmap executable
    #[argh(option, default = "PathBuf::from(\"colmap\")")]
    colmap: PathBuf,
}

#[derive(FromArgs)]
/// Grab one frame at the same timestamp from every .mp4 in a folder.
#[argh(subcommand, name = "extract")]
struct ExtractArgs {
    /// folder of .mp4 videos
    #[argh(positional)]
    input: PathBuf,

    /// frames are written to <output>/<rounded timestamp>
    #[argh(positional)]
    output: PathBuf,

    /// timestamp in seconds
    #[argh(option, short = 't', default = "0.0")]
    timestamp: f64,

    /// ffmpeg executable
    #[argh(option, default = "PathBuf::from(\"ffmpeg\")")]
    ffmpeg: PathBuf,
}

#[derive(FromArgs)]
/// Launch the trainer on a scene directory.
#[argh(subcommand, name = "train")]
struct TrainArgs {
    /// trainer executable
    #[argh(positional)]
    trainer: PathBuf,

    /// directory containing transforms.json
    #[argh(positional)]
    scene: PathBuf,
}

#[derive(FromArgs)]
/// Extract frames, reconstruct, convert and optionally train.
#[argh(subcommand, name = "run")]
struct RunArgs {
    /// folder of .mp4 videos
    #[argh(positional)]
    input: PathBuf,

    /// working directory for frames, model and manifest
    #[argh(positional)]
    output: PathBuf,

    /// timestamp in seconds
    #[argh(option, short = 't', default = "0.0")]
    timestamp: f64,

    /// scene bounding box scale, a power of two up to 128
    #[argh(option, default = "DEFAULT_AABB_SCALE")]
    aabb_scale: u32,

    /// recenter and rescale the camera rig
    #[argh(switch)]
    normalize: bool,

    /// trainer executable; training is skipped without it
    #[argh(option)]
    trainer: Option<PathBuf>,

    /// colmap executable
    #[argh(option, default = "PathBuf::from(\"colmap\")")]
    colmap: PathBuf,

    /// ffmpeg executable
    #[argh(option, default = "PathBuf::from(\"ffmpeg\")")]
    ffmpeg: PathBuf,
}

fn parse_vec3(value: &str) -> Result<Vector3<f64>, String> {
    let parts = value
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid vector '{value}': {e}"))?;

    match parts.as_slice() {
        [x, y, z] => Ok(Vector3::new(*x, *y, *z)),
        _ => Err(format!("expected three comma-separated numbers, got '{value}'")),
    }
}

fn focus_policy(no_sharpness: bool, fallback: Option<f64>) -> Result<FocusPolicy, ArgError> {
    match (no_sharpness, fallback) {
        (true, Some(_)) => Err(ArgError::ConflictingFocus),
        (true, None) => Ok(FocusPolicy::Skip),
        (false, Some(score)) if !score.is_finite() || score < 0.0 => {
            Err(ArgError::InvalidFallback(score))
        }
        (false, Some(score)) => Ok(FocusPolicy::Fallback(score)),
        (false, None) => Ok(FocusPolicy::Strict),
    }
}

impl ConvertArgs {
    fn options(&self) -> Result<ConvertOptions, ArgError> {
        if self.up.is_some() && !self.normalize {
            return Err(ArgError::UpWithoutNormalize);
        }

        let mut options = ConvertOptions::new(&self.model_dir);
        if let Some(images) = &self.images {
            options.image_dir = images.clone();
        }
        if let Some(output) = &self.output {
            options.output = output.clone();
        }
        options.aabb_scale = self.aabb_scale;
        options.focus = focus_policy(self.no_sharpness, self.fallback_sharpness)?;
        options.normalize = self.normalize.then(|| NormalizeOptions {
            up: self.up.map_or(UpAxis::MeanCameraUp, UpAxis::Fixed),
            target_distance: self.target_distance,
            seed: self.seed,
            ..NormalizeOptions::default()
        });
        Ok(options)
    }
}

fn run_pipeline(args: &RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let tools = Toolchain {
        colmap: args.colmap.clone(),
        ffmpeg: args.ffmpeg.clone(),
    };

    let frames = stages::extract_frames(&tools, &args.input, &args.output, args.timestamp)?;
    stages::reconstruct(&tools, &frames, &args.output)?;

    let mut options = ConvertOptions::new(&args.output);
    options.image_dir = frames;
    options.aabb_scale = args.aabb_scale;
    options.normalize = args.normalize.then(NormalizeOptions::default);
    let summary = convert(&args.output, &options)?;
    info!("{} frames written to {}", summary.frames, summary.output.display());

    if let Some(trainer) = &args.trainer {
        stages::train(trainer, &args.output)?;
    }
    Ok(())
}

fn scene_dir(path: &Path) -> &Path {
    if path.file_name().is_some_and(|name| name == MANIFEST_FILE) {
        path.parent().unwrap_or(path)
    } else {
        path
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let cli: Cli = argh::from_env();
    match cli.command {
        Subcommand::Convert(args) => {
            let options = args.options()?;
            let summary = convert(&args.model_dir, &options)?;
            if let Some(report) = &summary.normalization {
                info!(
                    "normalized rig: scale {:.6}, mean distance before {:.6}",
                    report.scale, report.mean_distance
                );
            }
            info!("{} frames written to {}", summary.frames, summary.output.display());
        }
        Subcommand::Reconstruct(args) => {
            let tools = Toolchain {
                colmap: args.colmap,
                ..Toolchain::default()
            };
            stages::reconstruct(&tools, &args.images, &args.workspace)?;
        }
        Subcommand::Extract(args) => {
            let tools = Toolchain {
                ffmpeg: args.ffmpeg,
                ..Toolchain::default()
            };
            let folder = stages::extract_frames(&tools, &args.input, &args.output, args.timestamp)?;
            info!("frames written to {}", folder.display());
        }
        Subcommand::Train(args) => {
            stages::train(&args.trainer, scene_dir(&args.scene))?;
        }
        Subcommand::Run(args) => run_pipeline(&args)?,
    }

    Ok(())
}
