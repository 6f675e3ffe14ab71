//! External tools run as subprocesses

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use log::{debug, info};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    ExternalToolFailed { program: String, status: ExitStatus },

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No .mp4 videos in {}", .0.display())]
    NoVideos(PathBuf),
}

pub type Result<T> = std::result::Result<T, StageError>;

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StageError + '_ {
    move |source| StageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Locations of the external programs
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub colmap: PathBuf,
    pub ffmpeg: PathBuf,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            colmap: PathBuf::from("colmap"),
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

/// Run `program` to completion; a non-zero exit is an error
fn run_tool(program: &Path, args: &[OsString]) -> Result<()> {
    let name = program.display().to_string();
    let line: Vec<_> = args.iter().map(|a| a.to_string_lossy()).collect();
    info!("running {name} {}", line.join(" "));

    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|source| StageError::Launch {
            program: name.clone(),
            source,
        })?;

    if !status.success() {
        return Err(StageError::ExternalToolFailed {
            program: name,
            status,
        });
    }
    Ok(())
}

/// `--name=<path>`
fn flag(name: &str, value: &Path) -> OsString {
    let mut arg = OsString::from(format!("--{name}="));
    arg.push(value);
    arg
}

pub fn automatic_reconstructor_args(images: &Path, workspace: &Path) -> Vec<OsString> {
    vec![
        "automatic_reconstructor".into(),
        "--image_path".into(),
        images.into(),
        "--workspace_path".into(),
        workspace.into(),
        "--sparse=1".into(),
        "--dense=0".into(),
    ]
}

pub fn model_converter_args(workspace: &Path) -> Vec<OsString> {
    vec![
        "model_converter".into(),
        flag("input_path", &workspace.join("sparse").join("0")),
        flag("output_path", workspace),
        "--output_type=TXT".into(),
    ]
}

pub fn frame_args(video: &Path, seconds: f64, output: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-ss".into(),
        seconds.to_string().into(),
        "-i".into(),
        video.into(),
        "-frames:v".into(),
        "1".into(),
        output.into(),
    ]
}

/// Whole-second label of a timestamp, rounding halves away from zero
pub fn frame_label(seconds: f64) -> i64 {
    seconds.round() as i64
}

/// Remove the database, models and text tables a previous run left behind
pub fn clear_workspace(workspace: &Path) -> Result<()> {
    fs::create_dir_all(workspace).map_err(io_err(workspace))?;

    let database = workspace.join("database.db");
    if database.is_file() {
        fs::remove_file(&database).map_err(io_err(&database))?;
    }
    for dir in ["sparse", "dense"] {
        let dir = workspace.join(dir);
        if dir.is_dir() {
            fs::remove_dir_all(&dir).map_err(io_err(&dir))?;
        }
    }

    for entry in fs::read_dir(workspace).map_err(io_err(workspace))? {
        let path = entry.map_err(io_err(workspace))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
            debug!("removing {}", path.display());
            fs::remove_file(&path).map_err(io_err(&path))?;
        }
    }
    Ok(())
}

/// Build a sparse model from `images` and export it as text into `workspace`
pub fn reconstruct(tools: &Toolchain, images: &Path, workspace: &Path) -> Result<()> {
    clear_workspace(workspace)?;
    run_tool(&tools.colmap, &automatic_reconstructor_args(images, workspace))?;
    run_tool(&tools.colmap, &model_converter_args(workspace))?;
    info!("sparse model exported to {}", workspace.display());
    Ok(())
}

/// `.mp4` files directly inside `dir`, sorted by path
pub fn list_videos(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut videos = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err(dir))? {
        let path = entry.map_err(io_err(dir))?.path();
        let is_mp4 = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"));
        if path.is_file() && is_mp4 {
            videos.push(path);
        }
    }
    videos.sort();
    Ok(videos)
}

/// Grab the frame at `seconds` from every video in `input`.
///
/// Frames land in a fresh `<output>/<label>` folder, which is returned.
pub fn extract_frames(
    tools: &Toolchain,
    input: &Path,
    output: &Path,
    seconds: f64,
) -> Result<PathBuf> {
    let videos = list_videos(input)?;
    if videos.is_empty() {
        return Err(StageError::NoVideos(input.to_path_buf()));
    }

    let label = frame_label(seconds);
    let folder = output.join(label.to_string());
    if folder.exists() {
        fs::remove_dir_all(&folder).map_err(io_err(&folder))?;
    }
    fs::create_dir_all(&folder).map_err(io_err(&folder))?;

    for video in &videos {
        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let frame = folder.join(format!("{stem}_{label}.png"));
        run_tool(&tools.ffmpeg, &frame_args(video, seconds, &frame))?;
        info!("wrote frame {}", frame.display());
    }

    Ok(folder)
}

/// Launch the trainer on a prepared scene directory
pub fn train(trainer: &Path, scene: &Path) -> Result<()> {
    run_tool(trainer, &["--scene".into(), scene.into()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_frame_label_rounds_half_away_from_zero() {
        assert_eq!(frame_label(2.5), 3);
        assert_eq!(frame_label(3.5), 4);
        assert_eq!(frame_label(-2.5), -3);
        assert_eq!(frame_label(1.4), 1);
        assert_eq!(frame_label(0.0), 0);
    }

    #[test]
    fn test_reconstructor_args() {
        let args = automatic_reconstructor_args(Path::new("out/3"), Path::new("out"));
        assert_eq!(
            strings(&args),
            [
                "automatic_reconstructor",
                "--image_path",
                "out/3",
                "--workspace_path",
                "out",
                "--sparse=1",
                "--dense=0"
            ]
        );
    }

    #[test]
    fn test_model_converter_args() {
        let args = model_converter_args(Path::new("ws"));
        assert_eq!(
            strings(&args),
            [
                "model_converter",
                "--input_path=ws/sparse/0",
                "--output_path=ws",
                "--output_type=TXT"
            ]
        );
    }

    #[test]
    fn test_frame_args() {
        let args = frame_args(Path::new("in/cam01.mp4"), 2.5, Path::new("out/3/cam01_3.png"));
        let args = strings(&args);
        assert_eq!(args[3..5], ["-ss", "2.5"]);
        assert_eq!(args[5..7], ["-i", "in/cam01.mp4"]);
        assert_eq!(args.last().unwrap(), "out/3/cam01_3.png");
    }

    #[test]
    fn test_clear_workspace() {
        let dir = tempdir().unwrap();
        let ws = dir.path();
        fs::write(ws.join("database.db"), "db").unwrap();
        fs::write(ws.join("cameras.txt"), "").unwrap();
        fs::write(ws.join("images.txt"), "").unwrap();
        fs::write(ws.join("transforms.json"), "{}").unwrap();
        fs::create_dir_all(ws.join("sparse/0")).unwrap();
        fs::create_dir_all(ws.join("dense")).unwrap();
        fs::create_dir_all(ws.join("3")).unwrap();
        fs::write(ws.join("3/cam01_3.png"), "").unwrap();

        clear_workspace(ws).unwrap();

        assert!(!ws.join("database.db").exists());
        assert!(!ws.join("cameras.txt").exists());
        assert!(!ws.join("images.txt").exists());
        assert!(!ws.join("sparse").exists());
        assert!(!ws.join("dense").exists());
        assert!(ws.join("transforms.json").exists());
        assert!(ws.join("3/cam01_3.png").exists());
    }

    #[test]
    fn test_list_videos() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.mp4"), "").unwrap();
        fs::write(dir.path().join("a.MP4"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let videos = list_videos(dir.path()).unwrap();
        let names: Vec<_> = videos
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.MP4", "b.mp4"]);
    }

    #[test]
    fn test_extract_without_videos() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let err = extract_frames(&Toolchain::default(), input.path(), output.path(), 1.0)
            .unwrap_err();
        assert!(matches!(err, StageError::NoVideos(_)));
        assert!(!output.path().join("1").exists());
    }

    #[test]
    fn test_missing_program() {
        let err = run_tool(Path::new("rnp-test-no-such-program"), &[]).unwrap_err();
        assert!(matches!(err, StageError::Launch { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_program() {
        let err = run_tool(Path::new("false"), &[]).unwrap_err();
        assert!(matches!(err, StageError::ExternalToolFailed { .. }));
    }
}
