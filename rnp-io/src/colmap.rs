//! Reader for sparse reconstructions exported as text tables

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use log::{debug, warn};
use rnp_core::camera::{CameraIntrinsics, CameraModelKind, CameraTable};
use rnp_core::error::{Result, RnpError};
use rnp_core::pose::ImageEntry;

use crate::error::read_error;

pub const CAMERAS_FILE: &str = "cameras.txt";
pub const IMAGES_FILE: &str = "images.txt";

/// File suffixes that mark the first line of an image record
const IMAGE_SUFFIXES: [&str; 3] = [".png", ".jpg", ".jpeg"];

/// Cameras and images of one sparse model
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub cameras: CameraTable,
    /// Image records in file order
    pub images: Vec<ImageEntry>,
}

impl Reconstruction {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Read `cameras.txt` and `images.txt` from `dir`.
///
/// Every image must reference a camera present in the camera table.
pub fn read_reconstruction(dir: impl AsRef<Path>) -> Result<Reconstruction> {
    let dir = dir.as_ref();
    let cameras = read_cameras_txt(dir.join(CAMERAS_FILE))?;
    let images = read_images_txt(dir.join(IMAGES_FILE))?;

    if let Some(orphan) = images.iter().find(|img| !cameras.contains(&img.camera_id)) {
        return Err(RnpError::MissingCameraReference {
            image: orphan.name.clone(),
            camera_id: orphan.camera_id.clone(),
        });
    }

    debug!(
        "read {} cameras and {} images from {}",
        cameras.len(),
        images.len(),
        dir.display()
    );

    Ok(Reconstruction { cameras, images })
}

/// Read the camera table.
///
/// Cameras with an unsupported model are skipped with a warning.
pub fn read_cameras_txt(path: impl AsRef<Path>) -> Result<CameraTable> {
    let path = path.as_ref();
    let mut table = CameraTable::new();

    for (lineno, line) in read_lines(path)? {
        let Some(camera) = parse_camera_line(&line, lineno)? else {
            continue;
        };
        if !camera.principal_point_in_bounds() {
            warn!(
                "camera {} has its principal point outside the {}x{} image",
                camera.id(),
                camera.image_size().0,
                camera.image_size().1
            );
        }
        if let Some(previous) = table.insert(camera) {
            warn!("camera {} is defined more than once, keeping the last", previous.id());
        }
    }

    Ok(table)
}

/// Read the image records.
///
/// Only lines whose last token names a png or jpeg file are records; the
/// keypoint lines that follow each of them are ignored.
pub fn read_images_txt(path: impl AsRef<Path>) -> Result<Vec<ImageEntry>> {
    let path = path.as_ref();
    let mut images = Vec::new();

    for (lineno, line) in read_lines(path)? {
        if !is_image_record(&line) {
            continue;
        }
        images.push(parse_image_line(&line, lineno)?);
    }

    Ok(images)
}

/// Non-blank, non-comment lines with their 1-based line numbers
fn read_lines(path: &Path) -> Result<Vec<(usize, String)>> {
    let file = File::open(path).map_err(|e| read_error(path, e))?;
    let reader = BufReader::new(file);

    let mut lines = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| read_error(path, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        lines.push((idx + 1, trimmed.to_string()));
    }

    Ok(lines)
}

fn malformed(line: usize, reason: impl Into<String>) -> RnpError {
    RnpError::MalformedRecord {
        line,
        reason: reason.into(),
    }
}

fn parse_part<T: FromStr>(s: &str, what: &str, line: usize) -> Result<T> {
    s.parse::<T>()
        .map_err(|_| malformed(line, format!("cannot parse {what} from '{s}'")))
}

fn parse_camera_line(line: &str, lineno: usize) -> Result<Option<CameraIntrinsics>> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 {
        return Err(malformed(
            lineno,
            format!("camera line needs at least 4 fields, found {}", parts.len()),
        ));
    }

    let Some(model) = CameraModelKind::from_token(parts[1]) else {
        warn!("skipping camera {}: unsupported model {}", parts[0], parts[1]);
        return Ok(None);
    };

    let width = parse_part::<u32>(parts[2], "width", lineno)?;
    let height = parse_part::<u32>(parts[3], "height", lineno)?;
    let params = parts[4..]
        .iter()
        .map(|p| parse_part::<f64>(p, "camera parameter", lineno))
        .collect::<Result<Vec<_>>>()?;

    let camera = CameraIntrinsics::from_params(parts[0], model, width, height, &params)
        .map_err(|e| malformed(lineno, e.to_string()))?;

    Ok(Some(camera))
}

fn is_image_record(line: &str) -> bool {
    line.split_whitespace().last().is_some_and(|last| {
        let last = last.to_ascii_lowercase();
        IMAGE_SUFFIXES.iter().any(|suffix| last.ends_with(suffix))
    })
}

fn parse_image_line(line: &str, lineno: usize) -> Result<ImageEntry> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 10 {
        return Err(malformed(
            lineno,
            format!("image line needs 10 fields, found {}", parts.len()),
        ));
    }

    let image_id = parse_part::<u32>(parts[0], "image id", lineno)?;
    let mut rotation = [0.0; 4];
    for (slot, part) in rotation.iter_mut().zip(&parts[1..5]) {
        *slot = parse_part::<f64>(part, "quaternion component", lineno)?;
    }
    let mut translation = [0.0; 3];
    for (slot, part) in translation.iter_mut().zip(&parts[5..8]) {
        *slot = parse_part::<f64>(part, "translation component", lineno)?;
    }

    Ok(ImageEntry {
        image_id,
        rotation,
        translation,
        camera_id: parts[8].to_string(),
        name: parts[9..].join(" "),
    })
}
