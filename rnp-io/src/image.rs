use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView};
use log::{debug, warn};
use ndarray::Array2;
use rnp_core::error::{Result, RnpError};
use rnp_core::focus::{FocusPolicy, NEUTRAL_SHARPNESS, laplacian_variance};

/// Decoded source image
pub struct Image {
    pixels: DynamicImage,
    path: PathBuf,
}

impl Image {
    /// Open and decode an image file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(RnpError::InputNotFound(path.to_path_buf()));
        }

        let pixels = image::open(path).map_err(|e| RnpError::ImageUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            pixels,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get image dimensions (width, height)
    pub fn size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// 8-bit luminance as floats (shape: [height, width])
    pub fn to_luma(&self) -> Array2<f32> {
        let luma = self.pixels.to_luma8();
        let (width, height) = luma.dimensions();
        Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            luma.get_pixel(x as u32, y as u32).0[0] as f32
        })
    }

    /// Variance of the Laplacian of the luminance
    pub fn sharpness(&self) -> f64 {
        laplacian_variance(&self.to_luma())
    }
}

/// Luminance plane of the image at `path`
pub fn load_luma<P: AsRef<Path>>(path: P) -> Result<Array2<f32>> {
    Ok(Image::open(path)?.to_luma())
}

/// Focus score of the image at `path`
pub fn score_image<P: AsRef<Path>>(path: P) -> Result<f64> {
    let image = Image::open(path)?;
    let score = image.sharpness();
    debug!("{}: sharpness {score:.3}", image.path().display());
    Ok(score)
}

/// Focus score under a policy.
///
/// `Fallback` only covers images that exist but fail to decode.
pub fn score_with_policy<P: AsRef<Path>>(path: P, policy: FocusPolicy) -> Result<f64> {
    match policy {
        FocusPolicy::Skip => Ok(NEUTRAL_SHARPNESS),
        FocusPolicy::Strict => score_image(path),
        FocusPolicy::Fallback(fallback) => match score_image(path) {
            Err(RnpError::ImageUnreadable { path, reason }) => {
                warn!("{}: {reason}; using sharpness {fallback}", path.display());
                Ok(fallback)
            }
            other => other,
        },
    }
}
