//! Side-by-side image compositing.
//!
//! Scales two charts to a common height and pastes them next to each other
//! on a solid background with a fixed gap.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageError, ImageFormat, Rgb, RgbImage};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Which half of the composite an image fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "Left"),
            Side::Right => write!(f, "Right"),
        }
    }
}

/// Errors produced while compositing.
#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("{side} image not found: {}", path.display())]
    MissingSource { side: Side, path: PathBuf },

    #[error("Failed to load {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: ImageError,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
}

/// Dimensions of a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeLayout {
    /// Common height of both scaled images and of the canvas.
    pub height: u32,
    pub left_width: u32,
    pub right_width: u32,
    pub gap: u32,
}

impl CompositeLayout {
    /// Plan a composite from the native `(width, height)` of each image.
    pub fn plan(left: (u32, u32), right: (u32, u32), gap: u32) -> Self {
        let height = left.1.max(right.1);

        Self {
            height,
            left_width: scaled_width(left, height),
            right_width: scaled_width(right, height),
            gap,
        }
    }

    pub fn canvas_width(&self) -> u32 {
        self.left_width + self.gap + self.right_width
    }

    /// Horizontal position of the right image.
    pub fn right_offset(&self) -> u32 {
        self.left_width + self.gap
    }
}

/// Width after scaling to `target_height` with the aspect ratio kept,
/// truncated to whole pixels.
pub fn scaled_width((width, height): (u32, u32), target_height: u32) -> u32 {
    if height == 0 {
        return width;
    }

    let scale = target_height as f64 / height as f64;
    ((width as f64 * scale) as u32).max(1)
}

/// Combines two images side by side.
#[derive(Debug, Clone)]
pub struct Compositor {
    gap: u32,
    background: Rgb<u8>,
}

impl Compositor {
    pub fn new(gap: u32, background: [u8; 3]) -> Self {
        Self {
            gap,
            background: Rgb(background),
        }
    }

    /// Compose two decoded images. Alpha is dropped, not blended.
    pub fn compose(
        &self,
        left: &DynamicImage,
        right: &DynamicImage,
    ) -> (RgbImage, CompositeLayout) {
        let layout = CompositeLayout::plan(left.dimensions(), right.dimensions(), self.gap);

        let left = resize_to(left, layout.left_width, layout.height);
        let right = resize_to(right, layout.right_width, layout.height);

        let mut canvas =
            RgbImage::from_pixel(layout.canvas_width(), layout.height, self.background);
        imageops::replace(&mut canvas, &left, 0, 0);
        imageops::replace(&mut canvas, &right, layout.right_offset() as i64, 0);

        (canvas, layout)
    }

    /// Load both files, compose them and write a PNG to `output`.
    ///
    /// Both sources are checked before anything is decoded or written.
    pub fn combine_files(
        &self,
        left: &Path,
        right: &Path,
        output: &Path,
    ) -> Result<CompositeLayout, CompositeError> {
        for (side, path) in [(Side::Left, left), (Side::Right, right)] {
            if !path.exists() {
                return Err(CompositeError::MissingSource {
                    side,
                    path: path.to_path_buf(),
                });
            }
        }

        println!("Loading images...");
        let left_img = open(left)?;
        let right_img = open(right)?;

        println!("  Left image (network chart): {:?}", left_img.dimensions());
        println!("  Right image (pie chart): {:?}", right_img.dimensions());

        let (canvas, layout) = self.compose(&left_img, &right_img);

        println!("\nResized images:");
        println!("  Left: {:?}", (layout.left_width, layout.height));
        println!("  Right: {:?}", (layout.right_width, layout.height));
        println!(
            "\nCombined dimensions: {}x{}",
            layout.canvas_width(),
            layout.height
        );

        canvas
            .save_with_format(output, ImageFormat::Png)
            .map_err(|source| CompositeError::Encode {
                path: output.to_path_buf(),
                source,
            })?;

        println!("\n✓ Combined chart saved: {}", output.display());
        Ok(layout)
    }
}

fn open(path: &Path) -> Result<DynamicImage, CompositeError> {
    debug!("Decoding {}", path.display());
    image::open(path).map_err(|source| CompositeError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Lanczos resize, skipped when the size already matches.
fn resize_to(image: &DynamicImage, width: u32, height: u32) -> RgbImage {
    let rgb = image.to_rgb8();

    if rgb.dimensions() == (width, height) {
        rgb
    } else {
        imageops::resize(&rgb, width, height, FilterType::Lanczos3)
    }
}
