use std::path::{Path, PathBuf};

use image::ImageReader;

use super::error::TextureError;
use super::Vec3;

/// Color used by a texture map whose image is unavailable.
pub const TEXTURE_FALLBACK: Vec3 = Vec3 {
    x: 1.0,
    y: 1.0,
    z: 1.0,
};

/// Decoded image with channels normalized to [0, 1], rows top to bottom.
#[derive(Debug, Clone)]
pub struct Texture {
    width: usize,
    height: usize,
    texels: Vec<Vec3>,
}

impl Texture {
    pub fn new(width: usize, height: usize, texels: Vec<Vec3>) -> Option<Texture> {
        if width == 0 || height == 0 || texels.len() != width * height {
            return None;
        }
        Some(Texture {
            width,
            height,
            texels,
        })
    }

    /// Decodes any format the `image` crate understands, PPM (P3/P6) included.
    pub fn load(path: &Path) -> Result<Texture, TextureError> {
        let to_path = || PathBuf::from(path);
        let reader = ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|source| TextureError::Io {
                path: to_path(),
                source,
            })?;
        let image = reader.decode().map_err(|source| TextureError::Decode {
            path: to_path(),
            source,
        })?;
        let rgb = image.to_rgb32f();
        let texels = rgb
            .pixels()
            .map(|p| Vec3::new(p[0] as f64, p[1] as f64, p[2] as f64))
            .collect();
        Texture::new(rgb.width() as usize, rgb.height() as usize, texels)
            .ok_or(TextureError::Empty { path: to_path() })
    }

    /// Nearest texel at the texture coordinates, wrapping outside [0, 1).
    pub fn sample(&self, s: f64, t: f64) -> Vec3 {
        let s = s - s.floor();
        let t = t - t.floor();
        let u = ((s * self.width as f64) as usize).min(self.width - 1);
        let v = ((t * self.height as f64) as usize).min(self.height - 1);
        self.texels[v * self.width + u]
    }
}

#[derive(Debug, Clone)]
pub enum Pigment {
    Solid(Vec3),
    /// 3D checkerboard of cubes with side `scale`.
    Checker {
        even: Vec3,
        odd: Vec3,
        scale: f64,
    },
    /// Planar projection of an image: each texture coordinate is the dot product
    /// of the homogeneous point `(x, y, z, 1)` with its projection vector.
    TextureMap {
        texture: Option<Texture>,
        s: [f64; 4],
        t: [f64; 4],
    },
}

fn project(plane: &[f64; 4], point: Vec3) -> f64 {
    plane[0] * point.x + plane[1] * point.y + plane[2] * point.z + plane[3]
}

impl Pigment {
    pub fn color_at(&self, point: Vec3) -> Vec3 {
        match self {
            Pigment::Solid(color) => *color,
            Pigment::Checker { even, odd, scale } => {
                let cells = (point.x / scale).floor()
                    + (point.y / scale).floor()
                    + (point.z / scale).floor();
                if cells.rem_euclid(2.0) == 0.0 {
                    *even
                } else {
                    *odd
                }
            }
            Pigment::TextureMap { texture, s, t } => match texture {
                Some(texture) => texture.sample(project(s, point), project(t, point)),
                None => TEXTURE_FALLBACK,
            },
        }
    }
}
