use image::{ImageBuffer, Rgb, RgbImage};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::camera::Camera;
use super::core::Scene;
use super::error::SceneError;
use super::shading::{TraceStats, Tracer};
use super::Vec3;

/// Everything about a render that does not come from the scene file.
#[derive(Debug, Clone, Copy)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    /// Jittered rays averaged per pixel.
    pub samples: u32,
    /// Lens radius, zero for a pinhole camera.
    pub aperture: f64,
    pub focus_distance: f64,
    /// Seed of the random streams; a render is reproducible given the seed.
    pub seed: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            width: 800,
            height: 600,
            samples: 16,
            aperture: 0.0,
            focus_distance: 10.0,
            seed: 0,
        }
    }
}

/// Linear colors of a rendered image, row by row from the top.
pub struct Framebuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Vec3>,
    pub stats: TraceStats,
}

/// Converts a channel in [0, 1] to a byte, rounding to nearest.
pub fn channel_to_byte(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl From<Vec3> for Rgb<u8> {
    fn from(value: Vec3) -> Self {
        Rgb([
            channel_to_byte(value.x),
            channel_to_byte(value.y),
            channel_to_byte(value.z),
        ])
    }
}

impl Framebuffer {
    pub fn pixel(&self, x: u32, y: u32) -> Vec3 {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn to_image(&self) -> RgbImage {
        ImageBuffer::from_fn(self.width, self.height, |x, y| self.pixel(x, y).into())
    }
}

/// Renders the scene, one scanline per task.
///
/// Every scanline draws from its own random stream derived from the seed and
/// the row index, so the image does not depend on how rows are scheduled.
pub fn render(scene: &Scene, settings: &RenderSettings) -> Result<Framebuffer, SceneError> {
    scene.validate()?;
    if settings.width == 0 || settings.height == 0 {
        return Err(SceneError::EmptyImage {
            width: settings.width,
            height: settings.height,
        });
    }

    let width = settings.width as usize;
    let height = settings.height as usize;
    let samples = settings.samples.max(1);
    let camera = Camera::look_at(&scene.view, width as f64 / height as f64)
        .with_lens(settings.aperture, settings.focus_distance);

    let mut pixels = vec![Vec3::zero(); width * height];
    let stats = pixels
        .par_chunks_mut(width)
        .enumerate()
        .map(|(y, row)| {
            let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);
            rng.set_stream(y as u64);
            let mut tracer = Tracer::new(scene, rng);
            for (x, pixel) in row.iter_mut().enumerate() {
                let mut color = Vec3::zero();
                for _ in 0..samples {
                    let x_offset: f64 = tracer.rng().gen();
                    let y_offset: f64 = tracer.rng().gen();
                    // getting pixel ray coordinate, y grows downwards on screen
                    let u = 2.0 * (x as f64 + x_offset) / width as f64 - 1.0;
                    let v = 1.0 - 2.0 * (y as f64 + y_offset) / height as f64;
                    let ray = camera.shoot_through_lens(u, v, tracer.rng());
                    color += tracer.trace_primary(&ray);
                }
                *pixel = color / samples as f64;
            }
            tracer.stats()
        })
        .reduce(TraceStats::default, TraceStats::merge);

    Ok(Framebuffer {
        width: settings.width,
        height: settings.height,
        pixels,
        stats,
    })
}
