use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;
use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{ExtendedColorType, ImageEncoder, RgbImage};

use csg_raytracer::raytracing::parser::load_scene;
use csg_raytracer::raytracing::render::{render, RenderSettings};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// the input path to the scene file
    scene: PathBuf,
    /// the path of the rendered image, the format follows the extension
    output: PathBuf,
    /// width of the image in pixels
    #[arg(value_parser = parse_dimension, default_value_t = RenderSettings::default().width)]
    width: u32,
    /// height of the image in pixels
    #[arg(value_parser = parse_dimension, default_value_t = RenderSettings::default().height)]
    height: u32,
    /// lens radius, 0 disables depth of field
    #[arg(value_parser = parse_aperture, default_value_t = RenderSettings::default().aperture)]
    aperture: f64,
    /// distance from the eye of the plane in focus
    #[arg(value_parser = parse_focus, default_value_t = RenderSettings::default().focus_distance)]
    focus: f64,
    /// the number of rays shot per pixel
    #[arg(short, long, default_value_t = RenderSettings::default().samples)]
    samples: u32,
    /// seed of the random streams, chosen at random when missing
    #[arg(long)]
    seed: Option<u64>,
    /// write plain text (P3) pixmaps instead of binary ones
    #[arg(long, default_value = "false")]
    ascii: bool,
    /// more output, repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_dimension(value: &str) -> Result<u32, String> {
    match value.parse::<u32>() {
        Ok(num) if num >= 1 => Ok(num),
        _ => Err(format!("'{}' is not a positive integer", value)),
    }
}

fn parse_aperture(value: &str) -> Result<f64, String> {
    match value.parse::<f64>() {
        Ok(num) if num >= 0.0 && num.is_finite() => Ok(num),
        _ => Err(format!("'{}' is not a non negative number", value)),
    }
}

fn parse_focus(value: &str) -> Result<f64, String> {
    match value.parse::<f64>() {
        Ok(num) if num > 0.0 && num.is_finite() => Ok(num),
        _ => Err(format!("'{}' is not a positive number", value)),
    }
}

fn init_logger(verbosity: u8) {
    env_logger::builder()
        .filter_level(match verbosity {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        })
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn save_ascii(image: &RgbImage, path: &Path) -> Result<(), Box<dyn Error>> {
    let writer = BufWriter::new(File::create(path)?);
    PnmEncoder::new(writer)
        .with_subtype(PnmSubtype::Pixmap(SampleEncoding::Ascii))
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logger(args.verbose);

    let scene = load_scene(&args.scene)?;

    let seed = args.seed.unwrap_or_else(rand::random);
    log::info!("using seed {}", seed);
    let settings = RenderSettings {
        width: args.width,
        height: args.height,
        samples: args.samples,
        aperture: args.aperture,
        focus_distance: args.focus,
        seed,
    };

    // measure time
    let start = Instant::now();
    let frame = render(&scene, &settings)?;
    let total_time = start.elapsed();
    let stats = frame.stats;
    log::info!(
        "rendered {}x{} with {} samples per pixel in {:?}",
        settings.width,
        settings.height,
        settings.samples,
        total_time
    );
    log::info!(
        "{} rays: {} primary, {} shadow, {} reflected, {} refracted, deepest bounce {}",
        stats.total_rays(),
        stats.primary_rays,
        stats.shadow_rays,
        stats.reflected_rays,
        stats.refracted_rays,
        stats.deepest
    );

    let buffer = frame.to_image();
    if args.ascii {
        save_ascii(&buffer, &args.output)?;
    } else {
        buffer.save(&args.output)?;
    }
    log::info!("saved {}", args.output.display());
    Ok(())
}
