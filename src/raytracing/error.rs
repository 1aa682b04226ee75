use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::parser::ParserError;

/// Fatal problems with a scene; rendering cannot start.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("cannot read scene file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParserError),
    #[error("scene has no lights, the first light is required for the ambient term")]
    NoLights,
    #[error("cannot render a {width}x{height} image")]
    EmptyImage { width: u32, height: u32 },
    #[error("object {object} uses pigment {index} but only {count} pigments are defined")]
    PigmentOutOfRange {
        object: usize,
        index: usize,
        count: usize,
    },
    #[error("object {object} uses finish {index} but only {count} finishes are defined")]
    FinishOutOfRange {
        object: usize,
        index: usize,
        count: usize,
    },
}

/// A texture could not be loaded. Never fatal: the pigment falls back to its
/// solid color.
#[derive(Debug, Error)]
pub enum TextureError {
    #[error("cannot open texture {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot decode texture {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("texture {} is empty", path.display())]
    Empty { path: PathBuf },
}
