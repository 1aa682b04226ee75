pub mod camera;
pub mod core;
pub mod csg;
pub mod error;
pub mod math;
pub mod parser;
pub mod pigment;
pub mod render;
pub mod shading;
pub mod solid;

pub use math::*;
