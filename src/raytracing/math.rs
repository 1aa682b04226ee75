pub mod plane;
pub mod ray;
pub mod vec3;

pub use plane::*;
pub use ray::*;
pub use vec3::*;
