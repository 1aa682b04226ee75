use super::error::SceneError;
use super::pigment::Pigment;
use super::solid::{RayHittable, Solid};
use super::{Ray, Vec3};

/// Hits closer than this to the ray origin are self intersections.
pub const EPSILON: f64 = 1e-3;

/// Camera placement as described by the scene.
#[derive(Debug, Clone, Copy)]
pub struct View {
    pub eye: Vec3,
    pub look_at: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fovy: f64,
}

impl Default for View {
    fn default() -> Self {
        View {
            eye: Vec3::zero(),
            look_at: Vec3::new(0.0, 0.0, -1.0),
            up: Vec3::y_axis(),
            fovy: 40.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Light {
    pub position: Vec3,
    pub color: Vec3,
    /// Constant, linear and quadratic terms of the distance falloff.
    pub attenuation: Vec3,
}

impl Light {
    /// Inverse quadratic falloff at `distance`. A degenerate (non positive)
    /// denominator means no falloff.
    pub fn attenuation_at(&self, distance: f64) -> f64 {
        let denominator = self.attenuation.x
            + self.attenuation.y * distance
            + self.attenuation.z * distance * distance;
        if denominator > 0.0 {
            1.0 / denominator
        } else {
            1.0
        }
    }
}

/// Reflectance coefficients of a surface.
#[derive(Debug, Clone, Copy)]
pub struct Finish {
    pub ambient: f64,
    pub diffuse: f64,
    pub specular: f64,
    pub shininess: f64,
    pub reflectivity: f64,
    pub transmissivity: f64,
    /// Ratio of the refractive indices across the surface.
    pub ior: f64,
}

impl Default for Finish {
    fn default() -> Self {
        Finish {
            ambient: 0.0,
            diffuse: 0.0,
            specular: 0.0,
            shininess: 1.0,
            reflectivity: 0.0,
            transmissivity: 0.0,
            ior: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SceneObject {
    pub solid: Solid,
    pub pigment: usize,
    pub finish: usize,
}

/// Immutable description of everything that is rendered.
///
/// The first light only supplies the ambient term; every following light is a
/// point light casting shadows.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub view: View,
    pub lights: Vec<Light>,
    pub pigments: Vec<Pigment>,
    pub finishes: Vec<Finish>,
    pub objects: Vec<SceneObject>,
}

impl Scene {
    /// Checks the invariants shading relies on.
    pub fn validate(&self) -> Result<(), SceneError> {
        if self.lights.is_empty() {
            return Err(SceneError::NoLights);
        }
        for (index, object) in self.objects.iter().enumerate() {
            if object.pigment >= self.pigments.len() {
                return Err(SceneError::PigmentOutOfRange {
                    object: index,
                    index: object.pigment,
                    count: self.pigments.len(),
                });
            }
            if object.finish >= self.finishes.len() {
                return Err(SceneError::FinishOutOfRange {
                    object: index,
                    index: object.finish,
                    count: self.finishes.len(),
                });
            }
        }
        Ok(())
    }

    pub fn ambient_light(&self) -> &Light {
        &self.lights[0]
    }

    pub fn point_lights(&self) -> &[Light] {
        &self.lights[1..]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HitRecord {
    pub t: f64,
    pub point: Vec3,
    pub normal: Vec3,
    /// Index of the struck top level object.
    pub object: usize,
}

/// Closest hit among all the objects of the scene, by linear scan.
pub fn closest_hit(scene: &Scene, ray: &Ray) -> Option<HitRecord> {
    let mut closest: Option<HitRecord> = None;
    for (index, object) in scene.objects.iter().enumerate() {
        if let Some(result) = object.solid.hit(ray) {
            if closest.map_or(true, |c| result.t < c.t) {
                closest = Some(HitRecord {
                    t: result.t,
                    point: ray.at(result.t),
                    normal: result.normal,
                    object: index,
                });
            }
        }
    }
    closest
}
