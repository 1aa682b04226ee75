use std::mem;

use rand::Rng;

use super::core::{closest_hit, Finish, HitRecord, Light, Scene};
use super::{Ray, Vec3};

/// Deepest recursion level of reflected and refracted rays.
pub const MAX_DEPTH: u32 = 5;

/// Radius of the sphere over which point lights are sampled for soft shadows.
const LIGHT_RADIUS: f64 = 0.5;
const SHADOW_BIAS: f64 = 1e-3;
/// Shadow rays leaving at grazing angles need a larger offset to avoid acne.
const GRAZING_SHADOW_BIAS: f64 = 1e-2;
const GRAZING_COSINE: f64 = 0.1;
const SHADOW_TOLERANCE: f64 = 1e-4;
const SECONDARY_OFFSET: f64 = 1e-3;
const REFLECTION_ROUGHNESS: f64 = 1.0;
const REFRACTION_ROUGHNESS: f64 = 5.0;

/// Counters collected while tracing, merged across workers at the end.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TraceStats {
    pub primary_rays: u64,
    pub shadow_rays: u64,
    pub reflected_rays: u64,
    pub refracted_rays: u64,
    /// Calls to [`Tracer::trace`], primary rays included.
    pub traces: u64,
    pub deepest: u32,
}

impl TraceStats {
    pub fn merge(self, other: TraceStats) -> TraceStats {
        TraceStats {
            primary_rays: self.primary_rays + other.primary_rays,
            shadow_rays: self.shadow_rays + other.shadow_rays,
            reflected_rays: self.reflected_rays + other.reflected_rays,
            refracted_rays: self.refracted_rays + other.refracted_rays,
            traces: self.traces + other.traces,
            deepest: self.deepest.max(other.deepest),
        }
    }

    pub fn total_rays(&self) -> u64 {
        self.primary_rays + self.shadow_rays + self.reflected_rays + self.refracted_rays
    }
}

/// Mirror direction of `incident` about `normal`.
pub fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident.reflect(normal)
}

/// Refracted direction by Snell's law, `None` on total internal reflection.
///
/// `ior` is the ratio of the refractive indices across the surface. When
/// `incident` leaves through the side the normal points to, the ratio is
/// inverted and the normal flipped.
pub fn refract(incident: Vec3, normal: Vec3, ior: f64) -> Option<Vec3> {
    let i = incident.normalize();
    let mut n = normal.normalize();
    let mut cos_i = i.dot(n);
    let mut eta_i = 1.0;
    let mut eta_t = ior;
    if cos_i < 0.0 {
        cos_i = -cos_i;
    } else {
        mem::swap(&mut eta_i, &mut eta_t);
        n = -n;
    }
    let eta = eta_i / eta_t;
    let k = 1.0 - eta * eta * (1.0 - cos_i * cos_i);
    if k < 0.0 {
        return None;
    }
    Some((i * eta + n * (eta * cos_i - k.sqrt())).normalize())
}

/// Glossy jitter amplitude: rougher for lower specular exponents.
fn roughness(shininess: f64, scale: f64) -> f64 {
    if shininess > 1e-3 {
        scale / shininess
    } else {
        1.0
    }
}

/// Recursive ray tracer owning its random stream.
///
/// Each rendering worker owns one, so soft shadows and glossy jitter never
/// share a generator.
pub struct Tracer<'a, R> {
    scene: &'a Scene,
    rng: R,
    stats: TraceStats,
}

impl<'a, R: Rng> Tracer<'a, R> {
    pub fn new(scene: &'a Scene, rng: R) -> Self {
        Tracer {
            scene,
            rng,
            stats: TraceStats::default(),
        }
    }

    pub fn rng(&mut self) -> &mut R {
        &mut self.rng
    }

    pub fn stats(&self) -> TraceStats {
        self.stats
    }

    /// Traces a ray leaving the camera.
    pub fn trace_primary(&mut self, ray: &Ray) -> Vec3 {
        self.stats.primary_rays += 1;
        self.trace(ray, 0)
    }

    /// Color seen along `ray`; black past [`MAX_DEPTH`] or when nothing is hit.
    pub fn trace(&mut self, ray: &Ray, depth: u32) -> Vec3 {
        self.stats.traces += 1;
        self.stats.deepest = self.stats.deepest.max(depth);
        if depth > MAX_DEPTH {
            return Vec3::zero();
        }
        match closest_hit(self.scene, ray) {
            Some(hit) => self.shade(ray, &hit, depth),
            None => Vec3::zero(),
        }
    }

    fn shade(&mut self, ray: &Ray, hit: &HitRecord, depth: u32) -> Vec3 {
        let scene = self.scene;
        let object = &scene.objects[hit.object];
        let finish = &scene.finishes[object.finish];
        let base_color = scene.pigments[object.pigment].color_at(hit.point);

        let mut color = base_color * scene.ambient_light().color * finish.ambient;

        let view_dir = (ray.origin - hit.point).normalize();
        for light in scene.point_lights() {
            color += self.direct_light(hit, light, base_color, finish, view_dir);
        }

        if finish.reflectivity > 0.0 && depth < MAX_DEPTH {
            color += self.reflection(ray, hit, finish, depth) * finish.reflectivity;
        }

        if finish.transmissivity > 0.0 && depth < MAX_DEPTH {
            if let Some(transmitted) = self.refraction(ray, hit, finish, depth) {
                color += transmitted * finish.transmissivity;
            }
        }

        color.clamp()
    }

    /// Diffuse and specular contribution of a point light, zero when a random
    /// sample of the light is occluded.
    fn direct_light(
        &mut self,
        hit: &HitRecord,
        light: &Light,
        base_color: Vec3,
        finish: &Finish,
        view_dir: Vec3,
    ) -> Vec3 {
        let to_light = light.position - hit.point;
        let light_dir = to_light.normalize();
        let light_distance = to_light.len();

        let cos_angle = hit.normal.dot(light_dir);
        let bias = if cos_angle.abs() < GRAZING_COSINE {
            GRAZING_SHADOW_BIAS
        } else {
            SHADOW_BIAS
        };
        let shadow_origin = hit.point + hit.normal * bias;
        let sample = light.position + Vec3::random_in_unit_sphere(&mut self.rng) * LIGHT_RADIUS;
        let to_sample = sample - shadow_origin;
        let shadow_ray = Ray::new(shadow_origin, to_sample);
        self.stats.shadow_rays += 1;
        if let Some(blocker) = closest_hit(self.scene, &shadow_ray) {
            if blocker.t < to_sample.len() - SHADOW_TOLERANCE {
                return Vec3::zero();
            }
        }

        let attenuation = light.attenuation_at(light_distance);
        let diffuse =
            base_color * light.color * (finish.diffuse * cos_angle.max(0.0) * attenuation);
        let half_vector = (light_dir + view_dir).normalize();
        let highlight = hit.normal.dot(half_vector).max(0.0).powf(finish.shininess);
        let specular = light.color * (finish.specular * highlight * attenuation);
        diffuse + specular
    }

    fn reflection(&mut self, ray: &Ray, hit: &HitRecord, finish: &Finish, depth: u32) -> Vec3 {
        let mirror = reflect(ray.direction, hit.normal);
        let jitter = Vec3::random_in_cube(&mut self.rng)
            * roughness(finish.shininess, REFLECTION_ROUGHNESS);
        let mut direction = (mirror + jitter).normalize();
        if direction.dot(hit.normal) < 0.0 {
            // the perturbed ray would enter the surface
            direction = mirror;
        }
        let reflected = Ray::new(hit.point + hit.normal * SECONDARY_OFFSET, direction);
        self.stats.reflected_rays += 1;
        self.trace(&reflected, depth + 1)
    }

    fn refraction(
        &mut self,
        ray: &Ray,
        hit: &HitRecord,
        finish: &Finish,
        depth: u32,
    ) -> Option<Vec3> {
        let refracted = refract(ray.direction, hit.normal, finish.ior)?;
        let origin = hit.point + refracted * SECONDARY_OFFSET;
        let jitter = Vec3::random_in_cube(&mut self.rng)
            * roughness(finish.shininess, REFRACTION_ROUGHNESS);
        let transmitted = Ray::new(origin, refracted + jitter);
        self.stats.refracted_rays += 1;
        Some(self.trace(&transmitted, depth + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raytracing::core::SceneObject;
    use crate::raytracing::pigment::Pigment;
    use crate::raytracing::solid::Solid;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn light(position: Vec3, color: Vec3) -> Light {
        Light {
            position,
            color,
            attenuation: Vec3::new(1.0, 0.0, 0.0),
        }
    }

    fn ball_scene(finish: Finish, lights: Vec<Light>) -> Scene {
        Scene {
            lights,
            pigments: vec![Pigment::Solid(Vec3::one())],
            finishes: vec![finish],
            objects: vec![SceneObject {
                solid: Solid::sphere(Vec3::zero(), 1.0),
                pigment: 0,
                finish: 0,
            }],
            ..Default::default()
        }
    }

    fn looking_down_z() -> Ray {
        Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0))
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn black_scene_is_black() {
        let scene = ball_scene(
            Finish {
                ambient: 0.0,
                ..Default::default()
            },
            vec![light(Vec3::zero(), Vec3::zero())],
        );
        let mut tracer = Tracer::new(&scene, rng());
        assert_eq!(tracer.trace_primary(&looking_down_z()), Vec3::zero());
    }

    #[test]
    fn miss_is_black() {
        let scene = ball_scene(Finish::default(), vec![light(Vec3::zero(), Vec3::one())]);
        let mut tracer = Tracer::new(&scene, rng());
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(tracer.trace_primary(&ray), Vec3::zero());
    }

    #[test]
    fn first_light_only_adds_ambient() {
        let finish = Finish {
            ambient: 0.5,
            diffuse: 1.0,
            specular: 1.0,
            ..Default::default()
        };
        let scene = ball_scene(
            finish,
            vec![light(Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.4, 0.2, 1.0))],
        );
        let color = Tracer::new(&scene, rng()).trace_primary(&looking_down_z());
        assert_relative_eq!(color.x, 0.2);
        assert_relative_eq!(color.y, 0.1);
        assert_relative_eq!(color.z, 0.5);
    }

    #[test]
    fn lit_point_gets_diffuse_and_specular() {
        let finish = Finish {
            diffuse: 0.5,
            specular: 0.25,
            shininess: 10.0,
            ..Default::default()
        };
        let scene = ball_scene(
            finish,
            vec![
                light(Vec3::zero(), Vec3::zero()),
                light(Vec3::new(0.0, 0.0, 10.0), Vec3::one()),
            ],
        );
        let color = Tracer::new(&scene, rng()).trace_primary(&looking_down_z());
        // light, viewer and normal are aligned: full diffuse and full highlight
        assert_abs_diff_eq!(color.x, 0.75, epsilon = 1e-9);
        assert_abs_diff_eq!(color.y, 0.75, epsilon = 1e-9);
    }

    #[test]
    fn occluded_light_leaves_only_ambient() {
        let finish = Finish {
            ambient: 0.1,
            diffuse: 1.0,
            ..Default::default()
        };
        let mut scene = ball_scene(
            finish,
            vec![
                light(Vec3::zero(), Vec3::one()),
                light(Vec3::new(0.0, 10.0, 0.0), Vec3::one()),
            ],
        );
        scene.objects.push(SceneObject {
            solid: Solid::cuboid(Vec3::new(-5.0, 3.0, -5.0), Vec3::new(5.0, 4.0, 5.0)),
            pigment: 0,
            finish: 0,
        });
        let ray = Ray::new(Vec3::new(0.0, 1.0, 5.0), Vec3::new(0.0, -0.1, -1.0));
        let mut tracer = Tracer::new(&scene, rng());
        for _ in 0..20 {
            let color = tracer.trace_primary(&ray);
            assert_abs_diff_eq!(color.x, 0.1, epsilon = 1e-12);
        }
    }

    #[test]
    fn facing_mirrors_terminate() {
        let mirror = Finish {
            reflectivity: 1.0,
            shininess: 1e6,
            ..Default::default()
        };
        let scene = Scene {
            lights: vec![light(Vec3::zero(), Vec3::one())],
            pigments: vec![Pigment::Solid(Vec3::one())],
            finishes: vec![mirror],
            objects: vec![
                SceneObject {
                    solid: Solid::sphere(Vec3::new(0.0, 0.0, -3.0), 1.0),
                    pigment: 0,
                    finish: 0,
                },
                SceneObject {
                    solid: Solid::sphere(Vec3::new(0.0, 0.0, 3.0), 1.0),
                    pigment: 0,
                    finish: 0,
                },
            ],
            ..Default::default()
        };
        let mut tracer = Tracer::new(&scene, rng());
        let ray = Ray::new(Vec3::zero(), Vec3::new(0.0, 0.0, -1.0));
        tracer.trace_primary(&ray);
        let stats = tracer.stats();
        assert!(stats.deepest <= MAX_DEPTH);
        assert_eq!(stats.reflected_rays, MAX_DEPTH as u64);
        assert_eq!(stats.traces, MAX_DEPTH as u64 + 1);
    }

    #[test]
    fn reflective_and_transparent_recursion_is_bounded() {
        let glass = Finish {
            reflectivity: 0.5,
            transmissivity: 0.5,
            ior: 1.5,
            shininess: 1e6,
            ..Default::default()
        };
        let scene = ball_scene(glass, vec![light(Vec3::zero(), Vec3::one())]);
        let mut tracer = Tracer::new(&scene, rng());
        let color = tracer.trace_primary(&looking_down_z());
        let stats = tracer.stats();
        assert!(stats.deepest <= MAX_DEPTH);
        // a full binary tree of depth MAX_DEPTH at most
        assert!(stats.traces < 1 << (MAX_DEPTH + 1));
        assert!(color.x >= 0.0 && color.x <= 1.0);
    }

    #[test]
    fn refraction_at_normal_incidence_goes_straight() {
        let d = refract(Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.0, 0.0, 1.0), 1.5).unwrap();
        assert_abs_diff_eq!(d.z, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn refraction_follows_snell() {
        let incident = Vec3::new(1.0, 0.0, -1.0).normalize();
        let normal = Vec3::new(0.0, 0.0, 1.0);
        let d = refract(incident, normal, 1.5).unwrap();
        let sin_t = d.x / d.len();
        assert_relative_eq!(sin_t, (45f64).to_radians().sin() / 1.5, epsilon = 1e-12);
        assert!(d.z < 0.0);
    }

    #[test]
    fn total_internal_reflection_skips_refraction() {
        // leaving glass at 60 degrees from the normal
        let incident = Vec3::new(60f64.to_radians().sin(), 0.0, 60f64.to_radians().cos());
        assert!(refract(incident, Vec3::new(0.0, 0.0, 1.0), 1.5).is_none());
        // but below the critical angle it passes
        let steep = Vec3::new(20f64.to_radians().sin(), 0.0, 20f64.to_radians().cos());
        let out = refract(steep, Vec3::new(0.0, 0.0, 1.0), 1.5).unwrap();
        assert!(out.z > 0.0);
    }

    #[test]
    fn stats_merge_adds_counts_and_keeps_deepest() {
        let a = TraceStats {
            primary_rays: 1,
            shadow_rays: 2,
            reflected_rays: 3,
            refracted_rays: 4,
            traces: 5,
            deepest: 2,
        };
        let b = TraceStats {
            deepest: 4,
            ..a
        };
        let merged = a.merge(b);
        assert_eq!(merged.total_rays(), 20);
        assert_eq!(merged.traces, 10);
        assert_eq!(merged.deepest, 4);
    }
}
