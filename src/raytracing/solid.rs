use super::core::EPSILON;
use super::csg::{Crossing, Csg};
use super::{Plane, Ray, Vec3};

/// Faces whose normal is this close to perpendicular to the ray are parallel.
const PARALLEL_EPSILON: f64 = 1e-10;
/// Polyhedron hits further than this come from numerical blow-up, not geometry.
const FAR_LIMIT: f64 = 1e10;

#[derive(Clone, Copy, Debug)]
pub struct HitResult {
    pub t: f64,
    pub normal: Vec3,
}

pub trait RayHittable {
    /// Nearest surface crossing with `t >= EPSILON`.
    fn hit(&self, ray: &Ray) -> Option<HitResult>;
}

/// General second degree surface
/// `Ax² + By² + Cz² + Dxy + Exz + Fyz + Gx + Hy + Iz + J = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Quadric {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
    pub g: f64,
    pub h: f64,
    pub i: f64,
    pub j: f64,
}

impl From<[f64; 10]> for Quadric {
    fn from(k: [f64; 10]) -> Self {
        Quadric {
            a: k[0],
            b: k[1],
            c: k[2],
            d: k[3],
            e: k[4],
            f: k[5],
            g: k[6],
            h: k[7],
            i: k[8],
            j: k[9],
        }
    }
}

impl Quadric {
    /// Coefficients of `a t² + b t + c = 0` obtained by substituting the ray.
    fn ray_coefficients(&self, ray: &Ray) -> (f64, f64, f64) {
        let o = ray.origin;
        let d = ray.direction;
        let a = self.a * d.x * d.x
            + self.b * d.y * d.y
            + self.c * d.z * d.z
            + self.d * d.x * d.y
            + self.e * d.x * d.z
            + self.f * d.y * d.z;
        let b = 2.0 * self.a * o.x * d.x
            + 2.0 * self.b * o.y * d.y
            + 2.0 * self.c * o.z * d.z
            + self.d * (o.x * d.y + o.y * d.x)
            + self.e * (o.x * d.z + o.z * d.x)
            + self.f * (o.y * d.z + o.z * d.y)
            + self.g * d.x
            + self.h * d.y
            + self.i * d.z;
        let c = self.a * o.x * o.x
            + self.b * o.y * o.y
            + self.c * o.z * o.z
            + self.d * o.x * o.y
            + self.e * o.x * o.z
            + self.f * o.y * o.z
            + self.g * o.x
            + self.h * o.y
            + self.i * o.z
            + self.j;
        (a, b, c)
    }

    /// Normalized gradient of the implicit function.
    pub fn normal_at(&self, p: Vec3) -> Vec3 {
        Vec3::new(
            2.0 * self.a * p.x + self.d * p.y + self.e * p.z + self.g,
            2.0 * self.b * p.y + self.d * p.x + self.f * p.z + self.h,
            2.0 * self.c * p.z + self.e * p.x + self.f * p.y + self.i,
        )
        .normalize()
    }
}

/// Real roots of a polynomial of degree at most two, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Roots {
    None,
    One(f64),
    Two(f64, f64),
}

impl Roots {
    fn of_quadratic(a: f64, b: f64, c: f64) -> Roots {
        if a.abs() < f64::EPSILON {
            // the ray runs parallel to an asymptotic direction: one crossing at most
            if b.abs() < f64::EPSILON {
                return Roots::None;
            }
            return Roots::One(-c / b);
        }
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return Roots::None;
        }
        let sqrt_disc = discriminant.sqrt();
        let t1 = (-b - sqrt_disc) / (2.0 * a);
        let t2 = (-b + sqrt_disc) / (2.0 * a);
        Roots::Two(t1.min(t2), t1.max(t2))
    }

    /// The smaller root unless it is behind the self intersection guard,
    /// then the larger one.
    fn nearest(self) -> Option<f64> {
        match self {
            Roots::None => None,
            Roots::One(t) => (t >= EPSILON).then_some(t),
            Roots::Two(t1, t2) => {
                if t1 >= EPSILON {
                    Some(t1)
                } else if t2 >= EPSILON {
                    Some(t2)
                } else {
                    None
                }
            }
        }
    }

    fn iter(self) -> impl Iterator<Item = f64> {
        let (first, second) = match self {
            Roots::None => (None, None),
            Roots::One(t) => (Some(t), None),
            Roots::Two(t1, t2) => (Some(t1), Some(t2)),
        };
        first.into_iter().chain(second)
    }
}

/// Whether `a t² + b t + c` is negative as `t` goes to minus infinity, with
/// the same degeneracy thresholds as [`Roots::of_quadratic`].
fn negative_at_start(a: f64, b: f64, c: f64) -> bool {
    if a.abs() >= f64::EPSILON {
        a < 0.0
    } else if b.abs() >= f64::EPSILON {
        b > 0.0
    } else {
        c < 0.0
    }
}

fn sphere_roots(center: Vec3, radius: f64, ray: &Ray) -> Roots {
    let oc = ray.origin - center;
    let a = ray.direction.dot(ray.direction);
    let b = 2.0 * oc.dot(ray.direction);
    let c = oc.dot(oc) - radius * radius;
    Roots::of_quadratic(a, b, c)
}

/// Result of clipping a ray against every face of a convex polyhedron.
struct Slab {
    t_near: f64,
    near_normal: Vec3,
    t_far: f64,
    /// Outward normal of the exit face.
    far_normal: Vec3,
}

fn clip_slab(faces: &[Plane], ray: &Ray) -> Option<Slab> {
    let mut slab = Slab {
        t_near: f64::NEG_INFINITY,
        near_normal: Vec3::zero(),
        t_far: f64::INFINITY,
        far_normal: Vec3::zero(),
    };
    for plane in faces {
        let normal = plane.normal();
        let denom = normal.dot(ray.direction);
        let distance = plane.signed_distance(ray.origin);
        if denom.abs() < PARALLEL_EPSILON {
            // parallel: the ray is either always inside this face or never
            if distance > 0.0 {
                return None;
            }
            continue;
        }
        let t = -distance / denom;
        if denom < 0.0 {
            if t > slab.t_near {
                slab.t_near = t;
                slab.near_normal = normal;
            }
        } else if t < slab.t_far {
            slab.t_far = t;
            slab.far_normal = normal;
        }
        if slab.t_near > slab.t_far {
            return None;
        }
    }
    Some(slab)
}

#[derive(Debug, Clone)]
pub enum Solid {
    Sphere { center: Vec3, radius: f64 },
    /// Convex region bounded by the intersection of the faces' half-spaces.
    Polyhedron { faces: Vec<Plane> },
    Quadric(Quadric),
    Csg(Csg),
}

impl RayHittable for Solid {
    fn hit(&self, ray: &Ray) -> Option<HitResult> {
        match self {
            Solid::Sphere { center, radius } => {
                let t = sphere_roots(*center, *radius, ray).nearest()?;
                let normal = (ray.at(t) - *center).normalize();
                Some(HitResult { t, normal })
            }
            Solid::Polyhedron { faces } => {
                let slab = clip_slab(faces, ray)?;
                let (t, normal) = if slab.t_near < EPSILON {
                    // the origin is inside the solid, the exit face is the visible one
                    (slab.t_far, slab.far_normal * -1.0)
                } else {
                    (slab.t_near, slab.near_normal)
                };
                if t < EPSILON || t > FAR_LIMIT {
                    return None;
                }
                Some(HitResult {
                    t,
                    normal: normal.normalize(),
                })
            }
            Solid::Quadric(quadric) => {
                let (a, b, c) = quadric.ray_coefficients(ray);
                let t = Roots::of_quadratic(a, b, c).nearest()?;
                Some(HitResult {
                    t,
                    normal: quadric.normal_at(ray.at(t)),
                })
            }
            Solid::Csg(csg) => csg.hit(ray),
        }
    }
}

impl Solid {
    pub fn sphere(center: Vec3, radius: f64) -> Solid {
        Solid::Sphere { center, radius }
    }

    /// Axis aligned box built from six faces.
    pub fn cuboid(min: Vec3, max: Vec3) -> Solid {
        Solid::Polyhedron {
            faces: vec![
                Plane::new(-1.0, 0.0, 0.0, min.x),
                Plane::new(1.0, 0.0, 0.0, -max.x),
                Plane::new(0.0, -1.0, 0.0, min.y),
                Plane::new(0.0, 1.0, 0.0, -max.y),
                Plane::new(0.0, 0.0, -1.0, min.z),
                Plane::new(0.0, 0.0, 1.0, -max.z),
            ],
        }
    }

    /// Every boundary crossing along the whole line of the ray, including the
    /// ones behind its origin, in ascending order of `t`.
    ///
    /// The child index of the returned crossings is left at zero; a parent CSG
    /// node overwrites it.
    pub fn crossings(&self, ray: &Ray) -> Vec<Crossing> {
        match self {
            Solid::Sphere { center, radius } => sphere_roots(*center, *radius, ray)
                .iter()
                .map(|t| Crossing::new(t, (ray.at(t) - *center).normalize()))
                .collect(),
            Solid::Polyhedron { faces } => match clip_slab(faces, ray) {
                Some(slab) => vec![
                    Crossing::new(slab.t_near, slab.near_normal.normalize()),
                    Crossing::new(slab.t_far, slab.far_normal.normalize()),
                ],
                None => Vec::new(),
            },
            Solid::Quadric(quadric) => {
                let (a, b, c) = quadric.ray_coefficients(ray);
                let mut crossings = Vec::with_capacity(3);
                if negative_at_start(a, b, c) {
                    // the interior reaches infinitely far back along the line
                    crossings.push(Crossing::new(f64::NEG_INFINITY, ray.direction * -1.0));
                }
                crossings.extend(
                    Roots::of_quadratic(a, b, c)
                        .iter()
                        .map(|t| Crossing::new(t, quadric.normal_at(ray.at(t)))),
                );
                crossings
            }
            Solid::Csg(csg) => csg.crossings(ray),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn unit_cube() -> Solid {
        Solid::cuboid(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn sphere_hit_in_front() {
        let sphere = Solid::sphere(Vec3::new(0.0, 0.0, -5.0), 1.0);
        let ray = Ray::new(Vec3::zero(), Vec3::new(0.0, 0.0, -1.0));
        let hit = sphere.hit(&ray).unwrap();
        assert_relative_eq!(hit.t, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(hit.normal.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn sphere_near_and_far_along_axis() {
        for (d, r) in [(5.0, 1.0), (12.5, 3.25), (100.0, 0.5)] {
            let sphere = Solid::sphere(Vec3::new(d, 0.0, 0.0), r);
            let ray = Ray::new(Vec3::zero(), Vec3::new(1.0, 0.0, 0.0));
            let crossings = sphere.crossings(&ray);
            assert_eq!(crossings.len(), 2);
            assert_relative_eq!(crossings[0].t, d - r, max_relative = 1e-9);
            assert_relative_eq!(crossings[1].t, d + r, max_relative = 1e-9);
            assert_relative_eq!(sphere.hit(&ray).unwrap().t, d - r, max_relative = 1e-9);
        }
    }

    #[test]
    fn sphere_from_inside_uses_far_root() {
        let sphere = Solid::sphere(Vec3::zero(), 2.0);
        let ray = Ray::new(Vec3::zero(), Vec3::new(0.0, 1.0, 0.0));
        let hit = sphere.hit(&ray).unwrap();
        assert_relative_eq!(hit.t, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(hit.normal.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn sphere_behind_and_off_axis_miss() {
        let ray = Ray::new(Vec3::zero(), Vec3::new(0.0, 0.0, -1.0));
        assert!(Solid::sphere(Vec3::new(5.0, 5.0, 5.0), 1.0).hit(&ray).is_none());
        assert!(Solid::sphere(Vec3::new(0.0, 0.0, 5.0), 1.0).hit(&ray).is_none());
    }

    #[test]
    fn origin_on_surface_does_not_self_intersect() {
        let sphere = Solid::sphere(Vec3::zero(), 1.0);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(sphere.hit(&ray).is_none());
    }

    #[test]
    fn quadric_sphere_matches_sphere() {
        let radius = 1.5;
        let quadric = Solid::Quadric(Quadric {
            a: 1.0,
            b: 1.0,
            c: 1.0,
            j: -radius * radius,
            ..Default::default()
        });
        let sphere = Solid::sphere(Vec3::zero(), radius);
        let rays = [
            Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.0, 0.0, -1.0)),
            Ray::new(Vec3::new(3.0, 0.5, 4.0), Vec3::new(-0.6, -0.1, -0.8)),
            Ray::new(Vec3::new(0.2, 0.1, 0.0), Vec3::new(1.0, 1.0, 0.3)),
            Ray::new(Vec3::new(5.0, 5.0, 0.0), Vec3::new(1.0, 0.0, 0.0)),
        ];
        for ray in rays {
            match (quadric.hit(&ray), sphere.hit(&ray)) {
                (Some(q), Some(s)) => {
                    assert_relative_eq!(q.t, s.t, epsilon = 1e-9);
                    assert_abs_diff_eq!(q.normal.x, s.normal.x, epsilon = 1e-9);
                    assert_abs_diff_eq!(q.normal.y, s.normal.y, epsilon = 1e-9);
                    assert_abs_diff_eq!(q.normal.z, s.normal.z, epsilon = 1e-9);
                }
                (None, None) => {}
                (q, s) => panic!("quadric {:?} and sphere {:?} disagree", q, s),
            }
        }
    }

    #[test]
    fn quadric_cylinder_parallel_to_axis_misses() {
        // x² + y² = 1, ray along z outside of it
        let cylinder = Solid::Quadric(Quadric {
            a: 1.0,
            b: 1.0,
            j: -1.0,
            ..Default::default()
        });
        let ray = Ray::new(Vec3::new(3.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(cylinder.hit(&ray).is_none());
        let across = Ray::new(Vec3::new(3.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        let hit = cylinder.hit(&across).unwrap();
        assert_relative_eq!(hit.t, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(hit.normal.x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn quadric_plane_has_single_crossing() {
        // z - 2 = 0
        let plane = Solid::Quadric(Quadric {
            i: 1.0,
            j: -2.0,
            ..Default::default()
        });
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let crossings = plane.crossings(&ray);
        assert_eq!(crossings.len(), 1);
        assert_relative_eq!(crossings[0].t, 3.0);
        assert_relative_eq!(plane.hit(&ray).unwrap().t, 3.0);
    }

    #[test]
    fn unbounded_quadric_interior_starts_inside() {
        // z - 2 <= 0 holds far back along a ray going up
        let plane = Solid::Quadric(Quadric {
            i: 1.0,
            j: -2.0,
            ..Default::default()
        });
        let up = Ray::new(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0));
        let crossings = plane.crossings(&up);
        assert_eq!(crossings.len(), 2);
        assert_eq!(crossings[0].t, f64::NEG_INFINITY);
        assert_relative_eq!(crossings[1].t, 2.0);
        assert_relative_eq!(plane.hit(&up).unwrap().t, 2.0);

        // a ray along the axis of a cylinder is inside over its whole length
        let cylinder = Solid::Quadric(Quadric {
            a: 1.0,
            b: 1.0,
            j: -1.0,
            ..Default::default()
        });
        let axis = Ray::new(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0));
        let crossings = cylinder.crossings(&axis);
        assert_eq!(crossings.len(), 1);
        assert_eq!(crossings[0].t, f64::NEG_INFINITY);
        let outside = Ray::new(Vec3::new(3.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(cylinder.crossings(&outside).is_empty());

        // both nappes of a cone open towards infinity
        let cone = Solid::Quadric(Quadric {
            a: 1.0,
            b: 1.0,
            c: -1.0,
            ..Default::default()
        });
        let along = Ray::new(Vec3::new(0.5, 0.0, -10.0), Vec3::new(0.0, 0.0, 1.0));
        let ts: Vec<f64> = cone.crossings(&along).iter().map(|c| c.t).collect();
        assert_eq!(ts.len(), 3);
        assert_eq!(ts[0], f64::NEG_INFINITY);
        assert_relative_eq!(ts[1], 9.5, epsilon = 1e-9);
        assert_relative_eq!(ts[2], 10.5, epsilon = 1e-9);
    }

    #[test]
    fn cube_front_face() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let hit = unit_cube().hit(&ray).unwrap();
        assert_relative_eq!(hit.t, 4.0, epsilon = 1e-12);
        assert_eq!(hit.normal, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn cube_from_inside_hits_exit_face() {
        let ray = Ray::new(Vec3::zero(), Vec3::new(1.0, 0.0, 0.0));
        let hit = unit_cube().hit(&ray).unwrap();
        assert_relative_eq!(hit.t, 1.0, epsilon = 1e-12);
        assert_eq!(hit.normal, Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn cube_parallel_outside_misses() {
        let ray = Ray::new(Vec3::new(0.0, 2.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(unit_cube().hit(&ray).is_none());
        assert!(unit_cube().crossings(&ray).is_empty());
    }

    #[test]
    fn cube_diagonal_miss() {
        let ray = Ray::new(Vec3::new(3.0, 0.0, 5.0), Vec3::new(0.0, 1.0, -1.0));
        assert!(unit_cube().hit(&ray).is_none());
    }

    #[test]
    fn open_polyhedron_is_not_geometry() {
        // a single half-space z <= 0 seen from inside never closes
        let half_space = Solid::Polyhedron {
            faces: vec![Plane::new(0.0, 0.0, 1.0, 0.0)],
        };
        let ray = Ray::new(Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(half_space.hit(&ray).is_none());
    }

    #[test]
    fn cube_crossings_use_outward_normals() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let crossings = unit_cube().crossings(&ray);
        assert_eq!(crossings.len(), 2);
        assert_relative_eq!(crossings[0].t, 4.0);
        assert_relative_eq!(crossings[1].t, 6.0);
        assert_eq!(crossings[0].normal, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(crossings[1].normal, Vec3::new(0.0, 0.0, -1.0));
    }
}
