use super::Vec3;

/// Boundary of the half-space `a*x + b*y + c*z + d <= 0`.
///
/// Coefficients are scaled at construction so the normal `(a, b, c)` has unit
/// length and `signed_distance` is a true euclidean distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    normal: Vec3,
    d: f64,
}

impl Plane {
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Plane {
        let normal = Vec3::new(a, b, c);
        let len = normal.len();
        if len > 0.0 {
            Plane {
                normal: normal / len,
                d: d / len,
            }
        } else {
            Plane { normal, d }
        }
    }

    #[inline(always)]
    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Positive outside the half-space, negative inside.
    #[inline(always)]
    pub fn signed_distance(&self, point: Vec3) -> f64 {
        self.normal.dot(point) + self.d
    }
}
