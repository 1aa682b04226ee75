use rand::Rng;

use super::core::View;
use super::math::{Ray, Vec3};

pub struct Camera {
    forward: Vec3,
    up: Vec3,
    right: Vec3,
    position: Vec3,
    half_width: f64,
    half_height: f64,
    aperture: f64,
    focus_distance: f64,
}

impl Camera {
    /// Creates a pinhole camera placed as described by the view, for an image
    /// with the given width / height ratio.
    pub fn look_at(view: &View, aspect_ratio: f64) -> Self {
        let forward = (view.look_at - view.eye).normalize();
        let mut right = forward.cross(view.up).normalize();
        if right.squared_len() == 0.0 {
            // up is parallel to the viewing direction, any perpendicular will do
            let fallback = if forward.y.abs() < 0.9 {
                Vec3::y_axis()
            } else {
                Vec3::new(1.0, 0.0, 0.0)
            };
            right = forward.cross(fallback).normalize();
        }
        // to get an orthonormal base, we should calculate the up vector with two perpendicular vectors
        let up = right.cross(forward).normalize();
        let half_height = (view.fovy.to_radians() / 2.0).tan();
        Self {
            forward,
            up,
            right,
            position: view.eye,
            half_width: half_height * aspect_ratio,
            half_height,
            aperture: 0.0,
            focus_distance: 1.0,
        }
    }

    /// Turns the camera into a thin lens of radius `aperture` focused at
    /// `focus_distance`. A zero aperture keeps it a pinhole.
    pub fn with_lens(mut self, aperture: f64, focus_distance: f64) -> Self {
        self.aperture = aperture;
        self.focus_distance = focus_distance;
        self
    }

    /// Ray through the screen point `(u, v)`, both in [-1, 1] with `v` pointing up.
    pub fn shoot_to(&self, u: f64, v: f64) -> Ray {
        let direction = self.forward
            + self.right * (u * self.half_width)
            + self.up * (v * self.half_height);
        Ray::new(self.position, direction)
    }

    /// Like [`Camera::shoot_to`] but with the origin sampled over the lens and
    /// the direction re-aimed at the focal point of the pinhole ray.
    pub fn shoot_through_lens<R: Rng>(&self, u: f64, v: f64, rng: &mut R) -> Ray {
        let ray = self.shoot_to(u, v);
        if self.aperture <= 0.0 {
            return ray;
        }
        let (dx, dy) = loop {
            let dx: f64 = rng.gen_range(-1.0..1.0);
            let dy: f64 = rng.gen_range(-1.0..1.0);
            if dx * dx + dy * dy <= 1.0 {
                break (dx, dy);
            }
        };
        let origin = self.position + (self.right * dx + self.up * dy) * self.aperture;
        let focus_point = ray.at(self.focus_distance);
        Ray::new(origin, focus_point - origin)
    }
}
