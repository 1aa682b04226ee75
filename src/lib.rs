//! Whitted style ray tracer for scenes of spheres, convex polyhedra, quadrics
//! and their constructive solid geometry combinations.

pub mod raytracing;
