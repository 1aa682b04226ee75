//! Boolean combination of solids.
//!
//! A composite is evaluated along a ray by collecting every boundary crossing
//! of every child, sorting them by distance and sweeping them while tracking
//! which children contain the current point. Each time the composite
//! membership changes the crossing is a visible boundary of the composite.

use super::core::EPSILON;
use super::solid::{HitResult, RayHittable, Solid};
use super::{Ray, Vec3};

/// Crossings closer than this are treated as simultaneous.
const TIE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsgOperation {
    /// The child adds material.
    Union,
    /// The child removes material wherever it is entered.
    Difference,
}

#[derive(Debug, Clone)]
pub struct CsgChild {
    pub operation: CsgOperation,
    pub solid: Solid,
}

#[derive(Debug, Clone, Default)]
pub struct Csg {
    pub children: Vec<CsgChild>,
}

/// A point where the ray enters or leaves a solid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    pub t: f64,
    pub normal: Vec3,
    /// Index of the child of the enclosing CSG node that produced it.
    pub child: usize,
}

impl Crossing {
    pub fn new(t: f64, normal: Vec3) -> Crossing {
        Crossing {
            t,
            normal,
            child: 0,
        }
    }
}

impl Csg {
    pub fn new() -> Csg {
        Csg::default()
    }

    pub fn union(mut self, solid: Solid) -> Csg {
        self.children.push(CsgChild {
            operation: CsgOperation::Union,
            solid,
        });
        self
    }

    pub fn difference(mut self, solid: Solid) -> Csg {
        self.children.push(CsgChild {
            operation: CsgOperation::Difference,
            solid,
        });
        self
    }

    /// A point is inside the composite when it is inside at least one union
    /// child and inside no difference child.
    fn contains(&self, inside: &[bool]) -> bool {
        let mut in_positive = false;
        for (child, &is_inside) in self.children.iter().zip(inside) {
            if !is_inside {
                continue;
            }
            match child.operation {
                CsgOperation::Union => in_positive = true,
                CsgOperation::Difference => return false,
            }
        }
        in_positive
    }

    /// Whether the current state of `child` accounts for the composite being
    /// `now_inside`.
    fn explains(&self, child: usize, inside: &[bool], now_inside: bool) -> bool {
        match self.children[child].operation {
            CsgOperation::Union => inside[child] == now_inside,
            CsgOperation::Difference => inside[child] != now_inside,
        }
    }

    /// Boundary crossings of the composite, in ascending order of `t`.
    pub fn crossings(&self, ray: &Ray) -> Vec<Crossing> {
        let mut events = Vec::new();
        for (index, child) in self.children.iter().enumerate() {
            events.extend(
                child
                    .solid
                    .crossings(ray)
                    .into_iter()
                    .map(|crossing| Crossing {
                        child: index,
                        ..crossing
                    }),
            );
        }
        // stable sort: crossings at the same t keep child order
        events.sort_by(|a, b| a.t.total_cmp(&b.t));

        let mut inside = vec![false; self.children.len()];
        let mut was_inside = false;
        let mut boundary = Vec::new();
        let mut start = 0;
        while start < events.len() {
            let mut end = start + 1;
            while end < events.len()
                && (events[end].t == events[start].t
                    || events[end].t - events[start].t <= TIE_EPSILON)
            {
                end += 1;
            }
            let batch = &events[start..end];
            for event in batch {
                inside[event.child] = !inside[event.child];
            }

            let is_inside = self.contains(&inside);
            if is_inside != was_inside {
                let driver = batch
                    .iter()
                    .find(|event| self.explains(event.child, &inside, is_inside))
                    .unwrap_or(&batch[0]);
                let mut visible = *driver;
                if self.children[driver.child].operation == CsgOperation::Difference {
                    // the visible wall belongs to the cavity carved by the child
                    visible.normal = visible.normal * -1.0;
                }
                boundary.push(visible);
                was_inside = is_inside;
            }
            start = end;
        }
        boundary
    }
}

impl RayHittable for Csg {
    fn hit(&self, ray: &Ray) -> Option<HitResult> {
        self.crossings(ray)
            .into_iter()
            .filter(|crossing| crossing.t > EPSILON)
            .min_by(|a, b| a.t.total_cmp(&b.t))
            .map(|crossing| HitResult {
                t: crossing.t,
                normal: crossing.normal,
            })
    }
}
