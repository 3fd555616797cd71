use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f64::consts::PI;

use geo_types::{Coord, LineString};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};
use tracing::warn;

use crate::{error::Result, traits::PolygonSimplifier, types::Contour};

/// Tolerance that scales with the shape being simplified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveTolerance {
    /// epsilon >= rel_to_diag * bounding box diagonal
    pub rel_to_diag: Option<f64>,
    /// epsilon >= rel_to_avg_edge * mean edge length
    pub rel_to_avg_edge: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum CornerMode {
    /// Sharp corners are never removed
    #[default]
    Hard,
    /// Sharp corners cost more to remove; larger weight protects more
    Soft { weight: f64 },
}

/// Protection for vertices whose interior angle is below `min_angle_deg`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CornerProtection {
    /// 0 disables protection
    pub min_angle_deg: f64,
    #[serde(flatten)]
    pub mode: CornerMode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SimplifyOptions {
    /// Vertex budget; `None` leaves the count to the tolerance alone
    pub max_points: Option<usize>,
    /// Base tolerance in pixels
    pub epsilon: f64,
    /// Treat the input as a closed ring; auto-detected when `None`
    pub closed: Option<bool>,
    pub adaptive: Option<AdaptiveTolerance>,
    pub corners: Option<CornerProtection>,
    /// Safety cap on queue pops, default 32 per input point
    pub max_iterations: Option<usize>,
}

/// Which simplifier a pipeline runs.
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SimplifierKind {
    /// Priority-queue point removal with vertex budget
    #[default]
    PriorityRemoval,
    /// Douglas-Peucker from the geo crate, tolerance only
    DouglasPeucker,
}

impl SimplifierKind {
    pub fn build(self) -> Box<dyn PolygonSimplifier> {
        match self {
            SimplifierKind::PriorityRemoval => Box::new(PriorityRemovalSimplifier),
            SimplifierKind::DouglasPeucker => Box::new(DouglasPeuckerSimplifier),
        }
    }
}

/// Removes the least significant vertex until the budget and tolerance are met
#[derive(Debug, Clone, Default)]
pub struct PriorityRemovalSimplifier;

impl PolygonSimplifier for PriorityRemovalSimplifier {
    fn simplify(&self, contour: &Contour, options: &SimplifyOptions) -> Result<Contour> {
        Ok(simplify_contour(contour, options))
    }

    fn name(&self) -> &'static str {
        SimplifierKind::PriorityRemoval.into()
    }
}

/// Douglas-Peucker simplifier using geo crate's implementation
#[derive(Debug, Clone, Default)]
pub struct DouglasPeuckerSimplifier;

impl PolygonSimplifier for DouglasPeuckerSimplifier {
    fn name(&self) -> &'static str {
        SimplifierKind::DouglasPeucker.into()
    }

    fn simplify(&self, contour: &Contour, options: &SimplifyOptions) -> Result<Contour> {
        use geo::Simplify;

        let coords: Vec<Coord<f64>> = contour
            .points()
            .map(|[x, y]| Coord {
                x: x as f64,
                y: y as f64,
            })
            .collect();
        let simplified = LineString::new(coords).simplify(&options.epsilon);

        Ok(Contour::from_points(
            simplified
                .coords()
                .map(|c| [c.x.round() as u16, c.y.round() as u16]),
        ))
    }
}

/// Squared distance from `p` to the segment `a`-`b`
pub fn point_segment_dist_sq(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let ab = [b[0] - a[0], b[1] - a[1]];
    let ap = [p[0] - a[0], p[1] - a[1]];
    let ab_len_sq = ab[0] * ab[0] + ab[1] * ab[1];
    if ab_len_sq == 0.0 {
        return ap[0] * ap[0] + ap[1] * ap[1];
    }

    let t = ((ap[0] * ab[0] + ap[1] * ab[1]) / ab_len_sq).clamp(0.0, 1.0);
    let dx = p[0] - (a[0] + t * ab[0]);
    let dy = p[1] - (a[1] + t * ab[1]);
    dx * dx + dy * dy
}

/// Base epsilon raised by the adaptive terms, then clamped.
///
/// Edge lengths are measured around the closed ring.
pub fn effective_epsilon(points: &[[f64; 2]], epsilon: f64, adaptive: Option<&AdaptiveTolerance>) -> f64 {
    let Some(adaptive) = adaptive else {
        return epsilon;
    };
    if points.is_empty() {
        return epsilon;
    }

    let (mut min, mut max) = (points[0], points[0]);
    for p in points {
        min = [min[0].min(p[0]), min[1].min(p[1])];
        max = [max[0].max(p[0]), max[1].max(p[1])];
    }
    let diag = (max[0] - min[0]).hypot(max[1] - min[1]);

    let n = points.len();
    let perimeter: f64 = (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            (b[0] - a[0]).hypot(b[1] - a[1])
        })
        .sum();
    let avg_edge = perimeter / n as f64;

    let mut eps = epsilon;
    if let Some(rel) = adaptive.rel_to_diag {
        eps = eps.max(rel * diag);
    }
    if let Some(rel) = adaptive.rel_to_avg_edge {
        eps = eps.max(rel * avg_edge);
    }
    if let Some(lo) = adaptive.min {
        eps = eps.max(lo);
    }
    if let Some(hi) = adaptive.max {
        eps = eps.min(hi);
    }
    eps
}

/// Reduce a contour to at most `max_points` vertices within tolerance.
///
/// The output keeps the input winding and only ever contains input points.
/// A closed input (last point repeating the first) comes back closed.
pub fn simplify_contour(contour: &Contour, options: &SimplifyOptions) -> Contour {
    if contour.len() < 3 {
        return contour.clone();
    }

    let closed = options.closed.unwrap_or_else(|| contour.is_closed());
    let ring_len = if contour.is_closed() {
        contour.len() - 1
    } else {
        contour.len()
    };

    if ring_len <= 3 {
        return rebuild(contour, (0..ring_len).collect::<Vec<_>>(), closed);
    }

    let points: Vec<[f64; 2]> = contour
        .points()
        .take(ring_len)
        .map(|[x, y]| [x as f64, y as f64])
        .collect();
    let eps = effective_epsilon(&points, options.epsilon, options.adaptive.as_ref());
    let max_points = options.max_points.unwrap_or(usize::MAX).max(3);
    let max_iterations = options.max_iterations.unwrap_or(ring_len * 32);

    let mut ring = Ring::new(points, options.corners);
    ring.reduce(max_points, eps, max_iterations);

    rebuild(contour, ring.survivors(), closed)
}

fn rebuild(contour: &Contour, indices: Vec<usize>, closed: bool) -> Contour {
    let mut out = Contour::with_capacity(indices.len() + 1);
    for &i in &indices {
        let [x, y] = contour.point(i);
        out.push(x, y);
    }
    if closed && !out.is_empty() {
        let [x, y] = out.point(0);
        out.push(x, y);
    }
    out
}

/// Queue entry; ordered so the max-heap pops the smallest key first.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    key: f64,
    index: usize,
    stamp: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .total_cmp(&self.key)
            .then_with(|| other.index.cmp(&self.index))
    }
}

/// Doubly-linked ring over a fixed point array.
///
/// Keys are refreshed lazily: every change bumps the point's stamp and
/// pushes a new candidate, and candidates with an old stamp are dropped
/// when popped.
struct Ring {
    points: Vec<[f64; 2]>,
    prev: Vec<usize>,
    next: Vec<usize>,
    alive: Vec<bool>,
    stamp: Vec<u32>,
    alive_count: usize,
    heap: BinaryHeap<Candidate>,
    corners: Option<CornerProtection>,
}

impl Ring {
    fn new(points: Vec<[f64; 2]>, corners: Option<CornerProtection>) -> Self {
        let n = points.len();
        let mut ring = Self {
            prev: (0..n).map(|i| (i + n - 1) % n).collect(),
            next: (0..n).map(|i| (i + 1) % n).collect(),
            alive: vec![true; n],
            stamp: vec![0; n],
            alive_count: n,
            heap: BinaryHeap::with_capacity(n * 2),
            corners: corners.filter(|c| c.min_angle_deg > 0.0),
            points,
        };
        for i in 0..n {
            let key = ring.key(i);
            ring.heap.push(Candidate {
                key,
                index: i,
                stamp: 0,
            });
        }
        ring
    }

    /// Interior angle at `i` between its current neighbours, in radians
    fn corner_angle(&self, i: usize) -> f64 {
        let (p, q) = (self.points[self.prev[i]], self.points[self.next[i]]);
        let c = self.points[i];
        let v1 = [p[0] - c[0], p[1] - c[1]];
        let v2 = [q[0] - c[0], q[1] - c[1]];

        let l1 = v1[0].hypot(v1[1]);
        let l2 = v2[0].hypot(v2[1]);
        if l1 == 0.0 || l2 == 0.0 {
            return 0.0;
        }
        ((v1[0] * v2[0] + v1[1] * v2[1]) / (l1 * l2)).clamp(-1.0, 1.0).acos()
    }

    /// Removal cost of `i` given its current neighbours
    fn key(&self, i: usize) -> f64 {
        let dist_sq = point_segment_dist_sq(
            self.points[i],
            self.points[self.prev[i]],
            self.points[self.next[i]],
        );

        let Some(corners) = self.corners else {
            return dist_sq;
        };
        let angle = self.corner_angle(i);
        if angle >= corners.min_angle_deg.to_radians() {
            return dist_sq;
        }

        match corners.mode {
            CornerMode::Hard => f64::INFINITY,
            CornerMode::Soft { weight } => {
                let scale = 1.0 + weight * (1.0 - angle / PI);
                dist_sq * scale * scale
            }
        }
    }

    fn refresh(&mut self, i: usize) {
        self.stamp[i] = self.stamp[i].wrapping_add(1);
        let key = self.key(i);
        self.heap.push(Candidate {
            key,
            index: i,
            stamp: self.stamp[i],
        });
    }

    fn remove(&mut self, i: usize) {
        self.alive[i] = false;
        self.alive_count -= 1;

        let (p, q) = (self.prev[i], self.next[i]);
        self.next[p] = q;
        self.prev[q] = p;

        self.refresh(p);
        self.refresh(q);
    }

    fn reduce(&mut self, max_points: usize, eps: f64, max_iterations: usize) {
        let eps_sq = eps * eps;
        let mut iterations = 0;

        while self.alive_count > 3 {
            if iterations == max_iterations {
                warn!(max_iterations, alive = self.alive_count, "simplifier iteration budget exhausted");
                return;
            }
            iterations += 1;

            let Some(candidate) = self.heap.pop() else {
                return;
            };
            let i = candidate.index;
            if !self.alive[i] || candidate.stamp != self.stamp[i] {
                continue;
            }
            if candidate.key == f64::INFINITY {
                continue;
            }

            if self.alive_count > max_points || (eps_sq > 0.0 && candidate.key <= eps_sq) {
                self.remove(i);
                continue;
            }

            // Cheapest live candidate is already above tolerance
            return;
        }
    }

    /// Surviving indices in ring order, starting from the lowest index
    fn survivors(&self) -> Vec<usize> {
        let Some(start) = self.alive.iter().position(|&a| a) else {
            return Vec::new();
        };

        let mut out = Vec::with_capacity(self.alive_count);
        let mut cur = start;
        loop {
            out.push(cur);
            cur = self.next[cur];
            if cur == start {
                break;
            }
        }
        out
    }
}
