use geo_types::{Coord, LineString, Polygon};
use polygonizer_common::ImageSetting;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::bitmask::AlphaMask;

/// Ordered integer outline in image coordinates.
///
/// Stored in the flat wire layout `[x0, y0, x1, y1, ...]`. Simplified
/// polygons use the same representation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Contour {
    coords: Vec<u16>,
}

impl Contour {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(points: usize) -> Self {
        Self {
            coords: Vec::with_capacity(points * 2),
        }
    }

    /// Wrap a flat coordinate list. A trailing odd value is dropped.
    pub fn from_flat(mut coords: Vec<u16>) -> Self {
        coords.truncate(coords.len() & !1);
        Self { coords }
    }

    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = [u16; 2]>,
    {
        Self {
            coords: points.into_iter().flatten().collect(),
        }
    }

    pub fn push(&mut self, x: u16, y: u16) {
        self.coords.push(x);
        self.coords.push(y);
    }

    /// Overwrite the last point, or push when empty
    pub fn set_last(&mut self, x: u16, y: u16) {
        match self.coords.len() {
            0 | 1 => self.push(x, y),
            n => {
                self.coords[n - 2] = x;
                self.coords[n - 1] = y;
            }
        }
    }

    /// Number of points (not coordinates)
    pub fn len(&self) -> usize {
        self.coords.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn point(&self, i: usize) -> [u16; 2] {
        [self.coords[i * 2], self.coords[i * 2 + 1]]
    }

    pub fn points(&self) -> impl Iterator<Item = [u16; 2]> + '_ {
        self.coords.chunks_exact(2).map(|c| [c[0], c[1]])
    }

    pub fn as_flat(&self) -> &[u16] {
        &self.coords
    }

    pub fn into_flat(self) -> Vec<u16> {
        self.coords
    }

    /// A contour counts as closed when its last point repeats the first
    pub fn is_closed(&self) -> bool {
        let n = self.coords.len();
        n >= 4 && self.coords[0] == self.coords[n - 2] && self.coords[1] == self.coords[n - 1]
    }

    /// Convert to geo-types Polygon for geometric operations
    pub fn to_geo_polygon(&self) -> Polygon<f64> {
        let exterior: Vec<Coord<f64>> = self
            .points()
            .map(|[x, y]| Coord {
                x: x as f64,
                y: y as f64,
            })
            .collect();

        Polygon::new(LineString::new(exterior), vec![])
    }

    /// Enclosed area in square pixels
    pub fn area(&self) -> f64 {
        use geo::Area;
        self.to_geo_polygon().unsigned_area()
    }

    /// Min and max corners, `None` for an empty contour
    pub fn bounding_box(&self) -> Option<([u16; 2], [u16; 2])> {
        let mut points = self.points();
        let first = points.next()?;
        Some(points.fold((first, first), |(min, max), [x, y]| {
            ([min[0].min(x), min[1].min(y)], [max[0].max(x), max[1].max(y)])
        }))
    }
}

/// Everything derived from one image: the padded mask, the raw traced
/// contours and their simplified polygons, keyed back to the image by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonInfo {
    pub id: String,
    pub alpha_mask: AlphaMask,
    pub contours: Vec<Contour>,
    pub polygons: Vec<Contour>,
    pub config: ImageSetting,
}

impl PolygonInfo {
    /// Total vertex count across all polygons
    pub fn polygon_point_count(&self) -> usize {
        self.polygons.iter().map(Contour::len).sum()
    }

    /// Total vertex count across all raw contours
    pub fn contour_point_count(&self) -> usize {
        self.contours.iter().map(Contour::len).sum()
    }
}
