pub mod component;
pub mod extraction;
pub mod marching_squares;
pub mod simplification;

pub use component::{Component, ComponentCollector};
pub use extraction::{MarchingSquaresExtractor, extract_outer_contours};
pub use marching_squares::{ContourTracer, Trace};
pub use simplification::{
    AdaptiveTolerance, CornerMode, CornerProtection, DouglasPeuckerSimplifier,
    PriorityRemovalSimplifier, SimplifierKind, SimplifyOptions, simplify_contour,
};
