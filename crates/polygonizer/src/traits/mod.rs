use crate::{
    algorithms::simplification::SimplifyOptions,
    bitmask::AlphaMask,
    error::Result,
    types::Contour,
};

/// Trait for contour extraction algorithms
pub trait ContourExtractor: Send + Sync {
    /// Extract the outer contours of every opaque region of a padded mask
    fn extract_contours(&self, mask: &AlphaMask) -> Result<Vec<Contour>>;
}

/// Trait for polygon simplification algorithms
pub trait PolygonSimplifier: Send + Sync {
    /// Reduce the vertex count of a single contour
    fn simplify(&self, contour: &Contour, options: &SimplifyOptions) -> Result<Contour>;

    /// Label reported by [`Pipeline::info`](crate::pipeline::Pipeline::info)
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// A unit of work that can run on a pool worker
pub trait WorkerTask: Send + 'static {
    type Output: Send + 'static;

    /// Run the task to completion on a blocking thread
    fn run(self) -> Result<Self::Output>;
}
