use polygonizer_common::DEFAULT_PADDING;

use crate::{
    algorithms::{
        MarchingSquaresExtractor,
        simplification::{AdaptiveTolerance, CornerProtection, SimplifierKind},
    },
    pipeline::{Pipeline, SimplifyTuning},
    traits::{ContourExtractor, PolygonSimplifier},
};

/// Builder for creating processing pipelines with a fluent API
pub struct PipelineBuilder {
    contour_extractor: Option<Box<dyn ContourExtractor>>,
    simplifier: Option<Box<dyn PolygonSimplifier>>,
    padding: u32,
    tuning: SimplifyTuning,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            contour_extractor: None,
            simplifier: None,
            padding: DEFAULT_PADDING,
            tuning: SimplifyTuning::default(),
        }
    }

    /// Set the contour extractor (replaces any existing one)
    pub fn set_contour_extractor<E>(mut self, extractor: E) -> Self
    where
        E: ContourExtractor + 'static,
    {
        self.contour_extractor = Some(Box::new(extractor));
        self
    }

    /// Set a custom simplifier. It takes precedence over the tuning's
    /// [`SimplifierKind`], which is left untouched.
    pub fn set_simplifier<S>(mut self, simplifier: S) -> Self
    where
        S: PolygonSimplifier + 'static,
    {
        self.simplifier = Some(Box::new(simplifier));
        self
    }

    /// Transparent border added around every image before tracing
    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    /// Replace the whole tuning block
    pub fn with_tuning(mut self, tuning: SimplifyTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Built-in simplifier used when no custom one is set
    pub fn with_simplifier_kind(mut self, kind: SimplifierKind) -> Self {
        self.tuning.simplifier = kind;
        self
    }

    /// Protect corners sharper than `min_angle_deg`
    pub fn with_corner_protection(mut self, corners: CornerProtection) -> Self {
        self.tuning.corners = Some(corners);
        self
    }

    pub fn with_adaptive_tolerance(mut self, adaptive: AdaptiveTolerance) -> Self {
        self.tuning.adaptive = Some(adaptive);
        self
    }

    /// Build the pipeline with default components if not specified
    pub fn build(self) -> Pipeline {
        let contour_extractor = self
            .contour_extractor
            .unwrap_or_else(|| Box::new(MarchingSquaresExtractor::default()));

        let simplifier = self
            .simplifier
            .unwrap_or_else(|| self.tuning.simplifier.build());

        Pipeline::new(contour_extractor, simplifier, self.padding, self.tuning)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
