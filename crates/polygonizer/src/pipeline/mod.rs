pub mod builder;

use image::RgbaImage;
use polygonizer_common::ImageSetting;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    algorithms::simplification::{AdaptiveTolerance, CornerProtection, SimplifierKind, SimplifyOptions},
    bitmask::pack_alpha_mask,
    error::Result,
    traits::{ContourExtractor, PolygonSimplifier},
    types::{Contour, PolygonInfo},
};

/// Simplifier choice and extra knobs applied to every image of a batch.
///
/// Per-image values (vertex budget, tolerance) come from the image's own
/// [`ImageSetting`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SimplifyTuning {
    pub simplifier: SimplifierKind,
    pub adaptive: Option<AdaptiveTolerance>,
    pub corners: Option<CornerProtection>,
    pub max_iterations: Option<usize>,
}

impl SimplifyTuning {
    /// Simplifier options for one image
    pub fn options_for(&self, setting: &ImageSetting) -> SimplifyOptions {
        SimplifyOptions {
            max_points: Some(setting.max_point_count as usize),
            epsilon: setting.minimal_distance,
            closed: None,
            adaptive: self.adaptive,
            corners: self.corners,
            max_iterations: self.max_iterations,
        }
    }
}

/// Per-image polygonization: pack, extract, simplify.
pub struct Pipeline {
    contour_extractor: Box<dyn ContourExtractor>,
    simplifier: Box<dyn PolygonSimplifier>,
    padding: u32,
    tuning: SimplifyTuning,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    /// Create a new pipeline with the given components
    pub fn new(
        contour_extractor: Box<dyn ContourExtractor>,
        simplifier: Box<dyn PolygonSimplifier>,
        padding: u32,
        tuning: SimplifyTuning,
    ) -> Self {
        Self {
            contour_extractor,
            simplifier,
            padding,
            tuning,
        }
    }

    pub fn padding(&self) -> u32 {
        self.padding
    }

    pub fn tuning(&self) -> &SimplifyTuning {
        &self.tuning
    }

    /// Process an RGBA image through the entire pipeline
    pub fn process(&self, id: &str, image: &RgbaImage, setting: &ImageSetting) -> Result<PolygonInfo> {
        self.process_rgba(id, image.as_raw(), image.width(), image.height(), setting)
    }

    /// Process a raw RGBA buffer of `width * height` pixels
    pub fn process_rgba(
        &self,
        id: &str,
        rgba: &[u8],
        width: u32,
        height: u32,
        setting: &ImageSetting,
    ) -> Result<PolygonInfo> {
        setting.validate()?;

        let alpha_mask = pack_alpha_mask(rgba, width, height, setting.alpha_threshold as i32, self.padding)?;
        let contours = self.contour_extractor.extract_contours(&alpha_mask)?;

        let options = self.tuning.options_for(setting);
        let polygons = contours
            .iter()
            .map(|contour| self.simplifier.simplify(contour, &options))
            .collect::<Result<Vec<Contour>>>()?;

        let info = PolygonInfo {
            id: id.to_string(),
            alpha_mask,
            contours,
            polygons,
            config: *setting,
        };

        debug!(
            id,
            width,
            height,
            contours = info.contours.len(),
            contour_points = info.contour_point_count(),
            polygon_points = info.polygon_point_count(),
            "polygonized image"
        );

        Ok(info)
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        format!(
            "Pipeline: padding {}, simplifier {}, corner protection {}",
            self.padding,
            self.simplifier.name(),
            if self.tuning.corners.is_some() { "on" } else { "off" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn image_with_rect(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> RgbaImage {
        let mut image = RgbaImage::new(width, height);
        for y in y0..y1 {
            for x in x0..x1 {
                image.put_pixel(x, y, Rgba([10, 20, 30, 255]));
            }
        }
        image
    }

    fn opaque_only() -> ImageSetting {
        ImageSetting {
            alpha_threshold: 1,
            minimal_distance: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_rectangle_becomes_one_polygon() {
        let image = image_with_rect(20, 12, 3, 2, 15, 9);
        let pipeline = Pipeline::builder().build();

        let info = pipeline.process("rect", &image, &opaque_only()).expect("Should process");

        assert_eq!(info.id, "rect");
        assert_eq!(info.contours.len(), 1);
        assert_eq!(info.polygons.len(), 1);
        assert_eq!(info.polygons[0].bounding_box(), Some(([3, 2], [15, 9])));
        assert!((info.polygons[0].area() - 84.0).abs() < 1e-9);
        // The returned mask is the packed input, not the consumed scratch copy
        assert_eq!(info.alpha_mask.count_opaque(), 12 * 7);
        assert_eq!(info.alpha_mask.padding(), polygonizer_common::DEFAULT_PADDING);
    }

    #[test]
    fn test_default_threshold_makes_every_pixel_opaque() {
        let image = image_with_rect(10, 6, 4, 2, 5, 3);
        let info = Pipeline::builder()
            .build()
            .process("all", &image, &ImageSetting::default())
            .expect("Should process");

        assert_eq!(info.contours.len(), 1);
        assert_eq!(info.contours[0].bounding_box(), Some(([0, 0], [10, 6])));
    }

    #[test]
    fn test_vertex_budget_from_setting() {
        // Staircase blob with many corners
        let mut image = RgbaImage::new(40, 40);
        for y in 2..38u32 {
            for x in 2..(2 + y) {
                image.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        let setting = ImageSetting {
            max_point_count: 5,
            alpha_threshold: 128,
            minimal_distance: 0.0,
        };

        let info = Pipeline::builder()
            .build()
            .process("stairs", &image, &setting)
            .expect("Should process");

        assert_eq!(info.contours.len(), 1);
        assert!(info.contours[0].len() > 5);
        assert_eq!(info.polygons[0].len(), 5);
    }

    #[test]
    fn test_invalid_setting_is_rejected() {
        let image = image_with_rect(4, 4, 0, 0, 2, 2);
        let setting = ImageSetting {
            max_point_count: 2,
            ..Default::default()
        };

        let result = Pipeline::builder().build().process("bad", &image, &setting);
        assert!(matches!(result, Err(crate::PolygonizerError::Setting(_))));
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let result = Pipeline::builder()
            .build()
            .process_rgba("short", &[0; 12], 2, 2, &opaque_only());
        assert!(matches!(result, Err(crate::PolygonizerError::LengthMismatch { .. })));
    }

    #[test]
    fn test_tuning_maps_setting() {
        let tuning = SimplifyTuning {
            max_iterations: Some(10),
            ..Default::default()
        };
        let options = tuning.options_for(&ImageSetting::default());

        assert_eq!(options.max_points, Some(32));
        assert_eq!(options.epsilon, 8.0);
        assert_eq!(options.closed, None);
        assert_eq!(options.max_iterations, Some(10));
    }
}
