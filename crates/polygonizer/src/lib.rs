//! # Image Polygonizer
//!
//! Turns the opaque regions of raster images into compact integer polygons.
//! Each image is packed into a one-bit alpha mask, every 4-connected opaque
//! region is outlined with marching squares, and each outline is reduced to
//! a vertex budget by a priority-queue simplifier.
//!
//! ## Core Features
//!
//! - **Bit-packed masks**: one bit per pixel with a transparent border
//! - **Outer contours only**: holes are absorbed into their region
//! - **Budgeted simplification**: vertex cap, tolerance, adaptive epsilon and corner protection
//! - **Worker pool**: batches of images processed in parallel, results in input order
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use polygonizer::Pipeline;
//! use polygonizer_common::ImageSetting;
//!
//! let image = image::open("sprite.png")?.to_rgba8();
//! let info = Pipeline::builder().build().process("sprite", &image, &ImageSetting::default())?;
//! println!("{} polygons", info.polygons.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Batches
//!
//! ```rust,no_run
//! use polygonizer::{ImageFile, ImagePolygonizer};
//!
//! # async fn run() -> polygonizer::Result<()> {
//! let mut polygonizer = ImagePolygonizer::new();
//! let images = polygonizer
//!     .import_images(vec![ImageFile::open("a.png").await?, ImageFile::open("b.png").await?])
//!     .await?;
//! let polygons = polygonizer.polygonize(&images).await?;
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod bitmask;
pub mod traits;
pub mod algorithms;
pub mod pipeline;
pub mod jobs;
pub mod parallel;
pub mod polygonizer;

// Re-exports for convenience
pub use error::{PolygonizerError, Result};
pub use types::{Contour, PolygonInfo};
pub use bitmask::{AlphaMask, pack_alpha_mask};
pub use traits::*;
pub use algorithms::*;
pub use pipeline::{Pipeline, SimplifyTuning, builder::PipelineBuilder};
pub use jobs::{ImageFile, ImageRecord, ThreadInput, ThreadOutput};
pub use parallel::{PoolConfig, WorkerPool, default_concurrency};
pub use polygonizer::ImagePolygonizer;
