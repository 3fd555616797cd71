use tracing::{debug, info};

use crate::{
    error::Result,
    jobs::{ImageFile, ImageRecord, ThreadInput, ThreadOutput, collect_outputs},
    parallel::{PoolConfig, WorkerPool},
    pipeline::SimplifyTuning,
    types::PolygonInfo,
};

/// Batch front-end: decodes images and polygonizes them on a shared pool.
pub struct ImagePolygonizer {
    pool: WorkerPool<ThreadInput>,
    tuning: SimplifyTuning,
    next_id: u64,
}

impl ImagePolygonizer {
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            pool: WorkerPool::new(config),
            tuning: SimplifyTuning::default(),
            next_id: 0,
        }
    }

    /// Simplifier tuning applied to every later `polygonize` call
    pub fn with_tuning(mut self, tuning: SimplifyTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn tuning(&self) -> &SimplifyTuning {
        &self.tuning
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// Decode every image file, skipping anything without an image extension.
    ///
    /// Each record gets a fresh id and default settings. One undecodable file
    /// fails the whole import.
    pub async fn import_images<I>(&mut self, files: I) -> Result<Vec<ImageRecord>>
    where
        I: IntoIterator<Item = ImageFile>,
    {
        let jobs: Vec<ThreadInput> = files
            .into_iter()
            .filter(|file| {
                let keep = file.is_image();
                if !keep {
                    debug!(name = %file.name, "skipping non-image file");
                }
                keep
            })
            .map(|file| ThreadInput::AddImage {
                id: self.allocate_id(),
                file,
            })
            .collect();

        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let outputs = self.pool.run(jobs).await?;
        let images = collect_outputs(outputs, ThreadOutput::into_image)?;
        info!(images = images.len(), "imported images");
        Ok(images)
    }

    /// Polygonize each image with its own settings, results in input order
    pub async fn polygonize(&mut self, images: &[ImageRecord]) -> Result<Vec<PolygonInfo>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }

        let jobs = images
            .iter()
            .map(|image| ThreadInput::Polygonize {
                image: image.clone(),
                tuning: self.tuning.clone(),
            })
            .collect();

        let outputs = self.pool.run(jobs).await?;
        let polygons = collect_outputs(outputs, ThreadOutput::into_polygons)?;
        info!(images = polygons.len(), "polygonized images");
        Ok(polygons)
    }

    /// Stop all workers; the next call spawns new ones
    pub fn terminate(&mut self) {
        self.pool.terminate();
    }

    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("img-{}", self.next_id)
    }
}

impl Default for ImagePolygonizer {
    fn default() -> Self {
        Self::new()
    }
}
