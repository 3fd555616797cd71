use std::path::Path;
use std::sync::Arc;

use image::ImageFormat;
use polygonizer_common::{ImageSetting, utils};
use strum::IntoStaticStr;

use crate::{
    error::{PolygonizerError, Result},
    pipeline::{Pipeline, SimplifyTuning},
    traits::WorkerTask,
    types::PolygonInfo,
};

/// Encoded image bytes plus the name they were loaded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a file from disk
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(Self { name, bytes })
    }

    /// Judged by extension, like a browser file picker would
    pub fn is_image(&self) -> bool {
        utils::is_image_file(&self.name)
    }
}

/// A decoded image ready for polygonization.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub id: String,
    /// File name without extension
    pub label: String,
    /// Detected encoding, e.g. `png`
    pub format: String,
    pub width: u32,
    pub height: u32,
    /// Straight RGBA8 pixels, shared between jobs without copying
    pub rgba: Arc<[u8]>,
    pub setting: ImageSetting,
}

impl ImageRecord {
    /// Decode `file` with default settings
    pub fn decode(id: impl Into<String>, file: &ImageFile) -> Result<Self> {
        let format = image::guess_format(&file.bytes)?;
        let decoded = image::load_from_memory_with_format(&file.bytes, format)?.to_rgba8();
        let (width, height) = decoded.dimensions();

        Ok(Self {
            id: id.into(),
            label: utils::file_label(&file.name),
            format: format_name(format),
            width,
            height,
            rgba: Arc::from(decoded.into_raw()),
            setting: ImageSetting::default(),
        })
    }

    pub fn with_setting(mut self, setting: ImageSetting) -> Self {
        self.setting = setting;
        self
    }
}

fn format_name(format: ImageFormat) -> String {
    format
        .extensions_str()
        .first()
        .copied()
        .unwrap_or("unknown")
        .to_string()
}

/// Work items understood by pool workers.
#[derive(Debug, Clone, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ThreadInput {
    /// Decode an encoded image into an [`ImageRecord`]
    AddImage { id: String, file: ImageFile },
    /// Run the full pipeline on one decoded image
    Polygonize {
        image: ImageRecord,
        tuning: SimplifyTuning,
    },
}

/// Results mirroring [`ThreadInput`] variant for variant.
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ThreadOutput {
    AddImage(ImageRecord),
    Polygonize(PolygonInfo),
}

impl ThreadOutput {
    pub fn into_image(self) -> Option<ImageRecord> {
        match self {
            ThreadOutput::AddImage(image) => Some(image),
            ThreadOutput::Polygonize(_) => None,
        }
    }

    pub fn into_polygons(self) -> Option<PolygonInfo> {
        match self {
            ThreadOutput::Polygonize(info) => Some(info),
            ThreadOutput::AddImage(_) => None,
        }
    }
}

impl WorkerTask for ThreadInput {
    type Output = ThreadOutput;

    fn run(self) -> Result<ThreadOutput> {
        match self {
            ThreadInput::AddImage { id, file } => ImageRecord::decode(id, &file).map(ThreadOutput::AddImage),
            ThreadInput::Polygonize { image, tuning } => {
                let pipeline = Pipeline::builder().with_tuning(tuning).build();
                pipeline
                    .process_rgba(&image.id, &image.rgba, image.width, image.height, &image.setting)
                    .map(ThreadOutput::Polygonize)
            }
        }
    }
}

/// Unwrap a batch of outputs that must all be of one variant
pub(crate) fn collect_outputs<T>(
    outputs: Vec<ThreadOutput>,
    pick: impl Fn(ThreadOutput) -> Option<T>,
) -> Result<Vec<T>> {
    outputs
        .into_iter()
        .enumerate()
        .map(|(index, output)| {
            let kind: &'static str = (&output).into();
            pick(output).ok_or_else(|| PolygonizerError::Worker {
                index,
                message: format!("unexpected {kind} output"),
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    /// PNG bytes of a transparent canvas with one opaque rectangle
    pub(crate) fn png_with_rect(width: u32, height: u32, rect: (u32, u32, u32, u32)) -> Vec<u8> {
        let mut image = RgbaImage::new(width, height);
        let (x0, y0, x1, y1) = rect;
        for y in y0..y1 {
            for x in x0..x1 {
                image.put_pixel(x, y, Rgba([200, 100, 50, 255]));
            }
        }

        let mut bytes = Cursor::new(Vec::new());
        image
            .write_to(&mut bytes, ImageFormat::Png)
            .expect("Should encode PNG");
        bytes.into_inner()
    }

    #[test]
    fn test_add_image_decodes_png() {
        let file = ImageFile::new("sprite.png", png_with_rect(9, 7, (1, 1, 4, 4)));
        assert!(file.is_image());

        let output = ThreadInput::AddImage {
            id: "img-1".to_string(),
            file,
        }
        .run()
        .expect("Should decode");

        let record = output.into_image().expect("Should be an image");
        assert_eq!(record.id, "img-1");
        assert_eq!(record.label, "sprite");
        assert_eq!(record.format, "png");
        assert_eq!((record.width, record.height), (9, 7));
        assert_eq!(record.rgba.len(), 9 * 7 * 4);
        assert_eq!(record.setting, ImageSetting::default());
    }

    #[test]
    fn test_add_image_rejects_garbage() {
        let result = ThreadInput::AddImage {
            id: "img-2".to_string(),
            file: ImageFile::new("broken.png", vec![1, 2, 3, 4]),
        }
        .run();

        assert!(matches!(result, Err(PolygonizerError::ImageLoad(_))));
    }

    #[test]
    fn test_polygonize_runs_pipeline() {
        let file = ImageFile::new("rect.png", png_with_rect(16, 16, (4, 5, 12, 9)));
        let image = ImageRecord::decode("img-3", &file)
            .expect("Should decode")
            .with_setting(ImageSetting {
                alpha_threshold: 128,
                minimal_distance: 1.0,
                ..Default::default()
            });

        let info = ThreadInput::Polygonize {
            image,
            tuning: SimplifyTuning::default(),
        }
        .run()
        .expect("Should polygonize")
        .into_polygons()
        .expect("Should be polygons");

        assert_eq!(info.id, "img-3");
        assert_eq!(info.polygons.len(), 1);
        assert_eq!(info.polygons[0].bounding_box(), Some(([4, 5], [12, 9])));
    }

    #[test]
    fn test_collect_outputs_rejects_mixed_variants() {
        let file = ImageFile::new("a.png", png_with_rect(2, 2, (0, 0, 1, 1)));
        let record = ImageRecord::decode("a", &file).expect("Should decode");
        let outputs = vec![ThreadOutput::AddImage(record)];

        assert!(collect_outputs(outputs.clone(), ThreadOutput::into_image).is_ok());
        assert!(matches!(
            collect_outputs(outputs, ThreadOutput::into_polygons),
            Err(PolygonizerError::Worker { index: 0, .. })
        ));
    }
}
