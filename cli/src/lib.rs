use polygonizer::{PolygonizerError, PoolConfig, SimplifyTuning};
use polygonizer_common::{ImageSetting, SettingError, utils};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    SettingError(#[from] SettingError),
    #[error(transparent)]
    PolygonizerError(#[from] PolygonizerError),
    #[error("Image '{0}' is not a supported image file")]
    NotAnImage(String),
    #[error("Project lists no images")]
    NoImages,
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// One image of a project
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ImageEntry {
    /// Image path, relative paths resolve against the project file
    pub path: String,
    /// Display label, defaults to the file name without extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Overrides the default settings for this image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setting: Option<ImageSetting>,
}

impl ImageEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: None,
            setting: None,
        }
    }

    pub fn setting_or_default(&self) -> ImageSetting {
        self.setting.unwrap_or_default()
    }
}

/// Batch description loaded from a TOML or JSON project file
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Project {
    /// Where the polygon JSON is written
    pub output: String,
    pub images: Vec<ImageEntry>,
    #[serde(default)]
    pub tuning: SimplifyTuning,
    /// Worker pool size, defaults to the machine's parallelism
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolConfig>,
}

impl Project {
    /// Project with default settings for every image
    pub fn skeleton<I, P>(output: impl Into<String>, images: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            output: output.into(),
            images: images
                .into_iter()
                .map(|path| ImageEntry {
                    path: path.as_ref().to_string_lossy().into_owned(),
                    label: Some(utils::file_label(&path)),
                    setting: Some(ImageSetting::default()),
                })
                .collect(),
            tuning: SimplifyTuning::default(),
            pool: None,
        }
    }

    /// JSON schema of the project file
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Project)
    }

    /// Reject unusable projects before any work starts
    pub fn validate(&self) -> Result<(), ProjectError> {
        if self.images.is_empty() {
            return Err(ProjectError::NoImages);
        }
        for entry in &self.images {
            if !utils::is_image_file(&entry.path) {
                return Err(ProjectError::NotAnImage(entry.path.clone()));
            }
            entry.setting_or_default().validate()?;
        }
        Ok(())
    }

    /// Image paths resolved against `base_dir`
    pub fn image_paths(&self, base_dir: &Path) -> Vec<PathBuf> {
        self.images
            .iter()
            .map(|entry| resolve(base_dir, &entry.path))
            .collect()
    }

    /// Output path resolved against `base_dir`
    pub fn output_path(&self, base_dir: &Path) -> PathBuf {
        resolve(base_dir, &self.output)
    }

    /// Load Project configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ProjectError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load Project configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ProjectError> {
        Ok(toml::from_str(content)?)
    }

    /// Load Project configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ProjectError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load Project configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self, ProjectError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProjectError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(ProjectError::UnsupportedFileFormat),
        }
    }

    /// Auto-detect file format and save configuration
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ProjectError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => self.to_toml_file(path),
            Some("json") => self.to_json_file(path),
            _ => Err(ProjectError::UnsupportedFileFormat),
        }
    }

    /// Save Project configuration to a TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ProjectError> {
        let content = self.to_toml()?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Convert Project to TOML string
    pub fn to_toml(&self) -> Result<String, ProjectError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    /// Save Project configuration to a JSON file
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ProjectError> {
        let content = self.to_json()?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Convert Project to JSON string
    pub fn to_json(&self) -> Result<String, ProjectError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }
}

fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polygonizer::algorithms::simplification::{CornerMode, CornerProtection, SimplifierKind};

    fn sample() -> Project {
        let mut project = Project::skeleton("out/polygons.json", ["sprites/hero.png", "sprites/tree.webp"]);
        project.images[1].setting = Some(ImageSetting {
            max_point_count: 12,
            alpha_threshold: 100,
            minimal_distance: 2.5,
        });
        project.tuning.simplifier = SimplifierKind::PriorityRemoval;
        project.tuning.corners = Some(CornerProtection {
            min_angle_deg: 30.0,
            mode: CornerMode::Soft { weight: 6.0 },
        });
        project.pool = Some(PoolConfig::with_max_workers(3));
        project
    }

    #[test]
    fn test_skeleton_uses_defaults() {
        let project = Project::skeleton("out.json", ["a/b/cat.png"]);

        assert_eq!(project.images.len(), 1);
        assert_eq!(project.images[0].label.as_deref(), Some("cat"));
        assert_eq!(project.images[0].setting, Some(ImageSetting::default()));
        assert!(project.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let project = sample();
        let text = project.to_toml().expect("Should serialize");
        assert!(text.contains("max_point_count") || text.contains("maxPointCount"));

        let back = Project::from_toml(&text).expect("Should parse");
        assert_eq!(back, project);
    }

    #[test]
    fn test_json_round_trip() {
        let project = sample();
        let text = project.to_json().expect("Should serialize");

        let back = Project::from_json(&text).expect("Should parse");
        assert_eq!(back, project);
    }

    #[test]
    fn test_minimal_toml() {
        let project = Project::from_toml(
            r#"
            output = "polygons.json"

            [[images]]
            path = "a.png"

            [[images]]
            path = "b.png"
            setting = { maxPointCount = 8 }
            "#,
        )
        .expect("Should parse");

        assert_eq!(project.tuning, SimplifyTuning::default());
        assert_eq!(project.pool, None);
        assert_eq!(project.images[0].setting_or_default(), ImageSetting::default());
        let setting = project.images[1].setting_or_default();
        assert_eq!(setting.max_point_count, 8);
        assert_eq!(setting.minimal_distance, 8.0);
    }

    #[test]
    fn test_validation() {
        let mut project = Project::skeleton("out.json", Vec::<&str>::new());
        assert!(matches!(project.validate(), Err(ProjectError::NoImages)));

        project.images.push(ImageEntry::new("notes.txt"));
        assert!(matches!(project.validate(), Err(ProjectError::NotAnImage(_))));

        project.images[0] = ImageEntry {
            path: "a.png".to_string(),
            label: None,
            setting: Some(ImageSetting {
                max_point_count: 1,
                ..Default::default()
            }),
        };
        assert!(matches!(project.validate(), Err(ProjectError::SettingError(_))));
    }

    #[test]
    fn test_paths_resolve_against_project_dir() {
        let project = Project::skeleton("out.json", ["img/a.png", "/abs/b.png"]);
        let base = Path::new("/projects/demo");

        assert_eq!(
            project.image_paths(base),
            vec![PathBuf::from("/projects/demo/img/a.png"), PathBuf::from("/abs/b.png")]
        );
        assert_eq!(project.output_path(base), PathBuf::from("/projects/demo/out.json"));
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        assert!(matches!(
            Project::from_file("project.yaml"),
            Err(ProjectError::UnsupportedFileFormat)
        ));
    }
}
