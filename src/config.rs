use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// COCO index of "hair drier" in the 80-class YOLOv8 label set.
pub const HAIR_DRIER_CLASS_ID: u32 = 78;

const INPUT_IMAGE_NAME: &str = "input.jpg";
const OUTPUT_IMAGE_NAME: &str = "output.jpg";
const REPORT_NAME: &str = "report.pdf";

/// Which detections end up drawn on the annotated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotateScope {
    /// Only detections of the target class.
    #[default]
    Target,
    /// Every raw detection the model returned.
    All,
}

/// Runtime configuration, loaded from an optional TOML file and then
/// overridden from the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// YOLOv8 weights converted to the `.rten` format.
    pub model_path: PathBuf,
    /// Must match the label taxonomy of the model.
    pub target_class_id: u32,
    /// Directory holding the fixed-path artifacts.
    pub output_dir: PathBuf,
    pub history_path: PathBuf,
    /// Unicode-capable TTF used for the report and box labels.
    pub font_path: PathBuf,
    /// Square model input edge, in pixels.
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub annotate_scope: AnnotateScope,
    pub bind: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/yolov8l.rten"),
            target_class_id: HAIR_DRIER_CLASS_ID,
            output_dir: PathBuf::from("app/static"),
            history_path: PathBuf::from("history.jsonl"),
            font_path: PathBuf::from("/usr/share/fonts/TTF/DejaVuSans.ttf"),
            input_size: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
            annotate_scope: AnnotateScope::Target,
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file; keys missing from the file keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let settings: Settings = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from `path` when given, otherwise fall back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.input_size == 0 || self.input_size % 32 != 0 {
            anyhow::bail!(
                "input_size must be a positive multiple of 32, got {}",
                self.input_size
            );
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            anyhow::bail!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            anyhow::bail!(
                "iou_threshold must be within [0, 1], got {}",
                self.iou_threshold
            );
        }
        if self.max_detections == 0 {
            anyhow::bail!("max_detections must be at least 1");
        }
        Ok(())
    }

    pub fn input_image_path(&self) -> PathBuf {
        self.output_dir.join(INPUT_IMAGE_NAME)
    }

    pub fn output_image_path(&self) -> PathBuf {
        self.output_dir.join(OUTPUT_IMAGE_NAME)
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(REPORT_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_the_hair_drier() {
        let settings = Settings::default();
        assert_eq!(settings.target_class_id, 78);
        assert_eq!(settings.annotate_scope, AnnotateScope::Target);
        assert_eq!(settings.output_image_path(), PathBuf::from("app/static/output.jpg"));
        settings.validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            target_class_id = 7
            annotate_scope = "all"
            output_dir = "/tmp/out"
            "#,
        )
        .unwrap();
        assert_eq!(settings.target_class_id, 7);
        assert_eq!(settings.annotate_scope, AnnotateScope::All);
        assert_eq!(settings.report_path(), PathBuf::from("/tmp/out/report.pdf"));
        assert_eq!(settings.input_size, 640);
        assert_eq!(settings.history_path, PathBuf::from("history.jsonl"));
    }

    #[test]
    fn rejects_bad_thresholds() {
        let settings = Settings {
            confidence_threshold: 1.5,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            input_size: 100,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn load_without_path_is_default() {
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }

    #[test]
    fn from_file_reads_toml() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("dryercount.toml");
        std::fs::write(&path, "history_path = \"data/history.json\"\n")?;
        let settings = Settings::from_file(&path)?;
        assert_eq!(settings.history_path, PathBuf::from("data/history.json"));
        Ok(())
    }
}
