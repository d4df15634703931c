use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("parse config at {path}: {source}")]
    ParseAt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("validation failed at {path}: {message}")]
    Invalid { path: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameConfig {
    pub min_delta_ms: f32,
    pub max_delta_ms: f32,
    /// Weight kept from the previous smoothed delta each frame.
    pub smoothing_keep: f32,
    pub initial_delta_ms: f32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            min_delta_ms: 1.0,
            max_delta_ms: 100.0,
            smoothing_keep: 0.7,
            initial_delta_ms: 1000.0 / 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    pub zoom_min: f32,
    pub zoom_max: f32,
    pub zoom_default: f32,
    /// Exponential follow rate, in 1/seconds.
    pub follow_rate: f32,
    /// World-unit border added around the visible rectangle for culling.
    pub viewport_margin: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            zoom_min: 0.5,
            zoom_max: 2.0,
            zoom_default: 1.0,
            follow_rate: 8.0,
            viewport_margin: 64.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MovementConfig {
    pub base_speed: f32,
    pub arrival_threshold: f32,
    pub min_move_distance: f32,
    pub player_half_size: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            base_speed: 160.0,
            arrival_threshold: 2.0,
            min_move_distance: 0.01,
            player_half_size: 6.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterpolationConfig {
    pub smoothing_window_ms: f32,
    pub snap_epsilon: f32,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            smoothing_window_ms: 100.0,
            snap_epsilon: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InteractionConfig {
    pub harvest_radius: f32,
    pub vendor_radius: f32,
    pub teleporter_radius: f32,
    pub table_radius: f32,
    pub pickup_radius: f32,
    pub harvest_anchor_tolerance: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            harvest_radius: 28.0,
            vendor_radius: 25.0,
            teleporter_radius: 20.0,
            table_radius: 32.0,
            pickup_radius: 12.0,
            harvest_anchor_tolerance: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetConfig {
    pub move_send_interval_ms: f32,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            move_send_interval_ms: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub pickup_draw_cap: usize,
    pub pool_capacity: usize,
    pub entity_half_size: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            pickup_draw_cap: 48,
            pool_capacity: 8,
            entity_half_size: 8.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    pub frame: FrameConfig,
    pub camera: CameraConfig,
    pub movement: MovementConfig,
    pub interpolation: InterpolationConfig,
    pub interaction: InteractionConfig,
    pub net: NetConfig,
    pub render: RenderConfig,
}

impl CoreConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let config = match serde_path_to_error::deserialize::<_, CoreConfig>(&mut deserializer) {
            Ok(config) => config,
            Err(error) => {
                let path = error.path().to_string();
                let source = error.into_inner();
                if path.is_empty() || path == "." {
                    return Err(ConfigError::Parse(source));
                }
                return Err(ConfigError::ParseAt { path, source });
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let frame = &self.frame;
        positive("frame.min_delta_ms", frame.min_delta_ms)?;
        positive("frame.max_delta_ms", frame.max_delta_ms)?;
        positive("frame.initial_delta_ms", frame.initial_delta_ms)?;
        ordered(
            "frame.max_delta_ms",
            frame.min_delta_ms,
            frame.max_delta_ms,
        )?;
        if !(0.0..1.0).contains(&frame.smoothing_keep) {
            return Err(invalid(
                "frame.smoothing_keep",
                format!("expected value in [0, 1), got {}", frame.smoothing_keep),
            ));
        }

        let camera = &self.camera;
        positive("camera.zoom_min", camera.zoom_min)?;
        ordered("camera.zoom_max", camera.zoom_min, camera.zoom_max)?;
        if !(camera.zoom_min..=camera.zoom_max).contains(&camera.zoom_default) {
            return Err(invalid(
                "camera.zoom_default",
                format!(
                    "expected value in [{}, {}], got {}",
                    camera.zoom_min, camera.zoom_max, camera.zoom_default
                ),
            ));
        }
        positive("camera.follow_rate", camera.follow_rate)?;
        non_negative("camera.viewport_margin", camera.viewport_margin)?;

        positive("movement.base_speed", self.movement.base_speed)?;
        non_negative("movement.arrival_threshold", self.movement.arrival_threshold)?;
        non_negative("movement.min_move_distance", self.movement.min_move_distance)?;
        non_negative("movement.player_half_size", self.movement.player_half_size)?;

        positive(
            "interpolation.smoothing_window_ms",
            self.interpolation.smoothing_window_ms,
        )?;
        non_negative("interpolation.snap_epsilon", self.interpolation.snap_epsilon)?;

        let interaction = &self.interaction;
        positive("interaction.harvest_radius", interaction.harvest_radius)?;
        positive("interaction.vendor_radius", interaction.vendor_radius)?;
        positive("interaction.teleporter_radius", interaction.teleporter_radius)?;
        positive("interaction.table_radius", interaction.table_radius)?;
        positive("interaction.pickup_radius", interaction.pickup_radius)?;
        non_negative(
            "interaction.harvest_anchor_tolerance",
            interaction.harvest_anchor_tolerance,
        )?;

        positive("net.move_send_interval_ms", self.net.move_send_interval_ms)?;

        if self.render.pickup_draw_cap == 0 {
            return Err(invalid("render.pickup_draw_cap", "expected at least 1"));
        }
        non_negative("render.entity_half_size", self.render.entity_half_size)?;
        Ok(())
    }
}

fn invalid(path: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        path,
        message: message.into(),
    }
}

fn positive(path: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(path, format!("expected finite value > 0, got {value}")))
    }
}

fn non_negative(path: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(path, format!("expected finite value >= 0, got {value}")))
    }
}

fn ordered(path: &'static str, min: f32, max: f32) -> Result<(), ConfigError> {
    if min <= max {
        Ok(())
    } else {
        Err(invalid(path, format!("expected >= {min}, got {max}")))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_are_valid_and_match_frame_contract() {
        let config = CoreConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.frame.min_delta_ms, 1.0);
        assert_eq!(config.frame.max_delta_ms, 100.0);
        assert_eq!(config.frame.smoothing_keep, 0.7);
        assert_eq!(config.net.move_send_interval_ms, 100.0);
    }

    #[test]
    fn partial_json_keeps_defaults_for_missing_sections() {
        let config =
            CoreConfig::from_json_str(r#"{ "camera": { "zoom_max": 3.0 } }"#).expect("parse");
        assert_eq!(config.camera.zoom_max, 3.0);
        assert_eq!(config.camera.zoom_min, CameraConfig::default().zoom_min);
        assert_eq!(config.movement, MovementConfig::default());
    }

    #[test]
    fn parse_error_reports_json_path() {
        let error = CoreConfig::from_json_str(r#"{ "camera": { "zoom_min": "wide" } }"#)
            .expect_err("type mismatch");
        match error {
            ConfigError::ParseAt { path, .. } => assert_eq!(path, "camera.zoom_min"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = CoreConfig::from_json_str(r#"{ "render": { "fancy": true } }"#)
            .expect_err("unknown field");
        assert!(error.to_string().contains("render"), "{error}");
    }

    #[test]
    fn inverted_zoom_range_fails_validation() {
        let error =
            CoreConfig::from_json_str(r#"{ "camera": { "zoom_min": 2.0, "zoom_max": 1.0 } }"#)
                .expect_err("inverted");
        match error {
            ConfigError::Invalid { path, .. } => assert_eq!(path, "camera.zoom_max"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn smoothing_keep_of_one_is_rejected() {
        let mut config = CoreConfig::default();
        config.frame.smoothing_keep = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                path: "frame.smoothing_keep",
                ..
            })
        ));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "net": {{ "move_send_interval_ms": 50.0 }} }}"#).expect("write");
        let config = CoreConfig::load(file.path()).expect("load");
        assert_eq!(config.net.move_send_interval_ms, 50.0);
    }

    #[test]
    fn load_missing_file_reports_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("nope.json");
        let error = CoreConfig::load(&missing).expect_err("missing");
        assert!(matches!(error, ConfigError::Read { ref path, .. } if path == &missing));
    }
}
