use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Solid RGB color, persisted as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Packed `0RGB`, the layout minifb expects.
    pub fn to_u32(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(hex: &str) -> Result<Self> {
        let digits = hex
            .strip_prefix('#')
            .filter(|d| d.len() == 6 && d.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| Error::InvalidColor(hex.to_string()))?;
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| Error::InvalidColor(hex.to_string()))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        hex.parse().map_err(serde::de::Error::custom)
    }
}

/// The configurable color slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorKey {
    FaceOval,
    Eyebrow,
    Eye,
    Lips,
    Dots,
    Iris,
}

/// Region colors plus the landmark refinement switch.
///
/// The refinement flag is read once when the detector is built. Changing it
/// requires restarting the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionColorConfig {
    #[serde(default)]
    pub refine_landmarks: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_oval_color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eyebrow_color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eye_color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lips_color: Option<Color>,
    #[serde(default = "default_dots_color")]
    pub dots_color: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iris_color: Option<Color>,
}

fn default_dots_color() -> Color {
    Color::WHITE
}

impl Default for RegionColorConfig {
    fn default() -> Self {
        Self {
            refine_landmarks: false,
            face_oval_color: Some(Color::WHITE),
            eyebrow_color: Some(Color::WHITE),
            eye_color: Some(Color::WHITE),
            lips_color: Some(Color::WHITE),
            dots_color: Color::WHITE,
            iris_color: Some(Color::WHITE),
        }
    }
}

impl RegionColorConfig {
    pub fn color(&self, key: ColorKey) -> Option<Color> {
        match key {
            ColorKey::FaceOval => self.face_oval_color,
            ColorKey::Eyebrow => self.eyebrow_color,
            ColorKey::Eye => self.eye_color,
            ColorKey::Lips => self.lips_color,
            ColorKey::Dots => Some(self.dots_color),
            ColorKey::Iris => self.iris_color,
        }
    }

    pub fn set_color(&mut self, key: ColorKey, color: Color) {
        match key {
            ColorKey::FaceOval => self.face_oval_color = Some(color),
            ColorKey::Eyebrow => self.eyebrow_color = Some(color),
            ColorKey::Eye => self.eye_color = Some(color),
            ColorKey::Lips => self.lips_color = Some(color),
            ColorKey::Dots => self.dots_color = color,
            ColorKey::Iris => self.iris_color = Some(color),
        }
    }
}

/// JSON file of keyed records. The color config lives under
/// [`ConfigStore::RECORD_KEY`]; other keys are left untouched on save.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub const DEFAULT_PATH: &'static str = "config.json";
    pub const RECORD_KEY: &'static str = "detectorConfig";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored config, or the defaults when nothing usable is
    /// stored. A malformed file is reported and replaced by the defaults in
    /// memory only.
    pub fn load(&self) -> RegionColorConfig {
        match self.try_load() {
            Ok(Some(config)) => {
                info!(path = %self.path.display(), "Loaded configuration");
                config
            }
            Ok(None) => {
                info!(path = %self.path.display(), "No stored configuration, using defaults");
                RegionColorConfig::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Error parsing config, using defaults");
                RegionColorConfig::default()
            }
        }
    }

    pub fn try_load(&self) -> Result<Option<RegionColorConfig>> {
        let Some(mut records) = self.read_records()? else {
            return Ok(None);
        };
        match records.remove(Self::RECORD_KEY) {
            Some(record) => Ok(Some(serde_json::from_value(record)?)),
            None => Ok(None),
        }
    }

    pub fn save(&self, config: &RegionColorConfig) -> Result<()> {
        // Unreadable files are overwritten rather than blocking the save.
        let mut records = self.read_records().ok().flatten().unwrap_or_default();
        records.insert(Self::RECORD_KEY.to_string(), serde_json::to_value(config)?);
        let content = serde_json::to_string_pretty(&Value::Object(records))?;
        fs::write(&self.path, content)?;
        info!(path = %self.path.display(), "Saved configuration");
        Ok(())
    }

    /// Drops the stored record so the next load falls back to defaults.
    pub fn reset(&self) -> Result<()> {
        let Some(mut records) = self.read_records()? else {
            return Ok(());
        };
        if records.remove(Self::RECORD_KEY).is_some() {
            fs::write(&self.path, serde_json::to_string_pretty(&Value::Object(records))?)?;
        }
        Ok(())
    }

    fn read_records(&self) -> Result<Option<Map<String, Value>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(Some(map)),
            _ => Err(Error::Json(serde::de::Error::custom(
                "configuration file is not a JSON object",
            ))),
        }
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!("#FF0000".parse::<Color>().unwrap(), Color::new(255, 0, 0));
        assert_eq!("#00ff00".parse::<Color>().unwrap(), Color::new(0, 255, 0));
        assert_eq!("#0000FF".parse::<Color>().unwrap(), Color::new(0, 0, 255));
        assert!("invalid".parse::<Color>().is_err());
        assert!("#12345".parse::<Color>().is_err());
        assert!("#gg0000".parse::<Color>().is_err());
    }

    #[test]
    fn test_rejects_signed_or_malformed_hex() {
        for bad in ["#+f+f+f", "#-10000", "ffffff", "#fff", "#gggggg", "#ff ff0"] {
            assert!(bad.parse::<Color>().is_err(), "{bad} should be rejected");
        }
        let stored: std::result::Result<RegionColorConfig, _> =
            serde_json::from_str(r##"{"eyeColor": "#+f+f+f"}"##);
        assert!(stored.is_err());
    }

    #[test]
    fn test_color_display_is_lower_hex() {
        assert_eq!(Color::new(171, 205, 239).to_string(), "#abcdef");
        assert_eq!(Color::new(255, 0, 0).to_u32(), 0x00FF0000);
    }

    #[test]
    fn test_persisted_layout() {
        let value = serde_json::to_value(RegionColorConfig::default()).unwrap();
        let expected = serde_json::json!({
            "refineLandmarks": false,
            "faceOvalColor": "#ffffff",
            "eyebrowColor": "#ffffff",
            "eyeColor": "#ffffff",
            "lipsColor": "#ffffff",
            "dotsColor": "#ffffff",
            "irisColor": "#ffffff",
        });
        assert_eq!(value, expected);
    }

    #[test]
    fn test_missing_fields_deserialize() {
        let config: RegionColorConfig =
            serde_json::from_str(r##"{"refineLandmarks": true, "lipsColor": "#ff0000"}"##).unwrap();
        assert!(config.refine_landmarks);
        assert_eq!(config.lips_color, Some(Color::new(255, 0, 0)));
        assert_eq!(config.eye_color, None);
        assert_eq!(config.dots_color, Color::WHITE);
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));

        let mut config = RegionColorConfig::default();
        config.refine_landmarks = true;
        config.set_color(ColorKey::Eye, Color::new(0, 128, 255));
        config.set_color(ColorKey::Dots, Color::new(10, 20, 30));
        config.iris_color = None;

        store.save(&config).unwrap();
        assert_eq!(store.try_load().unwrap(), Some(config.clone()));

        store.save(&store.load()).unwrap();
        assert_eq!(store.load(), config);
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("absent.json"));
        assert_eq!(store.try_load().unwrap(), None);
        assert_eq!(store.load(), RegionColorConfig::default());
    }

    #[test]
    fn test_corrupt_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r##"{"detectorConfig": {"eyeColor": "blue"}}"##).unwrap();

        let store = ConfigStore::new(&path);
        assert!(store.try_load().is_err());
        assert_eq!(store.load(), RegionColorConfig::default());
    }

    #[test]
    fn test_save_keeps_other_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"windowTitle": "mesh"}"#).unwrap();

        let store = ConfigStore::new(&path);
        store.save(&RegionColorConfig::default()).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["windowTitle"], "mesh");
        assert_eq!(raw[ConfigStore::RECORD_KEY]["dotsColor"], "#ffffff");

        store.reset().unwrap();
        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.get(ConfigStore::RECORD_KEY).is_none());
        assert_eq!(raw["windowTitle"], "mesh");
    }
}
