use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Color, ColorKey, ConfigStore, RegionColorConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Camera Index (default 0)
    #[arg(short, long, default_value_t = 0)]
    pub cam_index: u32,

    /// List available cameras
    #[arg(long)]
    pub list: bool,

    /// Animate a synthetic face instead of running the ONNX models
    #[arg(long)]
    pub synthetic: bool,

    /// Directory holding face_detection.onnx and the face mesh models
    #[arg(long, default_value = "models")]
    pub models: PathBuf,

    /// Configuration file
    #[arg(long, default_value = ConfigStore::DEFAULT_PATH)]
    pub config: PathBuf,

    /// Log filter used when RUST_LOG is not set (trace|debug|info|warn|error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect or change the stored configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the active configuration
    Show,
    /// Update configuration values. Restart the viewer (or press R) to apply.
    Set(ConfigUpdate),
    /// Remove the stored configuration so defaults apply
    Reset,
}

#[derive(clap::Args, Debug, Default)]
pub struct ConfigUpdate {
    /// Enable iris landmarks (loads the refined mesh model)
    #[arg(long)]
    pub refine_landmarks: Option<bool>,
    #[arg(long, value_name = "HEX")]
    pub face_oval_color: Option<Color>,
    #[arg(long, value_name = "HEX")]
    pub eyebrow_color: Option<Color>,
    #[arg(long, value_name = "HEX")]
    pub eye_color: Option<Color>,
    #[arg(long, value_name = "HEX")]
    pub lips_color: Option<Color>,
    #[arg(long, value_name = "HEX")]
    pub dots_color: Option<Color>,
    #[arg(long, value_name = "HEX")]
    pub iris_color: Option<Color>,
}

impl ConfigUpdate {
    /// Copy of `config` with every given value replaced.
    pub fn apply_to(&self, config: &RegionColorConfig) -> RegionColorConfig {
        let mut updated = config.clone();
        if let Some(refine) = self.refine_landmarks {
            updated.refine_landmarks = refine;
        }
        let colors = [
            (ColorKey::FaceOval, self.face_oval_color),
            (ColorKey::Eyebrow, self.eyebrow_color),
            (ColorKey::Eye, self.eye_color),
            (ColorKey::Lips, self.lips_color),
            (ColorKey::Dots, self.dots_color),
            (ColorKey::Iris, self.iris_color),
        ];
        for (key, color) in colors.into_iter().filter_map(|(k, c)| c.map(|c| (k, c))) {
            updated.set_color(key, color);
        }
        updated
    }
}
