use anyhow::Result;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::camera::{ensure_capture_supported, CameraSource};
use crate::config::{ConfigStore, RegionColorConfig};
use crate::frame_loop::{FrameLoop, IntervalScheduler, LoopExit};
use crate::output::WindowScene;
use crate::pipeline::{DetectorBackend, FaceDetector};
use crate::regions::FeatureIndexMap;

pub const WINDOW_TITLE: &str = "Rusty Mesh";
const VIEWER_SIZE: (usize, usize) = (960, 720);

#[derive(Debug, Clone)]
pub struct AppOptions {
    pub cam_index: u32,
    pub models_dir: PathBuf,
    pub synthetic: bool,
}

/// Desktop host for the frame loop.
///
/// The configuration is read from the store when a pipeline starts and passed
/// down explicitly. Changing it means saving a new record and restarting the
/// pipeline, which rebuilds the detector with the new refinement flag.
pub struct App {
    options: AppOptions,
    store: ConfigStore,
}

impl App {
    pub fn new(options: AppOptions, store: ConfigStore) -> Self {
        Self { options, store }
    }

    /// Persists `config`. Running pipelines pick it up on their next restart.
    pub fn update_config(&self, config: &RegionColorConfig) -> Result<()> {
        self.store.save(config)?;
        info!(refine_landmarks = config.refine_landmarks, "Configuration updated, restart the pipeline to apply");
        Ok(())
    }

    /// Blocks until the viewer is closed.
    pub fn run(&self) -> Result<()> {
        match ensure_capture_supported() {
            Ok(cameras) => info!(count = cameras.len(), "Capture devices found"),
            Err(e) => {
                warn!("{e}");
                return Ok(());
            }
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        runtime.block_on(self.run_pipelines())
    }

    async fn run_pipelines(&self) -> Result<()> {
        let index_map = FeatureIndexMap::mediapipe_face_mesh();
        let mut config = self.store.load();
        let mut kept_scene: Option<WindowScene> = None;
        let mut kept_source: Option<CameraSource> = None;

        loop {
            let detector = DetectorBackend::create(
                &self.options.models_dir,
                config.refine_landmarks,
                self.options.synthetic,
            )?;
            info!(detector = %detector.name(), "Starting pipeline");

            let scene = match kept_scene.take() {
                Some(scene) => scene,
                None => WindowScene::new(WINDOW_TITLE, VIEWER_SIZE.0, VIEWER_SIZE.1)?,
            };
            let mut frame_loop = FrameLoop::new(detector, scene, index_map.clone(), config.clone());

            match kept_source.take() {
                Some(camera) => frame_loop.attach(camera),
                None => match CameraSource::new(self.options.cam_index) {
                    Ok(camera) => {
                        info!(camera = %camera.name(), width = camera.width(), height = camera.height(), "Camera attached");
                        frame_loop.attach(camera);
                    }
                    Err(e) => {
                        error!(error = %e, "Camera setup failed, stopping");
                        frame_loop.stop();
                    }
                },
            }

            let exit = frame_loop.run(&mut IntervalScheduler::default()).await?;
            match exit {
                LoopExit::Closed => {
                    info!(cycles = frame_loop.cycles(), "Viewer closed");
                    return Ok(());
                }
                LoopExit::Restart => {
                    let (old_scene, old_source) = frame_loop.into_parts();
                    kept_scene = Some(old_scene);
                    kept_source = old_source;
                    config = self.store.load();
                    info!("Restarting pipeline with reloaded configuration");
                }
            }
        }
    }
}
