//! Per-frame orchestration: detect, categorize, transform, build, replace the
//! scene, render, schedule the next cycle.
//!
//! Cycles never overlap. The next one is scheduled only after the current
//! detection has resolved and the scene has been rendered, so a slow detector
//! lowers the frame rate instead of queueing stale frames.

use anyhow::{anyhow, Result};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::camera::VideoSource;
use crate::config::RegionColorConfig;
use crate::geometry::build_face_primitives;
use crate::pipeline::FaceDetector;
use crate::regions::FeatureIndexMap;
use crate::scene::{HostEvent, Scene};
use crate::types::{Frame, FrameSize};

/// Roughly one display refresh at 60 Hz.
pub const DISPLAY_REFRESH: Duration = Duration::from_micros(16_600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No video source attached yet.
    Idle,
    /// Source attached, waiting for its first decodable frame.
    AwaitingFrame,
    Running,
    /// Setup failed. The loop will not run.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The source had no frame. Nothing was detected or drawn.
    NoFrame,
    /// The scene was replaced and rendered with this many primitives.
    Rendered { primitives: usize },
    /// The detector rejected the frame. The scene was left untouched.
    DetectionFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Closed,
    Restart,
}

/// Paces the loop between cycles.
#[allow(async_fn_in_trait)]
pub trait FrameScheduler {
    async fn next_frame(&mut self);
}

/// Ticks at a fixed period. Ticks missed during a slow cycle are not made
/// up for.
pub struct IntervalScheduler {
    interval: Interval,
}

impl IntervalScheduler {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

impl Default for IntervalScheduler {
    fn default() -> Self {
        Self::new(DISPLAY_REFRESH)
    }
}

impl FrameScheduler for IntervalScheduler {
    async fn next_frame(&mut self) {
        self.interval.tick().await;
    }
}

/// Schedules the next cycle right away, yielding once to the runtime.
#[derive(Debug, Default)]
pub struct ImmediateScheduler;

impl FrameScheduler for ImmediateScheduler {
    async fn next_frame(&mut self) {
        tokio::task::yield_now().await;
    }
}

pub struct FrameLoop<D, S, V> {
    detector: D,
    scene: S,
    source: Option<V>,
    index_map: FeatureIndexMap,
    config: RegionColorConfig,
    state: LoopState,
    cycles: u64,
    capture_failures: u32,
}

impl<D, S, V> FrameLoop<D, S, V>
where
    D: FaceDetector,
    S: Scene,
    V: VideoSource,
{
    pub fn new(detector: D, scene: S, index_map: FeatureIndexMap, config: RegionColorConfig) -> Self {
        Self {
            detector,
            scene,
            source: None,
            index_map,
            config,
            state: LoopState::Idle,
            cycles: 0,
            capture_failures: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn config(&self) -> &RegionColorConfig {
        &self.config
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Hands the loop its video source.
    pub fn attach(&mut self, source: V) {
        if self.state == LoopState::Stopped {
            return;
        }
        self.source = Some(source);
        self.state = LoopState::AwaitingFrame;
    }

    /// Marks setup as failed. A stopped loop never runs.
    pub fn stop(&mut self) {
        self.state = LoopState::Stopped;
    }

    /// Gives back the scene and the source so a restart can reuse them.
    pub fn into_parts(self) -> (S, Option<V>) {
        (self.scene, self.source)
    }

    /// Pulls the current frame and runs one cycle on it.
    ///
    /// Without a frame the current scene is rendered again unchanged, so the
    /// host keeps handling input while the source warms up or fails.
    pub async fn step(&mut self) -> CycleOutcome {
        let Some(source) = self.source.as_mut() else {
            return CycleOutcome::NoFrame;
        };
        let frame = match source.current_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return self.present_unchanged(),
            Err(e) => {
                self.capture_failures = self.capture_failures.saturating_add(1);
                if self.capture_failures == 1 {
                    warn!(error = %e, "Failed to capture frame");
                } else {
                    debug!(error = %e, failures = self.capture_failures, "Still failing to capture frames");
                }
                return self.present_unchanged();
            }
        };
        if self.capture_failures > 0 {
            info!(failures = self.capture_failures, "Frame capture recovered");
            self.capture_failures = 0;
        }

        if self.state == LoopState::AwaitingFrame {
            info!(
                width = frame.width(),
                height = frame.height(),
                detector = %self.detector.name(),
                "First frame received, starting visualization"
            );
            self.state = LoopState::Running;
        }
        self.cycle(&frame).await
    }

    /// One detection pass over `frame` followed by a full scene replacement.
    ///
    /// Only the first detected face is drawn. With no face the scene is
    /// cleared and rendered empty. A failed detection leaves the scene as it
    /// was.
    pub async fn cycle(&mut self, frame: &Frame) -> CycleOutcome {
        let faces = match self.detector.estimate_faces(frame).await {
            Ok(faces) => faces,
            Err(e) => {
                warn!(error = %e, "Detection failed, skipping cycle");
                return CycleOutcome::DetectionFailed;
            }
        };
        self.cycles += 1;

        let primitives = faces
            .first()
            .map(|face| {
                build_face_primitives(face, FrameSize::of(frame), &self.index_map, &self.config)
            })
            .unwrap_or_default();
        let count = primitives.len();

        self.scene.clear();
        for primitive in primitives {
            self.scene.insert(primitive);
        }
        if let Err(e) = self.scene.render() {
            warn!(error = %e, "Render failed");
        }

        debug!(cycle = self.cycles, faces = faces.len(), primitives = count, "Cycle complete");
        CycleOutcome::Rendered { primitives: count }
    }

    fn present_unchanged(&mut self) -> CycleOutcome {
        if let Err(e) = self.scene.render() {
            warn!(error = %e, "Render failed");
        }
        CycleOutcome::NoFrame
    }

    /// Runs cycles until the host closes or asks for a restart.
    pub async fn run<F: FrameScheduler>(&mut self, scheduler: &mut F) -> Result<LoopExit> {
        match self.state {
            LoopState::Idle => return Err(anyhow!("frame loop started without a video source")),
            LoopState::Stopped => return Ok(LoopExit::Closed),
            LoopState::AwaitingFrame | LoopState::Running => {}
        }

        loop {
            if !self.scene.is_open() {
                return Ok(LoopExit::Closed);
            }
            match self.scene.poll_event() {
                Some(HostEvent::Quit) => return Ok(LoopExit::Closed),
                Some(HostEvent::ReloadConfig) => return Ok(LoopExit::Restart),
                None => {}
            }

            self.step().await;
            scheduler.next_frame().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RenderPrimitive;
    use crate::types::{Face, Keypoint, Rect};
    use std::collections::VecDeque;

    #[derive(Default)]
    struct RecordingScene {
        live: Vec<RenderPrimitive>,
        calls: Vec<&'static str>,
        renders: usize,
    }

    impl Scene for RecordingScene {
        fn clear(&mut self) {
            self.live.clear();
            self.calls.push("clear");
        }

        fn insert(&mut self, primitive: RenderPrimitive) {
            self.live.push(primitive);
            self.calls.push("insert");
        }

        fn render(&mut self) -> Result<()> {
            self.renders += 1;
            self.calls.push("render");
            Ok(())
        }
    }

    /// Replays a script of detection results, one per call.
    struct ScriptedDetector {
        script: VecDeque<Result<Vec<Face>>>,
    }

    impl FaceDetector for ScriptedDetector {
        fn name(&self) -> String {
            "scripted".to_string()
        }

        async fn estimate_faces(&mut self, _frame: &Frame) -> Result<Vec<Face>> {
            self.script.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    struct Frames {
        warmup: usize,
    }

    impl VideoSource for Frames {
        fn current_frame(&mut self) -> Result<Option<Frame>> {
            if self.warmup > 0 {
                self.warmup -= 1;
                return Ok(None);
            }
            Ok(Some(Frame::new(640, 480)))
        }
    }

    fn face(n: usize) -> Face {
        Face::new(
            (0..n).map(|i| Keypoint::flat(i as f32, i as f32)).collect(),
            Rect::new(0.0, 0.0, 100.0, 100.0),
        )
    }

    fn lips_loop(
        script: Vec<Result<Vec<Face>>>,
    ) -> FrameLoop<ScriptedDetector, RecordingScene, Frames> {
        FrameLoop::new(
            ScriptedDetector {
                script: script.into(),
            },
            RecordingScene::default(),
            FeatureIndexMap::new().with_region("lips", &[0, 1]),
            RegionColorConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_state_machine() {
        let mut frame_loop = lips_loop(vec![Ok(vec![face(10)])]);
        assert_eq!(frame_loop.state(), LoopState::Idle);
        assert_eq!(frame_loop.step().await, CycleOutcome::NoFrame);

        frame_loop.attach(Frames { warmup: 2 });
        assert_eq!(frame_loop.state(), LoopState::AwaitingFrame);
        assert_eq!(frame_loop.step().await, CycleOutcome::NoFrame);
        assert_eq!(frame_loop.step().await, CycleOutcome::NoFrame);
        assert_eq!(frame_loop.state(), LoopState::AwaitingFrame);

        assert_eq!(frame_loop.step().await, CycleOutcome::Rendered { primitives: 2 });
        assert_eq!(frame_loop.state(), LoopState::Running);
    }

    #[tokio::test]
    async fn test_cycle_call_order() {
        let mut frame_loop = lips_loop(vec![Ok(vec![face(10)])]);
        frame_loop.cycle(&Frame::new(640, 480)).await;
        assert_eq!(
            frame_loop.scene().calls,
            vec!["clear", "insert", "insert", "render"]
        );
    }

    #[tokio::test]
    async fn test_no_face_clears_scene() {
        let mut frame_loop = lips_loop(vec![Ok(vec![face(10)]), Ok(Vec::new())]);
        let frame = Frame::new(640, 480);

        frame_loop.cycle(&frame).await;
        assert_eq!(frame_loop.scene().live.len(), 2);

        assert_eq!(frame_loop.cycle(&frame).await, CycleOutcome::Rendered { primitives: 0 });
        assert!(frame_loop.scene().live.is_empty());
        assert_eq!(frame_loop.scene().renders, 2);
    }

    #[tokio::test]
    async fn test_only_first_face_is_drawn() {
        let mut frame_loop = lips_loop(vec![Ok(vec![face(10), face(4)])]);
        frame_loop.cycle(&Frame::new(640, 480)).await;

        let scene = frame_loop.scene();
        assert_eq!(scene.live.len(), 2);
        assert_eq!(scene.live[0].len(), 8);
    }

    #[tokio::test]
    async fn test_detection_failure_keeps_scene_and_continues() {
        let mut frame_loop = lips_loop(vec![
            Ok(vec![face(10)]),
            Err(anyhow!("model crashed")),
            Ok(vec![face(3)]),
        ]);
        let frame = Frame::new(640, 480);

        frame_loop.cycle(&frame).await;
        assert_eq!(frame_loop.cycle(&frame).await, CycleOutcome::DetectionFailed);
        assert_eq!(frame_loop.scene().live.len(), 2);
        assert_eq!(frame_loop.scene().renders, 1);

        assert_eq!(frame_loop.cycle(&frame).await, CycleOutcome::Rendered { primitives: 2 });
        assert_eq!(frame_loop.scene().live[0].len(), 1);
        assert_eq!(frame_loop.cycles(), 2);
    }

    struct BrokenCamera;

    impl VideoSource for BrokenCamera {
        fn current_frame(&mut self) -> Result<Option<Frame>> {
            Err(anyhow!("device unplugged"))
        }
    }

    /// Quits once it has been rendered `quit_after` times.
    struct QuitAfterRenders {
        quit_after: usize,
        renders: usize,
        polls: usize,
    }

    impl Scene for QuitAfterRenders {
        fn clear(&mut self) {}

        fn insert(&mut self, _primitive: RenderPrimitive) {}

        fn render(&mut self) -> Result<()> {
            self.renders += 1;
            Ok(())
        }

        fn poll_event(&mut self) -> Option<HostEvent> {
            self.polls += 1;
            (self.renders >= self.quit_after).then_some(HostEvent::Quit)
        }
    }

    #[tokio::test]
    async fn test_failing_source_keeps_host_serviced() {
        let scene = QuitAfterRenders {
            quit_after: 3,
            renders: 0,
            polls: 0,
        };
        let mut frame_loop = FrameLoop::new(
            ScriptedDetector {
                script: VecDeque::new(),
            },
            scene,
            FeatureIndexMap::new(),
            RegionColorConfig::default(),
        );
        frame_loop.attach(BrokenCamera);

        assert_eq!(frame_loop.run(&mut ImmediateScheduler).await.unwrap(), LoopExit::Closed);
        assert_eq!(frame_loop.state(), LoopState::AwaitingFrame);
        assert_eq!(frame_loop.cycles(), 0);
        assert_eq!(frame_loop.scene().renders, 3);
        assert_eq!(frame_loop.scene().polls, 4);
    }

    #[tokio::test]
    async fn test_warmup_redraws_current_scene() {
        let mut frame_loop = lips_loop(vec![Ok(vec![face(10)])]);
        frame_loop.attach(Frames { warmup: 1 });

        assert_eq!(frame_loop.step().await, CycleOutcome::NoFrame);
        assert_eq!(frame_loop.scene().calls, vec!["render"]);
        assert_eq!(frame_loop.cycles(), 0);
    }

    #[tokio::test]
    async fn test_run_without_source_fails() {
        let mut frame_loop = lips_loop(Vec::new());
        assert!(frame_loop.run(&mut ImmediateScheduler).await.is_err());
    }

    #[tokio::test]
    async fn test_stopped_loop_never_runs() {
        let mut frame_loop = lips_loop(vec![Ok(vec![face(10)])]);
        frame_loop.stop();
        frame_loop.attach(Frames { warmup: 0 });
        assert_eq!(frame_loop.state(), LoopState::Stopped);
        assert_eq!(frame_loop.run(&mut ImmediateScheduler).await.unwrap(), LoopExit::Closed);
        assert_eq!(frame_loop.scene().renders, 0);
    }
}
