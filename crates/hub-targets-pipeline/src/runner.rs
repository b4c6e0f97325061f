//! Frame task and control loop.
//!
//! A [`FrameTask`] owns one [`FramePipeline`] on a dedicated thread and runs
//! it until asked to stop or until the source ends. The [`ControlLoop`] polls
//! a [`ModeSelector`] and swaps tasks when the selected mode changes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use crate::telemetry::{keys, pull_settings};
use crate::{
    annotate, ContourExtractor, FrameSink, FrameSource, HslThresholds, OverlayStyle,
    PipelineConfig, PipelineContext, PipelineError, SourceError, TargetReport, TelemetryHandle,
    TelemetryStore,
};

/// Context plus the collaborators it needs to process live frames.
pub struct FramePipeline {
    context: PipelineContext,
    source: Box<dyn FrameSource>,
    extractor: Box<dyn ContourExtractor>,
    sink: Box<dyn FrameSink>,
    style: OverlayStyle,
}

impl FramePipeline {
    pub fn new(
        context: PipelineContext,
        source: Box<dyn FrameSource>,
        extractor: Box<dyn ContourExtractor>,
        sink: Box<dyn FrameSink>,
    ) -> Self {
        Self {
            context,
            source,
            extractor,
            sink,
            style: OverlayStyle::default(),
        }
    }

    pub fn with_style(mut self, style: OverlayStyle) -> Self {
        self.style = style;
        self
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    pub fn into_context(self) -> PipelineContext {
        self.context
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Pull one frame and run it through extraction, the context, the overlay
    /// and the sink.
    pub fn step(&mut self, thresholds: &HslThresholds) -> Result<TargetReport, SourceError> {
        let frame = self.source.next_frame()?;
        let contours = self.extractor.extract(&frame, thresholds);
        let report = self.context.process_frame(&contours, frame.angle_deg);
        let annotated = annotate(
            &frame.image,
            report.deviation_from_center.unwrap_or(0.0),
            &self.style,
        );
        self.sink.publish(&annotated, &report);
        Ok(report)
    }
}

/// Per-task inputs resolved at task start.
#[derive(Clone, Debug)]
pub struct TaskSettings {
    pub thresholds: HslThresholds,
    pub exposure: i32,
    /// Back-off after a camera error.
    pub retry: Duration,
    pub telemetry: Option<TelemetryHandle>,
}

impl TaskSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            thresholds: config.thresholds,
            exposure: config.camera.exposure,
            retry: config.source_retry(),
            telemetry: None,
        }
    }

    /// Thresholds and exposure from the settings table, config values as
    /// fallback.
    pub fn from_store(store: &dyn TelemetryStore, config: &PipelineConfig) -> Self {
        let (thresholds, exposure) =
            pull_settings(store, &config.thresholds, config.camera.exposure);
        Self {
            thresholds,
            exposure,
            ..Self::from_config(config)
        }
    }

    pub fn with_telemetry(mut self, handle: TelemetryHandle) -> Self {
        self.telemetry = Some(handle);
        self
    }
}

/// A pipeline running on its own thread.
pub struct FrameTask {
    name: String,
    stop: Arc<AtomicBool>,
    worker: JoinHandle<FramePipeline>,
}

impl FrameTask {
    pub fn spawn(
        name: impl Into<String>,
        pipeline: FramePipeline,
        settings: TaskSettings,
    ) -> Result<Self, PipelineError> {
        let name = name.into();
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();
        let worker = thread::Builder::new()
            .name(format!("frame-{name}"))
            .spawn(move || run_frames(pipeline, settings, &worker_stop))
            .map_err(PipelineError::Spawn)?;
        Ok(Self { name, stop, worker })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Signal the task, wait for the frame in flight, and hand the pipeline
    /// back.
    pub fn stop(self) -> Result<FramePipeline, PipelineError> {
        self.stop.store(true, Ordering::Release);
        self.join()
    }

    /// Wait for the task to end on its own.
    pub fn join(self) -> Result<FramePipeline, PipelineError> {
        self.worker
            .join()
            .map_err(|_| PipelineError::TaskPanicked(self.name))
    }
}

fn run_frames(
    mut pipeline: FramePipeline,
    settings: TaskSettings,
    stop: &AtomicBool,
) -> FramePipeline {
    let camera = pipeline.source_name().to_string();
    if let Err(err) = pipeline.source.set_exposure(settings.exposure) {
        warn!("failed to set exposure {} on '{camera}': {err}", settings.exposure);
    }
    if let Some(telemetry) = &settings.telemetry {
        telemetry.publish_camera(&camera);
    }
    info!("frame task started on camera '{camera}'");

    while !stop.load(Ordering::Acquire) {
        match pipeline.step(&settings.thresholds) {
            Ok(report) => {
                if let Some(telemetry) = &settings.telemetry {
                    telemetry.publish(&report);
                }
            }
            Err(SourceError::EndOfStream) => {
                info!("camera '{camera}' reached end of stream");
                break;
            }
            Err(err) => {
                warn!("{err}; retrying in {:?}", settings.retry);
                thread::sleep(settings.retry);
            }
        }
    }

    info!(
        "frame task on '{camera}' stopped after {} frame(s)",
        pipeline.context().frames_processed()
    );
    pipeline
}

/// Source of the currently selected vision mode.
pub trait ModeSelector: Send {
    /// `None` keeps whatever is running.
    fn selected(&mut self) -> Option<String>;
}

/// Always selects the same mode.
#[derive(Clone, Debug)]
pub struct FixedMode(pub String);

impl ModeSelector for FixedMode {
    fn selected(&mut self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Reads the mode from `Hub Settings/visionMode`, falling back to a default.
pub struct StoreModeSelector {
    store: Arc<dyn TelemetryStore>,
    default: String,
}

impl StoreModeSelector {
    pub fn new(store: Arc<dyn TelemetryStore>, default: impl Into<String>) -> Self {
        Self {
            store,
            default: default.into(),
        }
    }
}

impl ModeSelector for StoreModeSelector {
    fn selected(&mut self) -> Option<String> {
        let mode = self
            .store
            .get(keys::VISION_MODE)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| self.default.clone());
        Some(mode)
    }
}

/// Polls the selector and keeps exactly one frame task running for the
/// selected mode.
///
/// The loop owns the process's single [`PipelineContext`]. Each restart hands
/// the context recovered from the stopped task to `factory`, so distance
/// history and lock state survive mode changes.
pub struct ControlLoop<F>
where
    F: FnMut(&str, PipelineContext) -> Result<FrameTask, PipelineError>,
{
    poll_interval: Duration,
    selector: Box<dyn ModeSelector>,
    factory: F,
    idle: Option<PipelineContext>,
    current: Option<(String, FrameTask)>,
}

impl<F> ControlLoop<F>
where
    F: FnMut(&str, PipelineContext) -> Result<FrameTask, PipelineError>,
{
    pub fn new(
        poll_interval: Duration,
        selector: Box<dyn ModeSelector>,
        context: PipelineContext,
        factory: F,
    ) -> Self {
        Self {
            poll_interval,
            selector,
            factory,
            idle: Some(context),
            current: None,
        }
    }

    pub fn current_mode(&self) -> Option<&str> {
        self.current.as_ref().map(|(mode, _)| mode.as_str())
    }

    /// The context while no task is running.
    pub fn context(&self) -> Option<&PipelineContext> {
        self.idle.as_ref()
    }

    /// One poll. Returns `true` when a new task was started.
    pub fn poll_once(&mut self) -> Result<bool, PipelineError> {
        let Some(mode) = self.selector.selected() else {
            return Ok(false);
        };
        if self.current_mode() == Some(mode.as_str()) {
            return Ok(false);
        }

        self.stop_current()?;
        let context = self.idle.take().ok_or(PipelineError::ContextUnavailable)?;
        info!(
            "starting frame task for mode '{mode}' ({} frame(s) so far)",
            context.frames_processed()
        );
        let task = (self.factory)(&mode, context)?;
        self.current = Some((mode, task));
        Ok(true)
    }

    /// Poll until `shutdown` is set, then stop the running task.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), PipelineError> {
        while !shutdown.load(Ordering::Acquire) {
            self.poll_once()?;
            thread::sleep(self.poll_interval);
        }
        self.stop_current()
    }

    /// Stop the running task, if any, and keep its context for the next one.
    pub fn stop_current(&mut self) -> Result<(), PipelineError> {
        if let Some((mode, task)) = self.current.take() {
            info!("stopping frame task for mode '{mode}'");
            let pipeline = task.stop()?;
            debug!(
                "task for '{mode}' handed back context after {} frame(s)",
                pipeline.context().frames_processed()
            );
            self.idle = Some(pipeline.into_context());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Frame, MemoryStore, NullSink, TelemetryValue};
    use hub_targets_core::Contour;
    use image::RgbImage;
    use nalgebra::Point2;
    use std::sync::Mutex;

    struct Scripted {
        remaining: Option<u64>,
        next: u64,
        exposure: Arc<Mutex<Option<i32>>>,
    }

    impl Scripted {
        fn finite(frames: u64) -> Self {
            Self {
                remaining: Some(frames),
                next: 0,
                exposure: Arc::default(),
            }
        }

        fn endless() -> Self {
            Self {
                remaining: None,
                next: 0,
                exposure: Arc::default(),
            }
        }
    }

    impl FrameSource for Scripted {
        fn name(&self) -> &str {
            "Shooter"
        }

        fn set_exposure(&mut self, exposure: i32) -> Result<(), SourceError> {
            *self.exposure.lock().unwrap() = Some(exposure);
            Ok(())
        }

        fn next_frame(&mut self) -> Result<Frame, SourceError> {
            if let Some(left) = self.remaining.as_mut() {
                if *left == 0 {
                    return Err(SourceError::EndOfStream);
                }
                *left -= 1;
            } else {
                thread::sleep(Duration::from_millis(1));
            }
            self.next += 1;
            Ok(Frame {
                number: self.next,
                image: RgbImage::new(64, 48),
                angle_deg: None,
            })
        }
    }

    struct Strip;

    impl ContourExtractor for Strip {
        fn extract(&mut self, _frame: &Frame, _thresholds: &HslThresholds) -> Vec<Contour> {
            vec![vec![
                Point2::new(10.0, 10.0),
                Point2::new(30.0, 10.0),
                Point2::new(30.0, 65.0),
                Point2::new(10.0, 65.0),
            ]]
        }
    }

    fn pipeline(source: Scripted) -> FramePipeline {
        let ctx = PipelineContext::new(PipelineConfig::default()).unwrap();
        FramePipeline::new(ctx, Box::new(source), Box::new(Strip), Box::new(NullSink))
    }

    #[test]
    fn step_processes_one_frame() {
        let mut p = pipeline(Scripted::finite(1));
        let report = p.step(&HslThresholds::default()).unwrap();
        assert!(report.has_target());
        assert_eq!(
            p.step(&HslThresholds::default()),
            Err(SourceError::EndOfStream)
        );
    }

    #[test]
    fn task_runs_to_end_of_stream_and_applies_exposure() {
        let source = Scripted::finite(5);
        let exposure = source.exposure.clone();
        let settings = TaskSettings {
            exposure: 42,
            ..TaskSettings::from_config(&PipelineConfig::default())
        };
        let task = FrameTask::spawn("hub", pipeline(source), settings).unwrap();
        let p = task.join().unwrap();
        assert_eq!(p.context().frames_processed(), 5);
        assert_eq!(
            p.context().state(),
            hub_targets_classify::TargetingState::Locked
        );
        assert_eq!(*exposure.lock().unwrap(), Some(42));
    }

    #[test]
    fn stop_hands_back_the_context() {
        let task = FrameTask::spawn(
            "hub",
            pipeline(Scripted::endless()),
            TaskSettings::from_config(&PipelineConfig::default()),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(!task.is_finished());
        let p = task.stop().unwrap();
        assert!(p.context().frames_processed() > 0);
    }

    #[test]
    fn settings_from_store_override_config() {
        let store = MemoryStore::new();
        store.put(keys::EXPOSURE, TelemetryValue::Double(-1.0));
        let settings = TaskSettings::from_store(&store, &PipelineConfig::default());
        assert_eq!(settings.exposure, -1);
        assert_eq!(settings.thresholds, HslThresholds::default());
        assert_eq!(settings.retry, Duration::from_millis(100));
    }

    fn spawn_on(
        mode: &str,
        context: PipelineContext,
        source: Scripted,
    ) -> Result<FrameTask, PipelineError> {
        FrameTask::spawn(
            mode,
            FramePipeline::new(context, Box::new(source), Box::new(Strip), Box::new(NullSink)),
            TaskSettings::from_config(&PipelineConfig::default()),
        )
    }

    fn fresh_context() -> PipelineContext {
        PipelineContext::new(PipelineConfig::default()).unwrap()
    }

    #[test]
    fn control_loop_restarts_only_on_mode_change() {
        let store = Arc::new(MemoryStore::new());
        let selector = StoreModeSelector::new(store.clone(), "Hub");
        let started = Arc::new(Mutex::new(Vec::<String>::new()));
        let log = started.clone();
        let mut control = ControlLoop::new(
            Duration::from_millis(1),
            Box::new(selector),
            fresh_context(),
            move |mode: &str, context| {
                log.lock().unwrap().push(mode.to_string());
                spawn_on(mode, context, Scripted::endless())
            },
        );

        assert!(control.poll_once().unwrap());
        assert!(control.context().is_none());
        assert!(!control.poll_once().unwrap());
        assert_eq!(control.current_mode(), Some("Hub"));

        store.put(keys::VISION_MODE, TelemetryValue::String("Ball".to_string()));
        assert!(control.poll_once().unwrap());
        assert_eq!(control.current_mode(), Some("Ball"));

        control.stop_current().unwrap();
        assert!(control.context().is_some());
        assert_eq!(control.current_mode(), None);
        assert_eq!(*started.lock().unwrap(), vec!["Hub", "Ball"]);
    }

    #[test]
    fn context_survives_mode_change() {
        let store = Arc::new(MemoryStore::new());
        let mut control = ControlLoop::new(
            Duration::from_millis(1),
            Box::new(StoreModeSelector::new(store.clone(), "Hub")),
            fresh_context(),
            |mode: &str, context| {
                let frames = if mode == "Hub" { 4 } else { 0 };
                spawn_on(mode, context, Scripted::finite(frames))
            },
        );

        assert!(control.poll_once().unwrap());
        // Four frames finish well within this.
        thread::sleep(Duration::from_millis(50));
        store.put(keys::VISION_MODE, TelemetryValue::String("Ball".to_string()));
        assert!(control.poll_once().unwrap());
        control.stop_current().unwrap();

        let context = control.context().unwrap();
        assert_eq!(context.frames_processed(), 4);
        assert_eq!(context.estimator().history_len(), 4);
        assert_eq!(
            context.state(),
            hub_targets_classify::TargetingState::Locked
        );
    }

    #[test]
    fn run_exits_on_shutdown() {
        let shutdown = AtomicBool::new(true);
        let mut control = ControlLoop::new(
            Duration::from_millis(1),
            Box::new(FixedMode("Hub".to_string())),
            fresh_context(),
            |mode: &str, context| spawn_on(mode, context, Scripted::endless()),
        );
        control.run(&shutdown).unwrap();
        assert_eq!(control.current_mode(), None);
        assert!(control.context().is_some());
    }
}
