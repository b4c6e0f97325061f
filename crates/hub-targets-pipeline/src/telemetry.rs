//! Telemetry boundary: a key/value store, the flattening of a
//! [`TargetReport`] into store entries, and a non-blocking publisher.
//!
//! The frame task never waits on the store. Reports are flattened on the
//! frame thread, handed over a bounded channel with `try_send`, and written by
//! a dedicated worker. When the queue is full the batch is dropped.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{HslThresholds, PipelineError, TargetReport};

/// Store keys, grouped by table.
pub mod keys {
    pub const HAS_TARGET: &str = "Hub/hasTarget";
    pub const TOP_LEFT_X: &str = "Hub/hubTopLeftX";
    pub const TOP_LEFT_Y: &str = "Hub/hubTopLeftY";
    pub const BOTTOM_RIGHT_X: &str = "Hub/hubBottomRightX";
    pub const BOTTOM_RIGHT_Y: &str = "Hub/hubBottomRightY";
    pub const SHAPES_MIN_X: &str = "Hub/shapesMinX";
    pub const SHAPES_MIN_Y: &str = "Hub/shapesMinY";
    pub const SHAPES_MAX_X: &str = "Hub/shapesMaxX";
    pub const SHAPES_MAX_Y: &str = "Hub/shapesMaxY";
    pub const SHAPES_AREAS: &str = "Hub/shapesAreas";
    /// Average centroid x.
    pub const BOUNDS_X: &str = "Hub/totalWidth";
    /// Average centroid y.
    pub const BOUNDS_Y: &str = "Hub/totalHeight";
    /// Smoothed distance.
    pub const DISTANCE: &str = "Hub/width";
    pub const DEVIATION_FROM_CENTER: &str = "Hub/deviationFromCenter";
    pub const TARGETING_STATE: &str = "Hub/targetingState";
    pub const TARGET_PROFILE: &str = "Hub/targetProfile";
    pub const CURRENT_CAMERA: &str = "Hub/currentCamera";

    pub const HUE: &str = "Hub Settings/Hue";
    pub const SATURATION: &str = "Hub Settings/Saturation";
    pub const LUMINANCE: &str = "Hub Settings/Luminance";
    pub const EXPOSURE: &str = "Hub Settings/shooterCamerExposure";
    pub const VISION_MODE: &str = "Hub Settings/visionMode";
}

/// A value held by the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Bool(bool),
    Double(f64),
    DoubleArray(Vec<f64>),
    String(String),
}

impl TelemetryValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TelemetryValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<[f64; 2]> {
        match self {
            TelemetryValue::DoubleArray(v) if v.len() == 2 => Some([v[0], v[1]]),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TelemetryValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Distributed key/value store shared with the robot and the dashboard.
pub trait TelemetryStore: Send + Sync {
    fn put(&self, key: &str, value: TelemetryValue);
    fn get(&self, key: &str) -> Option<TelemetryValue>;
}

/// In-process store, used for replays and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, TelemetryValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BTreeMap<String, TelemetryValue> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TelemetryStore for MemoryStore {
    fn put(&self, key: &str, value: TelemetryValue) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    fn get(&self, key: &str) -> Option<TelemetryValue> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

type Batch = Vec<(&'static str, TelemetryValue)>;

/// Flatten a report into store entries.
///
/// Frames without a target publish `hasTarget = false`, zeroed scalars and
/// empty arrays. The distance keeps its last smoothed value.
pub fn report_entries(report: &TargetReport) -> Batch {
    use TelemetryValue::{Bool, Double, DoubleArray};

    let (top_left, bottom_right) = report
        .bounds
        .map(|b| ((b.min.x, b.min.y), (b.max.x, b.max.y)))
        .unwrap_or(((0.0, 0.0), (0.0, 0.0)));
    let (avg_x, avg_y) = report
        .average_centroid
        .map(|c| (c.x, c.y))
        .unwrap_or((0.0, 0.0));
    let column = |f: fn(&crate::ShapeReport) -> f64| -> TelemetryValue {
        DoubleArray(report.shapes.iter().map(f).collect())
    };
    let profile = report
        .matched_profile()
        .map(|k| k.as_str())
        .unwrap_or("none");

    vec![
        (keys::HAS_TARGET, Bool(report.has_target())),
        (keys::TOP_LEFT_X, Double(top_left.0)),
        (keys::TOP_LEFT_Y, Double(top_left.1)),
        (keys::BOTTOM_RIGHT_X, Double(bottom_right.0)),
        (keys::BOTTOM_RIGHT_Y, Double(bottom_right.1)),
        (keys::SHAPES_MIN_X, column(|s| s.min_x)),
        (keys::SHAPES_MIN_Y, column(|s| s.min_y)),
        (keys::SHAPES_MAX_X, column(|s| s.max_x)),
        (keys::SHAPES_MAX_Y, column(|s| s.max_y)),
        (keys::SHAPES_AREAS, column(|s| s.area)),
        (keys::BOUNDS_X, Double(avg_x)),
        (keys::BOUNDS_Y, Double(avg_y)),
        (keys::DISTANCE, Double(report.distance.unwrap_or(0.0))),
        (
            keys::DEVIATION_FROM_CENTER,
            Double(report.deviation_from_center.unwrap_or(0.0)),
        ),
        (keys::TARGETING_STATE, Double(f64::from(report.state.code()))),
        (keys::TARGET_PROFILE, TelemetryValue::String(profile.to_string())),
    ]
}

/// Read thresholds and exposure from the settings table, falling back to
/// `defaults` for anything missing or malformed.
pub fn pull_settings(
    store: &dyn TelemetryStore,
    defaults: &HslThresholds,
    default_exposure: i32,
) -> (HslThresholds, i32) {
    let range = |key: &str, fallback: [f64; 2]| {
        store
            .get(key)
            .and_then(|v| v.as_range())
            .unwrap_or_else(|| {
                debug!("{key} not set, using default {fallback:?}");
                fallback
            })
    };
    let thresholds = HslThresholds {
        hue: range(keys::HUE, defaults.hue),
        saturation: range(keys::SATURATION, defaults.saturation),
        luminance: range(keys::LUMINANCE, defaults.luminance),
    };
    let exposure = store
        .get(keys::EXPOSURE)
        .and_then(|v| v.as_f64())
        .filter(|v| v.is_finite())
        .map(|v| v as i32)
        .unwrap_or(default_exposure);
    (thresholds, exposure)
}

/// Cheap, cloneable sending side of the publisher.
#[derive(Clone, Debug)]
pub struct TelemetryHandle {
    sender: Sender<Batch>,
}

impl TelemetryHandle {
    /// Queue a report; returns `false` if it was dropped.
    pub fn publish(&self, report: &TargetReport) -> bool {
        self.send(report_entries(report), report.frame)
    }

    pub fn publish_camera(&self, name: &str) -> bool {
        self.send(
            vec![(keys::CURRENT_CAMERA, TelemetryValue::String(name.to_string()))],
            0,
        )
    }

    fn send(&self, batch: Batch, frame: u64) -> bool {
        match self.sender.try_send(batch) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("telemetry queue full, dropping frame {frame}");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("telemetry worker gone, dropping frame {frame}");
                false
            }
        }
    }
}

/// Owns the worker thread that writes queued batches into the store.
pub struct TelemetryPublisher {
    handle: TelemetryHandle,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl TelemetryPublisher {
    const POLL: Duration = Duration::from_millis(50);

    pub fn spawn(store: Arc<dyn TelemetryStore>, capacity: usize) -> Result<Self, PipelineError> {
        let (sender, receiver) = bounded::<Batch>(capacity.max(1));
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();
        let worker = thread::Builder::new()
            .name("telemetry".to_string())
            .spawn(move || run_worker(store.as_ref(), &receiver, &worker_stop))
            .map_err(PipelineError::Spawn)?;
        Ok(Self {
            handle: TelemetryHandle { sender },
            stop,
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> TelemetryHandle {
        self.handle.clone()
    }

    /// Flush whatever is queued and stop the worker.
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("telemetry worker panicked");
            }
        }
    }
}

impl Drop for TelemetryPublisher {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

fn run_worker(store: &dyn TelemetryStore, receiver: &Receiver<Batch>, stop: &AtomicBool) {
    info!("telemetry worker started");
    let mut written = 0u64;
    loop {
        match receiver.recv_timeout(TelemetryPublisher::POLL) {
            Ok(batch) => {
                write_batch(store, batch);
                written += 1;
            }
            Err(RecvTimeoutError::Timeout) if stop.load(Ordering::Acquire) => break,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    for batch in receiver.try_iter() {
        write_batch(store, batch);
        written += 1;
    }
    info!("telemetry worker shutting down after {written} batch(es)");
}

fn write_batch(store: &dyn TelemetryStore, batch: Batch) {
    for (key, value) in batch {
        store.put(key, value);
    }
}
