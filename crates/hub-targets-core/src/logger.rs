//! Stderr logging for the frame and telemetry threads.
//!
//! Lines look like `[  12.345s  INFO frame-Hub] message`: seconds since the
//! logger was installed, the level, and the thread that produced the record
//! (frame tasks and the telemetry worker are named threads). Records from
//! crates outside `hub_targets*` are capped at `Warn` so a `debug` run only
//! shows per-frame pipeline output.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

const OWN_TARGET_PREFIX: &str = "hub_targets";

struct FrameLogger {
    level: LevelFilter,
    started: Instant,
}

impl FrameLogger {
    fn max_level_for(&self, target: &str) -> LevelFilter {
        if target.starts_with(OWN_TARGET_PREFIX) {
            self.level
        } else {
            self.level.min(LevelFilter::Warn)
        }
    }
}

fn format_line(elapsed_s: f64, level: Level, thread: Option<&str>, message: &str) -> String {
    let origin = thread.unwrap_or("main");
    format!("[{elapsed_s:9.3}s {level:>5} {origin}] {message}")
}

impl Log for FrameLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let thread = std::thread::current();
        let line = format_line(
            self.started.elapsed().as_secs_f64(),
            record.level(),
            thread.name(),
            &record.args().to_string(),
        );
        // One write per line keeps frame and telemetry output from interleaving.
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<FrameLogger> = OnceLock::new();

/// Install the stderr logger. Only the first call takes effect.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| FrameLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Install a `tracing` subscriber. `RUST_LOG` wins; otherwise the pipeline
/// crates log at `info` and everything else at `warn`. Frame spans are
/// reported when they close, with the thread name of the frame task.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,{OWN_TARGET_PREFIX}=info")));
    let subscriber = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_thread_names(true)
        .with_target(false);
    let _ = if json {
        subscriber.json().flatten_event(true).finish().try_init()
    } else {
        subscriber
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_names_the_producing_thread() {
        let line = format_line(1.5, Level::Warn, Some("frame-Hub"), "camera lost");
        assert_eq!(line, "[    1.500s  WARN frame-Hub] camera lost");
        let line = format_line(0.0, Level::Info, None, "start");
        assert!(line.ends_with(" INFO main] start"));
    }

    #[test]
    fn foreign_targets_are_capped_at_warn() {
        let logger = FrameLogger {
            level: LevelFilter::Debug,
            started: Instant::now(),
        };
        assert_eq!(
            logger.max_level_for("hub_targets_pipeline::runner"),
            LevelFilter::Debug
        );
        assert_eq!(logger.max_level_for("image::codecs"), LevelFilter::Warn);

        let quiet = FrameLogger {
            level: LevelFilter::Error,
            started: Instant::now(),
        };
        assert_eq!(quiet.max_level_for("image::codecs"), LevelFilter::Error);
    }

    #[test]
    fn repeated_init_is_a_no_op() {
        assert!(init_with_level(LevelFilter::Warn).is_ok());
        assert!(init_with_level(LevelFilter::Debug).is_ok());
        log::warn!("logger smoke test");
    }
}
