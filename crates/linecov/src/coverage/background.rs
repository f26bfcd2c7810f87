//! Background reporting
//!
//! Moves flushes off the request path: a dedicated thread calls
//! `report_coverage` on a fixed interval until stopped.

use super::{CoverageCollector, FlushSummary};
use crate::result::{LinecovError, LinecovResult};
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Handle to a running background reporter
#[derive(Debug)]
pub struct BackgroundReporter {
    collector: Arc<CoverageCollector>,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<u64>>,
}

impl BackgroundReporter {
    /// Flush every `interval` on a new thread
    pub fn spawn(collector: Arc<CoverageCollector>, interval: Duration) -> LinecovResult<Self> {
        let (stop, stopped) = channel::<()>();
        let worker = Arc::clone(&collector);
        let handle = std::thread::Builder::new()
            .name("linecov-reporter".into())
            .spawn(move || {
                let mut flushes = 0;
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if let Err(error) = worker.report_coverage() {
                                tracing::warn!(
                                    target: "linecov.reporter",
                                    error = %error,
                                    "background flush failed"
                                );
                            }
                            flushes += 1;
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                flushes
            })?;

        tracing::debug!(
            target: "linecov.reporter",
            interval_ms = interval.as_millis() as u64,
            "background reporter started"
        );
        Ok(Self {
            collector,
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Flush on the interval configured on the collector
    pub fn spawn_configured(collector: Arc<CoverageCollector>) -> LinecovResult<Option<Self>> {
        let config = collector.config();
        if !config.background_reporting_enabled {
            return Ok(None);
        }
        let interval = Duration::from_secs(config.background_reporting_interval_secs);
        Self::spawn(collector, interval).map(Some)
    }

    /// Stop the thread, then run the collector's report-on-exit flush
    pub fn stop(mut self) -> LinecovResult<Option<FlushSummary>> {
        self.halt()?;
        self.collector.shutdown()
    }

    fn halt(&mut self) -> LinecovResult<u64> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| LinecovError::persistence("background reporter panicked")),
            None => Ok(0),
        }
    }
}

impl Drop for BackgroundReporter {
    fn drop(&mut self) {
        let _ = self.halt();
    }
}
