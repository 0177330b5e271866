// src/runtime.rs - Display and detection loops driving a shared HandTracker
use crate::config::CameraFacing;
use crate::source::LandmarkSource;
use crate::tracking::{HandTracker, TrackerSnapshot};
use anyhow::{Context, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{info, trace, warn};

/// Consumer of the tracked pose, called once per display tick.
pub trait TargetSink: Send {
    fn present(&mut self, snapshot: &TrackerSnapshot);
}

/// Sink that only logs; handy when nothing is rendering.
#[derive(Debug, Default)]
pub struct LogSink;

impl TargetSink for LogSink {
    fn present(&mut self, snapshot: &TrackerSnapshot) {
        trace!(
            "visible={} pos={:?} scale={:.3}",
            snapshot.visible,
            snapshot.pose.position,
            snapshot.pose.uniform_scale()
        );
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LoopTiming {
    pub display_hz: f64,
    pub detection_hz: f64,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            display_hz: 60.0,
            detection_hz: 30.0,
        }
    }
}

fn period(hz: f64) -> Duration {
    Duration::from_secs_f64(1.0 / hz.max(1.0))
}

/// Recovers the guard from a poisoned lock.
fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Two independent periodic tasks over one tracker: the display loop
/// smooths and presents, the detection loop polls the source. Each step
/// holds the tracker lock for its whole duration.
pub struct Pipeline {
    tracker: Arc<Mutex<HandTracker>>,
    sink: Arc<Mutex<dyn TargetSink>>,
    timing: LoopTiming,
    epoch: Instant,
    stop_tx: watch::Sender<bool>,
    display: Option<JoinHandle<()>>,
    detection: Option<JoinHandle<Box<dyn LandmarkSource>>>,
    source: Option<Box<dyn LandmarkSource>>,
}

impl Pipeline {
    /// Must be called from within a tokio runtime.
    pub fn start(
        tracker: Arc<Mutex<HandTracker>>,
        source: Box<dyn LandmarkSource>,
        sink: Arc<Mutex<dyn TargetSink>>,
        timing: LoopTiming,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        let mut pipeline = Self {
            tracker,
            sink,
            timing,
            epoch: Instant::now(),
            stop_tx,
            display: None,
            detection: None,
            source: None,
        };
        pipeline.spawn(source);
        pipeline
    }

    fn spawn(&mut self, source: Box<dyn LandmarkSource>) {
        self.stop_tx.send_replace(false);

        self.display = Some(tokio::spawn(display_loop(
            Arc::clone(&self.tracker),
            Arc::clone(&self.sink),
            period(self.timing.display_hz),
            self.stop_tx.subscribe(),
        )));
        self.detection = Some(tokio::spawn(detection_loop(
            Arc::clone(&self.tracker),
            source,
            period(self.timing.detection_hz),
            self.epoch,
            self.stop_tx.subscribe(),
        )));

        info!(
            "Pipeline running (display {} Hz, detection {} Hz)",
            self.timing.display_hz, self.timing.detection_hz
        );
    }

    pub fn is_running(&self) -> bool {
        self.display.is_some() || self.detection.is_some()
    }

    pub fn tracker(&self) -> Arc<Mutex<HandTracker>> {
        Arc::clone(&self.tracker)
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        lock(&self.tracker).snapshot()
    }

    /// Signals both loops and waits for them to finish, so no callback can
    /// write into the tracker after this returns.
    pub async fn stop(&mut self) -> Result<()> {
        self.stop_tx.send_replace(true);

        if let Some(handle) = self.display.take() {
            handle.await.context("Display loop panicked")?;
        }
        if let Some(handle) = self.detection.take() {
            self.source = Some(handle.await.context("Detection loop panicked")?);
        }

        info!("Pipeline stopped");
        Ok(())
    }

    /// Waits until the source reports end of stream, then stops the display loop.
    pub async fn run_until_exhausted(&mut self) -> Result<()> {
        if let Some(handle) = self.detection.take() {
            self.source = Some(handle.await.context("Detection loop panicked")?);
        }
        self.stop().await
    }

    /// Camera switch: stop both loops, reconfigure and reset the tracker,
    /// then resume with the same source.
    pub async fn restart_with_facing(&mut self, facing: CameraFacing) -> Result<()> {
        self.stop().await?;
        lock(&self.tracker).set_facing(facing);

        let source = self
            .source
            .take()
            .context("No landmark source left to restart with")?;
        self.spawn(source);
        Ok(())
    }
}

async fn display_loop(
    tracker: Arc<Mutex<HandTracker>>,
    sink: Arc<Mutex<dyn TargetSink>>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = lock(&tracker).on_display_tick();
                lock(&sink).present(&snapshot);
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }
}

/// At most one detection is in flight: the next tick is only awaited after
/// the current call returns, and missed ticks are dropped, not queued.
async fn detection_loop(
    tracker: Arc<Mutex<HandTracker>>,
    mut source: Box<dyn LandmarkSource>,
    period: Duration,
    epoch: Instant,
    mut stop: watch::Receiver<bool>,
) -> Box<dyn LandmarkSource> {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now_ms = epoch.elapsed().as_secs_f64() * 1000.0;
                match source.next_frame() {
                    Ok(Some(frame)) => {
                        lock(&tracker).on_detection(&frame, now_ms);
                    }
                    Ok(None) => {
                        info!("Landmark source exhausted");
                        break;
                    }
                    Err(e) => {
                        warn!("Detection failed, treating as no hand: {:#}", e);
                        lock(&tracker).on_source_error(now_ms);
                    }
                }
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }

    source
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period() {
        assert_eq!(period(50.0), Duration::from_millis(20));
        // nonsense rates clamp to 1 Hz instead of dividing by zero
        assert_eq!(period(0.0), Duration::from_secs(1));
    }

    #[test]
    fn test_lock_recovers_from_poison() {
        let m = Arc::new(Mutex::new(1));
        let m2 = Arc::clone(&m);
        let _ = std::thread::spawn(move || {
            let _guard = m2.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert!(m.is_poisoned());
        assert_eq!(*lock(&m), 1);
    }
}
