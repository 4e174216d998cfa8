//! Looper session
//!
//! Connects camera → junction → capture/preview, key queue → coordinator,
//! and the compositor tick. Everything that touches the coordinator runs in
//! the one task driving [`Session::run`].

use crate::compositor::{Compositor, GridCompositor, GridLayout, SharedProducer};
use crate::config::LooperConfig;
use crate::coordinator::Coordinator;
use crate::error::{Error, Result};
use crate::input::KeyQueue;
use crate::junction::{LatestFrame, SharedSink, StreamJunction};
use crate::monitor::FrameMonitor;
use crate::source::FrameSource;
use crate::types::Stats;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often the key queue is drained
const KEY_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Accepted deviation from the camera rate before the monitor complains
const FPS_TOLERANCE: f64 = 2.0;

/// Asks a session to stop.
///
/// A stop is sticky: requested before `run` starts, it makes `run` return
/// without consuming any frames.
#[derive(Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Session {
    config: LooperConfig,
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
    stats: Arc<tokio::sync::Mutex<Stats>>,
}

impl Session {
    pub fn new(config: LooperConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(tokio::sync::Mutex::new(Stats::default())),
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop_requested.clone())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Latest statistics snapshot
    pub async fn stats(&self) -> Stats {
        self.stats.lock().await.clone()
    }

    /// Run until quit, stop, end of source, or `limit` elapsed
    pub async fn run(
        &self,
        mut source: Box<dyn FrameSource>,
        keys: KeyQueue,
        limit: Option<Duration>,
    ) -> Result<Stats> {
        if self.is_running() {
            return Err(Error::Internal("session already running".into()));
        }
        if self.stop_requested() {
            tracing::info!("Stop requested before start, not running");
            return Ok(self.stats().await);
        }

        let live = Arc::new(Mutex::new(LatestFrame::new()));
        let live_sink: SharedSink = live.clone();
        let junction = Arc::new(StreamJunction::new(
            live_sink,
            self.config.junction.max_branches,
        ));

        let mut compositor = GridCompositor::new(GridLayout::from_config(&self.config.grid));
        let live_geometry = compositor
            .cell_geometry(0)
            .ok_or(Error::InvalidCell(0))?;
        let live_producer: SharedProducer = live.clone();
        compositor.attach_producer(0, live_producer, live_geometry)?;

        let mut coordinator = Coordinator::new(&self.config, junction, compositor);
        let mut monitor = FrameMonitor::new(source.framerate(), FPS_TOLERANCE);

        source.start().await?;
        self.running.store(true, Ordering::SeqCst);

        let mut compose = tokio::time::interval(self.config.playback.framerate.frame_interval());
        compose.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut key_poll = tokio::time::interval(KEY_POLL_INTERVAL);
        let deadline = tokio::time::sleep(limit.unwrap_or(Duration::from_secs(86_400)));
        tokio::pin!(deadline);

        tracing::info!(
            "Session running: {} cells, canvas {}",
            self.config.grid.cells,
            coordinator.compositor().canvas_resolution()
        );
        let started = Instant::now();

        'session: loop {
            // Check for shutdown
            if self.stop_requested() {
                tracing::info!("Stop requested");
                break;
            }

            tokio::select! {
                _ = &mut deadline, if limit.is_some() => {
                    tracing::info!("Session time limit reached");
                    break;
                }

                _ = key_poll.tick() => {
                    for event in keys.drain() {
                        if !coordinator.handle_key_event(event) {
                            break 'session;
                        }
                    }
                }

                _ = compose.tick() => {
                    let canvas = coordinator.compositor_mut().composite();
                    if canvas.sequence % 300 == 0 && canvas.sequence > 0 {
                        tracing::debug!(
                            "Composited {} frames, {} producers attached",
                            canvas.sequence,
                            coordinator.compositor().producer_count()
                        );
                        let mut s = self.stats.lock().await;
                        *s = snapshot(&coordinator);
                    }
                }

                frame_result = source.next_frame() => {
                    match frame_result {
                        Ok(frame) => {
                            monitor.on_frame(Instant::now());
                            coordinator.on_camera_frame(&frame);
                        }
                        Err(Error::SourceEnded) => {
                            tracing::info!("Camera stream ended");
                            break;
                        }
                        Err(e) => {
                            tracing::error!("Capture error: {}", e);
                            // Continue trying
                        }
                    }
                }
            }
        }

        coordinator.shutdown();
        if let Err(e) = source.stop().await {
            tracing::warn!("Failed to stop source: {}", e);
        }
        monitor.log_summary();

        let stats = snapshot(&coordinator);
        *self.stats.lock().await = stats.clone();
        self.running.store(false, Ordering::SeqCst);
        tracing::info!(
            "Session finished after {:.1}s: {} frames captured, {} loops recorded",
            started.elapsed().as_secs_f64(),
            stats.frames_captured,
            stats.recordings_completed
        );
        Ok(stats)
    }
}

fn snapshot(coordinator: &Coordinator<GridCompositor>) -> Stats {
    let mut stats = coordinator.stats();
    stats.frames_composited = coordinator.compositor().frames_composited();
    stats
}
