//! Looper coordinator
//!
//! Owns the per-key state machine (`Idle` -> `Capturing` -> `Playing`) and
//! wires capture slots, previews and playback slots into the junction and
//! the compositor. All mutation happens on the thread that owns the
//! coordinator; other threads reach it through the key queue.
//!
//! Failures are contained per key: an aborted transition logs, leaves the
//! key `Idle` and never touches other keys.

use crate::compositor::{Compositor, ProducerHandle, SharedProducer};
use crate::config::LooperConfig;
use crate::error::{Error, Result};
use crate::input::KeyEvent;
use crate::junction::{BranchHandle, Delivery, LatestFrame, SharedSink, StreamJunction};
use crate::playback::{OutputFormat, PlaybackSlot};
use crate::recording::{BufferedSlotFactory, CaptureSlot, CaptureSlotFactory, RecordingTimer};
use crate::types::{Frame, Stats};

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// Coordinator-level state of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyState {
    #[default]
    Idle,
    Capturing,
    Playing,
}

impl std::fmt::Display for KeyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyState::Idle => write!(f, "idle"),
            KeyState::Capturing => write!(f, "capturing"),
            KeyState::Playing => write!(f, "playing"),
        }
    }
}

struct Preview {
    tap: Arc<Mutex<LatestFrame>>,
    branch: BranchHandle,
    producer: ProducerHandle,
}

struct Playback {
    slot: Arc<Mutex<PlaybackSlot>>,
    producer: ProducerHandle,
}

#[derive(Default)]
struct KeyEntry {
    state: KeyState,
    capture: Option<Arc<Mutex<CaptureSlot>>>,
    preview: Option<Preview>,
    playback: Option<Playback>,
}

/// Drives recording and playback for every key
pub struct Coordinator<C: Compositor, F: CaptureSlotFactory = BufferedSlotFactory> {
    junction: Arc<StreamJunction>,
    compositor: C,
    factory: F,
    keys: Vec<KeyEntry>,
    timer: RecordingTimer,
    output: OutputFormat,
    preview_enabled: bool,
    stats: Stats,
    shut_down: bool,
}

impl<C: Compositor> Coordinator<C, BufferedSlotFactory> {
    /// Coordinator whose capture slots hold `capture.buffer_frames` frames each
    pub fn new(config: &LooperConfig, junction: Arc<StreamJunction>, compositor: C) -> Self {
        let factory = BufferedSlotFactory::new(config.capture.buffer_frames);
        Self::with_factory(config, junction, compositor, factory)
    }
}

impl<C: Compositor, F: CaptureSlotFactory> Coordinator<C, F> {
    /// Coordinator with a custom capture slot factory
    pub fn with_factory(
        config: &LooperConfig,
        junction: Arc<StreamJunction>,
        compositor: C,
        factory: F,
    ) -> Self {
        let cells = config.grid.cells;
        tracing::info!(
            "Coordinator ready: {} keys, preview {}",
            cells,
            if config.preview.enabled { "on" } else { "off" }
        );
        Self {
            junction,
            compositor,
            factory,
            keys: (0..cells).map(|_| KeyEntry::default()).collect(),
            timer: RecordingTimer::new(cells),
            output: OutputFormat::new(
                config.grid.cell_resolution(),
                config.playback.framerate,
            ),
            preview_enabled: config.preview.enabled,
            stats: Stats::default(),
            shut_down: false,
        }
    }

    /// Apply one input event. Returns `false` once the coordinator has shut down.
    pub fn handle_key_event(&mut self, event: KeyEvent) -> bool {
        let result = match event {
            KeyEvent::Pressed(key) => self.key_down(key),
            KeyEvent::Released(key) => self.key_up(key),
            KeyEvent::Quit => {
                tracing::info!("Quit requested");
                self.shutdown();
                return false;
            }
        };
        if let Err(e) = result {
            if e.is_recoverable() {
                tracing::warn!("{:?} not applied: {}", event, e);
            } else {
                tracing::error!("{:?} failed: {}", event, e);
            }
        }
        !self.shut_down
    }

    /// Start (or restart) recording `key`
    pub fn key_down(&mut self, key: u32) -> Result<()> {
        let idx = self.index(key)?;
        if self.shut_down {
            tracing::debug!("Key {} pressed after shutdown, ignoring", key);
            return Ok(());
        }

        let previous = self.keys[idx].state;
        if previous == KeyState::Capturing {
            tracing::info!("Key {} pressed again while capturing, re-arming", key);
        }

        // The cell has to be free before anything new targets it
        self.teardown_playback(key);
        self.teardown_preview(key);

        if let Some(old) = self.keys[idx].capture.take() {
            old.lock().cleanup(&self.junction);
        }

        let slot = match self.factory.create(key) {
            Ok(slot) => Arc::new(Mutex::new(slot)),
            Err(e) => {
                tracing::error!("Key {}: could not create capture slot: {}", key, e);
                return Err(self.abort(key, e));
            }
        };

        if let Err(e) = CaptureSlot::attach(&slot, &self.junction) {
            tracing::error!("Key {}: could not attach capture branch: {}", key, e);
            slot.lock().cleanup(&self.junction);
            return Err(self.abort(key, e));
        }

        slot.lock().start_capturing();
        self.keys[idx].capture = Some(slot);
        self.timer.press(key, Instant::now());

        if self.preview_enabled {
            if let Err(e) = self.attach_preview(key) {
                tracing::warn!("Key {}: live preview unavailable: {}", key, e);
            }
        }

        self.keys[idx].state = KeyState::Capturing;
        tracing::info!("Key {}: {} -> capturing", key, previous);
        Ok(())
    }

    /// Finish recording `key` and start its loop
    pub fn key_up(&mut self, key: u32) -> Result<()> {
        let idx = self.index(key)?;
        if self.keys[idx].state != KeyState::Capturing {
            tracing::debug!(
                "Key {} released while {}, ignoring",
                key,
                self.keys[idx].state
            );
            return Ok(());
        }

        let Some(slot) = self.keys[idx].capture.clone() else {
            return Err(self.abort(
                key,
                Error::Internal(format!("key {} capturing without a capture slot", key)),
            ));
        };

        slot.lock().stop_capturing();
        self.teardown_preview(key);

        if let Some(held) = self.timer.release(key, Instant::now()) {
            tracing::debug!("Key {} held for {:?}", key, held);
        }

        let taken = slot.lock().take_buffer();
        let buffer = match taken {
            Ok(buffer) => buffer,
            Err(e) => return Err(self.abort(key, e)),
        };

        self.stats.buffer_overflows += buffer.overflow_count() as u64;
        if buffer.is_empty() {
            tracing::info!("Key {}: no frames captured, cell left empty", key);
            self.stats.recordings_aborted += 1;
            self.keys[idx].state = KeyState::Idle;
            return Ok(());
        }

        let Some(geometry) = self.compositor.cell_geometry(key) else {
            return Err(self.abort(key, Error::InvalidCell(key)));
        };

        let frames = buffer.frame_count();
        let playback = match PlaybackSlot::new(key, buffer, self.output) {
            Ok(playback) => Arc::new(Mutex::new(playback)),
            Err(e) => return Err(self.abort(key, e)),
        };

        let producer: SharedProducer = playback.clone();
        let handle = match self.compositor.attach_producer(key, producer, geometry) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("Key {}: could not attach playback to cell: {}", key, e);
                // The buffer now lives in the playback slot; free it here
                playback.lock().cleanup();
                return Err(self.abort(key, e));
            }
        };

        self.keys[idx].playback = Some(Playback {
            slot: playback,
            producer: handle,
        });
        self.keys[idx].state = KeyState::Playing;
        self.stats.recordings_completed += 1;
        tracing::info!("Key {}: capturing -> playing ({} frame loop)", key, frames);
        Ok(())
    }

    /// Push one camera frame through the junction
    pub fn on_camera_frame(&mut self, frame: &Frame) -> Delivery {
        let delivery = self.junction.push(frame);
        self.stats.frames_captured += 1;
        self.stats.branch_frames_dropped += delivery.dropped as u64;
        delivery
    }

    /// Tear down every slot, preview and branch. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        tracing::info!("Coordinator shutting down");
        for key in 1..=self.keys.len() as u32 {
            self.teardown_playback(key);
            self.teardown_preview(key);
            let idx = (key - 1) as usize;
            if let Some(slot) = self.keys[idx].capture.take() {
                slot.lock().cleanup(&self.junction);
            }
            self.timer.cancel(key);
            self.keys[idx].state = KeyState::Idle;
        }
        let leftover = self.junction.detach_all();
        if leftover > 0 {
            tracing::warn!("{} junction branches were still attached at shutdown", leftover);
        }
        self.shut_down = true;
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn key_state(&self, key: u32) -> Option<KeyState> {
        self.entry(key).map(|e| e.state)
    }

    pub fn capture_slot(&self, key: u32) -> Option<Arc<Mutex<CaptureSlot>>> {
        self.entry(key).and_then(|e| e.capture.clone())
    }

    pub fn playback_slot(&self, key: u32) -> Option<Arc<Mutex<PlaybackSlot>>> {
        self.entry(key)
            .and_then(|e| e.playback.as_ref().map(|p| p.slot.clone()))
    }

    pub fn has_preview(&self, key: u32) -> bool {
        self.entry(key).map(|e| e.preview.is_some()).unwrap_or(false)
    }

    /// Keys currently in `state`
    pub fn keys_in(&self, state: KeyState) -> Vec<u32> {
        self.keys
            .iter()
            .enumerate()
            .filter(|(_, e)| e.state == state)
            .map(|(i, _)| i as u32 + 1)
            .collect()
    }

    pub fn key_count(&self) -> u32 {
        self.keys.len() as u32
    }

    pub fn timer(&self) -> &RecordingTimer {
        &self.timer
    }

    pub fn junction(&self) -> &Arc<StreamJunction> {
        &self.junction
    }

    pub fn compositor(&self) -> &C {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut C {
        &mut self.compositor
    }

    pub fn stats(&self) -> Stats {
        self.stats.clone()
    }

    fn index(&self, key: u32) -> Result<usize> {
        if key == 0 || key as usize > self.keys.len() {
            tracing::debug!("Key {} outside 1..={}", key, self.keys.len());
            return Err(Error::InvalidKey(key));
        }
        Ok((key - 1) as usize)
    }

    fn entry(&self, key: u32) -> Option<&KeyEntry> {
        let idx = (key as usize).checked_sub(1)?;
        self.keys.get(idx)
    }

    /// Drop whatever `key` was doing and return it to idle
    fn abort(&mut self, key: u32, error: Error) -> Error {
        let idx = (key - 1) as usize;
        self.teardown_preview(key);
        if let Some(slot) = self.keys[idx].capture.take() {
            slot.lock().cleanup(&self.junction);
        }
        self.timer.cancel(key);
        self.keys[idx].state = KeyState::Idle;
        self.stats.recordings_aborted += 1;
        error
    }

    fn attach_preview(&mut self, key: u32) -> Result<()> {
        let geometry = self
            .compositor
            .cell_geometry(key)
            .ok_or(Error::InvalidCell(key))?;
        let tap = Arc::new(Mutex::new(LatestFrame::new()));

        let sink: SharedSink = tap.clone();
        let branch = self.junction.attach_branch(format!("preview-{}", key), sink)?;

        let producer: SharedProducer = tap.clone();
        let producer = match self.compositor.attach_producer(key, producer, geometry) {
            Ok(handle) => handle,
            Err(e) => {
                let _ = self.junction.detach_branch(branch);
                return Err(e);
            }
        };

        self.keys[(key - 1) as usize].preview = Some(Preview {
            tap,
            branch,
            producer,
        });
        tracing::debug!("Key {}: live preview attached", key);
        Ok(())
    }

    fn teardown_preview(&mut self, key: u32) {
        let Some(preview) = self.keys[(key - 1) as usize].preview.take() else {
            return;
        };
        if let Err(e) = self.compositor.detach_producer(preview.producer) {
            tracing::warn!("Key {}: preview producer already gone: {}", key, e);
        }
        if let Err(e) = self.junction.detach_branch(preview.branch) {
            tracing::warn!("Key {}: preview branch already gone: {}", key, e);
        }
        preview.tap.lock().clear();
        tracing::debug!("Key {}: live preview detached", key);
    }

    fn teardown_playback(&mut self, key: u32) {
        let Some(playback) = self.keys[(key - 1) as usize].playback.take() else {
            return;
        };
        if let Err(e) = self.compositor.detach_producer(playback.producer) {
            tracing::warn!("Key {}: playback producer already gone: {}", key, e);
        }
        let mut slot = playback.slot.lock();
        tracing::debug!(
            "Key {}: stopping playback after {} frames",
            key,
            slot.frames_emitted()
        );
        slot.cleanup();
    }
}

impl<C: Compositor, F: CaptureSlotFactory> Drop for Coordinator<C, F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
