//! Stream junction: fans the live camera stream out to many consumers
//!
//! One permanent live-view branch plus any number of dynamic branches
//! (capture slots, per-cell previews). Branches come and go while frames
//! flow. Delivery never waits on a branch: a consumer that is busy when a
//! frame arrives simply misses that frame, the same way a leaky queue would
//! drop it, so one slow or half-torn-down branch cannot stall the others.

use crate::error::{Error, Result};
use crate::types::Frame;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Consumer of frames delivered by the junction
pub trait FrameSink: Send {
    /// Called once per frame pushed through the branch
    fn on_frame(&mut self, frame: &Frame);
}

/// A sink shared between the junction and whoever owns it
pub type SharedSink = Arc<Mutex<dyn FrameSink>>;

/// Sink that only keeps the newest frame.
///
/// Used for the live view and for per-key previews; the compositor side
/// reads it back as a producer.
#[derive(Debug, Default)]
pub struct LatestFrame {
    frame: Option<Frame>,
    received: u64,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Frames seen since creation
    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn clear(&mut self) {
        self.frame = None;
    }
}

impl FrameSink for LatestFrame {
    fn on_frame(&mut self, frame: &Frame) {
        self.frame = Some(frame.clone());
        self.received += 1;
    }
}

/// Opaque handle to an attached branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BranchHandle(u64);

impl BranchHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for BranchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "branch-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct BranchCounters {
    delivered: AtomicU64,
    dropped: AtomicU64,
}

struct Branch {
    label: String,
    sink: SharedSink,
    counters: Arc<BranchCounters>,
}

impl Branch {
    fn new(label: String, sink: SharedSink) -> Self {
        Self {
            label,
            sink,
            counters: Arc::new(BranchCounters::default()),
        }
    }

    fn stats(&self) -> BranchStats {
        BranchStats {
            label: self.label.clone(),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Delivery counters for one branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchStats {
    pub label: String,
    pub delivered: u64,
    pub dropped: u64,
}

/// Outcome of pushing one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Branches (live view included) that received the frame
    pub delivered: usize,
    /// Branches that were busy and missed it
    pub dropped: usize,
}

/// Splitting point between the camera and its consumers
pub struct StreamJunction {
    live_view: Branch,
    branches: Mutex<HashMap<u64, Branch>>,
    next_id: AtomicU64,
    max_branches: usize,
    frames_pushed: AtomicU64,
}

impl StreamJunction {
    /// Create a junction whose permanent branch feeds `live_view`
    pub fn new(live_view: SharedSink, max_branches: usize) -> Self {
        tracing::info!(
            "Stream junction configured (max {} dynamic branches)",
            max_branches
        );
        Self {
            live_view: Branch::new("live-view".into(), live_view),
            branches: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            max_branches,
            frames_pushed: AtomicU64::new(0),
        }
    }

    /// Attach a new dynamic branch feeding `sink`
    pub fn attach_branch(&self, label: impl Into<String>, sink: SharedSink) -> Result<BranchHandle> {
        let label = label.into();
        let mut branches = self.branches.lock();
        if branches.len() >= self.max_branches {
            tracing::error!(
                "Cannot attach branch '{}': {} of {} branches in use",
                label,
                branches.len(),
                self.max_branches
            );
            return Err(Error::AttachFailed(format!(
                "junction branch limit ({}) reached",
                self.max_branches
            )));
        }

        let handle = BranchHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!("Attached {} ('{}')", handle, label);
        branches.insert(handle.0, Branch::new(label, sink));
        Ok(handle)
    }

    /// Detach a dynamic branch, returning its final counters.
    ///
    /// A frame already being delivered to the branch finishes delivery;
    /// later pushes no longer reach it.
    pub fn detach_branch(&self, handle: BranchHandle) -> Result<BranchStats> {
        let branch = self
            .branches
            .lock()
            .remove(&handle.0)
            .ok_or(Error::BranchNotFound(handle.0))?;
        let stats = branch.stats();
        tracing::debug!(
            "Detached {} ('{}', delivered={}, dropped={})",
            handle,
            stats.label,
            stats.delivered,
            stats.dropped
        );
        Ok(stats)
    }

    /// Detach every dynamic branch (shutdown)
    pub fn detach_all(&self) -> usize {
        let drained: Vec<_> = self.branches.lock().drain().collect();
        if !drained.is_empty() {
            tracing::info!("Detached {} remaining junction branches", drained.len());
        }
        drained.len()
    }

    /// Deliver a frame to the live view and every attached branch
    pub fn push(&self, frame: &Frame) -> Delivery {
        self.frames_pushed.fetch_add(1, Ordering::Relaxed);

        // Snapshot so that attach/detach never waits for delivery
        let targets: Vec<(SharedSink, Arc<BranchCounters>)> = self
            .branches
            .lock()
            .values()
            .map(|b| (b.sink.clone(), b.counters.clone()))
            .collect();

        let mut delivery = Delivery::default();
        deliver(&self.live_view.sink, &self.live_view.counters, frame, &mut delivery);
        for (sink, counters) in &targets {
            deliver(sink, counters, frame, &mut delivery);
        }
        delivery
    }

    /// Number of attached dynamic branches
    pub fn branch_count(&self) -> usize {
        self.branches.lock().len()
    }

    pub fn is_attached(&self, handle: BranchHandle) -> bool {
        self.branches.lock().contains_key(&handle.0)
    }

    pub fn branch_stats(&self, handle: BranchHandle) -> Option<BranchStats> {
        self.branches.lock().get(&handle.0).map(Branch::stats)
    }

    pub fn live_view_stats(&self) -> BranchStats {
        self.live_view.stats()
    }

    pub fn frames_pushed(&self) -> u64 {
        self.frames_pushed.load(Ordering::Relaxed)
    }
}

fn deliver(sink: &SharedSink, counters: &BranchCounters, frame: &Frame, delivery: &mut Delivery) {
    match sink.try_lock() {
        Some(mut sink) => {
            sink.on_frame(frame);
            counters.delivered.fetch_add(1, Ordering::Relaxed);
            delivery.delivered += 1;
        }
        None => {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            delivery.dropped += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect(Vec<u64>);

    impl FrameSink for Collect {
        fn on_frame(&mut self, frame: &Frame) {
            self.0.push(frame.sequence);
        }
    }

    fn frame(n: u64) -> Frame {
        Frame::new(2, 2, crate::types::FrameFormat::Bgra).with_sequence(n)
    }

    #[test]
    fn test_live_view_always_receives() {
        let live = Arc::new(Mutex::new(Collect::default()));
        let junction = StreamJunction::new(live.clone(), 4);
        let delivery = junction.push(&frame(0));
        assert_eq!(delivery.delivered, 1);
        assert_eq!(live.lock().0, vec![0]);
    }

    #[test]
    fn test_branch_limit() {
        let live = Arc::new(Mutex::new(Collect::default()));
        let junction = StreamJunction::new(live, 1);
        junction
            .attach_branch("a", Arc::new(Mutex::new(Collect::default())))
            .unwrap();
        let err = junction
            .attach_branch("b", Arc::new(Mutex::new(Collect::default())))
            .unwrap_err();
        assert!(matches!(err, Error::AttachFailed(_)));
    }

    #[test]
    fn test_busy_branch_drops_without_blocking_others() {
        let live = Arc::new(Mutex::new(Collect::default()));
        let busy = Arc::new(Mutex::new(Collect::default()));
        let idle = Arc::new(Mutex::new(Collect::default()));
        let junction = StreamJunction::new(live.clone(), 4);
        let busy_handle = junction.attach_branch("busy", busy.clone()).unwrap();
        junction.attach_branch("idle", idle.clone()).unwrap();

        let guard = busy.lock();
        let delivery = junction.push(&frame(7));
        drop(guard);

        assert_eq!(delivery, Delivery { delivered: 2, dropped: 1 });
        assert_eq!(live.lock().0, vec![7]);
        assert_eq!(idle.lock().0, vec![7]);
        assert!(busy.lock().0.is_empty());
        assert_eq!(junction.branch_stats(busy_handle).unwrap().dropped, 1);
    }

    #[test]
    fn test_detach_unknown_branch() {
        let live = Arc::new(Mutex::new(Collect::default()));
        let junction = StreamJunction::new(live, 4);
        let handle = junction
            .attach_branch("x", Arc::new(Mutex::new(Collect::default())))
            .unwrap();
        junction.detach_branch(handle).unwrap();
        assert!(matches!(
            junction.detach_branch(handle),
            Err(Error::BranchNotFound(_))
        ));
        assert_eq!(junction.branch_count(), 0);
    }

    #[test]
    fn test_detach_keeps_others_in_order() {
        let live = Arc::new(Mutex::new(Collect::default()));
        let a = Arc::new(Mutex::new(Collect::default()));
        let b = Arc::new(Mutex::new(Collect::default()));
        let junction = StreamJunction::new(live.clone(), 4);
        let ha = junction.attach_branch("a", a.clone()).unwrap();
        junction.attach_branch("b", b.clone()).unwrap();

        junction.push(&frame(0));
        junction.push(&frame(1));
        junction.detach_branch(ha).unwrap();
        junction.push(&frame(2));

        assert_eq!(a.lock().0, vec![0, 1]);
        assert_eq!(b.lock().0, vec![0, 1, 2]);
        assert_eq!(live.lock().0, vec![0, 1, 2]);
    }

    #[test]
    fn test_latest_frame_keeps_newest() {
        let live = Arc::new(Mutex::new(LatestFrame::new()));
        let junction = StreamJunction::new(live.clone(), 1);
        assert!(live.lock().latest().is_none());
        junction.push(&frame(3));
        junction.push(&frame(4));
        let tap = live.lock();
        assert_eq!(tap.latest().unwrap().sequence, 4);
        assert_eq!(tap.received(), 2);
    }

    #[test]
    fn test_detach_all() {
        let live = Arc::new(Mutex::new(Collect::default()));
        let junction = StreamJunction::new(live, 8);
        for i in 0..3 {
            junction
                .attach_branch(format!("b{}", i), Arc::new(Mutex::new(Collect::default())))
                .unwrap();
        }
        assert_eq!(junction.detach_all(), 3);
        assert_eq!(junction.branch_count(), 0);
    }
}
