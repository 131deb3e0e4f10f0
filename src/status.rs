//! Sequencer status shared with a display.
//!
//! The audio thread owns a [`SequencerStatus`] and writes the step position and
//! transport flags as it runs. A display thread holds a [`StatusObserver`],
//! which can only read, and polls it to decide when to redraw.
//!
//! ```
//! use multiengine::status::{RecordIndicator, SequencerStatus};
//!
//! let status = SequencerStatus::new(16);
//! let mut observer = status.observer();
//!
//! status.set_playing(true);
//! status.set_step(3);
//! assert!(observer.poll());
//! assert!(!observer.poll());
//!
//! let snapshot = observer.snapshot();
//! assert_eq!(snapshot.progress(), Some(0.25));
//! assert_eq!(snapshot.indicator(), RecordIndicator::Idle);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};

#[derive(Debug)]
struct Shared {
    step_count: AtomicU16,
    step: AtomicU16,
    playing: AtomicBool,
    recording: AtomicBool,
    record_arm: AtomicBool,
    recorded_loops: AtomicUsize,
}

/// Writer side of the sequencer status.
#[derive(Debug)]
pub struct SequencerStatus {
    shared: Arc<Shared>,
}

impl SequencerStatus {
    /// Creates a stopped status for a loop of `step_count` steps.
    pub fn new(step_count: u16) -> Self {
        Self {
            shared: Arc::new(Shared {
                step_count: AtomicU16::new(step_count),
                step: AtomicU16::new(0),
                playing: AtomicBool::new(false),
                recording: AtomicBool::new(false),
                record_arm: AtomicBool::new(false),
                recorded_loops: AtomicUsize::new(0),
            }),
        }
    }

    /// A read-only handle for a display.
    pub fn observer(&self) -> StatusObserver {
        StatusObserver {
            shared: Arc::clone(&self.shared),
            last_step: None,
            last_loops: 0,
            last_arm: None,
        }
    }

    pub fn set_step_count(&self, step_count: u16) {
        self.shared.step_count.store(step_count, Ordering::Relaxed);
    }

    pub fn set_step(&self, step: u16) {
        self.shared.step.store(step, Ordering::Relaxed);
    }

    pub fn set_playing(&self, playing: bool) {
        self.shared.playing.store(playing, Ordering::Relaxed);
    }

    pub fn set_recording(&self, recording: bool) {
        self.shared.recording.store(recording, Ordering::Relaxed);
    }

    pub fn set_record_arm(&self, armed: bool) {
        self.shared.record_arm.store(armed, Ordering::Relaxed);
    }

    pub fn set_recorded_loops(&self, loops: usize) {
        self.shared.recorded_loops.store(loops, Ordering::Relaxed);
    }

    /// Counts one more recorded take.
    pub fn add_recorded_loop(&self) {
        self.shared.recorded_loops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::load(&self.shared)
    }
}

/// What the record indicator should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordIndicator {
    Idle,
    /// Armed but not playing.
    Armed,
    /// Armed while playing.
    Recording,
}

/// Point-in-time copy of the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub step_count: u16,
    pub step: u16,
    pub playing: bool,
    pub recording: bool,
    pub record_arm: bool,
    pub recorded_loops: usize,
}

impl StatusSnapshot {
    fn load(shared: &Shared) -> Self {
        Self {
            step_count: shared.step_count.load(Ordering::Relaxed),
            step: shared.step.load(Ordering::Relaxed),
            playing: shared.playing.load(Ordering::Relaxed),
            recording: shared.recording.load(Ordering::Relaxed),
            record_arm: shared.record_arm.load(Ordering::Relaxed),
            recorded_loops: shared.recorded_loops.load(Ordering::Relaxed),
        }
    }

    /// Recording only counts while the sequencer plays.
    pub fn is_recording(&self) -> bool {
        self.playing && self.recording
    }

    pub fn indicator(&self) -> RecordIndicator {
        match (self.record_arm, self.playing) {
            (true, true) => RecordIndicator::Recording,
            (true, false) => RecordIndicator::Armed,
            _ => RecordIndicator::Idle,
        }
    }

    /// Fraction of the loop completed, including the current step.
    ///
    /// `None` while stopped or for an empty loop.
    pub fn progress(&self) -> Option<f64> {
        if !self.playing || self.step_count == 0 {
            return None;
        }
        let done = (f64::from(self.step) + 1.0) / f64::from(self.step_count);
        Some(done.min(1.0))
    }
}

/// Read-only view of a [`SequencerStatus`] with change detection.
#[derive(Debug)]
pub struct StatusObserver {
    shared: Arc<Shared>,
    last_step: Option<u16>,
    last_loops: usize,
    last_arm: Option<bool>,
}

impl StatusObserver {
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::load(&self.shared)
    }

    /// Returns `true` when something visible changed since the last poll.
    ///
    /// Step changes only count while playing; stopping counts once.
    pub fn poll(&mut self) -> bool {
        let now = self.snapshot();
        let mut changed = false;

        if now.playing && self.last_step != Some(now.step) {
            self.last_step = Some(now.step);
            changed = true;
        }
        if !now.playing && self.last_step.is_some() {
            self.last_step = None;
            changed = true;
        }
        if now.recorded_loops != self.last_loops {
            self.last_loops = now.recorded_loops;
            changed = true;
        }
        if self.last_arm != Some(now.record_arm) {
            self.last_arm = Some(now.record_arm);
            changed = true;
        }

        changed
    }
}
