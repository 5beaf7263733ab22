//! Virtual event loop: page events and a timer queue on a virtual clock.
//!
//! Everything runs on one thread. Timers never fire on their own; the host
//! (or a test) moves the clock with [`Scheduler::pop_due`] and the page runs
//! whatever came due, in `(due time, scheduling order)` order. That keeps
//! every widget transition deterministic.

use crate::dom::ElementId;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

/// Browsers clamp nested timers to a few milliseconds; zero would spin.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// An input event delivered to the page.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A click whose target is the innermost element under the pointer.
    Click { target: ElementId },
    /// A keydown on the document, `key` as in `KeyboardEvent.key`.
    KeyDown { key: String },
    /// The viewport scrolled to this vertical offset.
    Scroll { y: f64 },
    /// The viewport changed size.
    Resize { width: f64, height: f64 },
}

/// What happened while dispatching an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventOutcome {
    /// A handler called `preventDefault`.
    pub default_prevented: bool,
    /// Number of handlers that reacted.
    pub handled: usize,
}

impl EventOutcome {
    pub fn merge(&mut self, other: EventOutcome) {
        self.default_prevented |= other.default_prevented;
        self.handled += other.handled;
    }

    pub fn handled() -> Self {
        Self {
            default_prevented: false,
            handled: 1,
        }
    }

    pub fn prevented() -> Self {
        Self {
            default_prevented: true,
            handled: 1,
        }
    }
}

/// Handle to a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// What a task does when it fires. The page routes each kind to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Detach the consent banner once its fade-out has run.
    RemoveConsentBanner,
    /// Advance every slideshow in lock-step.
    AdvanceAllSlideshows,
    /// Advance one independently timed slideshow.
    AdvanceSlideshow(usize),
}

#[derive(Debug)]
struct TaskState {
    kind: TaskKind,
    repeat: Option<Duration>,
    /// Sequence of the live queue entry; stale entries are skipped.
    seq: u64,
}

/// Timer queue on a virtual clock.
#[derive(Debug, Default)]
pub struct Scheduler {
    now: Duration,
    next_id: u64,
    next_seq: u64,
    queue: BinaryHeap<Reverse<(Duration, u64, TaskId)>>,
    tasks: HashMap<TaskId, TaskState>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time since page start.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Run `kind` once after `delay`, like `setTimeout`.
    pub fn schedule_once(&mut self, delay: Duration, kind: TaskKind) -> TaskId {
        self.insert(delay, kind, None)
    }

    /// Run `kind` every `interval`, first after one interval, like
    /// `setInterval`.
    pub fn schedule_repeating(&mut self, interval: Duration, kind: TaskKind) -> TaskId {
        let interval = interval.max(MIN_INTERVAL);
        self.insert(interval, kind, Some(interval))
    }

    fn insert(&mut self, delay: Duration, kind: TaskKind, repeat: Option<Duration>) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        let seq = self.push(self.now + delay, id);
        self.tasks.insert(id, TaskState { kind, repeat, seq });
        id
    }

    fn push(&mut self, due: Duration, id: TaskId) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse((due, seq, id)));
        seq
    }

    /// Cancel a task. Returns whether it was still pending.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        self.tasks.remove(&id).is_some()
    }

    /// Cancel every pending task.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.tasks.len();
        self.tasks.clear();
        self.queue.clear();
        count
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Number of live tasks.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Pop the next task due at or before `until`, moving the clock to its
    /// due time. Repeating tasks are re-armed before they are returned.
    pub fn pop_due(&mut self, until: Duration) -> Option<(TaskId, TaskKind)> {
        loop {
            let Reverse((due, seq, id)) = *self.queue.peek()?;
            if due > until {
                return None;
            }
            self.queue.pop();
            let Some(state) = self.tasks.get(&id) else {
                continue;
            };
            if state.seq != seq {
                continue;
            }
            let (kind, repeat) = (state.kind, state.repeat);
            self.now = self.now.max(due);
            match repeat {
                Some(interval) => {
                    let next = self.push(due + interval, id);
                    if let Some(state) = self.tasks.get_mut(&id) {
                        state.seq = next;
                    }
                }
                None => {
                    self.tasks.remove(&id);
                }
            }
            return Some((id, kind));
        }
    }

    /// Move the clock forward without running anything. Never goes back.
    pub fn settle(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }
}

/// A repeating task with explicit start/stop, so repeated side effects can
/// be torn down.
#[derive(Debug, Clone)]
pub struct RepeatingTask {
    interval: Duration,
    kind: TaskKind,
    id: Option<TaskId>,
}

impl RepeatingTask {
    pub fn new(interval: Duration, kind: TaskKind) -> Self {
        Self {
            interval,
            kind,
            id: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Arm the task. Starting a running task is a no-op.
    pub fn start(&mut self, scheduler: &mut Scheduler) {
        if self.is_running(scheduler) {
            return;
        }
        self.id = Some(scheduler.schedule_repeating(self.interval, self.kind));
    }

    pub fn stop(&mut self, scheduler: &mut Scheduler) {
        if let Some(id) = self.id.take() {
            scheduler.cancel(id);
        }
    }

    pub fn is_running(&self, scheduler: &Scheduler) -> bool {
        self.id.is_some_and(|id| scheduler.is_pending(id))
    }
}
