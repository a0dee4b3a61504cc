//! In-process topic bus polled by the input adapters.
//!
//! The bus stands in for the external transport the same way a mock
//! peripheral stands in for hardware: each topic retains its latest record,
//! publishers overwrite it, and subscribers poll for updates. The transport
//! and actuation stages feed and drain the bus from outside this core.
//!
//! # Semantics
//!
//! - `Subscription::updated` reports whether a publication newer than the
//!   last consumed one is pending (gated by the optional minimum interval).
//! - `Subscription::copy` always yields the latest retained record and marks
//!   the stream as seen. `Subscription::drain` does the same but also
//!   reports whether the record was unconsumed, in one locked step, so a
//!   publication cannot slip in unnoticed between a separate `updated`
//!   check and the copy.
//! - `MessageBus::wait_any` blocks until any watched subscription has a
//!   deliverable update or the timeout elapses. This is the single bounded
//!   wait primitive of the whole core; everything after a wake-up is
//!   synchronous.
//!
//! # Rate limiting
//!
//! `Subscription::set_min_interval` suppresses update notifications that
//! arrive faster than the given interval. The command streams use this to
//! avoid a feedback loop where this core's own acknowledgements or
//! downstream publications re-trigger immediate wake-ups.

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::BusError;

/// Typed topic descriptor, analogous to a message id on the wire.
pub struct Topic<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Topic<T> {
    /// Create a topic descriptor. Intended for `const` topic tables.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Topic name, unique on a bus.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

struct Slot<T> {
    data: Option<T>,
    seq: u64,
}

struct TopicState<T> {
    slot: Mutex<Slot<T>>,
}

struct BusShared {
    /// Bumped on every publication; the condvar below is notified with it.
    generation: Mutex<u64>,
    wakeup: Condvar,
}

/// In-process topic bus. Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct MessageBus {
    shared: Arc<BusShared>,
    topics: Arc<Mutex<HashMap<&'static str, Arc<dyn Any + Send + Sync>>>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(BusShared {
                generation: Mutex::new(0),
                wakeup: Condvar::new(),
            }),
            topics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn state_for<T: Send + Sync + 'static>(
        &self,
        topic: &Topic<T>,
    ) -> Result<Arc<TopicState<T>>, BusError> {
        let mut topics = self.topics.lock().map_err(|_| BusError::Poisoned)?;
        let entry = topics
            .entry(topic.name)
            .or_insert_with(|| {
                Arc::new(TopicState::<T> {
                    slot: Mutex::new(Slot { data: None, seq: 0 }),
                }) as Arc<dyn Any + Send + Sync>
            })
            .clone();
        entry
            .downcast::<TopicState<T>>()
            .map_err(|_| BusError::TypeMismatch(topic.name))
    }

    /// Subscribe to a topic. The topic is created if it does not exist yet.
    pub fn subscribe<T: Clone + Send + Sync + 'static>(
        &self,
        topic: &Topic<T>,
    ) -> Result<Subscription<T>, BusError> {
        Ok(Subscription {
            state: self.state_for(topic)?,
            last_seq: 0,
            min_interval: None,
            last_copy: None,
        })
    }

    /// Advertise a topic for publication.
    pub fn advertise<T: Clone + Send + Sync + 'static>(
        &self,
        topic: &Topic<T>,
    ) -> Result<Publisher<T>, BusError> {
        Ok(Publisher {
            state: self.state_for(topic)?,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Block until any watched subscription has a deliverable update or
    /// `timeout` elapses. Returns `Ok(true)` on a wake-up with data.
    pub fn wait_any(&self, watches: &[&dyn Watch], timeout: Duration) -> Result<bool, BusError> {
        let deadline = Instant::now() + timeout;
        let mut generation = self.shared.generation.lock().map_err(|_| BusError::Poisoned)?;
        loop {
            if watches.iter().any(|w| w.has_update()) {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            // A rate-limited stream with a retained update becomes
            // deliverable when its interval expires, without any new
            // publication to notify us. Cap the wait accordingly.
            let mut wait_until = deadline;
            for watch in watches {
                if let Some(ready) = watch.ready_at() {
                    if ready < wait_until {
                        wait_until = ready.max(now);
                    }
                }
            }
            let (guard, _) = self
                .shared
                .wakeup
                .wait_timeout(generation, wait_until - now)
                .map_err(|_| BusError::Poisoned)?;
            generation = guard;
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Something `wait_any` can watch for deliverable updates.
pub trait Watch {
    /// Whether an unconsumed update is deliverable right now.
    fn has_update(&self) -> bool;

    /// Earliest instant a retained-but-rate-limited update becomes
    /// deliverable, if one is pending.
    fn ready_at(&self) -> Option<Instant> {
        None
    }
}

/// Polling handle for one topic.
pub struct Subscription<T> {
    state: Arc<TopicState<T>>,
    last_seq: u64,
    min_interval: Option<Duration>,
    last_copy: Option<Instant>,
}

impl<T: Clone> Subscription<T> {
    /// Suppress update notifications arriving faster than `interval`.
    pub fn set_min_interval(&mut self, interval: Duration) {
        self.min_interval = Some(interval);
    }

    fn interval_elapsed(&self) -> bool {
        match (self.min_interval, self.last_copy) {
            (Some(interval), Some(at)) => at.elapsed() >= interval,
            _ => true,
        }
    }

    /// Whether a publication newer than the last consumed one is pending.
    pub fn updated(&self) -> bool {
        let Ok(slot) = self.state.slot.lock() else {
            return false;
        };
        slot.seq > self.last_seq && self.interval_elapsed()
    }

    /// Copy the latest retained record and mark the stream as seen.
    ///
    /// Returns `None` only when nothing was ever published on the topic.
    pub fn copy(&mut self) -> Option<T> {
        let Ok(slot) = self.state.slot.lock() else {
            return None;
        };
        self.last_seq = slot.seq;
        self.last_copy = Some(Instant::now());
        slot.data.clone()
    }

    /// Copy the latest retained record, mark the stream as seen, and report
    /// whether the record was still unconsumed.
    ///
    /// The check and the copy happen under one lock, so a record published
    /// by another thread right after a standalone `updated` call is still
    /// reported as fresh here rather than being consumed silently.
    pub fn drain(&mut self) -> (Option<T>, bool) {
        let Ok(slot) = self.state.slot.lock() else {
            return (None, false);
        };
        let fresh = slot.seq > self.last_seq && self.interval_elapsed();
        self.last_seq = slot.seq;
        self.last_copy = Some(Instant::now());
        (slot.data.clone(), fresh)
    }
}

impl<T: Clone> Watch for Subscription<T> {
    fn has_update(&self) -> bool {
        self.updated()
    }

    fn ready_at(&self) -> Option<Instant> {
        let interval = self.min_interval?;
        let at = self.last_copy?;
        let Ok(slot) = self.state.slot.lock() else {
            return None;
        };
        if slot.seq > self.last_seq {
            Some(at + interval)
        } else {
            None
        }
    }
}

/// Publication handle for one topic.
pub struct Publisher<T> {
    state: Arc<TopicState<T>>,
    shared: Arc<BusShared>,
}

impl<T: Clone + Send> Publisher<T> {
    /// Overwrite the topic's retained record and wake any waiters.
    pub fn publish(&self, msg: T) -> Result<(), BusError> {
        {
            let mut slot = self.state.slot.lock().map_err(|_| BusError::Poisoned)?;
            slot.data = Some(msg);
            slot.seq += 1;
        }
        let mut generation = self.shared.generation.lock().map_err(|_| BusError::Poisoned)?;
        *generation += 1;
        self.shared.wakeup.notify_all();
        Ok(())
    }
}
