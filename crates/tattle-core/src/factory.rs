//! Tracker construction.
//!
//! The engine used to be reachable only through a process-wide
//! singleton; here sharing is an explicit, opt-in factory flag. A
//! shared factory hands out the same thread-local tracker to every
//! caller on that thread, a non-shared one builds a fresh tracker per
//! `build()`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::TrackerConfig;
use crate::tracker::ChangeTracker;

/// A shareable tracker. `Rc<RefCell<..>>` matches the engine's
/// single-threaded model; borrow it for the duration of each call.
pub type TrackerHandle = Rc<RefCell<ChangeTracker>>;

thread_local! {
    static SHARED_TRACKER: RefCell<Option<TrackerHandle>> = const { RefCell::new(None) };
}

#[derive(Debug, Clone, Default)]
pub struct TrackerFactory {
    config: TrackerConfig,
    shared: bool,
}

impl TrackerFactory {
    /// Factory for independent trackers.
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            shared: false,
        }
    }

    /// Factory for the thread-shared tracker. The first `build()` on a
    /// thread creates it with this factory's configuration; later
    /// builds return the same handle and keep its configuration.
    pub fn shared(config: TrackerConfig) -> Self {
        Self {
            config,
            shared: true,
        }
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn build(&self) -> TrackerHandle {
        if !self.shared {
            return Rc::new(RefCell::new(ChangeTracker::with_config(
                self.config.clone(),
            )));
        }
        SHARED_TRACKER.with(|slot| {
            slot.borrow_mut()
                .get_or_insert_with(|| {
                    Rc::new(RefCell::new(ChangeTracker::with_config(
                        self.config.clone(),
                    )))
                })
                .clone()
        })
    }

    /// Drop this thread's shared tracker so the next shared `build()`
    /// starts fresh. Existing handles stay usable but detached.
    pub fn reset_shared() {
        SHARED_TRACKER.with(|slot| slot.borrow_mut().take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_shared_builds_are_independent() {
        let factory = TrackerFactory::new(TrackerConfig::default());
        assert!(!factory.is_shared());
        let first = factory.build();
        let second = factory.build();
        assert!(!Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn shared_builds_return_one_tracker_per_thread() {
        TrackerFactory::reset_shared();
        let factory = TrackerFactory::shared(TrackerConfig::default());
        assert!(factory.is_shared());
        let first = factory.build();
        let second = TrackerFactory::shared(TrackerConfig::default()).build();
        assert!(Rc::ptr_eq(&first, &second));
        TrackerFactory::reset_shared();
        let third = factory.build();
        assert!(!Rc::ptr_eq(&first, &third));
    }
}
