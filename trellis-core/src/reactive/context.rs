//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when tracked state is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! Each runtime owns one stack of running subscribers per thread. When a
//! subscriber runs, it is pushed onto the calling thread's stack; when it
//! completes, it is popped and the enclosing subscriber (if any) becomes
//! current again. This design supports nested contexts (e.g., an effect
//! that reads a computed value, which recomputes inside the effect).
//!
//! Reads are attributed only to a subscriber running on the same thread,
//! so a post-flush job running on a worker thread never captures reads made
//! elsewhere.
//!
//! Tracking can also be paused. A paused context still knows which
//! subscriber is running, so self-trigger suppression keeps working, but
//! reads register nothing. Entering a subscriber always resumes tracking
//! for the duration of its run.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use dashmap::DashMap;

use super::subscriber::{Subscriber, SubscriberId};

/// An entry in the reactive context stack.
struct ContextEntry {
    subscriber: Arc<dyn Subscriber>,
    /// The paused flag to restore when this entry is popped.
    resume_paused: bool,
}

#[derive(Default)]
struct StackState {
    entries: Vec<ContextEntry>,
    paused: bool,
}

impl StackState {
    fn is_idle(&self) -> bool {
        self.entries.is_empty() && !self.paused
    }
}

/// The active-subscriber stacks of one runtime, keyed by thread.
#[derive(Default)]
pub(crate) struct ContextStack {
    threads: DashMap<ThreadId, StackState>,
}

impl ContextStack {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// The context is automatically exited when the returned guard is
    /// dropped, including during unwinding.
    pub(crate) fn enter(&self, subscriber: Arc<dyn Subscriber>) -> ReactiveContext<'_> {
        let id = subscriber.id();
        let thread = thread::current().id();
        let mut state = self.threads.entry(thread).or_default();
        let resume_paused = std::mem::replace(&mut state.paused, false);
        state.entries.push(ContextEntry {
            subscriber,
            resume_paused,
        });

        ReactiveContext {
            stack: self,
            thread,
            subscriber_id: id,
        }
    }

    fn with_current<R>(&self, f: impl FnOnce(&StackState) -> R) -> Option<R> {
        self.threads.get(&thread::current().id()).map(|state| f(&state))
    }

    /// Drop the thread's stack once nothing is running or paused on it.
    fn release(&self, thread: ThreadId) {
        self.threads.remove_if(&thread, |_, state| state.is_idle());
    }

    /// The subscriber reads should be attributed to, if tracking is on.
    pub(crate) fn tracking_subscriber(&self) -> Option<Arc<dyn Subscriber>> {
        self.with_current(|state| {
            if state.paused {
                return None;
            }
            state.entries.last().map(|entry| Arc::clone(&entry.subscriber))
        })
        .flatten()
    }

    /// Get the current subscriber ID, if any, regardless of pausing.
    pub(crate) fn current_subscriber(&self) -> Option<SubscriberId> {
        self.with_current(|state| state.entries.last().map(|entry| entry.subscriber.id()))
            .flatten()
    }

    /// Check if reads would currently be tracked.
    pub(crate) fn is_tracking(&self) -> bool {
        self.with_current(|state| !state.paused && !state.entries.is_empty())
            .unwrap_or(false)
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        self.with_current(|state| state.entries.len()).unwrap_or(0)
    }

    /// Suspend tracking until the returned guard is dropped.
    pub(crate) fn pause(&self) -> TrackingPause<'_> {
        let thread = thread::current().id();
        let previous = std::mem::replace(&mut self.threads.entry(thread).or_default().paused, true);
        TrackingPause {
            stack: self,
            thread,
            previous,
        }
    }
}

/// Guard that pops the context when dropped.
pub(crate) struct ReactiveContext<'a> {
    stack: &'a ContextStack,
    thread: ThreadId,
    subscriber_id: SubscriberId,
}

impl Drop for ReactiveContext<'_> {
    fn drop(&mut self) {
        if let Some(mut state) = self.stack.threads.get_mut(&self.thread) {
            if let Some(entry) = state.entries.pop() {
                // Verify we're popping the right context.
                debug_assert_eq!(
                    entry.subscriber.id(),
                    self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id,
                    entry.subscriber.id()
                );
                state.paused = entry.resume_paused;
            }
        }
        self.stack.release(self.thread);
    }
}

/// Guard that restores the previous tracking state when dropped.
///
/// Pauses nest: an inner pause ending does not resume tracking that an
/// outer pause suspended.
pub struct TrackingPause<'a> {
    stack: &'a ContextStack,
    thread: ThreadId,
    previous: bool,
}

impl Drop for TrackingPause<'_> {
    fn drop(&mut self) {
        if let Some(mut state) = self.stack.threads.get_mut(&self.thread) {
            state.paused = self.previous;
        }
        self.stack.release(self.thread);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::subscriber::tests::MockSubscriber;
    use std::sync::Barrier;

    #[test]
    fn context_tracks_subscriber() {
        let stack = ContextStack::default();
        let sub = MockSubscriber::new(None);

        assert!(!stack.is_tracking());
        assert!(stack.current_subscriber().is_none());

        {
            let _ctx = stack.enter(sub.clone());

            assert!(stack.is_tracking());
            assert_eq!(stack.current_subscriber(), Some(sub.id));
        }

        // Context should be cleaned up after drop
        assert!(!stack.is_tracking());
        assert!(stack.current_subscriber().is_none());
    }

    #[test]
    fn nested_contexts() {
        let stack = ContextStack::default();
        let outer = MockSubscriber::new(None);
        let inner = MockSubscriber::new(None);

        {
            let _ctx1 = stack.enter(outer.clone());
            assert_eq!(stack.current_subscriber(), Some(outer.id));

            {
                let _ctx2 = stack.enter(inner.clone());
                assert_eq!(stack.current_subscriber(), Some(inner.id));
                assert_eq!(stack.depth(), 2);
            }

            // After inner context drops, outer should be current
            assert_eq!(stack.current_subscriber(), Some(outer.id));
        }

        assert!(stack.current_subscriber().is_none());
    }

    #[test]
    fn pause_suppresses_tracking_but_keeps_identity() {
        let stack = ContextStack::default();
        let sub = MockSubscriber::new(None);
        let _ctx = stack.enter(sub.clone());

        {
            let _outer = stack.pause();
            {
                let _inner = stack.pause();
                assert!(stack.tracking_subscriber().is_none());
            }
            // Still paused by the outer guard
            assert!(!stack.is_tracking());
            assert_eq!(stack.current_subscriber(), Some(sub.id));
        }

        assert!(stack.tracking_subscriber().is_some());
    }

    #[test]
    fn entering_resumes_tracking_then_restores_pause() {
        let stack = ContextStack::default();
        let outer = MockSubscriber::new(None);
        let nested = MockSubscriber::new(None);
        let _ctx = stack.enter(outer);
        let _pause = stack.pause();

        {
            let _nested = stack.enter(nested.clone());
            assert!(stack.is_tracking());
        }

        assert!(!stack.is_tracking());
    }

    #[test]
    fn threads_keep_separate_stacks() {
        let stack = ContextStack::default();
        let outer = MockSubscriber::new(None);
        let worker = MockSubscriber::new(None);
        let entered = Barrier::new(2);
        let checked = Barrier::new(2);

        let _ctx = stack.enter(outer.clone());
        std::thread::scope(|scope| {
            scope.spawn(|| {
                assert!(stack.current_subscriber().is_none());
                let _job = stack.enter(worker.clone());
                assert_eq!(stack.current_subscriber(), Some(worker.id));
                assert_eq!(stack.depth(), 1);
                entered.wait();
                checked.wait();
            });

            entered.wait();
            // The worker's run is invisible here
            assert_eq!(stack.current_subscriber(), Some(outer.id));
            assert_eq!(stack.depth(), 1);
            checked.wait();
        });

        assert_eq!(stack.current_subscriber(), Some(outer.id));
        assert_eq!(stack.threads.len(), 1);
    }
}
