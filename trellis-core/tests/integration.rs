//! Integration Tests for the Reactive System
//!
//! These tests verify that tracked state, effects, and computed values work
//! together correctly through the public API.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use parking_lot::Mutex;
use trellis_core::reactive::{EffectHandle, EffectOptions, Key};
use trellis_core::{RawObject, Runtime, TriggerKind, Value, Warning, WrapOptions};

/// Test that an effect drops dependencies on branches it no longer takes.
#[test]
fn effect_follows_branch_switching() {
    let rt = Runtime::new();
    let state = rt
        .reactive(RawObject::record([("ok", Value::from(true)), ("text", Value::from("hi"))]))
        .as_record()
        .unwrap();
    let run_count = Arc::new(AtomicI32::new(0));

    let reader = state.clone();
    let run_count_clone = run_count.clone();
    let _effect = rt.effect(move || {
        run_count_clone.fetch_add(1, Ordering::SeqCst);
        if reader.get("ok").as_bool() == Some(true) {
            reader.get("text");
        }
    });
    assert_eq!(run_count.load(Ordering::SeqCst), 1);

    state.set("ok", false);
    assert_eq!(run_count.load(Ordering::SeqCst), 2);

    // `text` is no longer read, so writing it does nothing
    state.set("text", "bye");
    assert_eq!(run_count.load(Ordering::SeqCst), 2);
    assert!(rt.subscribers(state.tracked().raw(), &Key::field("text")).is_empty());

    state.set("ok", true);
    assert_eq!(run_count.load(Ordering::SeqCst), 3);
    state.set("text", "again");
    assert_eq!(run_count.load(Ordering::SeqCst), 4);
}

/// Test that an effect writing what it reads does not re-trigger itself.
#[test]
fn effect_does_not_trigger_itself() {
    let rt = Runtime::new();
    let state = rt.reactive(RawObject::record([("n", 0)])).as_record().unwrap();
    let run_count = Arc::new(AtomicI32::new(0));

    let reader = state.clone();
    let run_count_clone = run_count.clone();
    let _effect = rt.effect(move || {
        run_count_clone.fetch_add(1, Ordering::SeqCst);
        let n = reader.get("n").as_int().unwrap_or(0);
        reader.set("n", n + 1);
    });

    assert_eq!(run_count.load(Ordering::SeqCst), 1);
    assert_eq!(state.get("n"), Value::from(1));

    // An outside write re-runs it once, and the inner increment stays silent
    state.set("n", 10);
    assert_eq!(run_count.load(Ordering::SeqCst), 2);
    assert_eq!(state.get("n"), Value::from(11));
}

/// Test that computed values cache and chain.
#[test]
fn computed_chain_is_lazy_and_cached() {
    let rt = Runtime::new();
    let state = rt.reactive(RawObject::record([("base", 2)])).as_record().unwrap();
    let evaluations = Arc::new(AtomicI32::new(0));

    let reader = state.clone();
    let evaluations_clone = evaluations.clone();
    let doubled = rt.computed(move || {
        evaluations_clone.fetch_add(1, Ordering::SeqCst);
        reader.get("base").as_int().unwrap_or(0) * 2
    });
    let inner = doubled.clone();
    let quadrupled = rt.computed(move || inner.value() * 2);

    // Nothing runs until read
    assert_eq!(evaluations.load(Ordering::SeqCst), 0);
    assert_eq!(quadrupled.value(), 8);
    assert_eq!(quadrupled.value(), 8);
    assert_eq!(evaluations.load(Ordering::SeqCst), 1);

    state.set("base", 5);
    assert_eq!(evaluations.load(Ordering::SeqCst), 1);
    assert_eq!(quadrupled.value(), 20);
    assert_eq!(evaluations.load(Ordering::SeqCst), 2);
}

/// Test that an effect reading a computed re-runs when the computed's input
/// changes.
#[test]
fn effect_observes_computed() {
    let rt = Runtime::new();
    let state = rt.reactive(RawObject::record([("x", 1)])).as_record().unwrap();

    let reader = state.clone();
    let plus_one = rt.computed(move || reader.get("x").as_int().unwrap_or(0) + 1);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let observed = plus_one.clone();
    let _effect = rt.effect(move || seen_clone.lock().push(observed.value()));

    state.set("x", 2);
    state.set("x", 3);
    assert_eq!(*seen.lock(), vec![2, 3, 4]);
}

/// Test that a nested run restores the outer subscriber on exit.
#[test]
fn nested_effects_restore_outer_context() {
    let rt = Runtime::new();
    let state = rt
        .reactive(RawObject::record([("a", 0), ("b", 0), ("c", 0)]))
        .as_record()
        .unwrap();
    let outer_runs = Arc::new(AtomicI32::new(0));
    let inner_runs = Arc::new(AtomicI32::new(0));

    let reader = state.clone();
    let inner_runs_clone = inner_runs.clone();
    let inner = rt.effect_with(
        move || {
            inner_runs_clone.fetch_add(1, Ordering::SeqCst);
            reader.get("b");
        },
        EffectOptions::default().lazy(),
    );

    let reader = state.clone();
    let outer_runs_clone = outer_runs.clone();
    let nested = inner.clone();
    let _outer = rt.effect(move || {
        outer_runs_clone.fetch_add(1, Ordering::SeqCst);
        reader.get("a");
        nested.run();
        // Read after the inner run returns: must land on the outer effect
        reader.get("c");
    });
    assert_eq!(outer_runs.load(Ordering::SeqCst), 1);
    assert_eq!(inner_runs.load(Ordering::SeqCst), 1);
    assert_eq!(rt.current_subscriber(), None);

    state.set("b", 1);
    assert_eq!(outer_runs.load(Ordering::SeqCst), 1);
    assert_eq!(inner_runs.load(Ordering::SeqCst), 2);

    state.set("c", 1);
    assert_eq!(outer_runs.load(Ordering::SeqCst), 2);
    assert_eq!(inner_runs.load(Ordering::SeqCst), 3);
}

/// Test that wrapping is idempotent in both directions.
#[test]
fn wrapping_is_idempotent() {
    let rt = Runtime::new();
    let raw = RawObject::record([("a", 1)]);

    let tracked = rt.reactive(raw.clone());
    assert!(tracked.ptr_eq(&rt.reactive(raw.clone())));

    // Wrapping a handle again returns it unchanged
    let again = rt.wrap(Value::from(tracked.clone()), WrapOptions::REACTIVE);
    assert!(again.as_tracked().unwrap().ptr_eq(&tracked));

    // Unwrapping gives back the same object
    assert!(tracked.raw().ptr_eq(&raw));
}

/// Test that read-only writes are dropped and reported.
#[test]
fn readonly_writes_warn_and_do_nothing() {
    let warnings = Arc::new(Mutex::new(Vec::new()));
    let warnings_clone = warnings.clone();
    let rt = Runtime::builder()
        .on_warning(move |warning| warnings_clone.lock().push(warning.clone()))
        .build();

    let raw = RawObject::record([("nested", RawObject::list([1]))]);
    let readonly = rt.readonly(raw).as_record().unwrap();

    readonly.set("nested", 0);
    let nested = readonly.get("nested").into_tracked().unwrap();
    assert!(nested.is_readonly());
    nested.as_list().unwrap().push(2);

    let warnings = warnings.lock();
    assert_eq!(warnings.len(), 2);
    assert!(matches!(&warnings[0], Warning::ReadonlyWrite { key, .. } if key == "nested"));
    assert!(matches!(&warnings[1], Warning::ReadonlyWrite { key, .. } if key == "length"));
    assert_eq!(readonly.get("nested").into_tracked().unwrap().as_list().unwrap().len(), 1);
}

/// Test that shallow wrappers only react at the top level.
#[test]
fn shallow_wrapper_ignores_nested_writes() {
    let rt = Runtime::new();
    let child = RawObject::record([("x", 1)]);
    let parent = rt
        .shallow_reactive(RawObject::record([("child", child.clone())]))
        .as_record()
        .unwrap();
    let run_count = Arc::new(AtomicI32::new(0));

    let reader = parent.clone();
    let run_count_clone = run_count.clone();
    let _effect = rt.effect(move || {
        run_count_clone.fetch_add(1, Ordering::SeqCst);
        // Shallow reads hand back the raw child, so this read is untracked
        if let Some(raw) = reader.get("child").as_object() {
            raw.snapshot();
        }
    });

    rt.reactive(child).as_record().unwrap().set("x", 2);
    assert_eq!(run_count.load(Ordering::SeqCst), 1);

    parent.set("child", RawObject::record([("x", 3)]));
    assert_eq!(run_count.load(Ordering::SeqCst), 2);
}

/// Test that a stopped effect is never notified again.
#[test]
fn stopped_effect_does_not_run() {
    let rt = Runtime::new();
    let state = rt.reactive(RawObject::record([("n", 0)])).as_record().unwrap();
    let run_count = Arc::new(AtomicI32::new(0));

    let reader = state.clone();
    let run_count_clone = run_count.clone();
    let effect = rt.effect(move || {
        run_count_clone.fetch_add(1, Ordering::SeqCst);
        reader.get("n");
    });

    effect.stop();
    assert!(!effect.is_active());
    assert_eq!(effect.dependency_count(), 0);

    state.set("n", 1);
    assert_eq!(run_count.load(Ordering::SeqCst), 1);

    // Manual runs still execute the body, untracked
    effect.run();
    assert_eq!(run_count.load(Ordering::SeqCst), 2);
    assert!(rt.subscribers(state.tracked().raw(), &Key::field("n")).is_empty());
}

/// Test that a scheduler receives the re-run instead of the effect running.
#[test]
fn scheduler_takes_over_reruns() {
    let rt = Runtime::new();
    let state = rt.reactive(RawObject::record([("n", 0)])).as_record().unwrap();
    let run_count = Arc::new(AtomicI32::new(0));
    let queued: Arc<Mutex<Vec<EffectHandle>>> = Arc::new(Mutex::new(Vec::new()));

    let reader = state.clone();
    let run_count_clone = run_count.clone();
    let queued_clone = queued.clone();
    let _effect = rt.effect_with(
        move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
            reader.get("n");
        },
        EffectOptions::default().with_scheduler(move |handle| queued_clone.lock().push(handle)),
    );

    state.set("n", 1);
    state.set("n", 2);
    assert_eq!(run_count.load(Ordering::SeqCst), 1);
    assert_eq!(queued.lock().len(), 2);

    let handle = queued.lock().remove(0);
    handle.run();
    assert_eq!(run_count.load(Ordering::SeqCst), 2);
}

/// Test that separate runtimes never observe each other.
#[test]
fn runtimes_are_isolated() {
    let first = Runtime::new();
    let second = Runtime::new();
    let raw = RawObject::record([("n", 0)]);
    let run_count = Arc::new(AtomicI32::new(0));

    let reader = first.reactive(raw.clone()).as_record().unwrap();
    let run_count_clone = run_count.clone();
    let _effect = first.effect(move || {
        run_count_clone.fetch_add(1, Ordering::SeqCst);
        reader.get("n");
    });

    second.reactive(raw.clone()).as_record().unwrap().set("n", 1);
    assert_eq!(run_count.load(Ordering::SeqCst), 1);

    first.reactive(raw).as_record().unwrap().set("n", 2);
    assert_eq!(run_count.load(Ordering::SeqCst), 2);
}

/// Test that untracked reads create no dependency.
#[test]
fn untracked_reads_are_ignored() {
    let rt = Runtime::new();
    let state = rt.reactive(RawObject::record([("a", 0), ("b", 0)])).as_record().unwrap();
    let run_count = Arc::new(AtomicI32::new(0));

    let reader = state.clone();
    let run_count_clone = run_count.clone();
    let runtime = rt.clone();
    let _effect = rt.effect(move || {
        run_count_clone.fetch_add(1, Ordering::SeqCst);
        reader.get("a");
        runtime.untracked(|| reader.get("b"));
    });

    state.set("b", 1);
    assert_eq!(run_count.load(Ordering::SeqCst), 1);
    state.set("a", 1);
    assert_eq!(run_count.load(Ordering::SeqCst), 2);
}

/// Test that the store forgets targets once they are dropped.
#[test]
fn sweep_reclaims_dropped_targets() {
    let rt = Runtime::new();
    {
        let state = rt.reactive(RawObject::record([("n", 0)])).as_record().unwrap();
        let reader = state.clone();
        let effect = rt.effect(move || {
            reader.get("n");
        });
        assert_eq!(rt.target_count(), 1);
        effect.stop();
    }

    assert_eq!(rt.sweep(), 1);
    assert_eq!(rt.target_count(), 0);
}

/// Test that a length-only trigger reaches readers past the new length.
#[test]
fn length_trigger_needs_only_the_new_length() {
    let rt = Runtime::new();
    let list = rt.reactive(RawObject::list([1, 2, 3])).as_list().unwrap();
    let run_count = Arc::new(AtomicI32::new(0));

    let reader = list.clone();
    let run_count_clone = run_count.clone();
    let _effect = rt.effect(move || {
        run_count_clone.fetch_add(1, Ordering::SeqCst);
        reader.get(2);
    });

    rt.trigger(
        list.tracked().raw(),
        Key::Length,
        TriggerKind::ValueChanged,
        Some(&Value::from(1)),
        None,
    );
    assert_eq!(run_count.load(Ordering::SeqCst), 2);
}

/// Test that effects running at once on different threads each track only
/// their own reads.
#[test]
fn concurrent_effects_track_their_own_reads() {
    let rt = Runtime::new();
    let state = rt
        .reactive(RawObject::record([("a", 0), ("b", 0)]))
        .as_record()
        .unwrap();
    let entered = Arc::new(Barrier::new(2));
    let read = Arc::new(Barrier::new(2));

    let spawn_reader = |field: &'static str| {
        let rt = rt.clone();
        let reader = state.clone();
        let entered = entered.clone();
        let read = read.clone();
        thread::spawn(move || {
            let first = AtomicBool::new(true);
            rt.effect(move || {
                let first = first.swap(false, Ordering::SeqCst);
                if first {
                    // Both effects are running before either reads
                    entered.wait();
                }
                reader.get(field);
                if first {
                    read.wait();
                }
            })
        })
    };
    let a = spawn_reader("a");
    let b = spawn_reader("b");
    let a = a.join().unwrap();
    let b = b.join().unwrap();

    let raw = state.tracked().raw();
    assert_eq!(rt.subscribers(raw, &Key::field("a")), vec![a.id()]);
    assert_eq!(rt.subscribers(raw, &Key::field("b")), vec![b.id()]);
    assert_eq!(rt.current_subscriber(), None);
}
