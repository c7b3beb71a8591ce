//! Group propagation through probes: dedup, fault isolation, and
//! cross-thread serialization.

use std::sync::Arc;
use std::thread;

use tether_core::{Bindable, PushOutcome, StateValve, Valve, payload};
use tether_harness::Probe;

fn as_bindable(probe: &Arc<Probe>) -> Arc<dyn Bindable> {
    Arc::clone(probe) as Arc<dyn Bindable>
}

#[test]
fn producer_event_relays_to_every_other_member() {
    let valve = StateValve::new();
    let a = Probe::duplex::<u32>("value");
    let b = Probe::duplex::<u32>("value");
    let c = Probe::duplex::<u32>("value");
    for probe in [&a, &b, &c] {
        valve.add(&as_bindable(probe)).expect("add");
    }

    a.emit(&payload![3_u32]);
    assert_eq!(a.consumed_count(), 0, "originator skipped");
    assert_eq!(b.consumed_count(), 1);
    assert_eq!(c.consumed_count(), 1);
}

#[test]
fn duplicate_emission_reaches_no_other_member() {
    // The originating member fires twice; nobody else hears the second.
    let valve = StateValve::new();
    let a = Probe::duplex::<u32>("value");
    let b = Probe::duplex::<u32>("value");
    valve.add(&as_bindable(&a)).expect("add");
    valve.add(&as_bindable(&b)).expect("add");

    a.emit(&payload![5_u32]);
    a.emit(&payload![5_u32]);
    assert_eq!(b.consumed_count(), 1, "second emission judged unchanged");

    a.emit(&payload![6_u32]);
    assert_eq!(b.consumed_count(), 2);
}

#[test]
fn faulty_member_does_not_abort_group_delivery() {
    let valve = StateValve::new();
    let bad = Probe::faulty::<u32>("value");
    let good = Probe::consumer::<u32>("value");
    valve.add(&as_bindable(&bad)).expect("add");
    valve.add(&as_bindable(&good)).expect("add");

    let outcome = valve.push(None, &payload![1_u32]).expect("push");
    assert!(outcome.accepted_any());
    assert_eq!(good.consumed_count(), 1);
}

#[test]
fn heterogeneous_group_skips_incompatible_members_silently() {
    let valve = StateValve::new();
    let number = Probe::consumer::<u32>("value");
    let text = Probe::consumer::<String>("value");
    let wide = Probe::consumer::<u32>("pair");
    valve.add(&as_bindable(&number)).expect("add");
    valve.add(&as_bindable(&text)).expect("add");
    valve.add(&as_bindable(&wide)).expect("add");

    let outcome = valve.push(None, &payload![9_u32]).expect("push");
    let PushOutcome::Delivered(report) = outcome else {
        panic!("first push always delivers");
    };
    assert_eq!(report.accepted, 2, "u32 consumers take it");
    assert_eq!(report.skipped.len(), 1, "the String consumer is skipped");
    assert_eq!(number.consumed_count(), 1);
    assert_eq!(wide.consumed_count(), 1);
    assert_eq!(text.consumed_count(), 0);
}

#[test]
fn reclaimed_member_never_sees_another_payload() {
    let valve = StateValve::new();
    let keep = Probe::consumer::<u32>("value");
    let fleeting = Probe::consumer::<u32>("value");
    valve.add(&as_bindable(&keep)).expect("add");
    valve.add(&as_bindable(&fleeting)).expect("add");
    assert_eq!(valve.len(), 2);

    drop(fleeting);
    valve.push(None, &payload![1_u32]).expect("push");
    assert_eq!(keep.consumed_count(), 1);
    assert_eq!(valve.len(), 1, "pruned as a side effect of iteration");
}

#[test]
fn pushes_from_threads_serialize_without_deadlock() {
    let valve = StateValve::new();
    let a = Probe::duplex::<u32>("value");
    let b = Probe::duplex::<u32>("value");
    valve.add(&as_bindable(&a)).expect("add");
    valve.add(&as_bindable(&b)).expect("add");

    let handles: Vec<_> = (0..4_u32)
        .map(|seed| {
            let valve = Arc::clone(&valve);
            thread::spawn(move || {
                for step in 0..50_u32 {
                    let _ = valve.push(None, &payload![seed * 100 + step]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("no panic in pusher");
    }

    assert_eq!(valve.len(), 2);
    assert_eq!(
        a.consumed_count(),
        b.consumed_count(),
        "every delivered payload reached both members"
    );
}

#[test]
fn dispose_severs_producers_and_rejects_use() {
    let valve = Valve::new();
    let a = Probe::duplex::<u32>("value");
    let b = Probe::duplex::<u32>("value");
    valve.add(&as_bindable(&a)).expect("add");
    valve.add(&as_bindable(&b)).expect("add");

    valve.dispose();
    valve.dispose(); // idempotent

    a.emit(&payload![1_u32]);
    assert_eq!(b.consumed_count(), 0);
    assert!(valve.push(None, &payload![1_u32]).is_err());
    assert!(valve.add(&as_bindable(&a)).is_err());
}
