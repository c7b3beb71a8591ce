//! The whole engine, end to end: scan two live models, wire them by
//! path, move values, stop echoes, unwire, let go.

use std::sync::{Arc, Mutex};

use tether_core::{Fixture, Object, Payload};
use tether_harness::{Card, Dial, Panel};
use tether_path::CamelCaseParser;
use tether_scan::{NotifyScanner, TypeSchema};

fn card_scanner() -> NotifyScanner {
    NotifyScanner::new(CamelCaseParser).with::<Card>(|schema: TypeSchema<Card>| {
        schema.property("Title", Card::title, |card, title: String| {
            card.set_title(title);
        })
    })
}

#[test]
fn matching_properties_synchronize_across_objects() {
    let scanner = card_scanner();
    let card_a = Card::new("start");
    let card_b = Card::new("other");
    let roots: Vec<Object> = vec![Arc::clone(&card_a) as Object, Arc::clone(&card_b) as Object];

    let fixtures = Fixture::create_fixtures(&scanner, &roots);
    assert_eq!(fixtures.len(), 1);
    assert_eq!(fixtures[0].path().to_string(), "title");

    card_a.set_title("hello");
    assert_eq!(card_b.title(), "hello", "value propagated to the peer");
    assert_eq!(card_a.title_set_count(), 1, "no echo written back");
    assert_eq!(card_b.title_set_count(), 1, "exactly one write on the peer");
}

#[test]
fn change_notification_exposes_exactly_the_new_value() {
    let scanner = card_scanner();
    let card_a = Card::new("a");
    let card_b = Card::new("b");
    let roots: Vec<Object> = vec![Arc::clone(&card_a) as Object, Arc::clone(&card_b) as Object];
    let fixtures = Fixture::create_fixtures(&scanner, &roots);

    let valve = fixtures[0].valve().expect("wired");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = valve.on_changed().subscribe(move |payload: &Payload| {
        let title = payload[0]
            .downcast_ref::<String>()
            .cloned()
            .expect("string payload");
        sink.lock().expect("seen").push(title);
    });

    card_a.set_title("hello");
    assert_eq!(*seen.lock().expect("seen"), vec!["hello".to_owned()]);

    let values = valve.values_for_object(&(Arc::clone(&card_b) as Object));
    assert_eq!(values[0].downcast_ref::<String>().map(String::as_str), Some("hello"));
}

#[test]
fn duplicate_set_propagates_once() {
    let scanner = card_scanner();
    let card_a = Card::new("a");
    let card_b = Card::new("b");
    let roots: Vec<Object> = vec![Arc::clone(&card_a) as Object, Arc::clone(&card_b) as Object];
    let _fixtures = Fixture::create_fixtures(&scanner, &roots);

    card_a.set_title("same");
    card_a.set_title("same");
    assert_eq!(
        card_a.title_set_count(),
        2,
        "the originator's own change counter keeps counting"
    );
    assert_eq!(
        card_b.title_set_count(),
        1,
        "the duplicate never reaches the peer"
    );
}

#[test]
fn three_way_binding_relays_to_all_peers() {
    let scanner = card_scanner();
    let cards = [Card::new("1"), Card::new("2"), Card::new("3")];
    let roots: Vec<Object> = cards
        .iter()
        .map(|card| Arc::clone(card) as Object)
        .collect();
    let _fixtures = Fixture::create_fixtures(&scanner, &roots);

    cards[1].set_title("from the middle");
    assert_eq!(cards[0].title(), "from the middle");
    assert_eq!(cards[2].title(), "from the middle");
    assert_eq!(cards[0].title_set_count(), 1);
    assert_eq!(cards[1].title_set_count(), 1);
    assert_eq!(cards[2].title_set_count(), 1);
}

#[test]
fn unrelated_types_bind_nothing() {
    let scanner = card_scanner().with::<Dial>(|schema: TypeSchema<Dial>| {
        schema.property("Value", Dial::value, Dial::set_value)
    });
    let card = Card::new("words");
    let dial = Dial::new(10);
    let roots: Vec<Object> = vec![Arc::clone(&card) as Object, Arc::clone(&dial) as Object];
    let fixtures = Fixture::create_fixtures(&scanner, &roots);
    assert!(fixtures.is_empty(), "Title and Value never meet");
}

#[test]
fn nested_members_bind_across_objects() {
    let scanner = NotifyScanner::new(CamelCaseParser)
        .with::<Panel>(|schema: TypeSchema<Panel>| {
            schema
                .property("Title", Panel::title, |panel, title: String| {
                    panel.set_title(title);
                })
                .child("Badge", |panel: &Panel| Some(panel.badge()))
        })
        .with::<tether_harness::Badge>(|schema: TypeSchema<tether_harness::Badge>| {
            schema.property("Text", tether_harness::Badge::text, |badge, text: String| {
                badge.set_text(text);
            })
        });

    let panel_a = Panel::new("a", "old");
    let panel_b = Panel::new("b", "old");
    let roots: Vec<Object> = vec![Arc::clone(&panel_a) as Object, Arc::clone(&panel_b) as Object];
    let fixtures = Fixture::create_fixtures(&scanner, &roots);

    let paths: Vec<String> = fixtures
        .iter()
        .flat_map(Fixture::iter)
        .map(|fixture| fixture.path().to_string())
        .collect();
    assert_eq!(paths, ["badge", "badge.text", "title"]);

    panel_a.badge().set_text("shipped");
    assert_eq!(
        panel_b.badge().text(),
        "shipped",
        "nested members synchronize through composed accessors"
    );

    panel_b.set_title("renamed");
    assert_eq!(panel_a.title(), "renamed");
}

#[test]
fn dropping_fixtures_unwires_everything() {
    let scanner = card_scanner();
    let card_a = Card::new("a");
    let card_b = Card::new("b");
    let roots: Vec<Object> = vec![Arc::clone(&card_a) as Object, Arc::clone(&card_b) as Object];
    let fixtures = Fixture::create_fixtures(&scanner, &roots);

    card_a.set_title("bound");
    assert_eq!(card_b.title(), "bound");

    drop(fixtures);
    card_a.set_title("loose");
    assert_eq!(card_b.title(), "bound", "no propagation after teardown");
}

#[test]
fn teardown_returns_ownership_to_the_caller() {
    let scanner = card_scanner();
    let card_a = Card::new("a");
    let card_b = Card::new("b");
    let weak_b = Arc::downgrade(&card_b);
    let roots: Vec<Object> = vec![Arc::clone(&card_a) as Object, Arc::clone(&card_b) as Object];
    let fixtures = Fixture::create_fixtures(&scanner, &roots);

    // Only the fixtures' attachments keep card_b alive now.
    drop(roots);
    drop(card_b);
    assert!(weak_b.upgrade().is_some(), "actively bound values stay reachable");

    drop(fixtures);
    assert!(
        weak_b.upgrade().is_none(),
        "nothing in the engine survives teardown holding the object"
    );
    assert_eq!(card_a.title(), "a", "the surviving peer is untouched");
}
