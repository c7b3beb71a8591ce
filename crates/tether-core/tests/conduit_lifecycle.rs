//! Attachment lifecycle: weak observation, scoped release, deterministic
//! failure after the root is reclaimed.

use std::sync::Arc;

use tether_core::{Bindable, Conduit, Object};
use tether_harness::Probe;
use tether_path::{Path, SyllableParser, UnderscoreParser};

fn path(raw: &str) -> Path {
    UnderscoreParser.parse_path(raw)
}

fn template(name: &str) -> Arc<dyn Bindable> {
    Probe::duplex::<u32>(name)
}

#[test]
fn absolute_path_without_base_is_the_member_path() {
    let root: Object = Arc::new(());
    let conduit = Conduit::new(&template("value"), &root, None, 1);
    assert_eq!(conduit.absolute_path(), &path("value"));
    assert_eq!(conduit.tag(), 1);
}

#[test]
fn absolute_path_with_base_is_prefixed() {
    let root: Object = Arc::new(());
    let conduit = Conduit::new(&template("value"), &root, Some(&path("panel")), 2);
    assert_eq!(conduit.absolute_path(), &path("panel_value"));
    assert_eq!(conduit.tag(), 2);
}

#[test]
fn template_is_cloned_not_shared() {
    let shared = template("value");
    let (a, b): (Object, Object) = (Arc::new(1_u8), Arc::new(2_u8));
    let ca = Conduit::new(&shared, &a, None, 0);
    let cb = Conduit::new(&shared, &b, None, 1);

    assert!(!Arc::ptr_eq(ca.bindable(), &shared));
    assert!(!Arc::ptr_eq(ca.bindable(), cb.bindable()));

    let _ha = ca.attach().expect("a is alive");
    let _hb = cb.attach().expect("b is alive");
    let oa = ca.bindable().object().expect("attached");
    let ob = cb.bindable().object().expect("attached");
    assert!(!Arc::ptr_eq(&oa, &ob), "each clone binds its own root");
}

#[test]
fn attach_then_release_detaches() {
    let root: Object = Arc::new(());
    let conduit = Conduit::new(&template("value"), &root, None, 0);

    let handle = conduit.attach().expect("root is alive");
    assert!(conduit.bindable().object().is_some());

    handle.release();
    assert!(conduit.bindable().object().is_none());

    // Releasing twice (explicitly, then via drop) is a no-op.
    handle.release();
    drop(handle);
    assert!(conduit.bindable().object().is_none());
}

#[test]
fn attachment_holds_the_root_alive_until_released() {
    let root: Object = Arc::new(());
    let conduit = Conduit::new(&template("value"), &root, None, 0);
    let handle = conduit.attach().expect("root is alive");

    // The conduit observes weakly, but the attached bindable holds the
    // instance: an actively bound value stays reachable.
    drop(root);
    assert!(conduit.is_target_alive());

    handle.release();
    assert!(!conduit.is_target_alive());
}

#[test]
fn attach_after_reclaim_fails_deterministically() {
    let conduit = {
        let root: Object = Arc::new(());
        Conduit::new(&template("value"), &root, None, 0)
    };
    assert!(!conduit.is_target_alive());
    assert!(conduit.attach().is_none(), "no resurrection");
}

#[test]
fn release_then_drop_root_then_attach_fails() {
    let root: Object = Arc::new(());
    let conduit = Conduit::new(&template("value"), &root, None, 0);

    let handle = conduit.attach().expect("root is alive");
    drop(handle);
    assert!(conduit.bindable().object().is_none());

    drop(root);
    assert!(conduit.attach().is_none());
}
