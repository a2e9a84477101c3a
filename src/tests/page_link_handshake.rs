use super::*;
use std::cell::RefCell;
use std::rc::Rc;

type Events = Rc<RefCell<Vec<String>>>;

fn recorder() -> Events {
    Rc::new(RefCell::new(Vec::new()))
}

fn armed_link(events: &Events) -> PageLink<String, u32> {
    let link = PageLink::<String, u32>::new();
    let parent_events = Rc::clone(events);
    link.set_on_parent_close(move |_, payload: &String| {
        parent_events.borrow_mut().push(format!("parent:{payload}"));
    });
    let child_events = Rc::clone(events);
    link.set_on_child_close(move |_, payload: &u32| {
        child_events.borrow_mut().push(format!("child:{payload}"));
    });
    link
}

#[test]
fn parent_close_fires_once_and_clears_both_slots() {
    let events = recorder();
    let link = armed_link(&events);
    let child_side = link.clone();
    assert!(link.has_parent_handler());
    assert!(link.has_child_handler());

    assert!(link.notify_parent_closing(&"unloading".to_string()));
    assert_eq!(*events.borrow(), vec!["parent:unloading".to_string()]);
    assert!(!child_side.has_parent_handler());
    assert!(!child_side.has_child_handler());
    assert!(!child_side.is_armed());
    assert_eq!(child_side.closed_by(), Some(LinkSide::Parent));

    assert!(!child_side.notify_child_closing(&7));
    assert!(!link.notify_parent_closing(&"again".to_string()));
    assert_eq!(events.borrow().len(), 1);
    assert_eq!(link.closed_by(), Some(LinkSide::Parent));
}

#[test]
fn child_close_fires_once_and_silences_parent() {
    let events = recorder();
    let link = armed_link(&events);
    let child_side = link.clone();

    assert!(child_side.notify_child_closing(&42));
    assert!(!link.notify_parent_closing(&"late".to_string()));
    assert_eq!(*events.borrow(), vec!["child:42".to_string()]);
    assert_eq!(link.closed_by(), Some(LinkSide::Child));
}

#[test]
fn closing_without_handlers_is_a_no_op() {
    let link: PageLink = PageLink::new();
    assert!(!link.is_armed());
    assert!(!link.is_closed());
    assert!(!link.notify_child_closing(&()));
    assert!(link.is_closed());
    assert!(!link.notify_parent_closing(&()));
    assert_eq!(link.closed_by(), Some(LinkSide::Child));
}

#[test]
fn one_sided_registration_only_fires_its_own_direction() {
    let events = recorder();
    let link = PageLink::<String, u32>::new();
    let parent_events = Rc::clone(&events);
    link.set_on_parent_close(move |_, payload: &String| {
        parent_events.borrow_mut().push(payload.clone());
    });

    assert!(!link.notify_child_closing(&1));
    assert!(events.borrow().is_empty());
    assert!(!link.has_parent_handler());
}

#[test]
fn handler_receives_the_link_already_closed() {
    let link = PageLink::<(), ()>::new();
    let seen = Rc::new(RefCell::new(None));
    let seen_in_handler = Rc::clone(&seen);
    let other = Rc::new(RefCell::new(0));
    let other_in_handler = Rc::clone(&other);

    link.set_on_child_close(move |_, _| {
        *other_in_handler.borrow_mut() += 1;
    });
    link.set_on_parent_close(move |link, _| {
        let reentered = link.notify_child_closing(&());
        *seen_in_handler.borrow_mut() = Some((link.is_armed(), link.is_closed(), reentered));
    });

    assert!(link.notify_parent_closing(&()));
    assert_eq!(*seen.borrow(), Some((false, true, false)));
    assert_eq!(*other.borrow(), 0);
}

#[test]
fn registration_after_close_is_refused() {
    let link = PageLink::<(), ()>::new();
    link.notify_parent_closing(&());
    assert!(!link.set_on_child_close(|_, _| {}));
    assert!(!link.set_on_parent_close(|_, _| {}));
    assert!(!link.is_armed());
}

#[test]
fn re_registration_replaces_the_handler() {
    let events = recorder();
    let link = PageLink::<(), ()>::new();
    for label in ["first", "second"] {
        let events = Rc::clone(&events);
        assert!(link.set_on_child_close(move |_, _| {
            events.borrow_mut().push(label.to_string());
        }));
    }
    link.notify_child_closing(&());
    assert_eq!(*events.borrow(), vec!["second".to_string()]);
}

#[test]
fn clones_share_state() {
    let link = PageLink::<(), ()>::new();
    let clone = link.clone();
    let unrelated = PageLink::<(), ()>::new();
    assert!(link.ptr_eq(&clone));
    assert!(!link.ptr_eq(&unrelated));

    clone.set_on_parent_close(|_, _| {});
    assert!(link.has_parent_handler());
    assert_eq!(
        format!("{link:?}"),
        "PageLink { on_parent_close: true, on_child_close: false, closed_by: None }"
    );
}

#[test]
fn handlers_capturing_the_link_are_released_on_close() {
    let link = PageLink::<(), ()>::new();
    let captured = link.clone();
    link.set_on_child_close(move |_, _| {
        let _ = captured.is_closed();
    });
    assert_eq!(link.handle_count(), 2);
    link.notify_parent_closing(&());
    assert_eq!(link.handle_count(), 1);
}
