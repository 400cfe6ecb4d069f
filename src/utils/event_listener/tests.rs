use {
    crate::utils::{
        event_listener::{EventListener, EventSource},
        numcell::NumCell,
    },
    std::{
        cell::RefCell,
        rc::{Rc, Weak},
    },
};

trait Ping {
    fn ping(self: Rc<Self>);
}

struct Pinged {
    count: NumCell<u32>,
    listener: EventListener<dyn Ping>,
    detach_other: RefCell<Option<Rc<Pinged>>>,
}

impl Pinged {
    fn new() -> Rc<Self> {
        Rc::new_cyclic(|slf: &Weak<Self>| Self {
            count: NumCell::new(0),
            listener: EventListener::new(slf.clone()),
            detach_other: Default::default(),
        })
    }
}

impl Ping for Pinged {
    fn ping(self: Rc<Self>) {
        self.count.fetch_add(1);
        if let Some(other) = self.detach_other.borrow_mut().take() {
            other.listener.detach();
        }
    }
}

fn emit(source: &EventSource<dyn Ping>) {
    for listener in source.iter() {
        listener.ping();
    }
}

#[test]
fn listeners_are_called_in_attach_order() {
    let source = EventSource::<dyn Ping>::default();
    let a = Pinged::new();
    let b = Pinged::new();
    a.listener.attach(&source);
    b.listener.attach(&source);
    emit(&source);
    assert_eq!(a.count.get(), 1);
    assert_eq!(b.count.get(), 1);
    assert!(source.has_listeners());
}

#[test]
fn detached_during_dispatch_is_skipped() {
    let source = EventSource::<dyn Ping>::default();
    let a = Pinged::new();
    let b = Pinged::new();
    a.listener.attach(&source);
    b.listener.attach(&source);
    *a.detach_other.borrow_mut() = Some(b.clone());
    emit(&source);
    assert_eq!(a.count.get(), 1);
    assert_eq!(b.count.get(), 0);
    assert!(!b.listener.is_attached());
}

#[test]
fn dropping_the_listener_detaches() {
    let source = EventSource::<dyn Ping>::default();
    let a = Pinged::new();
    a.listener.attach(&source);
    drop(a);
    assert!(!source.has_listeners());
    emit(&source);
}

#[test]
fn reattaching_moves_the_listener() {
    let s1 = EventSource::<dyn Ping>::default();
    let s2 = EventSource::<dyn Ping>::default();
    let a = Pinged::new();
    a.listener.attach(&s1);
    a.listener.attach(&s2);
    emit(&s1);
    assert_eq!(a.count.get(), 0);
    emit(&s2);
    assert_eq!(a.count.get(), 1);
}
