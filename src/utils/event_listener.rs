#[cfg(test)]
mod tests;

use {
    crate::utils::numcell::NumCell,
    std::{
        cell::RefCell,
        rc::{Rc, Weak},
    },
};

pub struct EventSource<T: ?Sized> {
    inner: Rc<SourceInner<T>>,
}

struct SourceInner<T: ?Sized> {
    next_id: NumCell<u64>,
    listeners: RefCell<Vec<(u64, Weak<T>)>>,
}

/// A subscription to an [`EventSource`].
///
/// A listener is attached to at most one source. Detaching it, or dropping it, guarantees
/// that it is not returned by any iterator of the source afterwards, even by an iterator
/// that is currently being consumed.
pub struct EventListener<T: ?Sized> {
    t: Weak<T>,
    link: RefCell<Option<(Weak<SourceInner<T>>, u64)>>,
}

impl<T: ?Sized> Default for EventSource<T> {
    fn default() -> Self {
        Self {
            inner: Rc::new(SourceInner {
                next_id: NumCell::new(1),
                listeners: Default::default(),
            }),
        }
    }
}

impl<T: ?Sized> EventSource<T> {
    pub fn iter(&self) -> EventSourceIter<T> {
        EventSourceIter {
            source: self.inner.clone(),
            last: 0,
        }
    }

    pub fn has_listeners(&self) -> bool {
        self.inner
            .listeners
            .borrow()
            .iter()
            .any(|(_, l)| l.strong_count() > 0)
    }

    pub fn clear(&self) {
        self.inner.listeners.borrow_mut().clear();
    }
}

pub struct EventSourceIter<T: ?Sized> {
    source: Rc<SourceInner<T>>,
    last: u64,
}

impl<T: ?Sized> Iterator for EventSourceIter<T> {
    type Item = Rc<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (id, weak) = {
                let listeners = self.source.listeners.borrow();
                let idx = listeners.partition_point(|(id, _)| *id <= self.last);
                let (id, weak) = listeners.get(idx)?;
                (*id, weak.clone())
            };
            self.last = id;
            if let Some(t) = weak.upgrade() {
                return Some(t);
            }
        }
    }
}

impl<T: ?Sized> EventListener<T> {
    pub fn new(t: Weak<T>) -> Self {
        Self {
            t,
            link: Default::default(),
        }
    }

    pub fn attach(&self, source: &EventSource<T>) {
        self.detach();
        let id = source.inner.next_id.fetch_add(1);
        source
            .inner
            .listeners
            .borrow_mut()
            .push((id, self.t.clone()));
        *self.link.borrow_mut() = Some((Rc::downgrade(&source.inner), id));
    }

    pub fn detach(&self) {
        let link = self.link.borrow_mut().take();
        if let Some((source, id)) = link
            && let Some(source) = source.upgrade()
        {
            source.listeners.borrow_mut().retain(|(l, _)| *l != id);
        }
    }

    pub fn is_attached(&self) -> bool {
        self.link.borrow().is_some()
    }
}

impl<T: ?Sized> Drop for EventListener<T> {
    fn drop(&mut self) {
        self.detach();
    }
}
