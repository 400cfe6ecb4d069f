use {
    crate::utils::{copyhashmap::CopyHashMap, numcell::NumCell, oserror::OsError},
    std::{
        cell::Cell,
        error::Error,
        rc::{Rc, Weak},
    },
    thiserror::Error,
    uapi::{Errno, OwnedFd, c},
};

#[derive(Debug, Error)]
pub enum EventLoopError {
    #[error("Could not create an epoll fd")]
    CreateFailed(#[source] OsError),
    #[error("epoll_wait failed")]
    WaitFailed(#[source] OsError),
    #[error("A dispatcher returned a fatal error")]
    DispatcherError(#[source] Box<dyn Error>),
    #[error("Could not insert an fd to wait on")]
    InsertFailed(#[source] OsError),
    #[error("Could not remove an fd to wait on")]
    RemoveFailed(#[source] OsError),
    #[error("Entry is not registered")]
    NoEntry,
    #[error("Event loop is already destroyed")]
    Destroyed,
}

#[derive(Copy, Clone, Debug, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct EventLoopId(u64);

pub trait EventLoopDispatcher {
    fn dispatch(self: Rc<Self>, events: i32) -> Result<(), Box<dyn Error>>;
}

#[derive(Clone)]
struct Entry {
    fd: i32,
    dispatcher: Rc<dyn EventLoopDispatcher>,
}

struct EventLoopData {
    epoll: OwnedFd,
    run: Cell<bool>,
    next_id: NumCell<u64>,
    entries: CopyHashMap<u64, Entry>,
}

pub struct EventLoop {
    data: Rc<EventLoopData>,
}

#[derive(Clone)]
pub struct EventLoopRef {
    data: Weak<EventLoopData>,
}

impl EventLoopData {
    fn id(&self) -> EventLoopId {
        EventLoopId(self.next_id.fetch_add(1))
    }

    fn insert(
        &self,
        id: EventLoopId,
        fd: i32,
        events: i32,
        dispatcher: Rc<dyn EventLoopDispatcher>,
    ) -> Result<(), EventLoopError> {
        let event = c::epoll_event {
            events: events as _,
            u64: id.0,
        };
        if let Err(e) = uapi::epoll_ctl(self.epoll.raw(), c::EPOLL_CTL_ADD, fd, Some(&event)) {
            return Err(EventLoopError::InsertFailed(e.into()));
        }
        self.entries.set(id.0, Entry { fd, dispatcher });
        Ok(())
    }

    fn remove(&self, id: EventLoopId) -> Result<(), EventLoopError> {
        let entry = match self.entries.remove(&id.0) {
            Some(e) => e,
            None => return Err(EventLoopError::NoEntry),
        };
        if let Err(e) = uapi::epoll_ctl(self.epoll.raw(), c::EPOLL_CTL_DEL, entry.fd, None) {
            return Err(EventLoopError::RemoveFailed(e.into()));
        }
        Ok(())
    }

    fn run(&self) -> Result<(), EventLoopError> {
        let mut buf = [c::epoll_event { events: 0, u64: 0 }; 16];
        while self.run.get() {
            let num = match uapi::epoll_wait(self.epoll.raw(), &mut buf, -1) {
                Ok(n) => n,
                Err(Errno(c::EINTR)) => continue,
                Err(e) => return Err(EventLoopError::WaitFailed(e.into())),
            };
            for event in &buf[..num] {
                if !self.run.get() {
                    break;
                }
                let id = event.u64;
                let entry = match self.entries.get(&id) {
                    Some(d) => d,
                    None => {
                        log::warn!("Entry {} created an event but has already been removed", id);
                        continue;
                    }
                };
                if let Err(e) = entry.dispatcher.dispatch(event.events as i32) {
                    return Err(EventLoopError::DispatcherError(e));
                }
            }
        }
        Ok(())
    }
}

impl EventLoop {
    pub fn new() -> Result<Self, EventLoopError> {
        let epoll = match uapi::epoll_create1(c::EPOLL_CLOEXEC) {
            Ok(e) => e,
            Err(e) => return Err(EventLoopError::CreateFailed(e.into())),
        };
        let data = Rc::new(EventLoopData {
            epoll,
            run: Cell::new(true),
            next_id: NumCell::new(1),
            entries: CopyHashMap::new(),
        });
        Ok(Self { data })
    }

    pub fn to_ref(&self) -> EventLoopRef {
        EventLoopRef {
            data: Rc::downgrade(&self.data),
        }
    }

    pub fn run(&self) -> Result<(), EventLoopError> {
        self.data.run()
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.data.entries.take();
    }
}

impl EventLoopRef {
    pub fn id(&self) -> Result<EventLoopId, EventLoopError> {
        match self.data.upgrade() {
            Some(d) => Ok(d.id()),
            None => Err(EventLoopError::Destroyed),
        }
    }

    pub fn stop(&self) {
        if let Some(d) = self.data.upgrade() {
            d.run.set(false);
        }
    }

    pub fn insert(
        &self,
        id: EventLoopId,
        fd: i32,
        events: i32,
        dispatcher: Rc<dyn EventLoopDispatcher>,
    ) -> Result<(), EventLoopError> {
        match self.data.upgrade() {
            Some(d) => d.insert(id, fd, events, dispatcher),
            None => Err(EventLoopError::Destroyed),
        }
    }

    pub fn remove(&self, id: EventLoopId) -> Result<(), EventLoopError> {
        match self.data.upgrade() {
            Some(d) => d.remove(id),
            None => Err(EventLoopError::Destroyed),
        }
    }
}
