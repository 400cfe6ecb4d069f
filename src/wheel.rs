
use {
    crate::{
        event_loop::{EventLoopDispatcher, EventLoopError, EventLoopId, EventLoopRef},
        time::{Clock, Time},
        utils::{copyhashmap::CopyHashMap, numcell::NumCell, oserror::OsError},
    },
    smallvec::SmallVec,
    std::{
        cell::{Cell, RefCell},
        cmp::Reverse,
        collections::BinaryHeap,
        error::Error,
        rc::{Rc, Weak},
        time::Duration,
    },
    thiserror::Error,
    uapi::{OwnedFd, c},
};

#[derive(Debug, Error)]
pub enum WheelError {
    #[error("Could not create the timerfd")]
    CreateFailed(#[source] OsError),
    #[error("Could not set the timerfd")]
    SetFailed(#[source] OsError),
    #[error("Could not read from the timerfd")]
    Read(#[source] OsError),
    #[error("Could not register the timerfd with the event loop")]
    EventLoopError(#[from] EventLoopError),
    #[error("The timer wheel is already destroyed")]
    Destroyed,
}

pub trait WheelDispatcher {
    fn expired(self: Rc<Self>);
}

#[derive(Debug, Eq, PartialEq, Ord, PartialOrd)]
struct WheelEntry {
    expiration: Time,
    id: u64,
}

struct ArmedTimer {
    expiration: Time,
    dispatcher: Weak<dyn WheelDispatcher>,
}

impl Clone for ArmedTimer {
    fn clone(&self) -> Self {
        Self {
            expiration: self.expiration,
            dispatcher: self.dispatcher.clone(),
        }
    }
}

/// Multiplexes any number of one-shot timers onto a single timerfd.
///
/// A wheel created with [`Wheel::new`] has no timerfd and is driven by calling
/// [`Wheel::dispatch_expired`] after the clock has been advanced.
pub struct Wheel {
    data: Rc<WheelData>,
}

struct WheelData {
    destroyed: Cell<bool>,
    clock: Rc<dyn Clock>,
    fd: Option<OwnedFd>,
    el: RefCell<Option<(EventLoopRef, EventLoopId)>>,
    next_id: NumCell<u64>,
    current_expiration: Cell<Option<Time>>,
    armed: CopyHashMap<u64, ArmedTimer>,
    expirations: RefCell<BinaryHeap<Reverse<WheelEntry>>>,
}

pub struct WheelTimer {
    id: u64,
    wheel: Rc<WheelData>,
    dispatcher: Weak<dyn WheelDispatcher>,
}

impl Wheel {
    pub fn new(clock: &Rc<dyn Clock>) -> Rc<Self> {
        Rc::new(Self {
            data: Rc::new(WheelData::new(clock, None)),
        })
    }

    pub fn install(el: &EventLoopRef, clock: &Rc<dyn Clock>) -> Result<Rc<Self>, WheelError> {
        let fd = match uapi::timerfd_create(c::CLOCK_MONOTONIC, c::TFD_CLOEXEC | c::TFD_NONBLOCK) {
            Ok(fd) => fd,
            Err(e) => return Err(WheelError::CreateFailed(e.into())),
        };
        let data = Rc::new(WheelData::new(clock, Some(fd)));
        let id = el.id()?;
        if let Some(fd) = &data.fd {
            el.insert(id, fd.raw(), c::EPOLLIN, data.clone())?;
        }
        *data.el.borrow_mut() = Some((el.clone(), id));
        Ok(Rc::new(Self { data }))
    }

    pub fn now(&self) -> Time {
        self.data.clock.now()
    }

    pub fn timer(&self, dispatcher: Weak<dyn WheelDispatcher>) -> WheelTimer {
        WheelTimer {
            id: self.data.next_id.fetch_add(1),
            wheel: self.data.clone(),
            dispatcher,
        }
    }

    pub fn num_armed(&self) -> usize {
        self.data.armed.len()
    }

    pub fn next_expiration(&self) -> Option<Time> {
        let mut expirations = self.data.expirations.borrow_mut();
        while let Some(Reverse(entry)) = expirations.peek() {
            if self.data.is_current(entry) {
                return Some(entry.expiration);
            }
            expirations.pop();
        }
        None
    }

    pub fn dispatch_expired(&self) -> Result<(), WheelError> {
        self.data.dispatch_expired()
    }
}

impl Drop for Wheel {
    fn drop(&mut self) {
        self.data.kill();
    }
}

impl WheelData {
    fn new(clock: &Rc<dyn Clock>, fd: Option<OwnedFd>) -> Self {
        Self {
            destroyed: Cell::new(false),
            clock: clock.clone(),
            fd,
            el: Default::default(),
            next_id: NumCell::new(1),
            current_expiration: Default::default(),
            armed: Default::default(),
            expirations: Default::default(),
        }
    }

    fn kill(&self) {
        self.destroyed.set(true);
        self.armed.take();
        self.expirations.borrow_mut().clear();
        if let Some((el, id)) = self.el.borrow_mut().take() {
            let _ = el.remove(id);
        }
    }

    fn is_current(&self, entry: &WheelEntry) -> bool {
        match self.armed.get(&entry.id) {
            Some(t) => t.expiration == entry.expiration,
            None => false,
        }
    }

    fn set_fd(&self, expiration: Option<Time>) -> Result<(), WheelError> {
        self.current_expiration.set(expiration);
        let Some(fd) = &self.fd else {
            return Ok(());
        };
        let it_value = match expiration {
            Some(e) => e.0,
            None => uapi::pod_zeroed(),
        };
        let res = uapi::timerfd_settime(
            fd.raw(),
            c::TFD_TIMER_ABSTIME,
            &c::itimerspec {
                it_interval: uapi::pod_zeroed(),
                it_value,
            },
        );
        if let Err(e) = res {
            return Err(WheelError::SetFailed(e.into()));
        }
        Ok(())
    }

    fn program(
        &self,
        id: u64,
        dispatcher: &Weak<dyn WheelDispatcher>,
        timeout: Duration,
    ) -> Result<(), WheelError> {
        if self.destroyed.get() {
            return Err(WheelError::Destroyed);
        }
        let expiration = self.clock.now() + timeout;
        self.armed.set(
            id,
            ArmedTimer {
                expiration,
                dispatcher: dispatcher.clone(),
            },
        );
        self.expirations
            .borrow_mut()
            .push(Reverse(WheelEntry { expiration, id }));
        let current = self.current_expiration.get();
        if current.is_none_or(|c| expiration < c) {
            self.set_fd(Some(expiration))?;
        }
        Ok(())
    }

    fn rearm(&self) -> Result<(), WheelError> {
        let next = {
            let mut expirations = self.expirations.borrow_mut();
            loop {
                match expirations.peek() {
                    Some(Reverse(entry)) if self.is_current(entry) => {
                        break Some(entry.expiration);
                    }
                    Some(_) => {
                        expirations.pop();
                    }
                    None => break None,
                }
            }
        };
        self.set_fd(next)
    }

    fn dispatch_expired(&self) -> Result<(), WheelError> {
        if let Some(fd) = &self.fd {
            let mut n = 0u64;
            loop {
                if let Err(e) = uapi::read(fd.raw(), &mut n) {
                    if e.0 == c::EAGAIN {
                        break;
                    }
                    return Err(WheelError::Read(e.into()));
                }
            }
        }
        let now = self.clock.now();
        let mut to_dispatch = SmallVec::<[Weak<dyn WheelDispatcher>; 4]>::new();
        {
            let mut expirations = self.expirations.borrow_mut();
            while let Some(Reverse(entry)) = expirations.peek() {
                if entry.expiration > now {
                    break;
                }
                if self.is_current(entry)
                    && let Some(timer) = self.armed.remove(&entry.id)
                {
                    to_dispatch.push(timer.dispatcher);
                }
                expirations.pop();
            }
        }
        self.rearm()?;
        for dispatcher in to_dispatch {
            if let Some(dispatcher) = dispatcher.upgrade() {
                dispatcher.expired();
            }
        }
        Ok(())
    }
}

impl EventLoopDispatcher for WheelData {
    fn dispatch(self: Rc<Self>, _events: i32) -> Result<(), Box<dyn Error>> {
        self.dispatch_expired()?;
        Ok(())
    }
}

impl WheelTimer {
    /// Arms the timer to expire once after `timeout`, replacing any earlier expiration.
    pub fn program(&self, timeout: Duration) -> Result<(), WheelError> {
        self.wheel.program(self.id, &self.dispatcher, timeout)
    }

    pub fn cancel(&self) {
        self.wheel.armed.remove(&self.id);
    }

    pub fn is_armed(&self) -> bool {
        self.wheel.armed.contains(&self.id)
    }
}

impl Drop for WheelTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
