#[cfg(test)]
mod tests;

use {
    crate::{
        client::{Client, ClientError},
        ifs::wl_surface::{
            CachedLock, SurfaceClientCommitListener, SurfaceCommitListener, WlSurface,
            synced::{Synced, SyncedId, SyncedState},
        },
        object::{Object, Version},
        time::Time,
        tree::{OutputDestroyListener, OutputNode, OutputRefreshListener},
        utils::{
            clonecell::CloneCell,
            errorfmt::ErrorFmt,
            event_listener::{EventListener, EventSource},
        },
        wheel::{WheelDispatcher, WheelTimer},
        wire::{WpFifoV1Id, wp_fifo_v1::*},
    },
    std::{
        cell::{Cell, RefCell},
        collections::VecDeque,
        rc::{Rc, Weak},
        time::Duration,
    },
    thiserror::Error,
};

#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub struct FifoState {
    pub set_barrier: bool,
    pub wait_barrier: bool,
}

impl SyncedState for FifoState {}

/// A commit that waits for the barrier to be released.
struct FifoCommit {
    lock: CachedLock,
    reissues_barrier: bool,
}

pub trait FifoDestroyListener {
    fn fifo_destroyed(self: Rc<Self>, fifo: &WpFifoV1);
}

pub struct WpFifoV1 {
    pub id: WpFifoV1Id,
    pub client: Rc<Client>,
    pub surface: Rc<WlSurface>,
    pub version: Version,
    state: Rc<Synced<FifoState>>,
    synced_id: Cell<Option<SyncedId>>,
    armed: Cell<bool>,
    queue: RefCell<VecDeque<FifoCommit>>,
    output: CloneCell<Option<Rc<OutputNode>>>,
    refresh_listener: EventListener<dyn OutputRefreshListener>,
    output_destroy_listener: EventListener<dyn OutputDestroyListener>,
    client_commit_listener: EventListener<dyn SurfaceClientCommitListener>,
    commit_listener: EventListener<dyn SurfaceCommitListener>,
    last_refresh: Cell<Option<Time>>,
    timer: WheelTimer,
    fallback_interval: Duration,
    max_queued_commits: usize,
    destroyed: Cell<bool>,
    pub destroy_event: EventSource<dyn FifoDestroyListener>,
}

impl WpFifoV1 {
    pub fn new(id: WpFifoV1Id, version: Version, surface: &Rc<WlSurface>) -> Rc<Self> {
        let state = &surface.client.state;
        let config = &state.config.fifo;
        Rc::new_cyclic(|slf: &Weak<Self>| Self {
            id,
            client: surface.client.clone(),
            surface: surface.clone(),
            version,
            state: Default::default(),
            synced_id: Default::default(),
            armed: Cell::new(false),
            queue: Default::default(),
            output: Default::default(),
            refresh_listener: EventListener::new(slf.clone()),
            output_destroy_listener: EventListener::new(slf.clone()),
            client_commit_listener: EventListener::new(slf.clone()),
            commit_listener: EventListener::new(slf.clone()),
            last_refresh: Default::default(),
            timer: state.wheel.timer(slf.clone()),
            fallback_interval: config.fallback_interval(),
            max_queued_commits: config.max_queued_commits,
            destroyed: Cell::new(false),
            destroy_event: Default::default(),
        })
    }

    pub fn install(self: &Rc<Self>) -> Result<(), WpFifoV1Error> {
        if self.surface.fifo.is_some() {
            return Err(WpFifoV1Error::Exists);
        }
        self.surface.fifo.set(Some(self.clone()));
        self.synced_id
            .set(Some(self.surface.add_synced(&self.state)));
        self.client_commit_listener
            .attach(&self.surface.client_commit_event);
        self.commit_listener.attach(&self.surface.commit_event);
        self.set_output(self.surface.primary_output());
        log::debug!(
            "Client {}: created wp_fifo_v1@{} for surface {}",
            self.client.id,
            self.id,
            self.surface.id,
        );
        Ok(())
    }

    pub fn is_armed(&self) -> bool {
        self.armed.get()
    }

    pub fn num_queued(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn output(&self) -> Option<Rc<OutputNode>> {
        self.output.get()
    }

    pub fn last_refresh(&self) -> Option<Time> {
        self.last_refresh.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub fn pending(&self) -> FifoState {
        *self.state.pending()
    }

    pub fn current(&self) -> FifoState {
        *self.state.current()
    }

    /// The interval at which the barrier is force-released when the surface stops
    /// receiving refresh signals.
    pub fn cadence(&self) -> Duration {
        self.output
            .get()
            .and_then(|o| o.refresh_interval())
            .unwrap_or(self.fallback_interval)
    }

    pub fn set_output(&self, output: Option<Rc<OutputNode>>) {
        if self.destroyed.get() {
            return;
        }
        self.reset();
        if let Some(output) = output
            && !output.is_destroyed()
        {
            log::trace!("wp_fifo_v1@{}: bound to output {}", self.id, output.name);
            self.refresh_listener.attach(&output.refresh_event);
            self.output_destroy_listener.attach(&output.destroy_event);
            self.output.set(Some(output));
        }
        self.program_timer();
    }

    fn program_timer(&self) {
        if let Err(e) = self.timer.program(self.cadence()) {
            log::error!(
                "wp_fifo_v1@{}: Could not program the fallback timer: {}",
                self.id,
                ErrorFmt(e),
            );
        }
    }

    /// Drains the queue in order up to and including the first commit that sets the
    /// barrier again.
    fn signal_barrier(&self) {
        let mut reissued = false;
        loop {
            let commit = self.queue.borrow_mut().pop_front();
            let Some(commit) = commit else {
                break;
            };
            log::trace!(
                "wp_fifo_v1@{}: releasing cached state {}",
                self.id,
                commit.lock.seq()
            );
            let reissues_barrier = commit.reissues_barrier;
            drop(commit.lock);
            if reissues_barrier {
                reissued = true;
                break;
            }
        }
        if !reissued {
            self.armed.set(false);
        }
    }

    fn reset(&self) {
        let queue = self.queue.take();
        if !queue.is_empty() {
            log::trace!("wp_fifo_v1@{}: unlocking {} commits", self.id, queue.len());
        }
        drop(queue);
        if self.output.take().is_some() {
            self.refresh_listener.detach();
            self.output_destroy_listener.detach();
        }
        self.armed.set(false);
        self.state.reset();
        self.last_refresh.set(None);
    }

    pub(super) fn destroy_engine(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        self.reset();
        self.client_commit_listener.detach();
        self.commit_listener.detach();
        if let Some(id) = self.synced_id.take() {
            self.surface.remove_synced(id);
        }
        self.timer.cancel();
        if let Some(fifo) = self.surface.fifo.get()
            && fifo.id == self.id
        {
            self.surface.fifo.take();
        }
        log::debug!("Client {}: destroyed wp_fifo_v1@{}", self.client.id, self.id);
        for listener in self.destroy_event.iter() {
            listener.fifo_destroyed(self);
        }
        self.destroy_event.clear();
    }
}

impl SurfaceClientCommitListener for WpFifoV1 {
    fn before_commit(self: Rc<Self>, surface: &Rc<WlSurface>) {
        if !surface.commit_has_valid_content() {
            return;
        }
        let pending = *self.state.pending();
        if !pending.wait_barrier || !self.armed.get() {
            return;
        }
        let mut queue = self.queue.borrow_mut();
        if queue.len() >= self.max_queued_commits || queue.try_reserve(1).is_err() {
            drop(queue);
            log::warn!(
                "wp_fifo_v1@{}: cannot queue more than {} commits",
                self.id,
                self.max_queued_commits,
            );
            self.client.post_no_memory();
            return;
        }
        let lock = surface.lock_pending();
        log::trace!("wp_fifo_v1@{}: queueing cached state {}", self.id, lock.seq());
        queue.push_back(FifoCommit {
            lock,
            reissues_barrier: pending.set_barrier,
        });
    }
}

impl SurfaceCommitListener for WpFifoV1 {
    fn after_commit(self: Rc<Self>, _surface: &Rc<WlSurface>) {
        if self.state.current().set_barrier {
            self.armed.set(true);
        }
    }
}

impl OutputRefreshListener for WpFifoV1 {
    fn after_refresh(self: Rc<Self>, _output: &OutputNode) {
        if !self.surface.has_buffer() {
            return;
        }
        if self.armed.get() {
            self.signal_barrier();
        }
        self.last_refresh.set(Some(self.client.state.now()));
    }
}

impl OutputDestroyListener for WpFifoV1 {
    fn output_destroyed(self: Rc<Self>, _output: &OutputNode) {
        self.set_output(None);
    }
}

impl WheelDispatcher for WpFifoV1 {
    fn expired(self: Rc<Self>) {
        if self.destroyed.get() {
            return;
        }
        let cadence = self.cadence();
        // no refresh signals means the surface is occluded
        if self.armed.get() {
            let stale = match self.last_refresh.get() {
                Some(last) => self.client.state.now() - last > cadence,
                None => true,
            };
            if stale {
                log::trace!("wp_fifo_v1@{}: forcing release", self.id);
                self.signal_barrier();
            }
        }
        self.program_timer();
    }
}

impl WpFifoV1RequestHandler for WpFifoV1 {
    type Error = WpFifoV1Error;

    fn set_barrier(&self, _req: SetBarrier, _slf: &Rc<Self>) -> Result<(), Self::Error> {
        self.state.pending_mut().set_barrier = true;
        Ok(())
    }

    fn wait_barrier(&self, _req: WaitBarrier, _slf: &Rc<Self>) -> Result<(), Self::Error> {
        self.state.pending_mut().wait_barrier = true;
        Ok(())
    }

    fn destroy(&self, _req: Destroy, _slf: &Rc<Self>) -> Result<(), Self::Error> {
        self.destroy_engine();
        self.client.remove_obj(self)?;
        Ok(())
    }
}

object_base! {
    self = WpFifoV1;
    version = self.version;
}

impl Object for WpFifoV1 {
    fn break_loops(&self) {
        self.destroy_engine();
    }
}

simple_add_obj!(WpFifoV1, fifos);

#[derive(Debug, Error)]
pub enum WpFifoV1Error {
    #[error(transparent)]
    ClientError(Box<ClientError>),
    #[error("The surface already has a fifo extension attached")]
    Exists,
}
efrom!(WpFifoV1Error, ClientError);
