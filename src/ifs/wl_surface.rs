pub mod synced;
pub mod wp_fifo_v1;

use {
    crate::{
        client::{Client, ClientError},
        ifs::{
            wl_buffer::WlBuffer,
            wl_surface::{
                synced::{DynSynced, Synced, SyncedId, SyncedIds, SyncedState},
                wp_fifo_v1::WpFifoV1,
            },
        },
        object::{Object, Version},
        tree::OutputNode,
        utils::{clonecell::CloneCell, event_listener::EventSource, numcell::NumCell},
        wire::{WlSurfaceId, wl_surface::*},
    },
    std::{
        cell::{Cell, RefCell},
        collections::VecDeque,
        mem,
        rc::Rc,
    },
    thiserror::Error,
};

pub trait SurfaceClientCommitListener {
    /// Invoked when the client commits, before the pending state is applied or cached.
    fn before_commit(self: Rc<Self>, surface: &Rc<WlSurface>);
}

pub trait SurfaceCommitListener {
    /// Invoked after a state has been applied to the surface.
    fn after_commit(self: Rc<Self>, surface: &Rc<WlSurface>);
}

#[derive(Default)]
pub struct PendingState {
    /// `Some(None)` detaches the buffer.
    pub buffer: Option<Option<Rc<WlBuffer>>>,
}

struct CachedState {
    seq: u32,
    locks: u32,
    state: PendingState,
}

pub struct WlSurface {
    pub id: WlSurfaceId,
    pub client: Rc<Client>,
    pub version: Version,
    pending: RefCell<PendingState>,
    pending_seq: NumCell<u32>,
    pending_locks: NumCell<u32>,
    cached: RefCell<VecDeque<CachedState>>,
    buffer: CloneCell<Option<Rc<WlBuffer>>>,
    synced_ids: SyncedIds,
    synced: RefCell<Vec<(SyncedId, Rc<dyn DynSynced>)>>,
    outputs: RefCell<Vec<Rc<OutputNode>>>,
    commits_applied: NumCell<u64>,
    destroyed: Cell<bool>,
    pub client_commit_event: EventSource<dyn SurfaceClientCommitListener>,
    pub commit_event: EventSource<dyn SurfaceCommitListener>,
    pub fifo: CloneCell<Option<Rc<WpFifoV1>>>,
}

/// A lock on a cached surface state.
///
/// The state cannot be applied while the lock exists. Dropping the lock unlocks the
/// state exactly once.
#[must_use]
pub struct CachedLock {
    surface: Rc<WlSurface>,
    seq: u32,
}

impl CachedLock {
    pub fn seq(&self) -> u32 {
        self.seq
    }
}

impl Drop for CachedLock {
    fn drop(&mut self) {
        self.surface.unlock_cached(self.seq);
    }
}

impl WlSurface {
    pub fn new(id: WlSurfaceId, client: &Rc<Client>, version: Version) -> Rc<Self> {
        Rc::new(Self {
            id,
            client: client.clone(),
            version,
            pending: Default::default(),
            pending_seq: NumCell::new(1),
            pending_locks: NumCell::new(0),
            cached: Default::default(),
            buffer: Default::default(),
            synced_ids: Default::default(),
            synced: Default::default(),
            outputs: Default::default(),
            commits_applied: NumCell::new(0),
            destroyed: Cell::new(false),
            client_commit_event: Default::default(),
            commit_event: Default::default(),
            fifo: Default::default(),
        })
    }

    pub fn buffer(&self) -> Option<Rc<WlBuffer>> {
        self.buffer.get()
    }

    pub fn has_buffer(&self) -> bool {
        self.buffer.is_some()
    }

    /// Whether the commit currently being processed leaves displayable content on the
    /// surface. Commits without such content do not participate in pacing.
    pub fn commit_has_valid_content(&self) -> bool {
        if self.buffer.is_none() {
            return false;
        }
        !matches!(self.pending.borrow().buffer, Some(None))
    }

    pub fn commits_applied(&self) -> u64 {
        self.commits_applied.get()
    }

    pub fn num_cached(&self) -> usize {
        self.cached.borrow().len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub fn add_synced<T: SyncedState>(&self, synced: &Rc<Synced<T>>) -> SyncedId {
        let id = self.synced_ids.next();
        self.synced.borrow_mut().push((id, synced.clone()));
        id
    }

    pub fn remove_synced(&self, id: SyncedId) {
        self.synced.borrow_mut().retain(|(s, _)| *s != id);
    }

    fn synced(&self) -> Vec<Rc<dyn DynSynced>> {
        self.synced.borrow().iter().map(|(_, s)| s.clone()).collect()
    }

    /// Prevents the pending state from being applied when it is committed.
    pub fn lock_pending(self: &Rc<Self>) -> CachedLock {
        self.pending_locks.fetch_add(1);
        CachedLock {
            surface: self.clone(),
            seq: self.pending_seq.get(),
        }
    }

    fn unlock_cached(self: &Rc<Self>, seq: u32) {
        if seq == self.pending_seq.get() {
            if self.pending_locks.get() == 0 {
                log::error!("Surface {}: pending state is not locked", self.id);
                return;
            }
            self.pending_locks.fetch_sub(1);
            return;
        }
        {
            let mut cached = self.cached.borrow_mut();
            let Some(idx) = cached.iter().position(|c| c.seq == seq) else {
                log::error!("Surface {}: there is no cached state {}", self.id, seq);
                return;
            };
            let state = &mut cached[idx];
            if state.locks == 0 {
                log::error!("Surface {}: cached state {} is not locked", self.id, seq);
                return;
            }
            state.locks -= 1;
            if state.locks > 0 || idx != 0 {
                return;
            }
        }
        self.apply_unlocked_cached();
    }

    fn apply_unlocked_cached(self: &Rc<Self>) {
        loop {
            let cached = {
                let mut cached = self.cached.borrow_mut();
                match cached.front() {
                    Some(c) if c.locks == 0 => cached.pop_front(),
                    _ => None,
                }
            };
            let Some(cached) = cached else {
                break;
            };
            if self.destroyed.get() {
                continue;
            }
            log::trace!("Surface {}: applying cached state {}", self.id, cached.seq);
            for synced in self.synced() {
                synced.apply_cached(cached.seq);
            }
            self.apply_state(cached.state);
        }
    }

    fn do_commit(self: &Rc<Self>) {
        if self.destroyed.get() {
            return;
        }
        for listener in self.client_commit_event.iter() {
            listener.before_commit(self);
        }
        let seq = self.pending_seq.get();
        self.pending_seq.set(seq.wrapping_add(1));
        let locks = self.pending_locks.get();
        self.pending_locks.set(0);
        let state = mem::take(&mut *self.pending.borrow_mut());
        if locks > 0 || !self.cached.borrow().is_empty() {
            log::trace!("Surface {}: caching state {} ({} locks)", self.id, seq, locks);
            for synced in self.synced() {
                synced.cache_pending(seq);
            }
            self.cached
                .borrow_mut()
                .push_back(CachedState { seq, locks, state });
            if locks == 0 {
                self.apply_unlocked_cached();
            }
            return;
        }
        for synced in self.synced() {
            synced.apply_pending();
        }
        self.apply_state(state);
    }

    fn apply_state(self: &Rc<Self>, state: PendingState) {
        if let Some(buffer) = state.buffer {
            if let Some(buffer) = &buffer {
                buffer.acquire();
            }
            let old = self.buffer.set(buffer);
            if let Some(old) = old
                && !self.buffer.get().is_some_and(|b| Rc::ptr_eq(&b, &old))
            {
                old.send_release();
            }
        }
        self.commits_applied.fetch_add(1);
        for listener in self.commit_event.iter() {
            listener.after_commit(self);
        }
    }

    pub fn primary_output(&self) -> Option<Rc<OutputNode>> {
        self.outputs.borrow().first().cloned()
    }

    pub fn enter_output(&self, output: &Rc<OutputNode>) {
        let became_primary = {
            let mut outputs = self.outputs.borrow_mut();
            if outputs.iter().any(|o| o.id == output.id) {
                return;
            }
            outputs.push(output.clone());
            outputs.len() == 1
        };
        if became_primary {
            self.primary_output_changed();
        }
    }

    pub fn leave_output(&self, output: &OutputNode) {
        let was_primary = {
            let mut outputs = self.outputs.borrow_mut();
            let Some(idx) = outputs.iter().position(|o| o.id == output.id) else {
                return;
            };
            outputs.remove(idx);
            idx == 0
        };
        if was_primary {
            self.primary_output_changed();
        }
    }

    fn primary_output_changed(&self) {
        if let Some(fifo) = self.fifo.get() {
            fifo.set_output(self.primary_output());
        }
    }

    pub fn destroy_surface(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        if let Some(fifo) = self.fifo.take() {
            fifo.destroy_engine();
        }
        self.cached.borrow_mut().clear();
        for synced in self.synced() {
            synced.discard_cached();
        }
        self.outputs.borrow_mut().clear();
        self.client_commit_event.clear();
        self.commit_event.clear();
    }
}

impl WlSurfaceRequestHandler for WlSurface {
    type Error = WlSurfaceError;

    fn attach(&self, req: Attach, _slf: &Rc<Self>) -> Result<(), Self::Error> {
        let buffer = if req.buffer.is_some() {
            Some(self.client.lookup(req.buffer)?)
        } else {
            None
        };
        self.pending.borrow_mut().buffer = Some(buffer);
        Ok(())
    }

    fn commit(&self, _req: Commit, slf: &Rc<Self>) -> Result<(), Self::Error> {
        slf.do_commit();
        Ok(())
    }

    fn destroy(&self, _req: Destroy, _slf: &Rc<Self>) -> Result<(), Self::Error> {
        self.destroy_surface();
        self.client.remove_obj(self)?;
        Ok(())
    }
}

object_base! {
    self = WlSurface;
    version = self.version;
}

impl Object for WlSurface {
    fn break_loops(&self) {
        self.destroy_surface();
    }
}

simple_add_obj!(WlSurface, surfaces);

#[derive(Debug, Error)]
pub enum WlSurfaceError {
    #[error(transparent)]
    ClientError(Box<ClientError>),
}
efrom!(WlSurfaceError, ClientError);
