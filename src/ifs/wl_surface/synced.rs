use std::{
    cell::{Ref, RefCell, RefMut},
    collections::VecDeque,
    mem,
};


linear_ids!(SyncedIds, SyncedId);

/// Extension state that is double-buffered together with the surface state.
pub trait SyncedState: Default + 'static {
    /// Moves `src` into `dst` and leaves `src` empty.
    fn move_state(dst: &mut Self, src: &mut Self) {
        *dst = mem::take(src);
    }
}

#[derive(Default)]
pub struct Synced<T> {
    pending: RefCell<T>,
    current: RefCell<T>,
    cached: RefCell<VecDeque<(u32, T)>>,
}

impl<T: SyncedState> Synced<T> {
    pub fn pending(&self) -> Ref<'_, T> {
        self.pending.borrow()
    }

    pub fn pending_mut(&self) -> RefMut<'_, T> {
        self.pending.borrow_mut()
    }

    pub fn current(&self) -> Ref<'_, T> {
        self.current.borrow()
    }

    pub fn reset(&self) {
        *self.pending.borrow_mut() = T::default();
        *self.current.borrow_mut() = T::default();
    }
}

pub(super) trait DynSynced {
    fn apply_pending(&self);
    fn cache_pending(&self, seq: u32);
    fn apply_cached(&self, seq: u32);
    fn discard_cached(&self);
}

impl<T: SyncedState> DynSynced for Synced<T> {
    fn apply_pending(&self) {
        T::move_state(
            &mut self.current.borrow_mut(),
            &mut self.pending.borrow_mut(),
        );
    }

    fn cache_pending(&self, seq: u32) {
        let mut state = T::default();
        T::move_state(&mut state, &mut self.pending.borrow_mut());
        self.cached.borrow_mut().push_back((seq, state));
    }

    fn apply_cached(&self, seq: u32) {
        let mut state = {
            let mut cached = self.cached.borrow_mut();
            match cached.iter().position(|(s, _)| *s == seq) {
                Some(pos) => {
                    cached.drain(..pos);
                    cached.pop_front().map(|(_, t)| t)
                }
                // registered after this state was cached
                None => None,
            }
            .unwrap_or_default()
        };
        T::move_state(&mut self.current.borrow_mut(), &mut state);
    }

    fn discard_cached(&self) {
        self.cached.borrow_mut().clear();
    }
}
