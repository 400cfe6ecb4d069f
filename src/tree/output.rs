use {
    crate::utils::event_listener::EventSource,
    std::{cell::Cell, rc::Rc, time::Duration},
};

linear_ids!(OutputIds, OutputId);

pub trait OutputRefreshListener {
    /// The output has finished presenting a frame.
    fn after_refresh(self: Rc<Self>, output: &OutputNode);
}

pub trait OutputDestroyListener {
    fn output_destroyed(self: Rc<Self>, output: &OutputNode);
}

pub struct OutputNode {
    pub id: OutputId,
    pub name: String,
    refresh_rate_millihz: Cell<u32>,
    pub refresh_event: EventSource<dyn OutputRefreshListener>,
    pub destroy_event: EventSource<dyn OutputDestroyListener>,
    destroyed: Cell<bool>,
}

impl OutputNode {
    pub fn new(id: OutputId, name: &str, refresh_rate_millihz: u32) -> Rc<Self> {
        Rc::new(Self {
            id,
            name: name.to_string(),
            refresh_rate_millihz: Cell::new(refresh_rate_millihz),
            refresh_event: Default::default(),
            destroy_event: Default::default(),
            destroyed: Cell::new(false),
        })
    }

    pub fn refresh_rate_millihz(&self) -> u32 {
        self.refresh_rate_millihz.get()
    }

    pub fn set_refresh_rate_millihz(&self, mhz: u32) {
        self.refresh_rate_millihz.set(mhz);
    }

    /// The duration of one refresh cycle or `None` if the rate is unknown.
    pub fn refresh_interval(&self) -> Option<Duration> {
        match self.refresh_rate_millihz.get() {
            0 => None,
            mhz => Some(Duration::from_nanos(1_000_000_000_000 / mhz as u64)),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub fn refresh_complete(&self) {
        if self.destroyed.get() {
            return;
        }
        for listener in self.refresh_event.iter() {
            listener.after_refresh(self);
        }
    }

    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        log::info!("Output {} ({}) destroyed", self.name, self.id);
        for listener in self.destroy_event.iter() {
            listener.output_destroyed(self);
        }
        self.refresh_event.clear();
        self.destroy_event.clear();
    }
}
