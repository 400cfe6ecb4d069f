use {
    crate::{
        client::Clients,
        config::Config,
        globals::Globals,
        ifs::wp_fifo_manager_v1::WpFifoManagerV1Global,
        time::{Clock, Time},
        tree::{OutputId, OutputIds, OutputNode},
        utils::{clonecell::CloneCell, copyhashmap::CopyHashMap, event_listener::EventSource},
        wheel::Wheel,
    },
    std::{cell::Cell, rc::Rc},
};

pub trait DisplayDestroyListener {
    fn display_destroyed(self: Rc<Self>, state: &State);
}

pub struct State {
    pub clock: Rc<dyn Clock>,
    pub wheel: Rc<Wheel>,
    pub config: Config,
    pub globals: Globals,
    pub clients: Clients,
    pub output_ids: OutputIds,
    pub outputs: CopyHashMap<OutputId, Rc<OutputNode>>,
    pub fifo_manager: CloneCell<Option<Rc<WpFifoManagerV1Global>>>,
    pub display_destroy_event: EventSource<dyn DisplayDestroyListener>,
    destroyed: Cell<bool>,
}

impl State {
    pub fn new(clock: &Rc<dyn Clock>, wheel: &Rc<Wheel>, config: Config) -> Rc<Self> {
        Rc::new(Self {
            clock: clock.clone(),
            wheel: wheel.clone(),
            config,
            globals: Globals::new(),
            clients: Clients::new(),
            output_ids: Default::default(),
            outputs: Default::default(),
            fifo_manager: Default::default(),
            display_destroy_event: Default::default(),
            destroyed: Cell::new(false),
        })
    }

    pub fn now(&self) -> Time {
        self.clock.now()
    }

    pub fn add_output(&self, name: &str, refresh_rate_millihz: u32) -> Rc<OutputNode> {
        let output = OutputNode::new(self.output_ids.next(), name, refresh_rate_millihz);
        log::info!(
            "Output {} ({}) added with a refresh rate of {} mHz",
            output.name,
            output.id,
            refresh_rate_millihz,
        );
        self.outputs.set(output.id, output.clone());
        output
    }

    /// Destroys the output and removes it from every surface that is showing it.
    pub fn remove_output(&self, id: OutputId) {
        let Some(output) = self.outputs.remove(&id) else {
            return;
        };
        output.destroy();
        for client in self.clients.all() {
            for surface in client.objects.surfaces.values() {
                surface.leave_output(&output);
            }
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub fn destroy_display(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        log::info!("Destroying the display");
        self.clients.clear();
        for listener in self.display_destroy_event.iter() {
            listener.display_destroyed(self);
        }
        self.display_destroy_event.clear();
        self.globals.clear();
        for (_, output) in self.outputs.take() {
            output.destroy();
        }
    }
}
