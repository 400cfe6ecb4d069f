
use {
    crate::{
        client::{Client, ClientError},
        globals::{Global, GlobalBase, GlobalError, GlobalName, GlobalsError},
        ifs::wl_surface::wp_fifo_v1::{WpFifoV1, WpFifoV1Error},
        object::{Interface, Object, ObjectId, Version},
        state::{DisplayDestroyListener, State},
        utils::{
            errorfmt::ErrorFmt,
            event_listener::{EventListener, EventSource},
        },
        wire::{self, WpFifoManagerV1Id, wp_fifo_manager_v1::*},
    },
    std::{
        cell::Cell,
        rc::{Rc, Weak},
    },
    thiserror::Error,
};

pub const FIFO_MANAGER_VERSION: u32 = 1;

pub trait NewFifoListener {
    fn new_fifo(self: Rc<Self>, fifo: &Rc<WpFifoV1>);
}

pub trait FifoManagerDestroyListener {
    fn fifo_manager_destroyed(self: Rc<Self>, manager: &WpFifoManagerV1Global);
}

pub struct WpFifoManagerV1Global {
    pub name: GlobalName,
    version: u32,
    display_destroy_listener: EventListener<dyn DisplayDestroyListener>,
    pub new_fifo_event: EventSource<dyn NewFifoListener>,
    pub destroy_event: EventSource<dyn FifoManagerDestroyListener>,
    destroyed: Cell<bool>,
}

pub struct WpFifoManagerV1 {
    pub id: WpFifoManagerV1Id,
    pub client: Rc<Client>,
    pub global: Rc<WpFifoManagerV1Global>,
    pub version: Version,
}

impl WpFifoManagerV1Global {
    /// Creates the global and registers it with the display.
    pub fn create(state: &Rc<State>, version: u32) -> Result<Rc<Self>, WpFifoManagerV1Error> {
        if version == 0 || version > FIFO_MANAGER_VERSION {
            return Err(WpFifoManagerV1Error::UnsupportedVersion(version));
        }
        let global = Rc::new_cyclic(|slf: &Weak<Self>| Self {
            name: state.globals.name(),
            version,
            display_destroy_listener: EventListener::new(slf.clone()),
            new_fifo_event: Default::default(),
            destroy_event: Default::default(),
            destroyed: Cell::new(false),
        });
        global
            .display_destroy_listener
            .attach(&state.display_destroy_event);
        state.globals.add_global(&global);
        state.fifo_manager.set(Some(global.clone()));
        Ok(global)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    fn bind_(
        self: Rc<Self>,
        id: WpFifoManagerV1Id,
        client: &Rc<Client>,
        version: Version,
    ) -> Result<(), WpFifoManagerV1Error> {
        let obj = Rc::new(WpFifoManagerV1 {
            id,
            client: client.clone(),
            global: self,
            version,
        });
        client.add_client_obj(&obj)?;
        Ok(())
    }
}

impl DisplayDestroyListener for WpFifoManagerV1Global {
    fn display_destroyed(self: Rc<Self>, state: &State) {
        if self.destroyed.replace(true) {
            return;
        }
        for listener in self.destroy_event.iter() {
            listener.fifo_manager_destroyed(&self);
        }
        self.destroy_event.clear();
        self.new_fifo_event.clear();
        self.display_destroy_listener.detach();
        if let Err(e) = state.globals.remove(self.name) {
            log::warn!("Could not remove the fifo manager global: {}", ErrorFmt(e));
        }
        if let Some(manager) = state.fifo_manager.get()
            && Rc::ptr_eq(&manager, &self)
        {
            state.fifo_manager.take();
        }
    }
}

impl GlobalBase for WpFifoManagerV1Global {
    fn name(&self) -> GlobalName {
        self.name
    }

    fn bind(
        self: Rc<Self>,
        client: &Rc<Client>,
        id: ObjectId,
        version: Version,
    ) -> Result<(), GlobalsError> {
        if let Err(e) = self.bind_(id.into(), client, version) {
            return Err(GlobalsError::GlobalError(GlobalError {
                interface: wire::WpFifoManagerV1,
                error: Box::new(e),
            }));
        }
        Ok(())
    }

    fn interface(&self) -> Interface {
        wire::WpFifoManagerV1
    }
}

impl Global for WpFifoManagerV1Global {
    fn singleton(&self) -> bool {
        true
    }

    fn version(&self) -> u32 {
        self.version
    }
}

impl WpFifoManagerV1RequestHandler for WpFifoManagerV1 {
    type Error = WpFifoManagerV1Error;

    fn destroy(&self, _req: Destroy, _slf: &Rc<Self>) -> Result<(), Self::Error> {
        self.client.remove_obj(self)?;
        Ok(())
    }

    fn get_fifo(&self, req: GetFifo, _slf: &Rc<Self>) -> Result<(), Self::Error> {
        let surface = self.client.lookup(req.surface)?;
        if surface.fifo.is_some() {
            self.client.protocol_error(
                self,
                ALREADY_EXISTS,
                "A wp_fifo_v1 object already exists for this surface",
            );
            return Ok(());
        }
        let fifo = WpFifoV1::new(req.id, self.version, &surface);
        self.client.add_client_obj(&fifo)?;
        fifo.install()?;
        for listener in self.global.new_fifo_event.iter() {
            listener.new_fifo(&fifo);
        }
        Ok(())
    }
}

object_base! {
    self = WpFifoManagerV1;
    version = self.version;
}

impl Object for WpFifoManagerV1 {}

simple_add_obj!(WpFifoManagerV1, fifo_managers);

#[derive(Debug, Error)]
pub enum WpFifoManagerV1Error {
    #[error(transparent)]
    ClientError(Box<ClientError>),
    #[error(transparent)]
    WpFifoV1Error(#[from] WpFifoV1Error),
    #[error("Version {0} of wp_fifo_manager_v1 is not supported")]
    UnsupportedVersion(u32),
}
efrom!(WpFifoManagerV1Error, ClientError);
