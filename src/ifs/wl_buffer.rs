use {
    crate::{
        client::Client,
        object::{Object, Version},
        wire::WlBufferId,
    },
    std::{cell::Cell, rc::Rc},
};

pub struct WlBuffer {
    pub id: WlBufferId,
    pub client: Rc<Client>,
    pub version: Version,
    pub released: Cell<bool>,
}

impl WlBuffer {
    pub fn new(id: WlBufferId, client: &Rc<Client>) -> Self {
        Self {
            id,
            client: client.clone(),
            version: Version(1),
            released: Cell::new(false),
        }
    }

    /// The buffer has become the content of a surface.
    pub fn acquire(&self) {
        self.released.set(false);
    }

    pub fn send_release(&self) {
        log::trace!("Client {} <= wl_buffer@{}.release()", self.client.id, self.id);
        self.released.set(true);
    }
}

object_base! {
    self = WlBuffer;
    version = self.version;
}

impl Object for WlBuffer {}

simple_add_obj!(WlBuffer, buffers);
