use {
    crate::{
        client::{Client, ClientError, WaylandObjectLookup},
        ifs::{
            wl_buffer::WlBuffer,
            wl_surface::{WlSurface, wp_fifo_v1::WpFifoV1},
            wp_fifo_manager_v1::WpFifoManagerV1,
        },
        object::{Interface, Object, ObjectId},
        utils::copyhashmap::CopyHashMap,
        wire::{self, WlBufferId, WlSurfaceId, WpFifoManagerV1Id, WpFifoV1Id},
    },
    std::rc::Rc,
};

pub struct Objects {
    registry: CopyHashMap<ObjectId, Rc<dyn Object>>,
    pub surfaces: CopyHashMap<WlSurfaceId, Rc<WlSurface>>,
    pub buffers: CopyHashMap<WlBufferId, Rc<WlBuffer>>,
    pub fifo_managers: CopyHashMap<WpFifoManagerV1Id, Rc<WpFifoManagerV1>>,
    pub fifos: CopyHashMap<WpFifoV1Id, Rc<WpFifoV1>>,
}

impl Objects {
    pub fn new() -> Self {
        Self {
            registry: Default::default(),
            surfaces: Default::default(),
            buffers: Default::default(),
            fifo_managers: Default::default(),
            fifos: Default::default(),
        }
    }

    pub fn destroy(&self) {
        for (_, obj) in self.registry.take() {
            obj.break_loops();
        }
        self.surfaces.take();
        self.buffers.take();
        self.fifo_managers.take();
        self.fifos.take();
    }

    pub fn add_client_object(&self, obj: Rc<dyn Object>) -> Result<(), ClientError> {
        let id = obj.id();
        if id == ObjectId::NONE {
            return Err(ClientError::NullId);
        }
        if self.registry.contains(&id) {
            return Err(ClientError::IdAlreadyInUse(id));
        }
        self.registry.set(id, obj);
        Ok(())
    }

    pub fn remove_obj(&self, id: ObjectId) -> Result<(), ClientError> {
        match self.registry.remove(&id) {
            Some(_) => Ok(()),
            None => Err(ClientError::UnknownId),
        }
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.registry.contains(&id)
    }
}

macro_rules! lookup {
    ($id:ident, $obj:ty, $field:ident, $interface:ident) => {
        impl WaylandObjectLookup for $id {
            type Object = $obj;
            const INTERFACE: Interface = wire::$interface;

            fn lookup(client: &Client, id: Self) -> Option<Rc<Self::Object>> {
                client.objects.$field.get(&id)
            }
        }
    };
}

lookup!(WlSurfaceId, WlSurface, surfaces, WlSurface);
lookup!(WlBufferId, WlBuffer, buffers, WlBuffer);
lookup!(WpFifoManagerV1Id, WpFifoManagerV1, fifo_managers, WpFifoManagerV1);
lookup!(WpFifoV1Id, WpFifoV1, fifos, WpFifoV1);
