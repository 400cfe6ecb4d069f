mod error;
mod objects;

pub use {error::*, objects::Objects};

use {
    crate::{
        object::{Interface, Object, ObjectId},
        state::State,
        utils::{copyhashmap::CopyHashMap, errorfmt::ErrorFmt},
    },
    std::{
        cell::{Cell, RefCell},
        error::Error,
        rc::Rc,
    },
};

linear_ids!(ClientIds, ClientId, u64);

pub struct Clients {
    ids: ClientIds,
    clients: CopyHashMap<ClientId, Rc<Client>>,
}

impl Clients {
    pub fn new() -> Self {
        Self {
            ids: Default::default(),
            clients: Default::default(),
        }
    }

    pub fn spawn(&self, state: &Rc<State>) -> Rc<Client> {
        let client = Rc::new(Client {
            id: self.ids.next(),
            state: state.clone(),
            objects: Objects::new(),
            posted_errors: Default::default(),
            shutdown: Cell::new(false),
        });
        self.clients.set(client.id, client.clone());
        log::info!("Client {} connected", client.id);
        client
    }

    pub fn all(&self) -> Vec<Rc<Client>> {
        self.clients.values()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Disconnects the client and destroys all of its objects.
    pub fn kill(&self, client: ClientId) {
        log::info!("Removing client {}", client.0);
        if let Some(client) = self.clients.remove(&client) {
            client.objects.destroy();
        }
    }

    pub fn clear(&self) {
        for (_, client) in self.clients.take() {
            client.objects.destroy();
        }
    }
}

/// An error that has been sent to the client.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PostedError {
    Protocol {
        object: ObjectId,
        interface: Interface,
        code: u32,
        message: String,
    },
    NoMemory,
    Implementation(String),
}

pub struct Client {
    pub id: ClientId,
    pub state: Rc<State>,
    pub objects: Objects,
    posted_errors: RefCell<Vec<PostedError>>,
    shutdown: Cell<bool>,
}

impl Client {
    pub fn error(&self, message: impl Error) {
        let msg = ErrorFmt(message).to_string();
        log::error!("Client {}: A fatal error occurred: {}", self.id.0, msg);
        self.post(PostedError::Implementation(msg));
    }

    pub fn protocol_error(&self, obj: &dyn Object, code: u32, message: &str) {
        log::warn!(
            "Client {}: protocol error {} on {}@{}: {}",
            self.id,
            code,
            obj.interface().name(),
            obj.id(),
            message,
        );
        self.post(PostedError::Protocol {
            object: obj.id(),
            interface: obj.interface(),
            code,
            message: message.to_string(),
        });
    }

    pub fn post_no_memory(&self) {
        log::error!("Client {}: out of memory", self.id);
        self.post(PostedError::NoMemory);
    }

    fn post(&self, error: PostedError) {
        self.posted_errors.borrow_mut().push(error);
        self.shutdown.set(true);
    }

    pub fn posted_errors(&self) -> Vec<PostedError> {
        self.posted_errors.borrow().clone()
    }

    /// Whether an error has been posted and the connection is waiting to be torn down.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.get()
    }

    pub fn add_client_obj<T: WaylandObject>(&self, obj: &Rc<T>) -> Result<(), ClientError> {
        self.objects.add_client_object(obj.clone())?;
        obj.clone().add(self);
        Ok(())
    }

    pub fn remove_obj<T: WaylandObject>(&self, obj: &T) -> Result<(), ClientError> {
        obj.remove(self);
        self.objects.remove_obj(obj.id())
    }

    pub fn lookup<Id: WaylandObjectLookup>(&self, id: Id) -> Result<Rc<Id::Object>, ClientError> {
        match Id::lookup(self, id) {
            Some(t) => Ok(t),
            _ => Err(ClientError::LookupError(LookupError {
                interface: Id::INTERFACE,
                id: id.into(),
            })),
        }
    }
}

pub trait WaylandObject: Object {
    fn add(self: Rc<Self>, client: &Client) {
        let _ = client;
    }
    fn remove(&self, client: &Client) {
        let _ = client;
    }
}

pub trait WaylandObjectLookup: Copy + Into<ObjectId> {
    type Object;
    const INTERFACE: Interface;

    fn lookup(client: &Client, id: Self) -> Option<Rc<Self::Object>>;
}
