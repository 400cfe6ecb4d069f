use {
    crate::{
        client::Client,
        object::{Interface, ObjectId, Version},
        utils::{copyhashmap::CopyHashMap, numcell::NumCell},
    },
    std::{
        error::Error,
        fmt::{Display, Formatter},
        rc::Rc,
    },
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum GlobalsError {
    #[error("The requested global {0} does not exist")]
    GlobalDoesNotExist(GlobalName),
    #[error("The client requested version {requested} of `{}` but only version {supported} is supported", .interface.name())]
    UnsupportedVersion {
        interface: Interface,
        requested: u32,
        supported: u32,
    },
    #[error(transparent)]
    GlobalError(GlobalError),
}

#[derive(Debug, Error)]
#[error("An error occurred in a `{}` global", .interface.name())]
pub struct GlobalError {
    pub interface: Interface,
    #[source]
    pub error: Box<dyn Error>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct GlobalName(u32);

impl GlobalName {
    pub fn from_raw(id: u32) -> Self {
        Self(id)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl Display for GlobalName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

pub trait GlobalBase {
    fn name(&self) -> GlobalName;
    fn bind(
        self: Rc<Self>,
        client: &Rc<Client>,
        id: ObjectId,
        version: Version,
    ) -> Result<(), GlobalsError>;
    fn interface(&self) -> Interface;
}

pub trait Global: GlobalBase {
    fn singleton(&self) -> bool;
    fn version(&self) -> u32;
}

pub struct Globals {
    next_name: NumCell<u32>,
    registry: CopyHashMap<GlobalName, Rc<dyn Global>>,
}

impl Globals {
    pub fn new() -> Self {
        Self {
            next_name: NumCell::new(1),
            registry: CopyHashMap::new(),
        }
    }

    pub fn name(&self) -> GlobalName {
        let id = self.next_name.fetch_add(1);
        if id == 0 {
            panic!("Global names overflowed");
        }
        GlobalName(id)
    }

    pub fn add_global<T: Global + 'static>(&self, global: &Rc<T>) {
        log::debug!(
            "Adding global {} of type `{}`",
            global.name(),
            global.interface().name()
        );
        self.registry.set(global.name(), global.clone());
    }

    pub fn get(&self, name: GlobalName) -> Result<Rc<dyn Global>, GlobalsError> {
        match self.registry.get(&name) {
            Some(g) => Ok(g),
            None => Err(GlobalsError::GlobalDoesNotExist(name)),
        }
    }

    pub fn remove(&self, name: GlobalName) -> Result<Rc<dyn Global>, GlobalsError> {
        match self.registry.remove(&name) {
            Some(g) => {
                log::debug!("Removed global {} of type `{}`", name, g.interface().name());
                Ok(g)
            }
            None => Err(GlobalsError::GlobalDoesNotExist(name)),
        }
    }

    pub fn bind(
        &self,
        client: &Rc<Client>,
        name: GlobalName,
        id: ObjectId,
        version: Version,
    ) -> Result<(), GlobalsError> {
        let global = self.get(name)?;
        if version.0 > global.version() {
            return Err(GlobalsError::UnsupportedVersion {
                interface: global.interface(),
                requested: version.0,
                supported: global.version(),
            });
        }
        global.bind(client, id, version)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.registry.take();
    }
}
