use {
    crate::object::{Interface, ObjectId},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Objects cannot have the id 0")]
    NullId,
    #[error("The object id is unknown")]
    UnknownId,
    #[error("The id {0} is already in use")]
    IdAlreadyInUse(ObjectId),
    #[error(transparent)]
    LookupError(LookupError),
}

#[derive(Debug, Error)]
#[error("There is no `{}` with id {}", .interface.name(), .id)]
pub struct LookupError {
    pub interface: Interface,
    pub id: ObjectId,
}
