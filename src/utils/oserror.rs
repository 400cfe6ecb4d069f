use {
    std::{
        error::Error,
        fmt::{Display, Formatter},
        io,
    },
    uapi::{Errno, c},
};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct OsError(pub c::c_int);

impl From<Errno> for OsError {
    fn from(e: Errno) -> Self {
        Self(e.0)
    }
}

impl From<OsError> for io::Error {
    fn from(e: OsError) -> Self {
        io::Error::from_raw_os_error(e.0)
    }
}

impl Error for OsError {}

impl Display for OsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&io::Error::from_raw_os_error(self.0), f)
    }
}
