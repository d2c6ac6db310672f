use metadata::MetadataError;
use rusqlite::ErrorCode;

#[derive(Debug)]
pub enum LibraryError {
    Io(std::io::Error),
    Metadata(MetadataError),
    Sqlite(rusqlite::Error),
    /// An integrity failure other than a tolerated duplicate link.
    Constraint(rusqlite::Error),
    /// The backing store cannot be opened or read. Fatal to the whole engine.
    StoreUnavailable(rusqlite::Error),
    NotFound(String),
    Unreadable(String),
    Watch(notify::Error),
}

impl LibraryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LibraryError::NotFound(_))
    }

    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, LibraryError::StoreUnavailable(_))
    }
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Io(err) => write!(f, "io error: {}", err),
            LibraryError::Metadata(err) => write!(f, "metadata error: {}", err),
            LibraryError::Sqlite(err) => write!(f, "db error: {}", err),
            LibraryError::Constraint(err) => write!(f, "constraint violation: {}", err),
            LibraryError::StoreUnavailable(err) => write!(f, "store unavailable: {}", err),
            LibraryError::NotFound(path) => write!(f, "not in catalog: {}", path),
            LibraryError::Unreadable(path) => write!(f, "no usable tags: {}", path),
            LibraryError::Watch(err) => write!(f, "watch error: {}", err),
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}

impl From<MetadataError> for LibraryError {
    fn from(err: MetadataError) -> Self {
        LibraryError::Metadata(err)
    }
}

impl From<rusqlite::Error> for LibraryError {
    fn from(err: rusqlite::Error) -> Self {
        let code = match &err {
            rusqlite::Error::SqliteFailure(failure, _) => Some(failure.code),
            _ => None,
        };
        match code {
            Some(ErrorCode::ConstraintViolation) => LibraryError::Constraint(err),
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::SystemIoFailure
                | ErrorCode::ReadOnly
                | ErrorCode::DiskFull,
            ) => LibraryError::StoreUnavailable(err),
            _ => LibraryError::Sqlite(err),
        }
    }
}

impl From<notify::Error> for LibraryError {
    fn from(err: notify::Error) -> Self {
        LibraryError::Watch(err)
    }
}

/// Whether `err` is a uniqueness rejection, i.e. the row being inserted already exists.
pub(crate) fn is_duplicate(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => matches!(
            failure.extended_code,
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        ),
        _ => false,
    }
}
