use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageDbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Duplicate key: {0}")]
    DuplicateKey(u32),

    #[error("Table full: page limit of {max_pages} reached")]
    CapacityExceeded { max_pages: u32 },

    #[error("Format violation: {0}")]
    FormatViolation(String),

    #[error("Page not found: page_num={0}")]
    PageNotFound(u32),

    #[error("ID must be positive")]
    InvalidId,

    #[error("Username too long: {len} bytes (max 32)")]
    UsernameTooLong { len: usize },

    #[error("Email too long: {len} bytes (max 255)")]
    EmailTooLong { len: usize },

    #[error("Lock error: {0}")]
    Locked(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl PageDbError {
    /// True for errors that only reject the current request and leave the
    /// table usable: bad input, duplicates and a full table.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PageDbError::DuplicateKey(_)
                | PageDbError::CapacityExceeded { .. }
                | PageDbError::InvalidId
                | PageDbError::UsernameTooLong { .. }
                | PageDbError::EmailTooLong { .. }
                | PageDbError::Parse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PageDbError>;
