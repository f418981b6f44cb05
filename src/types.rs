/// Fixed-width row record.
///
/// Layout (296 bytes, little-endian):
///   id:       u32      at 0
///   username: [u8; 33] at 4   (zero padded, at most 32 bytes used)
///   email:    [u8; 256] at 37 (zero padded, at most 255 bytes used)
///   padding:  3 bytes  at 293
use std::fmt;

use crate::error::{PageDbError, Result};

pub const USERNAME_MAX: usize = 32;
pub const EMAIL_MAX: usize = 255;

pub const ID_SIZE: usize = 4;
pub const USERNAME_SIZE: usize = USERNAME_MAX + 1;
pub const EMAIL_SIZE: usize = EMAIL_MAX + 1;

pub const ID_OFFSET: usize = 0;
pub const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
pub const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;

/// Encoded row stride, including alignment padding.
pub const ROW_SIZE: usize = 296;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub username: String,
    pub email: String,
}

impl Row {
    /// Build a validated row. Nothing reaches the tree without passing here.
    pub fn new(id: u32, username: impl Into<String>, email: impl Into<String>) -> Result<Self> {
        let row = Row {
            id,
            username: username.into(),
            email: email.into(),
        };
        row.validate()?;
        Ok(row)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id == 0 {
            return Err(PageDbError::InvalidId);
        }
        if self.username.len() > USERNAME_MAX {
            return Err(PageDbError::UsernameTooLong {
                len: self.username.len(),
            });
        }
        if self.email.len() > EMAIL_MAX {
            return Err(PageDbError::EmailTooLong {
                len: self.email.len(),
            });
        }
        Ok(())
    }

    /// Encode into a row slot. The whole slot is overwritten, so stale bytes
    /// from a previous occupant never survive.
    pub fn serialize(&self, dst: &mut [u8]) {
        let dst = &mut dst[..ROW_SIZE];
        dst.fill(0);
        dst[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_le_bytes());

        let name = self.username.as_bytes();
        let name_len = name.len().min(USERNAME_MAX);
        dst[USERNAME_OFFSET..USERNAME_OFFSET + name_len].copy_from_slice(&name[..name_len]);

        let email = self.email.as_bytes();
        let email_len = email.len().min(EMAIL_MAX);
        dst[EMAIL_OFFSET..EMAIL_OFFSET + email_len].copy_from_slice(&email[..email_len]);
    }

    pub fn deserialize(src: &[u8]) -> Row {
        let id = u32::from_le_bytes(src[ID_OFFSET..ID_OFFSET + ID_SIZE].try_into().unwrap());
        Row {
            id,
            username: read_padded(&src[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE]),
            email: read_padded(&src[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE]),
        }
    }
}

fn read_padded(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username, self.email)
    }
}
