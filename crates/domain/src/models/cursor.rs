//! Keyset page cursor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::pagination::{decode_cursor, encode_cursor, CursorError};
use uuid::Uuid;

/// Marks the last row of a page sorted by `(created_at, id)`.
///
/// A cursor is a pure position: the row it was derived from may since have been
/// removed and the cursor stays valid. It is only meaningful for the ordering it
/// was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl PageCursor {
    pub fn new(created_at: DateTime<Utc>, id: Uuid) -> Self {
        Self { created_at, id }
    }

    /// Opaque token suitable for handing to a UI layer.
    pub fn to_token(&self) -> String {
        encode_cursor(self.created_at, self.id)
    }

    pub fn from_token(token: &str) -> Result<Self, CursorError> {
        let (created_at, id) = decode_cursor(token)?;
        Ok(Self { created_at, id })
    }
}
