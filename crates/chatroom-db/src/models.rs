//! Database row types. These map directly to SQLite rows and are kept
//! distinct from the chatroom-types models so the schema can drift
//! independently of what callers see.

use chrono::{DateTime, Utc};
use rusqlite::Row;

use chatroom_types::{
    Conversation, ConversationKind, FriendRequest, FriendRequestStatus, Message, User,
};

use crate::error::{DbError, Result};

pub struct UserRow {
    pub id: i64,
    pub display_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub last_seen_at: DateTime<Utc>,
}

impl UserRow {
    pub const COLUMNS: &'static str = "id, display_name, email, avatar_url, last_seen_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            display_name: row.get(1)?,
            email: row.get(2)?,
            avatar_url: row.get(3)?,
            last_seen_at: row.get(4)?,
        })
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            display_name: row.display_name,
            email: row.email,
            avatar_url: row.avatar_url,
            last_seen_at: row.last_seen_at,
        }
    }
}

pub struct FriendRequestRow {
    pub id: i64,
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl FriendRequestRow {
    pub const COLUMNS: &'static str = "id, from_user_id, to_user_id, status, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            from_user_id: row.get(1)?,
            to_user_id: row.get(2)?,
            status: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl TryFrom<FriendRequestRow> for FriendRequest {
    type Error = DbError;

    fn try_from(row: FriendRequestRow) -> Result<Self> {
        let status = FriendRequestStatus::parse(&row.status).ok_or_else(|| DbError::CorruptRow {
            table: "friend_requests",
            detail: format!("unknown status '{}' on request {}", row.status, row.id),
        })?;

        Ok(FriendRequest {
            id: row.id,
            from_user_id: row.from_user_id,
            to_user_id: row.to_user_id,
            status,
            created_at: row.created_at,
        })
    }
}

pub struct ConversationRow {
    pub id: i64,
    pub kind: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ConversationRow {
    pub const COLUMNS: &'static str = "id, type, name, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            name: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = DbError;

    fn try_from(row: ConversationRow) -> Result<Self> {
        let kind = ConversationKind::parse(&row.kind).ok_or_else(|| DbError::CorruptRow {
            table: "conversations",
            detail: format!("unknown type '{}' on conversation {}", row.kind, row.id),
        })?;

        Ok(Conversation {
            id: row.id,
            kind,
            name: row.name,
            created_at: row.created_at,
        })
    }
}

pub struct MessageRow {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl MessageRow {
    pub const COLUMNS: &'static str = "id, conversation_id, sender_id, content, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            sender_id: row.get(2)?,
            content: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_is_corrupt() {
        let row = FriendRequestRow {
            id: 4,
            from_user_id: 1,
            to_user_id: 2,
            status: "withdrawn".into(),
            created_at: Utc::now(),
        };
        let err = FriendRequest::try_from(row).unwrap_err();
        assert!(matches!(err, DbError::CorruptRow { table: "friend_requests", .. }));
    }

    #[test]
    fn unknown_conversation_type_is_corrupt() {
        let row = ConversationRow {
            id: 1,
            kind: "broadcast".into(),
            name: None,
            created_at: Utc::now(),
        };
        assert!(Conversation::try_from(row).is_err());
    }
}
