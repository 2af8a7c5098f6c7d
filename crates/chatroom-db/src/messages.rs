use chrono::Utc;
use rusqlite::Connection;
use tracing::debug;

use chatroom_types::{ConversationId, Message, MessageId, MessageRead, UserId};

use crate::error::{OptionalExt, Result};
use crate::models::MessageRow;

/// Store a message. Whether `sender_id` belongs to the conversation is the
/// caller's concern.
pub fn save_message(
    conn: &Connection,
    conversation_id: ConversationId,
    sender_id: UserId,
    content: &str,
) -> Result<Message> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO messages (conversation_id, sender_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![conversation_id, sender_id, content, now],
    )?;

    let id = conn.last_insert_rowid();
    debug!(message_id = id, conversation_id, sender_id, "message saved");

    Ok(Message {
        id,
        conversation_id,
        sender_id,
        content: content.to_string(),
        created_at: now,
    })
}

pub fn get_message(conn: &Connection, id: MessageId) -> Result<Option<Message>> {
    let sql = format!("SELECT {} FROM messages WHERE id = ?1", MessageRow::COLUMNS);
    let row = conn.query_row(&sql, [id], MessageRow::from_row).optional()?;
    Ok(row.map(Message::from))
}

/// Newest first, then `offset`/`limit`. Pages shift when messages arrive
/// between calls.
pub fn list_messages(
    conn: &Connection,
    conversation_id: ConversationId,
    limit: u32,
    offset: u32,
) -> Result<Vec<Message>> {
    let sql = format!(
        "SELECT {} FROM messages
         WHERE conversation_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2 OFFSET ?3",
        MessageRow::COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let messages = stmt
        .query_map(
            rusqlite::params![conversation_id, limit, offset],
            MessageRow::from_row,
        )?
        .map(|row| row.map(Message::from))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(messages)
}

/// Record that `user_id` has seen `message_id`. Repeated calls are no-ops.
pub fn mark_read(conn: &Connection, message_id: MessageId, user_id: UserId) -> Result<()> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO message_reads (message_id, user_id, read_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![message_id, user_id, Utc::now()],
    )?;
    if inserted > 0 {
        debug!(message_id, user_id, "message marked read");
    }
    Ok(())
}

/// The receipt `user_id` left on `message_id`, if any.
pub fn get_read_receipt(
    conn: &Connection,
    message_id: MessageId,
    user_id: UserId,
) -> Result<Option<MessageRead>> {
    conn.query_row(
        "SELECT message_id, user_id, read_at FROM message_reads
         WHERE message_id = ?1 AND user_id = ?2",
        [message_id, user_id],
        |row| {
            Ok(MessageRead {
                message_id: row.get(0)?,
                user_id: row.get(1)?,
                read_at: row.get(2)?,
            })
        },
    )
    .optional()
}

/// Messages in the user's conversations, written by someone else, with no
/// read receipt from the user.
pub fn get_unread_count(conn: &Connection, user_id: UserId) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM messages m
         WHERE m.conversation_id IN (
                SELECT conversation_id FROM conversation_participants WHERE user_id = ?1)
           AND m.sender_id != ?1
           AND m.id NOT IN (SELECT message_id FROM message_reads WHERE user_id = ?1)",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
