use chrono::Utc;
use rusqlite::Connection;
use tracing::debug;

use chatroom_types::api::{ConversationSummary, LastMessage, ParticipantSummary};
use chatroom_types::{Conversation, ConversationId, ConversationKind, UserId};

use crate::config::DirectConversationPolicy;
use crate::error::{DbError, OptionalExt, Result};
use crate::friends;
use crate::models::{ConversationRow, MessageRow};

/// Insert a conversation and one participant row per entry of
/// `participant_ids`. Duplicate ids produce duplicate membership rows.
///
/// A direct conversation takes exactly two participant entries (the same id
/// twice for a self thread) and no name.
pub fn create_conversation(
    conn: &Connection,
    kind: ConversationKind,
    name: Option<&str>,
    participant_ids: &[UserId],
) -> Result<ConversationId> {
    if kind == ConversationKind::Direct {
        if participant_ids.len() != 2 {
            return Err(DbError::InvalidConversation(format!(
                "direct conversation needs 2 participants, got {}",
                participant_ids.len()
            )));
        }
        if name.is_some() {
            return Err(DbError::InvalidConversation(
                "direct conversations are unnamed".into(),
            ));
        }
    }

    conn.execute(
        "INSERT INTO conversations (type, name, created_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![kind.as_str(), name, Utc::now()],
    )?;
    // Id is assigned before any participant row references it.
    let conversation_id = conn.last_insert_rowid();

    let mut stmt = conn.prepare_cached(
        "INSERT INTO conversation_participants (conversation_id, user_id) VALUES (?1, ?2)",
    )?;
    for user_id in participant_ids {
        stmt.execute(rusqlite::params![conversation_id, user_id])?;
    }

    debug!(
        conversation_id,
        kind = kind.as_str(),
        participants = participant_ids.len(),
        "conversation created"
    );
    Ok(conversation_id)
}

pub fn get_conversation(conn: &Connection, id: ConversationId) -> Result<Option<Conversation>> {
    let sql = format!("SELECT {} FROM conversations WHERE id = ?1", ConversationRow::COLUMNS);
    conn.query_row(&sql, [id], ConversationRow::from_row)
        .optional()?
        .map(Conversation::try_from)
        .transpose()
}

/// Oldest direct conversation whose members are exactly `{a, b}`. For
/// `a == b` that is a thread with `a` as its only member.
pub fn find_direct_conversation(
    conn: &Connection,
    a: UserId,
    b: UserId,
) -> Result<Option<ConversationId>> {
    conn.query_row(
        "SELECT c.id FROM conversations c
         JOIN conversation_participants p ON p.conversation_id = c.id
         WHERE c.type = 'direct'
         GROUP BY c.id
         HAVING SUM(p.user_id NOT IN (?1, ?2)) = 0
            AND SUM(p.user_id = ?1) > 0
            AND SUM(p.user_id = ?2) > 0
         ORDER BY c.id
         LIMIT 1",
        rusqlite::params![a, b],
        |row| row.get(0),
    )
    .optional()
}

/// Opens a new direct conversation between two friends.
///
/// Returns `None` when `a` and `b` are not friends. Every call creates a new
/// conversation; see [`get_or_create_direct_conversation_with`] for reuse.
pub fn get_or_create_direct_conversation(
    conn: &Connection,
    a: UserId,
    b: UserId,
) -> Result<Option<ConversationId>> {
    get_or_create_direct_conversation_with(conn, a, b, DirectConversationPolicy::AlwaysCreate)
}

pub fn get_or_create_direct_conversation_with(
    conn: &Connection,
    a: UserId,
    b: UserId,
    policy: DirectConversationPolicy,
) -> Result<Option<ConversationId>> {
    if !friends::are_friends(conn, a, b)? {
        return Ok(None);
    }

    if policy == DirectConversationPolicy::ReuseExisting {
        if let Some(existing) = find_direct_conversation(conn, a, b)? {
            return Ok(Some(existing));
        }
    }

    create_conversation(conn, ConversationKind::Direct, None, &[a, b]).map(Some)
}

/// Every conversation `user_id` participates in, with the other participants
/// and the newest message.
pub fn get_conversations(conn: &Connection, user_id: UserId) -> Result<Vec<ConversationSummary>> {
    let sql = format!(
        "SELECT {} FROM conversations
         WHERE id IN (SELECT conversation_id FROM conversation_participants WHERE user_id = ?1)
         ORDER BY id",
        ConversationRow::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id], ConversationRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut summaries = Vec::with_capacity(rows.len());
    for row in rows {
        let conversation = Conversation::try_from(row)?;
        summaries.push(ConversationSummary {
            id: conversation.id,
            kind: conversation.kind,
            name: conversation.name,
            participants: other_participants(conn, conversation.id, user_id)?,
            last_message: last_message(conn, conversation.id)?,
        });
    }

    Ok(summaries)
}

fn other_participants(
    conn: &Connection,
    conversation_id: ConversationId,
    user_id: UserId,
) -> Result<Vec<ParticipantSummary>> {
    let mut stmt = conn.prepare_cached(
        "SELECT DISTINCT u.id, u.display_name, u.avatar_url
         FROM users u
         JOIN conversation_participants p ON p.user_id = u.id
         WHERE p.conversation_id = ?1 AND u.id != ?2
         ORDER BY u.id",
    )?;

    let participants = stmt
        .query_map(rusqlite::params![conversation_id, user_id], |row| {
            Ok(ParticipantSummary {
                id: row.get(0)?,
                display_name: row.get(1)?,
                avatar_url: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(participants)
}

fn last_message(conn: &Connection, conversation_id: ConversationId) -> Result<Option<LastMessage>> {
    let sql = format!(
        "SELECT {} FROM messages WHERE conversation_id = ?1
         ORDER BY created_at DESC, id DESC LIMIT 1",
        MessageRow::COLUMNS
    );
    let row = conn
        .prepare_cached(&sql)?
        .query_row([conversation_id], MessageRow::from_row)
        .optional()?;

    Ok(row.map(|m| LastMessage {
        content: m.content,
        sender_id: m.sender_id,
        created_at: m.created_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::save_message;
    use crate::test_support::{test_conn, user};

    fn befriend(conn: &Connection, a: UserId, b: UserId) {
        let req = friends::create_friend_request(conn, a, b).unwrap();
        assert!(friends::respond_friend_request(conn, req.id, b, true).unwrap());
    }

    fn participant_count(conn: &Connection, id: ConversationId) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM conversation_participants WHERE conversation_id = ?1",
            [id],
            |r| r.get(0),
        )
        .unwrap()
    }

    #[test]
    fn strangers_get_no_conversation() {
        let conn = test_conn();
        let a = user(&conn, "A");
        let b = user(&conn, "B");

        for _ in 0..2 {
            assert_eq!(get_or_create_direct_conversation(&conn, a.id, b.id).unwrap(), None);
        }
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM conversations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn always_create_opens_new_thread_each_call() {
        let conn = test_conn();
        let a = user(&conn, "A");
        let b = user(&conn, "B");
        befriend(&conn, a.id, b.id);

        let first = get_or_create_direct_conversation(&conn, a.id, b.id).unwrap().unwrap();
        let second = get_or_create_direct_conversation(&conn, a.id, b.id).unwrap().unwrap();
        assert_ne!(first, second);
        assert_eq!(participant_count(&conn, first), 2);

        let stored = get_conversation(&conn, first).unwrap().unwrap();
        assert_eq!(stored.kind, ConversationKind::Direct);
        assert_eq!(stored.name, None);
    }

    #[test]
    fn reuse_existing_returns_oldest_thread() {
        let conn = test_conn();
        let a = user(&conn, "A");
        let b = user(&conn, "B");
        befriend(&conn, a.id, b.id);

        let policy = DirectConversationPolicy::ReuseExisting;
        let first = get_or_create_direct_conversation_with(&conn, a.id, b.id, policy)
            .unwrap()
            .unwrap();
        let again = get_or_create_direct_conversation_with(&conn, b.id, a.id, policy)
            .unwrap()
            .unwrap();
        assert_eq!(first, again);
        assert_eq!(find_direct_conversation(&conn, b.id, a.id).unwrap(), Some(first));
    }

    #[test]
    fn reuse_ignores_group_threads() {
        let conn = test_conn();
        let a = user(&conn, "A");
        let b = user(&conn, "B");
        befriend(&conn, a.id, b.id);

        let group = create_conversation(&conn, ConversationKind::Group, Some("pair"), &[a.id, b.id]).unwrap();
        let direct = get_or_create_direct_conversation_with(
            &conn,
            a.id,
            b.id,
            DirectConversationPolicy::ReuseExisting,
        )
        .unwrap()
        .unwrap();
        assert_ne!(group, direct);
    }

    #[test]
    fn self_thread_is_not_a_thread_with_someone_else() {
        let conn = test_conn();
        let a = user(&conn, "A");
        let c = user(&conn, "C");
        befriend(&conn, a.id, c.id);
        befriend(&conn, a.id, a.id);

        let policy = DirectConversationPolicy::ReuseExisting;
        let with_c = get_or_create_direct_conversation_with(&conn, a.id, c.id, policy)
            .unwrap()
            .unwrap();

        assert_eq!(find_direct_conversation(&conn, a.id, a.id).unwrap(), None);
        let own = get_or_create_direct_conversation_with(&conn, a.id, a.id, policy)
            .unwrap()
            .unwrap();
        assert_ne!(own, with_c);

        assert_eq!(find_direct_conversation(&conn, a.id, a.id).unwrap(), Some(own));
        assert_eq!(find_direct_conversation(&conn, a.id, c.id).unwrap(), Some(with_c));
    }

    #[test]
    fn lookup_skips_direct_threads_with_outsiders() {
        let conn = test_conn();
        let a = user(&conn, "A");
        let b = user(&conn, "B");
        let c = user(&conn, "C");

        let crowded =
            create_conversation(&conn, ConversationKind::Direct, None, &[a.id, b.id]).unwrap();
        // Rows added behind the creation primitive's back.
        conn.execute(
            "INSERT INTO conversation_participants (conversation_id, user_id) VALUES (?1, ?2)",
            [crowded, c.id],
        )
        .unwrap();

        assert_eq!(find_direct_conversation(&conn, a.id, b.id).unwrap(), None);
    }

    #[test]
    fn direct_shape_is_enforced() {
        let conn = test_conn();
        let a = user(&conn, "A");
        let b = user(&conn, "B");
        let c = user(&conn, "C");

        for ids in [&[a.id][..], &[a.id, b.id, c.id][..], &[][..]] {
            let err = create_conversation(&conn, ConversationKind::Direct, None, ids).unwrap_err();
            assert!(matches!(err, DbError::InvalidConversation(_)), "got {:?}", err);
        }
        let err = create_conversation(&conn, ConversationKind::Direct, Some("us"), &[a.id, b.id])
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidConversation(_)));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM conversations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn summaries_exclude_self_and_carry_last_message() {
        let conn = test_conn();
        let a = user(&conn, "A");
        let b = user(&conn, "B");
        let c = user(&conn, "C");
        befriend(&conn, a.id, b.id);

        let direct = get_or_create_direct_conversation(&conn, a.id, b.id).unwrap().unwrap();
        let group = create_conversation(
            &conn,
            ConversationKind::Group,
            Some("weekend"),
            &[a.id, b.id, c.id],
        )
        .unwrap();

        save_message(&conn, direct, a.id, "first").unwrap();
        save_message(&conn, direct, b.id, "second").unwrap();

        let summaries = get_conversations(&conn, a.id).unwrap();
        assert_eq!(summaries.len(), 2);

        let d = &summaries[0];
        assert_eq!(d.id, direct);
        assert_eq!(d.kind, ConversationKind::Direct);
        let others: Vec<_> = d.participants.iter().map(|p| p.id).collect();
        assert_eq!(others, vec![b.id]);
        let last = d.last_message.as_ref().unwrap();
        assert_eq!(last.content, "second");
        assert_eq!(last.sender_id, b.id);

        let g = &summaries[1];
        assert_eq!(g.id, group);
        assert_eq!(g.name.as_deref(), Some("weekend"));
        assert_eq!(g.participants.len(), 2);
        assert!(g.last_message.is_none());

        // C only sees the group.
        let for_c = get_conversations(&conn, c.id).unwrap();
        assert_eq!(for_c.len(), 1);
        assert_eq!(for_c[0].id, group);
    }

    #[test]
    fn duplicate_membership_rows_do_not_duplicate_summaries() {
        let conn = test_conn();
        let a = user(&conn, "A");
        let b = user(&conn, "B");

        let id = create_conversation(&conn, ConversationKind::Group, None, &[a.id, a.id, b.id, b.id]).unwrap();
        assert_eq!(participant_count(&conn, id), 4);

        let summaries = get_conversations(&conn, a.id).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].participants.len(), 1);
    }

    #[test]
    fn unknown_participant_is_rejected() {
        let conn = test_conn();
        let a = user(&conn, "A");
        let err = create_conversation(&conn, ConversationKind::Group, None, &[a.id, 404]).unwrap_err();
        assert!(err.is_constraint_violation());
    }
}
