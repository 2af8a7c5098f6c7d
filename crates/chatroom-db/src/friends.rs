//! Friend requests and the friendship graph.
//!
//! A request moves `pending -> accepted | rejected` and is never reopened.
//! Accepting one writes a [`Friendship`] with its endpoints in canonical
//! `(min, max)` order.

use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, warn};

use chatroom_types::api::FriendRequestLists;
use chatroom_types::{FriendRequest, FriendRequestId, FriendRequestStatus, Friendship, User, UserId};

use crate::error::{OptionalExt, Result};
use crate::models::FriendRequestRow;
use crate::users;

/// Returns the pending request for this exact `(from, to)` pair, creating it
/// if none exists. The reverse direction is not considered, nor is an
/// existing friendship.
pub fn create_friend_request(
    conn: &Connection,
    from_user_id: UserId,
    to_user_id: UserId,
) -> Result<FriendRequest> {
    // The partial unique index on pending pairs turns a concurrent duplicate
    // into a no-op instead of a second row.
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO friend_requests (from_user_id, to_user_id, status, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            from_user_id,
            to_user_id,
            FriendRequestStatus::Pending.as_str(),
            Utc::now()
        ],
    )?;

    if inserted > 0 {
        debug!(from_user_id, to_user_id, "friend request created");
    }

    let sql = format!(
        "SELECT {} FROM friend_requests
         WHERE from_user_id = ?1 AND to_user_id = ?2 AND status = 'pending'",
        FriendRequestRow::COLUMNS
    );
    let row = conn.query_row(
        &sql,
        rusqlite::params![from_user_id, to_user_id],
        FriendRequestRow::from_row,
    )?;

    row.try_into()
}

pub fn get_friend_request(conn: &Connection, id: FriendRequestId) -> Result<Option<FriendRequest>> {
    let sql = format!("SELECT {} FROM friend_requests WHERE id = ?1", FriendRequestRow::COLUMNS);
    conn.query_row(&sql, [id], FriendRequestRow::from_row)
        .optional()?
        .map(FriendRequest::try_from)
        .transpose()
}

/// Accept or reject a request addressed to `responding_user_id`.
///
/// Returns false when the request does not exist or belongs to someone else.
/// The current status is not checked, so responding again to a resolved
/// request overwrites its status; the friendship row stays unique.
pub fn respond_friend_request(
    conn: &Connection,
    request_id: FriendRequestId,
    responding_user_id: UserId,
    accept: bool,
) -> Result<bool> {
    let sql = format!(
        "SELECT {} FROM friend_requests WHERE id = ?1 AND to_user_id = ?2",
        FriendRequestRow::COLUMNS
    );
    let request = conn
        .query_row(
            &sql,
            rusqlite::params![request_id, responding_user_id],
            FriendRequestRow::from_row,
        )
        .optional()?;

    let Some(request) = request else {
        warn!(request_id, responding_user_id, "friend request not found for responder");
        return Ok(false);
    };

    let status = if accept {
        FriendRequestStatus::Accepted
    } else {
        FriendRequestStatus::Rejected
    };

    conn.execute(
        "UPDATE friend_requests SET status = ?1 WHERE id = ?2",
        rusqlite::params![status.as_str(), request.id],
    )?;

    if accept {
        let pair = Friendship::canonical(request.from_user_id, request.to_user_id);
        conn.execute(
            "INSERT OR IGNORE INTO friendships (user_id_a, user_id_b) VALUES (?1, ?2)",
            rusqlite::params![pair.user_id_a, pair.user_id_b],
        )?;
    }

    debug!(request_id, status = status.as_str(), "friend request resolved");
    Ok(true)
}

/// Pending requests addressed to and sent by `user_id`, oldest first.
pub fn get_friend_requests(conn: &Connection, user_id: UserId) -> Result<FriendRequestLists> {
    Ok(FriendRequestLists {
        received: pending_requests(conn, "to_user_id", user_id)?,
        sent: pending_requests(conn, "from_user_id", user_id)?,
    })
}

fn pending_requests(
    conn: &Connection,
    column: &'static str,
    user_id: UserId,
) -> Result<Vec<FriendRequest>> {
    let sql = format!(
        "SELECT {} FROM friend_requests WHERE {} = ?1 AND status = 'pending' ORDER BY id",
        FriendRequestRow::COLUMNS,
        column
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id], FriendRequestRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(FriendRequest::try_from).collect()
}

pub fn are_friends(conn: &Connection, a: UserId, b: UserId) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM friendships
             WHERE (user_id_a = ?1 AND user_id_b = ?2) OR (user_id_a = ?2 AND user_id_b = ?1)
             LIMIT 1",
            rusqlite::params![a, b],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn friendships_of(conn: &Connection, user_id: UserId) -> Result<Vec<Friendship>> {
    let mut stmt = conn.prepare(
        "SELECT user_id_a, user_id_b FROM friendships WHERE user_id_a = ?1 OR user_id_b = ?1",
    )?;
    let rows = stmt
        .query_map([user_id], |row| {
            Ok(Friendship {
                user_id_a: row.get(0)?,
                user_id_b: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_friends(conn: &Connection, user_id: UserId) -> Result<Vec<User>> {
    let friend_ids: Vec<UserId> = friendships_of(conn, user_id)?
        .iter()
        .filter_map(|f| f.other(user_id))
        .collect();

    users::get_users_by_ids(conn, &friend_ids)
}
