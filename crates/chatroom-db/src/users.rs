use chrono::Utc;
use rusqlite::Connection;
use tracing::debug;

use chatroom_types::{User, UserId};

use crate::error::{OptionalExt, Result};
use crate::models::UserRow;

/// Insert a new user. A duplicate email surfaces as
/// [`crate::DbError::ConstraintViolation`].
pub fn create_user(
    conn: &Connection,
    display_name: &str,
    email: &str,
    avatar_url: Option<&str>,
) -> Result<User> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO users (display_name, email, avatar_url, last_seen_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![display_name, email, avatar_url, now],
    )?;

    let id = conn.last_insert_rowid();
    debug!(user_id = id, "user created");

    Ok(User {
        id,
        display_name: display_name.to_string(),
        email: email.to_string(),
        avatar_url: avatar_url.map(str::to_string),
        last_seen_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: UserId) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", UserRow::COLUMNS);
    let row = conn.query_row(&sql, [id], UserRow::from_row).optional()?;
    Ok(row.map(User::from))
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?1", UserRow::COLUMNS);
    let row = conn.query_row(&sql, [email], UserRow::from_row).optional()?;
    Ok(row.map(User::from))
}

/// Batch-fetch users by id, ordered by id. Unknown ids are skipped.
pub fn get_users_by_ids(conn: &Connection, ids: &[UserId]) -> Result<Vec<User>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT {} FROM users WHERE id IN ({}) ORDER BY id",
        UserRow::COLUMNS,
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let users = stmt
        .query_map(rusqlite::params_from_iter(ids.iter()), UserRow::from_row)?
        .map(|row| row.map(User::from))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(users)
}

/// Returns false when the user does not exist.
pub fn touch_last_seen(conn: &Connection, user_id: UserId) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET last_seen_at = ?1 WHERE id = ?2",
        rusqlite::params![Utc::now(), user_id],
    )?;
    Ok(changed > 0)
}
