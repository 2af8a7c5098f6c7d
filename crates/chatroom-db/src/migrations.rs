use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

pub const LATEST_VERSION: i64 = 2;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version = current_version(conn)?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                display_name    TEXT NOT NULL,
                email           TEXT NOT NULL UNIQUE,
                avatar_url      TEXT,
                last_seen_at    TEXT NOT NULL
            );

            CREATE TABLE friend_requests (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                from_user_id    INTEGER NOT NULL REFERENCES users(id),
                to_user_id      INTEGER NOT NULL REFERENCES users(id),
                status          TEXT NOT NULL DEFAULT 'pending'
                                CHECK (status IN ('pending', 'accepted', 'rejected')),
                created_at      TEXT NOT NULL
            );

            CREATE TABLE friendships (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id_a       INTEGER NOT NULL REFERENCES users(id),
                user_id_b       INTEGER NOT NULL REFERENCES users(id),
                CHECK (user_id_a <= user_id_b)
            );

            CREATE TABLE conversations (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                type            TEXT NOT NULL CHECK (type IN ('direct', 'group')),
                name            TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE conversation_participants (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL REFERENCES conversations(id),
                user_id         INTEGER NOT NULL REFERENCES users(id)
            );

            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL REFERENCES conversations(id),
                sender_id       INTEGER NOT NULL REFERENCES users(id),
                content         TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE message_reads (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id      INTEGER NOT NULL REFERENCES messages(id),
                user_id         INTEGER NOT NULL REFERENCES users(id),
                read_at         TEXT NOT NULL
            );

            CREATE INDEX idx_friend_requests_to
                ON friend_requests(to_user_id, status);
            CREATE INDEX idx_friend_requests_from
                ON friend_requests(from_user_id, status);
            CREATE INDEX idx_friendships_b
                ON friendships(user_id_b);
            CREATE INDEX idx_participants_user
                ON conversation_participants(user_id);
            CREATE INDEX idx_participants_conversation
                ON conversation_participants(conversation_id);
            CREATE INDEX idx_messages_conversation
                ON messages(conversation_id, created_at);
            CREATE INDEX idx_message_reads_user
                ON message_reads(user_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        // Natural-key uniqueness backing the idempotent inserts.
        info!("Running migration v2 (natural-key constraints)");
        conn.execute_batch(
            "
            CREATE UNIQUE INDEX idx_friend_requests_pending_pair
                ON friend_requests(from_user_id, to_user_id)
                WHERE status = 'pending';
            CREATE UNIQUE INDEX idx_friendships_pair
                ON friendships(user_id_a, user_id_b);
            CREATE UNIQUE INDEX idx_message_reads_pair
                ON message_reads(message_id, user_id);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<i64> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}
