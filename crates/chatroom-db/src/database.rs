use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::info;

use chatroom_types::api::{ConversationSummary, FriendRequestLists, MessageQuery};
use chatroom_types::{
    ConversationId, ConversationKind, FriendRequest, FriendRequestId, Message, MessageId,
    MessageRead, User, UserId,
};

use crate::config::DbConfig;
use crate::error::{DbError, Result};
use crate::{conversations, friends, messages, migrations, users};

/// Owns the SQLite connection and hands out transactional sessions.
///
/// Every operation method below runs inside its own `IMMEDIATE` transaction.
/// Callers that need several operations to commit together use [`Database::with_tx`]
/// and the free functions in the operation modules directly.
pub struct Database {
    conn: Mutex<Connection>,
    config: DbConfig,
}

impl Database {
    pub fn open(config: &DbConfig) -> Result<Self> {
        let conn = Connection::open(&config.path)?;

        // WAL mode for concurrent readers in other processes
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let db = Self::init(conn, config.clone())?;

        info!("Database opened at {}", config.path.display());
        Ok(db)
    }

    pub fn open_in_memory(config: &DbConfig) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, config.clone())
    }

    fn init(conn: Connection, config: DbConfig) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(config.busy_timeout)?;

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            config,
        })
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::LockPoisoned(e.to_string()))
    }

    /// Run `f` against the raw connection, outside any transaction.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside an immediate transaction. Commits on `Ok`; the
    /// transaction rolls back when dropped on `Err`.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    // -- Users --

    pub fn create_user(
        &self,
        display_name: &str,
        email: &str,
        avatar_url: Option<&str>,
    ) -> Result<User> {
        self.with_tx(|tx| users::create_user(tx, display_name, email, avatar_url))
    }

    pub fn get_user_by_id(&self, id: UserId) -> Result<Option<User>> {
        self.with_conn(|conn| users::get_user_by_id(conn, id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.with_conn(|conn| users::get_user_by_email(conn, email))
    }

    pub fn touch_last_seen(&self, user_id: UserId) -> Result<bool> {
        self.with_tx(|tx| users::touch_last_seen(tx, user_id))
    }

    // -- Friend requests --

    pub fn create_friend_request(&self, from: UserId, to: UserId) -> Result<FriendRequest> {
        self.with_tx(|tx| friends::create_friend_request(tx, from, to))
    }

    pub fn respond_friend_request(
        &self,
        request_id: FriendRequestId,
        responding_user_id: UserId,
        accept: bool,
    ) -> Result<bool> {
        self.with_tx(|tx| friends::respond_friend_request(tx, request_id, responding_user_id, accept))
    }

    pub fn get_friend_requests(&self, user_id: UserId) -> Result<FriendRequestLists> {
        self.with_conn(|conn| friends::get_friend_requests(conn, user_id))
    }

    // -- Friendships --

    pub fn are_friends(&self, a: UserId, b: UserId) -> Result<bool> {
        self.with_conn(|conn| friends::are_friends(conn, a, b))
    }

    pub fn get_friends(&self, user_id: UserId) -> Result<Vec<User>> {
        self.with_conn(|conn| friends::get_friends(conn, user_id))
    }

    // -- Conversations --

    pub fn create_conversation(
        &self,
        kind: ConversationKind,
        name: Option<&str>,
        participant_ids: &[UserId],
    ) -> Result<ConversationId> {
        self.with_tx(|tx| conversations::create_conversation(tx, kind, name, participant_ids))
    }

    /// Uses the configured [`crate::DirectConversationPolicy`].
    pub fn get_or_create_direct_conversation(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<Option<ConversationId>> {
        let policy = self.config.direct_conversations;
        self.with_tx(|tx| conversations::get_or_create_direct_conversation_with(tx, a, b, policy))
    }

    pub fn get_conversations(&self, user_id: UserId) -> Result<Vec<ConversationSummary>> {
        self.with_conn(|conn| conversations::get_conversations(conn, user_id))
    }

    // -- Messages --

    pub fn save_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        content: &str,
    ) -> Result<Message> {
        self.with_tx(|tx| messages::save_message(tx, conversation_id, sender_id, content))
    }

    pub fn list_messages(
        &self,
        conversation_id: ConversationId,
        query: MessageQuery,
    ) -> Result<Vec<Message>> {
        self.with_conn(|conn| messages::list_messages(conn, conversation_id, query.limit, query.offset))
    }

    pub fn mark_read(&self, message_id: MessageId, user_id: UserId) -> Result<()> {
        self.with_tx(|tx| messages::mark_read(tx, message_id, user_id))
    }

    pub fn get_read_receipt(
        &self,
        message_id: MessageId,
        user_id: UserId,
    ) -> Result<Option<MessageRead>> {
        self.with_conn(|conn| messages::get_read_receipt(conn, message_id, user_id))
    }

    pub fn get_unread_count(&self, user_id: UserId) -> Result<i64> {
        self.with_conn(|conn| messages::get_unread_count(conn, user_id))
    }
}
