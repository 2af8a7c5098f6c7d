use rusqlite::Connection;

use chatroom_types::User;

use crate::{migrations, users};

pub fn test_conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    migrations::run(&conn).unwrap();
    conn
}

pub fn user(conn: &Connection, name: &str) -> User {
    let email = format!("{}@example.com", name.to_lowercase());
    users::create_user(conn, name, &email, None).unwrap()
}
