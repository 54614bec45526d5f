use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            name        TEXT NOT NULL,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS groups (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            description TEXT,
            slug        TEXT NOT NULL UNIQUE,
            invite_code TEXT NOT NULL UNIQUE,
            is_private  INTEGER NOT NULL DEFAULT 0,
            created_by  TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS group_members (
            user_id     TEXT NOT NULL REFERENCES users(id),
            group_id    TEXT NOT NULL REFERENCES groups(id),
            role        TEXT NOT NULL,
            permissions TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            PRIMARY KEY (user_id, group_id)
        );

        CREATE INDEX IF NOT EXISTS idx_members_group
            ON group_members(group_id);

        CREATE TABLE IF NOT EXISTS topics (
            id          TEXT PRIMARY KEY,
            group_id    TEXT NOT NULL REFERENCES groups(id),
            title       TEXT NOT NULL,
            created_by  TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_topics_group
            ON topics(group_id, created_at);

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            group_id    TEXT NOT NULL REFERENCES groups(id),
            sender_id   TEXT NOT NULL REFERENCES users(id),
            content     TEXT NOT NULL,
            kind        TEXT NOT NULL DEFAULT 'TEXT',
            reply_to    TEXT REFERENCES messages(id),
            media_url   TEXT,
            deleted     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_group
            ON messages(group_id, created_at);

        CREATE TABLE IF NOT EXISTS reactions (
            id          TEXT PRIMARY KEY,
            message_id  TEXT NOT NULL REFERENCES messages(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            emoji       TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(user_id, message_id, emoji)
        );

        CREATE INDEX IF NOT EXISTS idx_reactions_message
            ON reactions(message_id);

        CREATE TABLE IF NOT EXISTS message_seen (
            user_id     TEXT NOT NULL REFERENCES users(id),
            message_id  TEXT NOT NULL REFERENCES messages(id),
            seen_at     TEXT NOT NULL,
            PRIMARY KEY (user_id, message_id)
        );

        CREATE INDEX IF NOT EXISTS idx_seen_message
            ON message_seen(message_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
