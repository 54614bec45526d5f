use rusqlite::OptionalExtension;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::{self, MessageRow, ReactionRow, SeenRow};
use crate::Database;

const MESSAGE_COLUMNS: &str = "m.id, m.group_id, m.sender_id, u.name, m.content, m.kind, m.reply_to, m.media_url, m.deleted, m.created_at";

impl Database {
    #[allow(clippy::too_many_arguments)]
    pub fn insert_message(
        &self,
        id: &str,
        group_id: &str,
        sender_id: &str,
        content: &str,
        kind: &str,
        reply_to: Option<&str>,
        media_url: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, group_id, sender_id, content, kind, reply_to, media_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![id, group_id, sender_id, content, kind, reply_to, media_url, models::now()],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages m
                 LEFT JOIN users u ON m.sender_id = u.id
                 WHERE m.id = ?1"
            );
            let mut stmt = conn.prepare(&sql)?;
            let row = stmt.query_row([id], map_message).optional()?;
            Ok(row)
        })
    }

    /// Newest first; pass the `created_at` of the oldest message from the
    /// previous page as `before` to fetch older messages.
    pub fn list_messages(
        &self,
        group_id: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages m
                 LEFT JOIN users u ON m.sender_id = u.id
                 WHERE m.group_id = ?1 AND (?2 IS NULL OR m.created_at < ?2)
                 ORDER BY m.created_at DESC
                 LIMIT ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![group_id, before, limit], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_message_content(&self, id: &str, content: &str) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET content = ?2 WHERE id = ?1 AND deleted = 0",
                [id, content],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound("message"));
            }
            Ok(())
        })
    }

    /// Soft delete: the row stays for reply threading, content is cleared.
    pub fn soft_delete_message(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET deleted = 1, content = '' WHERE id = ?1",
                [id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound("message"));
            }
            Ok(())
        })
    }

    // -- Reactions --

    /// Idempotent insert keyed by (user, message, emoji).
    /// Returns true if a row was inserted, false if it already existed.
    pub fn add_reaction(&self, message_id: &str, user_id: &str, emoji: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO reactions (id, message_id, user_id, emoji, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    Uuid::new_v4().to_string(),
                    message_id,
                    user_id,
                    emoji,
                    models::now()
                ],
            )?;
            Ok(inserted > 0)
        })
    }

    /// Returns true if a row was removed.
    pub fn remove_reaction(&self, message_id: &str, user_id: &str, emoji: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM reactions WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3",
                [message_id, user_id, emoji],
            )?;
            Ok(removed > 0)
        })
    }

    /// Batch-fetch reactions for a set of message IDs.
    pub fn reactions_for_messages(&self, message_ids: &[String]) -> Result<Vec<ReactionRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=message_ids.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "SELECT id, message_id, user_id, emoji, created_at FROM reactions WHERE message_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = message_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(ReactionRow {
                        id: row.get(0)?,
                        message_id: row.get(1)?,
                        user_id: row.get(2)?,
                        emoji: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Seen receipts --

    /// Upsert keyed by (user, message); a repeat marking refreshes `seen_at`.
    pub fn mark_seen(&self, message_id: &str, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO message_seen (user_id, message_id, seen_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, message_id) DO UPDATE SET seen_at = excluded.seen_at",
                rusqlite::params![user_id, message_id, models::now()],
            )?;
            Ok(())
        })
    }

    pub fn seen_for_messages(&self, message_ids: &[String]) -> Result<Vec<SeenRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=message_ids.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "SELECT user_id, message_id, seen_at FROM message_seen WHERE message_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = message_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(SeenRow {
                        user_id: row.get(0)?,
                        message_id: row.get(1)?,
                        seen_at: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        group_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_name: row
            .get::<_, Option<String>>(3)?
            .unwrap_or_else(|| "unknown".to_string()),
        content: row.get(4)?,
        kind: row.get(5)?,
        reply_to: row.get(6)?,
        media_url: row.get(7)?,
        deleted: row.get(8)?,
        created_at: row.get(9)?,
    })
}
