use rusqlite::OptionalExtension;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::{self, TopicRow};
use crate::Database;

impl Database {
    pub fn create_topic(&self, group_id: &str, title: &str, created_by: &str) -> Result<TopicRow> {
        self.with_conn(|conn| {
            let id = Uuid::new_v4().to_string();
            let now = models::now();
            conn.execute(
                "INSERT INTO topics (id, group_id, title, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, group_id, title, created_by, now],
            )?;
            Ok(TopicRow {
                id,
                group_id: group_id.to_string(),
                title: title.to_string(),
                created_by: created_by.to_string(),
                created_at: now,
            })
        })
    }

    /// Fetch a topic scoped to its group; a topic id from another group does
    /// not resolve.
    pub fn get_topic(&self, topic_id: &str, group_id: &str) -> Result<Option<TopicRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, group_id, title, created_by, created_at
                 FROM topics WHERE id = ?1 AND group_id = ?2",
            )?;
            let row = stmt.query_row([topic_id, group_id], map_topic).optional()?;
            Ok(row)
        })
    }

    pub fn list_topics(&self, group_id: &str) -> Result<Vec<TopicRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, group_id, title, created_by, created_at
                 FROM topics WHERE group_id = ?1
                 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([group_id], map_topic)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_topic(&self, topic_id: &str, title: &str) -> Result<TopicRow> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE topics SET title = ?2 WHERE id = ?1",
                [topic_id, title],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound("topic"));
            }
            let mut stmt = conn.prepare(
                "SELECT id, group_id, title, created_by, created_at FROM topics WHERE id = ?1",
            )?;
            Ok(stmt.query_row([topic_id], map_topic)?)
        })
    }

    pub fn delete_topic(&self, topic_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM topics WHERE id = ?1", [topic_id])?;
            if removed == 0 {
                return Err(StoreError::NotFound("topic"));
            }
            Ok(())
        })
    }
}

fn map_topic(row: &rusqlite::Row<'_>) -> rusqlite::Result<TopicRow> {
    Ok(TopicRow {
        id: row.get(0)?,
        group_id: row.get(1)?,
        title: row.get(2)?,
        created_by: row.get(3)?,
        created_at: row.get(4)?,
    })
}
