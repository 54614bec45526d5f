use parley_types::perms::Role;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::{self, GroupRow};
use crate::slug;
use crate::Database;

/// Bounded retry for slug disambiguation. After the base slug and this many
/// suffixed candidates all collide, creation fails with a conflict.
pub const MAX_SLUG_ATTEMPTS: u32 = 5;

impl Database {
    /// Create a group together with its CREATOR membership.
    ///
    /// Slug derivation, collision retry, and both inserts run inside one
    /// transaction: a concurrent duplicate-name creation either succeeds with
    /// a disambiguated slug or fails cleanly, never leaving a group row
    /// without its creator membership.
    pub fn create_group(
        &self,
        creator_id: &str,
        name: &str,
        description: Option<&str>,
        is_private: bool,
    ) -> Result<GroupRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let creator_exists: Option<i64> = tx
                .query_row("SELECT 1 FROM users WHERE id = ?1", [creator_id], |row| {
                    row.get(0)
                })
                .optional()?;
            if creator_exists.is_none() {
                return Err(StoreError::NotFound("user"));
            }

            let base = slug::slugify(name);
            let mut candidate = base.clone();
            let mut attempt = 0;
            while slug_taken(&tx, &candidate)? {
                attempt += 1;
                if attempt > MAX_SLUG_ATTEMPTS {
                    return Err(StoreError::Conflict(
                        "could not derive a unique slug for this group name".into(),
                    ));
                }
                candidate = format!("{}-{}", base, slug::random_suffix(3));
            }

            let group_id = Uuid::new_v4().to_string();
            let invite_code = slug::generate_invite_code();
            let now = models::now();

            tx.execute(
                "INSERT INTO groups (id, name, description, slug, invite_code, is_private, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                rusqlite::params![
                    group_id,
                    name,
                    description,
                    candidate,
                    invite_code,
                    is_private,
                    creator_id,
                    now
                ],
            )?;

            let perms = models::encode_permissions(&Role::Creator.template())?;
            tx.execute(
                "INSERT INTO group_members (user_id, group_id, role, permissions, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![creator_id, group_id, Role::Creator.as_str(), perms, now],
            )?;

            tx.commit()?;

            Ok(GroupRow {
                id: group_id,
                name: name.to_string(),
                description: description.map(|s| s.to_string()),
                slug: candidate,
                invite_code,
                is_private,
                created_by: creator_id.to_string(),
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    /// Resolve a group by id, slug, or invite code. First match wins.
    pub fn find_group_by_ref(&self, reference: &str) -> Result<Option<GroupRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, description, slug, invite_code, is_private, created_by, created_at, updated_at
                 FROM groups WHERE id = ?1 OR slug = ?1 OR invite_code = ?1",
            )?;
            let row = stmt.query_row([reference], map_group).optional()?;
            Ok(row)
        })
    }

    pub fn get_group(&self, id: &str) -> Result<Option<GroupRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, description, slug, invite_code, is_private, created_by, created_at, updated_at
                 FROM groups WHERE id = ?1",
            )?;
            let row = stmt.query_row([id], map_group).optional()?;
            Ok(row)
        })
    }

    /// Groups the user belongs to, newest first.
    pub fn list_groups_for_user(&self, user_id: &str) -> Result<Vec<GroupRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT g.id, g.name, g.description, g.slug, g.invite_code, g.is_private, g.created_by, g.created_at, g.updated_at
                 FROM groups g
                 JOIN group_members m ON m.group_id = g.id
                 WHERE m.user_id = ?1
                 ORDER BY g.created_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id], map_group)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_public_groups(&self) -> Result<Vec<GroupRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, description, slug, invite_code, is_private, created_by, created_at, updated_at
                 FROM groups WHERE is_private = 0
                 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([], map_group)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_group(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
        is_private: Option<bool>,
    ) -> Result<GroupRow> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE groups SET
                    name = COALESCE(?2, name),
                    description = COALESCE(?3, description),
                    is_private = COALESCE(?4, is_private),
                    updated_at = ?5
                 WHERE id = ?1",
                rusqlite::params![id, name, description, is_private, models::now()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound("group"));
            }

            let mut stmt = conn.prepare(
                "SELECT id, name, description, slug, invite_code, is_private, created_by, created_at, updated_at
                 FROM groups WHERE id = ?1",
            )?;
            Ok(stmt.query_row([id], map_group)?)
        })
    }

    /// Cascade: reactions and seen-records, then messages, topics, members,
    /// and finally the group row, in one transaction.
    pub fn delete_group(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "DELETE FROM reactions WHERE message_id IN (SELECT id FROM messages WHERE group_id = ?1)",
                [id],
            )?;
            tx.execute(
                "DELETE FROM message_seen WHERE message_id IN (SELECT id FROM messages WHERE group_id = ?1)",
                [id],
            )?;
            tx.execute("DELETE FROM messages WHERE group_id = ?1", [id])?;
            tx.execute("DELETE FROM topics WHERE group_id = ?1", [id])?;
            tx.execute("DELETE FROM group_members WHERE group_id = ?1", [id])?;
            let removed = tx.execute("DELETE FROM groups WHERE id = ?1", [id])?;

            tx.commit()?;

            if removed == 0 {
                return Err(StoreError::NotFound("group"));
            }
            Ok(())
        })
    }
}

fn slug_taken(conn: &Connection, candidate: &str) -> Result<bool> {
    let hit: Option<i64> = conn
        .query_row("SELECT 1 FROM groups WHERE slug = ?1", [candidate], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(hit.is_some())
}

fn map_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupRow> {
    Ok(GroupRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        slug: row.get(3)?,
        invite_code: row.get(4)?,
        is_private: row.get(5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
