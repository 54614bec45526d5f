use parley_types::perms::{PermissionUpdate, Role};
use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::models::{self, MemberRow};
use crate::Database;

const MEMBER_COLUMNS: &str = "m.user_id, m.group_id, m.role, m.permissions, u.name, u.email, m.created_at";

impl Database {
    /// Create a membership with the canonical permission template for `role`.
    /// Fails with a conflict if the user already belongs to the group.
    pub fn insert_member(&self, user_id: &str, group_id: &str, role: Role) -> Result<MemberRow> {
        self.with_conn(|conn| {
            if query_member(conn, user_id, group_id)?.is_some() {
                return Err(StoreError::Conflict("already a member of this group".into()));
            }

            let user_exists: Option<i64> = conn
                .query_row("SELECT 1 FROM users WHERE id = ?1", [user_id], |row| {
                    row.get(0)
                })
                .optional()?;
            if user_exists.is_none() {
                return Err(StoreError::NotFound("user"));
            }

            let perms = models::encode_permissions(&role.template())?;
            conn.execute(
                "INSERT INTO group_members (user_id, group_id, role, permissions, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![user_id, group_id, role.as_str(), perms, models::now()],
            )?;

            query_member(conn, user_id, group_id)?.ok_or(StoreError::NotFound("membership"))
        })
    }

    pub fn get_member(&self, user_id: &str, group_id: &str) -> Result<Option<MemberRow>> {
        self.with_conn(|conn| query_member(conn, user_id, group_id))
    }

    pub fn list_members(&self, group_id: &str) -> Result<Vec<MemberRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MEMBER_COLUMNS}
                 FROM group_members m
                 JOIN users u ON u.id = m.user_id
                 WHERE m.group_id = ?1
                 ORDER BY m.created_at"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_and_then([group_id], map_member)?
                .collect::<Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Delete a membership. The CREATOR membership is never deletable.
    pub fn remove_member(&self, user_id: &str, group_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            let member =
                query_member(conn, user_id, group_id)?.ok_or(StoreError::NotFound("membership"))?;
            if member.role == Role::Creator {
                return Err(StoreError::CreatorImmutable);
            }
            conn.execute(
                "DELETE FROM group_members WHERE user_id = ?1 AND group_id = ?2",
                [user_id, group_id],
            )?;
            Ok(())
        })
    }

    /// Promote or demote a member. Resets the permission set to the canonical
    /// template for the new role. The CREATOR membership is never retargeted,
    /// and no membership may be retargeted *to* CREATOR.
    pub fn set_member_role(&self, user_id: &str, group_id: &str, role: Role) -> Result<MemberRow> {
        if role == Role::Creator {
            return Err(StoreError::CreatorImmutable);
        }
        self.with_conn(|conn| {
            let member =
                query_member(conn, user_id, group_id)?.ok_or(StoreError::NotFound("membership"))?;
            if member.role == Role::Creator {
                return Err(StoreError::CreatorImmutable);
            }

            let perms = models::encode_permissions(&role.template())?;
            conn.execute(
                "UPDATE group_members SET role = ?3, permissions = ?4
                 WHERE user_id = ?1 AND group_id = ?2",
                rusqlite::params![user_id, group_id, role.as_str(), perms],
            )?;

            query_member(conn, user_id, group_id)?.ok_or(StoreError::NotFound("membership"))
        })
    }

    /// Overlay the named flags of a partial permission update onto the
    /// member's stored set.
    pub fn update_member_permissions(
        &self,
        user_id: &str,
        group_id: &str,
        patch: &PermissionUpdate,
    ) -> Result<MemberRow> {
        self.with_conn(|conn| {
            let member =
                query_member(conn, user_id, group_id)?.ok_or(StoreError::NotFound("membership"))?;

            let mut perms = member.permissions;
            perms.apply(patch);

            conn.execute(
                "UPDATE group_members SET permissions = ?3 WHERE user_id = ?1 AND group_id = ?2",
                rusqlite::params![user_id, group_id, models::encode_permissions(&perms)?],
            )?;

            query_member(conn, user_id, group_id)?.ok_or(StoreError::NotFound("membership"))
        })
    }

    pub fn member_count(&self, group_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM group_members WHERE group_id = ?1",
                [group_id],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }
}

fn query_member(conn: &Connection, user_id: &str, group_id: &str) -> Result<Option<MemberRow>> {
    let sql = format!(
        "SELECT {MEMBER_COLUMNS}
         FROM group_members m
         JOIN users u ON u.id = m.user_id
         WHERE m.user_id = ?1 AND m.group_id = ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_and_then([user_id, group_id], map_member)?;
    rows.next().transpose()
}

fn map_member(row: &rusqlite::Row<'_>) -> Result<MemberRow> {
    let role: String = row.get(2)?;
    let perms: String = row.get(3)?;
    Ok(MemberRow {
        user_id: row.get(0)?,
        group_id: row.get(1)?,
        role: models::decode_role(&role)?,
        permissions: models::decode_permissions(&perms)?,
        user_name: row.get(4)?,
        user_email: row.get(5)?,
        created_at: row.get(6)?,
    })
}
