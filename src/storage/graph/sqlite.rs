//! `SQLite` graph repository.
//!
//! Stores members and relationship edges in two tables. Relationship
//! endpoints are foreign keys into the member table, so a member can never
//! be deleted while an edge still references it.

// Allow missing_const_for_fn - constructors touch the filesystem.
#![allow(clippy::missing_const_for_fn)]

use crate::models::{
    FamilyId, Gender, Member, MemberId, Relationship, RelationshipId, RelationshipType,
    ValidTimeRange,
};
use crate::storage::traits::{ChangeSet, GraphRepository};
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::instrument;

/// Helper to acquire mutex lock with poison recovery.
fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Graph SQLite mutex was poisoned, recovering");
            metrics::counter!("kinship_sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

fn sql_error(operation: &str) -> impl FnOnce(rusqlite::Error) -> Error + '_ {
    move |e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

const MEMBER_COLUMNS: &str =
    "id, family_id, name, gender, father_id, mother_id, husband_id, wife_id";

const RELATIONSHIP_COLUMNS: &str = "id, family_id, source_member_id, target_member_id, \
     relationship_type, sort_order, valid_time_start, valid_time_end, description";

/// `SQLite`-based graph repository.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` for thread-safe access. WAL mode and `busy_timeout`
/// handle concurrent access from other processes. [`GraphRepository::apply`]
/// runs inside a single transaction.
///
/// # Schema
///
/// - `kin_members`: members with their denormalized parent/spouse links
/// - `kin_relationships`: typed edges between members
pub struct SqliteGraphRepository {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the database (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteGraphRepository {
    /// Opens (or creates) a repository at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_graph_db_dir".to_string(),
                cause: e.to_string(),
            })?;
        }
        let conn = Connection::open(&db_path).map_err(sql_error("open_graph_sqlite"))?;

        let repository = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };

        repository.initialize()?;
        Ok(repository)
    }

    /// Creates an in-memory `SQLite` repository (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(sql_error("open_graph_sqlite_memory"))?;

        let repository = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };

        repository.initialize()?;
        Ok(repository)
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Initializes the database schema.
    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        let _ = conn.pragma_update(None, "busy_timeout", "5000");
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(sql_error("enable_foreign_keys"))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kin_members (
                id TEXT PRIMARY KEY,
                family_id TEXT NOT NULL,
                name TEXT NOT NULL,
                gender TEXT NOT NULL DEFAULT 'unknown',
                father_id TEXT,
                mother_id TEXT,
                husband_id TEXT,
                wife_id TEXT
            )",
            [],
        )
        .map_err(sql_error("create_kin_members_table"))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kin_relationships (
                id TEXT PRIMARY KEY,
                family_id TEXT NOT NULL,
                source_member_id TEXT NOT NULL,
                target_member_id TEXT NOT NULL,
                relationship_type TEXT NOT NULL,
                sort_order INTEGER,
                valid_time_start INTEGER,
                valid_time_end INTEGER,
                description TEXT,
                CHECK (source_member_id <> target_member_id),
                FOREIGN KEY (source_member_id) REFERENCES kin_members(id) ON DELETE RESTRICT,
                FOREIGN KEY (target_member_id) REFERENCES kin_members(id) ON DELETE RESTRICT
            )",
            [],
        )
        .map_err(sql_error("create_kin_relationships_table"))?;

        Self::create_indexes(&conn);

        Ok(())
    }

    /// Creates indexes for optimized queries.
    fn create_indexes(conn: &Connection) {
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_kin_members_family ON kin_members(family_id)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_kin_relationships_family ON kin_relationships(family_id)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_kin_relationships_source ON kin_relationships(source_member_id)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_kin_relationships_target ON kin_relationships(target_member_id)",
            [],
        );
    }

    /// Parses a member from a database row.
    fn parse_member_row(row: &Row<'_>) -> rusqlite::Result<Member> {
        let id: String = row.get("id")?;
        let family_id: String = row.get("family_id")?;
        let name: String = row.get("name")?;
        let gender: String = row.get("gender")?;
        let father_id: Option<String> = row.get("father_id")?;
        let mother_id: Option<String> = row.get("mother_id")?;
        let husband_id: Option<String> = row.get("husband_id")?;
        let wife_id: Option<String> = row.get("wife_id")?;

        let gender = Gender::parse(&gender).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown gender: {gender}").into(),
            )
        })?;

        Ok(Member {
            id: MemberId::new(id),
            family_id: FamilyId::new(family_id),
            name,
            gender,
            father_id: father_id.map(MemberId::new),
            mother_id: mother_id.map(MemberId::new),
            husband_id: husband_id.map(MemberId::new),
            wife_id: wife_id.map(MemberId::new),
        })
    }

    /// Parses a relationship from a database row.
    fn parse_relationship_row(row: &Row<'_>) -> rusqlite::Result<Relationship> {
        let id: String = row.get("id")?;
        let family_id: String = row.get("family_id")?;
        let source: String = row.get("source_member_id")?;
        let target: String = row.get("target_member_id")?;
        let relationship_type_str: String = row.get("relationship_type")?;
        let order: Option<i32> = row.get("sort_order")?;
        let valid_time_start: Option<i64> = row.get("valid_time_start")?;
        let valid_time_end: Option<i64> = row.get("valid_time_end")?;
        let description: Option<String> = row.get("description")?;

        let relationship_type = RelationshipType::parse(&relationship_type_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown relationship type: {relationship_type_str}").into(),
            )
        })?;

        Ok(Relationship {
            id: RelationshipId::new(id),
            family_id: FamilyId::new(family_id),
            source_member_id: MemberId::new(source),
            target_member_id: MemberId::new(target),
            relationship_type,
            order,
            valid_time: ValidTimeRange {
                start: valid_time_start,
                end: valid_time_end,
            },
            description,
        })
    }

    fn upsert_member(conn: &Connection, member: &Member) -> Result<()> {
        conn.execute(
            "INSERT INTO kin_members (
                id, family_id, name, gender, father_id, mother_id, husband_id, wife_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                family_id = excluded.family_id,
                name = excluded.name,
                gender = excluded.gender,
                father_id = excluded.father_id,
                mother_id = excluded.mother_id,
                husband_id = excluded.husband_id,
                wife_id = excluded.wife_id",
            params![
                member.id.as_str(),
                member.family_id.as_str(),
                member.name,
                member.gender.as_str(),
                member.father_id.as_ref().map(MemberId::as_str),
                member.mother_id.as_ref().map(MemberId::as_str),
                member.husband_id.as_ref().map(MemberId::as_str),
                member.wife_id.as_ref().map(MemberId::as_str),
            ],
        )
        .map_err(sql_error("save_member"))?;
        Ok(())
    }

    fn upsert_relationship(conn: &Connection, relationship: &Relationship) -> Result<()> {
        conn.execute(
            "INSERT INTO kin_relationships (
                id, family_id, source_member_id, target_member_id, relationship_type,
                sort_order, valid_time_start, valid_time_end, description
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                family_id = excluded.family_id,
                source_member_id = excluded.source_member_id,
                target_member_id = excluded.target_member_id,
                relationship_type = excluded.relationship_type,
                sort_order = excluded.sort_order,
                valid_time_start = excluded.valid_time_start,
                valid_time_end = excluded.valid_time_end,
                description = excluded.description",
            params![
                relationship.id.as_str(),
                relationship.family_id.as_str(),
                relationship.source_member_id.as_str(),
                relationship.target_member_id.as_str(),
                relationship.relationship_type.as_str(),
                relationship.order,
                relationship.valid_time.start,
                relationship.valid_time.end,
                relationship.description,
            ],
        )
        .map_err(sql_error("save_relationship"))?;
        Ok(())
    }

    fn delete_relationship_row(conn: &Connection, id: &RelationshipId) -> Result<bool> {
        let rows = conn
            .execute(
                "DELETE FROM kin_relationships WHERE id = ?1",
                params![id.as_str()],
            )
            .map_err(sql_error("delete_relationship"))?;
        Ok(rows > 0)
    }

    fn query_relationships(
        &self,
        operation: &str,
        where_clause: &str,
        key: &str,
    ) -> Result<Vec<Relationship>> {
        let conn = acquire_lock(&self.conn);
        let sql =
            format!("SELECT {RELATIONSHIP_COLUMNS} FROM kin_relationships {where_clause} ORDER BY id");
        let mut stmt = conn.prepare(&sql).map_err(sql_error(operation))?;
        let rows = stmt
            .query_map(params![key], Self::parse_relationship_row)
            .map_err(sql_error(operation))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sql_error(operation))
    }
}

impl GraphRepository for SqliteGraphRepository {
    #[instrument(skip(self), fields(member_id = %id))]
    fn get_member(&self, id: &MemberId) -> Result<Option<Member>> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            &format!("SELECT {MEMBER_COLUMNS} FROM kin_members WHERE id = ?1"),
            params![id.as_str()],
            Self::parse_member_row,
        )
        .optional()
        .map_err(sql_error("get_member"))
    }

    #[instrument(skip(self), fields(family_id = %family_id))]
    fn get_members_by_family(&self, family_id: &FamilyId) -> Result<Vec<Member>> {
        let conn = acquire_lock(&self.conn);
        let sql =
            format!("SELECT {MEMBER_COLUMNS} FROM kin_members WHERE family_id = ?1 ORDER BY id");
        let mut stmt = conn.prepare(&sql).map_err(sql_error("get_members_by_family"))?;
        let rows = stmt
            .query_map(params![family_id.as_str()], Self::parse_member_row)
            .map_err(sql_error("get_members_by_family"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sql_error("get_members_by_family"))
    }

    #[instrument(skip(self), fields(relationship_id = %id))]
    fn get_relationship(&self, id: &RelationshipId) -> Result<Option<Relationship>> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            &format!("SELECT {RELATIONSHIP_COLUMNS} FROM kin_relationships WHERE id = ?1"),
            params![id.as_str()],
            Self::parse_relationship_row,
        )
        .optional()
        .map_err(sql_error("get_relationship"))
    }

    #[instrument(skip(self), fields(family_id = %family_id))]
    fn get_relationships_by_family(&self, family_id: &FamilyId) -> Result<Vec<Relationship>> {
        self.query_relationships(
            "get_relationships_by_family",
            "WHERE family_id = ?1",
            family_id.as_str(),
        )
    }

    #[instrument(skip(self), fields(member_id = %member_id))]
    fn get_relationships_for_member(&self, member_id: &MemberId) -> Result<Vec<Relationship>> {
        self.query_relationships(
            "get_relationships_for_member",
            "WHERE source_member_id = ?1 OR target_member_id = ?1",
            member_id.as_str(),
        )
    }

    #[instrument(skip(self, member), fields(member_id = %member.id))]
    fn save_member(&self, member: &Member) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        Self::upsert_member(&conn, member)?;
        metrics::counter!("kinship_members_saved_total").increment(1);
        Ok(())
    }

    #[instrument(skip(self, relationship), fields(relationship_id = %relationship.id))]
    fn save_relationship(&self, relationship: &Relationship) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        Self::upsert_relationship(&conn, relationship)?;
        metrics::counter!("kinship_relationships_saved_total").increment(1);
        Ok(())
    }

    #[instrument(skip(self), fields(relationship_id = %id))]
    fn delete_relationship(&self, id: &RelationshipId) -> Result<bool> {
        let conn = acquire_lock(&self.conn);
        Self::delete_relationship_row(&conn, id)
    }

    #[instrument(
        skip(self, changes),
        fields(
            members = changes.members.len(),
            relationships = changes.relationships.len(),
            deletions = changes.deleted_relationships.len()
        )
    )]
    fn apply(&self, changes: &ChangeSet) -> Result<()> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(sql_error("apply_begin_transaction"))?;

        for member in &changes.members {
            Self::upsert_member(&tx, member)?;
        }
        for relationship in &changes.relationships {
            Self::upsert_relationship(&tx, relationship)?;
        }
        for id in &changes.deleted_relationships {
            Self::delete_relationship_row(&tx, id)?;
        }

        tx.commit().map_err(sql_error("apply_commit"))?;
        metrics::counter!("kinship_change_sets_applied_total").increment(1);
        Ok(())
    }
}
