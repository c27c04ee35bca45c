//! Content gateway over SQLite
//!
//! Users and bug reports live here; blogs, CTFs, writeups and the
//! leaderboard are in `content`. Reads by id return `Ok(None)` for missing
//! rows, every other failure is a `GatewayError`.

use std::path::Path;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{GatewayError, GatewayResult, OptionalRow, NO_ROWS};
use crate::models::{
    AccountStatus, Category, NewReport, Report, ReportUpdate, Role, Severity, Status, UserProfile,
    UserUpdate,
};

const MIGRATIONS: &[(i64, &str, &str)] = &[
    (1, "001_schema", include_str!("../migrations/001_schema.sql")),
    (
        2,
        "002_hall_of_fame",
        include_str!("../migrations/002_hall_of_fame.sql"),
    ),
];

pub struct CatalogStore {
    conn: Mutex<Connection>,
}

/// Profile plus the secrets needed to check a password
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub profile: UserProfile,
    pub password_hash: String,
    pub salt: String,
}

impl CatalogStore {
    pub fn new(path: impl AsRef<Path>) -> GatewayResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> GatewayResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> GatewayResult<()> {
        let conn = self.conn();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )?;

        for (version, name, sql) in MIGRATIONS {
            let applied: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = ?1)",
                params![version],
                |row| row.get(0),
            )?;
            if applied {
                continue;
            }

            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, now()],
            )?;
            info!("Applied migration {}", name);
        }
        Ok(())
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    // ========================================================================
    // USERS
    // ========================================================================

    /// Insert a user and their leaderboard row
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        salt: &str,
        role: Role,
    ) -> GatewayResult<UserProfile> {
        let id = Uuid::new_v4().to_string();
        let avatar = format!(
            "https://api.dicebear.com/7.x/avataaars/svg?seed={}",
            urlencoding::encode(username)
        );
        let created = now();

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO users (id, username, email, password_hash, salt, role, avatar, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![id, username, email, password_hash, salt, role.to_string(), avatar, created],
        )?;
        tx.execute(
            "INSERT INTO leaderboard (user_id, updated_at) VALUES (?1, ?2)",
            params![id, created],
        )?;
        tx.commit()?;
        drop(conn);

        info!("Created {} account {}", role, username);
        self.user_by_id(&id)?
            .ok_or_else(|| GatewayError::new(NO_ROWS, "user vanished after insert"))
    }

    pub fn user_by_id(&self, id: &str) -> GatewayResult<Option<UserProfile>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id],
            user_from_row,
        )
        .map_err(GatewayError::from)
        .optional_row()
    }

    pub fn user_by_email(&self, email: &str) -> GatewayResult<Option<UserProfile>> {
        Ok(self.credentials_by_email(email)?.map(|c| c.profile))
    }

    pub fn credentials_by_email(&self, email: &str) -> GatewayResult<Option<StoredCredentials>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {}, password_hash, salt FROM users WHERE email = ?1",
                USER_COLUMNS
            ),
            params![email],
            |row| {
                Ok(StoredCredentials {
                    profile: user_from_row(row)?,
                    password_hash: row.get(8)?,
                    salt: row.get(9)?,
                })
            },
        )
        .map_err(GatewayError::from)
        .optional_row()
    }

    pub fn username_exists(&self, username: &str) -> GatewayResult<bool> {
        let conn = self.conn();
        let exists = conn
            .query_row(
                "SELECT 1 FROM users WHERE username = ?1",
                params![username],
                |_| Ok(()),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    pub fn set_user_status(&self, id: &str, status: AccountStatus) -> GatewayResult<()> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE users SET status = ?2 WHERE id = ?1",
            params![id, status.to_string()],
        )?;
        if changed == 0 {
            return Err(GatewayError::new(NO_ROWS, format!("no user {}", id)));
        }
        Ok(())
    }

    /// Apply the set profile fields; a taken username or email is a constraint error
    pub fn update_user(&self, id: &str, update: UserUpdate) -> GatewayResult<UserProfile> {
        {
            let conn = self.conn();
            let changed = conn.execute(
                "UPDATE users SET
                    username = COALESCE(?2, username),
                    email = COALESCE(?3, email),
                    avatar = COALESCE(?4, avatar),
                    bio = COALESCE(?5, bio)
                 WHERE id = ?1",
                params![id, update.username, update.email, update.avatar, update.bio],
            )?;
            if changed == 0 {
                return Err(GatewayError::new(NO_ROWS, format!("no user {}", id)));
            }
        }

        self.user_by_id(id)?
            .ok_or_else(|| GatewayError::new(NO_ROWS, format!("no user {}", id)))
    }

    // ========================================================================
    // REPORTS
    // ========================================================================

    /// Approved reports, newest first
    pub fn list_approved(&self) -> GatewayResult<Vec<Report>> {
        self.query_reports("WHERE status = 'approved'", params![])
    }

    /// Every report regardless of status (admin view)
    pub fn list_all_reports(&self) -> GatewayResult<Vec<Report>> {
        self.query_reports("", params![])
    }

    pub fn report_by_id(&self, id: &str) -> GatewayResult<Option<Report>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {} FROM reports WHERE id = ?1", REPORT_COLUMNS),
            params![id],
            report_from_row,
        )
        .map_err(GatewayError::from)
        .optional_row()
    }

    /// Submit a report; it starts pending and dated today
    pub fn create_report(&self, new: NewReport) -> GatewayResult<Report> {
        let report = Report {
            id: Uuid::new_v4().to_string(),
            reporter_id: new.reporter_id,
            reporter_name: None,
            title: new.title,
            severity: new.severity,
            status: Status::Pending,
            description: new.description,
            summary: new.summary,
            category: new.category,
            organization: new.organization,
            year: new.year,
            submitted_date: Utc::now().date_naive(),
            cve_id: new.cve_id,
            program: new.program,
            bounty: new.bounty,
            steps_to_reproduce: new.steps_to_reproduce,
            impact_analysis: new.impact_analysis,
            proof_of_concept: new.proof_of_concept,
            tags: new.tags,
        };
        self.insert_report(&report)?;
        Ok(report)
    }

    /// Insert a fully formed report, replacing any row with the same id
    pub fn insert_report(&self, report: &Report) -> GatewayResult<()> {
        let conn = self.conn();
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO reports ({}, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
                REPORT_COLUMNS
            ),
            params![
                report.id,
                report.reporter_id,
                report.reporter_name,
                report.title,
                report.severity.to_string(),
                report.status.to_string(),
                report.description,
                report.summary,
                report.category.to_string(),
                report.organization,
                report.year,
                report.submitted_date.to_string(),
                report.cve_id,
                report.program,
                report.bounty,
                serde_json::to_string(&report.steps_to_reproduce)?,
                report.impact_analysis,
                report.proof_of_concept,
                serde_json::to_string(&report.tags)?,
                now(),
            ],
        )?;
        debug!("Stored report {}", report.id);
        Ok(())
    }

    /// Apply the set fields of `update`; a missing id is a no-rows error
    pub fn update_report(&self, id: &str, update: ReportUpdate) -> GatewayResult<Report> {
        let tags = update.tags.as_ref().map(serde_json::to_string).transpose()?;
        {
            let conn = self.conn();
            let changed = conn.execute(
                "UPDATE reports SET
                    title = COALESCE(?2, title),
                    severity = COALESCE(?3, severity),
                    status = COALESCE(?4, status),
                    description = COALESCE(?5, description),
                    summary = COALESCE(?6, summary),
                    category = COALESCE(?7, category),
                    organization = COALESCE(?8, organization),
                    year = COALESCE(?9, year),
                    cve_id = COALESCE(?10, cve_id),
                    tags = COALESCE(?11, tags)
                 WHERE id = ?1",
                params![
                    id,
                    update.title,
                    update.severity.map(|s| s.to_string()),
                    update.status.map(|s| s.to_string()),
                    update.description,
                    update.summary,
                    update.category.map(|c| c.to_string()),
                    update.organization,
                    update.year,
                    update.cve_id,
                    tags,
                ],
            )?;
            if changed == 0 {
                return Err(GatewayError::new(NO_ROWS, format!("no report {}", id)));
            }
        }

        self.report_by_id(id)?
            .ok_or_else(|| GatewayError::new(NO_ROWS, format!("no report {}", id)))
    }

    pub fn set_report_status(&self, id: &str, status: Status) -> GatewayResult<Report> {
        info!("Setting report {} to {}", id, status);
        self.update_report(
            id,
            ReportUpdate {
                status: Some(status),
                ..Default::default()
            },
        )
    }

    /// Returns whether a row was removed
    pub fn delete_report(&self, id: &str) -> GatewayResult<bool> {
        let conn = self.conn();
        let removed = conn.execute("DELETE FROM reports WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    pub fn reports_by_category(&self, category: Category) -> GatewayResult<Vec<Report>> {
        self.query_reports(
            "WHERE status = 'approved' AND category = ?1",
            params![category.to_string()],
        )
    }

    pub fn reports_by_year(&self, year: i32) -> GatewayResult<Vec<Report>> {
        self.query_reports("WHERE status = 'approved' AND year = ?1", params![year])
    }

    pub fn reports_by_organization(&self, organization: &str) -> GatewayResult<Vec<Report>> {
        self.query_reports(
            "WHERE status = 'approved' AND organization = ?1",
            params![organization],
        )
    }

    pub fn reports_by_severity(&self, severity: Severity) -> GatewayResult<Vec<Report>> {
        self.query_reports(
            "WHERE status = 'approved' AND severity = ?1",
            params![severity.to_string()],
        )
    }

    /// Approved reports whose title, description, summary or CVE id contains `query`
    pub fn search_reports(&self, query: &str) -> GatewayResult<Vec<Report>> {
        self.query_reports(
            "WHERE status = 'approved' AND (
                title LIKE '%' || ?1 || '%'
                OR description LIKE '%' || ?1 || '%'
                OR summary LIKE '%' || ?1 || '%'
                OR cve_id LIKE '%' || ?1 || '%')",
            params![query],
        )
    }

    /// A reporter's own submissions, any status
    pub fn reports_by_reporter(&self, reporter_id: &str) -> GatewayResult<Vec<Report>> {
        self.query_reports("WHERE reporter_id = ?1", params![reporter_id])
    }

    fn query_reports(
        &self,
        clause: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> GatewayResult<Vec<Report>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM reports {} ORDER BY created_at DESC, rowid DESC",
            REPORT_COLUMNS, clause
        ))?;
        let reports = stmt
            .query_map(params, report_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reports)
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

const USER_COLUMNS: &str = "id, username, email, role, avatar, bio, xp, status";

const REPORT_COLUMNS: &str = "id, reporter_id, reporter_name, title, severity, status, \
    description, summary, category, organization, year, submitted_date, cve_id, program, \
    bounty, steps_to_reproduce, impact_analysis, proof_of_concept, tags";

pub(crate) fn now() -> String {
    Utc::now().to_rfc3339()
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Text column parsed through `FromStr`
pub(crate) fn parsed<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

/// JSON array column; NULL reads as empty
pub(crate) fn string_list(row: &Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(json) => serde_json::from_str(&json).map_err(|e| conversion_error(idx, e)),
        None => Ok(Vec::new()),
    }
}

pub(crate) fn date(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    parsed(row, idx)
}

fn user_from_row(row: &Row) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        role: parsed(row, 3)?,
        avatar: row.get(4)?,
        bio: row.get(5)?,
        xp: row.get(6)?,
        status: parsed(row, 7)?,
    })
}

fn report_from_row(row: &Row) -> rusqlite::Result<Report> {
    Ok(Report {
        id: row.get(0)?,
        reporter_id: row.get(1)?,
        reporter_name: row.get(2)?,
        title: row.get(3)?,
        severity: parsed(row, 4)?,
        status: parsed(row, 5)?,
        description: row.get(6)?,
        summary: row.get(7)?,
        category: parsed(row, 8)?,
        organization: row.get(9)?,
        year: row.get(10)?,
        submitted_date: date(row, 11)?,
        cve_id: row.get(12)?,
        program: row.get(13)?,
        bounty: row.get(14)?,
        steps_to_reproduce: string_list(row, 15)?,
        impact_analysis: row.get(16)?,
        proof_of_concept: row.get(17)?,
        tags: string_list(row, 18)?,
    })
}
