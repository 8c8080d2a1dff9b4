//! SQLite-backed persistence for jobs, delivery targets, and run history.
//!
//! The connection sits behind a mutex so the store can be shared across the
//! tick loop's spawned sweeps; every method locks only for its own duration
//! and never across an await point.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::params;
use statship_core::error::{Result, StatshipError};
use statship_core::types::{Frequency, Instance, Job, ReportType, Sender, WebhookRecipient};

use crate::runlog::{Run, RunScope, RunStatus};

/// SQLite store for all scheduler data.
pub struct SchedulerDb {
    conn: Mutex<rusqlite::Connection>,
}

impl SchedulerDb {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| StatshipError::Database(format!("DB open: {e}")))?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute_batch(
                "
            -- Report jobs (schedule + delivery configuration)
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                sender_id INTEGER,
                instance_id INTEGER NOT NULL,
                website_id TEXT NOT NULL,
                report_type TEXT NOT NULL DEFAULT 'summary',
                summary_items TEXT NOT NULL DEFAULT '[]',   -- JSON array
                report_id TEXT,
                frequency TEXT NOT NULL,                    -- 'daily' | 'weekly' | 'monthly'
                day INTEGER,                                -- weekday 0-6 / day-of-month 1-31
                execution_time TEXT NOT NULL,               -- 'HH:MM:SS', UTC
                email_recipients TEXT NOT NULL DEFAULT '[]',   -- JSON array
                webhook_recipients TEXT NOT NULL DEFAULT '[]', -- JSON array of ids
                timezone TEXT NOT NULL DEFAULT 'Europe/Berlin',
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            -- SMTP accounts
            CREATE TABLE IF NOT EXISTS senders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                smtp_host TEXT NOT NULL,
                smtp_port INTEGER NOT NULL DEFAULT 587,
                username TEXT NOT NULL,
                password TEXT NOT NULL,
                from_address TEXT NOT NULL
            );

            -- Analytics instances
            CREATE TABLE IF NOT EXISTS instances (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                base_url TEXT NOT NULL,
                api_token TEXT NOT NULL
            );

            -- Webhook delivery targets
            CREATE TABLE IF NOT EXISTS webhooks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                kind TEXT NOT NULL
            );

            -- Run history (one row per dispatch attempt)
            CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                status TEXT NOT NULL DEFAULT 'running',
                details TEXT NOT NULL DEFAULT '[]',         -- JSON array of per-channel outcomes
                count_success INTEGER NOT NULL DEFAULT 0,
                count_failed INTEGER NOT NULL DEFAULT 0,
                count_skipped INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (job_id) REFERENCES jobs(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_runs_job_finished ON runs(job_id, finished_at);
         ",
            )
            .map_err(|e| StatshipError::Database(format!("Migration: {e}")))?;
        Ok(())
    }

    // ─── Jobs ──────────────────────────────────────

    /// Save a job. Inserts when `id` is 0, replaces otherwise. Returns the id.
    pub fn save_job(&self, job: &Job) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let summary_items = serde_json::to_string(&job.summary_items).unwrap_or_default();
        let email_recipients = serde_json::to_string(&job.email_recipients).unwrap_or_default();
        let webhook_recipients = serde_json::to_string(&job.webhook_recipients).unwrap_or_default();
        let report_type = match job.report_type {
            ReportType::Summary => "summary",
            ReportType::Report => "report",
        };

        if job.id > 0 {
            conn.execute(
                "INSERT OR REPLACE INTO jobs
                 (id, name, sender_id, instance_id, website_id, report_type, summary_items,
                  report_id, frequency, day, execution_time, email_recipients, webhook_recipients,
                  timezone, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    job.id,
                    job.name,
                    job.sender_id,
                    job.instance_id,
                    job.website_id,
                    report_type,
                    summary_items,
                    job.report_id,
                    job.frequency.as_str(),
                    job.day,
                    job.execution_time.format("%H:%M:%S").to_string(),
                    email_recipients,
                    webhook_recipients,
                    job.timezone,
                    job.is_active as i32,
                    job.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StatshipError::Database(format!("Save job: {e}")))?;
            Ok(job.id)
        } else {
            conn.execute(
                "INSERT INTO jobs
                 (name, sender_id, instance_id, website_id, report_type, summary_items,
                  report_id, frequency, day, execution_time, email_recipients, webhook_recipients,
                  timezone, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    job.name,
                    job.sender_id,
                    job.instance_id,
                    job.website_id,
                    report_type,
                    summary_items,
                    job.report_id,
                    job.frequency.as_str(),
                    job.day,
                    job.execution_time.format("%H:%M:%S").to_string(),
                    email_recipients,
                    webhook_recipients,
                    job.timezone,
                    job.is_active as i32,
                    job.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StatshipError::Database(format!("Save job: {e}")))?;
            Ok(conn.last_insert_rowid())
        }
    }

    /// Load all jobs, newest first.
    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        self.query_jobs("SELECT * FROM jobs ORDER BY created_at DESC", params![])
    }

    /// Load active jobs with the given frequency.
    pub fn list_active_jobs(&self, frequency: Frequency) -> Result<Vec<Job>> {
        self.query_jobs(
            "SELECT * FROM jobs WHERE is_active = 1 AND frequency = ?1 ORDER BY id",
            params![frequency.as_str()],
        )
    }

    /// Load one job.
    pub fn get_job(&self, id: i64) -> Result<Option<Job>> {
        Ok(self
            .query_jobs("SELECT * FROM jobs WHERE id = ?1", params![id])?
            .pop())
    }

    /// Delete a job and its run history.
    pub fn delete_job(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM runs WHERE job_id = ?1", params![id])
            .map_err(|e| StatshipError::Database(format!("Delete runs: {e}")))?;
        conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])
            .map_err(|e| StatshipError::Database(format!("Delete job: {e}")))?;
        Ok(())
    }

    fn query_jobs(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| StatshipError::Database(format!("Query jobs: {e}")))?;
        let rows = stmt
            .query_map(args, |row| {
                let report_type: String = row.get("report_type")?;
                let summary_items: String = row.get("summary_items")?;
                let email_recipients: String = row.get("email_recipients")?;
                let webhook_recipients: String = row.get("webhook_recipients")?;
                let frequency: String = row.get("frequency")?;
                let execution_time: String = row.get("execution_time")?;
                let created_at: String = row.get("created_at")?;

                Ok(Job {
                    id: row.get("id")?,
                    name: row.get("name")?,
                    sender_id: row.get("sender_id")?,
                    instance_id: row.get("instance_id")?,
                    website_id: row.get("website_id")?,
                    report_type: if report_type == "report" {
                        ReportType::Report
                    } else {
                        ReportType::Summary
                    },
                    summary_items: serde_json::from_str(&summary_items).unwrap_or_default(),
                    report_id: row.get("report_id")?,
                    frequency: Frequency::parse(&frequency).unwrap_or(Frequency::Weekly),
                    day: row.get("day")?,
                    execution_time: execution_time
                        .parse()
                        .unwrap_or_else(|_| chrono::NaiveTime::MIN),
                    email_recipients: serde_json::from_str(&email_recipients).unwrap_or_default(),
                    webhook_recipients: serde_json::from_str(&webhook_recipients)
                        .unwrap_or_default(),
                    timezone: row.get("timezone")?,
                    is_active: row.get::<_, i32>("is_active")? != 0,
                    created_at: parse_rfc3339(&created_at),
                })
            })
            .map_err(|e| StatshipError::Database(format!("Query jobs: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ─── Senders / instances / webhooks ──────────────────────────────────────

    pub fn save_sender(&self, sender: &Sender) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        if sender.id > 0 {
            conn.execute(
                "INSERT OR REPLACE INTO senders (id, name, smtp_host, smtp_port, username, password, from_address)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    sender.id,
                    sender.name,
                    sender.smtp_host,
                    sender.smtp_port,
                    sender.username,
                    sender.password,
                    sender.from_address
                ],
            )
            .map_err(|e| StatshipError::Database(format!("Save sender: {e}")))?;
            Ok(sender.id)
        } else {
            conn.execute(
                "INSERT INTO senders (name, smtp_host, smtp_port, username, password, from_address)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    sender.name,
                    sender.smtp_host,
                    sender.smtp_port,
                    sender.username,
                    sender.password,
                    sender.from_address
                ],
            )
            .map_err(|e| StatshipError::Database(format!("Save sender: {e}")))?;
            Ok(conn.last_insert_rowid())
        }
    }

    pub fn get_sender(&self, id: i64) -> Result<Option<Sender>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT * FROM senders WHERE id = ?1")
            .map_err(|e| StatshipError::Database(format!("Query sender: {e}")))?;
        let mut rows = stmt
            .query_map(params![id], |row| {
                Ok(Sender {
                    id: row.get("id")?,
                    name: row.get("name")?,
                    smtp_host: row.get("smtp_host")?,
                    smtp_port: row.get("smtp_port")?,
                    username: row.get("username")?,
                    password: row.get("password")?,
                    from_address: row.get("from_address")?,
                })
            })
            .map_err(|e| StatshipError::Database(format!("Query sender: {e}")))?;
        Ok(rows.next().and_then(|r| r.ok()))
    }

    pub fn save_instance(&self, instance: &Instance) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        if instance.id > 0 {
            conn.execute(
                "INSERT OR REPLACE INTO instances (id, name, base_url, api_token)
                 VALUES (?1, ?2, ?3, ?4)",
                params![instance.id, instance.name, instance.base_url, instance.api_token],
            )
            .map_err(|e| StatshipError::Database(format!("Save instance: {e}")))?;
            Ok(instance.id)
        } else {
            conn.execute(
                "INSERT INTO instances (name, base_url, api_token) VALUES (?1, ?2, ?3)",
                params![instance.name, instance.base_url, instance.api_token],
            )
            .map_err(|e| StatshipError::Database(format!("Save instance: {e}")))?;
            Ok(conn.last_insert_rowid())
        }
    }

    pub fn get_instance(&self, id: i64) -> Result<Option<Instance>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT * FROM instances WHERE id = ?1")
            .map_err(|e| StatshipError::Database(format!("Query instance: {e}")))?;
        let mut rows = stmt
            .query_map(params![id], |row| {
                Ok(Instance {
                    id: row.get("id")?,
                    name: row.get("name")?,
                    base_url: row.get("base_url")?,
                    api_token: row.get("api_token")?,
                })
            })
            .map_err(|e| StatshipError::Database(format!("Query instance: {e}")))?;
        Ok(rows.next().and_then(|r| r.ok()))
    }

    pub fn save_webhook(&self, webhook: &WebhookRecipient) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        if webhook.id > 0 {
            conn.execute(
                "INSERT OR REPLACE INTO webhooks (id, name, url, kind) VALUES (?1, ?2, ?3, ?4)",
                params![webhook.id, webhook.name, webhook.url, webhook.kind],
            )
            .map_err(|e| StatshipError::Database(format!("Save webhook: {e}")))?;
            Ok(webhook.id)
        } else {
            conn.execute(
                "INSERT INTO webhooks (name, url, kind) VALUES (?1, ?2, ?3)",
                params![webhook.name, webhook.url, webhook.kind],
            )
            .map_err(|e| StatshipError::Database(format!("Save webhook: {e}")))?;
            Ok(conn.last_insert_rowid())
        }
    }

    /// Resolve webhook ids to recipients, preserving order. Ids that no
    /// longer exist are silently dropped.
    pub fn list_webhook_recipients(&self, ids: &[i64]) -> Result<Vec<WebhookRecipient>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT * FROM webhooks WHERE id = ?1")
            .map_err(|e| StatshipError::Database(format!("Query webhooks: {e}")))?;
        let mut recipients = Vec::with_capacity(ids.len());
        for id in ids {
            let mut rows = stmt
                .query_map(params![id], |row| {
                    Ok(WebhookRecipient {
                        id: row.get("id")?,
                        name: row.get("name")?,
                        url: row.get("url")?,
                        kind: row.get("kind")?,
                    })
                })
                .map_err(|e| StatshipError::Database(format!("Query webhooks: {e}")))?;
            if let Some(Ok(wh)) = rows.next() {
                recipients.push(wh);
            }
        }
        Ok(recipients)
    }

    // ─── Runs ──────────────────────────────────────

    /// Open a run record for a job. The row is persisted immediately with
    /// status `running` so a crash mid-run still leaves a trace.
    pub fn open_run(&self, job_id: i64, now: DateTime<Utc>) -> Result<RunScope> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO runs (job_id, started_at, status, details) VALUES (?1, ?2, 'running', '[]')",
            params![job_id, now.to_rfc3339()],
        )
        .map_err(|e| StatshipError::Database(format!("Open run: {e}")))?;
        Ok(RunScope::new(Run {
            id: conn.last_insert_rowid(),
            job_id,
            started_at: now,
            finished_at: None,
            status: RunStatus::Running,
            details: vec![],
            count_success: 0,
            count_failed: 0,
            count_skipped: 0,
        }))
    }

    /// Close a run: aggregate its status, stamp the finish time, and persist
    /// details and counters atomically in one update.
    pub fn close_run(&self, scope: RunScope, now: DateTime<Utc>) -> Result<Run> {
        let run = scope.into_closed(now);
        let details = serde_json::to_string(&run.details)
            .map_err(|e| StatshipError::Database(format!("Serialize details: {e}")))?;
        let finished = run.finished_at.map(|t| t.to_rfc3339());
        self.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE runs SET finished_at = ?1, status = ?2, details = ?3,
                 count_success = ?4, count_failed = ?5, count_skipped = ?6
                 WHERE id = ?7",
                params![
                    finished,
                    run.status.as_str(),
                    details,
                    run.count_success,
                    run.count_failed,
                    run.count_skipped,
                    run.id
                ],
            )
            .map_err(|e| StatshipError::Database(format!("Close run: {e}")))?;
        Ok(run)
    }

    /// Runs of a job whose reference instant (finish time, else start time)
    /// falls on the given UTC calendar day.
    pub fn runs_on_day(&self, job_id: i64, day: NaiveDate) -> Result<Vec<Run>> {
        let prefix = format!("{}%", day.format("%Y-%m-%d"));
        self.query_runs(
            "SELECT * FROM runs WHERE job_id = ?1
             AND COALESCE(finished_at, started_at) LIKE ?2 ORDER BY id",
            params![job_id, prefix],
        )
    }

    /// Most recent runs, newest first. `job_id` of None lists across jobs.
    pub fn recent_runs(&self, job_id: Option<i64>, limit: usize) -> Result<Vec<Run>> {
        match job_id {
            Some(id) => self.query_runs(
                "SELECT * FROM runs WHERE job_id = ?1 ORDER BY id DESC LIMIT ?2",
                params![id, limit as i64],
            ),
            None => self.query_runs(
                "SELECT * FROM runs ORDER BY id DESC LIMIT ?1",
                params![limit as i64],
            ),
        }
    }

    fn query_runs(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Run>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| StatshipError::Database(format!("Query runs: {e}")))?;
        let rows = stmt
            .query_map(args, |row| {
                let started_at: String = row.get("started_at")?;
                let finished_at: Option<String> = row.get("finished_at")?;
                let status: String = row.get("status")?;
                let details: String = row.get("details")?;
                Ok(Run {
                    id: row.get("id")?,
                    job_id: row.get("job_id")?,
                    started_at: parse_rfc3339(&started_at),
                    finished_at: finished_at.as_deref().map(parse_rfc3339),
                    status: RunStatus::parse(&status),
                    details: serde_json::from_str(&details).unwrap_or_default(),
                    count_success: row.get("count_success")?,
                    count_failed: row.get("count_failed")?,
                    count_skipped: row.get("count_skipped")?,
                })
            })
            .map_err(|e| StatshipError::Database(format!("Query runs: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runlog::DetailStatus;
    use chrono::{NaiveTime, TimeZone};
    use statship_core::types::ReportType;

    fn test_db(name: &str) -> (SchedulerDb, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("statship-store-{name}"));
        std::fs::create_dir_all(&dir).ok();
        let db = SchedulerDb::open(&dir.join("test.db")).unwrap();
        (db, dir)
    }

    fn sample_job() -> Job {
        Job {
            id: 0,
            name: "Weekly traffic".into(),
            sender_id: Some(1),
            instance_id: 1,
            website_id: "site-1".into(),
            report_type: ReportType::Summary,
            summary_items: vec!["pageviews".into()],
            report_id: None,
            frequency: Frequency::Weekly,
            day: Some(2),
            execution_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            email_recipients: vec!["ops@example.com".into()],
            webhook_recipients: vec![1, 2],
            timezone: "Europe/Berlin".into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_save_and_load_job() {
        let (db, dir) = test_db("job");
        let id = db.save_job(&sample_job()).unwrap();
        assert!(id > 0);

        let loaded = db.get_job(id).unwrap().unwrap();
        assert_eq!(loaded.name, "Weekly traffic");
        assert_eq!(loaded.frequency, Frequency::Weekly);
        assert_eq!(loaded.day, Some(2));
        assert_eq!(loaded.execution_time, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(loaded.webhook_recipients, vec![1, 2]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_list_active_jobs_filters() {
        let (db, dir) = test_db("active");
        let mut inactive = sample_job();
        inactive.is_active = false;
        db.save_job(&inactive).unwrap();
        db.save_job(&sample_job()).unwrap();
        let mut daily = sample_job();
        daily.frequency = Frequency::Daily;
        db.save_job(&daily).unwrap();

        assert_eq!(db.list_active_jobs(Frequency::Weekly).unwrap().len(), 1);
        assert_eq!(db.list_active_jobs(Frequency::Daily).unwrap().len(), 1);
        assert_eq!(db.list_jobs().unwrap().len(), 3);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_webhook_resolution_drops_missing_ids() {
        let (db, dir) = test_db("webhooks");
        let id = db
            .save_webhook(&WebhookRecipient {
                id: 0,
                name: "ops".into(),
                url: "https://hooks.example.com/x".into(),
                kind: "DISCORD".into(),
            })
            .unwrap();

        let resolved = db.list_webhook_recipients(&[id, 999]).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].kind, "DISCORD");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_run_lifecycle_round_trip() {
        let (db, dir) = test_db("runs");
        let job_id = db.save_job(&sample_job()).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 8, 0, 5).unwrap();

        let mut scope = db.open_run(job_id, now).unwrap();
        scope.append("EMAIL", Some(1), DetailStatus::Success, None);
        scope.append("DISCORD", Some(2), DetailStatus::Failed, Some("410".into()));
        let run = db.close_run(scope, now + chrono::Duration::seconds(3)).unwrap();
        assert_eq!(run.status, RunStatus::Warning);

        let same_day = db.runs_on_day(job_id, now.date_naive()).unwrap();
        assert_eq!(same_day.len(), 1);
        assert_eq!(same_day[0].details.len(), 2);
        assert_eq!(same_day[0].count_success, 1);
        assert_eq!(same_day[0].count_failed, 1);

        let other_day = db
            .runs_on_day(job_id, now.date_naive() + chrono::Duration::days(1))
            .unwrap();
        assert!(other_day.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_open_run_counts_for_its_day_via_started_at() {
        let (db, dir) = test_db("open-run");
        let job_id = db.save_job(&sample_job()).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 8, 0, 5).unwrap();
        db.open_run(job_id, now).unwrap();

        // Unclosed run: started_at is the reference instant.
        let same_day = db.runs_on_day(job_id, now.date_naive()).unwrap();
        assert_eq!(same_day.len(), 1);
        assert_eq!(same_day[0].status, RunStatus::Running);
        assert!(same_day[0].details.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }
}
