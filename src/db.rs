// src/db.rs
//! SQLite persistence for postings, resumes, analyses, applications and
//! search sessions.
//!
//! List-valued fields are stored as JSON text columns and decoded on read.
//! All writes that establish identity rely on SQL uniqueness constraints
//! rather than read-then-write checks.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::{
    Analysis, AnalysisOutcome, Application, ApplicationStatus, ContactInfo, EducationEntry,
    ExperienceEntry, JobPosting, RawPosting, ResumeRecord, SearchSession,
};
use crate::resume::ParsedResume;

/// Ordering for posting list views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostingSort {
    /// Best score first, unanalyzed postings last.
    #[default]
    Score,
    /// Most recently discovered first.
    Discovered,
}

#[derive(Debug, Clone, Default)]
pub struct DashboardStats {
    pub total_postings: i64,
    pub analyzed_postings: i64,
    pub recommended: i64,
    pub applications_pending: i64,
    pub applications_submitted: i64,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file and run migrations.
    pub async fn new(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let url = format!("sqlite:{}?mode=rwc", database_path.display());
        let pool = SqlitePool::connect(&url)
            .await
            .with_context(|| format!("Failed to open database: {}", database_path.display()))?;

        let db = Self { pool };
        db.migrate().await?;
        info!("Database ready at {}", database_path.display());
        Ok(db)
    }

    /// In-memory database for tests. A single connection keeps every query
    /// on the same memory store.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_postings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                fingerprint TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                location TEXT NOT NULL,
                description TEXT NOT NULL,
                salary TEXT,
                url TEXT NOT NULL,
                source TEXT NOT NULL,
                discovered_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create job_postings table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS resumes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                file_path TEXT NOT NULL,
                contact_json TEXT NOT NULL,
                skills_json TEXT NOT NULL,
                experience_json TEXT NOT NULL,
                education_json TEXT NOT NULL,
                summary TEXT,
                uploaded_at TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create resumes table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analyses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                posting_id INTEGER NOT NULL REFERENCES job_postings(id),
                resume_id INTEGER NOT NULL REFERENCES resumes(id),
                score INTEGER NOT NULL,
                reasons_json TEXT NOT NULL,
                skill_gaps_json TEXT NOT NULL,
                recommend INTEGER NOT NULL,
                cover_letter_hint TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(posting_id, resume_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create analyses table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                posting_id INTEGER NOT NULL UNIQUE REFERENCES job_postings(id),
                analysis_id INTEGER NOT NULL REFERENCES analyses(id),
                status TEXT NOT NULL,
                cover_letter TEXT,
                submitted_at TEXT,
                error_detail TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create applications table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS search_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                keywords_json TEXT NOT NULL,
                locations_json TEXT NOT NULL,
                max_postings INTEGER NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                postings_found INTEGER NOT NULL DEFAULT 0,
                postings_new INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create search_sessions table")?;

        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_analyses_posting ON analyses(posting_id)",
            "CREATE INDEX IF NOT EXISTS idx_analyses_score ON analyses(score)",
            "CREATE INDEX IF NOT EXISTS idx_applications_status ON applications(status)",
        ] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to create index")?;
        }

        debug!("Database migrations applied");
        Ok(())
    }

    // ----- job postings -----

    /// Insert a posting under its fingerprint. Returns the new row id, or
    /// `None` when the fingerprint is already present.
    pub async fn insert_posting(
        &self,
        fingerprint: &str,
        posting: &RawPosting,
    ) -> Result<Option<i64>> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO job_postings
                (fingerprint, title, company, location, description, salary, url, source, discovered_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(fingerprint)
        .bind(&posting.title)
        .bind(&posting.company)
        .bind(&posting.location)
        .bind(&posting.description)
        .bind(&posting.salary)
        .bind(&posting.url)
        .bind(&posting.source)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to insert job posting")?;

        if result.rows_affected() == 0 {
            Ok(None)
        } else {
            Ok(Some(result.last_insert_rowid()))
        }
    }

    pub async fn posting_fingerprints(&self) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT fingerprint FROM job_postings")
            .fetch_all(&self.pool)
            .await
            .context("Failed to load posting fingerprints")?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("fingerprint").map_err(Into::into))
            .collect()
    }

    pub async fn get_posting(&self, id: i64) -> Result<Option<JobPosting>> {
        let row = sqlx::query("SELECT * FROM job_postings WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load job posting")?;
        row.map(|r| row_to_posting(&r)).transpose()
    }

    /// Postings joined to their analysis against the active resume.
    /// `min_score` keeps only postings whose analysis meets the bound, which
    /// also hides postings with no analysis yet; `sort` picks score or
    /// discovery ordering.
    pub async fn list_postings(
        &self,
        min_score: Option<i64>,
        sort: PostingSort,
    ) -> Result<Vec<(JobPosting, Option<Analysis>)>> {
        let order_by = match sort {
            PostingSort::Score => "a.score IS NULL, a.score DESC, p.discovered_at DESC",
            PostingSort::Discovered => "p.discovered_at DESC, p.id DESC",
        };
        let query = format!(
            r#"
            SELECT p.*,
                   a.id AS a_id, a.posting_id AS a_posting_id, a.resume_id AS a_resume_id,
                   a.score AS a_score, a.reasons_json AS a_reasons_json,
                   a.skill_gaps_json AS a_skill_gaps_json, a.recommend AS a_recommend,
                   a.cover_letter_hint AS a_cover_letter_hint, a.created_at AS a_created_at
            FROM job_postings p
            LEFT JOIN analyses a
                ON a.posting_id = p.id
               AND a.resume_id = (SELECT id FROM resumes WHERE is_active = 1 LIMIT 1)
            WHERE (? IS NULL OR a.score >= ?)
            ORDER BY {}
            "#,
            order_by
        );
        let rows = sqlx::query(&query)
            .bind(min_score)
            .bind(min_score)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list job postings")?;

        rows.iter()
            .map(|row| {
                let posting = row_to_posting(row)?;
                let analysis = match row.try_get::<Option<i64>, _>("a_id")? {
                    Some(_) => Some(row_to_analysis_prefixed(row)?),
                    None => None,
                };
                Ok((posting, analysis))
            })
            .collect()
    }

    /// Postings not yet analyzed against the given resume.
    pub async fn unanalyzed_postings(&self, resume_id: i64) -> Result<Vec<JobPosting>> {
        let rows = sqlx::query(
            r#"
            SELECT p.* FROM job_postings p
            WHERE NOT EXISTS (
                SELECT 1 FROM analyses a WHERE a.posting_id = p.id AND a.resume_id = ?
            )
            ORDER BY p.discovered_at ASC
            "#,
        )
        .bind(resume_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list unanalyzed postings")?;
        rows.iter().map(row_to_posting).collect()
    }

    // ----- analyses -----

    /// Store an analysis for a (posting, resume) pair. An existing analysis
    /// for the pair wins; its id is returned unchanged.
    pub async fn insert_analysis(
        &self,
        posting_id: i64,
        resume_id: i64,
        outcome: &AnalysisOutcome,
    ) -> Result<i64> {
        sqlx::query(
            r#"
            INSERT INTO analyses
                (posting_id, resume_id, score, reasons_json, skill_gaps_json,
                 recommend, cover_letter_hint, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(posting_id, resume_id) DO NOTHING
            "#,
        )
        .bind(posting_id)
        .bind(resume_id)
        .bind(outcome.score)
        .bind(serde_json::to_string(&outcome.reasons)?)
        .bind(serde_json::to_string(&outcome.skill_gaps)?)
        .bind(outcome.recommend)
        .bind(&outcome.cover_letter_hint)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to insert analysis")?;

        let row = sqlx::query("SELECT id FROM analyses WHERE posting_id = ? AND resume_id = ?")
            .bind(posting_id)
            .bind(resume_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to load analysis id")?;
        Ok(row.try_get("id")?)
    }

    pub async fn analysis_for(
        &self,
        posting_id: i64,
        resume_id: i64,
    ) -> Result<Option<Analysis>> {
        let row = sqlx::query("SELECT * FROM analyses WHERE posting_id = ? AND resume_id = ?")
            .bind(posting_id)
            .bind(resume_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load analysis")?;
        row.map(|r| row_to_analysis(&r)).transpose()
    }

    // ----- resumes -----

    /// Store a newly parsed resume as the active one. Any prior resume rows
    /// are deactivated but kept, so applications created against their
    /// analyses stay intact.
    pub async fn insert_resume(
        &self,
        filename: &str,
        file_path: &Path,
        parsed: &ParsedResume,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;

        sqlx::query("UPDATE resumes SET is_active = 0 WHERE is_active = 1")
            .execute(&mut *tx)
            .await
            .context("Failed to deactivate previous resume")?;

        let result = sqlx::query(
            r#"
            INSERT INTO resumes
                (filename, file_path, contact_json, skills_json, experience_json,
                 education_json, summary, uploaded_at, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1)
            "#,
        )
        .bind(filename)
        .bind(file_path.display().to_string())
        .bind(serde_json::to_string(&parsed.contact)?)
        .bind(serde_json::to_string(&parsed.skills)?)
        .bind(serde_json::to_string(&parsed.experience)?)
        .bind(serde_json::to_string(&parsed.education)?)
        .bind(&parsed.summary)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .context("Failed to insert resume")?;

        tx.commit().await.context("Failed to commit resume insert")?;
        info!("Stored resume '{}' as active", filename);
        Ok(result.last_insert_rowid())
    }

    pub async fn active_resume(&self) -> Result<Option<ResumeRecord>> {
        let row = sqlx::query("SELECT * FROM resumes WHERE is_active = 1 LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load active resume")?;
        row.map(|r| row_to_resume(&r)).transpose()
    }

    // ----- applications -----

    /// Create a pending application for a posting. At most one application
    /// exists per posting; a second attempt returns `None`.
    pub async fn create_application(
        &self,
        posting_id: i64,
        analysis_id: i64,
        cover_letter: Option<&str>,
    ) -> Result<Option<i64>> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO applications
                (posting_id, analysis_id, status, cover_letter, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(posting_id)
        .bind(analysis_id)
        .bind(ApplicationStatus::PendingReview.as_str())
        .bind(cover_letter)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create application")?;

        if result.rows_affected() == 0 {
            Ok(None)
        } else {
            Ok(Some(result.last_insert_rowid()))
        }
    }

    pub async fn application_for_posting(&self, posting_id: i64) -> Result<Option<Application>> {
        let row = sqlx::query("SELECT * FROM applications WHERE posting_id = ?")
            .bind(posting_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load application for posting")?;
        row.map(|r| row_to_application(&r)).transpose()
    }

    pub async fn get_application(&self, id: i64) -> Result<Option<Application>> {
        let row = sqlx::query("SELECT * FROM applications WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load application")?;
        row.map(|r| row_to_application(&r)).transpose()
    }

    /// Applications with their postings, newest first, optionally filtered
    /// by status.
    pub async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<(Application, JobPosting)>> {
        let status_str = status.map(|s| s.as_str());
        let rows = sqlx::query(
            r#"
            SELECT app.*,
                   p.id AS p_id, p.fingerprint AS p_fingerprint, p.title AS p_title,
                   p.company AS p_company, p.location AS p_location,
                   p.description AS p_description, p.salary AS p_salary,
                   p.url AS p_url, p.source AS p_source, p.discovered_at AS p_discovered_at
            FROM applications app
            JOIN job_postings p ON p.id = app.posting_id
            WHERE (? IS NULL OR app.status = ?)
            ORDER BY app.created_at DESC
            "#,
        )
        .bind(status_str)
        .bind(status_str)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list applications")?;

        rows.iter()
            .map(|row| Ok((row_to_application(row)?, row_to_posting_prefixed(row)?)))
            .collect()
    }

    /// Move an application to a new status. Terminal applications never
    /// transition again; attempting to is an error.
    pub async fn set_application_status(
        &self,
        id: i64,
        status: ApplicationStatus,
        error_detail: Option<&str>,
    ) -> Result<()> {
        let current = self
            .get_application(id)
            .await?
            .with_context(|| format!("No application with id {}", id))?;

        if current.status.is_terminal() {
            anyhow::bail!(
                "Application {} is already {} and cannot change status",
                id,
                current.status
            );
        }

        let submitted_at = if status == ApplicationStatus::Submitted {
            Some(Utc::now())
        } else {
            current.submitted_at
        };

        sqlx::query(
            r#"
            UPDATE applications
            SET status = ?, error_detail = ?, submitted_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(error_detail)
        .bind(submitted_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update application status")?;
        Ok(())
    }

    pub async fn set_application_cover_letter(&self, id: i64, cover_letter: &str) -> Result<()> {
        sqlx::query("UPDATE applications SET cover_letter = ?, updated_at = ? WHERE id = ?")
            .bind(cover_letter)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to store cover letter")?;
        Ok(())
    }

    // ----- search sessions -----

    pub async fn open_session(
        &self,
        keywords: &[String],
        locations: &[String],
        max_postings: i64,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO search_sessions (keywords_json, locations_json, max_postings, started_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(serde_json::to_string(keywords)?)
        .bind(serde_json::to_string(locations)?)
        .bind(max_postings)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to open search session")?;
        Ok(result.last_insert_rowid())
    }

    pub async fn close_session(&self, id: i64, found: i64, new: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE search_sessions
            SET completed_at = ?, postings_found = ?, postings_new = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(found)
        .bind(new)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to close search session")?;
        Ok(())
    }

    pub async fn recent_sessions(&self, limit: i64) -> Result<Vec<SearchSession>> {
        let rows = sqlx::query("SELECT * FROM search_sessions ORDER BY started_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list search sessions")?;
        rows.iter().map(row_to_session).collect()
    }

    // ----- dashboard -----

    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM job_postings) AS total_postings,
                (SELECT COUNT(DISTINCT posting_id) FROM analyses) AS analyzed_postings,
                (SELECT COUNT(*) FROM analyses WHERE recommend = 1) AS recommended,
                (SELECT COUNT(*) FROM applications WHERE status IN ('pending_review', 'approved'))
                    AS applications_pending,
                (SELECT COUNT(*) FROM applications WHERE status = 'submitted')
                    AS applications_submitted
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute dashboard stats")?;

        Ok(DashboardStats {
            total_postings: row.try_get("total_postings")?,
            analyzed_postings: row.try_get("analyzed_postings")?,
            recommended: row.try_get("recommended")?,
            applications_pending: row.try_get("applications_pending")?,
            applications_submitted: row.try_get("applications_submitted")?,
        })
    }

    /// Delete all rows from every table. Used by the `clear-db` command.
    pub async fn clear(&self) -> Result<()> {
        for table in [
            "applications",
            "analyses",
            "search_sessions",
            "job_postings",
            "resumes",
        ] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to clear table {}", table))?;
        }
        info!("Cleared all database tables");
        Ok(())
    }
}

fn row_to_posting(row: &SqliteRow) -> Result<JobPosting> {
    Ok(JobPosting {
        id: row.try_get("id")?,
        fingerprint: row.try_get("fingerprint")?,
        title: row.try_get("title")?,
        company: row.try_get("company")?,
        location: row.try_get("location")?,
        description: row.try_get("description")?,
        salary: row.try_get("salary")?,
        url: row.try_get("url")?,
        source: row.try_get("source")?,
        discovered_at: row.try_get("discovered_at")?,
    })
}

fn row_to_posting_prefixed(row: &SqliteRow) -> Result<JobPosting> {
    Ok(JobPosting {
        id: row.try_get("p_id")?,
        fingerprint: row.try_get("p_fingerprint")?,
        title: row.try_get("p_title")?,
        company: row.try_get("p_company")?,
        location: row.try_get("p_location")?,
        description: row.try_get("p_description")?,
        salary: row.try_get("p_salary")?,
        url: row.try_get("p_url")?,
        source: row.try_get("p_source")?,
        discovered_at: row.try_get("p_discovered_at")?,
    })
}

fn row_to_analysis(row: &SqliteRow) -> Result<Analysis> {
    let reasons: Vec<String> = serde_json::from_str(&row.try_get::<String, _>("reasons_json")?)
        .context("Corrupt reasons_json column")?;
    let skill_gaps: Vec<String> =
        serde_json::from_str(&row.try_get::<String, _>("skill_gaps_json")?)
            .context("Corrupt skill_gaps_json column")?;
    Ok(Analysis {
        id: row.try_get("id")?,
        posting_id: row.try_get("posting_id")?,
        resume_id: row.try_get("resume_id")?,
        score: row.try_get("score")?,
        reasons,
        skill_gaps,
        recommend: row.try_get("recommend")?,
        cover_letter_hint: row.try_get("cover_letter_hint")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_analysis_prefixed(row: &SqliteRow) -> Result<Analysis> {
    let reasons: Vec<String> = serde_json::from_str(&row.try_get::<String, _>("a_reasons_json")?)
        .context("Corrupt reasons_json column")?;
    let skill_gaps: Vec<String> =
        serde_json::from_str(&row.try_get::<String, _>("a_skill_gaps_json")?)
            .context("Corrupt skill_gaps_json column")?;
    Ok(Analysis {
        id: row.try_get("a_id")?,
        posting_id: row.try_get("a_posting_id")?,
        resume_id: row.try_get("a_resume_id")?,
        score: row.try_get("a_score")?,
        reasons,
        skill_gaps,
        recommend: row.try_get("a_recommend")?,
        cover_letter_hint: row.try_get("a_cover_letter_hint")?,
        created_at: row.try_get("a_created_at")?,
    })
}

fn row_to_resume(row: &SqliteRow) -> Result<ResumeRecord> {
    let contact: ContactInfo = serde_json::from_str(&row.try_get::<String, _>("contact_json")?)
        .context("Corrupt contact_json column")?;
    let skills: Vec<String> = serde_json::from_str(&row.try_get::<String, _>("skills_json")?)
        .context("Corrupt skills_json column")?;
    let experience: Vec<ExperienceEntry> =
        serde_json::from_str(&row.try_get::<String, _>("experience_json")?)
            .context("Corrupt experience_json column")?;
    let education: Vec<EducationEntry> =
        serde_json::from_str(&row.try_get::<String, _>("education_json")?)
            .context("Corrupt education_json column")?;
    Ok(ResumeRecord {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        file_path: PathBuf::from(row.try_get::<String, _>("file_path")?),
        contact,
        skills,
        experience,
        education,
        summary: row.try_get("summary")?,
        uploaded_at: row.try_get("uploaded_at")?,
        is_active: row.try_get("is_active")?,
    })
}

fn row_to_application(row: &SqliteRow) -> Result<Application> {
    let status_str: String = row.try_get("status")?;
    let status = ApplicationStatus::parse(&status_str)
        .with_context(|| format!("Unknown application status '{}'", status_str))?;
    Ok(Application {
        id: row.try_get("id")?,
        posting_id: row.try_get("posting_id")?,
        analysis_id: row.try_get("analysis_id")?,
        status,
        cover_letter: row.try_get("cover_letter")?,
        submitted_at: row.try_get("submitted_at")?,
        error_detail: row.try_get("error_detail")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_session(row: &SqliteRow) -> Result<SearchSession> {
    let keywords: Vec<String> = serde_json::from_str(&row.try_get::<String, _>("keywords_json")?)
        .context("Corrupt keywords_json column")?;
    let locations: Vec<String> =
        serde_json::from_str(&row.try_get::<String, _>("locations_json")?)
            .context("Corrupt locations_json column")?;
    Ok(SearchSession {
        id: row.try_get("id")?,
        keywords,
        locations,
        max_postings: row.try_get("max_postings")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        postings_found: row.try_get("postings_found")?,
        postings_new: row.try_get("postings_new")?,
    })
}
