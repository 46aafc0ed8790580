// src/pipeline.rs
//! One discovery cycle: fetch postings, deduplicate, analyze new pairs and
//! gate applications.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::analyzer::Analyzer;
use crate::config::AppConfig;
use crate::db::Database;
use crate::dedup::filter_new;
use crate::models::{RawPosting, ResumeRecord};
use crate::resume;
use crate::source::{sample_postings, FetchOutcome, JobSource};

/// What a single cycle did, for logging and the CLI summary.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub session_id: i64,
    pub used_sample_data: bool,
    pub postings_found: usize,
    pub postings_new: usize,
    pub analyses_run: usize,
    pub applications_created: usize,
}

/// Run a full cycle against the live job source.
pub async fn run_cycle(db: &Database, config: &AppConfig, analyzer: &Analyzer) -> Result<CycleReport> {
    let source = JobSource::new()?;
    let outcome = source
        .fetch(
            &config.search.keywords,
            &config.search.locations,
            config.search.max_postings,
        )
        .await;
    run_cycle_with(db, config, analyzer, outcome).await
}

/// Cycle body, taking the fetch outcome as input so the flow downstream of
/// acquisition is testable without a network.
pub async fn run_cycle_with(
    db: &Database,
    config: &AppConfig,
    analyzer: &Analyzer,
    outcome: FetchOutcome,
) -> Result<CycleReport> {
    let resume = ensure_active_resume(db, config).await?;

    let session_id = db
        .open_session(
            &config.search.keywords,
            &config.search.locations,
            config.search.max_postings as i64,
        )
        .await?;

    let (postings, used_sample_data) = match outcome {
        FetchOutcome::Live(postings) => (postings, false),
        FetchOutcome::Unavailable => {
            warn!("Job source unavailable, substituting sample postings");
            (
                sample_postings(
                    &config.search.keywords,
                    &config.search.locations,
                    config.search.max_postings,
                ),
                true,
            )
        }
    };
    let mut report = CycleReport {
        session_id,
        used_sample_data,
        postings_found: postings.len(),
        ..CycleReport::default()
    };

    // The session is closed with whatever counts were reached, even when the
    // body bails out partway through.
    let body = cycle_body(db, config, analyzer, &resume, postings, &mut report).await;
    db.close_session(
        session_id,
        report.postings_found as i64,
        report.postings_new as i64,
    )
    .await?;
    body?;

    info!(
        found = report.postings_found,
        new = report.postings_new,
        analyzed = report.analyses_run,
        queued = report.applications_created,
        sample = report.used_sample_data,
        "Cycle complete"
    );
    Ok(report)
}

/// Dedup, insert, analyze and gate. A failure on one item is logged and the
/// item is skipped; only store-wide failures abort the cycle.
async fn cycle_body(
    db: &Database,
    config: &AppConfig,
    analyzer: &Analyzer,
    resume: &ResumeRecord,
    postings: Vec<RawPosting>,
    report: &mut CycleReport,
) -> Result<()> {
    let seen = db.posting_fingerprints().await?;
    for (fingerprint, raw) in filter_new(postings, &seen) {
        match db.insert_posting(&fingerprint, &raw).await {
            Ok(Some(_)) => report.postings_new += 1,
            Ok(None) => {}
            Err(e) => warn!(title = %raw.title, "Failed to store posting, skipping: {:#}", e),
        }
    }

    for posting in db.unanalyzed_postings(resume.id).await? {
        let result = analyzer.analyze(resume, &posting).await;
        let analysis_id = match db.insert_analysis(posting.id, resume.id, &result).await {
            Ok(id) => id,
            Err(e) => {
                warn!(title = %posting.title, "Failed to store analysis, skipping: {:#}", e);
                continue;
            }
        };
        report.analyses_run += 1;

        // The gate is evaluated once, here. Later threshold changes never
        // create applications from old analyses.
        if result.recommend && result.score >= config.matching.score_threshold {
            let app_id = match db.create_application(posting.id, analysis_id, None).await {
                Ok(Some(id)) => id,
                Ok(None) => continue,
                Err(e) => {
                    warn!(title = %posting.title, "Failed to queue application, skipping: {:#}", e);
                    continue;
                }
            };
            info!(
                title = %posting.title,
                company = %posting.company,
                score = result.score,
                "Queued application for review"
            );
            report.applications_created += 1;

            // Best effort; a queued application without a drafted letter is
            // still reviewable.
            match analyzer
                .cover_letter(resume, &posting, &result.cover_letter_hint)
                .await
            {
                Ok(letter) if !letter.is_empty() => {
                    if let Err(e) = db.set_application_cover_letter(app_id, &letter).await {
                        warn!(title = %posting.title, "Failed to store cover letter: {:#}", e);
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(title = %posting.title, "Cover letter drafting failed: {:#}", e),
            }
        }
    }
    Ok(())
}

/// Return the active stored resume, parsing and storing the configured file
/// if none exists yet.
pub async fn ensure_active_resume(db: &Database, config: &AppConfig) -> Result<ResumeRecord> {
    if let Some(record) = db.active_resume().await? {
        return Ok(record);
    }

    config.validate_resume_file()?;
    let path = &config.resume.file_path;
    let parsed = resume::parse_resume(path)?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("resume")
        .to_string();

    db.insert_resume(&filename, path, &parsed).await?;
    db.active_resume()
        .await?
        .context("Resume was stored but could not be read back")
}
