// src/submit.rs
//! Application submission. Automated submission is gated on the
//! `auto_submit` flag: while it is off the submitter is a no-op and
//! applications wait in pending review for a human decision.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::db::Database;
use crate::models::{Application, ApplicationStatus, JobPosting, ResumeRecord};

#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(
        &self,
        application: &Application,
        posting: &JobPosting,
        resume: &ResumeRecord,
    ) -> Result<()>;
}

/// Submits by posting a multipart application form to the posting's URL.
pub struct HttpSubmitter {
    client: reqwest::Client,
}

impl HttpSubmitter {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(
        &self,
        application: &Application,
        posting: &JobPosting,
        resume: &ResumeRecord,
    ) -> Result<()> {
        if posting.url.is_empty() {
            anyhow::bail!("Posting has no application URL");
        }

        let resume_bytes = std::fs::read(&resume.file_path).with_context(|| {
            format!("Resume file missing: {}", resume.file_path.display())
        })?;

        let mut form = reqwest::multipart::Form::new()
            .text(
                "name",
                resume.contact.name.clone().unwrap_or_default(),
            )
            .text(
                "email",
                resume.contact.email.clone().unwrap_or_default(),
            )
            .part(
                "resume",
                reqwest::multipart::Part::bytes(resume_bytes).file_name(resume.filename.clone()),
            );
        if let Some(cover_letter) = &application.cover_letter {
            form = form.text("cover_letter", cover_letter.clone());
        }

        let response = self
            .client
            .post(&posting.url)
            .multipart(form)
            .send()
            .await
            .context("Submission request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Submission endpoint returned HTTP {}", status);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubmitReport {
    pub attempted: usize,
    pub submitted: usize,
    pub failed: usize,
}

/// Submit pending and approved applications, spacing consecutive submissions
/// by the configured delay. With `auto_submit` disabled this does nothing:
/// applications stay in pending review until a human approves them, and no
/// submission happens without that recorded decision.
pub async fn run_submitter(
    db: &Database,
    config: &AppConfig,
    submitter: &dyn Submitter,
) -> Result<SubmitReport> {
    if !config.application.auto_submit {
        info!("Automated submission is disabled (application.auto_submit = false)");
        return Ok(SubmitReport::default());
    }

    let resume = db
        .active_resume()
        .await?
        .context("No stored resume to submit with")?;

    let mut queue = db
        .list_applications(Some(ApplicationStatus::Approved))
        .await?;
    queue.extend(
        db.list_applications(Some(ApplicationStatus::PendingReview))
            .await?,
    );
    let mut report = SubmitReport::default();

    for (app, posting) in queue {
        if report.attempted > 0 && config.application.submit_delay_secs > 0 {
            tokio::time::sleep(Duration::from_secs(config.application.submit_delay_secs)).await;
        }
        report.attempted += 1;

        match submitter.submit(&app, &posting, &resume).await {
            Ok(()) => {
                db.set_application_status(app.id, ApplicationStatus::Submitted, None)
                    .await?;
                info!(title = %posting.title, company = %posting.company, "Application submitted");
                report.submitted += 1;
            }
            Err(e) => {
                error!(title = %posting.title, "Submission failed: {:#}", e);
                db.set_application_status(
                    app.id,
                    ApplicationStatus::Failed,
                    Some(&format!("{:#}", e)),
                )
                .await?;
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisOutcome, RawPosting};
    use crate::resume::ParsedResume;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSubmitter {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSubmitter {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl Submitter for CountingSubmitter {
        async fn submit(
            &self,
            _application: &Application,
            _posting: &JobPosting,
            _resume: &ResumeRecord,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("endpoint rejected the form");
            }
            Ok(())
        }
    }

    fn config(auto_submit: bool) -> AppConfig {
        let yaml = format!(
            r#"
search:
  keywords: ["data engineer"]
  locations: ["Remote"]
matching:
  score_threshold: 70
application:
  auto_submit: {}
  submit_delay_secs: 0
resume:
  file_path: "data/resume/resume.pdf"
"#,
            auto_submit
        );
        serde_yaml::from_str(&yaml).unwrap()
    }

    async fn db_with_pending_application() -> (Database, i64) {
        let db = Database::in_memory().await.unwrap();
        db.insert_resume(
            "resume.pdf",
            Path::new("data/resume/resume.pdf"),
            &ParsedResume::default(),
        )
        .await
        .unwrap();
        let posting_id = db
            .insert_posting(
                "fp1",
                &RawPosting {
                    title: "Data Engineer".to_string(),
                    company: "Acme".to_string(),
                    location: "Remote".to_string(),
                    description: "desc".to_string(),
                    salary: None,
                    url: "https://example.com/apply".to_string(),
                    source: "Test".to_string(),
                },
            )
            .await
            .unwrap()
            .unwrap();
        let resume = db.active_resume().await.unwrap().unwrap();
        let analysis_id = db
            .insert_analysis(
                posting_id,
                resume.id,
                &AnalysisOutcome {
                    score: 90,
                    reasons: Vec::new(),
                    skill_gaps: Vec::new(),
                    recommend: true,
                    cover_letter_hint: String::new(),
                },
            )
            .await
            .unwrap();
        let app_id = db
            .create_application(posting_id, analysis_id, None)
            .await
            .unwrap()
            .unwrap();
        (db, app_id)
    }

    #[tokio::test]
    async fn test_disabled_flag_submits_nothing() {
        let (db, app_id) = db_with_pending_application().await;
        db.set_application_status(app_id, ApplicationStatus::Approved, None)
            .await
            .unwrap();
        let submitter = CountingSubmitter::new(false);

        let report = run_submitter(&db, &config(false), &submitter).await.unwrap();
        assert_eq!(report.attempted, 0);
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 0);

        let app = db.get_application(app_id).await.unwrap().unwrap();
        assert_eq!(app.status, ApplicationStatus::Approved);
        assert!(app.submitted_at.is_none());
    }

    #[tokio::test]
    async fn test_approved_application_is_submitted() {
        let (db, app_id) = db_with_pending_application().await;
        db.set_application_status(app_id, ApplicationStatus::Approved, None)
            .await
            .unwrap();
        let submitter = CountingSubmitter::new(false);

        let report = run_submitter(&db, &config(true), &submitter).await.unwrap();
        assert_eq!(report.submitted, 1);
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 1);

        let app = db.get_application(app_id).await.unwrap().unwrap();
        assert_eq!(app.status, ApplicationStatus::Submitted);
        assert!(app.submitted_at.is_some());
    }

    #[tokio::test]
    async fn test_enabled_flag_submits_pending_applications() {
        let (db, app_id) = db_with_pending_application().await;
        let submitter = CountingSubmitter::new(false);

        let report = run_submitter(&db, &config(true), &submitter).await.unwrap();
        assert_eq!(report.submitted, 1);

        let app = db.get_application(app_id).await.unwrap().unwrap();
        assert_eq!(app.status, ApplicationStatus::Submitted);
    }

    #[tokio::test]
    async fn test_failed_submission_records_error() {
        let (db, app_id) = db_with_pending_application().await;
        let submitter = CountingSubmitter::new(true);

        let report = run_submitter(&db, &config(true), &submitter).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.submitted, 0);

        let app = db.get_application(app_id).await.unwrap().unwrap();
        assert_eq!(app.status, ApplicationStatus::Failed);
        assert!(app.error_detail.unwrap().contains("rejected"));
    }

    #[tokio::test]
    async fn test_submitter_requires_a_resume() {
        let db = Database::in_memory().await.unwrap();
        let submitter = CountingSubmitter::new(false);
        let result = run_submitter(&db, &config(true), &submitter).await;
        assert!(result.is_err());
    }
}
