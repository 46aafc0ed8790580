// src/web/handlers.rs
//! Request handling behind the dashboard routes.

use askama::Template;
use chrono::{DateTime, Utc};
use rocket::http::{ContentType, Status};
use rocket::response::content::RawHtml;
use rocket::response::Redirect;
use rocket::State;
use tracing::{error, info};

use crate::analyzer::{Analyzer, GeminiClient};
use crate::db::PostingSort;
use crate::models::{Analysis, Application, ApplicationStatus, JobPosting, ResumeRecord};
use crate::pipeline;
use crate::resume::parse_resume;
use crate::web::templates::*;
use crate::web::{AppState, ResumeUploadForm, SettingsForm};

const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

fn render<T: Template>(template: &T) -> Result<RawHtml<String>, Status> {
    template.render().map(RawHtml).map_err(|e| {
        error!("Template rendering failed: {}", e);
        Status::InternalServerError
    })
}

fn internal(e: anyhow::Error) -> Status {
    error!("Request failed: {:#}", e);
    Status::InternalServerError
}

fn format_time(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M").to_string()
}

pub async fn dashboard(state: &State<AppState>) -> Result<RawHtml<String>, Status> {
    let stats = state.db.dashboard_stats().await.map_err(internal)?;
    let sessions = state
        .db
        .recent_sessions(10)
        .await
        .map_err(internal)?
        .into_iter()
        .map(|s| SessionRow {
            started_at: format_time(&s.started_at),
            completed: s.completed_at.is_some(),
            keywords: s.keywords.join(", "),
            locations: s.locations.join(", "),
            found: s.postings_found,
            new: s.postings_new,
        })
        .collect();

    render(&DashboardTemplate { stats, sessions })
}

fn job_row((posting, analysis): (JobPosting, Option<Analysis>)) -> JobRow {
    JobRow {
        id: posting.id,
        title: posting.title,
        company: posting.company,
        location: posting.location,
        source: posting.source,
        salary: posting.salary.unwrap_or_else(|| "-".to_string()),
        score: analysis.as_ref().map(|a| a.score),
        recommend: analysis.as_ref().map(|a| a.recommend).unwrap_or(false),
        discovered_at: format_time(&posting.discovered_at),
    }
}

pub async fn jobs(
    state: &State<AppState>,
    min_score: Option<i64>,
    sort: Option<String>,
) -> Result<RawHtml<String>, Status> {
    let order = match sort.as_deref() {
        Some("date") => PostingSort::Discovered,
        _ => PostingSort::Score,
    };
    let jobs = state
        .db
        .list_postings(min_score, order)
        .await
        .map_err(internal)?
        .into_iter()
        .map(job_row)
        .collect();
    render(&JobsTemplate {
        jobs,
        min_score,
        sort: match order {
            PostingSort::Score => "score".to_string(),
            PostingSort::Discovered => "date".to_string(),
        },
    })
}

fn application_view(app: &Application) -> ApplicationView {
    ApplicationView {
        id: app.id,
        status: app.status.to_string(),
        reviewable: app.status == ApplicationStatus::PendingReview,
        submitted_at: app.submitted_at.as_ref().map(format_time),
        error_detail: app.error_detail.clone(),
    }
}

pub async fn job_detail(state: &State<AppState>, id: i64) -> Result<RawHtml<String>, Status> {
    let posting = state
        .db
        .get_posting(id)
        .await
        .map_err(internal)?
        .ok_or(Status::NotFound)?;

    let analysis = match state.db.active_resume().await.map_err(internal)? {
        Some(resume) => state
            .db
            .analysis_for(posting.id, resume.id)
            .await
            .map_err(internal)?,
        None => None,
    };
    let application = state
        .db
        .application_for_posting(posting.id)
        .await
        .map_err(internal)?;

    render(&JobDetailTemplate {
        id: posting.id,
        title: posting.title,
        company: posting.company,
        location: posting.location,
        source: posting.source,
        salary: posting.salary.unwrap_or_else(|| "-".to_string()),
        url: posting.url,
        description: posting.description,
        discovered_at: format_time(&posting.discovered_at),
        analysis: analysis.map(|a| AnalysisView {
            score: a.score,
            recommend: a.recommend,
            reasons: a.reasons,
            skill_gaps: a.skill_gaps,
            cover_letter_hint: a.cover_letter_hint,
        }),
        application: application.as_ref().map(application_view),
    })
}

pub async fn applications(state: &State<AppState>) -> Result<RawHtml<String>, Status> {
    let applications = state
        .db
        .list_applications(None)
        .await
        .map_err(internal)?
        .into_iter()
        .map(|(app, posting)| ApplicationRow {
            id: app.id,
            posting_id: posting.id,
            title: posting.title,
            company: posting.company,
            status: app.status.to_string(),
            reviewable: app.status == ApplicationStatus::PendingReview,
            created_at: format_time(&app.created_at),
            submitted_at: app.submitted_at.as_ref().map(format_time),
            error_detail: app.error_detail,
        })
        .collect();
    render(&ApplicationsTemplate { applications })
}

/// Approve or reject a pending application. Anything past pending review is
/// a conflict, not a crash.
pub async fn review_application(
    state: &State<AppState>,
    id: i64,
    approve: bool,
) -> Result<Redirect, Status> {
    let app = state
        .db
        .get_application(id)
        .await
        .map_err(internal)?
        .ok_or(Status::NotFound)?;

    if app.status != ApplicationStatus::PendingReview {
        return Err(Status::Conflict);
    }

    let next = if approve {
        ApplicationStatus::Approved
    } else {
        ApplicationStatus::Rejected
    };
    state
        .db
        .set_application_status(id, next, None)
        .await
        .map_err(internal)?;
    info!("Application {} marked {}", id, next);
    Ok(Redirect::to("/applications"))
}

/// Queue an application for a posting by hand. The reviewer's click is the
/// approval signal, so the automatic score gate does not apply here, but an
/// analysis against the active resume must exist.
pub async fn apply_to_job(state: &State<AppState>, id: i64) -> Result<Redirect, Status> {
    let posting = state
        .db
        .get_posting(id)
        .await
        .map_err(internal)?
        .ok_or(Status::NotFound)?;
    let resume = state
        .db
        .active_resume()
        .await
        .map_err(internal)?
        .ok_or(Status::Conflict)?;
    let analysis = state
        .db
        .analysis_for(posting.id, resume.id)
        .await
        .map_err(internal)?
        .ok_or(Status::Conflict)?;

    let created = state
        .db
        .create_application(posting.id, analysis.id, None)
        .await
        .map_err(internal)?;
    if created.is_none() {
        return Err(Status::Conflict);
    }
    info!("Application queued manually for '{}'", posting.title);
    Ok(Redirect::to(format!("/jobs/{}", id)))
}

pub async fn settings(state: &State<AppState>, saved: bool) -> Result<RawHtml<String>, Status> {
    let config = state.config.read().await;
    render(&settings_template(&config, saved, None))
}

fn settings_template(
    config: &crate::config::AppConfig,
    saved: bool,
    error: Option<String>,
) -> SettingsTemplate {
    SettingsTemplate {
        keywords: config.search.keywords.join(", "),
        locations: config.search.locations.join(", "),
        score_threshold: config.matching.score_threshold,
        max_postings: config.search.max_postings,
        auto_submit: config.application.auto_submit,
        submit_delay_secs: config.application.submit_delay_secs,
        model: config.matching.model.clone(),
        saved,
        error,
    }
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub async fn save_settings(
    state: &State<AppState>,
    form: SettingsForm,
) -> Result<RawHtml<String>, Status> {
    let mut candidate = state.config.read().await.clone();
    candidate.search.keywords = split_csv(&form.keywords);
    candidate.search.locations = split_csv(&form.locations);
    candidate.search.max_postings = form.max_postings;
    candidate.matching.score_threshold = form.score_threshold;
    candidate.matching.model = form.model.trim().to_string();
    candidate.application.auto_submit = form.auto_submit;
    candidate.application.submit_delay_secs = form.submit_delay_secs;

    if let Err(e) = candidate.validate() {
        return render(&settings_template(&candidate, false, Some(format!("{:#}", e))));
    }
    if let Err(e) = candidate.save(&state.config_path) {
        return render(&settings_template(&candidate, false, Some(format!("{:#}", e))));
    }

    let mut config = state.config.write().await;
    *config = candidate;
    render(&settings_template(&config, true, None))
}

fn resume_view(record: &ResumeRecord) -> ResumeView {
    ResumeView {
        filename: record.filename.clone(),
        uploaded_at: format_time(&record.uploaded_at),
        name: record.contact.name.clone().unwrap_or_else(|| "-".to_string()),
        email: record.contact.email.clone().unwrap_or_else(|| "-".to_string()),
        phone: record.contact.phone.clone().unwrap_or_else(|| "-".to_string()),
        skills: record.skills.clone(),
        experience: record
            .experience
            .iter()
            .map(|e| ExperienceRow {
                title: e.title.clone(),
                organization: e.organization.clone().unwrap_or_default(),
                dates: e.dates.clone().unwrap_or_default(),
            })
            .collect(),
        education: record.education.iter().map(|e| e.degree.clone()).collect(),
        summary: record.summary.clone(),
    }
}

pub async fn resume_page(
    state: &State<AppState>,
    uploaded: bool,
) -> Result<RawHtml<String>, Status> {
    let resume = state.db.active_resume().await.map_err(internal)?;
    render(&ResumeTemplate {
        resume: resume.as_ref().map(resume_view),
        uploaded,
        error: None,
    })
}

async fn resume_page_with_error(
    state: &State<AppState>,
    message: String,
) -> Result<RawHtml<String>, Status> {
    let resume = state.db.active_resume().await.map_err(internal)?;
    render(&ResumeTemplate {
        resume: resume.as_ref().map(resume_view),
        uploaded: false,
        error: Some(message),
    })
}

pub async fn upload_resume(
    state: &State<AppState>,
    mut form: ResumeUploadForm<'_>,
) -> Result<RawHtml<String>, Status> {
    let extension = match form.file.content_type() {
        Some(ct) if *ct == ContentType::PDF => "pdf",
        Some(ct) if ct.to_string().starts_with(DOCX_MIME) => "docx",
        _ => {
            return resume_page_with_error(
                state,
                "Unsupported file type: upload a .pdf or .docx resume".to_string(),
            )
            .await;
        }
    };

    let upload_dir = state.config.read().await.storage.upload_dir.clone();
    if let Err(e) = std::fs::create_dir_all(&upload_dir) {
        return Err(internal(anyhow::Error::new(e).context("Failed to create upload directory")));
    }

    let stem = form.file.name().unwrap_or("resume").to_string();
    let filename = format!("{}.{}", stem, extension);
    let dest = upload_dir.join(&filename);

    if let Err(e) = form.file.copy_to(&dest).await {
        return Err(internal(anyhow::Error::new(e).context("Failed to store uploaded file")));
    }

    let parsed = match parse_resume(&dest) {
        Ok(parsed) => parsed,
        Err(e) => {
            return resume_page_with_error(state, format!("Could not parse resume: {:#}", e))
                .await;
        }
    };

    state
        .db
        .insert_resume(&filename, &dest, &parsed)
        .await
        .map_err(internal)?;
    info!("New resume '{}' uploaded and activated", filename);
    resume_page(state, true).await
}

/// Kick off a full discovery cycle from the dashboard.
pub async fn run_search(state: &State<AppState>) -> Result<Redirect, Status> {
    let config = state.config.read().await.clone();
    let api_key = config.api_key().map_err(internal)?;
    let client = GeminiClient::new(api_key, config.matching.model.clone()).map_err(internal)?;
    let analyzer = Analyzer::new(Box::new(client));

    pipeline::run_cycle(&state.db, &config, &analyzer)
        .await
        .map_err(internal)?;
    Ok(Redirect::to("/"))
}

pub fn not_found_page() -> RawHtml<String> {
    let template = ErrorTemplate {
        title: "Not found".to_string(),
        message: "The page you requested does not exist.".to_string(),
    };
    RawHtml(template.render().unwrap_or_else(|_| "Not found".to_string()))
}
