// src/web/templates.rs
//! Askama templates and the flattened row types they render. Handlers map
//! database entities into these views so templates stay free of logic.

use askama::Template;

use crate::db::DashboardStats;

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub stats: DashboardStats,
    pub sessions: Vec<SessionRow>,
}

pub struct SessionRow {
    pub started_at: String,
    pub completed: bool,
    pub keywords: String,
    pub locations: String,
    pub found: i64,
    pub new: i64,
}

#[derive(Template)]
#[template(path = "jobs.html")]
pub struct JobsTemplate {
    pub jobs: Vec<JobRow>,
    pub min_score: Option<i64>,
    pub sort: String,
}

pub struct JobRow {
    pub id: i64,
    pub title: String,
    pub company: String,
    pub location: String,
    pub source: String,
    pub salary: String,
    pub score: Option<i64>,
    pub recommend: bool,
    pub discovered_at: String,
}

#[derive(Template)]
#[template(path = "job_detail.html")]
pub struct JobDetailTemplate {
    pub id: i64,
    pub title: String,
    pub company: String,
    pub location: String,
    pub source: String,
    pub salary: String,
    pub url: String,
    pub description: String,
    pub discovered_at: String,
    pub analysis: Option<AnalysisView>,
    pub application: Option<ApplicationView>,
}

pub struct AnalysisView {
    pub score: i64,
    pub recommend: bool,
    pub reasons: Vec<String>,
    pub skill_gaps: Vec<String>,
    pub cover_letter_hint: String,
}

pub struct ApplicationView {
    pub id: i64,
    pub status: String,
    pub reviewable: bool,
    pub submitted_at: Option<String>,
    pub error_detail: Option<String>,
}

#[derive(Template)]
#[template(path = "applications.html")]
pub struct ApplicationsTemplate {
    pub applications: Vec<ApplicationRow>,
}

pub struct ApplicationRow {
    pub id: i64,
    pub posting_id: i64,
    pub title: String,
    pub company: String,
    pub status: String,
    pub reviewable: bool,
    pub created_at: String,
    pub submitted_at: Option<String>,
    pub error_detail: Option<String>,
}

#[derive(Template)]
#[template(path = "settings.html")]
pub struct SettingsTemplate {
    pub keywords: String,
    pub locations: String,
    pub score_threshold: i64,
    pub max_postings: usize,
    pub auto_submit: bool,
    pub submit_delay_secs: u64,
    pub model: String,
    pub saved: bool,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "resume.html")]
pub struct ResumeTemplate {
    pub resume: Option<ResumeView>,
    pub uploaded: bool,
    pub error: Option<String>,
}

pub struct ResumeView {
    pub filename: String,
    pub uploaded_at: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub skills: Vec<String>,
    pub experience: Vec<ExperienceRow>,
    pub education: Vec<String>,
    pub summary: Option<String>,
}

pub struct ExperienceRow {
    pub title: String,
    pub organization: String,
    pub dates: String,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub title: String,
    pub message: String,
}
