// src/web/mod.rs
//! Server-rendered review dashboard. Routes stay thin and delegate to the
//! handlers module; templates live in `templates.rs`.

pub mod handlers;
pub mod templates;

use anyhow::{Context, Result};
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::response::content::RawHtml;
use rocket::response::Redirect;
use rocket::{catch, catchers, get, post, routes, FromForm, State};
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::AppConfig;
use crate::db::Database;

pub struct AppState {
    pub db: Database,
    pub config: RwLock<AppConfig>,
    pub config_path: PathBuf,
}

#[derive(FromForm)]
pub struct SettingsForm {
    pub keywords: String,
    pub locations: String,
    pub score_threshold: i64,
    pub max_postings: usize,
    pub auto_submit: bool,
    pub submit_delay_secs: u64,
    pub model: String,
}

#[derive(FromForm)]
pub struct ResumeUploadForm<'r> {
    pub file: TempFile<'r>,
}

#[get("/")]
async fn dashboard(state: &State<AppState>) -> Result<RawHtml<String>, Status> {
    handlers::dashboard(state).await
}

#[get("/jobs?<min_score>&<sort>")]
async fn jobs(
    state: &State<AppState>,
    min_score: Option<i64>,
    sort: Option<String>,
) -> Result<RawHtml<String>, Status> {
    handlers::jobs(state, min_score, sort).await
}

#[get("/jobs/<id>")]
async fn job_detail(state: &State<AppState>, id: i64) -> Result<RawHtml<String>, Status> {
    handlers::job_detail(state, id).await
}

#[post("/jobs/<id>/apply")]
async fn apply_to_job(state: &State<AppState>, id: i64) -> Result<Redirect, Status> {
    handlers::apply_to_job(state, id).await
}

#[get("/applications")]
async fn applications(state: &State<AppState>) -> Result<RawHtml<String>, Status> {
    handlers::applications(state).await
}

#[post("/applications/<id>/approve")]
async fn approve_application(state: &State<AppState>, id: i64) -> Result<Redirect, Status> {
    handlers::review_application(state, id, true).await
}

#[post("/applications/<id>/reject")]
async fn reject_application(state: &State<AppState>, id: i64) -> Result<Redirect, Status> {
    handlers::review_application(state, id, false).await
}

#[get("/settings")]
async fn settings(state: &State<AppState>) -> Result<RawHtml<String>, Status> {
    handlers::settings(state, false).await
}

#[post("/settings", data = "<form>")]
async fn save_settings(
    state: &State<AppState>,
    form: Form<SettingsForm>,
) -> Result<RawHtml<String>, Status> {
    handlers::save_settings(state, form.into_inner()).await
}

#[get("/resume")]
async fn resume_page(state: &State<AppState>) -> Result<RawHtml<String>, Status> {
    handlers::resume_page(state, false).await
}

#[post("/resume", data = "<form>")]
async fn upload_resume(
    state: &State<AppState>,
    form: Form<ResumeUploadForm<'_>>,
) -> Result<RawHtml<String>, Status> {
    handlers::upload_resume(state, form.into_inner()).await
}

#[post("/search/run")]
async fn run_search(state: &State<AppState>) -> Result<Redirect, Status> {
    handlers::run_search(state).await
}

#[catch(404)]
fn not_found() -> RawHtml<String> {
    handlers::not_found_page()
}

/// Assemble the Rocket instance. Split from the launch so tests can drive
/// the routes through a local client.
pub fn build_rocket(state: AppState) -> rocket::Rocket<rocket::Build> {
    rocket::build()
        .manage(state)
        .mount(
            "/",
            routes![
                dashboard,
                jobs,
                job_detail,
                apply_to_job,
                applications,
                approve_application,
                reject_application,
                settings,
                save_settings,
                resume_page,
                upload_resume,
                run_search,
            ],
        )
        .register("/", catchers![not_found])
}

/// Build and launch the dashboard server, bound to the configured address.
pub async fn start_web_server(
    db: Database,
    config: AppConfig,
    config_path: PathBuf,
) -> Result<()> {
    let address: std::net::IpAddr = config
        .server
        .address
        .parse()
        .with_context(|| format!("Invalid server address: {}", config.server.address))?;
    let port = config.server.port;

    let figment = rocket::Config::figment()
        .merge(("address", address))
        .merge(("port", port));

    let state = AppState {
        db,
        config: RwLock::new(config),
        config_path,
    };

    info!("Starting dashboard on http://{}:{}", address, port);
    build_rocket(state)
        .configure(figment)
        .launch()
        .await
        .context("Web server failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::posting_fingerprint;
    use crate::models::{AnalysisOutcome, ApplicationStatus, RawPosting};
    use crate::resume::ParsedResume;
    use rocket::http::Status;
    use rocket::local::asynchronous::Client;
    use std::path::Path;

    fn config() -> AppConfig {
        serde_yaml::from_str(
            r#"
search:
  keywords: ["data engineer"]
  locations: ["Remote"]
matching: {}
application: {}
resume:
  file_path: "data/resume/resume.pdf"
"#,
        )
        .unwrap()
    }

    async fn client(db: Database) -> Client {
        let state = AppState {
            db,
            config: RwLock::new(config()),
            config_path: PathBuf::from("config/config.yaml"),
        };
        Client::tracked(build_rocket(state)).await.unwrap()
    }

    async fn seeded_db() -> Database {
        let db = Database::in_memory().await.unwrap();
        let parsed = ParsedResume {
            skills: vec!["python".to_string()],
            ..Default::default()
        };
        db.insert_resume("resume.pdf", Path::new("data/resume/resume.pdf"), &parsed)
            .await
            .unwrap();
        db
    }

    async fn seed_posting(db: &Database, title: &str) -> i64 {
        let raw = RawPosting {
            title: title.to_string(),
            company: "Acme".to_string(),
            location: "Remote".to_string(),
            description: "desc".to_string(),
            salary: None,
            url: "https://example.com/job".to_string(),
            source: "Test".to_string(),
        };
        let fingerprint = posting_fingerprint(&raw.title, &raw.company, &raw.location);
        db.insert_posting(&fingerprint, &raw).await.unwrap().unwrap()
    }

    async fn seed_analysis(db: &Database, posting_id: i64) -> i64 {
        let resume = db.active_resume().await.unwrap().unwrap();
        let outcome = AnalysisOutcome {
            score: 65,
            reasons: vec!["partial match".to_string()],
            skill_gaps: Vec::new(),
            recommend: false,
            cover_letter_hint: String::new(),
        };
        db.insert_analysis(posting_id, resume.id, &outcome)
            .await
            .unwrap()
    }

    #[rocket::async_test]
    async fn test_reviewing_unknown_application_is_not_found() {
        let client = client(seeded_db().await).await;
        let response = client.post("/applications/999/approve").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_reviewing_settled_application_conflicts() {
        let db = seeded_db().await;
        let posting_id = seed_posting(&db, "Data Engineer").await;
        let analysis_id = seed_analysis(&db, posting_id).await;
        let app_id = db
            .create_application(posting_id, analysis_id, None)
            .await
            .unwrap()
            .unwrap();
        db.set_application_status(app_id, ApplicationStatus::Approved, None)
            .await
            .unwrap();

        let client = client(db).await;
        let response = client
            .post(format!("/applications/{}/approve", app_id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
    }

    #[rocket::async_test]
    async fn test_manual_apply_queues_pending_application() {
        let db = seeded_db().await;
        let posting_id = seed_posting(&db, "Data Engineer").await;
        seed_analysis(&db, posting_id).await;

        let client = client(db).await;
        let response = client
            .post(format!("/jobs/{}/apply", posting_id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::SeeOther);

        let db = &client.rocket().state::<AppState>().unwrap().db;
        let app = db
            .application_for_posting(posting_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(app.status, ApplicationStatus::PendingReview);
    }

    #[rocket::async_test]
    async fn test_manual_apply_without_analysis_conflicts() {
        let db = seeded_db().await;
        let posting_id = seed_posting(&db, "Data Engineer").await;

        let client = client(db).await;
        let response = client
            .post(format!("/jobs/{}/apply", posting_id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
    }

    #[rocket::async_test]
    async fn test_manual_apply_unknown_posting_is_not_found() {
        let client = client(seeded_db().await).await;
        let response = client.post("/jobs/999/apply").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_manual_apply_twice_conflicts() {
        let db = seeded_db().await;
        let posting_id = seed_posting(&db, "Data Engineer").await;
        seed_analysis(&db, posting_id).await;

        let client = client(db).await;
        let first = client
            .post(format!("/jobs/{}/apply", posting_id))
            .dispatch()
            .await;
        assert_eq!(first.status(), Status::SeeOther);
        let second = client
            .post(format!("/jobs/{}/apply", posting_id))
            .dispatch()
            .await;
        assert_eq!(second.status(), Status::Conflict);
    }
}
