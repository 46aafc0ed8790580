pub mod analyzer;
pub mod config;
pub mod db;
pub mod dedup;
pub mod models;
pub mod pipeline;
pub mod resume;
pub mod source;
pub mod submit;
pub mod web;

pub use config::AppConfig;
pub use db::Database;
pub use web::start_web_server;
