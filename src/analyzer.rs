// src/analyzer.rs
//! Resume/posting compatibility scoring through a text generation model.
//!
//! The model is asked for a strict JSON reply. Anything that fails to come
//! back, parse or validate collapses to `AnalysisOutcome::fallback`, so a
//! flaky provider degrades scores to zero instead of aborting a run.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::models::{AnalysisOutcome, JobPosting, ResumeRecord};

/// Seam for the text generation backend, kept narrow so tests can stub it.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/{}:generateContent", GEMINI_BASE_URL, self.model);
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini returned HTTP {}: {}", status, detail);
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .context("Failed to decode Gemini response")?;

        reply
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .context("Gemini response contained no candidates")
    }
}

/// Shape the model is instructed to reply with.
#[derive(Deserialize)]
struct AnalysisReply {
    score: i64,
    #[serde(default)]
    reasons: Vec<String>,
    #[serde(default)]
    skill_gaps: Vec<String>,
    recommend: bool,
    #[serde(default)]
    cover_letter_hint: String,
}

pub struct Analyzer {
    generator: Box<dyn TextGenerator>,
}

impl Analyzer {
    pub fn new(generator: Box<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Score one (resume, posting) pair. Never fails; provider or parse
    /// errors produce the documented zero-score fallback.
    pub async fn analyze(&self, resume: &ResumeRecord, posting: &JobPosting) -> AnalysisOutcome {
        let prompt = build_prompt(resume, posting);
        let reply = match self.generator.generate(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(posting = %posting.title, "Text generation failed: {:#}", e);
                return AnalysisOutcome::fallback(&format!("{:#}", e));
            }
        };

        match parse_reply(&reply) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(posting = %posting.title, "Unusable analysis reply: {:#}", e);
                AnalysisOutcome::fallback(&format!("{:#}", e))
            }
        }
    }

    /// Draft a short cover letter for an approved posting.
    pub async fn cover_letter(
        &self,
        resume: &ResumeRecord,
        posting: &JobPosting,
        hint: &str,
    ) -> Result<String> {
        let prompt = build_cover_letter_prompt(resume, posting, hint);
        let reply = self
            .generator
            .generate(&prompt)
            .await
            .context("Cover letter generation failed")?;
        Ok(reply.trim().to_string())
    }
}

pub fn build_prompt(resume: &ResumeRecord, posting: &JobPosting) -> String {
    let experience = resume
        .experience
        .iter()
        .map(|e| match &e.organization {
            Some(org) => format!("- {} at {}", e.title, org),
            None => format!("- {}", e.title),
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an experienced technical recruiter evaluating a candidate against a job posting.\n\
         \n\
         CANDIDATE SKILLS: {skills}\n\
         CANDIDATE EXPERIENCE:\n{experience}\n\
         CANDIDATE SUMMARY: {summary}\n\
         \n\
         JOB TITLE: {title}\n\
         COMPANY: {company}\n\
         LOCATION: {location}\n\
         JOB DESCRIPTION:\n{description}\n\
         \n\
         Reply with ONLY a JSON object, no prose and no markdown, in exactly this shape:\n\
         {{\n\
           \"score\": <integer 0-100>,\n\
           \"reasons\": [<strings explaining the score>],\n\
           \"skill_gaps\": [<skills the posting wants that the candidate lacks>],\n\
           \"recommend\": <true if the candidate should apply>,\n\
           \"cover_letter_hint\": \"<one sentence angle for a cover letter>\"\n\
         }}",
        skills = resume.skills.join(", "),
        experience = experience,
        summary = resume.summary.as_deref().unwrap_or("(none)"),
        title = posting.title,
        company = posting.company,
        location = posting.location,
        description = posting.description,
    )
}

fn build_cover_letter_prompt(resume: &ResumeRecord, posting: &JobPosting, hint: &str) -> String {
    format!(
        "Write a concise three-paragraph cover letter for the position below. \
         Plain text only, no placeholders, no salutation brackets.\n\
         \n\
         CANDIDATE: {name}\n\
         CANDIDATE SKILLS: {skills}\n\
         POSITION: {title} at {company}\n\
         ANGLE: {hint}\n",
        name = resume.contact.name.as_deref().unwrap_or("the candidate"),
        skills = resume.skills.join(", "),
        title = posting.title,
        company = posting.company,
        hint = hint,
    )
}

/// Parse a model reply into an outcome. Markdown code fences around the JSON
/// are tolerated; everything else must parse strictly. Scores outside 0-100
/// are clamped.
pub fn parse_reply(reply: &str) -> Result<AnalysisOutcome> {
    let json = strip_code_fence(reply);
    let parsed: AnalysisReply =
        serde_json::from_str(json.trim()).context("Reply is not the expected JSON shape")?;

    Ok(AnalysisOutcome {
        score: parsed.score.clamp(0, 100),
        reasons: parsed.reasons,
        skill_gaps: parsed.skill_gaps,
        recommend: parsed.recommend,
        cover_letter_hint: parsed.cover_letter_hint,
    })
}

/// Models often wrap JSON in ```json fences despite instructions not to.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after_fence = &trimmed[start + 3..];
    // Skip the language tag on the opening fence line.
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContactInfo;
    use chrono::Utc;
    use std::path::PathBuf;

    fn resume() -> ResumeRecord {
        ResumeRecord {
            id: 1,
            filename: "resume.pdf".to_string(),
            file_path: PathBuf::from("data/resume/resume.pdf"),
            contact: ContactInfo {
                name: Some("Jane Smith".to_string()),
                email: Some("jane@example.com".to_string()),
                phone: None,
            },
            skills: vec!["python".to_string(), "sql".to_string()],
            experience: Vec::new(),
            education: Vec::new(),
            summary: Some("Data engineer".to_string()),
            uploaded_at: Utc::now(),
            is_active: true,
        }
    }

    fn posting() -> JobPosting {
        JobPosting {
            id: 7,
            fingerprint: "abc".to_string(),
            title: "Data Engineer".to_string(),
            company: "Acme".to_string(),
            location: "Remote".to_string(),
            description: "Build pipelines".to_string(),
            salary: None,
            url: "https://example.com/job/7".to_string(),
            source: "Sample".to_string(),
            discovered_at: Utc::now(),
        }
    }

    struct StubGenerator {
        reply: Result<String, String>,
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(anyhow::anyhow!("{}", e)),
            }
        }
    }

    #[test]
    fn test_parse_plain_json_reply() {
        let outcome = parse_reply(
            r#"{"score": 85, "reasons": ["strong match"], "skill_gaps": ["kafka"],
                "recommend": true, "cover_letter_hint": "lead with pipelines"}"#,
        )
        .unwrap();
        assert_eq!(outcome.score, 85);
        assert!(outcome.recommend);
        assert_eq!(outcome.skill_gaps, vec!["kafka"]);
    }

    #[test]
    fn test_parse_fenced_reply() {
        let reply = "```json\n{\"score\": 60, \"recommend\": false}\n```";
        let outcome = parse_reply(reply).unwrap();
        assert_eq!(outcome.score, 60);
        assert!(!outcome.recommend);
        assert!(outcome.reasons.is_empty());
    }

    #[test]
    fn test_parse_clamps_score() {
        let high = parse_reply(r#"{"score": 150, "recommend": true}"#).unwrap();
        assert_eq!(high.score, 100);
        let low = parse_reply(r#"{"score": -5, "recommend": false}"#).unwrap();
        assert_eq!(low.score, 0);
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_reply("The candidate looks great, I'd say 85/100.").is_err());
        assert!(parse_reply(r#"{"recommend": true}"#).is_err());
    }

    #[tokio::test]
    async fn test_analyze_falls_back_on_malformed_reply() {
        let analyzer = Analyzer::new(Box::new(StubGenerator {
            reply: Ok("I cannot produce JSON today.".to_string()),
        }));
        let outcome = analyzer.analyze(&resume(), &posting()).await;
        assert_eq!(outcome.score, 0);
        assert!(!outcome.recommend);
        assert!(outcome.reasons[0].starts_with("Analysis unavailable"));
    }

    #[tokio::test]
    async fn test_analyze_falls_back_on_provider_error() {
        let analyzer = Analyzer::new(Box::new(StubGenerator {
            reply: Err("HTTP 503".to_string()),
        }));
        let outcome = analyzer.analyze(&resume(), &posting()).await;
        assert_eq!(outcome.score, 0);
        assert!(outcome.reasons[0].contains("HTTP 503"));
    }

    #[tokio::test]
    async fn test_analyze_propagates_valid_reply() {
        let analyzer = Analyzer::new(Box::new(StubGenerator {
            reply: Ok(r#"{"score": 72, "reasons": ["solid overlap"], "recommend": true,
                          "cover_letter_hint": "mention sql"}"#
                .to_string()),
        }));
        let outcome = analyzer.analyze(&resume(), &posting()).await;
        assert_eq!(outcome.score, 72);
        assert!(outcome.recommend);
        assert_eq!(outcome.cover_letter_hint, "mention sql");
    }

    #[test]
    fn test_prompt_mentions_key_fields() {
        let prompt = build_prompt(&resume(), &posting());
        assert!(prompt.contains("python, sql"));
        assert!(prompt.contains("Data Engineer"));
        assert!(prompt.contains("Acme"));
        assert!(prompt.contains("JSON object"));
    }
}
