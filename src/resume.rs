// src/resume.rs
//! Resume text extraction and structure recovery.
//!
//! PDF text comes out of `pdf-extract`; DOCX is read as a zip archive and the
//! text runs of `word/document.xml` are concatenated. The parser on top is
//! heuristic: it never fails, it just returns whatever structure it could
//! recover from the raw text.

use anyhow::{Context, Result};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::{debug, warn};

use crate::models::{ContactInfo, EducationEntry, ExperienceEntry};

/// Structured resume content before it has been stored.
#[derive(Debug, Clone, Default)]
pub struct ParsedResume {
    pub contact: ContactInfo,
    pub skills: Vec<String>,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    pub summary: Option<String>,
    pub raw_text: String,
}

/// Read a resume file and extract its plain text, dispatching on extension.
pub fn extract_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read resume file: {}", path.display()))?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => extract_pdf_text(&bytes)
            .with_context(|| format!("Failed to extract text from PDF: {}", path.display())),
        "docx" => extract_docx_text(&bytes)
            .with_context(|| format!("Failed to extract text from DOCX: {}", path.display())),
        other => anyhow::bail!("Unsupported resume format '.{}': expected .pdf or .docx", other),
    }
}

pub fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes).context("PDF text extraction failed")?;
    if text.trim().is_empty() {
        anyhow::bail!("PDF contains no extractable text");
    }
    Ok(text)
}

/// DOCX is a zip archive; the document body lives in `word/document.xml`.
/// Text runs (`<w:t>`) are concatenated, with paragraph boundaries (`</w:p>`)
/// becoming newlines.
pub fn extract_docx_text(bytes: &[u8]) -> Result<String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("Not a valid DOCX archive")?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("DOCX archive has no word/document.xml")?
        .read_to_string(&mut xml)
        .context("Failed to read word/document.xml")?;

    // Text is not trimmed here: a run like "Data " relies on its trailing
    // space when runs are concatenated.
    let mut reader = Reader::from_str(&xml);

    let mut text = String::new();
    let mut in_text_run = false;
    loop {
        match reader.read_event().context("Malformed document.xml")? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text_run = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text_run => {
                let run = t.decode().context("Malformed text run")?;
                text.push_str(&run);
            }
            // Entity and character references are surfaced as their own
            // events rather than expanded inside Text.
            Event::GeneralRef(r) if in_text_run => {
                if let Some(ch) = r.resolve_char_ref().context("Malformed character reference")? {
                    text.push(ch);
                } else {
                    let name = r.decode().context("Malformed entity reference")?;
                    if let Some(expanded) = resolve_predefined_entity(&name) {
                        text.push_str(expanded);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if text.trim().is_empty() {
        anyhow::bail!("DOCX contains no extractable text");
    }
    Ok(text)
}

/// Extract and parse a resume file in one step.
pub fn parse_resume(path: &Path) -> Result<ParsedResume> {
    let text = extract_text(path)?;
    debug!("Extracted {} characters from {}", text.len(), path.display());
    Ok(parse_resume_text(&text))
}

const SECTION_HEADERS: &[(&str, Section)] = &[
    ("experience", Section::Experience),
    ("work experience", Section::Experience),
    ("professional experience", Section::Experience),
    ("employment", Section::Experience),
    ("education", Section::Education),
    ("academic background", Section::Education),
    ("skills", Section::Skills),
    ("technical skills", Section::Skills),
    ("summary", Section::Summary),
    ("professional summary", Section::Summary),
    ("objective", Section::Summary),
    ("profile", Section::Summary),
];

const KNOWN_SKILLS: &[&str] = &[
    "python", "java", "javascript", "typescript", "rust", "go", "c++", "c#", "ruby", "php",
    "swift", "kotlin", "scala", "sql", "nosql", "postgresql", "mysql", "mongodb", "redis",
    "aws", "azure", "gcp", "docker", "kubernetes", "terraform", "linux", "git", "ci/cd",
    "react", "angular", "vue", "node.js", "django", "flask", "spring", "html", "css",
    "machine learning", "deep learning", "data analysis", "pandas", "numpy", "tensorflow",
    "pytorch", "spark", "kafka", "airflow", "tableau", "power bi", "excel", "agile", "scrum",
    "project management", "rest api", "graphql", "microservices",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Experience,
    Education,
    Skills,
    Summary,
}

/// Best-effort structure recovery from plain resume text. Never fails;
/// missing pieces are simply absent from the result.
pub fn parse_resume_text(text: &str) -> ParsedResume {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    let contact = extract_contact(&lines);
    let sections = split_sections(&lines);

    let mut skills = match_known_skills(text);
    for skill in section_skills(&sections) {
        let lowered = skill.to_lowercase();
        if !skills.iter().any(|s| s.to_lowercase() == lowered) {
            skills.push(skill);
        }
    }

    let experience = parse_experience(section_lines(&sections, Section::Experience));
    let education = parse_education(section_lines(&sections, Section::Education));
    let summary = parse_summary(section_lines(&sections, Section::Summary));

    if skills.is_empty() && experience.is_empty() {
        warn!("Resume parsing recovered no skills or experience entries");
    }

    ParsedResume {
        contact,
        skills,
        experience,
        education,
        summary,
        raw_text: text.to_string(),
    }
}

fn extract_contact(lines: &[&str]) -> ContactInfo {
    let mut contact = ContactInfo::default();

    for line in lines {
        if contact.email.is_none() {
            contact.email = find_email(line);
        }
        if contact.phone.is_none() {
            contact.phone = find_phone(line);
        }
        if contact.email.is_some() && contact.phone.is_some() {
            break;
        }
    }

    // The name is usually the first short line with no digits or separators.
    contact.name = lines
        .iter()
        .filter(|l| !l.is_empty())
        .take(3)
        .find(|l| {
            let words = l.split_whitespace().count();
            (1..=4).contains(&words)
                && !l.chars().any(|c| c.is_ascii_digit())
                && !l.contains('@')
                && !l.contains(',')
        })
        .map(|l| l.to_string());

    contact
}

fn find_email(line: &str) -> Option<String> {
    line.split(|c: char| c.is_whitespace() || c == ',' || c == ';' || c == '|' || c == '<' || c == '>')
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .find(|token| {
            if let Some(at) = token.find('@') {
                at > 0 && token[at + 1..].contains('.')
            } else {
                false
            }
        })
        .map(|t| t.to_string())
}

fn find_phone(line: &str) -> Option<String> {
    let mut run = String::new();
    let mut digits = 0usize;
    for c in line.chars() {
        if c.is_ascii_digit() || "+-() .".contains(c) {
            if c.is_ascii_digit() {
                digits += 1;
            }
            run.push(c);
        } else {
            if digits >= 10 {
                break;
            }
            run.clear();
            digits = 0;
        }
    }
    if digits >= 10 {
        Some(run.trim().to_string())
    } else {
        None
    }
}

fn header_section(line: &str) -> Option<Section> {
    let lowered = line.trim_end_matches(':').trim().to_lowercase();
    if lowered.len() > 40 {
        return None;
    }
    SECTION_HEADERS
        .iter()
        .find(|(header, _)| lowered == *header)
        .map(|(_, section)| *section)
}

fn split_sections<'a>(lines: &[&'a str]) -> Vec<(Section, Vec<&'a str>)> {
    let mut sections: Vec<(Section, Vec<&'a str>)> = vec![(Section::None, Vec::new())];
    for line in lines {
        if let Some(section) = header_section(line) {
            sections.push((section, Vec::new()));
        } else if let Some(last) = sections.last_mut() {
            last.1.push(line);
        }
    }
    sections
}

fn section_lines<'a>(sections: &'a [(Section, Vec<&'a str>)], wanted: Section) -> &'a [&'a str] {
    sections
        .iter()
        .find(|(section, _)| *section == wanted)
        .map(|(_, lines)| lines.as_slice())
        .unwrap_or(&[])
}

fn match_known_skills(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    KNOWN_SKILLS
        .iter()
        .filter(|skill| lowered.contains(*skill))
        .map(|s| s.to_string())
        .collect()
}

fn section_skills(sections: &[(Section, Vec<&str>)]) -> Vec<String> {
    section_lines(sections, Section::Skills)
        .iter()
        .flat_map(|line| line.split(|c| c == ',' || c == '•' || c == ';' || c == '|'))
        .map(|s| s.trim().trim_start_matches('-').trim().to_string())
        .filter(|s| !s.is_empty() && s.len() <= 40)
        .collect()
}

fn looks_like_dates(line: &str) -> bool {
    line.split_whitespace().any(|word| {
        let digits: String = word.chars().filter(|c| c.is_ascii_digit()).collect();
        digits.len() == 4 && (digits.starts_with("19") || digits.starts_with("20"))
    }) || line.to_lowercase().contains("present")
}

fn parse_experience(lines: &[&str]) -> Vec<ExperienceEntry> {
    let mut entries = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    let flush = |block: &mut Vec<&str>, entries: &mut Vec<ExperienceEntry>| {
        if block.is_empty() {
            return;
        }
        let first = block[0];
        let (title, organization) = split_title_line(first);
        let dates = block.iter().find(|l| looks_like_dates(l)).map(|l| l.to_string());
        let description = block[1..]
            .iter()
            .filter(|l| Some(l.to_string()) != dates)
            .map(|l| l.trim_start_matches(['-', '•', '*']).trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        entries.push(ExperienceEntry {
            title,
            organization,
            dates,
            description,
        });
        block.clear();
    };

    for line in lines {
        if line.is_empty() {
            flush(&mut block, &mut entries);
        } else {
            block.push(line);
        }
    }
    flush(&mut block, &mut entries);
    entries
}

/// "Senior Engineer at Acme" or "Senior Engineer | Acme" splits into a title
/// and an organization; anything else is all title.
fn split_title_line(line: &str) -> (String, Option<String>) {
    for separator in [" at ", " | ", " - ", ", "] {
        if let Some((title, org)) = line.split_once(separator) {
            let title = title.trim();
            let org = org.trim();
            if !title.is_empty() && !org.is_empty() && !looks_like_dates(org) {
                return (title.to_string(), Some(org.to_string()));
            }
        }
    }
    (line.to_string(), None)
}

const DEGREE_KEYWORDS: &[&str] = &[
    "bachelor", "master", "phd", "doctorate", "b.s.", "m.s.", "b.a.", "m.a.", "mba", "bsc", "msc",
    "diploma", "associate",
];

fn parse_education(lines: &[&str]) -> Vec<EducationEntry> {
    let mut entries = Vec::new();
    let mut current: Option<EducationEntry> = None;

    for line in lines.iter().filter(|l| !l.is_empty()) {
        let lowered = line.to_lowercase();
        if DEGREE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            current = Some(EducationEntry {
                degree: line.to_string(),
                description: String::new(),
            });
        } else if let Some(entry) = current.as_mut() {
            if !entry.description.is_empty() {
                entry.description.push('\n');
            }
            entry.description.push_str(line);
        }
    }
    if let Some(entry) = current {
        entries.push(entry);
    }
    entries
}

fn parse_summary(lines: &[&str]) -> Option<String> {
    let joined = lines
        .iter()
        .filter(|l| !l.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const SAMPLE: &str = "\
Jane Smith
jane.smith@example.com | (555) 123-4567
San Francisco, CA

Summary
Data engineer with 8 years building batch and streaming pipelines.

Skills
Python, SQL, Airflow, Spark, AWS

Experience
Senior Data Engineer at Streamline Analytics
2019 - Present
- Built ingestion pipelines processing 2TB daily
- Led migration to Kubernetes

Data Engineer | DataWorks
2015 - 2019
- Maintained Airflow DAGs

Education
Bachelor of Science in Computer Science
State University, 2015
";

    #[test]
    fn test_parse_contact_info() {
        let parsed = parse_resume_text(SAMPLE);
        assert_eq!(parsed.contact.name.as_deref(), Some("Jane Smith"));
        assert_eq!(parsed.contact.email.as_deref(), Some("jane.smith@example.com"));
        assert!(parsed.contact.phone.is_some());
    }

    #[test]
    fn test_parse_skills_merges_known_and_section() {
        let parsed = parse_resume_text(SAMPLE);
        let lowered: Vec<String> = parsed.skills.iter().map(|s| s.to_lowercase()).collect();
        assert!(lowered.contains(&"python".to_string()));
        assert!(lowered.contains(&"airflow".to_string()));
        // No duplicates between keyword matches and the skills section.
        let mut sorted = lowered.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), lowered.len());
    }

    #[test]
    fn test_parse_experience_blocks() {
        let parsed = parse_resume_text(SAMPLE);
        assert_eq!(parsed.experience.len(), 2);
        assert_eq!(parsed.experience[0].title, "Senior Data Engineer");
        assert_eq!(
            parsed.experience[0].organization.as_deref(),
            Some("Streamline Analytics")
        );
        assert_eq!(parsed.experience[0].dates.as_deref(), Some("2019 - Present"));
        assert!(parsed.experience[0].description.contains("ingestion pipelines"));
        assert_eq!(parsed.experience[1].organization.as_deref(), Some("DataWorks"));
    }

    #[test]
    fn test_parse_education_and_summary() {
        let parsed = parse_resume_text(SAMPLE);
        assert_eq!(parsed.education.len(), 1);
        assert!(parsed.education[0].degree.contains("Bachelor of Science"));
        assert!(parsed.summary.as_deref().unwrap().contains("streaming pipelines"));
    }

    #[test]
    fn test_parse_garbage_text_does_not_fail() {
        let parsed = parse_resume_text("   \n\n%%%%\n12345\n");
        assert!(parsed.skills.is_empty());
        assert!(parsed.experience.is_empty());
        assert!(parsed.contact.email.is_none());
    }

    fn docx_bytes(body_xml: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extract_docx_text_runs() {
        let xml = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Jane Smith</w:t></w:r></w:p>
    <w:p><w:r><w:t>Data </w:t></w:r><w:r><w:t>Engineer</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let text = extract_docx_text(&docx_bytes(xml)).unwrap();
        let lines: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec!["Jane Smith", "Data Engineer"]);
    }

    #[test]
    fn test_extract_docx_expands_entity_references() {
        let xml = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Research &amp; Development &#8211; R&amp;D</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let text = extract_docx_text(&docx_bytes(xml)).unwrap();
        assert_eq!(text.trim(), "Research & Development \u{2013} R&D");
    }

    #[test]
    fn test_extract_docx_rejects_non_archive() {
        assert!(extract_docx_text(b"plainly not a zip").is_err());
    }

    #[test]
    fn test_extract_text_rejects_unknown_extension() {
        let result = extract_text(Path::new("/tmp/resume.txt"));
        assert!(result.is_err());
    }
}
