// src/dedup.rs
//! Posting identity and duplicate filtering.
//!
//! A posting's identifier is a stable hash over its normalized title, company
//! and location, so the same advertisement found in two scrape runs (or from
//! two sources) collapses to one row.

use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::models::RawPosting;

/// Lower-case and collapse all internal whitespace to single spaces.
fn normalize(field: &str) -> String {
    field
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stable content hash of the (title, company, location) triple.
pub fn posting_fingerprint(title: &str, company: &str, location: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(title).as_bytes());
    hasher.update([0x1f]);
    hasher.update(normalize(company).as_bytes());
    hasher.update([0x1f]);
    hasher.update(normalize(location).as_bytes());
    hex_string(&hasher.finalize())
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Pure filter: keep only postings whose fingerprint is absent from `seen`,
/// dropping intra-batch duplicates as well. Returns (fingerprint, posting)
/// pairs in input order.
pub fn filter_new(
    postings: Vec<RawPosting>,
    seen: &HashSet<String>,
) -> Vec<(String, RawPosting)> {
    let mut batch_seen: HashSet<String> = HashSet::new();
    postings
        .into_iter()
        .filter_map(|posting| {
            let fp = posting_fingerprint(&posting.title, &posting.company, &posting.location);
            if seen.contains(&fp) || !batch_seen.insert(fp.clone()) {
                None
            } else {
                Some((fp, posting))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(title: &str, company: &str, location: &str) -> RawPosting {
        RawPosting {
            title: title.to_string(),
            company: company.to_string(),
            location: location.to_string(),
            description: "desc".to_string(),
            salary: None,
            url: "https://example.com/job".to_string(),
            source: "Test".to_string(),
        }
    }

    #[test]
    fn test_fingerprint_normalizes_case_and_whitespace() {
        let a = posting_fingerprint("Data  Engineer", "ACME Corp", "Remote");
        let b = posting_fingerprint("data engineer", "acme   corp", " remote ");
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_distinguishes_fields() {
        // The separator keeps ("ab", "c") and ("a", "bc") apart.
        let a = posting_fingerprint("ab", "c", "x");
        let b = posting_fingerprint("a", "bc", "x");
        assert_ne!(a, b);

        let c = posting_fingerprint("Data Engineer", "Acme", "Berlin");
        let d = posting_fingerprint("Data Engineer", "Acme", "Remote");
        assert_ne!(c, d);
    }

    #[test]
    fn test_filter_new_drops_seen_and_batch_duplicates() {
        let seen_fp = posting_fingerprint("Old Job", "Acme", "Remote");
        let seen: HashSet<String> = [seen_fp].into_iter().collect();

        let batch = vec![
            posting("Old Job", "Acme", "Remote"),
            posting("New Job", "Acme", "Remote"),
            posting("NEW JOB", "acme", "remote"),
        ];

        let fresh = filter_new(batch, &seen);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].1.title, "New Job");
    }

    #[test]
    fn test_filter_new_empty_seen_keeps_all_distinct() {
        let batch = vec![
            posting("Job A", "Acme", "Remote"),
            posting("Job B", "Acme", "Remote"),
        ];
        let fresh = filter_new(batch, &HashSet::new());
        assert_eq!(fresh.len(), 2);
    }
}
