//! Batch prompt construction.
//!
//! The numbered-line contract built here is what [`crate::parser`] reads back:
//! one verdict line per company, numbered `1.` through `len(batch)`.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use scrub_core::{Batch, Record};

pub const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant that analyzes company statuses.";

/// The closed set of one-line verdicts the service may answer with.
pub const VERDICT_TEMPLATES: [&str; 6] = [
    "Company is a subsidiary of Parent",
    "Acquired by Buyer in Year",
    "Renamed to New Name",
    "Shut down",
    "Academic/government/healthcare: not sellable",
    "No acquisitions, merges, renames, shutdowns, or subsidiaries",
];

/// Model parameters shared by every request of a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "sonar".to_string(),
            temperature: 0.3,
            max_tokens: 2000,
        }
    }
}

/// One enrichment request: a whole batch in a single call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl AnalysisRequest {
    pub fn for_batch(batch: &Batch, settings: &GenerationSettings) -> Self {
        Self {
            model: settings.model.clone(),
            system: SYSTEM_INSTRUCTION.to_string(),
            user: build_user_prompt(&batch.records),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

fn company_line(number: usize, record: &Record) -> String {
    let name = if record.name.is_empty() {
        "Unknown"
    } else {
        record.name.as_str()
    };
    let website = record.website.as_deref().unwrap_or("No website");
    format!("{}. {} ({})", number, name, website)
}

/// Build the user instruction listing the batch's companies in order.
pub fn build_user_prompt(records: &[Record]) -> String {
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "Analyze these {} companies and summarize only if any of these are true for each:",
        records.len()
    );
    prompt.push_str("    • Acquired, merged, renamed, shut down\n");
    prompt.push_str("    • Has subsidiaries\n");
    prompt.push_str("    • Is a government, academic, or healthcare organization\n\n");

    prompt.push_str("Companies to analyze:\n");
    for (i, record) in records.iter().enumerate() {
        let _ = writeln!(prompt, "{}", company_line(i + 1, record));
    }

    prompt.push_str("\nFor each company, output ONLY a one-line status using these templates:\n");
    for template in VERDICT_TEMPLATES {
        let _ = writeln!(prompt, "    • {}", template);
    }

    prompt.push_str("\nFormat your response as:\n");
    for i in 1..=records.len() {
        let _ = writeln!(prompt, "{}. [Status for company {}]", i, i);
    }

    prompt.push_str("\nWrite nothing else. No explanations, just numbered statuses.\n");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrub_core::RecordId;

    fn record(name: &str, website: Option<&str>) -> Record {
        Record {
            id: RecordId::parse(name).unwrap_or_else(|_| RecordId::from_row(1)),
            row_index: 0,
            name: name.to_string(),
            website: website.map(str::to_string),
            owner: None,
            fields: Vec::new(),
        }
    }

    #[test]
    fn lists_companies_in_batch_order() {
        let prompt = build_user_prompt(&[
            record("Acme Corp", Some("acme.com")),
            record("Globex", None),
            record("", Some("mystery.io")),
        ]);

        assert!(prompt.starts_with("Analyze these 3 companies"));
        let acme = prompt.find("1. Acme Corp (acme.com)").unwrap();
        let globex = prompt.find("2. Globex (No website)").unwrap();
        let unknown = prompt.find("3. Unknown (mystery.io)").unwrap();
        assert!(acme < globex && globex < unknown);
    }

    #[test]
    fn format_section_has_one_line_per_company() {
        let prompt = build_user_prompt(&[record("A", None), record("B", None)]);
        assert!(prompt.contains("1. [Status for company 1]\n2. [Status for company 2]\n"));
        assert!(!prompt.contains("3. [Status"));
    }

    #[test]
    fn every_verdict_template_is_offered() {
        let prompt = build_user_prompt(&[record("A", None)]);
        for template in VERDICT_TEMPLATES {
            assert!(prompt.contains(template), "missing template: {}", template);
        }
    }
}
