use crate::draft::{CampaignDraft, Keywords, Sitelink};
use crate::generation::{CampaignGenerator, GenerationError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn sample_draft() -> CampaignDraft {
    CampaignDraft {
        final_url: "https://rapidflowplumbing.example".to_string(),
        display_path1: "plumbing".to_string(),
        display_path2: "emergency".to_string(),
        headlines: strings(&[
            "24/7 Emergency Plumbers",
            "Fast, Licensed Repairs",
            "Call RapidFlow Today",
        ]),
        descriptions: strings(&[
            "Burst pipe? Our licensed plumbers arrive within the hour, day or night.",
            "Upfront pricing, no call-out fee, 12-month guarantee on every repair.",
        ]),
        company_name: "RapidFlow Plumbing".to_string(),
        keywords: Keywords {
            broad: strings(&["emergency plumber", "plumber near me"]),
            phrase: strings(&["emergency plumber", "plumber near me"]),
            exact: strings(&["emergency plumber", "plumber near me"]),
        },
        sitelinks: vec![
            Sitelink {
                text: "Book a Plumber".to_string(),
                description1: "Same-day appointments".to_string(),
                description2: "Available 7 days a week".to_string(),
            },
            Sitelink {
                text: "Our Prices".to_string(),
                description1: "Clear, upfront quotes".to_string(),
                description2: "No hidden call-out fees".to_string(),
            },
        ],
        callouts: strings(&["No Call-Out Fee", "Licensed & Insured"]),
        structured_snippets: strings(&["Leak Repair", "Drain Unblocking", "Boiler Service"]),
        negative_keywords: strings(&["jobs", "diy", "course"]),
    }
}

/// Generator that returns `sample_draft()` and counts its calls.
#[derive(Default)]
pub struct StaticGenerator {
    pub calls: AtomicUsize,
}

impl StaticGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CampaignGenerator for StaticGenerator {
    async fn generate(&self, _prompt: &str) -> Result<CampaignDraft, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(sample_draft())
    }
}
