//! Output schema handed to the structured-generation endpoint.
//!
//! The schema uses the OpenAPI subset accepted by Gemini's `responseSchema`.
//! Every property is required, so a conforming response always deserializes into
//! [`CampaignDraft`](crate::draft::CampaignDraft). Renaming a field here breaks
//! the parser in `generation`; the tests below keep both sides in step.

use serde_json::{json, Value};

pub const HEADLINE_MAX_CHARS: usize = 30;
pub const DESCRIPTION_MAX_CHARS: usize = 90;
pub const DISPLAY_PATH_MAX_CHARS: usize = 15;
pub const CALLOUT_MAX_CHARS: usize = 25;
pub const SNIPPET_MAX_CHARS: usize = 25;
pub const SITELINK_TEXT_MAX_CHARS: usize = 25;
pub const SITELINK_DESCRIPTION_MAX_CHARS: usize = 35;

pub const SYSTEM_INSTRUCTION: &str = "You are a senior Google Ads strategist. \
Turn the user's business description into a complete Google Ads Search campaign. \
Write persuasive, policy-compliant copy with no exclamation marks in headlines and \
respect every character limit given in the schema descriptions. Use the same \
keyword set for broad, phrase and exact match, and return the terms without quotes \
or brackets. Suggest negative keywords that filter out job seekers, DIY and \
irrelevant traffic. Use only the business's own website for the final URL; if none \
is given, use a plausible placeholder.";

fn text_list(description: String) -> Value {
    json!({
        "type": "ARRAY",
        "description": description,
        "items": { "type": "STRING" }
    })
}

fn text(description: String) -> Value {
    json!({ "type": "STRING", "description": description })
}

pub fn campaign_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "finalUrl": text("Landing page URL including https://".to_string()),
            "displayPath1": text(format!("First display URL path segment, at most {DISPLAY_PATH_MAX_CHARS} characters, no slashes")),
            "displayPath2": text(format!("Second display URL path segment, at most {DISPLAY_PATH_MAX_CHARS} characters, no slashes")),
            "headlines": text_list(format!("Exactly 15 headlines, each at most {HEADLINE_MAX_CHARS} characters")),
            "descriptions": text_list(format!("Exactly 4 descriptions, each at most {DESCRIPTION_MAX_CHARS} characters")),
            "companyName": text("Business name as it should appear in the ad".to_string()),
            "keywords": {
                "type": "OBJECT",
                "properties": {
                    "broad": text_list("15 to 20 broad match keywords".to_string()),
                    "phrase": text_list("The same keywords as broad, for phrase match, without quotes".to_string()),
                    "exact": text_list("The same keywords as broad, for exact match, without brackets".to_string())
                },
                "required": ["broad", "phrase", "exact"]
            },
            "sitelinks": {
                "type": "ARRAY",
                "description": "4 to 6 sitelinks",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "text": text(format!("Link text, at most {SITELINK_TEXT_MAX_CHARS} characters")),
                        "description1": text(format!("First description line, at most {SITELINK_DESCRIPTION_MAX_CHARS} characters")),
                        "description2": text(format!("Second description line, at most {SITELINK_DESCRIPTION_MAX_CHARS} characters"))
                    },
                    "required": ["text", "description1", "description2"]
                }
            },
            "callouts": text_list(format!("6 to 10 callouts, each at most {CALLOUT_MAX_CHARS} characters")),
            "structuredSnippets": text_list(format!("Structured snippet values for a single header, each at most {SNIPPET_MAX_CHARS} characters")),
            "negativeKeywords": text_list("Negative keywords".to_string())
        },
        "required": [
            "finalUrl",
            "displayPath1",
            "displayPath2",
            "headlines",
            "descriptions",
            "companyName",
            "keywords",
            "sitelinks",
            "callouts",
            "structuredSnippets",
            "negativeKeywords"
        ]
    })
}
