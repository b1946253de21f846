//! Generated campaign draft and in-place field editing.
//!
//! A draft is held by the client for the session; the server never stores it.
//! List fields behave as fixed-size collections: edits replace the text at an
//! index and never insert, remove or reorder items.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CampaignDraft {
    pub final_url: String,
    pub display_path1: String,
    pub display_path2: String,
    pub headlines: Vec<String>,
    pub descriptions: Vec<String>,
    pub company_name: String,
    pub keywords: Keywords,
    pub sitelinks: Vec<Sitelink>,
    pub callouts: Vec<String>,
    pub structured_snippets: Vec<String>,
    pub negative_keywords: Vec<String>,
}

/// The same keyword set in three match types. Terms are stored bare; quotes and
/// brackets are added only when rendering.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, ToSchema)]
pub struct Keywords {
    pub broad: Vec<String>,
    pub phrase: Vec<String>,
    pub exact: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, ToSchema)]
pub struct Sitelink {
    pub text: String,
    pub description1: String,
    pub description2: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Broad,
    Phrase,
    Exact,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Broad => "broad",
            MatchType::Phrase => "phrase",
            MatchType::Exact => "exact",
        }
    }

    /// Match-type syntax for display and export.
    pub fn decorate(&self, term: &str) -> String {
        match self {
            MatchType::Broad => term.to_string(),
            MatchType::Phrase => format!("\"{term}\""),
            MatchType::Exact => format!("[{term}]"),
        }
    }

    /// Inverse of [`MatchType::decorate`]: removes the syntax a user may have typed.
    pub fn strip<'a>(&self, text: &'a str) -> &'a str {
        let text = text.trim();
        let inner = match self {
            MatchType::Broad => None,
            MatchType::Phrase => text.strip_prefix('"').and_then(|t| t.strip_suffix('"')),
            MatchType::Exact => text.strip_prefix('[').and_then(|t| t.strip_suffix(']')),
        };
        inner.map(str::trim).unwrap_or(text)
    }
}

impl FromStr for MatchType {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "broad" => Ok(MatchType::Broad),
            "phrase" => Ok(MatchType::Phrase),
            "exact" => Ok(MatchType::Exact),
            _ => Err(EditError::UnknownField(format!("keywords.{s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitelinkPart {
    Text,
    Description1,
    Description2,
}

impl SitelinkPart {
    fn as_str(&self) -> &'static str {
        match self {
            SitelinkPart::Text => "text",
            SitelinkPart::Description1 => "description1",
            SitelinkPart::Description2 => "description2",
        }
    }
}

/// Address of one editable text in a draft, written as a path such as
/// `headlines[2]`, `keywords.exact[0]` or `sitelinks[1].description2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    FinalUrl,
    DisplayPath1,
    DisplayPath2,
    CompanyName,
    Headline(usize),
    Description(usize),
    Callout(usize),
    StructuredSnippet(usize),
    NegativeKeyword(usize),
    Keyword(MatchType, usize),
    Sitelink(usize, SitelinkPart),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("unknown draft field `{0}`")]
    UnknownField(String),
    #[error("`{field}` is out of range: the draft has {len} item(s)")]
    IndexOutOfRange {
        field: String,
        index: usize,
        len: usize,
    },
}

fn split_index(segment: &str) -> Option<(&str, Option<usize>)> {
    match segment.find('[') {
        None => Some((segment, None)),
        Some(open) => {
            let digits = segment.strip_suffix(']')?.get(open + 1..)?;
            Some((&segment[..open], Some(digits.parse().ok()?)))
        }
    }
}

impl FromStr for DraftField {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || EditError::UnknownField(s.to_string());
        let (head, rest) = match s.trim().split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (s.trim(), None),
        };
        let (name, index) = split_index(head).ok_or_else(unknown)?;

        match (name, index, rest) {
            ("finalUrl", None, None) => Ok(DraftField::FinalUrl),
            ("displayPath1", None, None) => Ok(DraftField::DisplayPath1),
            ("displayPath2", None, None) => Ok(DraftField::DisplayPath2),
            ("companyName", None, None) => Ok(DraftField::CompanyName),
            ("headlines", Some(i), None) => Ok(DraftField::Headline(i)),
            ("descriptions", Some(i), None) => Ok(DraftField::Description(i)),
            ("callouts", Some(i), None) => Ok(DraftField::Callout(i)),
            ("structuredSnippets", Some(i), None) => Ok(DraftField::StructuredSnippet(i)),
            ("negativeKeywords", Some(i), None) => Ok(DraftField::NegativeKeyword(i)),
            ("keywords", None, Some(rest)) => match split_index(rest) {
                Some((kind, Some(i))) => {
                    let match_type = kind.parse().map_err(|_| unknown())?;
                    Ok(DraftField::Keyword(match_type, i))
                }
                _ => Err(unknown()),
            },
            ("sitelinks", Some(i), Some(part)) => {
                let part = match part {
                    "text" => SitelinkPart::Text,
                    "description1" => SitelinkPart::Description1,
                    "description2" => SitelinkPart::Description2,
                    _ => return Err(unknown()),
                };
                Ok(DraftField::Sitelink(i, part))
            }
            _ => Err(unknown()),
        }
    }
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftField::FinalUrl => f.write_str("finalUrl"),
            DraftField::DisplayPath1 => f.write_str("displayPath1"),
            DraftField::DisplayPath2 => f.write_str("displayPath2"),
            DraftField::CompanyName => f.write_str("companyName"),
            DraftField::Headline(i) => write!(f, "headlines[{i}]"),
            DraftField::Description(i) => write!(f, "descriptions[{i}]"),
            DraftField::Callout(i) => write!(f, "callouts[{i}]"),
            DraftField::StructuredSnippet(i) => write!(f, "structuredSnippets[{i}]"),
            DraftField::NegativeKeyword(i) => write!(f, "negativeKeywords[{i}]"),
            DraftField::Keyword(match_type, i) => {
                write!(f, "keywords.{}[{i}]", match_type.as_str())
            }
            DraftField::Sitelink(i, part) => write!(f, "sitelinks[{i}].{}", part.as_str()),
        }
    }
}

impl CampaignDraft {
    pub fn keywords_for(&self, match_type: MatchType) -> &[String] {
        match match_type {
            MatchType::Broad => &self.keywords.broad,
            MatchType::Phrase => &self.keywords.phrase,
            MatchType::Exact => &self.keywords.exact,
        }
    }

    pub fn text(&self, field: &DraftField) -> Result<&str, EditError> {
        fn item<'a, T>(list: &'a [T], field: &DraftField, index: usize) -> Result<&'a T, EditError> {
            list.get(index).ok_or_else(|| EditError::IndexOutOfRange {
                field: field.to_string(),
                index,
                len: list.len(),
            })
        }

        let text: &str = match *field {
            DraftField::FinalUrl => &self.final_url,
            DraftField::DisplayPath1 => &self.display_path1,
            DraftField::DisplayPath2 => &self.display_path2,
            DraftField::CompanyName => &self.company_name,
            DraftField::Headline(i) => item(&self.headlines, field, i)?,
            DraftField::Description(i) => item(&self.descriptions, field, i)?,
            DraftField::Callout(i) => item(&self.callouts, field, i)?,
            DraftField::StructuredSnippet(i) => item(&self.structured_snippets, field, i)?,
            DraftField::NegativeKeyword(i) => item(&self.negative_keywords, field, i)?,
            DraftField::Keyword(match_type, i) => item(self.keywords_for(match_type), field, i)?,
            DraftField::Sitelink(i, part) => {
                let sitelink = item(&self.sitelinks, field, i)?;
                match part {
                    SitelinkPart::Text => &sitelink.text,
                    SitelinkPart::Description1 => &sitelink.description1,
                    SitelinkPart::Description2 => &sitelink.description2,
                }
            }
        };
        Ok(text)
    }

    /// Strips match-type syntax from stored keyword terms.
    pub fn normalize_keywords(&mut self) {
        for match_type in [MatchType::Broad, MatchType::Phrase, MatchType::Exact] {
            let terms = match match_type {
                MatchType::Broad => &mut self.keywords.broad,
                MatchType::Phrase => &mut self.keywords.phrase,
                MatchType::Exact => &mut self.keywords.exact,
            };
            for term in terms.iter_mut() {
                let bare = match_type.strip(term);
                if bare.len() != term.len() {
                    *term = bare.to_string();
                }
            }
        }
    }

    /// Replaces the text at `field`, leaving every list length unchanged.
    pub fn replace_text(&mut self, field: &DraftField, text: &str) -> Result<(), EditError> {
        let value = match field {
            DraftField::Keyword(match_type, _) => match_type.strip(text).to_string(),
            _ => text.to_string(),
        };
        *self.slot_mut(field)? = value;
        Ok(())
    }

    fn slot_mut(&mut self, field: &DraftField) -> Result<&mut String, EditError> {
        fn item<'a, T>(
            list: &'a mut [T],
            field: &DraftField,
            index: usize,
        ) -> Result<&'a mut T, EditError> {
            let len = list.len();
            list.get_mut(index).ok_or_else(|| EditError::IndexOutOfRange {
                field: field.to_string(),
                index,
                len,
            })
        }

        let slot = match *field {
            DraftField::FinalUrl => &mut self.final_url,
            DraftField::DisplayPath1 => &mut self.display_path1,
            DraftField::DisplayPath2 => &mut self.display_path2,
            DraftField::CompanyName => &mut self.company_name,
            DraftField::Headline(i) => item(&mut self.headlines, field, i)?,
            DraftField::Description(i) => item(&mut self.descriptions, field, i)?,
            DraftField::Callout(i) => item(&mut self.callouts, field, i)?,
            DraftField::StructuredSnippet(i) => item(&mut self.structured_snippets, field, i)?,
            DraftField::NegativeKeyword(i) => item(&mut self.negative_keywords, field, i)?,
            DraftField::Keyword(MatchType::Broad, i) => item(&mut self.keywords.broad, field, i)?,
            DraftField::Keyword(MatchType::Phrase, i) => item(&mut self.keywords.phrase, field, i)?,
            DraftField::Keyword(MatchType::Exact, i) => item(&mut self.keywords.exact, field, i)?,
            DraftField::Sitelink(i, part) => {
                let sitelink = item(&mut self.sitelinks, field, i)?;
                match part {
                    SitelinkPart::Text => &mut sitelink.text,
                    SitelinkPart::Description1 => &mut sitelink.description1,
                    SitelinkPart::Description2 => &mut sitelink.description2,
                }
            }
        };
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_draft;

    #[test]
    fn json_round_trip_keeps_every_field() {
        let draft = sample_draft();
        let json = serde_json::to_string(&draft).unwrap();
        let parsed: CampaignDraft = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, draft);
    }

    #[test]
    fn json_round_trip_keeps_empty_lists() {
        let draft = CampaignDraft {
            final_url: "https://example.com".to_string(),
            company_name: "Example".to_string(),
            ..CampaignDraft::default()
        };
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["negativeKeywords"], serde_json::json!([]));
        assert_eq!(json["keywords"]["exact"], serde_json::json!([]));
        let parsed: CampaignDraft = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, draft);
    }

    #[test]
    fn missing_field_is_rejected() {
        let mut json = serde_json::to_value(sample_draft()).unwrap();
        json.as_object_mut().unwrap().remove("sitelinks");
        assert!(serde_json::from_value::<CampaignDraft>(json).is_err());
    }

    #[test]
    fn parses_field_paths() {
        assert_eq!("finalUrl".parse(), Ok(DraftField::FinalUrl));
        assert_eq!("headlines[3]".parse(), Ok(DraftField::Headline(3)));
        assert_eq!(
            "keywords.exact[0]".parse(),
            Ok(DraftField::Keyword(MatchType::Exact, 0))
        );
        assert_eq!(
            "sitelinks[1].description2".parse(),
            Ok(DraftField::Sitelink(1, SitelinkPart::Description2))
        );
        for bad in ["headlines", "finalUrl[0]", "keywords.fuzzy[0]", "sitelinks[0]", "headlines[x]", "nope"] {
            assert!(bad.parse::<DraftField>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn field_paths_display_as_parsed() {
        for path in ["companyName", "callouts[2]", "keywords.phrase[4]", "sitelinks[0].text"] {
            let field: DraftField = path.parse().unwrap();
            assert_eq!(field.to_string(), path);
        }
    }

    #[test]
    fn replace_text_edits_in_place() {
        let mut draft = sample_draft();
        let before = draft.headlines.len();
        draft
            .replace_text(&DraftField::Headline(1), "Same-Day Repairs")
            .unwrap();
        draft
            .replace_text(&DraftField::Sitelink(0, SitelinkPart::Description1), "Book online")
            .unwrap();
        assert_eq!(draft.headlines[1], "Same-Day Repairs");
        assert_eq!(draft.headlines.len(), before);
        assert_eq!(draft.sitelinks[0].description1, "Book online");
    }

    #[test]
    fn keyword_edits_store_bare_terms() {
        let mut draft = sample_draft();
        draft
            .replace_text(&DraftField::Keyword(MatchType::Phrase, 0), " \"emergency plumber\" ")
            .unwrap();
        draft
            .replace_text(&DraftField::Keyword(MatchType::Exact, 0), "[plumber near me]")
            .unwrap();
        assert_eq!(draft.keywords.phrase[0], "emergency plumber");
        assert_eq!(draft.keywords.exact[0], "plumber near me");
    }

    #[test]
    fn out_of_range_edit_leaves_draft_untouched() {
        let mut draft = sample_draft();
        let original = draft.clone();
        let err = draft
            .replace_text(&DraftField::Callout(99), "x")
            .unwrap_err();
        assert_eq!(
            err,
            EditError::IndexOutOfRange {
                field: "callouts[99]".to_string(),
                index: 99,
                len: original.callouts.len(),
            }
        );
        assert_eq!(draft, original);
    }

    #[test]
    fn decorate_and_strip_are_inverse() {
        for match_type in [MatchType::Broad, MatchType::Phrase, MatchType::Exact] {
            let decorated = match_type.decorate("water heater repair");
            assert_eq!(match_type.strip(&decorated), "water heater repair");
        }
        assert_eq!(MatchType::Exact.decorate("a b"), "[a b]");
        assert_eq!(MatchType::Phrase.decorate("a b"), "\"a b\"");
    }
}
