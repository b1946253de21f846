//! Plain-text and CSV renderings of a draft. Keyword match types are decorated
//! here and nowhere else.

use std::borrow::Cow;
use std::fmt;

use crate::draft::{CampaignDraft, MatchType};

const MATCH_TYPES: [MatchType; 3] = [MatchType::Broad, MatchType::Phrase, MatchType::Exact];

fn match_type_title(match_type: MatchType) -> &'static str {
    match match_type {
        MatchType::Broad => "Broad match keywords",
        MatchType::Phrase => "Phrase match keywords",
        MatchType::Exact => "Exact match keywords",
    }
}

struct TextExport<'a>(&'a CampaignDraft);

impl fmt::Display for TextExport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn section<I, S>(f: &mut fmt::Formatter<'_>, title: &str, items: I) -> fmt::Result
        where
            I: IntoIterator<Item = S>,
            S: fmt::Display,
        {
            writeln!(f)?;
            writeln!(f, "{title}")?;
            for (i, item) in items.into_iter().enumerate() {
                writeln!(f, "  {}. {item}", i + 1)?;
            }
            Ok(())
        }

        let draft = self.0;
        writeln!(f, "Company: {}", draft.company_name)?;
        writeln!(f, "Final URL: {}", draft.final_url)?;
        writeln!(f, "Display path: /{}/{}", draft.display_path1, draft.display_path2)?;

        section(f, "Headlines", &draft.headlines)?;
        section(f, "Descriptions", &draft.descriptions)?;
        for match_type in MATCH_TYPES {
            let decorated = draft
                .keywords_for(match_type)
                .iter()
                .map(|term| match_type.decorate(term));
            section(f, match_type_title(match_type), decorated)?;
        }

        writeln!(f)?;
        writeln!(f, "Sitelinks")?;
        for (i, sitelink) in draft.sitelinks.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, sitelink.text)?;
            writeln!(f, "     {}", sitelink.description1)?;
            writeln!(f, "     {}", sitelink.description2)?;
        }

        section(f, "Callouts", &draft.callouts)?;
        section(f, "Structured snippets", &draft.structured_snippets)?;
        section(f, "Negative keywords", &draft.negative_keywords)
    }
}

pub fn to_text(draft: &CampaignDraft) -> String {
    TextExport(draft).to_string()
}

fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// `Section,Item,Value` rows; `Item` is the 1-based position within the section.
pub fn to_csv(draft: &CampaignDraft) -> String {
    let mut rows: Vec<(&str, usize, Cow<'_, str>)> = vec![
        ("Company name", 1, Cow::Borrowed(draft.company_name.as_str())),
        ("Final URL", 1, Cow::Borrowed(draft.final_url.as_str())),
        ("Display path 1", 1, Cow::Borrowed(draft.display_path1.as_str())),
        ("Display path 2", 1, Cow::Borrowed(draft.display_path2.as_str())),
    ];

    let mut list = |section: &'static str, items: &[String]| {
        for (i, item) in items.iter().enumerate() {
            rows.push((section, i + 1, Cow::Owned(item.clone())));
        }
    };
    list("Headline", &draft.headlines);
    list("Description", &draft.descriptions);
    list("Callout", &draft.callouts);
    list("Structured snippet", &draft.structured_snippets);
    list("Negative keyword", &draft.negative_keywords);

    for match_type in MATCH_TYPES {
        for (i, term) in draft.keywords_for(match_type).iter().enumerate() {
            rows.push((match_type_title(match_type), i + 1, Cow::Owned(match_type.decorate(term))));
        }
    }
    for (i, sitelink) in draft.sitelinks.iter().enumerate() {
        rows.push(("Sitelink text", i + 1, Cow::Borrowed(sitelink.text.as_str())));
        rows.push(("Sitelink description 1", i + 1, Cow::Borrowed(sitelink.description1.as_str())));
        rows.push(("Sitelink description 2", i + 1, Cow::Borrowed(sitelink.description2.as_str())));
    }

    let mut out = String::from("Section,Item,Value\r\n");
    for (section, item, value) in rows {
        out.push_str(&csv_field(section));
        out.push(',');
        out.push_str(&item.to_string());
        out.push(',');
        out.push_str(&csv_field(&value));
        out.push_str("\r\n");
    }
    out
}
