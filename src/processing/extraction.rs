use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

use crate::models::ExtractedEvent;

const SNIPPET_MAX_CHARS: usize = 200;

fn numeric_date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\d{1,2}/\d{1,2}/\d{4}\b").unwrap())
}

fn written_date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"\b(?:January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\.?\s+\d{1,2},?\s+\d{4}\b",
        )
        .unwrap()
    })
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let cleaned = raw.replace('.', "").replace(',', "");
    NaiveDate::parse_from_str(raw, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(&cleaned, "%B %d %Y"))
        .or_else(|_| NaiveDate::parse_from_str(&cleaned, "%b %d %Y"))
        .ok()
}

/// Walk text line by line and surface every line anchored by a parseable
/// date as a timeline candidate. Callers pass redacted text, so masked
/// spans never reach the timeline.
pub fn extract_events(text: &str) -> Vec<ExtractedEvent> {
    let mut events = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let matched = numeric_date_pattern()
            .find(line)
            .or_else(|| written_date_pattern().find(line));

        let Some(matched) = matched else { continue };
        let Some(occurred_on) = parse_date(matched.as_str()) else {
            continue;
        };

        let snippet: String = line.chars().take(SNIPPET_MAX_CHARS).collect();
        events.push(ExtractedEvent {
            occurred_on,
            snippet,
        });
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_numeric_dates() {
        let text = "Filed complaint on 03/15/2024 with the county office.\nNo dates here.";
        let events = extract_events(text);

        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].occurred_on,
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
        assert!(events[0].snippet.contains("Filed complaint"));
    }

    #[test]
    fn extracts_written_dates() {
        let text = "Hearing scheduled for January 9, 2025 at the courthouse.";
        let events = extract_events(text);

        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].occurred_on,
            NaiveDate::from_ymd_opt(2025, 1, 9).unwrap()
        );
    }

    #[test]
    fn one_event_per_dated_line() {
        let text = "01/01/2024 intake\n02/02/2024 follow-up\nplain line\n03/03/2024 closed";
        let events = extract_events(text);
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn skips_unparseable_dates() {
        // Matches the numeric pattern but is not a real calendar date
        let events = extract_events("Reviewed on 13/45/2024 by staff.");
        assert!(events.is_empty());
    }

    #[test]
    fn truncates_long_snippets() {
        let long_tail = "x".repeat(500);
        let text = format!("Event on 05/05/2023 {long_tail}");
        let events = extract_events(&text);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].snippet.chars().count(), 200);
    }

    #[test]
    fn masked_dates_do_not_anchor_events() {
        let events = extract_events("[REDACTED:DATE_OF_BIRTH] noted in intake form.");
        assert!(events.is_empty());
    }
}
