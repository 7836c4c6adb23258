//! Date signal extraction from free-text episode titles
//!
//! Full-show episodes carry a readable calendar date in their title, while
//! clips and bonus segments do not. This module decides whether a title
//! genuinely encodes a date, rejecting stray numbers, years and other digit
//! sequences a naive parser would mis-accept.

use chrono::{Datelike, Local, NaiveDate};

/// Lowercase weekday names, Monday first
const WEEKDAY_NAMES: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Lowercase month names, January first
const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Extracts a calendar date from an episode title, anchored at the current
/// local date.
///
/// See [`extract_date_at`] for the algorithm; this convenience wrapper is
/// what the orchestrator would use when no explicit anchor is configured.
pub fn extract_date(title: &str) -> Option<NaiveDate> {
    extract_date_at(title, Local::now().date_naive())
}

/// Extracts a calendar date from an episode title.
///
/// The title is split into whitespace-delimited tokens which are tried in
/// order. Tokens containing a weekday name are informational and never the
/// date signal itself, so they are skipped before parsing. Each remaining
/// token is parsed as a date fragment; partial fragments (a lone month name,
/// a lone day numeral) are completed from `reference`, matching the
/// daily-cron deployment where the run executes the day the episode posts.
///
/// Date parsing over free text is unpredictable when titles contain years or
/// track numbers, so a parsed candidate is only accepted when both its month
/// (as numeral or full name) and its day (as numeral) resurface somewhere in
/// the title. The first token passing all checks wins.
///
/// Returns `None` when no token qualifies.
pub fn extract_date_at(title: &str, reference: NaiveDate) -> Option<NaiveDate> {
    let lowercase_title = title.to_lowercase();

    for token in title.split_whitespace() {
        let lowercase_token = token.to_lowercase();
        if WEEKDAY_NAMES
            .iter()
            .any(|weekday| lowercase_token.contains(weekday))
        {
            continue;
        }

        let Some(candidate) = parse_fragment(token, reference) else {
            continue;
        };

        let month_name = MONTH_NAMES[candidate.month0() as usize];
        if !title.contains(&candidate.month().to_string())
            && !lowercase_title.contains(month_name)
        {
            continue;
        }
        if !title.contains(&candidate.day().to_string()) {
            continue;
        }

        return Some(candidate);
    }

    None
}

/// Parses a single token as a date fragment, completing missing fields from
/// `reference`. Punctuation around the token ("March," / "(3/4)") is
/// ignored. Invalid calendar combinations fail the parse.
fn parse_fragment(token: &str, reference: NaiveDate) -> Option<NaiveDate> {
    let trimmed = token.trim_matches(|c: char| !c.is_ascii_alphanumeric());
    if trimmed.is_empty() {
        return None;
    }

    if let Some(month) = month_from_name(trimmed) {
        return NaiveDate::from_ymd_opt(reference.year(), month, reference.day());
    }

    if let Some(number) = day_or_year_number(trimmed) {
        return match number {
            1..=31 => NaiveDate::from_ymd_opt(reference.year(), reference.month(), number),
            32..=9999 => {
                NaiveDate::from_ymd_opt(expand_year(number), reference.month(), reference.day())
            }
            _ => None,
        };
    }

    parse_composite(trimmed, reference)
}

/// Matches a full month name or its three-letter abbreviation,
/// case-insensitively. Returns the one-based month number.
fn month_from_name(token: &str) -> Option<u32> {
    let lowercase = token.to_lowercase();
    MONTH_NAMES
        .iter()
        .position(|name| lowercase == *name || (lowercase.len() == 3 && name.starts_with(&lowercase)))
        .map(|index| index as u32 + 1)
}

/// Parses a plain numeral, allowing an ordinal suffix ("4th", "21st").
fn day_or_year_number(token: &str) -> Option<u32> {
    let lowercase = token.to_lowercase();
    let digits = ["st", "nd", "rd", "th"]
        .iter()
        .find_map(|suffix| lowercase.strip_suffix(*suffix))
        .unwrap_or(&lowercase);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Parses `/` or `-` separated composites: "3/4", "3/4/24", "2024-03-04".
/// Month-first order, unless the leading number can only be a year.
fn parse_composite(token: &str, reference: NaiveDate) -> Option<NaiveDate> {
    let parts: Vec<u32> = token
        .split(['/', '-'])
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;

    match parts[..] {
        [month, day] => NaiveDate::from_ymd_opt(reference.year(), month, day),
        [year, month, day] if year > 31 => NaiveDate::from_ymd_opt(expand_year(year), month, day),
        [month, day, year] => NaiveDate::from_ymd_opt(expand_year(year), month, day),
        _ => None,
    }
}

fn expand_year(year: u32) -> i32 {
    if year < 100 { 2000 + year as i32 } else { year as i32 }
}
