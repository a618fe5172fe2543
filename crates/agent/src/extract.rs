use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};

use frontdesk_core::collection::{Affirmation, TurnFacts};
use frontdesk_core::domain::appointment::AppointmentCategory;
use frontdesk_core::schedule::parse_weekday;

/// Deterministic field extraction from one user turn. This is intentionally
/// not a language model: the same utterance always yields the same facts,
/// and anything it cannot read with certainty is simply absent.
pub struct TurnExtractor {
    today: NaiveDate,
}

impl TurnExtractor {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn extract(&self, text: &str) -> TurnFacts {
        let normalized = normalize_text(text);
        let tokens = tokenize(&normalized);

        TurnFacts {
            full_name: extract_name(text),
            category: extract_category(&normalized),
            date: extract_date(&tokens, &normalized, self.today),
            time: extract_time(&tokens),
            weekday: extract_weekday(&tokens),
            affirmation: detect_affirmation(&normalized, &tokens),
        }
    }
}

fn normalize_text(text: &str) -> String {
    text.to_lowercase()
}

fn tokenize(normalized: &str) -> Vec<String> {
    normalized
        .split_whitespace()
        .map(|token| token.trim_matches(|ch: char| ",.;!?()".contains(ch)).to_owned())
        .filter(|token| !token.is_empty())
        .collect()
}

fn extract_date(tokens: &[String], normalized: &str, today: NaiveDate) -> Option<NaiveDate> {
    if normalized.contains("tomorrow") {
        return today.succ_opt();
    }
    if tokens.iter().any(|token| token == "today") {
        return Some(today);
    }

    for token in tokens {
        if let Some(date) = parse_slash_date(token, today) {
            return Some(date);
        }
        if let Some(date) = parse_iso_date(token) {
            return Some(date);
        }
    }
    None
}

/// DD/MM/YYYY, with a two-part DD/MM form defaulting to the current year.
fn parse_slash_date(token: &str, today: NaiveDate) -> Option<NaiveDate> {
    let parts: Vec<&str> = token.split('/').collect();
    match parts.as_slice() {
        [day, month, year] => {
            NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
        }
        [day, month] => {
            NaiveDate::from_ymd_opt(today.year(), month.parse().ok()?, day.parse().ok()?)
        }
        _ => None,
    }
}

fn parse_iso_date(token: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = token.split('-').collect();
    match parts.as_slice() {
        [year, month, day] if year.len() == 4 => {
            NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
        }
        _ => None,
    }
}

fn extract_time(tokens: &[String]) -> Option<NaiveTime> {
    for token in tokens {
        if let Some((hour, minute)) = token.split_once(':') {
            if let (Ok(hour), Ok(minute)) = (hour.parse::<u32>(), minute.parse::<u32>()) {
                if let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) {
                    return Some(time);
                }
            }
            continue;
        }
        if let Some(raw_hour) = token.strip_suffix("am") {
            if let Ok(hour) = raw_hour.parse::<u32>() {
                return NaiveTime::from_hms_opt(hour % 12, 0, 0);
            }
        }
        if let Some(raw_hour) = token.strip_suffix("pm") {
            if let Ok(hour) = raw_hour.parse::<u32>() {
                return NaiveTime::from_hms_opt(hour % 12 + 12, 0, 0);
            }
        }
    }
    None
}

fn extract_weekday(tokens: &[String]) -> Option<Weekday> {
    tokens.iter().find_map(|token| parse_weekday(token))
}

fn extract_category(normalized: &str) -> Option<AppointmentCategory> {
    if normalized.contains("insurance") {
        return Some(AppointmentCategory::Insurance);
    }
    if normalized.contains("self-pay")
        || normalized.contains("self pay")
        || normalized.contains("private")
    {
        return Some(AppointmentCategory::SelfPay);
    }
    None
}

const NAME_STOPWORDS: [&str; 16] = [
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday", "insurance",
    "private", "yes", "no", "hello", "hi", "thanks", "today", "tomorrow",
];

fn extract_name(text: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    for marker in ["my name is ", "name is ", "name: "] {
        if let Some(position) = lowered.find(marker) {
            let tail = text.get(position + marker.len()..).unwrap_or("");
            let name = name_words(tail);
            if !name.is_empty() {
                return Some(name.join(" "));
            }
        }
    }

    // A bare reply of two to four capitalized words reads as a full name.
    let words: Vec<&str> = text.split_whitespace().collect();
    if (2..=4).contains(&words.len()) && words.iter().all(|word| is_name_word(word)) {
        return Some(words.join(" "));
    }
    None
}

fn name_words(tail: &str) -> Vec<&str> {
    tail.split_whitespace()
        .take_while(|word| is_name_word(word))
        .take(4)
        .collect()
}

fn is_name_word(word: &str) -> bool {
    let trimmed = word.trim_matches(|ch: char| ",.;!?".contains(ch));
    let mut chars = trimmed.chars();
    let leading_uppercase = chars.next().is_some_and(|first| first.is_uppercase());
    leading_uppercase
        && chars.all(|ch| ch.is_alphabetic() || ch == '-' || ch == '\'')
        && !NAME_STOPWORDS.contains(&trimmed.to_lowercase().as_str())
}

const AFFIRMATIVE_TOKENS: [&str; 9] =
    ["yes", "yep", "yeah", "sure", "ok", "okay", "confirm", "confirmed", "correct"];
const AFFIRMATIVE_PHRASES: [&str; 5] =
    ["that works", "sounds good", "go ahead", "book it", "please do"];
const NEGATIVE_TOKENS: [&str; 4] = ["no", "nope", "not", "wrong"];
const NEGATIVE_PHRASES: [&str; 4] = ["don't", "do not", "another time", "changed my mind"];

fn detect_affirmation(normalized: &str, tokens: &[String]) -> Affirmation {
    // Negation wins over affirmation: "no, that works for another day" must
    // never confirm.
    if NEGATIVE_TOKENS.iter().any(|token| tokens.iter().any(|candidate| candidate == token))
        || NEGATIVE_PHRASES.iter().any(|phrase| normalized.contains(phrase))
    {
        return Affirmation::Negative;
    }
    if AFFIRMATIVE_TOKENS.iter().any(|token| tokens.iter().any(|candidate| candidate == token))
        || AFFIRMATIVE_PHRASES.iter().any(|phrase| normalized.contains(phrase))
    {
        return Affirmation::Affirmative;
    }
    Affirmation::Unclear
}
