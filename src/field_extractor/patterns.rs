//! Regex patterns per metric field, compiled once
//!
//! German and English phrasings. Hour forms are converted to minutes.
//! Patterns are tried in order; within one pattern every match in the text
//! is a candidate.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::selectors::MetricField;

/// How captured groups turn into a number of minutes (or a count)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    /// Group `m` in minutes
    Minutes,
    /// Group `h` in hours, decimal comma or point allowed
    Hours,
    /// Groups `h` and `m`
    HoursMinutes,
    /// Group `n` as a plain count
    Count,
    /// A phrase with an implied value ("vor einer Stunde")
    Fixed(u32),
}

#[derive(Debug)]
pub struct FieldPattern {
    regex: Regex,
    scale: Scale,
}

impl FieldPattern {
    fn new(pattern: &str, scale: Scale) -> Self {
        Self {
            regex: Regex::new(pattern).expect("Invalid field regex"),
            scale,
        }
    }

    #[must_use]
    pub fn scale(&self) -> Scale {
        self.scale
    }

    /// Every value this pattern reads from `text`, in order of appearance
    pub fn candidates<'a>(&'a self, text: &'a str) -> impl Iterator<Item = u32> + 'a {
        self.regex
            .captures_iter(text)
            .filter_map(move |caps| self.value_of(&caps))
    }

    fn value_of(&self, caps: &Captures<'_>) -> Option<u32> {
        let int = |name: &str| caps.name(name)?.as_str().parse::<u32>().ok();
        match self.scale {
            Scale::Minutes => int("m"),
            Scale::Count => int("n"),
            Scale::Hours => {
                let hours: f64 = caps.name("h")?.as_str().replace(',', ".").parse().ok()?;
                Some((hours * 60.0).round() as u32)
            }
            Scale::HoursMinutes => Some(int("h")?.checked_mul(60)?.checked_add(int("m")?)?),
            Scale::Fixed(value) => Some(value),
        }
    }
}

const MINUTE_UNIT: &str = r"(?:minuten|minutes|minute|mins|min)\b\.?";
const HOUR_UNIT: &str = r"(?:stunden|stunde|std|hours|hour|hrs|h)\b\.?";
const WAIT_LABEL: &str = r"(?:wartezeit|wait(?:ing)?\s*time|wait)";

static WAIT_TIME_PATTERNS: Lazy<Vec<FieldPattern>> = Lazy::new(|| {
    vec![
        // "1 Std. 30 Min", "2 h and 5 min"
        FieldPattern::new(
            &format!(r"(?i)\b(?P<h>\d{{1,2}})\s*{HOUR_UNIT}\s*(?:und\s+|and\s+)?(?P<m>\d{{1,2}})\s*{MINUTE_UNIT}"),
            Scale::HoursMinutes,
        ),
        // "Wartezeit: 45 min", "Wait time approx. 45 minutes"
        FieldPattern::new(
            &format!(r"(?i){WAIT_LABEL}\D{{0,30}}?\b(?P<m>\d{{1,4}})\s*{MINUTE_UNIT}"),
            Scale::Minutes,
        ),
        // "Wartezeit: 1,5 Stunden"
        FieldPattern::new(
            &format!(r"(?i){WAIT_LABEL}\D{{0,30}}?\b(?P<h>\d{{1,2}}(?:[.,]\d)?)\s*{HOUR_UNIT}"),
            Scale::Hours,
        ),
        // "ca. 45 Minuten"
        FieldPattern::new(&format!(r"(?i)\b(?P<m>\d{{1,4}})\s*{MINUTE_UNIT}"), Scale::Minutes),
        // "2 Stunden"
        FieldPattern::new(
            &format!(r"(?i)\b(?P<h>\d{{1,2}}(?:[.,]\d)?)\s*{HOUR_UNIT}"),
            Scale::Hours,
        ),
        // bare attribute value: "45"
        FieldPattern::new(r"^\s*(?P<m>\d{1,4})\s*$", Scale::Minutes),
    ]
});

fn count_patterns(label: &str) -> Vec<FieldPattern> {
    vec![
        // "12 Patienten"
        FieldPattern::new(&format!(r"(?i)\b(?P<n>\d{{1,4}})\s*(?:{label})"), Scale::Count),
        // "Patienten in Behandlung: 12"
        FieldPattern::new(
            &format!(r"(?i)(?:{label})[^\d\n]{{0,40}}?\b(?P<n>\d{{1,4}})\b"),
            Scale::Count,
        ),
        FieldPattern::new(r"^\s*(?P<n>\d{1,4})\s*$", Scale::Count),
    ]
}

static TOTAL_PATIENTS_PATTERNS: Lazy<Vec<FieldPattern>> =
    Lazy::new(|| count_patterns(r"patienten|patients|personen|people"));

static AMBULANCE_PATTERNS: Lazy<Vec<FieldPattern>> = Lazy::new(|| {
    count_patterns(r"rettungsdienst\w*|rettungswagen|krankenwagen|ambulances?|ambulanz")
});

static EMERGENCY_PATTERNS: Lazy<Vec<FieldPattern>> = Lazy::new(|| {
    count_patterns(r"notfälle|notfaelle|notfall\w*|emergency cases|emergencies")
});

static UPDATE_DELAY_PATTERNS: Lazy<Vec<FieldPattern>> = Lazy::new(|| {
    vec![
        FieldPattern::new(&format!(r"(?i)\bvor\s+(?P<m>\d{{1,4}})\s*{MINUTE_UNIT}"), Scale::Minutes),
        FieldPattern::new(&format!(r"(?i)\bvor\s+(?P<h>\d{{1,2}})\s*{HOUR_UNIT}"), Scale::Hours),
        FieldPattern::new(
            r"(?i)\b(?P<m>\d{1,4})\s*(?:minutes|minute|mins|min)\.?\s+ago\b",
            Scale::Minutes,
        ),
        FieldPattern::new(r"(?i)\b(?P<h>\d{1,2})\s*(?:hours|hour|hrs|h)\.?\s+ago\b", Scale::Hours),
        FieldPattern::new(
            r"(?i)\b(?:gerade\s+(?:eben|aktualisiert)|soeben|just\s+now)\b",
            Scale::Fixed(0),
        ),
        FieldPattern::new(r"(?i)\bvor\s+einer\s+minute\b|\ba\s+minute\s+ago\b", Scale::Fixed(1)),
        FieldPattern::new(r"(?i)\bvor\s+einer\s+stunde\b|\ban\s+hour\s+ago\b", Scale::Fixed(60)),
        FieldPattern::new(r"^\s*(?P<m>\d{1,4})\s*$", Scale::Minutes),
    ]
});

/// Freshness phrases, removed before reading durations or counts so that
/// "vor 3 min" is never taken for a wait time
pub static FRESHNESS_PHRASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\bvor\s+\d{{1,4}}\s*(?:{MINUTE_UNIT}|{HOUR_UNIT})|\b\d{{1,4}}\s*(?:minutes|minute|mins|min|hours|hour|hrs|h)\.?\s+ago\b"
    ))
    .expect("Invalid freshness regex")
});

/// Durations, removed before reading counts so "45 min" is never a patient count
pub static DURATION_PHRASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b\d{{1,4}}(?:[.,]\d)?\s*(?:{MINUTE_UNIT}|{HOUR_UNIT})"
    ))
    .expect("Invalid duration regex")
});

/// Priority-ordered patterns for `field`
#[must_use]
pub fn patterns_for(field: MetricField) -> &'static [FieldPattern] {
    match field {
        MetricField::WaitTime => &WAIT_TIME_PATTERNS,
        MetricField::TotalPatients => &TOTAL_PATIENTS_PATTERNS,
        MetricField::AmbulancePatients => &AMBULANCE_PATTERNS,
        MetricField::EmergencyCases => &EMERGENCY_PATTERNS,
        MetricField::LastUpdate => &UPDATE_DELAY_PATTERNS,
    }
}
