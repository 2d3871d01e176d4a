//! Selector strategies per metric field
//!
//! Each field carries an ordered list of ways to locate it on the page. The
//! lists overlap on purpose: the hospital site changes markup without notice
//! and any one strategy may stop matching. Strategies are plain data so each
//! entry can be tested on its own.

use std::fmt;
use std::ops::RangeInclusive;

/// Semantic values read from the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricField {
    WaitTime,
    TotalPatients,
    AmbulancePatients,
    EmergencyCases,
    LastUpdate,
}

/// How a strategy finds its element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// First element matching a CSS selector
    Css(&'static str),
    /// Innermost element whose text contains the label (case-insensitive)
    TextContains(&'static str),
}

/// One entry of a field's priority list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorStrategy {
    pub locator: Locator,
    /// Read this attribute instead of the element text
    pub attribute: Option<&'static str>,
}

impl SelectorStrategy {
    pub const fn css(selector: &'static str) -> Self {
        Self {
            locator: Locator::Css(selector),
            attribute: None,
        }
    }

    pub const fn css_attr(selector: &'static str, attribute: &'static str) -> Self {
        Self {
            locator: Locator::Css(selector),
            attribute: Some(attribute),
        }
    }

    pub const fn text(label: &'static str) -> Self {
        Self {
            locator: Locator::TextContains(label),
            attribute: None,
        }
    }

    /// Stable key under which the captured text is stored
    #[must_use]
    pub fn key(&self, field: MetricField) -> String {
        format!("{field}|{self}")
    }
}

impl fmt::Display for SelectorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.locator, self.attribute) {
            (Locator::Css(sel), Some(attr)) => write!(f, "css:{sel}@{attr}"),
            (Locator::Css(sel), None) => write!(f, "css:{sel}"),
            (Locator::TextContains(label), _) => write!(f, "text:{label}"),
        }
    }
}

const WAIT_TIME_STRATEGIES: &[SelectorStrategy] = &[
    SelectorStrategy::css_attr("[data-wait-time]", "data-wait-time"),
    SelectorStrategy::css_attr("[data-wartezeit]", "data-wartezeit"),
    SelectorStrategy::css("#wartezeit"),
    SelectorStrategy::css("#wait-time"),
    SelectorStrategy::css(".wartezeit"),
    SelectorStrategy::css(".wait-time"),
    SelectorStrategy::css("[class*='wartezeit']"),
    SelectorStrategy::css("[class*='waiting-time']"),
    SelectorStrategy::css("[class*='wait-time']"),
    SelectorStrategy::text("Wartezeit"),
    SelectorStrategy::text("Waiting time"),
    SelectorStrategy::text("Wait time"),
];

const TOTAL_PATIENTS_STRATEGIES: &[SelectorStrategy] = &[
    SelectorStrategy::css_attr("[data-patients]", "data-patients"),
    SelectorStrategy::css("#patienten"),
    SelectorStrategy::css(".patienten-gesamt"),
    SelectorStrategy::css(".patients-total"),
    SelectorStrategy::css("[class*='patienten']"),
    SelectorStrategy::css("[class*='patient-count']"),
    SelectorStrategy::text("Patienten in Behandlung"),
    SelectorStrategy::text("Patients in treatment"),
    SelectorStrategy::text("Patienten"),
    SelectorStrategy::text("Patients"),
];

const AMBULANCE_STRATEGIES: &[SelectorStrategy] = &[
    SelectorStrategy::css_attr("[data-ambulance]", "data-ambulance"),
    SelectorStrategy::css(".rettungsdienst"),
    SelectorStrategy::css(".ambulance"),
    SelectorStrategy::css("[class*='rettungsdienst']"),
    SelectorStrategy::css("[class*='ambulance']"),
    SelectorStrategy::text("Rettungsdienst"),
    SelectorStrategy::text("Rettungswagen"),
    SelectorStrategy::text("Ambulance"),
];

const EMERGENCY_STRATEGIES: &[SelectorStrategy] = &[
    SelectorStrategy::css_attr("[data-emergencies]", "data-emergencies"),
    SelectorStrategy::css(".notfaelle"),
    SelectorStrategy::css(".emergency-cases"),
    SelectorStrategy::css("[class*='notfall']"),
    SelectorStrategy::css("[class*='emergency']"),
    SelectorStrategy::text("Notfälle"),
    SelectorStrategy::text("Notfaelle"),
    SelectorStrategy::text("Emergency cases"),
];

const LAST_UPDATE_STRATEGIES: &[SelectorStrategy] = &[
    SelectorStrategy::css_attr("time[datetime]", "datetime"),
    SelectorStrategy::css_attr("[data-updated]", "data-updated"),
    SelectorStrategy::css(".last-update"),
    SelectorStrategy::css(".aktualisiert"),
    SelectorStrategy::css("[class*='update']"),
    SelectorStrategy::css("[class*='aktualisiert']"),
    SelectorStrategy::text("Aktualisiert"),
    SelectorStrategy::text("Stand"),
    SelectorStrategy::text("Last update"),
    SelectorStrategy::text("Updated"),
];

impl MetricField {
    pub const ALL: [Self; 5] = [
        Self::WaitTime,
        Self::TotalPatients,
        Self::AmbulancePatients,
        Self::EmergencyCases,
        Self::LastUpdate,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::WaitTime => "wait_time",
            Self::TotalPatients => "total_patients",
            Self::AmbulancePatients => "ambulance_patients",
            Self::EmergencyCases => "emergency_cases",
            Self::LastUpdate => "last_update",
        }
    }

    /// Priority-ordered selector strategies
    #[must_use]
    pub const fn strategies(self) -> &'static [SelectorStrategy] {
        match self {
            Self::WaitTime => WAIT_TIME_STRATEGIES,
            Self::TotalPatients => TOTAL_PATIENTS_STRATEGIES,
            Self::AmbulancePatients => AMBULANCE_STRATEGIES,
            Self::EmergencyCases => EMERGENCY_STRATEGIES,
            Self::LastUpdate => LAST_UPDATE_STRATEGIES,
        }
    }

    /// Lowercase fragments marking a line as a fallback candidate
    #[must_use]
    pub const fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::WaitTime => &["wartezeit", "wait time", "waiting time", "wait:"],
            Self::TotalPatients => &["patient"],
            Self::AmbulancePatients => &["rettungsdienst", "rettungswagen", "krankenwagen", "ambulan"],
            Self::EmergencyCases => &["notfälle", "notfaelle", "notfall", "emergenc"],
            Self::LastUpdate => &["vor ", " ago", "aktualisiert", "stand", "updated", "gerade", "just now"],
        }
    }

    /// Lines mentioning these belong to a different field
    #[must_use]
    pub const fn exclusions(self) -> &'static [&'static str] {
        match self {
            Self::WaitTime => &[],
            Self::TotalPatients => &["rettungs", "krankenwagen", "ambulan", "notfall", "notfäll", "emergenc"],
            Self::AmbulancePatients => &[],
            Self::EmergencyCases => &["wartezeit", "wait", "rettungs", "ambulan"],
            Self::LastUpdate => &[],
        }
    }

    /// All CSS locators of this field as one selector list
    #[must_use]
    pub fn css_selector_list(self) -> String {
        self.strategies()
            .iter()
            .filter_map(|s| match s.locator {
                Locator::Css(css) => Some(css),
                Locator::TextContains(_) => None,
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Values accepted by the parser; anything else is rejected, never clamped
    #[must_use]
    pub const fn sane_range(self) -> RangeInclusive<u32> {
        match self {
            Self::WaitTime => 0..=480,
            Self::TotalPatients | Self::AmbulancePatients | Self::EmergencyCases => 0..=200,
            Self::LastUpdate => 0..=1440,
        }
    }
}

impl fmt::Display for MetricField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
