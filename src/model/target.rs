use serde::{Deserialize, Serialize};
use std::fmt;

/// One (URL, department) pair scraped during a job run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeTarget {
    pub url: String,
    pub department: String,
}

impl ScrapeTarget {
    #[must_use]
    pub fn new(url: impl Into<String>, department: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            department: department.into(),
        }
    }
}

impl fmt::Display for ScrapeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.department)
    }
}
