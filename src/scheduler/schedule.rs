//! Five-field cron expressions
//!
//! `cron::Schedule` wants a leading seconds field and numbers weekdays 1-7
//! from Sunday. Expressions here use the classic five fields
//! (`min hour dom month dow`) with weekdays 0-7, where 0 and 7 are Sunday.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::types::SchedulerError;

/// A validated recurring schedule
#[derive(Clone)]
pub struct CronSchedule {
    expression: String,
    inner: cron::Schedule,
}

impl CronSchedule {
    /// Parse and validate a five-field expression
    ///
    /// # Errors
    ///
    /// `InvalidSchedule` when the field count is wrong or any field is
    /// rejected by the cron parser.
    pub fn parse(expression: &str) -> Result<Self, SchedulerError> {
        let invalid = |reason: String| SchedulerError::InvalidSchedule {
            expression: expression.to_string(),
            reason,
        };

        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(invalid(format!("expected 5 fields, found {}", fields.len())));
        }

        let day_of_week = normalize_day_of_week(fields[4]);
        let with_seconds = format!(
            "0 {} {} {} {} {}",
            fields[0], fields[1], fields[2], fields[3], day_of_week
        );

        let inner = cron::Schedule::from_str(&with_seconds).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            expression: fields.join(" "),
            inner,
        })
    }

    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First firing strictly after `after`
    #[must_use]
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.inner.after(&after).next()
    }

    #[must_use]
    pub fn next_fire(&self) -> Option<DateTime<Utc>> {
        self.next_after(Utc::now())
    }
}

impl fmt::Debug for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CronSchedule").field(&self.expression).finish()
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// Shift numeric weekdays from 0-7 (Sunday = 0 or 7) to 1-7 (Sunday = 1)
///
/// Step values after `/` and weekday names are left alone.
fn normalize_day_of_week(field: &str) -> String {
    field
        .split(',')
        .map(|part| {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => (range, Some(step)),
                None => (part, None),
            };
            let range = range
                .split('-')
                .map(|token| match token.parse::<u8>() {
                    Ok(7) => "1".to_string(),
                    Ok(n) if n < 7 => (n + 1).to_string(),
                    _ => token.to_string(),
                })
                .collect::<Vec<_>>()
                .join("-");
            match step {
                Some(step) => format!("{range}/{step}"),
                None => range,
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}
