use crate::model::ParsedMetric;

use super::selectors::MetricField;

/// Advisory data-quality score in `[0.0, 1.0]`
///
/// Wait time present and in range: 0.4. Total patients present and in range:
/// 0.3. Freshness under 30 minutes: 0.3, under 60: 0.2. Observability only.
#[must_use]
pub fn quality_score(metric: &ParsedMetric) -> f64 {
    let mut score = 0.0;

    if MetricField::WaitTime.sane_range().contains(&metric.wait_time_minutes) {
        score += 0.4;
    }

    if let Some(total) = metric.total_patients
        && MetricField::TotalPatients.sane_range().contains(&total)
    {
        score += 0.3;
    }

    match metric.update_delay_minutes {
        Some(delay) if delay < 30 => score += 0.3,
        Some(delay) if delay < 60 => score += 0.2,
        _ => {}
    }

    score
}
