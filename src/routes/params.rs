//! Query-string parsing shared by every report route.
//!
//! All fields arrive as raw strings so malformed values produce the JSON
//! error body instead of axum's plain-text query rejection.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::error::ApiError;
use crate::handlers::policy::{AnalyticsPolicy, MonetaryScoring, SegmentationStrategy};
use crate::handlers::realtime::RealtimeWindow;
use crate::handlers::trend::GapPolicy;
use crate::models::{parse_timestamp, DateRange};
use crate::report_registry::ReportOptions;

/// Length of the default window ending today.
const DEFAULT_WINDOW_DAYS: i64 = 30;
const MAX_HORIZON: usize = 90;

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    #[serde(alias = "startDate")]
    pub start_date: Option<String>,
    #[serde(alias = "endDate")]
    pub end_date: Option<String>,
    pub as_of: Option<String>,
    pub strategy: Option<String>,
    pub monetary: Option<String>,
    pub risk_threshold: Option<String>,
    pub limit: Option<String>,
    pub fill_gaps: Option<String>,
    pub horizon: Option<String>,
    pub interval: Option<String>,
    #[serde(rename = "type")]
    pub report_type: Option<String>,
    pub export: Option<String>,
}

/// A fully validated report request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportRequest {
    pub range: DateRange,
    pub as_of: NaiveDateTime,
    pub options: ReportOptions,
}

impl ReportQuery {
    /// Validate against `now`, the only clock reading a request makes.
    pub fn resolve(&self, now: NaiveDateTime, policy: &AnalyticsPolicy) -> Result<ReportRequest, ApiError> {
        let range = self.range(now.date(), policy.max_range_days)?;
        let as_of = match present(&self.as_of) {
            None => now,
            Some(raw) => parse_timestamp(raw)
                .ok_or_else(|| ApiError::invalid("as_of", format!("expected an RFC 3339 timestamp, got {:?}", raw)))?,
        };

        let mut options = ReportOptions::from_policy(policy);
        if let Some(raw) = present(&self.strategy) {
            options.segmentation.strategy = SegmentationStrategy::parse(raw)
                .ok_or_else(|| ApiError::invalid("strategy", format!("expected threshold or rfm_score, got {:?}", raw)))?;
        }
        if let Some(raw) = present(&self.monetary) {
            options.segmentation.monetary = MonetaryScoring::parse(raw)
                .ok_or_else(|| ApiError::invalid("monetary", format!("expected fixed or quintile, got {:?}", raw)))?;
        }
        if let Some(raw) = present(&self.risk_threshold) {
            options.risk_threshold = raw
                .parse::<f64>()
                .ok()
                .filter(|t| t.is_finite() && (0.0..=100.0).contains(t))
                .ok_or_else(|| ApiError::invalid("risk_threshold", format!("expected a percentage, got {:?}", raw)))?;
        }
        if let Some(raw) = present(&self.limit) {
            options.limit = Some(positive(raw, "limit")?);
        }
        if let Some(raw) = present(&self.fill_gaps) {
            options.gaps = match raw {
                "true" | "1" => GapPolicy::ZeroFill,
                "false" | "0" => GapPolicy::Skip,
                _ => return Err(ApiError::invalid("fill_gaps", format!("expected true or false, got {:?}", raw))),
            };
        }
        if let Some(raw) = present(&self.horizon) {
            let horizon = positive(raw, "horizon")?;
            if horizon > MAX_HORIZON {
                return Err(ApiError::invalid("horizon", format!("at most {} days", MAX_HORIZON)));
            }
            options.horizon = horizon;
        }
        if let Some(raw) = present(&self.interval) {
            options.window = RealtimeWindow::parse(raw).ok_or_else(|| {
                ApiError::invalid("interval", format!("expected 15min, 1hour, 4hours or 24hours, got {:?}", raw))
            })?;
        }

        Ok(ReportRequest { range, as_of, options })
    }

    fn range(&self, today: NaiveDate, max_days: i64) -> Result<DateRange, ApiError> {
        let start = present(&self.start_date).map(|raw| date(raw, "start_date")).transpose()?;
        let end = present(&self.end_date).map(|raw| date(raw, "end_date")).transpose()?;

        let (start, end) = match (start, end) {
            (Some(start), Some(end)) => (start, end),
            (Some(start), None) => (start, today),
            (None, Some(end)) => (window_start(end)?, end),
            (None, None) => (window_start(today)?, today),
        };

        if start > end {
            return Err(ApiError::InvalidDateRange(format!(
                "start_date {} is after end_date {}",
                start, end
            )));
        }
        let days = (end - start).num_days() + 1;
        if days > max_days {
            return Err(ApiError::InvalidDateRange(format!(
                "range covers {} days, at most {} allowed",
                days, max_days
            )));
        }
        Ok(DateRange::new(start, end))
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Start of the default window ending at `end`.
fn window_start(end: NaiveDate) -> Result<NaiveDate, ApiError> {
    end.checked_sub_signed(Duration::days(DEFAULT_WINDOW_DAYS)).ok_or_else(|| {
        ApiError::invalid(
            "end_date",
            format!("{} is too early for a {}-day default window", end, DEFAULT_WINDOW_DAYS),
        )
    })
}

fn date(raw: &str, name: &'static str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::invalid(name, format!("expected YYYY-MM-DD, got {:?}", raw)))
}

fn positive(raw: &str, name: &'static str) -> Result<usize, ApiError> {
    raw.parse::<usize>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| ApiError::invalid(name, format!("expected a positive integer, got {:?}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 30)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_defaults_to_trailing_window() {
        let policy = AnalyticsPolicy::default();
        let request = ReportQuery::default().resolve(now(), &policy).unwrap();

        assert_eq!(request.range, DateRange::new(day(2025, 5, 31), day(2025, 6, 30)));
        assert_eq!(request.as_of, now());
        assert_eq!(request.options, ReportOptions::from_policy(&policy));
    }

    #[test]
    fn test_explicit_parameters() {
        let query = ReportQuery {
            start_date: Some("2025-01-01".into()),
            end_date: Some("2025-01-31".into()),
            as_of: Some("2025-02-01T00:00:00Z".into()),
            strategy: Some("rfm_score".into()),
            monetary: Some("quintile".into()),
            risk_threshold: Some("20".into()),
            limit: Some("10".into()),
            fill_gaps: Some("true".into()),
            horizon: Some("14".into()),
            interval: Some("4hours".into()),
            ..Default::default()
        };
        let request = query.resolve(now(), &AnalyticsPolicy::default()).unwrap();

        assert_eq!(request.range, DateRange::new(day(2025, 1, 1), day(2025, 1, 31)));
        assert_eq!(request.as_of, day(2025, 2, 1).and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(request.options.segmentation.strategy, SegmentationStrategy::RfmScore);
        assert_eq!(request.options.segmentation.monetary, MonetaryScoring::Quintile);
        assert_eq!(request.options.risk_threshold, 20.0);
        assert_eq!(request.options.limit, Some(10));
        assert_eq!(request.options.gaps, GapPolicy::ZeroFill);
        assert_eq!(request.options.horizon, 14);
        assert_eq!(request.options.window, RealtimeWindow::FourHours);
    }

    #[test]
    fn test_rejects_bad_input() {
        let policy = AnalyticsPolicy::default();
        let resolve = |query: ReportQuery| query.resolve(now(), &policy).unwrap_err();

        let err = resolve(ReportQuery {
            start_date: Some("2025-02-01".into()),
            end_date: Some("2025-01-01".into()),
            ..Default::default()
        });
        assert!(matches!(err, ApiError::InvalidDateRange(_)));

        let err = resolve(ReportQuery {
            start_date: Some("01/02/2025".into()),
            ..Default::default()
        });
        assert!(matches!(err, ApiError::InvalidParameter { name: "start_date", .. }));

        let err = resolve(ReportQuery {
            strategy: Some("kmeans".into()),
            ..Default::default()
        });
        assert!(matches!(err, ApiError::InvalidParameter { name: "strategy", .. }));

        let err = resolve(ReportQuery {
            limit: Some("0".into()),
            ..Default::default()
        });
        assert!(matches!(err, ApiError::InvalidParameter { name: "limit", .. }));

        let err = resolve(ReportQuery {
            horizon: Some("365".into()),
            ..Default::default()
        });
        assert!(matches!(err, ApiError::InvalidParameter { name: "horizon", .. }));

        let err = resolve(ReportQuery {
            interval: Some("2hours".into()),
            ..Default::default()
        });
        assert!(matches!(err, ApiError::InvalidParameter { name: "interval", .. }));
    }

    #[test]
    fn test_earliest_end_date_is_rejected_not_underflowed() {
        let policy = AnalyticsPolicy::default();
        let earliest = NaiveDate::MIN.format("%Y-%m-%d").to_string();

        let err = ReportQuery {
            end_date: Some(earliest.clone()),
            ..Default::default()
        }
        .resolve(now(), &policy)
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidParameter { name: "end_date", .. }));

        // With an explicit start no default window is derived.
        let request = ReportQuery {
            start_date: Some(earliest.clone()),
            end_date: Some(earliest),
            ..Default::default()
        }
        .resolve(now(), &policy)
        .unwrap();
        assert_eq!(request.range.start_date, NaiveDate::MIN);

        let today = NaiveDate::MIN.and_hms_opt(0, 0, 0).unwrap();
        let err = ReportQuery::default().resolve(today, &policy).unwrap_err();
        assert!(matches!(err, ApiError::InvalidParameter { name: "end_date", .. }));
    }

    #[test]
    fn test_range_span_is_capped_by_policy() {
        let policy = AnalyticsPolicy::default();
        let span = |start: &str, end: &str| ReportQuery {
            start_date: Some(start.into()),
            end_date: Some(end.into()),
            fill_gaps: Some("true".into()),
            ..Default::default()
        };

        let err = span("0001-01-01", "9999-12-31").resolve(now(), &policy).unwrap_err();
        assert!(matches!(err, ApiError::InvalidDateRange(_)));

        // 2024 is a leap year: 366 + 365 days.
        let request = span("2024-01-01", "2025-12-31").resolve(now(), &policy).unwrap();
        assert_eq!(request.range.days().count(), 731);
        let err = span("2024-01-01", "2026-01-01").resolve(now(), &policy).unwrap_err();
        assert!(matches!(err, ApiError::InvalidDateRange(_)));

        let narrow = AnalyticsPolicy {
            max_range_days: 7,
            ..AnalyticsPolicy::default()
        };
        assert!(span("2025-06-01", "2025-06-07").resolve(now(), &narrow).is_ok());
        assert!(span("2025-06-01", "2025-06-08").resolve(now(), &narrow).is_err());
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let query = ReportQuery {
            start_date: Some("  ".into()),
            strategy: Some(String::new()),
            ..Default::default()
        };
        let request = query.resolve(now(), &AnalyticsPolicy::default()).unwrap();
        assert_eq!(request.range.end_date, day(2025, 6, 30));
        assert_eq!(request.options.segmentation.strategy, SegmentationStrategy::Threshold);
    }
}
