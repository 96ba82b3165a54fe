//! Time bucketing for report charts
//!
//! Chooses a histogram granularity from the report period so charts stay
//! readable: an intra-day report gets hourly bars, a quarterly report gets
//! daily bars, and so on. Buckets are zero-filled so gaps in the data still
//! occupy space on the axis.

use chrono::{Datelike, Duration, Months, NaiveDateTime, Timelike};

/// Histogram granularity derived from the report period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Hour,
    SixHours,
    Day,
    Month,
    Year,
}

impl Bucket {
    /// Pick a granularity for the given period
    pub fn for_period(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        let span = end.signed_duration_since(start);
        if span.num_days() == 0 {
            Bucket::Hour
        } else if span <= Duration::days(3) {
            Bucket::SixHours
        } else if span <= Duration::days(90) {
            Bucket::Day
        } else if span <= Duration::days(365) {
            Bucket::Month
        } else {
            Bucket::Year
        }
    }

    /// Interval string for search-engine date histograms
    pub fn calendar_interval(&self) -> &'static str {
        match self {
            Bucket::Hour => "1h",
            Bucket::SixHours => "6h",
            Bucket::Day => "1d",
            Bucket::Month => "1M",
            Bucket::Year => "1y",
        }
    }

    /// Axis label format for timestamps at this granularity
    pub fn label_format(&self) -> &'static str {
        match self {
            Bucket::Hour => "%H:%M",
            Bucket::SixHours => "%m/%d %H:%M",
            Bucket::Day => "%d/%m",
            Bucket::Month => "%B",
            Bucket::Year => "%Y",
        }
    }

    /// Truncate a timestamp down to the start of its bucket
    pub fn floor(&self, ts: NaiveDateTime) -> NaiveDateTime {
        let date = ts.date();
        match self {
            Bucket::Hour => date.and_hms_opt(ts.hour(), 0, 0).unwrap_or(ts),
            Bucket::SixHours => date.and_hms_opt(ts.hour() / 6 * 6, 0, 0).unwrap_or(ts),
            Bucket::Day => date.and_hms_opt(0, 0, 0).unwrap_or(ts),
            Bucket::Month => date
                .with_day(1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or(ts),
            Bucket::Year => date
                .with_day(1)
                .and_then(|d| d.with_month(1))
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or(ts),
        }
    }

    /// Start of the bucket after the given bucket start
    pub fn next(&self, bucket_start: NaiveDateTime) -> NaiveDateTime {
        match self {
            Bucket::Hour => bucket_start + Duration::hours(1),
            Bucket::SixHours => bucket_start + Duration::hours(6),
            Bucket::Day => bucket_start + Duration::days(1),
            Bucket::Month => bucket_start
                .checked_add_months(Months::new(1))
                .unwrap_or(bucket_start + Duration::days(31)),
            Bucket::Year => bucket_start
                .checked_add_months(Months::new(12))
                .unwrap_or(bucket_start + Duration::days(366)),
        }
    }
}

/// A point on a report chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

/// Aggregate timestamped values into zero-filled buckets covering the period
pub fn bucketize(
    start: NaiveDateTime,
    end: NaiveDateTime,
    values: &[(NaiveDateTime, f64)],
) -> Vec<ChartPoint> {
    let bucket = Bucket::for_period(start, end);
    let mut points = Vec::new();
    let mut cursor = bucket.floor(start);

    while cursor <= end {
        let upper = bucket.next(cursor);
        let sum: f64 = values
            .iter()
            .filter(|(ts, _)| *ts >= cursor && *ts < upper)
            .map(|(_, v)| v)
            .sum();
        points.push(ChartPoint {
            label: cursor.format(bucket.label_format()).to_string(),
            value: sum,
        });
        cursor = upper;
    }

    points
}
