use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone};

/// This is the standard way of converting a date to a bucket file name in
/// tabwatch.
pub fn date_to_bucket_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Inverse of [date_to_bucket_name]. Returns None for file names that were
/// not produced by it.
pub fn bucket_name_to_date(name: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(name, "%Y-%m-%d").ok()
}

/// Returns start of the next day.
pub fn next_day_start<Tz: TimeZone>(date: DateTime<Tz>) -> DateTime<Tz> {
    (date + Duration::days(1)).with_time(NaiveTime::MIN).unwrap()
}
