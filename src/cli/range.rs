use std::fmt::Display;

use anyhow::Result;
use chrono::{Duration, Local, Utc};
use chrono_english::parse_date_string;
use clap::ValueEnum;
use now::DateTimeNow;

use crate::{store::EntryFilter, utils::time::next_day_start};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

/// Shared range options for the query commands.
#[derive(Debug, clap::Args)]
pub struct RangeArgs {
    #[arg(
        long = "start",
        short,
        help = "Start of the range. Examples are \"yesterday\", \"1 hour ago\", \"15/03/2025\", \"12:00 16/03/2025\". Absent means unbounded"
    )]
    pub start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "End of the range (inclusive). Same formats as --start. Absent means unbounded"
    )]
    pub end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    pub date_style: DateStyle,
    #[arg(
        long = "days",
        default_value_t = false,
        help = "Take inputs as whole days. For example if start and end are both 15/03/2025 this option extracts the whole day"
    )]
    pub treat_as_days: bool,
    #[arg(short, long, help = "Only include entries recorded for this user id")]
    pub user: Option<String>,
}

impl RangeArgs {
    /// Turns the textual range into an entry filter with inclusive bounds.
    pub fn to_filter(&self) -> Result<EntryFilter> {
        let now = Local::now();
        let dialect: chrono_english::Dialect = self.date_style.into();

        let mut start = self
            .start_date
            .as_deref()
            .map(|s| parse_date_string(s, now, dialect))
            .transpose()
            .map_err(|e| anyhow::anyhow!("Failed to validate start date {e}"))?
            .map(|v| v.with_timezone(&Local));
        let mut end = self
            .end_date
            .as_deref()
            .map(|s| parse_date_string(s, now, dialect))
            .transpose()
            .map_err(|e| anyhow::anyhow!("Failed to validate end date {e}"))?
            .map(|v| v.with_timezone(&Local));

        if self.treat_as_days {
            start = start.map(|v| v.beginning_of_day());
            // Whole days keep the end inclusive up to the last second.
            end = end.map(|v| next_day_start(v) - Duration::seconds(1));
        }

        Ok(EntryFilter {
            start: start.map(|v| v.with_timezone(&Utc)),
            end: end.map(|v| v.with_timezone(&Utc)),
            user_id: self.user.clone(),
            hostname: None,
        })
    }
}
