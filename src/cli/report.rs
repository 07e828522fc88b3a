use chrono::{DateTime, Local, Utc};

use crate::{
    classify::CategoryConfig,
    store::{DayBreakdown, EntryPage, Summary},
};

pub fn format_duration(seconds: i64) -> String {
    let hours = seconds / 3600;
    let minutes = seconds % 3600 / 60;
    let seconds = seconds % 60;
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn local_time(v: DateTime<Utc>) -> String {
    v.with_timezone(&Local).format("%x %H:%M:%S").to_string()
}

pub fn print_summary(summary: &Summary) {
    println!(
        "Tracked {} across {} categories, productivity score {}%",
        format_duration(summary.total_seconds),
        summary.categories.len(),
        summary.productivity_score
    );
    for totals in &summary.categories {
        println!(
            "{}\t{}\t{} entries\t{} sites",
            totals.category,
            format_duration(totals.total_seconds),
            totals.entry_count,
            totals.unique_hostnames
        );
    }

    if !summary.top_domains.is_empty() {
        println!();
        println!("Top domains");
        for domain in &summary.top_domains {
            println!(
                "{}\t{}\t{}\t{} visits",
                format_duration(domain.total_seconds),
                domain.category,
                domain.hostname,
                domain.entry_count
            );
        }
    }
}

pub fn print_daily(days: &[DayBreakdown]) {
    for day in days {
        println!("{}", day.date.format("%x"));
        for totals in &day.categories {
            println!(
                "\t{}\t{}\t{} entries",
                totals.category,
                format_duration(totals.total_seconds),
                totals.entry_count
            );
        }
        println!();
    }
}

pub fn print_page(page: &EntryPage) {
    for entry in &page.entries {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            local_time(entry.timestamp),
            format_duration(entry.duration_seconds),
            entry.category,
            entry.hostname,
            entry.title.as_deref().unwrap_or("")
        );
    }
    println!(
        "Page {}/{} ({} entries total)",
        page.current_page,
        page.total_pages.max(1),
        page.total_entries
    );
}

pub fn print_categories(config: &CategoryConfig) {
    println!("productive:");
    for hostname in &config.productive {
        println!("\t{hostname}");
    }
    println!("unproductive:");
    for hostname in &config.unproductive {
        println!("\t{hostname}");
    }
}

#[cfg(test)]
mod tests {
    use super::format_duration;

    #[test]
    fn durations_format_compactly() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(125), "2m5s");
        assert_eq!(format_duration(3725), "1h2m5s");
    }
}
