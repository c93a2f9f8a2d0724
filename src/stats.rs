//! Human-readable catalog listing and summary.
//!
//! Used by `medlab items`, `medlab analyze`, and `medlab search` to print
//! what the catalog holds and how its analyses went. Everything goes to
//! stdout; progress lines go to stderr elsewhere.

use medlab_core::models::CatalogItem;
use medlab_core::report::Summary;

/// Print one row per item.
pub fn print_items(items: &[CatalogItem]) {
    if items.is_empty() {
        println!("No items.");
        return;
    }
    println!(
        "  {:<36}  {:<24} {:<18} {:<12} {:<10} {:>5} {:>4}   {}",
        "ID", "NAME", "CATEGORY", "MANUFACTURER", "STATUS", "SCORE", "TIER", "ADDED"
    );
    println!("  {}", "-".repeat(130));
    for item in items {
        println!(
            "  {:<36}  {:<24} {:<18} {:<12} {:<10} {:>5} {:>4}   {}",
            item.id,
            truncate(&item.name, 24),
            truncate(&item.category, 18),
            truncate(&item.manufacturer, 12),
            item.status,
            item.quality_score()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            item.quality_tier()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
            format_ts_relative(item.created_at.timestamp()),
        );
    }
}

/// Print the aggregation summary.
pub fn print_summary(summary: &Summary) {
    println!("Medlab Catalog Summary");
    println!("======================");
    println!();
    println!("  Items:       {}", summary.total_items);
    println!(
        "  Status:      {} pending / {} processing / {} completed",
        summary.items_by_status.pending,
        summary.items_by_status.processing,
        summary.items_by_status.completed
    );
    println!(
        "  Jobs:        {} queued / {} running",
        summary.jobs_by_state.queued, summary.jobs_by_state.running
    );
    println!("  Failed:      {}", summary.failed_analyses);
    println!();
    println!("  Avg score:   {:.1}", summary.average_quality_score);
    println!(
        "  Avg conf.:   {}",
        format_percent(summary.average_confidence)
    );

    if summary.items_by_status.completed > 0 {
        println!();
        println!("  By tier:");
        println!("  {:<6} {:>6}", "TIER", "ITEMS");
        println!("  {}", "-".repeat(13));
        for (tier, count) in &summary.tiers {
            println!("  {:<6} {:>6}", tier.to_string(), count);
        }
    }

    println!();
}

fn format_percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
