//! Read-side aggregation over the counters stored on each [`UrlRecord`].
//!
//! Nothing here touches storage; callers fetch the records and hand them in.
//! Output ordering always follows stored (insertion) order, never date order.

use std::collections::HashSet;

use crate::models::{
    DateCount, DeviceSummary, MostActiveDay, OsSummary, OverallReport, PerAliasReport,
    TopicReport, UrlRecord, UrlSummary,
};

const RECENT_ACTIVITY_DAYS: usize = 7;

/// Report for a single alias. Total clicks are recomputed from the per-date
/// counters rather than read from the stored total.
pub fn alias_report(record: &UrlRecord) -> PerAliasReport {
    let clicks = &record.analytics.clicks_by_date;

    let recent_activity = clicks[clicks.len().saturating_sub(RECENT_ACTIVITY_DAYS)..].to_vec();

    // Strictly greater keeps the first of equal maxima.
    let most_active_day = clicks.iter().fold(
        MostActiveDay {
            date: None,
            count: 0,
        },
        |max, entry| {
            if entry.count > max.count {
                MostActiveDay {
                    date: Some(entry.date.clone()),
                    count: entry.count,
                }
            } else {
                max
            }
        },
    );

    PerAliasReport {
        total_clicks: clicks.iter().map(|entry| entry.count).sum(),
        unique_users_count: record.analytics.unique_users.len(),
        recent_activity,
        most_active_day,
        percentage_growth: percentage_growth(clicks),
    }
}

/// Growth between the last two stored entries, as a two-decimal string.
/// Halves round away from zero.
#[allow(clippy::cast_precision_loss)]
fn percentage_growth(clicks: &[DateCount]) -> String {
    let growth = match clicks {
        [.., earlier, later] if earlier.count > 0 => {
            (later.count as f64 - earlier.count as f64) / earlier.count as f64 * 100.0
        }
        _ => 0.0,
    };
    // `{:.2}` alone rounds exact halves to even.
    let rounded = (growth * 100.0).round() / 100.0;
    format!("{rounded:.2}")
}

/// Grouped report over every record sharing a topic. `None` if `records` is
/// empty.
pub fn topic_report(records: &[UrlRecord]) -> Option<TopicReport> {
    if records.is_empty() {
        return None;
    }

    let urls = records
        .iter()
        .map(|record| UrlSummary {
            short_url: record.short_alias.clone(),
            total_clicks: record.analytics.total_clicks,
            unique_users: record.analytics.unique_users.len(),
        })
        .collect();

    Some(TopicReport {
        total_clicks: stored_total(records),
        unique_users: distinct_users(records),
        clicks_by_date: merge_by_date(records),
        urls,
    })
}

/// Combined report over every record matching an alias. `None` if `records`
/// is empty.
pub fn overall_report(records: &[UrlRecord]) -> Option<OverallReport> {
    if records.is_empty() {
        return None;
    }

    let os_type = merge_by_name(
        records
            .iter()
            .flat_map(|r| &r.analytics.os_type)
            .map(|os| (&os.os_name, os.unique_clicks, &os.unique_users)),
    )
    .into_iter()
    .map(|merged| OsSummary {
        os_name: merged.name,
        unique_clicks: merged.unique_clicks,
        unique_users: merged.users.len(),
    })
    .collect();

    let device_type = merge_by_name(
        records
            .iter()
            .flat_map(|r| &r.analytics.device_type)
            .map(|device| (&device.device_name, device.unique_clicks, &device.unique_users)),
    )
    .into_iter()
    .map(|merged| DeviceSummary {
        device_name: merged.name,
        unique_clicks: merged.unique_clicks,
        unique_users: merged.users.len(),
    })
    .collect();

    Some(OverallReport {
        total_urls: records.len(),
        total_clicks: stored_total(records),
        unique_users: distinct_users(records),
        clicks_by_date: merge_by_date(records),
        os_type,
        device_type,
    })
}

fn stored_total(records: &[UrlRecord]) -> u64 {
    records.iter().map(|r| r.analytics.total_clicks).sum()
}

fn distinct_users(records: &[UrlRecord]) -> usize {
    records
        .iter()
        .flat_map(|r| &r.analytics.unique_users)
        .collect::<HashSet<_>>()
        .len()
}

/// Sums counts for equal dates, keeping first-seen order.
fn merge_by_date(records: &[UrlRecord]) -> Vec<DateCount> {
    let mut merged: Vec<DateCount> = Vec::new();
    for entry in records.iter().flat_map(|r| &r.analytics.clicks_by_date) {
        match merged.iter_mut().find(|m| m.date == entry.date) {
            Some(existing) => existing.count += entry.count,
            None => merged.push(entry.clone()),
        }
    }
    merged
}

struct MergedBreakdown {
    name: String,
    unique_clicks: u64,
    users: Vec<String>,
}

/// Merges breakdown entries by name, keeping first-seen order. Clicks are
/// summed and users deduplicated.
fn merge_by_name<'a>(
    entries: impl Iterator<Item = (&'a String, u64, &'a Vec<String>)>,
) -> Vec<MergedBreakdown> {
    let mut merged: Vec<MergedBreakdown> = Vec::new();
    for (name, unique_clicks, users) in entries {
        let slot = match merged.iter().position(|m| &m.name == name) {
            Some(index) => &mut merged[index],
            None => {
                merged.push(MergedBreakdown {
                    name: name.clone(),
                    unique_clicks: 0,
                    users: Vec::new(),
                });
                let last = merged.len() - 1;
                &mut merged[last]
            }
        };
        slot.unique_clicks += unique_clicks;
        for user in users {
            if !slot.users.contains(user) {
                slot.users.push(user.clone());
            }
        }
    }
    merged
}
