use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A shortened URL together with the analytics it has accumulated.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlRecord {
    pub original_url: String,
    pub short_alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default)]
    pub analytics: AnalyticsBlock,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl UrlRecord {
    pub fn new(original_url: String, short_alias: String, topic: Option<String>) -> Self {
        Self {
            original_url,
            short_alias,
            topic,
            analytics: AnalyticsBlock::default(),
            created_at: Utc::now(),
        }
    }
}

/// Counters embedded in a [`UrlRecord`]. `unique_users` and the per-breakdown
/// user lists have set semantics.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsBlock {
    pub total_clicks: u64,
    pub unique_users: Vec<String>,
    pub clicks_by_date: Vec<DateCount>,
    pub os_type: Vec<OsStat>,
    pub device_type: Vec<DeviceStat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DateCount {
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OsStat {
    pub os_name: String,
    pub unique_clicks: u64,
    pub unique_users: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceStat {
    pub device_name: String,
    pub unique_clicks: u64,
    pub unique_users: Vec<String>,
}

/// A single visit, as derived from a redirect request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEvent {
    /// `YYYY-MM-DD`
    pub date: String,
    pub user: String,
    pub os: String,
    pub device: String,
}

impl AnalyticsBlock {
    /// Applies one click to the counters.
    pub fn record_click(&mut self, event: &ClickEvent) {
        self.total_clicks += 1;
        insert_unique(&mut self.unique_users, &event.user);

        match self.clicks_by_date.iter_mut().find(|d| d.date == event.date) {
            Some(entry) => entry.count += 1,
            None => self.clicks_by_date.push(DateCount {
                date: event.date.clone(),
                count: 1,
            }),
        }

        match self.os_type.iter_mut().find(|o| o.os_name == event.os) {
            Some(entry) => {
                if insert_unique(&mut entry.unique_users, &event.user) {
                    entry.unique_clicks += 1;
                }
            }
            None => self.os_type.push(OsStat {
                os_name: event.os.clone(),
                unique_clicks: 1,
                unique_users: vec![event.user.clone()],
            }),
        }

        match self.device_type.iter_mut().find(|d| d.device_name == event.device) {
            Some(entry) => {
                if insert_unique(&mut entry.unique_users, &event.user) {
                    entry.unique_clicks += 1;
                }
            }
            None => self.device_type.push(DeviceStat {
                device_name: event.device.clone(),
                unique_clicks: 1,
                unique_users: vec![event.user.clone()],
            }),
        }
    }
}

/// Set-insert into a vector; returns whether the value was new.
fn insert_unique(values: &mut Vec<String>, value: &str) -> bool {
    if values.iter().any(|v| v == value) {
        return false;
    }
    values.push(value.to_owned());
    true
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerAliasReport {
    pub total_clicks: u64,
    pub unique_users_count: usize,
    pub recent_activity: Vec<DateCount>,
    pub most_active_day: MostActiveDay,
    pub percentage_growth: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MostActiveDay {
    pub date: Option<String>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicReport {
    pub total_clicks: u64,
    pub unique_users: usize,
    pub clicks_by_date: Vec<DateCount>,
    pub urls: Vec<UrlSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlSummary {
    pub short_url: String,
    pub total_clicks: u64,
    pub unique_users: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallReport {
    pub total_urls: usize,
    pub total_clicks: u64,
    pub unique_users: usize,
    pub clicks_by_date: Vec<DateCount>,
    pub os_type: Vec<OsSummary>,
    pub device_type: Vec<DeviceSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OsSummary {
    pub os_name: String,
    pub unique_clicks: u64,
    pub unique_users: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub device_name: String,
    pub unique_clicks: u64,
    pub unique_users: usize,
}
