use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Feed filter parameters as set from the filter sheet.
///
/// A value type compared structurally: the controller only reacts to a
/// filter that actually changed, not to repeated submissions of the same
/// value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FeedFilter {
    pub town_id: Option<String>,
    pub from_day: Option<NaiveDate>,
    pub to_day: Option<NaiveDate>,
    pub enabled: bool,
}

impl FeedFilter {
    /// An enabled filter must name a town; the backend cannot scope the
    /// feed otherwise. A disabled filter fetches unfiltered.
    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && self.town_id.as_deref().map_or(true, |t| t.is_empty()) {
            return Err("Pick a town before filtering the feed".to_string());
        }
        Ok(())
    }

    /// Stable signature scoping cached feed state to one filter value.
    pub fn signature(&self) -> String {
        if !self.enabled {
            return "off".to_string();
        }
        format!(
            "town={};from={};to={}",
            self.town_id.as_deref().unwrap_or("~"),
            self.from_day.map(|d| d.to_string()).unwrap_or_else(|| "~".into()),
            self.to_day.map(|d| d.to_string()).unwrap_or_else(|| "~".into()),
        )
    }
}
