use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The signed-in user's public profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Profile {
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(rename = "townId", default)]
    pub town_id: Option<String>,
    #[serde(rename = "photoUrl", default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
}

impl Profile {
    /// A profile is complete enough for the feed once it names a home town.
    pub fn has_town(&self) -> bool {
        self.town_id.as_deref().is_some_and(|t| !t.is_empty())
    }
}
