// Typed shapes for the API's JSON payloads and the local cache file.
// The endpoints return loosely-shaped dicts; everything is decoded into
// these records up front so the rest of the code never pokes at raw
// `serde_json::Value`s.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The ten difficulty-vote buckets, weakest to hardest. The API keys the
/// feedback histogram by these exact strings; output numbers them 1-10 in
/// this order.
pub const DIFFICULTY_BUCKETS: [&str; 10] = [
    "counterCake",
    "counterVeryEasy",
    "counterEasy",
    "counterTooEasy",
    "counterMedium",
    "counterBitHard",
    "counterHard",
    "counterTooHard",
    "counterExHard",
    "counterBrainFuck",
];

/// Which listing a machine belongs to. Different groups expose different
/// fields and endpoints: starting-point machines have no IP, no reviews and
/// no feedback histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    Active,
    Retired,
    StartingPoint,
}

impl Group {
    pub fn label(self) -> &'static str {
        match self {
            Group::Active => "Active",
            Group::Retired => "Retired",
            Group::StartingPoint => "Starting Point",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The machine's author as the API nests it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Maker {
    pub name: String,
}

/// One machine as returned by the profile and listing endpoints, and as
/// stored in the cache file. Constructed fresh from each response or cache
/// read and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineRecord {
    pub id: u64,
    pub name: String,
    pub os: String,
    #[serde(rename = "difficultyText")]
    pub difficulty_text: String,
    /// Aggregate user difficulty rating, 0-100.
    #[serde(default)]
    pub difficulty: u32,
    /// Release date, ISO `YYYY-MM-DD` with an optional `T...` time suffix.
    pub release: String,
    #[serde(default, deserialize_with = "stars_from_wire")]
    pub stars: f64,
    #[serde(default)]
    pub user_owns_count: u64,
    #[serde(default)]
    pub root_owns_count: u64,
    pub maker: Maker,
    /// Lab machines only; listing endpoints include it, profile may not.
    #[serde(default)]
    pub ip: Option<String>,
    /// Difficulty-vote histogram keyed by `DIFFICULTY_BUCKETS`. Lab
    /// machines only.
    #[serde(rename = "feedbackForChart", default)]
    pub feedback: Option<BTreeMap<String, u64>>,
    /// 0/1 flag on profile responses; absent elsewhere.
    #[serde(default)]
    pub retired: i64,
}

impl MachineRecord {
    /// Group of a machine that came back from the lab profile endpoint,
    /// which only ever serves active and retired machines.
    pub fn lab_group(&self) -> Group {
        if self.retired == 1 {
            Group::Retired
        } else {
            Group::Active
        }
    }

    pub fn permalink(&self) -> String {
        format!("https://app.hackthebox.com/machines/{}", self.id)
    }

    pub fn release_date(&self) -> Result<NaiveDate> {
        parse_release(&self.release)
    }

    /// Whether a user-supplied identifier picks out this machine: its id
    /// spelled as digits, its name ignoring case, or its exact IP.
    pub fn matches(&self, ident: &str) -> bool {
        if self.id.to_string() == ident {
            return true;
        }
        if self.name.eq_ignore_ascii_case(ident) {
            return true;
        }
        self.ip.as_deref() == Some(ident)
    }
}

/// The currently spawned instance as `/machine/active` reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct ActiveInstance {
    pub id: u64,
    pub name: String,
    /// `%Y-%m-%d %H:%M:%S`; not every instance type carries one.
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// The subset of machine fields the to-do listing prints.
#[derive(Debug, Clone, Deserialize)]
pub struct TodoEntry {
    pub name: String,
    #[serde(rename = "difficultyText")]
    pub difficulty_text: String,
    #[serde(default)]
    pub difficulty: u32,
    pub os: String,
    pub release: String,
    #[serde(default, deserialize_with = "stars_from_wire")]
    pub stars: f64,
}

/// One machine review; only the reviewer's display name matters here, to
/// spot authors reviewing their own machines.
#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    pub user: ReviewUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewUser {
    pub name: String,
}

/// Review data is gated server-side: the `message` field of the reviews
/// endpoint is either the review array or a denial string. Denial is a
/// normal outcome, not an error.
#[derive(Debug, Clone)]
pub enum ReviewAccess {
    Granted(Vec<Review>),
    Denied,
}

impl ReviewAccess {
    pub fn from_message(message: serde_json::Value) -> Result<ReviewAccess> {
        match message {
            serde_json::Value::Array(_) => {
                let reviews =
                    serde_json::from_value(message).context("decoding review list")?;
                Ok(ReviewAccess::Granted(reviews))
            }
            serde_json::Value::String(_) => Ok(ReviewAccess::Denied),
            other => anyhow::bail!("unexpected reviews payload: {other}"),
        }
    }
}

/// Snapshot of all three machine listings plus its creation time, stored as
/// one flat JSON file. The three groups are always written together; age is
/// advisory only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub active: Vec<MachineRecord>,
    pub retired: Vec<MachineRecord>,
    pub starting_point: Vec<MachineRecord>,
    /// Unix seconds at refresh time.
    pub created_at: u64,
}

impl CacheSnapshot {
    pub fn age_secs(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }

    /// First match wins, searching active, then retired, then starting
    /// point. Duplicate names across groups are never disambiguated
    /// further.
    pub fn find(&self, ident: &str) -> Option<(&MachineRecord, Group)> {
        let groups = [
            (&self.active, Group::Active),
            (&self.retired, Group::Retired),
            (&self.starting_point, Group::StartingPoint),
        ];
        for (records, group) in groups {
            if let Some(record) = records.iter().find(|m| m.matches(ident)) {
                return Some((record, group));
            }
        }
        None
    }
}

pub(crate) fn parse_release(raw: &str) -> Result<NaiveDate> {
    let date_part = raw.split('T').next().unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .with_context(|| format!("unparseable release date {raw:?}"))
}

// Star ratings arrive as a number on some endpoints and a string ("4.5")
// on others. Accept both.
fn stars_from_wire<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Num(f64),
        Text(String),
    }
    match Wire::deserialize(deserializer)? {
        Wire::Num(n) => Ok(n),
        Wire::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
