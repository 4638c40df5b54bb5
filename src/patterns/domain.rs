use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Goal target kinds: a presence-percentage target or a per-diner ratio target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalIndicator {
    #[serde(rename = "PP")]
    Presence,
    #[serde(rename = "PR")]
    Ratio,
}

impl GoalIndicator {
    pub const fn code(self) -> &'static str {
        match self {
            Self::Presence => "PP",
            Self::Ratio => "PR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalState {
    Open,
    Closed,
}

/// Target definition a pattern is scored against. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub indicator: GoalIndicator,
    pub value_indicator: f64,
    /// Ordered target tags; the first entry is the primary target.
    pub goal_products_tags: Vec<String>,
    pub tag: String,
    pub tag_name: String,
    pub open_date: NaiveDate,
    pub close_date: NaiveDate,
    pub status: GoalState,
}

impl Goal {
    pub fn primary_tag(&self) -> Option<&str> {
        self.goal_products_tags.first().map(String::as_str)
    }

    pub fn targets_tag(&self, name: &str) -> bool {
        self.goal_products_tags.iter().any(|tag| tag == name)
    }
}

/// Per-tag baseline inside a pattern profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductTagBaseline {
    pub name: String,
    pub image: String,
    /// Fraction of diners expected to purchase the tag, in `[0, 1]`.
    pub base_presence: f64,
    /// Expected item count per purchasing diner, `> 0`.
    pub base_ratio: f64,
}

/// Baseline consumption profile for one venue. Identity is (group, local,
/// name); `uuid` is deterministically derived from that triple so re-created
/// patterns keep a stable key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub uuid: String,
    pub group: String,
    pub local: String,
    pub name: String,
    pub reference_date: NaiveDate,
    pub base_vpc: f64,
    pub base_standard_deviation: f64,
    pub base_data_quality: f64,
    pub deficient_vpc: f64,
    pub optimum_vpc: f64,
    pub products_tags: Vec<ProductTagBaseline>,
}

/// Performance band of an observed weekly VPC against the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceLevel {
    Deficient,
    Bad,
    Good,
    Outstanding,
}

impl PerformanceLevel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Deficient => "Deficient",
            Self::Bad => "Bad",
            Self::Good => "Good",
            Self::Outstanding => "Outstanding",
        }
    }

    /// Buckets `observed` against the one-deviation band around the baseline.
    /// Each boundary belongs to the lower bucket.
    pub fn classify(observed: f64, base_vpc: f64, std_dev: f64) -> Self {
        if observed <= base_vpc - std_dev {
            Self::Deficient
        } else if observed <= base_vpc {
            Self::Bad
        } else if observed <= base_vpc + std_dev {
            Self::Good
        } else {
            Self::Outstanding
        }
    }
}

/// Whether a waiter reached the goal threshold for the evaluated week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Met,
    NotMet,
}

impl GoalStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Met => "Met",
            Self::NotMet => "Not met",
        }
    }

    pub const fn indicator(self) -> i8 {
        match self {
            Self::Met => 1,
            Self::NotMet => -1,
        }
    }
}

/// ISO year/week pair attached to weekly aggregate rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IsoWeek {
    pub year: i32,
    pub week: u32,
}

impl IsoWeek {
    pub fn of(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// Monday of the commercial week, when the pair is representable.
    pub fn monday(self) -> Option<NaiveDate> {
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
    }
}

/// Monday-to-Sunday window of the ISO week containing `date`.
pub fn week_window(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    (monday, monday + Duration::days(6))
}

/// Half-away-from-zero rounding to `places` decimal digits.
pub(crate) fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
