use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::IsoWeek;

/// Inclusive date range covered by an aggregate query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub begin: NaiveDate,
    pub end: NaiveDate,
}

/// Granularity of the returned rows: one row per scope, or one per ISO week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateScope {
    Full,
    Weekly,
}

/// Result facets a query asks the aggregation backend to materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Facets {
    pub sales: bool,
    pub categories: bool,
}

impl Facets {
    pub const fn sales() -> Self {
        Self {
            sales: true,
            categories: false,
        }
    }

    pub const fn sales_and_categories() -> Self {
        Self {
            sales: true,
            categories: true,
        }
    }
}

/// One pre-computed aggregate row for a scope (a pattern, a waiter, or a
/// category) over a date range. `time` is present only on weekly rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesAggregate {
    pub tag_id: String,
    pub tag_name: String,
    pub total: f64,
    pub subtotal: f64,
    pub tax: f64,
    pub discount: f64,
    pub invoices: u64,
    pub articles: f64,
    pub client_count: f64,
    pub average_price: f64,
    pub total_per_client: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<IsoWeek>,
}

/// Category facet row: a sales aggregate plus its category identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAggregate {
    #[serde(flatten)]
    pub sales: SalesAggregate,
    pub category_name: String,
    pub category_branch: Vec<String>,
}

/// Full description of one aggregate fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateQuery {
    pub locations: Vec<String>,
    pub range: DateRange,
    pub taxonomy_id: String,
    pub merge_locations: bool,
    pub exclusion_tag_ids: Vec<String>,
    pub inclusion_tag_ids: Vec<String>,
    pub scope: AggregateScope,
    pub exclude_taxes: bool,
    pub grouping_tag_id: Option<String>,
    pub grouping_kind: Option<String>,
    pub group_id: String,
    pub facets: Facets,
}

/// Rows returned by one query, split per requested facet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateBundle {
    pub sales: Vec<SalesAggregate>,
    pub categories: Vec<CategoryAggregate>,
}

#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error("aggregation backend unavailable: {0}")]
    Unavailable(String),
    #[error("aggregation query rejected: {0}")]
    Rejected(String),
}

/// Read-side collaborator producing the pre-aggregated rows the report
/// builder consumes. Implementations own latency and retry behavior.
pub trait SalesAggregationService: Send + Sync {
    fn query(&self, query: &AggregateQuery) -> Result<AggregateBundle, AggregationError>;
}
