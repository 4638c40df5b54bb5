use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::Goal;

/// Locale and display name of a venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalInfo {
    pub locale: String,
    pub name: String,
}

/// Group owning a venue, with its tax treatment for aggregate queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub group_id: String,
    pub exclude_taxes: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("taxonomy {name:?} is not defined for group {group}")]
    TaxonomyNotFound { group: String, name: String },
    #[error("local {0} does not belong to any known group")]
    GroupNotFound(String),
    #[error("local {0} is unknown")]
    LocalNotFound(String),
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Resolves taxonomy names to ids and enumerates taxonomy membership.
pub trait TaxonomyDirectory: Send + Sync {
    fn resolve(&self, group_id: &str, name: &str) -> Result<Option<String>, LookupError>;
    fn members(&self, taxonomy_id: &str) -> Result<HashSet<String>, LookupError>;
}

/// Venue metadata lookups.
pub trait LocalDirectory: Send + Sync {
    fn info(&self, local_id: &str) -> Result<Option<LocalInfo>, LookupError>;
    /// Exclusion tag ids configured for the venue.
    fn exclusion_tags(&self, local_id: &str) -> Result<Vec<String>, LookupError>;
}

/// Group resolution for a venue.
pub trait GroupDirectory: Send + Sync {
    fn for_local(&self, local_id: &str) -> Result<Option<GroupInfo>, LookupError>;
}

/// Read-only access to goal definitions.
pub trait GoalStore: Send + Sync {
    /// Open goals of `goal_type` for a venue whose window covers `as_of`.
    fn open_goals(
        &self,
        group_id: &str,
        local_id: &str,
        goal_type: &str,
        as_of: NaiveDate,
    ) -> Result<Vec<Goal>, LookupError>;
}
