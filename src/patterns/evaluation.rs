use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use super::aggregates::{
    AggregateQuery, AggregateScope, AggregationError, DateRange, Facets, SalesAggregationService,
};
use super::directory::{GoalStore, GroupDirectory, LocalDirectory, LookupError, TaxonomyDirectory};
use super::domain::week_window;
use super::report::{EvaluationScope, GeneralActivity, PatternReport, PatternReportBuilder, ReportError};
use super::store::{PatternStore, StoreError};

/// Taxonomy names resolved per group before a batch runs.
pub const PATTERN_TAXONOMY: &str = "pattern";
pub const WAITER_TAXONOMY: &str = "waiter";
pub const NON_WORKABLE_TAXONOMY: &str = "non-workable";

/// Goal type scored by this engine.
pub const PATTERN_GOAL_TYPE: &str = "PATTERN";

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("no patterns defined for group {group} and local {local}")]
    NoPatterns { group: String, local: String },
    #[error("no open pattern goals for group {group} and local {local} at {as_of}")]
    NoGoals {
        group: String,
        local: String,
        as_of: NaiveDate,
    },
    #[error("no pattern produced a report for the evaluated week")]
    EmptyBatch,
}

/// Batch entry point: scores every goal-backed pattern of one venue for the
/// ISO week around a reference date. Mandatory lookups fail the whole batch
/// up front; an individual pattern without sales is skipped, and the batch
/// fails only when nothing at all could be reported.
pub struct WeeklyEvaluation {
    aggregates: Arc<dyn SalesAggregationService>,
    taxonomies: Arc<dyn TaxonomyDirectory>,
    locals: Arc<dyn LocalDirectory>,
    groups: Arc<dyn GroupDirectory>,
    goals: Arc<dyn GoalStore>,
    patterns: Arc<dyn PatternStore>,
}

impl WeeklyEvaluation {
    pub fn new(
        aggregates: Arc<dyn SalesAggregationService>,
        taxonomies: Arc<dyn TaxonomyDirectory>,
        locals: Arc<dyn LocalDirectory>,
        groups: Arc<dyn GroupDirectory>,
        goals: Arc<dyn GoalStore>,
        patterns: Arc<dyn PatternStore>,
    ) -> Self {
        Self {
            aggregates,
            taxonomies,
            locals,
            groups,
            goals,
            patterns,
        }
    }

    pub fn evaluate(
        &self,
        local_id: &str,
        reference_date: NaiveDate,
    ) -> Result<Vec<PatternReport>, EvaluationError> {
        let group = self
            .groups
            .for_local(local_id)?
            .ok_or_else(|| LookupError::GroupNotFound(local_id.to_string()))?;
        let local = self
            .locals
            .info(local_id)?
            .ok_or_else(|| LookupError::LocalNotFound(local_id.to_string()))?;

        let pattern_taxonomy = self.require_taxonomy(&group.group_id, PATTERN_TAXONOMY)?;
        let waiter_taxonomy = self.require_taxonomy(&group.group_id, WAITER_TAXONOMY)?;

        let exclusion_tags = self.locals.exclusion_tags(local_id)?;
        // Without a non-workable taxonomy every invoice counts as workable.
        let not_workable_filters = match self
            .taxonomies
            .resolve(&group.group_id, NON_WORKABLE_TAXONOMY)?
        {
            Some(taxonomy_id) => {
                let members = self.taxonomies.members(&taxonomy_id)?;
                exclusion_tags
                    .iter()
                    .filter(|tag| members.contains(*tag))
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        };

        let patterns = self.patterns.for_local(&group.group_id, local_id)?;
        if patterns.is_empty() {
            return Err(EvaluationError::NoPatterns {
                group: group.group_id,
                local: local_id.to_string(),
            });
        }
        let goals = self
            .goals
            .open_goals(&group.group_id, local_id, PATTERN_GOAL_TYPE, reference_date)?;
        if goals.is_empty() {
            return Err(EvaluationError::NoGoals {
                group: group.group_id,
                local: local_id.to_string(),
                as_of: reference_date,
            });
        }

        let (begin_date, end_date) = week_window(reference_date);
        let scope = EvaluationScope {
            group_id: group.group_id,
            local_id: local_id.to_string(),
            local_name: local.name,
            locale: local.locale,
            exclude_taxes: group.exclude_taxes,
            pattern_taxonomy,
            waiter_taxonomy,
            exclusion_tags,
            begin_date,
            end_date,
        };
        let general = self.general_activity(&scope, not_workable_filters)?;

        info!(
            local = %scope.local_id,
            group = %scope.group_id,
            goals = goals.len(),
            week = %scope.begin_date,
            "scoring weekly pattern batch"
        );

        let mut reports = Vec::new();
        for goal in &goals {
            let Some(pattern) = patterns.iter().find(|pattern| pattern.name == goal.tag_name)
            else {
                warn!(
                    goal_tag = %goal.tag_name,
                    "open goal names no stored pattern, skipping"
                );
                continue;
            };
            let builder = PatternReportBuilder::new(
                self.aggregates.as_ref(),
                &scope,
                &general,
                pattern,
                goal,
            );
            if let Some(report) = builder.build()? {
                reports.push(report);
            }
        }

        if reports.is_empty() {
            return Err(EvaluationError::EmptyBatch);
        }
        Ok(reports)
    }

    fn require_taxonomy(&self, group_id: &str, name: &str) -> Result<String, EvaluationError> {
        self.taxonomies
            .resolve(group_id, name)?
            .ok_or_else(|| {
                LookupError::TaxonomyNotFound {
                    group: group_id.to_string(),
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Cross-pattern totals for the week: the workable-invoice denominators
    /// use only the non-workable exclusions, the venue-wide totals use the
    /// full exclusion set.
    fn general_activity(
        &self,
        scope: &EvaluationScope,
        not_workable_filters: Vec<String>,
    ) -> Result<GeneralActivity, EvaluationError> {
        let mut general = GeneralActivity::default();

        let workable_rows = self
            .aggregates
            .query(&self.general_query(scope, not_workable_filters.clone()))?
            .sales;
        for row in workable_rows {
            general.workable_invoices.insert(row.tag_name, row.invoices);
        }

        let valid_rows = self
            .aggregates
            .query(&self.general_query(scope, scope.exclusion_tags.clone()))?
            .sales;
        for row in valid_rows {
            general.client_count += row.client_count;
            general.invoices += row.invoices;
            general.total += row.total;
        }

        general.not_workable_filters = not_workable_filters;
        Ok(general)
    }

    fn general_query(&self, scope: &EvaluationScope, exclusion_tag_ids: Vec<String>) -> AggregateQuery {
        AggregateQuery {
            locations: vec![scope.local_id.clone()],
            range: DateRange {
                begin: scope.begin_date,
                end: scope.end_date,
            },
            taxonomy_id: scope.pattern_taxonomy.clone(),
            merge_locations: false,
            exclusion_tag_ids,
            inclusion_tag_ids: Vec::new(),
            scope: AggregateScope::Full,
            exclude_taxes: scope.exclude_taxes,
            grouping_tag_id: None,
            grouping_kind: None,
            group_id: scope.group_id.clone(),
            facets: Facets::sales(),
        }
    }
}
