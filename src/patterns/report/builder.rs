use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};
use tracing::{debug, info};

use crate::patterns::aggregates::{
    AggregateBundle, AggregateQuery, AggregateScope, AggregationError, CategoryAggregate,
    DateRange, Facets, SalesAggregate, SalesAggregationService,
};
use crate::patterns::domain::{
    round_to, week_window, Goal, GoalIndicator, GoalStatus, IsoWeek, Pattern, PerformanceLevel,
};
use crate::patterns::indicator;
use crate::patterns::ranking::{self, RankedEntry};
use crate::patterns::tags::{self, TagMetrics};

use super::views::{
    DisplayTag, PatternReport, ReportHeader, TrendSeries, WaiterGoalStanding, WaiterInfo,
    WaiterTally, WaiterVpcStanding,
};

/// Grouping dimension used by every pattern-scoped aggregate query.
pub const GROUPING_KIND: &str = "product-experience-tags";

/// Points charted in the trend series.
pub const TREND_WEEKS: usize = 12;

/// Resolved identifiers shared by every report computed for one venue and
/// week. Built once by the weekly evaluation, read-only afterwards.
#[derive(Debug, Clone)]
pub struct EvaluationScope {
    pub group_id: String,
    pub local_id: String,
    pub local_name: String,
    pub locale: String,
    pub exclude_taxes: bool,
    pub pattern_taxonomy: String,
    pub waiter_taxonomy: String,
    pub exclusion_tags: Vec<String>,
    pub begin_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Venue-wide activity for the evaluated week, shared across the batch:
/// totals over every pattern plus the per-pattern workable-invoice
/// denominators.
#[derive(Debug, Clone, Default)]
pub struct GeneralActivity {
    pub total: f64,
    pub invoices: u64,
    pub client_count: f64,
    pub workable_invoices: HashMap<String, u64>,
    pub not_workable_filters: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("goal for pattern {0:?} names no target tag")]
    GoalWithoutTarget(String),
    #[error("goal targets tag {tag:?} which is not part of pattern {pattern:?}")]
    GoalTagNotInBaseline { pattern: String, tag: String },
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}

struct GoalAxisRow {
    name: String,
    presence: f64,
    ratio: f64,
}

struct WaiterRanking {
    tally: WaiterTally,
    waiters_info: Vec<WaiterInfo>,
    best_vpc: Vec<RankedEntry<WaiterVpcStanding>>,
    worst_vpc: Vec<RankedEntry<WaiterVpcStanding>>,
    best_goal: Vec<RankedEntry<WaiterGoalStanding>>,
    worst_goal: Vec<RankedEntry<WaiterGoalStanding>>,
}

/// Assembles the scorecard for one (pattern, goal, week) as an ordered
/// pipeline: fetch, synthesize the goal category, score, rank waiters, split
/// display columns, classify, derive increments, and chart the trend. The
/// five aggregate fetches run sequentially because later phases depend on
/// earlier rows; different patterns of a batch are independent.
pub struct PatternReportBuilder<'a> {
    service: &'a dyn SalesAggregationService,
    scope: &'a EvaluationScope,
    general: &'a GeneralActivity,
    pattern: &'a Pattern,
    goal: &'a Goal,
}

impl<'a> PatternReportBuilder<'a> {
    pub fn new(
        service: &'a dyn SalesAggregationService,
        scope: &'a EvaluationScope,
        general: &'a GeneralActivity,
        pattern: &'a Pattern,
        goal: &'a Goal,
    ) -> Self {
        Self {
            service,
            scope,
            general,
            pattern,
            goal,
        }
    }

    /// Run the pipeline. `Ok(None)` is the soft no-data outcome: the pattern
    /// had no sales at all in the evaluated window and the caller should skip
    /// it rather than fail the batch.
    pub fn build(&self) -> Result<Option<PatternReport>, ReportError> {
        let primary_tag = self
            .goal
            .primary_tag()
            .ok_or_else(|| ReportError::GoalWithoutTarget(self.pattern.name.clone()))?
            .to_string();
        let goal_baseline = self
            .pattern
            .products_tags
            .iter()
            .find(|tag| tag.name == primary_tag)
            .ok_or_else(|| ReportError::GoalTagNotInBaseline {
                pattern: self.pattern.name.clone(),
                tag: primary_tag.clone(),
            })?;

        // Fetch: the pattern's own sales row plus its per-category rows.
        let AggregateBundle {
            sales,
            mut categories,
        } = self.service.query(&self.pattern_query(
            Facets::sales_and_categories(),
            AggregateScope::Full,
            self.scope.begin_date,
        ))?;
        let Some(sales) = sales.into_iter().next() else {
            info!(
                pattern = %self.pattern.name,
                local = %self.scope.local_id,
                "no sales data in evaluated window, returning empty report"
            );
            return Ok(None);
        };

        self.synthesize_goal_category(&mut categories, &primary_tag);

        // Score: per-tag metrics, with the goal tag's pair pulled out.
        let mut tag_metrics = tags::aggregate(
            &self.pattern.products_tags,
            &categories,
            self.goal,
            sales.client_count,
        );
        let goal_entries = match tag_metrics.iter().position(|tag| tag.name == primary_tag) {
            Some(index) => tag_metrics.remove(index).entries,
            None => {
                return Err(ReportError::GoalTagNotInBaseline {
                    pattern: self.pattern.name.clone(),
                    tag: primary_tag.clone(),
                })
            }
        };
        let (projected, achieved) = match goal_entries.as_slice() {
            [projected, achieved] => (projected.clone(), achieved.clone()),
            _ => {
                return Err(ReportError::GoalTagNotInBaseline {
                    pattern: self.pattern.name.clone(),
                    tag: primary_tag.clone(),
                })
            }
        };

        let total = round_to(sales.total, 2);
        let general_total = round_to(self.general.total, 2);
        let total_per = (total * 100.0 / general_total).round() as i64;
        let invoices_per =
            (sales.invoices as f64 * 100.0 / self.general.invoices as f64).round() as i64;

        let workable_denominator = self
            .general
            .workable_invoices
            .get(&self.pattern.name)
            .map(|count| *count as f64)
            .unwrap_or(1.0);
        let workable_ratio = sales.invoices as f64 / workable_denominator;

        let goal_value = match self.goal.indicator {
            GoalIndicator::Presence => (projected.presence * 100.0).round(),
            GoalIndicator::Ratio => round_to(projected.ratio, 1),
        };
        let achieved_value = match self.goal.indicator {
            GoalIndicator::Presence => (achieved.presence * 100.0).round(),
            GoalIndicator::Ratio => round_to(achieved.ratio, 1),
        };
        let achieved_goal_per = match self.goal.indicator {
            GoalIndicator::Presence => {
                indicator::evaluate(achieved.presence, goal_baseline.base_presence)
            }
            GoalIndicator::Ratio => indicator::evaluate(achieved.ratio, goal_baseline.base_ratio),
        };

        // Rank: waiter scorecards and both leaderboard axes.
        let ranking = self.rank_waiters()?;

        // Split: remaining tags into the two display columns.
        let (products_tags_left, products_tags_right) = self.split_display_columns(&tag_metrics);

        // Classify and derive the increments.
        let weekly_vpc = round_to(sales.total_per_client, 2);
        let performance_level = PerformanceLevel::classify(
            sales.total_per_client,
            self.pattern.base_vpc,
            self.pattern.base_standard_deviation,
        );
        let incremental_vpc = round_to(sales.total_per_client - self.pattern.base_vpc, 2);
        let incremental_vpc_per = indicator::evaluate(incremental_vpc, self.pattern.base_vpc);
        let weekly_increase = round_to(incremental_vpc * sales.client_count, 2);

        let cumulative_increase = self.cumulative_increase()?;
        let trend = self.trend_series(weekly_vpc)?;

        debug!(
            pattern = %self.pattern.name,
            level = performance_level.label(),
            weekly_vpc,
            "pattern report assembled"
        );

        Ok(Some(PatternReport {
            header: ReportHeader {
                local_id: self.scope.local_id.clone(),
                local_name: self.scope.local_name.clone(),
                locale: self.scope.locale.clone(),
                pattern_name: self.pattern.name.clone(),
                goal_indicator: self.goal.indicator,
                primary_tag,
                week: IsoWeek::of(self.scope.begin_date),
                begin_date: self.scope.begin_date,
                end_date: self.scope.end_date,
            },
            total,
            general_total,
            total_per,
            invoices: sales.invoices,
            general_invoices: self.general.invoices,
            invoices_per,
            client_count: sales.client_count,
            general_client_count: self.general.client_count,
            workable_invoices: (workable_ratio * 100.0).round() as i64,
            workable_invoices_per: indicator::evaluate(
                workable_ratio,
                self.pattern.base_data_quality,
            ),
            goal: goal_value,
            achieved_goal: achieved_value,
            achieved_goal_per,
            achieved_goal_vpc: achieved.incremental_vpc,
            achieved_goal_info: indicator::evaluate_goal(goal_value, achieved_value),
            performance_goal: vec![projected, achieved],
            waiters: ranking.tally,
            waiters_info: ranking.waiters_info,
            best_waiters_vpc: ranking.best_vpc,
            worst_waiters_vpc: ranking.worst_vpc,
            best_waiters_goal: ranking.best_goal,
            worst_waiters_goal: ranking.worst_goal,
            products_tags_left,
            products_tags_right,
            performance_level,
            weekly_vpc,
            incremental_vpc,
            incremental_vpc_per,
            weekly_increase,
            cumulative_increase,
            trend,
        }))
    }

    /// The goal's category may simply not have sold this week; a zero row
    /// keeps the downstream scoring from ever missing the goal tag.
    fn synthesize_goal_category(&self, categories: &mut Vec<CategoryAggregate>, primary_tag: &str) {
        if categories
            .iter()
            .any(|row| row.category_name == primary_tag)
        {
            return;
        }
        let (tag_id, tag_name) = categories
            .first()
            .map(|row| (row.sales.tag_id.clone(), row.sales.tag_name.clone()))
            .unwrap_or_else(|| (self.goal.tag.clone(), self.goal.tag_name.clone()));
        debug!(tag = %primary_tag, "goal category absent from period rows, synthesizing zero row");
        categories.push(CategoryAggregate {
            sales: SalesAggregate {
                tag_id,
                tag_name,
                total: 0.0,
                subtotal: 0.0,
                tax: 0.0,
                discount: 0.0,
                invoices: 0,
                articles: 0.0,
                client_count: 0.0,
                average_price: 0.0,
                total_per_client: 0.0,
                time: None,
            },
            category_name: primary_tag.to_string(),
            category_branch: self.goal.goal_products_tags.clone(),
        });
    }

    fn rank_waiters(&self) -> Result<WaiterRanking, ReportError> {
        // Workable-invoice counts per waiter, then the full sales/category
        // split for the same population.
        let workable_rows = self
            .service
            .query(&self.waiter_query(self.general.not_workable_filters.clone(), Facets::sales()))?
            .sales;
        let AggregateBundle {
            sales: mut waiter_sales,
            categories: mut waiter_categories,
        } = self.service.query(&self.waiter_query(
            self.scope.exclusion_tags.clone(),
            Facets::sales_and_categories(),
        ))?;

        waiter_sales.sort_by(|a, b| {
            b.total_per_client
                .partial_cmp(&a.total_per_client)
                .unwrap_or(Ordering::Equal)
        });
        waiter_categories.retain(|row| row.category_branch == self.goal.goal_products_tags);

        let mut waiters_info: Vec<WaiterInfo> = waiter_sales
            .iter()
            .map(|row| {
                let workable = workable_rows
                    .iter()
                    .find(|workable| workable.tag_id == row.tag_id)
                    .map(|workable| workable.invoices)
                    .unwrap_or(row.invoices);
                let workable_invoices = if workable == 0 {
                    100.0
                } else {
                    (row.invoices as f64 * 100.0 / workable as f64).round()
                };
                WaiterInfo {
                    uuid: row.tag_id.clone(),
                    name: row.tag_name.trim().to_string(),
                    client_count: row.client_count.round(),
                    total: round_to(row.total, 2),
                    vpc: round_to(row.total_per_client, 2),
                    workable_invoices,
                    achieved_goal: 0.0,
                    goal: GoalStatus::NotMet,
                }
            })
            .collect();

        let mut goal_axis: Vec<GoalAxisRow> = Vec::with_capacity(waiter_categories.len());
        let mut classified: HashSet<String> = HashSet::new();
        let mut achieved_count = 0usize;
        for row in &waiter_categories {
            let waiter_clients = waiter_sales
                .iter()
                .find(|sales| sales.tag_id == row.sales.tag_id)
                .map(|sales| sales.client_count)
                .unwrap_or(1.0);
            let presence = row.sales.client_count / waiter_clients;
            let ratio = if row.sales.client_count != 0.0 {
                row.sales.articles / row.sales.client_count
            } else {
                0.0
            };
            let metric = match self.goal.indicator {
                GoalIndicator::Presence => presence,
                GoalIndicator::Ratio => ratio,
            };
            let status = if metric >= self.goal.value_indicator {
                GoalStatus::Met
            } else {
                GoalStatus::NotMet
            };
            if status == GoalStatus::Met {
                achieved_count += 1;
            }
            if let Some(info) = waiters_info
                .iter_mut()
                .find(|info| info.uuid == row.sales.tag_id)
            {
                info.achieved_goal = match self.goal.indicator {
                    GoalIndicator::Presence => (presence * 100.0).round(),
                    GoalIndicator::Ratio => round_to(ratio, 1),
                };
                info.goal = status;
                classified.insert(info.uuid.clone());
            }
            goal_axis.push(GoalAxisRow {
                name: row.sales.tag_name.trim().to_string(),
                presence,
                ratio,
            });
        }

        // Waiters with sales but no goal-category activity still compete on
        // the goal axis, with zero metrics and a Not met classification.
        for info in &waiters_info {
            if !classified.contains(&info.uuid) {
                goal_axis.push(GoalAxisRow {
                    name: info.name.clone(),
                    presence: 0.0,
                    ratio: 0.0,
                });
            }
        }

        let tally = WaiterTally {
            achieved: achieved_count,
            total: goal_axis.len(),
        };

        goal_axis.sort_by(|a, b| {
            let (left, right) = match self.goal.indicator {
                GoalIndicator::Presence => (a.presence, b.presence),
                GoalIndicator::Ratio => (a.ratio, b.ratio),
            };
            right.partial_cmp(&left).unwrap_or(Ordering::Equal)
        });
        waiters_info.sort_by(|a, b| a.goal.label().cmp(b.goal.label()));

        let vpc_axis: Vec<WaiterVpcStanding> = waiter_sales
            .iter()
            .map(|row| WaiterVpcStanding {
                name: row.tag_name.trim().to_string(),
                vpc: round_to(row.total_per_client, 2),
            })
            .collect();
        let (best_vpc, worst_vpc) = ranking::select_leaderboards(&vpc_axis);

        let goal_standings: Vec<WaiterGoalStanding> = goal_axis
            .iter()
            .map(|row| WaiterGoalStanding {
                name: row.name.clone(),
                value: match self.goal.indicator {
                    GoalIndicator::Presence => (row.presence * 100.0).round(),
                    GoalIndicator::Ratio => round_to(row.ratio, 1),
                },
            })
            .collect();
        let (best_goal, worst_goal) = ranking::select_leaderboards(&goal_standings);

        Ok(WaiterRanking {
            tally,
            waiters_info,
            best_vpc,
            worst_vpc,
            best_goal,
            worst_goal,
        })
    }

    /// Left column takes indices `0..=len/2`, right column the rest; entries
    /// keep their stable insertion (baseline) order.
    fn split_display_columns(&self, tag_metrics: &[TagMetrics]) -> (Vec<DisplayTag>, Vec<DisplayTag>) {
        let mut left = Vec::new();
        let mut right = Vec::new();
        if tag_metrics.is_empty() {
            return (left, right);
        }
        let pivot = tag_metrics.len() / 2;
        for (index, tag) in tag_metrics.iter().enumerate() {
            let Some(entry) = tag.entries.first() else {
                continue;
            };
            let Some(baseline) = self
                .pattern
                .products_tags
                .iter()
                .find(|baseline| baseline.name == tag.name)
            else {
                continue;
            };
            let display = DisplayTag {
                name: entry.name.clone(),
                image: entry.image.clone(),
                presence: entry.presence,
                presence_variation: indicator::evaluate(entry.presence, baseline.base_presence),
                ratio: entry.ratio,
                ratio_variation: indicator::evaluate(entry.ratio, baseline.base_ratio),
                incremental_vpc: entry.incremental_vpc,
            };
            if index <= pivot {
                left.push(display);
            } else {
                right.push(display);
            }
        }
        (left, right)
    }

    /// Sum of `(weekly VPC − base VPC) × weekly diners` from the pattern's
    /// reference week through the evaluated week.
    fn cumulative_increase(&self) -> Result<f64, ReportError> {
        let (reference_monday, _) = week_window(self.pattern.reference_date);
        let rows = self
            .service
            .query(&self.pattern_query(Facets::sales(), AggregateScope::Weekly, reference_monday))?
            .sales;
        let sum: f64 = rows
            .iter()
            .map(|week| (week.total_per_client - self.pattern.base_vpc) * week.client_count)
            .sum();
        Ok(round_to(sum, 2))
    }

    /// Twelve most recent weekly VPC points ending at the evaluated week,
    /// delivered oldest-first so the series reads chronologically.
    fn trend_series(&self, weekly_vpc: f64) -> Result<TrendSeries, ReportError> {
        let begin = self.scope.end_date - Duration::weeks(TREND_WEEKS as i64 - 1);
        let mut rows = self
            .service
            .query(&self.pattern_query(Facets::sales(), AggregateScope::Weekly, begin))?
            .sales;
        rows.sort_by(|a, b| {
            let left = a.time.map(|time| (time.year, time.week)).unwrap_or_default();
            let right = b.time.map(|time| (time.year, time.week)).unwrap_or_default();
            right.cmp(&left)
        });

        let mut dates: Vec<NaiveDate> = Vec::new();
        let mut historical_vpc: Vec<f64> = Vec::new();
        for row in rows.iter().take(TREND_WEEKS) {
            let Some(week) = row.time else {
                continue;
            };
            let Some(date) = week.monday() else {
                continue;
            };
            dates.insert(0, date);
            historical_vpc.insert(0, round_to(row.total_per_client, 2));
        }

        let (reference_monday, _) = week_window(self.pattern.reference_date);
        let reference_week_index = dates.iter().position(|date| {
            date.day() == reference_monday.day() && date.month() == reference_monday.month()
        });
        let label_emphasis_index = historical_vpc.len().checked_sub(1);
        let current_vpc = historical_vpc.last().copied().unwrap_or(weekly_vpc);

        Ok(TrendSeries {
            base_vpc: round_to(self.pattern.base_vpc, 2),
            optimum_vpc: round_to(self.pattern.optimum_vpc, 2),
            current_vpc,
            dates,
            historical_vpc,
            reference_week_index,
            label_emphasis_index,
        })
    }

    fn pattern_query(
        &self,
        facets: Facets,
        scope: AggregateScope,
        begin: NaiveDate,
    ) -> AggregateQuery {
        AggregateQuery {
            locations: vec![self.scope.local_id.clone()],
            range: DateRange {
                begin,
                end: self.scope.end_date,
            },
            taxonomy_id: self.scope.pattern_taxonomy.clone(),
            merge_locations: false,
            exclusion_tag_ids: self.scope.exclusion_tags.clone(),
            inclusion_tag_ids: vec![self.goal.tag.clone()],
            scope,
            exclude_taxes: self.scope.exclude_taxes,
            grouping_tag_id: Some(self.goal.tag.clone()),
            grouping_kind: Some(GROUPING_KIND.to_string()),
            group_id: self.scope.group_id.clone(),
            facets,
        }
    }

    fn waiter_query(&self, exclusion_tag_ids: Vec<String>, facets: Facets) -> AggregateQuery {
        AggregateQuery {
            locations: vec![self.scope.local_id.clone()],
            range: DateRange {
                begin: self.scope.begin_date,
                end: self.scope.end_date,
            },
            taxonomy_id: self.scope.waiter_taxonomy.clone(),
            merge_locations: false,
            exclusion_tag_ids,
            inclusion_tag_ids: vec![self.goal.tag.clone()],
            scope: AggregateScope::Full,
            exclude_taxes: self.scope.exclude_taxes,
            grouping_tag_id: Some(self.goal.tag.clone()),
            grouping_kind: Some(GROUPING_KIND.to_string()),
            group_id: self.scope.group_id.clone(),
            facets,
        }
    }
}
