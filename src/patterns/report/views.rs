use chrono::NaiveDate;
use serde::Serialize;

use crate::patterns::domain::{GoalIndicator, GoalStatus, IsoWeek, PerformanceLevel};
use crate::patterns::indicator::IndicatorResult;
use crate::patterns::ranking::RankedEntry;
use crate::patterns::tags::ProductTagMetric;

/// Raw header context handed to the rendering layer. Locale and currency
/// formatting happen there; only plain values travel here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportHeader {
    pub local_id: String,
    pub local_name: String,
    pub locale: String,
    pub pattern_name: String,
    pub goal_indicator: GoalIndicator,
    pub primary_tag: String,
    pub week: IsoWeek,
    pub begin_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Per-waiter scorecard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaiterInfo {
    pub uuid: String,
    pub name: String,
    pub client_count: f64,
    pub total: f64,
    pub vpc: f64,
    /// Percent of the waiter's invoices that count toward data quality.
    pub workable_invoices: f64,
    /// Presence percent (PP goals) or per-diner ratio (PR goals).
    pub achieved_goal: f64,
    pub goal: GoalStatus,
}

/// Leaderboard entry on the per-client-revenue axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaiterVpcStanding {
    pub name: String,
    pub vpc: f64,
}

/// Leaderboard entry on the goal-metric axis; `value` follows the goal's
/// indicator type the same way [`WaiterInfo::achieved_goal`] does.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaiterGoalStanding {
    pub name: String,
    pub value: f64,
}

/// Waiters who reached the goal threshold out of those ranked on the
/// goal-metric axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WaiterTally {
    pub achieved: usize,
    pub total: usize,
}

/// Non-goal tag prepared for one of the two display columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayTag {
    pub name: String,
    pub image: String,
    pub presence: f64,
    pub presence_variation: IndicatorResult,
    pub ratio: f64,
    pub ratio_variation: IndicatorResult,
    pub incremental_vpc: f64,
}

/// Chronological (oldest to newest) weekly VPC series handed to the chart
/// renderer, together with the horizontal baselines it draws.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendSeries {
    pub base_vpc: f64,
    pub optimum_vpc: f64,
    pub current_vpc: f64,
    pub dates: Vec<NaiveDate>,
    pub historical_vpc: Vec<f64>,
    /// Index of the week matching the pattern's reference date, if charted.
    pub reference_week_index: Option<usize>,
    /// Most recent point, marked for label emphasis by the renderer.
    pub label_emphasis_index: Option<usize>,
}

/// Full numeric scorecard for one (pattern, goal, week) computation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternReport {
    pub header: ReportHeader,
    pub total: f64,
    pub general_total: f64,
    /// Rounded percent of the venue-wide total attributable to the pattern.
    pub total_per: i64,
    pub invoices: u64,
    pub general_invoices: u64,
    pub invoices_per: i64,
    pub client_count: f64,
    pub general_client_count: f64,
    /// Rounded percent of invoices that count toward data quality.
    pub workable_invoices: i64,
    pub workable_invoices_per: IndicatorResult,
    /// Target value in display units (presence percent or ratio).
    pub goal: f64,
    pub achieved_goal: f64,
    pub achieved_goal_per: IndicatorResult,
    pub achieved_goal_vpc: f64,
    pub achieved_goal_info: IndicatorResult,
    /// The goal tag's `[projected, achieved]` metric pair.
    pub performance_goal: Vec<ProductTagMetric>,
    pub waiters: WaiterTally,
    pub waiters_info: Vec<WaiterInfo>,
    pub best_waiters_vpc: Vec<RankedEntry<WaiterVpcStanding>>,
    pub worst_waiters_vpc: Vec<RankedEntry<WaiterVpcStanding>>,
    pub best_waiters_goal: Vec<RankedEntry<WaiterGoalStanding>>,
    pub worst_waiters_goal: Vec<RankedEntry<WaiterGoalStanding>>,
    pub products_tags_left: Vec<DisplayTag>,
    pub products_tags_right: Vec<DisplayTag>,
    pub performance_level: PerformanceLevel,
    pub weekly_vpc: f64,
    pub incremental_vpc: f64,
    pub incremental_vpc_per: IndicatorResult,
    pub weekly_increase: f64,
    pub cumulative_increase: f64,
    pub trend: TrendSeries,
}
