mod builder;
mod views;

pub use builder::{
    EvaluationScope, GeneralActivity, PatternReportBuilder, ReportError, GROUPING_KIND,
    TREND_WEEKS,
};
pub use views::{
    DisplayTag, PatternReport, ReportHeader, TrendSeries, WaiterGoalStanding, WaiterInfo,
    WaiterTally, WaiterVpcStanding,
};
