pub mod aggregates;
pub mod directory;
pub mod domain;
pub mod evaluation;
pub mod indicator;
pub mod ranking;
pub mod report;
pub mod store;
pub mod tags;

pub use domain::{
    Goal, GoalIndicator, GoalState, GoalStatus, IsoWeek, Pattern, PerformanceLevel,
    ProductTagBaseline,
};
pub use evaluation::{EvaluationError, WeeklyEvaluation};
pub use report::{PatternReport, PatternReportBuilder};
pub use store::{PatternCatalog, PatternDraft};
