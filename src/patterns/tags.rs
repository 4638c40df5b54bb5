use serde::Serialize;
use tracing::debug;

use super::aggregates::CategoryAggregate;
use super::domain::{round_to, Goal, GoalIndicator, ProductTagBaseline};

/// Metric derived for one product tag over one scoring window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductTagMetric {
    pub name: String,
    pub image: String,
    pub presence: f64,
    pub ratio: f64,
    pub incremental_vpc: f64,
}

/// Metrics for one baseline tag, kept in baseline order. The goal's primary
/// tag carries two entries: the projected target first, then the achieved
/// values; every other tag carries a single achieved entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagMetrics {
    pub name: String,
    pub entries: Vec<ProductTagMetric>,
}

/// Derive presence, ratio, and incremental VPC for every baseline tag that
/// has a matching period row. Tags without a period row are not reportable
/// and are left out of the result.
///
/// The baseline incremental VPC prices the baseline presence and ratio at the
/// *current* period's average price, not a baseline price.
pub fn aggregate(
    baseline_tags: &[ProductTagBaseline],
    period_rows: &[CategoryAggregate],
    goal: &Goal,
    pattern_client_count: f64,
) -> Vec<TagMetrics> {
    let mut metrics = Vec::with_capacity(baseline_tags.len());

    for baseline in baseline_tags {
        let Some(row) = period_rows
            .iter()
            .find(|row| row.category_name == baseline.name)
        else {
            debug!(tag = %baseline.name, "baseline tag has no period row, skipping");
            continue;
        };

        let baseline_incremental_vpc =
            baseline.base_presence * baseline.base_ratio * row.sales.average_price;
        let presence = row.sales.client_count / pattern_client_count;
        let ratio = if row.sales.client_count != 0.0 {
            row.sales.articles / row.sales.client_count
        } else {
            0.0
        };

        let is_goal_tag = goal.targets_tag(&baseline.name);
        let mut entries = Vec::with_capacity(if is_goal_tag { 2 } else { 1 });

        if is_goal_tag {
            let projected_presence = match goal.indicator {
                GoalIndicator::Presence => goal.value_indicator,
                GoalIndicator::Ratio => presence,
            };
            let projected_ratio = match goal.indicator {
                GoalIndicator::Ratio => goal.value_indicator,
                GoalIndicator::Presence => ratio,
            };
            entries.push(ProductTagMetric {
                name: baseline.name.clone(),
                image: baseline.image.clone(),
                presence: projected_presence,
                ratio: projected_ratio,
                incremental_vpc: round_to(
                    projected_presence * projected_ratio * row.sales.average_price
                        - baseline_incremental_vpc,
                    0,
                ),
            });
        }

        entries.push(ProductTagMetric {
            name: baseline.name.clone(),
            // The projected entry carries the tag image for goal tags.
            image: if is_goal_tag {
                String::new()
            } else {
                baseline.image.clone()
            },
            presence,
            ratio,
            incremental_vpc: round_to(
                presence * ratio * row.sales.average_price - baseline_incremental_vpc,
                0,
            ),
        });

        metrics.push(TagMetrics {
            name: baseline.name.clone(),
            entries,
        });
    }

    metrics
}
