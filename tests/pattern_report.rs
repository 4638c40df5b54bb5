//! End-to-end specifications for the pattern report pipeline, driven through
//! the public builder against an in-memory aggregation service so every phase
//! (fetch, synthesis, scoring, ranking, trend) is exercised without reaching
//! into private modules.

mod common {
    use std::sync::Mutex;

    use chrono::NaiveDate;

    use venue_patterns::patterns::aggregates::{
        AggregateBundle, AggregateQuery, AggregateScope, AggregationError, CategoryAggregate,
        SalesAggregate, SalesAggregationService,
    };
    use venue_patterns::patterns::domain::{
        Goal, GoalIndicator, GoalState, IsoWeek, Pattern, ProductTagBaseline,
    };
    use venue_patterns::patterns::report::{EvaluationScope, GeneralActivity};

    pub(super) const PATTERN_TAXONOMY_ID: &str = "tax-pattern";
    pub(super) const WAITER_TAXONOMY_ID: &str = "tax-waiter";

    pub(super) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    pub(super) fn sales_row(
        tag_id: &str,
        tag_name: &str,
        total: f64,
        invoices: u64,
        articles: f64,
        client_count: f64,
        average_price: f64,
        total_per_client: f64,
        time: Option<IsoWeek>,
    ) -> SalesAggregate {
        SalesAggregate {
            tag_id: tag_id.to_string(),
            tag_name: tag_name.to_string(),
            total,
            subtotal: total,
            tax: 0.0,
            discount: 0.0,
            invoices,
            articles,
            client_count,
            average_price,
            total_per_client,
            time,
        }
    }

    pub(super) fn category_row(
        tag_id: &str,
        tag_name: &str,
        category_name: &str,
        branch: &[&str],
        client_count: f64,
        articles: f64,
        average_price: f64,
    ) -> CategoryAggregate {
        CategoryAggregate {
            sales: sales_row(
                tag_id,
                tag_name,
                client_count * average_price,
                10,
                articles,
                client_count,
                average_price,
                0.0,
                None,
            ),
            category_name: category_name.to_string(),
            category_branch: branch.iter().map(|name| name.to_string()).collect(),
        }
    }

    pub(super) fn pattern() -> Pattern {
        Pattern {
            uuid: Pattern::derive_uuid("group-1", "local-1", "Dinner"),
            group: "group-1".to_string(),
            local: "local-1".to_string(),
            name: "Dinner".to_string(),
            reference_date: date(2020, 1, 6),
            base_vpc: 50.0,
            base_standard_deviation: 5.0,
            base_data_quality: 0.9,
            deficient_vpc: 40.0,
            optimum_vpc: 70.0,
            products_tags: vec![
                tag_baseline("desserts", 0.5, 1.2),
                tag_baseline("starters", 0.4, 1.1),
                tag_baseline("coffee", 0.3, 1.0),
                tag_baseline("wines", 0.2, 2.0),
            ],
        }
    }

    fn tag_baseline(name: &str, base_presence: f64, base_ratio: f64) -> ProductTagBaseline {
        ProductTagBaseline {
            name: name.to_string(),
            image: format!("https://cdn.example.com/{name}.png"),
            base_presence,
            base_ratio,
        }
    }

    pub(super) fn presence_goal() -> Goal {
        Goal {
            indicator: GoalIndicator::Presence,
            value_indicator: 0.8,
            goal_products_tags: vec!["desserts".to_string()],
            tag: "tag-goal".to_string(),
            tag_name: "Dinner".to_string(),
            open_date: date(2020, 1, 1),
            close_date: date(2020, 12, 31),
            status: GoalState::Open,
        }
    }

    pub(super) fn scope() -> EvaluationScope {
        EvaluationScope {
            group_id: "group-1".to_string(),
            local_id: "local-1".to_string(),
            local_name: "Harbor Bistro".to_string(),
            locale: "en".to_string(),
            exclude_taxes: false,
            pattern_taxonomy: PATTERN_TAXONOMY_ID.to_string(),
            waiter_taxonomy: WAITER_TAXONOMY_ID.to_string(),
            exclusion_tags: vec!["tag-excluded".to_string()],
            begin_date: date(2020, 2, 10),
            end_date: date(2020, 2, 16),
        }
    }

    pub(super) fn general() -> GeneralActivity {
        let mut general = GeneralActivity {
            total: 20000.0,
            invoices: 400,
            client_count: 1000.0,
            ..GeneralActivity::default()
        };
        general
            .workable_invoices
            .insert("Dinner".to_string(), 110);
        general.not_workable_filters = vec!["tag-not-workable".to_string()];
        general
    }

    pub(super) fn pattern_week_bundle() -> AggregateBundle {
        AggregateBundle {
            sales: vec![sales_row(
                "tag-dinner",
                "Dinner",
                5300.0,
                100,
                260.0,
                100.0,
                20.0,
                53.0,
                None,
            )],
            categories: vec![
                category_row("tag-dinner", "Dinner", "desserts", &["desserts"], 40.0, 60.0, 5.0),
                category_row("tag-dinner", "Dinner", "starters", &["starters"], 30.0, 30.0, 4.0),
                category_row("tag-dinner", "Dinner", "coffee", &["coffee"], 20.0, 20.0, 2.0),
                category_row("tag-dinner", "Dinner", "wines", &["wines"], 10.0, 15.0, 8.0),
            ],
        }
    }

    pub(super) fn waiter_workable_rows() -> Vec<SalesAggregate> {
        vec![
            sales_row("tag-w1", " Ana ", 0.0, 50, 0.0, 0.0, 0.0, 0.0, None),
            sales_row("tag-w2", "Bob", 0.0, 40, 0.0, 0.0, 0.0, 0.0, None),
            sales_row("tag-w3", "Carl", 0.0, 20, 0.0, 0.0, 0.0, 0.0, None),
        ]
    }

    pub(super) fn waiter_week_bundle() -> AggregateBundle {
        AggregateBundle {
            sales: vec![
                sales_row("tag-w1", " Ana ", 2000.0, 45, 80.0, 40.0, 25.0, 50.0, None),
                sales_row("tag-w2", "Bob", 1800.0, 36, 72.0, 40.0, 25.0, 45.0, None),
                sales_row("tag-w3", "Carl", 1500.0, 18, 40.0, 20.0, 37.5, 75.0, None),
            ],
            categories: vec![
                category_row("tag-w1", " Ana ", "desserts", &["desserts"], 32.0, 40.0, 5.0),
                category_row("tag-w2", "Bob", "desserts", &["desserts"], 8.0, 8.0, 5.0),
                // Activity outside the goal branch never reaches the axis.
                category_row("tag-w1", " Ana ", "coffee", &["coffee"], 10.0, 10.0, 2.0),
            ],
        }
    }

    pub(super) fn cumulative_rows() -> Vec<SalesAggregate> {
        vec![
            sales_row(
                "tag-dinner",
                "Dinner",
                0.0,
                0,
                0.0,
                90.0,
                0.0,
                52.0,
                Some(IsoWeek { year: 2020, week: 5 }),
            ),
            sales_row(
                "tag-dinner",
                "Dinner",
                0.0,
                0,
                0.0,
                100.0,
                0.0,
                49.0,
                Some(IsoWeek { year: 2020, week: 6 }),
            ),
        ]
    }

    pub(super) fn trend_rows(weeks: usize) -> Vec<SalesAggregate> {
        // Twelve ISO weeks ending at 2020-W07, oldest first, handed to the
        // builder shuffled newest-last so sorting is actually exercised.
        let all: Vec<IsoWeek> = vec![
            IsoWeek { year: 2019, week: 48 },
            IsoWeek { year: 2019, week: 49 },
            IsoWeek { year: 2019, week: 50 },
            IsoWeek { year: 2019, week: 51 },
            IsoWeek { year: 2019, week: 52 },
            IsoWeek { year: 2020, week: 1 },
            IsoWeek { year: 2020, week: 2 },
            IsoWeek { year: 2020, week: 3 },
            IsoWeek { year: 2020, week: 4 },
            IsoWeek { year: 2020, week: 5 },
            IsoWeek { year: 2020, week: 6 },
            IsoWeek { year: 2020, week: 7 },
        ];
        let mut rows: Vec<SalesAggregate> = all
            .iter()
            .rev()
            .take(weeks)
            .enumerate()
            .map(|(offset, week)| {
                sales_row(
                    "tag-dinner",
                    "Dinner",
                    0.0,
                    0,
                    0.0,
                    100.0,
                    0.0,
                    53.0 - offset as f64,
                    Some(*week),
                )
            })
            .collect();
        rows.reverse();
        rows
    }

    /// Dispatching double for the five fetches one build issues.
    pub(super) struct StubAggregates {
        pub pattern_week: AggregateBundle,
        pub waiter_workable: Vec<SalesAggregate>,
        pub waiter_week: AggregateBundle,
        pub weekly_since_reference: Vec<SalesAggregate>,
        pub weekly_last_twelve: Vec<SalesAggregate>,
        pub trend_begin: NaiveDate,
        pub calls: Mutex<Vec<AggregateQuery>>,
    }

    impl StubAggregates {
        pub(super) fn scripted() -> Self {
            Self {
                pattern_week: pattern_week_bundle(),
                waiter_workable: waiter_workable_rows(),
                waiter_week: waiter_week_bundle(),
                weekly_since_reference: cumulative_rows(),
                weekly_last_twelve: trend_rows(12),
                trend_begin: date(2019, 12, 1),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(super) fn call_count(&self) -> usize {
            self.calls.lock().expect("calls lock").len()
        }
    }

    impl SalesAggregationService for StubAggregates {
        fn query(&self, query: &AggregateQuery) -> Result<AggregateBundle, AggregationError> {
            self.calls.lock().expect("calls lock").push(query.clone());
            if query.taxonomy_id == WAITER_TAXONOMY_ID {
                if query.facets.categories {
                    return Ok(self.waiter_week.clone());
                }
                return Ok(AggregateBundle {
                    sales: self.waiter_workable.clone(),
                    categories: Vec::new(),
                });
            }
            match query.scope {
                AggregateScope::Full => Ok(self.pattern_week.clone()),
                AggregateScope::Weekly if query.range.begin == self.trend_begin => {
                    Ok(AggregateBundle {
                        sales: self.weekly_last_twelve.clone(),
                        categories: Vec::new(),
                    })
                }
                AggregateScope::Weekly => Ok(AggregateBundle {
                    sales: self.weekly_since_reference.clone(),
                    categories: Vec::new(),
                }),
            }
        }
    }
}

mod scoring {
    use super::common::*;
    use venue_patterns::patterns::domain::PerformanceLevel;
    use venue_patterns::patterns::report::PatternReportBuilder;

    #[test]
    fn good_week_scores_end_to_end() {
        let aggregates = StubAggregates::scripted();
        let pattern = pattern();
        let goal = presence_goal();
        let scope = scope();
        let general = general();

        let report = PatternReportBuilder::new(&aggregates, &scope, &general, &pattern, &goal)
            .build()
            .expect("pipeline succeeds")
            .expect("report present");

        assert_eq!(report.performance_level, PerformanceLevel::Good);
        assert_eq!(report.weekly_vpc, 53.0);
        assert_eq!(report.incremental_vpc, 3.0);
        assert_eq!(report.weekly_increase, 300.0);
        assert_eq!(report.incremental_vpc_per.indicator, -1);

        assert_eq!(report.total, 5300.0);
        assert_eq!(report.general_total, 20000.0);
        assert_eq!(report.total_per, 27);
        assert_eq!(report.invoices, 100);
        assert_eq!(report.general_invoices, 400);
        assert_eq!(report.invoices_per, 25);
        assert_eq!(report.client_count, 100.0);
        assert_eq!(report.general_client_count, 1000.0);

        assert_eq!(report.workable_invoices, 91);
        assert_eq!(report.workable_invoices_per.indicator, 1);
        assert_eq!(report.workable_invoices_per.value, "(+1%)");

        assert_eq!(report.cumulative_increase, 80.0);
        assert_eq!(aggregates.call_count(), 5);

        assert_eq!(report.header.local_name, "Harbor Bistro");
        assert_eq!(report.header.pattern_name, "Dinner");
        assert_eq!(report.header.primary_tag, "desserts");
        assert_eq!(report.header.week.week, 7);
    }

    #[test]
    fn goal_projection_pair_is_reported_separately() {
        let aggregates = StubAggregates::scripted();
        let pattern = pattern();
        let goal = presence_goal();
        let scope = scope();
        let general = general();

        let report = PatternReportBuilder::new(&aggregates, &scope, &general, &pattern, &goal)
            .build()
            .expect("pipeline succeeds")
            .expect("report present");

        assert_eq!(report.performance_goal.len(), 2);
        let projected = &report.performance_goal[0];
        let achieved = &report.performance_goal[1];
        assert_eq!(projected.presence, 0.8);
        assert_eq!(projected.ratio, 1.5);
        assert_eq!(projected.incremental_vpc, 3.0);
        assert_eq!(achieved.presence, 0.4);
        assert_eq!(achieved.incremental_vpc, 0.0);

        assert_eq!(report.goal, 80.0);
        assert_eq!(report.achieved_goal, 40.0);
        assert_eq!(report.achieved_goal_vpc, 0.0);
        assert_eq!(report.achieved_goal_per.indicator, -1);
        assert_eq!(report.achieved_goal_per.value, "(-20%)");
        assert_eq!(report.achieved_goal_info.indicator, -1);
        assert_eq!(report.achieved_goal_info.value, "NOT MET");

        // The goal tag never leaks into the display columns.
        assert!(report
            .products_tags_left
            .iter()
            .chain(report.products_tags_right.iter())
            .all(|tag| tag.name != "desserts"));
    }

    #[test]
    fn display_columns_split_remaining_tags_in_order() {
        let aggregates = StubAggregates::scripted();
        let pattern = pattern();
        let goal = presence_goal();
        let scope = scope();
        let general = general();

        let report = PatternReportBuilder::new(&aggregates, &scope, &general, &pattern, &goal)
            .build()
            .expect("pipeline succeeds")
            .expect("report present");

        let left: Vec<&str> = report
            .products_tags_left
            .iter()
            .map(|tag| tag.name.as_str())
            .collect();
        let right: Vec<&str> = report
            .products_tags_right
            .iter()
            .map(|tag| tag.name.as_str())
            .collect();
        assert_eq!(left, vec!["starters", "coffee"]);
        assert_eq!(right, vec!["wines"]);

        let starters = &report.products_tags_left[0];
        assert_eq!(starters.presence, 0.3);
        assert_eq!(starters.presence_variation.indicator, -1);
        assert_eq!(starters.presence_variation.value, "(-25%)");
        assert_eq!(starters.ratio_variation.value, "(-9%)");
    }

    #[test]
    fn identical_inputs_produce_identical_reports() {
        let aggregates = StubAggregates::scripted();
        let pattern = pattern();
        let goal = presence_goal();
        let scope = scope();
        let general = general();

        let builder = PatternReportBuilder::new(&aggregates, &scope, &general, &pattern, &goal);
        let first = builder.build().expect("first run").expect("report");
        let second = builder.build().expect("second run").expect("report");
        assert_eq!(first, second);
    }

    #[test]
    fn report_serializes_for_the_rendering_layer() {
        let aggregates = StubAggregates::scripted();
        let pattern = pattern();
        let goal = presence_goal();
        let scope = scope();
        let general = general();

        let report = PatternReportBuilder::new(&aggregates, &scope, &general, &pattern, &goal)
            .build()
            .expect("pipeline succeeds")
            .expect("report present");

        let payload = serde_json::to_value(&report).expect("report serializes");
        assert_eq!(
            payload.pointer("/header/goal_indicator").and_then(|v| v.as_str()),
            Some("PP")
        );
        assert_eq!(
            payload.pointer("/performance_level").and_then(|v| v.as_str()),
            Some("good")
        );
        assert_eq!(
            payload.pointer("/waiters/achieved").and_then(|v| v.as_u64()),
            Some(1)
        );
    }
}

mod no_data {
    use super::common::*;
    use venue_patterns::patterns::aggregates::AggregateBundle;
    use venue_patterns::patterns::report::PatternReportBuilder;

    #[test]
    fn missing_week_yields_soft_empty_report() {
        let mut aggregates = StubAggregates::scripted();
        aggregates.pattern_week = AggregateBundle::default();
        let pattern = pattern();
        let goal = presence_goal();
        let scope = scope();
        let general = general();

        let report = PatternReportBuilder::new(&aggregates, &scope, &general, &pattern, &goal)
            .build()
            .expect("pipeline succeeds");
        assert!(report.is_none());
        // The pipeline stops at the first fetch.
        assert_eq!(aggregates.call_count(), 1);
    }

    #[test]
    fn absent_goal_category_is_synthesized_with_zeroes() {
        let mut aggregates = StubAggregates::scripted();
        aggregates
            .pattern_week
            .categories
            .retain(|row| row.category_name != "desserts");
        let pattern = pattern();
        let goal = presence_goal();
        let scope = scope();
        let general = general();

        let report = PatternReportBuilder::new(&aggregates, &scope, &general, &pattern, &goal)
            .build()
            .expect("pipeline succeeds")
            .expect("report present");

        let achieved = &report.performance_goal[1];
        assert_eq!(achieved.presence, 0.0);
        assert_eq!(achieved.ratio, 0.0);
        // With a zero average price the baseline increment is zero as well.
        assert_eq!(achieved.incremental_vpc, 0.0);
        assert_eq!(report.achieved_goal, 0.0);
        assert_eq!(report.achieved_goal_info.value, "NOT MET");
    }
}

mod ranking {
    use super::common::*;
    use venue_patterns::patterns::aggregates::AggregateBundle;
    use venue_patterns::patterns::domain::GoalStatus;
    use venue_patterns::patterns::report::PatternReportBuilder;

    #[test]
    fn leaderboards_are_sorted_on_both_axes() {
        let aggregates = StubAggregates::scripted();
        let pattern = pattern();
        let goal = presence_goal();
        let scope = scope();
        let general = general();

        let report = PatternReportBuilder::new(&aggregates, &scope, &general, &pattern, &goal)
            .build()
            .expect("pipeline succeeds")
            .expect("report present");

        assert_eq!(report.best_waiters_vpc[0].entry.name, "Carl");
        assert_eq!(report.best_waiters_vpc[0].entry.vpc, 75.0);
        assert_eq!(report.worst_waiters_vpc[0].entry.name, "Bob");
        assert!(report
            .best_waiters_vpc
            .windows(2)
            .all(|pair| pair[0].entry.vpc >= pair[1].entry.vpc));
        assert!(report
            .worst_waiters_vpc
            .windows(2)
            .all(|pair| pair[0].entry.vpc <= pair[1].entry.vpc));

        assert_eq!(report.best_waiters_goal[0].entry.name, "Ana");
        assert_eq!(report.best_waiters_goal[0].entry.value, 80.0);
        assert_eq!(report.worst_waiters_goal[0].entry.name, "Carl");
        assert_eq!(report.worst_waiters_goal[0].entry.value, 0.0);
        assert_eq!(report.best_waiters_vpc[0].position, 1);
        assert_eq!(report.best_waiters_vpc[2].position, 3);
    }

    #[test]
    fn waiters_outside_goal_category_default_to_not_met() {
        let aggregates = StubAggregates::scripted();
        let pattern = pattern();
        let goal = presence_goal();
        let scope = scope();
        let general = general();

        let report = PatternReportBuilder::new(&aggregates, &scope, &general, &pattern, &goal)
            .build()
            .expect("pipeline succeeds")
            .expect("report present");

        // One real achiever, three ranked on the goal axis (Carl synthesized).
        assert_eq!(report.waiters.achieved, 1);
        assert_eq!(report.waiters.total, 3);

        let carl = report
            .waiters_info
            .iter()
            .find(|info| info.name == "Carl")
            .expect("Carl present");
        assert_eq!(carl.goal, GoalStatus::NotMet);
        assert_eq!(carl.achieved_goal, 0.0);
        assert_eq!(carl.workable_invoices, 90.0);

        // Met waiters list first; the vpc ordering survives within groups.
        let names: Vec<&str> = report
            .waiters_info
            .iter()
            .map(|info| info.name.as_str())
            .collect();
        assert_eq!(names, vec!["Ana", "Carl", "Bob"]);
        let ana = &report.waiters_info[0];
        assert_eq!(ana.goal, GoalStatus::Met);
        assert_eq!(ana.achieved_goal, 80.0);
    }

    #[test]
    fn single_waiter_backs_every_slot_on_both_axes() {
        let mut aggregates = StubAggregates::scripted();
        aggregates.waiter_workable = vec![sales_row(
            "tag-w1", " Ana ", 0.0, 50, 0.0, 0.0, 0.0, 0.0, None,
        )];
        aggregates.waiter_week = AggregateBundle {
            sales: vec![sales_row(
                "tag-w1", " Ana ", 2000.0, 45, 80.0, 40.0, 25.0, 50.0, None,
            )],
            categories: vec![category_row(
                "tag-w1", " Ana ", "desserts", &["desserts"], 32.0, 40.0, 5.0,
            )],
        };
        let pattern = pattern();
        let goal = presence_goal();
        let scope = scope();
        let general = general();

        let report = PatternReportBuilder::new(&aggregates, &scope, &general, &pattern, &goal)
            .build()
            .expect("pipeline succeeds")
            .expect("report present");

        for board in [&report.best_waiters_vpc, &report.worst_waiters_vpc] {
            assert_eq!(board.len(), 3);
            assert!(board.iter().all(|entry| entry.entry.name == "Ana"));
        }
        for board in [&report.best_waiters_goal, &report.worst_waiters_goal] {
            assert_eq!(board.len(), 3);
            assert!(board.iter().all(|entry| entry.entry.name == "Ana"));
        }
    }
}

mod trend {
    use super::common::*;
    use venue_patterns::patterns::report::PatternReportBuilder;

    #[test]
    fn series_reads_chronologically_with_final_point_emphasized() {
        let aggregates = StubAggregates::scripted();
        let pattern = pattern();
        let goal = presence_goal();
        let scope = scope();
        let general = general();

        let report = PatternReportBuilder::new(&aggregates, &scope, &general, &pattern, &goal)
            .build()
            .expect("pipeline succeeds")
            .expect("report present");

        let trend = &report.trend;
        assert_eq!(trend.dates.len(), 12);
        assert_eq!(trend.historical_vpc.len(), 12);
        assert!(trend.dates.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(trend.dates.first().copied(), Some(date(2019, 11, 25)));
        assert_eq!(trend.dates.last().copied(), Some(date(2020, 2, 10)));
        assert_eq!(trend.historical_vpc.last().copied(), Some(53.0));
        assert_eq!(trend.current_vpc, 53.0);
        assert_eq!(trend.label_emphasis_index, Some(11));
        assert_eq!(trend.base_vpc, 50.0);
        assert_eq!(trend.optimum_vpc, 70.0);
        // Week of the pattern's reference date (2020-W02) marks the chart.
        assert_eq!(trend.reference_week_index, Some(6));
    }

    #[test]
    fn short_history_truncates_gracefully() {
        let mut aggregates = StubAggregates::scripted();
        aggregates.weekly_last_twelve = trend_rows(5);
        let pattern = pattern();
        let goal = presence_goal();
        let scope = scope();
        let general = general();

        let report = PatternReportBuilder::new(&aggregates, &scope, &general, &pattern, &goal)
            .build()
            .expect("pipeline succeeds")
            .expect("report present");

        let trend = &report.trend;
        assert_eq!(trend.dates.len(), 5);
        assert_eq!(trend.historical_vpc.len(), 5);
        assert!(trend.dates.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(trend.label_emphasis_index, Some(4));
        assert_eq!(trend.reference_week_index, None);
    }
}
