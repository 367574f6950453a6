use chrono::{Duration, NaiveDate, NaiveDateTime};
use lending_ops::engine::{
    by_entity, category_summary, classify, compile, over_time, reconcile, schedule,
    status_distribution, Agent, AgentId, Application, ApplicationId, Category, Directory,
    EntityDimension, FilterSpec, Fillial, FillialId, Granularity, Merchant, MerchantId, Payment,
};
use proptest::prelude::*;
use proptest::test_runner::Config;
use std::collections::BTreeSet;

const RAW_STATUSES: [&str; 10] = [
    "CONFIRMED",
    "FINISHED",
    "ACTIVE",
    "REJECTED",
    "SCORING RAD ETDI",
    "LIMIT",
    "NEW",
    "WAITING_FOR_CONTRACT",
    "canceled_by_client",
    "UNMAPPED",
];

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .expect("valid epoch")
}

fn directory() -> Directory {
    let fillials = (1..=4u64).map(|id| Fillial {
        id: FillialId(id),
        region: if id % 2 == 0 { "Tashkent" } else { "Bukhara" }.to_string(),
        merchant_id: MerchantId(if id <= 2 { 10 } else { 20 }),
        name: None,
    });
    // Merchant 20 is intentionally absent so its fillials fall into the unassigned bucket.
    let merchants = [Merchant {
        id: MerchantId(10),
        name: "Artel".to_string(),
    }];
    let agents = [Agent {
        id: AgentId(1),
        name: None,
        fillial_ids: BTreeSet::from([FillialId(1), FillialId(4)]),
    }];
    Directory::new(fillials, merchants, agents)
}

prop_compose! {
    fn application()(
        id in any::<u64>(),
        status in 0..RAW_STATUSES.len(),
        amount in proptest::option::of(0i64..50_000_000),
        term in proptest::option::of(0u32..24),
        minutes in 0i64..(60 * 24 * 400),
        fillial in 1u64..=5,
        paid in any::<bool>(),
    ) -> Application {
        Application {
            id: ApplicationId(id),
            raw_status: RAW_STATUSES[status].to_string(),
            amount,
            payment_amount: None,
            percent: None,
            term_months: term,
            created_at: epoch() + Duration::minutes(minutes),
            fillial_id: FillialId(fillial),
            paid,
            payment_method: paid.then(|| "CARD".to_string()),
            full_name: None,
            phone: None,
            passport: None,
            products: Vec::new(),
            payments: Vec::new(),
        }
    }
}

fn filter_spec() -> impl Strategy<Value = FilterSpec> {
    (
        proptest::option::of(prop_oneof![
            Just(Category::Confirmed),
            Just(Category::Finished),
            Just(Category::Rejected),
            Just(Category::Limit),
            Just(Category::Pending),
        ]),
        proptest::option::of(any::<bool>()),
        proptest::option::of(1u64..=5),
        proptest::option::of(prop_oneof![Just(10u64), Just(20u64)]),
        proptest::option::of(prop_oneof![Just(1u64), Just(7u64)]),
    )
        .prop_map(|(status, paid, fillial, merchant, agent)| FilterSpec {
            status,
            paid,
            fillial_id: fillial.map(FillialId),
            merchant_id: merchant.map(MerchantId),
            agent_id: agent.map(AgentId),
            ..FilterSpec::default()
        })
}

proptest! {
    #![proptest_config(Config::with_cases(128))]

    #[test]
    fn schedule_amounts_sum_to_total(
        total in 0i64..1_000_000_000,
        term in 1i64..60,
        offset in 0i64..3_000,
    ) {
        let start = epoch().date() + Duration::days(offset);
        let entries = schedule(total, term, start).expect("schedule builds");

        prop_assert_eq!(entries.len() as i64, term);
        prop_assert_eq!(entries.iter().map(|entry| entry.expected_amount).sum::<i64>(), total);
        prop_assert!(entries.windows(2).all(|pair| pair[0].due_date < pair[1].due_date));
        prop_assert!(entries.iter().all(|entry| entry.expected_amount >= 0));
    }

    #[test]
    fn remaining_debt_is_total_minus_paid(
        total in 0i64..10_000_000,
        term in 1i64..24,
        amounts in proptest::collection::vec(0i64..5_000_000, 0..8),
        as_of_days in 0i64..900,
    ) {
        let entries = schedule(total, term, epoch().date()).expect("schedule builds");
        let payments: Vec<Payment> = amounts
            .iter()
            .enumerate()
            .map(|(index, amount)| Payment {
                amount: *amount,
                occurred_at: epoch() + Duration::days(20 * index as i64),
                status: None,
            })
            .collect();
        let as_of = epoch() + Duration::days(as_of_days);

        let summary = reconcile(&entries, &payments, as_of).expect("reconciles");
        let received: i64 = amounts.iter().sum();

        prop_assert!(summary.remaining_debt >= 0);
        prop_assert_eq!(summary.total_amount, total);
        prop_assert_eq!(summary.remaining_debt, summary.total_amount - summary.paid_amount);
        prop_assert!(summary.overdue_amount <= summary.remaining_debt);
        prop_assert_eq!(summary.paid_amount + summary.unallocated_amount, received);
        prop_assert!(summary
            .schedule
            .iter()
            .all(|entry| entry.paid_amount <= entry.expected_amount));
    }

    #[test]
    fn classification_is_deterministic(raw in "[A-Za-z_ ]{0,24}") {
        prop_assert_eq!(classify(&raw), classify(&raw));
    }

    #[test]
    fn aggregations_account_for_every_application(
        applications in proptest::collection::vec(application(), 0..40),
        spec in filter_spec(),
    ) {
        let directory = directory();
        let filter = compile(&spec, &directory).expect("filter compiles");
        let matched = filter.apply(&applications);

        let fillials: usize = by_entity(matched.iter().copied(), EntityDimension::Fillial, &directory)
            .iter()
            .map(|bucket| bucket.value)
            .sum();
        let merchants: usize = by_entity(matched.iter().copied(), EntityDimension::Merchant, &directory)
            .iter()
            .map(|bucket| bucket.value)
            .sum();
        let statuses: usize = status_distribution(matched.iter().copied()).series.iter().sum();
        let weekly: usize = over_time(matched.iter().copied(), Granularity::Week).series.iter().sum();
        let categories: usize = category_summary(matched.iter().copied())
            .iter()
            .map(|entry| entry.count)
            .sum();

        prop_assert_eq!(fillials, matched.len());
        prop_assert_eq!(merchants, matched.len());
        prop_assert_eq!(statuses, matched.len());
        prop_assert_eq!(weekly, matched.len());
        prop_assert_eq!(categories, matched.len());
    }

    #[test]
    fn filtering_is_idempotent(
        applications in proptest::collection::vec(application(), 0..40),
        spec in filter_spec(),
    ) {
        let directory = directory();
        let first = compile(&spec, &directory).expect("filter compiles");
        let second = compile(&spec, &directory).expect("filter compiles");
        prop_assert_eq!(&first, &second);

        let once: Vec<Application> = first.apply(&applications).into_iter().cloned().collect();
        let twice: Vec<Application> = second.apply(&once).into_iter().cloned().collect();
        prop_assert_eq!(once, twice);
    }
}
