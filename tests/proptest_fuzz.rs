//! Property-based tests (fuzzing) for the grouping engine.
//!
//! Uses proptest to generate random rules, records and malformed inputs and
//! verify classification, aggregation and diffing invariants.
//!
//! Run with: `cargo test --test proptest_fuzz`

use proptest::prelude::*;
use serde_json::Value;

use grouping_engine::comparison::delta;
use grouping_engine::rules::{CompiledRules, GroupClassifier, Matcher, RuleSet};
use grouping_engine::tree::{aggregate, normalize, GroupNode, TreeAggregator};
use grouping_engine::{AggregationContext, Dataset, DatasetTotal, Record};

// =============================================================================
// Strategies for generating test data
// =============================================================================

fn record_strategy() -> impl Strategy<Value = Record> {
    ("[A-C]", "[a-z]{1,6}", 0.0f64..1000.0)
        .prop_map(|(kind, label, value)| Record::new(kind, label).with_resource("time_real", value))
}

fn rule_key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,4}",
        "[a-z]{0,3}\\*",
        "[a-z]\\?[a-z]{0,2}",
        "[A-C]\\|[a-z]{0,2}\\*",
        "[A-C]\\|",
    ]
}

fn rule_set_strategy() -> impl Strategy<Value = RuleSet> {
    prop::collection::vec(
        (rule_key_strategy(), "[A-Z][a-z]{0,4}(\\|[A-Z][a-z]{0,4}){0,2}"),
        0..12,
    )
    .prop_map(|pairs| RuleSet::from_pairs(pairs))
}

fn dataset(modules: Vec<Record>, events: f64) -> Dataset {
    Dataset {
        total: DatasetTotal {
            label: "HLT".into(),
            events,
            ratio: None,
            resource_values: Default::default(),
        },
        resources: vec![],
        modules,
    }
}

/// Generate arbitrary JSON values (including invalid structures)
fn arbitrary_json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        ".*".prop_map(Value::String),
    ];

    leaf.prop_recursive(
        4,   // depth
        64,  // max nodes
        10,  // items per collection
        |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..10)
                    .prop_map(Value::Array),
                prop::collection::hash_map(".*", inner, 0..10)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        },
    )
}

// =============================================================================
// Pattern & Classification Properties
// =============================================================================

proptest! {
    /// The empty pattern matches every string
    #[test]
    fn prop_empty_pattern_matches_anything(text in ".*") {
        prop_assert!(Matcher::compile("").matches(&text));
    }

    /// `prefix*` matches anything starting with the prefix and nothing else
    #[test]
    fn prop_star_glob_is_anchored_prefix(prefix in "[a-z]{1,5}", rest in "[a-z]{0,8}") {
        let matcher = Matcher::compile(&format!("{}*", prefix));
        let matching = format!("{}{}", prefix, rest);
        let non_matching = format!("X{}{}", prefix, rest);
        prop_assert!(matcher.matches(&matching));
        prop_assert!(!matcher.matches(&non_matching));
    }

    /// `?` stands for exactly one character
    #[test]
    fn prop_question_mark_is_single_char(c in "[a-z0-9]", extra in "[a-z]{1,3}") {
        let matcher = Matcher::compile("a?c");
        let single = format!("a{}c", c);
        let multi = format!("a{}{}c", c, extra);
        prop_assert!(matcher.matches(&single));
        prop_assert!(!matcher.matches(&multi));
        prop_assert!(!matcher.matches("ac"));
    }

    /// Literal patterns match only themselves
    #[test]
    fn prop_literal_is_exact(label in "[a-z]{1,8}", other in "[a-z]{1,8}") {
        let matcher = Matcher::compile(&label);
        prop_assert!(matcher.matches(&label));
        prop_assert_eq!(matcher.matches(&other), label == other);
    }

    /// Same record + same rules => same path, ending with the record kind
    #[test]
    fn prop_classification_is_deterministic(
        rules in rule_set_strategy(),
        record in record_strategy(),
    ) {
        let compiled = CompiledRules::compile(&rules);
        let classifier = GroupClassifier::new(&compiled);

        let first = classifier.classify(&record);
        let second = classifier.classify(&record);
        prop_assert_eq!(&first, &second);
        prop_assert!(first.path.len() >= 2);
        prop_assert_eq!(first.path.last().unwrap(), &record.kind);
    }

    /// Recompiling the same rules yields the same matcher list
    #[test]
    fn prop_compilation_is_pure(rules in rule_set_strategy()) {
        prop_assert_eq!(CompiledRules::compile(&rules), CompiledRules::compile(&rules));
    }
}

// =============================================================================
// Aggregation Properties
// =============================================================================

proptest! {
    /// Top-level group weights sum to the root weight
    #[test]
    fn prop_top_level_sum_equals_root(
        rules in rule_set_strategy(),
        records in prop::collection::vec(record_strategy(), 1..40),
        events in 1.0f64..1000.0,
    ) {
        let compiled = CompiledRules::compile(&rules);
        let ctx = AggregationContext::new("time_real");
        let (tree, report) = TreeAggregator::new(&compiled, &ctx).build(&dataset(records.clone(), events));

        prop_assert_eq!(report.classified, records.len());
        let sum: f64 = tree.top_level_weights().values().sum();
        prop_assert!((sum - tree.weight()).abs() <= 1e-9 * tree.weight().max(1.0));

        let raw: f64 = records.iter().filter_map(|r| r.resource("time_real")).sum();
        prop_assert!((tree.weight() - raw / events).abs() <= 1e-9 * tree.weight().max(1.0));
    }

    /// Records without the active resource contribute nothing
    #[test]
    fn prop_missing_resource_contributes_nothing(
        records in prop::collection::vec(record_strategy(), 0..20),
        stray in prop::collection::vec("[a-z]{1,6}", 1..5),
    ) {
        let compiled = CompiledRules::compile(&RuleSet::from_pairs([("", "All")]));
        let ctx = AggregationContext::new("time_real");

        let mut with_stray = records.clone();
        with_stray.extend(stray.iter().map(|l| Record::new("A", l.clone()).with_resource("mem_alloc", 1.0)));

        let (base, _) = TreeAggregator::new(&compiled, &ctx).build(&dataset(records, 1.0));
        let (tree, report) = TreeAggregator::new(&compiled, &ctx).build(&dataset(with_stray, 1.0));

        prop_assert_eq!(report.skipped_missing_resource, stray.len());
        prop_assert_eq!(tree, base);
    }

    /// A second normalize halves every weight again
    #[test]
    fn prop_normalize_is_not_idempotent(
        records in prop::collection::vec(record_strategy(), 1..20),
    ) {
        let mut once = GroupNode::group("root");
        for r in &records {
            let path = vec!["G".to_string(), r.kind.clone()];
            aggregate(&mut once, &path, r, "time_real", true);
        }
        normalize(&mut once, 2.0);

        let mut twice = once.clone();
        normalize(&mut twice, 2.0);

        prop_assert!((twice.weight - once.weight / 2.0).abs() <= 1e-9 * once.weight.max(1.0));
        let g_once = once.find(&["G"]).unwrap().weight;
        let g_twice = twice.find(&["G"]).unwrap().weight;
        prop_assert!((g_twice - g_once / 2.0).abs() <= 1e-9 * g_once.max(1.0));
    }
}

// =============================================================================
// Diff Properties
// =============================================================================

proptest! {
    /// Relative delta against a zero primary is exactly zero
    #[test]
    fn prop_relative_delta_zero_primary(comparison in any::<f64>()) {
        prop_assert_eq!(delta(0.0, comparison, true), 0.0);
    }

    /// Relative delta is finite for finite inputs with a non-zero primary
    #[test]
    fn prop_relative_delta_finite(primary in 0.001f64..1e6, comparison in 0.0f64..1e6) {
        let d = delta(primary, comparison, true);
        prop_assert!(d.is_finite());
        prop_assert!(d >= -100.0);
    }
}

// =============================================================================
// Deserialization Fuzz Tests
// =============================================================================

proptest! {
    /// Dataset parsing should never panic on arbitrary bytes
    #[test]
    fn fuzz_dataset_from_random_bytes(bytes in prop::collection::vec(any::<u8>(), 0..10000)) {
        let _ = Dataset::from_json(&bytes);
    }

    /// Dataset parsing should handle arbitrary JSON gracefully
    #[test]
    fn fuzz_dataset_from_arbitrary_json(json in arbitrary_json_strategy()) {
        let _ = Dataset::from_value(json);
    }

    /// Rule-set parsing should handle arbitrary JSON gracefully
    #[test]
    fn fuzz_rule_set_from_arbitrary_json(json in arbitrary_json_strategy()) {
        let serialized = serde_json::to_vec(&json).unwrap();
        if let Ok(rules) = RuleSet::from_json(&serialized) {
            // Whatever parsed must compile
            let _ = CompiledRules::compile(&rules);
        }
    }
}
