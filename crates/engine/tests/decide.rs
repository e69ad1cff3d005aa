//! Black-box tests for `ReorderEngine::decide`.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use restock_ai::{ModelError, ReorderModel, TrainingConfig, TrainingReport, Verdict};
use restock_core::ItemId;
use restock_engine::{
    DecisionSource, DecisionWarning, FALLBACK_CONFIDENCE, FALLBACK_REORDER_PROBABILITY,
    FALLBACK_SKIP_PROBABILITY, ReorderEngine, SUBSTITUTE_CONFIDENCE,
    SUBSTITUTE_REORDER_PROBABILITY, SUBSTITUTE_SKIP_PROBABILITY,
};
use restock_inventory::{Item, UrgencyTier, policy};

fn setup() {
    restock_observability::init_for_tests();
}

fn catalog(n: usize, seed: u64) -> Vec<Item> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            Item::new(
                format!("sku-{i}"),
                rng.random_range(10..210),
                f64::from(rng.random_range(5u32..55)),
                rng.random_range(3..17),
            )
        })
        .collect()
}

fn seeded_engine(seed: u64) -> ReorderEngine {
    ReorderEngine::new(TrainingConfig::default().with_seed(seed))
}

/// Every item overstocked: the rule labels them all "no reorder".
fn single_label_batch() -> Vec<Item> {
    (0..10u64).map(|i| Item::new(i, 5_000 + i, 7.0, 3)).collect()
}

/// Trains fine, then refuses to score the listed ids.
struct FlakyModel {
    trained: bool,
    broken: BTreeSet<ItemId>,
}

impl ReorderModel for FlakyModel {
    fn train(&mut self, items: &[Item]) -> Result<TrainingReport, ModelError> {
        self.trained = true;
        Ok(TrainingReport {
            samples: items.len(),
            positives: 0,
            negatives: 0,
            epochs_run: 1,
            train_loss: 0.0,
            validation_loss: None,
            validation_accuracy: None,
        })
    }

    fn predict(&self, item: &Item) -> Result<Verdict, ModelError> {
        if !self.trained {
            return Err(ModelError::ModelNotTrained);
        }
        if self.broken.contains(&item.id) {
            return Err(ModelError::PredictionFailed("malformed features".to_string()));
        }
        Ok(Verdict::from_probability(0.99))
    }

    fn is_trained(&self) -> bool {
        self.trained
    }
}

/// Never trains.
struct BrokenModel;

impl ReorderModel for BrokenModel {
    fn train(&mut self, _items: &[Item]) -> Result<TrainingReport, ModelError> {
        Err(ModelError::TrainingFailed("out of memory".to_string()))
    }

    fn predict(&self, _item: &Item) -> Result<Verdict, ModelError> {
        Err(ModelError::ModelNotTrained)
    }

    fn is_trained(&self) -> bool {
        false
    }
}

#[test]
fn empty_batch_is_a_no_op() {
    setup();
    let engine = seeded_engine(1);
    let set = engine.decide(&[]);

    assert!(set.is_empty());
    assert!(set.warnings.is_empty());
    assert!(set.training.is_none());
    assert!(!engine.is_trained());
}

#[test]
fn example_scenario_is_complete_with_rule_urgency() {
    setup();
    let items = vec![Item::new(1u64, 200, 7.0, 3), Item::new(2u64, 5, 50.0, 10)];
    let set = seeded_engine(2).decide(&items);

    assert_eq!(set.len(), 2);
    let first = set.get(&ItemId::from(1u64)).unwrap();
    let second = set.get(&ItemId::from(2u64)).unwrap();
    assert_eq!(first.urgency, UrgencyTier::Low);
    assert_eq!(first.days_of_supply.value(), 200.0);
    assert_eq!(second.urgency, UrgencyTier::High);
    assert!(second.days_of_supply.value() < 1.0);

    assert!(!policy::should_reorder(&items[0]));
    assert!(policy::should_reorder(&items[1]));
}

#[test]
fn single_label_batch_falls_back_to_rule_constants() {
    setup();
    let mut items = single_label_batch();
    let set = seeded_engine(3).decide(&items);

    assert_eq!(set.len(), items.len());
    assert!(set.training.is_none());
    assert!(matches!(
        set.warnings.as_slice(),
        [DecisionWarning::TrainingFailed { .. }]
    ));
    for decision in set.decisions.values() {
        assert_eq!(decision.source, DecisionSource::RuleFallback);
        assert_eq!(decision.verdict.probability, FALLBACK_SKIP_PROBABILITY);
        assert_eq!(decision.verdict.confidence, FALLBACK_CONFIDENCE);
        assert!(!decision.verdict.should_reorder);
    }

    // Same situation with every item urgent.
    for item in &mut items {
        item.current_inventory = 0;
    }
    let set = seeded_engine(3).decide(&items);
    for decision in set.decisions.values() {
        assert_eq!(decision.verdict.probability, FALLBACK_REORDER_PROBABILITY);
        assert_eq!(decision.verdict.confidence, FALLBACK_CONFIDENCE);
        assert!(decision.verdict.should_reorder);
    }
}

#[test]
fn fallback_path_is_idempotent_across_fresh_engines() {
    setup();
    let items = single_label_batch();
    let a = seeded_engine(4).decide(&items);
    let b = ReorderEngine::new(TrainingConfig::default()).decide(&items);

    assert_eq!(a.verdicts(), b.verdicts());
}

#[test]
fn training_failure_from_any_model_falls_back() {
    setup();
    let items = catalog(30, 5);
    let set = ReorderEngine::with_model(BrokenModel).decide(&items);

    assert_eq!(set.len(), 30);
    assert_eq!(set.count_by_source(DecisionSource::RuleFallback), 30);
    match set.warnings.as_slice() {
        [DecisionWarning::TrainingFailed { reason }] => assert_eq!(reason, "out of memory"),
        other => panic!("Expected one TrainingFailed warning, got {other:?}"),
    }
    for item in &items {
        let verdict = set.verdict(&item.id).unwrap();
        assert_eq!(verdict.should_reorder, policy::should_reorder(item));
    }
}

#[test]
fn per_item_prediction_failure_gets_rule_substitute() {
    setup();
    let items = vec![
        Item::new("ok", 200, 7.0, 3),
        Item::new("urgent", 5, 50.0, 10),
        Item::new("calm", 500, 7.0, 3),
    ];
    let broken: BTreeSet<ItemId> = ["urgent", "calm"].into_iter().map(ItemId::from).collect();
    let engine = ReorderEngine::with_model(FlakyModel {
        trained: false,
        broken,
    });
    let set = engine.decide(&items);

    assert_eq!(set.len(), 3);
    assert!(set.training.is_some());

    let ok = set.get(&ItemId::from("ok")).unwrap();
    assert_eq!(ok.source, DecisionSource::Model);
    assert_eq!(ok.verdict.probability, 0.99);

    let urgent = set.get(&ItemId::from("urgent")).unwrap();
    assert_eq!(urgent.source, DecisionSource::RuleSubstitute);
    assert_eq!(urgent.verdict.probability, SUBSTITUTE_REORDER_PROBABILITY);
    assert_eq!(urgent.verdict.confidence, SUBSTITUTE_CONFIDENCE);
    assert!(urgent.verdict.should_reorder);

    let calm = set.get(&ItemId::from("calm")).unwrap();
    assert_eq!(calm.verdict.probability, SUBSTITUTE_SKIP_PROBABILITY);
    assert!(!calm.verdict.should_reorder);

    let failed: Vec<&str> = set
        .warnings
        .iter()
        .filter_map(|w| match w {
            DecisionWarning::PredictionFailed { id, .. } => Some(id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(failed, vec!["urgent", "calm"]);
}

#[test]
fn invalid_items_are_skipped_and_reported() {
    setup();
    let mut items = catalog(20, 6);
    items.push(Item::new("negative", 10, -1.0, 3));
    items.push(Item::new("sku-0", 1, 1.0, 1));

    let set = seeded_engine(6).decide(&items);

    assert_eq!(set.len(), 20);
    assert!(set.get(&ItemId::from("negative")).is_none());
    // The first occurrence of a repeated id wins.
    assert_eq!(
        set.get(&ItemId::from("sku-0")).unwrap().days_of_supply,
        restock_inventory::DaysOfSupply::of(&items[0])
    );
    let rejected: Vec<&str> = set
        .warnings
        .iter()
        .filter_map(|w| match w {
            DecisionWarning::InvalidItem { id, .. } => Some(id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(rejected, vec!["negative", "sku-0"]);
}

#[test]
fn model_path_tracks_the_rule_across_seeds() {
    setup();
    let items = catalog(150, 7);
    let rule_count = items.iter().filter(|i| policy::should_reorder(i)).count();

    for seed in [21, 22, 23] {
        let set = seeded_engine(seed).decide(&items);
        assert_eq!(set.count_by_source(DecisionSource::Model), items.len());

        let model_count = set.decisions.values().filter(|d| d.should_reorder()).count();
        let diff = model_count.abs_diff(rule_count);
        assert!(
            diff <= items.len() / 5,
            "seed {seed}: model {model_count} vs rule {rule_count}"
        );
    }
}

#[test]
fn classify_by_rule_does_not_train() {
    setup();
    let engine = seeded_engine(8);
    let tie = Item::new("tie", 70, 70.0, 7);

    assert!(engine.classify_by_rule(&tie));
    assert!(!engine.classify_by_rule(&Item::new("idle", 0, 0.0, 7)));
    assert!(!engine.is_trained());
}

#[test]
fn reset_forgets_the_trained_model() {
    setup();
    let engine = seeded_engine(9);
    engine.decide(&catalog(40, 9));
    assert!(engine.is_trained());

    engine.reset();
    assert!(!engine.is_trained());
}

#[test]
fn concurrent_decides_serialise_on_one_engine() {
    setup();
    let engine = Arc::new(ReorderEngine::new(
        TrainingConfig::default().with_seed(10).with_epochs(10),
    ));

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let items = catalog(40, 100 + t);
                let set = engine.decide(&items);
                (items.len(), set.len())
            })
        })
        .collect();

    for handle in handles {
        let (sent, decided) = handle.join().unwrap();
        assert_eq!(sent, decided);
    }
}

/// Records whether two model calls were ever in flight at the same time.
#[derive(Default)]
struct OverlapWatch {
    busy: AtomicBool,
    overlapped: AtomicBool,
    calls: AtomicUsize,
}

impl OverlapWatch {
    fn enter(&self) {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(1));
        self.busy.store(false, Ordering::SeqCst);
    }
}

struct WatchedModel {
    watch: Arc<OverlapWatch>,
    trained: bool,
}

impl ReorderModel for WatchedModel {
    fn train(&mut self, items: &[Item]) -> Result<TrainingReport, ModelError> {
        self.watch.enter();
        self.trained = true;
        Ok(TrainingReport {
            samples: items.len(),
            positives: 0,
            negatives: 0,
            epochs_run: 1,
            train_loss: 0.0,
            validation_loss: None,
            validation_accuracy: None,
        })
    }

    fn predict(&self, item: &Item) -> Result<Verdict, ModelError> {
        self.watch.enter();
        Ok(Verdict::from_probability(policy::label(item)))
    }

    fn is_trained(&self) -> bool {
        self.trained
    }
}

#[test]
fn training_and_prediction_never_overlap_across_threads() {
    setup();
    let watch = Arc::new(OverlapWatch::default());
    let engine = Arc::new(ReorderEngine::with_model(WatchedModel {
        watch: Arc::clone(&watch),
        trained: false,
    }));

    let handles: Vec<_> = (0..6u64)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.decide(&catalog(8, 200 + t)).len())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 8);
    }

    // One train plus eight predictions per decide.
    assert_eq!(watch.calls.load(Ordering::SeqCst), 6 * 9);
    assert!(!watch.overlapped.load(Ordering::SeqCst));
}

#[test]
fn decision_set_serializes_for_callers() {
    setup();
    let set = seeded_engine(11).decide(&single_label_batch());
    let json = serde_json::to_value(&set).unwrap();

    assert_eq!(json["warnings"][0]["kind"], "training_failed");
    assert_eq!(json["decisions"]["0"]["source"], "rule_fallback");
    assert_eq!(json["decisions"]["0"]["verdict"]["shouldReorder"], false);
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 24,
        ..ProptestConfig::default()
    })]

    /// Property: every distinct valid id gets exactly one verdict, and every
    /// verdict is in range and consistent with its probability.
    #[test]
    fn decide_is_complete_and_bounded(
        rows in prop::collection::vec((0u64..500, 0.0f64..80.0, 0u32..30), 1..25)
    ) {
        let items: Vec<Item> = rows
            .iter()
            .enumerate()
            .map(|(i, (inv, sales, lead))| Item::new(i as u64, *inv, *sales, *lead))
            .collect();
        let engine = ReorderEngine::new(TrainingConfig::default().with_seed(0).with_epochs(3));
        let set = engine.decide(&items);

        let expected: BTreeSet<ItemId> = items.iter().map(|i| i.id.clone()).collect();
        let actual: BTreeSet<ItemId> = set.decisions.keys().cloned().collect();
        prop_assert_eq!(expected, actual);

        for decision in set.decisions.values() {
            let v = decision.verdict;
            prop_assert!((0.0..=1.0).contains(&v.probability));
            prop_assert!((0.0..=1.0).contains(&v.confidence));
            prop_assert_eq!(v.should_reorder, v.probability > 0.5);
        }
    }
}
