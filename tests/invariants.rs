//! Universal invariants that must hold after any sequence of
//! insert/delete/search, exercised over the public `Index` facade.

use ann_index::{Error, HnswConfig, Index, IndexConfig, IndexKind, Metric};
use rstest::rstest;

fn config_for(kind: IndexKind, metric: Metric, dims: usize) -> IndexConfig {
    IndexConfig::new(kind, metric, dims).with_hnsw_config(HnswConfig::default().with_m0(16).with_seed(9))
}

#[rstest]
#[case(Metric::L2)]
#[case(Metric::Cosine)]
#[case(Metric::Dot)]
fn single_element_self_query_matches_compare(#[case] metric: Metric) {
    let idx = Index::new(config_for(IndexKind::Hnsw, metric, 4)).unwrap();
    let v = [0.6, 0.8, 0.0, 0.0];
    idx.insert(1, 0, &v).unwrap();

    let results = idx.search_n(&v, 0, 1).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, 1);
    let expected = metric.compare(&v, &v);
    assert!((results[0].score - expected).abs() < 1e-4);
}

#[test]
fn l2_self_distance_is_near_zero() {
    let idx = Index::new(config_for(IndexKind::Flat, Metric::L2, 4)).unwrap();
    let v = [1.5, -2.0, 0.25, 3.0];
    idx.insert(1, 0, &v).unwrap();
    let results = idx.search_n(&v, 0, 1).unwrap();
    assert!(results[0].score.abs() < 1e-4);
}

#[test]
fn duplicate_insert_does_not_change_size() {
    let idx = Index::new(config_for(IndexKind::Hnsw, Metric::L2, 4)).unwrap();
    idx.insert(1, 0, &[1.0, 0.0, 0.0, 0.0]).unwrap();
    let before = idx.size();
    let err = idx.insert(1, 0, &[1.0, 0.0, 0.0, 0.0]).unwrap_err();
    assert!(matches!(err, Error::DuplicatedEntry(1)));
    assert_eq!(idx.size(), before);
}

#[test]
fn deleted_id_never_resurfaces_in_unfiltered_search() {
    let idx = Index::new(config_for(IndexKind::Hnsw, Metric::L2, 4)).unwrap();
    for i in 1..=20u64 {
        idx.insert(i, 0, &[i as f32, 0.0, 0.0, 0.0]).unwrap();
    }
    idx.delete(5).unwrap();
    assert!(!idx.contains(5));

    let results = idx.search_n(&[5.0, 0.0, 0.0, 0.0], 0, 20).unwrap();
    assert!(results.iter().all(|m| m.id != 5));
}

#[test]
fn tag_filtered_results_always_match_mask() {
    let idx = Index::new(config_for(IndexKind::Hnsw, Metric::L2, 4)).unwrap();
    idx.insert(1, 0b001, &[1.0, 0.0, 0.0, 0.0]).unwrap();
    idx.insert(2, 0b010, &[0.0, 1.0, 0.0, 0.0]).unwrap();
    idx.insert(3, 0b011, &[0.0, 0.0, 1.0, 0.0]).unwrap();

    let mask = 0b010;
    let results = idx.search_n(&[0.0, 1.0, 0.0, 0.0], mask, 10).unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|m| m.tag & mask != 0));
}

#[rstest]
#[case(Metric::L2)]
#[case(Metric::Cosine)]
fn results_are_ordered_by_metric_direction(#[case] metric: Metric) {
    let idx = Index::new(config_for(IndexKind::Hnsw, metric, 4)).unwrap();
    for i in 1..=30u64 {
        let angle = i as f32 * 0.1;
        idx.insert(i, 0, &[angle.cos(), angle.sin(), 0.0, 0.0]).unwrap();
    }
    let results = idx.search_n(&[1.0, 0.0, 0.0, 0.0], 0, 10).unwrap();
    let scores: Vec<f32> = results.iter().map(|m| m.score).collect();
    match metric {
        Metric::L2 => assert!(scores.windows(2).all(|w| w[0] <= w[1] + 1e-5)),
        Metric::Cosine | Metric::Dot => assert!(scores.windows(2).all(|w| w[0] >= w[1] - 1e-5)),
    }
}

#[test]
fn degree_never_exceeds_capacity_after_many_inserts_and_deletes() {
    let idx = Index::new(config_for(IndexKind::Hnsw, Metric::L2, 4)).unwrap();
    for i in 1..=200u64 {
        let angle = i as f32;
        idx.insert(i, 0, &[angle.sin(), angle.cos(), (angle * 0.5).sin(), 0.0]).unwrap();
    }
    for i in (1..=200u64).step_by(3) {
        idx.delete(i).unwrap();
    }
    // still queryable and within-budget: a crash here would indicate a
    // neighbor-capacity or adjacency-consistency violation.
    let results = idx.search_n(&[0.0, 1.0, 0.0, 0.0], 0, 5).unwrap();
    assert!(results.len() <= 5);
}
