use rstest::rstest;
use strata_core::common_tests::set_operation_tests::*;
use strata_core::{DeferredGuard, SkipList, SkipListConfig};

fn fast() -> SkipListConfig {
    SkipListConfig::default()
}

fn variable() -> SkipListConfig {
    SkipListConfig::default().with_fast_mode(false).with_probability(0.25)
}

#[rstest]
#[case::fast(fast())]
#[case::variable(variable())]
fn union(#[case] config: SkipListConfig) {
    test_union::<DeferredGuard>(config);
}

#[rstest]
#[case::fast(fast())]
#[case::variable(variable())]
fn intersection(#[case] config: SkipListConfig) {
    test_intersection::<DeferredGuard>(config);
}

#[rstest]
#[case::fast(fast())]
#[case::variable(variable())]
fn empty_operands(#[case] config: SkipListConfig) {
    test_empty_operands::<DeferredGuard>(config);
}

#[rstest]
#[case::fast(fast())]
#[case::variable(variable())]
fn removed_elements_excluded(#[case] config: SkipListConfig) {
    test_removed_elements_excluded::<DeferredGuard>(config);
}

#[test]
fn union_of_strings() {
    let mut a: SkipList<String> = ["pear", "apple"].iter().map(|s| s.to_string()).collect();
    let mut b: SkipList<String> = ["fig", "pear"].iter().map(|s| s.to_string()).collect();

    let union = SkipList::union(&mut a, &mut b);
    assert_eq!(union.to_sorted_vec(), vec!["apple", "fig", "pear"]);

    let intersection = SkipList::intersection(&mut a, &mut b);
    assert_eq!(intersection.to_sorted_vec(), vec!["pear"]);
}

#[test]
fn chained_operations() {
    let mut a: SkipList<i32> = (0..100).collect();
    let mut b: SkipList<i32> = (50..150).collect();
    let mut c: SkipList<i32> = (0..150).step_by(3).collect();

    let mut ab = SkipList::union(&mut a, &mut b);
    let abc = SkipList::intersection(&mut ab, &mut c);

    assert_eq!(abc.to_sorted_vec(), (0..150).step_by(3).collect::<Vec<_>>());
}
