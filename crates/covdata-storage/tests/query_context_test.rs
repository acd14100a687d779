//! Restricting queries to contexts: exact names and regex patterns.

use std::collections::BTreeSet;

use covdata_core::errors::{CovErrorCode, DataError};
use covdata_core::types::LineNo;
use covdata_storage::CoverageData;

fn set<T: Ord, const N: usize>(items: [T; N]) -> BTreeSet<T> {
    BTreeSet::from(items)
}

/// Lines 1-2 under `test_a`, 3 under `test_ab`, 4 under `other`.
fn line_data() -> CoverageData {
    let data = CoverageData::in_memory();
    for (context, lines) in [("test_a", vec![1, 2]), ("test_ab", vec![3]), ("other", vec![4])] {
        data.set_context(Some(context)).unwrap();
        data.add_lines([("a.py", lines)]).unwrap();
    }
    data
}

fn lines(data: &CoverageData) -> BTreeSet<LineNo> {
    data.lines("a.py").unwrap().unwrap()
}

#[test]
fn exact_context_does_not_match_prefixes() {
    let data = line_data();
    data.set_query_context("test_a").unwrap();
    assert_eq!(lines(&data), set([1, 2]));
}

#[test]
fn patterns_search_anywhere_in_the_name() {
    let data = line_data();
    data.set_query_contexts(&["test_a"]).unwrap();
    assert_eq!(lines(&data), set([1, 2, 3]));

    data.set_query_contexts(&["^oth"]).unwrap();
    assert_eq!(lines(&data), set([4]));

    data.set_query_contexts(&["ab$", "other"]).unwrap();
    assert_eq!(lines(&data), set([3, 4]));
}

#[test]
fn no_matching_context_gives_empty_not_unmeasured() {
    let data = line_data();
    data.set_query_context("missing").unwrap();
    assert_eq!(data.lines("a.py").unwrap(), Some(BTreeSet::new()));
    assert_eq!(data.lines("b.py").unwrap(), None);

    data.set_query_contexts(&["zzz"]).unwrap();
    assert_eq!(data.lines("a.py").unwrap(), Some(BTreeSet::new()));
}

#[test]
fn empty_pattern_list_clears_the_filter() {
    let data = line_data();
    data.set_query_context("other").unwrap();
    assert_eq!(lines(&data), set([4]));

    data.set_query_contexts::<&str>(&[]).unwrap();
    assert_eq!(lines(&data), set([1, 2, 3, 4]));

    data.set_query_context("other").unwrap();
    data.clear_query_contexts().unwrap();
    assert_eq!(lines(&data), set([1, 2, 3, 4]));
}

#[test]
fn filter_persists_until_changed() {
    let data = line_data();
    data.set_query_context("test_ab").unwrap();
    assert_eq!(lines(&data), set([3]));
    assert_eq!(lines(&data), set([3]));
    let by_line = data.contexts_by_lineno("a.py").unwrap();
    assert_eq!(by_line.keys().copied().collect::<Vec<_>>(), vec![3]);
}

#[test]
fn invalid_pattern_is_reported() {
    let data = line_data();
    let err = data.set_query_contexts(&["test_(a"]).unwrap_err();
    assert!(matches!(
        err.as_data(),
        Some(DataError::InvalidContextPattern { pattern, .. }) if pattern == "test_(a"
    ));
    assert_eq!(err.error_code(), "INVALID_PATTERN");
    // The previous filter (none) is still in force.
    assert_eq!(lines(&data), set([1, 2, 3, 4]));
}

#[test]
fn arc_queries_are_filtered_too() {
    let data = CoverageData::in_memory();
    data.set_context(Some("unit")).unwrap();
    data.add_arcs([("a.py", vec![(-1, 1), (1, -1)])]).unwrap();
    data.set_context(Some("integration")).unwrap();
    data.add_arcs([("a.py", vec![(-1, 5), (5, 6)])]).unwrap();

    data.set_query_contexts(&["integ"]).unwrap();
    assert_eq!(data.arcs("a.py").unwrap(), Some(set([(-1, 5), (5, 6)])));
    assert_eq!(data.lines("a.py").unwrap(), Some(set([5, 6])));

    let by_line = data.contexts_by_lineno("a.py").unwrap();
    assert_eq!(by_line.keys().copied().collect::<Vec<_>>(), vec![5, 6]);
    assert_eq!(by_line[&5], BTreeSet::from(["integration".to_string()]));
}

#[test]
fn filter_sees_contexts_added_by_merge() {
    let data = line_data();
    let other = CoverageData::in_memory();
    other.set_context(Some("test_merged")).unwrap();
    other.add_lines([("a.py", vec![9])]).unwrap();
    data.update(&other, None).unwrap();

    data.set_query_contexts(&["merged"]).unwrap();
    assert_eq!(lines(&data), set([9]));
}
