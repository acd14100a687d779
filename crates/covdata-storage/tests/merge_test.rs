//! Combining data objects with `update`.

use std::collections::{BTreeMap, BTreeSet};

use covdata_core::errors::{CovErrorCode, DataError};
use covdata_core::types::LineNo;
use covdata_storage::CoverageData;
use proptest::prelude::*;
use tempfile::tempdir;

fn set<T: Ord, const N: usize>(items: [T; N]) -> BTreeSet<T> {
    BTreeSet::from(items)
}

/// Every file's lines per context, for comparing whole data objects.
fn line_snapshot(data: &CoverageData) -> BTreeMap<String, BTreeMap<LineNo, BTreeSet<String>>> {
    data.measured_files()
        .into_iter()
        .map(|path| {
            let by_line = data.contexts_by_lineno(&path).unwrap();
            (path, by_line)
        })
        .collect()
}

#[test]
fn update_unions_lines() {
    let a = CoverageData::in_memory();
    a.add_lines([("a.py", vec![1, 2])]).unwrap();
    let b = CoverageData::in_memory();
    b.add_lines([("a.py", vec![2, 3]), ("b.py", vec![5])]).unwrap();

    a.update(&b, None).unwrap();

    assert_eq!(a.lines("a.py").unwrap(), Some(set([1, 2, 3])));
    assert_eq!(a.lines("b.py").unwrap(), Some(set([5])));
    // The source is untouched.
    assert_eq!(b.lines("a.py").unwrap(), Some(set([2, 3])));
}

#[test]
fn update_unions_arcs_and_adopts_the_mode() {
    let a = CoverageData::in_memory();
    let b = CoverageData::in_memory();
    b.add_arcs([("a.py", vec![(-1, 1), (1, 2)])]).unwrap();

    a.update(&b, None).unwrap();
    assert!(a.has_arcs());

    let c = CoverageData::in_memory();
    c.add_arcs([("a.py", vec![(1, 2), (2, -1)])]).unwrap();
    a.update(&c, None).unwrap();
    assert_eq!(
        a.arcs("a.py").unwrap(),
        Some(set([(-1, 1), (1, 2), (2, -1)]))
    );
}

#[test]
fn update_keeps_contexts_apart() {
    let a = CoverageData::in_memory();
    a.set_context(Some("alpha")).unwrap();
    a.add_lines([("a.py", vec![1])]).unwrap();

    let b = CoverageData::in_memory();
    b.set_context(Some("beta")).unwrap();
    b.add_lines([("a.py", vec![1, 2])]).unwrap();

    a.update(&b, None).unwrap();

    let by_line = a.contexts_by_lineno("a.py").unwrap();
    assert_eq!(
        by_line[&1],
        BTreeSet::from(["alpha".to_string(), "beta".to_string()])
    );
    assert_eq!(by_line[&2], BTreeSet::from(["beta".to_string()]));
    assert_eq!(
        a.measured_contexts().unwrap(),
        BTreeSet::from(["alpha".to_string(), "beta".to_string()])
    );
}

#[test]
fn update_remaps_paths() {
    let a = CoverageData::in_memory();
    a.add_lines([("/home/me/src/a.py", vec![1])]).unwrap();
    let b = CoverageData::in_memory();
    b.add_lines([("/ci/build/src/a.py", vec![2]), ("/ci/build/src/b.py", vec![3])])
        .unwrap();
    b.add_file_tracers([("/ci/build/src/b.py", "")]).unwrap();

    let remap = |path: &str| path.replace("/ci/build/", "/home/me/");
    a.update(&b, Some(&remap)).unwrap();

    assert_eq!(
        a.measured_files(),
        BTreeSet::from([
            "/home/me/src/a.py".to_string(),
            "/home/me/src/b.py".to_string(),
        ])
    );
    assert_eq!(a.lines("/home/me/src/a.py").unwrap(), Some(set([1, 2])));
}

#[test]
fn remapping_two_paths_onto_one_unions_them() {
    let a = CoverageData::in_memory();
    let b = CoverageData::in_memory();
    b.add_lines([("win\\a.py", vec![1]), ("win/a.py", vec![2])])
        .unwrap();

    let remap = |path: &str| path.replace('\\', "/");
    a.update(&b, Some(&remap)).unwrap();

    assert_eq!(a.measured_files(), BTreeSet::from(["win/a.py".to_string()]));
    assert_eq!(a.lines("win/a.py").unwrap(), Some(set([1, 2])));
}

#[test]
fn update_rejects_mixed_modes_and_changes_nothing() {
    let lines = CoverageData::in_memory();
    lines.add_lines([("a.py", vec![1])]).unwrap();
    let arcs = CoverageData::in_memory();
    arcs.add_arcs([("b.py", vec![(1, 2)])]).unwrap();

    let err = lines.update(&arcs, None).unwrap_err();
    assert!(matches!(err.as_data(), Some(DataError::CombineArcsWithLines)));
    assert_eq!(err.error_code(), "MODE_CONFLICT");
    assert_eq!(lines.measured_files(), BTreeSet::from(["a.py".to_string()]));

    let err = arcs.update(&lines, None).unwrap_err();
    assert!(matches!(err.as_data(), Some(DataError::CombineLinesWithArcs)));
    assert_eq!(arcs.lines("a.py").unwrap(), None);
}

#[test]
fn update_rejects_conflicting_tracers() {
    let a = CoverageData::in_memory();
    a.add_lines([("p.html", vec![1])]).unwrap();
    a.add_file_tracers([("p.html", "django.Plugin")]).unwrap();

    let b = CoverageData::in_memory();
    b.add_lines([("p.html", vec![2])]).unwrap();
    b.add_file_tracers([("p.html", "jinja.Plugin")]).unwrap();

    let err = a.update(&b, None).unwrap_err();
    assert_eq!(err.error_code(), "TRACER_CONFLICT");
    // Nothing from the failed merge is visible.
    assert_eq!(a.lines("p.html").unwrap(), Some(set([1])));
}

#[test]
fn builtin_tracer_here_conflicts_with_a_plugin_there() {
    let a = CoverageData::in_memory();
    a.add_lines([("p.html", vec![1])]).unwrap();
    let b = CoverageData::in_memory();
    b.add_lines([("p.html", vec![2])]).unwrap();
    b.add_file_tracers([("p.html", "jinja.Plugin")]).unwrap();

    let err = a.update(&b, None).unwrap_err();
    match err.as_data() {
        Some(DataError::ConflictingTracer {
            existing, incoming, ..
        }) => {
            assert_eq!(existing, "");
            assert_eq!(incoming, "jinja.Plugin");
        }
        other => panic!("expected tracer conflict, got {other:?}"),
    }
}

#[test]
fn new_files_bring_their_tracers() {
    let a = CoverageData::in_memory();
    a.add_lines([("a.py", vec![1])]).unwrap();
    let b = CoverageData::in_memory();
    b.add_lines([("t.html", vec![3])]).unwrap();
    b.add_file_tracers([("t.html", "django.Plugin")]).unwrap();

    a.update(&b, None).unwrap();
    assert_eq!(
        a.file_tracer("t.html").unwrap().as_deref(),
        Some("django.Plugin")
    );
    assert_eq!(a.file_tracer("a.py").unwrap().as_deref(), Some(""));
}

#[test]
fn update_twice_is_the_same_as_once() {
    let a = CoverageData::in_memory();
    a.add_lines([("a.py", vec![1])]).unwrap();
    let b = CoverageData::in_memory();
    b.set_context(Some("t")).unwrap();
    b.add_lines([("a.py", vec![2]), ("b.py", vec![9])]).unwrap();

    a.update(&b, None).unwrap();
    let once = line_snapshot(&a);
    a.update(&b, None).unwrap();
    assert_eq!(line_snapshot(&a), once);
}

#[test]
fn update_with_itself_is_a_no_op() {
    let a = CoverageData::in_memory();
    a.add_lines([("a.py", vec![1, 2])]).unwrap();
    a.update(&a, None).unwrap();
    assert_eq!(a.lines("a.py").unwrap(), Some(set([1, 2])));
}

#[test]
fn update_from_empty_data_changes_nothing() {
    let a = CoverageData::in_memory();
    a.add_lines([("a.py", vec![1])]).unwrap();
    let empty = CoverageData::in_memory();

    a.update(&empty, None).unwrap();
    assert_eq!(a.measured_files(), BTreeSet::from(["a.py".to_string()]));
    assert!(!a.has_arcs());
}

#[test]
fn merging_from_an_unread_file_keeps_the_source_intact() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".coverage.src");
    CoverageData::new(covdata_storage::DataOptions::default().with_basename(&path))
        .add_lines([("b.py", vec![1, 2])])
        .unwrap();

    let source = CoverageData::new(covdata_storage::DataOptions::default().with_basename(&path));
    let combined = CoverageData::in_memory();
    combined.update(&source, None).unwrap();
    assert_eq!(combined.lines("b.py").unwrap(), Some(set([1, 2])));

    // The merge read the file, so writing to the source adds to it.
    source.add_lines([("b.py", vec![3])]).unwrap();
    assert_eq!(source.lines("b.py").unwrap(), Some(set([1, 2, 3])));
}

#[test]
fn combine_parallel_files_on_disk() {
    let dir = tempdir().unwrap();
    for (suffix, lines) in [("w1", vec![1, 2]), ("w2", vec![2, 3])] {
        let worker = CoverageData::new(
            covdata_storage::DataOptions::default()
                .with_basename(dir.path().join(".coverage"))
                .with_suffix(covdata_core::types::Suffix::Literal(suffix.to_string())),
        );
        worker.add_lines([("m.py", lines)]).unwrap();
    }

    let combined = CoverageData::new(
        covdata_storage::DataOptions::default().with_basename(dir.path().join(".coverage")),
    );
    for suffix in ["w1", "w2"] {
        let part = CoverageData::new(
            covdata_storage::DataOptions::default()
                .with_basename(dir.path().join(format!(".coverage.{suffix}"))),
        );
        part.read().unwrap();
        combined.update(&part, None).unwrap();
    }
    assert_eq!(combined.lines("m.py").unwrap(), Some(set([1, 2, 3])));

    let reread = CoverageData::new(
        covdata_storage::DataOptions::default().with_basename(dir.path().join(".coverage")),
    );
    reread.read().unwrap();
    assert_eq!(reread.lines("m.py").unwrap(), Some(set([1, 2, 3])));
}

fn file_lines() -> impl Strategy<Value = Vec<(String, Vec<LineNo>)>> {
    prop::collection::vec(
        (
            prop::sample::select(vec!["a.py", "b.py", "c.py"]).prop_map(str::to_string),
            prop::collection::vec(1u32..200, 0..20),
        ),
        0..6,
    )
}

fn store_with(context: &str, line_data: &[(String, Vec<LineNo>)]) -> CoverageData {
    let data = CoverageData::in_memory();
    data.set_context(Some(context)).unwrap();
    data.add_lines(line_data.iter().map(|(p, l)| (p.as_str(), l.clone())))
        .unwrap();
    data
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn merge_order_does_not_matter(x in file_lines(), y in file_lines()) {
        let a = store_with("one", &x);
        let b = store_with("two", &y);

        let ab = CoverageData::in_memory();
        ab.update(&a, None).unwrap();
        ab.update(&b, None).unwrap();

        let ba = CoverageData::in_memory();
        ba.update(&b, None).unwrap();
        ba.update(&a, None).unwrap();

        prop_assert_eq!(line_snapshot(&ab), line_snapshot(&ba));
    }
}
