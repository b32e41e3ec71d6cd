// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::Arc;

use futures::executor::block_on;
use reltab::{EvalError, LoadError, MemoryLoader, RelTab};
use reltab_core::{ColumnMetadata, ColumnType, Schema, TableData, Value, and, decode_path, lit};
use reltab_transforms::QueryExp;

use crate::{AggTree, AggTreeError, OpenPaths, PivotTreeModel, vpivot};

fn payroll() -> TableData {
    let text = || ColumnMetadata::new(ColumnType::Text);
    let int = || ColumnMetadata::new(ColumnType::Integer);
    let schema = Schema::new([
        ("Name", text()),
        ("Title", text()),
        ("Job", text()),
        ("Union", text()),
        ("Base", int()),
        ("TCOE", int()),
    ])
    .unwrap();
    let rows = [
        ("Ames", "Officer", "Safety", "BPOA", 90_000, 140_000),
        ("Baker", "Analyst", "IT", "AFSCME", 110_000, 150_500),
        ("Cole", "Chief", "Safety", "Non-Rep", 250_000, 380_250),
        ("Diaz", "Officer", "Safety", "BPOA", 88_000, 139_000),
        ("Ebert", "Analyst", "IT", "AFSCME", 105_000, 148_000),
        ("Frye", "General Manager", "Executive Management", "Non-Rep", 312_000, 399_921),
    ]
    .into_iter()
    .map(|(n, t, j, u, b, c)| {
        vec![
            Value::from(n),
            Value::from(t),
            Value::from(j),
            Value::from(u),
            Value::from(b),
            Value::from(c),
        ]
    })
    .collect();
    TableData::new(schema, rows).unwrap()
}

const TOTAL_TCOE: i64 = 1_357_671;

fn setup() -> (RelTab, Arc<MemoryLoader>) {
    let loader = Arc::new(MemoryLoader::new());
    loader.insert("payroll", payroll());
    (RelTab::new(loader.clone()), loader)
}

fn base() -> QueryExp {
    QueryExp::table("payroll").project(["Job", "Title", "Union", "Name", "Base", "TCOE"])
}

fn pivot(rt: &RelTab, pivots: &[&str]) -> AggTree {
    block_on(vpivot(rt, base(), pivots.iter().copied())).unwrap()
}

fn eval(rt: &RelTab, query: &QueryExp) -> TableData {
    block_on(rt.eval_query(query)).unwrap()
}

fn column(t: &TableData, id: &str) -> Vec<Value> {
    t.column(id).unwrap().cloned().collect()
}

fn texts(values: &[&str]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}

fn tcoe_total(t: &TableData) -> i64 {
    t.column("TCOE")
        .unwrap()
        .map(|v| match v {
            Value::Integer(i) => *i,
            _ => 0,
        })
        .sum()
}

#[test]
fn root_row_aggregates_everything() {
    let (rt, _) = setup();
    let tree = pivot(&rt, &["Job", "Title"]);
    let root = eval(&rt, tree.root_query());
    assert_eq!(
        root.schema().columns(),
        ["_depth", "_pivot", "_path", "Job", "Title", "Union", "Name", "Base", "TCOE"]
    );
    assert_eq!(root.row_count(), 1);
    let row = &root.rows()[0];
    assert_eq!(row[0], Value::from(0));
    assert_eq!(row[1], Value::Null);
    assert_eq!(row[2], Value::from(""));
    assert_eq!(row[3], Value::Null, "jobs differ, so uniq yields null");
    assert_eq!(row[8], Value::from(TOTAL_TCOE));
}

#[test]
fn first_level_groups_by_first_pivot() {
    let (rt, _) = setup();
    let tree = pivot(&rt, &["Job", "Title"]);
    let level = eval(&rt, &tree.apply_path::<&str>(&[]).unwrap());
    assert_eq!(
        column(&level, "_pivot"),
        texts(&["Safety", "IT", "Executive Management"])
    );
    assert_eq!(
        column(&level, "_path"),
        texts(&["#Safety", "#IT", "#Executive%20Management"])
    );
    assert_eq!(column(&level, "_depth"), ints(&[1, 1, 1]));
    assert_eq!(column(&level, "Job"), column(&level, "_pivot"));
    assert_eq!(tcoe_total(&level), TOTAL_TCOE);
}

#[test]
fn paths_filter_then_group_by_the_next_pivot() {
    let (rt, _) = setup();
    let tree = pivot(&rt, &["Job", "Title"]);
    let level = eval(&rt, &tree.apply_path(&["Safety"]).unwrap());
    assert_eq!(column(&level, "_pivot"), texts(&["Officer", "Chief"]));
    assert_eq!(
        column(&level, "_path"),
        texts(&["#Safety#Officer", "#Safety#Chief"])
    );
    assert_eq!(column(&level, "_depth"), ints(&[2, 2]));
    assert_eq!(column(&level, "TCOE"), ints(&[279_000, 380_250]));
}

#[test]
fn full_paths_yield_base_rows() {
    let (rt, _) = setup();
    let tree = pivot(&rt, &["Job", "Title"]);
    let leaves = eval(&rt, &tree.apply_path(&["Safety", "Officer"]).unwrap());
    assert_eq!(column(&leaves, "Name"), texts(&["Ames", "Diaz"]));
    assert_eq!(column(&leaves, "_pivot"), [Value::Null, Value::Null]);
    assert_eq!(
        column(&leaves, "_path"),
        texts(&["#Safety#Officer#", "#Safety#Officer#"])
    );
    assert_eq!(column(&leaves, "_depth"), ints(&[3, 3]));
    assert!(tree.is_leaf_depth(3));
    assert!(!tree.is_leaf_depth(2));
    assert!(!tree.is_leaf_depth(-1));

    let err = tree.apply_path(&["Safety", "Officer", "Ames"]).unwrap_err();
    assert!(
        matches!(err, AggTreeError::PathTooLong { len: 3, max: 2 }),
        "{err}"
    );
}

#[test]
fn integer_pivots_drill_down() {
    let (rt, _) = setup();
    let tree = pivot(&rt, &["Base"]);
    let level = eval(&rt, &tree.apply_path::<&str>(&[]).unwrap());
    assert_eq!(column(&level, "_path")[0], Value::from("#90000"));
    let leaves = eval(&rt, &tree.apply_path(&["90000"]).unwrap());
    assert_eq!(column(&leaves, "Name"), texts(&["Ames"]));
    assert_eq!(column(&leaves, "_path"), texts(&["#90000#"]));
}

/// Three people whose `Job` is null, empty, and `"X"`.
fn blank_jobs(loader: &MemoryLoader) {
    let schema = Schema::new([
        ("Name", ColumnMetadata::new(ColumnType::Text)),
        ("Job", ColumnMetadata::new(ColumnType::Text)),
        ("Pay", ColumnMetadata::new(ColumnType::Integer)),
    ])
    .unwrap();
    let rows = vec![
        vec![Value::from("a"), Value::Null, Value::from(1)],
        vec![Value::from("b"), Value::from(""), Value::from(2)],
        vec![Value::from("c"), Value::from("X"), Value::from(3)],
    ];
    loader.insert("jobs", TableData::new(schema, rows).unwrap());
}

#[test]
fn null_and_empty_pivot_values_are_separate_nodes() {
    let (rt, loader) = setup();
    blank_jobs(&loader);
    let tree = block_on(vpivot(&rt, QueryExp::table("jobs"), ["Job"])).unwrap();

    let level = eval(&rt, &tree.apply_path::<&str>(&[]).unwrap());
    assert_eq!(
        column(&level, "_pivot"),
        [Value::Null, Value::from(""), Value::from("X")]
    );
    assert_eq!(column(&level, "_path"), texts(&["#%", "#", "#X"]));

    // Each group drills down to its own row through its own path.
    for (row, name) in level.rows().iter().zip(["a", "b", "c"]) {
        let Value::Text(path) = &row[2] else {
            panic!("unexpected row {row:?}");
        };
        let leaves = eval(&rt, &tree.apply_encoded_path(path).unwrap());
        assert_eq!(column(&leaves, "Name"), texts(&[name]), "under {path}");
        assert_eq!(column(&leaves, "_path"), [Value::from(format!("{path}#"))]);
    }
    let null_group = eval(&rt, &tree.apply_path(&[None::<&str>]).unwrap());
    assert_eq!(column(&null_group, "Name"), texts(&["a"]));

    let mut open = OpenPaths::new();
    open.open(&[None::<&str>]);
    let flat = eval(&rt, &tree.get_tree_query(Some(&open)).unwrap());
    assert_eq!(
        column(&flat, "_path"),
        texts(&["", "#", "#%", "#%#", "#X"])
    );
    assert_eq!(column(&flat, "Name")[3], Value::from("a"));
}

#[test]
fn unconvertible_path_text_matches_nothing() {
    let (rt, _) = setup();
    let tree = pivot(&rt, &["Base"]);
    let none = eval(&rt, &tree.apply_path(&["ninety"]).unwrap());
    assert_eq!(none.row_count(), 0);
    assert!(tree.apply_encoded_path("Safety").is_err());
}

#[test]
fn empty_base_still_has_a_root_row() {
    let (rt, loader) = setup();
    blank_jobs(&loader);
    let base = QueryExp::table("jobs").filter(and().eq("Job", lit("nobody")));
    let tree = block_on(vpivot(&rt, base, ["Job"])).unwrap();

    let root = eval(&rt, tree.root_query());
    assert_eq!(root.row_count(), 1);
    assert_eq!(column(&root, "_depth"), ints(&[0]));
    assert_eq!(column(&root, "_path"), texts(&[""]));
    assert_eq!(column(&root, "Name"), [Value::Null]);
    assert_eq!(column(&root, "Pay"), ints(&[0]));

    let flat = eval(&rt, &tree.get_tree_query(Some(&OpenPaths::new())).unwrap());
    assert_eq!(flat.row_count(), 1);
}

#[test]
fn tree_query_is_preorder() {
    let (rt, loader) = setup();
    let tree = pivot(&rt, &["Job", "Title"]);
    let open: OpenPaths = serde_json::from_str(
        r#"{"Executive Management": {"General Manager": true}, "Safety": true}"#,
    )
    .unwrap();
    let query = tree.get_tree_query(Some(&open)).unwrap();

    let fetched = loader.fetch_count();
    let flat = eval(&rt, &query);
    assert_eq!(loader.fetch_count(), fetched + 1, "every part shares one load");

    assert_eq!(
        column(&flat, "_path"),
        texts(&[
            "",
            "#Executive%20Management",
            "#Executive%20Management#General%20Manager",
            "#Executive%20Management#General%20Manager#",
            "#IT",
            "#Safety",
            "#Safety#Chief",
            "#Safety#Officer",
        ])
    );
    assert_eq!(column(&flat, "_depth"), ints(&[0, 1, 2, 3, 1, 1, 2, 2]));
    for row in flat.rows() {
        let (Value::Integer(depth), Value::Text(path)) = (&row[0], &row[2]) else {
            panic!("unexpected row {row:?}");
        };
        let components = decode_path(path).unwrap().len();
        assert_eq!(i64::try_from(components).unwrap(), *depth);
    }
}

#[test]
fn closed_root_and_unmatched_keys() {
    let (rt, _) = setup();
    let tree = pivot(&rt, &["Job", "Title"]);
    let only_root = eval(&rt, &tree.get_tree_query(None).unwrap());
    assert_eq!(only_root.row_count(), 1);

    let root_open = eval(&rt, &tree.get_tree_query(Some(&OpenPaths::new())).unwrap());
    assert_eq!(root_open.row_count(), 4);

    let mut open = OpenPaths::new();
    open.open(&["Nobody"]);
    let unmatched = eval(&rt, &tree.get_tree_query(Some(&open)).unwrap());
    assert_eq!(unmatched.row_count(), 4);

    open.open(&["Safety", "Officer", "Ames"]);
    assert!(matches!(
        tree.get_tree_query(Some(&open)),
        Err(AggTreeError::PathTooLong { .. })
    ));
}

#[test]
fn vpivot_validates_columns() {
    let (rt, _) = setup();
    let err = block_on(vpivot(&rt, base(), ["Job", "Salary"])).unwrap_err();
    assert!(matches!(&err, AggTreeError::UnknownPivot(c) if c == "Salary"), "{err}");

    let clashing = base().extend_column("_path", ColumnMetadata::new(ColumnType::Text), "x");
    let err = block_on(vpivot(&rt, clashing, ["Job"])).unwrap_err();
    assert!(matches!(&err, AggTreeError::ReservedColumn(c) if c == "_path"), "{err}");

    let err = block_on(vpivot(&rt, QueryExp::table("missing"), ["Job"])).unwrap_err();
    assert!(
        matches!(
            &err,
            AggTreeError::Eval(EvalError::Load {
                source: LoadError::NotFound(_),
                ..
            })
        ),
        "{err}"
    );
}

#[test]
fn model_tracks_open_nodes() {
    let (rt, _) = setup();
    let mut model = block_on(PivotTreeModel::new(rt.clone(), base(), ["Job", "Title"])).unwrap();
    let rows = |q: QueryExp| eval(&rt, &q).row_count();

    assert_eq!(rows(model.current_query().unwrap()), 1);
    assert!(model.open_paths().is_none());

    // Opening a nested node opens the root too.
    assert_eq!(rows(model.open_path(&["Safety"]).unwrap()), 6);
    assert_eq!(rows(model.open_path(&["IT"]).unwrap()), 7);
    assert_eq!(rows(model.close_path(&["Safety"]).unwrap()), 5);

    let err = model.open_path(&["IT", "Analyst", "Baker"]).unwrap_err();
    assert!(matches!(err, AggTreeError::PathTooLong { .. }), "{err}");

    assert_eq!(rows(block_on(model.set_pivots(["Union"])).unwrap()), 4);
    assert_eq!(model.pivots(), ["Union"]);
    assert!(model.open_paths().is_some_and(|o| o.is_open(&["IT"])));

    assert_eq!(rows(model.close_path::<&str>(&[]).unwrap()), 1);
    assert!(model.open_paths().is_none());
}
