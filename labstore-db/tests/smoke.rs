// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Smoke tests for labstore-db.
//!
//! These tests exercise experiments, runs and result tables end to end,
//! mostly against an in-memory database.

use labstore_db::ndarray::{Array, ArrayD, IxDyn};
use labstore_db::{Error, LabDb, OpenMode, ParamKind, ParamSpec, Value};

fn param(name: &str, kind: ParamKind) -> ParamSpec {
    ParamSpec::new(name, kind).unwrap()
}

fn run_rows(db: &LabDb) -> i64 {
    db.connection()
        .query_row("SELECT COUNT(*) FROM runs", [], |r| r.get(0))
        .unwrap()
}

/// Verify the run counter advances by exactly one per run.
#[test]
fn test_run_counter_is_monotonic() {
    let db = LabDb::open_memory().unwrap();
    let exp = db.create_experiment("qubit-sweep", "sample-1", None).unwrap();
    assert_eq!(db.get_run_counter(exp).unwrap(), 0);

    let mut tables = Vec::new();
    for expected in 1..=5 {
        let (run_id, table) = db.create_run(exp, "sweep").unwrap();
        assert_eq!(db.get_run_counter(exp).unwrap(), expected);
        assert_eq!(db.get_run(run_id).unwrap().result_counter, expected);
        assert_eq!(table, format!("sweep-{exp}-{expected}"));
        tables.push(table);
    }

    // A second experiment keeps its own counter.
    let other = db.create_experiment("other", "sample-2", None).unwrap();
    let (_, table) = db.create_run(other, "sweep").unwrap();
    assert_eq!(table, format!("sweep-{other}-1"));
    assert_eq!(db.get_run_counter(exp).unwrap(), 5);

    tables.sort();
    tables.dedup();
    assert_eq!(tables.len(), 5);
    assert_eq!(db.get_last_run(exp).unwrap(), format!("sweep-{exp}-5"));
}

/// Verify a failing table creation leaves no run row and no counter change.
#[test]
fn test_create_run_is_atomic() {
    let db = LabDb::open_memory().unwrap();
    let exp = db.create_experiment("e", "s", None).unwrap();
    let (_, first) = db.create_run(exp, "sweep").unwrap();

    // Occupy the name the next run will format to.
    let taken = format!("sweep-{exp}-2");
    db.create_run_table(&taken, &[], None).unwrap();

    let err = db.create_run(exp, "sweep").unwrap_err();
    assert!(matches!(err, Error::Transaction { .. }));
    assert!(matches!(err.root_cause(), Error::DuplicateTable(name) if *name == taken));

    assert_eq!(db.get_run_counter(exp).unwrap(), 1);
    assert_eq!(run_rows(&db), 1);
    assert_eq!(db.get_last_run(exp).unwrap(), first);
    assert!(!db.in_transaction());
}

/// Verify two runs formatting to the same name cannot both exist.
#[test]
fn test_duplicate_table_names_are_rejected() {
    let db = LabDb::open_memory().unwrap();
    // A template without the counter formats every run identically.
    let exp = db.create_experiment("e", "s", Some("{0}")).unwrap();
    db.create_run(exp, "fixed").unwrap();

    let err = db.create_run(exp, "fixed").unwrap_err();
    assert!(matches!(err.root_cause(), Error::DuplicateTable(name) if name == "fixed"));
    assert_eq!(db.get_run_counter(exp).unwrap(), 1);
    assert_eq!(run_rows(&db), 1);

    assert!(matches!(
        db.create_run_table("fixed", &[], None),
        Err(Error::DuplicateTable(_))
    ));
}

/// Verify run names differing only in case map to the same table.
#[test]
fn test_table_names_ignore_case() {
    let db = LabDb::open_memory().unwrap();
    let exp = db.create_experiment("e", "s", Some("{0}")).unwrap();
    db.create_run(exp, "Sweep").unwrap();

    let err = db.create_run(exp, "sweep").unwrap_err();
    assert!(matches!(err.root_cause(), Error::DuplicateTable(name) if name == "sweep"));
    assert_eq!(db.get_run_counter(exp).unwrap(), 1);
    assert_eq!(run_rows(&db), 1);
    assert_eq!(db.get_last_run(exp).unwrap(), "Sweep");
}

/// Verify the row-range convention of `get_data`.
#[test]
fn test_get_data_boundaries() {
    let db = LabDb::open_memory().unwrap();
    let exp = db.create_experiment("e", "s", None).unwrap();
    let (_, table) = db.create_run(exp, "range").unwrap();
    let x = param("x", ParamKind::Integer);
    db.add_parameter(&table, std::slice::from_ref(&x)).unwrap();

    let rows: Vec<Vec<Value>> = (1..=10).map(|i| vec![Value::from(i * 10)]).collect();
    assert_eq!(
        db.insert_many_values(&table, std::slice::from_ref(&x), &rows)
            .unwrap(),
        10
    );

    let xs = |start, end| -> Vec<i64> {
        db.get_data(&table, std::slice::from_ref(&x), start, end)
            .unwrap()
            .iter()
            .map(|r| r.get("x").and_then(Value::as_i64).unwrap())
            .collect()
    };

    assert_eq!(xs(Some(3), Some(6)), [40, 50, 60]);
    assert_eq!(xs(Some(3), None), [30, 40, 50, 60, 70, 80, 90, 100]);
    assert_eq!(xs(None, Some(2)), [10, 20]);
    assert_eq!(xs(None, None).len(), 10);
}

/// The full acquisition scenario: scalars, bulk inserts and a large array.
#[test]
fn test_qubit_sweep_scenario() {
    let db = LabDb::open_memory().unwrap();
    let exp = db.create_experiment("qubit-sweep", "sample-1", None).unwrap();
    let (_, table) = db.create_run(exp, "sweep").unwrap();

    let a = param("a", ParamKind::Integer);
    let b = param("b", ParamKind::Integer);
    db.add_parameter(&table, &[a.clone(), b.clone()]).unwrap();
    assert_eq!(
        db.insert_values(&table, &[a.clone(), b.clone()], &[0.into(), 0.into()])
            .unwrap(),
        1
    );

    let bulk = vec![vec![Value::from(1)], vec![Value::from(2)], vec![Value::from(3)]];
    assert_eq!(
        db.insert_many_values(&table, std::slice::from_ref(&a), &bulk)
            .unwrap(),
        4
    );

    let c = param("c", ParamKind::Array).with_metadata("unit", serde_json::json!("counts"));
    db.add_parameter(&table, std::slice::from_ref(&c)).unwrap();

    let x: ArrayD<i64> = Array::from_iter(0..1_000_000i64)
        .into_shape_with_order(IxDyn(&[1000, 1000]))
        .unwrap();
    let row_id = db
        .insert_values(
            &table,
            &[a.clone(), b.clone(), c.clone()],
            &[0.into(), 0.into(), x.clone().into()],
        )
        .unwrap();
    assert_eq!(row_id, 5);

    let rows = db.get_data(&table, &[a.clone(), c.clone()], Some(4), Some(5)).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("a"), Some(&Value::Integer(0)));
    assert_eq!(rows[0].get("c"), Some(&Value::from(x)));

    // Rows from the bulk insert have no array and no `b`.
    let rows = db.get_data(&table, &[a, b, c], Some(2), Some(4)).unwrap();
    let a_values: Vec<_> = rows.iter().map(|r| r.get("a").cloned()).collect();
    assert_eq!(
        a_values,
        [Some(Value::Integer(2)), Some(Value::Integer(3))]
    );
    assert!(rows.iter().all(|r| r.get("b") == Some(&Value::Null)));
    assert!(rows.iter().all(|r| r.get("c") == Some(&Value::Null)));

    let dtype: String = db
        .connection()
        .query_row(
            &format!("SELECT array_dtype(c) FROM \"{table}\" WHERE id = 5"),
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(dtype, "int64");

    db.finish_experiment(exp).unwrap();
    assert!(db.get_experiment(exp).unwrap().is_finished());
}

/// Verify data survives reopening a file-backed store.
#[test]
fn test_file_backed_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("experiments.db");

    let (exp, table) = {
        let db = LabDb::open(&path, OpenMode::Create).unwrap();
        let exp = db.create_experiment("persist", "s", None).unwrap();
        let (_, table) = db.create_run(exp, "run").unwrap();
        let p = [
            param("flag", ParamKind::Boolean),
            param("v", ParamKind::Real),
            param("trace", ParamKind::Array),
        ];
        db.add_parameter(&table, &p).unwrap();
        let trace = Array::from_vec(vec![0.5f32, -1.25, 3.0]).into_dyn();
        db.insert_values(&table, &p, &[true.into(), 1.5.into(), trace.into()])
            .unwrap();
        (exp, table)
    };

    let db = LabDb::open(&path, OpenMode::ReadWrite).unwrap();
    assert_eq!(db.get_last_run(exp).unwrap(), table);
    assert_eq!(
        db.table_columns(&table).unwrap(),
        ["id", "flag", "v", "trace"]
    );
    let p = [
        param("flag", ParamKind::Boolean),
        param("v", ParamKind::Real),
        param("trace", ParamKind::Array),
    ];
    let rows = db.get_data(&table, &p, None, None).unwrap();
    assert_eq!(
        rows[0].clone().into_values(),
        vec![
            Value::Boolean(true),
            Value::Real(1.5),
            Value::from(Array::from_vec(vec![0.5f32, -1.25, 3.0]).into_dyn()),
        ]
    );
}
