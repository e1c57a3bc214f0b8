// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Row abstraction and single-row query helpers.

use rusqlite::{Params, Statement};

use crate::connection::LabDb;
use crate::error::{Error, Result};
use crate::ident::{quote, validate_column, validate_table};
use crate::param::ParamKind;
use crate::value::Value;

/// A result row: column names mapped to values, in select order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    /// Value of the column called `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Value at position `index`.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.columns.get(index).map(|(_, v)| v)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.columns.iter().map(|(_, v)| v)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.columns.into_iter().map(|(_, v)| v).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn take(&mut self, name: &str) -> Option<Value> {
        self.columns
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| std::mem::replace(v, Value::Null))
    }
}

/// Read all rows of a prepared statement.
///
/// `kinds[i]`, when present, tells how to decode column `i`.
pub(crate) fn collect_rows<P: Params>(
    stmt: &mut Statement<'_>,
    params: P,
    kinds: &[Option<ParamKind>],
) -> Result<Vec<Row>> {
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query(params)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut columns = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let kind = kinds.get(i).copied().flatten();
            columns.push((name.clone(), Value::decode(row.get_ref(i)?, kind)?));
        }
        out.push(Row { columns });
    }
    Ok(out)
}

fn single(mut rows: Vec<Row>, what: &str) -> Result<Row> {
    match rows.len() {
        0 => Err(Error::NotFound(what.to_owned())),
        1 => Ok(rows.remove(0)),
        count => Err(Error::AmbiguousResult {
            what: what.to_owned(),
            count,
        }),
    }
}

/// Extract `column` from a result expected to hold exactly one row.
pub fn one(rows: Vec<Row>, column: &str) -> Result<Value> {
    let mut row = single(rows, column)?;
    row.take(column)
        .ok_or_else(|| Error::NotFound(format!("column {column}")))
}

/// Extract several columns from a result expected to hold exactly one row.
pub fn many(rows: Vec<Row>, columns: &[&str]) -> Result<Vec<Value>> {
    let mut row = single(rows, &columns.join(","))?;
    columns
        .iter()
        .map(|c| {
            row.take(c)
                .ok_or_else(|| Error::NotFound(format!("column {c}")))
        })
        .collect()
}

impl LabDb {
    /// `SELECT column FROM table WHERE where_column = value`, expecting one row.
    pub fn select_one_where(
        &self,
        table: &str,
        column: &str,
        where_column: &str,
        value: &Value,
    ) -> Result<Value> {
        let rows = self.select_where(table, &[column], where_column, value)?;
        one(rows, column).map_err(|e| describe(e, table, where_column, value))
    }

    /// Like [`LabDb::select_one_where`] for several columns read together.
    pub fn select_many_where(
        &self,
        table: &str,
        columns: &[&str],
        where_column: &str,
        value: &Value,
    ) -> Result<Vec<Value>> {
        let rows = self.select_where(table, columns, where_column, value)?;
        many(rows, columns).map_err(|e| describe(e, table, where_column, value))
    }

    fn select_where(
        &self,
        table: &str,
        columns: &[&str],
        where_column: &str,
        value: &Value,
    ) -> Result<Vec<Row>> {
        let columns = columns
            .iter()
            .map(|c| validate_column(c).map(quote))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let sql = format!(
            "SELECT {columns} FROM {} WHERE {} = ?1",
            quote(validate_table(table)?),
            quote(validate_column(where_column)?),
        );
        self.query(&sql, [value])
    }
}

fn describe(e: Error, table: &str, where_column: &str, value: &Value) -> Error {
    let what = format!("{table} with {where_column} = {value:?}");
    match e {
        Error::NotFound(_) => Error::NotFound(what),
        Error::AmbiguousResult { count, .. } => Error::AmbiguousResult { what, count },
        e => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, i64)]) -> Row {
        Row {
            columns: pairs
                .iter()
                .map(|(n, v)| ((*n).to_owned(), Value::Integer(*v)))
                .collect(),
        }
    }

    #[test]
    fn one_requires_exactly_one_row() {
        assert!(matches!(one(vec![], "a"), Err(Error::NotFound(_))));
        assert!(matches!(
            one(vec![row(&[("a", 1)]), row(&[("a", 2)])], "a"),
            Err(Error::AmbiguousResult { count: 2, .. })
        ));
        assert_eq!(one(vec![row(&[("a", 1)])], "a").unwrap(), Value::Integer(1));
    }

    #[test]
    fn many_keeps_requested_order() {
        let values = many(vec![row(&[("a", 1), ("b", 2)])], &["b", "a"]).unwrap();
        assert_eq!(values, vec![Value::Integer(2), Value::Integer(1)]);
        assert!(many(vec![row(&[("a", 1)])], &["missing"]).is_err());
    }

    #[test]
    fn row_lookup_by_name_and_position() {
        let r = row(&[("x", 5), ("y", 6)]);
        assert_eq!(r.get("y"), Some(&Value::Integer(6)));
        assert_eq!(r.get_index(0), Some(&Value::Integer(5)));
        assert_eq!(r.column_names().collect::<Vec<_>>(), ["x", "y"]);
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn select_helpers_check_cardinality() {
        let db = LabDb::open_memory().unwrap();
        let a = db.create_experiment("a", "s1", None).unwrap();
        let _b = db.create_experiment("b", "s1", None).unwrap();

        let name = db
            .select_one_where("experiments", "name", "exp_id", &Value::Integer(a))
            .unwrap();
        assert_eq!(name, Value::from("a"));

        let err = db
            .select_one_where("experiments", "name", "sample_name", &Value::from("s1"))
            .unwrap_err();
        assert!(matches!(err, Error::AmbiguousResult { count: 2, .. }));

        let err = db
            .select_many_where(
                "experiments",
                &["name", "run_counter"],
                "exp_id",
                &Value::Integer(99),
            )
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        assert!(matches!(
            db.select_one_where("experiments", "name; --", "exp_id", &Value::Integer(a)),
            Err(Error::InvalidIdentifier(_))
        ));
    }
}
