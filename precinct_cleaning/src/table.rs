// ********* Cells, tables and records ***********

use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt::Display;
use std::hash::{Hash, Hasher};

/// The content of one cell.
///
/// Cells read from a CSV file are always `Text` (or `Null` for an empty cell).
/// The other variants are introduced by enrichment and by the cleaning steps.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
}

impl Value {
    pub fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, or some text that contains nothing.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

// Floats are compared by their bit pattern so that a Value can be used as a
// deduplication key.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Date(d) => d.hash(state),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// A rectangular table: column names and rows of cells.
///
/// Column names are not required to be unique: this is how files come out of
/// the CSV reader. Lookups by name return the first matching column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Table {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a table, padding short rows with nulls and cutting long ones.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Table {
        let mut t = Table::new(columns);
        for row in rows {
            t.push_row(row);
        }
        t
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// The cells of a column, if it exists.
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Removes the rows that are exact copies of a previous row.
    pub fn drop_duplicates(self) -> Table {
        let mut seen: HashSet<Vec<Value>> = HashSet::new();
        let mut rows: Vec<Vec<Value>> = Vec::with_capacity(self.rows.len());
        for row in self.rows {
            if !seen.contains(&row) {
                seen.insert(row.clone());
                rows.push(row);
            }
        }
        Table {
            columns: self.columns,
            rows,
        }
    }

    /// Sets a column to the same value on every row. An existing column with
    /// this name is overwritten.
    pub fn with_constant_column(mut self, name: &str, value: Value) -> Table {
        match self.column_index(name) {
            Some(idx) => {
                for row in self.rows.iter_mut() {
                    row[idx] = value.clone();
                }
            }
            None => {
                self.columns.push(name.to_string());
                for row in self.rows.iter_mut() {
                    row.push(value.clone());
                }
            }
        }
        self
    }

    /// Appends a computed column. An existing column with this name is
    /// overwritten.
    pub fn with_column(mut self, name: &str, values: Vec<Value>) -> Table {
        assert_eq!(values.len(), self.rows.len());
        let idx = match self.column_index(name) {
            Some(idx) => idx,
            None => {
                self.columns.push(name.to_string());
                for row in self.rows.iter_mut() {
                    row.push(Value::Null);
                }
                self.columns.len() - 1
            }
        };
        for (row, v) in self.rows.iter_mut().zip(values) {
            row[idx] = v;
        }
        self
    }

    /// Renames the first column called `from`. Nothing happens if `from` is
    /// missing or if `to` already exists.
    pub fn rename_column(mut self, from: &str, to: &str) -> Table {
        if self.has_column(to) {
            return self;
        }
        if let Some(idx) = self.column_index(from) {
            self.columns[idx] = to.to_string();
        }
        self
    }

    /// Keeps only the columns at the given positions, in this order.
    pub fn keep_positions(self, positions: &[usize]) -> Table {
        let columns = positions.iter().map(|i| self.columns[*i].clone()).collect();
        let rows = self
            .rows
            .into_iter()
            .map(|r| positions.iter().map(|i| r[*i].clone()).collect())
            .collect();
        Table { columns, rows }
    }

    /// Replaces all the column names at once. The number of names must match.
    pub fn with_column_names(mut self, names: Vec<String>) -> Table {
        assert_eq!(names.len(), self.columns.len());
        self.columns = names;
        self
    }

    /// Stacks tables on top of each other. The columns of the result are the
    /// union of all the columns, in order of first appearance; cells of missing
    /// columns are null.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut columns: Vec<String> = Vec::new();
        for t in tables.iter() {
            for c in t.columns.iter() {
                if !columns.contains(c) {
                    columns.push(c.clone());
                }
            }
        }
        let mut res = Table::new(columns);
        for t in tables {
            let mapping: Vec<Option<usize>> =
                res.columns.iter().map(|c| t.column_index(c)).collect();
            for row in t.rows {
                let new_row = mapping
                    .iter()
                    .map(|m| m.map(|i| row[i].clone()).unwrap_or(Value::Null))
                    .collect();
                res.rows.push(new_row);
            }
        }
        res
    }
}

/// One output row: an ordered list of named values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Record {
        Record { fields: Vec::new() }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns the record with `name` set to `value`, appended if it was not
    /// already present.
    pub fn with(mut self, name: &str, value: Value) -> Record {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some(field) => field.1 = value,
            None => self.fields.push((name.to_string(), value)),
        }
        self
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// The values of the given columns, in order. Missing columns are null.
    pub fn key(&self, columns: &[&str]) -> Vec<Value> {
        columns
            .iter()
            .map(|c| self.get(c).cloned().unwrap_or(Value::Null))
            .collect()
    }
}
