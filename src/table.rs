//! In-memory tabular data with an explicit row identifier.
//!
//! Every [`Frame`] carries the identifier of each row alongside its cells, so
//! derived tables can be aligned by identity instead of by position.

use std::collections::HashSet;

use crate::error::{ExportError, Result};

/// A single row: its identifier plus one optional cell per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: String,
    pub cells: Vec<Option<String>>,
}

/// Ordered table keyed by an index column.
///
/// The index column is not part of `columns`; it is rendered first on export.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    index: String,
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Frame {
    pub fn new(index: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            index: index.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.id.as_str())
    }

    /// Header as written on export: index name, then the data columns.
    pub fn header(&self) -> Vec<&str> {
        std::iter::once(self.index.as_str())
            .chain(self.columns.iter().map(|c| c.as_str()))
            .collect()
    }

    pub fn push_row(&mut self, id: impl Into<String>, cells: Vec<Option<String>>) -> Result<()> {
        let id = id.into();
        if cells.len() != self.columns.len() {
            return Err(ExportError::Integrity(format!(
                "row '{}' has {} cells but the table has {} columns",
                id,
                cells.len(),
                self.columns.len()
            )));
        }
        self.rows.push(Row { id, cells });
        Ok(())
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.position(column).is_some()
    }

    /// Position of a column that must exist, or a schema error naming it.
    pub fn require_column(&self, table: &str, column: &str) -> Result<usize> {
        self.position(column)
            .ok_or_else(|| ExportError::schema(table, column))
    }

    /// Borrow one column as `(row id, cell)` pairs in row order.
    pub fn column_values(&self, column: &str) -> Option<Vec<(&str, Option<&str>)>> {
        let pos = self.position(column)?;
        Some(
            self.rows
                .iter()
                .map(|r| (r.id.as_str(), r.cells[pos].as_deref()))
                .collect(),
        )
    }

    /// Remove the named columns that exist; returns the names actually removed.
    pub fn drop_columns(&mut self, names: &[&str]) -> Vec<String> {
        let mut positions: Vec<usize> = names.iter().filter_map(|n| self.position(n)).collect();
        positions.sort_unstable();
        positions.dedup();

        let mut dropped = Vec::with_capacity(positions.len());
        for pos in positions.into_iter().rev() {
            dropped.push(self.columns.remove(pos));
            for row in &mut self.rows {
                row.cells.remove(pos);
            }
        }
        dropped.reverse();
        dropped
    }

    /// Append a column; `values` must hold one cell per row, in row order.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Option<String>>) -> Result<()> {
        let name = name.into();
        if self.has_column(&name) || name == self.index {
            return Err(ExportError::Integrity(format!("column '{}' already exists", name)));
        }
        if values.len() != self.rows.len() {
            return Err(ExportError::Integrity(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        self.columns.push(name);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.cells.push(value);
        }
        Ok(())
    }

    /// Overwrite an existing column in place, keeping its position.
    pub fn replace_column(&mut self, name: &str, values: Vec<Option<String>>) -> Result<()> {
        let pos = self
            .position(name)
            .ok_or_else(|| ExportError::Integrity(format!("column '{}' does not exist", name)))?;
        if values.len() != self.rows.len() {
            return Err(ExportError::Integrity(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.cells[pos] = value;
        }
        Ok(())
    }

    /// Keep only the rows for which `keep` returns true; returns how many were removed.
    pub fn retain_rows<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Row) -> bool,
    {
        let before = self.rows.len();
        self.rows.retain(|r| keep(r));
        before - self.rows.len()
    }

    /// Fails on the first repeated row identifier.
    pub fn ensure_unique_ids(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.rows.len());
        for row in &self.rows {
            if !seen.insert(row.id.as_str()) {
                return Err(ExportError::Integrity(format!(
                    "duplicate {} '{}'",
                    self.index, row.id
                )));
            }
        }
        Ok(())
    }

    /// Drop every row whose identifier was already seen, keeping the first.
    pub fn dedup_ids(&mut self) -> usize {
        let mut seen = HashSet::with_capacity(self.rows.len());
        self.retain_rows(|r| seen.insert(r.id.clone()))
    }
}
