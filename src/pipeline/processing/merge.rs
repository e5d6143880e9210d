//! Combining derived tables.
//!
//! Two joins are needed: a one-to-one combine of tables derived from the same
//! source rows, and a one-to-many left join from classifications to subjects.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ExportError, Result};
use crate::table::Frame;

/// Outcome of a left join, kept for the end-of-run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JoinReport {
    pub matched: usize,
    /// Left rows whose key was empty or not found on the right.
    pub unmatched: usize,
    /// Distinct non-empty keys with no right-hand row, in first-seen order.
    pub missing_keys: Vec<String>,
}

/// Pick a name for `name` that does not clash with `taken`, appending
/// `suffix` (and a counter if that still clashes).
fn disambiguate(name: &str, suffix: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }
    let candidate = format!("{name}{suffix}");
    if !taken.contains(&candidate) {
        return candidate;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{name}{suffix}_{n}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Combine tables derived row-for-row from `base`.
///
/// Every part must hold exactly the same row identifiers in the same order;
/// anything else is an integrity error rather than a silent misalignment. A
/// part column whose name is already taken gets the suffix `_<origin>`.
pub fn combine_aligned(base: Frame, parts: Vec<(Frame, &str)>) -> Result<Frame> {
    let mut columns: Vec<String> = base.columns().to_vec();
    let mut taken: HashSet<String> = columns.iter().cloned().collect();
    taken.insert(base.index_name().to_string());

    for (part, origin) in &parts {
        if part.len() != base.len() {
            return Err(ExportError::Integrity(format!(
                "{} table has {} rows but the base table has {}",
                origin,
                part.len(),
                base.len()
            )));
        }
        if let Some((pos, (expected, found))) = base
            .ids()
            .zip(part.ids())
            .enumerate()
            .find(|(_, (a, b))| a != b)
        {
            return Err(ExportError::Integrity(format!(
                "{} table is misaligned at row {}: expected '{}', found '{}'",
                origin, pos, expected, found
            )));
        }
        for column in part.columns() {
            let name = disambiguate(column, &format!("_{origin}"), &taken);
            if name != *column {
                debug!(column = %column, renamed = %name, "Column name collision");
            }
            taken.insert(name.clone());
            columns.push(name);
        }
    }

    let mut combined = Frame::new(base.index_name(), columns);
    for (i, row) in base.rows().iter().enumerate() {
        let mut cells = row.cells.clone();
        for (part, _) in &parts {
            cells.extend(part.rows()[i].cells.iter().cloned());
        }
        combined.push_row(row.id.clone(), cells)?;
    }
    Ok(combined)
}

/// Left join `left` to `right` on `left_key` = right's index.
///
/// Every left row appears exactly once in the result, in the original order.
/// The right index is kept as a column. Right identifiers must be unique.
/// Names present on both sides get `suffixes.0` on the left and `suffixes.1`
/// on the right, plus a counter if the suffixed name is already taken. The
/// left index name never changes.
pub fn left_join(
    left: &Frame,
    left_key: &str,
    right: &Frame,
    suffixes: (&str, &str),
) -> Result<(Frame, JoinReport)> {
    let key_pos = left
        .position(left_key)
        .ok_or_else(|| ExportError::Integrity(format!("join key '{left_key}' is not a column")))?;

    let mut lookup: HashMap<&str, usize> = HashMap::with_capacity(right.len());
    for (i, id) in right.ids().enumerate() {
        if lookup.insert(id, i).is_some() {
            return Err(ExportError::Integrity(format!(
                "duplicate {} '{}' on the right side of a join",
                right.index_name(),
                id
            )));
        }
    }

    let right_names: Vec<&str> = std::iter::once(right.index_name())
        .chain(right.columns().iter().map(|c| c.as_str()))
        .collect();
    let right_set: HashSet<&str> = right_names.iter().copied().collect();
    let left_set: HashSet<&str> = left.columns().iter().map(|c| c.as_str()).collect();

    let mut taken: HashSet<String> = left_set
        .iter()
        .chain(right_set.iter())
        .map(|c| c.to_string())
        .collect();
    taken.insert(left.index_name().to_string());

    let mut columns: Vec<String> = Vec::with_capacity(left.columns().len() + right_names.len());
    for c in left.columns() {
        let name = if right_set.contains(c.as_str()) {
            disambiguate(c, suffixes.0, &taken)
        } else {
            c.clone()
        };
        taken.insert(name.clone());
        columns.push(name);
    }
    for name in &right_names {
        let name = if left_set.contains(name) || *name == left.index_name() {
            disambiguate(name, suffixes.1, &taken)
        } else {
            name.to_string()
        };
        taken.insert(name.clone());
        columns.push(name);
    }
    debug_assert!(
        {
            let mut seen = HashSet::new();
            columns.iter().all(|c| c != left.index_name() && seen.insert(c.as_str()))
        },
        "join produced duplicate column names"
    );

    let right_width = right_names.len();
    let mut joined = Frame::new(left.index_name(), columns);
    let mut report = JoinReport::default();
    let mut missing_seen: HashSet<&str> = HashSet::new();

    for row in left.rows() {
        let key = row.cells[key_pos].as_deref().map(str::trim).filter(|k| !k.is_empty());
        let mut cells = row.cells.clone();
        match key.and_then(|k| lookup.get(k).copied()) {
            Some(i) => {
                let matched = &right.rows()[i];
                cells.push(Some(matched.id.clone()));
                cells.extend(matched.cells.iter().cloned());
                report.matched += 1;
            }
            None => {
                cells.extend(std::iter::repeat(None).take(right_width));
                report.unmatched += 1;
                match key {
                    Some(k) => {
                        if missing_seen.insert(k) {
                            warn!(
                                "⚠️  {} '{}' referenced by {} '{}' not found",
                                right.index_name(),
                                k,
                                left.index_name(),
                                row.id
                            );
                            report.missing_keys.push(k.to_string());
                        }
                    }
                    None => {
                        warn!("⚠️  {} '{}' has no {}", left.index_name(), row.id, left_key);
                    }
                }
            }
        }
        joined.push_row(row.id.clone(), cells)?;
    }

    Ok((joined, report))
}
