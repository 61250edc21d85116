//! Fixed-width table decoding.
//!
//! rladmin prints each section as a table whose column boundaries are given
//! by the start offsets of the header labels. Each record type describes
//! itself with a static [`Field`] table: the same table drives decoding here
//! and CSV rendering in [`crate::export`].

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use super::coerce::CoerceError;

/// Sets a record field from one trimmed cell.
pub type DecodeFn<T> = fn(&mut T, &str) -> Result<(), CoerceError>;

/// Renders a record field as CSV text.
pub type RenderFn<T> = fn(&T) -> String;

/// Binding between a header label and a record field.
pub struct Column<T> {
    /// Header label in the rladmin table, e.g. `NODE:ID`.
    pub label: &'static str,
    /// Destination type, named in decode errors.
    pub kind: &'static str,
    pub decode: DecodeFn<T>,
}

/// One output field of a record, optionally backed by a table column.
pub struct Field<T> {
    /// Output (CSV) column name.
    pub name: &'static str,
    /// `None` for fields filled in after decoding (key, timestamp, flags).
    pub column: Option<Column<T>>,
    pub render: RenderFn<T>,
}

impl<T> Field<T> {
    pub const fn column(
        name: &'static str,
        label: &'static str,
        kind: &'static str,
        decode: DecodeFn<T>,
        render: RenderFn<T>,
    ) -> Self {
        Self {
            name,
            column: Some(Column {
                label,
                kind,
                decode,
            }),
            render,
        }
    }

    pub const fn derived(name: &'static str, render: RenderFn<T>) -> Self {
        Self {
            name,
            column: None,
            render,
        }
    }
}

/// Binds a plain string column: the trimmed cell is stored as-is.
macro_rules! text_column {
    ($name:literal, $label:literal, $field:ident) => {
        $crate::clusterinfo::table::Field::column(
            $name,
            $label,
            "string",
            |r, v| {
                r.$field = v.to_string();
                Ok(())
            },
            |r| r.$field.clone(),
        )
    };
}

pub(crate) use text_column;

/// A record type decodable from a fixed-width table.
pub trait Record: Default + Sized + 'static {
    /// Fields in output order.
    const FIELDS: &'static [Field<Self>];
}

/// Errors that can occur while decoding a table.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("line {line}: field {field} (column {label}): unable to parse '{raw}' as {kind}: {source}")]
    Field {
        line: usize,
        field: &'static str,
        label: &'static str,
        raw: String,
        kind: &'static str,
        #[source]
        source: CoerceError,
    },
}

/// Column label and its start offset (in characters) within the header.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderColumn {
    label: String,
    start: usize,
}

/// Split a header line into labels and their start offsets.
fn parse_header(header: &str) -> Vec<HeaderColumn> {
    let mut columns = Vec::new();
    let mut current: Option<HeaderColumn> = None;

    for (pos, ch) in header.chars().enumerate() {
        if ch.is_whitespace() {
            if let Some(col) = current.take() {
                columns.push(col);
            }
        } else {
            match current.as_mut() {
                Some(col) => col.label.push(ch),
                None => {
                    current = Some(HeaderColumn {
                        label: ch.to_string(),
                        start: pos,
                    })
                }
            }
        }
    }
    if let Some(col) = current {
        columns.push(col);
    }

    columns
}

/// Slice `line` between character offsets `start` and `end` (exclusive).
/// Offsets past the end of the line are clamped.
fn slice_chars(line: &str, start: usize, end: Option<usize>) -> &str {
    let byte_at = |n: usize| {
        line.char_indices()
            .nth(n)
            .map(|(i, _)| i)
            .unwrap_or(line.len())
    };
    let from = byte_at(start);
    let to = end.map_or(line.len(), byte_at);
    if from >= to {
        ""
    } else {
        &line[from..to]
    }
}

/// Decode a table block into records, preserving row order.
///
/// The first line is the header. Rows whose mapped cells are all blank are
/// skipped. Mapped labels missing from the header leave their field at its
/// default. The first coercion failure aborts the whole block.
pub fn decode<T: Record>(block: &str) -> Result<Vec<T>, DecodeError> {
    let mut lines = block.lines();
    let header = match lines.next() {
        Some(h) => h,
        None => return Ok(Vec::new()),
    };

    let columns = parse_header(header);
    let bounds: HashMap<&str, (usize, Option<usize>)> = columns
        .iter()
        .enumerate()
        .rev()
        .map(|(i, col)| {
            let end = columns.get(i + 1).map(|next| next.start);
            (col.label.as_str(), (col.start, end))
        })
        .collect();

    // (field index, start, end) for every mapped column present in the header.
    let mut bound_fields = Vec::with_capacity(T::FIELDS.len());
    for (idx, field) in T::FIELDS.iter().enumerate() {
        let Some(column) = &field.column else {
            continue;
        };
        match bounds.get(column.label) {
            Some(&(start, end)) => bound_fields.push((idx, start, end)),
            None => debug!(label = column.label, "column missing from table header"),
        }
    }

    let mut records = Vec::new();
    let mut cells: Vec<&str> = Vec::with_capacity(bound_fields.len());

    for (offset, line) in lines.enumerate() {
        cells.clear();
        cells.extend(
            bound_fields
                .iter()
                .map(|&(_, start, end)| slice_chars(line, start, end).trim()),
        );

        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }

        let mut record = T::default();
        for (&(idx, _, _), raw) in bound_fields.iter().zip(&cells) {
            let field = &T::FIELDS[idx];
            if let Some(column) = &field.column {
                (column.decode)(&mut record, raw).map_err(|source| DecodeError::Field {
                    line: offset + 2,
                    field: field.name,
                    label: column.label,
                    raw: (*raw).to_string(),
                    kind: column.kind,
                    source,
                })?;
            }
        }
        records.push(record);
    }

    Ok(records)
}
