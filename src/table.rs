//! Columnar storage for decoded records.
//!
//! A [`DecodedTable`] holds one [`Column`] per schema field in layout order.
//! Numeric columns are `Vec<u64>`; categorical columns are a single
//! contiguous buffer of fixed-width values, so a row's bytes are a slice
//! into it. Views ([`TableView`]) borrow columns and never copy or reorder.
use crate::error::{Result, TaqError};
use crate::header::BaseTimestamp;
use crate::record::{categorical_fields, numeric_fields, FieldKind, FieldSpec, RecordKind, RecordLayout};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    Categorical { width: usize, bytes: Vec<u8> },
    Numeric(Vec<u64>),
}

/// One cell of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Categorical(&'a [u8]),
    Numeric(u64),
}

impl Column {
    fn for_field(spec: &FieldSpec, capacity: usize) -> Column {
        match spec.kind {
            FieldKind::Categorical => Column::Categorical {
                width: spec.byte_width,
                bytes: Vec::with_capacity(capacity * spec.byte_width),
            },
            FieldKind::NumericText => Column::Numeric(Vec::with_capacity(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Categorical { width, bytes } => bytes.len() / width,
            Column::Numeric(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn numeric(&self) -> Option<&[u64]> {
        match self {
            Column::Numeric(v) => Some(v),
            Column::Categorical { .. } => None,
        }
    }

    /// Iterate a categorical column's values, padding preserved.
    pub fn categorical(&self) -> Option<std::slice::ChunksExact<'_, u8>> {
        match self {
            Column::Categorical { width, bytes } => Some(bytes.chunks_exact(*width)),
            Column::Numeric(_) => None,
        }
    }

    pub fn get(&self, row: usize) -> Option<FieldValue<'_>> {
        match self {
            Column::Categorical { width, bytes } => {
                bytes.get(row * width..(row + 1) * width).map(FieldValue::Categorical)
            }
            Column::Numeric(v) => v.get(row).copied().map(FieldValue::Numeric),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTable {
    kind: RecordKind,
    names: Vec<&'static str>,
    columns: Vec<Column>,
    rows: usize,
}

impl DecodedTable {
    /// Empty table with one column per schema field of `layout`.
    pub(crate) fn with_layout(layout: &RecordLayout, capacity: usize) -> DecodedTable {
        let schema = layout.schema();
        DecodedTable {
            kind: layout.kind(),
            names: schema.iter().map(|f| f.name).collect(),
            columns: schema.iter().map(|f| Column::for_field(f, capacity)).collect(),
            rows: 0,
        }
    }

    /// Decode one record line and append it. On error the table is left with
    /// a partial row and must be discarded.
    pub(crate) fn push_line(&mut self, layout: &RecordLayout, line: &[u8]) -> Result<()> {
        let mut off = 0usize;
        for (spec, col) in layout.schema().iter().zip(self.columns.iter_mut()) {
            let raw = &line[off..off + spec.byte_width];
            off += spec.byte_width;
            match col {
                Column::Categorical { bytes, .. } => bytes.extend_from_slice(raw),
                Column::Numeric(v) => v.push(parse_digits(raw).ok_or_else(|| TaqError::FieldDecodeError {
                    row: self.rows,
                    field: spec.name,
                    bytes: raw.to_vec(),
                })?),
            }
        }
        self.rows += 1;
        Ok(())
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Column names in layout order.
    pub fn schema(&self) -> &[&'static str] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names.iter().position(|n| *n == name).map(|i| &self.columns[i])
    }

    pub fn columns(&self) -> impl Iterator<Item = (&'static str, &Column)> {
        self.names.iter().copied().zip(self.columns.iter())
    }

    pub fn row(&self, index: usize) -> Option<Vec<FieldValue<'_>>> {
        if index >= self.rows {
            return None;
        }
        self.columns.iter().map(|c| c.get(index)).collect()
    }

    fn project(&self, keep: impl Fn(&str) -> bool) -> TableView<'_> {
        let columns = self.columns().filter(|(n, _)| keep(n)).collect();
        TableView { rows: self.rows, columns }
    }

    /// Columns listed in the numeric view of this table's record kind.
    pub fn numeric_view(&self) -> Result<TableView<'_>> {
        let set = numeric_fields(self.kind)?;
        Ok(self.project(|n| set.contains(n)))
    }

    /// Columns listed in the categorical view of this table's record kind.
    pub fn categorical_view(&self) -> Result<TableView<'_>> {
        let set = categorical_fields(self.kind)?;
        Ok(self.project(|n| set.contains(n)))
    }

    /// Epoch milliseconds per row: `base` plus the Hour, Minute, Second and
    /// Milliseconds fields. `None` if the table lacks any of them or a row
    /// overflows.
    pub fn timestamps_ms(&self, base: &BaseTimestamp) -> Option<Vec<i64>> {
        let hour = self.column("Hour")?.numeric()?;
        let minute = self.column("Minute")?.numeric()?;
        let second = self.column("Second")?.numeric()?;
        let millis = self.column("Milliseconds")?.numeric()?;
        (0..self.rows)
            .map(|i| base.at(hour[i], minute[i], second[i], millis[i]))
            .collect()
    }
}

/// Fixed-width unsigned decimal. Leading zeros allowed, nothing else.
pub(crate) fn parse_digits(raw: &[u8]) -> Option<u64> {
    if raw.is_empty() {
        return None;
    }
    raw.iter().try_fold(0u64, |acc, &b| {
        if !b.is_ascii_digit() {
            return None;
        }
        acc.checked_mul(10)?.checked_add(u64::from(b - b'0'))
    })
}

/// Borrowed projection over a subset of a table's columns.
#[derive(Debug, Clone)]
pub struct TableView<'a> {
    rows: usize,
    columns: Vec<(&'static str, &'a Column)>,
}

impl<'a> TableView<'a> {
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn schema(&self) -> Vec<&'static str> {
        self.columns.iter().map(|(n, _)| *n).collect()
    }

    pub fn column(&self, name: &str) -> Option<&'a Column> {
        self.columns.iter().find(|(n, _)| *n == name).map(|(_, c)| *c)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&'static str, &'a Column)> + '_ {
        self.columns.iter().copied()
    }
}
