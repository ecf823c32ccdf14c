use super::branches::is_multi_object;
use super::error::{NetMetError, Result};
use super::event_table::{Column, EventTable};
use polars::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Name of an exported column: either the two-level `(label, field)` pair
/// (`("Jet_0", "pt")`) or a single joined string (`"Jet_0_pt"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnName {
    Structured(String, String),
    Joined(String),
}

impl ColumnName {
    pub fn joined(&self) -> String {
        match self {
            ColumnName::Structured(label, field) => format!("{label}_{field}"),
            ColumnName::Joined(name) => name.clone(),
        }
    }
}

/// Wide table with one scalar column per (object index, field), in a fixed order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatTable {
    columns: Vec<(ColumnName, Vec<f64>)>,
    rows: usize,
}

impl FlatTable {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn names(&self) -> Vec<&ColumnName> {
        self.columns.iter().map(|(name, _)| name).collect()
    }

    pub fn joined_names(&self) -> Vec<String> {
        self.columns.iter().map(|(name, _)| name.joined()).collect()
    }

    pub fn push(&mut self, name: ColumnName, values: Vec<f64>) -> Result<()> {
        if !self.columns.is_empty() && values.len() != self.rows {
            return Err(NetMetError::ShapeMismatch(format!(
                "column '{}' has {} rows, table has {}",
                name.joined(),
                values.len(),
                self.rows
            )));
        }
        self.rows = values.len();
        self.columns.push((name, values));
        Ok(())
    }

    /// Looks a column up by its joined name, whichever form it is stored in.
    pub fn get(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .iter()
            .find(|(key, _)| key.joined() == name)
            .map(|(_, values)| values.as_slice())
            .ok_or_else(|| NetMetError::MissingColumn(name.to_owned()))
    }

    pub fn filter_rows(&self, mask: &[bool]) -> Result<FlatTable> {
        if mask.len() != self.rows {
            return Err(NetMetError::ShapeMismatch(format!(
                "event mask has {} entries, table has {} rows",
                mask.len(),
                self.rows
            )));
        }
        Ok(FlatTable {
            columns: self
                .columns
                .iter()
                .map(|(name, values)| {
                    let kept = values
                        .iter()
                        .zip(mask)
                        .filter(|(_, keep)| **keep)
                        .map(|(v, _)| *v)
                        .collect();
                    (name.clone(), kept)
                })
                .collect(),
            rows: mask.iter().filter(|keep| **keep).count(),
        })
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let columns: Vec<polars::prelude::Column> = self
            .columns
            .iter()
            .map(|(name, values)| polars::prelude::Column::new(name.joined().into(), values))
            .collect();
        Ok(DataFrame::new_infer_height(columns)?)
    }
}

fn field_of(column: &str) -> &str {
    column.split('_').nth(1).unwrap_or(column)
}

/// Per-event object order: highest pt first.
fn pt_order(pt: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..pt.len()).collect();
    order.sort_by(|&a, &b| pt[b].partial_cmp(&pt[a]).unwrap_or(Ordering::Equal));
    order
}

fn flatten_collection(
    name: &str,
    collection: &EventTable,
    n_obj: usize,
) -> Result<Vec<(ColumnName, Vec<f64>)>> {
    let multi = is_multi_object(name);
    let pt_column = collection
        .column_names()
        .into_iter()
        .find(|column| field_of(column) == "pt");

    let orders: Option<Vec<Vec<usize>>> = match (&pt_column, multi) {
        (Some(pt), true) => Some(collection.jagged(pt)?.iter().map(|row| pt_order(row)).collect()),
        (None, true) => return Err(NetMetError::MissingColumn(format!("{name}_pt"))),
        (_, false) => None,
    };

    let mut flat = Vec::new();
    for column in collection.column_names() {
        let field = field_of(&column).to_owned();
        let rows: Vec<Vec<f64>> = match collection.column(&column)? {
            Column::Jagged(values) => values.clone(),
            Column::Scalar(values) => values.iter().map(|v| vec![*v]).collect(),
        };

        let (width, fill) = match &orders {
            Some(_) => (n_obj, 0.0),
            None => (rows.iter().map(Vec::len).max().unwrap_or(0), f64::NAN),
        };

        let mut per_index = vec![Vec::with_capacity(rows.len()); width];
        for (event, row) in rows.iter().enumerate() {
            for (index, slot) in per_index.iter_mut().enumerate() {
                let source = match &orders {
                    Some(orders) => {
                        let order = &orders[event];
                        if order.len() != row.len() {
                            return Err(NetMetError::ShapeMismatch(format!(
                                "'{column}' has {} objects in event {event}, pt has {}",
                                row.len(),
                                order.len()
                            )));
                        }
                        order.get(index).copied()
                    }
                    None => Some(index),
                };
                slot.push(source.and_then(|i| row.get(i).copied()).unwrap_or(fill));
            }
        }

        for (index, values) in per_index.into_iter().enumerate() {
            flat.push((
                ColumnName::Structured(format!("{name}_{index}"), field.clone()),
                values,
            ));
        }
    }

    Ok(flat)
}

/// Flattens named collections into one wide table.
///
/// Multi-object collections (`Jet`, `EG`, `Tau`) are sorted by pt descending
/// and padded or truncated to `n_obj` objects, empty slots zero-filled. Other
/// collections keep their entries as they are. Columns are sorted by
/// `(label, field)`; unless `keep_struct` is set the two-level names are then
/// joined into `<label>_<field>`. All collections must have the same number of
/// events.
pub fn make_dataframe(
    collections: &BTreeMap<String, EventTable>,
    n_obj: usize,
    keep_struct: bool,
) -> Result<FlatTable> {
    let mut rows: Option<(String, usize)> = None;
    let mut columns = Vec::new();

    for (name, collection) in collections {
        match &rows {
            Some((first, n)) if *n != collection.rows() => {
                return Err(NetMetError::ShapeMismatch(format!(
                    "collection '{}' has {} events, '{}' has {}",
                    name,
                    collection.rows(),
                    first,
                    n
                )));
            }
            Some(_) => (),
            None => rows = Some((name.clone(), collection.rows())),
        }
        columns.extend(flatten_collection(name, collection, n_obj)?);
    }

    columns.sort_by(|a, b| a.0.cmp(&b.0));

    let mut table = FlatTable::default();
    for (name, values) in columns {
        let name = if keep_struct {
            name
        } else {
            ColumnName::Joined(name.joined())
        };
        table.push(name, values)?;
    }
    if let Some((_, n)) = rows {
        table.rows = n;
    }

    log::info!(
        "Flattened {} collections into {} columns over {} events",
        collections.len(),
        table.columns.len(),
        table.rows
    );
    Ok(table)
}

/// Auxiliary label table (offline MET, pileup, ...) from scalar event columns.
pub fn array_to_table(table: &EventTable) -> Result<FlatTable> {
    let mut flat = FlatTable::default();
    for name in table.column_names() {
        let values = table.scalar(&name)?.to_vec();
        flat.push(ColumnName::Joined(name), values)?;
    }
    Ok(flat)
}
