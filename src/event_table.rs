use super::error::{NetMetError, Result};
use polars::prelude::*;
use std::collections::BTreeMap;

/// One named column of an [`EventTable`]: a scalar per event, or a
/// variable-length list of object values per event.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Scalar(Vec<f64>),
    Jagged(Vec<Vec<f64>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Scalar(values) => values.len(),
            Column::Jagged(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn filter_rows(&self, mask: &[bool]) -> Column {
        match self {
            Column::Scalar(values) => Column::Scalar(
                values
                    .iter()
                    .zip(mask)
                    .filter(|(_, keep)| **keep)
                    .map(|(v, _)| *v)
                    .collect(),
            ),
            Column::Jagged(values) => Column::Jagged(
                values
                    .iter()
                    .zip(mask)
                    .filter(|(_, keep)| **keep)
                    .map(|(v, _)| v.clone())
                    .collect(),
            ),
        }
    }

    fn append(&mut self, other: Column, name: &str) -> Result<()> {
        match (self, other) {
            (Column::Scalar(a), Column::Scalar(b)) => a.extend(b),
            (Column::Jagged(a), Column::Jagged(b)) => a.extend(b),
            _ => {
                return Err(NetMetError::ShapeMismatch(format!(
                    "column '{name}' is scalar in one table and jagged in the other"
                )));
            }
        }
        Ok(())
    }

    fn to_polars(&self, name: &str) -> polars::prelude::Column {
        match self {
            Column::Scalar(values) => polars::prelude::Column::new(name.into(), values),
            Column::Jagged(values) => {
                let rows: Vec<Series> = values
                    .iter()
                    .map(|row| Series::new(PlSmallStr::EMPTY, row))
                    .collect();
                polars::prelude::Column::new(name.into(), rows)
            }
        }
    }
}

/// Columnar per-event table. Columns are kept in a sorted map so they always
/// come out in the same order, and every column has exactly `rows` entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    columns: BTreeMap<String, Column>,
    rows: usize,
}

impl EventTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Adds (or replaces) a column. The first column fixes the row count.
    pub fn insert(&mut self, name: &str, column: Column) -> Result<()> {
        let only_self = self.columns.len() == 1 && self.columns.contains_key(name);
        if !self.columns.is_empty() && !only_self && column.len() != self.rows {
            return Err(NetMetError::ShapeMismatch(format!(
                "column '{}' has {} rows, table has {}",
                name,
                column.len(),
                self.rows
            )));
        }
        self.rows = column.len();
        self.columns.insert(name.to_owned(), column);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Column> {
        let column = self
            .columns
            .remove(name)
            .ok_or_else(|| NetMetError::MissingColumn(name.to_owned()))?;
        if self.columns.is_empty() {
            self.rows = 0;
        }
        Ok(column)
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .get(name)
            .ok_or_else(|| NetMetError::MissingColumn(name.to_owned()))
    }

    pub fn scalar(&self, name: &str) -> Result<&[f64]> {
        match self.column(name)? {
            Column::Scalar(values) => Ok(values),
            Column::Jagged(_) => Err(NetMetError::ShapeMismatch(format!(
                "column '{name}' holds per-object lists, expected one value per event"
            ))),
        }
    }

    pub fn jagged(&self, name: &str) -> Result<&[Vec<f64>]> {
        match self.column(name)? {
            Column::Jagged(values) => Ok(values),
            Column::Scalar(_) => Err(NetMetError::ShapeMismatch(format!(
                "column '{name}' holds one value per event, expected per-object lists"
            ))),
        }
    }

    /// Copies the named columns into a new table.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<EventTable> {
        let mut selected = EventTable::new();
        for name in names {
            let name = name.as_ref();
            selected.insert(name, self.column(name)?.clone())?;
        }
        Ok(selected)
    }

    /// Keeps the events whose mask entry is true, in their original order.
    pub fn filter_rows(&self, mask: &[bool]) -> Result<EventTable> {
        if mask.len() != self.rows {
            return Err(NetMetError::ShapeMismatch(format!(
                "event mask has {} entries, table has {} rows",
                mask.len(),
                self.rows
            )));
        }
        Ok(EventTable {
            columns: self
                .columns
                .iter()
                .map(|(name, column)| (name.clone(), column.filter_rows(mask)))
                .collect(),
            rows: mask.iter().filter(|keep| **keep).count(),
        })
    }

    /// Keeps the objects whose mask entry is true inside every (jagged) column of
    /// the table. All columns must be length-aligned with the mask per event.
    pub fn filter_objects(&self, mask: &[Vec<bool>]) -> Result<EventTable> {
        if mask.len() != self.rows {
            return Err(NetMetError::ShapeMismatch(format!(
                "object mask has {} events, table has {} rows",
                mask.len(),
                self.rows
            )));
        }

        let mut filtered = EventTable::new();
        for (name, column) in &self.columns {
            let values = match column {
                Column::Jagged(values) => values,
                Column::Scalar(_) => {
                    return Err(NetMetError::ShapeMismatch(format!(
                        "cannot filter objects of scalar column '{name}'"
                    )));
                }
            };

            let mut kept = Vec::with_capacity(values.len());
            for (event, (row, row_mask)) in values.iter().zip(mask).enumerate() {
                if row.len() != row_mask.len() {
                    return Err(NetMetError::ShapeMismatch(format!(
                        "column '{}' has {} objects in event {}, mask has {}",
                        name,
                        row.len(),
                        event,
                        row_mask.len()
                    )));
                }
                kept.push(
                    row.iter()
                        .zip(row_mask)
                        .filter(|(_, keep)| **keep)
                        .map(|(v, _)| *v)
                        .collect::<Vec<f64>>(),
                );
            }
            filtered.insert(name, Column::Jagged(kept))?;
        }
        Ok(filtered)
    }

    /// Appends the events of `other` after the events of `self`. Both tables must
    /// carry the same columns with the same shapes.
    pub fn append(&mut self, other: EventTable) -> Result<()> {
        if self.columns.is_empty() {
            *self = other;
            return Ok(());
        }
        if self.column_names() != other.column_names() {
            return Err(NetMetError::ShapeMismatch(format!(
                "cannot concatenate tables with columns {:?} and {:?}",
                self.column_names(),
                other.column_names()
            )));
        }

        let added = other.rows;
        for (name, column) in other.columns {
            if let Some(existing) = self.columns.get_mut(&name) {
                existing.append(column, &name)?;
            }
        }
        self.rows += added;
        Ok(())
    }

    /// Renames every column through `rename`. Two columns collapsing onto one
    /// name is reported rather than silently merged.
    pub fn rename_with<F: Fn(&str) -> String>(self, rename: F) -> Result<EventTable> {
        let mut renamed = EventTable {
            columns: BTreeMap::new(),
            rows: self.rows,
        };
        for (name, column) in self.columns {
            let new_name = rename(&name);
            if renamed.columns.contains_key(&new_name) {
                return Err(NetMetError::ShapeMismatch(format!(
                    "columns '{name}' and another both map to '{new_name}'"
                )));
            }
            renamed.columns.insert(new_name, column);
        }
        Ok(renamed)
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let columns: Vec<polars::prelude::Column> = self
            .columns
            .iter()
            .map(|(name, column)| column.to_polars(name))
            .collect();
        Ok(DataFrame::new_infer_height(columns)?)
    }

    /// Inverse of [`EventTable::to_dataframe`]: numeric columns become scalar
    /// columns, list columns become jagged ones. Nulls are read as NaN.
    pub fn from_dataframe(df: &DataFrame) -> Result<EventTable> {
        let mut table = EventTable::new();
        for column in df.columns() {
            let series = column.as_materialized_series();
            let name = series.name().to_string();
            let parsed = match series.dtype() {
                DataType::List(_) => {
                    let lists = series.list()?;
                    let mut rows = Vec::with_capacity(lists.len());
                    for row in lists.into_iter() {
                        rows.push(match row {
                            Some(row) => series_to_vec(&row)?,
                            None => Vec::new(),
                        });
                    }
                    Column::Jagged(rows)
                }
                _ => Column::Scalar(series_to_vec(series)?),
            };
            table.insert(&name, parsed)?;
        }
        Ok(table)
    }
}

fn series_to_vec(series: &Series) -> Result<Vec<f64>> {
    let cast = series.cast(&DataType::Float64)?;
    Ok(cast
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EventTable {
        let mut table = EventTable::new();
        table
            .insert("PuppiMET_pt", Column::Scalar(vec![10.0, 20.0, 30.0]))
            .unwrap();
        table
            .insert(
                "Jet_pt",
                Column::Jagged(vec![vec![5.0, 4.0], vec![], vec![7.0]]),
            )
            .unwrap();
        table
    }

    #[test]
    fn insert_rejects_misaligned_columns() {
        let mut table = sample();
        let result = table.insert("Jet_eta", Column::Scalar(vec![1.0]));
        assert!(matches!(result, Err(NetMetError::ShapeMismatch(_))));
    }

    #[test]
    fn filter_rows_keeps_alignment() {
        let table = sample();
        let filtered = table.filter_rows(&[true, false, true]).unwrap();
        assert_eq!(filtered.rows(), 2);
        assert_eq!(filtered.scalar("PuppiMET_pt").unwrap(), &[10.0, 30.0]);
        assert_eq!(
            filtered.jagged("Jet_pt").unwrap(),
            &[vec![5.0, 4.0], vec![7.0]]
        );
        assert!(table.filter_rows(&[true]).is_err());
    }

    #[test]
    fn filter_objects_checks_per_event_lengths() {
        let table = sample().select(&["Jet_pt"]).unwrap();
        let kept = table
            .filter_objects(&[vec![false, true], vec![], vec![true]])
            .unwrap();
        assert_eq!(kept.jagged("Jet_pt").unwrap(), &[vec![4.0], vec![], vec![7.0]]);

        let bad = table.filter_objects(&[vec![true], vec![], vec![true]]);
        assert!(matches!(bad, Err(NetMetError::ShapeMismatch(_))));
    }

    #[test]
    fn missing_column_is_reported() {
        let table = sample();
        assert!(matches!(
            table.select(&["Tau_pt"]),
            Err(NetMetError::MissingColumn(_))
        ));
    }

    #[test]
    fn append_concatenates_events() {
        let mut table = sample();
        table.append(sample()).unwrap();
        assert_eq!(table.rows(), 6);
        assert_eq!(table.jagged("Jet_pt").unwrap()[3], vec![5.0, 4.0]);
    }

    #[test]
    fn dataframe_conversion_keeps_lists() {
        let table = sample();
        let df = table.to_dataframe().unwrap();
        assert_eq!(df.height(), 3);
        let back = EventTable::from_dataframe(&df).unwrap();
        assert_eq!(back, table);
    }
}
