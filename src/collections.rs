use super::branches::{SUM_BRANCHES, object_columns, sum_code};
use super::error::Result;
use super::event_table::EventTable;
use std::collections::BTreeMap;

const SUM_TYPE: &str = "EtSum_etSumType";
const SUM_BX: &str = "EtSum_bx";

fn mask_equal(values: &[Vec<f64>], target: f64) -> Vec<Vec<bool>> {
    values
        .iter()
        .map(|row| row.iter().map(|v| *v == target).collect())
        .collect()
}

/// Keeps the objects of `table` in bunch crossing 0 and drops the `bx` column.
fn in_time(table: &EventTable, bx_column: &str) -> Result<EventTable> {
    let mask = mask_equal(table.jagged(bx_column)?, 0.0);
    let mut filtered = table.filter_objects(&mask)?;
    filtered.remove(bx_column)?;
    Ok(filtered)
}

/// In-time L1 energy sums, still carrying the sum-type discriminator.
fn l1_sums(events: &EventTable) -> Result<EventTable> {
    in_time(&events.select(&SUM_BRANCHES)?, SUM_BX)
}

fn select_sum(sums: &EventTable, code: i32) -> Result<EventTable> {
    let mask = mask_equal(sums.jagged(SUM_TYPE)?, f64::from(code));
    let mut sum = sums.filter_objects(&mask)?;
    sum.remove(SUM_TYPE)?;
    Ok(sum)
}

/// One named in-time energy sum (`EtSum_pt` only).
pub fn get_sum(events: &EventTable, name: &str) -> Result<EventTable> {
    let code = sum_code(name)?;
    select_sum(&l1_sums(events)?, code)
}

/// Splits the event table into the requested sum and object collections.
///
/// Every collection is an independent copy restricted to bunch crossing 0. Sum
/// names must be in the catalog and object columns must be present; nothing
/// requested is silently skipped.
pub fn get_collections(
    events: &EventTable,
    sums: &[String],
    objects: &[String],
) -> Result<BTreeMap<String, EventTable>> {
    let codes = sums
        .iter()
        .map(|name| sum_code(name).map(|code| (name, code)))
        .collect::<Result<Vec<_>>>()?;

    let mut collections = BTreeMap::new();

    if !codes.is_empty() {
        let l1_sums = l1_sums(events)?;
        for (name, code) in codes {
            collections.insert(name.clone(), select_sum(&l1_sums, code)?);
        }
    }

    for object in objects {
        let columns = object_columns(object);
        let collection = in_time(&events.select(&columns)?, &format!("{object}_bx"))?;
        collections.insert(object.clone(), collection);
    }

    log::info!(
        "Built {} collections: {:?}",
        collections.len(),
        collections.keys().collect::<Vec<_>>()
    );
    Ok(collections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetMetError;
    use crate::event_table::Column;

    fn events() -> EventTable {
        let mut table = EventTable::new();
        table
            .insert(
                "EtSum_pt",
                Column::Jagged(vec![vec![100.0, 40.0, 41.0, 55.0], vec![90.0, 30.0]]),
            )
            .unwrap();
        table
            .insert(
                "EtSum_etSumType",
                Column::Jagged(vec![vec![0.0, 2.0, 2.0, 8.0], vec![0.0, 2.0]]),
            )
            .unwrap();
        table
            .insert(
                "EtSum_bx",
                Column::Jagged(vec![vec![0.0, 0.0, -1.0, 0.0], vec![0.0, 0.0]]),
            )
            .unwrap();
        table
            .insert("Jet_pt", Column::Jagged(vec![vec![50.0, 20.0], vec![70.0]]))
            .unwrap();
        table
            .insert("Jet_eta", Column::Jagged(vec![vec![0.1, 0.2], vec![0.3]]))
            .unwrap();
        table
            .insert("Jet_phi", Column::Jagged(vec![vec![1.0, 2.0], vec![3.0]]))
            .unwrap();
        table
            .insert("Jet_bx", Column::Jagged(vec![vec![0.0, 1.0], vec![0.0]]))
            .unwrap();
        table
    }

    #[test]
    fn sums_are_split_by_type_in_time() {
        let collections =
            get_collections(&events(), &["met".to_owned(), "methf".to_owned()], &[]).unwrap();

        let met = &collections["met"];
        assert_eq!(met.column_names(), vec!["EtSum_pt".to_owned()]);
        assert_eq!(met.jagged("EtSum_pt").unwrap(), &[vec![40.0], vec![30.0]]);

        let methf = &collections["methf"];
        assert_eq!(methf.jagged("EtSum_pt").unwrap(), &[vec![55.0], vec![]]);
    }

    #[test]
    fn objects_are_restricted_to_bx_zero() {
        let collections = get_collections(&events(), &[], &["Jet".to_owned()]).unwrap();
        let jets = &collections["Jet"];
        assert!(!jets.contains("Jet_bx"));
        assert_eq!(jets.jagged("Jet_pt").unwrap(), &[vec![50.0], vec![70.0]]);
        assert_eq!(jets.jagged("Jet_phi").unwrap(), &[vec![1.0], vec![3.0]]);
    }

    #[test]
    fn unknown_sum_is_a_lookup_error() {
        let result = get_collections(&events(), &["nonsense".to_owned()], &[]);
        assert!(matches!(result, Err(NetMetError::Lookup(_))));
    }

    #[test]
    fn absent_object_columns_are_missing() {
        let result = get_collections(&events(), &[], &["Tau".to_owned()]);
        assert!(matches!(result, Err(NetMetError::MissingColumn(_))));
    }

    #[test]
    fn single_sum_lookup() {
        let methf = get_sum(&events(), "methf").unwrap();
        assert_eq!(methf.rows(), 2);
        assert_eq!(methf.jagged("EtSum_pt").unwrap()[0], vec![55.0]);
    }
}
