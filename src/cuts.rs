use super::error::{NetMetError, Result};
use super::event_table::EventTable;
use super::exporter::FlatTable;
use super::met::MET_PT;

/// Hardware saturation value for L1 object and sum pt.
pub const SATURATION_PT: f64 = 1000.0;

fn check_aligned(what: &str, rows: usize, reference: &EventTable) -> Result<()> {
    if rows != reference.rows() {
        return Err(NetMetError::ShapeMismatch(format!(
            "{} has {} events, reference MET has {}",
            what,
            rows,
            reference.rows()
        )));
    }
    Ok(())
}

/// Keeps the events whose reference MET pt is strictly above `cut`.
pub fn apply_pt_cut(
    events: &EventTable,
    reference: &EventTable,
    cut: f64,
) -> Result<(EventTable, EventTable)> {
    check_aligned("event table", events.rows(), reference)?;
    let mask: Vec<bool> = reference.scalar(MET_PT)?.iter().map(|pt| *pt > cut).collect();

    let kept = (events.filter_rows(&mask)?, reference.filter_rows(&mask)?);
    log::info!(
        "MET pt > {cut}: kept {} of {} events",
        kept.0.rows(),
        events.rows()
    );
    Ok(kept)
}

/// Drops every event where any exported column with `pt` in its name is not
/// below `limit`. Missing (NaN) values count as not below the limit.
pub fn remove_saturated(
    flat: &FlatTable,
    reference: &EventTable,
    limit: f64,
) -> Result<(FlatTable, EventTable)> {
    check_aligned("exported table", flat.rows(), reference)?;

    let mut mask = vec![true; flat.rows()];
    for name in flat.joined_names() {
        if !name.contains("pt") {
            continue;
        }
        for (keep, value) in mask.iter_mut().zip(flat.get(&name)?) {
            *keep &= *value < limit;
        }
    }

    let kept = (flat.filter_rows(&mask)?, reference.filter_rows(&mask)?);
    log::info!(
        "Removed {} saturated events",
        flat.rows() - kept.0.rows()
    );
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_table::Column;
    use crate::exporter::ColumnName;

    fn reference(pt: Vec<f64>) -> EventTable {
        let mut table = EventTable::new();
        table.insert(MET_PT, Column::Scalar(pt)).unwrap();
        table
    }

    #[test]
    fn pt_cut_filters_both_tables() {
        let mut events = EventTable::new();
        events
            .insert("Jet_pt", Column::Jagged(vec![vec![1.0], vec![2.0], vec![3.0]]))
            .unwrap();
        let (events, met) = apply_pt_cut(&events, &reference(vec![10.0, 30.0, 20.0]), 15.0).unwrap();
        assert_eq!(events.jagged("Jet_pt").unwrap(), &[vec![2.0], vec![3.0]]);
        assert_eq!(met.scalar(MET_PT).unwrap(), &[30.0, 20.0]);
    }

    #[test]
    fn default_cut_keeps_everything() {
        let events = reference(vec![0.0, 5.0]);
        let (kept, _) = apply_pt_cut(&events, &reference(vec![0.0, 5.0]), -1.0).unwrap();
        assert_eq!(kept.rows(), 2);
    }

    #[test]
    fn saturated_events_are_removed() {
        let mut flat = FlatTable::default();
        flat.push(ColumnName::Joined("Jet_0_pt".to_owned()), vec![100.0, 1023.0, 50.0])
            .unwrap();
        flat.push(ColumnName::Joined("Jet_0_eta".to_owned()), vec![5000.0, 0.0, 0.0])
            .unwrap();
        flat.push(ColumnName::Joined("methf_0_pt".to_owned()), vec![20.0, 20.0, 1000.0])
            .unwrap();

        let (flat, met) =
            remove_saturated(&flat, &reference(vec![1.0, 2.0, 3.0]), SATURATION_PT).unwrap();
        assert_eq!(flat.rows(), 1);
        assert_eq!(flat.get("Jet_0_eta").unwrap(), &[5000.0]);
        assert_eq!(met.scalar(MET_PT).unwrap(), &[1.0]);
    }

    #[test]
    fn misaligned_reference_is_rejected() {
        let events = reference(vec![1.0, 2.0]);
        assert!(matches!(
            apply_pt_cut(&events, &reference(vec![1.0]), 0.0),
            Err(NetMetError::ShapeMismatch(_))
        ));
    }
}
