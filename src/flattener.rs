use super::collections::get_sum;
use super::error::{NetMetError, Result};
use super::event_table::EventTable;
use super::met::MET_PT;
use rand::Rng;
use serde::{Deserialize, Serialize};

// Parameters of the emulated trigger rate curve.
const CUTOFF: f64 = 800.0;
const A: f64 = 0.88;
const B: f64 = 0.06;
const C: f64 = 0.01;

/// L1 sum used when flattening on the online MET.
pub const L1_FLATTEN_SUM: &str = "methf";

/// Which pt spectrum drives the acceptance filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlattenSource {
    /// Offline PUPPI MET with muons added back.
    Puppi,
    /// Online `methf` energy sum.
    L1,
}

/// True if an event with the given pt survives a draw in [0, 1).
pub fn accept(pt: f64, draw: f64) -> bool {
    draw * (A - pt.powf(B) / CUTOFF.powf(B)) < C
}

/// One draw per event, in event order. Events with pt <= 0 always pass.
pub fn acceptance_mask<R: Rng>(pt: &[f64], rng: &mut R) -> Vec<bool> {
    pt.iter()
        .map(|&pt| {
            let draw: f64 = rng.random();
            pt <= 0.0 || accept(pt, draw)
        })
        .collect()
}

fn l1_met(events: &EventTable) -> Result<Vec<f64>> {
    let sum = get_sum(events, L1_FLATTEN_SUM)?;
    Ok(sum
        .jagged("EtSum_pt")?
        .iter()
        .map(|row| row.first().copied().unwrap_or(0.0))
        .collect())
}

/// Downsamples events along an emulated rate curve, keeping `events` and the
/// reference MET table row-aligned. Sources are applied in the order given.
pub fn flatten<R: Rng>(
    events: &EventTable,
    reference: &EventTable,
    sources: &[FlattenSource],
    rng: &mut R,
) -> Result<(EventTable, EventTable)> {
    if events.rows() != reference.rows() {
        return Err(NetMetError::ShapeMismatch(format!(
            "event table has {} events, reference MET has {}",
            events.rows(),
            reference.rows()
        )));
    }

    let mut events = events.clone();
    let mut reference = reference.clone();
    for source in sources {
        let pt = match source {
            FlattenSource::Puppi => reference.scalar(MET_PT)?.to_vec(),
            FlattenSource::L1 => l1_met(&events)?,
        };
        let mask = acceptance_mask(&pt, rng);
        let before = events.rows();
        events = events.filter_rows(&mask)?;
        reference = reference.filter_rows(&mask)?;
        log::info!(
            "Flattened on {:?}: kept {} of {} events",
            source,
            events.rows(),
            before
        );
    }

    Ok((events, reference))
}
