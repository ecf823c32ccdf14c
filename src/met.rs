use super::branches::{MUON_BRANCHES, PUPPI_MET_BRANCHES};
use super::error::{NetMetError, Result};
use super::event_table::{Column, EventTable};
use nalgebra::Vector2;

pub const MET_PT: &str = "PuppiMET_pt";
const MET_PHI: &str = "PuppiMET_phi";
const MUON_PT: &str = "Muon_pt";
const MUON_PHI: &str = "Muon_phi";
const MUON_IS_PF: &str = "Muon_isPFcand";

/// Transverse momentum vector from magnitude and azimuth.
pub fn transverse(pt: f64, phi: f64) -> Vector2<f64> {
    Vector2::new(pt * phi.cos(), pt * phi.sin())
}

/// Offline PUPPI MET with and without the particle-flow muons.
///
/// Returns `(met, met_no_mu)`, both holding only `PuppiMET_pt` and aligned
/// row-for-row with `events`. Muons with `isPFcand == 1` are added back to the
/// MET vector; an event without such muons keeps its original magnitude.
pub fn puppi_met(events: &EventTable) -> Result<(EventTable, EventTable)> {
    let met = events.select(&PUPPI_MET_BRANCHES)?;
    let met_pt = met.scalar(MET_PT)?;
    let met_phi = met.scalar(MET_PHI)?;

    let muons = events.select(&MUON_BRANCHES)?;
    let pf_mask: Vec<Vec<bool>> = muons
        .jagged(MUON_IS_PF)?
        .iter()
        .map(|row| row.iter().map(|flag| *flag == 1.0).collect())
        .collect();
    let mut muons = muons.filter_objects(&pf_mask)?;
    muons.remove(MUON_IS_PF)?;

    let muon_pt = muons.jagged(MUON_PT)?;
    let muon_phi = muons.jagged(MUON_PHI)?;
    if muon_pt.len() != met_pt.len() {
        return Err(NetMetError::ShapeMismatch(format!(
            "muon collection has {} events, MET has {}",
            muon_pt.len(),
            met_pt.len()
        )));
    }

    let no_mu_pt: Vec<f64> = met_pt
        .iter()
        .zip(met_phi)
        .zip(muon_pt.iter().zip(muon_phi))
        .map(|((&pt, &phi), (mu_pt, mu_phi))| {
            let muon_sum: Vector2<f64> = mu_pt
                .iter()
                .zip(mu_phi)
                .map(|(&p, &f)| transverse(p, f))
                .sum();
            (transverse(pt, phi) + muon_sum).norm()
        })
        .collect();

    let mut met_only = EventTable::new();
    met_only.insert(MET_PT, Column::Scalar(met_pt.to_vec()))?;

    let mut met_no_mu = EventTable::new();
    met_no_mu.insert(MET_PT, Column::Scalar(no_mu_pt))?;

    log::info!("Computed PUPPI MET (no mu) for {} events", met_no_mu.rows());
    Ok((met_only, met_no_mu))
}
