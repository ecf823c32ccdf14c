use super::histogram1d::Histogram;
use crate::error::{NetMetError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Trigger efficiency as a function of the offline quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyCurve {
    pub threshold: f64,
    pub bin_width: f64,
    pub x: Vec<f64>,
    pub efficiency: Vec<f64>,
    pub uncertainty: Vec<f64>,
}

/// Number of bins of width `bin_width` needed to cover [0, xmax).
pub fn number_of_bins(bin_width: f64, xmax: f64) -> usize {
    (xmax / bin_width).ceil().max(0.0) as usize
}

fn efficiency_histograms(bin_width: f64, xmax: f64) -> Result<(Histogram, Histogram)> {
    if !bin_width.is_finite() || bin_width <= 0.0 {
        return Err(NetMetError::InvalidParameter(format!(
            "efficiency bin width must be finite and positive, got {bin_width}"
        )));
    }
    if !xmax.is_finite() || xmax <= 0.0 {
        return Err(NetMetError::InvalidParameter(format!(
            "efficiency xmax must be finite and positive, got {xmax}"
        )));
    }

    let bins = number_of_bins(bin_width, xmax);
    let range = (0.0, bins as f64 * bin_width);
    Ok((
        Histogram::new("numerator", bins, range),
        Histogram::new("denominator", bins, range),
    ))
}

/// Bayesian estimate of the spread of k passing out of n.
pub fn efficiency_uncertainty(k: u64, n: u64) -> f64 {
    let k = k as f64;
    let n = n as f64;
    let second = (k + 1.0) * (k + 2.0) / ((n + 2.0) * (n + 3.0));
    let first = (k + 1.0) / (n + 2.0);
    (second - first * first).sqrt()
}

impl EfficiencyCurve {
    fn from_histograms(
        numerator: &Histogram,
        denominator: &Histogram,
        threshold: f64,
    ) -> Self {
        let (efficiency, uncertainty) = numerator
            .bins
            .iter()
            .zip(&denominator.bins)
            .map(|(&k, &n)| (k as f64 / n as f64, efficiency_uncertainty(k, n)))
            .unzip();

        EfficiencyCurve {
            threshold,
            bin_width: denominator.bin_width,
            x: denominator.get_bin_centers(),
            efficiency,
            uncertainty,
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        log::info!("Wrote efficiency curve to {}", path.display());
        Ok(())
    }
}

/// Fraction of events with `online > threshold`, binned in `offline`.
///
/// Empty denominator bins give NaN.
pub fn efficiency(
    online: &[f64],
    offline: &[f64],
    threshold: f64,
    bin_width: f64,
    xmax: f64,
) -> Result<EfficiencyCurve> {
    if online.len() != offline.len() {
        return Err(NetMetError::ShapeMismatch(format!(
            "online has {} events, offline has {}",
            online.len(),
            offline.len()
        )));
    }

    let (mut numerator, mut denominator) = efficiency_histograms(bin_width, xmax)?;
    for (on, off) in online.iter().zip(offline) {
        denominator.fill(*off);
        if *on > threshold {
            numerator.fill(*off);
        }
    }

    Ok(EfficiencyCurve::from_histograms(
        &numerator,
        &denominator,
        threshold,
    ))
}

/// Same as [`efficiency`], with both columns read from a lazy frame.
pub fn efficiency_from_lazyframe(
    lf: LazyFrame,
    online_column: &str,
    offline_column: &str,
    threshold: f64,
    bin_width: f64,
    xmax: f64,
) -> Result<EfficiencyCurve> {
    let (mut numerator, mut denominator) = efficiency_histograms(bin_width, xmax)?;

    denominator.fill_from_lazyframe(lf.clone(), offline_column)?;
    numerator.fill_from_lazyframe(
        lf.filter(col(online_column).gt(lit(threshold))),
        offline_column,
    )?;

    Ok(EfficiencyCurve::from_histograms(
        &numerator,
        &denominator,
        threshold,
    ))
}

/// Rate above each integer threshold `0..bins`, as the fraction of events
/// strictly above it times `scale`.
pub fn rates_for_thresholds(values: &[f64], bins: usize, scale: f64) -> Vec<f64> {
    let total = values.len() as f64;
    (0..bins)
        .map(|threshold| {
            let threshold = threshold as f64;
            let passing = values.iter().filter(|v| **v > threshold).count();
            passing as f64 / total * scale
        })
        .collect()
}

/// First threshold index whose rate is below `target_rate`, or 0 if none is.
pub fn get_thresh_for_rate(rates: &[f64], bins: usize, target_rate: f64) -> usize {
    rates
        .iter()
        .take(bins)
        .position(|rate| *rate < target_rate)
        .unwrap_or(0)
}
