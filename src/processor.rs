use super::branches::{RECO_BRANCHES, source_branches};
use super::collections::get_collections;
use super::config::PipelineConfig;
use super::cuts::{apply_pt_cut, remove_saturated};
use super::error::Result;
use super::event_table::EventTable;
use super::exporter::{FlatTable, array_to_table, make_dataframe};
use super::flattener::flatten;
use super::histoer::efficiency::{efficiency, get_thresh_for_rate, rates_for_thresholds};
use super::kinematics::{add_four_jet_mass, add_three_jet_mass};
use super::loader::{EventLoader, load_snapshot};
use super::met::{MET_PT, puppi_met};
use super::sink::{ParquetStore, TableSink, WriteMode};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Instant;

pub const ONLINE_KEY: &str = "online";
pub const OFFLINE_KEY: &str = "offline";
pub const OFFLINE_MU_KEY: &str = "offline_mu";
pub const RECO_KEY: &str = "reco";

// Uncorrected MET while the label tables are filtered together.
const MET_MU_PT: &str = "PuppiMET_mu_pt";

/// Row-aligned tables produced by one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub online: FlatTable,
    /// Offline PUPPI MET with the PF muons added back.
    pub offline: EventTable,
    /// Offline PUPPI MET as stored.
    pub offline_mu: EventTable,
    pub reco: EventTable,
}

pub struct Processor {
    pub config: PipelineConfig,
}

impl Processor {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Reads the configured ROOT files. With no input files and a snapshot path
    /// set, the snapshot is read back instead.
    pub fn load(&self) -> Result<EventTable> {
        let config = &self.config;
        if config.files.is_empty() {
            if let Some(snapshot) = &config.snapshot {
                return load_snapshot(snapshot);
            }
        }

        let branches = source_branches(&config.objects, config.use_emu, config.use_mp);
        EventLoader::new(&config.files, config.n_files)
            .with_tree(&config.tree)
            .load_and_save(&branches, config.snapshot.as_deref())
    }

    /// Every stage after loading, on an in-memory event table.
    pub fn process(&self, events: &EventTable, rng: &mut StdRng) -> Result<PipelineOutput> {
        let config = &self.config;
        let start = Instant::now();

        let (_, met_no_mu) = puppi_met(events)?;
        let (events, met_no_mu) = apply_pt_cut(events, &met_no_mu, config.pt_cut)?;
        let (events, _) = flatten(&events, &met_no_mu, &config.flatten, rng)?;

        let (mut met, met_no_mu) = puppi_met(&events)?;
        let collections = get_collections(&events, &config.sums, &config.objects)?;

        let mut online = make_dataframe(&collections, config.n_obj, config.keep_struct)?;
        if config.has_jets() {
            if config.n_obj >= 4 {
                add_four_jet_mass(&mut online)?;
            }
            if config.n_obj >= 3 {
                add_three_jet_mass(&mut online)?;
            }
        }

        let mut labels = met_no_mu;
        labels.insert(MET_MU_PT, met.remove(MET_PT)?)?;
        for name in RECO_BRANCHES {
            labels.insert(name, events.column(name)?.clone())?;
        }
        let (online, labels) = remove_saturated(&online, &labels, config.saturation_limit)?;

        let offline_mu = labels.select(&[MET_MU_PT])?.rename_with(|name| {
            if name == MET_MU_PT {
                MET_PT.to_owned()
            } else {
                name.to_owned()
            }
        })?;

        let output = PipelineOutput {
            online,
            offline: labels.select(&[MET_PT])?,
            offline_mu,
            reco: labels.select(&RECO_BRANCHES)?,
        };

        log::info!(
            "Processed {} input events into {} output events in {:?}",
            events.rows(),
            output.online.rows(),
            start.elapsed()
        );
        Ok(output)
    }

    /// Writes the feature table fresh, then appends the label tables.
    pub fn write(&self, output: &PipelineOutput, sink: &mut dyn TableSink) -> Result<()> {
        sink.write(ONLINE_KEY, &output.online, WriteMode::Create)?;
        sink.write(OFFLINE_KEY, &array_to_table(&output.offline)?, WriteMode::Append)?;
        sink.write(
            OFFLINE_MU_KEY,
            &array_to_table(&output.offline_mu)?,
            WriteMode::Append,
        )?;
        sink.write(RECO_KEY, &array_to_table(&output.reco)?, WriteMode::Append)?;
        Ok(())
    }

    /// Efficiency curves and rate thresholds requested in the config. Returns
    /// the threshold found for each rate request, in order.
    pub fn report(&self, output: &PipelineOutput) -> Result<Vec<usize>> {
        let offline = output.offline.scalar(MET_PT)?;

        for request in &self.config.efficiency {
            let online = output.online.get(&request.online)?;
            let curve = efficiency(
                online,
                offline,
                request.threshold,
                request.bin_width,
                request.xmax,
            )?;
            curve.write_json(&request.output)?;
        }

        let mut thresholds = Vec::with_capacity(self.config.rates.len());
        for request in &self.config.rates {
            let rates = rates_for_thresholds(
                output.online.get(&request.online)?,
                request.bins,
                request.scale,
            );
            let threshold = get_thresh_for_rate(&rates, request.bins, request.target_rate);
            log::info!(
                "{}: threshold {} for rate below {}",
                request.online,
                threshold,
                request.target_rate
            );
            thresholds.push(threshold);
        }

        Ok(thresholds)
    }

    pub fn run(&self) -> Result<()> {
        let events = self.load()?;
        let mut rng = self.rng();
        let output = self.process(&events, &mut rng)?;

        let mut store = ParquetStore::new(&self.config.output)?;
        self.write(&output, &mut store)?;
        self.report(&output)?;
        Ok(())
    }
}
