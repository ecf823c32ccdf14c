use super::branches::MULTI_OBJECT_TYPES;
use super::cuts::SATURATION_PT;
use super::error::Result;
use super::flattener::FlattenSource;
use super::loader::DEFAULT_TREE;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Efficiency of one online column against the offline MET.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyRequest {
    /// Joined column name in the `online` table, e.g. `methf_0_pt`.
    pub online: String,
    pub threshold: f64,
    pub bin_width: f64,
    pub xmax: f64,
    pub output: PathBuf,
}

/// Threshold on one online column that brings the rate under `target_rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRequest {
    pub online: String,
    pub bins: usize,
    pub scale: f64,
    pub target_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub files: Vec<PathBuf>,
    pub n_files: usize,
    pub tree: String,

    pub objects: Vec<String>,
    pub sums: Vec<String>,
    pub use_emu: bool,
    pub use_mp: bool,

    pub snapshot: Option<PathBuf>,
    pub output: PathBuf,
    pub n_obj: usize,
    pub keep_struct: bool,

    pub pt_cut: f64,
    pub saturation_limit: f64,
    pub flatten: Vec<FlattenSource>,
    pub seed: Option<u64>,

    pub efficiency: Vec<EfficiencyRequest>,
    pub rates: Vec<RateRequest>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            n_files: 1,
            tree: DEFAULT_TREE.to_owned(),
            objects: MULTI_OBJECT_TYPES.iter().map(|o| (*o).to_owned()).collect(),
            sums: vec!["methf".to_owned(), "ntt".to_owned()],
            use_emu: false,
            use_mp: false,
            snapshot: None,
            output: PathBuf::from("netmet_output"),
            n_obj: 4,
            keep_struct: false,
            pt_cut: -1.0,
            saturation_limit: SATURATION_PT,
            flatten: Vec::new(),
            seed: None,
            efficiency: Vec::new(),
            rates: Vec::new(),
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_reader(File::open(path)?)?;
        log::info!("Loaded pipeline config from {path:?}");
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn has_jets(&self) -> bool {
        self.objects.iter().any(|o| o == "Jet")
    }
}
