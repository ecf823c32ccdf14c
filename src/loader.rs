use super::branches::strip_source_prefix;
use super::error::{NetMetError, Result, root_error};
use super::event_table::{Column, EventTable};
use indicatif::{ProgressBar, ProgressStyle};
use oxyroot::{Branch, ReaderTree, RootFile, Slice};
use polars::prelude::*;
use rayon::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const DEFAULT_TREE: &str = "Events";

/// Reads a bounded number of ROOT files into one [`EventTable`].
pub struct EventLoader {
    pub files: Vec<PathBuf>,
    pub tree: String,
}

impl EventLoader {
    /// Keeps at most `n_files` of the given inputs, in the order given.
    pub fn new(files: &[PathBuf], n_files: usize) -> Self {
        let files: Vec<PathBuf> = files.iter().take(n_files).cloned().collect();
        log::info!("Files {files:?}");
        Self {
            files,
            tree: DEFAULT_TREE.to_owned(),
        }
    }

    pub fn with_tree(mut self, tree: &str) -> Self {
        self.tree = tree.to_owned();
        self
    }

    /// Reads `branches` from every file, concatenates the events in file order and
    /// strips the source-stage prefixes from the column names. A branch missing
    /// from any file fails the whole load.
    pub fn load(&self, branches: &[String]) -> Result<EventTable> {
        let start = Instant::now();

        let progress = ProgressBar::new(self.files.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} files")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        progress.set_message(format!("Reading {}", self.tree));

        let tables: Vec<EventTable> = self
            .files
            .par_iter()
            .map(|file| {
                let table = read_file(file, &self.tree, branches);
                progress.inc(1);
                table
            })
            .collect::<Result<Vec<EventTable>>>()?;
        progress.finish_and_clear();

        let mut combined = EventTable::new();
        for table in tables {
            combined.append(table)?;
        }
        let combined = combined.rename_with(strip_source_prefix)?;

        log::info!(
            "Loaded {} events with {} columns from {} files in {:?}",
            combined.rows(),
            combined.column_names().len(),
            self.files.len(),
            start.elapsed()
        );

        Ok(combined)
    }

    /// Loads the branches and, when `output_path` is given, also persists the
    /// combined table as a parquet snapshot.
    pub fn load_and_save(&self, branches: &[String], output_path: Option<&Path>) -> Result<EventTable> {
        let table = self.load(branches)?;
        if let Some(path) = output_path {
            save_snapshot(&table, path)?;
        }
        Ok(table)
    }
}

pub fn save_snapshot(table: &EventTable, output_path: &Path) -> Result<()> {
    let mut df = table.to_dataframe()?;

    let file = File::create(output_path)?;
    ParquetWriter::new(file)
        .set_parallel(true)
        .finish(&mut df)?;

    log::info!("Saved event snapshot to {output_path:?}");
    Ok(())
}

pub fn load_snapshot(path: &Path) -> Result<EventTable> {
    let file = File::open(path)?;
    let df = ParquetReader::new(file).finish()?;
    let table = EventTable::from_dataframe(&df)?;
    log::info!("Loaded snapshot {path:?} with {} events", table.rows());
    Ok(table)
}

fn read_file(path: &Path, tree_name: &str, branches: &[String]) -> Result<EventTable> {
    let mut file = RootFile::open(path)
        .map_err(|err| root_error(&format!("Failed to open ROOT file '{}'", path.display()), err))?;
    let tree = file
        .get_tree(tree_name)
        .map_err(|err| root_error(&format!("Failed to open ROOT tree '{tree_name}'"), err))?;

    let mut table = EventTable::new();
    for name in branches {
        let branch = tree.branch(name).ok_or_else(|| {
            NetMetError::MissingColumn(format!("{} (in {})", name, path.display()))
        })?;
        let column = read_branch(&tree, branch, name)?;
        table.insert(name, column)?;
    }

    log::info!("Read {} events from {}", table.rows(), path.display());
    Ok(table)
}

trait AsF64 {
    fn as_f64(self) -> f64;
}

macro_rules! impl_as_f64 {
    ($($t:ty),*) => {
        $(impl AsF64 for $t {
            fn as_f64(self) -> f64 {
                self as f64
            }
        })*
    };
}

impl_as_f64!(f32, f64, i8, u8, i16, u16, i32, u32, i64, u64);

impl AsF64 for bool {
    fn as_f64(self) -> f64 {
        f64::from(u8::from(self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeafKind {
    Bool,
    F32,
    F64,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
}

fn leaf_kind(type_name: &str) -> Option<LeafKind> {
    let lower = type_name.to_ascii_lowercase();
    let kind = if lower.contains("bool") {
        LeafKind::Bool
    } else if lower.contains("double") {
        LeafKind::F64
    } else if lower.contains("float") {
        LeafKind::F32
    } else if lower.contains("uchar") || lower.contains("uint8") || lower.contains("unsigned char") {
        LeafKind::U8
    } else if lower.contains("char") || lower.contains("int8") {
        LeafKind::I8
    } else if lower.contains("ushort") || lower.contains("uint16") || lower.contains("unsigned short")
    {
        LeafKind::U16
    } else if lower.contains("short") || lower.contains("int16") {
        LeafKind::I16
    } else if lower.contains("ulong") || lower.contains("uint64") || lower.contains("unsigned long")
    {
        LeafKind::U64
    } else if lower.contains("long") || lower.contains("int64") {
        LeafKind::I64
    } else if lower.contains("uint") || lower.contains("unsigned") {
        LeafKind::U32
    } else if lower.contains("int") {
        LeafKind::I32
    } else {
        return None;
    };
    Some(kind)
}

// NanoAOD stores per-object branches as C arrays sized by an `n<Collection>` counter.
fn is_jagged(tree: &ReaderTree, branch: &Branch, name: &str) -> bool {
    if branch.item_type_name().contains('[') {
        return true;
    }
    match name.split_once('_') {
        Some((collection, _)) => tree.branch(&format!("n{collection}")).is_some(),
        None => false,
    }
}

macro_rules! read_values {
    ($branch:expr, $name:expr, $jagged:expr, $t:ty) => {{
        let context = format!("Failed to read branch '{}'", $name);
        if $jagged {
            Column::Jagged(
                $branch
                    .as_iter::<Slice<$t>>()
                    .map_err(|err| root_error(&context, err))?
                    .map(|row| row.into_vec().into_iter().map(AsF64::as_f64).collect())
                    .collect(),
            )
        } else {
            Column::Scalar(
                $branch
                    .as_iter::<$t>()
                    .map_err(|err| root_error(&context, err))?
                    .map(AsF64::as_f64)
                    .collect(),
            )
        }
    }};
}

fn read_branch(tree: &ReaderTree, branch: &Branch, name: &str) -> Result<Column> {
    let type_name = branch.item_type_name();
    let kind = leaf_kind(&type_name).ok_or_else(|| {
        NetMetError::Root(format!("branch '{name}' has unsupported type '{type_name}'"))
    })?;
    let jagged = is_jagged(tree, branch, name);

    let column = match kind {
        LeafKind::Bool => read_values!(branch, name, jagged, bool),
        LeafKind::F32 => read_values!(branch, name, jagged, f32),
        LeafKind::F64 => read_values!(branch, name, jagged, f64),
        LeafKind::I8 => read_values!(branch, name, jagged, i8),
        LeafKind::U8 => read_values!(branch, name, jagged, u8),
        LeafKind::I16 => read_values!(branch, name, jagged, i16),
        LeafKind::U16 => read_values!(branch, name, jagged, u16),
        LeafKind::I32 => read_values!(branch, name, jagged, i32),
        LeafKind::U32 => read_values!(branch, name, jagged, u32),
        LeafKind::I64 => read_values!(branch, name, jagged, i64),
        LeafKind::U64 => read_values!(branch, name, jagged, u64),
    };
    Ok(column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxyroot::WriterTree;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("netmet_loader_{}_{}", std::process::id(), name))
    }

    #[test]
    fn leaf_kinds_cover_nanoaod_types() {
        assert_eq!(leaf_kind("Float_t"), Some(LeafKind::F32));
        assert_eq!(leaf_kind("float[]"), Some(LeafKind::F32));
        assert_eq!(leaf_kind("Short_t"), Some(LeafKind::I16));
        assert_eq!(leaf_kind("Int_t"), Some(LeafKind::I32));
        assert_eq!(leaf_kind("UChar_t"), Some(LeafKind::U8));
        assert_eq!(leaf_kind("Bool_t"), Some(LeafKind::Bool));
        assert_eq!(leaf_kind("Double_t"), Some(LeafKind::F64));
        assert_eq!(leaf_kind("uint32_t"), Some(LeafKind::U32));
        assert_eq!(leaf_kind("TString"), None);
    }

    #[test]
    fn file_cap_limits_inputs() {
        let files: Vec<PathBuf> = (0..5).map(|i| PathBuf::from(format!("f{i}.root"))).collect();
        let loader = EventLoader::new(&files, 2);
        assert_eq!(loader.files.len(), 2);
        assert_eq!(loader.files[1], PathBuf::from("f1.root"));
        assert_eq!(loader.tree, DEFAULT_TREE);
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let loader = EventLoader::new(&[temp_path("missing.root")], 1);
        let result = loader.load(&["L1Jet_pt".to_owned()]);
        assert!(matches!(result, Err(NetMetError::Root(_))));
    }

    fn write_events(path: &Path) {
        let mut file = RootFile::create(path).unwrap();
        let mut tree = WriterTree::new(DEFAULT_TREE);
        tree.new_branch("PuppiMET_pt".to_owned(), vec![1.5f32, 2.5, 3.5].into_iter());
        tree.new_branch(
            "L1EmulMPEtSum_pt".to_owned(),
            vec![10.0f64, 20.0, 30.0].into_iter(),
        );
        tree.new_branch("PV_npvsGood".to_owned(), vec![12i32, 40, 7].into_iter());
        tree.write(&mut file).unwrap();
        file.close().unwrap();
    }

    #[test]
    fn root_branches_are_read_and_renamed() {
        let path = temp_path("events.root");
        write_events(&path);

        let loader = EventLoader::new(&[path.clone(), path.clone()], 2);
        let table = loader
            .load(&[
                "PuppiMET_pt".to_owned(),
                "L1EmulMPEtSum_pt".to_owned(),
                "PV_npvsGood".to_owned(),
            ])
            .unwrap();

        assert_eq!(
            table.column_names(),
            vec!["EtSum_pt".to_owned(), "PV_npvsGood".to_owned(), "PuppiMET_pt".to_owned()]
        );
        assert_eq!(table.rows(), 6);
        assert_eq!(
            table.scalar("PuppiMET_pt").unwrap(),
            &[1.5, 2.5, 3.5, 1.5, 2.5, 3.5]
        );
        assert_eq!(table.scalar("EtSum_pt").unwrap()[..3], [10.0, 20.0, 30.0]);
        assert_eq!(table.scalar("PV_npvsGood").unwrap()[..3], [12.0, 40.0, 7.0]);

        let missing = loader.load(&["PuppiMET_pt".to_owned(), "Muon_pt".to_owned()]);
        std::fs::remove_file(&path).ok();
        assert!(matches!(missing, Err(NetMetError::MissingColumn(_))));
    }

    #[test]
    fn snapshot_round_trip() {
        let mut table = EventTable::new();
        table
            .insert("Jet_pt", Column::Jagged(vec![vec![30.0, 20.0], vec![]]))
            .unwrap();
        table
            .insert("PV_npvsGood", Column::Scalar(vec![12.0, 40.0]))
            .unwrap();

        let path = temp_path("snapshot.parquet");
        save_snapshot(&table, &path).unwrap();
        let back = load_snapshot(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(back, table);
    }
}
