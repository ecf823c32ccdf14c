use super::error::{NetMetError, Result};
use super::exporter::FlatTable;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Start a fresh store, dropping every table already in it.
    Create,
    /// Keep the other tables and replace only the written key.
    Append,
}

/// Destination for the named output tables.
pub trait TableSink {
    fn write(&mut self, key: &str, table: &FlatTable, mode: WriteMode) -> Result<()>;
}

/// A directory holding one parquet file per key.
#[derive(Debug, Clone)]
pub struct ParquetStore {
    pub directory: PathBuf,
}

impl ParquetStore {
    pub fn new(directory: &Path) -> Result<Self> {
        fs::create_dir_all(directory)?;
        Ok(Self {
            directory: directory.to_path_buf(),
        })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{key}.parquet"))
    }

    fn parquet_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("parquet") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Keys of the tables currently in the store, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .parquet_files()?
            .iter()
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_owned))
            .collect())
    }

    pub fn read(&self, key: &str) -> Result<DataFrame> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Err(NetMetError::MissingColumn(format!(
                "table '{}' in {}",
                key,
                self.directory.display()
            )));
        }
        Ok(ParquetReader::new(File::open(path)?).finish()?)
    }

    fn clear(&self) -> Result<()> {
        for path in self.parquet_files()? {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

impl TableSink for ParquetStore {
    fn write(&mut self, key: &str, table: &FlatTable, mode: WriteMode) -> Result<()> {
        if mode == WriteMode::Create {
            self.clear()?;
        }

        let mut df = table.to_dataframe()?;
        let path = self.path_for(key);
        ParquetWriter::new(File::create(&path)?)
            .set_parallel(true)
            .finish(&mut df)?;

        log::info!(
            "Wrote '{}' ({} events, {} columns) to {:?}",
            key,
            table.rows(),
            df.width(),
            path
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporter::ColumnName;

    fn table(column: &str, values: Vec<f64>) -> FlatTable {
        let mut flat = FlatTable::default();
        flat.push(ColumnName::Joined(column.to_owned()), values).unwrap();
        flat
    }

    fn store(name: &str) -> ParquetStore {
        let dir = std::env::temp_dir().join(format!("netmet_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        ParquetStore::new(&dir).unwrap()
    }

    #[test]
    fn create_then_append() {
        let mut store = store("sink_append");
        store
            .write("online", &table("Jet_0_pt", vec![1.0, 2.0]), WriteMode::Create)
            .unwrap();
        store
            .write("offline", &table("PuppiMET_pt", vec![3.0, 4.0]), WriteMode::Append)
            .unwrap();

        assert_eq!(store.keys().unwrap(), vec!["offline".to_owned(), "online".to_owned()]);
        let online = store.read("online").unwrap();
        assert_eq!(online.height(), 2);
        assert_eq!(online.get_column_names()[0].as_str(), "Jet_0_pt");

        fs::remove_dir_all(&store.directory).unwrap();
    }

    #[test]
    fn create_clears_previous_tables() {
        let mut store = store("sink_create");
        store
            .write("offline", &table("PuppiMET_pt", vec![3.0]), WriteMode::Create)
            .unwrap();
        store
            .write("online", &table("Jet_0_pt", vec![1.0]), WriteMode::Create)
            .unwrap();

        assert_eq!(store.keys().unwrap(), vec!["online".to_owned()]);
        assert!(store.read("offline").is_err());

        fs::remove_dir_all(&store.directory).unwrap();
    }

    #[test]
    fn append_replaces_the_same_key() {
        let mut store = store("sink_replace");
        store
            .write("reco", &table("PV_npvsGood", vec![1.0]), WriteMode::Create)
            .unwrap();
        store
            .write("reco", &table("PV_npvsGood", vec![5.0, 6.0, 7.0]), WriteMode::Append)
            .unwrap();

        assert_eq!(store.read("reco").unwrap().height(), 3);

        fs::remove_dir_all(&store.directory).unwrap();
    }
}
