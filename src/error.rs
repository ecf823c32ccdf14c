use polars::error::PolarsError;
use std::error::Error;
use std::fmt::Display;

#[derive(Debug)]
pub enum NetMetError {
    MissingColumn(String),
    ShapeMismatch(String),
    Lookup(String),
    InvalidParameter(String),
    File(std::io::Error),
    DataFrame(PolarsError),
    Root(String),
    Config(serde_yaml::Error),
    Json(serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NetMetError>;

impl From<std::io::Error> for NetMetError {
    fn from(err: std::io::Error) -> NetMetError {
        NetMetError::File(err)
    }
}

impl From<PolarsError> for NetMetError {
    fn from(err: PolarsError) -> NetMetError {
        NetMetError::DataFrame(err)
    }
}

impl From<serde_yaml::Error> for NetMetError {
    fn from(err: serde_yaml::Error) -> NetMetError {
        NetMetError::Config(err)
    }
}

impl From<serde_json::Error> for NetMetError {
    fn from(err: serde_json::Error) -> NetMetError {
        NetMetError::Json(err)
    }
}

impl Display for NetMetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetMetError::MissingColumn(x) => {
                write!(f, "Requested column or collection is missing: {x}")
            }
            NetMetError::ShapeMismatch(x) => {
                write!(f, "Tables that must be aligned are not: {x}")
            }
            NetMetError::Lookup(x) => write!(f, "Unknown catalog name: {x}"),
            NetMetError::InvalidParameter(x) => write!(f, "Invalid pipeline parameter: {x}"),
            NetMetError::File(x) => write!(f, "Run had a file I/O error: {x}"),
            NetMetError::DataFrame(x) => write!(f, "Run had an error using polars: {x}"),
            NetMetError::Root(x) => write!(f, "Run had an error reading a ROOT file: {x}"),
            NetMetError::Config(x) => write!(f, "Unable to parse the pipeline config: {x}"),
            NetMetError::Json(x) => write!(f, "Unable to write JSON output: {x}"),
        }
    }
}

impl Error for NetMetError {}

/// Wraps a ROOT reader failure with the operation that triggered it.
pub(crate) fn root_error<E: Display>(context: &str, err: E) -> NetMetError {
    NetMetError::Root(format!("{context}: {err}"))
}
