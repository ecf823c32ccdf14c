use netmet::{PipelineConfig, Processor};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=info`)

    let Some(config_path) = std::env::args().nth(1).map(PathBuf::from) else {
        eprintln!("usage: netmet <config.yaml>");
        return ExitCode::FAILURE;
    };

    let result = PipelineConfig::from_path(&config_path)
        .and_then(|config| Processor::new(config).run());

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
