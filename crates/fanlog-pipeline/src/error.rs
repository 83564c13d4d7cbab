use fanlog_bus::BusError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
