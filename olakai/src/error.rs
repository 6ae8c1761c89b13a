use thiserror::Error;

use olakai_core::{ConfigError, ExecutionBlocked};
use olakai_delivery::DeliveryError;

#[derive(Debug, Error)]
pub enum OlakaiError {
    #[error("olakai is not initialized; call olakai::initialize first")]
    NotInitialized,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Blocked(#[from] ExecutionBlocked),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}
