pub mod chain;
pub mod enricher;

pub use chain::{ChainConfig, ChainRegistry};
pub use enricher::{EndpointConfig, EnricherConfig};
