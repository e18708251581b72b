//! Domain layer - edges, component configuration and time series

pub mod edge;
pub mod timeseries;

pub use edge::{ComponentConfig, ConfigProperty, Edge, EdgeConfig};
pub use timeseries::{TimeSeries, TimeseriesQuery};
