pub mod platform;
pub mod source;

pub use platform::reloading::ReloadingSource;
pub use platform::{SourceKind, create_traffic_source};
pub use source::{SourceError, TrafficCounters, TrafficSource};
