pub mod generator;
pub mod http_source;
pub mod store;

pub use generator::{GeneratorConfig, SignalGenerator, SignalHandle};
pub use http_source::HttpCandleSource;
pub use store::{SignalStore, HISTORY_CAPACITY};
