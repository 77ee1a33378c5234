pub mod collector;
pub mod filter;
pub mod history;
pub mod sampler;
pub mod store;

pub use collector::{Clock, ManualClock, MetricsCollector, SystemClock};
pub use filter::SampleFilter;
pub use history::BoundedHistory;
pub use sampler::{Sampler, SamplerHandle, SamplerStats};
pub use store::ProfilerStore;
