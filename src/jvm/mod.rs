pub mod jcmd;
pub mod probe;
pub mod types;

pub use probe::{CounterReading, ProbeCapabilities, ProcessProbe, ResourceCounters};
