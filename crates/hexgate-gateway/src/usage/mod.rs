//! Usage accounting: completed tool calls are reported to the metering
//! service off the response path.

mod metering;
mod recorder;

pub use metering::{METERING_TIMEOUT, MeteringClient, UsageError, UsageSink};
pub use recorder::UsageRecorder;
