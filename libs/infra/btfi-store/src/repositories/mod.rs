// [libs/infra/btfi-store/src/repositories/mod.rs]
pub mod epochs;
pub mod samples;
pub mod uplink_queue;

pub use epochs::EpochRepository;
pub use samples::SampleRepository;
pub use uplink_queue::UplinkQueueRepository;
