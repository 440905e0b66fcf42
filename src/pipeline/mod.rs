//! Pipeline lifecycle: configure, route, deliver, shut down.

pub mod external;
pub mod registry;
pub mod route;
pub mod worker;

pub use registry::{PipelineRegistry, ShutdownGuard};
pub use worker::DeliveryWorker;
