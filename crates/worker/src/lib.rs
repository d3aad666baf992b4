//! Job processing: the polling [`JobProcessor`], its retry policy and the
//! start-up wiring shared by the worker binary and the API server's
//! embedded processors.

pub mod config;
pub mod logging;
pub mod processor;
pub mod retry;
pub mod runtime;

pub use config::{StoreBackend, WorkerConfig};
pub use processor::{JobProcessor, ProcessOutcome};
pub use retry::RetryDecision;
pub use runtime::Runtime;
