pub mod error;
pub mod event;
pub mod level;
pub mod value;

pub use error::PipelineError;
pub use event::{
    LogEvent, NO_CORRELATION_ID, RuntimeIdentity, SourceLocation, format_error_chain,
};
pub use level::{DEFAULT_TRACE_VALUE, Level};
pub use value::{FieldValue, Fields, UNREPRESENTABLE};
