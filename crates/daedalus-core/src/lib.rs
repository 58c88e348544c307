//! # Daedalus Core
//!
//! The request-processing core of Daedalus: an immutable context chain that
//! handlers extend as they delegate to one another.
//!
//! - [`Means`] - Type-indexed bag of values available to handlers
//! - [`Modification`] - Entries to add when deriving a context
//! - [`Modifier`] - Identified producer of modifications, applied at most once per chain
//! - [`Context`] - Means plus the `next` / `modified_by` agent
//! - [`Handler`] - Async unit of processing
//! - [`Capability`] - Handler transformer, composable with [`Capability::and`]
//! - [`request_handler`] / [`dispatch_error`] - Sequencing and error routing
//! - [`RequestProcessor`] - Runs a handler chain for one request
//! - [`HandlerError`] - Status and unexpected errors

#![doc(html_root_url = "https://docs.rs/daedalus-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod capability;
mod context;
mod error;
mod handler;
mod means;
mod modifier;
mod processor;

pub use capability::{with_modifier, And, Capability};
pub use context::{Completion, Context};
pub use error::{
    status_to_code, ErrorDetail, ErrorEnvelope, HandlerError, HandlerResult, StatusError,
};
pub use handler::{dispatch_error, request_handler, BoxFuture, ErrorMeans, Handler};
pub use means::{Means, Modification};
pub use modifier::{Extension, Modifier, ModifierId};
pub use processor::RequestProcessor;
