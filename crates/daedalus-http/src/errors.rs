//! Rendering of errors caught by [`dispatch_error`](daedalus_core::dispatch_error).

use crate::logging::{Logger, RequestId, TracingLogger};
use crate::rendering::Renderer;
use daedalus_core::{Context, ErrorMeans, Handler, HandlerError, StatusError};

/// Options for [`render_http_error`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorRenderingOptions {
    /// Render the message of unexpected errors instead of a generic one.
    pub expose_internal_errors: bool,
}

/// Handler rendering the error in [`ErrorMeans`] as a JSON envelope.
///
/// Status errors are rendered with their own status, message and details.
/// Anything else becomes a generic 500. The error is logged exactly once: at
/// error level for server errors, info level otherwise. When the response was
/// already sent the error is only logged.
pub fn render_http_error(options: ErrorRenderingOptions) -> Handler {
    Handler::new(move |ctx: Context| async move {
        let error = ctx.require::<ErrorMeans>()?.error();
        log_error(&ctx, error);

        if ctx.is_completed() {
            return Ok(());
        }

        let request_id = ctx.get::<RequestId>().map(ToString::to_string);
        let envelope = match error {
            HandlerError::Status(status) => status.to_envelope(request_id.as_deref()),
            HandlerError::Unexpected(cause) => {
                let internal = if options.expose_internal_errors {
                    StatusError::internal().with_message(cause.to_string())
                } else {
                    StatusError::internal()
                };
                internal.to_envelope(request_id.as_deref())
            }
        };

        Renderer::for_context(&ctx)?.render_json(error.status_code(), &envelope)
    })
}

fn log_error(ctx: &Context, error: &HandlerError) {
    let fallback;
    let logger: &dyn crate::logging::Log = match ctx.get::<Logger>() {
        Some(logger) => &**logger,
        None => {
            fallback = TracingLogger::new(tracing::Span::current());
            &fallback
        }
    };

    match error {
        HandlerError::Status(status) if !status.status().is_server_error() => {
            logger.info(&format_args!("Request failed: {status}{}", details_suffix(status)));
        }
        HandlerError::Status(status) => {
            let cause = status
                .cause()
                .map(|c| format!(" (caused by: {c:#})"))
                .unwrap_or_default();
            logger.error(&format_args!(
                "Request failed: {status}{}{cause}",
                details_suffix(status)
            ));
        }
        HandlerError::Unexpected(cause) => {
            logger.error(&format_args!("Unexpected error: {cause:#}"));
        }
    }
}

fn details_suffix(status: &StatusError) -> String {
    status
        .details()
        .map(|d| format!(" [{d}]"))
        .unwrap_or_default()
}
