use crate::config::AppConfig;
use crate::context::ExecutionContext;
use crate::exception::{ArgumentsHost, DefaultExceptionFilter, ExceptionFilter, HttpException, Thrown};
use crate::http::HttpResponse;
use std::panic::Location;
use std::sync::Arc;

/// The single recovery point of the request and hook pipelines.
pub struct ExceptionHandler {
    globals: Vec<Arc<dyn ExceptionFilter>>,
    fallback: DefaultExceptionFilter,
    config: Arc<AppConfig>,
}

impl ExceptionHandler {
    pub fn new(globals: Vec<Arc<dyn ExceptionFilter>>, config: Arc<AppConfig>) -> Self {
        Self {
            globals,
            fallback: DefaultExceptionFilter,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Turn anything thrown into the response to send.
    ///
    /// Filters are tried most recently registered first: request-scoped
    /// filters (method before class) and then globals in reverse order.
    pub fn handle(&self, ctx: &ExecutionContext, thrown: Thrown) -> HttpResponse {
        let mut exception = match thrown {
            Thrown::Finalized(response) => return *response,
            Thrown::Http(exception) => exception,
            Thrown::Other { error, location } => self.wrap(error, location),
        };

        let host = ArgumentsHost::new(ctx, &self.config);
        let mut raised_by = None;

        let filters: Vec<Arc<dyn ExceptionFilter>> =
            self.globals.iter().cloned().chain(ctx.scoped_filters()).collect();
        for filter in filters.iter().rev() {
            let accepts = filter.accepts();
            if !accepts.is_empty() && !accepts.iter().any(|kind| exception.kind().is_a(*kind)) {
                continue;
            }

            match filter.catch(&exception, &host) {
                Ok(response) => return self.finish(&exception, response),
                Err(Thrown::Finalized(response)) => return self.finish(&exception, *response),
                Err(Thrown::Http(rethrown)) => {
                    tracing::debug!(filter = filter.name(), "exception filter rethrew");
                    raised_by = Some(filter.name());
                    exception = rethrown;
                }
                Err(Thrown::Other { error, location }) => {
                    tracing::debug!(filter = filter.name(), %error, "exception filter failed");
                    raised_by = Some(filter.name());
                    exception = self.wrap(error, location);
                }
            }
        }

        let response = self.fallback.render(&exception, &host, raised_by);
        self.finish(&exception, response)
    }

    fn wrap(&self, error: anyhow::Error, location: &'static Location<'static>) -> HttpException {
        let message = if self.config.debug {
            error.to_string()
        } else {
            "Internal Server Error".to_string()
        };
        HttpException::internal(message).at(location).with_cause(error)
    }

    fn finish(&self, exception: &HttpException, response: HttpResponse) -> HttpResponse {
        if response.status().is_server_error() {
            tracing::error!(
                status = response.status().as_u16(),
                file = exception.location().file(),
                line = exception.location().line(),
                cause = ?exception.cause(),
                "{}",
                exception.message()
            );
        } else {
            tracing::debug!(status = response.status().as_u16(), "{}", exception.message());
        }
        response
    }
}
