//! Host-neutral request and response types and the axum adapter.

mod request;
mod response;
mod router;
mod view;

pub use request::{lookup_path, HttpRequest, Section};
pub use response::{HttpResponse, ResponseBody, ResponseHandle};
pub use router::build_router;
pub use view::ViewRenderer;
