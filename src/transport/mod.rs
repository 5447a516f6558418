pub mod error_classifier;
pub mod http_transport;
pub mod request_builder;

pub use error_classifier::{classify_response, classify_upstream_error, status_phrase};
pub use http_transport::HttpTransport;
pub use request_builder::{
    build_models_call, build_upstream_call, UpstreamCall, UpstreamSettings,
    DEFAULT_CONVERSATION_ENDPOINT, DEFAULT_MODELS_ENDPOINT, UPSTREAM_USER_AGENT,
};
