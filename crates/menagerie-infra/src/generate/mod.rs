//! Reply generator adapters.

pub mod http;

pub use http::HttpReplyGenerator;
