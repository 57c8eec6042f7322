#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod error;
pub mod forward;
pub mod handlers;
pub mod response;
pub mod server;
pub mod state;
pub mod stream;

pub use error::{ForwardError, ProxyError};
pub use forward::{HttpUpstream, Upstream, UpstreamRequest, UpstreamResponse};
pub use server::{create_router, serve};
pub use state::{AppState, ProxyContext};
