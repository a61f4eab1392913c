//! Request-handler layer and server facade for docbase.
//!
//! This crate turns the engine, event bus, and gateway into one
//! assembled [`DocbaseServer`]. It owns request interpretation (the
//! query grammar, insert options, error-to-status classification) but
//! not the transport: a thin routing shell binds sockets, extracts
//! tenant, collection, body, and parameters, and calls into
//! [`RequestHandler`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod handler;
mod query;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::RequestHandler;
pub use query::{parse_filters, parse_json_filters, parse_query, parse_select};
pub use server::DocbaseServer;
