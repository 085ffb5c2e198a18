//! HTTP layer.
//!
//! Axum front door around the resolver: path parsing, content negotiation
//! between a `307` redirect and an HTML preview page, plus health and
//! metrics endpoints.

pub mod accept;
pub mod handler;
pub mod preview;
pub mod request;
