//! HTTP binding for the `facematch` verifier.
//!
//! The `facematch-server` binary wires a [`gateway`] router to a verifier
//! built from [`config::ServerConfig`].

pub mod config;
pub mod gateway;
