//! Client library for a multi-platform post scheduling backend.
//!
//! `domain::fanout` turns one authored post into one publish request per
//! selected page and settles them together. `domain::campaigns` infers the
//! campaigns those fan-outs created from the flat post list the backend returns.

pub mod config;
pub mod constants;
pub mod domain;
pub mod logging;
pub mod models;
pub mod preview;
pub mod services;
pub mod session;

#[cfg(test)]
mod test_support;
