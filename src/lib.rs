//! Bookgate - Request-Rate Governor
//!
//! This crate implements the in-process rate governor that sits in front of
//! the bookstore storefront. Every request is classified (general, login,
//! register) and checked against fixed-window counters keyed by client,
//! with no external store.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
