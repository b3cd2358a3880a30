//! Windowguard - Per-Client Sliding-Window Rate Limiting
//!
//! This crate implements an in-memory sliding-window rate limiter keyed by
//! client address, and an HTTP admission layer that puts it in front of a
//! service: requests over quota are answered with 429 before they reach any
//! handler.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
