//! Sundrift Core - Shared domain types.
//!
//! This crate provides the domain vocabulary used across the Sundrift
//! storefront engine:
//!
//! - newtype identifiers for products, cart lines, users, and orders
//! - validated [`Email`] addresses
//! - decimal-backed [`Money`] amounts
//! - cart [`LineItem`]s and [`CartSnapshot`]s
//! - [`AppliedCoupon`] records produced by coupon validation
//! - [`User`] and [`IdentityContext`] for authentication state
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage.
//! Everything that talks to the outside world lives in the `storefront` crate.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
