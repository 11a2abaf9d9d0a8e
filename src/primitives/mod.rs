//! The data model and the host-facing persistence seam.
//!
//! This module holds everything the protocol flows operate on: the owning
//! records of the authorization data model ([`grant`]), the scope type with
//! its set semantics ([`scope`]), the [`DataHandler`] trait the host
//! implements over its own store ([`handler`]), opaque token-string
//! generation ([`generator`]), and an in-memory reference handler suitable
//! for tests and prototyping ([`memory`]).
//!
//! [`DataHandler`]: handler/trait.DataHandler.html

pub mod generator;
pub mod grant;
pub mod handler;
pub mod memory;
pub mod scope;

use chrono::{DateTime, Utc};

/// Type of timestamps used throughout the crate (Utc).
pub type Time = DateTime<Utc>;
