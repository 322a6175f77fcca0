//! Student Network Core Library
//!
//! Core functionality for the student network - the connection graph
//! between accounts and the close friend annotations layered on top.
//! Routing, sessions and page rendering live outside this crate and talk
//! to it through [`connection::ConnectionManager`] and
//! [`connection::ConnectionQueries`].

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![deny(unsafe_code)]

pub mod account;
pub mod config;
pub mod connection;

pub use account::{AccountDirectory, AccountStorage};
pub use config::{CloseMarkerPolicy, NetworkConfig};
