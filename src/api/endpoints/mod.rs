//! Route handlers, one module per endpoint.

pub mod health;
pub mod index;
pub mod predict;
