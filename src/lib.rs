//! Carton
//!
//! Carton is a session-backed shopping cart. Carts keep product references, quantities and prices
//! in a per-user session and re-resolve every product against its live records when loaded.

pub mod cart;
pub mod config;
pub mod fixtures;
pub mod items;
pub mod lookup;
pub mod prelude;
pub mod products;
pub mod session;
pub mod summary;
