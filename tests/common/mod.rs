//! Common test utilities for ircget session tests

#[allow(dead_code)]
pub mod assertions;
#[allow(dead_code)]
pub mod bot;
#[allow(dead_code)]
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
pub use bot::*;
#[allow(unused_imports)]
pub use fixtures::*;
