//! HTTP handlers.

pub mod generation;
pub mod health;
pub mod segments;
pub mod workflows;

pub use health::{health, ready};
