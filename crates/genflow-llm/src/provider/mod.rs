//! Model provider implementations

#[cfg(feature = "google")]
pub mod google;
