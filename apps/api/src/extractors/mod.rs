//! Request extractors

pub mod tenant;

pub use tenant::Tenant;
