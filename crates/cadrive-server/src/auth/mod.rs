//! Principal extraction for the drive server
//!
//! Identity is established upstream; this server only reads the asserted
//! tenant, role and client from request headers.

pub mod middleware;

pub use middleware::principal_middleware;
