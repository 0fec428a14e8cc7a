//! gitsalt-http: the remote area of the namespace.
//!
//! [`RemoteFs`] resolves paths against an origin server and fetches file
//! contents on read. It never writes back.

mod error;
pub mod executor;
pub mod remote;
pub mod types;

pub use error::Error;
pub use executor::{HttpExecutor, ReqwestExecutor};
pub use remote::{RemoteFs, DEFAULT_CACHE_LIMIT};
pub use types::{HttpRequest, HttpResponse, Method};

#[cfg(any(test, feature = "test-utils"))]
pub use executor::mock::MockExecutor;
