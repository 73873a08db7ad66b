//! wakegate-compute — the instance-management API.
//!
//! [`InstanceApi`] is the seam the lifecycle controller calls through:
//! `status`, `start` and `stop` for exactly one instance. [`GceClient`]
//! implements it against the Compute Engine v1 REST API, waiting on the
//! long-running operation that every start/stop returns.
//!
//! # Architecture
//!
//! ```text
//! GceClient
//!   ├── HttpTransport (hyper http1 over TCP / tokio-rustls)
//!   ├── TokenSource   (static token | metadata server, cached)
//!   └── Operation polling (POST .../operations/{op}/wait until DONE)
//! ```

pub mod api;
pub mod error;
pub mod gce;
pub mod http;
pub mod token;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub use api::{ApiFuture, InstanceApi};
pub use error::{ComputeError, ComputeResult};
pub use gce::GceClient;
pub use http::{Endpoint, HttpTransport};
pub use token::TokenSource;
pub use types::{InstanceRef, InstanceStatus};

#[cfg(any(test, feature = "testing"))]
pub use mock::MockInstanceApi;
