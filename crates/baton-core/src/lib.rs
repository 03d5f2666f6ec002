//! # baton-core - Core Types
//!
//! Foundation crate for baton. Provides error handling, node identity,
//! opaque payload bundles and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, serde_json, thiserror, tracing, rand).
//!
//! ## Public API
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ### Identity (`id`)
//! - [`InstanceId`] - Stable, process-unique node id preserved across save/restore
//!
//! ### Payloads (`bundle`)
//! - [`Bundle`] - Opaque key/value map used for args and saved state
//! - [`Intent`] - Host-side launch request
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use baton_core::prelude::*;
//! ```

pub mod bundle;
pub mod error;
pub mod id;
pub mod logging;
pub mod prelude;

pub use bundle::{bundle, Bundle, Intent};
pub use error::{Error, Result, ResultExt};
pub use id::InstanceId;
