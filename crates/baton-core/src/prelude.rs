//! Prelude for common imports used throughout all baton crates

pub use crate::bundle::{Bundle, Intent};
pub use crate::error::{Error, Result, ResultExt};
pub use crate::id::InstanceId;
pub use tracing::{debug, error, info, instrument, trace, warn};
