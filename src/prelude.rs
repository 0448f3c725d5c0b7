//! Convenient re-exports for common usage.
//!
//! ## Usage
//!
//! ```rust
//! use errchain::prelude::*;
//!
//! fn inner() -> Result<(), Chain> {
//!     Err(errorf!("not found"))
//! }
//!
//! fn outer() -> Result<(), Chain> {
//!     wrapf!(inner(), "looking up {}", "alice")
//! }
//!
//! assert_eq!(outer().unwrap_err().message(), "looking up alice: not found");
//! ```

pub use crate::Chain;
pub use crate::ResultChainExt;
pub use crate::wrap;
pub use crate::{errorf, wrapf};
