//! Commonly used types from both crates.
//!
//! ```rust
//! use zakat::prelude::*;
//! ```

pub use zakat_core::prelude::*;

#[cfg(feature = "providers")]
pub use zakat_providers::prelude::*;
