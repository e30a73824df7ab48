//! Public embedding API for the rule host
//!
//! This module provides the surface most callers need:
//! - [`RuleHost`], which compiles rule functions and invokes them
//! - [`Marshaler`], which converts between host values and script values
//!
//! # Examples
//!
//! ```
//! use rulehost_runtime::api::RuleHost;
//! use rulehost_runtime::{HostValue, Strategy};
//!
//! let mut host = RuleHost::new();
//! host.compile("tag", "this + \"-ok\"").unwrap();
//!
//! let mut field = HostValue::from("this-is");
//! let result = host.invoke("tag", &mut field, Strategy::InjectAndRun).unwrap();
//! assert_eq!(result, HostValue::from("this-is-ok"));
//! ```

pub mod conversion;
pub mod runtime;

// Re-export main types for convenience
pub use conversion::{Marshaler, UnsupportedType, DEFAULT_MAX_DEPTH};
pub use runtime::RuleHost;
