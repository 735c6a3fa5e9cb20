//! Runbox: bounded, classified execution of untrusted Python snippets.
//!
//! This crate re-exports [`runbox_core`]. The quickest entry point is
//! [`run_code`]:
//!
//! ```no_run
//! # async fn demo() {
//! let output = runbox::run_code("import math\nprint(math.factorial(5))", "local", 5).await;
//! assert_eq!(output.trim(), "120");
//! # }
//! ```
//!
//! For repeated executions build a sandbox through [`SandboxFactory`] and hold
//! it in a [`SandboxGuard`].

pub use runbox_core::*;
