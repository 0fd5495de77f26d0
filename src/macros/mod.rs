//! Macros shared across the crate.
//!
//! Contract violations in the generators are fatal: these macros log the
//! failure through `log::error!` before panicking so the cause survives in
//! the host application's log.

#[macro_use]
pub mod precondition;
