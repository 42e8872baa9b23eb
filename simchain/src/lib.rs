//! Deterministic orchestration of black-box simulation models.
//!
//! A model is driven through a declarative mapping of variable names to
//! engine addresses. Each case runs in a freshly opened engine session that is
//! always disposed, and stages can be chained so that one model's outputs
//! become the next model's inputs. The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (mapping validation, value types,
//!   projection/merge precedence, pipeline state). No I/O.
//! - **[`io`]**: Side-effecting operations (reading documents, engine sessions,
//!   the bridge process, run configuration). Isolated behind the
//!   [`io::engine::Engine`] trait so tests run against a fake.
//!
//! Orchestration modules ([`case`], [`chain`], [`run`], [`validate`]) combine
//! the two to implement CLI commands.

pub mod case;
pub mod chain;
pub mod cli;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod report;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
