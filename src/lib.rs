//! Execution core of `wish`, a small job-control shell.
//!
//! A line goes through [`parse`] into a [`command::ParsedLine`]; the
//! [`Shell`] dispatcher runs builtins in-process and hands everything else
//! to the [`job::JobController`], which launches children through
//! [`launch`] (single commands, after [`redirect`] resolves their files) or
//! [`pipeline`] (multi-stage), and then either waits in the foreground or
//! leaves the job running in the background.

pub mod builtin;
pub mod command;
pub mod config;
pub mod error;
pub mod job;
pub mod launch;
pub mod parse;
pub mod pipeline;
pub mod redirect;
pub mod shell;

pub use shell::{DispatchOutcome, Shell};
