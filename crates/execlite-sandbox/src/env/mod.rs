//! Sandbox environment builder: allow-listed host variables plus the fixed
//! minimal environment every sandboxed interpreter starts from.
//!
//! Backends receive only the rendered variable list; nothing from the host
//! environment leaks through unless it was allow-listed here.

pub mod builder;

pub use builder::SandboxEnv;
