//! Command handlers.
//!
//! Each handler exposes an `execute` function taking already-parsed
//! arguments and returning `Result<_, CliError>`.

pub mod hash_code;
pub mod serve;
