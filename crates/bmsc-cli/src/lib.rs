//! BMSC command-line front end.
//!
//! Thin glue over `bmsc-crypto`: argument parsing, key and payload loading,
//! and human-readable reports. All cryptographic decisions live in the core.
//!
//! # Usage
//!
//! ```bash
//! # Check the build works end to end
//! bmsc selftest
//!
//! # Encrypt to a v2 envelope that remembers its context and AAD
//! bmsc encrypt --text "hello" --key-hex <64 hex chars> --ctx files --out msg.bmsc6
//!
//! # Decrypt it again
//! bmsc decrypt-file --in-enc-file msg.bmsc6 --key-hex <64 hex chars>
//! ```
//!
//! # Exit Status
//!
//! - 0: success
//! - 1: authentication failed (wrong key, context, AAD, or corrupted data)
//! - 2: invalid input (bad hex/Base64, wrong key length, malformed envelope)

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod args;
pub mod commands;
pub mod error;
pub mod input;

use std::io::Write;

pub use args::{Cli, Command};
pub use error::{CliError, EXIT_AUTH, EXIT_INPUT, EXIT_OK, Result};

/// Run a parsed command line, writing the report to `out`.
pub fn run(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    let backend = cli.backend;
    tracing::debug!(%backend, "dispatching command");

    match &cli.command {
        Command::Selftest(args) => commands::selftest(backend, args, out),
        Command::Encrypt(args) => commands::encrypt(backend, args, out),
        Command::Decrypt(args) => commands::decrypt(backend, args, out),
        Command::DecryptFile(args) => commands::decrypt_file(backend, args, out),
        Command::Bench(args) => commands::bench(backend, args, out),
    }
}
