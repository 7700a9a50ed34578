//! Command-line arguments.

use std::path::PathBuf;

use bmsc_crypto::{Backend, Version};
use clap::{Args, Parser, Subcommand};

/// Context used when none is given on the command line
pub const DEFAULT_CONTEXT: &str = "BMSCv6-IV00";

/// BMSC authenticated encryption
#[derive(Parser, Debug)]
#[command(name = "bmsc")]
#[command(about = "Context-bound authenticated encryption with versioned envelopes")]
#[command(version)]
pub struct Cli {
    /// Sealing backend (hmac-stream, xchacha20poly1305)
    #[arg(long, global = true, default_value_t = Backend::default())]
    pub backend: Backend,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Round trip, tamper and nonce checks with a random key
    Selftest(SelftestArgs),
    /// Encrypt text or a file
    Encrypt(EncryptArgs),
    /// Decrypt Base64 nonce, ciphertext and tag
    Decrypt(DecryptArgs),
    /// Decrypt a raw, v1 or v2 envelope file
    DecryptFile(DecryptFileArgs),
    /// Measure encrypt/decrypt throughput
    Bench(BenchArgs),
}

/// Master key source. Without either flag a random key is generated.
#[derive(Args, Debug, Clone, Default)]
pub struct KeyArgs {
    /// 32-byte key as hex
    #[arg(long, conflicts_with = "key_file")]
    pub key_hex: Option<String>,

    /// File holding the raw 32-byte key
    #[arg(long)]
    pub key_file: Option<PathBuf>,

    /// Print the key (implied by --key-hex)
    #[arg(long)]
    pub show_key: bool,
}

/// Context and associated data.
#[derive(Args, Debug, Clone)]
pub struct BindingArgs {
    /// Context string the ciphertext is bound to (not a nonce)
    #[arg(long = "iv", visible_alias = "ctx", default_value = DEFAULT_CONTEXT)]
    pub context: String,

    /// Associated data as a UTF-8 string
    #[arg(long)]
    pub aad: Option<String>,

    /// File holding the associated data (wins over --aad)
    #[arg(long)]
    pub aad_file: Option<PathBuf>,
}

/// Arguments for `selftest`.
#[derive(Args, Debug, Clone)]
pub struct SelftestArgs {
    /// Context for the self-test messages
    #[arg(long = "iv", visible_alias = "ctx", default_value = DEFAULT_CONTEXT)]
    pub context: String,
}

/// Arguments for `encrypt`.
#[derive(Args, Debug, Clone)]
#[command(group(clap::ArgGroup::new("input").required(true).args(["text", "in_file"])))]
pub struct EncryptArgs {
    /// Plaintext as a UTF-8 string
    #[arg(long)]
    pub text: Option<String>,

    /// Plaintext file
    #[arg(long)]
    pub in_file: Option<PathBuf>,

    /// Write an envelope here instead of printing Base64 fields
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Envelope layout for --out (raw, v1, v2)
    #[arg(long, default_value_t = Version::V2, requires = "out")]
    pub format: Version,

    #[command(flatten)]
    #[allow(missing_docs)]
    pub key: KeyArgs,

    #[command(flatten)]
    #[allow(missing_docs)]
    pub binding: BindingArgs,
}

/// Arguments for `decrypt`.
#[derive(Args, Debug, Clone)]
pub struct DecryptArgs {
    /// Nonce, Base64
    #[arg(long)]
    pub nonce_b64: String,

    /// Ciphertext, Base64
    #[arg(long)]
    pub ct_b64: String,

    /// Tag, Base64
    #[arg(long)]
    pub tag_b64: String,

    #[command(flatten)]
    #[allow(missing_docs)]
    pub key: KeyArgs,

    #[command(flatten)]
    #[allow(missing_docs)]
    pub binding: BindingArgs,
}

/// Arguments for `decrypt-file`.
#[derive(Args, Debug, Clone)]
pub struct DecryptFileArgs {
    /// Envelope file (raw, v1 or v2, detected automatically)
    #[arg(long)]
    pub in_enc_file: PathBuf,

    /// Write the plaintext here instead of printing it as hex
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Ignore a context embedded in a v2 envelope and use --iv instead
    #[arg(long)]
    pub ignore_embedded_context: bool,

    #[command(flatten)]
    #[allow(missing_docs)]
    pub key: KeyArgs,

    #[command(flatten)]
    #[allow(missing_docs)]
    pub binding: BindingArgs,
}

/// Arguments for `bench`.
#[derive(Args, Debug, Clone)]
pub struct BenchArgs {
    /// Message sizes in bytes, comma separated
    #[arg(long, value_delimiter = ',', default_value = "1024,16384")]
    pub sizes: Vec<usize>,

    /// Rounds per size
    #[arg(long, default_value_t = 3)]
    pub rounds: u32,
}
