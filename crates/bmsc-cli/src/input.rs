//! Loading keys, associated data and payloads from arguments and files.

use std::{fmt, fs, path::Path};

use base64::{Engine, engine::general_purpose::STANDARD};
use bmsc_crypto::{Entropy, KEY_LEN, SystemEntropy};
use zeroize::Zeroizing;

use crate::{
    args::{BindingArgs, KeyArgs},
    error::{CliError, Result},
};

/// Where the master key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// `--key-hex`
    Hex,
    /// `--key-file`
    File,
    /// Generated because no key was given
    Random,
}

/// A loaded master key. Zeroized on drop.
pub struct LoadedKey {
    /// Key bytes; length is validated by the core, not here
    pub bytes: Zeroizing<Vec<u8>>,
    /// Origin of the key
    pub source: KeySource,
}

impl fmt::Debug for LoadedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedKey")
            .field("len", &self.bytes.len())
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl LoadedKey {
    /// Whether the key should be printed.
    ///
    /// A key typed on the command line is already visible, so it is echoed.
    pub fn should_show(&self, show_key: bool) -> bool {
        show_key || self.source == KeySource::Hex
    }
}

/// Load the key named by `args`, or generate a random one.
pub fn load_key(args: &KeyArgs) -> Result<LoadedKey> {
    if let Some(key_hex) = &args.key_hex {
        let bytes = Zeroizing::new(hex::decode(key_hex.trim())?);
        return Ok(LoadedKey { bytes, source: KeySource::Hex });
    }

    if let Some(path) = &args.key_file {
        let bytes = Zeroizing::new(read_file(path)?);
        return Ok(LoadedKey { bytes, source: KeySource::File });
    }

    let mut bytes = Zeroizing::new(vec![0u8; KEY_LEN]);
    SystemEntropy::new().random_bytes(&mut bytes);
    Ok(LoadedKey { bytes, source: KeySource::Random })
}

/// Associated data: `--aad-file` contents, else `--aad`, else empty.
pub fn load_aad(args: &BindingArgs) -> Result<Vec<u8>> {
    if let Some(path) = &args.aad_file {
        return read_file(path);
    }
    Ok(args.aad.clone().unwrap_or_default().into_bytes())
}

/// Read a whole file, naming it in the error.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| CliError::Read { path: path.to_path_buf(), source })
}

/// Write a whole file, naming it in the error.
pub fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents).map_err(|source| CliError::Write { path: path.to_path_buf(), source })
}

/// Decode a Base64 command-line field.
pub fn decode_b64(field: &'static str, value: &str) -> Result<Vec<u8>> {
    STANDARD.decode(value.trim()).map_err(|source| CliError::Base64 { field, source })
}

/// Encode bytes as standard Base64.
pub fn encode_b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
