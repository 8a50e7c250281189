// src/consts.rs
//! Shared constants — token layouts, envelope format and defaults

/// Length of every raw symmetric key handled by this crate (256 bits)
pub const KEY_LEN: usize = 32;

/// XChaCha20-Poly1305 nonce length
pub const NONCE_LEN: usize = 24;

/// Poly1305 tag length
pub const TAG_LEN: usize = 16;

/// First byte of every field token; authenticated as associated data
pub const TOKEN_VERSION: u8 = 0x01;

/// Envelope container version written by `pack`
pub const ENVELOPE_VERSION: u64 = 1;

/// Scheme tag stored inside envelope containers
pub const ENVELOPE_SCHEME_TAG: &str = "kms_envelope";

/// First byte of a LocalKms wrapped-key blob
pub const WRAP_BLOB_VERSION: u8 = 0x01;

/// Domain separation for LocalKms key wrapping; the master key id is appended
pub const WRAP_AAD_PREFIX: &str = "efv-dek-wrap:";

/// Hex characters of BLAKE3 shown when a wrapped key is logged
pub const FINGERPRINT_HEX_LEN: usize = 16;

/// Text shown to end users in place of a field that failed to decrypt
pub const UNDECRYPTABLE_PLACEHOLDER: &str = "[this entry could not be decrypted]";

/// Default number of records re-wrapped per rotation transaction
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Config file consulted when `EFV_CONFIG` is not set
pub const DEFAULT_CONFIG_PATH: &str = "efv-config.toml";

/// Default records database for the rotation tool
pub const DEFAULT_RECORDS_DB: &str = "data/records.db";

/// Default table / column layout of the encrypted journal field
pub const DEFAULT_TABLE: &str = "journal_entries";
pub const DEFAULT_ID_COLUMN: &str = "id";
pub const DEFAULT_CIPHERTEXT_COLUMN: &str = "content";
pub const DEFAULT_WRAPPED_KEY_COLUMN: &str = "encryption_key";
