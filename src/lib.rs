pub mod base32;
pub mod config;
pub mod crypto;
pub mod error;
pub mod file_ops;
pub mod key_derivation;

// 公開API
pub use base32::{Base32, Base32Encoder, CrockfordBase32, crockford, rfc4648, word_safe};
pub use config::{Config, EncryptionParams};
pub use crypto::{
    EnvelopeFields, decrypt_bytes, decrypt_legacy_bytes, decrypt_string, encrypt_bytes,
    encrypt_string, encrypt_with_params, get_random_salt,
};
pub use error::{EnvelopeError, EnvelopeResult};
pub use file_ops::{decrypt_file, encrypt_file};
pub use key_derivation::{DerivedKeyMaterial, HashAlgorithm, derive_key_and_iv};
