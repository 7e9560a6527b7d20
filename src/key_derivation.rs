use crate::error::{EnvelopeError, EnvelopeResult};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-256のキー長
pub const KEY_SIZE: usize = 32;
/// AES-CBCのIV長
pub const IV_SIZE: usize = 16;
/// PBKDF2の出力長（キー + IV）
pub const DERIVED_LENGTH: usize = KEY_SIZE + IV_SIZE;

/// PBKDF2で使うハッシュアルゴリズム
///
/// 判別値はそのままエンベロープのタグバイトになる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[serde(rename = "sha1")]
    Sha1 = 0,
    #[serde(rename = "sha256")]
    Sha256 = 1,
    #[serde(rename = "sha384")]
    Sha384 = 2,
    #[serde(rename = "sha512")]
    Sha512 = 3,
    #[serde(rename = "sha3-256")]
    Sha3_256 = 4,
    #[serde(rename = "sha3-384")]
    Sha3_384 = 5,
    #[serde(rename = "sha3-512")]
    Sha3_512 = 6,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 7] = [
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
        HashAlgorithm::Sha3_256,
        HashAlgorithm::Sha3_384,
        HashAlgorithm::Sha3_512,
    ];

    /// エンベロープに書き込むタグ
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// タグからアルゴリズムを復元
    pub fn from_tag(tag: u8) -> EnvelopeResult<Self> {
        let algorithm = Self::ALL
            .into_iter()
            .find(|a| a.tag() == tag)
            .ok_or_else(|| EnvelopeError::UnsupportedAlgorithm(format!("タグ {tag}")))?;
        algorithm.ensure_available()?;
        Ok(algorithm)
    }

    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Sha3_256 => "sha3-256",
            HashAlgorithm::Sha3_384 => "sha3-384",
            HashAlgorithm::Sha3_512 => "sha3-512",
        }
    }

    pub fn is_sha3(self) -> bool {
        matches!(
            self,
            HashAlgorithm::Sha3_256 | HashAlgorithm::Sha3_384 | HashAlgorithm::Sha3_512
        )
    }

    /// このビルドで使用できるか（SHA-3は `sha3` フィーチャーが必要）
    pub fn is_available(self) -> bool {
        !self.is_sha3() || cfg!(feature = "sha3")
    }

    pub fn ensure_available(self) -> EnvelopeResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(EnvelopeError::UnsupportedAlgorithm(format!(
                "{} はこのビルドでは無効です",
                self.name()
            )))
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        let wanted = match wanted.as_str() {
            "sha-1" => "sha1",
            "sha-256" => "sha256",
            "sha-384" => "sha384",
            "sha-512" => "sha512",
            other => other,
        };
        Self::ALL
            .into_iter()
            .find(|a| a.name() == wanted)
            .ok_or_else(|| EnvelopeError::UnsupportedAlgorithm(s.to_string()))
    }
}

/// PBKDF2で導出したキーとIV。ドロップ時にゼロ化される
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeyMaterial {
    key: [u8; KEY_SIZE],
    iv: [u8; IV_SIZE],
}

impl DerivedKeyMaterial {
    pub fn key(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; IV_SIZE] {
        &self.iv
    }
}

impl fmt::Debug for DerivedKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKeyMaterial").finish_non_exhaustive()
    }
}

/// パスワードからキーとIVを導出（48バイトを 32 + 16 に分割）
pub fn derive_key_and_iv(
    password: &str,
    salt: &[u8],
    iterations: u32,
    algorithm: HashAlgorithm,
) -> EnvelopeResult<DerivedKeyMaterial> {
    if iterations == 0 {
        return Err(EnvelopeError::InvalidParameters(
            "反復回数は1以上である必要があります".to_string(),
        ));
    }
    algorithm.ensure_available()?;

    debug!(
        algorithm = %algorithm,
        iterations,
        salt_len = salt.len(),
        "PBKDF2キー導出開始"
    );
    let start_time = std::time::Instant::now();

    let mut output = [0u8; DERIVED_LENGTH];
    let password = password.as_bytes();
    match algorithm {
        HashAlgorithm::Sha1 => pbkdf2_hmac::<Sha1>(password, salt, iterations, &mut output),
        HashAlgorithm::Sha256 => pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut output),
        HashAlgorithm::Sha384 => pbkdf2_hmac::<Sha384>(password, salt, iterations, &mut output),
        HashAlgorithm::Sha512 => pbkdf2_hmac::<Sha512>(password, salt, iterations, &mut output),
        #[cfg(feature = "sha3")]
        HashAlgorithm::Sha3_256 => {
            pbkdf2_hmac::<sha3::Sha3_256>(password, salt, iterations, &mut output)
        }
        #[cfg(feature = "sha3")]
        HashAlgorithm::Sha3_384 => {
            pbkdf2_hmac::<sha3::Sha3_384>(password, salt, iterations, &mut output)
        }
        #[cfg(feature = "sha3")]
        HashAlgorithm::Sha3_512 => {
            pbkdf2_hmac::<sha3::Sha3_512>(password, salt, iterations, &mut output)
        }
        #[cfg(not(feature = "sha3"))]
        HashAlgorithm::Sha3_256 | HashAlgorithm::Sha3_384 | HashAlgorithm::Sha3_512 => {
            return Err(EnvelopeError::UnsupportedAlgorithm(
                algorithm.name().to_string(),
            ));
        }
    }

    let mut material = DerivedKeyMaterial {
        key: [0u8; KEY_SIZE],
        iv: [0u8; IV_SIZE],
    };
    material.key.copy_from_slice(&output[..KEY_SIZE]);
    material.iv.copy_from_slice(&output[KEY_SIZE..]);
    output.zeroize();

    debug!(
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "PBKDF2キー導出完了"
    );

    Ok(material)
}
