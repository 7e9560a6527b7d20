use crate::base32::crockford;
use crate::config::EncryptionParams;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::key_derivation::{derive_key_and_iv, DerivedKeyMaterial, HashAlgorithm};
use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// フィールドの区切り文字。Crockfordアルファベットに含まれない文字を使う
pub const DELIMITER: char = 'U';

/// 旧形式（暗号文, ソルト, 反復回数）の区切り文字
pub const LEGACY_DELIMITER: char = 'L';

const SEGMENT_COUNT: usize = 4;
const LEGACY_SEGMENT_COUNT: usize = 3;
const ITERATION_BYTES: usize = 4;

/// エンベロープを構成するフィールド
///
/// `Display` で `salt U iterations U tag U ciphertext` 形式に直列化し、
/// `FromStr` で読み戻す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeFields {
    pub salt: Vec<u8>,
    pub iterations: u32,
    pub hash_algorithm: HashAlgorithm,
    pub ciphertext: Vec<u8>,
}

impl EnvelopeFields {
    /// エンベロープ文字列を解析
    pub fn parse(value: &str) -> EnvelopeResult<Self> {
        let segments: Vec<&str> = value.split(DELIMITER).collect();
        if segments.len() != SEGMENT_COUNT {
            return Err(EnvelopeError::MalformedEnvelope(format!(
                "{SEGMENT_COUNT}個のセグメントが必要ですが{}個でした",
                segments.len()
            )));
        }

        let salt = decode_segment("ソルト", segments[0])?;
        let iterations_bytes = decode_segment("反復回数", segments[1])?;
        let tag_bytes = decode_segment("アルゴリズム", segments[2])?;
        let ciphertext = decode_segment("暗号文", segments[3])?;

        let iterations = decode_iterations(&iterations_bytes)?;
        if iterations == 0 {
            return Err(EnvelopeError::MalformedEnvelope(
                "反復回数が0です".to_string(),
            ));
        }

        let [tag] = tag_bytes[..] else {
            return Err(EnvelopeError::MalformedEnvelope(format!(
                "アルゴリズムタグは1バイトである必要がありますが{}バイトでした",
                tag_bytes.len()
            )));
        };
        let hash_algorithm = HashAlgorithm::from_tag(tag)?;

        Ok(Self {
            salt,
            iterations,
            hash_algorithm,
            ciphertext,
        })
    }

    /// エンベロープ文字列に直列化
    pub fn encode(&self) -> String {
        let encoder = crockford();
        let delimiter = DELIMITER.to_string();
        [
            encoder.encode(&self.salt),
            encoder.encode(&encode_iterations(self.iterations)),
            encoder.encode(&[self.hash_algorithm.tag()]),
            encoder.encode(&self.ciphertext),
        ]
        .join(delimiter.as_str())
    }
}

impl fmt::Display for EnvelopeFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for EnvelopeFields {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn decode_segment(name: &str, segment: &str) -> EnvelopeResult<Vec<u8>> {
    crockford()
        .decode(segment)
        .map_err(|e| EnvelopeError::MalformedEnvelope(format!("{name}のデコードに失敗: {e}")))
}

/// 反復回数をリトルエンディアンのバイト列にし、末尾のゼロを取り除く
///
/// 0 は空ではなく `[0]` になる。
pub fn encode_iterations(iterations: u32) -> Vec<u8> {
    let bytes = iterations.to_le_bytes();
    let length = bytes.iter().rposition(|&b| b != 0).map_or(1, |i| i + 1);
    bytes[..length].to_vec()
}

/// リトルエンディアンのバイト列（最大4バイト）から反復回数を復元
pub fn decode_iterations(bytes: &[u8]) -> EnvelopeResult<u32> {
    if bytes.len() > ITERATION_BYTES {
        return Err(EnvelopeError::MalformedEnvelope(format!(
            "反復回数が{}バイトあります（最大{ITERATION_BYTES}バイト）",
            bytes.len()
        )));
    }
    let mut working = [0u8; ITERATION_BYTES];
    working[..bytes.len()].copy_from_slice(bytes);
    Ok(u32::from_le_bytes(working))
}

/// 暗号学的に安全な乱数でソルトを生成
pub fn get_random_salt(length: usize) -> Vec<u8> {
    let mut salt = vec![0u8; length];
    rand::rng().fill_bytes(&mut salt);
    salt
}

/// バイト列をパスワードで暗号化し、エンベロープ文字列を返す
pub fn encrypt_bytes(
    data: &[u8],
    password: &str,
    salt_length: usize,
    iterations: u32,
    hash_algorithm: HashAlgorithm,
) -> EnvelopeResult<String> {
    if salt_length == 0 {
        return Err(EnvelopeError::InvalidParameters(
            "ソルト長は1以上である必要があります".to_string(),
        ));
    }
    hash_algorithm.ensure_available()?;

    // 毎回新しいソルトを生成
    let salt = get_random_salt(salt_length);
    let fields = seal(data, password, salt, iterations, hash_algorithm)?;
    Ok(fields.encode())
}

/// 設定のパラメータで暗号化
pub fn encrypt_with_params(
    data: &[u8],
    password: &str,
    params: &EncryptionParams,
) -> EnvelopeResult<String> {
    encrypt_bytes(
        data,
        password,
        params.salt_length,
        params.iterations,
        params.hash_algorithm,
    )
}

/// 文字列をUTF-8として暗号化
pub fn encrypt_string(
    text: &str,
    password: &str,
    salt_length: usize,
    iterations: u32,
    hash_algorithm: HashAlgorithm,
) -> EnvelopeResult<String> {
    encrypt_bytes(
        text.as_bytes(),
        password,
        salt_length,
        iterations,
        hash_algorithm,
    )
}

/// エンベロープ文字列を復号化
pub fn decrypt_bytes(value: &str, password: &str) -> EnvelopeResult<Vec<u8>> {
    let fields = EnvelopeFields::parse(value)?;
    open(&fields, password)
}

/// エンベロープ文字列を復号化し、UTF-8文字列として返す
pub fn decrypt_string(value: &str, password: &str) -> EnvelopeResult<String> {
    let plaintext = decrypt_bytes(value, password)?;
    String::from_utf8(plaintext).map_err(|e| EnvelopeError::InvalidUtf8(e.to_string()))
}

/// 旧形式（`暗号文 L ソルト L 反復回数`、アルゴリズムは別途指定）を復号化
pub fn decrypt_legacy_bytes(
    value: &str,
    password: &str,
    hash_algorithm: HashAlgorithm,
) -> EnvelopeResult<Vec<u8>> {
    let segments: Vec<&str> = value.split(LEGACY_DELIMITER).collect();
    if segments.len() != LEGACY_SEGMENT_COUNT {
        return Err(EnvelopeError::MalformedEnvelope(format!(
            "旧形式は{LEGACY_SEGMENT_COUNT}個のセグメントが必要ですが{}個でした",
            segments.len()
        )));
    }

    let ciphertext = decode_segment("暗号文", segments[0])?;
    let salt = decode_segment("ソルト", segments[1])?;
    let iterations = decode_iterations(&decode_segment("反復回数", segments[2])?)?;
    if iterations == 0 {
        return Err(EnvelopeError::MalformedEnvelope(
            "反復回数が0です".to_string(),
        ));
    }
    hash_algorithm.ensure_available()?;

    let fields = EnvelopeFields {
        salt,
        iterations,
        hash_algorithm,
        ciphertext,
    };
    open(&fields, password)
}

fn seal(
    data: &[u8],
    password: &str,
    salt: Vec<u8>,
    iterations: u32,
    hash_algorithm: HashAlgorithm,
) -> EnvelopeResult<EnvelopeFields> {
    debug!(
        data_len = data.len(),
        salt_len = salt.len(),
        iterations,
        algorithm = %hash_algorithm,
        "AES-CBC 暗号化開始"
    );

    let material = derive_key_and_iv(password, &salt, iterations, hash_algorithm)?;
    let ciphertext = encrypt_using_aes(&material, data);

    debug!(ciphertext_len = ciphertext.len(), "AES-CBC 暗号化完了");

    Ok(EnvelopeFields {
        salt,
        iterations,
        hash_algorithm,
        ciphertext,
    })
}

fn open(fields: &EnvelopeFields, password: &str) -> EnvelopeResult<Vec<u8>> {
    debug!(
        ciphertext_len = fields.ciphertext.len(),
        iterations = fields.iterations,
        algorithm = %fields.hash_algorithm,
        "AES-CBC 復号化開始"
    );

    let material = derive_key_and_iv(
        password,
        &fields.salt,
        fields.iterations,
        fields.hash_algorithm,
    )?;
    let plaintext = decrypt_using_aes(&material, &fields.ciphertext)?;

    debug!(plaintext_len = plaintext.len(), "AES-CBC 復号化完了");
    Ok(plaintext)
}

fn encrypt_using_aes(material: &DerivedKeyMaterial, data: &[u8]) -> Vec<u8> {
    Aes256CbcEnc::new(material.key().into(), material.iv().into())
        .encrypt_padded_vec_mut::<Pkcs7>(data)
}

fn decrypt_using_aes(material: &DerivedKeyMaterial, data: &[u8]) -> EnvelopeResult<Vec<u8>> {
    Aes256CbcDec::new(material.key().into(), material.iv().into())
        .decrypt_padded_vec_mut::<Pkcs7>(data)
        .map_err(|_| {
            debug!("パディング検証に失敗");
            EnvelopeError::DecryptionFailed
        })
}
