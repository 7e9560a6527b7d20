use crate::error::{EnvelopeError, EnvelopeResult};
use std::collections::HashMap;
use std::sync::LazyLock;

const SHIFT: u32 = 5;
const MASK: u32 = 31;

/// アルファベットの文字数
pub const ALPHABET_SIZE: usize = 32;

/// 標準のBase32アルファベット
pub mod alphabet {
    /// RFC 4648
    pub const RFC4648: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
    /// Crockford（I, L, O, U を除外）
    pub const CROCKFORD: &str = "0123456789ABCDEFGHJKMNPQRSTVWXYZ";
    /// 単語になりにくい文字のみ
    pub const WORD_SAFE: &str = "23456789CFGHJMPQRVWXcfghjmpqrvwx";
}

static RFC4648: LazyLock<Base32Encoder> =
    LazyLock::new(|| Base32Encoder::from_preset(alphabet::RFC4648));
static CROCKFORD: LazyLock<Base32Encoder> =
    LazyLock::new(|| Base32Encoder::from_preset(alphabet::CROCKFORD));
static WORD_SAFE: LazyLock<Base32Encoder> =
    LazyLock::new(|| Base32Encoder::from_preset(alphabet::WORD_SAFE));

/// RFC 4648 エンコーダ
pub fn rfc4648() -> &'static Base32Encoder {
    &RFC4648
}

/// Crockford エンコーダ（エンベロープのワイヤ形式）
pub fn crockford() -> &'static Base32Encoder {
    &CROCKFORD
}

/// word-safe エンコーダ
pub fn word_safe() -> &'static Base32Encoder {
    &WORD_SAFE
}

/// Base32のエンコード/デコード
pub trait Base32: Send + Sync {
    fn encode(&self, bytes: &[u8]) -> String;
    fn decode(&self, input: &str) -> EnvelopeResult<Vec<u8>>;
}

/// 任意の32文字アルファベットによるBase32エンコーダ
///
/// 入力をビッグエンディアンのビット列として5ビットずつ読み、
/// 最後の半端なグループは下位をゼロで埋める。パディング文字は出力しない。
/// デコードは大文字小文字を区別する。
#[derive(Debug, Clone)]
pub struct Base32Encoder {
    symbols: Vec<char>,
    lookup: HashMap<char, u8>,
}

impl Base32Encoder {
    /// アルファベットからエンコーダを作成
    pub fn new(alphabet: &str) -> EnvelopeResult<Self> {
        let symbols: Vec<char> = alphabet.chars().collect();
        if symbols.len() != ALPHABET_SIZE {
            return Err(EnvelopeError::InvalidAlphabet(format!(
                "{ALPHABET_SIZE}文字が必要ですが{}文字でした",
                symbols.len()
            )));
        }

        let mut lookup = HashMap::with_capacity(ALPHABET_SIZE);
        for (value, &symbol) in symbols.iter().enumerate() {
            if lookup.insert(symbol, value as u8).is_some() {
                return Err(EnvelopeError::InvalidAlphabet(format!(
                    "文字 '{symbol}' が重複しています"
                )));
            }
        }

        Ok(Self { symbols, lookup })
    }

    fn from_preset(alphabet: &'static str) -> Self {
        let symbols: Vec<char> = alphabet.chars().collect();
        let lookup = symbols
            .iter()
            .enumerate()
            .map(|(value, &symbol)| (symbol, value as u8))
            .collect();
        Self { symbols, lookup }
    }

    /// アルファベット文字列
    pub fn alphabet(&self) -> String {
        self.symbols.iter().collect()
    }

    /// 文字がアルファベットに含まれるか
    pub fn contains(&self, symbol: char) -> bool {
        self.lookup.contains_key(&symbol)
    }

    pub fn encode(&self, bytes: &[u8]) -> String {
        if bytes.is_empty() {
            return String::new();
        }

        let output_length = (bytes.len() * 8).div_ceil(SHIFT as usize);
        let mut output = String::with_capacity(output_length);

        let mut buffer: u32 = 0;
        let mut bits_left: u32 = 0;
        for &byte in bytes {
            buffer = (buffer << 8) | u32::from(byte);
            bits_left += 8;
            while bits_left >= SHIFT {
                let index = MASK & (buffer >> (bits_left - SHIFT));
                bits_left -= SHIFT;
                output.push(self.symbols[index as usize]);
            }
            buffer &= (1 << bits_left) - 1;
        }

        // 残りのビットを左詰めして最後の1文字にする
        if bits_left > 0 {
            let index = MASK & (buffer << (SHIFT - bits_left));
            output.push(self.symbols[index as usize]);
        }

        output
    }

    /// 5ビット単位で読み戻す。8ビットに満たない末尾のビットは捨てる
    pub fn decode(&self, input: &str) -> EnvelopeResult<Vec<u8>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let byte_count = input.chars().count() * SHIFT as usize / 8;
        let mut bytes = Vec::with_capacity(byte_count);

        let mut buffer: u32 = 0;
        let mut bits_left: u32 = 0;
        for symbol in input.chars() {
            let value = self.value_of(symbol)?;
            buffer = ((buffer << SHIFT) | u32::from(value)) & 0xFFF;
            bits_left += SHIFT;

            if bits_left >= 8 {
                bytes.push((buffer >> (bits_left - 8)) as u8);
                bits_left -= 8;
            }
        }

        Ok(bytes)
    }

    fn value_of(&self, symbol: char) -> EnvelopeResult<u8> {
        self.lookup
            .get(&symbol)
            .copied()
            .ok_or_else(|| EnvelopeError::InvalidSymbol {
                symbol,
                alphabet: self.alphabet(),
            })
    }
}

impl Base32 for Base32Encoder {
    fn encode(&self, bytes: &[u8]) -> String {
        Base32Encoder::encode(self, bytes)
    }

    fn decode(&self, input: &str) -> EnvelopeResult<Vec<u8>> {
        Base32Encoder::decode(self, input)
    }
}

/// Crockford Base32（寛容なデコード）
///
/// エンコード結果は [`crockford()`] と同一。デコード時は小文字を受け付け、
/// `I`/`L` を `1`、`O` を `0` として読み、ハイフンを無視する。
#[derive(Debug, Clone, Copy, Default)]
pub struct CrockfordBase32;

impl CrockfordBase32 {
    fn normalize(symbol: char) -> Option<char> {
        match symbol.to_ascii_uppercase() {
            '-' => None,
            'I' | 'L' => Some('1'),
            'O' => Some('0'),
            other => Some(other),
        }
    }
}

impl Base32 for CrockfordBase32 {
    fn encode(&self, bytes: &[u8]) -> String {
        crockford().encode(bytes)
    }

    fn decode(&self, input: &str) -> EnvelopeResult<Vec<u8>> {
        let encoder = crockford();
        let mut normalized = String::with_capacity(input.len());
        for symbol in input.chars() {
            let Some(mapped) = Self::normalize(symbol) else {
                continue;
            };
            if !encoder.contains(mapped) {
                return Err(EnvelopeError::InvalidSymbol {
                    symbol,
                    alphabet: encoder.alphabet(),
                });
            }
            normalized.push(mapped);
        }
        encoder.decode(&normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FOOBAR: [(&str, &str, &str, &str); 6] = [
        ("f", "MY", "CR", "Jj"),
        ("fo", "MZXQ", "CSQG", "JmhR"),
        ("foo", "MZXW6", "CSQPY", "Jmhgw"),
        ("foob", "MZXW6YQ", "CSQPYRG", "JmhgwjR"),
        ("fooba", "MZXW6YTB", "CSQPYRK1", "JmhgwjX3"),
        ("foobar", "MZXW6YTBOI", "CSQPYRK1E8", "JmhgwjX3PC"),
    ];

    #[test]
    fn test_known_vectors() {
        for (plain, rfc, crock, safe) in FOOBAR {
            assert_eq!(rfc4648().encode(plain.as_bytes()), rfc);
            assert_eq!(crockford().encode(plain.as_bytes()), crock);
            assert_eq!(word_safe().encode(plain.as_bytes()), safe);

            assert_eq!(rfc4648().decode(rfc).unwrap(), plain.as_bytes());
            assert_eq!(crockford().decode(crock).unwrap(), plain.as_bytes());
            assert_eq!(word_safe().decode(safe).unwrap(), plain.as_bytes());
        }
    }

    #[test]
    fn test_single_byte_edges() {
        assert_eq!(crockford().encode(&[0x00]), "00");
        assert_eq!(crockford().encode(&[0xFF]), "ZW");
        assert_eq!(crockford().encode(b"Hello"), "91JPRV3F");
    }

    #[test]
    fn test_empty() {
        assert_eq!(rfc4648().encode(&[]), "");
        assert!(rfc4648().decode("").unwrap().is_empty());
        assert_eq!(CrockfordBase32.encode(&[]), "");
        assert!(CrockfordBase32.decode("").unwrap().is_empty());
    }

    #[test]
    fn test_output_lengths() {
        for len in 0..=20usize {
            let data = vec![0xA5u8; len];
            let encoded = crockford().encode(&data);
            assert_eq!(encoded.len(), (len * 8).div_ceil(5));
        }
    }

    #[test]
    fn test_decode_drops_incomplete_trailing_bits() {
        // 1文字 = 5ビットでは1バイトにならない
        assert!(rfc4648().decode("M").unwrap().is_empty());
        assert_eq!(rfc4648().decode("MZX").unwrap(), b"f");
    }

    #[test]
    fn test_invalid_symbol_is_case_sensitive() {
        let err = crockford().decode("0u").unwrap_err();
        assert_eq!(
            err,
            EnvelopeError::InvalidSymbol {
                symbol: 'u',
                alphabet: alphabet::CROCKFORD.to_string(),
            }
        );

        assert!(matches!(
            crockford().decode("csqg"),
            Err(EnvelopeError::InvalidSymbol { symbol: 'c', .. })
        ));
        assert!(matches!(
            rfc4648().decode("MZXW1"),
            Err(EnvelopeError::InvalidSymbol { symbol: '1', .. })
        ));
    }

    #[test]
    fn test_delimiter_not_in_crockford() {
        assert!(!crockford().contains('U'));
        assert!(!crockford().contains('L'));
    }

    #[test]
    fn test_custom_alphabet() {
        let reversed: String = alphabet::RFC4648.chars().rev().collect();
        let encoder = Base32Encoder::new(&reversed).unwrap();
        assert_eq!(encoder.alphabet(), reversed);
        let encoded = encoder.encode(b"foobar");
        assert_eq!(encoder.decode(&encoded).unwrap(), b"foobar");
    }

    #[test]
    fn test_alphabet_length_is_checked() {
        assert!(matches!(
            Base32Encoder::new("ABC"),
            Err(EnvelopeError::InvalidAlphabet(_))
        ));
        let too_long = format!("{}X", alphabet::CROCKFORD);
        assert!(Base32Encoder::new(&too_long).is_err());
    }

    #[test]
    fn test_alphabet_duplicates_are_rejected() {
        let duplicated = format!("{}A", &alphabet::RFC4648[..31]);
        assert!(matches!(
            Base32Encoder::new(&duplicated),
            Err(EnvelopeError::InvalidAlphabet(_))
        ));
    }

    #[test]
    fn test_non_ascii_alphabet() {
        let kana = "あいうえおかきくけこさしすせそたちつてとなにぬねのはひふへほまみ";
        let encoder = Base32Encoder::new(kana).unwrap();
        let encoded = encoder.encode(&[0x00, 0xFF]);
        assert_eq!(encoded.chars().count(), 4);
        assert_eq!(encoder.decode(&encoded).unwrap(), vec![0x00, 0xFF]);
    }

    #[test]
    fn test_crockford_variant_is_lenient() {
        assert_eq!(CrockfordBase32.encode(b"foobar"), "CSQPYRK1E8");
        assert_eq!(CrockfordBase32.decode("csqpyrk1e8").unwrap(), b"foobar");
        assert_eq!(CrockfordBase32.decode("CSQ-PYR-KlE8").unwrap(), b"foobar");
        assert_eq!(
            CrockfordBase32.decode("oo").unwrap(),
            crockford().decode("00").unwrap()
        );
        assert_eq!(
            CrockfordBase32.decode("ii").unwrap(),
            crockford().decode("11").unwrap()
        );
    }

    #[test]
    fn test_crockford_variant_rejects_u() {
        assert!(matches!(
            CrockfordBase32.decode("0u"),
            Err(EnvelopeError::InvalidSymbol { symbol: 'u', .. })
        ));
    }

    #[test]
    fn test_trait_objects() {
        let codecs: Vec<Box<dyn Base32>> = vec![
            Box::new(rfc4648().clone()),
            Box::new(CrockfordBase32),
        ];
        for codec in &codecs {
            let encoded = codec.encode(b"envelope");
            assert_eq!(codec.decode(&encoded).unwrap(), b"envelope");
        }
    }

    #[test]
    fn test_presets_shared_across_threads() {
        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                std::thread::spawn(move || {
                    let data = vec![i; 33];
                    crockford().decode(&crockford().encode(&data)).unwrap() == data
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }

    proptest! {
        #[test]
        fn prop_round_trip_all_presets(data in proptest::collection::vec(any::<u8>(), 0..128)) {
            for encoder in [rfc4648(), crockford(), word_safe()] {
                let encoded = encoder.encode(&data);
                prop_assert_eq!(encoder.decode(&encoded).unwrap(), data.clone());
            }
            prop_assert_eq!(CrockfordBase32.decode(&CrockfordBase32.encode(&data)).unwrap(), data);
        }
    }
}
