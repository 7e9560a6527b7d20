use thiserror::Error;

/// ライブラリ全体のエラー型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// アルファベットが32文字でない、または重複がある
    #[error("無効なBase32アルファベット: {0}")]
    InvalidAlphabet(String),

    /// アルファベットに含まれない文字をデコードしようとした
    #[error("無効な文字 '{symbol}' が含まれています。使用できるのはアルファベット '{alphabet}' の文字のみです")]
    InvalidSymbol { symbol: char, alphabet: String },

    /// エンベロープ文字列の構造が不正
    #[error("エンベロープの形式が不正です: {0}")]
    MalformedEnvelope(String),

    /// 未対応のハッシュアルゴリズム
    #[error("未対応のハッシュアルゴリズム: {0}")]
    UnsupportedAlgorithm(String),

    /// 暗号化パラメータが不正
    #[error("パラメータが不正です: {0}")]
    InvalidParameters(String),

    /// 復号化に失敗（パスワード違いと暗号文の破損は区別できない）
    #[error("復号化に失敗しました（パスワードが違うか、データが破損しています）")]
    DecryptionFailed,

    /// 復号結果がUTF-8として不正
    #[error("UTF-8変換に失敗しました: {0}")]
    InvalidUtf8(String),
}

impl EnvelopeError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedEnvelope(_))
    }
}

pub type EnvelopeResult<T> = Result<T, EnvelopeError>;
