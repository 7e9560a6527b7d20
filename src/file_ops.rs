use crate::config::EncryptionParams;
use crate::crypto::{decrypt_bytes, encrypt_with_params};
use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

/// 暗号化ファイルの拡張子
pub const ENVELOPE_EXTENSION: &str = "env32";

/// 出力ファイルのパスを決定
pub fn determine_output_path(
    input: &Path,
    output: &Option<PathBuf>,
    is_encrypt: bool,
) -> Result<PathBuf> {
    match output {
        Some(path) => Ok(path.clone()),
        None => {
            if is_encrypt {
                // 暗号化の場合: .env32 拡張子の追加
                let mut path = input.to_path_buf();
                let new_name = format!(
                    "{}.{ENVELOPE_EXTENSION}",
                    input
                        .file_name()
                        .and_then(|s| s.to_str())
                        .ok_or_else(|| anyhow!("無効なファイル名"))?
                );
                path.set_file_name(new_name);
                Ok(path)
            } else {
                // 復号化の場合: .env32 拡張子の除去
                if input.extension().and_then(|e| e.to_str()) != Some(ENVELOPE_EXTENSION) {
                    return Err(anyhow!(
                        "暗号化ファイルの拡張子が不正です（.{ENVELOPE_EXTENSION} が必要）"
                    ));
                }
                let stem = input
                    .file_stem()
                    .ok_or_else(|| anyhow!("無効なファイル名"))?;
                let mut path = input.to_path_buf();
                path.set_file_name(stem);
                Ok(path)
            }
        }
    }
}

/// ファイルを暗号化し、エンベロープ文字列をテキストファイルとして書き出す
pub fn encrypt_file(
    input_path: &Path,
    output_path: &Path,
    password: &str,
    params: &EncryptionParams,
) -> Result<()> {
    let input_data = fs::read(input_path)
        .with_context(|| format!("ファイル読み込みに失敗: {}", input_path.display()))?;

    let envelope = encrypt_with_params(&input_data, password, params)
        .with_context(|| format!("ファイル暗号化に失敗: {}", input_path.display()))?;

    fs::write(output_path, &envelope)
        .with_context(|| format!("出力ファイルの書き込みに失敗: {}", output_path.display()))?;

    info!(
        input = %input_path.display(),
        output = %output_path.display(),
        bytes = input_data.len(),
        "ファイル暗号化完了"
    );
    Ok(())
}

/// エンベロープファイルを復号化
pub fn decrypt_file(input_path: &Path, output_path: &Path, password: &str) -> Result<()> {
    let content = fs::read_to_string(input_path)
        .with_context(|| format!("暗号化ファイルの読み込みに失敗: {}", input_path.display()))?;

    // 末尾の改行は許容する
    let plaintext = decrypt_bytes(content.trim_end(), password)
        .with_context(|| format!("ファイル復号化に失敗: {}", input_path.display()))?;

    fs::write(output_path, &plaintext)
        .with_context(|| format!("出力ファイルの書き込みに失敗: {}", output_path.display()))?;

    info!(
        input = %input_path.display(),
        output = %output_path.display(),
        bytes = plaintext.len(),
        "ファイル復号化完了"
    );
    Ok(())
}
