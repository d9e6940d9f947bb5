//! 画像入力モジュール
//!
//! 画像ファイルをData URL（base64）へ変換し、解析エンドポイントと
//! 同じ規則で入力検証する。

use crate::error::{DefectVisionError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

/// デコード後の最大サイズ（10MB）
pub const MAX_IMAGE_SIZE_BYTES: usize = 10 * 1024 * 1024;

pub const ALLOWED_IMAGE_TYPES: &[&str] = &["png", "jpeg", "jpg", "webp", "gif"];

lazy_static! {
    static ref DATA_URL_PREFIX: Regex =
        Regex::new(r"(?i)^data:image/(png|jpeg|jpg|webp|gif);base64,").unwrap();
    static ref BASE64_BODY: Regex = Regex::new(r"^[A-Za-z0-9+/=]+$").unwrap();
}

/// 拡張子からMIMEタイプを推定
pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// 画像ファイルをData URLに変換
pub fn encode_data_url(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(DefectVisionError::FileNotFound(path.display().to_string()));
    }

    let mime_type = mime_type_for(path).ok_or_else(|| {
        DefectVisionError::InvalidImage(format!(
            "Invalid image format. Supported types: {}",
            ALLOWED_IMAGE_TYPES.join(", ")
        ))
    })?;

    // 読み込む前にサイズで弾く
    if std::fs::metadata(path)?.len() > MAX_IMAGE_SIZE_BYTES as u64 {
        return Err(too_large());
    }

    let bytes = std::fs::read(path)?;

    Ok(format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes)))
}

/// Data URLの入力検証
///
/// 形式・base64文字種・推定デコードサイズを確認する。
pub fn validate_data_url(image_base64: &str) -> Result<()> {
    if image_base64.is_empty() {
        return Err(DefectVisionError::InvalidImage(
            "Invalid image data: must be a non-empty string".into(),
        ));
    }

    if !DATA_URL_PREFIX.is_match(image_base64) {
        return Err(DefectVisionError::InvalidImage(format!(
            "Invalid image format. Must be base64-encoded image with data URL prefix. Supported types: {}",
            ALLOWED_IMAGE_TYPES.join(", ")
        )));
    }

    let payload = image_base64.split(',').nth(1).unwrap_or_default();
    if payload.is_empty() {
        return Err(DefectVisionError::InvalidImage(
            "Invalid base64 data: missing encoded content".into(),
        ));
    }

    if !BASE64_BODY.is_match(payload) {
        return Err(DefectVisionError::InvalidImage(
            "Invalid base64 encoding: contains invalid characters".into(),
        ));
    }

    // base64は約4/3倍になる
    let estimated_size = payload.len() * 3 / 4;
    if estimated_size > MAX_IMAGE_SIZE_BYTES {
        return Err(too_large());
    }

    Ok(())
}

fn too_large() -> DefectVisionError {
    DefectVisionError::InvalidImage(format!(
        "Image too large. Maximum size is {}MB",
        MAX_IMAGE_SIZE_BYTES / (1024 * 1024)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_for() {
        assert_eq!(mime_type_for(Path::new("x.JPG")), Some("image/jpeg"));
        assert_eq!(mime_type_for(Path::new("x.webp")), Some("image/webp"));
        assert_eq!(mime_type_for(Path::new("x.bmp")), None);
    }

    #[test]
    fn test_encode_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.png");
        std::fs::write(&path, b"\x89PNG fake").unwrap();

        let url = encode_data_url(&path).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert!(validate_data_url(&url).is_ok());
    }

    #[test]
    fn test_encode_rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.png");
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(MAX_IMAGE_SIZE_BYTES as u64 + 1).unwrap();

        let err = encode_data_url(&path).unwrap_err();
        assert_eq!(err.to_string(), "Image too large. Maximum size is 10MB");
    }

    #[test]
    fn test_encode_accepts_exact_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("limit.gif");
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(MAX_IMAGE_SIZE_BYTES as u64).unwrap();

        assert!(encode_data_url(&path).is_ok());
    }

    #[test]
    fn test_encode_missing_file() {
        let result = encode_data_url(Path::new("/nonexistent/part.png"));
        assert!(matches!(result, Err(DefectVisionError::FileNotFound(_))));
    }

    #[test]
    fn test_validate_rejects_missing_prefix() {
        let err = validate_data_url("aGVsbG8=").unwrap_err();
        assert!(err.to_string().contains("data URL prefix"));
    }

    #[test]
    fn test_validate_rejects_unsupported_type() {
        assert!(validate_data_url("data:image/bmp;base64,aGVsbG8=").is_err());
    }

    #[test]
    fn test_validate_prefix_case_insensitive() {
        assert!(validate_data_url("data:IMAGE/JPEG;base64,aGVsbG8=").is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_payload() {
        let err = validate_data_url("data:image/png;base64,").unwrap_err();
        assert!(err.to_string().contains("missing encoded content"));
    }

    #[test]
    fn test_validate_rejects_bad_characters() {
        let err = validate_data_url("data:image/png;base64,abc$def").unwrap_err();
        assert!(err.to_string().contains("invalid characters"));
    }

    #[test]
    fn test_validate_rejects_oversized() {
        let payload = "A".repeat(MAX_IMAGE_SIZE_BYTES / 3 * 4 + 8);
        let err = validate_data_url(&format!("data:image/png;base64,{}", payload)).unwrap_err();
        assert!(err.to_string().contains("Image too large"));
    }

    #[test]
    fn test_validate_rejects_empty() {
        assert!(validate_data_url("").is_err());
    }
}
