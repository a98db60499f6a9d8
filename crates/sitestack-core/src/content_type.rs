//! Content-Type 判定
//!
//! ファイル名の拡張子から MIME タイプを決定します。

use std::path::Path;

/// 未知の拡張子に使うフォールバック
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// ファイル名から Content-Type を返す
///
/// 拡張子は大文字小文字を区別しません。拡張子が無い、または未知の場合は
/// [`DEFAULT_CONTENT_TYPE`] を返します。
pub fn content_type(filename: impl AsRef<Path>) -> &'static str {
    let Some(extension) = filename
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
    else {
        return DEFAULT_CONTENT_TYPE;
    };

    match extension.as_str() {
        "html" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => DEFAULT_CONTENT_TYPE,
    }
}
