pub mod error;

pub use error::*;

use std::path::{Path, PathBuf};

/// 設定ファイル名
pub const SITE_FILE: &str = "site.kdl";

/// 設定ファイルのパスを直接指定する環境変数
pub const CONFIG_ENV: &str = "SITESTACK_CONFIG";

/// グローバル設定ファイルのパス (~/.config/sitestack/site.kdl)
pub fn global_site_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sitestack").join(SITE_FILE))
}

/// site.kdl を探す
///
/// 以下の優先順位で設定ファイルを検索:
/// 1. 引数で指定されたパス
/// 2. 環境変数 SITESTACK_CONFIG
/// 3. カレントディレクトリ: site.kdl
/// 4. ./.sitestack/site.kdl
/// 5. ~/.config/sitestack/site.kdl (グローバル設定)
///
/// 1, 2 で指定されたファイルが存在しない場合はエラーになります。
pub fn find_site_file(explicit: Option<&Path>) -> Result<PathBuf> {
    // 1. 直接指定
    let explicit = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path);
        }
        return Err(ConfigError::ExplicitFileNotFound(path));
    }

    let current_dir = std::env::current_dir()?;

    // 2. カレントディレクトリ、.sitestack/ ディレクトリ
    for path in [
        current_dir.join(SITE_FILE),
        current_dir.join(".sitestack").join(SITE_FILE),
    ] {
        if path.is_file() {
            return Ok(path);
        }
    }

    // 3. グローバル設定
    if let Some(global) = global_site_file().filter(|p| p.is_file()) {
        return Ok(global);
    }

    Err(ConfigError::SiteFileNotFound)
}
