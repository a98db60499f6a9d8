use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "設定ファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: site.kdl\n\
        - ./.sitestack/site.kdl\n\
        - ~/.config/sitestack/site.kdl\n\
        または --config オプション / SITESTACK_CONFIG 環境変数で直接指定できます"
    )]
    SiteFileNotFound,

    #[error("指定された設定ファイルが存在しません: {0}")]
    ExplicitFileNotFound(PathBuf),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
