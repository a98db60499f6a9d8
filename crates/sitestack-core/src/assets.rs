//! サイトアセットの収集
//!
//! サイトディレクトリ直下のファイルを列挙し、バケットへアップロードする
//! アセットの集合を作ります。サブディレクトリは対象外です。

use crate::content_type::content_type;
use crate::error::{Result, SiteError};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// アップロード対象の1ファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// サイトディレクトリからの相対パス（オブジェクトキー）
    pub relative_path: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    /// 読み込み元の絶対パス
    pub source: PathBuf,
}

impl Asset {
    /// 内容の SHA-256（16進）
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// 相対パスで一意なアセットの集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetSet {
    assets: BTreeMap<String, Asset>,
}

impl AssetSet {
    /// ディレクトリ直下のファイルを読み込む
    ///
    /// シンボリックリンクは辿り、ディレクトリはスキップします。隠しファイルも
    /// 含みます。ディレクトリが存在しない・読めない場合、ファイルが読めない
    /// 場合、またはファイル名が UTF-8 でない場合は [`SiteError::Filesystem`]
    /// を返します。
    pub fn scan(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|e| SiteError::filesystem(dir, e))?;

        let mut assets = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| SiteError::filesystem(dir, e))?;
            let path = entry.path();
            let metadata = fs::metadata(&path).map_err(|e| SiteError::filesystem(&path, e))?;
            if !metadata.is_file() {
                tracing::debug!(path = %path.display(), "Skipping non-file entry");
                continue;
            }

            // オブジェクトキーにできるのは UTF-8 のファイル名のみ
            let relative_path = entry.file_name().into_string().map_err(|_| {
                SiteError::filesystem(
                    &path,
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "file name is not valid UTF-8",
                    ),
                )
            })?;
            let bytes = fs::read(&path).map_err(|e| SiteError::filesystem(&path, e))?;
            let source = fs::canonicalize(&path).unwrap_or(path);

            assets.insert(
                relative_path.clone(),
                Asset {
                    content_type: content_type(&relative_path),
                    relative_path,
                    bytes,
                    source,
                },
            );
        }

        tracing::debug!(dir = %dir.display(), count = assets.len(), "Scanned site assets");
        Ok(Self { assets })
    }

    pub fn get(&self, relative_path: &str) -> Option<&Asset> {
        self.assets.get(relative_path)
    }

    /// 相対パス順に走査
    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn total_size(&self) -> usize {
        self.assets.values().map(Asset::size).sum()
    }
}
