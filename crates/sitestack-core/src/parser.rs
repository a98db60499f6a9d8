//! KDLパーサー
//!
//! `site.kdl` を読み込み、環境変数による上書きを適用して
//! [`SiteConfiguration`] を生成します。
//!
//! ```kdl
//! project "resume"
//! region "us-east-1"
//! site-path "./www"
//! index-document "index.html"
//! error-document "error.html"
//! domain "example.com"
//! ```
//!
//! 各ノードは `SITESTACK_<NODE>` 環境変数（例: `SITESTACK_CERTIFICATE_ARN`）
//! で上書きできます。証明書 ARN は環境変数から渡すことを想定しています。

use crate::config::{DomainConfig, SiteConfiguration};
use crate::error::{Result, SiteError};
use kdl::{KdlDocument, KdlNode};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 環境変数の接頭辞
pub const ENV_PREFIX: &str = "SITESTACK_";

const NODES: [&str; 7] = [
    "project",
    "region",
    "site-path",
    "index-document",
    "error-document",
    "domain",
    "certificate-arn",
];

/// ノード名に対応する環境変数名 (`site-path` → `SITESTACK_SITE_PATH`)
pub fn env_var_name(node: &str) -> String {
    format!("{}{}", ENV_PREFIX, node.replace('-', "_").to_ascii_uppercase())
}

/// 設定ファイルを読み込む
///
/// `site-path` は設定ファイルのあるディレクトリからの相対パスとして解決します。
pub fn parse_site_file<P: AsRef<Path>>(path: P) -> Result<SiteConfiguration> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    tracing::debug!(path = %path.display(), "Loading site configuration");
    parse_site_string(&content, base_dir)
}

/// KDL文字列をパース（プロセスの環境変数で上書き）
pub fn parse_site_string(content: &str, base_dir: &Path) -> Result<SiteConfiguration> {
    parse_site_string_with_env(content, base_dir, |name| std::env::var(name).ok())
}

/// KDL文字列をパース（環境変数の参照先を指定）
pub fn parse_site_string_with_env<F>(
    content: &str,
    base_dir: &Path,
    env: F,
) -> Result<SiteConfiguration>
where
    F: Fn(&str) -> Option<String>,
{
    let doc: KdlDocument = content.parse()?;

    let mut values: HashMap<&'static str, String> = HashMap::new();
    for node in doc.nodes() {
        let name = node.name().value();
        match NODES.iter().find(|n| **n == name) {
            Some(known) => {
                values.insert(*known, first_string(node)?);
            }
            None => {
                tracing::warn!(node = name, "Ignoring unknown configuration node");
            }
        }
    }

    for node in NODES {
        if let Some(value) = env(&env_var_name(node)).filter(|v| !v.is_empty()) {
            values.insert(node, value);
        }
    }

    let take = |values: &mut HashMap<&'static str, String>, node: &str| -> Result<String> {
        values
            .remove(node)
            .ok_or_else(|| {
                SiteError::Configuration(format!(
                    "{} が指定されていません（site.kdl または {}）",
                    node,
                    env_var_name(node)
                ))
            })
    };

    let project = values.remove("project").unwrap_or_else(|| {
        base_dir
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "site".to_string())
    });
    let region = take(&mut values, "region")?;
    let site_path = resolve_site_path(base_dir, &take(&mut values, "site-path")?);
    let index_document = take(&mut values, "index-document")?;
    let error_document = take(&mut values, "error-document")?;
    let domain = DomainConfig::from_parts(
        values.get("domain").map(String::as_str),
        values.get("certificate-arn").map(String::as_str),
    )?;

    let config = SiteConfiguration {
        project,
        region,
        site_path,
        index_document,
        error_document,
        domain,
    };
    config.validate()?;
    Ok(config)
}

fn first_string(node: &KdlNode) -> Result<String> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            SiteError::Configuration(format!(
                "{} には文字列の値が必要です",
                node.name().value()
            ))
        })
}

fn resolve_site_path(base_dir: &Path, site_path: &str) -> PathBuf {
    let path = PathBuf::from(site_path);
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}
