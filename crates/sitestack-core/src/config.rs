//! サイト設定モデル

use crate::error::{Result, SiteError};
use std::fmt;
use std::path::PathBuf;

/// ドメイン未指定時に使う既定のドメイン名
pub const DEFAULT_DOMAIN: &str = "interactive-resume";

/// ログや Debug 出力に値を出さない文字列
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// 生の値を取り出す
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

/// 配信ドメイン
///
/// 既定ドメインでは CloudFront の既定証明書を使い、独自ドメインでは ACM
/// 証明書が必須です。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainConfig {
    Default,
    Custom {
        domain: String,
        certificate_arn: Secret,
    },
}

impl DomainConfig {
    /// ドメイン名と証明書 ARN から構築
    ///
    /// 既定ドメイン名を明示した場合は未指定と同じ扱いです。独自ドメインで
    /// 証明書が無い、または空の場合は設定エラーです。
    pub fn from_parts(domain: Option<&str>, certificate_arn: Option<&str>) -> Result<Self> {
        let domain = domain.map(str::trim).filter(|d| !d.is_empty());
        match domain {
            None => Ok(DomainConfig::Default),
            Some(d) if d.eq_ignore_ascii_case(DEFAULT_DOMAIN) => Ok(DomainConfig::Default),
            Some(d) => {
                let certificate_arn = certificate_arn
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| {
                        SiteError::Configuration(format!(
                            "独自ドメイン {} には certificate-arn が必要です",
                            d
                        ))
                    })?;
                Ok(DomainConfig::Custom {
                    domain: d.to_ascii_lowercase(),
                    certificate_arn: Secret::new(certificate_arn),
                })
            }
        }
    }

    /// リソース名の接頭辞に使うドメイン名
    pub fn name(&self) -> &str {
        match self {
            DomainConfig::Default => DEFAULT_DOMAIN,
            DomainConfig::Custom { domain, .. } => domain,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, DomainConfig::Custom { .. })
    }
}

/// 読み込み済みのサイト設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfiguration {
    pub project: String,
    pub region: String,
    /// アセットを読み込むディレクトリ
    pub site_path: PathBuf,
    pub index_document: String,
    pub error_document: String,
    pub domain: DomainConfig,
}

impl SiteConfiguration {
    /// 必須項目の検証
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("project", self.project.as_str()),
            ("region", self.region.as_str()),
            ("index-document", self.index_document.as_str()),
            ("error-document", self.error_document.as_str()),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(SiteError::Configuration(format!("{} が指定されていません", name)));
        }
        if self.site_path.as_os_str().is_empty() {
            return Err(SiteError::Configuration(
                "site-path が指定されていません".to_string(),
            ));
        }
        for (name, document) in [
            ("index-document", &self.index_document),
            ("error-document", &self.error_document),
        ] {
            if document.contains('/') {
                return Err(SiteError::Configuration(format!(
                    "{} はサイトディレクトリ直下のファイル名で指定してください: {}",
                    name, document
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(domain: DomainConfig) -> SiteConfiguration {
        SiteConfiguration {
            project: "resume".to_string(),
            region: "us-east-1".to_string(),
            site_path: PathBuf::from("./www"),
            index_document: "index.html".to_string(),
            error_document: "error.html".to_string(),
            domain,
        }
    }

    #[test]
    fn test_unset_domain_is_default() {
        assert_eq!(
            DomainConfig::from_parts(None, None).unwrap(),
            DomainConfig::Default
        );
        assert_eq!(
            DomainConfig::from_parts(Some(DEFAULT_DOMAIN), Some("arn:ignored")).unwrap(),
            DomainConfig::Default
        );
        assert_eq!(DomainConfig::Default.name(), "interactive-resume");
    }

    #[test]
    fn test_custom_domain_requires_certificate() {
        let err = DomainConfig::from_parts(Some("example.com"), None).unwrap_err();
        assert!(matches!(err, SiteError::Configuration(_)));

        let err = DomainConfig::from_parts(Some("example.com"), Some("  ")).unwrap_err();
        assert!(matches!(err, SiteError::Configuration(_)));
    }

    #[test]
    fn test_custom_domain_is_lowercased() {
        let domain =
            DomainConfig::from_parts(Some("Example.COM"), Some("arn:aws:acm:cert")).unwrap();
        assert!(domain.is_custom());
        assert_eq!(domain.name(), "example.com");
    }

    #[test]
    fn test_secret_is_hidden() {
        let domain = DomainConfig::from_parts(
            Some("example.com"),
            Some("arn:aws:acm:us-east-1:123456789012:certificate/secret-id"),
        )
        .unwrap();
        let cfg = config(domain);

        let debug = format!("{:?}", cfg);
        assert!(!debug.contains("secret-id"));
        assert!(debug.contains("***"));

        let DomainConfig::Custom {
            certificate_arn, ..
        } = &cfg.domain
        else {
            panic!("expected custom domain");
        };
        assert_eq!(certificate_arn.to_string(), "***");
        assert!(certificate_arn.expose().ends_with("secret-id"));
    }

    #[test]
    fn test_validate_required_fields() {
        assert!(config(DomainConfig::Default).validate().is_ok());

        let mut missing_region = config(DomainConfig::Default);
        missing_region.region = String::new();
        assert!(matches!(
            missing_region.validate(),
            Err(SiteError::Configuration(msg)) if msg.contains("region")
        ));

        let mut nested_index = config(DomainConfig::Default);
        nested_index.index_document = "docs/index.html".to_string();
        assert!(nested_index.validate().is_err());
    }
}
