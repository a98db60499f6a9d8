//! SiteStack Core
//!
//! サイト設定の読み込み、アセットの収集、リソース宣言、デプロイ操作を
//! 提供します。

pub mod assets;
pub mod config;
pub mod content_type;
pub mod deploy;
pub mod error;
pub mod outputs;
pub mod parser;
pub mod stack;

pub use assets::{Asset, AssetSet};
pub use config::{DEFAULT_DOMAIN, DomainConfig, Secret, SiteConfiguration};
pub use content_type::{DEFAULT_CONTENT_TYPE, content_type};
pub use deploy::{DeployReport, Deployment};
pub use error::{Result, SiteError};
pub use outputs::DeploymentOutputs;
pub use parser::{env_var_name, parse_site_file, parse_site_string, parse_site_string_with_env};
pub use stack::{SiteStack, StackKeys};
