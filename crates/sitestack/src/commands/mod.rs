pub mod destroy;
pub mod outputs;
pub mod preview;
pub mod up;
pub mod validate;

use colored::Colorize;
use sitestack_aws::OfflineAwsProvider;
use sitestack_cloud::{ActionType, ApplyResult, CloudProvider, Plan, StateManager};
use sitestack_core::{Deployment, DeploymentOutputs, SiteConfiguration};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 設定ファイルを探して読み込む
pub fn load_config(config_path: Option<&Path>) -> anyhow::Result<(PathBuf, SiteConfiguration)> {
    let path = sitestack_config::find_site_file(config_path)?;
    let config = sitestack_core::parse_site_file(&path)?;
    Ok((path, config))
}

/// 設定ファイルのディレクトリを状態ファイルの置き場所としてデプロイを組み立てる
pub fn load_deployment(config_path: Option<&Path>) -> anyhow::Result<(PathBuf, Deployment)> {
    let (path, config) = load_config(config_path)?;
    let root = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    tracing::debug!(root = %root.display(), region = %config.region, "Preparing deployment");

    let provider = Arc::new(OfflineAwsProvider::new(&config.region));
    Ok((path, Deployment::new(config, provider, StateManager::new(root))))
}

/// オフラインプロバイダー使用時の注意書き
pub const OFFLINE_NOTICE: &str = "注意: オフラインプロバイダーで実行しています。AWS 上のリソースは作成・変更されません";

pub fn print_config_path(path: &Path) {
    println!("設定ファイル: {}", path.display().to_string().cyan());
}

/// プロバイダーの認証を確認し、接続先を表示する
pub async fn check_provider(deployment: &Deployment) -> anyhow::Result<()> {
    let provider: &dyn CloudProvider = deployment.provider();
    let status = provider.check_auth().await?;
    if !status.authenticated {
        anyhow::bail!(
            "{} の認証に失敗しました: {}",
            provider.display_name(),
            status.error.unwrap_or_default()
        );
    }

    println!(
        "プロバイダー: {} ({})",
        provider.display_name().cyan(),
        status.account_info.unwrap_or_default()
    );
    // load_deployment は常にオフラインプロバイダーを使う
    println!("{}", OFFLINE_NOTICE.yellow());
    Ok(())
}

pub fn print_plan(plan: &Plan) {
    println!();
    println!("{}", "変更内容:".bold());
    for action in &plan.actions {
        let line = format!(
            "{} {} {}",
            action.action_type.symbol(),
            action.resource_type,
            action.resource_id
        );
        let line = match action.action_type {
            ActionType::Create => line.green(),
            ActionType::Update => line.yellow(),
            ActionType::Delete => line.red(),
            ActionType::NoOp => line.dimmed(),
        };
        println!("  {}", line);
    }
    println!();
    println!("{}", plan.summary());
}

pub fn print_result(result: &ApplyResult) {
    println!();
    for success in &result.succeeded {
        println!("  {} {}", "✓".green(), success.message);
    }
    for failure in &result.failed {
        println!("  {} {}: {}", "✗".red(), failure.action_id, failure.message);
    }
    for skipped in &result.skipped {
        println!("  {} {}: {}", "-".yellow(), skipped.action_id, skipped.message);
    }
    println!();
    println!(
        "成功: {}  失敗: {}  スキップ: {}  ({} ms)",
        result.succeeded.len(),
        result.failed.len(),
        result.skipped.len(),
        result.duration_ms
    );
}

pub fn print_outputs(outputs: &DeploymentOutputs) {
    println!();
    println!("{}", "Outputs:".bold());
    println!("  bucketName:            {}", outputs.bucket_name.cyan());
    println!(
        "  bucketWebsiteEndpoint: {}",
        outputs.bucket_website_endpoint.cyan()
    );
    println!("  cdnDomain:             {}", outputs.cdn_domain.cyan());
    println!("  websiteUrl:            {}", outputs.website_url.cyan());
    println!("  s3WebsiteUrl:          {}", outputs.s3_website_url.cyan());
}
