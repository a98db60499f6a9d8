use colored::Colorize;
use sitestack_core::{AssetSet, DomainConfig};
use std::path::Path;

pub fn handle(config_path: Option<&Path>) -> anyhow::Result<()> {
    println!("{}", "設定を検証中...".blue());

    let (path, config) = match super::load_config(config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ 設定エラー".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };
    super::print_config_path(&path);

    let assets = match AssetSet::scan(&config.site_path) {
        Ok(assets) => assets,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ サイトディレクトリエラー".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    println!("{}", "✓ 設定ファイルは正常です！".green().bold());
    println!();
    println!("サマリー:");
    println!("  プロジェクト: {}", config.project.cyan());
    println!("  リージョン: {}", config.region.cyan());
    match &config.domain {
        DomainConfig::Default => {
            println!("  ドメイン: {} (CloudFront 既定証明書)", config.domain.name().cyan())
        }
        DomainConfig::Custom { domain, .. } => {
            println!("  ドメイン: {} (ACM 証明書)", domain.cyan())
        }
    }
    println!("  サイトディレクトリ: {}", config.site_path.display());
    println!(
        "  アセット: {}個 ({} bytes)",
        assets.len(),
        assets.total_size()
    );
    for asset in assets.iter() {
        println!("    - {} ({})", asset.relative_path.cyan(), asset.content_type);
    }

    for document in [&config.index_document, &config.error_document] {
        if assets.get(document).is_none() {
            println!(
                "  {} {} がサイトディレクトリにありません",
                "⚠".yellow(),
                document
            );
        }
    }

    Ok(())
}
