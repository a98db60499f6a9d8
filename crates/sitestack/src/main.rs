mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sitestack")]
#[command(about = "静的サイトを S3 + CloudFront へ宣言的にデプロイ", long_about = None)]
struct Cli {
    /// 設定ファイル (site.kdl) のパス
    #[arg(short, long, global = true, env = "SITESTACK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 設定とサイトディレクトリを検証
    Validate,
    /// 変更内容を表示（リソースは変更しない）
    Preview,
    /// リソースを作成・更新
    Up {
        /// 確認なしで適用する
        #[arg(short, long)]
        yes: bool,
    },
    /// 作成したリソースをすべて削除
    Destroy {
        /// 確認なしで削除する
        #[arg(short, long)]
        yes: bool,
    },
    /// デプロイ結果の出力値を表示
    Outputs {
        /// JSON で出力
        #[arg(long)]
        json: bool,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログは stderr へ（RUST_LOG で調整）
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Validate => commands::validate::handle(config_path)?,
        Commands::Preview => commands::preview::handle(config_path).await?,
        Commands::Up { yes } => commands::up::handle(config_path, yes).await?,
        Commands::Destroy { yes } => commands::destroy::handle(config_path, yes).await?,
        Commands::Outputs { json } => commands::outputs::handle(config_path, json).await?,
        // 設定ファイル不要
        Commands::Version => println!("sitestack {}", env!("CARGO_PKG_VERSION")),
    }

    Ok(())
}
