use colored::Colorize;
use std::path::Path;

pub async fn handle(config_path: Option<&Path>, yes: bool) -> anyhow::Result<()> {
    println!("{}", "デプロイを開始します...".blue().bold());
    let (path, deployment) = super::load_deployment(config_path)?;
    super::print_config_path(&path);
    super::check_provider(&deployment).await?;

    let (_, plan) = deployment.plan().await?;
    super::print_plan(&plan);

    // 確認（--yesが指定されていない場合）
    if !yes {
        println!();
        println!("実行するには --yes オプションを指定してください");
        return Ok(());
    }

    let report = deployment.up().await?;
    super::print_result(&report.result);

    match report.outputs {
        Some(outputs) => {
            super::print_outputs(&outputs);
            println!();
            println!(
                "{} ({})",
                "✓ デプロイが完了しました".green().bold(),
                deployment.provider().display_name()
            );
            Ok(())
        }
        None => {
            eprintln!();
            eprintln!("{}", "✗ 一部のリソースの作成に失敗しました".red().bold());
            eprintln!("  作成済みのリソースは状態ファイルに記録されています");
            eprintln!("  設定を修正して再実行すると、差分のみ反映されます");
            std::process::exit(1);
        }
    }
}
