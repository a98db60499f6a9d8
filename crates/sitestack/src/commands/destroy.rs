use colored::Colorize;
use std::path::Path;

pub async fn handle(config_path: Option<&Path>, yes: bool) -> anyhow::Result<()> {
    println!("{}", "リソースの削除を開始します...".blue().bold());
    let (path, deployment) = super::load_deployment(config_path)?;
    super::print_config_path(&path);
    super::check_provider(&deployment).await?;

    let plan = deployment.plan_destroy().await?;
    if plan.actions.is_empty() {
        println!("{}", "削除するリソースはありません".green());
        return Ok(());
    }
    super::print_plan(&plan);

    if !yes {
        println!();
        println!(
            "{}",
            "警告: バケット内のオブジェクトを含むすべてのリソースを削除します。".yellow()
        );
        println!("実行するには --yes オプションを指定してください");
        return Ok(());
    }

    let report = deployment.destroy().await?;
    super::print_result(&report.result);

    if !report.is_success() {
        eprintln!();
        eprintln!("{}", "✗ 一部のリソースの削除に失敗しました".red().bold());
        std::process::exit(1);
    }
    println!();
    println!("{}", "✓ すべてのリソースを削除しました".green().bold());
    Ok(())
}
