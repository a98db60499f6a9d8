use colored::Colorize;
use std::path::Path;

pub async fn handle(config_path: Option<&Path>) -> anyhow::Result<()> {
    let (path, deployment) = super::load_deployment(config_path)?;
    super::print_config_path(&path);
    super::check_provider(&deployment).await?;
    let (_, plan) = deployment.plan().await?;

    super::print_plan(&plan);
    if !plan.has_changes {
        println!("{}", "✓ 変更はありません".green());
    }
    Ok(())
}
