use std::path::Path;

pub async fn handle(config_path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let (_, deployment) = super::load_deployment(config_path)?;
    let outputs = deployment.outputs().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    } else {
        super::print_outputs(&outputs);
    }
    Ok(())
}
