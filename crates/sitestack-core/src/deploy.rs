//! デプロイコンテキスト
//!
//! 設定・プロバイダー・状態ファイルを1つにまとめ、宣言から出力値までの流れを
//! 明示的に受け渡します。

use crate::assets::AssetSet;
use crate::config::SiteConfiguration;
use crate::error::Result;
use crate::outputs::DeploymentOutputs;
use crate::stack::SiteStack;
use sitestack_cloud::{ApplyResult, CloudProvider, GlobalState, Plan, Reconciler, StateManager};
use std::sync::Arc;

/// `up` / `destroy` の結果
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub plan: Plan,
    pub result: ApplyResult,
    /// すべて成功した場合のみ
    pub outputs: Option<DeploymentOutputs>,
}

impl DeployReport {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

/// 1つのサイトに対するデプロイ操作
pub struct Deployment {
    config: SiteConfiguration,
    provider: Arc<dyn CloudProvider>,
    state_manager: StateManager,
}

impl Deployment {
    pub fn new(
        config: SiteConfiguration,
        provider: Arc<dyn CloudProvider>,
        state_manager: StateManager,
    ) -> Self {
        Self {
            config,
            provider,
            state_manager,
        }
    }

    pub fn config(&self) -> &SiteConfiguration {
        &self.config
    }

    pub fn state_manager(&self) -> &StateManager {
        &self.state_manager
    }

    pub fn provider(&self) -> &dyn CloudProvider {
        self.provider.as_ref()
    }

    /// アセットを読み込みリソースを宣言する
    pub fn declare(&self) -> Result<SiteStack> {
        let assets = AssetSet::scan(&self.config.site_path)?;
        SiteStack::declare(&self.config, &assets)
    }

    /// 変更内容を計算する（状態は変更しない）
    pub async fn plan(&self) -> Result<(SiteStack, Plan)> {
        let stack = self.declare()?;
        let state = self.load_state().await?;
        let plan = Reconciler::new(self.provider.as_ref()).plan(&stack.resources, &state)?;
        Ok((stack, plan))
    }

    /// 宣言どおりにリソースを作成・更新・削除する
    ///
    /// 途中で失敗しても、作成済みのリソースは状態ファイルに記録されます。
    pub async fn up(&self) -> Result<DeployReport> {
        let stack = self.declare()?;

        let lock = self.state_manager.acquire_lock().await?;
        let mut state = self.load_state().await?;

        let reconciler = Reconciler::new(self.provider.as_ref());
        let plan = reconciler.plan(&stack.resources, &state)?;
        tracing::info!(summary = %plan.summary(), "Applying plan");

        let result = reconciler.apply(&stack.resources, &plan, &mut state).await?;
        self.state_manager.save(&state).await?;
        lock.release().await?;

        let outputs = if result.is_success() {
            Some(DeploymentOutputs::from_state(&self.config.domain, &state)?)
        } else {
            tracing::warn!(
                failed = result.failed.len(),
                skipped = result.skipped.len(),
                "Deployment finished with failures"
            );
            None
        };

        Ok(DeployReport {
            plan,
            result,
            outputs,
        })
    }

    /// 削除計画を計算する
    pub async fn plan_destroy(&self) -> Result<Plan> {
        let state = self.load_state().await?;
        Ok(Reconciler::new(self.provider.as_ref()).plan_destroy(&state)?)
    }

    /// 状態ファイルに記録されたリソースをすべて削除する
    pub async fn destroy(&self) -> Result<DeployReport> {
        let lock = self.state_manager.acquire_lock().await?;
        let mut state = self.load_state().await?;

        let reconciler = Reconciler::new(self.provider.as_ref());
        let plan = reconciler.plan_destroy(&state)?;
        let result = reconciler
            .apply(&sitestack_cloud::ResourceSet::new(), &plan, &mut state)
            .await?;
        self.state_manager.save(&state).await?;
        lock.release().await?;

        Ok(DeployReport {
            plan,
            result,
            outputs: None,
        })
    }

    /// 記録済みの状態から出力値を読み出す
    pub async fn outputs(&self) -> Result<DeploymentOutputs> {
        let state = self.state_manager.load().await?;
        DeploymentOutputs::from_state(&self.config.domain, &state)
    }

    async fn load_state(&self) -> Result<GlobalState> {
        let state = self.state_manager.load().await?;
        self.provider.import_state(&state).await?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DomainConfig;
    use crate::stack::StackKeys;
    use sitestack_aws::OfflineAwsProvider;
    use sitestack_cloud::ActionType;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    const CERT: &str = "arn:aws:acm:us-east-1:123456789012:certificate/very-secret";

    struct Fixture {
        dir: TempDir,
        provider: Arc<OfflineAwsProvider>,
        deployment: Deployment,
    }

    impl Fixture {
        fn new(domain: DomainConfig) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let www = dir.path().join("www");
            fs::create_dir(&www).unwrap();
            for (name, content) in [
                ("index.html", "<h1>resume</h1>"),
                ("style.css", "body { margin: 0 }"),
                ("logo.svg", "<svg/>"),
            ] {
                fs::write(www.join(name), content).unwrap();
            }

            let provider = Arc::new(OfflineAwsProvider::new("us-east-1"));
            let deployment = Self::deployment(dir.path(), domain, provider.clone());
            Self {
                dir,
                provider,
                deployment,
            }
        }

        fn deployment(
            root: &Path,
            domain: DomainConfig,
            provider: Arc<OfflineAwsProvider>,
        ) -> Deployment {
            let config = SiteConfiguration {
                project: "resume".to_string(),
                region: "us-east-1".to_string(),
                site_path: root.join("www"),
                index_document: "index.html".to_string(),
                error_document: "error.html".to_string(),
                domain,
            };
            Deployment::new(config, provider, StateManager::new(root))
        }

        fn write(&self, name: &str, content: &str) {
            fs::write(self.dir.path().join("www").join(name), content).unwrap();
        }

        fn keys(&self) -> StackKeys {
            StackKeys::for_domain(&self.deployment.config().domain)
        }

        async fn bucket_name(&self) -> String {
            self.provider.bucket_names().await.remove(0)
        }
    }

    #[tokio::test]
    async fn test_up_uploads_every_asset() {
        let fx = Fixture::new(DomainConfig::Default);
        let report = fx.deployment.up().await.unwrap();
        assert!(report.is_success(), "{:?}", report.result.failed);
        assert_eq!(report.plan.summary().create, 7);

        let bucket = fx.bucket_name().await;
        assert_eq!(
            fx.provider.object_keys(&bucket).await,
            vec!["index.html", "logo.svg", "style.css"]
        );
        let types: Vec<String> = content_types(&fx, &bucket).await;
        assert_eq!(types, vec!["text/html", "image/svg+xml", "text/css"]);
    }

    async fn content_types(fx: &Fixture, bucket: &str) -> Vec<String> {
        let mut types = Vec::new();
        for key in fx.provider.object_keys(bucket).await {
            types.push(fx.provider.object(bucket, &key).await.unwrap().content_type);
        }
        types
    }

    #[tokio::test]
    async fn test_second_up_is_noop() {
        let fx = Fixture::new(DomainConfig::Default);
        fx.deployment.up().await.unwrap();
        let mutations = fx.provider.mutation_count().await;

        let report = fx.deployment.up().await.unwrap();
        assert!(!report.plan.has_changes);
        assert_eq!(report.plan.summary().no_change, 7);
        assert_eq!(fx.provider.mutation_count().await, mutations);
    }

    #[tokio::test]
    async fn test_rerun_in_fresh_process_is_noop() {
        let fx = Fixture::new(DomainConfig::Default);
        fx.deployment.up().await.unwrap();

        let provider = Arc::new(OfflineAwsProvider::new("us-east-1"));
        let again = Fixture::deployment(fx.dir.path(), DomainConfig::Default, provider.clone());
        let (_, plan) = again.plan().await.unwrap();
        assert!(!plan.has_changes);

        fx.write("style.css", "body { margin: 1px }");
        let report = again.up().await.unwrap();
        assert!(report.is_success(), "{:?}", report.result.failed);
        assert_eq!(report.plan.summary().update, 1);
        assert_eq!(provider.mutation_count().await, 1);
    }

    #[tokio::test]
    async fn test_changed_file_is_single_update() {
        let fx = Fixture::new(DomainConfig::Default);
        fx.deployment.up().await.unwrap();

        fx.write("index.html", "<h1>updated</h1>");
        let (_, plan) = fx.deployment.plan().await.unwrap();
        let updates = plan.actions_by_type(ActionType::Update);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].resource_key, StackKeys::object("index.html"));

        let before = fx.provider.mutation_count().await;
        fx.deployment.up().await.unwrap();
        assert_eq!(fx.provider.mutation_count().await, before + 1);

        let bucket = fx.bucket_name().await;
        let object = fx.provider.object(&bucket, "index.html").await.unwrap();
        assert_eq!(object.size, "<h1>updated</h1>".len());
    }

    #[tokio::test]
    async fn test_removed_file_is_single_delete() {
        let fx = Fixture::new(DomainConfig::Default);
        fx.deployment.up().await.unwrap();

        fs::remove_file(fx.dir.path().join("www").join("logo.svg")).unwrap();
        let report = fx.deployment.up().await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.plan.summary().delete, 1);

        let bucket = fx.bucket_name().await;
        assert_eq!(
            fx.provider.object_keys(&bucket).await,
            vec!["index.html", "style.css"]
        );
    }

    #[tokio::test]
    async fn test_moved_checkout_is_noop() {
        let fx = Fixture::new(DomainConfig::Default);
        fx.deployment.up().await.unwrap();
        let mutations = fx.provider.mutation_count().await;

        let elsewhere = tempfile::tempdir().unwrap();
        let moved = elsewhere.path().join("checkout");
        fs::rename(fx.dir.path(), &moved).unwrap();

        let deployment = Fixture::deployment(&moved, DomainConfig::Default, fx.provider.clone());
        let report = deployment.up().await.unwrap();
        assert!(report.is_success(), "{:?}", report.result.failed);
        assert!(!report.plan.has_changes, "{}", report.plan.summary());
        assert_eq!(fx.provider.mutation_count().await, mutations);
    }

    #[tokio::test]
    async fn test_switching_to_custom_domain_leaves_one_bucket() {
        let fx = Fixture::new(DomainConfig::Default);
        fx.deployment.up().await.unwrap();

        let custom = DomainConfig::from_parts(Some("example.com"), Some(CERT)).unwrap();
        let deployment = Fixture::deployment(fx.dir.path(), custom, fx.provider.clone());
        let report = deployment.up().await.unwrap();
        assert!(report.is_success(), "{:?}", report.result.failed);

        let summary = report.plan.summary();
        assert_eq!((summary.create, summary.update, summary.delete), (4, 3, 4));

        let buckets = fx.provider.bucket_names().await;
        assert_eq!(buckets.len(), 1);
        assert!(buckets[0].starts_with("example.com-bucket-"));
        assert_eq!(
            fx.provider.object_keys(&buckets[0]).await,
            vec!["index.html", "logo.svg", "style.css"]
        );
        assert_eq!(
            report.outputs.unwrap().website_url,
            "https://example.com"
        );

        let again = deployment.up().await.unwrap();
        assert!(!again.plan.has_changes);
    }

    #[tokio::test]
    async fn test_default_domain_outputs() {
        let fx = Fixture::new(DomainConfig::Default);
        let report = fx.deployment.up().await.unwrap();
        let outputs = report.outputs.unwrap();

        assert!(outputs.bucket_name.starts_with("interactive-resume-bucket-"));
        assert!(outputs.cdn_domain.ends_with(".cloudfront.net"));
        assert_eq!(outputs.website_url, format!("https://{}", outputs.cdn_domain));
        assert_eq!(
            outputs.s3_website_url,
            format!("http://{}", outputs.bucket_website_endpoint)
        );
        assert_eq!(fx.deployment.outputs().await.unwrap(), outputs);
    }

    #[tokio::test]
    async fn test_custom_domain_keeps_certificate_secret() {
        let domain = DomainConfig::from_parts(Some("example.com"), Some(CERT)).unwrap();
        let fx = Fixture::new(domain);

        let (_, plan) = fx.deployment.plan().await.unwrap();
        assert!(!serde_json::to_string(&plan).unwrap().contains("very-secret"));

        let report = fx.deployment.up().await.unwrap();
        assert!(report.is_success(), "{:?}", report.result.failed);
        assert_eq!(report.outputs.unwrap().website_url, "https://example.com");

        let state_file = fs::read_to_string(fx.deployment.state_manager().state_path()).unwrap();
        assert!(!state_file.contains("very-secret"));
        assert!(!format!("{:?}", fx.deployment.config()).contains("very-secret"));
    }

    #[tokio::test]
    async fn test_policy_grants_only_the_realized_identity() {
        let fx = Fixture::new(DomainConfig::Default);
        fx.deployment.up().await.unwrap();

        let state = fx.deployment.state_manager().load().await.unwrap();
        let keys = fx.keys();
        let iam_arn: String = state
            .get_resource(&keys.identity)
            .and_then(|r| r.get_attribute("iam_arn"))
            .unwrap();
        let bucket_arn: String = state
            .get_resource(&keys.bucket)
            .and_then(|r| r.get_attribute("arn"))
            .unwrap();

        let policy = fx.provider.bucket_policy(&fx.bucket_name().await).await.unwrap();
        assert_eq!(policy.statement.len(), 1);
        assert_eq!(policy.statement[0].principal.aws, iam_arn);
        assert_eq!(policy.statement[0].resource, format!("{}/*", bucket_arn));
    }

    #[tokio::test]
    async fn test_failed_bucket_skips_dependents_and_keeps_identity() {
        let fx = Fixture::new(DomainConfig::Default);
        let keys = fx.keys();
        fx.provider.inject_failure(keys.bucket.clone()).await;

        let report = fx.deployment.up().await.unwrap();
        assert!(!report.is_success());
        assert!(report.outputs.is_none());
        assert_eq!(report.result.failed.len(), 1);
        // three objects, the policy and the distribution
        assert_eq!(report.result.skipped.len(), 5);
        assert!(
            report
                .result
                .skipped
                .iter()
                .all(|s| s.message.contains("never resolved"))
        );

        let state = fx.deployment.state_manager().load().await.unwrap();
        assert!(state.get_resource(&keys.identity).is_some());
        assert!(state.get_resource(&keys.bucket).is_none());

        // fixed configuration reconciles only the delta
        fx.provider.clear_failures().await;
        let report = fx.deployment.up().await.unwrap();
        assert!(report.is_success(), "{:?}", report.result.failed);
        assert_eq!(report.plan.summary().no_change, 1);
        assert_eq!(report.plan.summary().create, 6);
    }

    #[tokio::test]
    async fn test_distribution_propagation_delay() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("www")).unwrap();
        fs::write(dir.path().join("www").join("index.html"), "x").unwrap();
        let provider = Arc::new(
            OfflineAwsProvider::new("us-east-1").with_distribution_delay(Duration::from_millis(50)),
        );
        let deployment = Fixture::deployment(dir.path(), DomainConfig::Default, provider.clone());

        let report = deployment.up().await.unwrap();
        assert!(report.is_success());
        let state = deployment.state_manager().load().await.unwrap();
        let cdn = state
            .get_resource(&StackKeys::for_domain(&DomainConfig::Default).distribution)
            .unwrap();
        assert_eq!(cdn.get_attribute::<String>("status").as_deref(), Some("Deployed"));
    }

    #[tokio::test]
    async fn test_destroy_removes_everything() {
        let fx = Fixture::new(DomainConfig::Default);
        fx.deployment.up().await.unwrap();

        let plan = fx.deployment.plan_destroy().await.unwrap();
        assert_eq!(plan.summary().delete, 7);

        let report = fx.deployment.destroy().await.unwrap();
        assert!(report.is_success(), "{:?}", report.result.failed);
        assert!(fx.provider.bucket_names().await.is_empty());

        let state = fx.deployment.state_manager().load().await.unwrap();
        assert!(state.resources.is_empty());
    }

    #[tokio::test]
    async fn test_missing_site_directory_fails_before_declaring() {
        let fx = Fixture::new(DomainConfig::Default);
        fs::remove_dir_all(fx.dir.path().join("www")).unwrap();

        let err = fx.deployment.up().await.unwrap_err();
        assert!(matches!(err, crate::error::SiteError::Filesystem { .. }));
        assert_eq!(fx.provider.mutation_count().await, 0);
        assert!(!fx.deployment.state_manager().state_path().exists());
    }
}
