use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SITE_KDL: &str = r#"
project "resume"
region "us-east-1"
site-path "./www"
index-document "index.html"
error-document "error.html"
"#;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    /// site.kdl と3つのアセットを持つプロジェクト
    pub fn with_site() -> Self {
        let project = Self::new();
        project.write_site_kdl(SITE_KDL);
        project.write_asset("index.html", "<h1>resume</h1>");
        project.write_asset("style.css", "body { margin: 0 }");
        project.write_asset("logo.svg", "<svg/>");
        project
    }

    pub fn write_site_kdl(&self, content: &str) {
        fs::write(self.root.path().join("site.kdl"), content).unwrap();
    }

    pub fn write_asset(&self, name: &str, content: &str) {
        let dir = self.root.path().join("www");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    pub fn state_file(&self) -> PathBuf {
        self.root.path().join(".sitestack").join("state.json")
    }

    /// 環境から切り離した sitestack コマンド
    pub fn command(&self) -> Command {
        command_in(self.root.path())
    }
}

#[allow(deprecated)]
pub fn command_in(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sitestack").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    for node in [
        "CONFIG",
        "PROJECT",
        "REGION",
        "SITE_PATH",
        "INDEX_DOCUMENT",
        "ERROR_DOCUMENT",
        "DOMAIN",
        "CERTIFICATE_ARN",
    ] {
        cmd.env_remove(format!("SITESTACK_{}", node));
    }
    cmd
}
