//! Built-in generator: copies pages and assets and writes `manifest.json`.

use std::path::Path;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use bindery_core::hook::{empty_payload, keep_output};
use bindery_core::{Generator, Output, call_hook};
use bindery_plugins::HOOK_FINISH;
use bindery_shared::{BinderyError, Page, Result};

/// Name of the file listing everything the build produced.
pub(crate) const MANIFEST_FILE: &str = "manifest.json";

pub(crate) struct ManifestGenerator;

#[async_trait]
impl Generator for ManifestGenerator {
    fn name(&self) -> &str {
        "manifest"
    }

    async fn on_init(&self, output: Output) -> Result<Output> {
        let dir = output.output_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| BinderyError::io(&dir, e))?;
        Ok(output)
    }

    async fn on_asset(&self, output: Output, asset: &str) -> Result<Output> {
        let source = output.book().root().join(asset);
        let target = output.output_dir().join(asset);
        ensure_parent(&target).await?;
        tokio::fs::copy(&source, &target)
            .await
            .map_err(|e| BinderyError::io(&source, e))?;
        debug!(asset, "asset copied");
        Ok(output.with_artifact(asset))
    }

    async fn on_page(&self, output: Output, page: &Page) -> Result<Output> {
        let target = output.output_dir().join(&page.path);
        ensure_parent(&target).await?;
        tokio::fs::write(&target, &page.content)
            .await
            .map_err(|e| BinderyError::io(&target, e))?;
        Ok(output.with_artifact(page.path.as_str()))
    }

    async fn on_finish(&self, output: Output) -> Result<Output> {
        let output = call_hook(HOOK_FINISH, empty_payload, keep_output, output).await?;

        let pages: Vec<_> = output
            .pages()
            .values()
            .map(|p| json!({"path": p.path, "title": p.title, "level": p.level}))
            .collect();
        let manifest = json!({
            "title": output.book().title(),
            "generator": output.generator(),
            "built_at": output.started_at().to_rfc3339(),
            "plugins": output.plugins().serialize(),
            "pages": pages,
            "assets": output.assets(),
        });

        let content = serde_json::to_string_pretty(&manifest)
            .map_err(|e| BinderyError::Generator(format!("failed to encode manifest: {e}")))?;
        let path = output.output_dir().join(MANIFEST_FILE);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| BinderyError::io(&path, e))?;

        Ok(output.with_artifact(MANIFEST_FILE))
    }
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BinderyError::io(parent, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use bindery_core::{Book, BuildOptions, Pipeline, SilentProgress};
    use bindery_plugins::{HookCatalog, NpmRegistry, PluginInstaller, TarballInstaller};

    fn temp_dir() -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("bindery-manifest-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// A pipeline whose registry is never reached: the test book has no plugins.
    fn offline_pipeline() -> Pipeline {
        let registry = NpmRegistry::new(
            "http://127.0.0.1:9/".parse().unwrap(),
            Duration::from_secs(1),
        );
        let installer = PluginInstaller::new(
            Arc::new(registry.clone()),
            Arc::new(TarballInstaller::new(registry)),
            semver::Version::new(1, 0, 0),
            "bindery",
        );
        Pipeline::new(installer, HookCatalog::new())
    }

    #[tokio::test]
    async fn build_writes_pages_assets_and_manifest() {
        let root = temp_dir();
        std::fs::write(root.join("book.json"), r#"{"title": "Notes"}"#).unwrap();
        std::fs::write(
            root.join("SUMMARY.json"),
            r#"[{"articles": [{"title": "One", "ref": "one.md"}]}]"#,
        )
        .unwrap();
        std::fs::write(root.join("one.md"), "# One").unwrap();
        std::fs::create_dir_all(root.join("img")).unwrap();
        std::fs::write(root.join("img/a.png"), "png").unwrap();

        let options = BuildOptions {
            default_plugins: Vec::new(),
            ..BuildOptions::default()
        };
        let output = offline_pipeline()
            .generate_book(
                &ManifestGenerator,
                Book::load(&root).unwrap(),
                options,
                &SilentProgress,
            )
            .await
            .unwrap();

        let out = root.join("_book");
        assert_eq!(std::fs::read_to_string(out.join("one.md")).unwrap(), "# One");
        assert!(out.join("img/a.png").exists());
        assert_eq!(output.artifacts(), ["img/a.png", "one.md", "manifest.json"]);

        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(manifest["title"], "Notes");
        assert_eq!(manifest["pages"][0]["level"], "1.1");
        assert_eq!(manifest["assets"], json!(["img/a.png"]));
    }
}
