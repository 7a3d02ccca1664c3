//! End-to-end build pipeline: book → plugins → pages/assets → hooks → generator.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, instrument};

use bindery_plugins::{
    HOOK_CONFIG, HOOK_FINISH_BEFORE, HOOK_INIT, HookCatalog, InstallProgress, LoadedPlugin,
    Plugin, PluginInstaller, PluginSet, resolve,
};
use bindery_shared::{BuildStage, Result};

use crate::book::Book;
use crate::generator::Generator;
use crate::hook::{apply_config, call_hook, config_payload, empty_payload, keep_output};
use crate::output::{BuildOptions, Output};
use crate::prepare::{generate_assets, generate_pages, prepare_assets, prepare_pages};

/// Summary of a finished build.
#[derive(Debug)]
pub struct BuildResult {
    /// Absolute output directory.
    pub output_dir: PathBuf,
    /// Generator that produced the output.
    pub generator: String,
    pub plugin_count: usize,
    pub page_count: usize,
    pub asset_count: usize,
    /// Files written by the generator.
    pub artifact_count: usize,
    /// Total elapsed time.
    pub elapsed: Duration,
}

impl BuildResult {
    pub fn from_output(output: &Output) -> Self {
        Self {
            output_dir: output.output_dir(),
            generator: output.generator().to_string(),
            plugin_count: output.plugins().len(),
            page_count: output.pages().len(),
            asset_count: output.assets().len(),
            artifact_count: output.artifacts().len(),
            elapsed: (Utc::now() - output.started_at()).to_std().unwrap_or_default(),
        }
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called each time the build reaches a new stage.
    fn stage(&self, stage: BuildStage);
    /// Called when a plugin has been installed.
    fn plugin_installed(&self, name: &str, version: &str);
    /// Called when the pipeline completes.
    fn done(&self, result: &BuildResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _stage: BuildStage) {}
    fn plugin_installed(&self, _name: &str, _version: &str) {}
    fn done(&self, _result: &BuildResult) {}
}

/// Builds books through the fixed stage sequence.
#[derive(Clone)]
pub struct Pipeline {
    installer: PluginInstaller,
    catalog: HookCatalog,
}

impl Pipeline {
    pub fn new(installer: PluginInstaller, catalog: HookCatalog) -> Self {
        Self { installer, catalog }
    }

    /// Resolve the book's plugin set against `options`.
    pub fn resolve_plugins(&self, book: &Book, options: &BuildOptions) -> Result<PluginSet> {
        let declared = book.declared_plugins()?;
        let plugins = resolve(declared, &options.default_plugins)?;
        Ok(plugins.with_package_prefix(&options.package_prefix))
    }

    /// Install `plugins` under the book root, in set order.
    pub async fn install_plugins(
        &self,
        book: &Book,
        plugins: &PluginSet,
        progress: &dyn ProgressReporter,
    ) -> Result<PluginSet> {
        let install_progress = PipelineInstallProgress { inner: progress };
        self.installer
            .install_plugins(book.root(), plugins, &install_progress)
            .await
    }

    /// Run every stage for `book` and return the final state.
    ///
    /// The first failing stage aborts the build; the error carries that
    /// stage. Nothing already written is rolled back.
    #[instrument(skip_all, fields(root = %book.root().display(), generator = generator.name()))]
    pub async fn generate_book(
        &self,
        generator: &dyn Generator,
        book: Book,
        options: BuildOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<Output> {
        info!(generator = generator.name(), "starting build");

        let options = generator
            .options(options)
            .map_err(|e| e.at_stage(BuildStage::Created))?;
        let output = Output::create_for_book(book, generator.name(), options);
        progress.stage(BuildStage::Created);

        // --- Plugins ---
        let plugins = self.resolve_plugins(output.book(), output.options());
        let output = enter(BuildStage::PluginsResolved, progress, plugins.map(|p| output.with_plugins(p)))?;

        let installed = self.install_stage(output, progress).await;
        let output = enter(BuildStage::PluginsInstalled, progress, installed)?;

        // --- Book content ---
        let output = enter(BuildStage::PagesPrepared, progress, prepare_pages(output))?;
        let output = enter(BuildStage::AssetsPrepared, progress, prepare_assets(output))?;

        // --- Hooks and generator ---
        let applied = call_hook(HOOK_CONFIG, config_payload, apply_config, output).await;
        let output = enter(BuildStage::ConfigHookApplied, progress, applied)?;

        let applied = call_hook(HOOK_INIT, empty_payload, keep_output, output).await;
        let output = enter(BuildStage::InitHookApplied, progress, applied)?;

        let initialized = generator.on_init(output).await;
        let output = enter(BuildStage::GeneratorInitialized, progress, initialized)?;

        let generated = generate_assets(generator, output).await;
        let output = enter(BuildStage::AssetsGenerated, progress, generated)?;

        let generated = generate_pages(generator, output).await;
        let output = enter(BuildStage::PagesGenerated, progress, generated)?;

        let applied = call_hook(HOOK_FINISH_BEFORE, empty_payload, keep_output, output).await;
        let output = enter(BuildStage::FinishBeforeHookApplied, progress, applied)?;

        let finished = generator.on_finish(output).await;
        let output = enter(BuildStage::GeneratorFinished, progress, finished)?;

        let result = BuildResult::from_output(&output);
        progress.done(&result);

        info!(
            plugin_count = result.plugin_count,
            page_count = result.page_count,
            asset_count = result.asset_count,
            elapsed_ms = result.elapsed.as_millis(),
            "build complete"
        );

        Ok(output)
    }

    async fn install_stage(&self, output: Output, progress: &dyn ProgressReporter) -> Result<Output> {
        let installed = self
            .install_plugins(output.book(), output.plugins(), progress)
            .await?;
        let loaded: Vec<LoadedPlugin> = installed
            .iter()
            .map(|plugin| self.catalog.load(plugin.clone()))
            .collect();
        Ok(output.with_plugins(installed).with_loaded_plugins(loaded))
    }
}

/// Record that the build reached `stage`, or tag the failure with it.
fn enter(stage: BuildStage, progress: &dyn ProgressReporter, result: Result<Output>) -> Result<Output> {
    let output = result.map_err(|e| e.at_stage(stage))?;
    debug_assert_eq!(output.stage().next(), Some(stage), "stages run in order");
    info!(%stage, "stage complete");
    progress.stage(stage);
    Ok(output.with_stage(stage))
}

// ---------------------------------------------------------------------------
// Install progress adapter
// ---------------------------------------------------------------------------

/// Adapts a `ProgressReporter` to the `InstallProgress` interface.
struct PipelineInstallProgress<'a> {
    inner: &'a dyn ProgressReporter,
}

impl InstallProgress for PipelineInstallProgress<'_> {
    fn installing(&self, _plugin: &Plugin) {}

    fn installed(&self, plugin: &Plugin, version: &str) {
        self.inner.plugin_installed(plugin.name(), version);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use bindery_plugins::{
        HookFn, InstallRequest, PackageInstaller, Registry, VersionMap, VersionMeta, VersionRange,
    };
    use bindery_shared::{BinderyError, Page};

    fn temp_dir() -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("bindery-pipeline-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(root: &Path, path: &str, content: &str) {
        let file = root.join(path);
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(file, content).unwrap();
    }

    fn sample_book(plugins: &str) -> Book {
        let root = temp_dir();
        write(
            &root,
            "book.json",
            &json!({"title": "Guide", "plugins": plugins, "trail": []}).to_string(),
        );
        write(
            &root,
            "SUMMARY.json",
            r#"[{"articles": [{"title": "Intro", "ref": "intro.md"}]}]"#,
        );
        write(&root, "intro.md", "intro");
        write(&root, "logo.png", "png");
        Book::load(&root).unwrap()
    }

    /// Every package exists at 1.0.0 and accepts any host.
    struct AnyRegistry;

    #[async_trait]
    impl Registry for AnyRegistry {
        async fn view(&self, _package_id: &str, range: &VersionRange) -> Result<VersionMap> {
            let version = semver::Version::new(1, 0, 0);
            if !range.matches(&version) {
                return Ok(VersionMap::new());
            }
            let meta = VersionMeta {
                engines: BTreeMap::from([("bindery".to_string(), "*".to_string())]),
                dist: None,
            };
            Ok(VersionMap::from([(version.to_string(), meta)]))
        }
    }

    #[derive(Default)]
    struct NoopInstaller {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PackageInstaller for NoopInstaller {
        async fn install(&self, request: &InstallRequest) -> Result<()> {
            self.calls.lock().unwrap().push(request.package_id.clone());
            Ok(())
        }
    }

    fn pipeline(catalog: HookCatalog) -> (Pipeline, Arc<NoopInstaller>) {
        let installer = Arc::new(NoopInstaller::default());
        let plugins = PluginInstaller::new(
            Arc::new(AnyRegistry),
            installer.clone(),
            semver::Version::new(3, 0, 0),
            "bindery",
        );
        (Pipeline::new(plugins, catalog), installer)
    }

    fn options() -> BuildOptions {
        BuildOptions {
            default_plugins: vec!["search".into()],
            ..BuildOptions::default()
        }
    }

    /// Records every callback it receives, optionally failing one of them.
    #[derive(Default)]
    struct RecordingGenerator {
        events: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl RecordingGenerator {
        fn failing_on(callback: &'static str) -> Self {
            Self {
                fail_on: Some(callback),
                ..Self::default()
            }
        }

        fn check(&self, callback: &str) -> Result<()> {
            match self.fail_on {
                Some(fail) if fail == callback => {
                    Err(BinderyError::Generator(format!("{callback} failed")))
                }
                _ => Ok(()),
            }
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        fn name(&self) -> &str {
            "recording"
        }

        async fn on_init(&self, output: Output) -> Result<Output> {
            self.push(format!("init:{}", output.stage()));
            self.check("init")?;
            Ok(output)
        }

        async fn on_asset(&self, output: Output, asset: &str) -> Result<Output> {
            self.push(format!("asset:{asset}"));
            Ok(output)
        }

        async fn on_page(&self, output: Output, page: &Page) -> Result<Output> {
            self.push(format!("page:{}", page.path));
            Ok(output.with_artifact(page.path.replace(".md", ".html")))
        }

        async fn on_finish(&self, output: Output) -> Result<Output> {
            self.push("finish".into());
            self.check("finish")?;
            Ok(output)
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        stages: Mutex<Vec<BuildStage>>,
        installed: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn stage(&self, stage: BuildStage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn plugin_installed(&self, name: &str, version: &str) {
            self.installed.lock().unwrap().push(format!("{name}@{version}"));
        }

        fn done(&self, _result: &BuildResult) {}
    }

    fn push_trail(
        tag: &'static str,
    ) -> HookFn<impl Fn(Value, &Value) -> Result<Value> + Send + Sync> {
        HookFn::new(move |mut payload: Value, _: &Value| {
            if let Some(trail) = payload["trail"].as_array_mut() {
                trail.push(json!(tag));
            }
            Ok(payload)
        })
    }

    #[tokio::test]
    async fn build_runs_every_stage_in_order() {
        let (pipeline, installer) = pipeline(HookCatalog::new());
        let generator = RecordingGenerator::default();
        let progress = RecordingProgress::default();

        let output = pipeline
            .generate_book(&generator, sample_book("theme-x"), options(), &progress)
            .await
            .unwrap();

        assert_eq!(output.stage(), BuildStage::GeneratorFinished);
        assert_eq!(*progress.stages.lock().unwrap(), BuildStage::ALL.to_vec());
        assert_eq!(
            generator.events(),
            vec![
                "init:init hook applied",
                "asset:logo.png",
                "page:intro.md",
                "finish"
            ]
        );

        assert_eq!(output.plugins().names(), vec!["theme-x", "search"]);
        assert_eq!(
            *installer.calls.lock().unwrap(),
            vec!["bindery-plugin-theme-x", "bindery-plugin-search"]
        );
        assert_eq!(
            *progress.installed.lock().unwrap(),
            vec!["theme-x@1.0.0", "search@1.0.0"]
        );
        assert_eq!(output.artifacts(), ["intro.html"]);
    }

    #[tokio::test]
    async fn config_hook_runs_in_plugin_order() {
        let catalog = HookCatalog::new()
            .with("search", HOOK_CONFIG, push_trail("search"))
            .with("theme-x", HOOK_CONFIG, push_trail("theme-x"));
        let (pipeline, _) = pipeline(catalog);

        let output = pipeline
            .generate_book(
                &RecordingGenerator::default(),
                sample_book("theme-x"),
                options(),
                &SilentProgress,
            )
            .await
            .unwrap();

        assert_eq!(
            output.book().config().get("trail"),
            Some(&json!(["theme-x", "search"]))
        );
        assert_eq!(output.book().title(), "Guide");
    }

    #[tokio::test]
    async fn init_hook_failure_stops_before_generation() {
        let catalog = HookCatalog::new().with(
            "theme-x",
            HOOK_INIT,
            HookFn::new(|_: Value, _: &Value| Err(BinderyError::Plugin("no templates".into()))),
        );
        let (pipeline, _) = pipeline(catalog);
        let generator = RecordingGenerator::default();
        let progress = RecordingProgress::default();

        let err = pipeline
            .generate_book(&generator, sample_book("theme-x"), options(), &progress)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(BuildStage::InitHookApplied));
        assert!(matches!(
            err.root_cause(),
            BinderyError::Hook { plugin, hook, .. } if plugin == "theme-x" && hook == "init"
        ));
        assert!(generator.events().is_empty());
        assert_eq!(
            progress.stages.lock().unwrap().last(),
            Some(&BuildStage::ConfigHookApplied)
        );
    }

    #[tokio::test]
    async fn generator_init_failure_is_tagged_with_its_stage() {
        let (pipeline, _) = pipeline(HookCatalog::new());
        let generator = RecordingGenerator::failing_on("init");
        let progress = RecordingProgress::default();

        let err = pipeline
            .generate_book(&generator, sample_book("theme-x"), options(), &progress)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(BuildStage::GeneratorInitialized));
        assert!(matches!(
            err.root_cause(),
            BinderyError::Generator(message) if message == "init failed"
        ));
        assert_eq!(generator.events(), vec!["init:init hook applied"]);
        assert_eq!(
            progress.stages.lock().unwrap().last(),
            Some(&BuildStage::InitHookApplied)
        );
    }

    #[tokio::test]
    async fn generator_finish_failure_is_tagged_with_its_stage() {
        let (pipeline, _) = pipeline(HookCatalog::new());
        let generator = RecordingGenerator::failing_on("finish");
        let progress = RecordingProgress::default();

        let err = pipeline
            .generate_book(&generator, sample_book("theme-x"), options(), &progress)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(BuildStage::GeneratorFinished));
        assert!(matches!(
            err.root_cause(),
            BinderyError::Generator(message) if message == "finish failed"
        ));
        assert_eq!(
            progress.stages.lock().unwrap().last(),
            Some(&BuildStage::FinishBeforeHookApplied)
        );
    }

    #[tokio::test]
    async fn finish_before_failure_skips_on_finish() {
        let catalog = HookCatalog::new().with(
            "search",
            HOOK_FINISH_BEFORE,
            HookFn::new(|_: Value, _: &Value| Err(BinderyError::Plugin("index too large".into()))),
        );
        let (pipeline, _) = pipeline(catalog);
        let generator = RecordingGenerator::default();

        let err = pipeline
            .generate_book(&generator, sample_book("theme-x"), options(), &SilentProgress)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(BuildStage::FinishBeforeHookApplied));
        assert!(matches!(
            err.root_cause(),
            BinderyError::Hook { plugin, hook, .. } if plugin == "search" && hook == "finish:before"
        ));
        let events = generator.events();
        assert!(events.contains(&"page:intro.md".to_string()));
        assert!(!events.contains(&"finish".to_string()));
    }

    #[tokio::test]
    async fn unresolvable_plugin_fails_at_install() {
        let (pipeline, installer) = pipeline(HookCatalog::new());

        let err = pipeline
            .generate_book(
                &RecordingGenerator::default(),
                sample_book("theme-x@^2"),
                options(),
                &SilentProgress,
            )
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(BuildStage::PluginsInstalled));
        assert!(matches!(
            err.root_cause(),
            BinderyError::PluginResolution { plugin, .. } if plugin == "theme-x"
        ));
        assert!(installer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn disabled_default_is_not_installed() {
        let (pipeline, installer) = pipeline(HookCatalog::new());

        let output = pipeline
            .generate_book(
                &RecordingGenerator::default(),
                sample_book("-search"),
                options(),
                &SilentProgress,
            )
            .await
            .unwrap();

        assert!(output.plugins().is_empty());
        assert!(installer.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn resolve_plugins_applies_package_prefix() {
        let (pipeline, _) = pipeline(HookCatalog::new());
        let options = BuildOptions {
            package_prefix: "acme-".into(),
            ..options()
        };

        let plugins = pipeline
            .resolve_plugins(&sample_book("theme-x"), &options)
            .unwrap();
        assert_eq!(plugins.get("search").unwrap().package_id(), "acme-search");
    }
}
