//! Page and asset preparation, plus the generator-driven generation stages.

use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use bindery_plugins::INSTALL_DIR;
use bindery_shared::{BOOK_CONFIG_FILE, BinderyError, Page, README_FILE, Result, SUMMARY_FILE};

use crate::generator::Generator;
use crate::output::Output;

/// Collect the book's pages: `README.md` first when present, then every
/// article reference of the summary in reading order.
///
/// External links are ignored, anchors are stripped, and references to
/// files that do not exist are skipped with a warning.
#[instrument(skip_all, fields(root = %output.book().root().display()))]
pub fn prepare_pages(output: Output) -> Result<Output> {
    let book = output.book();
    let root = book.root();
    let summary = book.summary();

    let mut candidates: Vec<(String, Option<String>, Option<String>)> = Vec::new();
    if root.join(README_FILE).is_file() {
        let article = summary.get_by_path(README_FILE);
        candidates.push((
            README_FILE.to_string(),
            article.map(|a| a.title().to_string()),
            article.map(|a| a.level().to_string()),
        ));
    }
    for article in summary.articles() {
        let Some(path) = article.path().and_then(page_path) else {
            continue;
        };
        candidates.push((
            path,
            Some(article.title().to_string()),
            Some(article.level().to_string()),
        ));
    }

    let mut pages = IndexMap::new();
    for (path, title, level) in candidates {
        if pages.contains_key(&path) {
            continue;
        }
        let file = root.join(&path);
        let content = match std::fs::read_to_string(&file) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(page = %path, "page referenced in summary does not exist, skipping");
                continue;
            }
            Err(e) => return Err(BinderyError::io(file, e)),
        };
        pages.insert(
            path.clone(),
            Page {
                path,
                title,
                level,
                content,
            },
        );
    }

    debug!(count = pages.len(), "pages prepared");
    Ok(output.with_pages(pages))
}

/// Normalize a summary reference to a page path, or `None` for links that
/// do not point at a local file.
fn page_path(reference: &str) -> Option<String> {
    if reference.contains("://") {
        return None;
    }
    let path = reference.split('#').next().unwrap_or_default();
    let path = path.strip_prefix("./").unwrap_or(path);
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

/// Collect every other file under the book root as an asset.
///
/// Pages, the book's own config files, installed packages, the output
/// directory and dot-files are left out. Paths use `/` separators and are
/// sorted.
#[instrument(skip_all, fields(root = %output.book().root().display()))]
pub fn prepare_assets(output: Output) -> Result<Output> {
    let root = output.book().root().to_path_buf();
    let output_dir = output.output_dir();

    let walker = WalkDir::new(&root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        !(name.starts_with('.') || name == INSTALL_DIR || entry.path() == output_dir)
    });

    let mut assets = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root.as_path()).to_path_buf();
            BinderyError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(relative) = relative_path(&root, entry.path()) else {
            continue;
        };
        if relative == BOOK_CONFIG_FILE
            || relative == SUMMARY_FILE
            || output.pages().contains_key(&relative)
        {
            continue;
        }
        assets.push(relative);
    }
    assets.sort();

    debug!(count = assets.len(), "assets prepared");
    Ok(output.with_assets(assets))
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Hand every asset to the generator, in order.
pub async fn generate_assets(generator: &dyn Generator, output: Output) -> Result<Output> {
    let assets = output.assets().to_vec();
    let mut output = output;
    for asset in &assets {
        output = generator.on_asset(output, asset).await?;
    }
    Ok(output)
}

/// Hand every page to the generator, in order.
pub async fn generate_pages(generator: &dyn Generator, output: Output) -> Result<Output> {
    let pages: Vec<Page> = output.pages().values().cloned().collect();
    let mut output = output;
    for page in &pages {
        output = generator.on_page(output, page).await?;
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::book::Book;
    use crate::output::BuildOptions;

    fn temp_dir() -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("bindery-prepare-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(root: &Path, path: &str, content: &str) {
        let file = root.join(path);
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(file, content).unwrap();
    }

    fn sample_book() -> PathBuf {
        let root = temp_dir();
        write(&root, "book.json", "{}");
        write(
            &root,
            "SUMMARY.json",
            r#"[{"articles": [
                {"title": "Intro", "ref": "intro.md", "articles": [
                    {"title": "Setup", "ref": "guide/setup.md#install"}
                ]},
                {"title": "Gone", "ref": "missing.md"},
                {"title": "Site", "ref": "https://example.com"},
                {"title": "Again", "ref": "./intro.md"}
            ]}]"#,
        );
        write(&root, "README.md", "# Welcome");
        write(&root, "intro.md", "intro");
        write(&root, "guide/setup.md", "setup");
        write(&root, "images/logo.png", "png");
        write(&root, "styles.css", "body {}");
        write(&root, ".git/HEAD", "ref");
        write(&root, "node_modules/bindery-plugin-x/index.js", "");
        write(&root, "_book/old.html", "");
        root
    }

    fn prepared(root: &Path) -> Output {
        let book = Book::load(root).unwrap();
        let output = Output::create_for_book(book, "test", BuildOptions::default());
        prepare_assets(prepare_pages(output).unwrap()).unwrap()
    }

    #[test]
    fn pages_follow_summary_order() {
        let output = prepared(&sample_book());
        let paths: Vec<&str> = output.pages().keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["README.md", "intro.md", "guide/setup.md"]);

        let setup = &output.pages()["guide/setup.md"];
        assert_eq!(setup.title.as_deref(), Some("Setup"));
        assert_eq!(setup.level.as_deref(), Some("1.1.1"));
        assert_eq!(setup.content, "setup");
        assert_eq!(output.pages()["README.md"].title, None);
    }

    #[test]
    fn assets_exclude_pages_and_build_files() {
        let output = prepared(&sample_book());
        assert_eq!(output.assets(), ["images/logo.png", "styles.css"]);
    }

    #[test]
    fn page_path_normalizes_references() {
        assert_eq!(page_path("a.md#top").as_deref(), Some("a.md"));
        assert_eq!(page_path("./b/c.md").as_deref(), Some("b/c.md"));
        assert_eq!(page_path("http://x.org/a.md"), None);
        assert_eq!(page_path("#only-anchor"), None);
    }
}
