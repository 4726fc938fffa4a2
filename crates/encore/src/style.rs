use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

/// Where compiled stylesheets go, relative to the output root.
pub const STYLES_DIR: &str = "css";

#[derive(Error, Debug)]
pub enum CompileStyleError {
    #[error("failed to compile '{}': {source}", path.display())]
    Sass {
        path: PathBuf,
        #[source]
        source: Box<grass::Error>,
    },
}

/// A compiled stylesheet, with its path relative to the output root.
#[derive(Debug, PartialEq, Eq)]
pub struct Stylesheet {
    pub path: PathBuf,
    pub css: String,
}

/// Returns the SCSS entry points under `sass_path`. Partials (files or
/// directories starting with `_`) are only reachable through `@use` and
/// `@import`.
pub fn find_stylesheets(sass_path: &Path) -> Vec<PathBuf> {
    fn is_sass(entry: &walkdir::DirEntry) -> bool {
        entry
            .path()
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| extension == "sass" || extension == "scss")
            .unwrap_or(false)
    }

    fn is_partial(entry: &walkdir::DirEntry) -> bool {
        entry
            .file_name()
            .to_str()
            .map(|filename| filename.starts_with('_'))
            .unwrap_or(false)
    }

    let mut files = WalkDir::new(sass_path)
        .into_iter()
        .filter_entry(|entry| !is_partial(entry))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_sass(entry))
        .map(|entry| entry.into_path())
        .collect::<Vec<_>>();

    files.sort();
    files
}

/// Compiles every entry point under `sass_path` into `css/`. Minified
/// output uses the compressed style.
pub fn compile_stylesheets(
    sass_path: &Path,
    minify: bool,
) -> Result<Vec<Stylesheet>, CompileStyleError> {
    let style = if minify {
        grass::OutputStyle::Compressed
    } else {
        grass::OutputStyle::Expanded
    };
    let options = grass::Options::default().style(style).load_path(sass_path);

    let mut stylesheets = Vec::new();

    for file in find_stylesheets(sass_path) {
        let css = grass::from_path(&file, &options).map_err(|source| CompileStyleError::Sass {
            path: file.clone(),
            source,
        })?;

        let relative_path = file.strip_prefix(sass_path).unwrap_or(&file);

        stylesheets.push(Stylesheet {
            path: Path::new(STYLES_DIR).join(relative_path.with_extension("css")),
            css,
        });
    }

    Ok(stylesheets)
}
