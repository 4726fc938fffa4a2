use std::path::{Path, PathBuf};

use tera::Tera;
use thiserror::Error;
use walkdir::WalkDir;

use crate::gigs::Gig;

/// Directories holding templates that are only used through `extends` or
/// `include`.
const SUPPORT_DIRS: [&str; 4] = ["layouts", "partials", "includes", "include"];

#[derive(Error, Debug)]
pub enum RenderTemplateError {
    #[error("failed to walk templates directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to load templates: {0}")]
    Load(#[source] tera::Error),

    #[error("failed to render '{name}': {}", error_chain(.source))]
    Render {
        name: String,
        #[source]
        source: tera::Error,
    },
}

/// Everything a page template can see.
pub struct RenderContext<'a> {
    /// Available as `gigs`.
    pub gigs: &'a [Gig],
    /// Available as `build_date`, formatted `YYYY-MM-DD`.
    pub build_date: String,
}

impl RenderContext<'_> {
    fn to_tera(&self) -> tera::Context {
        let mut context = tera::Context::new();
        context.insert("gigs", self.gigs);
        context.insert("build_date", &self.build_date);
        context
    }
}

/// The templates of a site, loaded from disk.
pub struct Templates {
    tera: Tera,
    pages: Vec<String>,
}

impl Templates {
    /// Loads every file under `templates_path`. Templates are named by their
    /// path relative to `templates_path`, with `/` separators.
    pub fn load(templates_path: &Path) -> Result<Self, RenderTemplateError> {
        let mut tera = Tera::default();
        let mut files = Vec::new();
        let mut pages = Vec::new();

        if templates_path.is_dir() {
            for entry in WalkDir::new(templates_path).follow_links(true) {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let relative_path = entry
                    .path()
                    .strip_prefix(templates_path)
                    .unwrap_or(entry.path());
                let name = template_name(relative_path);

                if is_page_template(relative_path) {
                    pages.push(name.clone());
                }

                files.push((entry.into_path(), Some(name)));
            }
        }

        tera.add_template_files(files)
            .map_err(RenderTemplateError::Load)?;
        pages.sort();

        Ok(Self { tera, pages })
    }

    /// The names of the templates that produce a page.
    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn render_page(
        &self,
        name: &str,
        ctx: &RenderContext,
    ) -> Result<String, RenderTemplateError> {
        self.tera
            .render(name, &ctx.to_tera())
            .map_err(|source| RenderTemplateError::Render {
                name: name.to_string(),
                source,
            })
    }
}

pub fn template_name(relative_path: &Path) -> String {
    relative_path
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Returns whether the template at `relative_path` renders to its own page,
/// rather than being a layout, partial or include.
pub fn is_page_template(relative_path: &Path) -> bool {
    let in_support_dir = relative_path
        .parent()
        .map(|parent| {
            parent.components().any(|component| {
                component
                    .as_os_str()
                    .to_str()
                    .map(|dir| SUPPORT_DIRS.contains(&dir))
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false);

    let is_hidden = relative_path
        .file_name()
        .and_then(|filename| filename.to_str())
        .map(|filename| filename.starts_with('_') || filename.starts_with('.'))
        .unwrap_or(true);

    !in_support_dir && !is_hidden
}

/// Where the page rendered from the template `name` is written, relative to
/// the output root.
pub fn page_output_path(name: &str) -> PathBuf {
    PathBuf::from(name).with_extension("html")
}

fn error_chain(err: &tera::Error) -> String {
    use std::error::Error;

    let mut messages = vec![err.to_string()];
    let mut source = err.source();

    while let Some(err) = source {
        messages.push(err.to_string());
        source = err.source();
    }

    messages.join(": ")
}
