use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use thiserror::Error;
use tracing::info;

use crate::assets::{copy_tree, CopyAssetsError};
use crate::config::{LoadConfigError, SiteConfig};
use crate::gigs::{load_gigs, load_gigs_or_empty, today_in, AmbientZone, Gig, LoadGigsError};
use crate::minify::minify_html;
use crate::render::{page_output_path, RenderContext, RenderTemplateError, Templates};
use crate::storage::Store;
use crate::style::{compile_stylesheets, CompileStyleError, STYLES_DIR};
use crate::watch::Change;

const ASSETS_DIR: &str = "assets";
const SCRIPTS_DIR: &str = "js";

#[derive(Error, Debug)]
pub enum BuildSiteError {
    #[error(transparent)]
    Render(#[from] RenderTemplateError),

    #[error(transparent)]
    Style(#[from] CompileStyleError),

    #[error(transparent)]
    Assets(#[from] CopyAssetsError),

    #[error("storage error: {0}")]
    Storage(String),
}

/// What a build pass wrote.
#[derive(Debug, PartialEq, Eq, Default, Clone, Copy)]
pub struct BuildReport {
    pub gigs: usize,
    pub pages: usize,
    pub stylesheets: usize,
    pub assets: usize,
}

pub struct Site {
    root_path: PathBuf,
    templates_path: PathBuf,
    sass_path: PathBuf,
    assets_path: PathBuf,
    scripts_path: PathBuf,
    gigs_path: PathBuf,
    output_path: PathBuf,
    config: SiteConfig,
    ambient: AmbientZone,
}

impl Site {
    /// Loads the site rooted at `root_path`, reading `encore.toml` if there
    /// is one.
    pub fn load(root_path: impl AsRef<Path>) -> Result<Self, LoadConfigError> {
        let root_path = root_path.as_ref();
        let config = SiteConfig::load(root_path)?;

        Ok(Self::new(root_path, config))
    }

    pub fn new(root_path: impl AsRef<Path>, config: SiteConfig) -> Self {
        let root_path = root_path.as_ref().to_owned();
        let source_path = root_path.join(&config.source_dir);

        Self {
            templates_path: source_path.join(&config.templates_dir),
            sass_path: source_path.join(&config.scss_dir),
            assets_path: source_path.join(&config.assets_dir),
            scripts_path: source_path.join(&config.scripts_dir),
            gigs_path: source_path.join(&config.gigs),
            output_path: root_path.join(&config.output_dir),
            ambient: config.timezone.into(),
            root_path,
            config,
        }
    }

    pub fn set_minify(&mut self, minify: bool) {
        self.config.minify = minify;
    }

    pub fn set_port(&mut self, port: u16) {
        self.config.serve.port = port;
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn source_path(&self) -> PathBuf {
        self.root_path.join(&self.config.source_dir)
    }

    pub fn templates_path(&self) -> &Path {
        &self.templates_path
    }

    pub fn sass_path(&self) -> &Path {
        &self.sass_path
    }

    pub fn assets_path(&self) -> &Path {
        &self.assets_path
    }

    pub fn scripts_path(&self) -> &Path {
        &self.scripts_path
    }

    pub fn gigs_path(&self) -> &Path {
        &self.gigs_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Returns the upcoming gigs as of `now`, or none if the gig list can't
    /// be read.
    pub fn gigs(&self, now: DateTime<Utc>) -> Vec<Gig> {
        match self.ambient {
            AmbientZone::Local => load_gigs_or_empty(&self.gigs_path, now, &Local),
            AmbientZone::Named(tz) => load_gigs_or_empty(&self.gigs_path, now, &tz),
        }
    }

    /// Like [`Site::gigs`], but reports why the gig list couldn't be read.
    pub fn try_gigs(&self, now: DateTime<Utc>) -> Result<Vec<Gig>, LoadGigsError> {
        match self.ambient {
            AmbientZone::Local => load_gigs(&self.gigs_path, now, &Local),
            AmbientZone::Named(tz) => load_gigs(&self.gigs_path, now, &tz),
        }
    }

    fn build_date(&self, now: DateTime<Utc>) -> String {
        let today = match self.ambient {
            AmbientZone::Local => today_in(now, &Local),
            AmbientZone::Named(tz) => today_in(now, &tz),
        };

        today.format("%Y-%m-%d").to_string()
    }

    /// Builds the whole site into `storage`.
    pub fn build(
        &self,
        storage: &impl Store,
        now: DateTime<Utc>,
    ) -> Result<BuildReport, BuildSiteError> {
        let templates = Templates::load(&self.templates_path)?;
        let (gigs, pages) = self.render_pages(&templates, templates.pages(), storage, now)?;

        Ok(BuildReport {
            gigs,
            pages,
            stylesheets: self.render_styles(storage)?,
            assets: self.copy_assets(storage)? + self.copy_scripts(storage)?,
        })
    }

    /// Rebuilds the parts of the site affected by `changes`.
    pub fn rebuild(
        &self,
        changes: &[Change],
        storage: &impl Store,
        now: DateTime<Utc>,
    ) -> Result<(), BuildSiteError> {
        let mut page_names = Vec::new();
        let mut render_all_pages = false;

        for change in changes {
            match change {
                Change::Template(name) => page_names.push(name.clone()),
                Change::TemplateDependency | Change::Gigs => render_all_pages = true,
                Change::Styles => {
                    remove_dir(storage, STYLES_DIR)?;
                    self.render_styles(storage)?;
                }
                Change::Assets => {
                    remove_dir(storage, ASSETS_DIR)?;
                    self.copy_assets(storage)?;
                }
                Change::Scripts => {
                    remove_dir(storage, SCRIPTS_DIR)?;
                    self.copy_scripts(storage)?;
                }
            }
        }

        if render_all_pages || !page_names.is_empty() {
            let templates = Templates::load(&self.templates_path)?;

            if render_all_pages {
                self.render_pages(&templates, templates.pages(), storage, now)?;
            } else {
                let (existing, removed): (Vec<_>, Vec<_>) = page_names
                    .into_iter()
                    .partition(|name| templates.pages().contains(name));

                for name in removed {
                    let output_path = page_output_path(&name);
                    storage
                        .remove(&output_path)
                        .map_err(|err| BuildSiteError::Storage(err.to_string()))?;

                    info!("removed {}", output_path.display());
                }

                self.render_pages(&templates, &existing, storage, now)?;
            }
        }

        Ok(())
    }

    /// Renders the named page templates, returning how many gigs were
    /// available to them and how many pages were written.
    fn render_pages(
        &self,
        templates: &Templates,
        names: &[String],
        storage: &impl Store,
        now: DateTime<Utc>,
    ) -> Result<(usize, usize), BuildSiteError> {
        let gigs = self.gigs(now);
        let ctx = RenderContext {
            gigs: &gigs,
            build_date: self.build_date(now),
        };

        for name in names {
            let rendered = templates.render_page(name, &ctx)?;
            let html = if self.config.minify {
                minify_html(&rendered)
            } else {
                rendered
            };

            let output_path = page_output_path(name);
            storage
                .store_html(&output_path, html)
                .map_err(|err| BuildSiteError::Storage(err.to_string()))?;

            info!("rendered {name} to {}", output_path.display());
        }

        Ok((gigs.len(), names.len()))
    }

    fn render_styles(&self, storage: &impl Store) -> Result<usize, BuildSiteError> {
        let stylesheets = compile_stylesheets(&self.sass_path, self.config.minify)?;
        let count = stylesheets.len();

        for stylesheet in stylesheets {
            info!("compiled {}", stylesheet.path.display());

            storage
                .store_css(&stylesheet.path, stylesheet.css)
                .map_err(|err| BuildSiteError::Storage(err.to_string()))?;
        }

        Ok(count)
    }

    fn copy_assets(&self, storage: &impl Store) -> Result<usize, BuildSiteError> {
        let copied = copy_tree(&self.assets_path, Path::new(ASSETS_DIR), storage)?;
        info!("copied {copied} assets");

        Ok(copied)
    }

    fn copy_scripts(&self, storage: &impl Store) -> Result<usize, BuildSiteError> {
        let copied = copy_tree(&self.scripts_path, Path::new(SCRIPTS_DIR), storage)?;
        info!("copied {copied} scripts");

        Ok(copied)
    }
}

fn remove_dir(storage: &impl Store, dir: &str) -> Result<(), BuildSiteError> {
    storage
        .remove_dir(Path::new(dir))
        .map_err(|err| BuildSiteError::Storage(err.to_string()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::TimeZone;
    use chrono_tz::Tz;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    use crate::storage::InMemoryStorage;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn write(root: &Path, path: &str, contents: &str) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn write_site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        write(root, "encore.toml", "timezone = \"America/Chicago\"\n");
        write(
            root,
            "src/templates/layouts/base.html",
            "<html><body>{% block content %}{% endblock content %}</body></html>",
        );
        write(
            root,
            "src/templates/index.html",
            r#"{% extends "layouts/base.html" %}{% block content %}{% if gigs | length == 0 %}<p>No upcoming shows</p>{% endif %}{% for gig in gigs %}<p>{{ gig.title }}: {{ gig.isoDateTime }}</p>{% endfor %}{% endblock content %}"#,
        );
        write(
            root,
            "src/data/gigs.csv",
            "date,time,timezone,title\n2099-01-01,19:00,America/Chicago,Test\n2000-01-01,19:00,,Past\n2099-03-01,,,NoTime\n",
        );
        write(root, "src/scss/_colors.scss", "$ink: #111;\n");
        write(
            root,
            "src/scss/styles.scss",
            "@import \"colors\";\nbody {\n  color: $ink;\n}\n",
        );
        write(root, "src/assets/img/logo.svg", "<svg></svg>");
        write(root, "src/js/scripts.js", "console.log(1);\n");

        dir
    }

    fn page(storage: &InMemoryStorage, url_path: &str) -> String {
        String::from_utf8(storage.get(url_path).unwrap()).unwrap()
    }

    #[test]
    fn test_build() {
        let dir = write_site();
        let site = Site::load(dir.path()).unwrap();
        let storage = InMemoryStorage::default();

        let report = site.build(&storage, now()).unwrap();

        assert_eq!(
            report,
            BuildReport {
                gigs: 2,
                pages: 1,
                stylesheets: 1,
                assets: 2,
            }
        );
        assert_snapshot!(page(&storage, "/index.html"), @"<html><body><p>Test: 2099-01-01T19:00-06:00</p><p>NoTime: 2099-03-01</p></body></html>");
        assert_eq!(page(&storage, "/css/styles.css"), "body {\n  color: #111;\n}\n");
        assert_eq!(page(&storage, "/assets/img/logo.svg"), "<svg></svg>");
        assert_eq!(page(&storage, "/js/scripts.js"), "console.log(1);\n");
        assert_eq!(storage.get("/layouts/base.html"), None);
        assert_eq!(storage.get("/css/_colors.css"), None);
    }

    #[test]
    fn test_build_without_gigs() {
        let dir = write_site();
        fs::remove_file(dir.path().join("src/data/gigs.csv")).unwrap();
        let site = Site::load(dir.path()).unwrap();
        let storage = InMemoryStorage::default();

        let report = site.build(&storage, now()).unwrap();

        assert_eq!(report.gigs, 0);
        assert_eq!(
            page(&storage, "/index.html"),
            "<html><body><p>No upcoming shows</p></body></html>"
        );
    }

    #[test]
    fn test_build_minified() {
        let dir = write_site();
        let mut site = Site::load(dir.path()).unwrap();
        site.set_minify(true);
        let storage = InMemoryStorage::default();

        site.build(&storage, now()).unwrap();

        assert!(page(&storage, "/css/styles.css").starts_with("body{color:#111}"));
        assert!(page(&storage, "/index.html").contains("Test: 2099-01-01T19:00-06:00"));
    }

    #[test]
    fn test_rebuild_after_gigs_change() {
        let dir = write_site();
        let site = Site::load(dir.path()).unwrap();
        let storage = InMemoryStorage::default();
        site.build(&storage, now()).unwrap();

        write(
            dir.path(),
            "src/data/gigs.csv",
            "date,time,timezone,title\n2030-07-04,20:00,America/Chicago,Summer\n",
        );
        site.rebuild(&[Change::Gigs], &storage, now()).unwrap();

        assert_eq!(
            page(&storage, "/index.html"),
            "<html><body><p>Summer: 2030-07-04T20:00-05:00</p></body></html>"
        );
    }

    #[test]
    fn test_rebuild_single_page() {
        let dir = write_site();
        let site = Site::load(dir.path()).unwrap();
        let storage = InMemoryStorage::default();
        site.build(&storage, now()).unwrap();

        write(dir.path(), "src/templates/about.html", "<p>About</p>");
        site.rebuild(
            &[Change::Template("about.html".to_string())],
            &storage,
            now(),
        )
        .unwrap();

        assert_eq!(page(&storage, "/about.html"), "<p>About</p>");
    }

    #[test]
    fn test_rebuild_removes_deleted_page() {
        let dir = write_site();
        write(dir.path(), "src/templates/about.html", "<p>About</p>");
        let site = Site::load(dir.path()).unwrap();
        let storage = InMemoryStorage::default();
        site.build(&storage, now()).unwrap();
        assert_eq!(page(&storage, "/about.html"), "<p>About</p>");

        fs::remove_file(dir.path().join("src/templates/about.html")).unwrap();
        site.rebuild(
            &[Change::Template("about.html".to_string())],
            &storage,
            now(),
        )
        .unwrap();

        assert_eq!(storage.get("/about.html"), None);
        assert!(storage.get("/index.html").is_some());
    }

    #[test]
    fn test_rebuild_drops_deleted_assets_scripts_and_styles() {
        let dir = write_site();
        write(dir.path(), "src/assets/old.txt", "old");
        write(dir.path(), "src/js/old.js", "old();\n");
        write(dir.path(), "src/scss/old.scss", "a {\n  color: red;\n}\n");
        let site = Site::load(dir.path()).unwrap();
        let storage = InMemoryStorage::default();
        site.build(&storage, now()).unwrap();

        fs::remove_file(dir.path().join("src/assets/old.txt")).unwrap();
        fs::remove_file(dir.path().join("src/js/old.js")).unwrap();
        fs::remove_file(dir.path().join("src/scss/old.scss")).unwrap();
        site.rebuild(
            &[Change::Styles, Change::Assets, Change::Scripts],
            &storage,
            now(),
        )
        .unwrap();

        assert_eq!(storage.get("/assets/old.txt"), None);
        assert_eq!(storage.get("/js/old.js"), None);
        assert_eq!(storage.get("/css/old.css"), None);
        assert_eq!(page(&storage, "/assets/img/logo.svg"), "<svg></svg>");
        assert_eq!(page(&storage, "/js/scripts.js"), "console.log(1);\n");
        assert_eq!(page(&storage, "/css/styles.css"), "body {\n  color: #111;\n}\n");
    }

    #[test]
    fn test_rebuild_removed_page_is_skipped() {
        let dir = write_site();
        let site = Site::load(dir.path()).unwrap();
        let storage = InMemoryStorage::default();

        site.rebuild(
            &[Change::Template("gone.html".to_string())],
            &storage,
            now(),
        )
        .unwrap();

        assert_eq!(storage.get("/gone.html"), None);
    }

    #[test]
    fn test_ambient_timezone_from_config() {
        let dir = write_site();
        let site = Site::load(dir.path()).unwrap();

        assert_eq!(site.config().timezone, Some(Tz::America__Chicago));
        // 03:00 UTC on Jan 2 is still Jan 1 in the configured zone.
        assert_eq!(
            site.build_date(Utc.with_ymd_and_hms(2025, 1, 2, 3, 0, 0).unwrap()),
            "2025-01-01"
        );
    }
}
