use std::collections::BTreeSet;
use std::path::PathBuf;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::warn;

use crate::render::{is_page_template, template_name};
use crate::site::Site;

/// A source change, and with it the part of the site that needs rebuilding.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub enum Change {
    /// A page template, named relative to the templates directory.
    Template(String),
    /// A layout, partial or include, which any page may depend on.
    TemplateDependency,
    Gigs,
    Styles,
    Assets,
    Scripts,
}

impl Site {
    /// Maps a changed file to what needs rebuilding, if anything.
    pub fn classify(&self, path: &std::path::Path) -> Option<Change> {
        if path == self.gigs_path() {
            return Some(Change::Gigs);
        }

        if let Ok(relative_path) = path.strip_prefix(self.templates_path()) {
            return Some(if is_page_template(relative_path) {
                Change::Template(template_name(relative_path))
            } else {
                Change::TemplateDependency
            });
        }

        if path.starts_with(self.sass_path()) {
            return Some(Change::Styles);
        }

        if path.starts_with(self.assets_path()) {
            return Some(Change::Assets);
        }

        if path.starts_with(self.scripts_path()) {
            return Some(Change::Scripts);
        }

        None
    }
}

/// Collapses a burst of changes into the rebuilds they call for. A change
/// that re-renders every page makes single-page renders redundant.
pub fn coalesce(changes: impl IntoIterator<Item = Change>) -> Vec<Change> {
    let changes = changes.into_iter().collect::<BTreeSet<_>>();

    let renders_all_pages = changes
        .iter()
        .any(|change| matches!(change, Change::TemplateDependency | Change::Gigs));

    changes
        .into_iter()
        .filter(|change| !(renders_all_pages && matches!(change, Change::Template(_))))
        .collect()
}

/// Returns whether a watcher event can alter the built site.
pub fn is_content_event(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Watches `paths` recursively, delivering the changed file paths over a
/// channel. The watcher stops when dropped.
pub fn watch_paths(
    paths: &[PathBuf],
) -> Result<(RecommendedWatcher, UnboundedReceiver<Vec<PathBuf>>), notify::Error> {
    let (watcher_tx, watcher_rx) = unbounded_channel();

    let mut watcher = RecommendedWatcher::new(
        move |result: Result<Event, notify::Error>| match result {
            Ok(event) if is_content_event(&event) => {
                // The receiver is gone once the server shuts down.
                let _ = watcher_tx.send(event.paths);
            }
            Ok(_) => {}
            Err(err) => warn!("file watcher error: {err}"),
        },
        notify::Config::default(),
    )?;

    for path in paths {
        if path.exists() {
            watcher.watch(path, RecursiveMode::Recursive)?;
        }
    }

    Ok((watcher, watcher_rx))
}
