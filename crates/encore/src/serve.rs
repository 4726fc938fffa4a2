use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Bytes;
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tracing::{error, info};

use crate::site::{BuildSiteError, Site};
use crate::storage::{InMemoryStorage, SiteContent};
use crate::watch::{coalesce, watch_paths};

/// Reports the current build generation to open pages.
const RELOAD_PATH: &str = "/__encore/reload";

/// Polls [`RELOAD_PATH`] and reloads the page once the generation moves on.
const RELOAD_SCRIPT: &str = r#"<script>(function () {
  var generation = null;
  setInterval(function () {
    fetch("/__encore/reload", { cache: "no-store" })
      .then(function (response) { return response.text(); })
      .then(function (next) {
        if (generation !== null && next !== generation) { location.reload(); }
        generation = next;
      })
      .catch(function () {});
  }, 1000);
})();</script>"#;

type ResponseBody = BoxBody<Bytes, hyper::Error>;

#[derive(Error, Debug)]
pub enum ServeSiteError {
    #[error("async IO error: {0}")]
    AsyncIo(#[from] tokio::io::Error),

    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("initial build failed: {0}")]
    Build(#[from] BuildSiteError),

    #[error("failed to watch sources: {0}")]
    Watch(#[from] notify::Error),
}

impl Site {
    /// Builds the site into memory, serves it over HTTP and rebuilds
    /// whatever changes under the source directory. Open pages reload after
    /// each successful rebuild.
    pub async fn serve(self) -> Result<(), ServeSiteError> {
        let serve_config = self.config().serve.clone();
        let address = format!("{}:{}", serve_config.host, serve_config.port);
        let addr = address
            .parse::<SocketAddr>()
            .map_err(|_| ServeSiteError::InvalidAddress(address.clone()))?;

        let storage = InMemoryStorage::default();
        let report = self.build(&storage, Utc::now())?;
        info!(
            pages = report.pages,
            gigs = report.gigs,
            "built site in memory"
        );

        let (_watcher, watcher_rx) = watch_paths(&[self.source_path()])?;
        let debounce = Duration::from_millis(serve_config.debounce_ms);
        let (reload_tx, reload_rx) = watch::channel(0);

        tokio::task::spawn(rebuild_on_change(
            Arc::new(self),
            storage.clone(),
            watcher_rx,
            debounce,
            reload_tx,
        ));

        let listener = TcpListener::bind(addr).await?;
        info!("serving on http://{addr}");

        loop {
            let (stream, _) = listener.accept().await?;

            let io = TokioIo::new(stream);
            let content = storage.content();
            let reload_rx = reload_rx.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    handle_request(req, content.clone(), reload_rx.clone())
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("error serving connection: {err:?}");
                }
            });
        }
    }
}

/// Rebuilds the site for each burst of changed paths, then bumps the build
/// generation. Runs until the watcher goes away.
async fn rebuild_on_change(
    site: Arc<Site>,
    storage: InMemoryStorage,
    mut watcher_rx: UnboundedReceiver<Vec<PathBuf>>,
    debounce: Duration,
    reload_tx: watch::Sender<u64>,
) {
    while let Some(mut paths) = watcher_rx.recv().await {
        // Editors tend to save in bursts; wait for the burst to end.
        while let Ok(Some(more)) = tokio::time::timeout(debounce, watcher_rx.recv()).await {
            paths.extend(more);
        }

        let changes = coalesce(paths.iter().filter_map(|path| site.classify(path)));
        if changes.is_empty() {
            continue;
        }

        info!("rebuilding: {changes:?}");

        match site.rebuild(&changes, &storage, Utc::now()) {
            Ok(()) => reload_tx.send_modify(|generation| *generation += 1),
            Err(err) => error!("rebuild failed: {err}"),
        }
    }
}

fn empty() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

fn full<T: Into<Bytes>>(chunk: T) -> ResponseBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

fn with_status(status: StatusCode) -> Response<ResponseBody> {
    let mut response = Response::new(empty());
    *response.status_mut() = status;
    response
}

fn with_content_type(body: ResponseBody, content_type: &str) -> Response<ResponseBody> {
    let mut response = Response::new(body);
    if let Ok(value) = HeaderValue::from_str(content_type) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    content: SiteContent,
    reload_rx: watch::Receiver<u64>,
) -> Result<Response<ResponseBody>, Infallible> {
    let generation = *reload_rx.borrow();

    Ok(respond(req.method(), req.uri().path(), &content, generation))
}

fn respond(
    method: &Method,
    request_path: &str,
    content: &SiteContent,
    generation: u64,
) -> Response<ResponseBody> {
    if *method != Method::GET {
        return with_status(StatusCode::NOT_FOUND);
    }

    if request_path == RELOAD_PATH {
        let mut response = with_content_type(
            full(generation.to_string()),
            "text/plain; charset=utf-8",
        );
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        return response;
    }

    let Ok(content) = content.read() else {
        return with_status(StatusCode::INTERNAL_SERVER_ERROR);
    };

    let Some((url_path, body)) = lookup(&content, request_path) else {
        return with_status(StatusCode::NOT_FOUND);
    };

    let content_type = mime_guess::from_path(&url_path).first_or_octet_stream();
    let body = if content_type.essence_str() == "text/html" {
        inject_reload_script(body)
    } else {
        body
    };

    with_content_type(full(body), content_type.as_ref())
}

/// Adds [`RELOAD_SCRIPT`] to a page, ahead of `</body>` when the page has
/// one.
fn inject_reload_script(html: Vec<u8>) -> Vec<u8> {
    let mut html = match String::from_utf8(html) {
        Ok(html) => html,
        Err(err) => return err.into_bytes(),
    };

    match html.rfind("</body>") {
        Some(index) => html.insert_str(index, RELOAD_SCRIPT),
        None => html.push_str(RELOAD_SCRIPT),
    }

    html.into_bytes()
}

/// Finds the built file for a request path. Directory paths, with or
/// without a trailing slash, are served from their `index.html`.
fn lookup(content: &HashMap<String, Vec<u8>>, request_path: &str) -> Option<(String, Vec<u8>)> {
    let candidates = if request_path.ends_with('/') {
        vec![format!("{request_path}index.html")]
    } else {
        vec![
            request_path.to_string(),
            format!("{request_path}/index.html"),
        ]
    };

    candidates.into_iter().find_map(|candidate| {
        let body = content.get(&candidate)?.clone();
        Some((candidate, body))
    })
}
