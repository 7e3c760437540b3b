//! Static file handler behind [`Routes::static_dir`](crate::Routes::static_dir).

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use http::StatusCode;
use tracing::debug;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::method::Method;
use crate::response::ContentType;

/// Serves files from `root`, picking the file by the catch-all tail.
pub(crate) struct ServeDir {
    root: PathBuf,
    /// Parameter key the engine reports the tail under.
    key: String,
}

impl ServeDir {
    pub(crate) fn new(root: impl Into<PathBuf>, key: String) -> Self {
        Self { root: root.into(), key }
    }

    pub(crate) fn into_handler(self) -> BoxedHandler {
        BoxedHandler::new(self)
    }

    async fn serve(&self, ctx: &mut Context) -> Result {
        let tail = ctx.param(&self.key).unwrap_or_default();
        let Some(file) = resolve(&self.root, tail) else {
            return Err(Error::http(StatusCode::NOT_FOUND, "not found"));
        };

        let body = match tokio::fs::read(&file).await {
            Ok(body) => body,
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::IsADirectory) => {
                debug!(file = %file.display(), "static file missing");
                return Err(Error::http(StatusCode::NOT_FOUND, "not found"));
            }
            Err(e) => return Err(e.into()),
        };

        let content_type = file
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(ContentType::OctetStream, ContentType::from_extension);
        let len = body.len().to_string();
        if ctx.method() == Method::Head {
            ctx.bytes(content_type, Vec::new());
        } else {
            ctx.bytes(content_type, body);
        }
        ctx.set_header("content-length", &len);
        Ok(())
    }
}

impl ErasedHandler for ServeDir {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result> {
        Box::pin(self.serve(ctx))
    }
}

/// Joins a request tail onto `root`, refusing anything that could escape it.
fn resolve(root: &Path, tail: &str) -> Option<PathBuf> {
    let mut file = root.to_path_buf();
    for component in Path::new(tail.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => file.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (file != root).then_some(file)
}
