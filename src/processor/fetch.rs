//! Stream acquisition: the one concurrent phase of a merge.
//!
//! Every required stream is requested at once. The merge only starts if all
//! of them open; otherwise in-flight requests are dropped, opened streams
//! are closed, and a single error names what failed.

use std::collections::HashSet;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};

use crate::error::{MergeError, MergeResult};
use crate::stream::{
    close_all, BoxedRowSource, Filter, Row, RowSource, StreamMap, StreamSpec, TabularSource,
};
use crate::tree::COMPUTED_VAR_STREAM_NAME;

/// One stream to open.
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    pub spec: &'a StreamSpec,
    /// Columns the stream must carry: id columns, then requested variables.
    pub columns: Vec<String>,
    /// The spec's override, or the request's subset filters.
    pub filters: &'a [Filter],
}

/// Opens row streams for the tree.
#[async_trait]
pub trait StreamFetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest<'_>) -> MergeResult<BoxedRowSource>;
}

/// Open every stream in `requests` concurrently.
///
/// Returns the opened streams keyed by name, or the first failure. On
/// failure or timeout nothing is leaked: pending fetches are cancelled by
/// dropping them and opened streams are closed.
pub async fn fetch_all(
    fetcher: &dyn StreamFetcher,
    requests: &[FetchRequest<'_>],
    timeout: Duration,
) -> MergeResult<StreamMap> {
    info!("Requesting {} stream(s)", requests.len());
    let mut pending: FuturesUnordered<_> = requests
        .iter()
        .map(|request| async move { (request.spec.name.clone(), fetcher.fetch(request).await) })
        .collect();

    let mut opened = StreamMap::new();
    let mut failures = Vec::new();
    let drained = tokio::time::timeout(timeout, async {
        while let Some((name, result)) = pending.next().await {
            match result {
                Ok(source) => {
                    debug!("Stream {} opened", name);
                    opened.insert(name, source);
                }
                Err(e) => {
                    warn!("Stream {} failed to open: {}", name, e);
                    failures.push((name, e.to_string()));
                    break;
                }
            }
        }
    })
    .await;

    let cancelled = pending.len();
    drop(pending);

    if drained.is_err() {
        warn!(
            "Stream acquisition timed out; cancelled {} fetch(es), closing {} opened stream(s)",
            cancelled,
            opened.len()
        );
        close_all(opened);
        return Err(MergeError::FetchTimeout(timeout.as_secs()));
    }
    if !failures.is_empty() {
        warn!(
            "Cancelled {} fetch(es), closing {} opened stream(s)",
            cancelled,
            opened.len()
        );
        close_all(opened);
        return Err(MergeError::StreamFetch { failures });
    }

    info!("All requested streams ({}) ready for consumption", opened.len());
    Ok(opened)
}

// =============================================================================
// Directory-backed fetcher
// =============================================================================

/// Reads `<dir>/<entity_id>.tsv` for each stream, keeping only the requested
/// columns. The computed stream is read from a separate file if one is set.
///
/// Filters are not evaluated; files are expected to be subset already.
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    dir: PathBuf,
    computed_file: Option<PathBuf>,
}

impl DirectoryFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            computed_file: None,
        }
    }

    pub fn with_computed_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.computed_file = Some(path.into());
        self
    }

    fn path_for(&self, spec: &StreamSpec) -> MergeResult<PathBuf> {
        if spec.name == COMPUTED_VAR_STREAM_NAME {
            return self
                .computed_file
                .clone()
                .ok_or_else(|| MergeError::StreamNotDistributed(spec.name.clone()));
        }
        Ok(self.dir.join(format!("{}.tsv", spec.entity_id)))
    }
}

#[async_trait]
impl StreamFetcher for DirectoryFetcher {
    async fn fetch(&self, request: &FetchRequest<'_>) -> MergeResult<BoxedRowSource> {
        let path = self.path_for(request.spec)?;
        if !request.filters.is_empty() {
            debug!(
                "Ignoring {} filter(s) for {}",
                request.filters.len(),
                path.display()
            );
        }
        let content = tokio::fs::read(&path).await?;
        let source = TabularSource::new(&request.spec.name, Cursor::new(content))?;
        source.require_columns(request.columns.as_slice())?;
        debug!("Opened {} for stream {}", path.display(), request.spec.name);
        Ok(Box::new(ProjectedSource::new(source, &request.columns)))
    }
}

/// Drops every column not in `columns`.
struct ProjectedSource<S> {
    inner: S,
    columns: HashSet<String>,
}

impl<S: RowSource> ProjectedSource<S> {
    fn new(inner: S, columns: &[String]) -> Self {
        Self {
            inner,
            columns: columns.iter().cloned().collect(),
        }
    }
}

impl<S: RowSource> RowSource for ProjectedSource<S> {
    fn next_row(&mut self) -> Option<MergeResult<Row>> {
        self.inner.next_row().map(|row| {
            row.map(|mut row| {
                row.retain(|column, _| self.columns.contains(column));
                row
            })
        })
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
