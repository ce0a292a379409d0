//! `sitelog list`: drive a paginated fetch controller to the end of a list.

use std::io::Write;
use std::num::NonZeroUsize;
use std::sync::Arc;

use anyhow::Context;
use serde_json::Value;
use sitelog_sync::{LoadOutcome, PaginatedFetchController, TransportPageSource};

use crate::backend::BackendArgs;

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// List endpoint, e.g. `/workers/list`.
    pub path: String,

    /// Rows per page.
    #[arg(long, default_value = "10")]
    pub page_size: NonZeroUsize,

    /// Server-side search term.
    #[arg(long)]
    pub search: Option<String>,

    /// Stop after this many pages.
    #[arg(long)]
    pub max_pages: Option<usize>,
}

pub async fn run(backend: &BackendArgs, args: ListArgs) -> anyhow::Result<()> {
    let session = backend.session();
    let transport = backend.transport(session.clone())?;
    let source = Arc::new(TransportPageSource::<Value>::new(transport, args.path.as_str()));
    let ctrl = PaginatedFetchController::new(source, args.page_size).with_session(session.as_ref());
    if let Some(term) = args.search {
        ctrl.set_search(term);
    }

    let mut stdout = std::io::stdout().lock();
    let mut printed = 0usize;
    let mut pages = 0usize;

    loop {
        if args.max_pages.is_some_and(|max| pages >= max) {
            break;
        }
        let outcome = ctrl
            .load_next()
            .await
            .with_context(|| format!("loading rows from {} at offset {}", args.path, ctrl.cursor()))?;
        match outcome {
            LoadOutcome::Loaded { has_more, .. } => {
                pages += 1;
                for row in &ctrl.items()[printed..] {
                    writeln!(stdout, "{}", serde_json::to_string(row)?)?;
                }
                printed = ctrl.len();
                if !has_more {
                    break;
                }
            }
            LoadOutcome::Skipped(_) | LoadOutcome::Discarded => break,
        }
    }

    tracing::info!(rows = printed, pages, "list complete");
    Ok(())
}
