use std::{path::PathBuf, sync::Arc};

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::{
    template::{Render, RenderError},
    types::{TargetPair, TemplateContext},
    write,
};

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Failed to build template context: {0}")]
    ContextError(#[from] serde_json::Error),

    #[error("Failed to render '{template}': {source}")]
    RenderError {
        template: PathBuf,
        #[source]
        source: RenderError,
    },

    #[error("Failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Generation task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

/// Renders every target concurrently and writes each result to its output.
///
/// Each pair runs as its own task and may finish in any order. The first
/// failure aborts the tasks that have not finished yet and is returned;
/// outputs already written stay on disk. `on_complete` runs only once every
/// output has been written, and receives the outputs in target order.
pub async fn generate<F>(
    targets: Vec<TargetPair>,
    context: &TemplateContext,
    renderer: Arc<dyn Render>,
    on_complete: F,
) -> Result<Vec<PathBuf>, GenerateError>
where
    F: FnOnce(&[PathBuf]),
{
    let context = Arc::new(context.to_map()?);
    let total = targets.len();
    let mut tasks = JoinSet::new();

    for (index, target) in targets.into_iter().enumerate() {
        debug!(
            output = %target.output.display(),
            template = %target.template.display(),
            "Dispatching render"
        );

        let renderer = Arc::clone(&renderer);
        let context = Arc::clone(&context);
        tasks.spawn_blocking(move || generate_one(index, target, renderer.as_ref(), &context));
    }

    let mut written: Vec<Option<PathBuf>> = vec![None; total];

    while let Some(joined) = tasks.join_next().await {
        match joined.map_err(GenerateError::from).and_then(|result| result) {
            Ok((index, path)) => written[index] = Some(path),
            Err(err) => {
                tasks.abort_all();
                return Err(err);
            }
        }
    }

    let written: Vec<PathBuf> = written.into_iter().flatten().collect();
    on_complete(&written);

    Ok(written)
}

fn generate_one(
    index: usize,
    target: TargetPair,
    renderer: &dyn Render,
    context: &Map<String, Value>,
) -> Result<(usize, PathBuf), GenerateError> {
    let rendered = renderer
        .render_file(&target.template, context)
        .map_err(|source| GenerateError::RenderError {
            template: target.template.clone(),
            source,
        })?;

    write::write(&target.output, &rendered).map_err(|source| GenerateError::WriteError {
        path: target.output.clone(),
        source,
    })?;

    info!(path = %target.output.display(), "generated file");

    Ok((index, target.output))
}
