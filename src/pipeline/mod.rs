//! Document orchestration
//!
//! The two batch stages, per document:
//!
//! ```text
//! orch:  load -> stamp pol:mainSubject / pol:origin -> reason -> result graph
//! pol:   load result -> read provenance -> extract + execute policies
//! ```
//!
//! Each document runs sequentially; [`run_batch`] spreads independent
//! documents over a bounded set of worker threads.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use crate::error::{ErrorCode, KoreoError};
use crate::graph::{add_provenance, get_object, top_subjects};
use crate::parser::{parse, Format};
use crate::policy::executor::failures;
use crate::policy::{DocumentContext, Executor, Outcome, PluginResolver};
use crate::reasoner::{reason, Reasoner};
use crate::store::Store;
use crate::term::{ns, Term};

/// Parse a file, inferring the syntax from its extension
///
/// Unknown extensions are read as N3.
pub fn load_store(path: &Path) -> Result<Store, KoreoError> {
    let text = fs::read_to_string(path)
        .map_err(|e| KoreoError::from(e).with_context("path", path.display().to_string()))?;
    let format = Format::from_path(path).unwrap_or_else(|| {
        tracing::warn!(path = %path.display(), "unknown file extension, reading as N3");
        Format::N3
    });
    let base = base_iri(path);
    parse(&text, format, Some(&base))
        .map(|doc| doc.store)
        .map_err(|e| KoreoError::from(e).with_context("path", path.display().to_string()))
}

fn base_iri(path: &Path) -> String {
    let absolute = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}

/// Stamp provenance markers into a document before reasoning
///
/// Every IRI top subject gets a `pol:mainSubject` marker, and `origin`
/// is recorded with `pol:origin`. Returns the main subjects.
pub fn prepare_document(store: &mut Store, origin: &str) -> Result<Vec<Term>, KoreoError> {
    let subjects: Vec<Term> = top_subjects(store)
        .into_iter()
        .filter(|t| matches!(t, Term::Uri(_)))
        .collect();
    if subjects.is_empty() {
        return Err(KoreoError::no_main_subject(origin));
    }

    for subject in &subjects {
        tracing::debug!(main_subject = %subject, "stamping main subject");
        add_provenance(store, ns::POL_MAIN_SUBJECT, &subject.value());
    }
    add_provenance(store, ns::POL_ORIGIN, origin);
    Ok(subjects)
}

/// Load, stamp and reason over one input document
pub fn reason_document(reasoner: &mut dyn Reasoner, path: &Path, rules: &[String]) -> Result<Store, KoreoError> {
    let span = tracing::info_span!("orch", path = %path.display());
    let _enter = span.enter();

    let mut store = load_store(path)?;
    prepare_document(&mut store, &path.display().to_string())?;
    tracing::debug!(quads = store.len(), rules = rules.len(), "reasoning");

    let result = reason(reasoner, &store, rules)
        .map_err(|e| KoreoError::from(e).with_context("path", path.display().to_string()))?;
    tracing::info!(quads = result.len(), "reasoning finished");
    Ok(result)
}

/// Read rule files; anything that is not a regular file is skipped
pub fn read_rules(paths: &[PathBuf]) -> Result<Vec<String>, KoreoError> {
    let mut rules = Vec::with_capacity(paths.len());
    for path in paths {
        if !path.is_file() {
            tracing::warn!(path = %path.display(), "skipping rules path, not a regular file");
            continue;
        }
        let text = fs::read_to_string(path)
            .map_err(|e| KoreoError::from(e).with_context("path", path.display().to_string()))?;
        rules.push(text);
    }
    Ok(rules)
}

/// Provenance of a reasoning result, read back from its markers
pub fn document_context(store: &Store, path: &Path) -> Result<DocumentContext, KoreoError> {
    let path_str = path.display().to_string();
    let main_subject = get_object(store, ns::POL_MAIN_SUBJECT).ok_or_else(|| KoreoError::no_main_subject(&path_str))?;
    let origin = get_object(store, ns::POL_ORIGIN).ok_or_else(|| KoreoError::no_origin(&path_str))?;
    tracing::debug!(main_subject = %main_subject, origin = %origin, "document provenance");
    Ok(DocumentContext::new(path_str, main_subject.value(), origin.value()))
}

/// Extract and execute the policies of one reasoning result
pub fn execute_document(
    store: &Store,
    resolver: &dyn PluginResolver,
    path: &Path,
) -> Result<Vec<Outcome>, KoreoError> {
    let span = tracing::info_span!("pol", path = %path.display());
    let context = {
        let _enter = span.enter();
        document_context(store, path)?
    };
    let executor = Executor::with_span(resolver, tracing::debug_span!(parent: &span, "executor"));
    Ok(executor.run(store, &context))
}

/// Non-hidden regular files of `dir`, sorted by name
pub fn list_inputs(dir: &Path) -> Result<Vec<PathBuf>, KoreoError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        KoreoError::from(e)
            .with_context("path", dir.display().to_string())
            .with_hint("create the input directory or pass --single")
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Worker count for a configured value; 0 means one per CPU
pub fn effective_workers(configured: usize) -> usize {
    if configured == 0 {
        thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    } else {
        configured
    }
}

/// Run `job` for every file on at most `workers` threads
///
/// Results come back in input order.
pub fn run_batch<T, F>(files: &[PathBuf], workers: usize, job: F) -> Vec<(PathBuf, T)>
where
    T: Send,
    F: Fn(&Path) -> T + Sync,
{
    let workers = effective_workers(workers).min(files.len()).max(1);
    if workers == 1 {
        return files.iter().map(|f| (f.clone(), job(f))).collect();
    }

    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();
    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            let job = &job;
            scope.spawn(move || loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(file) = files.get(index) else {
                    break;
                };
                if tx.send((index, job(file))).is_err() {
                    break;
                }
            });
        }
    });
    drop(tx);

    let mut results: Vec<(usize, T)> = rx.into_iter().collect();
    results.sort_by_key(|(index, _)| *index);
    results
        .into_iter()
        .map(|(index, result)| (files[index].clone(), result))
        .collect()
}

/// The `pol` verdict for one document: every policy has to succeed
pub fn judge_outcomes(outcomes: &[Outcome], path: &Path) -> Result<(), KoreoError> {
    match failures(outcomes) {
        0 => Ok(()),
        failed => Err(KoreoError::new(
            ErrorCode::PluginExecutionError,
            format!("{} of {} policies failed", failed, outcomes.len()),
        )
        .with_context("path", path.display().to_string())),
    }
}

/// Run the work for one document, turning a panic into an `InternalError`
pub fn guard_document<F>(path: &Path, work: F) -> Result<(), KoreoError>
where
    F: FnOnce() -> Result<(), KoreoError>,
{
    panic::catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic".to_string());
        Err(KoreoError::new(ErrorCode::InternalError, format!("panicked: {}", message))
            .with_context("path", path.display().to_string()))
    })
}

/// Log a document error; errors that stop a document log at error level
pub fn report_document_error(path: &Path, err: &KoreoError) {
    if err.is_document_fatal() {
        tracing::error!(path = %path.display(), code = err.code.code(), error = %err, "document failed");
    } else {
        tracing::warn!(path = %path.display(), code = err.code.code(), error = %err, "document incomplete");
    }
    tracing::debug!(details = %err.to_json(), "error details");
}

/// Exit status of a batch: 0 when every document succeeded, otherwise the
/// highest exit code among the document errors
pub fn batch_exit_code<'a, I>(results: I) -> i32
where
    I: IntoIterator<Item = &'a Result<(), KoreoError>>,
{
    results
        .into_iter()
        .filter_map(|r| r.as_ref().err())
        .map(KoreoError::exit_code)
        .max()
        .unwrap_or(0)
}
