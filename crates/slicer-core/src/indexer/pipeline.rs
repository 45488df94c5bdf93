//! Program loading with Rayon-based parallel parsing.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::SlicerResult;
use crate::indexer::filesystem::{iter_java_files, relative_path};
use crate::indexer::parser::{lower, parse_source, parse_java, ParsedSource};
use crate::models::{Program, UnitOrigin};

#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub workers: usize,
    /// Gitignore-style globs, relative to the scanned root.
    pub exclude_patterns: Vec<String>,
    /// Extra roots whose files are loaded as `UnitOrigin::Library`.
    pub library_roots: Vec<PathBuf>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            exclude_patterns: Vec::new(),
            library_roots: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileError {
    pub path: String,
    pub stage: String,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub files_seen: usize,
    pub files_loaded: usize,
    pub files_failed: usize,
    pub elapsed_ms: u64,
}

pub struct LoadedProgram {
    pub program: Program,
    pub errors: Vec<FileError>,
    pub stats: LoadStats,
}

struct Job {
    absolute: PathBuf,
    path: String,
    origin: UnitOrigin,
}

fn parse_file_worker(job: &Job) -> Result<ParsedSource, FileError> {
    let source = std::fs::read_to_string(&job.absolute).map_err(|e| FileError {
        path: job.path.clone(),
        stage: "read".to_string(),
        message: e.to_string(),
    })?;
    parse_source(&job.path, source, job.origin).map_err(|e| FileError {
        path: job.path.clone(),
        stage: "parse".to_string(),
        message: e.to_string(),
    })
}

fn parallel_parse(jobs: &[Job], workers: usize) -> Vec<Result<ParsedSource, FileError>> {
    if jobs.is_empty() {
        return vec![];
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build();
    match pool {
        Ok(pool) => pool.install(|| jobs.par_iter().map(parse_file_worker).collect()),
        Err(e) => {
            warn!("Falling back to sequential parsing: {e}");
            jobs.iter().map(parse_file_worker).collect()
        }
    }
}

fn collect_jobs(root: &Path, excludes: &[String], origin: UnitOrigin) -> SlicerResult<Vec<Job>> {
    Ok(iter_java_files(root, excludes)?
        .into_iter()
        .map(|absolute| Job {
            path: relative_path(root, &absolute),
            absolute,
            origin,
        })
        .collect())
}

/// Load every Java file under `root` (plus any library roots) into a single
/// `Program`. Files are parsed in parallel and lowered in path order, so the
/// resulting node ids are deterministic. Per-file failures are collected
/// rather than aborting the load.
pub fn load_program(root: &Path, options: &PipelineOptions) -> SlicerResult<LoadedProgram> {
    let started = Instant::now();
    let mut jobs = collect_jobs(root, &options.exclude_patterns, UnitOrigin::Source)?;
    for library in &options.library_roots {
        jobs.extend(collect_jobs(library, &[], UnitOrigin::Library)?);
    }

    let mut program = Program::new();
    let mut errors = Vec::new();
    for result in parallel_parse(&jobs, options.workers) {
        match result {
            Ok(parsed) => {
                lower(&mut program, &parsed);
            }
            Err(error) => {
                warn!("Skipping {} ({}): {}", error.path, error.stage, error.message);
                errors.push(error);
            }
        }
    }

    let stats = LoadStats {
        files_seen: jobs.len(),
        files_loaded: program.units().len(),
        files_failed: errors.len(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        "Loaded {} of {} Java files from {} in {}ms",
        stats.files_loaded,
        stats.files_seen,
        root.display(),
        stats.elapsed_ms
    );
    Ok(LoadedProgram {
        program,
        errors,
        stats,
    })
}

/// Build a program from in-memory `(path, source)` pairs, all as source units.
pub fn load_sources(sources: &[(&str, &str)]) -> SlicerResult<Program> {
    let mut program = Program::new();
    for (path, source) in sources {
        parse_java(&mut program, path, source, UnitOrigin::Source)?;
    }
    Ok(program)
}
