use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::sparql::laborer::document::load_document;
use crate::sparql::laborer::error::Result;
use crate::sparql::laborer::expand::{ExpandedCollection, QuerySnapshot, Snapshot};
use crate::sparql::laborer::harmonize::harmonize;
use crate::sparql::laborer::io::executor::{
    Execution, Executor, TRIPLE_COUNT_QUERY, count_query, parse_count,
};
use crate::sparql::laborer::io::report::{LocalDestinations, RunHeader, WriterFactory};
use crate::sparql::laborer::model::{QueryRecord, RawResult, ResultFormat};

/// Progress of an [`IterationController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run has been executed yet.
    Init,
    /// Run `i` was the last one executed; more runs remain.
    Executing(usize),
    /// Every run has been executed.
    Completed,
}

type PostProcessing<'a> = Box<dyn FnMut(&Snapshot<'_>, &[QueryRecord]) + 'a>;
type Pause<'a> = Box<dyn FnMut(Duration) + 'a>;

/// Drives every run of an expanded collection, one after the other.
///
/// Each run executes the full query list of its snapshot, writes through a
/// writer opened for that run only, and starts from an empty record list.
pub struct IterationController<'a, E, W> {
    collection: &'a ExpandedCollection,
    executor: E,
    writers: W,
    post_processing: Option<PostProcessing<'a>>,
    pause: Pause<'a>,
    state: RunState,
    records: Vec<QueryRecord>,
}

impl<'a, E: Executor, W: WriterFactory> IterationController<'a, E, W> {
    pub fn new(collection: &'a ExpandedCollection, executor: E, writers: W) -> Self {
        Self {
            collection,
            executor,
            writers,
            post_processing: None,
            pause: Box::new(thread::sleep),
            state: RunState::Init,
            records: Vec::new(),
        }
    }

    /// Hook invoked after the last query of every run with that run's
    /// records.
    pub fn with_post_processing(
        mut self,
        hook: impl FnMut(&Snapshot<'_>, &[QueryRecord]) + 'a,
    ) -> Self {
        self.post_processing = Some(Box::new(hook));
        self
    }

    /// Replaces the blocking sleep used for the cooldown between queries.
    pub fn with_pause(mut self, pause: impl FnMut(Duration) + 'a) -> Self {
        self.pause = Box::new(pause);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Records of the run executed last.
    pub fn records(&self) -> &[QueryRecord] {
        &self.records
    }

    /// Executes the next run and returns the resulting state.
    pub fn step(&mut self) -> Result<RunState> {
        let index = match self.state {
            RunState::Init => 0,
            RunState::Executing(previous) => previous + 1,
            RunState::Completed => return Ok(RunState::Completed),
        };

        let collection = self.collection;
        let Some(snapshot) = collection.snapshot(index) else {
            self.state = RunState::Completed;
            return Ok(self.state);
        };

        self.state = RunState::Executing(index);
        self.execute_run(&snapshot)?;

        if index + 1 >= collection.run_count() {
            self.state = RunState::Completed;
        }
        Ok(self.state)
    }

    /// Executes every remaining run. The first fatal error stops the loop;
    /// output of runs finished before it stays on disk.
    pub fn run_to_completion(&mut self) -> Result<()> {
        while self.step()? != RunState::Completed {}
        Ok(())
    }

    #[instrument(
        level = "info",
        skip_all,
        fields(run = snapshot.index + 1, title = snapshot.title)
    )]
    fn execute_run(&mut self, snapshot: &Snapshot<'_>) -> Result<()> {
        info!(
            runs = self.collection.run_count(),
            endpoint = snapshot.endpoint,
            "starting run"
        );
        self.records.clear();

        let mut writer = self.writers.open(snapshot)?;
        let header = self.run_header(snapshot);
        writer.write_header(&header)?;

        let last = snapshot.queries.len().saturating_sub(1);
        for (position, query) in snapshot.queries.iter().enumerate() {
            let record = self.execute_query(snapshot, query)?;

            writer.write_query_summary(&record)?;
            if record.matrix.has_data() || snapshot.write_empty_results {
                writer.write_query_result(&record)?;
            } else {
                debug!(id = record.id, "result has no data rows, not written");
            }

            if let Some(callback) = query.callback {
                callback.call(&record);
            }
            self.records.push(record);

            if !snapshot.cooldown.is_zero() && position < last {
                debug!(cooldown = ?snapshot.cooldown, "cooling down");
                (self.pause)(snapshot.cooldown);
            }
        }

        if let Some(hook) = self.post_processing.as_mut() {
            hook(snapshot, &self.records);
        }

        writer.close()?;
        info!(queries = self.records.len(), "run finished");
        Ok(())
    }

    fn run_header(&self, snapshot: &Snapshot<'_>) -> RunHeader {
        let mut header = RunHeader {
            title: snapshot.title.to_string(),
            description: snapshot.description.to_string(),
            started_at: snapshot.started_at.to_string(),
            endpoint: snapshot.endpoint.to_string(),
            triple_count: None,
            error: None,
        };

        if snapshot.count_the_results {
            match self.count(TRIPLE_COUNT_QUERY, snapshot.endpoint) {
                Ok(count) => {
                    info!(triples = count, "counted triples in endpoint");
                    header.triple_count = Some(count);
                }
                Err(err) => {
                    warn!(error = %err, "could not count triples in endpoint");
                    header.error = Some(format!("Triples in endpoint could not be counted: {err}"));
                }
            }
        }
        header
    }

    #[instrument(level = "info", skip_all, fields(id = query.id, title = query.title))]
    fn execute_query(
        &self,
        snapshot: &Snapshot<'_>,
        query: &QuerySnapshot<'_>,
    ) -> Result<QueryRecord> {
        let format = snapshot.output_format.wire_format();
        let started = Instant::now();
        let (raw, duration) = match self.executor.run(query.query, snapshot.endpoint, format) {
            Ok(Execution { body, duration }) => {
                info!(bytes = body.len(), ?duration, "query executed");
                (RawResult::Body(body), duration)
            }
            Err(err) => {
                warn!(error = %err, "query failed, continuing with the next one");
                (RawResult::Failed(err.to_string()), started.elapsed())
            }
        };

        let query_for_count = if snapshot.count_the_results {
            count_query(query.query)
        } else {
            None
        };
        let line_count = match (&query_for_count, &raw) {
            (Some(derived), RawResult::Body(_)) => match self.count(derived, snapshot.endpoint) {
                Ok(count) => Some(count),
                Err(err) => {
                    warn!(error = %err, "could not count result lines");
                    None
                }
            },
            _ => None,
        };

        let matrix = harmonize(&raw, snapshot.output_format)?;

        Ok(QueryRecord {
            id: query.id,
            title: query.title.to_string(),
            description: query.description.to_string(),
            query: query.query.to_string(),
            query_for_count,
            raw,
            matrix,
            duration,
            line_count,
            user_data: query.user_data.cloned(),
        })
    }

    fn count(&self, query: &str, endpoint: &str) -> Result<u64> {
        let execution = self.executor.run(query, endpoint, ResultFormat::Json)?;
        parse_count(&execution.body)
    }
}

/// Loads a query collection from `input`, expands it, and executes every run
/// through `executor`, writing to the local destinations.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn run_file<E: Executor>(input: &Path, started_at: &str, executor: E) -> Result<()> {
    let document = load_document(input)?;
    let collection = ExpandedCollection::expand(document, started_at)?;
    let mut controller = IterationController::new(&collection, executor, LocalDestinations);
    controller.run_to_completion()
}
