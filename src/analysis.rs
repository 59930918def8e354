use log::{debug, info};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::Result;
use crate::llm::{analysis_field, parse_response, ChatRequest, ModelClient, Prompt, Template};
use crate::record::{merge_collections, MergePolicy, Record, AI_RESULT_FIELD};
use crate::store::RecordStore;

/// Which source records get sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Recompute every record, ignoring stored results.
    All,
    /// Only records without a stored `AI-Result`.
    Remaining,
}

impl RunMode {
    /// Merge policy used when committing the run's results to the store.
    pub fn merge_policy(&self) -> MergePolicy {
        match self {
            RunMode::All => MergePolicy::Refresh,
            RunMode::Remaining => MergePolicy::FillGaps,
        }
    }
}

/// When the working copy is written back to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitPolicy {
    /// After every analysed record, and once more at the end of the pass.
    #[default]
    PerRecord,
    /// Once, after the pass (or when it stops early).
    EndOfPass,
}

/// What happened to one source record during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Already analysed; no model call was made.
    Skipped,
    /// Model reply stored and interpreted.
    Done,
    /// Model reply stored, but it could not be interpreted; derived fields hold template defaults.
    Failed(String),
}

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisReport {
    pub model_calls: usize,
    pub done: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Sequential enrichment loop: for each source record, ask the model,
/// interpret the reply and upsert the analysis record into the store.
pub struct Analyzer<C, S> {
    client: C,
    store: S,
    prompt: Prompt,
    template: Template,
    commit: CommitPolicy,
}

impl<C: ModelClient, S: RecordStore> Analyzer<C, S> {
    pub fn new(client: C, store: S) -> Self {
        Self {
            client,
            store,
            prompt: Prompt::default(),
            template: Template::default(),
            commit: CommitPolicy::default(),
        }
    }

    pub fn with_prompt(mut self, prompt: Prompt) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_template(mut self, template: Template) -> Self {
        self.template = template;
        self
    }

    pub fn with_commit_policy(mut self, commit: CommitPolicy) -> Self {
        self.commit = commit;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Run the loop without a progress callback.
    pub fn run(&self, sources: &[Record], mode: RunMode) -> Result<AnalysisReport> {
        self.run_with_progress(sources, mode, |_, _| {})
    }

    /// Run the loop over `sources` in order, calling `on_progress` after each record.
    ///
    /// Model-backend errors stop the run; whatever was analysed before the
    /// failure is still committed before the error is returned.
    pub fn run_with_progress<F>(&self, sources: &[Record], mode: RunMode, mut on_progress: F) -> Result<AnalysisReport>
    where
        F: FnMut(&Record, &Outcome),
    {
        let policy = mode.merge_policy();
        let mut working = self.load_working_copy(sources)?;
        let mut report = AnalysisReport::default();

        let pass = self.process_all(sources, mode, &mut working, &mut report, &mut on_progress);

        let committed = self.store.upsert_with(working, policy);
        match (pass, committed) {
            (Err(e), Err(commit_error)) => {
                log::warn!("Could not commit results after a failed run: {}", commit_error);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(())) => {
                info!(
                    "Analysis finished: {} analysed, {} uninterpretable, {} skipped",
                    report.done, report.failed, report.skipped
                );
                Ok(report)
            }
        }
    }

    fn process_all<F>(
        &self,
        sources: &[Record],
        mode: RunMode,
        working: &mut Vec<Record>,
        report: &mut AnalysisReport,
        on_progress: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&Record, &Outcome),
    {
        let policy = mode.merge_policy();

        for source in sources {
            info!("Analysing article: {}", source.id);

            if mode == RunMode::Remaining && is_done(working, &source.id) {
                debug!("Skipping {}: already analysed", source.id);
                report.skipped += 1;
                on_progress(source, &Outcome::Skipped);
                continue;
            }

            report.model_calls += 1;
            let (analysed, outcome) = self.analyse(source)?;
            match outcome {
                Outcome::Failed(_) => report.failed += 1,
                _ => report.done += 1,
            }

            merge_collections(working, vec![analysed.clone()], MergePolicy::Refresh);
            if self.commit == CommitPolicy::PerRecord {
                self.store.upsert_with(vec![analysed.clone()], policy)?;
            }
            on_progress(&analysed, &outcome);
        }
        Ok(())
    }

    /// Ask the model about one source record and build its analysis record.
    ///
    /// The raw reply is always kept as `AI-Result`; an uninterpretable reply
    /// leaves every derived field at its template default.
    pub fn analyse(&self, source: &Record) -> Result<(Record, Outcome)> {
        let request = ChatRequest {
            prompt: &self.prompt,
            title: source.get_str("title").unwrap_or_default(),
            abstract_text: source.get_str("abstract").unwrap_or_default(),
            template: &self.template,
        };
        let raw = self.client.chat(&request)?;

        let (structured, outcome) = match parse_response(&raw, &self.template) {
            Ok(structured) => (structured, Outcome::Done),
            Err(e) if e.is_interpretation_failure() => {
                log::warn!("Could not interpret AI response for {}: {}", source.id, e);
                (self.template.defaults(), Outcome::Failed(e.to_string()))
            }
            Err(e) => return Err(e),
        };

        let mut record = source.clone();
        record.set(AI_RESULT_FIELD, raw);
        for (category, value) in structured {
            record.set(analysis_field(&category), value);
        }
        Ok((record, outcome))
    }

    /// Existing store contents as stored, plus a placeholder row for every
    /// source id the store lacks. Existing rows are never touched here.
    fn load_working_copy(&self, sources: &[Record]) -> Result<Vec<Record>> {
        let mut working = if self.store.exists() {
            self.store.read_all()?
        } else {
            info!("No analysis store yet, starting from {} source records", sources.len());
            Vec::new()
        };

        let mut known: HashSet<String> = working.iter().map(|record| record.id.clone()).collect();
        for source in sources {
            if known.insert(source.id.clone()) {
                working.push(self.placeholder(source));
            }
        }
        Ok(working)
    }

    fn placeholder(&self, source: &Record) -> Record {
        let mut record = source.clone();
        record.fields.entry(AI_RESULT_FIELD.to_string()).or_insert(Value::Null);
        for (category, _) in self.template.iter() {
            record.fields.entry(analysis_field(category)).or_insert(Value::Null);
        }
        record
    }
}

fn is_done(working: &[Record], id: &str) -> bool {
    working
        .iter()
        .find(|record| record.id == id)
        .map(Record::is_analysed)
        .unwrap_or(false)
}

/// Previously stored results, for the replay activity.
pub fn replay<S: RecordStore>(store: &S) -> Result<Vec<Record>> {
    let records = store.read_all()?;
    Ok(records.into_iter().filter(Record::is_analysed).collect())
}
