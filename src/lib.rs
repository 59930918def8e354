//! Enrich BibTeX bibliographies with structured summaries produced by a
//! language model, keeping the results in an id-keyed record store.

pub mod analysis;
pub mod bibtex;
pub mod config;
pub mod error;
pub mod llm;
pub mod record;
pub mod store;

pub use analysis::{replay, AnalysisReport, Analyzer, CommitPolicy, Outcome, RunMode};
pub use bibtex::{load_records, parse_bibtex, read_bibtex};
pub use config::Settings;
pub use error::{Result, SabimError};
pub use llm::{Backend, ChatRequest, LlmClient, ModelClient, Prompt, Shape, Template};
pub use record::{MergePolicy, Record, AI_RESULT_FIELD};
pub use store::{JsonStore, RecordStore, SqliteTable};
