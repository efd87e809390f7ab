//! vecsearch analyzer client
//!
//! Finds reference records similar to a venture through the search service,
//! falling back to a sector match on the corpus, and turns analysis text into
//! a structured report.

pub mod report;
pub mod similar;
pub mod types;

pub use report::{basic_analysis, structure_report, Analysis, Report, ReportStatus, SimilarProject};
pub use similar::{MatchSource, SimilarFinder, SimilarMatches, DEFAULT_TOP_K, FALLBACK_SIMILARITY};
pub use types::Venture;
