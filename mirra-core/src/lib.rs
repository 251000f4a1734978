pub mod config;
pub mod error;
pub mod freshness;
pub mod frontmatter;
pub mod index;
pub mod markdown;
pub mod output;
pub mod page;
pub mod pipeline;
pub mod props;
pub mod report;
pub mod store;
pub mod sync;
pub mod template;
pub mod trigger;
pub mod walker;

// Re-export main types
pub use config::BuildRunConfig;
pub use error::BuildError;
pub use freshness::{BuildReason, DependencyClock, needs_build};
pub use frontmatter::SourceItem;
pub use index::ContentRecord;
pub use pipeline::Pipeline;
pub use report::BuildReport;
pub use template::{Diagnostic, DiagnosticKind, TemplateEngine};
pub use trigger::RebuildTrigger;
pub use walker::{EntryKind, MirrorWalker, PathPair};
