//! Job dependency graph (section 4.6.3).
//!
//! Completion of a job conditionally enqueues follow-ups. The chain is
//! declared as one flat table of rules instead of being woven into worker
//! code, so a new job type's follow-ups are a data change, not a code
//! change, matching the spec's "new job types can be added without
//! touching workers."
//!
//! ```text
//! FULL_INDEX ──► DOCS_SCAN ──► SUMMARIZE_FILES  ──► EMBED_SUMMARIES
//!                          └─► SUMMARIZE_SYMBOLS ──► EMBED_SUMMARIES
//!            └─► EMBED_MISSING
//!            └─► REGENERATE_SUMMARY
//! ```

use crate::job::JobType;
use crate::registry::RepoRegistration;

/// A flag on the repo registration that gates a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Always,
    AutoEmbed,
    AutoSummaries,
}

impl Condition {
    fn holds(&self, repo: &RepoRegistration) -> bool {
        match self {
            Condition::Always => true,
            Condition::AutoEmbed => repo.auto_embed,
            Condition::AutoSummaries => repo.auto_summaries,
        }
    }
}

/// One declarative `(completed_type, condition) -> follow_up_type` edge.
#[derive(Debug, Clone, Copy)]
pub struct DependencyRule {
    pub completed: JobType,
    pub condition: Condition,
    pub follow_up: JobType,
}

/// The fixed dependency table (section 4.6.3 diagram).
pub const RULES: &[DependencyRule] = &[
    DependencyRule { completed: JobType::FullIndex, condition: Condition::Always, follow_up: JobType::DocsScan },
    DependencyRule { completed: JobType::FullIndex, condition: Condition::AutoEmbed, follow_up: JobType::EmbedMissing },
    DependencyRule { completed: JobType::FullIndex, condition: Condition::AutoSummaries, follow_up: JobType::RegenerateSummary },
    DependencyRule { completed: JobType::DocsScan, condition: Condition::AutoSummaries, follow_up: JobType::SummarizeFiles },
    DependencyRule { completed: JobType::DocsScan, condition: Condition::AutoSummaries, follow_up: JobType::SummarizeSymbols },
    DependencyRule { completed: JobType::SummarizeFiles, condition: Condition::AutoEmbed, follow_up: JobType::EmbedSummaries },
    DependencyRule { completed: JobType::SummarizeSymbols, condition: Condition::AutoEmbed, follow_up: JobType::EmbedSummaries },
];

/// Resolve the follow-up job types to enqueue once `completed` reaches
/// DONE for `repo`, honoring its `auto_embed`/`auto_summaries` flags.
pub fn follow_ups_for(completed: JobType, repo: &RepoRegistration) -> Vec<JobType> {
    RULES
        .iter()
        .filter(|rule| rule.completed == completed && rule.condition.holds(repo))
        .map(|rule| rule.follow_up)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn repo(auto_embed: bool, auto_summaries: bool) -> RepoRegistration {
        RepoRegistration {
            id: uuid::Uuid::new_v4(),
            name: "demo".into(),
            schema_name: "repo_demo".into(),
            root_path: PathBuf::from("/tmp/demo"),
            enabled: true,
            auto_index: true,
            auto_embed,
            auto_watch: false,
            auto_summaries,
            embedding_dimension: None,
            config: serde_json::json!({}),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn full_index_with_all_flags_fans_out_to_three_follow_ups() {
        let r = repo(true, true);
        let follow_ups = follow_ups_for(JobType::FullIndex, &r);
        assert_eq!(follow_ups.len(), 3);
        assert!(follow_ups.contains(&JobType::DocsScan));
        assert!(follow_ups.contains(&JobType::EmbedMissing));
        assert!(follow_ups.contains(&JobType::RegenerateSummary));
    }

    #[test]
    fn full_index_with_flags_off_only_docs_scan() {
        let r = repo(false, false);
        let follow_ups = follow_ups_for(JobType::FullIndex, &r);
        assert_eq!(follow_ups, vec![JobType::DocsScan]);
    }

    #[test]
    fn docs_scan_fans_out_to_both_summarize_types_when_enabled() {
        let r = repo(true, true);
        let mut follow_ups = follow_ups_for(JobType::DocsScan, &r);
        follow_ups.sort_by_key(|jt| jt.as_str());
        assert_eq!(follow_ups, vec![JobType::SummarizeFiles, JobType::SummarizeSymbols]);
    }
}
