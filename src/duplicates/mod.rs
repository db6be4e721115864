//! Near-duplicate detection.
//!
//! This module provides functionality for:
//! - Analysis parameters and their validation ([`params`])
//! - Pairwise matching and union-find clustering ([`groups`])
//! - The end-to-end analysis pipeline ([`pipeline`])

pub mod groups;
pub mod params;
pub mod pipeline;

pub use groups::{
    DisjointSet, DistancePair, DuplicateGroup, GroupMember, GroupingEngine, ImageRecord,
    MatchCriterion,
};
pub use params::{AnalysisParams, ParamsError};
pub use pipeline::{AnalysisPipeline, AnalysisResult, ImageFailure, PipelineError};
