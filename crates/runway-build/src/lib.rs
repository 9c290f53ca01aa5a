//! Template, buildspec, and source archive generation for runway.
//!
//! # Deploy pipeline
//!
//! ```text
//! runway deploy [ENV]
//!   1. Preflight   ── aws sts get-caller-identity (+ docker info for local builds)
//!   2. Probe       ── cloudformation describe-stacks <prefix>-<env>
//!   3. Bootstrap   ── StackTemplate, createService=false (first deploy only)
//!   4. Publish     ── local: docker build/tag/push
//!                     remote: archive → S3 → CodeBuild (BuildSpec) → poll
//!   5. Converge    ── StackTemplate, createService=true
//!   6. Report      ── ServiceUrl stack output
//! ```
//!
//! # Archive strategy
//!
//! The remote build archive mirrors the git working tree:
//! - Tracked and untracked (non-ignored) files via `git ls-files`
//! - A plain directory walk when the project is not a git work tree
//! - VCS, dependency-cache, and build-output directories are always excluded

pub mod archive;
pub mod buildspec;
pub mod policy;
pub mod template;

pub use buildspec::BuildSpecGenerator;
pub use template::{StackParameters, StackTemplate};
