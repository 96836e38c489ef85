//! Frame graph error types.

use thiserror::Error;

use crate::backend::BackendError;

/// Errors raised while constructing, building or executing a frame graph.
///
/// None of these are recoverable: they describe an authoring bug in the graph
/// description, a device failure, or a broken internal invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameGraphError {
    #[error("resource id {0} is out of range of the registry")]
    UnknownResourceId(u32),

    #[error("pass '{pass}' references resource '{resource}' which is not declared in any table")]
    UndeclaredResource { pass: String, resource: String },

    #[error("resource '{resource}' is declared more than once")]
    DuplicateDeclaration { resource: String },

    #[error("pass '{pass}' declares resource '{resource}' as input more than once")]
    DuplicateInput { pass: String, resource: String },

    #[error("pass '{pass}' declares resource '{resource}' as output more than once")]
    DuplicateOutput { pass: String, resource: String },

    #[error("pass '{pass}' both reads and writes resource '{resource}'")]
    ReadWriteOverlap { pass: String, resource: String },

    #[error("pass '{pass}' declares more than one depth output")]
    MultipleDepthOutputs { pass: String },

    #[error("resource '{resource}' is produced by both '{first}' and '{second}'")]
    MultipleProducers {
        resource: String,
        first: String,
        second: String,
    },

    #[error("render graph contains cyclic dependency between passes: {}", passes.join(", "))]
    CyclicDependency { passes: Vec<String> },

    #[error("resource '{resource}' has conflicting usages: {usages}")]
    ConflictingUsage { resource: String, usages: String },

    #[error("pass '{pass}' uses resource '{resource}' invalidly: {reason}")]
    InvalidAccess {
        pass: String,
        resource: String,
        reason: String,
    },

    #[error("resources '{first}' and '{second}' share a heap while both alive")]
    AliasingOverlap { first: String, second: String },

    #[error("resource '{resource}' was pruned or never registered")]
    ResourceNotRegistered { resource: String },

    #[error("resource '{resource}' is first touched as an input by pass '{pass}'")]
    FirstUseIsInput { resource: String, pass: String },

    #[error("init of pass '{pass}' failed: {source}")]
    PassInitFailed {
        pass: String,
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type FrameGraphResult<T> = Result<T, FrameGraphError>;
