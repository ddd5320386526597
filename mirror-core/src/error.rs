use thiserror::Error;

/// The error taxonomy for the resource mirror.
///
/// Variants are disjoint: a caller can match on the kind to decide whether
/// a failure is a caller mistake (`InvalidQuery`, `NilChannel`), a
/// not-actually-an-error empty result they mishandled (never represented
/// here -- see the `found`/`Option` returns on the query API), or an
/// internal condition worth surfacing (`BackendFailure`, `UIDExhaustion`).
#[derive(Debug, Error)]
pub enum MirrorError {
    /// A query segment failed its validation regex, a required field (e.g.
    /// `kind`) was missing, or a terminal operation was attempted on a
    /// builder missing a required field.
    #[error("invalid query: {field}: {reason}")]
    InvalidQuery {
        /// The offending field name, e.g. `"namespace"` or `"kind"`.
        field: &'static str,
        /// A human-readable description of what was wrong.
        reason: String,
    },

    /// A `Get` matched more than one object where exactly one (or zero)
    /// was expected.
    #[error("query matched {count} objects, expected at most one")]
    AmbiguousResult {
        /// How many objects matched.
        count: usize,
    },

    /// A field-index `Set` matched more than one indexed document for the
    /// object's `(kind, namespace, name, version)` tuple.
    #[error("set matched {count} existing documents, expected at most one")]
    AmbiguousUpdate {
        /// How many documents matched.
        count: usize,
    },

    /// The requested [`ResourceKey`](crate::ResourceKey) string is not in
    /// the fixed resource-kind registry.
    #[error("unknown resource kind: {0}")]
    UnknownKind(String),

    /// The initial cache-sync for a resource kind did not complete within
    /// the configured timeout.
    #[error("timed out waiting for cache sync after {0:?}")]
    SyncTimeout(std::time::Duration),

    /// [`Listener`](crate::Listener) registration was attempted without an
    /// outbound channel.
    #[error("listener registered with no channel")]
    NilChannel,

    /// The field-index backend could not mint a unique synthetic document
    /// UID within its collision-probe budget.
    #[error("failed to mint a unique document id after {attempts} attempts")]
    UIDExhaustion {
        /// How many collision-probe attempts were made.
        attempts: u32,
    },

    /// The underlying index or tree raised an internal error while
    /// servicing a mutation or query.
    #[error("backend failure: {0}")]
    BackendFailure(String),
}
