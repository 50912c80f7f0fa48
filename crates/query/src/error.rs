//! Error types for the query engine.
//!
//! The variants mirror the engine's error taxonomy: syntax and semantic
//! failures surface before execution, catalog errors during it, and
//! `Cancelled` is the silent teardown signal. MISSING is deliberately not an
//! error here; inside expression evaluation it travels as the
//! [`crate::expr::EvalError::Undefined`] sentinel and never reaches a client.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Semantic error: {0}")]
    Semantic(String),

    #[error("alias {0} is defined more than once")]
    DuplicateAlias(String),

    #[error("{0} is not in the GROUP BY clause")]
    NotInGroupBy(String),

    #[error("ambiguous reference to {0}")]
    AmbiguousReference(String),

    #[error("not found: {0}")]
    CatalogNotFound(String),

    #[error("transient catalog failure: {0}")]
    CatalogTransient(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("request cancelled")]
    Cancelled,
}

impl Error {
    /// Whether this error must terminate the pipeline immediately. Transient
    /// catalog failures start as per-row warnings — until repeated failures
    /// exhaust the request's allowance and the pipeline promotes them (see
    /// `pipeline::TransientFailures`); everything else kills the request.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::CatalogTransient(_))
    }
}

impl From<quill_catalog::Error> for Error {
    fn from(err: quill_catalog::Error) -> Self {
        use quill_catalog::Error as Catalog;
        match err {
            Catalog::PoolNotFound(name) => Error::CatalogNotFound(format!("pool {}", name)),
            Catalog::BucketNotFound(name) => Error::CatalogNotFound(format!("bucket {}", name)),
            Catalog::DuplicateIndex(name) => {
                Error::Semantic(format!("index {} already exists", name))
            }
            Catalog::InvalidSource(message) => Error::CatalogNotFound(message),
            Catalog::Transient(message) => Error::CatalogTransient(message),
            Catalog::Unavailable(message) => Error::CatalogTransient(message),
        }
    }
}
