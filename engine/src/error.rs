use thiserror::Error;

use embedcluster_analytics::AnalyticsError;

/// Errors returned by clustering operations.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("cluster: invalid argument: {0}")]
    InvalidArgument(String),

    #[error("cluster: dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("cluster: store error: {0}")]
    Store(String),

    #[error("cluster: remote error: {0}")]
    Remote(#[from] AnalyticsError),

    #[error("cluster: config error: {0}")]
    Config(String),

    /// Any failure inside an engine or the facade, with its original cause.
    #[error("cluster: {op} failed: {source}")]
    Clustering {
        op: &'static str,
        #[source]
        source: Box<ClusterError>,
    },
}

impl ClusterError {
    /// True for caller mistakes (empty input, inconsistent dimensions, bad parameters).
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            ClusterError::InvalidArgument(_) | ClusterError::DimensionMismatch { .. }
        )
    }

    /// Normalizes an error raised while running `op`.
    ///
    /// Invalid arguments surface unchanged; everything else is wrapped once.
    pub(crate) fn normalize(op: &'static str, err: ClusterError) -> ClusterError {
        if err.is_invalid_argument() || matches!(err, ClusterError::Clustering { .. }) {
            return err;
        }
        ClusterError::Clustering {
            op,
            source: Box::new(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClusterError>;

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn invalid_argument_passes_through() {
        let err = ClusterError::normalize("kmeans", ClusterError::InvalidArgument("empty".into()));
        assert!(matches!(err, ClusterError::InvalidArgument(_)));

        let err = ClusterError::normalize(
            "kmeans",
            ClusterError::DimensionMismatch {
                expected: 2,
                got: 3,
            },
        );
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn other_errors_are_wrapped_with_cause() {
        let err = ClusterError::normalize("gnn", ClusterError::Remote(AnalyticsError::EmptyInput));
        assert!(matches!(err, ClusterError::Clustering { op: "gnn", .. }));
        assert!(err.to_string().contains("gnn failed"));
        let cause = err.source().expect("cause preserved");
        assert!(cause.to_string().contains("analytics: empty input"));
    }

    #[test]
    fn wrapping_is_not_repeated() {
        let once = ClusterError::normalize("store", ClusterError::Store("down".into()));
        let twice = ClusterError::normalize("cluster", once);
        match twice {
            ClusterError::Clustering { op, source } => {
                assert_eq!(op, "store");
                assert!(matches!(*source, ClusterError::Store(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
