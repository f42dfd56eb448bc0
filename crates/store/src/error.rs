use thiserror::Error;

/// Classified store failures.
///
/// The runtime has exactly one decision point that maps these onto
/// log-and-continue versus log-and-exit; only `is_fatal` variants end the
/// process.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request never produced a usable response (connect, TLS, timeout).
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("store returned {status} during {context}: {message}")]
    Api {
        status: u16,
        context: &'static str,
        message: String,
    },

    /// The response decoded into something other than the declared shape.
    #[error("malformed store response during {context}: {reason}")]
    Malformed {
        context: &'static str,
        reason: String,
    },

    /// The resource in the store belongs to a different cluster than this
    /// sidecar was configured for. Misconfiguration, not a transient fault.
    #[error("resource {uid} is bound to cluster #{bound}, but this sidecar registered cluster #{observed}")]
    ClusterMismatch {
        uid: String,
        bound: u64,
        observed: u64,
    },
}

impl StoreError {
    /// True for errors that indicate misconfiguration and cannot self-heal;
    /// everything else is worth surviving.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::ClusterMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_cluster_mismatch_is_fatal() {
        let mismatch = StoreError::ClusterMismatch {
            uid: "u1".into(),
            bound: 7,
            observed: 1,
        };
        assert!(mismatch.is_fatal());

        let api = StoreError::Api {
            status: 503,
            context: "bulk insert",
            message: "unavailable".into(),
        };
        assert!(!api.is_fatal());

        let malformed = StoreError::Malformed {
            context: "find task",
            reason: "expected array".into(),
        };
        assert!(!malformed.is_fatal());
    }
}
