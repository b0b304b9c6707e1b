use thiserror::Error;

#[derive(Error, Debug)]
pub enum RestartError {
    #[error("{key} is not defined")]
    MissingSetting { key: &'static str },

    #[error("invalid kind {0:?}, kind must be Deployment / StatefulSet / DaemonSet")]
    InvalidKind(String),

    #[error("Invalid certificate authority data: {0}")]
    TrustAnchor(String),

    #[error("Client construction failed: {0}")]
    Client(#[source] anyhow::Error),

    #[error("Workload lookup failed: {0}")]
    Lookup(#[source] anyhow::Error),

    #[error("Unusable pod selector: {0}")]
    Selector(String),

    #[error("Pod delete failed: {0}")]
    Delete(#[source] anyhow::Error),
}

pub type RestartResult<T> = Result<T, RestartError>;
