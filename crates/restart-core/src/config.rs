use std::fmt;

use crate::error::{RestartError, RestartResult};
use crate::kind::WorkloadKind;

pub const DEFAULT_NAMESPACE: &str = "default";

/// Unvalidated settings as gathered from flags and the environment.
/// Empty values are treated the same as missing ones.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct RawSettings {
    pub server: Option<String>,
    pub ca: Option<String>,
    pub token: Option<String>,
    pub namespace: Option<String>,
    pub kind: Option<String>,
    pub workload: Option<String>,
}

impl RawSettings {
    /// Collect settings from key/value pairs such as `std::env::vars()`.
    /// `KUBE_<NAME>` takes precedence over the plugin alias `PLUGIN_<NAME>`.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut kube = RawSettings::default();
        let mut plugin = RawSettings::default();

        for (key, value) in vars {
            let key = key.as_ref();
            let (target, name) = if let Some(name) = key.strip_prefix("KUBE_") {
                (&mut kube, name)
            } else if let Some(name) = key.strip_prefix("PLUGIN_") {
                (&mut plugin, name)
            } else {
                continue;
            };
            let slot = match name {
                "SERVER" => &mut target.server,
                "CA" => &mut target.ca,
                "TOKEN" => &mut target.token,
                "NAMESPACE" => &mut target.namespace,
                "KIND" => &mut target.kind,
                "WORKLOAD" => &mut target.workload,
                _ => continue,
            };
            *slot = non_empty(Some(value.into()));
        }

        kube.or(plugin)
    }

    /// Field-wise fallback: keep every value present in `self`, fill the
    /// rest from `fallback`.
    pub fn or(self, fallback: RawSettings) -> RawSettings {
        RawSettings {
            server: non_empty(self.server).or(non_empty(fallback.server)),
            ca: non_empty(self.ca).or(non_empty(fallback.ca)),
            token: non_empty(self.token).or(non_empty(fallback.token)),
            namespace: non_empty(self.namespace).or(non_empty(fallback.namespace)),
            kind: non_empty(self.kind).or(non_empty(fallback.kind)),
            workload: non_empty(self.workload).or(non_empty(fallback.workload)),
        }
    }
}

impl fmt::Debug for RawSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawSettings")
            .field("server", &self.server)
            .field("ca", &self.ca.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("namespace", &self.namespace)
            .field("kind", &self.kind)
            .field("workload", &self.workload)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validated settings for one restart run.
#[derive(Clone)]
pub struct PluginConfig {
    server: String,
    ca: String,
    token: String,
    namespace: String,
    kind: WorkloadKind,
    workload: String,
}

impl PluginConfig {
    pub fn resolve(raw: RawSettings) -> RestartResult<Self> {
        let server = require(raw.server, "KUBE_SERVER")?;
        let token = require(raw.token, "KUBE_TOKEN")?;
        let ca = require(raw.ca, "KUBE_CA")?;
        let namespace = non_empty(raw.namespace).unwrap_or_else(|| {
            tracing::debug!(namespace = DEFAULT_NAMESPACE, "No namespace given, using default");
            DEFAULT_NAMESPACE.to_string()
        });
        let kind = require(raw.kind, "KUBE_KIND")?.parse()?;
        let workload = require(raw.workload, "KUBE_WORKLOAD")?;

        Ok(Self {
            server,
            ca,
            token,
            namespace,
            kind,
            workload,
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Base64-encoded certificate authority data.
    pub fn ca(&self) -> &str {
        &self.ca
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn kind(&self) -> WorkloadKind {
        self.kind
    }

    pub fn workload(&self) -> &str {
        &self.workload
    }
}

impl fmt::Debug for PluginConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginConfig")
            .field("server", &self.server)
            .field("namespace", &self.namespace)
            .field("kind", &self.kind)
            .field("workload", &self.workload)
            .finish_non_exhaustive()
    }
}

fn require(value: Option<String>, key: &'static str) -> RestartResult<String> {
    non_empty(value).ok_or(RestartError::MissingSetting { key })
}
