use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use kube::config::{
    AuthInfo, Cluster, Context, KubeConfigOptions, Kubeconfig, NamedAuthInfo, NamedCluster,
    NamedContext,
};
use kube::Client;

use restart_core::config::PluginConfig;
use restart_core::error::{RestartError, RestartResult};

/// Name shared by the single cluster, user and context entries.
pub const CONTEXT_NAME: &str = "kube-restart";

/// Build an in-memory kubeconfig holding exactly one cluster, one bearer
/// token user and one context tying them together.
pub fn build_kubeconfig(config: &PluginConfig) -> RestartResult<Kubeconfig> {
    let ca = STANDARD
        .decode(config.ca())
        .map_err(|e| RestartError::TrustAnchor(e.to_string()))?;
    if ca.is_empty() {
        return Err(RestartError::TrustAnchor("decoded data is empty".into()));
    }

    let cluster = Cluster {
        server: Some(config.server().to_string()),
        certificate_authority_data: Some(STANDARD.encode(&ca)),
        ..Default::default()
    };
    let auth_info = AuthInfo {
        token: Some(config.token().to_string().into()),
        ..Default::default()
    };
    let context = Context {
        cluster: CONTEXT_NAME.to_string(),
        user: Some(CONTEXT_NAME.to_string()),
        namespace: Some(config.namespace().to_string()),
        ..Default::default()
    };

    Ok(Kubeconfig {
        clusters: vec![NamedCluster {
            name: CONTEXT_NAME.to_string(),
            cluster: Some(cluster),
        }],
        auth_infos: vec![NamedAuthInfo {
            name: CONTEXT_NAME.to_string(),
            auth_info: Some(auth_info),
        }],
        contexts: vec![NamedContext {
            name: CONTEXT_NAME.to_string(),
            context: Some(context),
        }],
        current_context: Some(CONTEXT_NAME.to_string()),
        ..Default::default()
    })
}

pub async fn create_client(config: &PluginConfig) -> RestartResult<Client> {
    let kubeconfig = build_kubeconfig(config)?;
    let options = KubeConfigOptions {
        context: Some(CONTEXT_NAME.to_string()),
        ..Default::default()
    };
    let kube_config = kube::Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(|e| RestartError::Client(e.into()))?;

    tracing::debug!(server = %kube_config.cluster_url, "Cluster client configured");

    Client::try_from(kube_config).map_err(|e| RestartError::Client(e.into()))
}
