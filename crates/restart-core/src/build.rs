/// Metadata the CI pipeline exposes about the build that triggered a restart.
/// Only used to annotate log output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildInfo {
    pub repo_owner: Option<String>,
    pub repo_name: Option<String>,
    pub number: Option<u64>,
    pub commit: Option<String>,
    pub branch: Option<String>,
    pub event: Option<String>,
    pub link: Option<String>,
}

impl BuildInfo {
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut info = BuildInfo::default();
        for (key, value) in vars {
            let value: String = value.into();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "DRONE_REPO_OWNER" => info.repo_owner = Some(value),
                "DRONE_REPO_NAME" => info.repo_name = Some(value),
                "DRONE_BUILD_NUMBER" => info.number = value.parse().ok(),
                "DRONE_COMMIT_SHA" => info.commit = Some(value),
                "DRONE_COMMIT_BRANCH" => info.branch = Some(value),
                "DRONE_BUILD_EVENT" => info.event = Some(value),
                "DRONE_BUILD_LINK" => info.link = Some(value),
                _ => {}
            }
        }
        info
    }

    /// `owner/name` when both halves are known.
    pub fn repo(&self) -> Option<String> {
        match (&self.repo_owner, &self.repo_name) {
            (Some(owner), Some(name)) => Some(format!("{owner}/{name}")),
            _ => None,
        }
    }
}
