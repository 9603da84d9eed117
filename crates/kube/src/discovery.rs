//! Runtime-discovered resource type descriptors.

use caravel_core::Verb;
use serde::{Deserialize, Serialize};

/// One entry of the server's resource catalogue: schema identity plus the
/// verbs the server accepts for it.
///
/// Descriptors are produced fresh by every enumeration pass and live only
/// for the duration of one engine call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceType {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
    pub verbs: Vec<String>,
}

impl ResourceType {
    /// Capability lookup, pure over the advertised verb set.
    pub fn supports(&self, verb: Verb) -> bool {
        self.verbs.iter().any(|v| v == verb.as_str())
    }

    /// `group/version`, or bare `version` for the core group.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Display key for logs, e.g. `apps/v1/Deployment` or `v1/Pod`.
    pub fn gvk_key(&self) -> String {
        if self.group.is_empty() {
            format!("{}/{}", self.version, self.kind)
        } else {
            format!("{}/{}/{}", self.group, self.version, self.kind)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(verbs: &[&str]) -> ResourceType {
        ResourceType {
            group: "apps".into(),
            version: "v1".into(),
            kind: "Deployment".into(),
            plural: "deployments".into(),
            namespaced: true,
            verbs: verbs.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn supports_checks_the_advertised_verbs() {
        let rt = descriptor(&["get", "list", "watch", "deletecollection"]);
        assert!(rt.supports(Verb::List));
        assert!(rt.supports(Verb::Watch));
        assert!(rt.supports(Verb::DeleteCollection));
        assert!(!rt.supports(Verb::Delete));
    }

    #[test]
    fn gvk_key_elides_the_core_group() {
        let mut rt = descriptor(&[]);
        assert_eq!(rt.gvk_key(), "apps/v1/Deployment");
        assert_eq!(rt.api_version(), "apps/v1");
        rt.group.clear();
        rt.kind = "Pod".into();
        assert_eq!(rt.gvk_key(), "v1/Pod");
        assert_eq!(rt.api_version(), "v1");
    }
}
