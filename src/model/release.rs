use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One element of `helm list -A -o json`.
///
/// Only `name` and `namespace` are interpreted; every other field Helm reports
/// (revision, status, chart, ...) is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// A release enriched with the address the store is reachable at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSummary {
    #[serde(flatten)]
    pub release: Release,
    pub access_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_keeps_unknown_helm_fields() {
        let raw = r#"[{"name":"shop","namespace":"shop","revision":"3","status":"deployed"}]"#;
        let releases: Vec<Release> = serde_json::from_str(raw).unwrap();
        assert_eq!(releases[0].name, "shop");
        assert_eq!(releases[0].details["revision"], "3");

        let summary = StoreSummary {
            release: releases[0].clone(),
            access_url: None,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["status"], "deployed");
        assert_eq!(json["accessUrl"], Value::Null);
    }
}
