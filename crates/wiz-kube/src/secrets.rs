//! Building Secret objects

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::json;
use std::collections::BTreeMap;

use wiz_core::PlannedSecret;

/// Label marking objects written by wizk8s
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY: &str = "wizk8s";

/// Data key of a docker-registry secret
pub const DOCKER_CONFIG_KEY: &str = ".dockerconfigjson";

fn labels() -> BTreeMap<String, String> {
    BTreeMap::from([(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string())])
}

/// An Opaque secret holding raw bytes per data key
pub fn secret_object(namespace: &str, name: &str, data: BTreeMap<String, Vec<u8>>) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels()),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(
            data.into_iter()
                .map(|(key, bytes)| (key, ByteString(bytes)))
                .collect(),
        ),
        ..Default::default()
    }
}

pub fn planned_secret_object(namespace: &str, planned: &PlannedSecret) -> Secret {
    secret_object(namespace, &planned.name, planned.data.clone())
}

/// Credentials for a private image registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub server: String,
    pub email: String,
    pub username: String,
    pub password: String,
}

/// A `kubernetes.io/dockerconfigjson` secret usable as an imagePullSecret
///
/// Same shape as `kubectl create secret docker-registry`, without putting
/// the password on a command line.
pub fn docker_registry_secret(namespace: &str, name: &str, creds: &RegistryCredentials) -> Secret {
    let auth = STANDARD.encode(format!("{}:{}", creds.username, creds.password));
    let config = json!({
        "auths": {
            creds.server.as_str(): {
                "username": creds.username,
                "password": creds.password,
                "email": creds.email,
                "auth": auth,
            }
        }
    });

    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels()),
            ..Default::default()
        },
        type_: Some("kubernetes.io/dockerconfigjson".to_string()),
        data: Some(BTreeMap::from([(
            DOCKER_CONFIG_KEY.to_string(),
            ByteString(config.to_string().into_bytes()),
        )])),
        ..Default::default()
    }
}

/// Raw bytes stored under `key`
pub fn secret_value<'s>(secret: &'s Secret, key: &str) -> Option<&'s [u8]> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|bytes| bytes.0.as_slice())
        .or_else(|| {
            secret
                .string_data
                .as_ref()
                .and_then(|data| data.get(key))
                .map(String::as_bytes)
        })
}

/// Data with every value base64-encoded, as stored by the API server
pub fn encoded_data(secret: &Secret) -> BTreeMap<String, String> {
    secret
        .data
        .iter()
        .flatten()
        .map(|(key, bytes)| (key.clone(), STANDARD.encode(&bytes.0)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_yaml_is_base64() {
        let secret = secret_object(
            "staging",
            "envsecret-staging-region",
            BTreeMap::from([("value".to_string(), b"us-east".to_vec())]),
        );
        let yaml = serde_yaml::to_string(&secret).unwrap();
        assert!(yaml.contains("apiVersion: v1"));
        assert!(yaml.contains("kind: Secret"));
        assert!(yaml.contains("  value: dXMtZWFzdA=="));
        assert!(yaml.contains("  namespace: staging"));
        assert!(yaml.contains("type: Opaque"));
        assert!(!yaml.contains("us-east"));
    }

    #[test]
    fn test_binary_round_trip() {
        let bytes: Vec<u8> = (0..=255).collect();
        let secret = secret_object("ns", "bin", BTreeMap::from([("blob".to_string(), bytes.clone())]));

        let yaml = serde_yaml::to_string(&secret).unwrap();
        let back: Secret = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(secret_value(&back, "blob"), Some(bytes.as_slice()));
    }

    #[test]
    fn test_docker_registry_secret() {
        let creds = RegistryCredentials {
            server: "ghcr.io".into(),
            email: "me@example.com".into(),
            username: "me".into(),
            password: "pw".into(),
        };
        let secret = docker_registry_secret("ns", "regcred", &creds);
        assert_eq!(secret.type_.as_deref(), Some("kubernetes.io/dockerconfigjson"));

        let raw = secret_value(&secret, DOCKER_CONFIG_KEY).unwrap();
        let config: serde_json::Value = serde_json::from_slice(raw).unwrap();
        assert_eq!(config["auths"]["ghcr.io"]["username"], "me");
        assert_eq!(config["auths"]["ghcr.io"]["auth"], STANDARD.encode("me:pw"));
    }

    #[test]
    fn test_encoded_data() {
        let secret = secret_object("ns", "s", BTreeMap::from([("k".to_string(), b"v".to_vec())]));
        assert_eq!(encoded_data(&secret)["k"], "dg==");
    }
}
