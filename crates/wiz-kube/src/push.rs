//! Pushing planned secrets into the cluster

use wiz_core::{PlannedSecret, SecretPlan};

use crate::error::{KubeError, Result};
use crate::kubectl::Kubectl;
use crate::secrets::planned_secret_object;

/// Outcome of a push
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Secret names written
    pub pushed: Vec<String>,
    /// Secret name and error for each failure
    pub failed: Vec<(String, String)>,
}

impl PushReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// [`KubeError::PushFailed`] if anything failed
    pub fn ensure_success(&self) -> Result<()> {
        if self.is_success() {
            return Ok(());
        }
        Err(KubeError::PushFailed {
            failed: self.failed.len(),
            total: self.failed.len() + self.pushed.len(),
            names: self
                .failed
                .iter()
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

/// Upserts secrets into one namespace
pub struct SecretPusher<'a> {
    kubectl: &'a Kubectl<'a>,
    namespace: &'a str,
}

impl<'a> SecretPusher<'a> {
    pub fn new(kubectl: &'a Kubectl<'a>, namespace: &'a str) -> Self {
        Self { kubectl, namespace }
    }

    /// Push one secret
    pub async fn push_one(&self, planned: &PlannedSecret) -> Result<()> {
        let secret = planned_secret_object(self.namespace, planned);
        self.kubectl.apply_secret(&secret).await
    }

    /// Push every planned secret, continuing past failures
    ///
    /// `on_result` is called after each attempt so callers can report
    /// progress. An interrupt stops the push and is returned as an error.
    pub async fn push(
        &self,
        plan: &SecretPlan,
        mut on_result: impl FnMut(&PlannedSecret, std::result::Result<(), &KubeError>),
    ) -> Result<PushReport> {
        let mut report = PushReport::default();
        for planned in &plan.secrets {
            match self.push_one(planned).await {
                Ok(()) => {
                    on_result(planned, Ok(()));
                    report.pushed.push(planned.name.clone());
                }
                Err(KubeError::Interrupted) => return Err(KubeError::Interrupted),
                Err(e) => {
                    tracing::warn!(secret = %planned.name, error = %e, "push failed");
                    on_result(planned, Err(&e));
                    report.failed.push((planned.name.clone(), e.to_string()));
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRunner;
    use crate::secrets::secret_value;
    use std::collections::BTreeMap;
    use wiz_core::SecretSource;

    fn planned(name: &str, bytes: &[u8]) -> PlannedSecret {
        PlannedSecret {
            name: name.to_string(),
            source: SecretSource::Files("certs".into()),
            data: BTreeMap::from([("tls.key".to_string(), bytes.to_vec())]),
        }
    }

    #[tokio::test]
    async fn test_pushed_bytes_read_back() {
        let mock = MockRunner::new();
        let kubectl = Kubectl::new(&mock, "kubectl", None);
        let pusher = SecretPusher::new(&kubectl, "staging");

        let bytes: Vec<u8> = vec![0, 159, 146, 150, 255, b'\n', 0];
        let plan = SecretPlan {
            secrets: vec![planned("mntsecret-staging-certs", &bytes)],
            skipped: Vec::new(),
        };
        let report = pusher.push(&plan, |_, _| {}).await.unwrap();
        assert!(report.is_success());

        let fetched = kubectl
            .get_secret("staging", "mntsecret-staging-certs")
            .await
            .unwrap();
        assert_eq!(secret_value(&fetched, "tls.key"), Some(bytes.as_slice()));
    }

    #[tokio::test]
    async fn test_partial_failure_attempts_everything() {
        let mock = MockRunner::new().reject_secret("b");
        let kubectl = Kubectl::new(&mock, "kubectl", None);
        let pusher = SecretPusher::new(&kubectl, "ns");

        let plan = SecretPlan {
            secrets: vec![planned("a", b"1"), planned("b", b"2"), planned("c", b"3")],
            skipped: Vec::new(),
        };
        let mut seen = Vec::new();
        let report = pusher
            .push(&plan, |p, r| seen.push((p.name.clone(), r.is_ok())))
            .await
            .unwrap();

        assert_eq!(report.pushed, vec!["a", "c"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "b");
        assert!(report.failed[0].1.contains("Forbidden"));
        assert_eq!(
            seen,
            vec![
                ("a".to_string(), true),
                ("b".to_string(), false),
                ("c".to_string(), true)
            ]
        );
        assert_eq!(mock.secret_names("ns"), vec!["a", "c"]);

        match report.ensure_success().unwrap_err() {
            KubeError::PushFailed { failed, total, names } => {
                assert_eq!((failed, total), (1, 3));
                assert_eq!(names, "b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
