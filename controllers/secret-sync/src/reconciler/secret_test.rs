//! Unit tests for the per-secret operations

#[cfg(test)]
mod tests {
    use crate::reconciler::{CreateOutcome, PatchOutcome, SecretIdentity};
    use crate::owner_refs::OwnerRefMergeKey;
    use crate::retry::RetryPolicy;
    use crate::test_utils::*;
    use cluster_client::{ClusterError, Deadline, MockClusterClient, Operation};
    use k8s_openapi::ByteString;
    use k8s_openapi::api::core::v1::ObjectReference;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
    use kube::runtime::events::EventType;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn spcps_owner() -> OwnerReference {
        new_pod_status("my-spcps", "default", "node1", "/tmp")
            .owner_reference()
            .unwrap()
    }

    #[tokio::test]
    async fn test_secret_exists() {
        let client = MockClusterClient::new();
        client.add_secret(new_secret("my-secret", "default", labels(&[("environment", "test")])));
        let (reconciler, _) = create_test_reconciler(&client);

        let existing = reconciler
            .secret_exists(&SecretIdentity::new("my-secret", "default"), &test_deadline())
            .await
            .unwrap();
        assert_eq!(
            existing.and_then(|s| s.metadata.name).as_deref(),
            Some("my-secret")
        );

        let existing = reconciler
            .secret_exists(&SecretIdentity::new("my-secret2", "default"), &test_deadline())
            .await;
        assert_eq!(existing, Ok(None));
    }

    #[tokio::test]
    async fn test_secret_exists_does_not_mask_errors() {
        let client = MockClusterClient::new();
        client.fail_next(Operation::GetSecret, ClusterError::Forbidden("rbac".to_string()));
        let (reconciler, _) = create_test_reconciler(&client);

        let result = reconciler
            .secret_exists(&SecretIdentity::new("my-secret", "default"), &test_deadline())
            .await;
        assert_eq!(result, Err(ClusterError::Forbidden("rbac".to_string())));
    }

    #[tokio::test]
    async fn test_create_or_skip() {
        let client = MockClusterClient::new();
        let labels = labels(&[("environment", "test")]);
        client.add_secret(new_secret("my-secret", "default", labels.clone()));
        let (reconciler, _) = create_test_reconciler(&client);

        // secret already exists
        let outcome = reconciler
            .create_or_skip(
                &SecretIdentity::new("my-secret", "default"),
                BTreeMap::new(),
                labels.clone(),
                "Opaque",
                true,
                &test_deadline(),
            )
            .await;
        assert_eq!(outcome, Ok(CreateOutcome::Skipped));
        assert_eq!(client.call_count(Operation::CreateSecret), 0);

        let outcome = reconciler
            .create_or_skip(
                &SecretIdentity::new("my-secret2", "default"),
                BTreeMap::from([("user".to_string(), ByteString(b"admin".to_vec()))]),
                labels.clone(),
                "Opaque",
                false,
                &test_deadline(),
            )
            .await;
        assert_eq!(outcome, Ok(CreateOutcome::Created));

        let secret = client.secret("my-secret2", "default").unwrap();
        assert_eq!(secret.metadata.name.as_deref(), Some("my-secret2"));
        assert_eq!(secret.metadata.labels, Some(labels));
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
        assert_eq!(
            secret.data.unwrap().get("user"),
            Some(&ByteString(b"admin".to_vec()))
        );
    }

    #[tokio::test]
    async fn test_create_race_is_success() {
        let client = MockClusterClient::new();
        client.add_secret(new_secret("my-secret", "default", BTreeMap::new()));
        let (reconciler, _) = create_test_reconciler(&client);

        // Stale existence check: the secret appeared in between
        let outcome = reconciler
            .create_or_skip(
                &SecretIdentity::new("my-secret", "default"),
                BTreeMap::new(),
                BTreeMap::new(),
                "Opaque",
                false,
                &test_deadline(),
            )
            .await;
        assert_eq!(outcome, Ok(CreateOutcome::AlreadyPresent));
        // Pre-existing content untouched
        assert_eq!(
            client.secret("my-secret", "default").unwrap().metadata.resource_version.as_deref(),
            Some("73659")
        );
    }

    #[tokio::test]
    async fn test_create_surfaces_other_errors() {
        let client = MockClusterClient::new();
        client.fail_next(Operation::CreateSecret, ClusterError::Invalid("bad name".to_string()));
        let (reconciler, _) = create_test_reconciler(&client);

        let outcome = reconciler
            .create_or_skip(
                &SecretIdentity::new("Bad_Name", "default"),
                BTreeMap::new(),
                BTreeMap::new(),
                "Opaque",
                false,
                &test_deadline(),
            )
            .await;
        assert_eq!(outcome, Err(ClusterError::Invalid("bad name".to_string())));
        assert!(client.secret("Bad_Name", "default").is_none());
    }

    #[tokio::test]
    async fn test_patch_secret_with_owner_ref() {
        let client = MockClusterClient::new();
        client.add_secret(new_secret("my-secret", "default", labels(&[("environment", "test")])));
        let (reconciler, _) = create_test_reconciler(&client);
        let identity = SecretIdentity::new("my-secret", "default");
        let owner = spcps_owner();

        let outcome = reconciler
            .patch_owner_reference(&identity, &owner, None, &test_deadline())
            .await;
        assert_eq!(outcome, Ok(PatchOutcome::Patched));

        let secret = client.secret("my-secret", "default").unwrap();
        assert_eq!(secret.metadata.owner_references, Some(vec![owner.clone()]));

        // Repeated patches leave exactly one owner and write nothing
        for _ in 0..3 {
            let outcome = reconciler
                .patch_owner_reference(&identity, &owner, None, &test_deadline())
                .await;
            assert_eq!(outcome, Ok(PatchOutcome::Unchanged));
        }
        let secret = client.secret("my-secret", "default").unwrap();
        assert_eq!(secret.metadata.owner_references.map(|o| o.len()), Some(1));
        assert_eq!(client.call_count(Operation::ReplaceSecret), 1);
    }

    #[tokio::test]
    async fn test_patch_keeps_other_owners() {
        let client = MockClusterClient::new();
        let foreign = OwnerReference {
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
            name: "web".to_string(),
            uid: "0a1b".to_string(),
            controller: Some(true),
            ..Default::default()
        };
        let mut secret = new_secret("my-secret", "default", BTreeMap::new());
        secret.metadata.owner_references = Some(vec![foreign.clone()]);
        client.add_secret(secret);
        let (reconciler, _) = create_test_reconciler(&client);

        reconciler
            .patch_owner_reference(&SecretIdentity::new("my-secret", "default"), &spcps_owner(), None, &test_deadline())
            .await
            .unwrap();

        let owners = client.secret("my-secret", "default").unwrap().metadata.owner_references;
        assert_eq!(owners, Some(vec![foreign, spcps_owner()]));
    }

    #[tokio::test]
    async fn test_patch_missing_secret() {
        let client = MockClusterClient::new();
        let (reconciler, _) = create_test_reconciler(&client);

        let outcome = reconciler
            .patch_owner_reference(&SecretIdentity::new("gone", "default"), &spcps_owner(), None, &test_deadline())
            .await;
        assert_eq!(outcome, Ok(PatchOutcome::SecretMissing));
        assert_eq!(client.call_count(Operation::ReplaceSecret), 0);
    }

    #[tokio::test]
    async fn test_patch_retries_on_conflict() {
        let client = MockClusterClient::new();
        client.add_secret(new_secret("my-secret", "default", BTreeMap::new()));
        // Two concurrent writers slip in before our first two writes
        for i in 0..2 {
            client.concurrent_write_before_replace(move |s| {
                s.metadata
                    .annotations
                    .get_or_insert_with(BTreeMap::new)
                    .insert(format!("writer-{i}"), "x".to_string());
            });
        }
        let (reconciler, _) = create_test_reconciler(&client);

        let outcome = reconciler
            .patch_owner_reference(&SecretIdentity::new("my-secret", "default"), &spcps_owner(), None, &test_deadline())
            .await;
        assert_eq!(outcome, Ok(PatchOutcome::Patched));
        assert_eq!(client.call_count(Operation::ReplaceSecret), 3);
        assert_eq!(client.call_count(Operation::GetSecret), 3);
        assert_eq!(reconciler.metrics.conflict_retries_total.get(), 2);

        // Re-read before each attempt keeps the other writers' changes
        let secret = client.secret("my-secret", "default").unwrap();
        let annotations = secret.metadata.annotations.unwrap();
        assert!(annotations.contains_key("writer-0") && annotations.contains_key("writer-1"));
        assert_eq!(secret.metadata.owner_references, Some(vec![spcps_owner()]));
    }

    #[tokio::test]
    async fn test_patch_conflict_exhaustion() {
        let client = MockClusterClient::new();
        client.add_secret(new_secret("my-secret", "default", BTreeMap::new()));
        for _ in 0..3 {
            client.concurrent_write_before_replace(|_| {});
        }
        let mut config = test_config();
        config.retry = RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        };
        let (reconciler, _) = create_test_reconciler_with_config(&client, &config);

        let outcome = reconciler
            .patch_owner_reference(&SecretIdentity::new("my-secret", "default"), &spcps_owner(), None, &test_deadline())
            .await;
        let err = outcome.unwrap_err();
        assert!(err.is_conflict() && err.is_retryable(), "got {err:?}");
        assert_eq!(client.call_count(Operation::ReplaceSecret), 3);
        assert!(client.secret("my-secret", "default").unwrap().metadata.owner_references.is_none());
    }

    #[tokio::test]
    async fn test_patch_non_conflict_error_is_fatal() {
        let client = MockClusterClient::new();
        client.add_secret(new_secret("my-secret", "default", BTreeMap::new()));
        client.fail_next(Operation::ReplaceSecret, ClusterError::Forbidden("rbac".to_string()));
        let (reconciler, _) = create_test_reconciler(&client);

        let outcome = reconciler
            .patch_owner_reference(&SecretIdentity::new("my-secret", "default"), &spcps_owner(), None, &test_deadline())
            .await;
        assert_eq!(outcome, Err(ClusterError::Forbidden("rbac".to_string())));
        assert_eq!(client.call_count(Operation::ReplaceSecret), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_slow_store() {
        let client = MockClusterClient::new();
        client.add_secret(new_secret("my-secret", "default", BTreeMap::new()));
        client.set_latency(Duration::from_secs(10));
        let (reconciler, _) = create_test_reconciler(&client);

        let deadline = Deadline::after(Duration::from_millis(100));
        let result = reconciler
            .secret_exists(&SecretIdentity::new("my-secret", "default"), &deadline)
            .await;
        assert_eq!(result, Err(ClusterError::DeadlineExceeded(Duration::from_millis(100))));
    }

    #[tokio::test]
    async fn test_patch_uses_prefetched_secret() {
        let client = MockClusterClient::new();
        client.add_secret(new_secret("my-secret", "default", BTreeMap::new()));
        let (reconciler, _) = create_test_reconciler(&client);
        let identity = SecretIdentity::new("my-secret", "default");

        let existing = reconciler.secret_exists(&identity, &test_deadline()).await.unwrap();
        let outcome = reconciler
            .patch_owner_reference(&identity, &spcps_owner(), existing, &test_deadline())
            .await;

        assert_eq!(outcome, Ok(PatchOutcome::Patched));
        assert_eq!(client.call_count(Operation::GetSecret), 1);
        assert_eq!(client.call_count(Operation::ReplaceSecret), 1);
    }

    #[tokio::test]
    async fn test_stale_prefetched_secret_is_reread_on_conflict() {
        let client = MockClusterClient::new();
        client.add_secret(new_secret("my-secret", "default", BTreeMap::new()));
        let (reconciler, _) = create_test_reconciler(&client);
        let identity = SecretIdentity::new("my-secret", "default");

        let existing = reconciler.secret_exists(&identity, &test_deadline()).await.unwrap();
        client.concurrent_write_before_replace(|s| {
            s.metadata
                .annotations
                .get_or_insert_with(BTreeMap::new)
                .insert("writer".to_string(), "x".to_string());
        });
        let outcome = reconciler
            .patch_owner_reference(&identity, &spcps_owner(), existing, &test_deadline())
            .await;

        assert_eq!(outcome, Ok(PatchOutcome::Patched));
        assert_eq!(client.call_count(Operation::GetSecret), 2);
        let secret = client.secret("my-secret", "default").unwrap();
        assert!(secret.metadata.annotations.unwrap().contains_key("writer"));
        assert_eq!(secret.metadata.owner_references, Some(vec![spcps_owner()]));
    }

    #[tokio::test]
    async fn test_uid_merge_key_keeps_recreated_owner() {
        let client = MockClusterClient::new();
        let previous = OwnerReference {
            uid: "0c6b1d5e-9e0a-4d7e-8f41-7a4c2f0e9b11".to_string(),
            ..spcps_owner()
        };
        let mut secret = new_secret("my-secret", "default", BTreeMap::new());
        secret.metadata.owner_references = Some(vec![previous.clone()]);
        client.add_secret(secret);
        let identity = SecretIdentity::new("my-secret", "default");

        // Default key sees the same apiVersion/kind/name and writes nothing
        let (reconciler, _) = create_test_reconciler(&client);
        let outcome = reconciler
            .patch_owner_reference(&identity, &spcps_owner(), None, &test_deadline())
            .await;
        assert_eq!(outcome, Ok(PatchOutcome::Unchanged));

        let mut config = test_config();
        config.merge_key = OwnerRefMergeKey::Uid;
        let (reconciler, _) = create_test_reconciler_with_config(&client, &config);
        let outcome = reconciler
            .patch_owner_reference(&identity, &spcps_owner(), None, &test_deadline())
            .await;
        assert_eq!(outcome, Ok(PatchOutcome::Patched));

        let owners = client.secret("my-secret", "default").unwrap().metadata.owner_references;
        assert_eq!(owners, Some(vec![previous, spcps_owner()]));
    }

    #[tokio::test]
    async fn test_generate_event() {
        let client = MockClusterClient::new();
        let (reconciler, events) = create_test_reconciler(&client);

        let obj = ObjectReference {
            name: Some("pod1".to_string()),
            namespace: Some("default".to_string()),
            uid: Some("481ab824-1f07-4611-bc08-c41f5cbb5a8d".to_string()),
            ..Default::default()
        };

        reconciler.generate_event(&obj, EventType::Warning, "reason", "message");
        reconciler.generate_event(&obj, EventType::Warning, "reason2", "message2");

        assert_eq!(
            events.events(),
            vec!["Warning reason message", "Warning reason2 message2"]
        );
    }
}
