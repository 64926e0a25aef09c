//! Account warehouse behaviour against the in-memory IAM backend, including
//! concurrent first use of a subject.

use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;

use ga4gh_identity::gcp::{hash_id, AccountWarehouse, AccountWarehouseOptions, InMemoryIam};

const ROLE: &str = "roles/storage.objectViewer";

fn setup() -> (Arc<InMemoryIam>, Arc<AccountWarehouse>) {
    let iam = Arc::new(InMemoryIam::new().with_roles("research", [ROLE]));
    let wh = AccountWarehouse::new(iam.clone(), AccountWarehouseOptions {
        project: "research".into(),
        default_role: ROLE.into(),
        scopes: vec!["https://www.googleapis.com/auth/devstorage.read_only".into()],
    });
    (iam, Arc::new(wh))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_use_provisions_once() -> Result<()> {
    let (iam, wh) = setup();

    let tasks = (0..16).map(|_| {
        let wh = wh.clone();
        tokio::spawn(async move { wh.get_access_token("https://idp.example|new-researcher").await })
    });
    let mut tokens = Vec::new();
    for joined in join_all(tasks).await {
        tokens.push(joined??);
    }

    assert_eq!(tokens.len(), 16);
    assert_eq!(iam.creates(), 1);
    assert_eq!(iam.policy_writes(), 1);
    assert_eq!(iam.account_count(), 1);
    assert_eq!(iam.tokens_issued(), 16);
    let members = &iam.policy("research").expect("policy").bindings[0].members;
    assert_eq!(members.len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_subjects_provision_independently() -> Result<()> {
    let (iam, wh) = setup();
    let subjects: Vec<String> = (0..8).map(|i| format!("subject-{}", i)).collect();
    let results = join_all(subjects.iter().map(|s| wh.get_backing_account(s))).await;
    let mut emails = Vec::new();
    for r in results {
        emails.push(r?);
    }
    emails.sort();
    emails.dedup();
    assert_eq!(emails.len(), 8);
    assert_eq!(iam.creates(), 8);
    assert_eq!(iam.policy("research").expect("policy").bindings[0].members.len(), 8);
    Ok(())
}

#[tokio::test]
async fn configure_role_writes_once() -> Result<()> {
    let (iam, wh) = setup();
    let email = "someone@research.iam.gserviceaccount.com";
    wh.configure_role(email).await?;
    wh.configure_role(email).await?;
    assert_eq!(iam.policy_writes(), 1);
    Ok(())
}

#[tokio::test]
async fn same_subject_same_account() -> Result<()> {
    let (_, wh) = setup();
    let a = wh.get_backing_account("carol").await?;
    let b = wh.get_backing_account("carol").await?;
    assert_eq!(a, b);
    assert_eq!(a, format!("{}@research.iam.gserviceaccount.com", hash_id("carol")));
    Ok(())
}

#[tokio::test]
async fn every_key_request_issues_a_new_key() -> Result<()> {
    let (iam, wh) = setup();
    let first = wh.get_account_key("dora").await?;
    let second = wh.get_account_key("dora").await?;
    assert_ne!(first, second);
    assert_eq!(iam.keys_issued(), 2);
    let file: serde_json::Value = serde_json::from_slice(&first)?;
    assert_eq!(file["client_email"], wh.get_backing_account("dora").await?.as_str());
    Ok(())
}
