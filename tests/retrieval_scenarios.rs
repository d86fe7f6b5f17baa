mod common;

use common::DeterministicEmbedder;
use exec_team_core::retrieval::SourceType;
use exec_team_core::{CoreConfig, RetrievalIndex};
use std::sync::Arc;

fn index() -> RetrievalIndex {
    let mut config = CoreConfig::default();
    config.embedding_dimensions = 32;
    RetrievalIndex::new(&config, Arc::new(DeterministicEmbedder { dims: 32 }), false).unwrap()
}

#[tokio::test]
async fn hybrid_search_ranks_the_matching_document_highest() {
    let idx = index();
    idx.add_document(
        SourceType::Text,
        "sales",
        "Our Q3 sales strategy focuses on enterprise accounts and channel partners.",
        serde_json::Value::Null,
    )
    .await
    .unwrap();
    let kubernetes = idx
        .add_document(
            SourceType::Text,
            "infra",
            "The kubernetes cluster deployment pipeline needs a staging rollout before production.",
            serde_json::Value::Null,
        )
        .await
        .unwrap();
    idx.add_document(
        SourceType::Text,
        "finance",
        "Quarterly budget review shows runway extending through next fiscal year.",
        serde_json::Value::Null,
    )
    .await
    .unwrap();

    let results = idx
        .search("deployment pipeline rollout", 3, 0.8, 0.2, None)
        .await
        .unwrap();

    assert!(!results.is_empty());
    assert_eq!(results[0].document_id, kubernetes.id);
    assert!(results[0].score >= 0.3);
}

#[tokio::test]
async fn document_update_and_rollback_round_trip() {
    let idx = index();
    let doc = idx
        .add_document(
            SourceType::Text,
            "policy",
            "The refund window is thirty days from purchase for unopened items.",
            serde_json::Value::Null,
        )
        .await
        .unwrap();
    assert_eq!(doc.version, 1);

    idx.update_document(doc.id, "The refund window is now sixty days for all items.")
        .await
        .unwrap();

    let old_results = idx
        .search("thirty days unopened", 3, 0.0, 1.0, None)
        .await
        .unwrap();
    assert!(old_results.is_empty());

    let rolled_back = idx.rollback(doc.id, 1).await.unwrap();
    assert_eq!(rolled_back.content, doc.content);

    let restored_results = idx
        .search("thirty days unopened", 3, 0.0, 1.0, None)
        .await
        .unwrap();
    assert!(!restored_results.is_empty());
}
