use super::*;

#[test]
fn empty_report_is_consistent() {
    let report = ConsistencyReport::default();
    assert!(report.is_consistent());
    assert_eq!(report.to_string(), "consistent (0 chunks, 0 vectors)");
}

#[test]
fn orphans_make_report_inconsistent() {
    let report = ConsistencyReport {
        chunk_count: 3,
        vector_count: 2,
        chunks_without_vectors: vec![3],
        vectors_without_chunks: Vec::new(),
    };
    assert!(!report.is_consistent());
    assert_eq!(
        report.to_string(),
        "1 chunks without vectors, 0 vectors without chunks"
    );
}

#[test]
fn search_hit_serializes_flat() {
    let hit = SearchHit {
        doc: "/docs/a.md".to_string(),
        chunk: "text".to_string(),
        score: 0.25,
    };
    let json = serde_json::to_value(&hit).expect("serialize");
    assert_eq!(
        json,
        serde_json::json!({"doc": "/docs/a.md", "chunk": "text", "score": 0.25})
    );
}
