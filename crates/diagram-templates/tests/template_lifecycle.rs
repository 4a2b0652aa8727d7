//! Template catalog against file-backed storage and a live document

use std::sync::Arc;

use diagram_engine::{DocumentStore, MemoryPersistence, NodeOperations, Position};
use diagram_engine::{ConnectionDirection, NodeCategory, TypedNodeOptions};
use diagram_templates::{
    FileKeyValueStore, NewTemplate, TemplateCategory, TemplateError, TemplateFilters,
    TemplateService, TemplateServiceConfig,
};
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn open(dir: &TempDir) -> TemplateService {
    TemplateService::initialize(
        Arc::new(FileKeyValueStore::new(dir.path())),
        TemplateServiceConfig::default(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn catalog_survives_restart() {
    init_logging();
    let dir = TempDir::new().unwrap();

    let service = open(&dir).await;
    let mut store = DocumentStore::new(Arc::new(MemoryPersistence::new()));
    let root = NodeOperations::create_typed_node(
        &mut store,
        NodeCategory::MindMap,
        Position::default(),
        TypedNodeOptions::default().with_label("Roadmap"),
    )
    .unwrap();
    NodeOperations::create_typed_node(
        &mut store,
        NodeCategory::MindMap,
        Position::new(250.0, 0.0),
        TypedNodeOptions::child_of(root.id.clone()),
    )
    .unwrap();

    let captured = service
        .create_template_from_document(
            store.document(),
            None,
            NewTemplate::new("Roadmap", TemplateCategory::Planning)
                .with_author("ana")
                .with_tags(["roadmap"]),
        )
        .await
        .unwrap();
    service.record_template_usage(&captured.id).await.unwrap();
    service.rate_template(&captured.id, 4).await.unwrap();
    drop(service);

    let reopened = open(&dir).await;
    assert_eq!(reopened.list_templates().await.len(), 4);
    let template = reopened.get_template(&captured.id).await.unwrap();
    assert_eq!(template, captured);

    let stats = reopened.get_template_stats(&captured.id).await.unwrap();
    assert_eq!(stats.usage_count, 1);
    assert_eq!(stats.rating_count, 1);
}

#[tokio::test]
async fn captured_template_applies_into_another_document() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let service = open(&dir).await;

    let mut source = DocumentStore::new(Arc::new(MemoryPersistence::new()));
    let ceo = NodeOperations::create_typed_node(
        &mut source,
        NodeCategory::Organogram,
        Position::default(),
        TypedNodeOptions::default(),
    )
    .unwrap();
    NodeOperations::create_typed_node(
        &mut source,
        NodeCategory::Organogram,
        Position::new(0.0, 160.0),
        TypedNodeOptions::child_of(ceo.id.clone()),
    )
    .unwrap();

    let template = service
        .create_template_from_document(
            source.document(),
            None,
            NewTemplate::new("Team", TemplateCategory::Organizational),
        )
        .await
        .unwrap();

    let mut target = DocumentStore::new(Arc::new(MemoryPersistence::new()));
    let (nodes, _) = service
        .apply_template(&template.id, &mut target, Position::new(400.0, 0.0))
        .await
        .unwrap();

    assert_eq!(target.nodes().len(), 2);
    assert_eq!(target.edges().len(), 1);
    let head = nodes.iter().find(|n| n.is_organogram_root()).unwrap();
    assert_eq!(head.position, Position::new(400.0, 0.0));
    let reports = NodeOperations::get_connected_nodes(
        target.document(),
        &head.id,
        ConnectionDirection::Outgoing,
    );
    assert_eq!(reports.len(), 1);

    // edits to the document never reach the template
    NodeOperations::delete_node_with_connections(&mut target, &reports[0].id).unwrap();
    assert_eq!(
        service.get_template(&template.id).await.unwrap().nodes.len(),
        2
    );
}

#[tokio::test]
async fn exported_template_imports_into_a_fresh_catalog() {
    init_logging();
    let source_dir = TempDir::new().unwrap();
    let target_dir = TempDir::new().unwrap();

    let source = open(&source_dir).await;
    let text = source.export_template("process-approval").await.unwrap();

    let target = open(&target_dir).await;
    let imported = target.import_template(&text).await.unwrap();
    assert!(!imported.is_default);
    assert_ne!(imported.id, "process-approval");

    // the imported copy is a user template and may be removed
    target.delete_template(&imported.id).await.unwrap();
    let err = target.delete_template("process-approval").await.unwrap_err();
    assert!(matches!(err, TemplateError::Forbidden(_)));

    let page = target
        .search_templates(
            &TemplateFilters {
                search: Some("approval".to_string()),
                ..Default::default()
            },
            1,
            None,
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}
