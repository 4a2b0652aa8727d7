//! Template service
//!
//! Owns the template catalog and usage statistics, persisted through a
//! [`KeyValueStore`] as two independently serialized collections. Every
//! mutation is write-through: it is applied to a draft, the touched
//! collections are written, and only then does the draft replace the live
//! catalog. A rejected write leaves the in-memory state untouched.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use diagram_engine::{
    DocumentStore, Edge, GraphDocument, NewEdge, NewNode, Node, NodeId, Position,
};
use tokio::sync::RwLock;

use crate::config::TemplateServiceConfig;
use crate::constants::{catalog, export};
use crate::defaults;
use crate::error::{Result, TemplateError};
use crate::kv::KeyValueStore;
use crate::thumbnail;
use crate::types::{
    ExportedTemplate, NewTemplate, Template, TemplateCategory, TemplateFilters, TemplateMetadata,
    TemplatePage, TemplatePatch, TemplateUsageStat,
};

#[derive(Debug, Clone, Default)]
struct Catalog {
    templates: Vec<Template>,
    stats: Vec<TemplateUsageStat>,
}

impl Catalog {
    fn find(&self, id: &str) -> Result<&Template> {
        self.templates
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| TemplateError::not_found(id))
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut Template> {
        self.templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| TemplateError::not_found(id))
    }

    fn stat(&self, id: &str) -> Option<&TemplateUsageStat> {
        self.stats.iter().find(|s| s.template_id == id)
    }

    fn stat_mut(&mut self, id: &str) -> &mut TemplateUsageStat {
        let index = match self.stats.iter().position(|s| s.template_id == id) {
            Some(index) => index,
            None => {
                self.stats.push(TemplateUsageStat::new(id));
                self.stats.len() - 1
            }
        };
        &mut self.stats[index]
    }

    fn usage_count(&self, id: &str) -> u64 {
        self.stat(id).map_or(0, |s| s.usage_count)
    }
}

/// Which collections a mutation touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Touched {
    Templates,
    Stats,
    Both,
}

/// Catalog of reusable diagram templates
pub struct TemplateService {
    store: Arc<dyn KeyValueStore>,
    config: TemplateServiceConfig,
    catalog: RwLock<Catalog>,
}

impl std::fmt::Debug for TemplateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateService")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl TemplateService {
    /// Load both collections and seed any missing system defaults
    ///
    /// Safe to call repeatedly against the same store: defaults that already
    /// exist are left as they are.
    pub async fn initialize(
        store: Arc<dyn KeyValueStore>,
        config: TemplateServiceConfig,
    ) -> Result<Self> {
        let mut templates: Vec<Template> = load_collection(&*store, &config.templates_key).await?;
        let stats: Vec<TemplateUsageStat> =
            load_collection(&*store, &config.usage_stats_key).await?;

        if config.seed_defaults {
            let missing: Vec<Template> = defaults::default_templates()
                .into_iter()
                .filter(|d| !templates.iter().any(|t| t.id == d.id))
                .collect();
            if !missing.is_empty() {
                log::info!("Seeding {} default template(s)", missing.len());
                templates.extend(missing);
                let content = serde_json::to_string(&templates)?;
                store
                    .set(&config.templates_key, content)
                    .await
                    .map_err(into_persistence)?;
            }
        }

        log::info!(
            "Template service ready: {} templates, {} usage records",
            templates.len(),
            stats.len()
        );
        Ok(Self {
            store,
            config,
            catalog: RwLock::new(Catalog { templates, stats }),
        })
    }

    pub fn config(&self) -> &TemplateServiceConfig {
        &self.config
    }

    // ─── CRUD ───────────────────────────────────────────────────────────────

    pub async fn create_template(&self, spec: NewTemplate) -> Result<Template> {
        let template = build_template(spec)?;
        let created = template.clone();
        self.commit(Touched::Templates, move |catalog| {
            catalog.templates.push(template);
            Ok(())
        })
        .await?;
        log::info!("Created template '{}' ({})", created.name, created.id);
        Ok(created)
    }

    pub async fn get_template(&self, id: &str) -> Result<Template> {
        self.catalog.read().await.find(id).cloned()
    }

    pub async fn list_templates(&self) -> Vec<Template> {
        self.catalog.read().await.templates.clone()
    }

    /// Apply a partial update; the thumbnail is rebuilt only when the graph changes
    pub async fn update_template(&self, id: &str, patch: TemplatePatch) -> Result<Template> {
        self.commit(Touched::Templates, |catalog| {
            let template = catalog.find_mut(id)?;
            let rethumb = patch.changes_graph();

            if let Some(name) = patch.name {
                template.name = non_empty_name(name)?;
            }
            if let Some(description) = patch.description {
                template.description = description;
            }
            if let Some(category) = patch.category {
                template.category = category;
            }
            if let Some(nodes) = patch.nodes {
                template.nodes = nodes;
            }
            if let Some(edges) = patch.edges {
                template.edges = edges;
            }
            if let Some(tags) = patch.tags {
                template.metadata.tags = tags;
            }
            if let Some(difficulty) = patch.difficulty {
                template.metadata.difficulty = difficulty;
            }
            if let Some(minutes) = patch.estimated_minutes {
                template.metadata.estimated_minutes = minutes;
            }
            if let Some(is_public) = patch.is_public {
                template.is_public = is_public;
            }

            if rethumb {
                check_graph(template)?;
                template.thumbnail = thumbnail::synthesize(&template.nodes, &template.edges);
            }
            template.metadata.updated_at = Utc::now();
            Ok(template.clone())
        })
        .await
    }

    /// Remove a user template and its usage record
    pub async fn delete_template(&self, id: &str) -> Result<()> {
        self.commit(Touched::Both, |catalog| {
            if catalog.find(id)?.is_default {
                return Err(TemplateError::Forbidden(format!(
                    "'{}' is a system default template",
                    id
                )));
            }
            catalog.templates.retain(|t| t.id != id);
            catalog.stats.retain(|s| s.template_id != id);
            Ok(())
        })
        .await?;
        log::info!("Deleted template '{}'", id);
        Ok(())
    }

    // ─── QUERIES ────────────────────────────────────────────────────────────

    /// Filtered, ranked, paginated search
    ///
    /// Results are ordered by usage count, then by last update, both
    /// descending. `page` is 1-based; `page_size` falls back to the
    /// configured default.
    pub async fn search_templates(
        &self,
        filters: &TemplateFilters,
        page: usize,
        page_size: Option<usize>,
    ) -> Result<TemplatePage> {
        let page_size = page_size.unwrap_or(self.config.default_page_size);
        if page == 0 || page_size == 0 {
            return Err(TemplateError::invalid(format!(
                "page {} with size {} is out of range",
                page, page_size
            )));
        }

        let catalog = self.catalog.read().await;
        let mut matches: Vec<&Template> = catalog
            .templates
            .iter()
            .filter(|t| filters.matches(t))
            .collect();
        matches.sort_by(|a, b| {
            catalog
                .usage_count(&b.id)
                .cmp(&catalog.usage_count(&a.id))
                .then_with(|| b.metadata.updated_at.cmp(&a.metadata.updated_at))
                .then_with(|| a.name.cmp(&b.name))
        });

        let total = matches.len();
        let start = (page - 1).saturating_mul(page_size);
        let templates: Vec<Template> = matches
            .into_iter()
            .skip(start)
            .take(page_size)
            .cloned()
            .collect();

        Ok(TemplatePage {
            has_more: start + templates.len() < total,
            templates,
            total,
            page,
            page_size,
        })
    }

    pub async fn get_templates_by_category(&self, category: TemplateCategory) -> Vec<Template> {
        self.collect(|t| t.category == category).await
    }

    pub async fn list_default_templates(&self) -> Vec<Template> {
        self.collect(|t| t.is_default).await
    }

    pub async fn list_user_templates(&self, author: &str) -> Vec<Template> {
        self.collect(|t| !t.is_default && t.metadata.author == author)
            .await
    }

    /// Distinct categories in use, alphabetically
    pub async fn categories(&self) -> Vec<TemplateCategory> {
        let catalog = self.catalog.read().await;
        let mut categories: Vec<TemplateCategory> =
            catalog.templates.iter().map(|t| t.category).collect();
        categories.sort_by_key(|c| c.as_str());
        categories.dedup();
        categories
    }

    /// Distinct tags in use, alphabetically
    pub async fn tags(&self) -> Vec<String> {
        let catalog = self.catalog.read().await;
        let mut tags: Vec<String> = catalog
            .templates
            .iter()
            .flat_map(|t| t.metadata.tags.iter().cloned())
            .collect();
        tags.sort();
        tags.dedup();
        tags
    }

    /// Usage counters for a template; zeroed if it was never used
    pub async fn get_template_stats(&self, id: &str) -> Result<TemplateUsageStat> {
        let catalog = self.catalog.read().await;
        catalog.find(id)?;
        Ok(catalog
            .stat(id)
            .cloned()
            .unwrap_or_else(|| TemplateUsageStat::new(id)))
    }

    // ─── COPY / EXCHANGE ────────────────────────────────────────────────────

    /// Copy into a new private, non-default template
    pub async fn duplicate_template(&self, id: &str, new_name: &str) -> Result<Template> {
        let source = self.get_template(id).await?;
        let mut tags = source.metadata.tags;
        if !tags.iter().any(|t| t == catalog::DUPLICATE_TAG) {
            tags.push(catalog::DUPLICATE_TAG.to_string());
        }

        self.create_template(NewTemplate {
            name: new_name.to_string(),
            description: format!("{}{}", catalog::DUPLICATE_PREFIX, source.description),
            category: source.category,
            nodes: source.nodes,
            edges: source.edges,
            author: source.metadata.author,
            tags,
            difficulty: source.metadata.difficulty,
            estimated_minutes: source.metadata.estimated_minutes,
            is_public: false,
        })
        .await
    }

    /// Serialize one template to its portable JSON form
    pub async fn export_template(&self, id: &str) -> Result<String> {
        let template = self.get_template(id).await?;
        Ok(serde_json::to_string_pretty(&ExportedTemplate::new(template))?)
    }

    /// Read a template from its portable form under a fresh id
    pub async fn import_template(&self, serialized: &str) -> Result<Template> {
        let exported: ExportedTemplate = serde_json::from_str(serialized)
            .map_err(|e| TemplateError::invalid(format!("unreadable template: {}", e)))?;
        if exported.format != export::FORMAT {
            return Err(TemplateError::invalid(format!(
                "unsupported format '{}'",
                exported.format
            )));
        }
        if exported.format_version > export::FORMAT_VERSION {
            return Err(TemplateError::invalid(format!(
                "format version {} is newer than {}",
                exported.format_version,
                export::FORMAT_VERSION
            )));
        }

        let mut template = exported.template;
        template.name = non_empty_name(template.name)?;
        check_graph(&template)?;
        template.id = new_template_id();
        template.is_default = false;
        template.metadata.updated_at = Utc::now();
        template.thumbnail = thumbnail::synthesize(&template.nodes, &template.edges);

        let imported = template.clone();
        self.commit(Touched::Templates, move |catalog| {
            catalog.templates.push(template);
            Ok(())
        })
        .await?;
        log::info!("Imported template '{}' as {}", imported.name, imported.id);
        Ok(imported)
    }

    // ─── USAGE ──────────────────────────────────────────────────────────────

    pub async fn record_template_usage(&self, id: &str) -> Result<TemplateUsageStat> {
        self.commit(Touched::Stats, |catalog| {
            catalog.find(id)?;
            let stat = catalog.stat_mut(id);
            stat.record_use(Utc::now());
            Ok(stat.clone())
        })
        .await
    }

    /// Fold a 1 to 5 rating into the template's running mean
    pub async fn rate_template(&self, id: &str, rating: u8) -> Result<TemplateUsageStat> {
        if !(catalog::MIN_RATING..=catalog::MAX_RATING).contains(&rating) {
            return Err(TemplateError::invalid(format!(
                "rating {} is outside {}..={}",
                rating,
                catalog::MIN_RATING,
                catalog::MAX_RATING
            )));
        }
        self.commit(Touched::Stats, |catalog| {
            catalog.find(id)?;
            let stat = catalog.stat_mut(id);
            stat.add_rating(rating);
            Ok(stat.clone())
        })
        .await
    }

    // ─── DOCUMENTS ──────────────────────────────────────────────────────────

    /// Capture a document, or the selected nodes of it, as a new template
    ///
    /// Only edges with both endpoints captured are kept. The captured graph
    /// is shifted so its top-left corner sits at the origin.
    pub async fn create_template_from_document(
        &self,
        document: &GraphDocument,
        selection: Option<&[NodeId]>,
        spec: NewTemplate,
    ) -> Result<Template> {
        let keep: Option<HashSet<&str>> =
            selection.map(|ids| ids.iter().map(String::as_str).collect());
        let mut nodes: Vec<Node> = document
            .nodes
            .iter()
            .filter(|n| keep.as_ref().map_or(true, |k| k.contains(n.id.as_str())))
            .cloned()
            .collect();
        if nodes.is_empty() {
            return Err(TemplateError::invalid("nothing selected to capture"));
        }

        let captured: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let edges: Vec<Edge> = document
            .edges
            .iter()
            .filter(|e| captured.contains(e.source.as_str()) && captured.contains(e.target.as_str()))
            .cloned()
            .map(|mut e| {
                e.data.path = None;
                e.data.routing = None;
                e
            })
            .collect();

        if let Some(origin) = nodes
            .iter()
            .map(|n| n.position)
            .reduce(|a, b| Position::new(a.x.min(b.x), a.y.min(b.y)))
        {
            for node in &mut nodes {
                node.position = node.position.offset(-origin.x, -origin.y);
            }
        }

        self.create_template(spec.with_graph(nodes, edges)).await
    }

    /// Detached copy of a template's graph with fresh ids
    pub async fn instantiate(&self, id: &str) -> Result<(Vec<Node>, Vec<Edge>)> {
        let catalog = self.catalog.read().await;
        Ok(catalog.find(id)?.instantiate_graph(Position::default()))
    }

    /// Copy a template into a document as one undoable edit
    ///
    /// Returns the nodes and edges as added to the document. Usage is
    /// recorded after the document edit succeeds; a failed usage write is
    /// logged and does not fail the call, since the document already holds
    /// the copy.
    pub async fn apply_template(
        &self,
        id: &str,
        store: &mut DocumentStore,
        offset: Position,
    ) -> Result<(Vec<Node>, Vec<Edge>)> {
        let (nodes, edges) = {
            let catalog = self.catalog.read().await;
            catalog.find(id)?.instantiate_graph(offset)
        };

        let applied = store.batch(|editor| {
            let mut added_nodes = Vec::with_capacity(nodes.len());
            for node in nodes {
                let spec = NewNode {
                    id: Some(node.id),
                    label: node.label,
                    position: node.position,
                    size: node.size,
                    data: node.data,
                };
                added_nodes.push(editor.add_node(spec)?);
            }
            let mut added_edges = Vec::with_capacity(edges.len());
            for edge in edges {
                let spec = NewEdge {
                    id: Some(edge.id),
                    source: edge.source,
                    target: edge.target,
                    source_handle: edge.source_handle,
                    target_handle: edge.target_handle,
                    kind: edge.kind,
                    data: edge.data,
                };
                added_edges.push(editor.add_edge(spec)?);
            }
            Ok((added_nodes, added_edges))
        })?;

        log::info!(
            "Applied template '{}' ({} nodes, {} edges)",
            id,
            applied.0.len(),
            applied.1.len()
        );
        if let Err(e) = self.record_template_usage(id).await {
            log::warn!("Failed to record usage of template '{}': {}", id, e);
        }
        Ok(applied)
    }

    // ─── INTERNAL ───────────────────────────────────────────────────────────

    async fn collect(&self, predicate: impl Fn(&Template) -> bool) -> Vec<Template> {
        self.catalog
            .read()
            .await
            .templates
            .iter()
            .filter(|t| predicate(t))
            .cloned()
            .collect()
    }

    /// Run `edit` on a draft, write the touched collections, then swap it in
    async fn commit<T>(
        &self,
        touched: Touched,
        edit: impl FnOnce(&mut Catalog) -> Result<T>,
    ) -> Result<T> {
        let mut catalog = self.catalog.write().await;
        let mut draft = catalog.clone();
        let value = edit(&mut draft)?;

        // stats first: a missing usage record is harmless, a missing template is not
        if matches!(touched, Touched::Stats | Touched::Both) {
            let content = serde_json::to_string(&draft.stats)?;
            self.store
                .set(&self.config.usage_stats_key, content)
                .await
                .map_err(into_persistence)?;
        }
        if matches!(touched, Touched::Templates | Touched::Both) {
            let content = serde_json::to_string(&draft.templates)?;
            self.store
                .set(&self.config.templates_key, content)
                .await
                .map_err(into_persistence)?;
        }

        *catalog = draft;
        Ok(value)
    }
}

async fn load_collection<T>(store: &dyn KeyValueStore, key: &str) -> Result<Vec<T>>
where
    T: serde::de::DeserializeOwned,
{
    match store.get(key).await.map_err(into_persistence)? {
        Some(content) => serde_json::from_str(&content).map_err(|e| {
            log::warn!("Stored collection '{}' could not be parsed: {}", key, e);
            TemplateError::persistence(format!("stored '{}' is not valid JSON: {}", key, e))
        }),
        None => Ok(Vec::new()),
    }
}

fn into_persistence(e: TemplateError) -> TemplateError {
    match e {
        TemplateError::PersistenceFailure(_) => e,
        other => {
            log::warn!("Template store rejected a request: {}", other);
            TemplateError::persistence(other.to_string())
        }
    }
}

fn new_template_id() -> String {
    format!("template-{}", uuid::Uuid::new_v4())
}

fn non_empty_name(name: String) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TemplateError::invalid("template name is empty"));
    }
    Ok(trimmed.to_string())
}

fn check_graph(template: &Template) -> Result<()> {
    if let Some(edge) = template.dangling_edges().next() {
        return Err(TemplateError::invalid(format!(
            "edge '{}' references a node outside the template",
            edge.id
        )));
    }
    Ok(())
}

fn build_template(spec: NewTemplate) -> Result<Template> {
    let now = Utc::now();
    let author = if spec.author.trim().is_empty() {
        catalog::USER_AUTHOR.to_string()
    } else {
        spec.author
    };
    let template = Template {
        id: new_template_id(),
        name: non_empty_name(spec.name)?,
        description: spec.description,
        category: spec.category,
        thumbnail: thumbnail::synthesize(&spec.nodes, &spec.edges),
        nodes: spec.nodes,
        edges: spec.edges,
        metadata: TemplateMetadata {
            author,
            tags: spec.tags,
            difficulty: spec.difficulty,
            estimated_minutes: spec.estimated_minutes,
            created_at: now,
            updated_at: now,
        },
        is_public: spec.is_public,
        is_default: false,
    };
    check_graph(&template)?;
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::storage;
    use crate::defaults::{MINDMAP_PROJECT, ORG_BASIC, PROCESS_APPROVAL};
    use crate::kv::MemoryKeyValueStore;
    use crate::types::Difficulty;
    use async_trait::async_trait;
    use diagram_engine::{FlowchartData, MemoryPersistence, NodePayload};
    use std::sync::atomic::{AtomicBool, Ordering};

    async fn service() -> TemplateService {
        TemplateService::initialize(
            Arc::new(MemoryKeyValueStore::new()),
            TemplateServiceConfig::default(),
        )
        .await
        .unwrap()
    }

    fn step(id: &str, x: f64) -> Node {
        Node::new(
            id,
            Position::new(x, 0.0),
            NodePayload::Flowchart(FlowchartData::default()),
        )
        .with_id(id)
    }

    fn two_step() -> NewTemplate {
        NewTemplate::new("Two steps", TemplateCategory::Process)
            .with_author("ana")
            .with_tags(["simple"])
            .with_graph(vec![step("a", 0.0), step("b", 300.0)], vec![Edge::new("a", "b")])
    }

    /// Accepts writes until `fail` is flipped on
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryKeyValueStore,
        fail: AtomicBool,
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: String) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(TemplateError::persistence("disk full"));
            }
            self.inner.set(key, value).await
        }
    }

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let first = TemplateService::initialize(store.clone(), TemplateServiceConfig::default())
            .await
            .unwrap();
        first.create_template(two_step()).await.unwrap();

        let second = TemplateService::initialize(store, TemplateServiceConfig::default())
            .await
            .unwrap();
        assert_eq!(second.list_templates().await.len(), 4);
        assert_eq!(second.list_default_templates().await.len(), 3);
    }

    #[tokio::test]
    async fn test_seeding_can_be_disabled() {
        let config = TemplateServiceConfig {
            seed_defaults: false,
            ..Default::default()
        };
        let service = TemplateService::initialize(Arc::new(MemoryKeyValueStore::new()), config)
            .await
            .unwrap();
        assert!(service.list_templates().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let service = service().await;
        let created = service.create_template(two_step()).await.unwrap();

        assert!(created.id.starts_with("template-"));
        assert!(!created.is_default);
        assert!(created.thumbnail.contains("<line"));
        assert_eq!(service.get_template(&created.id).await.unwrap(), created);

        let err = service.get_template("missing").await.unwrap_err();
        assert!(matches!(err, TemplateError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_dangling_edges() {
        let service = service().await;
        let spec = NewTemplate::new("Broken", TemplateCategory::Custom)
            .with_graph(vec![step("a", 0.0)], vec![Edge::new("a", "ghost")]);
        let err = service.create_template(spec).await.unwrap_err();
        assert!(matches!(err, TemplateError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_update_rethumbnails_only_on_graph_change() {
        let service = service().await;
        let created = service.create_template(two_step()).await.unwrap();

        let renamed = service
            .update_template(
                &created.id,
                TemplatePatch {
                    name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Renamed");
        assert_eq!(renamed.thumbnail, created.thumbnail);

        let regraphed = service
            .update_template(
                &created.id,
                TemplatePatch {
                    nodes: Some(vec![step("a", 0.0), step("b", 900.0)]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_ne!(regraphed.thumbnail, created.thumbnail);
    }

    #[tokio::test]
    async fn test_default_templates_cannot_be_deleted() {
        let service = service().await;
        let err = service.delete_template(ORG_BASIC).await.unwrap_err();
        assert!(matches!(err, TemplateError::Forbidden(_)));
        assert!(service.get_template(ORG_BASIC).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_removes_usage() {
        let service = service().await;
        let created = service.create_template(two_step()).await.unwrap();
        service.record_template_usage(&created.id).await.unwrap();

        service.delete_template(&created.id).await.unwrap();
        assert!(service.get_template(&created.id).await.is_err());
        assert!(service.get_template_stats(&created.id).await.is_err());
    }

    #[tokio::test]
    async fn test_search_ranks_by_usage_and_pages() {
        let service = service().await;
        service.record_template_usage(PROCESS_APPROVAL).await.unwrap();
        service.record_template_usage(PROCESS_APPROVAL).await.unwrap();
        service.record_template_usage(MINDMAP_PROJECT).await.unwrap();

        let all = service
            .search_templates(&TemplateFilters::default(), 1, None)
            .await
            .unwrap();
        let order: Vec<&str> = all.templates.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(order, vec![PROCESS_APPROVAL, MINDMAP_PROJECT, ORG_BASIC]);
        assert_eq!(all.page_size, 20);
        assert!(!all.has_more);

        let first = service
            .search_templates(&TemplateFilters::default(), 1, Some(2))
            .await
            .unwrap();
        assert_eq!(first.templates.len(), 2);
        assert!(first.has_more);

        let second = service
            .search_templates(&TemplateFilters::default(), 2, Some(2))
            .await
            .unwrap();
        assert_eq!(second.total, 3);
        assert_eq!(second.templates[0].id, ORG_BASIC);
        assert!(!second.has_more);

        let err = service
            .search_templates(&TemplateFilters::default(), 0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_search_filters() {
        let service = service().await;
        let filters = TemplateFilters {
            difficulty: Some(Difficulty::Intermediate),
            search: Some("approv".to_string()),
            ..Default::default()
        };
        let page = service.search_templates(&filters, 1, None).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.templates[0].id, PROCESS_APPROVAL);
    }

    #[tokio::test]
    async fn test_duplicate_is_private_copy() {
        let service = service().await;
        let copy = service
            .duplicate_template(PROCESS_APPROVAL, "My approval")
            .await
            .unwrap();

        assert_ne!(copy.id, PROCESS_APPROVAL);
        assert_eq!(copy.name, "My approval");
        assert!(copy.description.starts_with("Copy of: "));
        assert!(copy.has_tag("copy"));
        assert!(!copy.is_public && !copy.is_default);
        assert_eq!(copy.nodes.len(), 5);
    }

    #[tokio::test]
    async fn test_import_of_export_matches_content() {
        let service = service().await;
        let original = service.create_template(two_step()).await.unwrap();

        let text = service.export_template(&original.id).await.unwrap();
        let imported = service.import_template(&text).await.unwrap();

        assert_ne!(imported.id, original.id);
        assert_eq!(imported.nodes, original.nodes);
        assert_eq!(imported.edges, original.edges);
        assert_eq!(imported.metadata.author, original.metadata.author);
        assert_eq!(imported.metadata.tags, original.metadata.tags);
        assert_eq!(imported.metadata.difficulty, original.metadata.difficulty);

        // importing the same text twice never collides
        let again = service.import_template(&text).await.unwrap();
        assert_ne!(again.id, imported.id);
    }

    #[tokio::test]
    async fn test_import_rejects_foreign_documents() {
        let service = service().await;
        let text = service.export_template(ORG_BASIC).await.unwrap();

        let foreign = text.replace("\"diagram-template\"", "\"something-else\"");
        let err = service.import_template(&foreign).await.unwrap_err();
        assert!(matches!(err, TemplateError::InvalidArgument(_)));

        let err = service.import_template("not json").await.unwrap_err();
        assert!(matches!(err, TemplateError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_usage_counts_each_call() {
        let service = service().await;
        let before = service.get_template_stats(ORG_BASIC).await.unwrap();
        service.record_template_usage(ORG_BASIC).await.unwrap();
        let after = service.record_template_usage(ORG_BASIC).await.unwrap();

        assert_eq!(after.usage_count, before.usage_count + 2);
        assert!(after.last_used.is_some());
    }

    #[tokio::test]
    async fn test_rating_bounds() {
        let service = service().await;
        for rating in [0, 6] {
            let err = service.rate_template(ORG_BASIC, rating).await.unwrap_err();
            assert!(matches!(err, TemplateError::InvalidArgument(_)));
        }

        service.rate_template(ORG_BASIC, 4).await.unwrap();
        let stat = service.rate_template(ORG_BASIC, 5).await.unwrap();
        assert_eq!(stat.rating_count, 2);
        assert!((stat.average_rating - 4.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_catalog_untouched() {
        let store = Arc::new(FlakyStore::default());
        let service = TemplateService::initialize(store.clone(), TemplateServiceConfig::default())
            .await
            .unwrap();
        store.fail.store(true, Ordering::SeqCst);

        let err = service.create_template(two_step()).await.unwrap_err();
        assert!(matches!(err, TemplateError::PersistenceFailure(_)));
        assert_eq!(service.list_templates().await.len(), 3);

        let err = service.record_template_usage(ORG_BASIC).await.unwrap_err();
        assert!(matches!(err, TemplateError::PersistenceFailure(_)));
        assert_eq!(
            service.get_template_stats(ORG_BASIC).await.unwrap().usage_count,
            0
        );
    }

    #[tokio::test]
    async fn test_catalog_queries() {
        let service = service().await;
        service.create_template(two_step()).await.unwrap();

        assert_eq!(
            service.categories().await,
            vec![
                TemplateCategory::Mindmap,
                TemplateCategory::Organizational,
                TemplateCategory::Process
            ]
        );
        assert!(service.tags().await.contains(&"simple".to_string()));
        assert_eq!(
            service
                .get_templates_by_category(TemplateCategory::Process)
                .await
                .len(),
            2
        );
        assert_eq!(service.list_user_templates("ana").await.len(), 1);
        assert!(service.list_user_templates("System").await.is_empty());
    }

    #[tokio::test]
    async fn test_capture_selection_from_document() {
        let service = service().await;
        let mut store = DocumentStore::new(Arc::new(MemoryPersistence::new()));
        for (id, x) in [("a", 100.0), ("b", 400.0), ("c", 700.0)] {
            let spec = NewNode::new(
                id,
                Position::new(x, 50.0),
                NodePayload::Flowchart(FlowchartData::default()),
            )
            .with_id(id);
            store.add_node(spec).unwrap();
        }
        store.add_edge(NewEdge::new("a", "b")).unwrap();
        store.add_edge(NewEdge::new("b", "c")).unwrap();

        let selection = vec!["a".to_string(), "b".to_string()];
        let template = service
            .create_template_from_document(
                store.document(),
                Some(&selection),
                NewTemplate::new("Pair", TemplateCategory::Custom),
            )
            .await
            .unwrap();

        assert_eq!(template.nodes.len(), 2);
        assert_eq!(template.edges.len(), 1);
        assert_eq!(template.nodes[0].position, Position::new(0.0, 0.0));
        assert!(template.edges[0].data.path.is_none());
    }

    #[tokio::test]
    async fn test_apply_is_one_undo_step() {
        let service = service().await;
        let mut store = DocumentStore::new(Arc::new(MemoryPersistence::new()));

        let (nodes, edges) = service
            .apply_template(PROCESS_APPROVAL, &mut store, Position::new(100.0, 100.0))
            .await
            .unwrap();

        assert_eq!(store.nodes().len(), 5);
        assert_eq!(store.edges().len(), 4);
        assert!(nodes.iter().all(|n| n.id.starts_with("node-")));
        assert!(edges.iter().all(|e| e.data.path.is_some()));
        assert_eq!(
            service
                .get_template_stats(PROCESS_APPROVAL)
                .await
                .unwrap()
                .usage_count,
            1
        );

        assert!(store.undo().unwrap());
        assert!(store.nodes().is_empty());

        // the template itself never changes
        let template = service.get_template(PROCESS_APPROVAL).await.unwrap();
        assert_eq!(template.nodes[0].id, "request");
    }

    #[tokio::test]
    async fn test_apply_succeeds_when_usage_write_fails() {
        let kv = Arc::new(FlakyStore::default());
        let service = TemplateService::initialize(kv.clone(), TemplateServiceConfig::default())
            .await
            .unwrap();
        kv.fail.store(true, Ordering::SeqCst);
        let mut store = DocumentStore::new(Arc::new(MemoryPersistence::new()));

        let (nodes, _) = service
            .apply_template(PROCESS_APPROVAL, &mut store, Position::default())
            .await
            .unwrap();

        assert_eq!(nodes.len(), 5);
        assert_eq!(store.nodes().len(), 5);
        assert_eq!(store.history_len(), 1);
        // usage stays as it was in memory and in storage
        assert_eq!(
            service
                .get_template_stats(PROCESS_APPROVAL)
                .await
                .unwrap()
                .usage_count,
            0
        );
    }

    #[tokio::test]
    async fn test_corrupt_collection_is_persistence_failure() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.set(storage::TEMPLATES_KEY, "[{ broken".to_string())
            .await
            .unwrap();

        let err = TemplateService::initialize(kv, TemplateServiceConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TemplateError::PersistenceFailure(_)));
    }

    #[tokio::test]
    async fn test_instantiate_is_detached() {
        let service = service().await;
        let (nodes, edges) = service.instantiate(MINDMAP_PROJECT).await.unwrap();
        assert_eq!(nodes.len(), 5);
        assert_eq!(edges.len(), 4);
        assert!(nodes.iter().all(|n| n.id != "project"));
        assert_eq!(
            service
                .get_template_stats(MINDMAP_PROJECT)
                .await
                .unwrap()
                .usage_count,
            0
        );
    }
}
