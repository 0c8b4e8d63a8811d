use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::base::Agent;
use super::errors::AgentResult;
use super::state::{AgentCore, DEFAULT_MAX_MEMORY};
use super::text::char_prefix;

/// Characters of content used to detect duplicate hits
const DEDUP_PREFIX_CHARS: usize = 100;
const KEYWORD_SCORE: f64 = 1.0;
const GRAPH_SCORE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitSource {
    VectorStore,
    DocumentStore,
    KnowledgeGraph,
}

/// One retrieved piece of knowledge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeHit {
    pub content: String,
    pub source: HitSource,
    pub score: f64,
}

/// Fused and reranked retrieval result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retrieval {
    pub query: String,
    pub results: Vec<KnowledgeHit>,
    /// Number of hits after merging, before truncation to `top_k`
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// External vector store binding
///
/// Implementations return hits whose `score` is a similarity in `[0, 1]`.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn add(&self, id: &str, content: &str, metadata: &Map<String, Value>) -> AgentResult<()>;

    async fn query(&self, text: &str, top_k: usize) -> AgentResult<Vec<KnowledgeHit>>;
}

/// Directed graph of named nodes with optionally labelled edges
///
/// Nodes keep insertion order and each distinct edge is stored once.
#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    nodes: Vec<String>,
    edges: HashMap<String, Vec<(String, Option<String>)>>,
}

impl KnowledgeGraph {
    pub fn add_relation(&mut self, from: &str, relation: Option<&str>, to: &str) {
        self.add_node(from);
        self.add_node(to);

        let edge = (to.to_string(), relation.map(str::to_string));
        let neighbors = self.edges.entry(from.to_string()).or_default();
        if !neighbors.contains(&edge) {
            neighbors.push(edge);
        }
    }

    fn add_node(&mut self, name: &str) {
        if !self.edges.contains_key(name) {
            self.nodes.push(name.to_string());
            self.edges.insert(name.to_string(), Vec::new());
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// One hit per outgoing edge of every node whose name contains the query
    pub fn query(&self, query: &str) -> Vec<KnowledgeHit> {
        let needle = query.to_lowercase();
        self.nodes
            .iter()
            .filter(|node| node.to_lowercase().contains(&needle))
            .filter_map(|node| Some((node, self.edges.get(node)?)))
            .flat_map(|(node, neighbors)| {
                neighbors.iter().map(move |(neighbor, relation)| KnowledgeHit {
                    content: format!(
                        "{} {} {}",
                        node,
                        relation.as_deref().unwrap_or("related"),
                        neighbor
                    ),
                    source: HitSource::KnowledgeGraph,
                    score: GRAPH_SCORE,
                })
            })
            .collect()
    }
}

/// Knowledge agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub top_k: usize,
    pub max_memory: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_memory: DEFAULT_MAX_MEMORY,
        }
    }
}

#[derive(Debug, Deserialize)]
struct KnowledgeInput {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

/// Knowledge Agent: multi-source retrieval with merge and rerank
pub struct KnowledgeAgent {
    core: AgentCore,
    config: KnowledgeConfig,
    documents: RwLock<Vec<Document>>,
    graph: RwLock<KnowledgeGraph>,
    vector_index: Option<Arc<dyn VectorIndex>>,
}

impl KnowledgeAgent {
    pub fn new(config: KnowledgeConfig) -> Self {
        Self {
            core: AgentCore::new("KnowledgeAgent", config.max_memory),
            config,
            documents: RwLock::new(Vec::new()),
            graph: RwLock::new(KnowledgeGraph::default()),
            vector_index: None,
        }
    }

    pub fn with_vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    pub fn default_top_k(&self) -> usize {
        self.config.top_k
    }

    /// Store a document and forward it to the vector index when present
    pub async fn add_document(&self, content: String, metadata: Map<String, Value>) -> usize {
        let count = {
            let mut documents = self.documents.write();
            documents.push(Document {
                content: content.clone(),
                metadata: metadata.clone(),
            });
            documents.len()
        };

        if let Some(index) = &self.vector_index {
            let id = format!("doc_{}", count);
            if let Err(e) = index.add(&id, &content, &metadata).await {
                tracing::warn!(error = %e, "vector index add failed");
            }
        }

        count
    }

    pub fn add_relation(&self, from: &str, relation: Option<&str>, to: &str) {
        let mut graph = self.graph.write();
        graph.add_relation(from, relation, to);
        tracing::debug!(from, to, nodes = graph.node_count(), "relation added");
    }

    pub fn document_count(&self) -> usize {
        self.documents.read().len()
    }

    /// Search every source, merge duplicates and rank by score
    pub async fn retrieve(&self, query: &str, top_k: usize) -> AgentResult<Retrieval> {
        self.core
            .track("retrieve", async {
                let mut hits = Vec::new();

                if let Some(index) = &self.vector_index {
                    match index.query(query, top_k).await {
                        Ok(found) => hits.extend(found),
                        Err(e) => tracing::warn!(error = %e, "vector search failed"),
                    }
                }

                hits.extend(self.keyword_search(query, top_k));
                hits.extend(self.graph.read().query(query));

                let mut merged = rerank(merge_hits(hits));
                let total = merged.len();
                merged.truncate(top_k);

                tracing::info!(query, total, "knowledge retrieved");

                Ok(Retrieval {
                    query: query.to_string(),
                    results: merged,
                    total,
                })
            })
            .await
    }

    fn keyword_search(&self, query: &str, top_k: usize) -> Vec<KnowledgeHit> {
        let needle = query.to_lowercase();
        self.documents
            .read()
            .iter()
            .filter(|doc| doc.content.to_lowercase().contains(&needle))
            .take(top_k)
            .map(|doc| KnowledgeHit {
                content: doc.content.clone(),
                source: HitSource::DocumentStore,
                score: KEYWORD_SCORE,
            })
            .collect()
    }
}

#[async_trait]
impl Agent for KnowledgeAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn process(&self, input: Value) -> AgentResult<Value> {
        let input: KnowledgeInput = serde_json::from_value(input)?;
        let top_k = input.top_k.unwrap_or(self.config.top_k);
        let retrieval = self.retrieve(&input.query, top_k).await?;
        Ok(serde_json::to_value(retrieval)?)
    }
}

/// Drop hits whose content prefix was already seen; first occurrence wins
fn merge_hits(hits: Vec<KnowledgeHit>) -> Vec<KnowledgeHit> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|hit| seen.insert(char_prefix(&hit.content, DEDUP_PREFIX_CHARS).to_string()))
        .collect()
}

/// Stable sort by descending score
fn rerank(mut hits: Vec<KnowledgeHit>) -> Vec<KnowledgeHit> {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::agents::errors::AgentError;

    #[derive(Default)]
    struct FixedIndex {
        hits: Vec<KnowledgeHit>,
        added: parking_lot::Mutex<Vec<(String, String, Map<String, Value>)>>,
    }

    #[async_trait]
    impl VectorIndex for FixedIndex {
        async fn add(&self, id: &str, content: &str, metadata: &Map<String, Value>) -> AgentResult<()> {
            self.added
                .lock()
                .push((id.to_string(), content.to_string(), metadata.clone()));
            Ok(())
        }

        async fn query(&self, _text: &str, _top_k: usize) -> AgentResult<Vec<KnowledgeHit>> {
            Ok(self.hits.clone())
        }
    }

    struct FailingIndex;

    #[async_trait]
    impl VectorIndex for FailingIndex {
        async fn add(&self, _id: &str, _content: &str, _metadata: &Map<String, Value>) -> AgentResult<()> {
            Err(AgentError::TaskExecutionFailed("index offline".to_string()))
        }

        async fn query(&self, _text: &str, _top_k: usize) -> AgentResult<Vec<KnowledgeHit>> {
            Err(AgentError::TaskExecutionFailed("index offline".to_string()))
        }
    }

    fn hit(content: &str, source: HitSource, score: f64) -> KnowledgeHit {
        KnowledgeHit {
            content: content.to_string(),
            source,
            score,
        }
    }

    #[tokio::test]
    async fn keyword_search_is_case_insensitive() {
        let agent = KnowledgeAgent::new(KnowledgeConfig::default());
        agent.add_document("Rust ownership rules".to_string(), Map::new()).await;
        agent.add_document("Python decorators".to_string(), Map::new()).await;

        let retrieval = agent.retrieve("OWNERSHIP", 5).await.unwrap();

        assert_eq!(retrieval.total, 1);
        assert_eq!(retrieval.results[0].content, "Rust ownership rules");
        assert_eq!(retrieval.results[0].source, HitSource::DocumentStore);
    }

    #[tokio::test]
    async fn graph_hits_describe_relations() {
        let agent = KnowledgeAgent::new(KnowledgeConfig::default());
        agent.add_relation("Rust", Some("is_a"), "language");
        agent.add_relation("Rust", None, "Cargo");

        let retrieval = agent.retrieve("rust", 5).await.unwrap();
        let contents: Vec<&str> = retrieval.results.iter().map(|h| h.content.as_str()).collect();

        assert_eq!(contents, vec!["Rust is_a language", "Rust related Cargo"]);
        assert!(retrieval.results.iter().all(|h| h.score == GRAPH_SCORE));
    }

    #[tokio::test]
    async fn results_are_ranked_and_truncated() {
        let index = Arc::new(FixedIndex {
            hits: vec![
                hit("vector low", HitSource::VectorStore, 0.3),
                hit("vector high", HitSource::VectorStore, 0.95),
            ],
            ..Default::default()
        });
        let agent = KnowledgeAgent::new(KnowledgeConfig::default()).with_vector_index(index);
        agent.add_document("vector notes".to_string(), Map::new()).await;

        let retrieval = agent.retrieve("vector", 2).await.unwrap();

        assert_eq!(retrieval.total, 3);
        assert_eq!(retrieval.results.len(), 2);
        assert_eq!(retrieval.results[0].content, "vector notes");
        assert_eq!(retrieval.results[1].content, "vector high");
    }

    #[tokio::test]
    async fn failing_index_does_not_stop_retrieval() {
        let agent = KnowledgeAgent::new(KnowledgeConfig::default()).with_vector_index(Arc::new(FailingIndex));
        let count = agent.add_document("cargo builds crates".to_string(), Map::new()).await;
        agent.add_relation("cargo", Some("uses"), "registry");

        let retrieval = agent.retrieve("cargo", 5).await.unwrap();

        assert_eq!(count, 1);
        assert_eq!(retrieval.total, 2);
        assert_eq!(retrieval.results[0].source, HitSource::DocumentStore);
        assert_eq!(retrieval.results[1].content, "cargo uses registry");
    }

    #[tokio::test]
    async fn documents_are_forwarded_to_the_index() {
        let index = Arc::new(FixedIndex::default());
        let agent = KnowledgeAgent::new(KnowledgeConfig::default()).with_vector_index(index.clone());
        let mut metadata = Map::new();
        metadata.insert("source".to_string(), Value::from("notes"));

        agent.add_document("first".to_string(), Map::new()).await;
        agent.add_document("second".to_string(), metadata.clone()).await;

        let added = index.added.lock().clone();
        assert_eq!(added.len(), 2);
        assert_eq!(added[0].0, "doc_1");
        assert_eq!((added[1].0.as_str(), added[1].1.as_str()), ("doc_2", "second"));
        assert_eq!(added[1].2, metadata);
    }

    #[test]
    fn graph_keeps_insertion_order_and_distinct_edges() {
        let mut graph = KnowledgeGraph::default();
        graph.add_relation("tokio", Some("runs"), "tasks");
        graph.add_relation("tower", Some("uses"), "tokio");
        graph.add_relation("tokio", Some("runs"), "tasks");
        graph.add_relation("tokio", None, "mio");

        assert_eq!(graph.node_count(), 4);
        let contents: Vec<String> = graph.query("o").into_iter().map(|h| h.content).collect();
        assert_eq!(contents, vec!["tokio runs tasks", "tokio related mio", "tower uses tokio"]);
    }

    #[test]
    fn merge_deduplicates_by_prefix() {
        let long_a = format!("{}A", "x".repeat(100));
        let long_b = format!("{}B", "x".repeat(100));
        let merged = merge_hits(vec![
            hit(&long_a, HitSource::VectorStore, 0.5),
            hit(&long_b, HitSource::DocumentStore, 1.0),
            hit("short", HitSource::DocumentStore, 1.0),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].source, HitSource::VectorStore);
    }

    #[test]
    fn rerank_is_stable_for_equal_scores() {
        let ranked = rerank(vec![
            hit("first", HitSource::DocumentStore, 1.0),
            hit("low", HitSource::KnowledgeGraph, 0.8),
            hit("second", HitSource::DocumentStore, 1.0),
        ]);
        let contents: Vec<&str> = ranked.iter().map(|h| h.content.as_str()).collect();

        assert_eq!(contents, vec!["first", "second", "low"]);
    }

    #[tokio::test]
    async fn process_uses_default_top_k() {
        let agent = KnowledgeAgent::new(KnowledgeConfig { top_k: 1, ..Default::default() });
        agent.add_document("alpha one".to_string(), Map::new()).await;
        agent.add_document("alpha two".to_string(), Map::new()).await;

        let output = agent.process(serde_json::json!({ "query": "alpha" })).await.unwrap();

        assert_eq!(output["results"].as_array().unwrap().len(), 1);
        assert_eq!(output["results"][0]["content"], "alpha one");
    }
}
