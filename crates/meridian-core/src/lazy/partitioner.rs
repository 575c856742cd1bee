//! Graph Partitioner
//!
//! Converts a PetCodeGraph into partitioned SQLite files for lazy loading.
//!
//! # Design
//!
//! The partitioner splits a code graph by directory, creating one SQLite
//! partition per directory. Cross-partition edges (edges where source and
//! target are in different partitions) are stored separately in cross_refs.db.
//!
//! # Example
//!
//! ```no_run
//! use meridian_core::graph::PetCodeGraph;
//! use meridian_core::lazy::partitioner::GraphPartitioner;
//! use std::path::Path;
//!
//! let graph = PetCodeGraph::new();
//! // ... populate graph ...
//!
//! let manifest = GraphPartitioner::partition(
//!     &graph,
//!     Path::new(".meridian"),
//!     Some("my-repo"),
//! ).unwrap();
//! ```

use crate::graph::{Edge, Node, PetCodeGraph};
use crate::lazy::cross_refs::{CrossRef, CrossRefIndex, CrossRefStore};
use crate::lazy::manager::{LazyGraphManager, Manifest, RootInfo};
use crate::lazy::partition::PartitionConnection;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during partitioning
#[derive(Debug, Error)]
pub enum PartitionerError {
    #[error("Partition error: {0}")]
    Partition(#[from] crate::lazy::partition::PartitionError),

    #[error("Cross-ref error: {0}")]
    CrossRef(#[from] crate::lazy::cross_refs::CrossRefError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Manifest error: {0}")]
    Manifest(#[from] crate::lazy::manager::LazyGraphError),
}

/// Statistics from the partitioning process
#[derive(Debug, Clone)]
pub struct PartitioningStats {
    /// Total number of nodes partitioned
    pub total_nodes: usize,
    /// Total number of edges partitioned
    pub total_edges: usize,
    /// Number of partitions created
    pub partition_count: usize,
    /// Number of cross-partition edges
    pub cross_partition_edges: usize,
    /// Number of intra-partition edges
    pub intra_partition_edges: usize,
}

/// Graph Partitioner
///
/// Converts a PetCodeGraph into partitioned SQLite files.
pub struct GraphPartitioner;

impl GraphPartitioner {
    /// Partition a PetCodeGraph into SQLite partition files.
    ///
    /// # Arguments
    /// * `graph` - The code graph to partition
    /// * `prism_dir` - The .meridian directory path
    /// * `root_name` - Optional root name for multi-root support (uses "default" if None)
    ///
    /// # Returns
    /// A `Manifest` with file→partition mappings and partition→filename mappings.
    pub fn partition(
        graph: &PetCodeGraph,
        prism_dir: &Path,
        root_name: Option<&str>,
    ) -> Result<Manifest, PartitionerError> {
        let (manifest, _stats) = Self::partition_with_stats(graph, prism_dir, root_name)?;
        Ok(manifest)
    }

    /// Partition a PetCodeGraph and return statistics.
    ///
    /// Like `partition()` but also returns partitioning statistics.
    pub fn partition_with_stats(
        graph: &PetCodeGraph,
        prism_dir: &Path,
        root_name: Option<&str>,
    ) -> Result<(Manifest, PartitioningStats), PartitionerError> {
        let root = root_name.unwrap_or("default");
        let partitions_dir = prism_dir.join("partitions");

        // Create directories
        std::fs::create_dir_all(&partitions_dir)?;

        // Step 1: Group nodes by partition ID (directory-based)
        let node_partitions = Self::group_nodes_by_partition(graph, root);

        // Step 2: Compute partition IDs for all nodes (for edge classification)
        let node_to_partition: HashMap<String, String> = graph
            .iter_nodes()
            .map(|node| {
                let partition_id =
                    LazyGraphManager::compute_partition_id_for_root(root, &node.file);
                (node.id.clone(), partition_id)
            })
            .collect();

        // Step 3: Classify edges as intra-partition or cross-partition
        let (intra_edges, cross_refs) = Self::classify_edges(graph, &node_to_partition);

        // Step 4: Write partition SQLite files
        let mut manifest = Manifest::new();
        let mut partition_filenames: HashMap<String, String> = HashMap::new();

        for (partition_id, nodes) in &node_partitions {
            // Create sanitized filename for partition
            let safe_name = partition_id.replace(['/', '\\', ':'], "_");
            let filename = format!("{}.db", safe_name);
            let db_path = partitions_dir.join(&filename);

            // Create partition connection
            let conn = PartitionConnection::create(&db_path, partition_id)?;

            // Insert nodes
            let node_vec: Vec<Node> = nodes.to_vec();
            conn.insert_nodes(&node_vec)?;

            // Insert intra-partition edges for this partition
            if let Some(edges) = intra_edges.get(partition_id) {
                let edge_vec: Vec<Edge> = edges.to_vec();
                conn.insert_edges(&edge_vec)?;
            }

            // Register in manifest
            partition_filenames.insert(partition_id.clone(), filename.clone());
            manifest.register_partition(partition_id.clone(), filename);

            // Register files in manifest
            for node in nodes {
                if !node.file.is_empty() {
                    manifest.set_file(node.file.clone(), partition_id.clone(), node.hash.clone());
                }
            }
        }

        // Step 5: Write cross-partition edges to cross_refs.db
        let cross_refs_path = prism_dir.join("cross_refs.db");
        let cross_ref_store = CrossRefStore::create(&cross_refs_path)?;
        let cross_ref_vec: Vec<CrossRef> = cross_refs.iter().cloned().collect();
        cross_ref_store.add_refs(&cross_ref_vec)?;

        // Step 6: Register root info (if we have a root name)
        manifest.register_root(RootInfo {
            name: root.to_string(),
            root_type: "code".to_string(), // Default to "code", caller can update
            relative_path: ".".to_string(),
            remote_url: None,
            branch: None,
            commit: None,
        });

        // Step 7: Save manifest
        let manifest_path = prism_dir.join("manifest.json");
        manifest.save(&manifest_path)?;

        // Compute stats
        let stats = PartitioningStats {
            total_nodes: graph.node_count(),
            total_edges: graph.edge_count(),
            partition_count: node_partitions.len(),
            cross_partition_edges: cross_refs.len(),
            intra_partition_edges: intra_edges.values().map(|v| v.len()).sum(),
        };

        Ok((manifest, stats))
    }

    /// Partition a graph with a RootInfo structure for complete root metadata.
    ///
    /// This variant accepts a pre-configured RootInfo for better control over
    /// git metadata and root type.
    pub fn partition_with_root_info(
        graph: &PetCodeGraph,
        prism_dir: &Path,
        root_info: RootInfo,
    ) -> Result<(Manifest, PartitioningStats), PartitionerError> {
        let root = &root_info.name;
        let partitions_dir = prism_dir.join("partitions");

        // Create directories
        std::fs::create_dir_all(&partitions_dir)?;

        // Step 1: Group nodes by partition ID
        let node_partitions = Self::group_nodes_by_partition(graph, root);

        // Step 2: Compute partition IDs for all nodes
        let node_to_partition: HashMap<String, String> = graph
            .iter_nodes()
            .map(|node| {
                let partition_id =
                    LazyGraphManager::compute_partition_id_for_root(root, &node.file);
                (node.id.clone(), partition_id)
            })
            .collect();

        // Step 3: Classify edges
        let (intra_edges, cross_refs) = Self::classify_edges(graph, &node_to_partition);

        // Step 4: Write partitions
        let mut manifest = Manifest::new();

        for (partition_id, nodes) in &node_partitions {
            let safe_name = partition_id.replace(['/', '\\', ':'], "_");
            let filename = format!("{}.db", safe_name);
            let db_path = partitions_dir.join(&filename);

            let conn = PartitionConnection::create(&db_path, partition_id)?;

            let node_vec: Vec<Node> = nodes.to_vec();
            conn.insert_nodes(&node_vec)?;

            if let Some(edges) = intra_edges.get(partition_id) {
                let edge_vec: Vec<Edge> = edges.to_vec();
                conn.insert_edges(&edge_vec)?;
            }

            manifest.register_partition(partition_id.clone(), filename);

            for node in nodes {
                if !node.file.is_empty() {
                    manifest.set_file(node.file.clone(), partition_id.clone(), node.hash.clone());
                }
            }
        }

        // Step 5: Write cross-refs
        let cross_refs_path = prism_dir.join("cross_refs.db");
        let cross_ref_store = CrossRefStore::create(&cross_refs_path)?;
        let cross_ref_vec: Vec<CrossRef> = cross_refs.iter().cloned().collect();
        cross_ref_store.add_refs(&cross_ref_vec)?;

        // Step 6: Register root with full info
        manifest.register_root(root_info);

        // Step 7: Save manifest
        let manifest_path = prism_dir.join("manifest.json");
        manifest.save(&manifest_path)?;

        let stats = PartitioningStats {
            total_nodes: graph.node_count(),
            total_edges: graph.edge_count(),
            partition_count: node_partitions.len(),
            cross_partition_edges: cross_refs.len(),
            intra_partition_edges: intra_edges.values().map(|v| v.len()).sum(),
        };

        Ok((manifest, stats))
    }

    /// Group nodes by their partition ID (directory-based).
    ///
    /// Returns a map from partition_id to the set of nodes in that partition.
    fn group_nodes_by_partition(
        graph: &PetCodeGraph,
        root_name: &str,
    ) -> HashMap<String, Vec<Node>> {
        let mut partitions: HashMap<String, Vec<Node>> = HashMap::new();

        for node in graph.iter_nodes() {
            let partition_id =
                LazyGraphManager::compute_partition_id_for_root(root_name, &node.file);
            partitions
                .entry(partition_id)
                .or_default()
                .push(node.clone());
        }

        partitions
    }

    /// Classify edges as intra-partition or cross-partition.
    ///
    /// Returns:
    /// - intra_edges: Map from partition_id to edges within that partition
    /// - cross_refs: CrossRefIndex for edges spanning partitions
    fn classify_edges(
        graph: &PetCodeGraph,
        node_to_partition: &HashMap<String, String>,
    ) -> (HashMap<String, Vec<Edge>>, CrossRefIndex) {
        let mut intra_edges: HashMap<String, Vec<Edge>> = HashMap::new();
        let mut cross_refs = CrossRefIndex::new();

        for edge in graph.iter_edges() {
            let source_partition = node_to_partition.get(&edge.source);
            let target_partition = node_to_partition.get(&edge.target);

            match (source_partition, target_partition) {
                (Some(src_part), Some(tgt_part)) if src_part == tgt_part => {
                    // Intra-partition edge
                    intra_edges.entry(src_part.clone()).or_default().push(edge);
                }
                (Some(src_part), Some(tgt_part)) => {
                    // Cross-partition edge
                    cross_refs.add(CrossRef::new(
                        edge.source.clone(),
                        src_part.clone(),
                        edge.target.clone(),
                        tgt_part.clone(),
                        edge.edge_type,
                        edge.ref_line,
                        edge.ident.clone(),
                    ));
                }
                _ => {
                    // Edge references unknown node(s) - skip
                    // This can happen if an edge references a node not in the graph
                    // (e.g., external dependency)
                }
            }
        }

        (intra_edges, cross_refs)
    }

    /// Update a single partition after file changes.
    ///
    /// This is useful for incremental updates where only a few files changed.
    ///
    /// # Arguments
    /// * `graph` - The updated code graph (containing only changed files)
    /// * `prism_dir` - The .meridian directory path
    /// * `partition_id` - The partition to update
    /// * `root_name` - The root name
    pub fn update_partition(
        graph: &PetCodeGraph,
        prism_dir: &Path,
        partition_id: &str,
        root_name: &str,
    ) -> Result<(), PartitionerError> {
        let partitions_dir = prism_dir.join("partitions");
        let safe_name = partition_id.replace(['/', '\\', ':'], "_");
        let db_path = partitions_dir.join(format!("{}.db", safe_name));

        // Open or create the partition
        let conn = if db_path.exists() {
            PartitionConnection::open(&db_path, partition_id)?
        } else {
            std::fs::create_dir_all(&partitions_dir)?;
            PartitionConnection::create(&db_path, partition_id)?
        };

        // Clear existing data and rewrite
        conn.clear()?;

        // Compute partition IDs for edge classification
        let node_to_partition: HashMap<String, String> = graph
            .iter_nodes()
            .map(|node| {
                let pid = LazyGraphManager::compute_partition_id_for_root(root_name, &node.file);
                (node.id.clone(), pid)
            })
            .collect();

        // Collect nodes for this partition
        let nodes: Vec<Node> = graph
            .iter_nodes()
            .filter(|node| {
                let pid = LazyGraphManager::compute_partition_id_for_root(root_name, &node.file);
                pid == partition_id
            })
            .cloned()
            .collect();

        conn.insert_nodes(&nodes)?;

        // Classify and insert intra-partition edges
        let (intra_edges, _) = Self::classify_edges(graph, &node_to_partition);
        if let Some(edges) = intra_edges.get(partition_id) {
            conn.insert_edges(edges)?;
        }

        Ok(())
    }

    /// Get unique files from a graph.
    ///
    /// Useful for determining which files are in a partition.
    pub fn get_unique_files(graph: &PetCodeGraph) -> HashSet<String> {
        graph
            .iter_nodes()
            .filter(|n| !n.file.is_empty())
            .map(|n| n.file.clone())
            .collect()
    }
}
