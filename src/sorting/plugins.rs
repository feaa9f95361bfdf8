use std::rc::Rc;

use petgraph::{
    Graph,
    graph::NodeIndex,
    visit::EdgeRef,
};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

use crate::{
    EdgeType, Plugin, logging,
    metadata::{File, Group, PluginMetadata},
    sorting::{
        error::{CyclicInteractionError, PathfindingError, SortingError},
        groups::{GroupsGraph, sorted_group_nodes},
    },
};

use super::{
    dfs::{BidirBfsVisitor, bidirectional_bfs, find_cycle},
    validate::{validate_plugin_groups, validate_specific_and_hardcoded_edges},
};

/// The slice of a plugin's data and metadata that sorting reads.
pub(crate) trait SortingPlugin {
    fn name(&self) -> &str;
    fn is_master(&self) -> bool;
    fn is_blueprint_plugin(&self) -> bool;
    fn is_light_plugin(&self) -> bool;
    fn is_medium_plugin(&self) -> bool;
    fn masters(&self) -> Vec<String>;
    fn override_record_count(&self) -> usize;
    fn asset_count(&self) -> usize;
    fn do_records_overlap(&self, other: &Self) -> bool;

    /// Count the records in the overlap between the two plugins that this
    /// plugin overrides rather than owns.
    fn overlap_override_count(&self, other: &Self) -> usize;
}

impl SortingPlugin for Plugin {
    fn name(&self) -> &str {
        self.name()
    }

    fn is_master(&self) -> bool {
        self.is_master()
    }

    fn is_blueprint_plugin(&self) -> bool {
        self.is_blueprint_plugin()
    }

    fn is_light_plugin(&self) -> bool {
        self.is_light_plugin()
    }

    fn is_medium_plugin(&self) -> bool {
        self.is_medium_plugin()
    }

    fn masters(&self) -> Vec<String> {
        self.masters().to_vec()
    }

    fn override_record_count(&self) -> usize {
        self.override_record_count()
    }

    fn asset_count(&self) -> usize {
        self.asset_count()
    }

    fn do_records_overlap(&self, other: &Self) -> bool {
        self.do_records_overlap(other)
    }

    fn overlap_override_count(&self, other: &Self) -> usize {
        let own_name = self.name().to_lowercase();
        self.form_ids()
            .filter(|id| id.source.as_ref() != own_name)
            .filter(|id| other.form_ids().any(|other_id| other_id == *id))
            .count()
    }
}

/// The partitions that plugins sort within. Partitions load in the order
/// they are declared in here.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
enum Partition {
    FullMaster,
    Medium,
    Light,
    NonMaster,
    BlueprintMaster,
}

#[derive(Debug)]
pub(crate) struct PluginSortingData<'a, T: SortingPlugin> {
    plugin: &'a T,
    partition: Partition,
    override_record_count: usize,

    load_order_index: usize,

    group: Box<str>,
    masterlist_load_after: Box<[String]>,
    user_load_after: Box<[String]>,
    masterlist_req: Box<[String]>,
    user_req: Box<[String]>,
}

impl<'a, T: SortingPlugin> PluginSortingData<'a, T> {
    pub(crate) fn new(
        plugin: &'a T,
        masterlist_metadata: Option<&PluginMetadata>,
        user_metadata: Option<&PluginMetadata>,
        load_order_index: usize,
    ) -> Self {
        Self {
            plugin,
            partition: partition_of(plugin),
            override_record_count: plugin.override_record_count(),
            load_order_index,
            group: user_metadata
                .and_then(|m| m.group())
                .or_else(|| masterlist_metadata.and_then(|m| m.group()))
                .unwrap_or(Group::DEFAULT_NAME)
                .into(),
            masterlist_load_after: masterlist_metadata
                .map(|m| to_filenames(m.load_after_files()))
                .unwrap_or_default(),
            user_load_after: user_metadata
                .map(|m| to_filenames(m.load_after_files()))
                .unwrap_or_default(),
            masterlist_req: masterlist_metadata
                .map(|m| to_filenames(m.requirements()))
                .unwrap_or_default(),
            user_req: user_metadata
                .map(|m| to_filenames(m.requirements()))
                .unwrap_or_default(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        self.plugin.name()
    }

    pub(crate) fn group(&self) -> &str {
        &self.group
    }

    pub(crate) fn masters(&self) -> Vec<String> {
        self.plugin.masters()
    }

    pub(crate) fn masterlist_load_after(&self) -> &[String] {
        &self.masterlist_load_after
    }

    pub(crate) fn user_load_after(&self) -> &[String] {
        &self.user_load_after
    }

    pub(crate) fn masterlist_requirements(&self) -> &[String] {
        &self.masterlist_req
    }

    pub(crate) fn user_requirements(&self) -> &[String] {
        &self.user_req
    }

    fn asset_count(&self) -> usize {
        self.plugin.asset_count()
    }

    fn do_records_overlap(&self, other: &Self) -> bool {
        self.plugin.do_records_overlap(other.plugin)
    }

    fn overlap_override_count(&self, other: &Self) -> usize {
        self.plugin.overlap_override_count(other.plugin)
    }
}

fn partition_of<T: SortingPlugin>(plugin: &T) -> Partition {
    if plugin.is_master() && plugin.is_blueprint_plugin() {
        Partition::BlueprintMaster
    } else if plugin.is_light_plugin() {
        Partition::Light
    } else if plugin.is_medium_plugin() {
        Partition::Medium
    } else if plugin.is_master() {
        Partition::FullMaster
    } else {
        Partition::NonMaster
    }
}

fn to_filenames(files: &[File]) -> Box<[String]> {
    files.iter().map(|f| f.name().as_str().to_owned()).collect()
}

/// Calculate a load order for the given plugins.
///
/// Plugins are partitioned by type, each partition is sorted separately, and
/// the sorted partitions are concatenated: full masters, then medium
/// plugins, then light plugins, then non-masters, with blueprint masters
/// last. Edges that would link plugins across partitions are effectively
/// ignored, after first validating that the non-overridable data sources
/// don't contradict the partitioning.
pub(crate) fn sort_plugins<T: SortingPlugin>(
    mut plugins_sorting_data: Vec<PluginSortingData<'_, T>>,
    groups_graph: &GroupsGraph,
    early_loading_plugins: &[String],
) -> Result<Vec<String>, SortingError> {
    if plugins_sorting_data.is_empty() {
        return Ok(Vec::new());
    }

    validate_plugin_groups(&plugins_sorting_data, groups_graph)?;

    // Sort the plugins by name so that the vertex iteration order, which can
    // affect which edges get added and so the final result, is consistent
    // for the same input data regardless of the current load order.
    plugins_sorting_data.sort_by(|a, b| a.name().cmp(b.name()));

    let mut partitions: Vec<(Partition, Vec<PluginSortingData<'_, T>>)> = [
        Partition::FullMaster,
        Partition::Medium,
        Partition::Light,
        Partition::NonMaster,
        Partition::BlueprintMaster,
    ]
    .into_iter()
    .map(|p| (p, Vec::new()))
    .collect();

    for plugin in plugins_sorting_data {
        if let Some((_, bucket)) = partitions.iter_mut().find(|(p, _)| *p == plugin.partition)
        {
            bucket.push(plugin);
        }
    }

    let masters: Vec<_> = partitions
        .iter()
        .filter(|(p, _)| {
            matches!(
                *p,
                Partition::FullMaster | Partition::Medium | Partition::Light
            )
        })
        .flat_map(|(_, bucket)| bucket.iter())
        .collect();
    let blueprint_masters: Vec<_> = partitions
        .iter()
        .filter(|(p, _)| *p == Partition::BlueprintMaster)
        .flat_map(|(_, bucket)| bucket.iter())
        .collect();
    let non_masters: Vec<_> = partitions
        .iter()
        .filter(|(p, _)| *p == Partition::NonMaster)
        .flat_map(|(_, bucket)| bucket.iter())
        .collect();

    validate_specific_and_hardcoded_edges(
        &masters,
        &blueprint_masters,
        &non_masters,
        early_loading_plugins,
    )?;

    let mut load_order = Vec::new();
    for (_, bucket) in partitions {
        let partition_order =
            sort_plugins_partition(bucket, groups_graph, early_loading_plugins)?;
        load_order.extend(partition_order);
    }

    Ok(load_order)
}

fn sort_plugins_partition<T: SortingPlugin>(
    plugins_sorting_data: Vec<PluginSortingData<'_, T>>,
    groups_graph: &GroupsGraph,
    early_loading_plugins: &[String],
) -> Result<Vec<String>, SortingError> {
    if plugins_sorting_data.is_empty() {
        return Ok(Vec::new());
    }

    let mut graph = PluginsGraph::new();

    for plugin in plugins_sorting_data {
        graph.add_node(plugin);
    }

    graph.add_specific_edges();
    graph.add_early_loading_plugin_edges(early_loading_plugins);

    // Check for cycles now because from this point on edges are only added
    // if they don't cause cycles, and adding overlap and tie-break edges is
    // relatively slow, so checking now gives quicker feedback.
    graph.check_for_cycles()?;

    graph.add_group_edges(groups_graph);
    graph.add_overlap_edges();
    graph.add_tie_break_edges()?;

    // Check again in case a bug let a cycle in; the check is cheap.
    graph.check_for_cycles()?;

    let sorted_nodes = graph.topological_sort()?;

    if let Some((first, second)) = graph.find_missing_hamiltonian_edge(&sorted_nodes) {
        logging::error!(
            "The path is not unique. No edge exists between {} and {}",
            graph[first].name(),
            graph[second].name()
        );
    }

    let sorted_plugin_names = sorted_nodes
        .into_iter()
        .map(|i| graph[i].name().to_owned())
        .collect();

    Ok(sorted_plugin_names)
}

type InnerPluginsGraph<'a, T> = Graph<Rc<PluginSortingData<'a, T>>, EdgeType>;

#[derive(Debug)]
struct PluginsGraph<'a, T: SortingPlugin> {
    // The sorting data is behind Rc so that a node's data can be held onto
    // while the graph is mutated.
    inner: InnerPluginsGraph<'a, T>,
    paths_cache: HashMap<NodeIndex, HashSet<NodeIndex>>,
}

impl<'a, T: SortingPlugin> PluginsGraph<'a, T> {
    fn new() -> Self {
        Self {
            inner: Graph::default(),
            paths_cache: HashMap::default(),
        }
    }

    fn add_node(&mut self, plugin: PluginSortingData<'a, T>) -> NodeIndex {
        self.inner.add_node(Rc::new(plugin))
    }

    fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, edge_type: EdgeType) {
        if self.is_path_cached(from, to) {
            return;
        }

        logging::debug!(
            "Adding {} edge from \"{}\" to \"{}\".",
            edge_type,
            self.inner[from].name(),
            self.inner[to].name()
        );

        self.inner.add_edge(from, to, edge_type);

        self.cache_path(from, to);
    }

    fn node_indices(&self) -> petgraph::graph::NodeIndices {
        self.inner.node_indices()
    }

    fn node_index_by_name(&self, name: &str) -> Option<NodeIndex> {
        self.node_indices()
            .find(|i| unicase::eq(self.inner[*i].name(), name))
    }

    /// Add the edges that come from plugin data and non-group metadata:
    /// masters, and masterlist and userlist load-after and requirement
    /// entries.
    fn add_specific_edges(&mut self) {
        logging::trace!("Adding edges based on plugin data and non-group metadata...");

        for node_index in self.node_indices().collect::<Vec<_>>() {
            let plugin = Rc::clone(&self.inner[node_index]);

            for master in plugin.masters() {
                if let Some(other_node_index) = self.node_index_by_name(&master) {
                    self.add_edge(other_node_index, node_index, EdgeType::Master);
                }
            }

            for file in plugin.masterlist_requirements() {
                if let Some(other_node_index) = self.node_index_by_name(file) {
                    self.add_edge(other_node_index, node_index, EdgeType::MasterlistRequirement);
                }
            }

            for file in plugin.user_requirements() {
                if let Some(other_node_index) = self.node_index_by_name(file) {
                    self.add_edge(other_node_index, node_index, EdgeType::UserRequirement);
                }
            }

            for file in plugin.masterlist_load_after() {
                if let Some(other_node_index) = self.node_index_by_name(file) {
                    self.add_edge(other_node_index, node_index, EdgeType::MasterlistLoadAfter);
                }
            }

            for file in plugin.user_load_after() {
                if let Some(other_node_index) = self.node_index_by_name(file) {
                    self.add_edge(other_node_index, node_index, EdgeType::UserLoadAfter);
                }
            }
        }
    }

    /// Lay the game's hardcoded plugins down as a chain that everything else
    /// loads after.
    fn add_early_loading_plugin_edges(&mut self, early_loading_plugins: &[String]) {
        logging::trace!(
            "Adding edges for implicitly active plugins and plugins with hardcoded positions..."
        );

        if early_loading_plugins.is_empty() {
            return;
        }

        let mut early_loader_indices = Vec::new();
        let mut other_plugin_indices = Vec::new();
        for node_index in self.node_indices() {
            let plugin = &self.inner[node_index];
            if let Some(i) = early_loading_plugins
                .iter()
                .position(|e| unicase::eq(e.as_str(), plugin.name()))
            {
                early_loader_indices.push((i, node_index));
            } else {
                other_plugin_indices.push(node_index);
            }
        }

        early_loader_indices.sort_by_key(|e| e.0);

        for window in early_loader_indices.windows(2) {
            if let [(_, from_index), (_, to_index)] = *window {
                self.add_edge(from_index, to_index, EdgeType::Hardcoded);
            }
        }

        if let Some((_, from_index)) = early_loader_indices.last() {
            for to_index in other_plugin_indices {
                self.add_edge(*from_index, to_index, EdgeType::Hardcoded);
            }
        }
    }

    fn check_for_cycles(&mut self) -> Result<(), CyclicInteractionError> {
        if let Some(cycle) = find_cycle(&self.inner, |node| node.name().to_owned()) {
            Err(CyclicInteractionError::new(cycle))
        } else {
            Ok(())
        }
    }

    /// Add edges between the plugins of groups that are ordered relative to
    /// one another by the groups graph.
    ///
    /// Unlike the edge sources above, group edges may be skipped: if linking
    /// two plugins would contradict the graph built so far, the edge is
    /// dropped with a warning rather than treated as a cycle.
    fn add_group_edges(&mut self, groups_graph: &GroupsGraph) {
        logging::trace!("Adding edges based on plugin group memberships...");

        let mut plugins_in_groups: HashMap<Box<str>, Vec<NodeIndex>> = HashMap::default();
        for node in self.node_indices() {
            let group_name: Box<str> = self.inner[node].group().into();
            plugins_in_groups.entry(group_name).or_default().push(node);
        }

        // Walk the groups graph from each vertex in turn, roots first. The
        // walk tracks whether any user-defined group edge was crossed so
        // that the plugin edges it adds carry the right provenance.
        for start in sorted_group_nodes(groups_graph) {
            let mut stack: Vec<(NodeIndex, bool)> = vec![(start, false)];
            let mut visited = HashSet::default();
            visited.insert(start);

            while let Some((current, through_user_edge)) = stack.pop() {
                for edge in groups_graph.edges(current) {
                    let target = edge.target();
                    if !visited.insert(target) {
                        continue;
                    }

                    let is_user_edge =
                        through_user_edge || *edge.weight() == EdgeType::UserLoadAfter;

                    self.add_group_plugin_edges(
                        &plugins_in_groups,
                        groups_graph[start].as_ref(),
                        groups_graph[target].as_ref(),
                        is_user_edge,
                    );

                    stack.push((target, is_user_edge));
                }
            }
        }
    }

    fn add_group_plugin_edges(
        &mut self,
        plugins_in_groups: &HashMap<Box<str>, Vec<NodeIndex>>,
        from_group: &str,
        to_group: &str,
        is_user_edge: bool,
    ) {
        let edge_type = if is_user_edge {
            EdgeType::UserGroup
        } else {
            EdgeType::MasterlistGroup
        };

        let from_plugins = plugins_in_groups
            .get(from_group)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let to_plugins = plugins_in_groups
            .get(to_group)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for from_index in from_plugins {
            for to_index in to_plugins {
                if self.is_path_cached(*from_index, *to_index) {
                    continue;
                }

                if self.path_exists(*to_index, *from_index) {
                    logging::warning!(
                        "Skipping a {} edge from \"{}\" to \"{}\" as it would create a cycle.",
                        edge_type,
                        self.inner[*from_index].name(),
                        self.inner[*to_index].name()
                    );
                    continue;
                }

                self.add_edge(*from_index, *to_index, edge_type);
            }
        }
    }

    /// Add edges between plugins that change the same records.
    ///
    /// Overlapping plugins are ordered so that the plugin that overrides
    /// more of the overlap loads later; ties fall back to the total override
    /// record count, then the asset count, then the name.
    fn add_overlap_edges(&mut self) {
        logging::trace!("Adding edges for overlapping plugins...");

        let mut node_index_iter = self.node_indices();
        while let Some(node_index) = node_index_iter.next() {
            let plugin = Rc::clone(&self.inner[node_index]);

            if plugin.override_record_count == 0 && plugin.asset_count() == 0 {
                logging::debug!(
                    "Skipping vertex for \"{}\": the plugin contains no override records and loads no assets",
                    plugin.name()
                );
                continue;
            }

            for other_node_index in node_index_iter.clone() {
                let other_plugin = Rc::clone(&self.inner[other_node_index]);

                // Don't add an edge between these two plugins if one already
                // exists; only direct edges are checked for efficiency.
                if self.inner.contains_edge(node_index, other_node_index)
                    || self.inner.contains_edge(other_node_index, node_index)
                {
                    continue;
                }

                if !plugin.do_records_overlap(&other_plugin) {
                    continue;
                }

                let plugin_rank = (
                    plugin.overlap_override_count(&other_plugin),
                    plugin.override_record_count,
                    plugin.asset_count(),
                );
                let other_rank = (
                    other_plugin.overlap_override_count(&plugin),
                    other_plugin.override_record_count,
                    other_plugin.asset_count(),
                );

                let (loads_first, loads_later, edge_type) = if plugin_rank < other_rank {
                    let edge_type = overlap_edge_type(plugin_rank, other_rank);
                    (node_index, other_node_index, edge_type)
                } else if other_rank < plugin_rank {
                    let edge_type = overlap_edge_type(other_rank, plugin_rank);
                    (other_node_index, node_index, edge_type)
                } else if plugin.name() < other_plugin.name() {
                    (node_index, other_node_index, EdgeType::RecordOverlap)
                } else {
                    (other_node_index, node_index, EdgeType::RecordOverlap)
                };

                if self.is_path_cached(loads_first, loads_later) {
                    continue;
                }

                if self.path_exists(loads_later, loads_first) {
                    logging::debug!(
                        "Skipping {} edge from \"{}\" to \"{}\" as it would create a cycle.",
                        edge_type,
                        self.inner[loads_first].name(),
                        self.inner[loads_later].name()
                    );
                    continue;
                }

                self.add_edge(loads_first, loads_later, edge_type);
            }
        }
    }

    /// Make the topological sort unambiguous by ordering every pair of
    /// plugins that nothing else orders.
    ///
    /// The current load order supplies the direction of these edges, so a
    /// load order that already satisfies every constraint sorts to itself
    /// and sorting is idempotent. Where the graph already orders a
    /// consecutive pair the other way round, the plugins on the connecting
    /// path are instead anchored one by one into the order being built,
    /// each as late as its constraints allow.
    fn add_tie_break_edges(&mut self) -> Result<(), PathfindingError> {
        logging::trace!("Adding edges to break ties between plugins...");

        let mut nodes: Vec<_> = self.node_indices().collect();
        nodes.sort_by_key(|n| self.inner[*n].load_order_index);

        // The prefix of the eventual result whose relative order is already
        // fixed. Anchoring works against this rather than against `nodes`,
        // so that plugins moved by earlier conflicts are accounted for.
        let mut settled: Vec<NodeIndex> = Vec::new();
        let mut is_settled: HashSet<NodeIndex> = HashSet::default();

        let mut pairs = nodes.windows(2);
        while let Some(&[earlier, later]) = pairs.next() {
            let Some(mut conflict_path) = self.find_path(later, earlier)? else {
                // Nothing forces later before earlier, so their current
                // relative order can be kept.
                self.add_edge(earlier, later, EdgeType::TieBreak);

                if is_settled.insert(earlier) {
                    settled.push(earlier);
                } else if settled.last() != Some(&earlier) {
                    // earlier sits mid-way through the settled prefix, so
                    // later must be anchored explicitly or its position
                    // relative to the plugins after earlier would stay
                    // ambiguous.
                    self.anchor_node(later, &mut settled, &mut is_settled, 0);
                }
                continue;
            };

            // The graph already forces later to load before earlier.
            if Some(&earlier) == nodes.first() {
                // Nothing is settled yet to anchor against, so the whole
                // conflict path becomes the start of the settled prefix.
                logging::debug!(
                    "\"{}\" must load after \"{}\", starting the new load order with the path between them",
                    self.inner[earlier].name(),
                    self.inner[later].name()
                );

                for node in conflict_path {
                    if is_settled.insert(node) {
                        settled.push(node);
                    }
                }
                continue;
            }

            // earlier ends the conflict path; anchor the rest of the path
            // first and then append earlier itself.
            conflict_path.pop();

            let mut floor = 0;
            for node in conflict_path {
                floor = self.anchor_node(node, &mut settled, &mut is_settled, floor);
            }

            if is_settled.insert(earlier) {
                settled.push(earlier);
            }
        }

        Ok(())
    }

    /// Splice a plugin into the settled prefix at the latest position its
    /// constraints allow, adding tie-break edges to its new neighbours.
    ///
    /// `floor` is an index into `settled` below which the plugin is already
    /// known to belong; the position search stops there. Returns the floor
    /// for the next plugin along the same conflict path, which cannot end
    /// up any earlier than this one.
    fn anchor_node(
        &mut self,
        node: NodeIndex,
        settled: &mut Vec<NodeIndex>,
        is_settled: &mut HashSet<NodeIndex>,
        floor: usize,
    ) -> usize {
        if !is_settled.insert(node) {
            logging::debug!(
                "\"{}\" already has a settled position, leaving it alone",
                self.inner[node].name()
            );
            return floor;
        }

        // Walk back from the end of the settled prefix to the latest plugin
        // that this one is not ordered before. Looking for the latest one
        // it is ordered *after* would also be correct, but tends to walk
        // further.
        let mut anchor = None;
        for candidate in (floor..settled.len()).rev() {
            let Some(candidate_node) = settled.get(candidate).copied() else {
                continue;
            };

            if !self.path_exists(node, candidate_node) {
                anchor = Some(candidate);
                break;
            }
        }

        let position = match anchor {
            Some(anchor) => {
                if let Some(preceding) = settled.get(anchor) {
                    self.add_edge(*preceding, node, EdgeType::TieBreak);
                }
                anchor + 1
            }
            None => floor,
        };

        if let Some(following) = settled.get(position) {
            self.add_edge(node, *following, EdgeType::TieBreak);
        }

        logging::debug!(
            "Settling \"{}\" at position {position} of the new load order",
            self.inner[node].name()
        );

        settled.insert(position, node);

        // The next plugin along the conflict path loads after this one, so
        // its search can start past the position just taken.
        position + 1
    }

    fn topological_sort(&self) -> Result<Vec<NodeIndex>, SortingError> {
        petgraph::algo::toposort(&self.inner, None)
            .map_err(|e| SortingError::CycleInvolving(self.inner[e.node_id()].name().to_owned()))
    }

    /// Returns the first pair of consecutive nodes that don't have an edge
    /// joining them, if any. A fully tie-broken graph has none.
    fn find_missing_hamiltonian_edge(
        &self,
        path: &[NodeIndex],
    ) -> Option<(NodeIndex, NodeIndex)> {
        logging::trace!("Checking uniqueness of path through plugin graph...");

        path.windows(2).find_map(|slice| match *slice {
            [a, b] if !self.inner.contains_edge(a, b) => Some((a, b)),
            _ => None,
        })
    }

    fn cache_path(&mut self, from: NodeIndex, to: NodeIndex) {
        self.paths_cache.entry(from).or_default().insert(to);
    }

    fn is_path_cached(&self, from: NodeIndex, to: NodeIndex) -> bool {
        self.paths_cache.get(&from).is_some_and(|s| s.contains(&to))
    }

    fn path_exists(&mut self, from: NodeIndex, to: NodeIndex) -> bool {
        if self.is_path_cached(from, to) {
            return true;
        }

        let mut trace = SearchTrace::default();
        let found = bidirectional_bfs(&self.inner, from, to, &mut trace);

        self.absorb_trace(from, to, &trace, found);

        found
    }

    /// Fold what a finished search learned into the reachability cache:
    /// every node its forward half reached is reachable from `from`, and
    /// `to` is reachable from every node its reverse half reached.
    fn absorb_trace(&mut self, from: NodeIndex, to: NodeIndex, trace: &SearchTrace, found: bool) {
        for reached in trace.predecessors.keys() {
            self.cache_path(from, *reached);
        }

        for origin in trace.successors.keys() {
            self.cache_path(*origin, to);
        }

        if found {
            self.cache_path(from, to);
        }
    }

    fn find_path(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
    ) -> Result<Option<Vec<NodeIndex>>, PathfindingError> {
        let mut trace = SearchTrace::default();
        let found = bidirectional_bfs(&self.inner, from, to, &mut trace);

        self.absorb_trace(from, to, &trace, found);

        let Some(meeting_node) = trace.meeting_node.filter(|_| found) else {
            return Ok(None);
        };

        // The two search halves met somewhere along the path, so stitch the
        // full path together by walking the trace's links out from the
        // meeting node in both directions.
        let mut leading = Vec::new();
        let mut node = meeting_node;
        while node != from {
            match trace.predecessors.get(&node) {
                Some(previous) => {
                    leading.push(*previous);
                    node = *previous;
                }
                None => {
                    logging::error!(
                        "The search trace records no link back from \"{}\"",
                        self.inner[node].name()
                    );
                    return Err(PathfindingError::PrecedingNodeNotFound(
                        self.inner[node].name().to_owned(),
                    ));
                }
            }
        }

        let mut path: Vec<_> = leading.into_iter().rev().collect();
        path.push(meeting_node);

        let mut node = meeting_node;
        while node != to {
            match trace.successors.get(&node) {
                Some(next) => {
                    path.push(*next);
                    node = *next;
                }
                None => {
                    logging::error!(
                        "The search trace records no link onwards from \"{}\"",
                        self.inner[node].name()
                    );
                    return Err(PathfindingError::FollowingNodeNotFound(
                        self.inner[node].name().to_owned(),
                    ));
                }
            }
        }

        Ok(Some(path))
    }
}

/// What a bidirectional search saw, recorded passively: the link each node
/// was discovered through, and the node where the two halves met. This is
/// both enough to rebuild the found path and to tell which nodes either
/// half of the search reached.
#[derive(Debug, Default)]
struct SearchTrace {
    /// For each node the forward half discovered, the node it was reached
    /// from.
    predecessors: HashMap<NodeIndex, NodeIndex>,
    /// For each node the reverse half discovered, the node it leads to.
    successors: HashMap<NodeIndex, NodeIndex>,
    meeting_node: Option<NodeIndex>,
}

impl BidirBfsVisitor for SearchTrace {
    fn visit_forward_bfs_edge(&mut self, source: NodeIndex, target: NodeIndex) {
        self.predecessors.insert(target, source);
    }

    fn visit_reverse_bfs_edge(&mut self, source: NodeIndex, target: NodeIndex) {
        self.successors.insert(source, target);
    }

    fn visit_intersection_node(&mut self, node: NodeIndex) {
        self.meeting_node = Some(node);
    }
}

fn overlap_edge_type(
    smaller: (usize, usize, usize),
    larger: (usize, usize, usize),
) -> EdgeType {
    // Whether the decision came from record counts or only asset counts.
    if smaller.0 == larger.0 && smaller.1 == larger.1 {
        EdgeType::AssetOverlap
    } else {
        EdgeType::RecordOverlap
    }
}

impl<'a, T: SortingPlugin> std::ops::Index<NodeIndex> for PluginsGraph<'a, T> {
    type Output = Rc<PluginSortingData<'a, T>>;

    fn index(&self, index: NodeIndex) -> &Self::Output {
        &self.inner[index]
    }
}


