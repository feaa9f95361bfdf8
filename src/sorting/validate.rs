use std::collections::HashSet;

use unicase::UniCase;

use crate::{
    EdgeType, Vertex, logging,
    sorting::error::{CyclicInteractionError, UndefinedGroupError},
};

use super::{
    groups::GroupsGraph,
    plugins::{PluginSortingData, SortingPlugin},
};

pub(super) fn validate_plugin_groups<T: SortingPlugin>(
    plugins_sorting_data: &[PluginSortingData<'_, T>],
    groups_graph: &GroupsGraph,
) -> Result<(), UndefinedGroupError> {
    let group_names: HashSet<&str> = groups_graph
        .node_indices()
        .map(|i| groups_graph[i].as_ref())
        .collect();

    for plugin in plugins_sorting_data {
        if !group_names.contains(plugin.group()) {
            return Err(UndefinedGroupError::new(plugin.group().to_owned()));
        }
    }

    Ok(())
}

/// Check that the data used to build the non-overridable edges cannot
/// contradict the partitioning of plugins into masters, blueprint masters and
/// non-masters. A contradiction would be an unresolvable cycle, so it is
/// reported as one before any graph is built.
pub(super) fn validate_specific_and_hardcoded_edges<T: SortingPlugin>(
    masters: &[&PluginSortingData<'_, T>],
    blueprint_masters: &[&PluginSortingData<'_, T>],
    non_masters: &[&PluginSortingData<'_, T>],
    early_loading_plugins: &[String],
) -> Result<(), CyclicInteractionError> {
    logging::trace!("Validating specific and early-loading plugin edges...");

    let non_masters_set: HashSet<UniCase<&str>> =
        non_masters.iter().map(|p| UniCase::new(p.name())).collect();
    let blueprint_masters_set: HashSet<UniCase<&str>> = blueprint_masters
        .iter()
        .map(|p| UniCase::new(p.name()))
        .collect();

    for master in masters {
        validate_plugin(master, &non_masters_set, &blueprint_masters_set)?;
    }

    // Pass an empty set of non-masters so that the non-masters don't get
    // validated against themselves.
    let empty_set = HashSet::new();
    for plugin in non_masters {
        validate_plugin(plugin, &empty_set, &blueprint_masters_set)?;
    }

    validate_early_loading_plugins(early_loading_plugins, masters, &non_masters_set)?;

    Ok(())
}

fn validate_plugin<T: SortingPlugin>(
    plugin: &PluginSortingData<'_, T>,
    non_masters: &HashSet<UniCase<&str>>,
    blueprint_masters: &HashSet<UniCase<&str>>,
) -> Result<(), CyclicInteractionError> {
    for master in plugin.masters() {
        let key = UniCase::new(master.as_str());
        if non_masters.contains(&key) {
            return Err(CyclicInteractionError::new(vec![
                Vertex::new(master.clone()).with_out_edge_type(EdgeType::Master),
                Vertex::new(plugin.name().to_owned()).with_out_edge_type(EdgeType::MasterFlag),
            ]));
        }

        if blueprint_masters.contains(&key) {
            // The game ignores this master, and the issue can't be fixed
            // without editing the plugin, so warn instead of erroring.
            logging::warning!(
                "The plugin \"{}\" has the blueprint master \"{}\" as one of its masters",
                plugin.name(),
                master
            );
        }
    }

    validate_files(
        plugin.masterlist_requirements(),
        plugin.name(),
        non_masters,
        blueprint_masters,
        EdgeType::MasterlistRequirement,
    )?;

    validate_files(
        plugin.user_requirements(),
        plugin.name(),
        non_masters,
        blueprint_masters,
        EdgeType::UserRequirement,
    )?;

    validate_files(
        plugin.masterlist_load_after(),
        plugin.name(),
        non_masters,
        blueprint_masters,
        EdgeType::MasterlistLoadAfter,
    )?;

    validate_files(
        plugin.user_load_after(),
        plugin.name(),
        non_masters,
        blueprint_masters,
        EdgeType::UserLoadAfter,
    )?;

    Ok(())
}

fn validate_files(
    files: &[String],
    plugin_name: &str,
    non_masters: &HashSet<UniCase<&str>>,
    blueprint_masters: &HashSet<UniCase<&str>>,
    edge_type: EdgeType,
) -> Result<(), CyclicInteractionError> {
    for file in files {
        let key = UniCase::new(file.as_str());
        if non_masters.contains(&key) {
            return Err(CyclicInteractionError::new(vec![
                Vertex::new(file.clone()).with_out_edge_type(edge_type),
                Vertex::new(plugin_name.to_owned()).with_out_edge_type(EdgeType::MasterFlag),
            ]));
        }

        if blueprint_masters.contains(&key) {
            return Err(CyclicInteractionError::new(vec![
                Vertex::new(file.clone()).with_out_edge_type(edge_type),
                Vertex::new(plugin_name.to_owned()).with_out_edge_type(EdgeType::BlueprintMaster),
            ]));
        }
    }

    Ok(())
}

fn validate_early_loading_plugins<T: SortingPlugin>(
    early_loading_plugins: &[String],
    masters: &[&PluginSortingData<'_, T>],
    non_masters: &HashSet<UniCase<&str>>,
) -> Result<(), CyclicInteractionError> {
    if let Some(master) = masters.first() {
        for plugin in early_loading_plugins {
            let key = UniCase::new(plugin.as_str());
            if non_masters.contains(&key) {
                // Just report the cycle against the first master.
                return Err(CyclicInteractionError::new(vec![
                    Vertex::new(plugin.clone()).with_out_edge_type(EdgeType::Hardcoded),
                    Vertex::new(master.name().to_owned()).with_out_edge_type(EdgeType::MasterFlag),
                ]));
            }
        }
    }

    Ok(())
}
