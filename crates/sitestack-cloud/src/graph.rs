//! Dependency graph over declared resources

use crate::error::{CloudError, Result};
use crate::provider::ResourceSet;
use crate::state::GlobalState;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Directed acyclic graph of resource keys
///
/// An edge `a -> b` means `a` reads an attribute of `b` (or declares an
/// explicit dependency on it), so `b` must be realized first.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph of a desired resource set
    ///
    /// Every reference must point at a declared resource.
    pub fn from_resources(resources: &ResourceSet) -> Result<Self> {
        let mut graph = Self::new();
        for resource in resources.iter() {
            let key = resource.key();
            let deps = resource.dependencies()?;
            for dep in &deps {
                if !resources.contains_key(dep) {
                    return Err(CloudError::UnknownReference {
                        from: key,
                        to: dep.clone(),
                    });
                }
            }
            graph.add_node(key, deps);
        }
        graph.waves()?;
        Ok(graph)
    }

    /// Build the graph of realized resources from state
    ///
    /// Dependencies that are no longer in state are ignored.
    pub fn from_state(state: &GlobalState) -> Self {
        let mut graph = Self::new();
        for (key, resource) in &state.resources {
            let deps = resource
                .depends_on
                .iter()
                .filter(|d| state.resources.contains_key(*d))
                .cloned()
                .collect();
            graph.add_node(key.clone(), deps);
        }
        graph
    }

    pub fn add_node(&mut self, key: impl Into<String>, dependencies: BTreeSet<String>) {
        self.dependencies.insert(key.into(), dependencies);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.dependencies.contains_key(key)
    }

    /// Direct dependencies of a node
    pub fn dependencies(&self, key: &str) -> Vec<&str> {
        self.dependencies
            .get(key)
            .map(|deps| deps.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Direct dependents of a node
    pub fn dependents(&self, key: &str) -> Vec<&str> {
        self.dependencies
            .iter()
            .filter(|(_, deps)| deps.contains(key))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Whether `key` depends on `target`, directly or transitively
    pub fn depends_on(&self, key: &str, target: &str) -> bool {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&str> = self.dependencies(key).into_iter().collect();
        while let Some(current) = queue.pop_front() {
            if current == target {
                return true;
            }
            if seen.insert(current) {
                queue.extend(self.dependencies(current));
            }
        }
        false
    }

    /// Topological levels: every node appears after all of its dependencies,
    /// and nodes within one level are independent of each other.
    pub fn waves(&self) -> Result<Vec<Vec<String>>> {
        let mut remaining: BTreeMap<&str, usize> = self
            .dependencies
            .iter()
            .map(|(k, deps)| (k.as_str(), deps.len()))
            .collect();
        let mut waves = Vec::new();

        while !remaining.is_empty() {
            let ready: Vec<&str> = remaining
                .iter()
                .filter(|(_, count)| **count == 0)
                .map(|(k, _)| *k)
                .collect();

            if ready.is_empty() {
                let cycle: Vec<&str> = remaining.keys().copied().collect();
                return Err(CloudError::CircularDependency(cycle.join(", ")));
            }

            for key in &ready {
                remaining.remove(key);
                for dependent in self.dependents(key) {
                    if let Some(count) = remaining.get_mut(dependent) {
                        *count -= 1;
                    }
                }
            }

            waves.push(ready.into_iter().map(String::from).collect());
        }

        Ok(waves)
    }

    /// Flattened topological order
    pub fn order(&self) -> Result<Vec<String>> {
        Ok(self.waves()?.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ResourceConfig;
    use serde_json::json;

    fn site() -> ResourceSet {
        let mut set = ResourceSet::new();
        set.add(ResourceConfig::new("s3-bucket", "site", "aws", json!({})));
        set.add(ResourceConfig::new("oai", "site", "aws", json!({})));
        set.add(ResourceConfig::new(
            "s3-object",
            "index.html",
            "aws",
            json!({"bucket": {"Fn::GetAtt": ["s3-bucket:site", "id"]}}),
        ));
        set.add(ResourceConfig::new(
            "s3-bucket-policy",
            "site",
            "aws",
            json!({
                "bucket": {"Fn::GetAtt": ["s3-bucket:site", "id"]},
                "principal": {"Fn::GetAtt": ["oai:site", "iam_arn"]},
            }),
        ));
        set.add(ResourceConfig::new(
            "cloudfront-distribution",
            "site",
            "aws",
            json!({
                "origin": {"Fn::GetAtt": ["s3-bucket:site", "website_endpoint"]},
                "oai": {"Fn::GetAtt": ["oai:site", "cloudfront_access_identity_path"]},
            }),
        ));
        set
    }

    #[test]
    fn test_waves_respect_references() {
        let graph = DependencyGraph::from_resources(&site()).unwrap();
        let waves = graph.waves().unwrap();

        assert_eq!(waves.len(), 2);
        assert_eq!(waves[0], vec!["oai:site", "s3-bucket:site"]);
        assert!(waves[1].contains(&"s3-bucket-policy:site".to_string()));
        assert!(waves[1].contains(&"cloudfront-distribution:site".to_string()));
        assert!(waves[1].contains(&"s3-object:index.html".to_string()));
    }

    #[test]
    fn test_dependents_and_transitive_dependencies() {
        let graph = DependencyGraph::from_resources(&site()).unwrap();

        let mut dependents = graph.dependents("oai:site");
        dependents.sort();
        assert_eq!(
            dependents,
            vec!["cloudfront-distribution:site", "s3-bucket-policy:site"]
        );
        assert!(graph.depends_on("s3-bucket-policy:site", "oai:site"));
        assert!(!graph.depends_on("oai:site", "s3-bucket:site"));
    }

    #[test]
    fn test_unknown_reference_is_rejected() {
        let mut set = ResourceSet::new();
        set.add(ResourceConfig::new(
            "s3-object",
            "a.css",
            "aws",
            json!({"bucket": {"Fn::GetAtt": ["s3-bucket:missing", "id"]}}),
        ));

        let err = DependencyGraph::from_resources(&set).unwrap_err();
        assert!(matches!(err, CloudError::UnknownReference { .. }));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut set = ResourceSet::new();
        set.add(
            ResourceConfig::new("a", "x", "aws", json!({})).with_dependency("b:x"),
        );
        set.add(
            ResourceConfig::new("b", "x", "aws", json!({})).with_dependency("a:x"),
        );

        let err = DependencyGraph::from_resources(&set).unwrap_err();
        assert!(matches!(err, CloudError::CircularDependency(_)));
    }
}
