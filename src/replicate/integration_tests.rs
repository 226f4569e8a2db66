//! End-to-end replication scenarios

#[cfg(test)]
mod tests {
    use crate::coerce::StaticCatalog;
    use crate::graph::{AttributeValue, ComplexId, SourceLink};
    use crate::mapping::{
        AttributeMapping, CiMapping, FailurePolicy, LinkMapping, Mappings, Validator,
    };
    use crate::replicate::{ReplicationError, Replicator};
    use crate::source::{
        LinkProcessor, LinkProcessorError, MemorySourceSystem, SourceEntity, SourceEntityCache,
        SourceError, SourceSystem,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    fn catalog() -> Arc<StaticCatalog> {
        Arc::new(
            StaticCatalog::new()
                .with_attribute("host", "name", "string")
                .with_attribute("app", "name", "string")
                .with_attribute("instance", "name", "string")
                .with_attribute("instance", "port", "integer")
                .with_attribute("ip_address", "name", "string")
                .with_attribute("disk", "host", "string"),
        )
    }

    fn source() -> MemorySourceSystem {
        MemorySourceSystem::from_json(
            "inventory",
            json!({
                "host": [ { "id": "h1", "apps": ["a1"] } ],
                "app": [ { "id": "a1" } ],
                "instance": [ { "id": "i1", "app": "a1", "port": "8080" } ]
            }),
        )
        .unwrap()
    }

    fn ci_mappings() -> Vec<CiMapping> {
        vec![
            CiMapping::new("host", "host").with_attribute(AttributeMapping::field("name", "id")),
            CiMapping::new("app", "app")
                .with_attribute(AttributeMapping::field("name", "id"))
                .requiring_container(),
            CiMapping::new("instance", "instance")
                .with_attribute(AttributeMapping::field("name", "id"))
                .with_attribute(AttributeMapping::field("port", "port"))
                .requiring_relationship("runs_on", "app"),
        ]
    }

    fn composition() -> LinkMapping {
        LinkMapping::new("host", "host", "app", "app", "composition").with_processor("reference:apps")
    }

    fn runs_on() -> LinkMapping {
        LinkMapping::new("instance", "instance", "app", "app", "runs_on").with_processor("reference:app")
    }

    fn id(source_id: &str, source_type: &str) -> ComplexId {
        ComplexId::new(source_id, source_type, source_type)
    }

    fn replicator(mappings: Mappings) -> Replicator {
        Replicator::new(mappings, catalog())
    }

    // ================================================================
    // Dependency validation scenarios
    // ================================================================

    // === Scenario: host contains app, instance runs on app ===
    #[tokio::test]
    async fn full_chain_is_replicated() {
        let mappings = Mappings {
            ci_mappings: ci_mappings(),
            link_mappings: vec![composition(), runs_on()],
        };

        let result = replicator(mappings).replicate_topology(&source()).await.unwrap();
        let topology = &result.topology;

        assert_eq!(topology.ci_count(), 3);
        assert_eq!(topology.link_count(), 2);
        assert!(topology.has_link("composition", &id("h1", "host"), &id("a1", "app")));
        assert!(topology.has_link("runs_on", &id("i1", "instance"), &id("a1", "app")));

        let instance = topology.get(&id("i1", "instance")).unwrap();
        assert_eq!(instance.ci.attribute("port"), Some(&AttributeValue::Int(8080)));

        let app = topology.get(&id("a1", "app")).unwrap();
        assert_eq!(
            app.ci.attribute("root_container").and_then(|v| v.as_str()),
            Some("host: h1_host")
        );
        assert!(result.report.is_complete());
        assert_eq!(result.report.cis_discarded, 0);
    }

    // === Scenario: without the composition link only the host survives ===
    #[tokio::test]
    async fn missing_container_prunes_dependents_and_links() {
        let mappings = Mappings {
            ci_mappings: ci_mappings(),
            link_mappings: vec![runs_on()],
        };

        let result = replicator(mappings).replicate_topology(&source()).await.unwrap();
        let topology = &result.topology;

        assert_eq!(topology.ci_count(), 1);
        assert!(topology.contains(&id("h1", "host")));
        assert_eq!(topology.link_count(), 0);
        assert_eq!(result.report.cis_discarded, 2);
        assert_eq!(result.report.links_pruned, 1);
    }

    // === Scenario: a CI skipped by a validator takes its dependents with it ===
    #[tokio::test]
    async fn skipped_ci_breaks_dependency_chain() {
        let mut cis = ci_mappings();
        cis[1] = CiMapping::new("app", "app")
            .with_attribute(
                AttributeMapping::field("name", "label").with_validator(Validator::NotEmpty),
            )
            .requiring_container();
        let mappings = Mappings {
            ci_mappings: cis,
            link_mappings: vec![composition(), runs_on()],
        };

        let result = replicator(mappings).replicate_topology(&source()).await.unwrap();

        assert_eq!(result.report.cis_skipped, 1);
        assert_eq!(result.topology.ci_count(), 1);
        assert!(result.topology.contains(&id("h1", "host")));
        assert_eq!(result.topology.link_count(), 0);
    }

    // ================================================================
    // Failure policy scenarios
    // ================================================================

    // === Scenario: exclude_end1 removes an instance pointing at an unknown app ===
    #[tokio::test]
    async fn exclude_end1_removes_referencing_ci() {
        let source = source().with_records(
            "instance",
            vec![json!({ "id": "i2", "app": "a9" })],
        );
        let mut cis = ci_mappings();
        // Keep instances standalone so only the policy can remove them
        cis[2] = CiMapping::new("instance", "instance");
        let mappings = Mappings {
            ci_mappings: cis,
            link_mappings: vec![
                composition(),
                runs_on().with_failure_policy(FailurePolicy::ExcludeEnd1),
            ],
        };

        let result = replicator(mappings).replicate_topology(&source).await.unwrap();

        assert!(result.topology.contains(&id("i1", "instance")));
        assert!(!result.topology.contains(&id("i2", "instance")));
        assert_eq!(result.report.cis_excluded, 1);
        assert_eq!(result.report.links_dropped, 1);
    }

    // === Scenario: without a policy the dangling reference is only dropped ===
    #[tokio::test]
    async fn no_policy_keeps_both_ends() {
        let source = source().with_records(
            "instance",
            vec![json!({ "id": "i2", "app": "a9" })],
        );
        let mut cis = ci_mappings();
        cis[2] = CiMapping::new("instance", "instance");
        let mappings = Mappings {
            ci_mappings: cis,
            link_mappings: vec![composition(), runs_on()],
        };

        let result = replicator(mappings).replicate_topology(&source).await.unwrap();

        assert!(result.topology.contains(&id("i2", "instance")));
        assert_eq!(result.report.cis_excluded, 0);
        assert_eq!(result.report.links_dropped, 1);
    }

    // ================================================================
    // Link mapping failure scenarios
    // ================================================================

    // === Scenario: a link mapping over an unpopulated type fails alone ===
    #[tokio::test]
    async fn missing_source_type_fails_only_that_mapping() {
        let lun_link = LinkMapping::new("host", "host", "lun", "logical_volume", "usage")
            .with_processor("reference:luns");
        let mappings = Mappings {
            ci_mappings: ci_mappings(),
            link_mappings: vec![lun_link, composition(), runs_on()],
        };

        let result = replicator(mappings).replicate_topology(&source()).await.unwrap();

        assert_eq!(result.report.link_mapping_failures.len(), 1);
        assert!(result.report.link_mapping_failures[0].1.contains("lun"));
        assert_eq!(result.topology.ci_count(), 3);
        assert_eq!(result.topology.link_count(), 2);
    }

    // === Scenario: an unknown processor name fails only that mapping ===
    #[tokio::test]
    async fn unrecognized_processor_fails_only_that_mapping() {
        let mappings = Mappings {
            ci_mappings: ci_mappings(),
            link_mappings: vec![composition(), runs_on().with_processor("sql:select app")],
        };

        let result = replicator(mappings).replicate_topology(&source()).await.unwrap();

        assert!(!result.report.is_complete());
        assert!(result.report.link_mapping_failures[0]
            .1
            .contains("unrecognized link processor"));
        // The instance lost its runs_on link
        assert!(!result.topology.contains(&id("i1", "instance")));
        assert!(result.topology.contains(&id("a1", "app")));
    }

    // ================================================================
    // Source system scenarios
    // ================================================================

    struct UnreachableSource;

    #[async_trait]
    impl SourceSystem for UnreachableSource {
        fn id(&self) -> &str {
            "unreachable"
        }

        async fn get_cis(
            &self,
            _source_type: &str,
            _ci_mapping: &CiMapping,
            _mappings: &Mappings,
        ) -> Result<Vec<Arc<SourceEntity>>, SourceError> {
            Err(SourceError::Unavailable("connection refused".to_string()))
        }
    }

    // === Scenario: source failures surface to the caller ===
    #[tokio::test]
    async fn source_failure_aborts_replication() {
        let mappings = Mappings {
            ci_mappings: ci_mappings(),
            link_mappings: Vec::new(),
        };

        let err = replicator(mappings)
            .replicate_topology(&UnreachableSource)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReplicationError::Source { ref source_type, .. } if source_type == "host"
        ));
    }

    /// Links every instance to every app, regardless of record fields
    struct CrossProductProcessor;

    #[async_trait]
    impl LinkProcessor for CrossProductProcessor {
        async fn get_links(
            &self,
            cache: &SourceEntityCache,
        ) -> Result<Vec<SourceLink>, LinkProcessorError> {
            let instances = cache.get_ids_by_type("instance");
            let apps = cache.get_ids_by_type("app");
            Ok(instances
                .iter()
                .flat_map(|i| apps.iter().map(move |a| SourceLink::new(i.clone(), a.clone())))
                .collect())
        }
    }

    struct CustomLinkSource(MemorySourceSystem);

    #[async_trait]
    impl SourceSystem for CustomLinkSource {
        fn id(&self) -> &str {
            self.0.id()
        }

        async fn get_cis(
            &self,
            source_type: &str,
            ci_mapping: &CiMapping,
            mappings: &Mappings,
        ) -> Result<Vec<Arc<SourceEntity>>, SourceError> {
            self.0.get_cis(source_type, ci_mapping, mappings).await
        }

        fn create_link_processor(&self, link_mapping: &LinkMapping) -> Option<Box<dyn LinkProcessor>> {
            (link_mapping.target_type == "runs_on")
                .then(|| Box::new(CrossProductProcessor) as Box<dyn LinkProcessor>)
        }
    }

    // === Scenario: a source system supplies its own link processor ===
    #[tokio::test]
    async fn source_specific_processor_takes_precedence() {
        let source = CustomLinkSource(
            MemorySourceSystem::from_json(
                "custom",
                json!({
                    "host": [ { "id": "h1", "apps": ["a1"] } ],
                    "app": [ { "id": "a1" } ],
                    "instance": [ { "id": "i1" } ]
                }),
            )
            .unwrap(),
        );
        let mappings = Mappings {
            ci_mappings: ci_mappings(),
            // The built-in processor name is never consulted
            link_mappings: vec![composition(), runs_on().with_processor("vendor-api")],
        };

        let result = replicator(mappings).replicate_topology(&source).await.unwrap();

        assert!(result.report.is_complete());
        assert!(result
            .topology
            .has_link("runs_on", &id("i1", "instance"), &id("a1", "app")));
    }

    // ================================================================
    // Identity scenarios
    // ================================================================

    // === Scenario: one source entity feeds two target CI types ===
    #[tokio::test]
    async fn one_entity_maps_to_two_target_types() {
        let mappings = Mappings {
            ci_mappings: vec![
                CiMapping::new("host", "host").with_attribute(AttributeMapping::field("name", "id")),
                CiMapping::new("host", "ip_address")
                    .with_attribute(AttributeMapping::field("name", "id")),
            ],
            link_mappings: Vec::new(),
        };

        let result = replicator(mappings).replicate_topology(&source()).await.unwrap();

        assert_eq!(result.topology.ci_count(), 2);
        assert!(result.topology.contains(&ComplexId::new("h1", "host", "host")));
        assert!(result.topology.contains(&ComplexId::new("h1", "host", "ip_address")));
    }

    // === Scenario: nested records link to their parent and require it ===
    #[tokio::test]
    async fn nested_records_are_contained_by_parent() {
        let source = MemorySourceSystem::from_json(
            "nested",
            json!({
                "host": [
                    { "id": "h1", "children": { "app": [ { "id": "a1" }, { "id": "a2" } ] } }
                ]
            }),
        )
        .unwrap();
        let mappings = Mappings {
            ci_mappings: ci_mappings()[..2].to_vec(),
            link_mappings: vec![
                LinkMapping::new("host", "host", "app", "app", "composition").with_processor("parent"),
            ],
        };

        let result = replicator(mappings).replicate_topology(&source).await.unwrap();

        assert_eq!(result.topology.ci_count(), 3);
        assert_eq!(result.topology.link_count(), 2);
        for app in result.topology.find_by_type("app") {
            assert!(app.ci.container.is_some());
        }
    }

    // === Scenario: parents keyed by a field other than "id" ===
    #[tokio::test]
    async fn parent_links_use_the_parent_mapping_id_key() {
        let source = MemorySourceSystem::from_json(
            "nested",
            json!({
                "host": [
                    { "name": "web01", "children": { "disk": [ { "device": "sda" } ] } }
                ]
            }),
        )
        .unwrap();
        let mappings = Mappings {
            ci_mappings: vec![
                CiMapping::new("host", "host").with_id_key("name"),
                CiMapping::new("disk", "disk")
                    .with_id_key("device")
                    .requiring_container(),
            ],
            link_mappings: vec![
                LinkMapping::new("host", "host", "disk", "disk", "composition").with_processor("parent"),
            ],
        };

        let result = replicator(mappings).replicate_topology(&source).await.unwrap();

        assert_eq!(result.topology.ci_count(), 2);
        assert_eq!(result.topology.link_count(), 1);
        assert!(result
            .topology
            .has_link("composition", &id("web01", "host"), &id("sda", "disk")));
        assert_eq!(result.report.links_dropped, 0);
        assert_eq!(result.report.cis_discarded, 0);
    }

    // === Scenario: two records share an id, the first one is used throughout ===
    #[tokio::test]
    async fn repeated_entity_id_keeps_the_first_record() {
        let source = MemorySourceSystem::from_json(
            "nested",
            json!({
                "host": [
                    { "id": "h1", "children": { "disk": [ { "device": "sda" } ] } },
                    { "id": "h2", "children": { "disk": [ { "device": "sda" } ] } }
                ]
            }),
        )
        .unwrap();
        let mappings = Mappings {
            ci_mappings: vec![
                CiMapping::new("host", "host"),
                CiMapping::new("disk", "disk")
                    .with_id_key("device")
                    .with_attribute(AttributeMapping::field("host", "parent.id"))
                    .requiring_container(),
            ],
            link_mappings: vec![
                LinkMapping::new("host", "host", "disk", "disk", "composition").with_processor("parent"),
            ],
        };

        let result = replicator(mappings).replicate_topology(&source).await.unwrap();

        let disk = result.topology.get(&id("sda", "disk")).unwrap();
        assert_eq!(disk.ci.attribute("host").and_then(|v| v.as_str()), Some("h1"));
        assert_eq!(
            disk.ci.attribute("root_container").and_then(|v| v.as_str()),
            Some("host: h1_host")
        );
        assert!(result
            .topology
            .has_link("composition", &id("h1", "host"), &id("sda", "disk")));
        assert_eq!(result.topology.link_count(), 1);
        assert_eq!(result.report.cis_duplicate, 1);
    }
}
