//! Annograph - annotation graphs for time-aligned transcripts.
//!
//! Builds on the graph model of `annograph-core` and the sequence aligner of
//! `annograph-align` with two processing steps: interpolating missing anchor
//! offsets ([`DefaultOffsetResolver`]) and transferring labels between
//! layers ([`LabelMapper`]). A [`Pipeline`] runs both over one graph or a
//! batch of graphs.

pub mod config;
mod error;
mod mapper;
mod resolver;

pub use annograph_align::{
    self as align, ComparatorKind, EditComparator, EditStep, LabelSplit, StepOperation,
    minimum_edit_distance, minimum_edit_path,
};
pub use annograph_core::{
    Alignment, Anchor, AnchorId, Annotation, AnnotationId, Attribute, AttributeKey, Change,
    ChangeStatus, ChangeTarget, Confidence, Graph, GraphError, Id, InvalidGraph, Layer, LayerId,
    NewAnnotation, Operation, Schema, Unresolved, Violation, overlap_rate,
};

pub use config::{AppConfig, ConfigError, MapperConfig, ResolverConfig, SubMapping};
pub use error::AnnographError;
pub use mapper::{LabelMapper, MappingEntry, MappingReport, SOURCE_LABEL, ScopeReport};
pub use resolver::{DefaultOffsetResolver, ResolverReport};

use log::{debug, info, warn};
use rayon::prelude::*;

/// The reports of processing one graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    graph: Id,
    resolved: ResolverReport,
    mapped: Option<MappingReport>,
}

impl ProcessOutcome {
    pub fn graph(&self) -> Id {
        self.graph
    }

    pub fn resolved(&self) -> &ResolverReport {
        &self.resolved
    }

    /// The mapping report, absent when no mapper is configured.
    pub fn mapped(&self) -> Option<&MappingReport> {
        self.mapped.as_ref()
    }
}

/// One graph of a batch, with the result of processing it.
#[derive(Debug)]
pub struct BatchItem {
    graph: Graph,
    outcome: Result<ProcessOutcome, AnnographError>,
}

impl BatchItem {
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn outcome(&self) -> &Result<ProcessOutcome, AnnographError> {
        &self.outcome
    }

    pub fn into_parts(self) -> (Graph, Result<ProcessOutcome, AnnographError>) {
        (self.graph, self.outcome)
    }
}

/// The results of a batch, in input order.
#[derive(Debug)]
pub struct BatchReport {
    items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &BatchItem> {
        self.items.iter().filter(|item| item.outcome.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &BatchItem> {
        self.items.iter().filter(|item| item.outcome.is_err())
    }

    pub fn into_items(self) -> Vec<BatchItem> {
        self.items
    }
}

/// Runs offset resolution and label mapping over graphs.
///
/// # Examples
///
/// ```
/// use annograph::{Pipeline, config::AppConfig};
///
/// let config = AppConfig::from_toml(
///     r#"
///     [mapper]
///     source_layer = "word"
///     target_layer = "phone"
///     "#,
/// )?;
/// let pipeline = Pipeline::new(config)?;
/// assert_eq!(pipeline.config().mapper().unwrap().mapping_layer(), "word-phone");
/// # Ok::<(), annograph::AnnographError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: AppConfig,
    resolver: DefaultOffsetResolver,
}

impl Pipeline {
    /// Creates a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Comparator`] if the mapper names an unknown
    /// comparator. Layer names are checked per graph, by [`Pipeline::process`].
    pub fn new(config: AppConfig) -> Result<Self, AnnographError> {
        if let Some(mapper) = config.mapper() {
            mapper
                .comparator()
                .parse::<ComparatorKind>()
                .map_err(ConfigError::from)?;
        }
        Ok(Self {
            resolver: DefaultOffsetResolver::new(*config.resolver()),
            config,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Resolves offsets, then maps labels.
    ///
    /// The mapper configuration is checked against the graph's schema before
    /// anything is changed. With `incremental` set, only what the graph's
    /// change ledger shows as changed is re-mapped.
    ///
    /// # Errors
    ///
    /// Returns [`AnnographError::Config`] if the mapper configuration does
    /// not fit the graph, [`AnnographError::Graph`] if a mapping cannot be
    /// written, and [`AnnographError::Invalid`] if validation is enabled and
    /// the processed graph breaks a rule. Changes made before a failure stay
    /// in the ledger.
    pub fn process(&self, graph: &mut Graph) -> Result<ProcessOutcome, AnnographError> {
        info!(graph:% = graph.id(); "Processing graph");
        let mapper = self
            .config
            .mapper()
            .map(|config| LabelMapper::new(config, graph.schema()))
            .transpose()?;

        let resolved = self.resolver.resolve(graph);
        let mapped = match mapper {
            Some(mapper) if self.config.incremental() => {
                let changes = graph.changes().to_vec();
                Some(mapper.map_changed(graph, &changes)?)
            }
            Some(mapper) => Some(mapper.map(graph)?),
            None => None,
        };

        if self.config.validate() {
            graph.validate()?;
            debug!(graph:% = graph.id(); "Graph validated");
        }
        info!(
            graph:% = graph.id(),
            changes = graph.changes().len();
            "Graph processed"
        );
        Ok(ProcessOutcome {
            graph: graph.id(),
            resolved,
            mapped,
        })
    }

    /// Processes graphs in parallel.
    ///
    /// Each graph is processed independently; a failure is reported with its
    /// graph and does not affect the others.
    pub fn process_batch(&self, graphs: Vec<Graph>) -> BatchReport {
        info!(graphs = graphs.len(); "Processing batch");
        let items: Vec<BatchItem> = graphs
            .into_par_iter()
            .map(|mut graph| {
                let outcome = self.process(&mut graph);
                if let Err(err) = &outcome {
                    warn!(graph:% = graph.id(), err:% = err; "Graph processing failed");
                }
                BatchItem { graph, outcome }
            })
            .collect();
        let report = BatchReport { items };
        info!(
            succeeded = report.succeeded().count(),
            failed = report.failed().count();
            "Batch processed"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_unknown_comparator() {
        let config = AppConfig::new(
            ResolverConfig::default(),
            Some(MapperConfig::new("word", "phone").with_comparator("Soundex")),
        );
        assert!(matches!(
            Pipeline::new(config),
            Err(AnnographError::Config(ConfigError::Comparator(_)))
        ));
    }

    #[test]
    fn test_process_without_mapper() {
        let mut graph = Graph::new("empty", Schema::new());
        let outcome = Pipeline::default().process(&mut graph).unwrap();
        assert_eq!(outcome.graph(), "empty");
        assert!(outcome.mapped().is_none());
        assert!(outcome.resolved().is_clean());
    }

    #[test]
    fn test_process_rejects_layers_missing_from_graph() {
        let config = AppConfig::new(
            ResolverConfig::default(),
            Some(MapperConfig::new("word", "phone")),
        );
        let mut graph = Graph::new("bare", Schema::new());
        let err = Pipeline::new(config).unwrap().process(&mut graph).unwrap_err();
        assert!(matches!(
            err,
            AnnographError::Config(ConfigError::UnknownLayer { field: "source_layer", .. })
        ));
        assert!(graph.changes().is_empty());
    }
}
