//! Label transfer between two layers.
//!
//! The [`LabelMapper`] aligns the labels of a source layer (say, words) with
//! those of a target layer (say, phones) and records the result on a
//! mapping layer: a child layer of the source whose annotations span the
//! target tokens each source token corresponds to and carry their labels.
//!
//! Alignment runs per scope, an annotation that contains both the source
//! and the target tokens being aligned, so that alignments never cross
//! utterance or turn boundaries.
//!
//! Mapping annotations are reconciled in place: a mapping that would come
//! out the same is left alone, so re-mapping an unchanged graph records no
//! changes.
//!
//! Two variations are configurable. Source labels may be cut into tokens
//! (characters or space-separated phones) that are aligned one by one, in
//! which case a source owns one mapping per block of its tokens. And a
//! sub-mapping may align the tokens below each mapped source with those
//! below its targets, say the phonemes of a dictionary word with the
//! segments of the word as spoken.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    iter,
    ops::Range,
};

use log::{debug, info, trace};

use annograph_align::{
    ComparatorKind, LabelComparator, LabelSplit, StepOperation, group_correspondences,
    minimum_edit_path,
};
use annograph_core::{
    Alignment, AnchorId, Annotation, AnnotationId, Attribute, Change, Confidence, Graph,
    GraphError, Layer, LayerId, NewAnnotation, Operation, Schema, overlap_rate,
};

use crate::{
    config::{ConfigError, MapperConfig, SubMapping},
    error::AnnographError,
};

/// Extra attribute holding the source tokens a split mapping covers.
pub const SOURCE_LABEL: &str = "source_label";

// =============================================================================
// Reports
// =============================================================================

/// One aligned block of source and target tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingEntry {
    operation: StepOperation,
    sources: Vec<AnnotationId>,
    targets: Vec<AnnotationId>,
    distance: u32,
    overlap_rate: Option<f64>,
    mapping: Option<AnnotationId>,
    sub_entries: Vec<MappingEntry>,
}

impl MappingEntry {
    pub fn operation(&self) -> StepOperation {
        self.operation
    }

    pub fn sources(&self) -> &[AnnotationId] {
        &self.sources
    }

    pub fn targets(&self) -> &[AnnotationId] {
        &self.targets
    }

    pub fn distance(&self) -> u32 {
        self.distance
    }

    /// Overlap rate between the extents of the source and target tokens,
    /// when both are fully anchored.
    pub fn overlap_rate(&self) -> Option<f64> {
        self.overlap_rate
    }

    /// The mapping annotation, absent for blocks without sources or
    /// without targets.
    pub fn mapping(&self) -> Option<AnnotationId> {
        self.mapping
    }

    /// Blocks of the sub-mapping aligned within this block.
    pub fn sub_entries(&self) -> &[MappingEntry] {
        &self.sub_entries
    }
}

/// The blocks aligned within one scope annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeReport {
    scope: AnnotationId,
    entries: Vec<MappingEntry>,
}

impl ScopeReport {
    pub fn scope(&self) -> AnnotationId {
        self.scope
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    /// Total edit distance of the scope's alignment.
    pub fn distance(&self) -> u32 {
        self.entries.iter().map(MappingEntry::distance).sum()
    }

    /// Mean overlap rate of the anchored blocks.
    pub fn mean_overlap_rate(&self) -> Option<f64> {
        mean(self.entries.iter().filter_map(MappingEntry::overlap_rate))
    }
}

/// The outcome of a mapping run.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingReport {
    mapping_layer: LayerId,
    scopes: Vec<ScopeReport>,
}

impl MappingReport {
    fn new(mapping_layer: LayerId) -> Self {
        Self {
            mapping_layer,
            scopes: Vec::new(),
        }
    }

    pub fn mapping_layer(&self) -> LayerId {
        self.mapping_layer
    }

    /// Scopes that were aligned; an incremental run lists only the scopes
    /// it re-aligned.
    pub fn scopes(&self) -> &[ScopeReport] {
        &self.scopes
    }

    pub fn entries(&self) -> impl Iterator<Item = &MappingEntry> {
        self.scopes.iter().flat_map(|scope| scope.entries.iter())
    }

    /// Mapping annotations created or confirmed by the run.
    pub fn mappings(&self) -> impl Iterator<Item = AnnotationId> + '_ {
        self.entries().filter_map(MappingEntry::mapping)
    }

    /// Sub-mapping annotations created or confirmed by the run.
    pub fn sub_mappings(&self) -> impl Iterator<Item = AnnotationId> + '_ {
        self.entries()
            .flat_map(|entry| entry.sub_entries.iter())
            .filter_map(MappingEntry::mapping)
    }

    pub fn distance(&self) -> u32 {
        self.scopes.iter().map(ScopeReport::distance).sum()
    }

    pub fn mean_overlap_rate(&self) -> Option<f64> {
        mean(self.entries().filter_map(MappingEntry::overlap_rate))
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}

// =============================================================================
// Changes
// =============================================================================

/// Source and target tokens touched by a batch of changes.
#[derive(Debug, Default)]
struct ChangedTokens {
    sources: HashSet<AnnotationId>,
    targets: HashSet<AnnotationId>,
    /// Last snapshots of destroyed tokens.
    destroyed: Vec<Annotation>,
}

impl ChangedTokens {
    fn collect(source: LayerId, target: LayerId, changes: &[Change]) -> Self {
        let mut changed = Self::default();
        for change in changes {
            let Some(annotation) = change.annotation() else {
                continue;
            };
            let layer = annotation.layer();
            if layer != source && layer != target {
                continue;
            }
            if change.operation() == Operation::Update && !moved_or_relabelled(change) {
                continue;
            }
            if change.operation() == Operation::Destroy {
                changed.destroyed.push(annotation.clone());
            }
            if layer == source {
                changed.sources.insert(annotation.id());
            } else {
                changed.targets.insert(annotation.id());
            }
        }
        changed
    }

    fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.targets.is_empty()
    }

    fn contains(&self, id: &AnnotationId) -> bool {
        self.sources.contains(id) || self.targets.contains(id)
    }
}

/// Returns `true` if an update changed anything an alignment depends on.
fn moved_or_relabelled(change: &Change) -> bool {
    let before = change.before().and_then(|record| record.as_annotation());
    let after = change.after().and_then(|record| record.as_annotation());
    match (before, after) {
        (Some(before), Some(after)) => {
            before.label() != after.label()
                || before.start() != after.start()
                || before.end() != after.end()
                || before.parent() != after.parent()
        }
        _ => true,
    }
}

// =============================================================================
// Planned mappings
// =============================================================================

/// A mapping annotation as an alignment block calls for it.
#[derive(Debug)]
struct PlannedMapping {
    owner: AnnotationId,
    sources: Vec<AnnotationId>,
    targets: Vec<AnnotationId>,
    start: AnchorId,
    end: AnchorId,
    label: String,
    distance: u32,
    source_label: Option<String>,
}

impl PlannedMapping {
    /// Returns `None` if the targets lack anchors.
    fn new(
        graph: &Graph,
        owner: AnnotationId,
        sources: &[AnnotationId],
        targets: &[AnnotationId],
        distance: u32,
    ) -> Option<Self> {
        let start = graph.annotation(*targets.first()?)?.start()?;
        let end = graph.annotation(*targets.last()?)?.end()?;
        Some(Self {
            owner,
            sources: sources.to_vec(),
            targets: targets.to_vec(),
            start,
            end,
            label: labels(graph, targets).join(" "),
            distance,
            source_label: None,
        })
    }

    fn with_source_label(mut self, source_label: String) -> Self {
        self.source_label = Some(source_label);
        self
    }

    /// Returns `true` if `annotation` already is this mapping.
    fn matches(&self, annotation: &Annotation) -> bool {
        let attributes = annotation.attributes();
        annotation.start() == Some(self.start)
            && annotation.end() == Some(self.end)
            && annotation.label() == self.label
            && annotation.confidence() == Confidence::Automatic
            && attributes.sources() == self.sources
            && attributes.targets() == self.targets
            && attributes.distance() == Some(self.distance)
            && attributes.extra(SOURCE_LABEL) == self.source_label.as_deref()
    }
}

// =============================================================================
// LabelMapper
// =============================================================================

/// Maps the labels of a source layer onto a target layer.
///
/// # Example
///
/// ```
/// # use annograph::{
/// #     Alignment, Confidence, Graph, LabelMapper, Layer, MapperConfig, NewAnnotation, Schema,
/// # };
/// let mut schema = Schema::new();
/// schema.add_layer(Layer::new("utterance").with_alignment(Alignment::Interval).with_peers(true))?;
/// for layer in ["word", "phone"] {
///     schema.add_layer(
///         Layer::new(layer)
///             .with_parent("utterance")
///             .with_alignment(Alignment::Interval)
///             .with_peers(true),
///     )?;
/// }
/// let mut graph = Graph::new("example", schema);
/// let anchors = (0..=2)
///     .map(|offset| graph.create_anchor(Some(offset as f64), Confidence::Manual))
///     .collect::<Result<Vec<_>, _>>()?;
/// let utterance = graph.add_annotation(
///     NewAnnotation::new("utterance", "I sang").with_anchors(anchors[0], anchors[2]),
/// )?;
/// graph.add_annotation(
///     NewAnnotation::new("word", "sang").with_parent(utterance).with_anchors(anchors[0], anchors[2]),
/// )?;
/// for (label, start, end) in [("s", 0, 1), ("{N", 1, 2)] {
///     graph.add_annotation(
///         NewAnnotation::new("phone", label)
///             .with_parent(utterance)
///             .with_anchors(anchors[start], anchors[end]),
///     )?;
/// }
///
/// let mapper = LabelMapper::new(&MapperConfig::new("word", "phone"), graph.schema())?;
/// let report = mapper.map(&mut graph)?;
/// assert_eq!(graph.labels(mapper.mapping_layer()), vec!["s {N"]);
/// assert_eq!(report.mappings().count(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct LabelMapper {
    source: LayerId,
    target: LayerId,
    mapping: LayerId,
    scope: LayerId,
    kind: ComparatorKind,
    comparator: LabelComparator,
    split: Option<LabelSplit>,
    sub: Option<Box<LabelMapper>>,
}

impl fmt::Debug for LabelMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabelMapper")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("mapping", &self.mapping)
            .field("scope", &self.scope)
            .field("comparator", &self.kind)
            .field("split", &self.split)
            .field("sub", &self.sub)
            .finish()
    }
}

impl LabelMapper {
    /// Creates a mapper for graphs with the given schema.
    ///
    /// The configuration is checked against the schema here, so that a bad
    /// configuration fails before any graph is touched.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a layer is unknown, if layers that must
    /// differ coincide, if the target layer is not anchored, if an existing
    /// mapping layer has the wrong shape, if the scope cannot contain the
    /// source and target tokens, or if the comparator is unknown. A
    /// sub-mapping additionally needs unsplit labels and sub-layers below
    /// the source and target layers.
    pub fn new(config: &MapperConfig, schema: &Schema) -> Result<Self, ConfigError> {
        let kind: ComparatorKind = config.comparator().parse()?;
        let source = known_layer(schema, "source_layer", config.source_layer())?;
        let target = known_layer(schema, "target_layer", config.target_layer())?;
        if source.id() == target.id() {
            return Err(ConfigError::SameLayer {
                first: "source_layer",
                second: "target_layer",
                layer: source.id().to_string(),
            });
        }
        if !target.alignment().is_anchored() {
            return Err(ConfigError::UnalignedLayer {
                field: "target_layer",
                layer: target.id().to_string(),
            });
        }

        let split = config.split_labels();
        let mapping = LayerId::new(&config.mapping_layer());
        check_mapping_layer(
            schema,
            "mapping_layer",
            mapping,
            source.id(),
            &[("source_layer", source.id()), ("target_layer", target.id())],
            split.is_some(),
        )?;

        let scope = match config.scope_layer() {
            Some(name) => {
                let scope = known_layer(schema, "scope_layer", name)?;
                if !can_scope(schema, scope, source.id(), target.id()) || scope.id() == mapping {
                    return Err(ConfigError::ScopeLayer {
                        layer: scope.id().to_string(),
                        source_layer: source.id().to_string(),
                        target_layer: target.id().to_string(),
                    });
                }
                scope.id()
            }
            None => default_scope(schema, source.id(), target.id()),
        };

        let mut mapper = Self {
            source: source.id(),
            target: target.id(),
            mapping,
            scope,
            kind,
            comparator: kind.build(),
            split,
            sub: None,
        };
        if let Some(sub) = config.sub_mapping()? {
            if split.is_some() {
                return Err(ConfigError::SplitSubMapping);
            }
            mapper.sub = Some(Box::new(mapper.build_sub_mapper(&sub, schema)?));
        }
        debug!(
            source:% = mapper.source,
            target:% = mapper.target,
            mapping:% = mapper.mapping,
            scope:% = mapper.scope,
            comparator:% = kind,
            split:? = split,
            sub_mapping:? = mapper.sub.as_ref().map(|sub| sub.mapping);
            "Label mapper configured"
        );
        Ok(mapper)
    }

    /// Builds the mapper that aligns the sub-tokens of this mapper's blocks.
    fn build_sub_mapper(&self, config: &SubMapping<'_>, schema: &Schema) -> Result<Self, ConfigError> {
        let kind: ComparatorKind = config.comparator.parse()?;
        let source = known_layer(schema, "sub_source_layer", config.source_layer)?;
        let target = known_layer(schema, "sub_target_layer", config.target_layer)?;
        for (field, layer, ancestor) in [
            ("sub_source_layer", source.id(), self.source),
            ("sub_target_layer", target.id(), self.target),
        ] {
            if !schema.is_ancestor(ancestor, layer) {
                return Err(ConfigError::NotBelow {
                    field,
                    layer: layer.to_string(),
                    ancestor: ancestor.to_string(),
                });
            }
        }
        if source.id() == target.id() {
            return Err(ConfigError::SameLayer {
                first: "sub_source_layer",
                second: "sub_target_layer",
                layer: source.id().to_string(),
            });
        }
        if !target.alignment().is_anchored() {
            return Err(ConfigError::UnalignedLayer {
                field: "sub_target_layer",
                layer: target.id().to_string(),
            });
        }

        let mapping = LayerId::new(&config.mapping_layer.map_or_else(
            || format!("{}-{}", source.id(), target.id()),
            str::to_string,
        ));
        check_mapping_layer(
            schema,
            "sub_mapping_layer",
            mapping,
            source.id(),
            &[
                ("source_layer", self.source),
                ("target_layer", self.target),
                ("mapping_layer", self.mapping),
                ("sub_source_layer", source.id()),
                ("sub_target_layer", target.id()),
            ],
            false,
        )?;
        Ok(Self {
            source: source.id(),
            target: target.id(),
            mapping,
            scope: self.scope,
            kind,
            comparator: kind.build(),
            split: None,
            sub: None,
        })
    }

    pub fn source_layer(&self) -> LayerId {
        self.source
    }

    pub fn target_layer(&self) -> LayerId {
        self.target
    }

    pub fn mapping_layer(&self) -> LayerId {
        self.mapping
    }

    /// The layer whose annotations bound each alignment.
    pub fn scope_layer(&self) -> LayerId {
        self.scope
    }

    pub fn comparator_kind(&self) -> ComparatorKind {
        self.kind
    }

    pub fn split_labels(&self) -> Option<LabelSplit> {
        self.split
    }

    /// The mapper run within each mapped block, if a sub-mapping is
    /// configured.
    pub fn sub_mapper(&self) -> Option<&LabelMapper> {
        self.sub.as_deref()
    }

    /// Adds the mapping layer, and the sub-mapping layer if any, to the
    /// graph's schema if they are missing.
    ///
    /// # Errors
    ///
    /// Fails if the source layer is missing from the graph's schema.
    pub fn ensure_mapping_layer(&self, graph: &mut Graph) -> Result<(), GraphError> {
        if !graph.schema().contains(self.mapping) {
            graph.add_layer(
                Layer::new(self.mapping)
                    .with_parent(self.source)
                    .with_alignment(Alignment::Interval)
                    .with_peers(self.split.is_some())
                    .with_parent_includes(false)
                    .with_description(format!("{} mapped onto {}", self.source, self.target)),
            )?;
            info!(graph:% = graph.id(), layer:% = self.mapping; "Mapping layer added");
        }
        match &self.sub {
            Some(sub) => sub.ensure_mapping_layer(graph),
            None => Ok(()),
        }
    }

    /// Aligns every scope of the graph and reconciles its mappings.
    ///
    /// A block pairing several sources with targets is owned by its first
    /// source: only that source gets a mapping child, and the others appear
    /// in the mapping's `Sources` attribute alone. With split labels a block
    /// of tokens likewise belongs to the source of its first token.
    ///
    /// # Errors
    ///
    /// Fails if the mapping layer cannot be added or a mapping cannot be
    /// written.
    pub fn map(&self, graph: &mut Graph) -> Result<MappingReport, AnnographError> {
        self.ensure_mapping_layer(graph)?;
        let mut report = MappingReport::new(self.mapping);
        for scope in self.scopes(graph) {
            let (sources, targets) = self.tokens(graph, scope);
            let mut entries = match self.split {
                Some(split) => self.align_split(graph, split, &sources, &targets)?,
                None => self.align(graph, &sources, &targets)?,
            };
            self.map_sub_tokens(graph, &mut entries)?;
            trace!(scope:% = scope, blocks = entries.len(); "Scope mapped");
            report.scopes.push(ScopeReport { scope, entries });
        }
        info!(
            graph:% = graph.id(),
            layer:% = self.mapping,
            scopes = report.scopes.len(),
            mappings = report.mappings().count();
            "Labels mapped"
        );
        Ok(report)
    }

    /// Re-maps only what `changes` affect.
    ///
    /// Within each scope holding a changed source or target token, mappings
    /// that are still consistent act as fences. Only the regions between
    /// fences that contain a change or an inconsistent mapping are
    /// re-aligned. With split labels a touched scope is re-aligned whole.
    /// Changes on other layers, including the mapping layers, are ignored,
    /// so edits confined to the sub-mapping layers need a full
    /// [`LabelMapper::map`]; blocks that are re-aligned get their
    /// sub-mappings redone.
    ///
    /// # Errors
    ///
    /// Fails if the mapping layer cannot be added or a mapping cannot be
    /// written.
    pub fn map_changed(
        &self,
        graph: &mut Graph,
        changes: &[Change],
    ) -> Result<MappingReport, AnnographError> {
        self.ensure_mapping_layer(graph)?;
        let changed = ChangedTokens::collect(self.source, self.target, changes);
        let mut report = MappingReport::new(self.mapping);
        if changed.is_empty() {
            debug!(graph:% = graph.id(), layer:% = self.mapping; "No mapped tokens changed");
            return Ok(report);
        }

        for scope in self.scopes(graph) {
            let (sources, targets) = self.tokens(graph, scope);
            let touched = sources.iter().chain(&targets).any(|id| changed.contains(id))
                || changed
                    .destroyed
                    .iter()
                    .any(|snapshot| self.was_in_scope(graph, snapshot, scope));
            if !touched {
                continue;
            }
            let mut entries = match self.split {
                Some(split) => self.align_split(graph, split, &sources, &targets)?,
                None => self.align_regions(graph, &sources, &targets, &changed)?,
            };
            self.map_sub_tokens(graph, &mut entries)?;
            debug!(scope:% = scope, blocks = entries.len(); "Scope re-mapped");
            report.scopes.push(ScopeReport { scope, entries });
        }
        info!(
            graph:% = graph.id(),
            layer:% = self.mapping,
            scopes = report.scopes.len(),
            changed = changed.sources.len() + changed.targets.len();
            "Changed labels mapped"
        );
        Ok(report)
    }

    fn scopes(&self, graph: &Graph) -> Vec<AnnotationId> {
        graph
            .list(self.scope)
            .into_iter()
            .map(Annotation::id)
            .collect()
    }

    /// Returns the live source and target tokens of a scope, in order.
    fn tokens(&self, graph: &Graph, scope: AnnotationId) -> (Vec<AnnotationId>, Vec<AnnotationId>) {
        let ids = |layer| {
            graph
                .descendants(scope, layer)
                .into_iter()
                .map(Annotation::id)
                .collect::<Vec<_>>()
        };
        (ids(self.source), ids(self.target))
    }

    /// Returns `true` if a destroyed token belonged to `scope`.
    fn was_in_scope(&self, graph: &Graph, snapshot: &Annotation, scope: AnnotationId) -> bool {
        if let Some(parent) = snapshot.parent() {
            if graph.ancestor_on(parent, self.scope) == Some(scope) {
                return true;
            }
        }
        let offset = |anchor: Option<AnchorId>| {
            anchor
                .and_then(|anchor| graph.anchor(anchor))
                .and_then(|anchor| anchor.offset())
        };
        match (graph.offsets(scope), offset(snapshot.start()), offset(snapshot.end())) {
            ((Some(scope_start), Some(scope_end)), Some(start), Some(end)) => {
                scope_start <= start && end <= scope_end
            }
            _ => false,
        }
    }

    /// Aligns `sources` with `targets` and reconciles the mappings of the
    /// sources.
    fn align(
        &self,
        graph: &mut Graph,
        sources: &[AnnotationId],
        targets: &[AnnotationId],
    ) -> Result<Vec<MappingEntry>, GraphError> {
        let from = labels(graph, sources);
        let to = labels(graph, targets);
        let path = minimum_edit_path(&from, &to, &*self.comparator);

        let mut entries = Vec::new();
        for block in group_correspondences(&path) {
            let block_sources = &sources[block.from()];
            let block_targets = &targets[block.to()];
            let mapping = match (
                block_sources.split_first(),
                block_targets.first(),
                block_targets.last(),
            ) {
                (Some((owner, rest)), Some(_), Some(_)) => {
                    for source in rest {
                        self.unmap(graph, *source)?;
                    }
                    self.upsert(graph, *owner, block_sources, block_targets, block.distance())?
                }
                _ => {
                    for source in block_sources {
                        self.unmap(graph, *source)?;
                    }
                    None
                }
            };
            entries.push(MappingEntry {
                operation: block.operation(),
                sources: block_sources.to_vec(),
                targets: block_targets.to_vec(),
                distance: block.distance(),
                overlap_rate: span_overlap(graph, block_sources, block_targets),
                mapping,
                sub_entries: Vec::new(),
            });
        }
        Ok(entries)
    }

    /// Aligns the tokens of the source labels with the targets and
    /// reconciles the mappings of the sources.
    ///
    /// A source's mappings are kept only if all of them come out the same;
    /// otherwise they are replaced together.
    fn align_split(
        &self,
        graph: &mut Graph,
        split: LabelSplit,
        sources: &[AnnotationId],
        targets: &[AnnotationId],
    ) -> Result<Vec<MappingEntry>, GraphError> {
        let mut owners = Vec::new();
        let mut from = Vec::new();
        for (source, label) in sources.iter().zip(labels(graph, sources)) {
            for token in split.tokens(&label) {
                owners.push(*source);
                from.push(token);
            }
        }
        let to = labels(graph, targets);
        let path = minimum_edit_path(&from, &to, &*self.comparator);

        let mut entries = Vec::new();
        let mut planned: Vec<(usize, PlannedMapping)> = Vec::new();
        for block in group_correspondences(&path) {
            let mut block_sources = owners[block.from()].to_vec();
            block_sources.dedup();
            let block_targets = &targets[block.to()];
            if let Some(owner) = block_sources.first() {
                let tokens: Vec<&str> = from[block.from()].iter().map(String::as_str).collect();
                let plan = PlannedMapping::new(
                    graph,
                    *owner,
                    &block_sources,
                    block_targets,
                    block.distance(),
                );
                if let Some(plan) = plan {
                    planned.push((entries.len(), plan.with_source_label(split.join(&tokens))));
                }
            }
            entries.push(MappingEntry {
                operation: block.operation(),
                overlap_rate: span_overlap(graph, &block_sources, block_targets),
                sources: block_sources,
                targets: block_targets.to_vec(),
                distance: block.distance(),
                mapping: None,
                sub_entries: Vec::new(),
            });
        }

        for source in sources {
            let plans: Vec<&(usize, PlannedMapping)> = planned
                .iter()
                .filter(|(_, plan)| plan.owner == *source)
                .collect();
            let existing: Vec<&Annotation> = graph.children(*source, self.mapping).collect();
            if existing.len() == plans.len()
                && existing
                    .iter()
                    .zip(&plans)
                    .all(|(annotation, (_, plan))| plan.matches(annotation))
            {
                for (annotation, (index, _)) in existing.iter().zip(&plans) {
                    entries[*index].mapping = Some(annotation.id());
                }
                continue;
            }
            self.unmap(graph, *source)?;
            for (index, plan) in plans {
                entries[*index].mapping = Some(self.create(graph, plan)?);
            }
        }
        Ok(entries)
    }

    /// Aligns the sub-tokens of each block pairing sources with targets and
    /// reconciles their mappings. Sub-tokens of unpaired sources lose their
    /// mappings.
    fn map_sub_tokens(
        &self,
        graph: &mut Graph,
        entries: &mut [MappingEntry],
    ) -> Result<(), GraphError> {
        let Some(sub) = &self.sub else {
            return Ok(());
        };
        for entry in entries {
            let sub_sources = sub_tokens(graph, &entry.sources, sub.source);
            if entry.targets.is_empty() {
                for source in sub_sources {
                    sub.unmap(graph, source)?;
                }
                continue;
            }
            if sub_sources.is_empty() {
                continue;
            }
            let sub_targets = sub_tokens(graph, &entry.targets, sub.target);
            entry.sub_entries = sub.align(graph, &sub_sources, &sub_targets)?;
            trace!(
                sub_sources = sub_sources.len(),
                sub_targets = sub_targets.len(),
                blocks = entry.sub_entries.len();
                "Block sub-mapped"
            );
        }
        Ok(())
    }

    /// Re-aligns the regions of a scope between consistent mappings.
    fn align_regions(
        &self,
        graph: &mut Graph,
        sources: &[AnnotationId],
        targets: &[AnnotationId],
        changed: &ChangedTokens,
    ) -> Result<Vec<MappingEntry>, GraphError> {
        let fences = self.fences(graph, sources, targets, changed);
        let end = (sources.len()..sources.len(), targets.len()..targets.len());

        let mut entries = Vec::new();
        let (mut next_source, mut next_target) = (0, 0);
        for (from, to) in fences.into_iter().chain(iter::once(end)) {
            let region_sources = &sources[next_source..from.start];
            let region_targets = &targets[next_target..to.start];
            if self.is_dirty(graph, region_sources, region_targets, changed) {
                trace!(
                    sources = region_sources.len(),
                    targets = region_targets.len();
                    "Region re-aligned"
                );
                entries.extend(self.align(graph, region_sources, region_targets)?);
            }
            next_source = from.end;
            next_target = to.end;
        }
        Ok(entries)
    }

    /// Finds the mappings of a scope that still hold, in order.
    ///
    /// A fence is the mapping of an unchanged source whose sources and
    /// targets are unchanged, live, contiguous, and after the previous
    /// fence.
    fn fences(
        &self,
        graph: &Graph,
        sources: &[AnnotationId],
        targets: &[AnnotationId],
        changed: &ChangedTokens,
    ) -> Vec<(Range<usize>, Range<usize>)> {
        let source_positions = positions(sources);
        let target_positions = positions(targets);

        let mut fences = Vec::new();
        let (mut next_source, mut next_target) = (0, 0);
        for (index, source) in sources.iter().enumerate() {
            if index < next_source || changed.contains(source) {
                continue;
            }
            let Some(mapping) = graph.children(*source, self.mapping).next() else {
                continue;
            };
            let attributes = mapping.attributes();
            if attributes
                .sources()
                .iter()
                .chain(attributes.targets())
                .any(|id| changed.contains(id))
            {
                continue;
            }
            let (Some(from), Some(to)) = (
                contiguous(attributes.sources(), &source_positions),
                contiguous(attributes.targets(), &target_positions),
            ) else {
                continue;
            };
            if from.start != index || to.start < next_target {
                continue;
            }
            next_source = from.end;
            next_target = to.end;
            fences.push((from, to));
        }
        fences
    }

    /// Returns `true` if a region between fences needs re-aligning.
    ///
    /// After a full mapping, a region between fences holds either only
    /// unmapped sources or only unmapped targets. Anything else means the
    /// region has gone stale.
    fn is_dirty(
        &self,
        graph: &Graph,
        sources: &[AnnotationId],
        targets: &[AnnotationId],
        changed: &ChangedTokens,
    ) -> bool {
        (!sources.is_empty() && !targets.is_empty())
            || sources.iter().chain(targets).any(|id| changed.contains(id))
            || sources
                .iter()
                .any(|source| graph.children(*source, self.mapping).next().is_some())
    }

    /// Creates or updates the mapping owned by `owner`.
    fn upsert(
        &self,
        graph: &mut Graph,
        owner: AnnotationId,
        sources: &[AnnotationId],
        targets: &[AnnotationId],
        distance: u32,
    ) -> Result<Option<AnnotationId>, GraphError> {
        let Some(plan) = PlannedMapping::new(graph, owner, sources, targets, distance) else {
            debug!(source:% = owner; "Targets have no anchors, mapping skipped");
            self.unmap(graph, owner)?;
            return Ok(None);
        };

        let existing = graph.children(owner, self.mapping).next().map(Annotation::id);
        let Some(mapping) = existing else {
            return self.create(graph, &plan).map(Some);
        };

        graph.set_anchors(mapping, Some(plan.start), Some(plan.end))?;
        graph.set_label(mapping, plan.label)?;
        graph.set_confidence(mapping, Confidence::Automatic)?;
        graph.set_attribute(mapping, Attribute::Sources(plan.sources))?;
        graph.set_attribute(mapping, Attribute::Targets(plan.targets))?;
        graph.set_attribute(mapping, Attribute::Distance(plan.distance))?;
        Ok(Some(mapping))
    }

    fn create(&self, graph: &mut Graph, plan: &PlannedMapping) -> Result<AnnotationId, GraphError> {
        let mut annotation = NewAnnotation::new(self.mapping, plan.label.as_str())
            .with_parent(plan.owner)
            .with_anchors(plan.start, plan.end)
            .with_confidence(Confidence::Automatic)
            .with_attribute(Attribute::Sources(plan.sources.clone()))
            .with_attribute(Attribute::Targets(plan.targets.clone()))
            .with_attribute(Attribute::Distance(plan.distance));
        if let Some(source_label) = &plan.source_label {
            annotation = annotation.with_attribute(Attribute::extra(SOURCE_LABEL, source_label));
        }
        let mapping = graph.add_annotation(annotation)?;
        trace!(source:% = plan.owner, mapping:% = mapping; "Mapping created");
        Ok(mapping)
    }

    /// Destroys the mappings owned by `source`.
    fn unmap(&self, graph: &mut Graph, source: AnnotationId) -> Result<(), GraphError> {
        let stale: Vec<AnnotationId> = graph
            .children(source, self.mapping)
            .map(Annotation::id)
            .collect();
        for mapping in stale {
            graph.destroy_annotation(mapping)?;
            trace!(source:% = source, mapping:% = mapping; "Stale mapping destroyed");
        }
        Ok(())
    }
}

fn known_layer<'a>(
    schema: &'a Schema,
    field: &'static str,
    name: &str,
) -> Result<&'a Layer, ConfigError> {
    schema
        .layer(LayerId::new(name))
        .ok_or_else(|| ConfigError::UnknownLayer {
            field,
            layer: name.to_string(),
        })
}

/// Checks that a mapping layer differs from the other configured layers and,
/// if it exists already, that it is an interval child of `parent`.
fn check_mapping_layer(
    schema: &Schema,
    field: &'static str,
    mapping: LayerId,
    parent: LayerId,
    others: &[(&'static str, LayerId)],
    peers: bool,
) -> Result<(), ConfigError> {
    for (other, layer) in others {
        if mapping == *layer {
            return Err(ConfigError::SameLayer {
                first: *other,
                second: field,
                layer: layer.to_string(),
            });
        }
    }
    if let Some(existing) = schema.layer(mapping) {
        if existing.parent() != Some(parent)
            || existing.alignment() != Alignment::Interval
            || existing.peers() != peers
        {
            return Err(ConfigError::MappingLayerConflict {
                layer: mapping.to_string(),
                source_layer: parent.to_string(),
            });
        }
    }
    Ok(())
}

/// Returns `true` if annotations on `scope` can bound the tokens of both
/// layers, either structurally or by their offsets.
fn can_scope(schema: &Schema, scope: &Layer, source: LayerId, target: LayerId) -> bool {
    let contains = |layer: LayerId| scope.id() == layer || schema.is_ancestor(scope.id(), layer);
    scope.id() == schema.root_id()
        || (contains(source) && contains(target))
        || scope.alignment().is_anchored()
}

/// Picks the nearest layer containing both source and target.
///
/// When that is the layer above utterances, utterances are used instead so
/// that alignments stay within an utterance.
fn default_scope(schema: &Schema, source: LayerId, target: LayerId) -> LayerId {
    let common = schema
        .common_ancestor(source, target)
        .unwrap_or_else(|| schema.root_id());
    let utterance = schema
        .utterance_layer()
        .and_then(|id| schema.layer(id))
        .filter(|layer| {
            layer.parent() == Some(common)
                && layer.alignment().is_anchored()
                && layer.id() != source
                && layer.id() != target
        });
    utterance.map_or(common, Layer::id)
}

/// Returns the tokens on `layer` below each of `parents`, in order.
fn sub_tokens(graph: &Graph, parents: &[AnnotationId], layer: LayerId) -> Vec<AnnotationId> {
    parents
        .iter()
        .flat_map(|parent| graph.descendants(*parent, layer))
        .map(Annotation::id)
        .collect()
}

fn labels(graph: &Graph, ids: &[AnnotationId]) -> Vec<String> {
    ids.iter()
        .map(|id| {
            graph
                .annotation(*id)
                .map_or_else(String::new, |annotation| annotation.label().to_string())
        })
        .collect()
}

fn positions(ids: &[AnnotationId]) -> HashMap<AnnotationId, usize> {
    ids.iter()
        .enumerate()
        .map(|(index, id)| (*id, index))
        .collect()
}

/// Returns the range `ids` occupy if they appear consecutively and in order.
fn contiguous(ids: &[AnnotationId], positions: &HashMap<AnnotationId, usize>) -> Option<Range<usize>> {
    let first = *positions.get(ids.first()?)?;
    for (offset, id) in ids.iter().enumerate() {
        if positions.get(id) != Some(&(first + offset)) {
            return None;
        }
    }
    Some(first..first + ids.len())
}

fn span_overlap(graph: &Graph, sources: &[AnnotationId], targets: &[AnnotationId]) -> Option<f64> {
    let extent = |ids: &[AnnotationId]| {
        let start = graph.offsets(*ids.first()?).0?;
        let end = graph.offsets(*ids.last()?).1?;
        Some((start, end))
    };
    let (source_start, source_end) = extent(sources)?;
    let (target_start, target_end) = extent(targets)?;
    Some(overlap_rate(source_start, source_end, target_start, target_end))
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use super::*;
    use annograph_core::{AttributeKey, ChangeTarget};

    fn schema() -> Schema {
        let mut schema = Schema::new().with_utterance_layer("utterance");
        schema
            .add_layer(Layer::new("turn").with_alignment(Alignment::Interval).with_peers(true))
            .unwrap();
        schema
            .add_layer(
                Layer::new("utterance")
                    .with_parent("turn")
                    .with_alignment(Alignment::Interval)
                    .with_peers(true),
            )
            .unwrap();
        for (layer, parent) in [("word", "turn"), ("phone", "turn")] {
            schema
                .add_layer(
                    Layer::new(layer)
                        .with_parent(parent)
                        .with_alignment(Alignment::Interval)
                        .with_peers(true),
                )
                .unwrap();
        }
        schema
    }

    type Tokens<'a> = &'a [(&'a str, f64, f64)];

    /// One turn and utterance covering the tokens.
    fn graph(words: Tokens, phones: Tokens) -> Graph {
        let mut graph = Graph::new("mapper", schema());
        let end = words.iter().chain(phones).map(|(_, _, end)| *end).fold(0.0, f64::max);
        let at = |graph: &mut Graph, offset: f64| {
            graph
                .get_or_create_anchor_at(offset, Confidence::Manual)
                .unwrap()
        };
        let (start, end) = (at(&mut graph, 0.0), at(&mut graph, end));
        let turn = graph
            .add_annotation(NewAnnotation::new("turn", "t").with_id("turn").with_anchors(start, end))
            .unwrap();
        graph
            .add_annotation(
                NewAnnotation::new("utterance", "u")
                    .with_parent(turn)
                    .with_anchors(start, end),
            )
            .unwrap();
        for (layer, tokens) in [("word", words), ("phone", phones)] {
            for (label, from, to) in tokens {
                let (from, to) = (at(&mut graph, *from), at(&mut graph, *to));
                graph
                    .add_annotation(
                        NewAnnotation::new(layer, *label)
                            .with_parent(turn)
                            .with_anchors(from, to),
                    )
                    .unwrap();
            }
        }
        graph
    }

    fn mapper(graph: &Graph) -> LabelMapper {
        LabelMapper::new(&MapperConfig::new("word", "phone"), graph.schema()).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_configs() {
        let schema = schema();
        let err = |config: MapperConfig| LabelMapper::new(&config, &schema).unwrap_err();

        assert!(matches!(
            err(MapperConfig::new("lemma", "phone")),
            ConfigError::UnknownLayer { field: "source_layer", .. }
        ));
        assert!(matches!(
            err(MapperConfig::new("word", "word")),
            ConfigError::SameLayer { .. }
        ));
        assert!(matches!(
            err(MapperConfig::new("word", "phone").with_mapping_layer("phone")),
            ConfigError::SameLayer { second: "mapping_layer", .. }
        ));
        assert!(matches!(
            err(MapperConfig::new("word", "phone").with_mapping_layer("utterance")),
            ConfigError::MappingLayerConflict { .. }
        ));
        assert!(matches!(
            err(MapperConfig::new("word", "phone").with_comparator("Soundex")),
            ConfigError::Comparator(_)
        ));

        let mut tagged = schema.clone();
        tagged.add_layer(Layer::new("pos").with_parent("word")).unwrap();
        assert!(matches!(
            LabelMapper::new(&MapperConfig::new("word", "pos"), &tagged).unwrap_err(),
            ConfigError::UnalignedLayer { .. }
        ));
        assert!(matches!(
            LabelMapper::new(
                &MapperConfig::new("word", "phone").with_scope_layer("pos"),
                &tagged
            )
            .unwrap_err(),
            ConfigError::ScopeLayer { .. }
        ));
    }

    #[test]
    fn test_default_scope_prefers_utterances() {
        let graph = graph(&[], &[]);
        let mapper = mapper(&graph);
        assert_eq!(mapper.scope_layer(), "utterance");
        assert_eq!(mapper.mapping_layer(), "word-phone");
        assert_eq!(mapper.comparator_kind(), ComparatorKind::Default);

        let scoped = LabelMapper::new(
            &MapperConfig::new("word", "phone").with_scope_layer("turn"),
            graph.schema(),
        )
        .unwrap();
        assert_eq!(scoped.scope_layer(), "turn");
    }

    #[test]
    fn test_map_one_word_to_many_phones() {
        let mut graph = graph(
            &[("walked", 0.0, 4.0)],
            &[("w", 0.0, 1.0), ("aa", 1.0, 2.0), ("k", 2.0, 3.0), ("t", 3.0, 4.0)],
        );
        let mapper = mapper(&graph);
        let report = mapper.map(&mut graph).unwrap();

        let entries: Vec<&MappingEntry> = report.entries().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation(), StepOperation::Change);
        assert_eq!(entries[0].targets().len(), 4);
        assert_eq!(entries[0].distance(), 4);
        assert!(approx_eq!(f64, entries[0].overlap_rate().unwrap(), 1.0));

        let mappings = graph.all(mapper.mapping_layer());
        assert_eq!(mappings.len(), 1);
        let mapping = mappings[0];
        assert_eq!(mapping.label(), "w aa k t");
        assert_eq!(mapping.confidence(), Confidence::Automatic);
        assert_eq!(graph.offsets(mapping.id()), (Some(0.0), Some(4.0)));
        assert_eq!(mapping.attributes().targets(), entries[0].targets());
        assert_eq!(mapping.attributes().distance(), Some(4));
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_remapping_unchanged_graph_records_nothing() {
        let mut graph = graph(
            &[("I", 0.0, 1.0), ("sang", 1.0, 3.0)],
            &[("2", 0.0, 1.0), ("s", 1.0, 2.0), ("{N", 2.0, 3.0)],
        );
        let mapper = mapper(&graph);
        mapper.map(&mut graph).unwrap();
        graph.take_changes();

        let report = mapper.map(&mut graph).unwrap();
        assert_eq!(report.mappings().count(), 1);
        assert!(graph.changes().is_empty());
    }

    #[test]
    fn test_stale_mappings_are_destroyed() {
        let mut graph = graph(
            &[("a", 0.0, 1.0), ("b", 1.0, 2.0)],
            &[("a", 0.0, 1.0), ("b", 1.0, 2.0)],
        );
        let mapper = mapper(&graph);
        mapper.map(&mut graph).unwrap();
        assert_eq!(graph.all(mapper.mapping_layer()).len(), 2);

        let phone = graph.all("phone".into())[1].id();
        graph.destroy_annotation(phone).unwrap();
        let report = mapper.map(&mut graph).unwrap();

        let operations: Vec<StepOperation> =
            report.entries().map(MappingEntry::operation).collect();
        assert_eq!(operations, vec![StepOperation::None, StepOperation::Delete]);
        assert_eq!(report.mappings().count(), 1);
        assert_eq!(graph.all(mapper.mapping_layer()).len(), 1);
    }

    #[test]
    fn test_map_changed_realigns_only_edited_region() {
        let words: Vec<(String, f64, f64)> = (0..10)
            .map(|index| (format!("t{index}"), index as f64, index as f64 + 1.0))
            .collect();
        let tokens: Vec<(&str, f64, f64)> = words
            .iter()
            .map(|(label, start, end)| (label.as_str(), *start, *end))
            .collect();
        let mut graph = graph(&tokens, &tokens);
        let mapper = mapper(&graph);
        mapper.map(&mut graph).unwrap();
        graph.take_changes();

        let third = graph.all("word".into())[2].id();
        let third_mapping = graph.children(third, mapper.mapping_layer()).next().unwrap().id();
        graph.set_label(third, "typo").unwrap();
        let edits = graph.changes().to_vec();

        let report = mapper.map_changed(&mut graph, &edits).unwrap();
        let realigned: Vec<&MappingEntry> = report.entries().collect();
        assert_eq!(realigned.len(), 1);
        assert_eq!(realigned[0].sources(), &[third]);

        let remapped: Vec<ChangeTarget> = graph.changes()[edits.len()..]
            .iter()
            .map(Change::target)
            .collect();
        assert_eq!(remapped, vec![ChangeTarget::Annotation(third_mapping)]);
        let mapping = graph.annotation(third_mapping).unwrap();
        assert_eq!(mapping.attributes().distance(), Some(1));
        assert_eq!(mapping.label(), "t2");
    }

    #[test]
    fn test_map_changed_ignores_mapping_layer_edits() {
        let mut graph = graph(&[("a", 0.0, 1.0)], &[("a", 0.0, 1.0)]);
        let mapper = mapper(&graph);
        mapper.map(&mut graph).unwrap();
        graph.take_changes();

        let mapping = graph.all(mapper.mapping_layer())[0].id();
        graph
            .set_attribute(mapping, Attribute::extra("checked", "yes"))
            .unwrap();
        let edits = graph.changes().to_vec();
        let report = mapper.map_changed(&mut graph, &edits).unwrap();
        assert!(report.scopes().is_empty());
        assert!(
            graph
                .annotation(mapping)
                .unwrap()
                .attributes()
                .get(&AttributeKey::Extra("checked".to_string()))
                .is_some()
        );
    }

    #[test]
    fn test_many_to_many_block_is_owned_by_first_source() {
        let mut graph = graph(
            &[("a", 0.0, 1.0), ("x", 1.0, 2.5), ("y", 2.5, 4.0), ("b", 4.0, 5.0)],
            &[
                ("a", 0.0, 1.0),
                ("p", 1.0, 2.0),
                ("q", 2.0, 3.0),
                ("r", 3.0, 4.0),
                ("b", 4.0, 5.0),
            ],
        );
        let mapper = mapper(&graph);
        let report = mapper.map(&mut graph).unwrap();

        let words: Vec<AnnotationId> = graph.all("word".into()).iter().map(|w| w.id()).collect();
        let entries: Vec<&MappingEntry> = report.entries().collect();
        assert_eq!(entries.len(), 3);
        let block = entries[1];
        assert_eq!(block.operation(), StepOperation::Change);
        assert_eq!(block.sources(), &words[1..3]);
        assert_eq!(block.targets().len(), 3);

        let owned = graph.children(words[1], mapper.mapping_layer()).next().unwrap();
        assert_eq!(Some(owned.id()), block.mapping());
        assert_eq!(owned.label(), "p q r");
        assert_eq!(owned.attributes().sources(), &words[1..3]);
        assert_eq!(graph.offsets(owned.id()), (Some(1.0), Some(4.0)));
        assert!(graph.children(words[2], mapper.mapping_layer()).next().is_none());
        assert_eq!(report.mappings().count(), 3);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_split_labels_map_each_character() {
        let mut graph = graph(
            &[("k{t", 0.0, 3.0)],
            &[("k", 0.0, 1.0), ("{", 1.0, 2.0), ("t", 2.0, 3.0)],
        );
        let config = MapperConfig::new("word", "phone")
            .with_comparator("DISCToDISC")
            .with_split_labels(LabelSplit::Chars);
        let mapper = LabelMapper::new(&config, graph.schema()).unwrap();
        let report = mapper.map(&mut graph).unwrap();

        let word = graph.all("word".into())[0].id();
        assert_eq!(report.mappings().count(), 3);
        assert!(report.entries().all(|entry| entry.sources() == [word]));
        assert!(graph.schema().layer(mapper.mapping_layer()).unwrap().peers());

        let mappings = graph.all(mapper.mapping_layer());
        assert!(mappings.iter().all(|mapping| mapping.parent() == Some(word)));
        let source_labels: Vec<&str> = mappings
            .iter()
            .map(|mapping| mapping.attributes().extra(SOURCE_LABEL).unwrap())
            .collect();
        assert_eq!(source_labels, vec!["k", "{", "t"]);
        assert_eq!(graph.labels(mapper.mapping_layer()), vec!["k", "{", "t"]);
        assert_eq!(graph.offsets(mappings[1].id()), (Some(1.0), Some(2.0)));
        assert!(graph.validate().is_ok());

        graph.take_changes();
        mapper.map(&mut graph).unwrap();
        assert!(graph.changes().is_empty());
    }

    #[test]
    fn test_split_labels_by_space_replace_changed_mappings() {
        let mut graph = graph(
            &[("K AE1 T", 0.0, 3.0)],
            &[("k", 0.0, 1.0), ("{", 1.0, 2.0), ("t", 2.0, 3.0)],
        );
        let config = MapperConfig::new("word", "phone")
            .with_comparator("ArpabetToDISC")
            .with_split_labels(LabelSplit::Spaces);
        let mapper = LabelMapper::new(&config, graph.schema()).unwrap();
        mapper.map(&mut graph).unwrap();
        let source_labels = |graph: &Graph| -> Vec<String> {
            graph
                .all(mapper.mapping_layer())
                .iter()
                .map(|mapping| mapping.attributes().extra(SOURCE_LABEL).unwrap().to_string())
                .collect()
        };
        assert_eq!(source_labels(&graph), vec!["K", "AE1", "T"]);

        let word = graph.all("word".into())[0].id();
        graph.set_label(word, "K AA1 T").unwrap();
        mapper.map(&mut graph).unwrap();
        assert_eq!(source_labels(&graph), vec!["K", "AA1", "T"]);
        let distances: Vec<Option<u32>> = graph
            .all(mapper.mapping_layer())
            .iter()
            .map(|mapping| mapping.attributes().distance())
            .collect();
        assert_eq!(distances, vec![Some(0), Some(8), Some(0)]);
        assert!(graph.validate().is_ok());
    }

    /// Words with phonemes below them, and tokens with segments below them.
    fn sub_schema() -> Schema {
        let mut schema = schema();
        for (layer, parent) in [("token", "turn"), ("phoneme", "word"), ("segment", "token")] {
            schema
                .add_layer(
                    Layer::new(layer)
                        .with_parent(parent)
                        .with_alignment(Alignment::Interval)
                        .with_peers(true),
                )
                .unwrap();
        }
        schema
    }

    fn sub_graph(phonemes: &[&str], segments: &[&str]) -> Graph {
        let mut graph = Graph::new("sub", sub_schema());
        let anchors: Vec<AnchorId> = (0..=3)
            .map(|offset| {
                graph
                    .get_or_create_anchor_at(offset as f64, Confidence::Manual)
                    .unwrap()
            })
            .collect();
        let (start, end) = (anchors[0], anchors[3]);
        let turn = graph
            .add_annotation(NewAnnotation::new("turn", "t").with_anchors(start, end))
            .unwrap();
        graph
            .add_annotation(
                NewAnnotation::new("utterance", "u")
                    .with_parent(turn)
                    .with_anchors(start, end),
            )
            .unwrap();
        for (layer, child_layer, children) in [
            ("word", "phoneme", phonemes),
            ("token", "segment", segments),
        ] {
            let parent = graph
                .add_annotation(
                    NewAnnotation::new(layer, "cat")
                        .with_parent(turn)
                        .with_anchors(start, end),
                )
                .unwrap();
            for (index, label) in children.iter().enumerate() {
                graph
                    .add_annotation(
                        NewAnnotation::new(child_layer, *label)
                            .with_parent(parent)
                            .with_anchors(anchors[index], anchors[index + 1]),
                    )
                    .unwrap();
            }
        }
        graph
    }

    #[test]
    fn test_sub_mapping_aligns_children_of_mapped_blocks() {
        let mut graph = sub_graph(&["k", "{", "t"], &["k", "{", "d"]);
        let config =
            MapperConfig::new("word", "token").with_sub_mapping("phoneme", "segment", "DISCToDISC");
        let mapper = LabelMapper::new(&config, graph.schema()).unwrap();
        let sub = mapper.sub_mapper().unwrap();
        assert_eq!(sub.mapping_layer(), "phoneme-segment");

        let report = mapper.map(&mut graph).unwrap();
        assert_eq!(report.mappings().count(), 1);
        let entry = report.entries().next().unwrap();
        let operations: Vec<StepOperation> =
            entry.sub_entries().iter().map(MappingEntry::operation).collect();
        assert_eq!(
            operations,
            vec![StepOperation::None, StepOperation::None, StepOperation::Change]
        );
        assert_eq!(entry.sub_entries()[2].distance(), 2);
        assert_eq!(report.sub_mappings().count(), 3);

        let phonemes: Vec<AnnotationId> =
            graph.all("phoneme".into()).iter().map(|p| p.id()).collect();
        let sub_mappings = graph.all(sub.mapping_layer());
        assert_eq!(graph.labels(sub.mapping_layer()), vec!["k", "{", "d"]);
        assert_eq!(sub_mappings[2].parent(), Some(phonemes[2]));
        assert_eq!(sub_mappings[2].attributes().distance(), Some(2));
        assert!(graph.validate().is_ok());

        graph.take_changes();
        mapper.map(&mut graph).unwrap();
        assert!(graph.changes().is_empty());
    }

    #[test]
    fn test_sub_mapping_configs_are_checked() {
        let schema = sub_schema();
        let err = |config: MapperConfig| LabelMapper::new(&config, &schema).unwrap_err();

        assert!(matches!(
            err(MapperConfig::new("word", "token").with_sub_mapping("segment", "phoneme", "Default")),
            ConfigError::NotBelow { field: "sub_source_layer", .. }
        ));
        assert!(matches!(
            err(MapperConfig::new("word", "token")
                .with_split_labels(LabelSplit::Chars)
                .with_sub_mapping("phoneme", "segment", "Default")),
            ConfigError::SplitSubMapping
        ));
        assert!(matches!(
            err(MapperConfig::new("word", "token").with_sub_mapping("phoneme", "segment", "Soundex")),
            ConfigError::Comparator(_)
        ));
        assert!(matches!(
            err(MapperConfig::new("word", "token")
                .with_sub_mapping("phoneme", "segment", "Default")
                .with_sub_mapping_layer("word-token")),
            ConfigError::SameLayer { second: "sub_mapping_layer", .. }
        ));
    }
}
