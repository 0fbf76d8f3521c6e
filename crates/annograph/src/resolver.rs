//! Default offset resolution.
//!
//! Transcripts usually carry reliable offsets only at some boundaries, such
//! as the edges of utterances, while the words inside them have none. The
//! [`DefaultOffsetResolver`] fills the missing offsets so that every chain of
//! children gets a plausible, ordered extent.
//!
//! For each parent, the start and end anchors of its children between the
//! parent's own boundaries form a chain. Anchors whose offsets are trusted
//! (rated at least [`Confidence::Default`]) stay where they are. Between two
//! trusted anchors:
//!
//! 1. an untrusted anchor separated from its trusted neighbour by a gap
//!    between children copies the neighbour's offset, repeated inwards from
//!    both ends;
//! 2. the remaining untrusted anchors are spread evenly.

use log::{debug, trace, warn};

use annograph_core::{
    Alignment, AnchorId, AnnotationId, Confidence, Graph, GraphError, LayerId, Missing, Rule,
    Schema, Unresolved, Violation,
};

use crate::config::ResolverConfig;

/// The outcome of a resolver run.
///
/// Parents without known boundaries are not failures: partial transcripts
/// are expected, and those parents are listed as deferred.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverReport {
    updated: Vec<AnchorId>,
    deferred: Vec<Unresolved>,
    failures: Vec<(AnnotationId, GraphError)>,
}

impl ResolverReport {
    /// Anchors that were given an offset, in the order they were set.
    pub fn updated(&self) -> &[AnchorId] {
        &self.updated
    }

    /// Parents skipped because a boundary offset is unknown.
    pub fn deferred(&self) -> &[Unresolved] {
        &self.deferred
    }

    /// Parents whose children could not be spread.
    pub fn failures(&self) -> &[(AnnotationId, GraphError)] {
        &self.failures
    }

    pub fn is_clean(&self) -> bool {
        self.deferred.is_empty() && self.failures.is_empty()
    }
}

/// A position in a parent's anchor chain.
#[derive(Debug, Clone, Copy)]
struct Point {
    anchor: Option<AnchorId>,
    offset: Option<f64>,
    trusted: bool,
}

/// The anchors of one parent and its children, in time order.
///
/// `linked[i]` tells whether a child spans from point `i` to point `i + 1`.
#[derive(Debug, Default)]
struct Chain {
    points: Vec<Point>,
    linked: Vec<bool>,
}

impl Chain {
    /// Appends a point, merging it into the last point when both are the
    /// same anchor.
    fn push(&mut self, point: Point, linked: bool) {
        if let Some(last) = self.points.last() {
            if point.anchor.is_some() && last.anchor == point.anchor {
                return;
            }
            self.linked.push(linked);
        }
        self.points.push(point);
    }
}

/// Fills missing anchor offsets by spreading them between trusted ones.
///
/// # Example
///
/// ```
/// # use annograph::{
/// #     Alignment, Confidence, DefaultOffsetResolver, Graph, Layer, NewAnnotation, Schema,
/// # };
/// let mut schema = Schema::new();
/// schema.add_layer(Layer::new("utterance").with_alignment(Alignment::Interval).with_peers(true))?;
/// schema.add_layer(
///     Layer::new("word")
///         .with_parent("utterance")
///         .with_alignment(Alignment::Interval)
///         .with_peers(true),
/// )?;
/// let mut graph = Graph::new("example", schema);
/// let start = graph.create_anchor(Some(0.0), Confidence::Manual)?;
/// let middle = graph.create_anchor(None, Confidence::None)?;
/// let end = graph.create_anchor(Some(2.0), Confidence::Manual)?;
/// let utterance =
///     graph.add_annotation(NewAnnotation::new("utterance", "hi there").with_anchors(start, end))?;
/// for (label, from, to) in [("hi", start, middle), ("there", middle, end)] {
///     graph.add_annotation(
///         NewAnnotation::new("word", label)
///             .with_parent(utterance)
///             .with_anchors(from, to),
///     )?;
/// }
///
/// let report = DefaultOffsetResolver::default().resolve(&mut graph);
/// assert_eq!(report.updated(), &[middle]);
/// assert_eq!(graph.anchor(middle).unwrap().offset(), Some(1.0));
/// # Ok::<(), annograph::GraphError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct DefaultOffsetResolver {
    config: ResolverConfig,
}

impl DefaultOffsetResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolves the offsets of every parent in the graph, top-down.
    ///
    /// Running the resolver again on its own output changes nothing.
    pub fn resolve(&self, graph: &mut Graph) -> ResolverReport {
        let mut report = ResolverReport::default();
        let plan: Vec<(LayerId, Vec<LayerId>)> = graph
            .schema()
            .layers()
            .filter(|layer| layer.parent().is_some())
            .map(|layer| (layer.id(), spread_layers(graph.schema(), layer.id())))
            .filter(|(_, children)| !children.is_empty())
            .collect();

        for (layer, child_layers) in plan {
            let parents: Vec<AnnotationId> =
                graph.all(layer).into_iter().map(|parent| parent.id()).collect();
            for parent in parents {
                self.resolve_parent(graph, parent, &child_layers, &mut report);
            }
        }

        debug!(
            graph:% = graph.id(),
            updated = report.updated.len(),
            deferred = report.deferred.len(),
            failures = report.failures.len();
            "Offsets resolved"
        );
        report
    }

    fn resolve_parent(
        &self,
        graph: &mut Graph,
        parent: AnnotationId,
        child_layers: &[LayerId],
        report: &mut ResolverReport,
    ) {
        let families: Vec<Vec<(AnchorId, AnchorId)>> = child_layers
            .iter()
            .map(|layer| {
                graph
                    .children(parent, *layer)
                    .filter_map(|child| Some((child.start()?, child.end()?)))
                    .collect::<Vec<_>>()
            })
            .filter(|children| !children.is_empty())
            .collect();
        if families.is_empty() {
            return;
        }

        let (start, end) = match graph.offsets(parent) {
            (None, _) => {
                report.deferred.push(Unresolved::new(parent, Missing::StartOffset));
                return;
            }
            (_, None) => {
                report.deferred.push(Unresolved::new(parent, Missing::EndOffset));
                return;
            }
            (Some(start), Some(end)) => (start, end),
        };
        let Some(annotation) = graph.annotation(parent) else {
            return;
        };
        let bounds = (
            (annotation.start(), start),
            (annotation.end(), end),
        );

        for children in families {
            let mut chain = self.chain(graph, bounds, &children);
            if let Err(err) = fill(&mut chain, parent) {
                warn!(annotation:% = parent, err:% = err; "Cannot spread offsets");
                report.failures.push((parent, err));
                continue;
            }
            let updates: Vec<(AnchorId, Option<f64>)> = chain
                .points
                .iter()
                .filter(|point| !point.trusted)
                .filter_map(|point| Some((point.anchor?, point.offset?)))
                .filter(|(anchor, offset)| {
                    !graph.anchor(*anchor).is_some_and(|current| {
                        current.offset() == Some(*offset)
                            && current.confidence() == self.config.confidence()
                    })
                })
                .map(|(anchor, offset)| (anchor, Some(offset)))
                .collect();
            if updates.is_empty() {
                continue;
            }
            match graph.set_offsets(&updates, self.config.confidence()) {
                Ok(()) => {
                    for (anchor, offset) in updates {
                        trace!(anchor:% = anchor, offset:? = offset; "Offset interpolated");
                        report.updated.push(anchor);
                    }
                }
                Err(err) => {
                    warn!(annotation:% = parent, err:% = err; "Cannot set offsets");
                    report.failures.push((parent, err));
                }
            }
        }
    }

    /// Builds the chain from the parent's start, through each child's start
    /// and end, to the parent's end.
    fn chain(
        &self,
        graph: &Graph,
        ((start_anchor, start), (end_anchor, end)): (
            (Option<AnchorId>, f64),
            (Option<AnchorId>, f64),
        ),
        children: &[(AnchorId, AnchorId)],
    ) -> Chain {
        let point = |anchor: AnchorId| {
            let current = graph.anchor(anchor);
            Point {
                anchor: Some(anchor),
                offset: current.and_then(|current| current.offset()),
                trusted: current.is_some_and(|current| {
                    current.offset().is_some()
                        && current.effective_confidence(self.config.unrated_confidence())
                            >= Confidence::Default
                }),
            }
        };

        let mut chain = Chain::default();
        chain.push(
            Point {
                anchor: start_anchor,
                offset: Some(start),
                trusted: true,
            },
            false,
        );
        for (child_start, child_end) in children {
            chain.push(point(*child_start), false);
            chain.push(point(*child_end), true);
        }
        chain.push(
            Point {
                anchor: end_anchor,
                offset: Some(end),
                trusted: true,
            },
            false,
        );
        chain
    }
}

/// Returns the child layers of `layer` whose annotations tile their parent
/// in order.
fn spread_layers(schema: &Schema, layer: LayerId) -> Vec<LayerId> {
    schema
        .children_of(layer)
        .filter(|child| {
            child.peers()
                && !child.peers_overlap()
                && child.alignment() == Alignment::Interval
                && child.parent_includes()
        })
        .map(|child| child.id())
        .collect()
}

/// Assigns offsets to the untrusted points of `chain`.
fn fill(chain: &mut Chain, parent: AnnotationId) -> Result<(), GraphError> {
    let trusted: Vec<usize> = chain
        .points
        .iter()
        .enumerate()
        .filter(|(_, point)| point.trusted)
        .map(|(index, _)| index)
        .collect();

    for pair in trusted.windows(2) {
        let (mut low, mut high) = (pair[0], pair[1]);
        if high - low < 2 {
            continue;
        }
        let (Some(start), Some(end)) = (chain.points[low].offset, chain.points[high].offset)
        else {
            continue;
        };
        if end < start {
            return Err(GraphError::StructuralViolation(Violation::new(
                Rule::EndBeforeStart,
                vec![parent],
                format!("cannot spread offsets between {start} and {end}"),
            )));
        }

        while low + 1 < high && !chain.linked[low] {
            chain.points[low + 1].offset = chain.points[low].offset;
            low += 1;
        }
        while high - 1 > low && !chain.linked[high - 1] {
            chain.points[high - 1].offset = chain.points[high].offset;
            high -= 1;
        }

        let (Some(start), Some(end)) = (chain.points[low].offset, chain.points[high].offset)
        else {
            continue;
        };
        let steps = (high - low) as f64;
        for (step, index) in (low + 1..high).enumerate() {
            chain.points[index].offset = Some(start + (end - start) * (step + 1) as f64 / steps);
        }
    }
    Ok(())
}
