//! Layer schema.
//!
//! A [`Schema`] is the set of [`Layer`]s of a graph, arranged in a tree
//! under a root layer that stands for the graph itself. Layers are added
//! parent first, so the tree can never contain a cycle and insertion order
//! is always a valid top-down order.
//!
//! # Example
//!
//! ```
//! # use annograph_core::{Alignment, Layer, Schema};
//! let mut schema = Schema::new();
//! schema.add_layer(Layer::new("turn").with_alignment(Alignment::Interval).with_peers(true))?;
//! schema.add_layer(
//!     Layer::new("word")
//!         .with_parent("turn")
//!         .with_alignment(Alignment::Interval)
//!         .with_peers(true),
//! )?;
//! let schema = schema.with_turn_layer("turn").with_word_layer("word");
//!
//! assert_eq!(schema.common_ancestor("word".into(), "turn".into()), Some("turn".into()));
//! # Ok::<(), annograph_core::GraphError>(())
//! ```

use indexmap::IndexMap;
use log::trace;

use crate::{
    error::{GraphError, Result},
    identifier::LayerId,
    layer::{Alignment, Layer},
};

/// Id of the root layer when none is given.
pub const DEFAULT_ROOT_LAYER: &str = "transcript";

/// The layers of a graph and the designated structural layers.
#[derive(Debug, Clone)]
pub struct Schema {
    root: LayerId,
    layers: IndexMap<LayerId, Layer>,
    participant_layer: Option<LayerId>,
    turn_layer: Option<LayerId>,
    utterance_layer: Option<LayerId>,
    word_layer: Option<LayerId>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    /// Creates a schema whose root layer is [`DEFAULT_ROOT_LAYER`].
    pub fn new() -> Self {
        Self::with_root(DEFAULT_ROOT_LAYER)
    }

    /// Creates a schema with the given root layer id.
    pub fn with_root(root: impl Into<LayerId>) -> Self {
        let root = root.into();
        let mut layers = IndexMap::new();
        layers.insert(
            root,
            Layer::new(root)
                .with_alignment(Alignment::Interval)
                .with_parent_includes(false),
        );
        Self {
            root,
            layers,
            participant_layer: None,
            turn_layer: None,
            utterance_layer: None,
            word_layer: None,
        }
    }

    /// Adds a layer.
    ///
    /// A layer without a parent becomes a child of the root.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateId`] if the id is taken and
    /// [`GraphError::UnknownLayer`] if the parent has not been added yet.
    pub fn add_layer(&mut self, mut layer: Layer) -> Result<()> {
        if self.layers.contains_key(&layer.id()) {
            return Err(GraphError::DuplicateId(layer.id().to_string()));
        }
        let parent = layer.parent().unwrap_or(self.root);
        if !self.layers.contains_key(&parent) {
            return Err(GraphError::UnknownLayer(parent));
        }
        layer.set_parent(Some(parent));
        trace!(layer:% = layer.id(), parent:% = parent; "Layer added");
        self.layers.insert(layer.id(), layer);
        Ok(())
    }

    pub fn with_participant_layer(mut self, layer: impl Into<LayerId>) -> Self {
        self.participant_layer = Some(layer.into());
        self
    }

    pub fn with_turn_layer(mut self, layer: impl Into<LayerId>) -> Self {
        self.turn_layer = Some(layer.into());
        self
    }

    pub fn with_utterance_layer(mut self, layer: impl Into<LayerId>) -> Self {
        self.utterance_layer = Some(layer.into());
        self
    }

    pub fn with_word_layer(mut self, layer: impl Into<LayerId>) -> Self {
        self.word_layer = Some(layer.into());
        self
    }

    pub fn root_id(&self) -> LayerId {
        self.root
    }

    pub fn root(&self) -> &Layer {
        &self.layers[&self.root]
    }

    pub fn participant_layer(&self) -> Option<LayerId> {
        self.participant_layer
    }

    pub fn turn_layer(&self) -> Option<LayerId> {
        self.turn_layer
    }

    pub fn utterance_layer(&self) -> Option<LayerId> {
        self.utterance_layer
    }

    pub fn word_layer(&self) -> Option<LayerId> {
        self.word_layer
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(&id)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.layers.contains_key(&id)
    }

    /// Iterates over all layers top-down, root first.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    /// Iterates over the direct child layers of `id`.
    pub fn children_of(&self, id: LayerId) -> impl Iterator<Item = &Layer> {
        self.layers
            .values()
            .filter(move |layer| layer.parent() == Some(id))
    }

    /// Returns `true` for layers whose parent is the root.
    pub fn is_top_level(&self, id: LayerId) -> bool {
        self.layer(id).and_then(Layer::parent) == Some(self.root)
    }

    /// Returns the ancestors of `id`, nearest first and ending with the root.
    pub fn ancestors(&self, id: LayerId) -> Vec<LayerId> {
        let mut ancestors = Vec::new();
        let mut current = self.layer(id).and_then(Layer::parent);
        while let Some(layer) = current {
            ancestors.push(layer);
            current = self.layer(layer).and_then(Layer::parent);
        }
        ancestors
    }

    /// Returns `true` if `ancestor` is a proper ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: LayerId, id: LayerId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// Returns the path of layers from the root down to `id`, inclusive.
    pub fn path_from_root(&self, id: LayerId) -> Vec<LayerId> {
        let mut path = self.ancestors(id);
        path.reverse();
        path.push(id);
        path
    }

    /// Returns the nearest layer that is `a`, `b` or an ancestor of both.
    pub fn common_ancestor(&self, a: LayerId, b: LayerId) -> Option<LayerId> {
        if !self.contains(a) || !self.contains(b) {
            return None;
        }
        let b_path = self.path_from_root(b);
        std::iter::once(a)
            .chain(self.ancestors(a))
            .find(|layer| b_path.contains(layer))
    }

    /// Returns the depth of `id` below the root; the root has depth 0.
    pub fn depth(&self, id: LayerId) -> usize {
        self.ancestors(id).len()
    }
}
