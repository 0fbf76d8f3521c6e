//! Layer definitions.
//!
//! A [`Layer`] is the rule set for one tier of annotation: how its
//! annotations are anchored, how many of them a parent may own, and how they
//! relate in time to each other and to their parent.
//!
//! # Example
//!
//! ```
//! # use annograph_core::{Alignment, Layer};
//! let phone = Layer::new("phone")
//!     .with_parent("word")
//!     .with_alignment(Alignment::Interval)
//!     .with_peers(true)
//!     .with_saturated(true);
//!
//! assert!(phone.peers());
//! assert!(!phone.peers_overlap());
//! assert!(phone.parent_includes());
//! ```

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::identifier::LayerId;

/// How annotations on a layer are anchored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Unanchored tags that inherit their extent from their parent.
    #[default]
    None,
    /// A single point: start and end are the same anchor.
    Instant,
    /// A span with distinct start and end anchors.
    Interval,
}

impl Alignment {
    /// Returns `true` unless annotations on the layer are unanchored tags.
    pub fn is_anchored(self) -> bool {
        self != Self::None
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Instant => "instant",
            Self::Interval => "interval",
        };
        f.write_str(name)
    }
}

impl FromStr for Alignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "0" => Ok(Self::None),
            "instant" | "1" => Ok(Self::Instant),
            "interval" | "2" => Ok(Self::Interval),
            other => Err(format!("unknown alignment `{other}`")),
        }
    }
}

/// Structural rules for one tier of annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    id: LayerId,
    parent: Option<LayerId>,
    description: String,
    alignment: Alignment,
    peers: bool,
    peers_overlap: bool,
    saturated: bool,
    parent_includes: bool,
}

impl Layer {
    /// Creates a layer with the default rules: unanchored, one annotation
    /// per parent, contained in the parent.
    ///
    /// A layer without an explicit parent becomes a child of the schema root
    /// when it is added to a [`Schema`](crate::Schema).
    pub fn new(id: impl Into<LayerId>) -> Self {
        Self {
            id: id.into(),
            parent: None,
            description: String::new(),
            alignment: Alignment::None,
            peers: false,
            peers_overlap: false,
            saturated: false,
            parent_includes: true,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<LayerId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Allows a parent to own more than one annotation on this layer.
    pub fn with_peers(mut self, peers: bool) -> Self {
        self.peers = peers;
        self
    }

    /// Allows sibling annotations on this layer to overlap in time.
    pub fn with_peers_overlap(mut self, peers_overlap: bool) -> Self {
        self.peers_overlap = peers_overlap;
        self
    }

    /// Requires sibling annotations to tile their parent without gaps.
    pub fn with_saturated(mut self, saturated: bool) -> Self {
        self.saturated = saturated;
        self
    }

    /// Requires annotations to lie within their parent's extent.
    pub fn with_parent_includes(mut self, parent_includes: bool) -> Self {
        self.parent_includes = parent_includes;
        self
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Returns the parent layer, or `None` for the schema root.
    pub fn parent(&self) -> Option<LayerId> {
        self.parent
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    pub fn peers(&self) -> bool {
        self.peers
    }

    pub fn peers_overlap(&self) -> bool {
        self.peers_overlap
    }

    pub fn saturated(&self) -> bool {
        self.saturated
    }

    pub fn parent_includes(&self) -> bool {
        self.parent_includes
    }

    pub(crate) fn set_parent(&mut self, parent: Option<LayerId>) {
        self.parent = parent;
    }
}
