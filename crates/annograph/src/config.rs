//! Configuration types for annograph processing.
//!
//! All types implement [`serde::Deserialize`], so they load from TOML or,
//! for the mapper, from a flat key/value map as handed over by an importer.
//! Deserialization checks the shape of the configuration; checks against a
//! graph's schema happen when a [`LabelMapper`](crate::LabelMapper) is built,
//! before anything is mutated.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining resolver and mapper
//!   settings.
//! - [`ResolverConfig`] - Confidence levels used by the offset resolver.
//! - [`MapperConfig`] - Layers and comparator used by the label mapper.
//!
//! # Example
//!
//! ```
//! # use annograph::config::AppConfig;
//! let config = AppConfig::from_toml(
//!     r#"
//!     [mapper]
//!     source_layer = "word"
//!     target_layer = "phone"
//!     comparator = "OrthographyToDISC"
//!     "#,
//! )?;
//! assert_eq!(config.mapper().unwrap().mapping_layer(), "word-phone");
//! # Ok::<(), annograph::ConfigError>(())
//! ```

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use annograph_align::{ComparatorError, LabelSplit};
use annograph_core::Confidence;

/// Errors in configuration, raised before any graph is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Deserialize(String),

    #[error("failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("`{field}` names unknown layer `{layer}`")]
    UnknownLayer { field: &'static str, layer: String },

    #[error("`{first}` and `{second}` both name layer `{layer}`")]
    SameLayer {
        first: &'static str,
        second: &'static str,
        layer: String,
    },

    #[error("`{field}` layer `{layer}` has no anchors to map onto")]
    UnalignedLayer { field: &'static str, layer: String },

    #[error("mapping layer `{layer}` exists but is not an interval child of `{source_layer}`")]
    MappingLayerConflict { layer: String, source_layer: String },

    #[error("scope layer `{layer}` cannot contain `{source_layer}` and `{target_layer}`")]
    ScopeLayer {
        layer: String,
        source_layer: String,
        target_layer: String,
    },

    #[error("`{field}` layer `{layer}` is not below `{ancestor}`")]
    NotBelow {
        field: &'static str,
        layer: String,
        ancestor: String,
    },

    #[error("`sub_source_layer` and `sub_target_layer` must be set together")]
    IncompleteSubMapping,

    #[error("sub-mapping cannot be combined with `split_labels`")]
    SplitSubMapping,

    #[error(transparent)]
    Comparator(#[from] ComparatorError),
}

/// Reads a layer id, treating a blank value as absent.
fn optional_layer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let layer = String::deserialize(deserializer)?;
    Ok(Some(layer).filter(|layer| !layer.trim().is_empty()))
}

/// Reads a label split, treating a blank value as no splitting.
fn optional_split<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<LabelSplit>, D::Error> {
    let split = String::deserialize(deserializer)?;
    if split.trim().is_empty() {
        return Ok(None);
    }
    split.parse().map(Some).map_err(serde::de::Error::custom)
}

fn default_comparator() -> String {
    "Default".to_string()
}

// =============================================================================
// AppConfig
// =============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    resolver: ResolverConfig,

    /// Label mapping is skipped when absent.
    #[serde(default)]
    mapper: Option<MapperConfig>,

    /// Re-map only what the change ledger shows as changed.
    #[serde(default)]
    incremental: bool,

    /// Validate the whole graph after processing.
    #[serde(default)]
    validate: bool,
}

impl AppConfig {
    pub fn new(resolver: ResolverConfig, mapper: Option<MapperConfig>) -> Self {
        Self {
            resolver,
            mapper,
            incremental: false,
            validate: false,
        }
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] for malformed TOML, unknown keys or
    /// missing required fields.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn with_incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn resolver(&self) -> &ResolverConfig {
        &self.resolver
    }

    pub fn mapper(&self) -> Option<&MapperConfig> {
        self.mapper.as_ref()
    }

    pub fn incremental(&self) -> bool {
        self.incremental
    }

    pub fn validate(&self) -> bool {
        self.validate
    }
}

// =============================================================================
// ResolverConfig
// =============================================================================

fn default_resolver_confidence() -> Confidence {
    Confidence::Default
}

fn default_unrated_confidence() -> Confidence {
    Confidence::Manual
}

/// Confidence levels used by the
/// [`DefaultOffsetResolver`](crate::DefaultOffsetResolver).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    /// Confidence given to interpolated offsets.
    #[serde(default = "default_resolver_confidence")]
    confidence: Confidence,

    /// Confidence assumed for anchors that have an offset but no rating.
    #[serde(default = "default_unrated_confidence")]
    unrated_confidence: Confidence,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            confidence: default_resolver_confidence(),
            unrated_confidence: default_unrated_confidence(),
        }
    }
}

impl ResolverConfig {
    pub fn new(confidence: Confidence, unrated_confidence: Confidence) -> Self {
        Self {
            confidence,
            unrated_confidence,
        }
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn unrated_confidence(&self) -> Confidence {
        self.unrated_confidence
    }
}

// =============================================================================
// MapperConfig
// =============================================================================

/// Layers and comparator of a label mapping run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapperConfig {
    source_layer: String,

    target_layer: String,

    /// Defaults to `{source_layer}-{target_layer}`.
    #[serde(default, deserialize_with = "optional_layer")]
    mapping_layer: Option<String>,

    /// Defaults to the nearest layer containing both source and target.
    #[serde(default, deserialize_with = "optional_layer")]
    scope_layer: Option<String>,

    #[serde(default = "default_comparator")]
    comparator: String,

    /// Cuts each source label into tokens (`char` or `space`) that are
    /// aligned one by one.
    #[serde(default, deserialize_with = "optional_split")]
    split_labels: Option<LabelSplit>,

    /// Layer below the source whose tokens are aligned within each mapped
    /// block.
    #[serde(default, deserialize_with = "optional_layer")]
    sub_source_layer: Option<String>,

    /// Layer below the target that the sub-source tokens are aligned with.
    #[serde(default, deserialize_with = "optional_layer")]
    sub_target_layer: Option<String>,

    /// Defaults to `{sub_source_layer}-{sub_target_layer}`.
    #[serde(default, deserialize_with = "optional_layer")]
    sub_mapping_layer: Option<String>,

    #[serde(default = "default_comparator")]
    sub_comparator: String,
}

/// Layers and comparator of a sub-mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubMapping<'a> {
    pub source_layer: &'a str,
    pub target_layer: &'a str,
    pub mapping_layer: Option<&'a str>,
    pub comparator: &'a str,
}

impl MapperConfig {
    pub fn new(source_layer: impl Into<String>, target_layer: impl Into<String>) -> Self {
        Self {
            source_layer: source_layer.into(),
            target_layer: target_layer.into(),
            mapping_layer: None,
            scope_layer: None,
            comparator: default_comparator(),
            split_labels: None,
            sub_source_layer: None,
            sub_target_layer: None,
            sub_mapping_layer: None,
            sub_comparator: default_comparator(),
        }
    }

    /// Builds a configuration from key/value pairs.
    ///
    /// Keys are the field names (`source_layer`, `target_layer`,
    /// `mapping_layer`, `scope_layer`, `comparator`, `split_labels`,
    /// `sub_source_layer`, `sub_target_layer`, `sub_mapping_layer`,
    /// `sub_comparator`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Deserialize`] naming the missing or unknown
    /// field.
    ///
    /// # Example
    ///
    /// ```
    /// # use annograph::config::MapperConfig;
    /// let config = MapperConfig::from_map([
    ///     ("source_layer", "word"),
    ///     ("target_layer", "segment"),
    ///     ("comparator", "DISCToDISC"),
    /// ])?;
    /// assert_eq!(config.scope_layer(), None);
    /// # Ok::<(), annograph::ConfigError>(())
    /// ```
    pub fn from_map<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self, ConfigError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()));
        let deserializer =
            serde::de::value::MapDeserializer::<_, serde::de::value::Error>::new(pairs);
        Self::deserialize(deserializer).map_err(|err| ConfigError::Deserialize(err.to_string()))
    }

    /// Parses a TOML document holding only the mapper fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] for malformed TOML, unknown keys or
    /// missing required fields.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn with_mapping_layer(mut self, layer: impl Into<String>) -> Self {
        self.mapping_layer = Some(layer.into());
        self
    }

    pub fn with_scope_layer(mut self, layer: impl Into<String>) -> Self {
        self.scope_layer = Some(layer.into());
        self
    }

    pub fn with_comparator(mut self, comparator: impl Into<String>) -> Self {
        self.comparator = comparator.into();
        self
    }

    pub fn with_split_labels(mut self, split: LabelSplit) -> Self {
        self.split_labels = Some(split);
        self
    }

    /// Aligns tokens of `source_layer` with tokens of `target_layer` within
    /// each mapped block.
    pub fn with_sub_mapping(
        mut self,
        source_layer: impl Into<String>,
        target_layer: impl Into<String>,
        comparator: impl Into<String>,
    ) -> Self {
        self.sub_source_layer = Some(source_layer.into());
        self.sub_target_layer = Some(target_layer.into());
        self.sub_comparator = comparator.into();
        self
    }

    pub fn with_sub_mapping_layer(mut self, layer: impl Into<String>) -> Self {
        self.sub_mapping_layer = Some(layer.into());
        self
    }

    pub fn source_layer(&self) -> &str {
        &self.source_layer
    }

    pub fn target_layer(&self) -> &str {
        &self.target_layer
    }

    /// Returns the mapping layer id, defaulting to
    /// `{source_layer}-{target_layer}`.
    pub fn mapping_layer(&self) -> String {
        self.mapping_layer
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.source_layer, self.target_layer))
    }

    pub fn scope_layer(&self) -> Option<&str> {
        self.scope_layer.as_deref()
    }

    pub fn comparator(&self) -> &str {
        &self.comparator
    }

    pub fn split_labels(&self) -> Option<LabelSplit> {
        self.split_labels
    }

    /// Returns the sub-mapping settings, if configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IncompleteSubMapping`] if only one of
    /// `sub_source_layer` and `sub_target_layer` is set.
    pub fn sub_mapping(&self) -> Result<Option<SubMapping<'_>>, ConfigError> {
        match (&self.sub_source_layer, &self.sub_target_layer) {
            (None, None) => Ok(None),
            (Some(source_layer), Some(target_layer)) => Ok(Some(SubMapping {
                source_layer,
                target_layer,
                mapping_layer: self.sub_mapping_layer.as_deref(),
                comparator: &self.sub_comparator,
            })),
            _ => Err(ConfigError::IncompleteSubMapping),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.resolver().confidence(), Confidence::Default);
        assert_eq!(config.resolver().unrated_confidence(), Confidence::Manual);
        assert!(config.mapper().is_none());
        assert!(!config.incremental());
    }

    #[test]
    fn test_from_toml() {
        let config = AppConfig::from_toml(
            r#"
            incremental = true

            [resolver]
            unrated_confidence = "automatic"

            [mapper]
            source_layer = "word"
            target_layer = "phone"
            mapping_layer = "word-phones"
            scope_layer = "utterance"
            "#,
        )
        .unwrap();
        assert!(config.incremental());
        assert_eq!(config.resolver().unrated_confidence(), Confidence::Automatic);
        let mapper = config.mapper().unwrap();
        assert_eq!(mapper.mapping_layer(), "word-phones");
        assert_eq!(mapper.scope_layer(), Some("utterance"));
        assert_eq!(mapper.comparator(), "Default");
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        assert!(matches!(
            AppConfig::from_toml("[resolver]\nconfidense = \"manual\"\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_from_map() {
        let config = MapperConfig::from_map([
            ("source_layer", "word"),
            ("target_layer", "phone"),
            ("scope_layer", ""),
        ])
        .unwrap();
        assert_eq!(config, MapperConfig::new("word", "phone"));
        assert_eq!(config.mapping_layer(), "word-phone");
    }

    #[test]
    fn test_from_map_names_bad_fields() {
        let err = MapperConfig::from_map([("source_layer", "word")]).unwrap_err();
        assert!(err.to_string().contains("target_layer"), "{err}");

        let err = MapperConfig::from_map([
            ("source_layer", "word"),
            ("target_layer", "phone"),
            ("colour", "red"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("colour"), "{err}");
    }

    #[test]
    fn test_from_map_reads_split_and_sub_mapping() {
        let config = MapperConfig::from_map([
            ("source_layer", "transcript"),
            ("target_layer", "phone"),
            ("split_labels", "char"),
        ])
        .unwrap();
        assert_eq!(config.split_labels(), Some(LabelSplit::Chars));
        assert_eq!(config.sub_mapping().unwrap(), None);

        let err = MapperConfig::from_map([
            ("source_layer", "transcript"),
            ("target_layer", "phone"),
            ("split_labels", "syllable"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("syllable"), "{err}");

        let config = MapperConfig::from_toml(
            r#"
            source_layer = "word"
            target_layer = "token"
            split_labels = ""
            sub_source_layer = "phoneme"
            sub_target_layer = "segment"
            sub_comparator = "DISCToDISC"
            "#,
        )
        .unwrap();
        assert_eq!(config.split_labels(), None);
        let sub = config.sub_mapping().unwrap().unwrap();
        assert_eq!(sub.source_layer, "phoneme");
        assert_eq!(sub.mapping_layer, None);
        assert_eq!(sub.comparator, "DISCToDISC");

        let half = MapperConfig::from_map([
            ("source_layer", "word"),
            ("target_layer", "token"),
            ("sub_source_layer", "phoneme"),
        ])
        .unwrap();
        assert!(matches!(half.sub_mapping(), Err(ConfigError::IncompleteSubMapping)));
    }
}
