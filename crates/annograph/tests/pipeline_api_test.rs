//! Integration tests for the Pipeline API
//!
//! These tests run offset resolution and label mapping end to end through
//! the public API.

use annograph::{
    Alignment, AnchorId, AnnographError, AppConfig, ChangeTarget, ConfigError, Confidence, Graph,
    Layer, MapperConfig, NewAnnotation, Pipeline, ResolverConfig, Schema, StepOperation,
};

fn schema() -> Schema {
    let mut schema = Schema::new();
    schema
        .add_layer(
            Layer::new("utterance")
                .with_alignment(Alignment::Interval)
                .with_peers(true),
        )
        .unwrap();
    schema
        .add_layer(
            Layer::new("word")
                .with_parent("utterance")
                .with_alignment(Alignment::Interval)
                .with_peers(true)
                .with_saturated(true),
        )
        .unwrap();
    schema
        .add_layer(
            Layer::new("phone")
                .with_parent("utterance")
                .with_alignment(Alignment::Interval)
                .with_peers(true),
        )
        .unwrap();
    schema.add_layer(Layer::new("pos").with_parent("word")).unwrap();
    schema
}

/// Builds one utterance. Tokens are `(label, start, end)` with offsets in
/// whole seconds.
fn graph(id: &str, words: &[(&str, u32, u32)], phones: &[(&str, u32, u32)]) -> Graph {
    let mut graph = Graph::new(id, schema());
    let end = words
        .iter()
        .chain(phones)
        .map(|(_, _, end)| *end)
        .max()
        .unwrap_or(1);
    let at = |graph: &mut Graph, offset: u32| {
        graph
            .get_or_create_anchor_at(f64::from(offset), Confidence::Manual)
            .unwrap()
    };
    let (start, end) = (at(&mut graph, 0), at(&mut graph, end));
    let utterance = graph
        .add_annotation(
            NewAnnotation::new("utterance", "u")
                .with_id("u")
                .with_anchors(start, end),
        )
        .unwrap();
    for (layer, tokens) in [("word", words), ("phone", phones)] {
        for (label, from, to) in tokens {
            let (from, to) = (at(&mut graph, *from), at(&mut graph, *to));
            graph
                .add_annotation(
                    NewAnnotation::new(layer, *label)
                        .with_parent(utterance)
                        .with_anchors(from, to),
                )
                .unwrap();
        }
    }
    graph.take_changes();
    graph
}

fn mapping_pipeline(config: MapperConfig) -> Pipeline {
    Pipeline::new(AppConfig::new(ResolverConfig::default(), Some(config))).unwrap()
}

#[test]
fn test_tagging_twice_records_one_change() {
    let mut graph = graph("tags", &[("run", 0, 1)], &[]);
    let word = graph.first("word".into()).unwrap().id();

    let first = graph.tag(word, "pos".into(), "VB").unwrap();
    let second = graph.tag(word, "pos".into(), "VB").unwrap();

    assert_eq!(first, second);
    assert_eq!(graph.changes().len(), 1);
    assert_eq!(graph.labels("pos".into()), vec!["VB"]);
}

#[test]
fn test_saturated_children_are_spread_evenly() {
    let mut graph = Graph::new("spread", schema());
    let start = graph.create_anchor(Some(2.0), Confidence::Manual).unwrap();
    let mut anchors: Vec<AnchorId> = vec![start];
    for _ in 0..4 {
        anchors.push(graph.create_anchor(None, Confidence::None).unwrap());
    }
    anchors.push(graph.create_anchor(Some(7.0), Confidence::Manual).unwrap());
    let utterance = graph
        .add_annotation(NewAnnotation::new("utterance", "u").with_anchors(anchors[0], anchors[5]))
        .unwrap();
    for (index, label) in ["one", "two", "three", "four", "five"].into_iter().enumerate() {
        graph
            .add_annotation(
                NewAnnotation::new("word", label)
                    .with_parent(utterance)
                    .with_anchors(anchors[index], anchors[index + 1]),
            )
            .unwrap();
    }

    let outcome = Pipeline::default().process(&mut graph).unwrap();

    assert_eq!(outcome.resolved().updated().len(), 4);
    for (index, anchor) in anchors.iter().enumerate() {
        let anchor = graph.anchor(*anchor).unwrap();
        assert_eq!(anchor.offset(), Some(2.0 + index as f64));
    }
    assert_eq!(graph.anchor(anchors[1]).unwrap().confidence(), Confidence::Default);
    assert!(graph.validate().is_ok());
}

#[test]
fn test_processing_twice_changes_nothing() {
    let mut graph = graph(
        "twice",
        &[("walked", 0, 4)],
        &[("w", 0, 1), ("aa", 1, 2), ("k", 2, 3), ("t", 3, 4)],
    );
    let pipeline = mapping_pipeline(MapperConfig::new("word", "phone"));
    pipeline.process(&mut graph).unwrap();
    graph.take_changes();

    let outcome = pipeline.process(&mut graph).unwrap();
    assert!(outcome.resolved().updated().is_empty());
    assert!(graph.changes().is_empty());
}

#[test]
fn test_one_word_maps_onto_all_its_phones() {
    let mut graph = graph(
        "walked",
        &[("walked", 0, 4)],
        &[("w", 0, 1), ("aa", 1, 2), ("k", 2, 3), ("t", 3, 4)],
    );
    let outcome = mapping_pipeline(MapperConfig::new("word", "phone"))
        .process(&mut graph)
        .unwrap();

    let report = outcome.mapped().unwrap();
    let entries: Vec<_> = report.entries().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation(), StepOperation::Change);
    assert_eq!(entries[0].sources().len(), 1);
    assert_eq!(entries[0].targets().len(), 4);

    let mapping = graph.annotation(entries[0].mapping().unwrap()).unwrap();
    assert_eq!(mapping.label(), "w aa k t");
    assert_eq!(graph.offsets(mapping.id()), (Some(0.0), Some(4.0)));
    assert_eq!(report.mean_overlap_rate(), Some(1.0));
}

#[test]
fn test_one_to_one_mappings_share_target_anchors() {
    let mut graph = graph("sang", &[("I", 0, 1), ("sang", 1, 3)], &[("2", 0, 1), ("s{N", 1, 3)]);
    let outcome = mapping_pipeline(MapperConfig::new("word", "phone").with_mapping_layer("phonemes"))
        .process(&mut graph)
        .unwrap();

    let blocks: Vec<(usize, usize)> = outcome
        .mapped()
        .unwrap()
        .entries()
        .map(|entry| (entry.sources().len(), entry.targets().len()))
        .collect();
    assert_eq!(blocks, vec![(1, 1), (1, 1)]);

    let phones = graph.all("phone".into());
    let mappings = graph.all("phonemes".into());
    assert_eq!(mappings.len(), 2);
    for (mapping, phone) in mappings.iter().zip(&phones) {
        assert_eq!(mapping.label(), phone.label());
        assert_eq!(mapping.start(), phone.start());
        assert_eq!(mapping.end(), phone.end());
        assert_eq!(mapping.attributes().targets(), &[phone.id()]);
    }
    assert!(graph.validate().is_ok());
}

#[test]
fn test_incremental_edit_touches_one_mapping() {
    let tokens: Vec<(String, u32, u32)> = (0..10)
        .map(|index| (format!("t{index}"), index, index + 1))
        .collect();
    let tokens: Vec<(&str, u32, u32)> = tokens
        .iter()
        .map(|(label, start, end)| (label.as_str(), *start, *end))
        .collect();
    let mut graph = graph("edit", &tokens, &tokens);
    let config = MapperConfig::new("word", "phone");
    mapping_pipeline(config.clone()).process(&mut graph).unwrap();
    graph.take_changes();

    let third = graph.all("word".into())[2].id();
    graph.set_label(third, "t2x").unwrap();
    let edited = graph.changes().len();

    let incremental = Pipeline::new(
        AppConfig::new(ResolverConfig::default(), Some(config)).with_incremental(true),
    )
    .unwrap();
    incremental.process(&mut graph).unwrap();

    let touched: Vec<ChangeTarget> = graph.changes()[edited..]
        .iter()
        .map(|change| change.target())
        .collect();
    assert_eq!(touched.len(), 1);
    let ChangeTarget::Annotation(mapping) = touched[0] else {
        panic!("expected an annotation change, found {:?}", touched[0]);
    };
    assert_eq!(graph.annotation(mapping).unwrap().parent(), Some(third));
}

#[test]
fn test_batch_isolates_failing_graphs() {
    let good = graph("good", &[("a", 0, 1)], &[("a", 0, 1)]);
    let mut schema = Schema::new();
    schema
        .add_layer(Layer::new("word").with_alignment(Alignment::Interval))
        .unwrap();
    let bad = Graph::new("bad", schema);

    let report = mapping_pipeline(MapperConfig::new("word", "phone"))
        .process_batch(vec![good, bad]);

    assert_eq!(report.items().len(), 2);
    assert_eq!(report.succeeded().count(), 1);
    let items = report.into_items();
    assert_eq!(items[0].graph().id(), "good");
    assert_eq!(items[0].graph().all("word-phone".into()).len(), 1);
    assert!(matches!(
        items[1].outcome(),
        Err(AnnographError::Config(ConfigError::UnknownLayer { field: "target_layer", .. }))
    ));
}

#[test]
fn test_config_from_toml_drives_pipeline() {
    let config = AppConfig::from_toml(
        r#"
        validate = true

        [resolver]
        confidence = "default"

        [mapper]
        source_layer = "word"
        target_layer = "phone"
        comparator = "Normalized"
        "#,
    )
    .unwrap();
    let mut graph = graph("toml", &[("Hello!", 0, 1)], &[("hello", 0, 1)]);
    let outcome = Pipeline::new(config).unwrap().process(&mut graph).unwrap();

    let entries: Vec<_> = outcome.mapped().unwrap().entries().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation(), StepOperation::None);
    assert_eq!(graph.labels("word-phone".into()), vec!["hello"]);
}
