//! Property checks over the parser's structural invariants and the
//! ranking's weight sensitivity.

use proptest::prelude::*;
use searchmix_core::{
    AddInput, AddOptions, Config, MarkdownParser, SearchMix, SearchOptions, Weights,
};
use tempfile::TempDir;

proptest! {
    /// Section tree integrity: every referenced id resolves, the parent
    /// relation is acyclic, and depth strictly increases root to leaf.
    #[test]
    fn section_tree_integrity(
        headings in prop::collection::vec((1u8..=6, "[a-z]{2,8}( [a-z]{2,8})?"), 1..12),
        trailing in "[a-z ]{0,40}",
    ) {
        let mut markdown = String::new();
        for (depth, text) in &headings {
            markdown.push_str(&"#".repeat(usize::from(*depth)));
            markdown.push(' ');
            markdown.push_str(text);
            markdown.push_str("\n\nparagraph under it\n\n");
        }
        markdown.push_str(&trailing);

        let parsed = MarkdownParser::new().unwrap().parse(&markdown, false).unwrap();

        for id in &parsed.structure {
            prop_assert!(parsed.sections_index.contains_key(id));
        }
        for section in parsed.sections_index.values() {
            for child in &section.children_ids {
                let child = &parsed.sections_index[child];
                prop_assert_eq!(child.parent_id.as_deref(), Some(section.id.as_str()));
                prop_assert!(child.depth > section.depth);
            }
            if let Some(parent) = &section.parent_id {
                prop_assert!(parsed.sections_index.contains_key(parent));
            }
            // Walking up terminates at a root without revisiting anyone.
            let mut seen = vec![section.id.clone()];
            let mut current = section.parent_id.clone();
            while let Some(pid) = current {
                prop_assert!(!seen.contains(&pid), "cycle through {pid}");
                seen.push(pid.clone());
                current = parsed.sections_index[&pid].parent_id.clone();
            }
        }
    }

    /// Content blocks land inside their owning section's span range.
    #[test]
    fn content_follows_its_heading(
        texts in prop::collection::vec("[a-z]{3,10}", 2..6),
    ) {
        let mut markdown = String::new();
        for (i, text) in texts.iter().enumerate() {
            markdown.push_str(&format!("## heading {i}\n\n{text} paragraph\n\n"));
        }
        let parsed = MarkdownParser::new().unwrap().parse(&markdown, false).unwrap();

        for section in parsed.sections_index.values() {
            for block in &section.content {
                prop_assert!(block.position.start >= section.position.end);
            }
        }
    }
}

fn engine_with_weights(dir: &TempDir, weights: Weights) -> SearchMix {
    let config = Config {
        db_path: dir.path().join("index"),
        weights,
        ..Config::default()
    };
    SearchMix::new(config).unwrap()
}

async fn seed_two_field_docs(mix: &SearchMix) -> (String, String) {
    let h6 = mix
        .add(
            AddInput::buffer("# Page One\n\n###### zebra\n\nfiller text here\n"),
            AddOptions::default(),
        )
        .await
        .unwrap();
    let h4 = mix
        .add(
            AddInput::buffer("# Page Two\n\n#### zebra\n\nfiller text here\n"),
            AddOptions::default(),
        )
        .await
        .unwrap();
    (h6.indexed[0].clone(), h4.indexed[0].clone())
}

#[tokio::test]
async fn raising_a_field_weight_promotes_its_matches() {
    // Default weights: h4 (3.0) outranks h6 (1.5).
    let dir = TempDir::new().unwrap();
    let mix = engine_with_weights(&dir, Weights::default());
    let (h6_path, h4_path) = seed_two_field_docs(&mix).await;

    let response = mix
        .search(
            "zebra",
            SearchOptions {
                snippets_per_doc: 1,
                ..SearchOptions::default()
            },
        )
        .unwrap();
    let order: Vec<&str> = response
        .results
        .iter()
        .map(|s| s.document_path.as_str())
        .collect();
    assert_eq!(order, vec![h4_path.as_str(), h6_path.as_str()]);

    // With h6 boosted far above h4, the order flips.
    let dir2 = TempDir::new().unwrap();
    let boosted = engine_with_weights(
        &dir2,
        Weights {
            h6: 50.0,
            ..Weights::default()
        },
    );
    let (h6_path, h4_path) = seed_two_field_docs(&boosted).await;
    let response = boosted
        .search(
            "zebra",
            SearchOptions {
                snippets_per_doc: 1,
                ..SearchOptions::default()
            },
        )
        .unwrap();
    let order: Vec<&str> = response
        .results
        .iter()
        .map(|s| s.document_path.as_str())
        .collect();
    assert_eq!(order, vec![h6_path.as_str(), h4_path.as_str()]);
}

#[tokio::test]
async fn every_snippet_section_resolves() {
    let dir = TempDir::new().unwrap();
    let mix = engine_with_weights(&dir, Weights::default());
    mix.add(
        AddInput::buffer(
            "intro before headings mentioning topic\n\n# Topic Guide\n\n\
             ## First topic\n\ndetails about the topic\n\n\
             ## Second\n\nmore topic text\n",
        ),
        AddOptions::default(),
    )
    .await
    .unwrap();

    let response = mix.search("topic", SearchOptions::default()).unwrap();
    assert!(!response.results.is_empty());
    for snippet in &response.results {
        let record = mix
            .get(&snippet.document_path, searchmix_core::GetOptions::default())
            .unwrap()
            .unwrap();
        if let Some(id) = &snippet.section_id {
            assert!(record.sections_index.contains_key(id));
        }
        if let Some(heading) = &snippet.heading {
            let section = &record.sections_index[&heading.id];
            // A heading-field snippet's text is one of the projection lines.
            if snippet.section_type.is_heading() {
                assert!(record
                    .field_raw(snippet.section_type)
                    .split('\n')
                    .any(|line| line == snippet.text));
                assert_eq!(section.text, snippet.text);
            }
        }
    }
}
