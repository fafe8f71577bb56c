use super::*;

fn small_chunker(size: usize) -> MarkdownChunker {
    MarkdownChunker::new(&ChunkingConfig {
        chunk_size: size,
        chunk_overlap: 0,
    })
    .expect("valid chunking config")
}

#[test]
fn two_paragraphs_become_two_chunks() {
    let text = "First paragraph of text.\n\nSecond paragraph of text.";
    let chunks = small_chunker(40).chunk(text);

    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["First paragraph of text.", "Second paragraph of text."]
    );
    assert_eq!(chunks[0].offset, 0);
    assert_eq!(chunks[1].offset, 26);
}

#[test]
fn small_document_is_single_chunk() {
    let chunker = MarkdownChunker::new(&ChunkingConfig::default()).expect("default config");
    let chunks = chunker.chunk("# Title\n\nShort body.");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].heading, Some("Title".to_string()));
}

#[test]
fn empty_document_has_no_chunks() {
    let chunker = MarkdownChunker::new(&ChunkingConfig::default()).expect("default config");
    assert!(chunker.chunk("").is_empty());
    assert!(chunker.chunk("   \n\n  ").is_empty());
}

#[test]
fn chunks_respect_size_limit() {
    let text = "Sentence number one is here. ".repeat(50);
    let chunks = small_chunker(100).chunk(&text);

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.text.chars().count() <= 100, "chunk too large: {:?}", chunk.text);
    }
}

#[test]
fn chunking_is_deterministic() {
    let text = "# A\n\nalpha beta gamma.\n\n## B\n\ndelta epsilon.\n\n".repeat(10);
    let chunker = MarkdownChunker::new(&ChunkingConfig {
        chunk_size: 60,
        chunk_overlap: 10,
    })
    .expect("valid config");

    assert_eq!(chunker.chunk(&text), chunker.chunk(&text));
}

#[test]
fn overlap_must_be_smaller_than_size() {
    let result = MarkdownChunker::new(&ChunkingConfig {
        chunk_size: 10,
        chunk_overlap: 10,
    });
    assert!(result.is_err());
}

#[test]
fn chunks_carry_heading_path() {
    let text = "# Intro\n\nAlpha text here.\n\n## Details\n\nBeta text here.";
    let chunks = small_chunker(30).chunk(text);

    let alpha = chunks
        .iter()
        .find(|c| c.text.contains("Alpha"))
        .expect("alpha chunk");
    let beta = chunks
        .iter()
        .find(|c| c.text.contains("Beta"))
        .expect("beta chunk");

    assert_eq!(alpha.heading, Some("Intro".to_string()));
    assert_eq!(beta.heading, Some("Intro > Details".to_string()));
}

#[test]
fn text_before_first_heading_has_no_heading() {
    let marks = heading_index("Preamble.\n\n# Title\n\nBody.");
    assert_eq!(heading_at(&marks, 0), None);
    assert_eq!(heading_at(&marks, 11), Some("Title".to_string()));
}

#[test]
fn heading_index_tracks_nesting() {
    let text = "# One\n\n## Two\n\n### Three\n\n## Four\n\n# Five `code`\n";
    let paths: Vec<String> = heading_index(text).into_iter().map(|m| m.path).collect();

    assert_eq!(
        paths,
        vec![
            "One",
            "One > Two",
            "One > Two > Three",
            "One > Four",
            "Five code",
        ]
    );
}

#[test]
fn heading_offsets_point_at_heading_start() {
    let text = "intro\n\n## Section\n\nbody";
    let marks = heading_index(text);

    assert_eq!(marks.len(), 1);
    assert_eq!(marks[0].offset, 7);
    assert_eq!(heading_at(&marks, 6), None);
    assert_eq!(heading_at(&marks, 7), Some("Section".to_string()));
}
