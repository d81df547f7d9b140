use super::*;

const ORDINALS: [&str; 10] = [
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
];

fn ten_sentence_paragraph() -> (String, Vec<String>) {
    let sentences: Vec<String> = ORDINALS
        .iter()
        .map(|ordinal| {
            format!(
                "Paragraph sentence {ordinal} explains how investment advisers report assets under management to regulators."
            )
        })
        .collect();
    (sentences.join(" "), sentences)
}

#[test]
fn fixed_word_windows() {
    let strategy = ChunkStrategy::FixedWords { max_words: 3 };
    let chunks = chunk("a b c d e f g", &strategy).expect("chunking should succeed");

    let texts: Vec<&str> = chunks.iter().map(|c| c.raw_text.as_str()).collect();
    assert_eq!(texts, vec!["a b c", "d e f", "g"]);
    assert_eq!(
        chunks.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(
        chunks[0].source_metadata.get(STRATEGY_KEY).map(String::as_str),
        Some("fixed_words")
    );
}

#[test]
fn fixed_word_windows_reconstruct_input() {
    let text = "Investment advisers must register with the SEC unless an exemption applies to them";
    let strategy = ChunkStrategy::FixedWords { max_words: 4 };
    let chunks = chunk(text, &strategy).expect("chunking should succeed");

    let rebuilt = chunks
        .iter()
        .map(|c| c.raw_text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    assert_eq!(rebuilt, text);
}

#[test]
fn sentence_chunks_merge_up_to_length() {
    let text = "First short sentence here. Second short sentence here. Third short sentence here.";
    let strategy = ChunkStrategy::Sentences { max_length: 60 };
    let chunks = chunk(text, &strategy).expect("chunking should succeed");

    assert_eq!(chunks.len(), 2);
    assert_eq!(
        chunks[0].raw_text,
        "First short sentence here. Second short sentence here."
    );
    assert_eq!(chunks[1].raw_text, "Third short sentence here.");
}

#[test]
fn sentence_longer_than_limit_stays_whole() {
    let text = "This single sentence is definitely longer than the tiny limit.";
    let strategy = ChunkStrategy::Sentences { max_length: 10 };
    let chunks = chunk(text, &strategy).expect("chunking should succeed");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].raw_text, text);
}

#[test]
fn sentence_splitter_keeps_abbreviations() {
    let sentences =
        split_sentences("Advisers register with the U.S. Securities and Exchange Commission. Mr. Smith agreed.");
    assert_eq!(
        sentences,
        vec![
            "Advisers register with the U.S. Securities and Exchange Commission.",
            "Mr. Smith agreed.",
        ]
    );
}

#[test]
fn hybrid_chunks_cover_every_sentence() {
    let (paragraph, sentences) = ten_sentence_paragraph();
    let strategy = ChunkStrategy::Hybrid {
        max_tokens_per_chunk: 50,
        overlap: 5,
    };
    let chunks = chunk(&paragraph, &strategy).expect("chunking should succeed");

    assert!(chunks.len() > 1);
    for c in &chunks {
        assert!(!c.raw_text.trim().is_empty());
    }
    for sentence in &sentences {
        assert!(
            chunks.iter().any(|c| c.raw_text.contains(sentence.as_str())),
            "sentence missing from every chunk: {sentence}"
        );
    }
}

#[test]
fn hybrid_chunks_are_seeded_with_overlap() {
    let (paragraph, _) = ten_sentence_paragraph();
    let strategy = ChunkStrategy::Hybrid {
        max_tokens_per_chunk: 50,
        overlap: 5,
    };
    let chunks = chunk(&paragraph, &strategy).expect("chunking should succeed");

    for pair in chunks.windows(2) {
        let previous_tail = trailing_words(&pair[0].raw_text, 5);
        assert!(
            pair[1].raw_text.starts_with(&previous_tail),
            "chunk {:?} does not start with {:?}",
            pair[1].raw_text,
            previous_tail
        );
    }
}

#[test]
fn hybrid_overlap_larger_than_sentence() {
    let text = "Short one here. Short two here. Short three here.";
    let strategy = ChunkStrategy::Hybrid {
        max_tokens_per_chunk: 5,
        overlap: 100,
    };
    let chunks = chunk(text, &strategy).expect("chunking should succeed");

    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].raw_text, "Short one here.");
    assert_eq!(chunks[1].raw_text, "Short one here. Short two here.");
    assert_eq!(chunks[2].raw_text, "Short two here. Short three here.");
}

#[test]
fn hybrid_without_overlap() {
    let text = "Short one here. Short two here.";
    let strategy = ChunkStrategy::Hybrid {
        max_tokens_per_chunk: 5,
        overlap: 0,
    };
    let chunks = chunk(text, &strategy).expect("chunking should succeed");

    let texts: Vec<&str> = chunks.iter().map(|c| c.raw_text.as_str()).collect();
    assert_eq!(texts, vec!["Short one here.", "Short two here."]);
}

#[test]
fn hybrid_rejects_zero_budget() {
    let strategy = ChunkStrategy::Hybrid {
        max_tokens_per_chunk: 0,
        overlap: 5,
    };
    let result = chunk("Some text.", &strategy);
    assert!(matches!(result, Err(RagError::Configuration(_))));
}

#[test]
fn sections_split_on_headers() {
    let text = "Jane Doe\njane@example.com\nTechnical Skills Rust, Python Education BSc Computer Science Skills Leadership";
    let strategy = ChunkStrategy::Sections {
        headers: vec![
            "Education".to_string(),
            "Skills".to_string(),
            "Technical Skills".to_string(),
        ],
    };
    let chunks = chunk(text, &strategy).expect("chunking should succeed");

    let sections: Vec<(&str, &str)> = chunks
        .iter()
        .map(|c| {
            (
                c.source_metadata
                    .get(SECTION_KEY)
                    .map(String::as_str)
                    .unwrap_or_default(),
                c.raw_text.as_str(),
            )
        })
        .collect();
    assert_eq!(
        sections,
        vec![
            ("Technical Skills", "Rust, Python"),
            ("Education", "BSc Computer Science"),
            ("Skills", "Leadership"),
        ]
    );
}

#[test]
fn sections_are_case_sensitive() {
    let strategy = ChunkStrategy::Sections {
        headers: vec!["Education".to_string()],
    };
    let chunks = chunk("education BSc", &strategy).expect("chunking should succeed");
    assert!(chunks.is_empty());
}

#[test]
fn sections_skip_empty_spans() {
    let strategy = ChunkStrategy::Sections {
        headers: vec!["Awards".to_string(), "Projects".to_string()],
    };
    let chunks = chunk("Awards   Projects Built a search engine", &strategy)
        .expect("chunking should succeed");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].raw_text, "Built a search engine");
    assert_eq!(chunks[0].id, 0);
}

#[test]
fn sections_reject_empty_vocabulary() {
    let strategy = ChunkStrategy::Sections { headers: vec![] };
    assert!(matches!(
        chunk("Anything", &strategy),
        Err(RagError::Configuration(_))
    ));

    let blank = ChunkStrategy::Sections {
        headers: vec!["  ".to_string()],
    };
    assert!(matches!(
        chunk("Anything", &blank),
        Err(RagError::Configuration(_))
    ));
}

#[test]
fn recursive_short_text_is_single_chunk() {
    let text = "First paragraph.\n\nSecond paragraph.";
    let chunks = chunk(text, &ChunkStrategy::default()).expect("chunking should succeed");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].raw_text, text);
}

#[test]
fn recursive_respects_size_and_overlaps() {
    let text = (0..60)
        .map(|i| format!("word{i:02}"))
        .collect::<Vec<_>>()
        .join(" ");
    let strategy = ChunkStrategy::Recursive {
        chunk_size: 100,
        chunk_overlap: 20,
    };
    let chunks = chunk(&text, &strategy).expect("chunking should succeed");

    assert!(chunks.len() > 1);
    for c in &chunks {
        assert!(c.raw_text.chars().count() <= 100);
    }
    for pair in chunks.windows(2) {
        let first_word = pair[1]
            .raw_text
            .split_whitespace()
            .next()
            .expect("chunk has words");
        assert!(pair[0].raw_text.contains(first_word));
    }
    assert!(chunks.iter().any(|c| c.raw_text.contains("word00")));
    assert!(chunks.iter().any(|c| c.raw_text.contains("word59")));
}

#[test]
fn recursive_splits_unbroken_text_by_characters() {
    let text = "x".repeat(250);
    let strategy = ChunkStrategy::Recursive {
        chunk_size: 100,
        chunk_overlap: 0,
    };
    let chunks = chunk(&text, &strategy).expect("chunking should succeed");

    let lengths: Vec<usize> = chunks.iter().map(|c| c.raw_text.len()).collect();
    assert_eq!(lengths, vec![100, 100, 50]);
}

#[test]
fn recursive_rejects_overlap_not_smaller_than_size() {
    let strategy = ChunkStrategy::Recursive {
        chunk_size: 100,
        chunk_overlap: 100,
    };
    assert!(matches!(
        chunk("text", &strategy),
        Err(RagError::Configuration(_))
    ));
}

#[test]
fn empty_text_produces_no_chunks() {
    let strategies = [
        ChunkStrategy::FixedWords { max_words: 10 },
        ChunkStrategy::Sentences { max_length: 100 },
        ChunkStrategy::Hybrid {
            max_tokens_per_chunk: 50,
            overlap: 5,
        },
        ChunkStrategy::Sections {
            headers: vec!["Education".to_string()],
        },
        ChunkStrategy::default(),
    ];

    for strategy in &strategies {
        let chunks = chunk("   ", strategy).expect("chunking should succeed");
        assert!(chunks.is_empty(), "{} produced chunks", strategy.name());
    }
}

#[test]
fn documents_are_numbered_across_the_batch() {
    let documents = ["a b c d", "e f"];
    let strategy = ChunkStrategy::FixedWords { max_words: 2 };
    let chunks = chunk_documents(&documents, &strategy).expect("chunking should succeed");

    assert_eq!(
        chunks.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(
        chunks
            .iter()
            .map(|c| c.source_metadata[DOCUMENT_KEY].as_str())
            .collect::<Vec<_>>(),
        vec!["0", "0", "1"]
    );
}

#[test]
fn strategy_toml_round_trip() {
    let strategy = ChunkStrategy::Hybrid {
        max_tokens_per_chunk: 200,
        overlap: 20,
    };
    let encoded = toml::to_string(&strategy).expect("strategy should serialize");
    assert!(encoded.contains("kind = \"hybrid\""));

    let decoded: ChunkStrategy = toml::from_str(&encoded).expect("strategy should parse");
    assert_eq!(decoded, strategy);
}

#[test]
fn token_count_includes_punctuation() {
    assert_eq!(count_tokens("Hello, world."), 4);
    assert_eq!(count_tokens(""), 0);
}
