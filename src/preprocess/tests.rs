use super::*;

#[test]
fn hyphen_variants_of_compound() {
    let variants = hyphen_variants("state-of-the-art");
    assert_eq!(
        variants,
        vec![
            "state-of-the-art",
            "stateoftheart",
            "state of the art",
            "state",
            "of",
            "the",
            "art",
        ]
    );
}

#[test]
fn hyphen_expansion_before_stopword_removal() {
    let expanded = expand_hyphens("state-of-the-art");
    assert!(expanded.contains("state of the art"));

    let tokens: HashSet<String> = tokenize(&expanded).into_iter().collect();
    for expected in ["state-of-the-art", "stateoftheart", "state", "of", "the", "art"] {
        assert!(tokens.contains(expected), "missing token {expected}");
    }
}

#[test]
fn repeated_compounds_expand_once_each() {
    let expanded = expand_hyphens("mid-size and mid-size");
    assert_eq!(
        expanded,
        "mid-size midsize mid size mid size and mid-size midsize mid size mid size"
    );
}

#[test]
fn text_without_hyphens_is_unchanged() {
    assert_eq!(expand_hyphens("plain words only"), "plain words only");
}

#[test]
fn tokenize_splits_punctuation_and_clitics() {
    assert_eq!(
        tokenize("The adviser's fee, e.g. 1%."),
        vec!["The", "adviser", "'s", "fee", ",", "e", ".", "g", ".", "1", "%", "."]
    );
}

#[test]
fn preprocess_pipeline() {
    let preprocessor = Preprocessor::english();
    assert_eq!(
        preprocessor.preprocess("Investment Advisers must register with the SEC."),
        "investment adviser must register sec"
    );
}

#[test]
fn preprocess_expands_hyphens() {
    let preprocessor = Preprocessor::english();
    assert_eq!(
        preprocessor.preprocess("Mid-size advisers"),
        "midsize mid size mid size adviser"
    );
}

#[test]
fn preprocess_empty_and_whitespace() {
    let preprocessor = Preprocessor::english();
    assert_eq!(preprocessor.preprocess(""), "");
    assert_eq!(preprocessor.preprocess("   \n\t  "), "");
    assert_eq!(preprocessor.preprocess("the of and"), "");
}

#[test]
fn preprocess_is_idempotent() {
    let preprocessor = Preprocessor::english();
    let inputs = [
        "Investment Advisers must register with the SEC.",
        "Mid-size advisers face different thresholds.",
        "State-of-the-art classes, boxes and policies; children's wolves!",
        "Analyses of the series: theses, buses, glasses and 1940s statutes.",
        "",
        "   ",
        "Registration requirements for small-, mid- and large-size advisers",
    ];

    for input in inputs {
        let once = preprocessor.preprocess(input);
        let twice = preprocessor.preprocess(&once);
        assert_eq!(once, twice, "not a fixed point for {input:?}");
    }
}

#[test]
fn token_set_deduplicates() {
    let preprocessor = Preprocessor::english();
    let tokens = preprocessor.token_set("advisers adviser ADVISER");
    assert_eq!(tokens.len(), 1);
    assert!(tokens.contains("adviser"));
}

#[test]
fn lemmatizer_rules() {
    let lemmatizer = Lemmatizer::default();
    assert_eq!(lemmatizer.lemmatize("advisers"), "adviser");
    assert_eq!(lemmatizer.lemmatize("classes"), "class");
    assert_eq!(lemmatizer.lemmatize("boxes"), "box");
    assert_eq!(lemmatizer.lemmatize("policies"), "policy");
    assert_eq!(lemmatizer.lemmatize("ties"), "tie");
    assert_eq!(lemmatizer.lemmatize("children"), "child");
    assert_eq!(lemmatizer.lemmatize("analysis"), "analysis");
    assert_eq!(lemmatizer.lemmatize("status"), "status");
    assert_eq!(lemmatizer.lemmatize("gas"), "gas");
    assert_eq!(lemmatizer.lemmatize("series"), "series");
}

#[test]
fn lemmatizer_output_is_stable() {
    let lemmatizer = Lemmatizer::default();
    for word in ["analyses", "theses", "statuses", "leaves", "indices", "dresses"] {
        let lemma = lemmatizer.lemmatize(word);
        assert_eq!(lemmatizer.lemmatize(&lemma), lemma);
    }
}
