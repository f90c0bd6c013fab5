use docsearch_core::tokenizer::Tokenizer;
use docsearch_core::TokenizerConfig;

fn words(tok: &Tokenizer, text: &str) -> Vec<String> {
    tok.tokenize(text).into_iter().map(|t| t.term).collect()
}

#[test]
fn it_normalizes_and_stems() {
    let tok = Tokenizer::new(&TokenizerConfig { stemming: true, ..Default::default() });
    let words = words(&tok, "Running Runners RUN! Sequential refinement");
    assert!(words.contains(&"run".to_string()));
    assert!(words.contains(&"sequenti".to_string()));
    assert!(words.contains(&"refin".to_string()));
}

#[test]
fn it_folds_compatibility_forms() {
    // NFKC maps the "ﬁ" ligature and fullwidth digits to plain characters.
    let words = words(&Tokenizer::default(), "Peak ﬁtting at ２θ");
    assert_eq!(words, vec!["peak", "fitting", "2θ"]);
}

#[test]
fn it_filters_stopwords() {
    let words = words(&Tokenizer::default(), "The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert!(words.contains(&"quick".to_string()));
}

#[test]
fn stopwords_can_be_kept() {
    let tok = Tokenizer::new(&TokenizerConfig { stopwords: false, ..Default::default() });
    assert!(words(&tok, "the viewer").contains(&"the".to_string()));
}

#[test]
fn splits_on_punctuation_and_tracks_offsets() {
    let text = "P61A::Viewer, peak-fitting";
    let tokens = Tokenizer::default().tokenize(text);
    let got: Vec<(&str, &str)> = tokens.iter().map(|t| (t.term.as_str(), &text[t.start..t.end])).collect();
    assert_eq!(got, vec![("p61a", "P61A"), ("viewer", "Viewer"), ("peak", "peak"), ("fitting", "fitting")]);
    assert_eq!(tokens.iter().map(|t| t.position).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
}

#[test]
fn it_is_deterministic() {
    let tok = Tokenizer::default();
    let text = "Calibrating 2Θ using a reference sample";
    assert_eq!(tok.tokenize(text), tok.tokenize(text));
}
