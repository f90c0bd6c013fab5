use criterion::{criterion_group, criterion_main, Criterion};
use docsearch_core::tokenizer::Tokenizer;
use docsearch_core::TokenizerConfig;

fn bench_tokenize(c: &mut Criterion) {
    let text = include_str!("../tests/fixtures/p61a_searchindex.js");
    let plain = Tokenizer::default();
    let stemmed = Tokenizer::new(&TokenizerConfig { stemming: true, ..Default::default() });
    c.bench_function("tokenize_searchindex", |b| b.iter(|| plain.tokenize(text)));
    c.bench_function("tokenize_searchindex_stemmed", |b| b.iter(|| stemmed.tokenize(text)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
