use criterion::{Criterion, criterion_group, criterion_main};
use kaleido::{RawGrammar, tokenize};

const JSON_GRAMMAR: &str = r#"{
    "string": "\"(?:[^\"\\\\]|\\\\.)*\"",
    "number": "-?\\d+(?:\\.\\d+)?",
    "boolean": "\\btrue\\b|\\bfalse\\b",
    "null": "\\bnull\\b",
    "punctuation": "[{}\\[\\],:]"
}"#;

const JSON_INPUT: &str = r#"{"name": "John", "age": 30, "active": true, "score": 95.5, "tags": ["developer", "rust"], "address": null}"#;

fn tokenizer_benchmark(c: &mut Criterion) {
    let grammar = RawGrammar::load_from_str(JSON_GRAMMAR)
        .unwrap()
        .compile()
        .unwrap();

    c.bench_function("json tokenization", |b| {
        b.iter(|| {
            let tokens = tokenize(JSON_INPUT, &grammar);
            std::hint::black_box(tokens);
        })
    });
}

criterion_group!(benches, tokenizer_benchmark);
criterion_main!(benches);
