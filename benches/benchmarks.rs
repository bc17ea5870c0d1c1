//! Performance benchmarks for webhttrack-server
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tempfile::TempDir;
use webhttrack_server::control::parse_form;
use webhttrack_server::lang::{build_key_table, LanguageCatalog};
use webhttrack_server::security::{is_traversal, sanitize_request_path};
use webhttrack_server::state::StateStore;
use webhttrack_server::template::{render, RenderContext};

const LANG_DEF: &str = "English\nLANGUAGE_1\nLANGUAGE_ISO\nLANGUAGE_ISO\n\
LANG_TITLE\nTitle\nLANG_NEXT\nNext\nLANG_BACK\nBack\n";

const PAGE: &str = r#"${/* options page */}
<html><head><title>${LANG_TITLE}</title></head>
<body>
${do:if-not-empty:projname}<h1>${html:projname}</h1>${do:end-if}
<select name="travel">${listid:travel:LANG_TRAVEL_LIST}</select>
<input type="checkbox" name="cookies" ${checked:cookies}>
<input type="text" name="url" value="${url}">
${do:output-mode:inifile}
Depth=${depth}\
${do:output-mode:}
<a href="back.html">${LANG_BACK}</a> <a href="next.html">${html:LANG_NEXT}</a>
${test:build:none:structure:flat}
</body></html>
"#;

fn catalog_dir() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::write(dir.path().join("lang.def"), LANG_DEF).unwrap();
    std::fs::create_dir(dir.path().join("lang")).unwrap();
    std::fs::write(
        dir.path().join("lang/English.txt"),
        "LANGUAGE_ISO\nen\nTitle\nMirror options\nNext\nNext >>\nBack\n<< Back\n",
    )
    .unwrap();
    dir
}

fn bench_render_page(c: &mut Criterion) {
    let dir = catalog_dir();
    let catalog = LanguageCatalog::load(dir.path()).unwrap();
    let mut state = StateStore::new();
    state.set("projname", "example <site>");
    state.set("travel", "2");
    state.set("LANG_TRAVEL_LIST", "same address\nsame domain\nany address");
    state.set("cookies", "1");
    state.set("url", "http://www.example.com/");
    state.set("depth", "5");
    state.set("build", "1");

    c.bench_function("render_page", |b| {
        b.iter(|| {
            let mut ctx = RenderContext {
                state: &mut state,
                catalog: &catalog,
                install_dir: dir.path(),
                project_dir: None,
            };
            black_box(render(black_box(PAGE), &mut ctx))
        });
    });
}

fn bench_key_table(c: &mut Criterion) {
    let mut text = String::new();
    for i in 0..500 {
        text.push_str(&format!("LANG_{}\nString number {}\n", i, i % 50));
    }

    c.bench_function("build_key_table", |b| {
        b.iter(|| black_box(build_key_table(black_box(&text))));
    });
}

fn bench_parse_form(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_form");

    for fields in [5, 50, 200].iter() {
        let body: String = (0..*fields)
            .map(|i| format!("field{}=value+{}%20with%2Fescapes&", i, i))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(fields), &body, |b, body| {
            b.iter(|| black_box(parse_form(black_box(body.as_bytes()))));
        });
    }

    group.finish();
}

fn bench_path_checks(c: &mut Criterion) {
    c.bench_function("sanitize_request_path", |b| {
        b.iter(|| {
            let _ = sanitize_request_path(black_box("/server/step3.html?sid=abc&lang=2"));
            let _ = is_traversal(black_box("/website/../../etc/passwd"));
        });
    });
}

criterion_group!(
    benches,
    bench_render_page,
    bench_key_table,
    bench_parse_form,
    bench_path_checks,
);

criterion_main!(benches);
