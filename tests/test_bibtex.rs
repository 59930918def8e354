use sabim_ai_tools::bibtex::{load_records, parse_bibtex, read_bibtex};
use sabim_ai_tools::SabimError;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn fixture(file_name: &str) -> PathBuf {
    let mut path = Path::new(env!("CARGO_MANIFEST_DIR")).to_path_buf();
    path.push("tests");
    path.push("data");
    path.push(file_name);
    path
}

#[test]
fn test_read_bibtex_fixture() {
    let records = read_bibtex(&fixture("refs.bib")).expect("Failed to parse refs.bib");

    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["keyA", "keyB"]);

    let key_a = &records[0];
    assert_eq!(key_a.get_str("title"), Some("Electric Field Effect in Atomically Thin Carbon Films"));
    assert_eq!(key_a.get_str("year"), Some("2004"));
    assert_eq!(key_a.get_str("journal"), Some("Science"));
    assert_eq!(key_a.get_str("pages"), Some("666--669"));
    assert!(key_a.get_str("abstract").unwrap().starts_with("We describe"));
    assert_eq!(key_a.get_str("author"), Some("Novoselov and Geim and Firsov"));

    assert_eq!(records[1].get_str("author"), Some("van der Berg and Silva"));
}

#[test]
fn test_load_records_dispatches_on_extension() {
    let records = load_records(&fixture("refs.bib")).unwrap();
    assert_eq!(records.len(), 2);

    let dir = tempdir().unwrap();
    let txt = dir.path().join("refs.txt");
    fs::write(&txt, "not a bibliography").unwrap();
    assert!(matches!(load_records(&txt), Err(SabimError::UnsupportedFormat(_))));
}

#[test]
fn test_load_records_missing_file() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.bib");
    assert!(matches!(load_records(&missing), Err(SabimError::NotFound(_))));
    assert!(matches!(read_bibtex(&missing), Err(SabimError::NotFound(_))));
}

#[test]
fn test_parse_error_on_malformed_bibtex() {
    let result = parse_bibtex("@article{keyA,\n  title = {Unclosed title,\n  year = {2020}\n");
    assert!(matches!(result, Err(SabimError::Parse(_))));
}

#[test]
fn test_load_exported_json_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("articles.json");
    fs::write(
        &path,
        r#"[{"id": "keyA", "title": "First"}, {"id": "keyB", "title": "Second"}]"#,
    )
    .unwrap();

    let records = load_records(&path).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].get_str("title"), Some("Second"));
}

#[test]
fn test_field_text_is_kept_as_written() {
    let records = parse_bibtex(
        r#"@string{prb = "Physical Review B"}
@article{fe2019,
  title = {The {DFT} study of $\alpha$-Fe},
  pages = {666--669},
  journal = prb,
  month = jan,
  year = 2019
}"#,
    )
    .unwrap();

    let record = &records[0];
    assert_eq!(record.get_str("title"), Some(r"The {DFT} study of $\alpha$-Fe"));
    assert_eq!(record.get_str("pages"), Some("666--669"));
    assert_eq!(record.get_str("journal"), Some("Physical Review B"));
    assert_eq!(record.get_str("month"), Some("January"));
    assert_eq!(record.get_str("year"), Some("2019"));
}

#[test]
fn test_duplicate_keys_are_a_parse_error() {
    let result = parse_bibtex("@misc{dup, title = {One}}\n@misc{dup, title = {Two}}");
    assert!(matches!(result, Err(SabimError::Parse(_))));
}
