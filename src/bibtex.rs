use biblatex::{Bibliography, Pair, Person, RawBibliography, RawChunk, RawEntry, Spanned};
use log::{debug, info};
use std::fs;
use std::path::Path;

use crate::error::{Result, SabimError};
use crate::record::{validate_collection, Record};

/// Load a source record collection, dispatching on the file extension.
///
/// `.bib` files go through the BibTeX parser; `.json` files are read as a
/// previously exported array of flat records.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    if !path.exists() {
        return Err(SabimError::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("bib") => read_bibtex(path),
        Some("json") => read_json_records(path),
        _ => Err(SabimError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Read a BibTeX file into records keyed by citation key.
pub fn read_bibtex(path: &Path) -> Result<Vec<Record>> {
    if !path.exists() {
        return Err(SabimError::NotFound(path.to_path_buf()));
    }
    info!("Reading the bibfile {:?}", path);
    let content = fs::read_to_string(path)?;
    parse_bibtex(&content)
}

/// Parse BibTeX source text, one record per entry, in file order.
///
/// Field values keep their source text, with braces, math and dashes as
/// written; only abbreviations are expanded.
pub fn parse_bibtex(content: &str) -> Result<Vec<Record>> {
    let raw = RawBibliography::parse(content).map_err(|e| SabimError::Parse(e.to_string()))?;
    // Resolving the whole file also rejects duplicate keys and bad crossrefs
    let bibliography =
        Bibliography::from_raw(raw.clone()).map_err(|e| SabimError::Parse(e.to_string()))?;

    let records: Vec<Record> = raw
        .entries
        .iter()
        .map(|entry| entry_to_record(&entry.v, &raw.abbreviations, &bibliography))
        .collect();
    debug!("Parsed {} BibTeX entries", records.len());
    Ok(records)
}

fn read_json_records(path: &Path) -> Result<Vec<Record>> {
    info!("Reading exported records from {:?}", path);
    let content = fs::read_to_string(path)?;
    let records: Vec<Record> = serde_json::from_str(&content)?;
    validate_collection(&records)?;
    Ok(records)
}

fn entry_to_record(entry: &RawEntry<'_>, abbreviations: &[Pair<'_>], bibliography: &Bibliography) -> Record {
    let mut record = Record::new(entry.key.v);

    for pair in &entry.fields {
        record.set(pair.key.v.to_ascii_lowercase(), field_text(&pair.value.v, abbreviations));
    }

    // Overwrite raw person fields with the normalised name lists
    if let Some(typed) = bibliography.get(entry.key.v) {
        if let Ok(authors) = typed.author() {
            if !authors.is_empty() {
                record.set("author", join_persons(&authors));
            }
        }
        if let Ok(groups) = typed.editors() {
            let editors: Vec<Person> = groups.into_iter().flat_map(|(persons, _)| persons).collect();
            if !editors.is_empty() {
                record.set("editor", join_persons(&editors));
            }
        }
    }

    record
}

/// Join person names with the BibTeX " and " separator, keeping only the
/// name particle and family name of each person.
fn join_persons(persons: &[Person]) -> String {
    persons
        .iter()
        .map(|person| {
            [person.prefix.as_str(), person.name.as_str()]
                .iter()
                .filter(|part| !part.is_empty())
                .copied()
                .collect::<Vec<&str>>()
                .join(" ")
        })
        .collect::<Vec<String>>()
        .join(" and ")
}

const MONTH_MACROS: [(&str, &str); 12] = [
    ("jan", "January"),
    ("feb", "February"),
    ("mar", "March"),
    ("apr", "April"),
    ("may", "May"),
    ("jun", "June"),
    ("jul", "July"),
    ("aug", "August"),
    ("sep", "September"),
    ("oct", "October"),
    ("nov", "November"),
    ("dec", "December"),
];

/// Source text of a field, concatenating `#` parts and expanding `@string`
/// abbreviations and the standard month macros.
fn field_text(parts: &[Spanned<RawChunk<'_>>], abbreviations: &[Pair<'_>]) -> String {
    parts
        .iter()
        .map(|part| match part.v {
            RawChunk::Normal(text) => text.to_string(),
            RawChunk::Abbreviation(name) => match abbreviations.iter().find(|pair| pair.key.v == name) {
                Some(pair) => field_text(&pair.value.v, abbreviations),
                None => MONTH_MACROS
                    .iter()
                    .find(|(short, _)| short.eq_ignore_ascii_case(name))
                    .map(|(_, month)| month.to_string())
                    .unwrap_or_else(|| name.to_string()),
            },
        })
        .collect::<Vec<String>>()
        .join("")
}
