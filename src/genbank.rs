//! Minimal GenBank flat-file reader.
//!
//! Only the pieces needed to build a [`MetadataRow`] are retained: the LOCUS
//! line, DEFINITION, ACCESSION, VERSION, SOURCE/ORGANISM with its lineage, the
//! qualifiers of the first `source` feature and the ORIGIN length.

use std::iter::Enumerate;
use std::str::Lines;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::domain::{MetadataRow, MetadataTable, UNKNOWN_HOST};
use crate::error::ParseError;

const RECORD_START: &str = "LOCUS";
const RECORD_END: &str = "//";
const HEADER_WIDTH: usize = 12;
const FEATURE_KEY_INDENT: usize = 5;
const QUALIFIER_INDENT: usize = 21;

static QUALIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/([^=\s]+)(?:=(.*))?$").unwrap());
static LOCUS_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}-[A-Z]{3}-\d{4}$").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocusLine {
    pub name: String,
    pub length: Option<u64>,
    pub molecule: Option<String>,
    pub topology: Option<String>,
    pub division: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenbankRecord {
    pub locus: LocusLine,
    pub definition: String,
    pub accession: Option<String>,
    pub version: Option<String>,
    pub organism: Option<String>,
    pub taxonomy: Vec<String>,
    /// Qualifiers of the first `source` feature, in file order.
    pub source_qualifiers: Vec<(String, String)>,
    pub sequence_length: usize,
}

impl GenbankRecord {
    /// Versioned accession, falling back to the bare accession and then the locus name.
    pub fn id(&self) -> &str {
        self.version
            .as_deref()
            .or(self.accession.as_deref())
            .unwrap_or(&self.locus.name)
    }

    pub fn qualifier(&self, key: &str) -> Option<&str> {
        self.source_qualifiers
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn to_row(&self) -> MetadataRow {
        let organism = self
            .organism
            .as_deref()
            .or_else(|| self.qualifier("organism"))
            .unwrap_or_default();
        let host = self
            .qualifier("host")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(UNKNOWN_HOST);
        MetadataRow {
            accession: self.id().to_string(),
            organism: organism.to_string(),
            date: self
                .qualifier("collection_date")
                .unwrap_or_default()
                .to_string(),
            host: host.to_string(),
        }
    }
}

/// Parses every record in `text` into a table, failing on the first malformed entry.
pub fn parse_metadata(text: &str) -> Result<MetadataTable, ParseError> {
    let rows = Records::new(text)
        .map(|record| record.map(|record| record.to_row()))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::info!(rows = rows.len(), "parsed GenBank records");
    Ok(MetadataTable::new(rows))
}

pub fn parse_records(text: &str) -> Result<Vec<GenbankRecord>, ParseError> {
    Records::new(text).collect()
}

/// Number of `LOCUS` lines in `text`.
pub fn count_records(text: &str) -> usize {
    text.lines()
        .filter(|line| line.starts_with(RECORD_START))
        .count()
}

/// Iterator over the records of a GenBank text blob. Stops after the first error.
pub struct Records<'a> {
    lines: Enumerate<Lines<'a>>,
    done: bool,
}

impl<'a> Records<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            done: false,
        }
    }

    fn read_record(
        &mut self,
        line_no: usize,
        locus_line: &str,
    ) -> Result<GenbankRecord, ParseError> {
        let mut builder = RecordBuilder::new(parse_locus(line_no, locus_line)?);
        for (index, raw) in self.lines.by_ref() {
            let line = raw.trim_end_matches('\r');
            if line.trim_end() == RECORD_END {
                return Ok(builder.finish());
            }
            if line.starts_with(RECORD_START) {
                return Err(ParseError::UnterminatedRecord {
                    line: index + 1,
                    locus: builder.record.locus.name,
                });
            }
            builder.feed(line);
        }
        Err(ParseError::UnexpectedEof {
            locus: builder.record.locus.name,
        })
    }
}

impl Iterator for Records<'_> {
    type Item = Result<GenbankRecord, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let Some((index, raw)) = self.lines.next() else {
                self.done = true;
                return None;
            };
            let line = raw.trim_end_matches('\r');
            if !line.starts_with(RECORD_START) {
                if !line.trim().is_empty() {
                    tracing::debug!(line = index + 1, "skipping text outside a record");
                }
                continue;
            }
            let result = self.read_record(index + 1, line);
            if result.is_err() {
                self.done = true;
            }
            return Some(result);
        }
    }
}

fn parse_locus(line_no: usize, line: &str) -> Result<LocusLine, ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().skip(1).collect();
    let name = tokens
        .first()
        .ok_or(ParseError::MalformedLocus { line: line_no })?
        .to_string();

    let mut locus = LocusLine {
        name,
        ..LocusLine::default()
    };
    locus.length = tokens.get(1).and_then(|value| value.parse().ok());

    let mut rest = tokens
        .iter()
        .skip_while(|token| !matches!(**token, "bp" | "aa"))
        .skip(1)
        .copied()
        .peekable();
    if let Some(molecule) = rest.next_if(|token| token.ends_with("NA")) {
        locus.molecule = Some(molecule.to_string());
    }
    if let Some(topology) = rest.next_if(|token| is_topology(token)) {
        locus.topology = Some(topology.to_string());
    }
    if let Some(division) = rest.next_if(|token| is_division(token)) {
        locus.division = Some(division.to_string());
    }
    locus.date = tokens
        .last()
        .filter(|token| LOCUS_DATE_RE.is_match(token))
        .map(|token| token.to_string());
    Ok(locus)
}

fn is_topology(token: &str) -> bool {
    matches!(token, "linear" | "circular")
}

fn is_division(token: &str) -> bool {
    token.len() == 3 && token.chars().all(|ch| ch.is_ascii_uppercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Features,
    Origin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Definition,
    Organism,
    Other,
}

struct RecordBuilder {
    record: GenbankRecord,
    section: Section,
    field: Field,
    in_source: bool,
    source_seen: bool,
    lineage: String,
}

impl RecordBuilder {
    fn new(locus: LocusLine) -> Self {
        Self {
            record: GenbankRecord {
                locus,
                ..GenbankRecord::default()
            },
            section: Section::Header,
            field: Field::Other,
            in_source: false,
            source_seen: false,
            lineage: String::new(),
        }
    }

    fn feed(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        if !line.starts_with(' ') {
            self.top_level(line);
            return;
        }
        match self.section {
            Section::Header => self.header_continuation(line),
            Section::Features => self.feature_line(line),
            Section::Origin => {
                self.record.sequence_length +=
                    line.chars().filter(|ch| ch.is_ascii_alphabetic()).count();
            }
        }
    }

    fn top_level(&mut self, line: &str) {
        let (keyword, value) = split_keyword(line);
        self.field = Field::Other;
        self.in_source = false;
        match keyword {
            "DEFINITION" => {
                self.section = Section::Header;
                self.field = Field::Definition;
                self.record.definition = value.to_string();
            }
            "ACCESSION" => {
                self.section = Section::Header;
                self.record.accession = value.split_whitespace().next().map(str::to_string);
            }
            "VERSION" => {
                self.section = Section::Header;
                self.record.version = value.split_whitespace().next().map(str::to_string);
            }
            "FEATURES" => self.section = Section::Features,
            "ORIGIN" => self.section = Section::Origin,
            _ => self.section = Section::Header,
        }
    }

    fn header_continuation(&mut self, line: &str) {
        let (keyword, value) = split_keyword(line);
        if !keyword.is_empty() {
            self.field = if keyword == "ORGANISM" {
                self.record.organism = Some(value.to_string());
                Field::Organism
            } else {
                Field::Other
            };
            return;
        }
        match self.field {
            Field::Definition => {
                self.record.definition.push(' ');
                self.record.definition.push_str(value);
            }
            Field::Organism => {
                let starts_lineage = !self.lineage.is_empty()
                    || value.contains(';')
                    || value.ends_with('.');
                if starts_lineage {
                    if !self.lineage.is_empty() {
                        self.lineage.push(' ');
                    }
                    self.lineage.push_str(value);
                } else if let Some(organism) = self.record.organism.as_mut() {
                    organism.push(' ');
                    organism.push_str(value);
                }
            }
            Field::Other => {}
        }
    }

    fn feature_line(&mut self, line: &str) {
        let indent = line.len() - line.trim_start().len();
        if indent == FEATURE_KEY_INDENT {
            let key = line.split_whitespace().next().unwrap_or_default();
            self.in_source = key == "source" && !self.source_seen;
            if self.in_source {
                self.source_seen = true;
            }
            return;
        }
        if !self.in_source || indent < QUALIFIER_INDENT {
            return;
        }
        let content = line.trim();
        if let Some(captures) = QUALIFIER_RE.captures(content) {
            let key = captures[1].to_string();
            let value = captures
                .get(2)
                .map(|value| value.as_str().to_string())
                .unwrap_or_default();
            self.record.source_qualifiers.push((key, value));
        } else if let Some((key, value)) = self.record.source_qualifiers.last_mut() {
            if key != "translation" {
                value.push(' ');
            }
            value.push_str(content);
        }
    }

    fn finish(mut self) -> GenbankRecord {
        for (_, value) in &mut self.record.source_qualifiers {
            *value = unquote(value);
        }
        self.record.taxonomy = self
            .lineage
            .trim_end_matches('.')
            .split(';')
            .map(str::trim)
            .filter(|rank| !rank.is_empty())
            .map(str::to_string)
            .collect();
        self.record.definition = self.record.definition.trim().to_string();
        self.record
    }
}

fn split_keyword(line: &str) -> (&str, &str) {
    let split = line
        .char_indices()
        .nth(HEADER_WIDTH)
        .map(|(index, _)| index)
        .unwrap_or(line.len());
    let (head, tail) = line.split_at(split);
    let keyword = head.trim();
    if keyword.contains(' ') {
        // Keyword longer than the header column.
        let mut parts = line.trim().splitn(2, char::is_whitespace);
        let keyword = parts.next().unwrap_or_default();
        return (keyword, parts.next().unwrap_or_default().trim());
    }
    (keyword, tail.trim())
}

fn unquote(value: &str) -> String {
    let trimmed = value.trim();
    let inner = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed);
    inner.replace("\"\"", "\"")
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn locus_line_fields() {
        let locus = parse_locus(
            1,
            "LOCUS       OQ793210                1707 bp    cRNA    linear   VRL 02-MAY-2023",
        )
        .unwrap();
        assert_eq!(locus.name, "OQ793210");
        assert_eq!(locus.length, Some(1707));
        assert_eq!(locus.molecule.as_deref(), Some("cRNA"));
        assert_eq!(locus.topology.as_deref(), Some("linear"));
        assert_eq!(locus.division.as_deref(), Some("VRL"));
        assert_eq!(locus.date.as_deref(), Some("02-MAY-2023"));
    }

    #[test]
    fn locus_line_without_name() {
        let err = parse_locus(7, "LOCUS").unwrap_err();
        assert_matches!(err, ParseError::MalformedLocus { line: 7 });
    }

    #[test]
    fn keyword_split_handles_subkeywords() {
        assert_eq!(
            split_keyword("  ORGANISM  Influenza A virus"),
            ("ORGANISM", "Influenza A virus")
        );
        assert_eq!(split_keyword("            Viruses;"), ("", "Viruses;"));
        assert_eq!(
            split_keyword("FEATURES             Location/Qualifiers"),
            ("FEATURES", "Location/Qualifiers")
        );
    }

    #[test]
    fn unquote_collapses_doubled_quotes() {
        assert_eq!(unquote("\"say \"\"hi\"\"\""), "say \"hi\"");
        assert_eq!(unquote("7"), "7");
    }
}
