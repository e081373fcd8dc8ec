use assert_matches::assert_matches;

use avian_flu_clusters::domain::{MetadataTable, UNKNOWN_HOST};
use avian_flu_clusters::error::ParseError;
use avian_flu_clusters::genbank::{count_records, parse_metadata, parse_records};

const SAMPLE: &str = include_str!("fixtures/h5n1_sample.gb");

#[test]
fn parse_sample_rows_in_input_order() {
    let table = parse_metadata(SAMPLE).unwrap();
    assert_eq!(table.len(), count_records(SAMPLE));

    let accessions: Vec<&str> = table.rows.iter().map(|row| row.accession.as_str()).collect();
    assert_eq!(
        accessions,
        vec!["OQ793210.1", "OQ793211.1", "OQ793212.1", "AB000001"]
    );
}

#[test]
fn parse_sample_fields() {
    let table = parse_metadata(SAMPLE).unwrap();
    let first = &table.rows[0];
    assert_eq!(
        first.organism,
        "Influenza A virus (A/mallard/Alberta/17/2022(H5N1))"
    );
    assert_eq!(first.date, "2022-09-14");
    assert_eq!(first.host, "Anas platyrhynchos");

    assert_eq!(table.rows[1].host, "Gallus gallus");
    assert_eq!(table.rows[3].date, "");
}

#[test]
fn missing_host_uses_sentinel() {
    let table = parse_metadata(SAMPLE).unwrap();
    assert_eq!(table.rows[2].host, UNKNOWN_HOST);
    assert!(table.rows.iter().all(|row| !row.host.is_empty()));
}

#[test]
fn record_details() {
    let records = parse_records(SAMPLE).unwrap();
    let first = &records[0];
    assert_eq!(first.locus.name, "OQ793210");
    assert_eq!(first.locus.length, Some(120));
    assert_eq!(first.sequence_length, 120);
    assert_eq!(
        first.definition,
        "Influenza A virus (A/mallard/Alberta/17/2022(H5N1)) segment 4 hemagglutinin (HA) gene, partial cds."
    );
    assert_eq!(first.taxonomy.first().map(String::as_str), Some("Viruses"));
    assert_eq!(
        first.taxonomy.last().map(String::as_str),
        Some("Alphainfluenzavirus influenzae")
    );
    assert_eq!(
        first.qualifier("organism"),
        Some("Influenza A virus (A/mallard/Alberta/17/2022(H5N1))")
    );
    assert_eq!(first.qualifier("country"), Some("Canada: Alberta"));

    let last = &records[3];
    assert_eq!(last.version, None);
    assert_eq!(last.id(), "AB000001");
    assert_eq!(last.locus.molecule.as_deref(), Some("RNA"));
    assert_eq!(last.locus.date.as_deref(), Some("11-JAN-2005"));
}

#[test]
fn only_first_source_feature_is_read() {
    let records = parse_records(SAMPLE).unwrap();
    let hosts: Vec<&str> = records[0]
        .source_qualifiers
        .iter()
        .filter(|(key, _)| key == "host")
        .map(|(_, value)| value.as_str())
        .collect();
    assert_eq!(hosts, vec!["Anas platyrhynchos"]);
}

#[test]
fn empty_input_gives_empty_table() {
    assert_eq!(parse_metadata("").unwrap(), MetadataTable::default());
    assert!(parse_metadata("\n\n   \n").unwrap().is_empty());
}

#[test]
fn leading_noise_is_skipped() {
    let text = format!("Some banner text\n\n{SAMPLE}");
    let table = parse_metadata(&text).unwrap();
    assert_eq!(table.len(), 4);
}

#[test]
fn crlf_line_endings() {
    let text = SAMPLE.replace('\n', "\r\n");
    let table = parse_metadata(&text).unwrap();
    assert_eq!(table.len(), 4);
    assert_eq!(table.rows[0].host, "Anas platyrhynchos");
}

#[test]
fn truncated_record_fails_whole_parse() {
    let cut = SAMPLE.rfind("ORIGIN").unwrap();
    let err = parse_metadata(&SAMPLE[..cut]).unwrap_err();
    assert_matches!(err, ParseError::UnexpectedEof { locus } if locus == "AB000001");
}

#[test]
fn locus_inside_record_is_rejected() {
    let text = "LOCUS       A1  10 bp  DNA  linear  VRL 01-JAN-2000\nACCESSION   A1\nLOCUS       A2  10 bp  DNA  linear  VRL 01-JAN-2000\n//\n";
    let err = parse_metadata(text).unwrap_err();
    assert_matches!(err, ParseError::UnterminatedRecord { line: 3, .. });
}

#[test]
fn nameless_locus_is_rejected() {
    let err = parse_metadata("LOCUS\n//\n").unwrap_err();
    assert_matches!(err, ParseError::MalformedLocus { line: 1 });
}

#[test]
fn record_without_features_gets_defaults() {
    let text = "LOCUS       X1  10 bp  DNA  linear  VRL 01-JAN-2000\nACCESSION   X1\n//\n";
    let table = parse_metadata(text).unwrap();
    assert_eq!(table.rows[0].accession, "X1");
    assert_eq!(table.rows[0].organism, "");
    assert_eq!(table.rows[0].date, "");
    assert_eq!(table.rows[0].host, UNKNOWN_HOST);
}
