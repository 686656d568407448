// borevault-core/src/infrastructure/xlsx.rs
//
// Minimal XLSX reader: zip archive + shared-string table + first worksheet.
// Deliberately not a full spreadsheet library; it exists to feed the borelog
// parser rows of strings. One behavior is load-bearing: sparse cell
// references ("A" then "D") must emit empty cells for the gap so column
// indices stay stable.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use crate::domain::DomainError;
use crate::error::VaultError;
use crate::infrastructure::error::InfrastructureError;

const SHEET_PATH: &str = "xl/worksheets/sheet1.xml";
const SHARED_STRINGS_PATH: &str = "xl/sharedStrings.xml";

/// Read all rows from the first worksheet. XLSX requires random access, so
/// the whole payload is buffered; the CSV path stays streaming.
pub fn xlsx_rows(payload: &[u8]) -> Result<Vec<Vec<String>>, VaultError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }

    let mut archive =
        ZipArchive::new(Cursor::new(payload)).map_err(InfrastructureError::from)?;

    let shared_strings = match read_archive_file(&mut archive, SHARED_STRINGS_PATH)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet_xml = read_archive_file(&mut archive, SHEET_PATH)?.ok_or_else(|| {
        DomainError::MalformedDocument(format!("XLSX missing {SHEET_PATH}"))
    })?;

    parse_sheet(&sheet_xml, &shared_strings)
}

fn read_archive_file(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<Vec<u8>>, VaultError> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut content = Vec::new();
            file.read_to_end(&mut content)
                .map_err(InfrastructureError::Io)?;
            Ok(Some(content))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(InfrastructureError::from(e).into()),
    }
}

/// `<sst><si><t>…</t></si>…</sst>`; rich-text runs concatenate their `<t>`
/// fragments into one shared string.
fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, VaultError> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(InfrastructureError::from)?
        {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = true,
                _ => {}
            },
            Event::Text(text) => {
                if in_text {
                    if let Some(s) = current.as_mut() {
                        s.push_str(&text.unescape().map_err(InfrastructureError::from)?);
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => {
                    if let Some(s) = current.take() {
                        strings.push(s);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

#[derive(Default)]
struct CellState {
    reference: String,
    cell_type: String,
    value: String,
    inline_text: String,
    in_value: bool,
    in_inline_text: bool,
}

fn parse_sheet(xml: &[u8], shared_strings: &[String]) -> Result<Vec<Vec<String>>, VaultError> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    let mut buf = Vec::new();

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut current_row: Vec<String> = Vec::new();
    let mut expected_col: usize = 0;
    let mut cell = CellState::default();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(InfrastructureError::from)?
        {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    current_row.clear();
                    expected_col = 0;
                }
                b"c" => {
                    cell = CellState::default();
                    for attr in e.attributes().flatten() {
                        let value = String::from_utf8_lossy(&attr.value).to_string();
                        match attr.key.local_name().as_ref() {
                            b"r" => cell.reference = value,
                            b"t" => cell.cell_type = value,
                            _ => {}
                        }
                    }
                }
                b"v" => cell.in_value = true,
                b"t" => cell.in_inline_text = true,
                _ => {}
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"c" {
                    let mut empty = CellState::default();
                    for attr in e.attributes().flatten() {
                        if attr.key.local_name().as_ref() == b"r" {
                            empty.reference = String::from_utf8_lossy(&attr.value).to_string();
                        }
                    }
                    emit_cell(&empty, shared_strings, &mut current_row, &mut expected_col);
                }
            }
            Event::Text(text) => {
                let unescaped = text.unescape().map_err(InfrastructureError::from)?;
                if cell.in_value {
                    cell.value.push_str(&unescaped);
                } else if cell.in_inline_text {
                    cell.inline_text.push_str(&unescaped);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" => cell.in_value = false,
                b"t" => cell.in_inline_text = false,
                b"c" => {
                    emit_cell(&cell, shared_strings, &mut current_row, &mut expected_col);
                    cell = CellState::default();
                }
                b"row" => rows.push(std::mem::take(&mut current_row)),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rows)
}

fn emit_cell(
    cell: &CellState,
    shared_strings: &[String],
    row: &mut Vec<String>,
    expected_col: &mut usize,
) {
    let col_idx = column_ref_to_index(&cell.reference);
    while *expected_col < col_idx {
        row.push(String::new());
        *expected_col += 1;
    }

    let resolved = match cell.cell_type.as_str() {
        "s" => cell
            .value
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|idx| shared_strings.get(idx))
            .cloned()
            .unwrap_or_default(),
        "inlineStr" => cell.inline_text.clone(),
        _ => cell.value.clone(),
    };

    row.push(resolved.trim().to_string());
    *expected_col += 1;
}

/// Excel cell reference ("B2") to zero-based column index.
fn column_ref_to_index(reference: &str) -> usize {
    let mut result: usize = 0;
    let mut seen_letter = false;
    for c in reference.chars() {
        if c.is_ascii_uppercase() {
            seen_letter = true;
            result = result * 26 + (c as usize - 'A' as usize + 1);
        } else {
            break;
        }
    }
    if seen_letter {
        result - 1
    } else {
        0
    }
}
