//! Workbook package access: opens the ZIP container without buffering sheet
//! bodies, and resolves the two lookup tables every cell's formatted text
//! depends on — shared strings and number formats (spec §4.4).

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::io::{BufReader, Read, Seek};

#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("xml error in {part}: {source}")]
    Xml {
        part: String,
        #[source]
        source: quick_xml::Error,
    },
    #[error("workbook.xml missing or malformed")]
    MalformedWorkbook,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// `xl/sharedStrings.xml`, flattened to a plain index → text table. Inline
/// rich-text runs within a single `<si>` are concatenated.
#[derive(Debug, Default, Clone)]
pub struct SharedStrings(pub Vec<String>);

impl SharedStrings {
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(|s| s.as_str())
    }

    pub fn parse(xml: impl std::io::BufRead) -> Result<Self, PackageError> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(false);
        let mut buf = Vec::new();
        let mut strings = Vec::new();
        let mut current = String::new();
        let mut in_si = false;
        let mut in_text = false;

        loop {
            match reader
                .read_event_into(&mut buf)
                .map_err(|source| PackageError::Xml {
                    part: "sharedStrings.xml".to_string(),
                    source,
                })? {
                Event::Start(e) if e.name().as_ref() == b"si" => {
                    in_si = true;
                    current.clear();
                }
                Event::End(e) if e.name().as_ref() == b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                Event::Start(e) if in_si && e.name().as_ref() == b"t" => in_text = true,
                Event::End(e) if e.name().as_ref() == b"t" => in_text = false,
                Event::Text(t) if in_si && in_text => {
                    current.push_str(&t.unescape().unwrap_or_default());
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(SharedStrings(strings))
    }
}

/// Number-format id → "is this a date/datetime format" classification,
/// needed so a numeric cell's formatted text resolves to a date string
/// rather than a raw serial number (spec §4.4 "resolve via … number-format
/// tables").
#[derive(Debug, Default, Clone)]
pub struct NumberFormats {
    date_format_ids: BTreeMap<i64, bool>,
}

/// Builtin Excel numFmtIds reserved for date/time display (ECMA-376 Part 1,
/// §18.8.30 table). Custom formats are classified by a `d`/`m`/`y`/`h`
/// presence heuristic when parsed from `<numFmt>`.
const BUILTIN_DATE_FMT_IDS: &[i64] = &[14, 15, 16, 17, 18, 19, 20, 21, 22, 45, 46, 47];

impl NumberFormats {
    pub fn is_date_format(&self, fmt_id: i64) -> bool {
        if BUILTIN_DATE_FMT_IDS.contains(&fmt_id) {
            return true;
        }
        self.date_format_ids.get(&fmt_id).copied().unwrap_or(false)
    }

    /// Parses `xl/styles.xml`'s `<numFmts>` custom formats and classifies
    /// each by its format-code text.
    pub fn parse(xml: impl std::io::BufRead) -> Result<Self, PackageError> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        let mut date_format_ids = BTreeMap::new();

        loop {
            match reader
                .read_event_into(&mut buf)
                .map_err(|source| PackageError::Xml {
                    part: "styles.xml".to_string(),
                    source,
                })? {
                Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"numFmt" => {
                    let mut id = None;
                    let mut code = String::new();
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"numFmtId" => {
                                id = String::from_utf8_lossy(&attr.value).parse::<i64>().ok();
                            }
                            b"formatCode" => {
                                code = String::from_utf8_lossy(&attr.value).to_string();
                            }
                            _ => {}
                        }
                    }
                    if let Some(id) = id {
                        let lower = code.to_ascii_lowercase();
                        let is_date = lower.contains('d') || lower.contains('y')
                            || (lower.contains('h') && lower.contains(':'));
                        date_format_ids.insert(id, is_date);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(NumberFormats { date_format_ids })
    }
}

/// A sheet listed in `workbook.xml`, resolved to its package part path via
/// `workbook.xml.rels`.
#[derive(Debug, Clone)]
pub struct SheetRef {
    pub name: String,
    pub part_path: String,
}

pub fn list_sheets<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<Vec<SheetRef>, PackageError> {
    let (names_and_rids, rid_to_target) = {
        let workbook_xml = {
            let mut f = archive.by_name("xl/workbook.xml")?;
            let mut s = String::new();
            f.read_to_string(&mut s)?;
            s
        };
        let rels_xml = {
            let mut f = archive.by_name("xl/_rels/workbook.xml.rels")?;
            let mut s = String::new();
            f.read_to_string(&mut s)?;
            s
        };
        (parse_sheet_names(&workbook_xml)?, parse_rels(&rels_xml)?)
    };

    let mut sheets = Vec::with_capacity(names_and_rids.len());
    for (name, rid) in names_and_rids {
        let target = rid_to_target
            .get(&rid)
            .ok_or(PackageError::MalformedWorkbook)?;
        let part_path = if target.starts_with("xl/") {
            target.clone()
        } else {
            format!("xl/{}", target.trim_start_matches('/'))
        };
        sheets.push(SheetRef { name, part_path });
    }
    Ok(sheets)
}

fn parse_sheet_names(xml: &str) -> Result<Vec<(String, String)>, PackageError> {
    let mut reader = Reader::from_reader(BufReader::new(xml.as_bytes()));
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|source| PackageError::Xml {
                part: "workbook.xml".to_string(),
                source,
            })? {
            Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut rid = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => name = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        k if k.ends_with(b"id") && k != b"sheetId" => {
                            rid = Some(String::from_utf8_lossy(&attr.value).to_string());
                        }
                        _ => {}
                    }
                }
                if let (Some(name), Some(rid)) = (name, rid) {
                    sheets.push((name, rid));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    if sheets.is_empty() {
        return Err(PackageError::MalformedWorkbook);
    }
    Ok(sheets)
}

fn parse_rels(xml: &str) -> Result<BTreeMap<String, String>, PackageError> {
    let mut reader = Reader::from_reader(BufReader::new(xml.as_bytes()));
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut map = BTreeMap::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|source| PackageError::Xml {
                part: "workbook.xml.rels".to_string(),
                source,
            })? {
            Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        b"Target" => {
                            target = Some(String::from_utf8_lossy(&attr.value).to_string())
                        }
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    map.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_strings_parses_plain_and_rich_text() {
        let xml = br#"<?xml version="1.0"?><sst><si><t>Hello</t></si><si><r><t>Wo</t></r><r><t>rld</t></r></si></sst>"#;
        let strings = SharedStrings::parse(&xml[..]).unwrap();
        assert_eq!(strings.get(0), Some("Hello"));
        assert_eq!(strings.get(1), Some("World"));
    }

    #[test]
    fn builtin_date_formats_are_recognized() {
        let nf = NumberFormats::default();
        assert!(nf.is_date_format(14));
        assert!(!nf.is_date_format(1));
    }

    #[test]
    fn custom_date_format_classified_from_format_code() {
        let xml = br#"<?xml version="1.0"?><styleSheet><numFmts><numFmt numFmtId="200" formatCode="dd/mm/yyyy"/></numFmts></styleSheet>"#;
        let nf = NumberFormats::parse(&xml[..]).unwrap();
        assert!(nf.is_date_format(200));
    }
}
