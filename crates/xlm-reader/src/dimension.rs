//! Dimension Prevalidator (C3). Pull-parses only the `<dimension ref="…">`
//! element of each sheet part, never buffering sheet body bytes (spec §4.3).

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::io::{Read, Seek};

use crate::colref::split_cell_ref;

#[derive(Debug, thiserror::Error)]
pub enum DimensionError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("xml error reading sheet {sheet}: {source}")]
    Xml {
        sheet: String,
        #[source]
        source: quick_xml::Error,
    },
    #[error("sheet {sheet} has no <dimension> element")]
    MissingDimension { sheet: String },
    #[error("sheet {sheet} dimension ref {raw:?} could not be parsed")]
    MalformedRef { sheet: String, raw: String },
    #[error("sheets exceed configured row cap: {violations}")]
    CapExceeded { violations: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetDimension {
    pub first_row: u32,
    pub last_row: u32,
    pub first_col: u32,
    pub last_col: u32,
}

impl SheetDimension {
    /// Data-row count after excluding header rows (spec §4.3).
    pub fn data_row_count(&self, header_rows: u32) -> u64 {
        let total = (self.last_row - self.first_row + 1) as u64;
        total.saturating_sub(header_rows as u64)
    }
}

/// Parses `A1:C500`-style dimension refs into 1-based row/col bounds.
pub fn parse_dimension_ref(raw: &str) -> Option<SheetDimension> {
    let (start, end) = raw.split_once(':').unwrap_or((raw, raw));
    let (sc, sr) = split_cell_ref(start)?;
    let (ec, er) = split_cell_ref(end)?;
    Some(SheetDimension {
        first_row: sr,
        last_row: er,
        first_col: sc,
        last_col: ec,
    })
}

/// Pull-parses a single sheet XML part for its `<dimension>` element only;
/// stops reading as soon as it's found.
pub fn read_sheet_dimension(
    sheet_name: &str,
    xml: impl std::io::BufRead,
) -> Result<SheetDimension, DimensionError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"dimension" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"ref" {
                        let raw = String::from_utf8_lossy(&attr.value).to_string();
                        return parse_dimension_ref(&raw).ok_or_else(|| {
                            DimensionError::MalformedRef {
                                sheet: sheet_name.to_string(),
                                raw,
                            }
                        });
                    }
                }
            }
            // <dimension> always precedes <sheetData>; once we've reached
            // rows without finding it, the sheet genuinely has none.
            Ok(Event::Start(e)) if e.name().as_ref() == b"sheetData" => {
                return Err(DimensionError::MissingDimension {
                    sheet: sheet_name.to_string(),
                })
            }
            Ok(Event::Eof) => {
                return Err(DimensionError::MissingDimension {
                    sheet: sheet_name.to_string(),
                })
            }
            Err(source) => {
                return Err(DimensionError::Xml {
                    sheet: sheet_name.to_string(),
                    source,
                })
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Sheet name → data row count, produced by opening only each sheet part.
pub type DimensionMap = BTreeMap<String, u64>;

#[derive(Debug, Clone)]
pub struct CapViolation {
    pub sheet_name: String,
    pub row_count: u64,
    pub cap: u64,
}

/// Scans every sheet in the package, enforcing one of the two caps named in
/// spec §4.3 (per-job total or per-sheet, depending on the caller's phase).
pub struct DimensionPrevalidator;

impl DimensionPrevalidator {
    pub fn scan<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
        sheet_parts: &[(String, String)],
        header_rows: u32,
    ) -> Result<DimensionMap, DimensionError> {
        let mut map = DimensionMap::new();
        for (sheet_name, part_path) in sheet_parts {
            let file = archive.by_name(part_path)?;
            let buf_reader = std::io::BufReader::new(file);
            let dim = read_sheet_dimension(sheet_name, buf_reader)?;
            map.insert(sheet_name.clone(), dim.data_row_count(header_rows));
        }
        Ok(map)
    }

    pub fn enforce_per_sheet_cap(map: &DimensionMap, cap: u64) -> Result<(), DimensionError> {
        let violations: Vec<CapViolation> = map
            .iter()
            .filter(|(_, &count)| count > cap)
            .map(|(name, &count)| CapViolation {
                sheet_name: name.clone(),
                row_count: count,
                cap,
            })
            .collect();
        Self::raise_if_any(violations)
    }

    pub fn enforce_total_cap(map: &DimensionMap, cap: u64) -> Result<(), DimensionError> {
        let total: u64 = map.values().sum();
        if total > cap {
            return Err(DimensionError::CapExceeded {
                violations: format!("total rows {} exceed cap {}", total, cap),
            });
        }
        Ok(())
    }

    fn raise_if_any(violations: Vec<CapViolation>) -> Result<(), DimensionError> {
        if violations.is_empty() {
            return Ok(());
        }
        let joined = violations
            .iter()
            .map(|v| format!("{} ({} > {})", v.sheet_name, v.row_count, v.cap))
            .collect::<Vec<_>>()
            .join(", ");
        Err(DimensionError::CapExceeded { violations: joined })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_range() {
        let dim = parse_dimension_ref("A1:C500").unwrap();
        assert_eq!(dim.first_row, 1);
        assert_eq!(dim.last_row, 500);
        assert_eq!(dim.first_col, 1);
        assert_eq!(dim.last_col, 3);
    }

    #[test]
    fn parses_single_cell_ref() {
        let dim = parse_dimension_ref("B2").unwrap();
        assert_eq!(dim.first_row, 2);
        assert_eq!(dim.last_row, 2);
    }

    #[test]
    fn data_row_count_subtracts_header_rows() {
        let dim = SheetDimension {
            first_row: 1,
            last_row: 501,
            first_col: 1,
            last_col: 3,
        };
        assert_eq!(dim.data_row_count(1), 500);
    }

    #[test]
    fn reads_dimension_from_minimal_sheet_xml() {
        let xml = br#"<?xml version="1.0"?><worksheet><dimension ref="A1:D100"/><sheetData></sheetData></worksheet>"#;
        let dim = read_sheet_dimension("Sheet1", &xml[..]).unwrap();
        assert_eq!(dim.last_row, 100);
        assert_eq!(dim.last_col, 4);
    }

    #[test]
    fn missing_dimension_is_reported() {
        let xml = br#"<?xml version="1.0"?><worksheet><sheetData></sheetData></worksheet>"#;
        let err = read_sheet_dimension("Sheet1", &xml[..]).unwrap_err();
        assert!(matches!(err, DimensionError::MissingDimension { .. }));
    }

    #[test]
    fn cap_violation_lists_all_offenders() {
        let mut map = DimensionMap::new();
        map.insert("Sheet1".to_string(), 100);
        map.insert("Sheet2".to_string(), 5);
        let err = DimensionPrevalidator::enforce_per_sheet_cap(&map, 50).unwrap_err();
        match err {
            DimensionError::CapExceeded { violations } => {
                assert!(violations.contains("Sheet1"));
                assert!(!violations.contains("Sheet2"));
            }
            _ => panic!("expected CapExceeded"),
        }
    }
}
