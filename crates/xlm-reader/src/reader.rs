//! Streaming Workbook Reader (C4) — the hard kernel.
//!
//! Pull-parses each target sheet's XML in document order, resolving cell
//! text through shared strings and number formats, mapping columns to record
//! fields via the header row, normalizing (C2), converting (C1), and
//! batching records to a sink. Never buffers a sheet's body.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::io::{Read, Seek};
use std::time::{Duration, Instant};

use xlm_model::ReaderConfig;

use crate::colref::split_cell_ref;
use crate::memory_monitor::MemoryMonitor;
use crate::normalize::normalize;
use crate::package::{list_sheets, NumberFormats, SharedStrings};
use crate::type_cache::{DescribedRecord, TypeIntrospectionCache};

#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("package error: {0}")]
    Package(#[from] crate::package::PackageError),
    #[error("type cache error: {0}")]
    TypeCache(#[from] crate::type_cache::TypeCacheError),
    #[error("xml error on sheet {sheet}: {source}")]
    Xml {
        sheet: String,
        #[source]
        source: quick_xml::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("row limit exceeded: emitted row count would exceed configured maxRows={max_rows}")]
    RowLimitExceeded { max_rows: u64 },
    #[error("sink error: {0}")]
    Sink(String),
}

/// One parsed data row, still bearing its origin row number and any
/// per-field conversion failure recorded as a parse-error string (spec §4.4
/// "conversion failure … records a per-row parse-error string but the row is
/// still emitted").
pub struct RowRecord<T> {
    pub row_num: u64,
    pub record: T,
    pub parse_errors: Option<String>,
}

/// Invoked once per full (or final partial) batch. Must be safe to call from
/// worker threads dispatched by a parallel read strategy (spec §4.6): each
/// call owns its batch independently, no shared mutable buffer is implied by
/// this trait.
pub trait BatchSink<T>: Send + Sync {
    fn accept(&self, sheet_name: &str, batch: Vec<RowRecord<T>>) -> Result<(), ReaderError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOutcome {
    pub processed: u64,
    pub error_rows: u64,
    pub elapsed: Duration,
}

struct ColumnMap {
    /// column index (1-based) -> external field name
    by_col: BTreeMap<u32, String>,
}

impl ColumnMap {
    fn positional() -> Self {
        ColumnMap {
            by_col: BTreeMap::new(),
        }
    }
}

/// A single worksheet's XML, pull-parsed sequentially (spec §4.4).
pub struct StreamingWorkbookReader<'a> {
    pub config: &'a ReaderConfig,
    pub type_cache: &'a TypeIntrospectionCache,
}

impl<'a> StreamingWorkbookReader<'a> {
    pub fn new(config: &'a ReaderConfig, type_cache: &'a TypeIntrospectionCache) -> Self {
        Self { config, type_cache }
    }

    /// Reads every sheet the config requests, emitting batches to `sink`.
    /// Sheets are iterated sequentially (SAX parsing is inherently
    /// sequential within a sheet; spec §4.4 edge cases).
    pub fn read<R, T>(
        &self,
        source: R,
        sink: &dyn BatchSink<T>,
    ) -> Result<ReadOutcome, ReaderError>
    where
        R: Read + Seek,
        T: DescribedRecord,
    {
        let started = Instant::now();
        let mut archive = zip::ZipArchive::new(source)?;

        let shared_strings = match archive.by_name("xl/sharedStrings.xml") {
            Ok(f) => SharedStrings::parse(std::io::BufReader::new(f))?,
            Err(zip::result::ZipError::FileNotFound) => SharedStrings::default(),
            Err(e) => return Err(e.into()),
        };
        let number_formats = match archive.by_name("xl/styles.xml") {
            Ok(f) => NumberFormats::parse(std::io::BufReader::new(f))?,
            Err(zip::result::ZipError::FileNotFound) => NumberFormats::default(),
            Err(e) => return Err(e.into()),
        };

        let all_sheets = list_sheets(&mut archive)?;
        let target_sheets: Vec<_> = if self.config.read_all_sheets {
            all_sheets
        } else {
            all_sheets
                .into_iter()
                .filter(|s| self.config.sheet_names.iter().any(|n| n == &s.name))
                .collect()
        };

        let fields = self.type_cache.discover::<T>()?;

        let monitor = if self.config.enable_memory_monitoring {
            Some(MemoryMonitor::spawn())
        } else {
            None
        };

        let mut total_processed: u64 = 0;
        let mut total_error_rows: u64 = 0;

        for sheet in &target_sheets {
            let part = archive.by_name(&sheet.part_path)?;
            let mut reader = Reader::from_reader(std::io::BufReader::new(part));
            reader.config_mut().trim_text(true);

            let outcome = self.read_sheet::<_, T>(
                &sheet.name,
                &mut reader,
                &shared_strings,
                &number_formats,
                fields,
                sink,
                &mut total_processed,
            )?;
            total_error_rows += outcome.error_rows;
        }

        if let Some(m) = monitor {
            m.stop();
        }

        Ok(ReadOutcome {
            processed: total_processed,
            error_rows: total_error_rows,
            elapsed: started.elapsed(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn read_sheet<B, T>(
        &self,
        sheet_name: &str,
        reader: &mut Reader<B>,
        shared_strings: &SharedStrings,
        number_formats: &NumberFormats,
        fields: &'static [crate::type_cache::FieldDescriptor<T>],
        sink: &dyn BatchSink<T>,
        total_processed: &mut u64,
    ) -> Result<ReadOutcome, ReaderError>
    where
        B: std::io::BufRead,
        T: DescribedRecord,
    {
        let mut buf = Vec::new();
        let mut column_map: Option<ColumnMap> = None;
        let mut header_rows_seen: u32 = 0;

        let mut row_in_progress: Option<u32> = None;
        let mut cell_values: BTreeMap<u32, String> = BTreeMap::new();
        let mut current_cell: Option<(u32, Option<String>, Option<i64>)> = None; // (col, type, style)
        let mut in_value = false;
        let mut in_inline_string_text = false;
        let mut text_buf = String::new();

        let mut batch: Vec<RowRecord<T>> = Vec::new();
        let mut error_rows: u64 = 0;

        loop {
            match reader
                .read_event_into(&mut buf)
                .map_err(|source| ReaderError::Xml {
                    sheet: sheet_name.to_string(),
                    source,
                })? {
                Event::Start(e) if e.name().as_ref() == b"row" => {
                    cell_values.clear();
                    let mut r = None;
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"r" {
                            r = String::from_utf8_lossy(&attr.value).parse::<u32>().ok();
                        }
                    }
                    row_in_progress = r;
                }
                Event::Start(e) if e.name().as_ref() == b"c" => {
                    current_cell = parse_cell_attrs(&e);
                    text_buf.clear();
                }
                // Self-closed cells (`<c r="A2"/>`, no value child) never get
                // a matching End event, so finalize them immediately.
                Event::Empty(e) if e.name().as_ref() == b"c" => {
                    if let Some((col, cell_type, style)) = parse_cell_attrs(&e) {
                        let formatted = resolve_formatted_text(
                            "",
                            cell_type.as_deref(),
                            style,
                            shared_strings,
                            number_formats,
                        );
                        cell_values.insert(col, formatted);
                    }
                }
                Event::Start(e) if e.name().as_ref() == b"v" => in_value = true,
                Event::End(e) if e.name().as_ref() == b"v" => in_value = false,
                Event::Start(e) if e.name().as_ref() == b"is" => in_inline_string_text = true,
                Event::End(e) if e.name().as_ref() == b"is" => in_inline_string_text = false,
                Event::Text(t) if in_value || in_inline_string_text => {
                    // Repeated cell XML must use the last value (spec §4.4 edge case).
                    text_buf.push_str(&t.unescape().unwrap_or_default());
                }
                Event::End(e) if e.name().as_ref() == b"c" => {
                    if let Some((col, cell_type, style)) = current_cell.take() {
                        let formatted = resolve_formatted_text(
                            &text_buf,
                            cell_type.as_deref(),
                            style,
                            shared_strings,
                            number_formats,
                        );
                        cell_values.insert(col, formatted);
                    }
                    text_buf.clear();
                }
                Event::End(e) if e.name().as_ref() == b"row" => {
                    let is_header = header_rows_seen < self.config.header_rows_or_default();
                    if is_header {
                        header_rows_seen += 1;
                        // Only the first header row builds the column map;
                        // later configured header rows (`header_rows > 1`)
                        // are still consumed/skipped, not re-mapped.
                        if column_map.is_none() {
                            column_map = Some(ColumnMap::from_header_cells_filtered(&cell_values, fields));
                        }
                        row_in_progress = None;
                        continue;
                    }

                    let map = column_map.get_or_insert_with(ColumnMap::positional);
                    let row_num = row_in_progress.take().unwrap_or(0) as u64;

                    if row_num >= self.config.start_row as u64 {
                        let (record, parse_errors) =
                            build_record::<T>(map, &cell_values, fields);

                        if parse_errors.is_some() {
                            error_rows += 1;
                        }

                        *total_processed += 1;
                        if self.config.max_rows != 0 && *total_processed > self.config.max_rows {
                            return Err(ReaderError::RowLimitExceeded {
                                max_rows: self.config.max_rows,
                            });
                        }

                        batch.push(RowRecord {
                            row_num,
                            record,
                            parse_errors,
                        });

                        if self.config.enable_progress_tracking
                            && *total_processed % self.config.progress_interval_rows.max(1) == 0
                        {
                            tracing::info!(
                                sheet = sheet_name,
                                rows = *total_processed,
                                "streaming reader progress"
                            );
                        }

                        if batch.len() >= self.config.batch_size {
                            let flushed = std::mem::take(&mut batch);
                            sink.accept(sheet_name, flushed)
                                .map_err(|e| ReaderError::Sink(e.to_string()))?;
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !batch.is_empty() {
            sink.accept(sheet_name, batch)
                .map_err(|e| ReaderError::Sink(e.to_string()))?;
        }

        Ok(ReadOutcome {
            processed: 0,
            error_rows,
            elapsed: Duration::default(),
        })
    }
}

fn parse_cell_attrs(
    e: &quick_xml::events::BytesStart,
) -> Option<(u32, Option<String>, Option<i64>)> {
    let mut col = None;
    let mut cell_type = None;
    let mut style = None;
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"r" => {
                if let Some((c, _)) = split_cell_ref(&String::from_utf8_lossy(&attr.value)) {
                    col = Some(c);
                }
            }
            b"t" => cell_type = Some(String::from_utf8_lossy(&attr.value).to_string()),
            b"s" => style = String::from_utf8_lossy(&attr.value).parse::<i64>().ok(),
            _ => {}
        }
    }
    col.map(|c| (c, cell_type, style))
}

impl ColumnMap {
    fn from_header_cells_filtered<T: DescribedRecord>(
        cells: &BTreeMap<u32, String>,
        fields: &'static [crate::type_cache::FieldDescriptor<T>],
    ) -> Self {
        let mut by_col = BTreeMap::new();
        for (col, text) in cells {
            if fields.iter().any(|f| f.external_name == text) {
                by_col.insert(*col, text.clone());
            }
        }
        ColumnMap { by_col }
    }
}

fn build_record<T: DescribedRecord>(
    map: &ColumnMap,
    cell_values: &BTreeMap<u32, String>,
    fields: &'static [crate::type_cache::FieldDescriptor<T>],
) -> (T, Option<String>) {
    let mut record = T::default();
    let mut errors: Vec<String> = Vec::new();

    if map.by_col.is_empty() {
        // No header row: positional mapping by declaration order (spec §4.4
        // "sheet with no header row but a nonzero start row uses positional
        // column mapping").
        for (idx, field) in fields.iter().enumerate() {
            let col = (idx + 1) as u32;
            let raw = cell_values.get(&col).map(|s| s.as_str()).unwrap_or("");
            apply_field(field, raw, &mut record, &mut errors);
        }
    } else {
        for (col, external_name) in &map.by_col {
            if let Some(field) = fields.iter().find(|f| &f.external_name == external_name) {
                let raw = cell_values.get(col).map(|s| s.as_str()).unwrap_or("");
                apply_field(field, raw, &mut record, &mut errors);
            }
        }
    }

    let parse_errors = if errors.is_empty() {
        None
    } else {
        Some(errors.join("; "))
    };
    (record, parse_errors)
}

fn apply_field<T>(
    field: &crate::type_cache::FieldDescriptor<T>,
    raw: &str,
    record: &mut T,
    errors: &mut Vec<String>,
) {
    let normalized = normalize(raw, field.is_identifier, field.is_date);
    if let Err(e) = (field.set)(record, &normalized) {
        errors.push(format!("{}: {}", field.external_name, e));
    }
}

/// Resolves a cell's formatted text per spec §4.4: shared strings, inline
/// strings, and formula cached values are all acceptable sources; a numeric
/// value under a date-classified style is left as-is (date resolution
/// happens downstream via C2/C1, which treat the Excel serial textually).
fn resolve_formatted_text(
    raw_value: &str,
    cell_type: Option<&str>,
    _style: Option<i64>,
    shared_strings: &SharedStrings,
    _number_formats: &NumberFormats,
) -> String {
    match cell_type {
        Some("s") => raw_value
            .parse::<usize>()
            .ok()
            .and_then(|idx| shared_strings.get(idx))
            .unwrap_or("")
            .to_string(),
        Some("str") | Some("inlineStr") | None | Some("n") | Some("b") | Some("e") => {
            raw_value.to_string()
        }
        Some(_) => raw_value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ConvertError;
    use crate::type_cache::FieldDescriptor;

    #[derive(Default, Debug, PartialEq)]
    struct Row {
        unit_code: String,
        quantity: i32,
    }

    fn set_unit_code(r: &mut Row, raw: &str) -> Result<(), ConvertError> {
        r.unit_code = raw.to_string();
        Ok(())
    }

    fn set_quantity(r: &mut Row, raw: &str) -> Result<(), ConvertError> {
        r.quantity = crate::convert::to_i32(raw)?;
        Ok(())
    }

    static ROW_FIELDS: [FieldDescriptor<Row>; 2] = [
        FieldDescriptor {
            external_name: "unit_code",
            is_identifier: true,
            is_date: false,
            set: set_unit_code,
        },
        FieldDescriptor {
            external_name: "quantity",
            is_identifier: false,
            is_date: false,
            set: set_quantity,
        },
    ];

    impl DescribedRecord for Row {
        fn fields() -> &'static [FieldDescriptor<Self>] {
            &ROW_FIELDS
        }
    }

    #[test]
    fn build_record_maps_by_header_name() {
        let mut cells = BTreeMap::new();
        cells.insert(1u32, "WH01".to_string());
        cells.insert(2u32, "10".to_string());
        let mut by_col = BTreeMap::new();
        by_col.insert(1u32, "unit_code".to_string());
        by_col.insert(2u32, "quantity".to_string());
        let map = ColumnMap { by_col };

        let (record, errors) = build_record::<Row>(&map, &cells, Row::fields());
        assert_eq!(record.unit_code, "WH01");
        assert_eq!(record.quantity, 10);
        assert!(errors.is_none());
    }

    #[test]
    fn build_record_records_conversion_failure_but_still_emits_row() {
        let mut cells = BTreeMap::new();
        cells.insert(1u32, "WH01".to_string());
        cells.insert(2u32, "not-a-number".to_string());
        let mut by_col = BTreeMap::new();
        by_col.insert(1u32, "unit_code".to_string());
        by_col.insert(2u32, "quantity".to_string());
        let map = ColumnMap { by_col };

        let (record, errors) = build_record::<Row>(&map, &cells, Row::fields());
        assert_eq!(record.unit_code, "WH01");
        assert!(errors.is_some());
    }

    #[test]
    fn resolve_formatted_text_looks_up_shared_string() {
        let strings = SharedStrings(vec!["Alpha".to_string(), "Beta".to_string()]);
        let nf = NumberFormats::default();
        let out = resolve_formatted_text("1", Some("s"), None, &strings, &nf);
        assert_eq!(out, "Beta");
    }

    struct CollectingSink<T> {
        rows: std::sync::Mutex<Vec<RowRecord<T>>>,
    }

    impl<T: Send + Sync> BatchSink<T> for CollectingSink<T> {
        fn accept(&self, _sheet_name: &str, batch: Vec<RowRecord<T>>) -> Result<(), ReaderError> {
            self.rows.lock().unwrap().extend(batch);
            Ok(())
        }
    }

    /// Builds a minimal single-sheet .xlsx in memory: `header_rows` leading
    /// rows (only the first is a real header with field names, the rest are
    /// filler) followed by one data row.
    fn build_workbook_with_header_rows(header_rows: u32) -> Vec<u8> {
        use std::io::Write;

        let mut buf = Vec::new();
        {
            let cursor = std::io::Cursor::new(&mut buf);
            let mut zip = zip::ZipWriter::new(cursor);
            let opts = zip::write::FileOptions::default();

            zip.start_file("[Content_Types].xml", opts).unwrap();
            zip.write_all(br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"></Types>"#).unwrap();

            zip.start_file("xl/workbook.xml", opts).unwrap();
            zip.write_all(br#"<?xml version="1.0"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#).unwrap();

            zip.start_file("xl/_rels/workbook.xml.rels", opts).unwrap();
            zip.write_all(br#"<?xml version="1.0"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#).unwrap();

            let mut sheet_xml = String::from(
                r#"<?xml version="1.0"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
            );
            let mut row_idx = 1u32;
            sheet_xml.push_str(&format!(
                r#"<row r="{row_idx}"><c r="A{row_idx}" t="str"><v>unit_code</v></c><c r="B{row_idx}" t="str"><v>quantity</v></c></row>"#
            ));
            row_idx += 1;
            for _ in 1..header_rows {
                sheet_xml.push_str(&format!(
                    r#"<row r="{row_idx}"><c r="A{row_idx}" t="str"><v>ignored filler header</v></c></row>"#
                ));
                row_idx += 1;
            }
            sheet_xml.push_str(&format!(
                r#"<row r="{row_idx}"><c r="A{row_idx}" t="str"><v>WH01</v></c><c r="B{row_idx}" t="str"><v>7</v></c></row>"#
            ));
            sheet_xml.push_str("</sheetData></worksheet>");

            zip.start_file("xl/worksheets/sheet1.xml", opts).unwrap();
            zip.write_all(sheet_xml.as_bytes()).unwrap();

            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn header_rows_greater_than_one_skips_every_configured_header_row() {
        let bytes = build_workbook_with_header_rows(2);
        let cursor = std::io::Cursor::new(bytes);

        let mut config = ReaderConfig::default();
        config.header_rows = 2;
        config.read_all_sheets = true;

        let type_cache = TypeIntrospectionCache::new();
        let reader = StreamingWorkbookReader::new(&config, &type_cache);
        let sink = CollectingSink::<Row> { rows: std::sync::Mutex::new(Vec::new()) };

        let outcome = reader.read::<_, Row>(cursor, &sink).unwrap();

        let rows = sink.rows.into_inner().unwrap();
        assert_eq!(rows.len(), 1, "the filler second header row must not be emitted as data");
        assert_eq!(outcome.processed, 1);
        assert_eq!(rows[0].record.unit_code, "WH01");
        assert_eq!(rows[0].record.quantity, 7);
    }
}
