//! The one concrete record type the Streaming Workbook Reader (C4) binds
//! spreadsheet columns onto for this migration engine. Spec §4.1 describes a
//! reflection-driven binding to an arbitrary target class; since the target
//! schema here is the fixed warehouse/case-detail domain (spec §3), that
//! target class is this single `SourceRow`, and [`DescribedRecord::fields`]
//! plays the role the managed-runtime reader would fill via annotations.

use xlm_reader::convert::{to_i64, ConvertError};
use xlm_reader::type_cache::{DescribedRecord, FieldDescriptor};

#[derive(Debug, Default, Clone)]
pub struct SourceRow {
    pub unit_code: String,
    pub box_code: String,
    pub warehouse_code: String,
    pub location_area: String,
    pub location_row: String,
    pub location_col: String,
    pub doc_type_name: String,
    pub doc_date: String,
    pub quantity: i64,
    pub due_date: String,
    pub handover_date: String,
    pub case_pdm_status: String,
    pub box_status: String,
    pub box_state: String,
    pub retention_period: String,
}

impl SourceRow {
    /// The raw-plus-normalized pair the ingest sink needs, keyed exactly as
    /// `staging_raw.fields`/`normalized_fields` expect (spec §3 "StagingRaw").
    /// Both maps carry the same (already-normalized) values: normalization
    /// happens once, in the reader's `apply_field` step, before `set` is
    /// ever called, so there is no separate raw-vs-normalized distinction
    /// left to preserve by the time a `SourceRow` exists.
    pub fn to_field_map(&self) -> std::collections::BTreeMap<String, String> {
        let mut map = std::collections::BTreeMap::new();
        map.insert("unit_code".to_string(), self.unit_code.clone());
        map.insert("box_code".to_string(), self.box_code.clone());
        map.insert("warehouse_code".to_string(), self.warehouse_code.clone());
        map.insert("location_area".to_string(), self.location_area.clone());
        map.insert("location_row".to_string(), self.location_row.clone());
        map.insert("location_col".to_string(), self.location_col.clone());
        map.insert("doc_type_name".to_string(), self.doc_type_name.clone());
        map.insert("doc_date".to_string(), self.doc_date.clone());
        map.insert("quantity".to_string(), self.quantity.to_string());
        map.insert("due_date".to_string(), self.due_date.clone());
        map.insert("handover_date".to_string(), self.handover_date.clone());
        map.insert("case_pdm_status".to_string(), self.case_pdm_status.clone());
        map.insert("box_status".to_string(), self.box_status.clone());
        map.insert("box_state".to_string(), self.box_state.clone());
        map.insert("retention_period".to_string(), self.retention_period.clone());
        map
    }
}

macro_rules! set_string {
    ($fn_name:ident, $field:ident) => {
        fn $fn_name(r: &mut SourceRow, raw: &str) -> Result<(), ConvertError> {
            r.$field = raw.to_string();
            Ok(())
        }
    };
}

set_string!(set_unit_code, unit_code);
set_string!(set_box_code, box_code);
set_string!(set_warehouse_code, warehouse_code);
set_string!(set_location_area, location_area);
set_string!(set_location_row, location_row);
set_string!(set_location_col, location_col);
set_string!(set_doc_type_name, doc_type_name);
set_string!(set_doc_date, doc_date);
set_string!(set_due_date, due_date);
set_string!(set_handover_date, handover_date);
set_string!(set_case_pdm_status, case_pdm_status);
set_string!(set_box_status, box_status);
set_string!(set_box_state, box_state);
set_string!(set_retention_period, retention_period);

fn set_quantity(r: &mut SourceRow, raw: &str) -> Result<(), ConvertError> {
    r.quantity = to_i64(raw)?;
    Ok(())
}

static SOURCE_ROW_FIELDS: [FieldDescriptor<SourceRow>; 15] = [
    FieldDescriptor { external_name: "unit_code", is_identifier: true, is_date: false, set: set_unit_code },
    FieldDescriptor { external_name: "box_code", is_identifier: true, is_date: false, set: set_box_code },
    FieldDescriptor { external_name: "warehouse_code", is_identifier: true, is_date: false, set: set_warehouse_code },
    FieldDescriptor { external_name: "location_area", is_identifier: false, is_date: false, set: set_location_area },
    FieldDescriptor { external_name: "location_row", is_identifier: false, is_date: false, set: set_location_row },
    FieldDescriptor { external_name: "location_col", is_identifier: false, is_date: false, set: set_location_col },
    FieldDescriptor { external_name: "doc_type_name", is_identifier: false, is_date: false, set: set_doc_type_name },
    FieldDescriptor { external_name: "doc_date", is_identifier: false, is_date: true, set: set_doc_date },
    FieldDescriptor { external_name: "quantity", is_identifier: false, is_date: false, set: set_quantity },
    FieldDescriptor { external_name: "due_date", is_identifier: false, is_date: true, set: set_due_date },
    FieldDescriptor { external_name: "handover_date", is_identifier: false, is_date: true, set: set_handover_date },
    FieldDescriptor { external_name: "case_pdm_status", is_identifier: false, is_date: false, set: set_case_pdm_status },
    FieldDescriptor { external_name: "box_status", is_identifier: false, is_date: false, set: set_box_status },
    FieldDescriptor { external_name: "box_state", is_identifier: false, is_date: false, set: set_box_state },
    FieldDescriptor { external_name: "retention_period", is_identifier: true, is_date: false, set: set_retention_period },
];

impl DescribedRecord for SourceRow {
    fn fields() -> &'static [FieldDescriptor<Self>] {
        &SOURCE_ROW_FIELDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_map_round_trips_quantity_as_text() {
        let mut row = SourceRow::default();
        row.unit_code = "U1".to_string();
        row.quantity = 42;
        let map = row.to_field_map();
        assert_eq!(map.get("unit_code").unwrap(), "U1");
        assert_eq!(map.get("quantity").unwrap(), "42");
    }

    #[test]
    fn descriptor_count_matches_struct_fields() {
        assert_eq!(SourceRow::fields().len(), 15);
    }
}
