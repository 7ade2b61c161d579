//! Row normalizer.
//!
//! Maps a spreadsheet row with arbitrary header spelling onto a
//! [`CandidateRecord`]. Each canonical field has an ordered alias list; the
//! first alias present with a non-null value wins.
//!
//! Lookup runs in two passes: exact header text first, then headers compared
//! in canonical form (case, diacritics, whitespace and punctuation ignored),
//! still in alias order.

use crate::models::CandidateRecord;
use serde_json::{Map, Value as JsonValue};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// One spreadsheet row: header -> cell, in file column order.
pub type RawRow = Map<String, JsonValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    EoNumber,
    Year,
    VehicleMake,
    VehicleModel,
    Manufacturer,
    TestGroup,
    EngineSize,
    EvaporativeFamily,
    VehicleClass,
    ExhaustEcsFeatures,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::EoNumber,
        Field::Year,
        Field::VehicleMake,
        Field::VehicleModel,
        Field::Manufacturer,
        Field::TestGroup,
        Field::EngineSize,
        Field::EvaporativeFamily,
        Field::VehicleClass,
        Field::ExhaustEcsFeatures,
    ];

    /// Header aliases in priority order.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::EoNumber => &[
                "EO Number",
                "eo_number",
                "eoNumber",
                "EO Number ",
                "EO_Number",
                "EO No",
                "EO #",
                "Executive Order",
                "Executive Order Number",
                "EO",
            ],
            Field::Year => &["Year", "year", "Model Year", "model_year", "MY"],
            Field::VehicleMake => &["Vehicle Make", "vehicle_make", "vehicleMake", "Make", "make"],
            Field::VehicleModel => &[
                "Vehicle Model",
                "vehicle_model",
                "vehicleModel",
                "Model",
                "model",
            ],
            Field::Manufacturer => &["Manufacturer", "manufacturer", "Mfr", "MFR Name"],
            Field::TestGroup => &["Test Group", "test_group", "testGroup", "Engine Family"],
            Field::EngineSize => &[
                "Engine Size (L)",
                "engine_size",
                "engineSize",
                "Engine Size",
                "Displacement",
                "Displacement (L)",
            ],
            Field::EvaporativeFamily => &[
                "Evaporative Family",
                "evaporative_family",
                "evaporativeFamily",
                "Evap Family",
            ],
            Field::VehicleClass => &["Vehicle Class", "vehicle_class", "vehicleClass", "Class"],
            Field::ExhaustEcsFeatures => &[
                "Exhaust ECS Features",
                "exhaust_ecs_features",
                "exhaustEcsFeatures",
                "ECS Features",
                "Exhaust Emission Control System",
            ],
        }
    }

    fn assign(self, record: &mut CandidateRecord, value: Option<String>) {
        let slot = match self {
            Field::EoNumber => &mut record.eo_number,
            Field::Year => &mut record.year,
            Field::VehicleMake => &mut record.vehicle_make,
            Field::VehicleModel => &mut record.vehicle_model,
            Field::Manufacturer => &mut record.manufacturer,
            Field::TestGroup => &mut record.test_group,
            Field::EngineSize => &mut record.engine_size,
            Field::EvaporativeFamily => &mut record.evaporative_family,
            Field::VehicleClass => &mut record.vehicle_class,
            Field::ExhaustEcsFeatures => &mut record.exhaust_ecs_features,
        };
        *slot = value;
    }
}

/// Normalize one row. Fields with no matching header are `None`.
pub fn normalize(row: &RawRow) -> CandidateRecord {
    let canonical_headers: Vec<(String, &JsonValue)> = row
        .iter()
        .map(|(header, value)| (canonical(header), value))
        .collect();

    let mut record = CandidateRecord::default();
    for field in Field::ALL {
        let value = exact_match(row, field.aliases())
            .or_else(|| canonical_match(&canonical_headers, field.aliases()));
        field.assign(&mut record, value);
    }
    record
}

fn exact_match(row: &RawRow, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .find_map(|alias| row.get(*alias).and_then(cell_text))
}

fn canonical_match(headers: &[(String, &JsonValue)], aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|alias| {
        let wanted = canonical(alias);
        headers
            .iter()
            .filter(|(header, _)| *header == wanted)
            .find_map(|(_, value)| cell_text(value))
    })
}

/// Lower-cased, diacritics stripped, alphanumerics only.
pub fn canonical(header: &str) -> String {
    header
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(|c| c.to_lowercase())
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Render a cell as trimmed text. Null and blank cells are `None`.
pub fn cell_text(value: &JsonValue) -> Option<String> {
    let text = match value {
        JsonValue::Null => return None,
        JsonValue::String(s) => s.trim().to_string(),
        JsonValue::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        JsonValue::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
