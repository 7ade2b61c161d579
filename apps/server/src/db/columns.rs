//! Column registry.
//!
//! Maps the logical keys used by the API (`make`, `eo_number`, `vehicleClass`, ...)
//! to the physical columns of `eo_certificates`, several of which contain spaces
//! and parentheses. This is the only place SQL identifiers come from: filter and
//! sort inputs are resolved here, and anything unknown never reaches a query.

use phf::phf_map;

pub const TABLE: &str = "eo_certificates";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Id,
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
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Timestamp,
}

static LOGICAL_KEYS: phf::Map<&'static str, Column> = phf_map! {
    "id" => Column::Id,
    "eo_number" => Column::EoNumber,
    "eoNumber" => Column::EoNumber,
    "year" => Column::Year,
    "make" => Column::VehicleMake,
    "vehicle_make" => Column::VehicleMake,
    "vehicleMake" => Column::VehicleMake,
    "model" => Column::VehicleModel,
    "vehicle_model" => Column::VehicleModel,
    "vehicleModel" => Column::VehicleModel,
    "manufacturer" => Column::Manufacturer,
    "test_group" => Column::TestGroup,
    "testGroup" => Column::TestGroup,
    "engine_size" => Column::EngineSize,
    "engineSize" => Column::EngineSize,
    "evaporative_family" => Column::EvaporativeFamily,
    "evaporativeFamily" => Column::EvaporativeFamily,
    "vehicle_class" => Column::VehicleClass,
    "vehicleClass" => Column::VehicleClass,
    "exhaust_ecs_features" => Column::ExhaustEcsFeatures,
    "exhaustEcsFeatures" => Column::ExhaustEcsFeatures,
    "created_at" => Column::CreatedAt,
    "createdAt" => Column::CreatedAt,
    "updated_at" => Column::UpdatedAt,
    "updatedAt" => Column::UpdatedAt,
};

impl Column {
    /// Columns a caller may filter on, in display order.
    pub const FILTERABLE: [Column; 10] = [
        Column::EoNumber,
        Column::Year,
        Column::VehicleMake,
        Column::VehicleModel,
        Column::Manufacturer,
        Column::TestGroup,
        Column::EngineSize,
        Column::EvaporativeFamily,
        Column::VehicleClass,
        Column::ExhaustEcsFeatures,
    ];

    /// Columns a caller may order by: the filterable ones plus id and timestamps.
    pub const SORTABLE: [Column; 13] = [
        Column::Id,
        Column::EoNumber,
        Column::Year,
        Column::VehicleMake,
        Column::VehicleModel,
        Column::Manufacturer,
        Column::TestGroup,
        Column::EngineSize,
        Column::EvaporativeFamily,
        Column::VehicleClass,
        Column::ExhaustEcsFeatures,
        Column::CreatedAt,
        Column::UpdatedAt,
    ];

    /// Text columns matched by the global search term.
    pub const SEARCHABLE: [Column; 6] = [
        Column::EoNumber,
        Column::VehicleMake,
        Column::VehicleModel,
        Column::Manufacturer,
        Column::TestGroup,
        Column::EvaporativeFamily,
    ];

    /// Default sort key for listings (newest model years first).
    pub const DEFAULT_SORT: Column = Column::Year;

    /// Resolve a logical key. Unknown keys yield `None`.
    pub fn resolve(key: &str) -> Option<Column> {
        LOGICAL_KEYS.get(key.trim()).copied()
    }

    /// Resolve a key usable in ORDER BY.
    pub fn resolve_sortable(key: &str) -> Option<Column> {
        Self::resolve(key).filter(|c| c.is_sortable())
    }

    /// Resolve a key usable as a filter.
    pub fn resolve_filterable(key: &str) -> Option<Column> {
        Self::resolve(key).filter(|c| c.is_filterable())
    }

    pub fn is_sortable(self) -> bool {
        Self::SORTABLE.contains(&self)
    }

    pub fn is_filterable(self) -> bool {
        Self::FILTERABLE.contains(&self)
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            Column::Id | Column::Year => ColumnKind::Integer,
            Column::CreatedAt | Column::UpdatedAt => ColumnKind::Timestamp,
            _ => ColumnKind::Text,
        }
    }

    /// Physical column name as stored in PostgreSQL.
    pub fn physical(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::EoNumber => "EO Number",
            Column::Year => "Year",
            Column::VehicleMake => "Vehicle Make",
            Column::VehicleModel => "Vehicle Model",
            Column::Manufacturer => "Manufacturer",
            Column::TestGroup => "Test Group",
            Column::EngineSize => "Engine Size (L)",
            Column::EvaporativeFamily => "Evaporative Family",
            Column::VehicleClass => "Vehicle Class",
            Column::ExhaustEcsFeatures => "Exhaust ECS Features",
            Column::CreatedAt => "created_at",
            Column::UpdatedAt => "updated_at",
        }
    }

    /// Quoted identifier, safe to interpolate into SQL.
    pub fn sql(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::EoNumber => r#""EO Number""#,
            Column::Year => r#""Year""#,
            Column::VehicleMake => r#""Vehicle Make""#,
            Column::VehicleModel => r#""Vehicle Model""#,
            Column::Manufacturer => r#""Manufacturer""#,
            Column::TestGroup => r#""Test Group""#,
            Column::EngineSize => r#""Engine Size (L)""#,
            Column::EvaporativeFamily => r#""Evaporative Family""#,
            Column::VehicleClass => r#""Vehicle Class""#,
            Column::ExhaustEcsFeatures => r#""Exhaust ECS Features""#,
            Column::CreatedAt => "created_at",
            Column::UpdatedAt => "updated_at",
        }
    }

    /// Field name used in JSON payloads.
    pub fn field_name(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::EoNumber => "eoNumber",
            Column::Year => "year",
            Column::VehicleMake => "vehicleMake",
            Column::VehicleModel => "vehicleModel",
            Column::Manufacturer => "manufacturer",
            Column::TestGroup => "testGroup",
            Column::EngineSize => "engineSize",
            Column::EvaporativeFamily => "evaporativeFamily",
            Column::VehicleClass => "vehicleClass",
            Column::ExhaustEcsFeatures => "exhaustEcsFeatures",
            Column::CreatedAt => "createdAt",
            Column::UpdatedAt => "updatedAt",
        }
    }
}
