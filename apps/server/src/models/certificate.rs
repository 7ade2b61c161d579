//! Certificate records and the loosely-typed shapes they are built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Inclusive range of model years accepted on write.
pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2100;

/// A persisted EO certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: i64,
    #[sqlx(rename = "EO Number")]
    pub eo_number: String,
    #[sqlx(rename = "Year")]
    pub year: i32,
    #[sqlx(rename = "Vehicle Make")]
    pub vehicle_make: String,
    #[sqlx(rename = "Vehicle Model")]
    pub vehicle_model: String,
    #[sqlx(rename = "Manufacturer")]
    pub manufacturer: Option<String>,
    #[sqlx(rename = "Test Group")]
    pub test_group: Option<String>,
    #[sqlx(rename = "Engine Size (L)")]
    pub engine_size: Option<String>,
    #[sqlx(rename = "Evaporative Family")]
    pub evaporative_family: Option<String>,
    #[sqlx(rename = "Vehicle Class")]
    pub vehicle_class: Option<String>,
    #[sqlx(rename = "Exhaust ECS Features")]
    pub exhaust_ecs_features: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated certificate ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCertificate {
    pub eo_number: String,
    pub year: i32,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub manufacturer: Option<String>,
    pub test_group: Option<String>,
    pub engine_size: Option<String>,
    pub evaporative_family: Option<String>,
    pub vehicle_class: Option<String>,
    pub exhaust_ecs_features: Option<String>,
}

/// Unvalidated certificate fields, as produced by the row normalizer or an API body.
///
/// Every field is optional text; `validate` enforces required fields and parses `year`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateRecord {
    pub eo_number: Option<String>,
    pub year: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub manufacturer: Option<String>,
    pub test_group: Option<String>,
    pub engine_size: Option<String>,
    pub evaporative_family: Option<String>,
    pub vehicle_class: Option<String>,
    pub exhaust_ecs_features: Option<String>,
}

impl CandidateRecord {
    /// Check required fields and convert into a [`NewCertificate`].
    ///
    /// Errors are `Validation` errors naming every missing field at once.
    pub fn validate(self) -> crate::Result<NewCertificate> {
        let mut missing = Vec::new();
        if blank(&self.eo_number) {
            missing.push("eoNumber");
        }
        if blank(&self.year) {
            missing.push("year");
        }
        if blank(&self.vehicle_make) {
            missing.push("vehicleMake");
        }
        if blank(&self.vehicle_model) {
            missing.push("vehicleModel");
        }
        if !missing.is_empty() {
            return Err(crate::Error::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let raw_year = self.year.unwrap_or_default();
        let year = parse_year(&raw_year)?;

        Ok(NewCertificate {
            eo_number: trimmed(self.eo_number).unwrap_or_default(),
            year,
            vehicle_make: trimmed(self.vehicle_make).unwrap_or_default(),
            vehicle_model: trimmed(self.vehicle_model).unwrap_or_default(),
            manufacturer: trimmed(self.manufacturer),
            test_group: trimmed(self.test_group),
            engine_size: trimmed(self.engine_size),
            evaporative_family: trimmed(self.evaporative_family),
            vehicle_class: trimmed(self.vehicle_class),
            exhaust_ecs_features: trimmed(self.exhaust_ecs_features),
        })
    }
}

/// Parse a model year, accepting integral decimal renderings such as `"2020.0"`.
pub fn parse_year(raw: &str) -> crate::Result<i32> {
    let raw = raw.trim();
    let parsed = raw.parse::<i32>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|f| f.fract() == 0.0 && f.is_finite())
            .map(|f| f as i32)
    });

    match parsed {
        Some(year) if (MIN_YEAR..=MAX_YEAR).contains(&year) => Ok(year),
        Some(year) => Err(crate::Error::Validation(format!(
            "Invalid year: {year} is outside {MIN_YEAR}-{MAX_YEAR}"
        ))),
        None => Err(crate::Error::Validation(format!(
            "Invalid year: '{raw}' is not a number"
        ))),
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or("").is_empty()
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A model year as sent by API clients: either a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum YearValue {
    Number(serde_json::Number),
    Text(String),
}

impl YearValue {
    pub fn as_text(&self) -> String {
        match self {
            YearValue::Number(n) => n.to_string(),
            YearValue::Text(s) => s.clone(),
        }
    }
}

/// Body of a create request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateFields {
    pub eo_number: Option<String>,
    pub year: Option<YearValue>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub manufacturer: Option<String>,
    pub test_group: Option<String>,
    pub engine_size: Option<String>,
    pub evaporative_family: Option<String>,
    pub vehicle_class: Option<String>,
    pub exhaust_ecs_features: Option<String>,
}

impl From<CertificateFields> for CandidateRecord {
    fn from(fields: CertificateFields) -> Self {
        Self {
            eo_number: fields.eo_number,
            year: fields.year.map(|y| y.as_text()),
            vehicle_make: fields.vehicle_make,
            vehicle_model: fields.vehicle_model,
            manufacturer: fields.manufacturer,
            test_group: fields.test_group,
            engine_size: fields.engine_size,
            evaporative_family: fields.evaporative_family,
            vehicle_class: fields.vehicle_class,
            exhaust_ecs_features: fields.exhaust_ecs_features,
        }
    }
}

/// Body of an update request.
///
/// Absent fields are left unchanged. For optional columns an explicit `null`
/// clears the value (`Some(None)`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificatePatchInput {
    pub eo_number: Option<String>,
    pub year: Option<YearValue>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub manufacturer: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub test_group: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub engine_size: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub evaporative_family: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub vehicle_class: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub exhaust_ecs_features: Option<Option<String>>,
}

fn nullable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// A validated partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificatePatch {
    pub eo_number: Option<String>,
    pub year: Option<i32>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub manufacturer: Option<Option<String>>,
    pub test_group: Option<Option<String>>,
    pub engine_size: Option<Option<String>>,
    pub evaporative_family: Option<Option<String>>,
    pub vehicle_class: Option<Option<String>>,
    pub exhaust_ecs_features: Option<Option<String>>,
}

impl CertificatePatchInput {
    /// Validate the patch: required columns may change but not become blank.
    pub fn validate(self) -> crate::Result<CertificatePatch> {
        fn required(name: &str, value: Option<String>) -> crate::Result<Option<String>> {
            match value {
                None => Ok(None),
                Some(v) if v.trim().is_empty() => Err(crate::Error::Validation(format!(
                    "{name} cannot be blank"
                ))),
                Some(v) => Ok(Some(v.trim().to_string())),
            }
        }
        fn optional(value: Option<Option<String>>) -> Option<Option<String>> {
            value.map(trimmed)
        }

        let year = match self.year {
            None => None,
            Some(y) => Some(parse_year(&y.as_text())?),
        };

        Ok(CertificatePatch {
            eo_number: required("eoNumber", self.eo_number)?,
            year,
            vehicle_make: required("vehicleMake", self.vehicle_make)?,
            vehicle_model: required("vehicleModel", self.vehicle_model)?,
            manufacturer: optional(self.manufacturer),
            test_group: optional(self.test_group),
            engine_size: optional(self.engine_size),
            evaporative_family: optional(self.evaporative_family),
            vehicle_class: optional(self.vehicle_class),
            exhaust_ecs_features: optional(self.exhaust_ecs_features),
        })
    }
}

impl CertificatePatch {
    pub fn is_empty(&self) -> bool {
        *self == CertificatePatch::default()
    }

    /// Apply the patch to an in-memory record.
    pub fn apply(&self, certificate: &mut Certificate) {
        if let Some(v) = &self.eo_number {
            certificate.eo_number = v.clone();
        }
        if let Some(v) = self.year {
            certificate.year = v;
        }
        if let Some(v) = &self.vehicle_make {
            certificate.vehicle_make = v.clone();
        }
        if let Some(v) = &self.vehicle_model {
            certificate.vehicle_model = v.clone();
        }
        if let Some(v) = &self.manufacturer {
            certificate.manufacturer = v.clone();
        }
        if let Some(v) = &self.test_group {
            certificate.test_group = v.clone();
        }
        if let Some(v) = &self.engine_size {
            certificate.engine_size = v.clone();
        }
        if let Some(v) = &self.evaporative_family {
            certificate.evaporative_family = v.clone();
        }
        if let Some(v) = &self.vehicle_class {
            certificate.vehicle_class = v.clone();
        }
        if let Some(v) = &self.exhaust_ecs_features {
            certificate.exhaust_ecs_features = v.clone();
        }
    }
}
