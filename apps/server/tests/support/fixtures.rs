use axum::body::Bytes;
use eo_registry::{
    auth::Claims,
    models::{Role, UserStatus},
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

pub const TEST_JWT_SECRET: &str = "integration-test-secret";

/// Mint an HS256 token the registry accepts, valid for an hour.
pub fn token(role: Role, status: UserStatus) -> String {
    let claims = Claims {
        sub: format!("{role:?}-{status:?}").to_lowercase(),
        role,
        status,
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        iss: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("encode test token")
}

pub fn admin_token() -> String {
    token(Role::Admin, UserStatus::Approved)
}

pub fn user_token() -> String {
    token(Role::User, UserStatus::Approved)
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub fn to_json_body(value: &Value) -> anyhow::Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

/// A certificate body with only the required fields.
pub fn minimal_certificate(eo_number: &str, year: i32) -> Value {
    json!({
        "eoNumber": eo_number,
        "year": year,
        "vehicleMake": "Honda",
        "vehicleModel": "Civic",
    })
}

/// A fully populated certificate body.
pub fn certificate(eo_number: &str, year: i32, make: &str, manufacturer: &str) -> Value {
    json!({
        "eoNumber": eo_number,
        "year": year,
        "vehicleMake": make,
        "vehicleModel": format!("{make} Model"),
        "manufacturer": manufacturer,
        "testGroup": format!("TG-{eo_number}"),
        "engineSize": "2.0L",
        "evaporativeFamily": format!("EVAP-{year}"),
        "vehicleClass": "PC",
        "exhaustEcsFeatures": "TWC, O2S",
    })
}
