//! Spreadsheet upload through `POST /api/certificates/import`.

#[allow(unused)]
mod support;

use axum::http::{Method, StatusCode};
use support::{
    admin_token, assert_error_code, assert_pagination, assert_status, json_body, user_token,
    with_test_app, with_test_app_with_config,
};

const CSV: &str = "\
EO Number,Year,Vehicle Make,Vehicle Model,Manufacturer,Test Group
D-100-1,2020,Toyota,Corolla,Toyota Motor Corp,LTYXV01.8P3A
D-100-2,2021,Honda,Civic,American Honda,MHNXV02.0ABC
D-100-3,not a year,Ford,Focus,Ford Motor Co,
D-100-4,2019,,Model 3,Tesla,
D-100-1,2022,Toyota,Camry,Toyota Motor Corp,
D-100-5,2018.0,Mazda,MX-5,Mazda,
";

#[tokio::test]
async fn csv_import_commits_good_rows_and_reports_bad_ones() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _headers, body) = app
                .upload(&admin_token(), "certificates.csv", CSV.as_bytes())
                .await?;
            assert_status(status, StatusCode::OK, "import");

            let outcome = json_body(&body)?;
            assert_eq!(outcome["successCount"], 3);
            assert_eq!(outcome["errorCount"], 3);

            let errors = outcome["errors"].as_array().expect("errors array");
            let indexes: Vec<u64> = errors
                .iter()
                .filter_map(|e| e["rowIndex"].as_u64())
                .collect();
            assert_eq!(indexes, vec![3, 4, 5]);

            let year_error = errors[0]["errorMessage"].as_str().unwrap_or_default();
            assert!(year_error.starts_with("Invalid year"), "{year_error}");
            assert_eq!(errors[0]["rawRow"]["EO Number"], "D-100-3");

            let missing = errors[1]["errorMessage"].as_str().unwrap_or_default();
            assert_eq!(missing, "Missing required fields: vehicleMake");

            assert_eq!(errors[2]["errorMessage"], "Duplicate EO Number: D-100-1");

            let (_, _, body) = app.request(Method::GET, "/api/certificates", None).await?;
            assert_pagination(&json_body(&body)?, 3, 1);

            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn blank_rows_do_not_shift_reported_rows() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let csv = "\
EO Number,Year,Vehicle Make,Vehicle Model,Engine Size (L),Test Group
G-1,2020,Ford,F150,2.0,1.10

G-2,19x9,Ford,F250,,
";
            let (status, _headers, body) = app
                .upload(&admin_token(), "gaps.csv", csv.as_bytes())
                .await?;
            assert_status(status, StatusCode::OK, "import");

            let outcome = json_body(&body)?;
            assert_eq!(outcome["successCount"], 1);
            assert_eq!(outcome["errors"][0]["rowIndex"], 3);
            assert_eq!(outcome["errors"][0]["rawRow"]["EO Number"], "G-2");

            let (_, _, body) = app
                .request(Method::GET, "/api/certificates?eoNumber=G-1", None)
                .await?;
            let page = json_body(&body)?;
            assert_eq!(page["data"][0]["engineSize"], "2.0");
            assert_eq!(page["data"][0]["testGroup"], "1.10");

            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn headers_are_matched_loosely() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let csv = "\u{feff}eo number ,MODEL YEAR,make,model,Mfr\nE-1,2020,Subaru,Outback,Subaru Corp\n";
            let (status, _headers, body) = app
                .upload(&admin_token(), "loose.csv", csv.as_bytes())
                .await?;
            assert_status(status, StatusCode::OK, "import");
            assert_eq!(json_body(&body)?["successCount"], 1);

            let (_, _, body) = app
                .request(Method::GET, "/api/certificates?eoNumber=E-1", None)
                .await?;
            let page = json_body(&body)?;
            assert_eq!(page["data"][0]["manufacturer"], "Subaru Corp");
            assert_eq!(page["data"][0]["year"], 2020);

            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn json_import_is_supported() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let json = br#"[
                {"eoNumber": "J-1", "year": 2020, "vehicleMake": "Kia", "vehicleModel": "Soul"},
                {"eoNumber": "J-2", "year": "2021", "vehicleMake": "Kia", "vehicleModel": "Niro"}
            ]"#;
            let (status, _headers, body) = app.upload(&admin_token(), "rows.json", json).await?;
            assert_status(status, StatusCode::OK, "json import");

            let outcome = json_body(&body)?;
            assert_eq!(outcome["successCount"], 2);
            assert_eq!(outcome["errorCount"], 0);
            assert_eq!(app.store.len().await, 2);

            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn reported_errors_are_capped() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let mut csv = String::from("EO Number,Year,Vehicle Make,Vehicle Model\n");
            for i in 0..25 {
                csv.push_str(&format!("X-{i},1800,Make,Model\n"));
            }
            let (status, _headers, body) = app
                .upload(&admin_token(), "bad.csv", csv.as_bytes())
                .await?;
            assert_status(status, StatusCode::OK, "import");

            let outcome = json_body(&body)?;
            assert_eq!(outcome["successCount"], 0);
            assert_eq!(outcome["errorCount"], 25);
            assert_eq!(outcome["errors"].as_array().map(Vec::len), Some(10));

            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn oversized_files_are_rejected_before_any_write() -> anyhow::Result<()> {
    with_test_app_with_config(
        |config| config.import.max_rows = 2,
        |app| {
            Box::pin(async move {
                let csv = "EO Number,Year,Vehicle Make,Vehicle Model\nA,2020,M,X\nB,2020,M,X\nC,2020,M,X\n";
                let (status, _headers, body) = app
                    .upload(&admin_token(), "big.csv", csv.as_bytes())
                    .await?;
                assert_status(status, StatusCode::BAD_REQUEST, "oversized import");
                assert_error_code(&body, "validation_error")?;
                assert!(app.store.is_empty().await);

                Ok(())
            })
        },
    )
    .await
}

#[tokio::test]
async fn unsupported_extension_is_rejected() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _headers, body) = app
                .upload(&admin_token(), "certificates.pdf", b"%PDF-1.4")
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "pdf import");
            assert_error_code(&body, "validation_error")?;
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn corrupt_workbook_is_rejected() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _headers, body) = app
                .upload(&admin_token(), "certificates.xlsx", b"not a zip archive")
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "corrupt xlsx import");
            assert_error_code(&body, "validation_error")?;
            assert!(app.store.is_empty().await);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn import_requires_admin() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _headers, _body) = app
                .upload(&user_token(), "certificates.csv", CSV.as_bytes())
                .await?;
            assert_status(status, StatusCode::FORBIDDEN, "import as user");
            assert!(app.store.is_empty().await);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn missing_file_field_is_rejected() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _headers, body) = app
                .request(Method::POST, "/api/certificates/import", None)
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "import without multipart");
            assert_error_code(&body, "validation_error")?;
            Ok(())
        })
    })
    .await
}
