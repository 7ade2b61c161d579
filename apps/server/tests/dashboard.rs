//! `GET /api/dashboard/stats`

#[allow(unused)]
mod support;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use eo_registry::models::UserStatus;
use support::{
    assert_status, certificate, json_body, to_json_body, user_token, with_test_app, TestApp,
};

async fn seed(app: &TestApp) -> anyhow::Result<Vec<i64>> {
    let rows = [
        ("S-1", 2020, "Toyota", "Toyota Motor Corp"),
        ("S-2", 2020, "Toyota", "Toyota Motor Corp"),
        ("S-3", 2022, "Honda", "American Honda"),
        ("S-4", 2019, "Ford", "Ford Motor Co"),
    ];
    let mut ids = Vec::new();
    for (eo, year, make, manufacturer) in rows {
        let (status, _, body) = app
            .request(
                Method::POST,
                "/api/certificates",
                Some(to_json_body(&certificate(eo, year, make, manufacturer))?),
            )
            .await?;
        assert_status(status, StatusCode::CREATED, "seed");
        ids.push(json_body(&body)?["id"].as_i64().unwrap_or_default());
    }
    Ok(ids)
}

#[tokio::test]
async fn admin_dashboard_includes_activity_and_users() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let ids = seed(app).await?;
            app.store
                .set_created_at(ids[3], Utc::now() - Duration::days(90))
                .await;
            app.store.add_user(UserStatus::Approved).await;
            app.store.add_user(UserStatus::Approved).await;
            app.store.add_user(UserStatus::Pending).await;

            let (status, _headers, body) = app
                .request(Method::GET, "/api/dashboard/stats", None)
                .await?;
            assert_status(status, StatusCode::OK, "admin dashboard");

            let dashboard = json_body(&body)?;
            let stats = &dashboard["stats"];
            assert_eq!(stats["totalCertificates"], 4);
            assert_eq!(stats["totalManufacturers"], 3);
            assert_eq!(stats["totalMakes"], 3);
            assert_eq!(stats["latestYear"], 2022);
            assert_eq!(stats["addedLast30Days"], 3);
            assert_eq!(stats["users"]["approved"], 2);
            assert_eq!(stats["users"]["pending"], 1);

            let by_year = dashboard["charts"]["byYear"].as_array().expect("byYear");
            let years: Vec<i64> = by_year.iter().filter_map(|g| g["year"].as_i64()).collect();
            assert_eq!(years, vec![2019, 2020, 2022]);
            assert_eq!(by_year[1]["count"], 2);

            let by_make = dashboard["charts"]["byMake"].as_array().expect("byMake");
            assert_eq!(by_make[0]["vehicleMake"], "Toyota");
            assert_eq!(by_make[0]["count"], 2);

            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn user_dashboard_omits_admin_figures() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            seed(app).await?;

            let (status, _headers, body) = app
                .request_as(&user_token(), Method::GET, "/api/dashboard/stats", None)
                .await?;
            assert_status(status, StatusCode::OK, "user dashboard");

            let stats = json_body(&body)?["stats"].clone();
            assert_eq!(stats["totalCertificates"], 4);
            assert!(stats.get("addedLast30Days").is_none());
            assert!(stats.get("users").is_none());

            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn empty_registry_dashboard() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _headers, body) = app
                .request(Method::GET, "/api/dashboard/stats", None)
                .await?;
            assert_status(status, StatusCode::OK, "empty dashboard");

            let dashboard = json_body(&body)?;
            assert_eq!(dashboard["stats"]["totalCertificates"], 0);
            assert!(dashboard["stats"]["latestYear"].is_null());
            assert_eq!(dashboard["charts"]["byYear"].as_array().map(Vec::len), Some(0));

            Ok(())
        })
    })
    .await
}
