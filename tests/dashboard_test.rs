use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::util::ServiceExt; // for `oneshot`

use incseg::dashboard::{Dashboard, NOT_GENERATED_MESSAGE, Selection, ViewState, build_router, render_page};
use incseg::models::income::IncomeExtreme;
use incseg::pipeline::MetroOutcome;
use incseg::utils::test::SyntheticData;

use crate::utils::Workspace;

fn dashboard(workspace: &Workspace) -> Dashboard {
    Dashboard::new(workspace.config.clone(), workspace.registry.clone())
}

fn select(metro: &str) -> Selection {
    Selection {
        metro: Some(metro.to_string()),
        ..Selection::default()
    }
}

fn test_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    String::from_utf8(bytes.to_vec()).expect("Should be UTF-8")
}

#[test]
fn test_not_generated_state() -> incseg::Result<()> {
    let workspace = Workspace::new(&SyntheticData::single("99980", 4, 0, vec![2012, 2013], 3));
    let view = dashboard(&workspace).view(&select("99980"))?;

    assert_eq!(view.state, ViewState::NotGenerated);
    assert_eq!(view.title, "Metro 99980");
    assert_eq!(view.group, IncomeExtreme::High);
    // The default map year falls back to the last analysis year
    assert_eq!(view.year, 2013);
    assert!(view.map.is_some());
    assert!(render_page(&view).contains(NOT_GENERATED_MESSAGE));
    Ok(())
}

#[test]
fn test_ready_view_uses_selection() -> incseg::Result<()> {
    let workspace = Workspace::new(&SyntheticData::single("99981", 6, 0, vec![2012, 2013, 2014], 5));
    assert!(matches!(workspace.driver(1).store_data("99981"), MetroOutcome::Completed(_)));
    let dashboard = dashboard(&workspace);

    let view = dashboard.view(&Selection {
        group: Some(IncomeExtreme::Low),
        single_index: Some("Gini".to_string()),
        year: Some(2012),
        ..select("99981")
    })?;
    let ViewState::Ready(panels) = &view.state else {
        panic!("Expected generated panels, got {:?}", view.state);
    };
    assert_eq!(view.year, 2012);
    assert_eq!(panels.single_index, "Gini");
    assert!(panels.single_text.starts_with("For very low income households in Metro 99981, **The Gini index"));
    assert!(panels.multi_indices.contains(&panels.multi_index));

    let cached = dashboard.cache().len();
    assert!(cached >= 4);
    dashboard.view(&Selection {
        year: Some(2012),
        ..select("99981")
    })?;
    // High income adds its single-group table, everything else is reused
    assert_eq!(dashboard.cache().len(), cached + 1);
    Ok(())
}

#[tokio::test]
async fn test_health_endpoint() {
    let workspace = Workspace::new(&SyntheticData::single("99982", 2, 0, vec![2012], 1));
    let app = build_router(Arc::new(dashboard(&workspace)));

    let response = app.oneshot(test_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(&body_text(response.into_body()).await).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "incseg");
    assert_eq!(body["metros"], 1);
}

#[tokio::test]
async fn test_page_endpoint() {
    let workspace = Workspace::new(&SyntheticData::single("99983", 2, 0, vec![2012], 1));
    let app = build_router(Arc::new(dashboard(&workspace)));

    let response = app
        .clone()
        .oneshot(test_request("/?metro=99983&group=low"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response.into_body()).await;
    assert!(html.contains(NOT_GENERATED_MESSAGE));
    assert!(html.contains("<option value=\"low\" selected>"));

    let response = app.oneshot(test_request("/?metro=00000")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
