//! Analysis client against a one-shot local server.

use portfolio_agent::analysis_client::{
    AnalysisClient, AnalysisError, AnalysisKind, AnalysisReport, PortfolioOutcome,
};
use portfolio_agent::config::AnalysisConfig;

mod common;
use common::serve_once;

fn client(base: String) -> AnalysisClient {
    AnalysisClient::from_config(&AnalysisConfig {
        url: Some(format!("{base}/")),
        timeout_secs: 5,
    })
    .unwrap_or_else(|e| panic!("client: {e}"))
}

const SHARPE_BODY: &str = r#"{
    "user_id": "u1",
    "analysis_date": "2025-01-02T10:00:00",
    "sharpe_analysis": {
        "p1": {
            "portfolio_name": "Main",
            "sharpe_ratio": 0.812,
            "annual_return": 14.1,
            "annual_volatility": 14.9,
            "risk_free_rate": 2.0
        }
    }
}"#;

#[tokio::test]
async fn sharpe_round_trip() {
    let (base, server) = serve_once("200 OK", SHARPE_BODY).await;
    let report = client(base)
        .run(AnalysisKind::Sharpe, "u1")
        .await
        .unwrap();

    let AnalysisReport::Sharpe(sharpe) = &report else {
        panic!("expected sharpe report, got {report:?}");
    };
    match &sharpe.sharpe_analysis["p1"] {
        PortfolioOutcome::Computed(m) => assert_eq!(m.sharpe_ratio, 0.812),
        other => panic!("expected metrics, got {other:?}"),
    }

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /portfolio/sharpe "));
    assert!(request.contains(r#""user_id":"u1""#));
    assert!(!request.contains("portfolio_id"));
}

#[tokio::test]
async fn market_data_sends_default_period() {
    let (base, server) = serve_once(
        "200 OK",
        r#"{"user_id":"u1","period":"1mo","symbols_analyzed":1,
            "market_data":{"AAPL":{"current_price":190.5,"period_return":3.2,"volatility":21.0,"data_points":21}},
            "analysis_date":"2025-01-02T10:00:00"}"#,
    )
    .await;
    let report = client(base).market_data("u1", "1mo").await.unwrap();
    assert_eq!(report.symbols_analyzed, 1);
    assert_eq!(report.market_data["AAPL"].data_points, 21);

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /portfolio/market-data "));
    assert!(request.contains(r#""period":"1mo""#));
}

#[tokio::test]
async fn not_found_carries_service_detail() {
    let (base, _server) = serve_once(
        "404 Not Found",
        r#"{"detail":"No portfolio data found for user"}"#,
    )
    .await;
    let err = client(base).risk("nobody").await.unwrap_err();
    assert_eq!(
        err,
        AnalysisError::Api {
            status: 404,
            detail: "No portfolio data found for user".into()
        }
    );
}

#[tokio::test]
async fn malformed_body_is_decode_error() {
    let (base, _server) = serve_once("200 OK", r#"{"unexpected":true}"#).await;
    let err = client(base).risk("u1").await.unwrap_err();
    assert!(matches!(err, AnalysisError::Decode(_)), "{err:?}");
}
