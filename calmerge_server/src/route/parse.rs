use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use calmerge_core::{
    ics_client::{parse_source, IcsClient, TimeRange},
    CalendarEvent, Error,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct QueryParams {
    source: String,
    start: String,
    end: String,
}

/// Handle parse requests.
///
/// The `source`, `start` and `end` must be given in the query string.
pub async fn handler(
    State(client): State<IcsClient>,
    Query(query_params): Query<QueryParams>,
) -> Result<Json<Vec<CalendarEvent>>, (StatusCode, String)> {
    let source = parse_source(&query_params.source).map_err(error_response)?;
    let range = TimeRange::parse(&query_params.start, &query_params.end, client.timezone())
        .map_err(error_response)?;
    let events = client.events(&source, &range).await.map_err(|err| {
        tracing::warn!(%source, %err, "cannot serve calendar");
        error_response(err)
    })?;
    Ok(Json(events))
}

fn error_response(err: Error) -> (StatusCode, String) {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, err.to_string())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use calmerge_core::{ics_client::IcsClient, CalendarEvent};
    use tower::ServiceExt;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    static ICS: &str = "BEGIN:VCALENDAR
VERSION:2.0
PRODID:-//Test//Test//EN
BEGIN:VEVENT
UID:all-day@example.com
DTSTART:20240101
DTEND;VALUE=DATE:20240102
X-MICROSOFT-CDO-ALLDAYEVENT:TRUE
SUMMARY:Holiday
END:VEVENT
BEGIN:VEVENT
UID:meeting@example.com
DTSTART:20240103T090000Z
DTEND:20240103T100000Z
END:VEVENT
END:VCALENDAR
";

    async fn get(uri: &str) -> (StatusCode, Vec<u8>) {
        let app = crate::app(IcsClient::new(chrono_tz::Europe::Berlin), None);
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, body.to_vec())
    }

    async fn upstream(status: u16, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/team.ics"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_parse_returns_events() {
        let server = upstream(200, ICS).await;
        let (status, body) = get(&format!(
            "/parse?source={}/team.ics&start=2024-01-01&end=2024-02-05",
            server.uri()
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        let events: Vec<CalendarEvent> = serde_json::from_slice(&body).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "Holiday");
        assert!(events[0].all_day);
        assert_eq!(events[0].start, "2024-01-02T00:00:00+01:00");
        assert_eq!(events[1].title, "Untitled Event");
        assert_eq!(events[1].start, "2024-01-03T10:00:00+01:00");
    }

    #[tokio::test]
    async fn test_parse_rejects_invalid_source() {
        let (status, body) = get("/parse?source=not-a-url&start=2024-01-01&end=2024-02-05").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(String::from_utf8(body).unwrap().contains("not-a-url"));
    }

    #[tokio::test]
    async fn test_parse_rejects_missing_and_invalid_dates() {
        let (status, _) = get("/parse?source=http://example.com/a.ics").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) =
            get("/parse?source=http://example.com/a.ics&start=tomorrow&end=2024-02-05").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) =
            get("/parse?source=http://example.com/a.ics&start=2024-02-05&end=2024-01-01").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_parse_reports_upstream_errors() {
        let server = upstream(404, "").await;
        let (status, body) = get(&format!(
            "/parse?source={}/team.ics&start=2024-01-01&end=2024-02-05",
            server.uri()
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(String::from_utf8(body).unwrap().contains("404"));
    }
}
