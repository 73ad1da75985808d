use calmerge_core::{adapter::FeedRequest, CalendarEvent};
use gloo::net::http::Request;

/// Fetch the events of one source. Errors are the message shown in the status banner.
pub async fn fetch_events(request: &FeedRequest) -> Result<Vec<CalendarEvent>, String> {
    let response = Request::get(request.url.as_str())
        .header("Accept", request.format.mime())
        .send()
        .await
        .map_err(|err| err.to_string())?;
    if !response.ok() {
        let body = response.text().await.unwrap_or_default();
        return Err(match body.trim() {
            "" => response.status_text(),
            body => body.to_string(),
        });
    }
    response.json().await.map_err(|err| err.to_string())
}
