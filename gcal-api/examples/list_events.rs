use chrono::{Duration, Utc};
use gcal_api::{CalendarApiError, Client, Request};

#[tokio::main]
pub async fn main() -> Result<(), CalendarApiError> {
    let token = std::env::var("GOOGLE_ACCESS_TOKEN").unwrap_or_default();
    let client = Client::new(&token);

    let now = Utc::now();
    let req = Request::events().list(now, now + Duration::days(7)).max_results(20u32);

    let res = client.send(req).await?;
    for event in res.items {
        println!(
            "{} {}",
            event.starts_at().map(|s| s.to_rfc3339()).unwrap_or_default(),
            event.summary.unwrap_or_default()
        );
    }
    Ok(())
}
