use crate::App;
use crate::cli::ui;
use crate::core::request::{Destination, Method, Request, Response};
use anyhow::Result;
use url::Url;

/// Builds a request from CLI arguments. Bare paths resolve against the
/// configured origin.
pub fn build_request(app: &App, target: &str, method: &str, destination: &str) -> Result<Request> {
    let url = match Url::parse(target) {
        Ok(url) => url,
        Err(_) => app.config.resolve(target)?,
    };
    let mut request = Request::get(url).with_destination(destination.parse::<Destination>()?);
    request.method = method.parse::<Method>()?;
    Ok(request)
}

pub fn describe(request: &Request, response: &Response) -> String {
    let status = response.status.to_string();
    let status = if response.is_success() {
        ui::style_text(&status, ui::StyleType::Success)
    } else {
        ui::style_text(&status, ui::StyleType::Error)
    };
    format!(
        "{} {} -> {} ({}, {} bytes{})",
        request.method,
        request.url,
        status,
        response.source,
        response.body.len(),
        response
            .content_type()
            .map(|ct| format!(", {ct}"))
            .unwrap_or_default()
    )
}

pub async fn run(app: &App, target: &str, method: &str, destination: &str) -> Result<()> {
    let request = build_request(app, target, method, destination)?;
    let class = app.engine.classify(&request);
    let response = app.engine.handle(request.clone()).await;

    println!("{}", describe(&request, &response));
    println!("{}", ui::style_text(&format!("class: {class}"), ui::StyleType::Subtle));
    if let Ok(text) = std::str::from_utf8(&response.body) {
        if !text.is_empty() {
            ui::print_separator();
            println!("{text}");
        }
    }

    // let a stale-hit refresh land before the process exits
    app.engine.refresher().settle().await;
    Ok(())
}
