//! OctoPrint REST client.
//!
//! Endpoints used:
//! - `GET  /api/printer`               machine state
//! - `POST /api/files/local/{file}`    select and print
//! - `GET  /api/job`                   active job progress
//!
//! Every request carries `X-Api-Key` and is bounded by the client timeout.

use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

use printfarm_printing::{
    Availability, DeviceEndpoint, Job, JobProgress, Printer, ProgressProbe, is_operational_state,
};

use super::{DeviceClient, DeviceError};

const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Debug, Deserialize)]
struct PrinterStateResponse {
    state: PrinterState,
}

#[derive(Debug, Deserialize)]
struct PrinterState {
    text: String,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    state: String,
    #[serde(default)]
    progress: Option<JobProgressBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobProgressBody {
    completion: Option<f64>,
    print_time_left: Option<f64>,
}

/// HTTP client for OctoPrint-compatible printers.
#[derive(Debug, Clone)]
pub struct OctoPrintClient {
    client: reqwest::Client,
}

impl OctoPrintClient {
    /// Build a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, DeviceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeviceError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    async fn printer_state(&self, endpoint: DeviceEndpoint<'_>) -> Result<String, DeviceError> {
        let url = api_url(endpoint.address, &["printer"])?;
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, endpoint.api_key)
            .send()
            .await?;
        let body: PrinterStateResponse = ensure_success(response)?.json().await?;
        Ok(body.state.text)
    }

    async fn select_and_print(
        &self,
        endpoint: DeviceEndpoint<'_>,
        file_ref: &str,
    ) -> Result<(), DeviceError> {
        let mut segments = vec!["files", "local"];
        segments.extend(file_ref.split('/').filter(|s| !s.is_empty()));
        let url = api_url(endpoint.address, &segments)?;

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, endpoint.api_key)
            .json(&serde_json::json!({ "command": "select", "print": true }))
            .send()
            .await?;
        ensure_success(response)?;
        Ok(())
    }

    async fn job_progress(&self, endpoint: DeviceEndpoint<'_>) -> Result<JobProgress, DeviceError> {
        let url = api_url(endpoint.address, &["job"])?;
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, endpoint.api_key)
            .send()
            .await?;
        let body: JobResponse = ensure_success(response)?.json().await?;
        let progress = body.progress.unwrap_or_default();

        Ok(JobProgress {
            state: body.state,
            percent_complete: progress.completion,
            // Any fraction of a second left is still time left.
            time_remaining_secs: progress.print_time_left.map(|s| s.ceil() as i64),
        })
    }
}

#[async_trait::async_trait]
impl DeviceClient for OctoPrintClient {
    async fn query_availability(&self, printer: &Printer) -> Availability {
        let result = match printer.endpoint() {
            Some(endpoint) => self.printer_state(endpoint).await,
            None => Err(DeviceError::MissingEndpoint),
        };

        match result {
            Ok(state) if is_operational_state(&state) => Availability::Available,
            Ok(state) => {
                debug!(printer_id = %printer.id, state = %state, "printer busy");
                Availability::Busy
            }
            Err(e) => {
                warn!(printer_id = %printer.id, error = %e, "printer state query failed");
                Availability::Unreachable
            }
        }
    }

    async fn submit_job(&self, printer: &Printer, job: &Job) -> bool {
        let result = match printer.endpoint() {
            Some(endpoint) => self.select_and_print(endpoint, &job.item.file_ref).await,
            None => Err(DeviceError::MissingEndpoint),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    printer_id = %printer.id,
                    job_id = %job.id,
                    file = %job.item.file_ref,
                    error = %e,
                    "job submission failed"
                );
                false
            }
        }
    }

    async fn query_progress(&self, printer: &Printer) -> ProgressProbe {
        let result = match printer.endpoint() {
            Some(endpoint) => self.job_progress(endpoint).await,
            None => Err(DeviceError::MissingEndpoint),
        };

        match result {
            Ok(progress) => ProgressProbe::Reported(progress),
            Err(e) => {
                warn!(printer_id = %printer.id, error = %e, "progress query failed");
                ProgressProbe::Unreachable
            }
        }
    }
}

/// `http://{address}/api/{segments..}`; `address` may carry its own scheme.
fn api_url(address: &str, segments: &[&str]) -> Result<Url, DeviceError> {
    let base = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    };
    let mut url =
        Url::parse(&base).map_err(|e| DeviceError::Transport(format!("bad address {address}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| DeviceError::Transport(format!("bad address {address}")))?
        .pop_if_empty()
        .push("api")
        .extend(segments);
    Ok(url)
}

fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, DeviceError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(DeviceError::Status(status.as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Extension, Router};

    use printfarm_core::{ItemId, JobId, PrinterId};
    use printfarm_printing::Item;

    const KEY: &str = "test-key";

    /// Scripted OctoPrint stand-in.
    struct FakeDevice {
        state_status: StatusCode,
        state_body: String,
        submit_status: StatusCode,
        job_body: String,
        delay: Duration,
        submitted: Mutex<Vec<String>>,
    }

    impl FakeDevice {
        fn with_state(text: &str) -> Self {
            Self {
                state_status: StatusCode::OK,
                state_body: serde_json::json!({ "state": { "text": text } }).to_string(),
                submit_status: StatusCode::NO_CONTENT,
                job_body: serde_json::json!({
                    "state": "Printing",
                    "progress": { "completion": 42.0, "printTimeLeft": 600 }
                })
                .to_string(),
                delay: Duration::ZERO,
                submitted: Mutex::new(Vec::new()),
            }
        }
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == KEY)
    }

    fn json_response(status: StatusCode, body: String) -> Response {
        (status, [("content-type", "application/json")], body).into_response()
    }

    async fn printer_state(
        Extension(device): Extension<Arc<FakeDevice>>,
        headers: HeaderMap,
    ) -> Response {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        tokio::time::sleep(device.delay).await;
        json_response(device.state_status, device.state_body.clone())
    }

    async fn select_file(
        Extension(device): Extension<Arc<FakeDevice>>,
        headers: HeaderMap,
        Path(path): Path<String>,
        axum::Json(body): axum::Json<serde_json::Value>,
    ) -> Response {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        if body["command"] != "select" || body["print"] != true {
            return StatusCode::BAD_REQUEST.into_response();
        }
        device.submitted.lock().unwrap().push(path);
        device.submit_status.into_response()
    }

    async fn job_state(
        Extension(device): Extension<Arc<FakeDevice>>,
        headers: HeaderMap,
    ) -> Response {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        json_response(StatusCode::OK, device.job_body.clone())
    }

    async fn serve(device: Arc<FakeDevice>) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let app = Router::new()
            .route("/api/printer", get(printer_state))
            .route("/api/files/local/*path", post(select_file))
            .route("/api/job", get(job_state))
            .layer(Extension(device));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, handle)
    }

    fn printer_at(addr: SocketAddr) -> Printer {
        Printer {
            id: PrinterId::new(1),
            name: "fake".to_string(),
            location: None,
            address: Some(addr.to_string()),
            api_key: Some(KEY.to_string()),
        }
    }

    fn test_job(file_ref: &str) -> Job {
        Job::waiting(
            JobId::new(1),
            Item {
                id: ItemId::new(1),
                name: "benchy".to_string(),
                file_ref: file_ref.to_string(),
            },
        )
    }

    fn client() -> OctoPrintClient {
        OctoPrintClient::new(Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn operational_state_is_available() {
        let (addr, server) = serve(Arc::new(FakeDevice::with_state("Operational"))).await;
        assert_eq!(
            client().query_availability(&printer_at(addr)).await,
            Availability::Available
        );
        server.abort();
    }

    #[tokio::test]
    async fn other_state_is_busy() {
        let (addr, server) = serve(Arc::new(FakeDevice::with_state("Printing"))).await;
        assert_eq!(
            client().query_availability(&printer_at(addr)).await,
            Availability::Busy
        );
        server.abort();
    }

    #[tokio::test]
    async fn error_status_and_garbage_are_unreachable() {
        let mut failing = FakeDevice::with_state("Operational");
        failing.state_status = StatusCode::INTERNAL_SERVER_ERROR;
        let (addr, server) = serve(Arc::new(failing)).await;
        assert_eq!(
            client().query_availability(&printer_at(addr)).await,
            Availability::Unreachable
        );
        server.abort();

        let mut garbage = FakeDevice::with_state("Operational");
        garbage.state_body = "<html>not json</html>".to_string();
        let (addr, server) = serve(Arc::new(garbage)).await;
        assert_eq!(
            client().query_availability(&printer_at(addr)).await,
            Availability::Unreachable
        );
        server.abort();
    }

    #[tokio::test]
    async fn wrong_key_is_unreachable() {
        let (addr, server) = serve(Arc::new(FakeDevice::with_state("Operational"))).await;
        let mut printer = printer_at(addr);
        printer.api_key = Some("wrong".to_string());
        assert_eq!(
            client().query_availability(&printer).await,
            Availability::Unreachable
        );
        server.abort();
    }

    #[tokio::test]
    async fn timeout_is_unreachable() {
        let mut slow = FakeDevice::with_state("Operational");
        slow.delay = Duration::from_secs(5);
        let (addr, server) = serve(Arc::new(slow)).await;

        let client = OctoPrintClient::new(Duration::from_millis(200)).unwrap();
        assert_eq!(
            client.query_availability(&printer_at(addr)).await,
            Availability::Unreachable
        );
        server.abort();
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert_eq!(
            client().query_availability(&printer_at(addr)).await,
            Availability::Unreachable
        );
        assert_eq!(
            client().query_progress(&printer_at(addr)).await,
            ProgressProbe::Unreachable
        );
    }

    #[tokio::test]
    async fn submit_selects_the_job_file() {
        let device = Arc::new(FakeDevice::with_state("Operational"));
        let (addr, server) = serve(device.clone()).await;

        assert!(client().submit_job(&printer_at(addr), &test_job("parts/benchy.gcode")).await);
        assert_eq!(
            device.submitted.lock().unwrap().clone(),
            vec!["parts/benchy.gcode".to_string()]
        );
        server.abort();
    }

    #[tokio::test]
    async fn rejected_submit_is_false() {
        let mut device = FakeDevice::with_state("Operational");
        device.submit_status = StatusCode::CONFLICT;
        let (addr, server) = serve(Arc::new(device)).await;

        assert!(!client().submit_job(&printer_at(addr), &test_job("benchy.gcode")).await);
        server.abort();
    }

    #[tokio::test]
    async fn progress_is_reported() {
        let (addr, server) = serve(Arc::new(FakeDevice::with_state("Printing"))).await;

        let probe = client().query_progress(&printer_at(addr)).await;
        assert_eq!(
            probe,
            ProgressProbe::Reported(JobProgress {
                state: "Printing".to_string(),
                percent_complete: Some(42.0),
                time_remaining_secs: Some(600),
            })
        );
        assert!(!probe.is_complete());
        server.abort();
    }

    #[tokio::test]
    async fn finished_job_is_complete_and_nulls_are_tolerated() {
        let mut done = FakeDevice::with_state("Operational");
        done.job_body = serde_json::json!({
            "state": "Operational",
            "progress": { "completion": 100.0, "printTimeLeft": 0 }
        })
        .to_string();
        let (addr, server) = serve(Arc::new(done)).await;
        assert!(client().query_progress(&printer_at(addr)).await.is_complete());
        server.abort();

        let mut idle = FakeDevice::with_state("Operational");
        idle.job_body = serde_json::json!({
            "state": "Operational",
            "progress": { "completion": null, "printTimeLeft": null }
        })
        .to_string();
        let (addr, server) = serve(Arc::new(idle)).await;
        let probe = client().query_progress(&printer_at(addr)).await;
        assert!(matches!(probe, ProgressProbe::Reported(_)));
        assert!(!probe.is_complete());
        server.abort();
    }

    #[tokio::test]
    async fn fraction_of_a_second_left_is_not_finished() {
        let mut almost = FakeDevice::with_state("Operational");
        almost.job_body = serde_json::json!({
            "state": "Operational",
            "progress": { "completion": 100.0, "printTimeLeft": 0.4 }
        })
        .to_string();
        let (addr, server) = serve(Arc::new(almost)).await;

        let probe = client().query_progress(&printer_at(addr)).await;
        match &probe {
            ProgressProbe::Reported(progress) => assert_eq!(progress.time_remaining_secs, Some(1)),
            other => panic!("expected a report, got {other:?}"),
        }
        assert!(!probe.is_complete());
        server.abort();
    }

    #[tokio::test]
    async fn printer_without_endpoint_is_never_contacted() {
        let mut printer = printer_at("127.0.0.1:9".parse().unwrap());
        printer.api_key = None;
        assert_eq!(
            client().query_availability(&printer).await,
            Availability::Unreachable
        );
        assert!(!client().submit_job(&printer, &test_job("benchy.gcode")).await);
    }

    #[test]
    fn api_url_accepts_bare_and_schemed_addresses() {
        assert_eq!(
            api_url("10.0.0.5", &["printer"]).unwrap().as_str(),
            "http://10.0.0.5/api/printer"
        );
        assert_eq!(
            api_url("https://farm.local:8443/", &["files", "local", "a b.gcode"])
                .unwrap()
                .as_str(),
            "https://farm.local:8443/api/files/local/a%20b.gcode"
        );
    }
}
