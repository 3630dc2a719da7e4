use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value;

/// A request rejected by the stub: any POST to `path` whose body contains
/// `body_contains` gets a 400 with a JSON error message.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub path: &'static str,
    pub body_contains: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub path: String,
    pub body: Value,
    pub authorized: bool,
}

pub struct ServiceStub {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ServiceStub {
    pub fn spawn(rejections: Vec<Rejection>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start content service stub");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let workspace_base = base_url.clone();

        let handle = thread::spawn(move || {
            let mut next_id = 0_usize;
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                let authorized = request.headers().iter().any(|header| {
                    header.field.equiv("Authorization")
                        && header.value.as_str().starts_with("Basic ")
                });
                let mut raw = String::new();
                if request.as_reader().read_to_string(&mut raw).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }
                let body: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);
                recorded
                    .lock()
                    .expect("lock recorded requests")
                    .push(RecordedRequest {
                        path: path.clone(),
                        body: body.clone(),
                        authorized,
                    });

                if request.method() != &tiny_http::Method::Post {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                if let Some(rejection) = rejections
                    .iter()
                    .find(|r| r.path == path && raw.contains(r.body_contains))
                {
                    let message = format!("stub rejected {}", rejection.body_contains);
                    respond_json(
                        request,
                        400,
                        &serde_json::json!({ "error": { "message": message } }),
                    );
                    continue;
                }

                let mut new_id = |prefix: &str| {
                    next_id += 1;
                    format!("{prefix}{next_id}")
                };
                let response = match path.as_str() {
                    "/api/workgroups" => {
                        let id = new_id("wg");
                        serde_json::json!({
                            "url": format!("{workspace_base}/GroupWorkspaces/{id}"),
                            "id": id,
                        })
                    }
                    "/api/modules" => serde_json::json!({
                        "id": new_id("m"),
                        "workspace_url": body.get("workspace").cloned().unwrap_or(Value::Null),
                    }),
                    "/api/roles/accept" => serde_json::json!({ "accepted": 2 }),
                    "/api/collections" => serde_json::json!({ "id": new_id("col") }),
                    p if p.starts_with("/api/collections/") && p.ends_with("/subcollections") => {
                        let count = body
                            .get("titles")
                            .and_then(Value::as_array)
                            .map_or(0, Vec::len);
                        let ids = (0..count).map(|_| new_id("sub")).collect::<Vec<_>>();
                        serde_json::json!({ "ids": ids })
                    }
                    "/api/modules/copy" | "/api/modules/roles" | "/api/modules/publish" => {
                        serde_json::json!({})
                    }
                    p if p.starts_with("/api/collections/") => serde_json::json!({}),
                    _ => {
                        let _ = request.respond(
                            tiny_http::Response::from_string("not found").with_status_code(404),
                        );
                        continue;
                    }
                };
                respond_json(request, 200, &response);
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("lock recorded requests").clone()
    }
}

impl Drop for ServiceStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn respond_json(request: tiny_http::Request, status: u16, body: &Value) {
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("build header");
    let response = tiny_http::Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(header);
    let _ = request.respond(response);
}
