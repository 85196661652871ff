//! Test fixtures: in-process fake hub and registry servers, and a recording
//! tool runner standing in for the llama.cpp toolchain.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wrangler_core::{ExternalTool, ToolOutput, ToolRunner};

pub fn sha256_digest(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

/// Bind `router` on an ephemeral localhost port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    format!("http://{}", addr)
}

/// One request seen by a fake server.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub range: Option<String>,
    pub authorization: Option<String>,
}

fn seen(uri: &Uri, headers: &HeaderMap) -> SeenRequest {
    let value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    SeenRequest {
        path: uri.path().to_string(),
        range: value(header::RANGE),
        authorization: value(header::AUTHORIZATION),
    }
}

/// Serve `body`, honoring a `bytes=N-` range.
fn body_response(body: &[u8], range: Option<&str>) -> Response {
    let start = range
        .and_then(|r| r.strip_prefix("bytes="))
        .and_then(|r| r.strip_suffix('-'))
        .and_then(|n| n.parse::<usize>().ok());

    match start {
        Some(start) if start >= body.len() => StatusCode::RANGE_NOT_SATISFIABLE.into_response(),
        Some(start) => (
            StatusCode::PARTIAL_CONTENT,
            [(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, body.len() - 1, body.len()),
            )],
            body[start..].to_vec(),
        )
            .into_response(),
        None => (StatusCode::OK, body.to_vec()).into_response(),
    }
}

// ---------------------------------------------------------------------------
// Fake hub
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct HubFile {
    path: String,
    body: Vec<u8>,
    with_lfs: bool,
}

/// Hub serving `/api/models/<repo>/tree/<rev>` and `/<repo>/resolve/<rev>/<path>`.
/// One-shot misbehavior for the next download of a file.
#[derive(Debug, Clone, Copy)]
pub enum Glitch {
    /// Send only the first N bytes (with a matching Content-Length).
    Truncate(usize),
    /// Answer with this status and no body.
    Status(StatusCode),
}

#[derive(Debug, Default)]
pub struct FakeHub {
    repos: Mutex<HashMap<String, Vec<HubFile>>>,
    glitches: Mutex<HashMap<String, Glitch>>,
    requests: Mutex<Vec<SeenRequest>>,
}

impl FakeHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a file to `repo` at `revision`.
    pub fn add_file(&self, repo: &str, revision: &str, path: &str, body: &[u8]) {
        self.insert(repo, revision, path, body, false);
    }

    /// Add a file whose listing entry carries LFS size and sha256.
    pub fn add_lfs_file(&self, repo: &str, revision: &str, path: &str, body: &[u8]) {
        self.insert(repo, revision, path, body, true);
    }

    fn insert(&self, repo: &str, revision: &str, path: &str, body: &[u8], with_lfs: bool) {
        self.repos
            .lock()
            .unwrap()
            .entry(format!("{repo}@{revision}"))
            .or_default()
            .push(HubFile {
                path: path.to_string(),
                body: body.to_vec(),
                with_lfs,
            });
    }

    /// Make the next download of `path` misbehave once.
    pub fn glitch_next(&self, repo: &str, revision: &str, path: &str, glitch: Glitch) {
        self.glitches
            .lock()
            .unwrap()
            .insert(format!("{repo}@{revision}/{path}"), glitch);
    }

    fn take_glitch(&self, repo: &str, revision: &str, path: &str) -> Option<Glitch> {
        self.glitches
            .lock()
            .unwrap()
            .remove(&format!("{repo}@{revision}/{path}"))
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested(&self, fragment: &str) -> bool {
        self.requests().iter().any(|r| r.path.contains(fragment))
    }

    /// Requests whose path contains `fragment`, in arrival order.
    pub fn requests_for(&self, fragment: &str) -> Vec<SeenRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.contains(fragment))
            .collect()
    }

    pub async fn start(self: &Arc<Self>) -> String {
        serve(Router::new().fallback(hub_handler).with_state(self.clone())).await
    }

    fn listing(&self, repo: &str, revision: &str) -> Option<Value> {
        let repos = self.repos.lock().unwrap();
        let files = repos.get(&format!("{repo}@{revision}"))?;
        let entries: Vec<Value> = files
            .iter()
            .map(|f| {
                let mut entry = json!({
                    "type": "file",
                    "path": f.path,
                    "size": f.body.len(),
                });
                if f.with_lfs {
                    let digest = sha256_digest(&f.body);
                    entry["lfs"] = json!({
                        "oid": digest.trim_start_matches("sha256:"),
                        "size": f.body.len(),
                        "pointerSize": 134,
                    });
                }
                entry
            })
            .collect();
        Some(Value::Array(entries))
    }

    fn file(&self, repo: &str, revision: &str, path: &str) -> Option<Vec<u8>> {
        let repos = self.repos.lock().unwrap();
        repos
            .get(&format!("{repo}@{revision}"))?
            .iter()
            .find(|f| f.path == path)
            .map(|f| f.body.clone())
    }
}

async fn hub_handler(State(hub): State<Arc<FakeHub>>, uri: Uri, headers: HeaderMap) -> Response {
    let request = seen(&uri, &headers);
    hub.requests.lock().unwrap().push(request.clone());

    let path = urlencoding::decode(uri.path())
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| uri.path().to_string());
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    // /api/models/<org>/<name>/tree/<rev>
    if let ["api", "models", org, name, "tree", rev] = segments.as_slice() {
        return match hub.listing(&format!("{org}/{name}"), rev) {
            Some(listing) => Json(listing).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        };
    }

    // /<org>/<name>/resolve/<rev>/<file path...>
    if segments.len() >= 5 && segments[2] == "resolve" {
        let repo = format!("{}/{}", segments[0], segments[1]);
        let file_path = segments[4..].join("/");
        let Some(body) = hub.file(&repo, segments[3], &file_path) else {
            return StatusCode::NOT_FOUND.into_response();
        };
        return match hub.take_glitch(&repo, segments[3], &file_path) {
            Some(Glitch::Truncate(len)) => {
                (StatusCode::OK, body[..len.min(body.len())].to_vec()).into_response()
            }
            Some(Glitch::Status(status)) => status.into_response(),
            None => body_response(&body, request.range.as_deref()),
        };
    }

    StatusCode::NOT_FOUND.into_response()
}

// ---------------------------------------------------------------------------
// Fake registry
// ---------------------------------------------------------------------------

/// Registry serving `/v2/<path>/manifests/<tag>` and `/v2/<path>/blobs/<digest>`.
#[derive(Debug, Default)]
pub struct FakeRegistry {
    manifests: Mutex<HashMap<String, Value>>,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    ignore_ranges: AtomicBool,
    requests: Mutex<Vec<SeenRequest>>,
}

impl FakeRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer every blob request with the full body and 200, like servers
    /// without range support.
    pub fn ignore_ranges(&self) {
        self.ignore_ranges.store(true, Ordering::SeqCst);
    }

    pub fn add_manifest(&self, path: &str, tag: &str, manifest: Value) {
        self.manifests
            .lock()
            .unwrap()
            .insert(format!("{path}:{tag}"), manifest);
    }

    pub fn add_blob(&self, digest: &str, body: &[u8]) {
        self.blobs
            .lock()
            .unwrap()
            .insert(digest.to_string(), body.to_vec());
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count_requests(&self, fragment: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.path.contains(fragment))
            .count()
    }

    pub async fn start(self: &Arc<Self>) -> String {
        serve(Router::new().fallback(registry_handler).with_state(self.clone())).await
    }
}

async fn registry_handler(
    State(registry): State<Arc<FakeRegistry>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let request = seen(&uri, &headers);
    registry.requests.lock().unwrap().push(request.clone());

    let Some(rest) = uri.path().strip_prefix("/v2/") else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if let Some((path, tag)) = rest.split_once("/manifests/") {
        let manifests = registry.manifests.lock().unwrap();
        return match manifests.get(&format!("{path}:{tag}")) {
            Some(manifest) => Json(manifest.clone()).into_response(),
            None => (
                StatusCode::NOT_FOUND,
                Json(json!({"errors": [{"code": "MANIFEST_UNKNOWN"}]})),
            )
                .into_response(),
        };
    }

    if let Some((_, digest)) = rest.split_once("/blobs/") {
        let blobs = registry.blobs.lock().unwrap();
        return match blobs.get(digest) {
            Some(body) if registry.ignore_ranges.load(Ordering::SeqCst) => {
                (StatusCode::OK, body.clone()).into_response()
            }
            Some(body) => body_response(body, request.range.as_deref()),
            None => StatusCode::NOT_FOUND.into_response(),
        };
    }

    StatusCode::NOT_FOUND.into_response()
}

/// Manifest JSON in the registry's wire shape.
pub fn manifest_json(layers: &[(&str, &str, usize)]) -> Value {
    json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
        "config": {
            "mediaType": "application/vnd.docker.container.image.v1+json",
            "digest": "sha256:0000",
            "size": 2
        },
        "layers": layers
            .iter()
            .map(|(media_type, digest, size)| json!({
                "mediaType": media_type,
                "digest": digest,
                "size": size,
            }))
            .collect::<Vec<_>>(),
    })
}

// ---------------------------------------------------------------------------
// Fake toolchain
// ---------------------------------------------------------------------------

/// One recorded tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub tool: ExternalTool,
    pub args: Vec<String>,
    /// For converter calls: files present in the input directory at run time.
    pub input_files: Vec<String>,
}

impl ToolCall {
    pub fn program_name(&self) -> String {
        self.tool
            .program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Stands in for python converters and `llama-quantize`.
///
/// Converter calls (`--outfile`) write the output file; quantizer calls
/// write their second argument. Either can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    pub calls: Mutex<Vec<ToolCall>>,
    pub fail_convert: bool,
    pub fail_quantize: bool,
}

impl RecordingRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }
}

fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[async_trait]
impl ToolRunner for RecordingRunner {
    async fn run(
        &self,
        tool: &ExternalTool,
        args: &[OsString],
    ) -> wrangler_core::Result<ToolOutput> {
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let is_convert = args.iter().any(|a| a == "--outfile");

        let input_files = if is_convert {
            list_files(Path::new(&args[1]))
        } else {
            Vec::new()
        };
        self.calls.lock().unwrap().push(ToolCall {
            tool: tool.clone(),
            args: args.clone(),
            input_files,
        });

        let fail = if is_convert {
            self.fail_convert
        } else {
            self.fail_quantize
        };
        if fail {
            // A failing quantizer may still leave a truncated output behind
            if !is_convert {
                std::fs::write(&args[1], b"PARTIAL").expect("write partial output");
            }
            return Ok(ToolOutput {
                success: false,
                code: Some(1),
                stdout: String::new(),
                stderr: "simulated failure".to_string(),
            });
        }

        let output = if is_convert { &args[3] } else { &args[1] };
        std::fs::write(output, b"GGUF").expect("write fake tool output");
        Ok(ToolOutput {
            success: true,
            code: Some(0),
            ..Default::default()
        })
    }
}

/// A llama.cpp root with the generic converter and a built quantizer.
pub fn fake_toolchain() -> TempDir {
    let root = TempDir::new().expect("toolchain dir");
    std::fs::write(root.path().join("convert-hf-to-gguf.py"), "# converter").unwrap();
    std::fs::create_dir_all(root.path().join("build/bin")).unwrap();
    std::fs::write(root.path().join("build/bin/llama-quantize"), "").unwrap();
    root
}
