//! Request routing and handlers
//!
//! Hand-rolled dispatch over `(method, path segments)`; the surface is
//! small enough that a routing framework would outweigh it. Handlers parse
//! input, call one service method and wrap the result in the envelope. The
//! two non-envelope responses are the ZIP body and the rate-limited stream.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use stratus_core::domain::{CoreError, Tier};
use stratus_files::models::{
    BatchDeleteRequest, CompleteChunkedRequest, ConfirmUploadRequest, CopyRequest,
    CreateFileRequest, DownloadRequest, InitChunkedRequest, MoveRequest, PreCheckRequest,
    UpdateFileRequest, VerifyResponse,
};
use stratus_files::DownloadOutcome;

use crate::response::{
    business_error, core_error, full_body, success, success_empty, Body, CODE_INVALID,
    CODE_RATE_LIMITED, CODE_UNAUTHORIZED,
};
use crate::state::AppState;

/// Header carrying the owner id resolved by the fronting auth layer.
const OWNER_HEADER: &str = "x-stratus-owner";
/// Header carrying the owner's tier; absent means free.
const TIER_HEADER: &str = "x-stratus-tier";

/// Entry point for one HTTP request.
pub async fn handle(
    state: Arc<AppState>,
    shutdown: CancellationToken,
    req: Request<Incoming>,
) -> Response<Body> {
    let owner_id = match owner_of(&req) {
        Some(owner_id) => owner_id,
        None => {
            return business_error(
                StatusCode::UNAUTHORIZED,
                CODE_UNAUTHORIZED,
                "missing or malformed owner identity",
            )
        }
    };

    if !state.limiter.allow(owner_id) {
        return business_error(
            StatusCode::TOO_MANY_REQUESTS,
            CODE_RATE_LIMITED,
            "request budget exhausted",
        );
    }

    let request_id = uuid::Uuid::new_v4();
    tracing::debug!(
        %request_id,
        owner_id,
        method = %req.method(),
        path = req.uri().path(),
        "dispatching request"
    );

    let tier = tier_of(&req);
    let method = req.method().clone();
    let segments = path_segments(req.uri().path());
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

    match (&method, segments.as_slice()) {
        (&Method::GET, ["files"]) => {
            let path = query_param(&req, "path").unwrap_or_else(|| "/".to_string());
            wrap(state.namespace.list(owner_id, &path).await)
        }
        (&Method::POST, ["files"]) => match read_json::<CreateFileRequest>(req).await {
            Ok(body) => wrap(state.namespace.create(owner_id, &body).await),
            Err(resp) => resp,
        },
        (&Method::DELETE, ["files"]) => match query_param(&req, "path") {
            Some(path) => wrap_empty(state.namespace.delete(owner_id, &path).await),
            None => invalid("missing path parameter"),
        },
        (&Method::POST, ["files", "batch-delete"]) => {
            match read_json::<BatchDeleteRequest>(req).await {
                Ok(body) => wrap_empty(state.namespace.batch_delete(owner_id, &body.paths).await),
                Err(resp) => resp,
            }
        }
        (&Method::POST, ["files", "move"]) => match read_json::<MoveRequest>(req).await {
            Ok(body) => wrap_empty(
                state
                    .namespace
                    .move_path(owner_id, &body.old_path, &body.new_path)
                    .await,
            ),
            Err(resp) => resp,
        },
        (&Method::POST, ["files", "copy"]) => match read_json::<CopyRequest>(req).await {
            Ok(body) => wrap_empty(
                state
                    .namespace
                    .copy_path(owner_id, &body.source_path, &body.target_path)
                    .await,
            ),
            Err(resp) => resp,
        },
        (&Method::POST, ["files", "precreate"]) => match read_json::<PreCheckRequest>(req).await {
            Ok(body) => wrap(state.upload.pre_check(owner_id, &body).await),
            Err(resp) => resp,
        },
        (&Method::POST, ["files", "create"]) => {
            match read_json::<ConfirmUploadRequest>(req).await {
                Ok(body) => wrap(state.upload.confirm_upload(owner_id, &body).await),
                Err(resp) => resp,
            }
        }
        (&Method::POST, ["files", "preupload"]) => {
            match read_json::<InitChunkedRequest>(req).await {
                Ok(body) => wrap(state.upload.init_chunked(owner_id, &body).await),
                Err(resp) => resp,
            }
        }
        (&Method::POST, ["files", "upload", "complete"]) => {
            let upload_id = match query_param(&req, "uploadId") {
                Some(upload_id) => upload_id,
                None => return invalid("missing uploadId parameter"),
            };
            match read_json::<CompleteChunkedRequest>(req).await {
                Ok(body) => wrap(
                    state
                        .upload
                        .complete_chunked(owner_id, &upload_id, &body)
                        .await,
                ),
                Err(resp) => resp,
            }
        }
        (&Method::POST, ["files", "download"]) => match read_json::<DownloadRequest>(req).await {
            Ok(body) => match state.download.download_targets(owner_id, &body).await {
                Ok(outcome) => download_response(outcome),
                Err(e) => core_error(&e),
            },
            Err(resp) => resp,
        },
        (&Method::GET, ["files", "download", id, "stream"]) => match parse_id(id) {
            Some(file_id) => stream_response(state, shutdown, req, owner_id, file_id, tier).await,
            None => invalid("malformed file id"),
        },
        (&Method::GET, ["files", "download", id, "progress"]) => match parse_id(id) {
            Some(file_id) => wrap(state.download.progress(owner_id, file_id).await),
            None => invalid("malformed file id"),
        },
        (&Method::GET, ["files", "stats"]) => wrap(state.namespace.stats(owner_id).await),
        (&Method::GET, ["files", id, "versions"]) => match parse_id(id) {
            Some(file_id) => wrap(state.namespace.versions(owner_id, file_id).await),
            None => invalid("malformed file id"),
        },
        (&Method::GET, ["files", id, "verify"]) => match parse_id(id) {
            Some(file_id) => wrap(
                state
                    .namespace
                    .verify(owner_id, file_id)
                    .await
                    .map(|valid| VerifyResponse { valid }),
            ),
            None => invalid("malformed file id"),
        },
        (&Method::GET, ["files", id]) => match parse_id(id) {
            Some(file_id) => wrap(state.namespace.get(owner_id, file_id).await),
            None => invalid("malformed file id"),
        },
        (&Method::PUT, ["files", id]) => {
            let file_id = match parse_id(id) {
                Some(file_id) => file_id,
                None => return invalid("malformed file id"),
            };
            match read_json::<UpdateFileRequest>(req).await {
                Ok(body) => wrap(state.namespace.update(owner_id, file_id, &body).await),
                Err(resp) => resp,
            }
        }
        _ => business_error(StatusCode::NOT_FOUND, CODE_INVALID, "no such route"),
    }
}

// ============================================================================
// Handler helpers
// ============================================================================

fn wrap<T: serde::Serialize>(result: Result<T, CoreError>) -> Response<Body> {
    match result {
        Ok(data) => success(data),
        Err(e) => core_error(&e),
    }
}

fn wrap_empty(result: Result<(), CoreError>) -> Response<Body> {
    match result {
        Ok(()) => success_empty(),
        Err(e) => core_error(&e),
    }
}

fn invalid(message: &str) -> Response<Body> {
    business_error(StatusCode::BAD_REQUEST, CODE_INVALID, message)
}

/// Single files answer with a JSON envelope carrying the presigned link;
/// multi-file requests answer with the assembled ZIP itself.
fn download_response(outcome: DownloadOutcome) -> Response<Body> {
    match outcome {
        DownloadOutcome::Single { dlink, total_size } => success(json!({
            "type": "single",
            "dlink": dlink,
            "totalSize": total_size,
        })),
        DownloadOutcome::Zip {
            zip_name,
            total_size,
            data,
        } => {
            let builder = Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "application/zip")
                .header(
                    "Content-Disposition",
                    format!("attachment; filename=\"{zip_name}\""),
                )
                .header("Content-Length", data.len().to_string())
                .header("X-Download-Type", "zip")
                .header("X-Total-Size", total_size.to_string());
            builder
                .body(full_body(Bytes::from(data)))
                .unwrap_or_else(|e| {
                    tracing::error!(error = %e, "zip response build failed");
                    business_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        crate::response::CODE_INTERNAL,
                        "response build failed",
                    )
                })
        }
    }
}

/// Commits headers from the prepared plan, then pumps the body through the
/// rate limiter in a background task feeding the response channel.
async fn stream_response(
    state: Arc<AppState>,
    shutdown: CancellationToken,
    req: Request<Incoming>,
    owner_id: i64,
    file_id: i64,
    tier: Tier,
) -> Response<Body> {
    let range_header = req
        .headers()
        .get("Range")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let plan = match state
        .download
        .prepare_stream(owner_id, file_id, range_header.as_deref())
        .await
    {
        Ok(plan) => plan,
        Err(e) => return core_error(&e),
    };

    let (tx, rx) = mpsc::channel::<Bytes>(8);
    let cancel = shutdown.child_token();

    {
        let state = Arc::clone(&state);
        let plan = plan.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let outcome = state.download.run_stream(&plan, tier, tx, cancel).await;
            match outcome.result {
                Ok(()) => tracing::debug!(
                    file_id = plan.file.id,
                    bytes = outcome.bytes_written,
                    "stream finished"
                ),
                // the bytes already written stay delivered
                Err(CoreError::Cancelled) => tracing::debug!(
                    file_id = plan.file.id,
                    bytes = outcome.bytes_written,
                    "stream cancelled"
                ),
                Err(e) => tracing::warn!(
                    file_id = plan.file.id,
                    bytes = outcome.bytes_written,
                    error = %e,
                    "stream aborted"
                ),
            }
        });
    }

    // Each chunk becomes its own frame, so the client sees progress as the
    // limiter releases bytes rather than one burst at the end.
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|bytes| (Ok::<_, Infallible>(Frame::data(bytes)), rx))
    });
    let body = BodyExt::boxed(StreamBody::new(stream));

    let status = if plan.is_partial() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let mut builder = Response::builder()
        .status(status)
        .header("Accept-Ranges", "bytes")
        .header("Content-Type", plan.content_type.as_str())
        .header(
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", plan.file.name),
        )
        .header("Content-Length", plan.transfer_len().to_string())
        .header("Cache-Control", "no-cache, no-store, must-revalidate")
        .header("Pragma", "no-cache")
        .header("Expires", "0");
    if let Some(ref etag) = plan.etag {
        builder = builder.header("ETag", format!("\"{etag}\""));
    }
    if let Some(ref last_modified) = plan.last_modified {
        builder = builder.header("Last-Modified", last_modified.as_str());
    }
    if let Some(content_range) = plan.content_range() {
        builder = builder.header("Content-Range", content_range);
    }

    builder.body(body).unwrap_or_else(|e| {
        tracing::error!(error = %e, "stream response build failed");
        business_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            crate::response::CODE_INTERNAL,
            "response build failed",
        )
    })
}

// ============================================================================
// Request parsing helpers
// ============================================================================

fn owner_of<B>(req: &Request<B>) -> Option<i64> {
    req.headers()
        .get(OWNER_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn tier_of<B>(req: &Request<B>) -> Tier {
    req.headers()
        .get(TIER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(Tier::parse_lossy)
        .unwrap_or_default()
}

fn path_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(percent_decode)
        .collect()
}

fn parse_id(segment: &str) -> Option<i64> {
    segment.parse().ok()
}

/// First value of `name` in the query string, percent-decoded.
fn query_param<B>(req: &Request<B>, name: &str) -> Option<String> {
    let query = req.uri().query()?;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key == name {
            return Some(percent_decode(&value.replace('+', " ")));
        }
    }
    None
}

/// Minimal %XX decoding; malformed escapes pass through verbatim.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(idx + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(idx + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                out.push((hi * 16 + lo) as u8);
                idx += 3;
                continue;
            }
        }
        out.push(bytes[idx]);
        idx += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Reads and parses a JSON body; parse failures answer 20001 directly.
async fn read_json<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T, Response<Body>> {
    let bytes = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return Err(invalid(&format!("failed to read request body: {e}")));
        }
    };
    serde_json::from_slice(&bytes).map_err(|e| invalid(&format!("bind error: {e}")))
}
