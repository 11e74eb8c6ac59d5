//! HTTP front-end.
//!
//! A dedicated thread runs a tokio runtime with a hyper http1 accept loop.
//! Each parsed request is shipped over a crossbeam channel to one of a
//! fixed pool of worker threads, which dispatches it through the app and
//! replies over a tokio oneshot. The dispatch pipeline itself is fully
//! synchronous; only connection handling is async.

mod worker_pool;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use colored::Colorize;
use crossbeam::channel;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::app::App;
use crate::binder::FormMap;
use crate::context::{RequestParts, ResponseParts};
use worker_pool::{WorkerQueues, WorkerSender};

const QUEUE_CAPACITY_PER_WORKER: usize = 1024;

/// One request in flight between the accept loop and a worker.
pub(crate) struct RequestData {
    request: RequestParts,
    response_tx: oneshot::Sender<ResponseParts>,
}

/// Serve the app on `0.0.0.0:{port}`. Blocks until the worker threads
/// exit, which in normal operation is never.
pub fn run(app: App) -> std::io::Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("{} {}", "PANIC:".red().bold(), panic_info);
    }));

    let port = app.config().port;
    let dev_mode = app.config().is_dev;
    let num_workers = match app.config().workers {
        0 => thread::available_parallelism().map(|p| p.get()).unwrap_or(4),
        n => n,
    };

    let app = Arc::new(app);
    let worker_queues = Arc::new(WorkerQueues::new(num_workers, QUEUE_CAPACITY_PER_WORKER));
    let worker_queues_for_tokio = worker_queues.clone();

    println!(
        "{}",
        format!("Server listening on http://0.0.0.0:{}", port).green()
    );
    if dev_mode {
        println!("{}", "Development mode - no caching, verbose errors".yellow());
    } else {
        println!("{}", "Production mode - template caching enabled".blue());
    }
    println!("Using hyper async HTTP server with {} worker threads", num_workers);

    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                eprintln!("{} {}", "failed to create tokio runtime:".red(), e);
                return;
            }
        };

        runtime.block_on(async move {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let listener = match TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(e) => {
                    eprintln!("{} {}", format!("failed to bind port {}:", port).red(), e);
                    return;
                }
            };

            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => continue,
                };
                let io = TokioIo::new(stream);
                let request_tx = worker_queues_for_tokio.get_sender();

                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let request_tx = request_tx.clone();
                        async move { handle_request(req, request_tx).await }
                    });

                    if let Err(_e) = http1::Builder::new().serve_connection(io, service).await {
                        // Connection errors are not actionable here.
                    }
                });
            }
        });
    });

    let mut workers = Vec::with_capacity(num_workers);
    for i in 0..num_workers {
        let work_rx = worker_queues.get_receiver(i);
        let app = Arc::clone(&app);

        let builder = thread::Builder::new().name(format!("worker-{}", i));
        let handle = builder.spawn(move || worker_loop(i, work_rx, app))?;
        workers.push(handle);
    }
    println!("Started {} worker threads", workers.len());

    for (i, worker) in workers.into_iter().enumerate() {
        match worker.join() {
            Ok(_) => eprintln!("Worker {} exited", i),
            Err(_) => eprintln!("{}", format!("Worker {} panicked", i).red()),
        }
    }

    Ok(())
}

/// Worker loop: dispatch requests from this worker's dedicated queue until
/// the accept side goes away.
fn worker_loop(worker_id: usize, work_rx: channel::Receiver<RequestData>, app: Arc<App>) {
    while let Ok(RequestData {
        request,
        response_tx,
    }) = work_rx.recv()
    {
        let response = app.handle(request);
        if response_tx.send(response).is_err() {
            // The client hung up while we were working.
            eprintln!("Worker {}: response receiver dropped", worker_id);
        }
    }
}

/// Turn a hyper request into [`RequestParts`], hand it to a worker and
/// await the buffered response.
async fn handle_request(
    req: Request<Incoming>,
    request_tx: WorkerSender,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().to_string().to_uppercase();
    let path = req.uri().path().to_string();
    let params = parse_query_string(req.uri().query().unwrap_or(""));

    let mut headers = HashMap::new();
    for (name, value) in req.headers() {
        if let Ok(v) = value.to_str() {
            headers.insert(name.to_string().to_lowercase(), v.to_string());
        }
    }

    // Body only matters for urlencoded forms; GET/HEAD skip the read.
    let form = if method == "GET" || method == "HEAD" {
        FormMap::default()
    } else {
        let body_bytes = req
            .into_body()
            .collect()
            .await
            .map(|b| b.to_bytes().to_vec())
            .unwrap_or_default();
        let is_form = headers
            .get("content-type")
            .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);
        if is_form {
            let body = String::from_utf8_lossy(&body_bytes);
            FormMap::from_map(parse_query_string(&body))
        } else {
            FormMap::default()
        }
    };

    let request = RequestParts {
        path,
        verb: method,
        params,
        form,
        headers,
    };

    let (response_tx, response_rx) = oneshot::channel();
    if request_tx
        .try_send(RequestData {
            request,
            response_tx,
        })
        .is_err()
    {
        return Ok(plain_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Server overloaded",
        ));
    }

    match response_rx.await {
        Ok(parts) => {
            let mut builder = Response::builder()
                .status(StatusCode::from_u16(parts.status).unwrap_or(StatusCode::OK));
            for (name, value) in &parts.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            Ok(builder
                .body(Full::new(Bytes::from(parts.body)))
                .unwrap_or_else(|_| {
                    plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                }))
        }
        Err(_) => Ok(plain_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
        )),
    }
}

fn plain_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
}

/// Parse a query string or urlencoded form body. `+` decodes as a space;
/// keys without `=` map to the empty string.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut result = HashMap::new();
    if query.is_empty() {
        return result;
    }

    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            let decoded_key = urlencoding::decode(&key.replace('+', " "))
                .unwrap_or_else(|_| key.into())
                .into_owned();
            let decoded_value = urlencoding::decode(&value.replace('+', " "))
                .unwrap_or_else(|_| value.into())
                .into_owned();
            result.insert(decoded_key, decoded_value);
        } else {
            let decoded = urlencoding::decode(&pair.replace('+', " "))
                .unwrap_or_else(|_| pair.into())
                .into_owned();
            result.insert(decoded, String::new());
        }
    }

    result
}
