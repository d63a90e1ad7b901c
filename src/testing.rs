//! In-process stand-in for the authorization and media endpoints.

use std::{
    collections::{HashMap, VecDeque},
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    routing::{get, post},
    AddExtensionLayer, Json, Router, Server,
};
use serde_json::{json, Value};

use crate::core::{Notification, NotificationSink};

pub struct RecordedUpload {
    pub query: HashMap<String, String>,
    pub body: String,
}

pub struct FakeApi {
    token_responses: Mutex<VecDeque<(u16, Value)>>,
    upload_responses: Mutex<VecDeque<(u16, Value)>>,
    pub token_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub token_queries: Mutex<Vec<HashMap<String, String>>>,
    pub uploads: Mutex<Vec<RecordedUpload>>,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            token_responses: Mutex::new(VecDeque::from(vec![(
                200,
                json!({"access_token": "token-1", "expires_in": 7200}),
            )])),
            upload_responses: Mutex::new(VecDeque::from(vec![(
                200,
                json!({"url": "https://mmbiz.qpic.cn/abc.jpg"}),
            )])),
            token_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            token_queries: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }
}

impl FakeApi {
    /// Answers are served in order; the last one repeats.
    pub fn with_token_responses(self, responses: Vec<(u16, Value)>) -> Self {
        *self.token_responses.lock().unwrap() = responses.into();
        self
    }

    pub fn with_upload_responses(self, responses: Vec<(u16, Value)>) -> Self {
        *self.upload_responses.lock().unwrap() = responses.into();
        self
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    /// Serve on an ephemeral port and return the base URL.
    pub fn spawn(self: &Arc<Self>) -> String {
        let app = Router::new()
            .route("/cgi-bin/token", get(token))
            .route("/cgi-bin/media/uploadimg", post(upload))
            .layer(AddExtensionLayer::new(Arc::clone(self)));

        let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
        let server = Server::bind(&addr).serve(app.into_make_service());
        let addr = server.local_addr();
        tokio::spawn(server);
        format!("http://{}", addr)
    }
}

/// Base URL of a local port nothing listens on.
pub fn closed_base() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn next(queue: &Mutex<VecDeque<(u16, Value)>>) -> (StatusCode, Json<Value>) {
    let mut queue = queue.lock().unwrap();
    let (status, body) = if queue.len() > 1 {
        queue.pop_front().unwrap()
    } else {
        queue.front().cloned().unwrap()
    };
    (StatusCode::from_u16(status).unwrap(), Json(body))
}

async fn token(
    Extension(api): Extension<Arc<FakeApi>>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    api.token_calls.fetch_add(1, Ordering::SeqCst);
    api.token_queries.lock().unwrap().push(query);
    next(&api.token_responses)
}

async fn upload(
    Extension(api): Extension<Arc<FakeApi>>,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> (StatusCode, Json<Value>) {
    api.upload_calls.fetch_add(1, Ordering::SeqCst);
    api.uploads
        .lock()
        .unwrap()
        .push(RecordedUpload { query, body });
    next(&api.upload_responses)
}

#[derive(Default)]
pub struct RecordingSink {
    pub notifications: Mutex<Vec<Notification>>,
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}
