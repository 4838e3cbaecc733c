#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use runner_client::config::Config;
use runner_client::session::push::StaticRegistrar;
use runner_client::state::AppState;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::broadcast;

pub const TOKEN: &str = "tok-u1";
pub const RUNNER_ID: &str = "u1";
pub const PASSWORD: &str = "secret";
pub const DEVICE_ADDRESS: &str = "ExponentPushToken[device]";

/// In-memory stand-in for the runner backend: REST routes plus the event
/// socket.
pub struct Backend {
    pub requests: Mutex<Vec<Value>>,
    pub orders: Mutex<Vec<Value>>,
    pub pushes: Mutex<Vec<Value>>,
    pub received_frames: Mutex<Vec<String>>,
    pub connected_runners: Mutex<Vec<String>>,
    pub connections: AtomicUsize,
    pub delivered_calls: AtomicUsize,
    frames_tx: broadcast::Sender<String>,
    kick_tx: broadcast::Sender<()>,
}

impl Backend {
    pub fn push_frame(&self, event: &str, data: Value) {
        let frame = json!({ "event": event, "data": data }).to_string();
        let _ = self.frames_tx.send(frame);
    }

    /// Closes every open socket from the server side.
    pub fn drop_connections(&self) {
        let _ = self.kick_tx.send(());
    }

    pub fn order_status(&self, order_id: &str) -> Option<String> {
        self.orders
            .lock()
            .unwrap()
            .iter()
            .find(|order| order["_id"] == order_id)
            .and_then(|order| order["status"].as_str().map(str::to_string))
    }
}

pub fn runner_json() -> Value {
    json!({
        "_id": RUNNER_ID,
        "name": "Ada",
        "campus": "Unilag",
        "isApproved": true,
        "isActive": false,
        "wallet": 2500,
        "expoPushToken": DEVICE_ADDRESS
    })
}

pub fn request_json(id: &str, store: &str) -> Value {
    json!({
        "_id": id,
        "storeName": store,
        "pickupAddress": format!("{store} counter"),
        "deliveryAddress": "Hall 3",
        "status": "pending"
    })
}

pub fn order_json(id: &str, status: &str) -> Value {
    json!({
        "_id": id,
        "orderNumber": "1042",
        "storeId": {
            "name": "Cafe A",
            "address": "Block C",
            "expoPushToken": "ExponentPushToken[store]",
            "paymentInfo": [{ "bankName": "GTBank" }]
        },
        "customerInfo": {
            "name": "Tolu",
            "address": "Hall 3, Room 12",
            "contact": "+2348000000000",
            "expoPushToken": "ExponentPushToken[cust]"
        },
        "items": [{ "name": "Jollof", "quantity": 1, "totalPrice": 1500 }],
        "itemsAmount": 1500,
        "status": status,
        "deliveryCode": "1234"
    })
}

pub async fn spawn_backend(requests: Vec<Value>, orders: Vec<Value>) -> (SocketAddr, Arc<Backend>) {
    let (frames_tx, _unused_rx) = broadcast::channel(64);
    let (kick_tx, _unused_kick_rx) = broadcast::channel(4);
    let backend = Arc::new(Backend {
        requests: Mutex::new(requests),
        orders: Mutex::new(orders),
        pushes: Mutex::new(Vec::new()),
        received_frames: Mutex::new(Vec::new()),
        connected_runners: Mutex::new(Vec::new()),
        connections: AtomicUsize::new(0),
        delivered_calls: AtomicUsize::new(0),
        frames_tx,
        kick_tx,
    });

    let app = Router::new()
        .route("/runner-auth/login", post(login))
        .route("/runner-auth/me", get(me))
        .route("/runner-auth/:id/expo-token", put(expo_token))
        .route("/runner/:id/toggleActive", patch(toggle_active))
        .route("/delivery/runner/:id", get(list_requests))
        .route("/runner/orders/:id", get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/delivery/accept", post(accept))
        .route("/runner/:id/order/:order_id/picked-up", post(picked_up))
        .route("/runner/:id/order/:order_id/delivered", post(delivered))
        .route("/push/send", post(push_send))
        .route("/ws", get(ws_handler))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, backend)
}

pub fn app_for(addr: SocketAddr, dir: &TempDir) -> AppState {
    app_with_channel(addr, &format!("ws://{addr}/ws"), dir)
}

/// REST against the fake backend, events from `channel_url`.
pub fn app_with_channel(addr: SocketAddr, channel_url: &str, dir: &TempDir) -> AppState {
    let config = Config::local(
        &format!("http://{addr}"),
        channel_url,
        dir.path().join("credentials.json"),
    );
    let registrar = Arc::new(StaticRegistrar::new(Some(DEVICE_ADDRESS.to_string())));
    AppState::new(&config, registrar).unwrap()
}

/// A socket url nothing listens on.
pub fn unreachable_channel_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("ws://127.0.0.1:{port}/ws")
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        == Some(format!("Bearer {TOKEN}").as_str())
}

fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] == PASSWORD {
        Json(json!({ "token": TOKEN })).into_response()
    } else {
        reject(StatusCode::UNAUTHORIZED, "Invalid credentials")
    }
}

async fn me(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return reject(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    Json(json!({ "runner": runner_json() })).into_response()
}

async fn expo_token() -> StatusCode {
    StatusCode::OK
}

async fn toggle_active(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "isActive": body["isActive"] }))
}

async fn list_requests(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return reject(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    let data = backend.requests.lock().unwrap().clone();
    Json(json!({ "data": data })).into_response()
}

async fn list_orders(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return reject(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    let data = backend.orders.lock().unwrap().clone();
    Json(json!({ "data": data })).into_response()
}

async fn get_order(State(backend): State<Arc<Backend>>, Path(id): Path<String>) -> Response {
    let orders = backend.orders.lock().unwrap();
    match orders.iter().find(|order| order["_id"] == id.as_str()) {
        Some(order) => Json(order.clone()).into_response(),
        None => reject(StatusCode::NOT_FOUND, "Order not found"),
    }
}

async fn accept(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    let request_id = body["requestId"].as_str().unwrap_or_default().to_string();
    let mut requests = backend.requests.lock().unwrap();
    let Some(position) = requests
        .iter()
        .position(|request| request["_id"] == request_id.as_str())
    else {
        return reject(StatusCode::CONFLICT, "Request already taken");
    };

    let request = requests.remove(position);
    let mut order = order_json(&format!("order-{request_id}"), "in progress");
    order["storeId"]["name"] = request["storeName"].clone();
    backend.orders.lock().unwrap().push(order);

    Json(json!({ "message": "Request accepted", "deliveryRequest": request })).into_response()
}

async fn picked_up(
    State(backend): State<Arc<Backend>>,
    Path((_runner_id, order_id)): Path<(String, String)>,
) -> Response {
    let mut orders = backend.orders.lock().unwrap();
    match orders.iter_mut().find(|order| order["_id"] == order_id.as_str()) {
        Some(order) => {
            order["status"] = json!("picked up");
            Json(json!({ "message": "Order picked up" })).into_response()
        }
        None => reject(StatusCode::NOT_FOUND, "Order not found"),
    }
}

async fn delivered(
    State(backend): State<Arc<Backend>>,
    Path((_runner_id, order_id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    backend.delivered_calls.fetch_add(1, Ordering::SeqCst);
    let mut orders = backend.orders.lock().unwrap();
    let Some(order) = orders.iter_mut().find(|order| order["_id"] == order_id.as_str()) else {
        return reject(StatusCode::NOT_FOUND, "Order not found");
    };

    if body["deliveryCode"] == order["deliveryCode"] {
        order["status"] = json!("completed");
        Json(json!({ "message": "Delivery marked as complete" })).into_response()
    } else {
        reject(StatusCode::BAD_REQUEST, "Delivery code is incorrect")
    }
}

async fn push_send(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> StatusCode {
    backend.pushes.lock().unwrap().push(body);
    StatusCode::OK
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(backend): State<Arc<Backend>>,
) -> impl IntoResponse {
    if let Some(runner_id) = params.get("runnerId") {
        backend
            .connected_runners
            .lock()
            .unwrap()
            .push(runner_id.clone());
    }
    ws.on_upgrade(move |socket| handle_socket(socket, backend))
}

async fn handle_socket(socket: WebSocket, backend: Arc<Backend>) {
    let (mut sender, mut receiver) = socket.split();
    let mut frames_rx = backend.frames_tx.subscribe();
    let mut kick_rx = backend.kick_tx.subscribe();
    backend.connections.fetch_add(1, Ordering::SeqCst);

    let send_task = tokio::spawn(async move {
        while let Ok(frame) = frames_rx.recv().await {
            if sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    let recorder = backend.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => recorder.received_frames.lock().unwrap().push(text),
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut recv_task => {}
        _ = kick_rx.recv() => recv_task.abort(),
    }
    send_task.abort();
    backend.connections.fetch_sub(1, Ordering::SeqCst);
}
