//! Purpose: Loopback mock of the platform API for integration tests.
//! Exports: `TestServer`, envelope helpers.
//! Invariants: Binds loopback only; the runtime dies with the server value.

use axum::Router;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::mpsc;
use tokio::runtime::Runtime;

pub struct TestServer {
    _runtime: Runtime,
    addr: SocketAddr,
}

impl TestServer {
    pub fn start(app: Router) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("runtime");
        let (tx, rx) = mpsc::channel();
        runtime.spawn(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind");
            tx.send(listener.local_addr().expect("addr")).expect("send");
            axum::serve(listener, app).await.expect("serve");
        });
        let addr = rx.recv().expect("recv addr");
        Self {
            _runtime: runtime,
            addr,
        }
    }

    /// Base url including the fixed `/api` prefix the client expects.
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }
}

pub fn ok_envelope(data: Value) -> Value {
    json!({ "code": 200, "message": "ok", "data": data })
}

pub fn err_envelope(code: i64, message: &str) -> Value {
    json!({ "code": code, "message": message, "data": null })
}
