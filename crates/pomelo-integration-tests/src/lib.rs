//! Test harness: a real config service on an ephemeral loopback port.
//!
//! The actix server runs on its own thread with its own system so tests can
//! use a plain tokio runtime for the client side.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, web};

use pomelo_common::{Items, NsKey, Release};
use pomelo_server::{
    BranchResolver, MainBranchResolver, MemoryReleaseStore, ReleaseStore, WatchHub, api,
};

pub const TEST_APP: &str = "test-app";
pub const TEST_CLUSTER: &str = "default";

pub struct TestServer {
    pub store: Arc<MemoryReleaseStore>,
    pub base_url: String,
    pub port: u16,
    handle: actix_web::dev::ServerHandle,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl TestServer {
    /// Start on an ephemeral port.
    pub fn start(hold_timeout: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        Self::start_on(listener, hold_timeout)
    }

    /// Start on a specific port, retrying while the previous owner lets go.
    pub fn restart_on(port: u16, hold_timeout: Duration) -> Self {
        let mut last_err = None;
        for _ in 0..40 {
            match TcpListener::bind(("127.0.0.1", port)) {
                Ok(listener) => return Self::start_on(listener, hold_timeout),
                Err(e) => {
                    last_err = Some(e);
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        }
        panic!("could not rebind port {}: {:?}", port, last_err);
    }

    fn start_on(listener: TcpListener, hold_timeout: Duration) -> Self {
        let port = listener.local_addr().expect("local addr").port();
        let store = Arc::new(MemoryReleaseStore::new());
        let store_dyn: Arc<dyn ReleaseStore> = store.clone();
        let hub = Arc::new(WatchHub::new(store_dyn.clone(), hold_timeout, 10_000));
        let resolver: Arc<dyn BranchResolver> = Arc::new(MainBranchResolver::new(store_dyn));

        let (tx, rx) = std::sync::mpsc::channel();
        let thread = std::thread::spawn(move || {
            actix_web::rt::System::new().block_on(async move {
                let hub_data = web::Data::new(hub);
                let resolver_data = web::Data::new(resolver);
                let server = HttpServer::new(move || {
                    App::new()
                        .app_data(hub_data.clone())
                        .app_data(resolver_data.clone())
                        .configure(api::configure_routes)
                })
                .workers(2)
                .listen(listener)
                .expect("listen")
                .run();
                tx.send(server.handle()).expect("send server handle");
                let _ = server.await;
            });
        });
        let handle = rx.recv().expect("server handle");

        Self {
            store,
            base_url: format!("http://127.0.0.1:{}", port),
            port,
            handle,
            thread: Some(thread),
        }
    }

    pub async fn publish(&self, namespace: &str, pairs: &[(&str, &str)]) -> Release {
        let items: Items = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.store
            .publish(&NsKey::new(TEST_APP, TEST_CLUSTER, namespace), items)
            .await
    }

    /// Stop accepting connections and wait for the server thread to exit.
    pub async fn stop(mut self) {
        self.handle.stop(false).await;
        if let Some(thread) = self.thread.take() {
            let _ = tokio::task::spawn_blocking(move || thread.join()).await;
        }
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
