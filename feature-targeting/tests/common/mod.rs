#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use reqwest::header::CONTENT_TYPE;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use feature_targeting::config::Config;
use feature_targeting::server::serve;

pub static DEFAULT_CONFIG: Lazy<Config> = Lazy::new(Config::default_test_config);

pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    client: reqwest::Client,
}

impl ServerHandle {
    pub async fn for_config(config: Config) -> ServerHandle {
        let listener = TcpListener::bind(config.address)
            .await
            .expect("failed to bind test listener");
        let addr = listener.local_addr().expect("failed to read local addr");

        let shutdown = Arc::new(Notify::new());
        let signal = shutdown.clone();
        tokio::spawn(serve(config, listener, async move {
            signal.notified().await;
        }));

        ServerHandle {
            addr,
            shutdown,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("failed to send GET request")
    }

    pub async fn get_with_headers(
        &self,
        path: &str,
        headers: &[(&str, &str)],
    ) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        request.send().await.expect("failed to send GET request")
    }

    pub async fn post(&self, path: &str, body: String) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .expect("failed to send POST request")
    }

    pub async fn patch(&self, path: &str, body: String) -> reqwest::Response {
        self.client
            .patch(self.url(path))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .expect("failed to send PATCH request")
    }

    pub async fn put(&self, path: &str, body: String) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .expect("failed to send PUT request")
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}
