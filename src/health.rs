//! Liveness probe against the app's local health endpoint.

/// Dashboard port the app binds on localhost.
pub const APP_PORT: u16 = 8050;

/// Health endpoint URL for the local instance.
pub fn health_url() -> String {
    format!("http://127.0.0.1:{APP_PORT}/api/health")
}

/// Confirms a started process is ready to serve requests.
pub trait LivenessProbe {
    fn probe(&self) -> impl Future<Output = bool> + Send;
}

/// HTTP GET probe; any 2xx counts as healthy.
pub struct HttpProbe {
    url: String,
}

impl HttpProbe {
    pub fn new() -> Self {
        Self { url: health_url() }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessProbe for HttpProbe {
    async fn probe(&self) -> bool {
        match reqwest::get(&self.url).await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}
