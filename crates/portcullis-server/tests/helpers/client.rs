//! Test client helpers.

use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, StatusCode},
};
use http_body_util::BodyExt;
use portcullis_server::metrics::detached_handle;
use portcullis_server::{AppState, Settings, create_router_with_state};
use serde::Serialize;
use tower::ServiceExt;

/// Helper para tests de integracion HTTP.
pub struct TestClient {
    app: Router,
}

impl TestClient {
    /// Crea un nuevo test client con el router proporcionado.
    pub fn new(app: Router) -> Self {
        Self { app }
    }

    /// Hace un GET request.
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, Vec::new(), Body::empty()).await
    }

    /// Hace un GET request con headers personalizados.
    pub async fn get_with_headers(&self, uri: &str, headers: Vec<(&str, &str)>) -> TestResponse {
        self.send(Method::GET, uri, headers, Body::empty()).await
    }

    /// Hace un HEAD request.
    pub async fn head(&self, uri: &str) -> TestResponse {
        self.send(Method::HEAD, uri, Vec::new(), Body::empty()).await
    }

    /// Hace un POST con body JSON.
    pub async fn post_json<T: Serialize>(&self, uri: &str, body: &T) -> TestResponse {
        self.post_json_with_headers(uri, body, Vec::new()).await
    }

    /// Hace un POST con body JSON y headers personalizados.
    pub async fn post_json_with_headers<T: Serialize>(
        &self,
        uri: &str,
        body: &T,
        mut headers: Vec<(&str, &str)>,
    ) -> TestResponse {
        headers.push(("content-type", "application/json"));
        let body = Body::from(serde_json::to_vec(body).unwrap());
        self.send(Method::POST, uri, headers, body).await
    }

    /// Hace un DELETE request.
    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.send(Method::DELETE, uri, Vec::new(), Body::empty())
            .await
    }

    /// Hace un DELETE con body JSON.
    pub async fn delete_json<T: Serialize>(&self, uri: &str, body: &T) -> TestResponse {
        let headers = vec![("content-type", "application/json")];
        let body = Body::from(serde_json::to_vec(body).unwrap());
        self.send(Method::DELETE, uri, headers, body).await
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        headers: Vec<(&str, &str)>,
        body: Body,
    ) -> TestResponse {
        let mut builder = Request::builder().uri(uri).method(method);

        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        self.request(builder.body(body).unwrap()).await
    }

    /// Ejecuta un request arbitrario.
    async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");

        TestResponse::from_response(response).await
    }
}

/// Wrapper sobre Response con helpers para assertions.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    async fn from_response(response: Response<Body>) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes()
            .to_vec();

        Self {
            status,
            headers,
            body,
        }
    }

    /// Retorna el body como string.
    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("Body is not valid UTF-8")
    }

    /// Parsea el body como JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse JSON")
    }

    /// Retorna un header especifico.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Verifica que el status sea el esperado.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {} but got {}. Body: {}",
            expected,
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Verifica que un header exista.
    pub fn assert_header_exists(&self, name: &str) -> &Self {
        assert!(
            self.headers.contains_key(name),
            "Expected header '{}' to exist",
            name
        );
        self
    }

    /// Verifica que un header no exista.
    pub fn assert_header_absent(&self, name: &str) -> &Self {
        assert!(
            !self.headers.contains_key(name),
            "Expected header '{}' to be absent, got {:?}",
            name,
            self.headers.get(name)
        );
        self
    }

    /// Verifica que un header tenga un valor especifico.
    pub fn assert_header(&self, name: &str, expected: &str) -> &Self {
        let value = self
            .header(name)
            .unwrap_or_else(|| panic!("Header '{}' not found", name));

        assert_eq!(
            value, expected,
            "Expected header '{}' to be '{}' but got '{}'",
            name, expected, value
        );
        self
    }
}

/// Construye el estado y el client a partir de settings.
pub fn app_with(settings: Settings) -> (TestClient, AppState) {
    let state = AppState::from_settings(settings).expect("valid settings");
    let router = create_router_with_state(state.clone(), detached_handle());
    (TestClient::new(router), state)
}

/// Crea un TestClient con settings por defecto.
pub fn client() -> TestClient {
    app_with(Settings::default()).0
}

/// Settings con rate limiting desactivado, para tests de cache.
pub fn cache_only_settings() -> Settings {
    let mut settings = Settings::default();
    settings.rate_limit.enabled = false;
    settings
}
