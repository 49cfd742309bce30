//! Shared fixtures for the integration tests: a mocked store, CSV files and images.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;

use catalog_import::{StoreClient, StoreConfig};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

pub const TOKEN: &str = "test-token";

/// Store config pointing at the mock server, without delete pauses.
pub fn store_config(server: &MockServer) -> StoreConfig {
    StoreConfig::new(format!("{}/api", server.uri()), "admin@example.com", "secret")
        .with_delete_delay(Duration::ZERO)
}

pub fn client(server: &MockServer) -> Arc<StoreClient> {
    Arc::new(StoreClient::new(store_config(server)).unwrap())
}

/// Login that always succeeds with [`TOKEN`].
pub async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/users/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "token": TOKEN, "user": { "id": 1 } })),
        )
        .mount(server)
        .await;
}

/// A noisy JPEG, large enough to pass the placeholder check.
pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x * 7 + y * 13) % 256) as u8])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    bytes
}

/// Serve `bytes` as a JPEG at `url_path`.
pub async fn mount_image(server: &MockServer, url_path: &str, bytes: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_raw(bytes, "image/jpeg"))
        .mount(server)
        .await;
}

pub fn write_csv(contents: &str) -> NamedTempFile {
    write_csv_bytes(contents.as_bytes())
}

pub fn write_csv_bytes(contents: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents).unwrap();
    file.flush().unwrap();
    file
}

/// JSON bodies of every request received on `method` + `path`.
pub async fn bodies(server: &MockServer, verb: &str, url_path: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == verb && r.url.path() == url_path)
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

/// Matches requests whose raw body contains the given bytes (multipart-safe).
pub struct BodyHasBytes(pub &'static str);

impl Match for BodyHasBytes {
    fn matches(&self, request: &Request) -> bool {
        let needle = self.0.as_bytes();
        request.body.windows(needle.len()).any(|window| window == needle)
    }
}
