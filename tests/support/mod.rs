//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod socket_guard;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Lowercase hex MD5 of `bytes`.
pub fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Checksum sidecar body in the feed's format.
pub fn md5_reference(name: &str, bytes: &[u8]) -> String {
    format!("MD5 ({name}) = {}\n", md5_hex(bytes))
}

/// Mounts a HEAD response advertising byte ranges for `route`.
pub async fn mount_head(server: &MockServer, route: &str, body: &[u8], etag: &str) {
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("accept-ranges", "bytes")
                .insert_header("etag", etag)
                .set_body_bytes(body.to_vec()),
        )
        .mount(server)
        .await;
}

/// Mounts the `<route>.md5` checksum sidecar.
pub async fn mount_checksum(server: &MockServer, route: &str, name: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("{route}.md5")))
        .respond_with(ResponseTemplate::new(200).set_body_string(md5_reference(name, body)))
        .mount(server)
        .await;
}

/// Mounts a 206 response for `bytes=first-(len-1)` of `body`.
pub async fn mount_range(server: &MockServer, route: &str, body: &[u8], first: usize) {
    let last = body.len() - 1;
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("range", format!("bytes={first}-{last}").as_str()))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header(
                    "content-range",
                    format!("bytes {first}-{last}/{}", body.len()).as_str(),
                )
                .set_body_bytes(body[first..].to_vec()),
        )
        .mount(server)
        .await;
}
