//! # Daedalus Test
//!
//! In-memory HTTP testing for Daedalus handler chains. Requests never touch
//! a socket; they are dispatched directly through an
//! [`HttpListener`](daedalus_server::HttpListener).
//!
//! - [`TestClient`] - Sends requests, with optional default headers
//! - [`TestRequest`] / [`TestRequestBuilder`] - Method, headers, JSON or form body
//! - [`TestResponse`] - Status, headers, body and chained assertions
//!
//! ## Example
//!
//! ```ignore
//! use daedalus_test::TestClient;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_message() {
//!     let client = TestClient::new(app());
//!
//!     client
//!         .post("/messages")
//!         .json(&json!({"text": "hello"}))
//!         .send()
//!         .await
//!         .unwrap()
//!         .assert_status(http::StatusCode::CREATED);
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use request::{TestRequest, TestRequestBuilder};
pub use response::TestResponse;
