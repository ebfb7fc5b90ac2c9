//! Crop-health upload client
//!
//! Binds to an upload page, posts the submitted form to the analysis server
//! and renders the returned health status and result images.
//!
//! # Example
//!
//! ```rust,no_run
//! use cropscan_client::page::{Document, UPLOAD_FORM_ID};
//! use cropscan_client::{AnalyzeClient, FormFile, UploadHandler};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let document = Document::with_upload_page();
//!     let client = AnalyzeClient::new("http://localhost:5000")?;
//!     UploadHandler::attach(&document, client)?;
//!
//!     let form = document.form(UPLOAD_FORM_ID)?;
//!     form.set_file("nir", FormFile::from_path("bands/nir.tif").await?);
//!     form.set_file("red", FormFile::from_path("bands/red.tif").await?);
//!
//!     // Default navigation is suppressed; the request runs in the background.
//!     let dispatch = form.submit();
//!     for outcome in dispatch.settled().await {
//!         println!("{:?}", outcome);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module serves an axum router as a stand-in analysis server:
//!
//! ```rust,ignore
//! use cropscan_client::testing::TestServer;
//!
//! let server = TestServer::start(router).await?;
//! let result = server.client.analyze(&form).await?;
//! ```

mod client;
mod config;
mod error;
mod form;
mod handler;
pub mod page;
pub mod testing;
mod types;

pub use client::AnalyzeClient;
pub use config::{
    ClientConfig, ClientConfigBuilder, ConnectionConfig, EndpointsConfig, StalePolicy,
    TimeoutsConfig,
};
pub use error::{AnalyzeError, ConfigError, PageError, Result};
pub use form::{FieldValue, FormField, FormFile, FormSubmission};
pub use handler::{SubmissionOutcome, UploadElements, UploadHandler};
pub use types::*;
