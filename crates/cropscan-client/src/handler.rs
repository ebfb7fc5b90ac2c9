//! Upload form handler
//!
//! Intercepts submissions of the upload form, posts the fields to the
//! analysis endpoint and renders the response into the status element and
//! the image gallery. Failures are logged and leave the page as it was.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::client::AnalyzeClient;
use crate::config::StalePolicy;
use crate::error::PageError;
use crate::form::FormSubmission;
use crate::page::{
    Document, FormElement, GalleryElement, ImageElement, StatusElement, SubmitEvent,
    SubmitListener, HEALTH_STATUS_ID, OUTPUT_IMAGES_ID, UPLOAD_FORM_ID,
};
use crate::types::AnalysisResult;

/// How a single submission ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Status and gallery were replaced; `images` is the gallery size
    Rendered { images: usize },
    /// The request or the response decoding failed; the page is unchanged
    Failed { error: String },
    /// A newer submission was issued before this response arrived
    Stale { generation: u64 },
}

/// Element handles the handler binds to
#[derive(Debug, Clone)]
pub struct UploadElements {
    pub form: FormElement,
    pub status: StatusElement,
    pub gallery: GalleryElement,
}

impl UploadElements {
    /// Look up `upload-form`, `health-status` and `output-images`
    pub fn from_document(document: &Document) -> Result<Self, PageError> {
        Ok(Self {
            form: document.form(UPLOAD_FORM_ID)?,
            status: document.status(HEALTH_STATUS_ID)?,
            gallery: document.gallery(OUTPUT_IMAGES_ID)?,
        })
    }
}

/// Submit listener that turns form submissions into background analysis requests
#[derive(Debug)]
pub struct UploadHandler {
    submitter: Submitter,
}

#[derive(Debug, Clone)]
struct Submitter {
    client: AnalyzeClient,
    status: StatusElement,
    gallery: GalleryElement,
    latest: Arc<AtomicU64>,
    /// Held across the stale check and both element writes
    render_lock: Arc<Mutex<()>>,
    policy: StalePolicy,
}

impl UploadHandler {
    /// Bind to the standard upload page elements of `document`
    pub fn attach(document: &Document, client: AnalyzeClient) -> Result<Arc<Self>, PageError> {
        let elements = UploadElements::from_document(document)?;
        Ok(Self::new(elements, client))
    }

    /// Bind to explicit element handles and start listening for submissions
    ///
    /// The form keeps the returned handler alive for as long as it exists.
    pub fn new(elements: UploadElements, client: AnalyzeClient) -> Arc<Self> {
        let policy = client.config().stale_policy;
        let handler = Arc::new(Self {
            submitter: Submitter {
                client,
                status: elements.status,
                gallery: elements.gallery,
                latest: Arc::new(AtomicU64::new(0)),
                render_lock: Arc::new(Mutex::new(())),
                policy,
            },
        });
        elements.form.add_submit_listener(handler.clone());
        info!(endpoint = %handler.submitter.client.endpoint_url(), "Upload handler attached");
        handler
    }

    /// Start a background submission of `form`
    ///
    /// Earlier in-flight submissions keep running.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn dispatch(&self, form: FormSubmission) -> JoinHandle<SubmissionOutcome> {
        self.spawn_on(&Handle::current(), form)
    }

    fn spawn_on(&self, runtime: &Handle, form: FormSubmission) -> JoinHandle<SubmissionOutcome> {
        let generation = self.submitter.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let submitter = self.submitter.clone();
        runtime.spawn(async move { submitter.run(generation, form).await })
    }

    /// Submit `form` and wait for the page update
    pub async fn submit(&self, form: FormSubmission) -> SubmissionOutcome {
        let generation = self.submitter.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.submitter.run(generation, form).await
    }
}

impl SubmitListener for UploadHandler {
    fn on_submit(&self, event: &mut SubmitEvent) {
        event.prevent_default();
        let form = event.target().snapshot();
        match Handle::try_current() {
            Ok(runtime) => event.track(self.spawn_on(&runtime, form)),
            Err(e) => error!("Error: cannot submit upload form: {}", e),
        }
    }
}

impl Submitter {
    async fn run(&self, generation: u64, form: FormSubmission) -> SubmissionOutcome {
        debug!(generation, fields = form.len(), "Submitting upload form");

        let result = match self.client.analyze(&form).await {
            Ok(result) => result,
            Err(e) => {
                error!(generation, "Error: {}", e);
                return SubmissionOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        self.commit(generation, result)
    }

    /// Apply a decoded response to the page unless a newer submission supersedes it
    fn commit(&self, generation: u64, result: AnalysisResult) -> SubmissionOutcome {
        let _guard = self.render_lock.lock();

        if self.policy == StalePolicy::DiscardStale
            && self.latest.load(Ordering::SeqCst) != generation
        {
            debug!(generation, "Dropping response superseded by a newer submission");
            return SubmissionOutcome::Stale { generation };
        }

        let images = self.render(result);
        SubmissionOutcome::Rendered { images }
    }

    /// Caller must hold `render_lock`
    fn render(&self, result: AnalysisResult) -> usize {
        self.status.set_text(result.health_status);
        let images: Vec<ImageElement> = result
            .images
            .into_iter()
            .map(|link| ImageElement::new(link.url, link.name))
            .collect();
        let count = images.len();
        self.gallery.replace_with(images);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AnalyzeClient {
        AnalyzeClient::new("http://127.0.0.1:9").unwrap()
    }

    #[test]
    fn test_attach_requires_all_elements() {
        for id in [UPLOAD_FORM_ID, HEALTH_STATUS_ID, OUTPUT_IMAGES_ID] {
            let mut document = Document::with_upload_page();
            document.remove(id);
            let err = UploadHandler::attach(&document, client()).unwrap_err();
            assert_eq!(err, PageError::MissingElement(id.to_string()));
        }
    }

    #[test]
    fn test_render_replaces_page_content() {
        let document = Document::with_upload_page();
        let elements = UploadElements::from_document(&document).unwrap();
        let handler = UploadHandler::new(elements.clone(), client());
        elements
            .gallery
            .append(ImageElement::new("/stale.png", "stale"));

        let rendered = handler.submitter.render(AnalysisResult {
            health_status: "OK".to_string(),
            images: vec![
                crate::ImageLink::new("a", "/x.png"),
                crate::ImageLink::new("b", "/y.png"),
            ],
        });

        assert_eq!(rendered, 2);
        assert_eq!(elements.status.text(), "OK");
        assert_eq!(
            elements.gallery.images(),
            vec![
                ImageElement::new("/x.png", "a"),
                ImageElement::new("/y.png", "b")
            ]
        );
    }

    fn single_image_result(label: &str) -> AnalysisResult {
        AnalysisResult {
            health_status: label.to_string(),
            images: vec![crate::ImageLink::new(label, format!("/{}.png", label))],
        }
    }

    #[test]
    fn test_concurrent_renders_keep_status_and_gallery_together() {
        let document = Document::with_upload_page();
        let elements = UploadElements::from_document(&document).unwrap();
        let handler = UploadHandler::new(elements.clone(), client());

        let writers: Vec<_> = ["A", "B"]
            .into_iter()
            .map(|label| {
                let submitter = handler.submitter.clone();
                std::thread::spawn(move || {
                    for _ in 0..20_000 {
                        submitter.commit(0, single_image_result(label));
                    }
                })
            })
            .collect();

        let reader = {
            let submitter = handler.submitter.clone();
            let elements = elements.clone();
            std::thread::spawn(move || {
                for _ in 0..20_000 {
                    let _guard = submitter.render_lock.lock();
                    let images = elements.gallery.images();
                    if let Some(first) = images.first() {
                        assert_eq!(elements.status.text(), first.alt);
                    }
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        let images = elements.gallery.images();
        assert_eq!(images.len(), 1);
        assert_eq!(elements.status.text(), images[0].alt);
    }

    #[test]
    fn test_stale_generation_is_not_committed() {
        let document = Document::with_upload_page();
        let elements = UploadElements::from_document(&document).unwrap();
        let client = AnalyzeClient::with_config(
            crate::ClientConfig::builder("http://127.0.0.1:9")
                .stale_policy(StalePolicy::DiscardStale)
                .build(),
        )
        .unwrap();
        let handler = UploadHandler::new(elements.clone(), client);
        handler.submitter.latest.store(2, Ordering::SeqCst);

        let outcome = handler.submitter.commit(1, single_image_result("old"));
        assert_eq!(outcome, SubmissionOutcome::Stale { generation: 1 });
        assert_eq!(elements.status.text(), "");
        assert!(elements.gallery.is_empty());

        let outcome = handler.submitter.commit(2, single_image_result("new"));
        assert_eq!(outcome, SubmissionOutcome::Rendered { images: 1 });
        assert_eq!(elements.status.text(), "new");
    }

    #[test]
    fn test_submit_outside_runtime_does_not_panic() {
        let document = Document::with_upload_page();
        let elements = UploadElements::from_document(&document).unwrap();
        let _handler = UploadHandler::new(elements.clone(), client());
        elements.form.set_text("label", "x");

        let dispatch = elements.form.submit();

        assert!(dispatch.default_prevented());
        assert!(!dispatch.navigated());
        assert_eq!(dispatch.pending(), 0);
        assert_eq!(elements.status.text(), "");
    }
}
