//! In-process model of the upload page
//!
//! A [`Document`] holds elements addressable by id, like the browser DOM the
//! upload page is served into. Element handles are shared references: every
//! clone of a handle observes and mutates the same element.
//!
//! ```rust
//! use cropscan_client::page::{Document, UPLOAD_FORM_ID};
//!
//! let document = Document::with_upload_page();
//! let form = document.form(UPLOAD_FORM_ID).unwrap();
//! form.set_text("note", "north field");
//!
//! // Nobody intercepts the submission, so the browser would navigate away.
//! assert!(form.submit().navigated());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::error::PageError;
use crate::form::{FieldValue, FormField, FormFile, FormSubmission};
use crate::handler::SubmissionOutcome;

/// Id of the upload form
pub const UPLOAD_FORM_ID: &str = "upload-form";
/// Id of the element showing the health status text
pub const HEALTH_STATUS_ID: &str = "health-status";
/// Id of the container holding result images
pub const OUTPUT_IMAGES_ID: &str = "output-images";

// =============================================================================
// Document
// =============================================================================

/// Elements of a page, keyed by id
#[derive(Debug, Default)]
pub struct Document {
    elements: HashMap<String, Element>,
}

/// Any element that can live in a [`Document`]
#[derive(Debug, Clone)]
pub enum Element {
    Form(FormElement),
    Status(StatusElement),
    Gallery(GalleryElement),
}

impl Element {
    fn kind(&self) -> &'static str {
        match self {
            Element::Form(_) => "form",
            Element::Status(_) => "status element",
            Element::Gallery(_) => "gallery container",
        }
    }
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// A document with the upload form, status element and gallery container
    pub fn with_upload_page() -> Self {
        let mut document = Self::new();
        document.insert_form(UPLOAD_FORM_ID);
        document.insert_status(HEALTH_STATUS_ID);
        document.insert_gallery(OUTPUT_IMAGES_ID);
        document
    }

    /// Add an empty form under `id`, replacing any element already there
    pub fn insert_form(&mut self, id: impl Into<String>) -> FormElement {
        let form = FormElement::default();
        self.elements.insert(id.into(), Element::Form(form.clone()));
        form
    }

    /// Add an empty status element under `id`, replacing any element already there
    pub fn insert_status(&mut self, id: impl Into<String>) -> StatusElement {
        let status = StatusElement::default();
        self.elements
            .insert(id.into(), Element::Status(status.clone()));
        status
    }

    /// Add an empty gallery under `id`, replacing any element already there
    pub fn insert_gallery(&mut self, id: impl Into<String>) -> GalleryElement {
        let gallery = GalleryElement::default();
        self.elements
            .insert(id.into(), Element::Gallery(gallery.clone()));
        gallery
    }

    pub fn remove(&mut self, id: &str) -> Option<Element> {
        self.elements.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn form(&self, id: &str) -> Result<FormElement, PageError> {
        match self.lookup(id)? {
            Element::Form(form) => Ok(form.clone()),
            other => Err(wrong_kind(id, "form", other)),
        }
    }

    pub fn status(&self, id: &str) -> Result<StatusElement, PageError> {
        match self.lookup(id)? {
            Element::Status(status) => Ok(status.clone()),
            other => Err(wrong_kind(id, "status element", other)),
        }
    }

    pub fn gallery(&self, id: &str) -> Result<GalleryElement, PageError> {
        match self.lookup(id)? {
            Element::Gallery(gallery) => Ok(gallery.clone()),
            other => Err(wrong_kind(id, "gallery container", other)),
        }
    }

    fn lookup(&self, id: &str) -> Result<&Element, PageError> {
        self.elements
            .get(id)
            .ok_or_else(|| PageError::MissingElement(id.to_string()))
    }
}

fn wrong_kind(id: &str, expected: &'static str, found: &Element) -> PageError {
    PageError::WrongKind {
        id: id.to_string(),
        expected,
        found: found.kind(),
    }
}

// =============================================================================
// Status element
// =============================================================================

/// Text-bearing element; content is plain text, never markup
#[derive(Debug, Clone, Default)]
pub struct StatusElement {
    text: Arc<RwLock<String>>,
}

impl StatusElement {
    pub fn text(&self) -> String {
        self.text.read().clone()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        *self.text.write() = text.into();
    }
}

// =============================================================================
// Gallery
// =============================================================================

/// A rendered image: `src` is the URL, `alt` the image name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageElement {
    pub src: String,
    pub alt: String,
}

impl ImageElement {
    pub fn new(src: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            alt: alt.into(),
        }
    }
}

/// Container of image elements, kept in append order
#[derive(Debug, Clone, Default)]
pub struct GalleryElement {
    images: Arc<RwLock<Vec<ImageElement>>>,
}

impl GalleryElement {
    pub fn images(&self) -> Vec<ImageElement> {
        self.images.read().clone()
    }

    pub fn len(&self) -> usize {
        self.images.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.read().is_empty()
    }

    pub fn clear(&self) {
        self.images.write().clear();
    }

    pub fn append(&self, image: ImageElement) {
        self.images.write().push(image);
    }

    /// Clear and refill under one lock so readers never see a half-built gallery
    pub fn replace_with(&self, images: impl IntoIterator<Item = ImageElement>) {
        let mut guard = self.images.write();
        guard.clear();
        guard.extend(images);
    }
}

// =============================================================================
// Form
// =============================================================================

/// Receives submit events dispatched by a [`FormElement`]
pub trait SubmitListener: Send + Sync {
    fn on_submit(&self, event: &mut SubmitEvent);
}

/// A form whose fields can be edited and which dispatches submit events
#[derive(Clone, Default)]
pub struct FormElement {
    inner: Arc<FormInner>,
}

#[derive(Default)]
struct FormInner {
    fields: RwLock<Vec<FormField>>,
    listeners: RwLock<Vec<Arc<dyn SubmitListener>>>,
}

impl fmt::Debug for FormElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormElement")
            .field("fields", &self.inner.fields.read().len())
            .field("listeners", &self.inner.listeners.read().len())
            .finish()
    }
}

impl FormElement {
    /// Set a text input, replacing the value of an existing field with that name
    pub fn set_text(&self, name: impl Into<String>, value: impl Into<String>) {
        self.set_field(name.into(), FieldValue::Text(value.into()));
    }

    /// Set a file input, replacing the value of an existing field with that name
    pub fn set_file(&self, name: impl Into<String>, file: FormFile) {
        self.set_field(name.into(), FieldValue::File(file));
    }

    /// Remove every field with the given name
    pub fn clear_field(&self, name: &str) {
        self.inner.fields.write().retain(|field| field.name != name);
    }

    fn set_field(&self, name: String, value: FieldValue) {
        let mut fields = self.inner.fields.write();
        match fields.iter_mut().find(|field| field.name == name) {
            Some(field) => field.value = value,
            None => fields.push(FormField { name, value }),
        }
    }

    /// The fields as they are right now
    pub fn snapshot(&self) -> FormSubmission {
        self.inner.fields.read().iter().cloned().collect()
    }

    pub fn add_submit_listener(&self, listener: Arc<dyn SubmitListener>) {
        self.inner.listeners.write().push(listener);
    }

    /// Dispatch a submit event to every listener in registration order
    ///
    /// Listeners run synchronously on the calling thread. An attached
    /// `UploadHandler` spawns its request on the current tokio runtime; with
    /// no runtime available it logs an error and tracks nothing.
    pub fn submit(&self) -> SubmitDispatch {
        let listeners = self.inner.listeners.read().clone();
        let mut event = SubmitEvent {
            target: self.clone(),
            default_prevented: false,
            pending: Vec::new(),
        };
        for listener in listeners {
            listener.on_submit(&mut event);
        }
        SubmitDispatch {
            default_prevented: event.default_prevented,
            pending: event.pending,
        }
    }
}

/// Event passed to submit listeners
#[derive(Debug)]
pub struct SubmitEvent {
    target: FormElement,
    default_prevented: bool,
    pending: Vec<JoinHandle<SubmissionOutcome>>,
}

impl SubmitEvent {
    /// The form being submitted
    pub fn target(&self) -> &FormElement {
        &self.target
    }

    /// Suppress the full-page navigation that would otherwise follow
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Hand back background work started by a listener
    pub fn track(&mut self, task: JoinHandle<SubmissionOutcome>) {
        self.pending.push(task);
    }
}

/// Result of dispatching a submit event
#[derive(Debug)]
pub struct SubmitDispatch {
    default_prevented: bool,
    pending: Vec<JoinHandle<SubmissionOutcome>>,
}

impl SubmitDispatch {
    /// Whether the submission fell through to a full-page navigation
    pub fn navigated(&self) -> bool {
        !self.default_prevented
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Number of background submissions started by listeners
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Wait for every background submission to finish
    pub async fn settled(self) -> Vec<SubmissionOutcome> {
        let mut outcomes = Vec::with_capacity(self.pending.len());
        for task in self.pending {
            outcomes.push(match task.await {
                Ok(outcome) => outcome,
                Err(e) => SubmissionOutcome::Failed {
                    error: e.to_string(),
                },
            });
        }
        outcomes
    }
}
