//! Form fields collected at submit time and their multipart encoding

use std::path::Path;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};

use crate::error::Result;

/// A file attached to a form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FormFile {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    /// Set the MIME type sent with the part
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Read a file from disk, naming the part after the file's base name
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(file_name, data))
    }
}

/// Value of a single form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    File(FormFile),
}

/// A named form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: FieldValue,
}

/// The fields of a form at the moment it was submitted
///
/// Fields keep insertion order and names may repeat, as with HTML forms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSubmission {
    fields: Vec<FormField>,
}

impl FormSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text field
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(FormField {
            name: name.into(),
            value: FieldValue::Text(value.into()),
        });
        self
    }

    /// Append a file field
    pub fn file(mut self, name: impl Into<String>, file: FormFile) -> Self {
        self.push(FormField {
            name: name.into(),
            value: FieldValue::File(file),
        });
        self
    }

    pub fn push(&mut self, field: FormField) {
        self.fields.push(field);
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    /// First field with the given name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Encode as `multipart/form-data`, one part per field in field order
    pub fn to_multipart(&self) -> Result<Form> {
        let mut form = Form::new();
        for field in &self.fields {
            let part = match &field.value {
                FieldValue::Text(value) => Part::text(value.clone()),
                FieldValue::File(file) => {
                    let part = Part::bytes(file.data.to_vec()).file_name(file.file_name.clone());
                    match &file.content_type {
                        Some(mime) => part.mime_str(mime)?,
                        None => part,
                    }
                }
            };
            form = form.part(field.name.clone(), part);
        }
        Ok(form)
    }
}

impl FromIterator<FormField> for FormSubmission {
    fn from_iter<I: IntoIterator<Item = FormField>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
