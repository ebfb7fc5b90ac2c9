//! Analyze command - submit band images and show the crop health result

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use cropscan_client::page::{Document, HEALTH_STATUS_ID, OUTPUT_IMAGES_ID, UPLOAD_FORM_ID};
use cropscan_client::{
    AnalyzeClient, FormFile, ImageLink, SubmissionOutcome, UploadHandler,
};
use tracing::debug;

use crate::output::{ImageRow, OutputContext};

/// Parse a `NAME=VALUE` argument
pub fn parse_key_val(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{}'", arg)),
    }
}

/// Fill the upload form, submit it and print the rendered page
pub async fn analyze(
    client: &AnalyzeClient,
    files: &[(String, String)],
    fields: &[(String, String)],
    save_dir: Option<&Path>,
    ctx: &OutputContext,
) -> Result<()> {
    let document = Document::with_upload_page();
    UploadHandler::attach(&document, client.clone())?;

    let form = document.form(UPLOAD_FORM_ID)?;
    for (name, path) in files {
        let file = FormFile::from_path(path)
            .await
            .with_context(|| format!("Failed to read {} band file: {}", name, path))?;
        debug!("Attaching {} ({} bytes) as '{}'", path, file.data.len(), name);
        form.set_file(name.as_str(), file);
    }
    for (name, value) in fields {
        form.set_text(name.as_str(), value.as_str());
    }

    ctx.info(&format!("Submitting to {}...", client.endpoint_url()));
    let outcomes = form.submit().settled().await;
    match outcomes.into_iter().next() {
        Some(SubmissionOutcome::Rendered { .. }) => {}
        Some(SubmissionOutcome::Failed { error }) => bail!("Analysis failed: {}", error),
        Some(SubmissionOutcome::Stale { generation }) => {
            bail!("Response to submission {} was superseded", generation)
        }
        None => bail!("Upload form was not intercepted"),
    }

    let status = document.status(HEALTH_STATUS_ID)?.text();
    let images = document.gallery(OUTPUT_IMAGES_ID)?.images();

    ctx.print_kv(&[("Health Status", status)]);
    let rows: Vec<ImageRow> = images
        .iter()
        .map(|image| ImageRow {
            name: image.alt.clone(),
            url: image.src.clone(),
        })
        .collect();
    ctx.print(&rows);

    if let Some(dir) = save_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        for image in &images {
            let link = ImageLink::new(image.alt.as_str(), image.src.as_str());
            let bytes = match client.fetch_image(&link).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    ctx.warn(&format!("Skipping image '{}': {}", link.name, e));
                    continue;
                }
            };
            let path = image_path(dir, &link);
            std::fs::write(&path, &bytes)
                .with_context(|| format!("Failed to write image: {}", path.display()))?;
            ctx.success(&format!("Saved {} ({} bytes)", path.display(), bytes.len()));
        }
    }

    Ok(())
}

/// File to store an image under: its name made filesystem-safe, plus the URL's extension
fn image_path(dir: &Path, link: &ImageLink) -> PathBuf {
    let stem: String = link
        .name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = if stem.is_empty() { "image".to_string() } else { stem };

    let path = link.url.split(['?', '#']).next().unwrap_or_default();
    let file = path.rsplit('/').next().unwrap_or_default();
    match file.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            dir.join(format!("{}.{}", stem, ext.to_ascii_lowercase()))
        }
        _ => dir.join(stem),
    }
}
