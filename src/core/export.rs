//! Zip export of a project's pages

use std::io::{Seek, Write};

use anyhow::{Context, Result};
use zip::{write::FileOptions, ZipWriter};

use super::model::Project;

/// Archive filename for a project: whitespace runs become `-`, lower-cased
pub fn archive_name(project_name: &str) -> String {
    let slug = project_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    format!("{}.zip", slug)
}

/// Write one entry per page, named by its path, containing its html verbatim
pub fn write_zip<W: Write + Seek>(project: &Project, writer: W) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::<()>::default().compression_method(zip::CompressionMethod::Deflated);

    for page in &project.pages {
        zip.start_file(page.path.as_str(), options)
            .with_context(|| format!("Failed to add {} to archive", page.path))?;
        zip.write_all(page.html.as_bytes())?;
    }

    let writer = zip.finish().context("Failed to finalize archive")?;
    tracing::debug!("Exported {} pages of {}", project.pages.len(), project.id);
    Ok(writer)
}
