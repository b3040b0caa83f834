//! File utilities for ingestion.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Whether a file name marks a PDF input. The suffix match is case-sensitive.
pub fn is_pdf_file_name(name: &str) -> bool {
    name.ends_with(".pdf")
}

/// PDF files directly inside `folder`, sorted by file name.
///
/// Subdirectories are not descended into; other entries are ignored.
pub fn list_pdf_files(folder: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if entry.file_name().to_str().is_some_and(is_pdf_file_name) {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}
