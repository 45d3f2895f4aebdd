//! Output module for extraction artifacts
//!
//! This module handles:
//! - Naming and creating per-extraction output folders
//! - Writing content files, `extraction_details.json` and the debug page
//! - Rendering `extraction_summary.txt`
//! - Combining a bulk job's text outputs into one corpus

mod combine;
mod details;
mod summary;
mod writer;

pub use combine::{combine_outputs, COMBINED_DIR};
pub use details::{
    ExtractionDetails, ExtractionParameters, FailedExtractionDetails, HttpResponseInfo, ImagesInfo,
};
pub use summary::format_summary;
pub use writer::{
    file_base_name, folder_name, output_slug, OutputFolder, OutputWriter, DEBUG_HTML_FILE,
    DETAILS_FILE, SUMMARY_FILE,
};
