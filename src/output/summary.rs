//! `extraction_summary.txt` rendering

use super::details::ExtractionDetails;
use crate::crawler::{CrawlMode, ImageStatus};
use crate::state::ExtractionStatistics;

/// Formats `n` with `,` thousands separators
fn with_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// Renders the human-readable summary for a successful extraction
pub fn format_summary(details: &ExtractionDetails) -> String {
    match details.extraction_parameters.mode {
        CrawlMode::Content => format_content_summary(details),
        CrawlMode::Link => format_link_summary(details),
    }
}

fn push_header(text: &mut String, details: &ExtractionDetails) {
    text.push_str("Extraction Summary\n");
    text.push_str(&"=".repeat(50));
    text.push_str("\n\n");
    text.push_str(&format!("URL: {}\n", details.source_url));
    text.push_str(&format!(
        "Date: {}\n",
        details.extracted_at.format("%Y-%m-%d %H:%M:%S")
    ));
    text.push_str(&format!(
        "Execution Time: {:.2} seconds\n",
        details.execution_time_seconds
    ));
}

fn formats_line(details: &ExtractionDetails) -> String {
    let formats: Vec<&str> = details
        .extraction_parameters
        .formats
        .iter()
        .map(|f| f.extension())
        .collect();
    format!("- Formats: {}\n", formats.join(", "))
}

fn push_output_files(text: &mut String, details: &ExtractionDetails) {
    text.push_str(&format!(
        "✓ {} output files generated\n\n",
        details.output_files.len()
    ));
    text.push_str("Output Files:\n");
    for file in &details.output_files {
        text.push_str(&format!("- {}\n", file));
    }
}

fn push_issues(text: &mut String, details: &ExtractionDetails) {
    if details.errors.is_empty() && details.warnings.is_empty() {
        return;
    }
    text.push_str("\nIssues:\n");
    for warning in &details.warnings {
        text.push_str(&format!("⚠ {}\n", warning));
    }
    for error in &details.errors {
        text.push_str(&format!("✗ {}\n", error));
    }
}

fn format_content_summary(details: &ExtractionDetails) -> String {
    let params = &details.extraction_parameters;
    let mut text = String::new();

    push_header(&mut text, details);
    text.push_str("\nExtraction Parameters:\n");
    match (&params.scope_class, &params.scope_id) {
        (Some(class), _) => text.push_str(&format!("- Scope: class=\"{}\"\n", class)),
        (None, Some(id)) => text.push_str(&format!("- Scope: id=\"{}\"\n", id)),
        (None, None) => text.push_str("- Scope: Full page\n"),
    }
    text.push_str(&formats_line(details));
    text.push_str(&format!(
        "- Download Images: {}\n",
        yes_no(params.download_images)
    ));

    text.push_str("\nResults:\n");
    text.push_str("✓ Content extracted successfully\n");
    let words = match &details.content_statistics {
        ExtractionStatistics::Content(stats) => stats.word_count,
        ExtractionStatistics::Links(_) => 0,
    };
    text.push_str(&format!("✓ {} words extracted\n", with_thousands(words)));

    if params.download_images {
        if let Some(images) = &details.images {
            text.push_str(&format!(
                "✓ {} of {} images downloaded successfully\n",
                images.successfully_downloaded, images.total_found
            ));
        }
    }

    push_output_files(&mut text, details);

    if let Some(images) = &details.images {
        let downloaded: Vec<_> = images
            .image_list
            .iter()
            .filter(|image| image.status == ImageStatus::Success)
            .collect();
        if !downloaded.is_empty() {
            text.push_str("\nImages:\n");
            for image in downloaded {
                text.push_str(&format!(
                    "- {} (from {})\n",
                    image.local_filename.as_deref().unwrap_or_default(),
                    image.resolved_url.as_deref().unwrap_or(&image.original_url)
                ));
            }
        }
    }

    push_issues(&mut text, details);

    text.push_str(&format!(
        "\nStatus: {}",
        if details.errors.is_empty() {
            "SUCCESS"
        } else {
            "COMPLETED WITH ERRORS"
        }
    ));
    text
}

fn format_link_summary(details: &ExtractionDetails) -> String {
    let params = &details.extraction_parameters;
    let mut text = String::new();

    push_header(&mut text, details);
    text.push_str("Mode: Link Extraction\n");
    text.push_str("\nExtraction Parameters:\n");
    text.push_str(&format!("- Link Type: {}\n", params.link_type));
    text.push_str(&format!(
        "- Exclude Anchors: {}\n",
        yes_no(params.exclude_anchors)
    ));
    text.push_str(&formats_line(details));

    text.push_str("\nResults:\n");
    text.push_str("✓ Links extracted successfully\n");
    if let ExtractionStatistics::Links(stats) = &details.content_statistics {
        text.push_str(&format!("✓ {} total links found\n", stats.total_links));
        text.push_str(&format!("✓ {} internal links\n", stats.internal_links));
        text.push_str(&format!("✓ {} external links\n", stats.external_links));
        if stats.unique_domains > 0 {
            text.push_str(&format!(
                "✓ {} unique external domains\n",
                stats.unique_domains
            ));
        }
    }

    push_output_files(&mut text, details);
    push_issues(&mut text, details);

    text.push_str("\nStatus: SUCCESS");
    text
}
