//! Merging a bulk job's text outputs into one corpus

use crate::state::{CombinedRecord, SuccessRecord};
use chrono::{DateTime, FixedOffset};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Folder under the output directory that holds combined files
pub const COMBINED_DIR: &str = "combined_results";

/// Concatenates the `.txt` and `.md` outputs of successful extractions
///
/// Files are joined in result order with no separators. One file per
/// extension is written to `combined_results/combined_{YYYYmmdd_HHMMSS}`,
/// with `_1`, `_2`, ... appended when that name is already used.
/// Output files that have disappeared are skipped.
///
/// # Returns
///
/// * `Ok(Some(record))` - At least one combined file was written
/// * `Ok(None)` - There was nothing to combine
/// * `Err(_)` - A combined file could not be written
pub fn combine_outputs(
    successes: &[&SuccessRecord],
    output_dir: &Path,
    at: &DateTime<FixedOffset>,
) -> io::Result<Option<CombinedRecord>> {
    let mut txt = String::new();
    let mut md = String::new();

    for success in successes {
        let folder = Path::new(&success.output_folder);
        for filename in &success.output_files {
            let target = if filename.ends_with(".txt") {
                &mut txt
            } else if filename.ends_with(".md") {
                &mut md
            } else {
                continue;
            };

            match fs::read_to_string(folder.join(filename)) {
                Ok(content) => target.push_str(&content),
                Err(e) => tracing::warn!("Skipping {} while combining: {}", filename, e),
            }
        }
    }

    if txt.is_empty() && md.is_empty() {
        return Ok(None);
    }

    let combined_folder = output_dir.join(COMBINED_DIR);
    fs::create_dir_all(&combined_folder)?;
    let stem = unused_stem(&combined_folder, &at.format("%Y%m%d_%H%M%S").to_string());

    let mut output_files = Vec::new();
    for (extension, content) in [("txt", &txt), ("md", &md)] {
        if content.is_empty() {
            continue;
        }
        let filename = format!("{}.{}", stem, extension);
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(combined_folder.join(&filename))?
            .write_all(content.as_bytes())?;
        tracing::info!("Created combined file {}", filename);
        output_files.push(filename);
    }

    Ok(Some(CombinedRecord {
        label: format!("Combined Results ({} URLs)", successes.len()),
        output_folder: combined_folder.to_string_lossy().into_owned(),
        output_files,
        urls_combined: successes.len(),
    }))
}

/// First `combined_{stamp}[_N]` stem with neither a `.txt` nor an `.md` file
fn unused_stem(folder: &Path, stamp: &str) -> String {
    let mut attempt = 0usize;
    loop {
        let stem = if attempt == 0 {
            format!("combined_{}", stamp)
        } else {
            format!("combined_{}_{}", stamp, attempt)
        };
        let taken = ["txt", "md"]
            .iter()
            .any(|ext| folder.join(format!("{}.{}", stem, ext)).exists());
        if !taken {
            return stem;
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::CrawlMode;
    use crate::extract::ContentStatistics;
    use crate::state::{now_local, ExtractionStatistics};
    use tempfile::TempDir;

    fn success(folder: &Path, files: &[(&str, &str)]) -> SuccessRecord {
        fs::create_dir_all(folder).unwrap();
        for (name, content) in files {
            fs::write(folder.join(name), content).unwrap();
        }
        SuccessRecord {
            url: "https://example.com".to_string(),
            mode: CrawlMode::Content,
            output_folder: folder.to_string_lossy().into_owned(),
            output_files: files.iter().map(|(n, _)| n.to_string()).collect(),
            statistics: ExtractionStatistics::Content(ContentStatistics::default()),
            execution_time: 0.1,
            has_images: false,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_concatenates_without_separators() {
        let dir = TempDir::new().unwrap();
        let a = success(&dir.path().join("001_a"), &[("a.txt", "alpha\n"), ("a.md", "# A\n"), ("logo.png", "x")]);
        let b = success(&dir.path().join("002_b"), &[("b.txt", "beta\n")]);

        let record = combine_outputs(&[&a, &b], dir.path(), &now_local())
            .unwrap()
            .unwrap();

        assert_eq!(record.label, "Combined Results (2 URLs)");
        assert_eq!(record.urls_combined, 2);
        assert_eq!(record.output_files.len(), 2);

        let folder = dir.path().join(COMBINED_DIR);
        let txt = fs::read_to_string(folder.join(&record.output_files[0])).unwrap();
        let md = fs::read_to_string(folder.join(&record.output_files[1])).unwrap();
        assert_eq!(txt, "alpha\nbeta\n");
        assert_eq!(md, "# A\n");
        assert!(record.output_files[0].starts_with("combined_"));
        assert!(record.output_files[0].ends_with(".txt"));
    }

    #[test]
    fn test_same_second_combines_do_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let first = success(&dir.path().join("001_a"), &[("a.txt", "first run\n")]);
        let second = success(&dir.path().join("002_b"), &[("b.md", "# second run\n")]);
        let at = now_local();

        let one = combine_outputs(&[&first], dir.path(), &at).unwrap().unwrap();
        let two = combine_outputs(&[&second], dir.path(), &at).unwrap().unwrap();

        let stamp = at.format("%Y%m%d_%H%M%S").to_string();
        assert_eq!(one.output_files, vec![format!("combined_{}.txt", stamp)]);
        assert_eq!(two.output_files, vec![format!("combined_{}_1.md", stamp)]);

        let folder = dir.path().join(COMBINED_DIR);
        assert_eq!(
            fs::read_to_string(folder.join(&one.output_files[0])).unwrap(),
            "first run\n"
        );
    }

    #[test]
    fn test_nothing_to_combine() {
        let dir = TempDir::new().unwrap();
        let json_only = success(&dir.path().join("001_a"), &[("a.json", "[]")]);
        assert!(combine_outputs(&[&json_only], dir.path(), &now_local())
            .unwrap()
            .is_none());
        assert!(!dir.path().join(COMBINED_DIR).exists());
    }
}
