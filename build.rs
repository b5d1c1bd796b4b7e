use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories holding this crate's own Rust sources. Nothing else is scanned.
const SOURCE_DIRS: [&str; 4] = ["score", "cli", "tests", "benches"];

// Collects every matching line of one file so a single, complete error message can be
// reported for it.
struct ViolationCollector {
    violations: Vec<String>,
    file_path: PathBuf,
    // Whether matches inside comments and string literals count.
    skip_comments_and_strings: bool,
}

impl ViolationCollector {
    fn new(file_path: &Path, skip_comments_and_strings: bool) -> Self {
        Self {
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
            skip_comments_and_strings,
        }
    }

    fn check_and_get_error_message(&self, what: &str, advice: &str) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let file_name = self.file_path.to_str().unwrap_or("?");
        let mut error_msg = format!(
            "\n❌ ERROR: Found {} {} in {}:\n",
            self.violations.len(),
            what,
            file_name
        );

        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }

        error_msg.push_str(&format!("\n⚠️ {advice}\n"));
        Some(error_msg)
    }
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();

        if self.skip_comments_and_strings {
            let is_pure_comment = line_text.trim_start().starts_with("//");

            // Text between an odd and even quote is inside a string literal.
            let is_in_string = line_text
                .split('"')
                .enumerate()
                .any(|(i, part)| i % 2 == 1 && part.contains('_'));

            if is_pure_comment || is_in_string {
                return Ok(true);
            }
        }

        self.violations.push(format!("{line_number}:{line_text}"));
        Ok(true)
    }
}

fn rust_sources() -> impl Iterator<Item = PathBuf> {
    SOURCE_DIRS.into_iter().flat_map(|dir| {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
            .map(|e| e.into_path())
    })
}

fn scan(
    pattern: &str,
    skip_comments_and_strings: bool,
    what: &str,
    advice: &str,
) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(pattern)?;
    let mut searcher = Searcher::new();

    for path in rust_sources() {
        let mut collector = ViolationCollector::new(&path, skip_comments_and_strings);
        searcher.search_path(&matcher, &path, &mut collector)?;

        if let Some(error_message) = collector.check_and_get_error_message(what, advice) {
            return Err(error_message.into());
        }
    }

    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for dir in SOURCE_DIRS {
        println!("cargo:rerun-if-changed={dir}");
    }

    let checks = [
        (
            r"\b(_[a-zA-Z0-9_]+)\b",
            true,
            "underscore-prefixed variables",
            "Underscore-prefixed variable names are not allowed in this project. \
             Either use the variable (removing the underscore) or remove it completely.",
        ),
        (
            r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
            false,
            "#[allow(dead_code)] attributes",
            "#[allow(dead_code)] attributes are STRICTLY FORBIDDEN in this project. \
             Either use the code or remove it completely.",
        ),
    ];

    for (pattern, skip, what, advice) in checks {
        if let Err(e) = scan(pattern, skip, what, advice) {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
