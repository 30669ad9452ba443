use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Only the crate's own sources are policed.
const SOURCE_DIRS: [&str; 4] = ["mutate", "cli", "tests", "benches"];

// Collects every matching line of one file, filtered by a per-rule predicate.
struct RuleCollector {
    violations: Vec<String>,
    keep: fn(&str) -> bool,
}

impl Sink for RuleCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        if (self.keep)(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

struct Rule {
    pattern: &'static str,
    keep: fn(&str) -> bool,
    explanation: &'static str,
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with("//") || line.contains("/*")
}

fn is_doc_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("///") || trimmed.starts_with("//!")
}

// Underscore-prefixed names outside comments and string literals.
fn keep_underscore_binding(line: &str) -> bool {
    if is_comment(line) {
        return false;
    }
    let in_string = line
        .split('"')
        .enumerate()
        .any(|(i, part)| i % 2 == 1 && part.contains('_'));
    !in_string
}

fn keep_stars(line: &str) -> bool {
    !is_doc_comment(line)
}

fn keep_all_caps(line: &str) -> bool {
    let trimmed = line.trim_start();
    let comment_text = if let Some(rest) = trimmed.strip_prefix("///") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        rest
    } else {
        return false;
    };
    let alpha: Vec<char> = comment_text.chars().filter(|c| c.is_alphabetic()).collect();
    !alpha.is_empty() && alpha.iter().all(|c| c.is_uppercase())
}

fn keep_everything(line: &str) -> bool {
    !line.is_empty()
}

fn rust_sources() -> Vec<PathBuf> {
    SOURCE_DIRS
        .iter()
        .flat_map(|dir| WalkDir::new(dir).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.path().to_path_buf())
        .collect()
}

fn check(rule: &Rule, files: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(rule.pattern)?;
    let mut searcher = Searcher::new();
    for path in files {
        let mut collector = RuleCollector {
            violations: Vec::new(),
            keep: rule.keep,
        };
        searcher.search_path(&matcher, path, &mut collector)?;
        if !collector.violations.is_empty() {
            return Err(format_violations(path, &collector.violations, rule.explanation).into());
        }
    }
    Ok(())
}

fn format_violations(path: &Path, violations: &[String], explanation: &str) -> String {
    let mut error_msg = format!(
        "\n❌ ERROR: Found {} violations in {}:\n",
        violations.len(),
        path.display()
    );
    for violation in violations {
        error_msg.push_str(&format!("   {violation}\n"));
    }
    error_msg.push_str(&format!("\n⚠️ {explanation}\n"));
    error_msg
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for dir in SOURCE_DIRS {
        println!("cargo:rerun-if-changed={dir}");
    }

    let rules = [
        Rule {
            pattern: r"\b(_[a-zA-Z0-9_]+)\b",
            keep: keep_underscore_binding,
            explanation: "Underscore-prefixed variable names are not allowed in this project. Use the variable or remove it.",
        },
        Rule {
            pattern: r"(//|/\*|///).*(?:FIXED|CORRECTED|FIX|NEW|CHANGED|CHANGE|MODIFIED|MODIFY|UPDATED|UPDATE)",
            keep: keep_everything,
            explanation: "Comments narrating edits (FIXED, NEW, CHANGED, UPDATED, ...) are forbidden. Remove them completely.",
        },
        Rule {
            pattern: r"(//|/\*).*\*\*",
            keep: keep_stars,
            explanation: "The '**' pattern is not allowed in regular comments (but is allowed in doc comments).",
        },
        Rule {
            pattern: r"(//|/\*|///).*",
            keep: keep_all_caps,
            explanation: "Comments where all alphabetic characters are uppercase are forbidden.",
        },
        Rule {
            pattern: r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
            keep: keep_everything,
            explanation: "#[allow(dead_code)] attributes are forbidden. Use the code or remove it.",
        },
    ];

    let files = rust_sources();
    for rule in &rules {
        if let Err(e) = check(rule, &files) {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
