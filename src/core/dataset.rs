use thiserror::Error;

use crate::services::store::CheckRecord;

/// Why a dataset line was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("missing name")]
    MissingName,

    #[error("missing suffix")]
    MissingSuffix,

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid suffix: {0}")]
    InvalidSuffix(String),
}

const HEADER_FIELDS: [&str; 3] = ["domain", "name", "domain_name"];

/// Non-blank lines of a dataset document, CR/LF tolerant
pub fn data_lines(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .collect()
}

/// A line is a header when its first column is a known column title
pub fn is_header(line: &str) -> bool {
    let first = line.split(',').next().unwrap_or("").trim().trim_matches('"');
    HEADER_FIELDS.iter().any(|h| first.eq_ignore_ascii_case(h))
}

/// Parse `name[,suffix[,status[,...]]]`
///
/// A bare name defaults to `.com` and available. With a suffix column, an
/// empty/`available`/`free` status means available and anything else means
/// taken. A trailing `.suffix` on the name is stripped.
pub fn parse_line(line: &str) -> Result<CheckRecord, LineError> {
    let mut fields = line.split(',').map(|f| f.trim().trim_matches('"'));

    let raw_name = fields.next().unwrap_or("").to_lowercase();
    if raw_name.is_empty() {
        return Err(LineError::MissingName);
    }

    let (suffix, available) = match fields.next() {
        None => ("com".to_string(), true),
        Some(raw_suffix) => {
            let suffix = raw_suffix.trim_start_matches('.').to_lowercase();
            if suffix.is_empty() {
                return Err(LineError::MissingSuffix);
            }
            let status = fields.next().unwrap_or("").to_lowercase();
            let available = matches!(status.as_str(), "" | "available" | "free");
            (suffix, available)
        }
    };

    let dotted = format!(".{}", suffix);
    let name = raw_name.strip_suffix(&dotted).unwrap_or(&raw_name).to_string();

    if name.is_empty() || !is_valid_label(&name) {
        return Err(LineError::InvalidName(name));
    }
    if !is_valid_suffix(&suffix) {
        return Err(LineError::InvalidSuffix(suffix));
    }

    Ok(CheckRecord {
        name,
        suffix,
        available,
    })
}

fn is_valid_label(label: &str) -> bool {
    label
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn is_valid_suffix(suffix: &str) -> bool {
    !suffix.starts_with('.')
        && !suffix.ends_with('.')
        && suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
}
