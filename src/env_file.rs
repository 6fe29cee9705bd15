use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::credentials::CredentialSet;
use crate::error::{CredsyncError, Result};

/// A single line of a destination `.env` file.
#[derive(Debug, PartialEq)]
pub enum FileLine {
    /// A `#` comment, kept byte-for-byte.
    Comment(String),
    /// An empty or whitespace-only line, kept byte-for-byte.
    Blank(String),
    /// Anything else. `key` is the trimmed text before the first `=`
    /// (the whole trimmed line when there is no `=`), `raw` is the original line.
    KeyValue { key: String, raw: String },
}

impl FileLine {
    pub fn raw(&self) -> &str {
        match self {
            FileLine::Comment(raw) | FileLine::Blank(raw) => raw,
            FileLine::KeyValue { raw, .. } => raw,
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, FileLine::Blank(_))
    }

    fn raw_mut(&mut self) -> &mut String {
        match self {
            FileLine::Comment(raw) | FileLine::Blank(raw) => raw,
            FileLine::KeyValue { raw, .. } => raw,
        }
    }
}

/// Outcome of merging credentials into one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub changed: bool,
    /// Keys whose existing line was rewritten.
    pub updated: usize,
    /// Keys appended because the file did not have them yet.
    pub appended: usize,
}

/// Split file content into classified lines.
///
/// A final line terminator does not produce a trailing blank line; the
/// caller tracks it separately so the file's ending survives a rewrite.
pub fn parse(content: &str) -> Vec<FileLine> {
    if content.is_empty() {
        return Vec::new();
    }
    let body = content.strip_suffix('\n').unwrap_or(content);
    body.split('\n').map(parse_line).collect()
}

fn uses_crlf(content: &str) -> bool {
    content
        .split_once('\n')
        .is_some_and(|(first, _)| first.ends_with('\r'))
}

fn parse_line(line: &str) -> FileLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return FileLine::Blank(line.to_string());
    }
    if trimmed.starts_with('#') {
        return FileLine::Comment(line.to_string());
    }
    let key = match line.find('=') {
        Some(eq_pos) => line[..eq_pos].trim(),
        None => trimmed,
    };
    FileLine::KeyValue {
        key: key.to_string(),
        raw: line.to_string(),
    }
}

/// Merge `credentials` into `content` and return the new text with counts.
///
/// Lines whose key is in `credentials` are rewritten as `KEY=value`. Only the
/// first line for a given key is rewritten; later duplicates are left as they
/// are. Every other line is kept verbatim and in order. Keys the content did
/// not have are appended after a single blank separator line.
///
/// A file whose first line ends in `\r\n` keeps CRLF endings: rewritten lines
/// keep their `\r` and appended lines get one.
pub fn merge(content: &str, credentials: &CredentialSet) -> (String, MergeResult) {
    let cr = if uses_crlf(content) { "\r" } else { "" };
    let mut lines = parse(content);
    let mut seen: HashSet<&str> = HashSet::new();
    let mut updated = 0usize;

    for line in lines.iter_mut() {
        let FileLine::KeyValue { key, .. } = &*line else {
            continue;
        };
        let Some((cred_key, value)) = credentials.iter().find(|(k, _)| *k == key.as_str())
        else {
            continue;
        };
        if !seen.insert(cred_key) {
            continue;
        }
        let line_cr = if line.raw().ends_with('\r') { "\r" } else { "" };
        let new_raw = format!("{}={}{}", cred_key, value, line_cr);
        if line.raw() != new_raw {
            updated += 1;
        }
        *line = FileLine::KeyValue {
            key: cred_key.to_string(),
            raw: new_raw,
        };
    }

    let missing: Vec<(&str, &str)> = credentials
        .iter()
        .filter(|(k, _)| !seen.contains(k))
        .collect();

    let mut trailing_newline = content.ends_with('\n');
    if !missing.is_empty() {
        if !trailing_newline {
            if let Some(last) = lines.last_mut().filter(|l| !l.raw().ends_with('\r')) {
                last.raw_mut().push_str(cr);
            }
        }
        if lines.last().is_some_and(|l| !l.is_blank()) {
            lines.push(FileLine::Blank(cr.to_string()));
        }
        for (key, value) in &missing {
            lines.push(FileLine::KeyValue {
                key: key.to_string(),
                raw: format!("{}={}{}", key, value, cr),
            });
        }
        trailing_newline = true;
    }

    let mut output = lines
        .iter()
        .map(FileLine::raw)
        .collect::<Vec<_>>()
        .join("\n");
    if trailing_newline {
        output.push('\n');
    }

    let changed = output != content;
    (
        output,
        MergeResult {
            changed,
            updated,
            appended: missing.len(),
        },
    )
}

/// Merge `credentials` into the file at `path`, creating it (and its parent
/// directories) if needed. The file is only rewritten when its content changes.
pub fn merge_into_file(path: &Path, credentials: &CredentialSet) -> Result<MergeResult> {
    if path.as_os_str().is_empty() {
        return Err(CredsyncError::PathRequired);
    }
    credentials.validate()?;

    if credentials.is_empty() {
        return Ok(MergeResult {
            changed: false,
            updated: 0,
            appended: 0,
        });
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let existing = match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };
    let original = existing.as_deref().unwrap_or("");

    let (output, result) = merge(original, credentials);
    let result = MergeResult {
        changed: result.changed || existing.is_none(),
        ..result
    };

    if result.changed {
        write_atomic(path, &output)?;
    }
    debug!(
        path = %path.display(),
        changed = result.changed,
        updated = result.updated,
        appended = result.appended,
        "merged credentials into file"
    );
    Ok(result)
}

/// Write to a temp file beside `path`, fsync, then rename over it. An existing
/// file's permissions are carried over to the replacement.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_owned();
    tmp_name.push(format!(".tmp.{}", rand::random::<u64>()));
    let tmp = path.with_file_name(tmp_name);

    let permissions = std::fs::metadata(path).ok().map(|m| m.permissions());
    {
        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(content.as_bytes())?;
        f.sync_all()?;
    }
    if let Some(permissions) = permissions {
        std::fs::set_permissions(&tmp, permissions)?;
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn creds(pairs: &[(&str, &str)]) -> CredentialSet {
        let mut set = CredentialSet::new();
        for (k, v) in pairs {
            set.insert(*k, *v);
        }
        set
    }

    #[test]
    fn test_merge_keeps_crlf_endings() {
        let content = "# app\r\nPORT=3000\r\nAWS_ACCESS_KEY_ID=old\r\n";
        let creds = creds(&[("AWS_ACCESS_KEY_ID", "new"), ("AWS_SECRET_ACCESS_KEY", "s")]);

        let (output, result) = merge(content, &creds);
        assert_eq!(
            output,
            "# app\r\nPORT=3000\r\nAWS_ACCESS_KEY_ID=new\r\n\r\nAWS_SECRET_ACCESS_KEY=s\r\n"
        );
        assert_eq!(result.updated, 1);
        assert_eq!(result.appended, 1);
        assert!(!output.replace("\r\n", "").contains('\n'));

        let (again, result) = merge(&output, &creds);
        assert_eq!(again, output);
        assert!(!result.changed);
    }

    #[test]
    fn test_merge_crlf_without_final_newline() {
        let content = "PORT=3000\r\nAWS_ACCESS_KEY_ID=old";
        let creds = creds(&[("AWS_ACCESS_KEY_ID", "new"), ("AWS_SECRET_ACCESS_KEY", "s")]);

        let (output, _) = merge(content, &creds);
        assert_eq!(
            output,
            "PORT=3000\r\nAWS_ACCESS_KEY_ID=new\r\n\r\nAWS_SECRET_ACCESS_KEY=s\r\n"
        );
    }

    #[test]
    fn test_parse_classifies_lines() {
        let lines = parse("# comment\n\nPORT=3000\n  \nNOEQUALS\n");
        assert_eq!(
            lines,
            vec![
                FileLine::Comment("# comment".into()),
                FileLine::Blank("".into()),
                FileLine::KeyValue {
                    key: "PORT".into(),
                    raw: "PORT=3000".into()
                },
                FileLine::Blank("  ".into()),
                FileLine::KeyValue {
                    key: "NOEQUALS".into(),
                    raw: "NOEQUALS".into()
                },
            ]
        );
    }

    #[test]
    fn test_parse_empty_content_produces_no_lines() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn test_parse_single_newline_is_one_blank_line() {
        assert_eq!(parse("\n"), vec![FileLine::Blank("".into())]);
    }

    #[test]
    fn test_indented_comment_is_comment() {
        assert_eq!(
            parse("   # note"),
            vec![FileLine::Comment("   # note".into())]
        );
    }

    #[test]
    fn test_merge_replaces_value_and_keeps_other_lines() {
        let content = "# app settings\nPORT=3000\nAWS_ACCESS_KEY_ID=old\n\n# trailing\nDEBUG=true\n";
        let (out, result) = merge(content, &creds(&[("AWS_ACCESS_KEY_ID", "new")]));
        assert_eq!(
            out,
            "# app settings\nPORT=3000\nAWS_ACCESS_KEY_ID=new\n\n# trailing\nDEBUG=true\n"
        );
        assert!(result.changed);
        assert_eq!(result.updated, 1);
        assert_eq!(result.appended, 0);
        assert_eq!(out.matches("AWS_ACCESS_KEY_ID=").count(), 1);
    }

    #[test]
    fn test_merge_matches_trimmed_key() {
        let (out, _) = merge("  AWS_ACCESS_KEY_ID = old\n", &creds(&[("AWS_ACCESS_KEY_ID", "new")]));
        assert_eq!(out, "AWS_ACCESS_KEY_ID=new\n");
    }

    #[test]
    fn test_merge_appends_missing_keys_after_separator() {
        let content = "PORT=3000\n";
        let (out, result) = merge(
            content,
            &creds(&[("AWS_ACCESS_KEY_ID", "id"), ("AWS_SECRET_ACCESS_KEY", "sk")]),
        );
        assert_eq!(
            out,
            "PORT=3000\n\nAWS_ACCESS_KEY_ID=id\nAWS_SECRET_ACCESS_KEY=sk\n"
        );
        assert_eq!(result.appended, 2);
    }

    #[test]
    fn test_merge_does_not_double_separator() {
        let content = "PORT=3000\n\n";
        let (out, _) = merge(content, &creds(&[("A", "1")]));
        assert_eq!(out, "PORT=3000\n\nA=1\n");
    }

    #[test]
    fn test_merge_without_trailing_newline() {
        let (out, _) = merge("PORT=3000", &creds(&[("PORT", "4000")]));
        assert_eq!(out, "PORT=4000");
    }

    #[test]
    fn test_merge_into_empty_content() {
        let (out, result) = merge("", &creds(&[("A", "1"), ("B", "2")]));
        assert_eq!(out, "A=1\nB=2\n");
        assert!(result.changed);
    }

    #[test]
    fn test_merge_value_with_equals_sign() {
        let (out, _) = merge("TOKEN=abc\n", &creds(&[("TOKEN", "a=b==")]));
        assert_eq!(out, "TOKEN=a=b==\n");
    }

    #[test]
    fn test_merge_same_values_is_unchanged() {
        let content = "# keep\nA=1\nB=2\n";
        let (out, result) = merge(content, &creds(&[("A", "1"), ("B", "2")]));
        assert_eq!(out, content);
        assert!(!result.changed);
        assert_eq!(result.updated, 0);
    }

    #[test]
    fn test_merge_duplicate_key_updates_first_occurrence_only() {
        // Later duplicates are left stale on purpose.
        let content = "A=old1\nB=x\nA=old2\n";
        let (out, _) = merge(content, &creds(&[("A", "new")]));
        assert_eq!(out, "A=new\nB=x\nA=old2\n");
    }

    #[test]
    fn test_merge_into_file_creates_file_and_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join(".env");

        let result = merge_into_file(&path, &creds(&[("A", "1")])).unwrap();
        assert!(result.changed);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "A=1\n");
    }

    #[test]
    fn test_merge_into_file_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "# header\nPORT=1\n").unwrap();
        let set = creds(&[("AWS_ACCESS_KEY_ID", "id"), ("AWS_SECRET_ACCESS_KEY", "sk")]);

        let first = merge_into_file(&path, &set).unwrap();
        let after_first = std::fs::read_to_string(&path).unwrap();
        let second = merge_into_file(&path, &set).unwrap();
        let after_second = std::fs::read_to_string(&path).unwrap();

        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn test_merge_into_file_empty_credentials_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        let content = "# untouched\nA=1\n\n";
        std::fs::write(&path, content).unwrap();

        let result = merge_into_file(&path, &CredentialSet::new()).unwrap();
        assert!(!result.changed);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn test_merge_into_file_empty_credentials_does_not_create_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.env");
        let result = merge_into_file(&path, &CredentialSet::new()).unwrap();
        assert!(!result.changed);
        assert!(!path.exists());
    }

    #[test]
    fn test_merge_into_file_empty_path_is_error() {
        let err = merge_into_file(Path::new(""), &creds(&[("A", "1")])).unwrap_err();
        assert!(matches!(err, CredsyncError::PathRequired));
    }

    #[test]
    fn test_merge_into_file_invalid_credentials_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        let err = merge_into_file(&path, &creds(&[("A", "x\ny")])).unwrap_err();
        assert!(matches!(err, CredsyncError::InvalidCredentials(_)));
        assert!(!path.exists());
    }

    #[test]
    fn test_merge_into_file_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        merge_into_file(&path, &creds(&[("A", "1")])).unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_merge_into_file_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "A=1\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();

        merge_into_file(&path, &creds(&[("A", "2")])).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
