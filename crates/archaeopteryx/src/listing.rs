//! Directory listings.
//!
//! Entries are ordered by three stable sort passes, each later pass taking
//! priority over the earlier ones:
//!
//! 1. base name (name without its final `.extension`)
//! 2. extension (text after the last `.`)
//! 3. hidden entries (leading `.`) first
//!
//! The net order is: hidden entries first, then grouped by extension, then by
//! base name. Directories and files are split into two columns after sorting.

use crate::pages::html_escape;
use crate::resolver::{EntryKind, is_missing};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::cmp::Ordering;
use std::fmt::Write as _;
use std::io;
use std::path::Path;

/// Characters escaped when an entry URL is written into an `href`.
const HREF_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File name as it appears on disk
    pub name: String,
    /// File or directory
    pub kind: EntryKind,
    /// Decoded URL of the entry
    pub url: String,
}

impl DirEntry {
    /// Create an entry living under the directory served at `dir_url`.
    pub fn new(name: impl Into<String>, kind: EntryKind, dir_url: &str) -> Self {
        let name = name.into();
        let url = join_url(dir_url, &name);
        Self { name, kind, url }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }

    /// Name with its final `.extension` stripped. Empty when the name has no
    /// `.` at all.
    pub fn base_name(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((base, _)) => base,
            None => "",
        }
    }

    /// Extension sort key: text after the last `.`, or the whole name when
    /// there is no `.`.
    pub fn extension(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((_, ext)) => ext,
            None => &self.name,
        }
    }

    /// Extension shown in the listing badge; empty when the name has no `.`.
    pub fn badge(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((_, ext)) => ext,
            None => "",
        }
    }
}

/// URL of a listed directory given its decoded request path.
pub fn dir_url(decoded_path: &str) -> String {
    let trimmed = decoded_path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Join a directory URL and an entry name with exactly one `/`.
pub fn join_url(dir_url: &str, name: &str) -> String {
    format!("{}/{}", dir_url.trim_end_matches('/'), name)
}

/// Locale-style string comparison.
///
/// Case-insensitive first, lowercase before uppercase on ties, then code
/// points, so distinct strings never compare equal.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| {
            a.chars()
                .map(char::is_uppercase)
                .cmp(b.chars().map(char::is_uppercase))
        })
        .then_with(|| a.cmp(b))
}

/// Apply the listing sort passes in place.
pub fn sort_entries(entries: &mut [DirEntry]) {
    entries.sort_by(|a, b| locale_cmp(a.base_name(), b.base_name()));
    entries.sort_by(|a, b| locale_cmp(a.extension(), b.extension()));
    entries.sort_by_key(|entry| !entry.is_hidden());
}

/// Sorted listing split into its two columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub directories: Vec<DirEntry>,
    pub files: Vec<DirEntry>,
}

impl Listing {
    /// Sort `entries` and split them into directory and file columns.
    pub fn new(mut entries: Vec<DirEntry>) -> Self {
        sort_entries(&mut entries);
        let (directories, files) = entries.into_iter().partition(DirEntry::is_dir);
        Self { directories, files }
    }

    /// Render the listing page for the directory served at `dir_url`.
    pub fn render(&self, dir_url: &str) -> String {
        let title = html_escape(dir_url);
        let mut folders = String::new();
        let mut files = String::new();

        for entry in &self.directories {
            render_entry(&mut folders, entry);
        }
        for entry in &self.files {
            render_entry(&mut files, entry);
        }

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta charset="utf-8">
    <title>archaeopteryx - {title}</title>
    <style>
        :root {{
            --text: #424242;
            --background: #fff;
            --background-highlight: whitesmoke;
            --title: #4a5560;
            --accent: #f27a3a;
        }}
        @media (prefers-color-scheme: dark) {{
            :root {{
                --text: #c1c3c4;
                --background: #2b333b;
                --background-highlight: #3f4b57;
            }}
        }}
        body {{
            margin: 0;
            background: var(--background);
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Helvetica, Arial, sans-serif;
        }}
        #listing {{
            max-width: 1280px;
            margin: 0 auto;
            padding: 1rem 4rem;
        }}
        h1 {{ color: var(--title); font-size: 36px; }}
        .contents {{ display: flex; gap: 2rem; justify-content: space-evenly; }}
        .folder-contents, .file-contents {{ display: flex; flex-direction: column; gap: 0.4rem; }}
        .entry {{
            display: flex;
            justify-content: space-between;
            align-items: center;
            min-width: 10rem;
            padding: 0.7rem;
            color: var(--text);
            text-decoration: none;
            font-family: "SFMono-Regular", Consolas, Menlo, monospace;
            font-size: 14px;
            border-left: 4px solid transparent;
        }}
        .entry:hover {{ background: var(--background-highlight); border-left-color: var(--accent); }}
        .entry-name {{ word-wrap: anywhere; }}
        .entry-extension {{
            margin-left: 10px;
            padding: 0.2rem;
            opacity: 0.3;
            color: var(--background);
            background: var(--text);
        }}
        .entry-extension:empty {{ display: none; }}
    </style>
</head>
<body>
    <div id="listing">
        <h1>{title}</h1>
        <div class="contents">
            <div class="folder-contents">
{folders}            </div>
            <div class="file-contents">
{files}            </div>
        </div>
    </div>
</body>
</html>
"#
        )
    }
}

fn render_entry(out: &mut String, entry: &DirEntry) {
    let href = html_escape(&utf8_percent_encode(&entry.url, HREF_ENCODE_SET).to_string());
    let (class, suffix) = if entry.is_dir() {
        ("directory", "/")
    } else {
        ("file", "")
    };

    // Writing into a String cannot fail
    let _ = writeln!(
        out,
        r#"                <a class="entry {class}" href="{href}"><span class="entry-name">{name}{suffix}</span><span class="entry-extension">{badge}</span></a>"#,
        name = html_escape(&entry.name),
        badge = html_escape(entry.badge()),
    );
}

/// Read the entries of `dir`, which is served at `dir_url`.
///
/// Symlinks are classified by their target; broken links are listed as files.
/// Entries removed while the directory is being read are left out.
pub async fn read_entries(dir: &Path, dir_url: &str) -> io::Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        let Some(kind) = entry_kind(&path, entry.file_type().await).await? else {
            tracing::debug!("{} vanished while listing", path.display());
            continue;
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push(DirEntry::new(name, kind, dir_url));
    }

    Ok(entries)
}

/// Kind of the entry at `path` given its `file_type` lookup. `None` when the
/// entry no longer exists.
async fn entry_kind(
    path: &Path,
    file_type: io::Result<std::fs::FileType>,
) -> io::Result<Option<EntryKind>> {
    let file_type = match file_type {
        Ok(file_type) => file_type,
        Err(e) if is_missing(&e) => return Ok(None),
        Err(e) => return Err(e),
    };

    let is_dir = if file_type.is_symlink() {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    } else {
        file_type.is_dir()
    };

    Ok(Some(if is_dir {
        EntryKind::Directory
    } else {
        EntryKind::File
    }))
}
