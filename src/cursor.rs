//! Link cursor: which favorites still need processing
//!
//! Links are read from the export document, canonicalized, reversed into
//! oldest-first order and sliced after the persisted cursor. The last link of a
//! non-empty batch is written back as the new cursor before anything is
//! downloaded, so the cursor means "claimed", not "archived".

use crate::config::HostAlias;
use crate::error::{Error, Result};
use crate::types::ExportedLink;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Keys leading from the document root to the favorites list
const FAVORITES_PATH: [&str; 3] = ["Activity", "Favorite Videos", "FavoriteVideoList"];

/// Field of a favorites record holding the post link
const LINK_FIELD: &str = "Link";

/// Why no links are pending
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmptyReason {
    /// The export file does not exist or cannot be read
    ExportUnreadable(String),
    /// The export file is not valid JSON
    ExportMalformed(String),
    /// The export contains no links
    NoFavorites,
    /// Every link is at or before the cursor
    UpToDate,
}

impl std::fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmptyReason::ExportUnreadable(e) => write!(f, "export file unreadable: {e}"),
            EmptyReason::ExportMalformed(e) => write!(f, "export file malformed: {e}"),
            EmptyReason::NoFavorites => f.write_str("export contains no favorite links"),
            EmptyReason::UpToDate => f.write_str("no links after the saved cursor"),
        }
    }
}

/// Links pending for this run, or why there are none
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingLinks {
    /// Oldest-first links still to process (never empty)
    Ready(Vec<ExportedLink>),
    /// Nothing to do
    Empty(EmptyReason),
}

impl PendingLinks {
    /// The links, or an empty vector
    pub fn into_links(self) -> Vec<ExportedLink> {
        match self {
            PendingLinks::Ready(links) => links,
            PendingLinks::Empty(_) => Vec::new(),
        }
    }
}

/// Rewrite a link's host according to `aliases`
///
/// A host equal to an alias's `from`, or ending in `.{from}`, has that suffix
/// replaced by `to`. Links that do not parse as URLs are returned unchanged.
pub fn canonicalize(raw: &str, aliases: &[HostAlias]) -> String {
    let trimmed = raw.trim();
    let Ok(mut url) = url::Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
        return trimmed.to_string();
    };

    for alias in aliases {
        let from = alias.from.to_ascii_lowercase();
        let rewritten = if host == from {
            Some(alias.to.clone())
        } else {
            host.strip_suffix(&format!(".{from}"))
                .map(|prefix| format!("{prefix}.{}", alias.to))
        };
        if let Some(new_host) = rewritten {
            if url.set_host(Some(&new_host)).is_ok() {
                return url.to_string();
            }
            return trimmed.to_string();
        }
    }
    url.to_string()
}

/// Pull favorite links out of an export document, in document order
///
/// Records without a string link field are skipped.
pub fn extract_links(document: &serde_json::Value, aliases: &[HostAlias]) -> Vec<ExportedLink> {
    let mut node = document;
    for key in FAVORITES_PATH {
        match node.get(key) {
            Some(child) => node = child,
            None => return Vec::new(),
        }
    }

    let Some(records) = node.as_array() else {
        return Vec::new();
    };

    records
        .iter()
        .filter_map(|record| record.get(LINK_FIELD).and_then(|link| link.as_str()))
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| ExportedLink {
            raw: raw.to_string(),
            canonical: canonicalize(raw, aliases),
        })
        .collect()
}

/// Links strictly after `cursor`, or all of them if the cursor is not found
///
/// Returns the slice and whether the cursor was matched.
pub fn links_after<'a>(
    ordered: &'a [ExportedLink],
    cursor: Option<&str>,
) -> (&'a [ExportedLink], bool) {
    let Some(cursor) = cursor else {
        return (ordered, false);
    };
    match ordered.iter().position(|link| link.canonical == cursor) {
        Some(index) => (&ordered[index + 1..], true),
        None => (ordered, false),
    }
}

/// Persisted cursor value
#[derive(Clone, Debug)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    /// Store backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the cursor file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved cursor; `None` when absent, empty or unreadable
    pub fn load(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let value = contents.trim();
                (!value.is_empty()).then(|| value.to_string())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "cannot read cursor file, treating as first run");
                None
            }
        }
    }

    /// Write the cursor
    pub fn save(&self, link: &str) -> Result<()> {
        std::fs::write(&self.path, link).map_err(Error::Io)
    }
}

/// Produces the pending links for a run and advances the cursor
#[derive(Clone, Debug)]
pub struct LinkCursor {
    export_file: PathBuf,
    store: CursorStore,
    aliases: Vec<HostAlias>,
}

impl LinkCursor {
    /// Cursor over `export_file`, persisting progress in `store`
    pub fn new(export_file: impl Into<PathBuf>, store: CursorStore, aliases: Vec<HostAlias>) -> Self {
        Self {
            export_file: export_file.into(),
            store,
            aliases,
        }
    }

    /// The cursor file store
    pub fn store(&self) -> &CursorStore {
        &self.store
    }

    /// All links in the export, oldest first
    ///
    /// The export lists favorites newest first; the order is reversed here.
    pub fn ordered_links(&self) -> std::result::Result<Vec<ExportedLink>, EmptyReason> {
        let raw = std::fs::read_to_string(&self.export_file)
            .map_err(|e| EmptyReason::ExportUnreadable(e.to_string()))?;
        let document: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| EmptyReason::ExportMalformed(e.to_string()))?;

        let mut links = extract_links(&document, &self.aliases);
        links.reverse();
        Ok(links)
    }

    /// Pending links without touching the cursor file
    pub fn peek(&self) -> PendingLinks {
        let ordered = match self.ordered_links() {
            Ok(links) if links.is_empty() => return PendingLinks::Empty(EmptyReason::NoFavorites),
            Ok(links) => links,
            Err(reason) => return PendingLinks::Empty(reason),
        };

        let cursor = self.store.load();
        let (pending, matched) = links_after(&ordered, cursor.as_deref());
        if let Some(cursor) = &cursor
            && !matched
        {
            warn!(
                cursor = %cursor,
                "saved cursor not found in export, falling back to full reprocessing"
            );
        }

        if pending.is_empty() {
            PendingLinks::Empty(EmptyReason::UpToDate)
        } else {
            debug!(
                total = ordered.len(),
                pending = pending.len(),
                resumed = matched,
                "computed pending links"
            );
            PendingLinks::Ready(pending.to_vec())
        }
    }

    /// Pending links, claiming them by saving the last one as the new cursor
    ///
    /// Failure to write the cursor is logged and does not stop the run.
    pub fn claim(&self) -> PendingLinks {
        let pending = self.peek();
        match &pending {
            PendingLinks::Ready(links) => {
                if let Some(last) = links.last() {
                    match self.store.save(&last.canonical) {
                        Ok(()) => info!(
                            count = links.len(),
                            cursor = %last.canonical,
                            "claimed links for this run"
                        ),
                        Err(e) => error!(
                            path = ?self.store.path(),
                            error = %e,
                            "failed to write cursor file"
                        ),
                    }
                }
            }
            PendingLinks::Empty(reason)
                if matches!(reason, EmptyReason::UpToDate | EmptyReason::NoFavorites) =>
            {
                info!(reason = %reason, "no new links to process");
            }
            PendingLinks::Empty(reason) => {
                error!(path = ?self.export_file, reason = %reason, "cannot read export");
            }
        }
        pending
    }
}
