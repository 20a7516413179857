//! # Dependency References
//!
//! A reference is the content of a pointer file: the location of a dependency
//! plus an optional revision. Three grammars are recognized:
//!
//! - **Local**: a bare relative path such as `libs/driver` or `driver#feature`.
//!   Used for checkouts that were never published to a remote.
//! - **Snapshot**: an HTTP(S) URL ending in `/builds/<rev>`, naming an immutable
//!   pre-built archive rather than a live repository.
//! - **Remote**: any other URL or absolute path, with an optional `#<rev>`
//!   suffix, e.g. `https://github.com/org/driver/#3f2a9c1`.
//!
//! Parsing never touches the filesystem. A parsed `Reference` renders back to
//! its canonical pointer-file form with [`Reference::render`]; remote URLs are
//! rendered in `https` form so that the same dependency always produces the
//! same pointer file regardless of how it was cloned.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// Reference to a local (unpublished) checkout: `dir[#rev]`
static LOCAL_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([\w.+-][\w./+-]*?)/?(?:#(.*))?$").unwrap());

/// Reference to a repository: `url[#rev]`
static URL_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*/([\w.+-]+)(?:\.\w+)?)/?(?:#(.*))?$").unwrap());

/// Reference to a pre-built snapshot: `http(s)://host/path/builds[/rev]`
static BUILD_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?://[^#\s]*?/([\w.+-]+))/builds/?([\w-]{6,40}|tip)?/?$").unwrap()
});

/// Git URL without revision, in scp-like or scheme form. The path may not
/// start with a slash, so `scheme://` is never read as an scp host.
pub(crate) static GIT_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(git://|ssh://|https?://|)(([^/:@]+)(:([^/:@]+))?@)?([^/:]+)[:/]([^/].*?)(\.git|/?)$")
        .unwrap()
});

/// Mercurial URL without revision
pub(crate) static HG_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(file|ssh|https?)://([^/:]+)/([^/]+)/?([^/]+?)?$").unwrap());

static PINNED_REV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[a-fA-F0-9]{6,40}|[0-9]+)$").unwrap());

static REV_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.+/-]+$").unwrap());

/// Which grammar a reference was parsed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Local,
    Remote,
    Snapshot,
}

/// Rendering of a repository URL for a given transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UrlFormat {
    /// Leave the URL as written.
    #[default]
    Default,
    Https,
    Http,
    Ssh,
}

impl FromStr for UrlFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "default" | "git" => Ok(UrlFormat::Default),
            "https" => Ok(UrlFormat::Https),
            "http" => Ok(UrlFormat::Http),
            "ssh" => Ok(UrlFormat::Ssh),
            other => Err(Error::Config {
                message: format!(
                    "unsupported protocol \"{}\" (expected https, http, ssh or git)",
                    other
                ),
            }),
        }
    }
}

/// Rewrite a repository URL for the requested transport.
///
/// URLs that are neither Git nor Mercurial style (local paths, for instance)
/// are returned unchanged, as is every URL when `format` is `Default`.
pub fn format_url(url: &str, format: UrlFormat) -> String {
    if format == UrlFormat::Default {
        return url.to_string();
    }

    if let Some(m) = GIT_URL.captures(url) {
        let auth = m.get(2).map(|g| g.as_str()).unwrap_or("");
        let user = m.get(3).map(|g| g.as_str()).unwrap_or("");
        let has_password = m.get(5).is_some();
        let host = &m[6];
        let path = &m[7];
        // A bare "git@" login only makes sense over ssh
        let http_auth = if !auth.is_empty() && (has_password || user != "git") {
            auth
        } else {
            ""
        };
        return match format {
            UrlFormat::Ssh => format!(
                "ssh://{}{}/{}.git",
                if auth.is_empty() { "git@" } else { auth },
                host,
                path
            ),
            UrlFormat::Http => format!("http://{}{}/{}", http_auth, host, path),
            UrlFormat::Https => format!("https://{}{}/{}", http_auth, host, path),
            UrlFormat::Default => url.to_string(),
        };
    }

    if let Some(m) = HG_URL.captures(url) {
        let host = &m[2];
        let path = match m.get(4) {
            Some(rest) => format!("{}/{}", &m[3], rest.as_str()),
            None => m[3].to_string(),
        };
        return match format {
            UrlFormat::Ssh => format!("ssh://{}/{}", host, path),
            UrlFormat::Http => format!("http://{}/{}", host, path),
            UrlFormat::Https => format!("https://{}/{}", host, path),
            UrlFormat::Default => url.to_string(),
        };
    }

    url.to_string()
}

/// Compare two repository URLs after normalizing both to `https` form.
pub fn same_url(a: &str, b: &str) -> bool {
    format_url(a, UrlFormat::Https).trim_end_matches('/')
        == format_url(b, UrlFormat::Https).trim_end_matches('/')
}

/// How an update target is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionKind<'a> {
    /// No revision: follow the current branch.
    Latest,
    /// A hexadecimal or numeric revision id.
    Pinned(&'a str),
    /// A branch or tag name.
    Branch(&'a str),
}

impl<'a> RevisionKind<'a> {
    pub fn of(rev: Option<&'a str>) -> Self {
        match rev {
            None | Some("") => RevisionKind::Latest,
            Some(r) if PINNED_REV.is_match(r) => RevisionKind::Pinned(r),
            Some(r) => RevisionKind::Branch(r),
        }
    }

    pub fn is_pinned(&self) -> bool {
        matches!(self, RevisionKind::Pinned(_))
    }
}

impl fmt::Display for RevisionKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionKind::Latest => write!(f, "latest revision in the current branch"),
            RevisionKind::Pinned(rev) => write!(f, "rev #{}", short_rev(rev)),
            RevisionKind::Branch(name) => write!(f, "branch {}", name),
        }
    }
}

/// First twelve characters of a revision, for display.
pub fn short_rev(rev: &str) -> &str {
    match rev.char_indices().nth(12) {
        Some((idx, _)) => &rev[..idx],
        None => rev,
    }
}

/// A parsed dependency pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub kind: ReferenceKind,
    /// Repository location. For local references this is the relative path.
    pub url: String,
    pub rev: Option<String>,
    /// Default directory name of the dependency.
    pub name: String,
}

impl Reference {
    /// Parse a raw pointer string.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().replace('\\', "/");
        let invalid = |message: &str| Error::InvalidReference {
            reference: raw.trim().to_string(),
            message: message.to_string(),
        };

        if normalized.is_empty() {
            return Err(invalid("empty reference"));
        }

        if let Some(m) = LOCAL_REF.captures(&normalized) {
            let url = m[1].to_string();
            let name = basename(&url).to_string();
            if name.is_empty() || name == "." || name == ".." {
                return Err(invalid("local reference does not name a directory"));
            }
            return Ok(Reference {
                kind: ReferenceKind::Local,
                name,
                url,
                rev: non_empty(m.get(2).map(|g| g.as_str())),
            });
        }

        if let Some(m) = BUILD_URL.captures(&normalized) {
            return Ok(Reference {
                kind: ReferenceKind::Snapshot,
                url: format!("{}/builds", &m[1]),
                rev: non_empty(m.get(3).map(|g| g.as_str())),
                name: m[2].to_string(),
            });
        }

        if let Some(m) = URL_REF.captures(&normalized) {
            let rev = non_empty(m.get(3).map(|g| g.as_str()));
            if let Some(rev) = &rev {
                if !REV_TOKEN.is_match(rev) {
                    return Err(invalid(&format!("invalid revision \"{}\"", rev)));
                }
            }
            let name = m[2].strip_suffix(".git").unwrap_or(&m[2]).to_string();
            return Ok(Reference {
                kind: ReferenceKind::Remote,
                url: m[1].trim_end_matches('/').to_string(),
                rev,
                name,
            });
        }

        Err(invalid("not a local path, repository URL or snapshot URL"))
    }

    /// Build a reference from already-resolved parts.
    pub fn from_parts(kind: ReferenceKind, url: &str, rev: Option<&str>, name: &str) -> Self {
        Reference {
            kind,
            url: url.to_string(),
            rev: non_empty(rev),
            name: name.to_string(),
        }
    }

    /// Whether the string looks like a repository URL at all.
    pub fn is_url(raw: &str) -> bool {
        URL_REF.is_match(&raw.trim().replace('\\', "/"))
    }

    pub fn is_local(&self) -> bool {
        self.kind == ReferenceKind::Local
    }

    pub fn is_snapshot(&self) -> bool {
        self.kind == ReferenceKind::Snapshot
    }

    pub fn revision_kind(&self) -> RevisionKind<'_> {
        RevisionKind::of(self.rev.as_deref())
    }

    /// The URL rendered for the given transport.
    pub fn url_as(&self, format: UrlFormat) -> String {
        format_url(&self.url, format)
    }

    /// The reference as written to a pointer file.
    pub fn render(&self) -> String {
        let url = match self.kind {
            ReferenceKind::Remote => format_url(&self.url, UrlFormat::Https),
            ReferenceKind::Local | ReferenceKind::Snapshot => self.url.clone(),
        };
        let mut out = format!("{}/", url.trim_end_matches('/'));
        if let Some(rev) = &self.rev {
            if self.kind != ReferenceKind::Snapshot {
                out.push('#');
            }
            out.push_str(rev);
        }
        out
    }
}

impl FromStr for Reference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Reference::parse(s)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// The location part of a `url[#rev]` string.
pub(crate) fn location(raw: &str) -> Option<String> {
    URL_REF
        .captures(&raw.trim().replace('\\', "/"))
        .map(|m| m[1].to_string())
}

pub(crate) fn is_snapshot_url(raw: &str) -> bool {
    BUILD_URL.is_match(&raw.trim().replace('\\', "/"))
}

fn basename(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}
