//! Asset naming and the shared on-disk asset namespace

use crate::config::{CanonicalName, Config};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Characters escaped when a file name is put back into a URL path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// What kind of resource an asset is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Stylesheet,
    Script,
    Image,
    Video,
    Font,
    Other,
}

impl AssetKind {
    /// Guesses the kind from the file extension of a name
    pub fn from_file_name(name: &str) -> Self {
        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "css" => Self::Stylesheet,
            "js" | "mjs" => Self::Script,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "avif" | "ico" | "bmp" => {
                Self::Image
            }
            "mp4" | "webm" | "ogv" | "mov" | "m4v" => Self::Video,
            "woff" | "woff2" | "ttf" | "otf" | "eot" => Self::Font,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stylesheet => "stylesheet",
            Self::Script => "script",
            Self::Image => "image",
            Self::Video => "video",
            Self::Font => "font",
            Self::Other => "other",
        }
    }
}

/// A non-document resource referenced by a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub source_url: Url,
    pub kind: AssetKind,
    /// Name inside the assets directory; a pure function of the URL path
    pub file_name: String,
    pub fetched: bool,
}

/// The flat, shared directory every asset is written to
///
/// Two URLs with the same basename map to the same file. Whichever is fetched
/// first wins and later ones are skipped because the file already exists.
#[derive(Debug, Clone)]
pub struct AssetStore {
    dir: PathBuf,
    /// `{mirror-origin}/{assets-dir}/`
    url_prefix: String,
    canonical_names: Vec<CanonicalName>,
}

impl AssetStore {
    pub fn new(config: &Config) -> Self {
        Self {
            dir: config.output.assets_path(),
            url_prefix: format!(
                "{}/{}/",
                config.site.mirror_origin_trimmed(),
                config.output.assets_dir
            ),
            canonical_names: config.assets.canonical_names.clone(),
        }
    }

    /// Creates the assets directory if it is missing
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    /// Names an asset after its URL
    ///
    /// Returns `None` when the URL path has no usable last segment.
    pub fn asset_for(&self, url: &Url, kind: AssetKind) -> Option<Asset> {
        let file_name = self.file_name_for(url)?;
        Some(Asset {
            source_url: url.clone(),
            kind,
            file_name,
            fetched: false,
        })
    }

    /// Canonical basename of a URL: the decoded last path segment, or the
    /// fixed name of the first canonical prefix it starts with
    ///
    /// A segment that decodes to anything but a single plain file name
    /// (`%2F`, `..`, NUL, backslash) has no basename.
    pub fn file_name_for(&self, url: &Url) -> Option<String> {
        let segment = url.path().rsplit('/').next()?;
        let decoded = percent_decode_str(segment).decode_utf8().ok()?;
        let basename = decoded.trim();

        if !is_plain_file_name(basename) {
            return None;
        }

        let name = self
            .canonical_names
            .iter()
            .find(|canonical| basename.starts_with(&canonical.prefix))
            .map(|canonical| canonical.name.clone())
            .unwrap_or_else(|| basename.to_string());

        Some(name)
    }

    /// Basename of a URL, or a digest of the URL when it has none
    pub fn file_name_or_digest(&self, url: &Url) -> String {
        self.file_name_for(url).unwrap_or_else(|| digest_name(url.as_str()))
    }

    pub fn local_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// URL under which the mirror serves an asset
    pub fn mirror_url(&self, file_name: &str) -> String {
        format!(
            "{}{}",
            self.url_prefix,
            utf8_percent_encode(file_name, SEGMENT)
        )
    }

    /// Returns true if the reference already points into the mirror's assets
    pub fn is_mirror_asset_url(&self, reference: &str) -> bool {
        reference.starts_with(&self.url_prefix)
    }
}

/// Stable file name derived from a reference that has no usable basename
pub fn digest_name(reference: &str) -> String {
    let digest = hex::encode(Sha256::digest(reference.as_bytes()));
    format!("asset-{}", &digest[..16])
}

fn is_plain_file_name(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return false;
    }

    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
