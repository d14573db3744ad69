//! Attachments and their file bytes.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::net::IpAddr;

use async_trait::async_trait;
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::Utc;
use image::{ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};
use tracing::info;
use url::{Host, Url};

use super::posts::unique_slug;
use super::site::{ATTACHMENT_TYPE, INHERIT_STATUS, TRASH_STATUS};
use super::{AttachmentFile, ContentObject, ContentStore, lenient_u64, matches_search, paginate};
use crate::error::ContentError;
use crate::sanitize;

/// Meta key holding an attachment's alt text.
pub const ALT_TEXT_META: &str = "_wp_attachment_image_alt";

const DEFAULT_PER_PAGE: u64 = 50;
const MAX_PER_PAGE: u64 = 100;

/// Base64 as senders actually produce it: padding optional.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Downloads remote files for URL uploads.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch the body at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Download`] if the file cannot be retrieved.
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, ContentError>;
}

/// Query parameters for listing media.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaQuery {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub per_page: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub page: Option<u64>,
    /// MIME type or type prefix, e.g. `image` or `image/png`. Several may
    /// be given separated by commas.
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

/// Body of an upload request. Either `file_data` (base64) or a URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaUpload {
    #[serde(default)]
    pub file_data: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    /// Accepted by the upload-from-url endpoint as an alias of `file_url`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
}

/// Body of an update request. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSize {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
}

/// An attachment as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaView {
    pub id: u64,
    pub title: String,
    pub filename: String,
    pub url: String,
    pub mime_type: String,
    pub date: String,
    pub modified: String,
    pub alt_text: String,
    pub caption: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizes: Option<BTreeMap<String, ImageSize>>,
}

/// One page of media.
#[derive(Debug, Clone, Serialize)]
pub struct MediaList {
    pub media: Vec<MediaView>,
    pub total: u64,
    pub total_pages: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Stored bytes of an attachment, for serving.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// A decoded upload on its way into the store.
struct NewAttachment {
    filename: String,
    bytes: Vec<u8>,
    title: Option<String>,
    description: String,
    caption: String,
    alt_text: String,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// MIME type of an allowed upload, by file extension.
///
/// `None` for extensions that may not be uploaded, including markup and
/// script formats that a browser would run from the uploads route.
#[must_use]
pub fn mime_for(filename: &str) -> Option<&'static str> {
    let (_, ext) = filename.rsplit_once('.')?;
    let mime = match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",
        "tif" | "tiff" => "image/tiff",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "txt" => "text/plain",
        "csv" => "text/csv",
        _ => return None,
    };
    Some(mime)
}

/// Extension for a file name that has none, guessed from image magic bytes.
fn sniffed_extension(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("png"),
        ImageFormat::Jpeg => Some("jpg"),
        ImageFormat::Gif => Some("gif"),
        ImageFormat::WebP => Some("webp"),
        _ => None,
    }
}

/// Pixel dimensions read from an encoded image header.
#[must_use]
pub fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Whether an address is reachable on the public internet.
///
/// Loopback, private, link-local, shared, documentation and multicast
/// ranges are not.
#[must_use]
pub fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.is_multicast()
                || a == 0
                || (a == 100 && (64..128).contains(&b))
                || a >= 240)
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_public_ip(IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
                || (first == 0x2001 && v6.segments()[1] == 0x0db8))
        }
    }
}

/// Whether a download URL names a host that may be fetched.
///
/// Only literal addresses and `localhost` are judged here. Names that
/// resolve to private addresses are refused by the fetcher.
fn is_fetchable_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(v4)) => is_public_ip(IpAddr::V4(v4)),
        Some(Host::Ipv6(v6)) => is_public_ip(IpAddr::V6(v6)),
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain != "localhost" && !domain.ends_with(".localhost")
        }
        None => false,
    }
}

/// File name without its last extension.
fn file_stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => stem,
        _ => filename,
    }
}

/// `name.ext`, or `name-1.ext`, `name-2.ext`, ... until unused.
fn unique_file_name(filename: &str, taken: &[&str]) -> String {
    if !taken.contains(&filename) {
        return filename.to_owned();
    }
    let stem = file_stem(filename);
    let ext = &filename[stem.len()..];
    (1u64..)
        .map(|n| format!("{stem}-{n}{ext}"))
        .find(|candidate| !taken.contains(&candidate.as_str()))
        .unwrap_or_else(|| filename.to_owned())
}

/// Decode base64 file data, tolerating a `data:` URL prefix and line breaks.
fn decode_file_data(raw: &str) -> Result<Vec<u8>, ContentError> {
    let payload = match raw.split_once(";base64,") {
        Some((head, data)) if head.starts_with("data:") => data,
        _ => raw,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    LENIENT_BASE64
        .decode(compact)
        .map_err(|_| ContentError::invalid("invalid_file", "Invalid base64 file data."))
}

fn media_type_matches(wanted: &str, mime: &str) -> bool {
    wanted
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .any(|t| {
            mime.eq_ignore_ascii_case(t)
                || mime
                    .get(..t.len() + 1)
                    .is_some_and(|p| p.eq_ignore_ascii_case(&format!("{t}/")))
        })
}

impl ContentStore {
    /// Public URL of an attachment's file.
    #[must_use]
    pub fn media_url(&self, media: &ContentObject) -> String {
        let filename = media
            .attachment
            .as_ref()
            .map(|a| a.filename.as_str())
            .unwrap_or_default();
        format!("{}/uploads/{}/{filename}", self.site.home_base(), media.id)
    }

    /// Size variants of an image attachment. Only the original is stored,
    /// so this is at most a `full` entry.
    pub(crate) fn image_sizes(media: &ContentObject, url: String) -> BTreeMap<String, ImageSize> {
        let mut sizes = BTreeMap::new();
        let Some(file) = media
            .attachment
            .as_ref()
            .filter(|f| f.mime_type.starts_with("image/"))
        else {
            return sizes;
        };
        if let (Some(width), Some(height)) = (file.width, file.height) {
            sizes.insert(
                "full".to_owned(),
                ImageSize {
                    url,
                    width,
                    height,
                    mime_type: file.mime_type.clone(),
                },
            );
        }
        sizes
    }

    /// Format an attachment for output.
    #[must_use]
    pub fn format_media(&self, media: &ContentObject, include_sizes: bool) -> MediaView {
        let url = self.media_url(media);
        let file = media.attachment.as_ref();
        let is_image = file.is_some_and(|f| f.mime_type.starts_with("image/"));
        let sizes = (include_sizes && is_image)
            .then(|| Self::image_sizes(media, url.clone()))
            .filter(|s| !s.is_empty());
        MediaView {
            id: media.id,
            title: media.title.clone(),
            filename: file.map(|f| f.filename.clone()).unwrap_or_default(),
            url,
            mime_type: file.map(|f| f.mime_type.clone()).unwrap_or_default(),
            date: media.date.clone(),
            modified: media.modified.clone(),
            alt_text: media.meta.get(ALT_TEXT_META).cloned().unwrap_or_default(),
            caption: media.excerpt.clone(),
            description: media.content.clone(),
            file_size: file.map(|f| f.file_size),
            width: file.filter(|_| is_image).and_then(|f| f.width),
            height: file.filter(|_| is_image).and_then(|f| f.height),
            sizes,
        }
    }

    async fn load_media(&self, id: u64) -> Result<ContentObject, ContentError> {
        self.load_object(id)
            .await?
            .filter(ContentObject::is_attachment)
            .ok_or(ContentError::NotFound { what: "media", id })
    }

    /// List attachments, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError`] if stored content cannot be read.
    pub async fn list_media(&self, query: &MediaQuery) -> Result<MediaList, ContentError> {
        let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE);
        let page = query.page.unwrap_or(1).max(1);
        let media_type =
            sanitize::sanitize_text_field(query.media_type.as_deref().unwrap_or_default());
        let search = sanitize::sanitize_text_field(query.search.as_deref().unwrap_or_default());

        let mut items: Vec<ContentObject> = self
            .all_objects()
            .await?
            .into_iter()
            .filter(|o| o.is_attachment() && o.status != TRASH_STATUS)
            .filter(|o| {
                media_type.is_empty()
                    || o.attachment
                        .as_ref()
                        .is_some_and(|f| media_type_matches(&media_type, &f.mime_type))
            })
            .filter(|o| {
                let filename = o
                    .attachment
                    .as_ref()
                    .map(|f| f.filename.as_str())
                    .unwrap_or_default();
                search.is_empty()
                    || matches_search(&search, &[&o.title, &o.content, &o.excerpt, filename])
            })
            .collect();
        items.sort_by(|a, b| b.date_gmt.cmp(&a.date_gmt).then(b.id.cmp(&a.id)));

        let (page_items, total, total_pages) =
            paginate(items, page, per_page.clamp(1, MAX_PER_PAGE));
        Ok(MediaList {
            media: page_items.iter().map(|m| self.format_media(m, false)).collect(),
            total,
            total_pages,
            page,
            per_page,
        })
    }

    /// Fetch one attachment with its size variants.
    ///
    /// # Errors
    ///
    /// `not_found` (404) unless `id` names an attachment.
    pub async fn get_media(&self, id: u64) -> Result<MediaView, ContentError> {
        let media = self.load_media(id).await?;
        Ok(self.format_media(&media, true))
    }

    /// Store an upload given as base64 `file_data`, or download `file_url`.
    ///
    /// # Errors
    ///
    /// `missing_file`, `invalid_file` or `invalid_file_type` (400) for bad
    /// input, plus anything [`Self::upload_from_url`] returns.
    pub async fn upload_media(
        &self,
        input: &MediaUpload,
        fetcher: &dyn MediaFetcher,
    ) -> Result<MediaView, ContentError> {
        let file_data = non_empty(input.file_data.as_deref());
        if non_empty(input.file_url.as_deref()).is_some() {
            return self.upload_from_url(input, fetcher).await;
        }
        let Some(file_data) = file_data else {
            return Err(ContentError::invalid(
                "missing_file",
                "File data or URL is required.",
            ));
        };
        let bytes = decode_file_data(file_data)?;

        let mut filename =
            sanitize::sanitize_file_name(input.filename.as_deref().unwrap_or_default());
        if filename.is_empty() {
            filename = format!("upload-{}", Utc::now().timestamp());
        }
        let text = |v: Option<&str>| sanitize::sanitize_textarea_field(v.unwrap_or_default());
        self.insert_attachment(NewAttachment {
            filename,
            bytes,
            title: input.title.as_deref().map(sanitize::sanitize_text_field),
            description: text(input.description.as_deref()),
            caption: text(input.caption.as_deref()),
            alt_text: sanitize::sanitize_text_field(input.alt_text.as_deref().unwrap_or_default()),
        })
        .await
    }

    /// Download `file_url` (or `url`) and store it as an attachment.
    ///
    /// # Errors
    ///
    /// `missing_url` (400) without a usable http(s) URL; `download_error`
    /// (500) if the host is not public or the fetch fails;
    /// `invalid_file_type` (400) if the file type is not allowed.
    pub async fn upload_from_url(
        &self,
        input: &MediaUpload,
        fetcher: &dyn MediaFetcher,
    ) -> Result<MediaView, ContentError> {
        let url = non_empty(input.file_url.as_deref())
            .or_else(|| non_empty(input.url.as_deref()))
            .and_then(|raw| Url::parse(raw.trim()).ok())
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| ContentError::invalid("missing_url", "URL is required."))?;
        if !is_fetchable_host(&url) {
            return Err(ContentError::Download {
                reason: format!("{} is not a public address", url.host_str().unwrap_or_default()),
            });
        }

        let bytes = fetcher.fetch(&url).await?;

        let requested = match input.filename.as_deref() {
            Some(name) => name,
            None => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .unwrap_or_default(),
        };
        let mut filename = sanitize::sanitize_file_name(requested);
        if filename.is_empty() {
            filename = format!("upload-{}.jpg", Utc::now().timestamp());
        }

        let text = |v: Option<&str>| {
            non_empty(v)
                .map(sanitize::sanitize_textarea_field)
                .unwrap_or_default()
        };
        self.insert_attachment(NewAttachment {
            filename,
            bytes,
            title: non_empty(input.title.as_deref()).map(sanitize::sanitize_text_field),
            description: text(input.description.as_deref()),
            caption: text(input.caption.as_deref()),
            alt_text: sanitize::sanitize_text_field(input.alt_text.as_deref().unwrap_or_default()),
        })
        .await
    }

    async fn insert_attachment(&self, mut new: NewAttachment) -> Result<MediaView, ContentError> {
        if !new.filename.contains('.') {
            if let Some(ext) = sniffed_extension(&new.bytes) {
                new.filename = format!("{}.{ext}", new.filename);
            }
        }
        let mime_type = mime_for(&new.filename).ok_or_else(|| {
            ContentError::invalid(
                "invalid_file_type",
                "Sorry, this file type is not permitted for security reasons.",
            )
        })?;
        let dimensions = if mime_type.starts_with("image/") {
            image_dimensions(&new.bytes)
        } else {
            None
        };
        let file_size = new.bytes.len() as u64;
        let author = self.default_author().map_or(0, |u| u.id);

        let guard = self.write_lock.lock().await;
        let objects = self.all_objects().await?;
        let taken: Vec<&str> = objects
            .iter()
            .filter_map(|o| o.attachment.as_ref())
            .map(|f| f.filename.as_str())
            .collect();
        let filename = unique_file_name(&new.filename, &taken);
        let stem = file_stem(&filename).to_owned();
        let title = new.title.filter(|t| !t.is_empty()).unwrap_or_else(|| stem.clone());
        let base_slug = sanitize::sanitize_title(&stem);
        let base_slug = if base_slug.is_empty() { ATTACHMENT_TYPE.to_owned() } else { base_slug };
        let slug = unique_slug(&base_slug, ATTACHMENT_TYPE, 0, &objects);

        let mut meta = BTreeMap::new();
        if !new.alt_text.is_empty() {
            meta.insert(ALT_TEXT_META.to_owned(), new.alt_text);
        }
        let (date, date_gmt) = self.now_dates();
        let mut media = ContentObject {
            id: 0,
            object_type: ATTACHMENT_TYPE.to_owned(),
            status: INHERIT_STATUS.to_owned(),
            title,
            slug,
            author,
            content: new.description,
            excerpt: new.caption,
            modified: date.clone(),
            modified_gmt: date_gmt.clone(),
            date,
            date_gmt,
            categories: Vec::new(),
            tags: Vec::new(),
            featured_media: None,
            meta,
            attachment: Some(AttachmentFile {
                filename,
                mime_type: mime_type.to_owned(),
                file_size,
                width: dimensions.map(|(w, _)| w),
                height: dimensions.map(|(_, h)| h),
            }),
        };
        let bytes = new.bytes;
        self.insert_object_with(&mut media, |id| vec![(Self::file_key(id), bytes)])
            .await?;
        drop(guard);

        info!(id = media.id, mime_type, file_size, "media uploaded");
        Ok(self.format_media(&media, true))
    }

    /// Apply the provided fields to an attachment.
    ///
    /// # Errors
    ///
    /// `not_found` (404) unless `id` names an attachment.
    pub async fn update_media(
        &self,
        id: u64,
        input: &MediaUpdate,
    ) -> Result<MediaView, ContentError> {
        let _guard = self.write_lock.lock().await;
        let mut media = self.load_media(id).await?;

        if let Some(title) = input.title.as_deref() {
            media.title = sanitize::sanitize_text_field(title);
        }
        if let Some(description) = input.description.as_deref() {
            media.content = sanitize::sanitize_textarea_field(description);
        }
        if let Some(caption) = input.caption.as_deref() {
            media.excerpt = sanitize::sanitize_textarea_field(caption);
        }
        if let Some(alt) = input.alt_text.as_deref() {
            media
                .meta
                .insert(ALT_TEXT_META.to_owned(), sanitize::sanitize_text_field(alt));
        }
        let (modified, modified_gmt) = self.now_dates();
        media.modified = modified;
        media.modified_gmt = modified_gmt;
        self.save_object(&media).await?;

        info!(id, "media updated");
        Ok(self.format_media(&media, true))
    }

    /// Remove an attachment and its file. Attachments skip the trash.
    ///
    /// # Errors
    ///
    /// `not_found` (404) unless `id` names an attachment.
    pub async fn delete_media(&self, id: u64) -> Result<(), ContentError> {
        let _guard = self.write_lock.lock().await;
        self.load_media(id).await?;
        self.storage.delete(&Self::object_key(id)).await?;
        self.storage.delete(&Self::file_key(id)).await?;
        info!(id, "media deleted");
        Ok(())
    }

    /// The stored bytes of an attachment.
    ///
    /// # Errors
    ///
    /// `not_found` (404) if the attachment or its file is missing.
    pub async fn media_file(&self, id: u64) -> Result<MediaFile, ContentError> {
        let not_found = || ContentError::NotFound { what: "media", id };
        let file = self.load_media(id).await?.attachment.ok_or_else(not_found)?;
        let bytes = self
            .storage
            .get(&Self::file_key(id))
            .await?
            .ok_or_else(not_found)?;
        Ok(MediaFile {
            filename: file.filename,
            mime_type: file.mime_type,
            bytes,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use image::DynamicImage;
    use serde_json::json;

    use super::*;
    use crate::content::tests::test_store;

    struct StubFetcher {
        body: Option<Vec<u8>>,
        seen: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn serving(body: &[u8]) -> Self {
            Self {
                body: Some(body.to_vec()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                body: None,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MediaFetcher for StubFetcher {
        async fn fetch(&self, url: &Url) -> Result<Vec<u8>, ContentError> {
            self.seen.lock().unwrap().push(url.to_string());
            self.body.clone().ok_or_else(|| ContentError::Download {
                reason: "connection refused".to_owned(),
            })
        }
    }

    fn encoded(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        encoded(&DynamicImage::new_rgb8(width, height), ImageFormat::Png)
    }

    fn upload(value: serde_json::Value) -> MediaUpload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn reads_image_headers() {
        assert_eq!(image_dimensions(&png(640, 480)), Some((640, 480)));

        let gif = encoded(&DynamicImage::new_rgba8(288, 16), ImageFormat::Gif);
        assert_eq!(image_dimensions(&gif), Some((288, 16)));

        let jpeg = encoded(&DynamicImage::new_rgb8(200, 100), ImageFormat::Jpeg);
        assert_eq!(image_dimensions(&jpeg), Some((200, 100)));

        assert_eq!(image_dimensions(b"plain text"), None);
        assert_eq!(image_dimensions(&[0xFF, 0xD8, 0xFF]), None);
    }

    #[test]
    fn mime_types_come_from_the_extension() {
        assert_eq!(mime_for("photo.JPG"), Some("image/jpeg"));
        assert_eq!(mime_for("doc.pdf"), Some("application/pdf"));
        assert_eq!(mime_for("upload-1700000000"), None);
        assert_eq!(mime_for("logo.svg"), None);
        assert_eq!(mime_for("page.html"), None);
        assert_eq!(mime_for("run.php"), None);
    }

    #[test]
    fn missing_extensions_are_sniffed_from_image_bytes() {
        assert_eq!(sniffed_extension(&png(1, 1)), Some("png"));
        assert_eq!(sniffed_extension(b"<svg onload=alert(1)>"), None);
    }

    #[test]
    fn private_addresses_are_not_public() {
        for ip in ["127.0.0.1", "10.1.2.3", "172.16.0.1", "192.168.1.1", "169.254.169.254", "100.64.0.1", "0.0.0.0", "::1", "fd00::1", "fe80::1", "::ffff:127.0.0.1"] {
            assert!(!is_public_ip(ip.parse().unwrap()), "{ip} should be private");
        }
        for ip in ["93.184.216.34", "1.1.1.1", "2606:4700:4700::1111"] {
            assert!(is_public_ip(ip.parse().unwrap()), "{ip} should be public");
        }
    }

    #[test]
    fn file_names_get_numeric_suffixes() {
        assert_eq!(unique_file_name("a.png", &[]), "a.png");
        assert_eq!(unique_file_name("a.png", &["a.png"]), "a-1.png");
        assert_eq!(unique_file_name("a.png", &["a.png", "a-1.png"]), "a-2.png");
        assert_eq!(unique_file_name("README", &["README"]), "README-1");
    }

    #[test]
    fn media_type_filter_matches_prefix_or_exact() {
        assert!(media_type_matches("image", "image/png"));
        assert!(media_type_matches("image/png", "image/png"));
        assert!(media_type_matches("video, image", "image/gif"));
        assert!(!media_type_matches("image/jpeg", "image/png"));
        assert!(!media_type_matches("imag", "image/png"));
    }

    #[tokio::test]
    async fn base64_upload_stores_file_and_metadata() {
        let store = test_store();
        let data = base64::engine::general_purpose::STANDARD.encode(png(32, 16));
        let media = store
            .upload_media(
                &upload(json!({
                    "file_data": format!("data:image/png;base64,{data}"),
                    "filename": "My Photo.png",
                    "alt_text": "<b>A</b> photo",
                    "caption": "Taken today"
                })),
                &StubFetcher::failing(),
            )
            .await
            .unwrap();

        assert_eq!(media.filename, "My-Photo.png");
        assert_eq!(media.title, "My-Photo");
        assert_eq!(media.mime_type, "image/png");
        assert_eq!(media.alt_text, "A photo");
        assert_eq!(media.caption, "Taken today");
        assert_eq!((media.width, media.height), (Some(32), Some(16)));
        assert_eq!(
            media.url,
            format!("https://blog.example.com/uploads/{}/My-Photo.png", media.id)
        );
        let full = &media.sizes.as_ref().unwrap()["full"];
        assert_eq!((full.width, full.height), (32, 16));

        let file = store.media_file(media.id).await.unwrap();
        assert_eq!(file.bytes, png(32, 16));
        assert_eq!(store.media_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upload_input_is_validated() {
        let store = test_store();
        let fetcher = StubFetcher::failing();

        let err = store.upload_media(&upload(json!({})), &fetcher).await.unwrap_err();
        assert!(matches!(err, ContentError::InvalidInput { code: "missing_file", .. }));

        let err = store
            .upload_media(&upload(json!({"file_data": "@@not base64@@"})), &fetcher)
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::InvalidInput { code: "invalid_file", .. }));

        let err = store
            .upload_from_url(&upload(json!({"url": "ftp://example.com/a.png"})), &fetcher)
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::InvalidInput { code: "missing_url", .. }));

        let err = store
            .upload_from_url(&upload(json!({"url": "https://cdn.example.com/a.png"})), &fetcher)
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::Download { .. }));
    }

    #[tokio::test]
    async fn file_url_uploads_take_the_url_basename() {
        let store = test_store();
        let fetcher = StubFetcher::serving(&png(10, 10));
        let media = store
            .upload_media(
                &upload(json!({"file_url": "https://cdn.example.com/img/hero.png?v=2", "title": "Hero"})),
                &fetcher,
            )
            .await
            .unwrap();
        assert_eq!(media.filename, "hero.png");
        assert_eq!(media.title, "Hero");
        assert_eq!(fetcher.seen.lock().unwrap().len(), 1);

        let again = store
            .upload_from_url(&upload(json!({"url": "https://cdn.example.com/hero.png"})), &fetcher)
            .await
            .unwrap();
        assert_eq!(again.filename, "hero-1.png");

        let bare = store
            .upload_from_url(&upload(json!({"url": "https://cdn.example.com/"})), &fetcher)
            .await
            .unwrap();
        assert!(bare.filename.starts_with("upload-"));
        assert!(bare.filename.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn disallowed_file_types_are_rejected() {
        let store = test_store();
        let fetcher = StubFetcher::serving(b"<svg onload=alert(1)></svg>");
        let svg = base64::engine::general_purpose::STANDARD.encode(b"<svg onload=alert(1)></svg>");

        let err = store
            .upload_media(&upload(json!({"file_data": svg, "filename": "logo.svg"})), &fetcher)
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::InvalidInput { code: "invalid_file_type", .. }));

        let err = store
            .upload_media(&upload(json!({"file_data": svg})), &fetcher)
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::InvalidInput { code: "invalid_file_type", .. }));

        let err = store
            .upload_from_url(&upload(json!({"url": "https://cdn.example.com/page.html"})), &fetcher)
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::InvalidInput { code: "invalid_file_type", .. }));
        assert_eq!(store.media_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unnamed_images_get_a_sniffed_extension() {
        let store = test_store();
        let data = base64::engine::general_purpose::STANDARD.encode(png(4, 4));
        let media = store
            .upload_media(&upload(json!({"file_data": data})), &StubFetcher::failing())
            .await
            .unwrap();
        assert!(media.filename.starts_with("upload-"));
        assert!(media.filename.ends_with(".png"));
        assert_eq!(media.mime_type, "image/png");
    }

    #[tokio::test]
    async fn private_hosts_are_never_fetched() {
        let store = test_store();
        let fetcher = StubFetcher::serving(&png(1, 1));
        for url in [
            "http://127.0.0.1/a.png",
            "http://localhost:8080/a.png",
            "http://169.254.169.254/latest/meta-data",
            "http://[::1]/a.png",
            "http://10.0.0.5/a.png",
        ] {
            let err = store
                .upload_from_url(&upload(json!({ "url": url })), &fetcher)
                .await
                .unwrap_err();
            assert!(matches!(err, ContentError::Download { .. }), "{url} was not refused");
        }
        assert!(fetcher.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_filters_by_type_and_search() {
        let store = test_store();
        let fetcher = StubFetcher::failing();
        let encode = |b: &[u8]| base64::engine::general_purpose::STANDARD.encode(b);
        for (name, bytes) in [
            ("a.png", png(1, 1)),
            ("notes.txt", b"hello".to_vec()),
            ("b.png", png(2, 2)),
        ] {
            store
                .upload_media(&upload(json!({"file_data": encode(&bytes), "filename": name})), &fetcher)
                .await
                .unwrap();
        }

        let all = store.list_media(&MediaQuery::default()).await.unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.per_page, 50);
        assert_eq!(all.media[0].filename, "b.png");
        assert!(all.media.iter().all(|m| m.sizes.is_none()));

        let images = store
            .list_media(&MediaQuery {
                media_type: Some("image".to_owned()),
                ..MediaQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(images.total, 2);

        let search = store
            .list_media(&MediaQuery {
                search: Some("NOTES".to_owned()),
                ..MediaQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(search.media.len(), 1);
        assert_eq!(search.media[0].mime_type, "text/plain");
        assert_eq!(search.media[0].width, None);
    }

    #[tokio::test]
    async fn update_and_delete() {
        let store = test_store();
        let data = base64::engine::general_purpose::STANDARD.encode(b"abc");
        let media = store
            .upload_media(&upload(json!({"file_data": data, "filename": "f.txt"})), &StubFetcher::failing())
            .await
            .unwrap();

        let updated = store
            .update_media(
                media.id,
                &MediaUpdate {
                    title: Some("New <i>title</i>".to_owned()),
                    alt_text: Some("alt".to_owned()),
                    ..MediaUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "New title");
        assert_eq!(updated.alt_text, "alt");
        assert_eq!(updated.caption, "");

        store.delete_media(media.id).await.unwrap();
        assert!(matches!(
            store.get_media(media.id).await.unwrap_err(),
            ContentError::NotFound { what: "media", .. }
        ));
        assert!(store.media_file(media.id).await.is_err());
        assert!(matches!(
            store.delete_media(media.id).await.unwrap_err(),
            ContentError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn posts_are_not_media() {
        let store = test_store();
        let post = store
            .create_post(&serde_json::from_value(json!({"title": "Hi"})).unwrap())
            .await
            .unwrap();
        assert!(store.get_media(post.id).await.is_err());
    }
}
