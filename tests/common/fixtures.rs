//! Export documents, service responses and media payloads

use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{Value, json};
use std::io::Cursor;

/// Web link for post `id`
pub fn post_link(id: u32) -> String {
    format!("https://www.tiktok.com/@collector/video/{id}")
}

/// Mobile-app share link for post `id` (canonicalizes to [`post_link`])
pub fn app_link(id: u32) -> String {
    format!("https://www.tiktokv.com/@collector/video/{id}")
}

/// Export document listing `links` the way the export does: newest first
///
/// `links` is given oldest first, matching processing order.
pub fn export_document(links: &[String]) -> Value {
    let records: Vec<Value> = links
        .iter()
        .rev()
        .enumerate()
        .map(|(i, link)| {
            let day = 28usize.saturating_sub(i);
            json!({ "Date": format!("2024-01-{day:02} 12:00:00"), "Link": link })
        })
        .collect();

    json!({
        "Activity": {
            "Favorite Videos": { "FavoriteVideoList": records },
            "Like List": { "ItemFavoriteList": [] }
        }
    })
}

/// Service answer for a directly downloadable video
pub fn tunnel_response(media_url: &str) -> Value {
    json!({ "status": "tunnel", "url": media_url, "filename": "video.mp4" })
}

/// Service answer for a photo gallery
pub fn gallery_response(image_urls: &[String], audio_url: Option<&str>) -> Value {
    let picker: Vec<Value> = image_urls
        .iter()
        .map(|url| json!({ "type": "photo", "url": url }))
        .collect();
    match audio_url {
        Some(audio) => json!({ "status": "picker", "picker": picker, "audio": audio }),
        None => json!({ "status": "picker", "picker": picker }),
    }
}

/// Service answer for a multi-video picker, which is not supported
pub fn video_picker_response(video_url: &str) -> Value {
    json!({ "status": "picker", "picker": [{ "type": "video", "url": video_url }] })
}

/// Service-reported extraction failure
pub fn error_response(code: &str) -> Value {
    json!({ "status": "error", "error": { "code": code } })
}

/// A small JPEG of the given size
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    RgbImage::from_pixel(width, height, Rgb([30, 160, 90]))
        .write_to(&mut bytes, ImageFormat::Jpeg)
        .expect("encode test jpeg");
    bytes.into_inner()
}

/// Stand-in video payload
pub fn video_bytes(id: u32) -> Vec<u8> {
    format!("video payload {id}").into_bytes()
}
