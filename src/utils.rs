use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use rand::Rng;
use regex::Regex;
use url::Url;

use crate::error::{Error, Result};
use crate::models::VideoRef;

pub const ROOM_ID_LENGTH: usize = 6;
pub const MAX_DISPLAY_NAME_LENGTH: usize = 50;
const ROOM_ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const WATCH_URL: &str = "https://www.youtube.com/watch";

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#,
        )
        .expect("video id pattern is valid")
    })
}

fn display_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9\s_-]+$").expect("display name pattern is valid"))
}

/// Extract the 11 character video id from a watch, short, embed or legacy URL.
pub fn extract_video_id(value: &str) -> Option<String> {
    video_id_regex()
        .captures(value.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn canonical_watch_url(video_id: &str) -> Result<String> {
    Url::parse_with_params(WATCH_URL, &[("v", video_id)])
        .map(String::from)
        .map_err(|e| Error::InvalidVideoReference(format!("{}: {}", video_id, e)))
}

/// Resolve a user supplied URL into a playable reference.
///
/// This is the single predicate used for room creation, queue adds and
/// video loads.
pub fn resolve_video_reference(value: &str) -> Result<VideoRef> {
    let video_id = extract_video_id(value)
        .ok_or_else(|| Error::InvalidVideoReference(value.trim().to_string()))?;
    Ok(VideoRef {
        url: canonical_watch_url(&video_id)?,
        video_id,
    })
}

pub fn generate_room_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_ID_LENGTH)
        .map(|_| ROOM_ID_ALPHABET[rng.gen_range(0..ROOM_ID_ALPHABET.len())] as char)
        .collect()
}

/// Validate a display name and return it trimmed.
pub fn validate_display_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidDisplayName("name is empty".to_string()));
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err(Error::InvalidDisplayName(format!(
            "name is longer than {} characters",
            MAX_DISPLAY_NAME_LENGTH
        )));
    }
    if !display_name_regex().is_match(name) {
        return Err(Error::InvalidDisplayName(
            "only letters, numbers, spaces, hyphens and underscores are allowed".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Run `op` until it succeeds, fails permanently, or `attempts` is exhausted.
///
/// Waits `base_delay * attempt` between tries. Only transient errors are retried.
pub async fn retry_transient<T, F, Fut>(
    what: &str,
    attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                let delay = base_delay * attempt;
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}, retrying in {:?}",
                    what,
                    attempt,
                    attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
