// Image sources: the captioned-cat service and the dog breed service.
// Both fetchers are best-effort: a failed request is logged and the item
// is skipped, the loop carries on with the next one.

use crate::api::{Request, Transport};
use crate::config::SourceConfig;
use anyhow::{anyhow, bail, Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::thread;
use std::time::Duration;

/// Characters that are not allowed in file names on common filesystems.
pub const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
pub const MAX_FILENAME_LEN: usize = 100;

/// One image ready to be copied to the drive.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    pub url: String,
    /// Size in bytes as reported by the source, 0 when unknown.
    pub size: u64,
    pub name: String,
    pub breed: Option<String>,
    pub sub_breed: Option<String>,
}

/// Strip reserved characters and cap the length at `MAX_FILENAME_LEN` chars.
pub fn clean_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !INVALID_FILENAME_CHARS.contains(c))
        .take(MAX_FILENAME_LEN)
        .collect()
}

/// Append `segments` to the path of `base`, percent-encoding each one.
fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("Invalid base URL {}", base))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("{} cannot be used as a base URL", base))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Best-effort HEAD request for the image size.
fn remote_size<T: Transport>(http: &T, url: &str) -> u64 {
    match http.send(Request::head(url)) {
        Ok(reply) if reply.is_success() => reply.content_length.unwrap_or(0),
        Ok(reply) => {
            log::warn!("Size lookup for {} returned HTTP {}", url, reply.status);
            0
        }
        Err(e) => {
            log::warn!("Size lookup for {} failed: {:#}", url, e);
            0
        }
    }
}

/// Sleeps between consecutive requests, never before the first one.
struct Pacer {
    delay: Duration,
    started: bool,
}

impl Pacer {
    fn new(delay: Duration) -> Self {
        Pacer { delay, started: false }
    }

    fn wait(&mut self) {
        if self.started && !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.started = true;
    }
}

#[derive(Deserialize)]
struct CatReply {
    url: Option<String>,
}

/// cataas.com style API: `/cat/says/{text}?json=true`.
#[derive(Debug, Clone)]
pub struct CatSource {
    base_url: String,
    delay: Duration,
}

impl CatSource {
    pub fn new(config: &SourceConfig) -> Self {
        CatSource {
            base_url: config.base_url.clone(),
            delay: config.delay,
        }
    }

    /// Resolve the URL of one freshly generated image with `caption`.
    pub fn image_url<T: Transport>(&self, http: &T, caption: &str) -> Result<String> {
        let mut url = endpoint(&self.base_url, &["cat", "says", caption])?;
        url.query_pairs_mut().append_pair("json", "true");

        let reply = http.send(Request::get(url.as_str()))?;
        if !reply.is_success() {
            bail!("Cat API returned HTTP {}", reply.status);
        }
        let data: CatReply = reply.json()?;
        let path = data
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| anyhow!("Cat API response has no image url"))?;

        // The service has returned both absolute and host-relative URLs.
        let base = Url::parse(&self.base_url)?;
        let image = base
            .join(&path)
            .with_context(|| format!("Invalid image url {:?}", path))?;
        Ok(image.to_string())
    }

    /// Fetch `count` captioned images. Failed iterations are skipped.
    pub fn fetch<T: Transport>(&self, http: &T, caption: &str, count: usize) -> Vec<ImageInfo> {
        let stem = clean_filename(caption.trim());
        let stem = if stem.trim().is_empty() { "cat".to_string() } else { stem };

        let mut pacer = Pacer::new(self.delay);
        let mut images = Vec::with_capacity(count);
        for index in 1..=count {
            pacer.wait();
            let url = match self.image_url(http, caption) {
                Ok(url) => url,
                Err(e) => {
                    log::warn!("Cat image {}/{} skipped: {:#}", index, count, e);
                    continue;
                }
            };
            let size = remote_size(http, &url);
            let name = cat_file_name(&stem, (count > 1).then_some(index));
            images.push(ImageInfo {
                url,
                size,
                name,
                breed: None,
                sub_breed: None,
            });
        }
        images
    }
}

#[derive(Deserialize)]
struct DogReply<M> {
    message: M,
}

/// dog.ceo style API: breed lists and random images per (sub-)breed.
#[derive(Debug, Clone)]
pub struct DogSource {
    base_url: String,
    delay: Duration,
}

impl DogSource {
    pub fn new(config: &SourceConfig) -> Self {
        DogSource {
            base_url: config.base_url.clone(),
            delay: config.delay,
        }
    }

    /// Sub-breeds of `breed`; empty when the breed has none.
    pub fn sub_breeds<T: Transport>(&self, http: &T, breed: &str) -> Result<Vec<String>> {
        let url = endpoint(&self.base_url, &["breed", breed, "list"])?;
        let reply = http.send(Request::get(url.as_str()))?;
        if !reply.is_success() {
            bail!("Dog API returned HTTP {} for breed {:?}", reply.status, breed);
        }
        let data: DogReply<Vec<String>> = reply.json()?;
        Ok(data.message)
    }

    /// URL of one random image of `breed` (optionally narrowed to `sub_breed`).
    pub fn random_image<T: Transport>(&self, http: &T, breed: &str, sub_breed: Option<&str>) -> Result<String> {
        let mut segments = vec!["breed", breed];
        if let Some(sub) = sub_breed {
            segments.push(sub);
        }
        segments.extend(["images", "random"]);
        let url = endpoint(&self.base_url, &segments)?;

        let reply = http.send(Request::get(url.as_str()))?;
        if !reply.is_success() {
            bail!("Dog API returned HTTP {}", reply.status);
        }
        let data: DogReply<String> = reply.json()?;
        Ok(data.message)
    }

    /// Fetch `count` images for every sub-breed of `breed`, or `count`
    /// images of the breed itself when it has no sub-breeds.
    pub fn fetch<T: Transport>(&self, http: &T, breed: &str, count: usize) -> Vec<ImageInfo> {
        let breed = breed.trim().to_lowercase();
        let groups: Vec<Option<String>> = match self.sub_breeds(http, &breed) {
            Ok(subs) if subs.is_empty() => vec![None],
            Ok(subs) => subs.into_iter().map(Some).collect(),
            Err(e) => {
                log::warn!("Breed {:?} lookup failed: {:#}", breed, e);
                return Vec::new();
            }
        };

        let mut pacer = Pacer::new(self.delay);
        let mut images = Vec::with_capacity(groups.len() * count);
        for sub in &groups {
            for index in 1..=count {
                pacer.wait();
                let url = match self.random_image(http, &breed, sub.as_deref()) {
                    Ok(url) => url,
                    Err(e) => {
                        log::warn!(
                            "Image {}/{} of {} {} skipped: {:#}",
                            index,
                            count,
                            breed,
                            sub.as_deref().unwrap_or(""),
                            e
                        );
                        continue;
                    }
                };
                let size = remote_size(http, &url);
                let name = dog_file_name(&breed, sub.as_deref(), (count > 1).then_some(index), &url);
                images.push(ImageInfo {
                    url,
                    size,
                    name,
                    breed: Some(breed.clone()),
                    sub_breed: sub.clone(),
                });
            }
        }
        images
    }
}

/// `{stem}[_{index}].jpg`, with the stem shortened so the whole name
/// stays within `MAX_FILENAME_LEN` chars.
fn cat_file_name(stem: &str, index: Option<usize>) -> String {
    let suffix = match index {
        Some(i) => format!("_{}.jpg", i),
        None => ".jpg".to_string(),
    };
    let room = MAX_FILENAME_LEN.saturating_sub(suffix.chars().count());
    let stem: String = stem.chars().take(room).collect();
    format!("{}{}", stem, suffix)
}

/// `{breed}[_{sub}][_{index}]_{basename}`, cleaned.
fn dog_file_name(breed: &str, sub_breed: Option<&str>, index: Option<usize>, url: &str) -> String {
    let mut name = breed.to_string();
    if let Some(sub) = sub_breed {
        name.push('_');
        name.push_str(sub);
    }
    if let Some(i) = index {
        name.push_str(&format!("_{}", i));
    }
    name.push('_');
    name.push_str(basename(url));
    clean_filename(&name)
}

fn basename(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').find(|s| !s.is_empty()).unwrap_or("image.jpg")
}
