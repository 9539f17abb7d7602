// Manifest of uploaded files. Records are only created for images the
// drive accepted; the whole session list is rewritten to disk each save.

use crate::api::Transport;
use crate::disk::DiskClient;
use crate::images::ImageInfo;
use anyhow::{Context, Result};
use crossterm::style::Stylize;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Breed columns, present only on dog records.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DogTag {
    pub breed: String,
    pub sub_breed: Option<String>,
}

/// One successfully uploaded file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub file_name: String,
    pub size: u64,
    pub path: String,
    #[serde(flatten)]
    pub dog: Option<DogTag>,
}

impl ResultRecord {
    pub fn new(folder: &str, image: &ImageInfo) -> Self {
        ResultRecord {
            file_name: image.name.clone(),
            size: image.size,
            path: format!("{}/{}", folder, image.name),
            dog: image.breed.clone().map(|breed| DogTag {
                breed,
                sub_breed: image.sub_breed.clone(),
            }),
        }
    }
}

/// Copy every image into `folder` on the drive, one at a time, and return
/// records for the ones that were accepted. Failures are reported through
/// the progress bar and left out.
pub fn upload_images<T: Transport>(
    disk: &DiskClient<T>,
    folder: &str,
    images: &[ImageInfo],
    progress: &ProgressBar,
) -> Vec<ResultRecord> {
    let mut records = Vec::with_capacity(images.len());
    for image in images {
        progress.set_message(image.name.clone());
        let record = ResultRecord::new(folder, image);
        match disk.upload_from_url(&image.url, &record.path) {
            Ok(link) => {
                if let Ok(status) = disk.operation_status(&link) {
                    log::debug!("Upload of {} is {}", record.path, status);
                }
                progress.println(format!("{} {}", "uploaded".green(), record.path));
                records.push(record);
            }
            Err(e) => {
                log::warn!("Upload of {} from {} failed: {}", record.path, image.url, e);
                progress.println(format!("{} {}: {}", "failed".red(), image.name, e));
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    records
}

/// Write `records` as a pretty-printed JSON array, replacing `path`.
pub fn save_manifest(path: &Path, records: &[ResultRecord]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records).context("Serializing manifest")?;
    writer.write_all(b"\n")?;
    writer.flush().with_context(|| format!("Writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockTransport, Reply, Request};
    use crate::config::DiskConfig;
    use reqwest::Method;
    use serde_json::Value;
    use std::time::Duration;
    use tempfile::TempDir;

    fn cat(name: &str) -> ImageInfo {
        ImageInfo {
            url: format!("https://cataas.com/cat/{}", name),
            size: 100,
            name: format!("{}.jpg", name),
            breed: None,
            sub_breed: None,
        }
    }

    fn dog(sub: Option<&str>) -> ImageInfo {
        ImageInfo {
            url: "https://images.dog.ceo/breeds/hound/n1.jpg".into(),
            size: 42,
            name: "hound_n1.jpg".into(),
            breed: Some("hound".into()),
            sub_breed: sub.map(String::from),
        }
    }

    fn disk_with<F>(handler: F) -> DiskClient<MockTransport>
    where
        F: FnMut(&Request) -> anyhow::Result<Reply> + Send + 'static,
    {
        let mut handler = handler;
        let mut http = MockTransport::new();
        http.expect_send().returning(move |req| handler(&req));
        DiskClient::new(
            http,
            DiskConfig {
                base_url: "https://disk.test".into(),
                auth_scheme: "OAuth".into(),
                upload_timeout: Duration::from_secs(30),
            },
            "token",
        )
    }

    #[test]
    fn test_record_path_is_folder_and_name() {
        let record = ResultRecord::new("my group", &cat("hi"));
        assert_eq!(record.file_name, "hi.jpg");
        assert_eq!(record.path, "my group/hi.jpg");
        assert_eq!(record.size, 100);
        assert!(record.dog.is_none());
    }

    #[test]
    fn test_record_json_shape() {
        let cat_json = serde_json::to_value(ResultRecord::new("g", &cat("a"))).unwrap();
        assert!(cat_json.get("breed").is_none());
        assert!(cat_json.get("sub_breed").is_none());

        let dog_json = serde_json::to_value(ResultRecord::new("hound", &dog(None))).unwrap();
        assert_eq!(dog_json["breed"], "hound");
        assert_eq!(dog_json["sub_breed"], Value::Null);
        assert_eq!(dog_json["path"], "hound/hound_n1.jpg");

        let sub_json = serde_json::to_value(ResultRecord::new("hound", &dog(Some("afghan")))).unwrap();
        assert_eq!(sub_json["sub_breed"], "afghan");
    }

    #[test]
    fn test_failed_upload_is_excluded() {
        let disk = disk_with(|req| {
            if req.method == Method::GET {
                return Ok(Reply { status: 200, body: r#"{"status":"success"}"#.into(), ..Default::default() });
            }
            if req.url.contains("bad.jpg") {
                Ok(Reply {
                    status: 409,
                    body: r#"{"error":"DiskResourceAlreadyExistsError","message":"exists"}"#.into(),
                    ..Default::default()
                })
            } else {
                Ok(Reply {
                    status: 202,
                    body: r#"{"href":"https://disk.test/v1/disk/operations/1","method":"GET","templated":false}"#.into(),
                    ..Default::default()
                })
            }
        });
        let images = vec![cat("good"), cat("bad"), cat("fine")];
        let records = upload_images(&disk, "cats", &images, &ProgressBar::hidden());

        let names: Vec<&str> = records.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, ["good.jpg", "fine.jpg"]);
        assert!(records.iter().all(|r| r.path == format!("cats/{}", r.file_name)));
    }

    #[test]
    fn test_transport_failure_is_excluded() {
        let disk = disk_with(|_| Err(anyhow::anyhow!("dns error")));
        let records = upload_images(&disk, "cats", &[cat("a")], &ProgressBar::hidden());
        assert!(records.is_empty());
    }

    #[test]
    fn test_save_manifest_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, "stale contents").unwrap();

        let records = vec![ResultRecord::new("cats", &cat("a")), ResultRecord::new("hound", &dog(Some("basset")))];
        save_manifest(&path, &records).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<ResultRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, records);
        assert!(text.contains("\n  {"), "manifest should be pretty-printed");
    }

    #[test]
    fn test_save_empty_manifest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.json");
        save_manifest(&path, &[]).unwrap();
        let v: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v, Value::Array(vec![]));
    }

    #[test]
    fn test_save_manifest_to_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope").join("results.json");
        assert!(save_manifest(&path, &[]).is_err());
    }
}
