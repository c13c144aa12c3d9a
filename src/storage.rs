//! Google Cloud Storage: audio upload, public URLs, setup verification.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

pub const BUCKET: &str = "little-lores-audio";
const AUDIO_PREFIX: &str = "story-audio";
const STORAGE_API: &str = "https://storage.googleapis.com";
const PROBE_OBJECT: &str = "test-permission.txt";

pub struct StorageClient {
    http: reqwest::Client,
    token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketInfo {
    #[serde(default)]
    location: String,
    #[serde(default)]
    storage_class: String,
}

/// Public download URL for a story's audio object.
pub fn public_audio_url(story_id: &str) -> String {
    format!("{}/{}/{}/{}.mp3", STORAGE_API, BUCKET, AUDIO_PREFIX, story_id)
}

fn encode_object_name(name: &str) -> String {
    name.replace('/', "%2F")
}

impl StorageClient {
    pub fn new() -> Result<Self> {
        let token = std::env::var("GCS_ACCESS_TOKEN")
            .map_err(|_| anyhow::anyhow!("GCS_ACCESS_TOKEN environment variable must be set"))?;
        Ok(Self {
            http: reqwest::Client::new(),
            token,
        })
    }

    /// Upload one story's MP3 and return its public URL.
    pub async fn upload_audio(&self, story_id: &str, audio: Vec<u8>) -> Result<String> {
        let object = format!("{}/{}.mp3", AUDIO_PREFIX, story_id);
        self.upload_object(&object, "audio/mpeg", audio).await?;
        Ok(public_audio_url(story_id))
    }

    async fn upload_object(&self, name: &str, content_type: &str, data: Vec<u8>) -> Result<()> {
        let url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            STORAGE_API,
            BUCKET,
            encode_object_name(name)
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .header("content-type", content_type)
            .body(data)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Upload of {} failed: {} {}", name, status, detail);
        }
        info!("Uploaded {} to bucket {}", name, BUCKET);
        Ok(())
    }

    async fn delete_object(&self, name: &str) -> Result<()> {
        let url = format!(
            "{}/storage/v1/b/{}/o/{}",
            STORAGE_API,
            BUCKET,
            encode_object_name(name)
        );
        let response = self.http.delete(&url).bearer_auth(&self.token).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Delete of {} failed: {}", name, status);
        }
        Ok(())
    }

    async fn bucket_info(&self) -> Result<BucketInfo> {
        let url = format!("{}/storage/v1/b/{}", STORAGE_API, BUCKET);
        let response = self.http.get(&url).bearer_auth(&self.token).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Bucket '{}' not reachable: {}", BUCKET, status);
        }
        response.json().await.context("Invalid bucket metadata")
    }

    /// List audio object names already present in the bucket.
    pub async fn list_audio_objects(&self, max: usize) -> Result<Vec<String>> {
        let url = format!(
            "{}/{}?prefix={}/&max-keys={}",
            STORAGE_API, BUCKET, AUDIO_PREFIX, max
        );
        let response = self.http.get(&url).bearer_auth(&self.token).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Listing bucket '{}' failed: {}", BUCKET, status);
        }
        let xml = response.text().await?;
        parse_list_keys(&xml)
    }

    /// End-to-end storage check: bucket metadata, a write/delete round trip,
    /// and a look at existing audio objects.
    pub async fn verify_setup(&self) -> Result<()> {
        println!("Checking bucket '{}'...", BUCKET);
        let bucket = self
            .bucket_info()
            .await
            .context("Bucket check failed (missing bucket, wrong project, or bad token)")?;
        println!("Bucket reachable");
        println!("  Location:      {}", bucket.location);
        println!("  Storage class: {}", bucket.storage_class);

        println!("Testing write permission...");
        self.upload_object(PROBE_OBJECT, "text/plain", b"test".to_vec())
            .await
            .context("Write permission check failed")?;
        self.delete_object(PROBE_OBJECT)
            .await
            .context("Cleanup of permission probe failed")?;
        println!("Write permission verified");

        let existing = self.list_audio_objects(5).await?;
        if existing.is_empty() {
            println!("No existing audio files found (normal for a fresh setup)");
        } else {
            println!("Found {} existing audio files:", existing.len());
            for name in existing.iter().take(3) {
                println!("  - {}", name);
            }
        }

        println!("Storage is configured correctly");
        Ok(())
    }
}

/// Parse a ListBucketResult XML document and return all <Key> values.
fn parse_list_keys(xml: &str) -> Result<Vec<String>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut keys = Vec::new();
    let mut in_contents = false;
    let mut in_key = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.name().as_ref() {
                b"Contents" => in_contents = true,
                b"Key" if in_contents => in_key = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(e)) if in_key => {
                keys.push(e.unescape()?.to_string());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.name().as_ref() {
                b"Key" => in_key = false,
                b"Contents" => in_contents = false,
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(keys)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_url_shape() {
        assert_eq!(
            public_audio_url("abc-123"),
            "https://storage.googleapis.com/little-lores-audio/story-audio/abc-123.mp3"
        );
    }

    #[test]
    fn object_names_escape_slashes() {
        assert_eq!(
            encode_object_name("story-audio/s1.mp3"),
            "story-audio%2Fs1.mp3"
        );
    }

    #[test]
    fn list_keys_from_bucket_xml() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://doc.s3.amazonaws.com/2006-03-01">
  <Name>little-lores-audio</Name>
  <Prefix>story-audio/</Prefix>
  <Contents>
    <Key>story-audio/s1.mp3</Key>
    <Size>1024</Size>
  </Contents>
  <Contents>
    <Key>story-audio/s2.mp3</Key>
    <Size>2048</Size>
  </Contents>
</ListBucketResult>"#;
        let keys = parse_list_keys(xml).unwrap();
        assert_eq!(keys, vec!["story-audio/s1.mp3", "story-audio/s2.mp3"]);
    }

    #[test]
    fn empty_listing_yields_no_keys() {
        let xml = r#"<ListBucketResult><Name>b</Name></ListBucketResult>"#;
        assert!(parse_list_keys(xml).unwrap().is_empty());
    }
}
