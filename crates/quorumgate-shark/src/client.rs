//! HTTP protocol client for a single storage node ("shark").
//!
//! Covers the two request shapes the gateway core depends on: the
//! streaming object PUT, and the MPU finalize RPC. The wire protocol
//! beyond these shapes is the storage node's concern, not ours.

use crate::pool::NodeHandle;
use bytes::Bytes;
use quorumgate_common::{Error, ObjectId, Result};
use serde::{Deserialize, Serialize};

const COMPUTED_MD5_HEADER: &str = "x-joyent-computed-content-md5";

/// Streams `body` to one replica's object-put endpoint, returning the
/// digest the replica computed over what it received.
///
/// # Errors
/// Returns [`Error::Transport`] on a connection or request failure, or
/// [`Error::ChecksumMismatch`]-shaped [`Error::BadRequest`] if the
/// replica's response is missing the computed-digest header.
pub async fn put_object(
    http: &reqwest::Client,
    node: &NodeHandle,
    upload_path: &str,
    body: Bytes,
) -> Result<String> {
    let url = format!("http://{}{}", node.address, upload_path);
    let response = http
        .put(&url)
        .header(reqwest::header::CONTENT_LENGTH, body.len())
        .body(body)
        .send()
        .await?
        .error_for_status()?;

    extract_digest(&response)
}

/// Fetches an object's bytes from one replica.
///
/// # Errors
/// Returns [`Error::Transport`] on a connection or request failure.
pub async fn get_object(http: &reqwest::Client, node: &NodeHandle, upload_path: &str) -> Result<Bytes> {
    let url = format!("http://{}{}", node.address, upload_path);
    let response = http.get(&url).send().await?.error_for_status()?;
    Ok(response.bytes().await?)
}

/// Payload for the storage-node finalize RPC, `POST /mpu/v1/commit/<upload-id>`.
#[derive(Clone, Debug, Serialize)]
pub struct FinalizeRequest {
    pub version: u32,
    pub nbytes: u64,
    pub account: String,
    #[serde(rename = "objectId")]
    pub object_id: String,
    pub parts: Vec<String>,
}

impl FinalizeRequest {
    #[must_use]
    pub fn new(object_id: ObjectId, account: impl Into<String>, nbytes: u64, parts: Vec<String>) -> Self {
        Self {
            version: 1,
            nbytes,
            account: account.into(),
            object_id: object_id.to_string(),
            parts,
        }
    }
}

/// Invokes the finalize RPC on one replica, returning its reported digest.
///
/// # Errors
/// Returns [`Error::Transport`] on a connection or request failure.
pub async fn finalize(
    http: &reqwest::Client,
    node: &NodeHandle,
    upload_id: &str,
    request: &FinalizeRequest,
) -> Result<String> {
    let url = format!("http://{}/mpu/v1/commit/{upload_id}", node.address);
    let response = http.post(&url).json(request).send().await?.error_for_status()?;
    extract_digest(&response)
}

fn extract_digest(response: &reqwest::Response) -> Result<String> {
    response
        .headers()
        .get(COMPUTED_MD5_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| Error::BadRequest(format!("replica response missing {COMPUTED_MD5_HEADER}")))
}
