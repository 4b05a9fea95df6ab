//! N-way parallel fan-out to one replica candidate set.
//!
//! Opens one upload per node in the set concurrently, computes the
//! content digest locally, and requires every replica's reported digest
//! to agree with it. Any single replica failure fails the whole set —
//! the caller (the gateway's PUT pipeline) is responsible for abandoning
//! the set and retrying with the next candidate set on failure.

use crate::client::{FinalizeRequest, finalize, put_object};
use crate::pool::{NodeHandle, ReplicaPool};
use bytes::Bytes;
use quorumgate_common::{Error, NodeId, Result, digest};

/// Result of a successful fan-out to one candidate set.
pub struct FanoutResult {
    pub computed_digest: String,
    pub nodes: Vec<NodeId>,
}

/// Fans `body` out to every node in `candidate_set` in parallel.
///
/// # Errors
/// Returns the first replica error encountered (transport failure or a
/// digest disagreement) without waiting for the remaining replicas; the
/// caller decides whether to retry with the next candidate set.
pub async fn fan_out_put(
    pool: &ReplicaPool,
    candidate_set: &[NodeHandle],
    upload_path: &str,
    body: Bytes,
) -> Result<FanoutResult> {
    let expected_digest = digest(&body);

    let mut tasks = Vec::with_capacity(candidate_set.len());
    for node in candidate_set {
        let http = pool.client_for(node.node_id).await;
        let node = node.clone();
        let upload_path = upload_path.to_string();
        let body = body.clone();
        tasks.push(tokio::spawn(async move {
            let reported = put_object(&http, &node, &upload_path, body).await?;
            Ok::<_, Error>((node.node_id, reported))
        }));
    }

    let mut nodes = Vec::with_capacity(candidate_set.len());
    for task in tasks {
        let (node_id, reported_digest) = task
            .await
            .map_err(|e| Error::internal(format!("replica task panicked: {e}")))??;

        if reported_digest != expected_digest {
            return Err(Error::ChecksumMismatch {
                computed: expected_digest,
                supplied: reported_digest,
            });
        }
        nodes.push(node_id);
    }

    Ok(FanoutResult {
        computed_digest: expected_digest,
        nodes,
    })
}

/// Invokes the storage-node finalize RPC in parallel across every replica in
/// `candidate_set` (§4.7 step 6-7): the commit coordinator's frozen replica
/// set, not a fresh placement. Every replica must report the same content
/// digest; any disagreement or transport failure fails the whole commit —
/// there is no fail-over here, since finalize cannot be partially applied.
///
/// # Errors
/// Returns the first replica error encountered, or [`Error::internal`] if
/// replicas disagree on the resulting digest.
pub async fn fan_out_finalize(
    pool: &ReplicaPool,
    candidate_set: &[NodeHandle],
    upload_id: &str,
    request: &FinalizeRequest,
) -> Result<String> {
    let mut tasks = Vec::with_capacity(candidate_set.len());
    for node in candidate_set {
        let http = pool.client_for(node.node_id).await;
        let node = node.clone();
        let upload_id = upload_id.to_string();
        let request = request.clone();
        tasks.push(tokio::spawn(async move {
            finalize(&http, &node, &upload_id, &request).await
        }));
    }

    let mut digests = Vec::with_capacity(candidate_set.len());
    for task in tasks {
        let reported = task
            .await
            .map_err(|e| Error::internal(format!("finalize task panicked: {e}")))??;
        digests.push(reported);
    }

    let Some(first) = digests.first().cloned() else {
        return Err(Error::internal("finalize fan-out over an empty replica set"));
    };
    if digests.iter().any(|d| d != &first) {
        return Err(Error::internal("replicas disagreed on finalize digest"));
    }

    Ok(first)
}
