//! Splitting of oversized inscription content into linked units.
//!
//! Content at or below [`STITCH_SPLIT_THRESHOLD`] is inscribed as one file.
//! Larger content is cut into fixed-size chunks; each chunk is base64-encoded
//! into a [`StitchUnit`] that records its position and a BLAKE3 link over the
//! previous unit's link and its own bytes. The split depends only on the
//! content length, and the units alone are enough to rebuild the content.

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use scribe_crypto::link::{unit_link, GENESIS_LINK};
use scribe_types::{DocumentId, STITCH_SPLIT_THRESHOLD};

use crate::client::InscriptionFile;
use crate::envelope::CONTENT_TYPE_JSON;
use crate::{AnchorError, Result};

/// Bytes reserved per unit for the JSON wrapper around `data`.
pub const UNIT_OVERHEAD: usize = 1024;

/// Raw bytes carried per unit, chosen so the encoded unit stays under the threshold.
pub const UNIT_DATA_BYTES: usize = (STITCH_SPLIT_THRESHOLD - UNIT_OVERHEAD) / 4 * 3;

/// One linked piece of a split payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StitchUnit {
    pub index: usize,
    pub total: usize,
    /// Hex link of the previous unit (all zeros for the first).
    pub prev_link: String,
    /// Hex `unit_link(prev_link, data)`.
    pub link: String,
    /// Base64 chunk bytes.
    pub data: String,
}

/// Whether content of this length must be split.
pub fn needs_split(len: usize) -> bool {
    len > STITCH_SPLIT_THRESHOLD
}

/// Split `payload` into linked units of at most [`UNIT_DATA_BYTES`] raw bytes.
pub fn split(payload: &[u8]) -> Vec<StitchUnit> {
    let engine = base64::engine::general_purpose::STANDARD;
    let chunks: Vec<&[u8]> = if payload.is_empty() {
        vec![payload]
    } else {
        payload.chunks(UNIT_DATA_BYTES).collect()
    };
    let total = chunks.len();

    let mut prev = GENESIS_LINK;
    let mut units = Vec::with_capacity(total);
    for (index, chunk) in chunks.into_iter().enumerate() {
        let link = unit_link(&prev, chunk);
        units.push(StitchUnit {
            index,
            total,
            prev_link: hex::encode(prev),
            link: hex::encode(link),
            data: engine.encode(chunk),
        });
        prev = link;
    }
    units
}

/// Rebuild a payload from its units, in any order, verifying every link.
pub fn reassemble(units: &[StitchUnit]) -> Result<Vec<u8>> {
    let engine = base64::engine::general_purpose::STANDARD;
    let Some(first) = units.first() else {
        return Err(AnchorError::Stitch("no units".to_string()));
    };
    let total = first.total;
    if units.len() != total {
        return Err(AnchorError::Stitch(format!(
            "expected {total} units, got {}",
            units.len()
        )));
    }

    let mut ordered: Vec<&StitchUnit> = units.iter().collect();
    ordered.sort_by_key(|u| u.index);

    let mut prev = GENESIS_LINK;
    let mut payload = Vec::new();
    for (expected, unit) in ordered.into_iter().enumerate() {
        if unit.index != expected || unit.total != total {
            return Err(AnchorError::Stitch(format!(
                "unit {} of {} out of sequence",
                unit.index, unit.total
            )));
        }
        if decode_link(&unit.prev_link)? != prev {
            return Err(AnchorError::Stitch(format!("unit {expected} has a broken back-link")));
        }
        let data = engine
            .decode(&unit.data)
            .map_err(|e| AnchorError::Stitch(format!("unit {expected} data: {e}")))?;
        let link = unit_link(&prev, &data);
        if decode_link(&unit.link)? != link {
            return Err(AnchorError::Stitch(format!("unit {expected} link mismatch")));
        }
        payload.extend_from_slice(&data);
        prev = link;
    }
    Ok(payload)
}

/// Name of the single-file inscription for a document.
pub fn file_name(document_id: &DocumentId) -> String {
    format!("scribe-doc-{document_id}.json")
}

/// Name of one unit file. `index` is zero-based; names count from 1.
pub fn unit_file_name(document_id: &DocumentId, index: usize, total: usize) -> String {
    format!("scribe-doc-{document_id}.part-{}-of-{total}.json", index + 1)
}

/// Turn encoded inscription content into request files.
pub fn package(document_id: &DocumentId, content: &[u8]) -> Result<Vec<InscriptionFile>> {
    if !needs_split(content.len()) {
        return Ok(vec![InscriptionFile::new(
            file_name(document_id),
            content,
            CONTENT_TYPE_JSON,
        )]);
    }

    split(content)
        .iter()
        .map(|unit| {
            let body = serde_json::to_vec(unit).map_err(|e| AnchorError::Serialization(e.to_string()))?;
            Ok(InscriptionFile::new(
                unit_file_name(document_id, unit.index, unit.total),
                &body,
                CONTENT_TYPE_JSON,
            ))
        })
        .collect()
}

/// Inverse of [`package`].
pub fn unpack(files: &[InscriptionFile]) -> Result<Vec<u8>> {
    let bodies = files
        .iter()
        .map(|f| {
            f.decode()
                .ok_or_else(|| AnchorError::Stitch(format!("file {} is not base64", f.name)))
        })
        .collect::<Result<Vec<_>>>()?;

    match files {
        [single] if !single.name.contains(".part-") => bodies
            .into_iter()
            .next()
            .ok_or_else(|| AnchorError::Stitch("no files".to_string())),
        _ => {
            let units = bodies
                .iter()
                .map(|b| serde_json::from_slice::<StitchUnit>(b))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| AnchorError::Stitch(e.to_string()))?;
            reassemble(&units)
        }
    }
}

fn decode_link(hex_link: &str) -> Result<[u8; 32]> {
    let mut out = [0u8; 32];
    hex::decode_to_slice(hex_link, &mut out)
        .map_err(|e| AnchorError::Stitch(format!("bad link {hex_link}: {e}")))?;
    Ok(out)
}
