//! Byte-level views of a batch payload, used to diff our output against
//! captured Postman requests when Gateway rejects a batch.

use super::{BatchConfig, CRLF};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// How much of the payload the hex dump covers.
pub const HEX_DUMP_LIMIT: usize = 1000;

const HEX_WIDTH: usize = 16;

/// `offset  hex bytes  ascii` rows for the first `limit` bytes, one per 16 bytes.
pub fn hex_dump(payload: &[u8], limit: usize) -> String {
    let end = payload.len().min(limit);
    let mut out = String::new();
    for (row, chunk) in payload[..end].chunks(HEX_WIDTH).enumerate() {
        let hex = chunk
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ");
        let ascii: String = chunk
            .iter()
            .map(|&b| if (32..127).contains(&b) { b as char } else { '.' })
            .collect();
        let _ = writeln!(out, "{:04x}  {hex:<48}  {ascii}", row * HEX_WIDTH);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrlfHit {
    pub offset: usize,
    /// Up to 20 bytes before and 22 bytes from the CR, lossily decoded.
    pub context: String,
}

pub fn crlf_positions(payload: &str) -> Vec<CrlfHit> {
    let bytes = payload.as_bytes();
    payload
        .match_indices(CRLF)
        .map(|(offset, _)| {
            let start = offset.saturating_sub(20);
            let end = (offset + 22).min(bytes.len());
            CrlfHit {
                offset,
                context: String::from_utf8_lossy(&bytes[start..end]).into_owned(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundaryCounts {
    /// Lines that are exactly `--batch_<id>`.
    pub batch_open_lines: usize,
    /// Raw substring count of `--batch_<id>` (the close delimiter matches too).
    pub batch_open_substr: usize,
    pub batch_close: usize,
    pub changeset_open_lines: usize,
    pub changeset_substr: usize,
    pub changeset_close: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadStats {
    pub total_bytes: usize,
    pub total_lines: usize,
    pub crlf: usize,
    pub bare_lf: usize,
    pub boundaries: BoundaryCounts,
    pub content_type_headers: usize,
    pub transfer_encoding_headers: usize,
    pub merge_requests: usize,
    pub get_requests: usize,
    pub json_start: Option<usize>,
    pub json_end: Option<usize>,
}

impl PayloadStats {
    pub fn of(payload: &str, cfg: &BatchConfig) -> Self {
        let batch_open = cfg.batch_delimiter();
        let changeset_open = cfg.changeset_delimiter();
        let exact = |needle: &str| payload.split(CRLF).filter(|l| *l == needle).count();
        let crlf = payload.matches(CRLF).count();

        Self {
            total_bytes: payload.len(),
            total_lines: payload.split(CRLF).count(),
            crlf,
            bare_lf: payload.matches('\n').count() - crlf,
            boundaries: BoundaryCounts {
                batch_open_lines: exact(&batch_open),
                batch_open_substr: payload.matches(batch_open.as_str()).count(),
                batch_close: payload.matches(cfg.batch_close().as_str()).count(),
                changeset_open_lines: exact(&changeset_open),
                changeset_substr: payload.matches(changeset_open.as_str()).count(),
                changeset_close: payload.matches(cfg.changeset_close().as_str()).count(),
            },
            content_type_headers: payload.matches("Content-Type:").count(),
            transfer_encoding_headers: payload.matches("Content-Transfer-Encoding:").count(),
            merge_requests: payload.matches("MERGE ").count(),
            get_requests: payload.matches("GET ").count(),
            json_start: payload.find('{'),
            json_end: payload.find('}'),
        }
    }

    pub fn json_len(&self) -> Option<usize> {
        match (self.json_start, self.json_end) {
            (Some(s), Some(e)) if e >= s => Some(e - s + 1),
            _ => None,
        }
    }

    /// The layout matches what Gateway accepts: CRLF only and balanced delimiters.
    pub fn looks_well_formed(&self) -> bool {
        self.bare_lf == 0
            && self.boundaries.batch_open_lines == 2
            && self.boundaries.batch_close == 1
            && self.boundaries.changeset_open_lines == 1
            && self.boundaries.changeset_close == 1
    }

    pub fn render(&self, cfg: &BatchConfig) -> String {
        let opt = |v: Option<usize>| v.map_or_else(|| "-".to_string(), |n| n.to_string());
        let b = &self.boundaries;
        let mut out = String::new();
        let _ = writeln!(out, "Batch Payload Statistics");
        let _ = writeln!(out, "{}\n", crate::report::rule());
        let _ = writeln!(out, "Total bytes: {}", self.total_bytes);
        let _ = writeln!(out, "Total lines: {}", self.total_lines);
        let _ = writeln!(out, "CRLF count: {}", self.crlf);
        let _ = writeln!(out, "LF-only count: {}", self.bare_lf);
        let _ = writeln!(out, "\nBoundaries found:");
        let _ = writeln!(
            out,
            "  {} (start lines): {} (substring: {})",
            cfg.batch_delimiter(),
            b.batch_open_lines,
            b.batch_open_substr
        );
        let _ = writeln!(out, "  {} (end): {}", cfg.batch_close(), b.batch_close);
        let _ = writeln!(
            out,
            "  {}: {} (start lines: {})",
            cfg.changeset_delimiter(),
            b.changeset_substr,
            b.changeset_open_lines
        );
        let _ = writeln!(out, "  {}: {}", cfg.changeset_close(), b.changeset_close);
        let _ = writeln!(out, "\nContent headers:");
        let _ = writeln!(out, "  Content-Type: {}", self.content_type_headers);
        let _ = writeln!(
            out,
            "  Content-Transfer-Encoding: {}",
            self.transfer_encoding_headers
        );
        let _ = writeln!(out, "\nHTTP methods:");
        let _ = writeln!(out, "  MERGE requests: {}", self.merge_requests);
        let _ = writeln!(out, "  GET requests: {}", self.get_requests);
        let _ = writeln!(out, "\nJSON body:");
        let _ = writeln!(out, "  Start position: {}", opt(self.json_start));
        let _ = writeln!(out, "  End position: {}", opt(self.json_end));
        let _ = writeln!(out, "  Length: {}", opt(self.json_len()));
        out
    }
}

/// One payload line per output line with a visible `\r\n` marker where the
/// payload has one. The closing delimiter carries no marker.
pub fn render_escaped(payload: &str) -> String {
    payload
        .split(CRLF)
        .collect::<Vec<_>>()
        .join("\\r\\n\n")
}

/// Hex dump followed by the CRLF listing, as written to `<prefix>_hex.txt`.
pub fn render_hex_report(payload: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Hex Dump (first {} bytes):", HEX_DUMP_LIMIT);
    let _ = writeln!(out, "{}\n", crate::report::rule());
    out.push_str(&hex_dump(payload.as_bytes(), HEX_DUMP_LIMIT));

    let _ = write!(out, "\n\n{}", crate::report::rule());
    let _ = writeln!(out, "\nCRLF Positions:");
    let _ = writeln!(out, "{}\n", crate::report::rule());
    let hits = crlf_positions(payload);
    for (i, hit) in hits.iter().enumerate() {
        let _ = writeln!(
            out,
            "CRLF #{:2} at byte {:4}: {:?}",
            i + 1,
            hit.offset,
            hit.context
        );
    }
    let _ = writeln!(out, "\nTotal CRLFs found: {}", hits.len());
    out
}

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub payload: PathBuf,
    pub hex: PathBuf,
    pub stats: PathBuf,
}

/// Write `<prefix>.txt` (raw payload), `<prefix>_hex.txt` and `<prefix>_stats.txt`.
pub fn write_artifacts(
    dir: &Path,
    prefix: &str,
    payload: &str,
    cfg: &BatchConfig,
) -> Result<ArtifactPaths> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let paths = ArtifactPaths {
        payload: dir.join(format!("{prefix}.txt")),
        hex: dir.join(format!("{prefix}_hex.txt")),
        stats: dir.join(format!("{prefix}_stats.txt")),
    };

    fs::write(&paths.payload, payload.as_bytes())
        .with_context(|| format!("writing {}", paths.payload.display()))?;
    fs::write(&paths.hex, render_hex_report(payload))
        .with_context(|| format!("writing {}", paths.hex.display()))?;
    fs::write(&paths.stats, PayloadStats::of(payload, cfg).render(cfg))
        .with_context(|| format!("writing {}", paths.stats.display()))?;

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{build_batch_payload, BatchFilters, UpdateFields};

    fn sample() -> (String, BatchConfig) {
        let cfg = BatchConfig::default();
        let filters = BatchFilters {
            material_starts_with: "J01AA0119J35002001".to_string(),
            plant: "142A".to_string(),
            sales_org: "142".to_string(),
            creation_date: "2026-01-13".to_string(),
        };
        let fields = UpdateFields {
            requirement_segment: "PPCOMFR".to_string(),
            plant: "140A".to_string(),
            storage_location: "ROD".to_string(),
        };
        (build_batch_payload(&filters, &fields, &cfg), cfg)
    }

    #[test]
    fn test_hex_dump_row_layout() {
        let dump = hex_dump(b"--batch_Test01\r\nContent", 1000);
        let rows: Vec<&str> = dump.lines().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            "0000  2d 2d 62 61 74 63 68 5f 54 65 73 74 30 31 0d 0a   --batch_Test01.."
        );
        assert!(rows[1].starts_with("0010  43 6f 6e 74 65 6e 74"));
        // hex column padded to 48 chars even on a short row
        assert_eq!(&rows[1][6..54].trim_end(), &"43 6f 6e 74 65 6e 74");
        assert!(rows[1].ends_with("  Content"));
    }

    #[test]
    fn test_hex_dump_respects_limit() {
        let data = vec![b'a'; 2048];
        let dump = hex_dump(&data, HEX_DUMP_LIMIT);
        // ceil(1000 / 16)
        assert_eq!(dump.lines().count(), 63);
        assert!(dump.lines().last().unwrap().starts_with("03e0  "));
    }

    #[test]
    fn test_render_escaped_marks_only_real_crlfs() {
        let (payload, _) = sample();
        let preview = render_escaped(&payload);
        assert_eq!(
            preview.matches("\\r\\n").count(),
            payload.matches(CRLF).count()
        );
        assert!(preview.starts_with("--batch_Test01\\r\\n\n"));
        assert!(preview.ends_with("\\r\\n\n--batch_Test01--"));
        assert!(!preview.contains('\r'));
    }

    #[test]
    fn test_crlf_positions() {
        let hits = crlf_positions("ab\r\ncd\r\n");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].offset, 2);
        assert_eq!(hits[1].offset, 6);
        assert_eq!(hits[0].context, "ab\r\ncd\r\n");
    }

    #[test]
    fn test_stats_of_generated_payload() {
        let (payload, cfg) = sample();
        let stats = PayloadStats::of(&payload, &cfg);

        assert_eq!(stats.total_bytes, payload.len());
        assert_eq!(stats.bare_lf, 0);
        assert_eq!(stats.total_lines, stats.crlf + 1);
        assert_eq!(stats.boundaries.batch_open_lines, 2);
        assert_eq!(stats.boundaries.batch_open_substr, 3);
        assert_eq!(stats.boundaries.batch_close, 1);
        assert_eq!(stats.boundaries.changeset_substr, 2);
        assert_eq!(stats.boundaries.changeset_open_lines, 1);
        assert_eq!(stats.boundaries.changeset_close, 1);
        assert_eq!(stats.merge_requests, 1);
        assert_eq!(stats.get_requests, 1);
        assert_eq!(stats.content_type_headers, 4);
        assert_eq!(stats.transfer_encoding_headers, 2);
        assert!(stats.looks_well_formed());

        let json = &payload[stats.json_start.unwrap()..=stats.json_end.unwrap()];
        assert!(serde_json::from_str::<serde_json::Value>(json).is_ok());
    }

    #[test]
    fn test_stats_flag_bare_lf() {
        let (payload, cfg) = sample();
        let broken = payload.replace(CRLF, "\n");
        let stats = PayloadStats::of(&broken, &cfg);
        assert_eq!(stats.crlf, 0);
        assert!(stats.bare_lf > 0);
        assert!(!stats.looks_well_formed());
    }

    #[test]
    fn test_write_artifacts() {
        let (payload, cfg) = sample();
        let dir = std::env::temp_dir().join(format!("s4-probe-artifacts-{}", std::process::id()));
        let paths = write_artifacts(&dir, "batch_payload", &payload, &cfg).unwrap();

        assert_eq!(fs::read(&paths.payload).unwrap(), payload.as_bytes());
        let hex = fs::read_to_string(&paths.hex).unwrap();
        assert!(hex.starts_with("Hex Dump (first 1000 bytes):"));
        assert!(hex.contains(&format!("Total CRLFs found: {}", payload.matches(CRLF).count())));
        let stats = fs::read_to_string(&paths.stats).unwrap();
        assert!(stats.contains("LF-only count: 0"));
        assert!(stats.contains("--batch_Test01-- (end): 1"));

        let _ = fs::remove_dir_all(&dir);
    }
}
