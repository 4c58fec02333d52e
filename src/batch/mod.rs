//! OData v2 `$batch` payload for the sales-order mass change.
//!
//! The payload holds exactly one changeset with a MERGE against a fixed
//! "phantom" order item (it carries the field values to apply) followed by a
//! standalone GET whose `$filter` selects the orders the job should touch.
//!
//! SAP Gateway's multipart parser rejects bare `\n`, so every line is joined
//! with CRLF and nothing follows the closing batch delimiter.

pub mod inspect;

use crate::util::env::{env_opt, env_parse};
use serde::{Deserialize, Serialize};

pub const CRLF: &str = "\r\n";

pub const DEFAULT_BATCH_BOUNDARY: &str = "Test01";
pub const DEFAULT_CHANGESET_BOUNDARY: &str = "Ugo1";
pub const DEFAULT_SAP_CLIENT: &str = "200";
pub const DEFAULT_ENTITY_SET: &str = "C_RFM_MaSaDoEditSlsOrdItm";
pub const DEFAULT_MERGE_KEY: &str = "SalesOrder='100001681',SalesOrderItem='000010'";

pub const JOB_ACTION: &str = "01";
pub const JOB_COMMENT: &str = "Mass Field Update from Joule";
const SELECTED: &str = "X";

/// Which sales order items the job selects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFilters {
    pub material_starts_with: String,
    pub plant: String,
    pub sales_org: String,
    /// ISO date, `YYYY-MM-DD`.
    pub creation_date: String,
}

/// Field values written onto every selected item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateFields {
    pub requirement_segment: String,
    pub plant: String,
    pub storage_location: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct MergeBody<'a> {
    requirement_segment: &'a str,
    plant: &'a str,
    storage_location: &'a str,
    #[serde(rename = "RFM_SD_ApplJobAction")]
    job_action: &'static str,
    internal_comment: &'static str,
    sales_ord_item_is_selected: &'static str,
    sales_ord_items_are_selected: &'static str,
}

/// Header set used inside the embedded HTTP requests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HeaderProfile {
    /// Headers the Fiori app / Postman captures send through SAP Gateway.
    #[default]
    Gateway,
    /// Minimal headers for calling the backend host directly.
    Direct { host: String },
}

/// Externally supplied knobs of the payload. Boundary ids only need to be
/// unique within one request; the defaults match the recorded captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub batch_boundary: String,
    pub changeset_boundary: String,
    pub sap_client: String,
    pub entity_set: String,
    pub merge_key: String,
    pub top: u32,
    pub profile: HeaderProfile,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_boundary: DEFAULT_BATCH_BOUNDARY.to_string(),
            changeset_boundary: DEFAULT_CHANGESET_BOUNDARY.to_string(),
            sap_client: DEFAULT_SAP_CLIENT.to_string(),
            entity_set: DEFAULT_ENTITY_SET.to_string(),
            merge_key: DEFAULT_MERGE_KEY.to_string(),
            top: 1,
            profile: HeaderProfile::Gateway,
        }
    }
}

impl BatchConfig {
    /// Defaults overridden by `BATCH_BOUNDARY`, `CHANGESET_BOUNDARY`,
    /// `S4_SAP_CLIENT`, `BATCH_ENTITY_SET`, `BATCH_MERGE_KEY` and `BATCH_TOP`.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            batch_boundary: env_opt("BATCH_BOUNDARY").unwrap_or(d.batch_boundary),
            changeset_boundary: env_opt("CHANGESET_BOUNDARY").unwrap_or(d.changeset_boundary),
            sap_client: env_opt("S4_SAP_CLIENT").unwrap_or(d.sap_client),
            entity_set: env_opt("BATCH_ENTITY_SET").unwrap_or(d.entity_set),
            merge_key: env_opt("BATCH_MERGE_KEY").unwrap_or(d.merge_key),
            top: env_parse("BATCH_TOP", d.top),
            profile: d.profile,
        }
    }

    pub fn with_profile(mut self, profile: HeaderProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn batch_delimiter(&self) -> String {
        format!("--batch_{}", self.batch_boundary)
    }

    pub fn batch_close(&self) -> String {
        format!("--batch_{}--", self.batch_boundary)
    }

    pub fn changeset_delimiter(&self) -> String {
        format!("--changeset_{}", self.changeset_boundary)
    }

    pub fn changeset_close(&self) -> String {
        format!("--changeset_{}--", self.changeset_boundary)
    }

    /// `Content-Type` of the outer `$batch` POST.
    pub fn content_type(&self) -> String {
        format!("multipart/mixed; boundary=batch_{}", self.batch_boundary)
    }
}

/// Compact JSON body of the MERGE: the three caller fields plus the fixed job markers.
pub fn merge_body(fields: &UpdateFields) -> String {
    let body = MergeBody {
        requirement_segment: &fields.requirement_segment,
        plant: &fields.plant,
        storage_location: &fields.storage_location,
        job_action: JOB_ACTION,
        internal_comment: JOB_COMMENT,
        sales_ord_item_is_selected: SELECTED,
        sales_ord_items_are_selected: SELECTED,
    };
    // A struct of borrowed strings has no failing serialization path.
    serde_json::to_string(&body).unwrap_or_default()
}

/// Percent-encoded `$filter` value. Filter values are interpolated as-is.
pub fn filter_expression(filters: &BatchFilters) -> String {
    format!(
        "startswith(Material,%27{material}%27)\
         %20and%20Plant%20eq%20%27{plant}%27\
         %20and%20SalesDocumentDate%20eq%20datetime%27{date}T00%3a00%3a00%27\
         %20and%20SalesOrganization%20eq%20%27{sales_org}%27",
        material = filters.material_starts_with,
        plant = filters.plant,
        date = filters.creation_date,
        sales_org = filters.sales_org,
    )
}

fn merge_request_line(cfg: &BatchConfig) -> String {
    format!(
        "MERGE {}({})?sap-client={} HTTP/1.1",
        cfg.entity_set, cfg.merge_key, cfg.sap_client
    )
}

fn get_request_line(filters: &BatchFilters, cfg: &BatchConfig) -> String {
    let filter = filter_expression(filters);
    match cfg.profile {
        HeaderProfile::Gateway => format!(
            "GET {}?sap-client={}&$top={}&$filter={} HTTP/1.1",
            cfg.entity_set, cfg.sap_client, cfg.top, filter
        ),
        HeaderProfile::Direct { .. } => format!(
            "GET {}?$top={}&sap-client={}&$filter={} HTTP/1.1",
            cfg.entity_set, cfg.top, cfg.sap_client, filter
        ),
    }
}

const GATEWAY_COMMON_HEADERS: [&str; 6] = [
    "Accept: application/json",
    "Accept-Language: en",
    "DataServiceVersion: 2.0",
    "MaxDataServiceVersion: 2.0",
    "X-Requested-With: XMLHttpRequest",
    "sap-message-scope: BusinessObject",
];

fn merge_headers(cfg: &BatchConfig, body_len: usize) -> Vec<String> {
    match &cfg.profile {
        HeaderProfile::Gateway => {
            let mut h = vec!["sap-contextid-accept: header".to_string()];
            h.extend(GATEWAY_COMMON_HEADERS[..5].iter().map(|s| s.to_string()));
            h.push("Content-Type: application/json".to_string());
            h.push(GATEWAY_COMMON_HEADERS[5].to_string());
            h
        }
        HeaderProfile::Direct { host } => vec![
            format!("Host: {host}"),
            "Content-Type: application/json".to_string(),
            format!("Content-Length: {body_len}"),
            "Accept: application/json".to_string(),
        ],
    }
}

fn get_headers(cfg: &BatchConfig) -> Vec<String> {
    match &cfg.profile {
        HeaderProfile::Gateway => {
            let mut h = vec![
                "sap-cancel-on-close: true".to_string(),
                "sap-contextid-accept: header".to_string(),
            ];
            h.extend(GATEWAY_COMMON_HEADERS.iter().map(|s| s.to_string()));
            h
        }
        HeaderProfile::Direct { host } => vec![
            format!("Host: {host}"),
            "Accept: application/json".to_string(),
        ],
    }
}

fn http_part_headers() -> [String; 2] {
    [
        "Content-Type: application/http".to_string(),
        "Content-Transfer-Encoding: binary".to_string(),
    ]
}

/// Assemble the full multipart/mixed body. Pure; malformed filter values yield
/// a malformed payload rather than an error.
pub fn build_batch_payload(
    filters: &BatchFilters,
    fields: &UpdateFields,
    cfg: &BatchConfig,
) -> String {
    let body = merge_body(fields);
    let mut lines: Vec<String> = Vec::with_capacity(40);

    lines.push(cfg.batch_delimiter());
    lines.push(format!(
        "Content-Type: multipart/mixed; boundary=changeset_{}",
        cfg.changeset_boundary
    ));
    lines.push(String::new());

    // changeset: MERGE
    lines.push(cfg.changeset_delimiter());
    lines.extend(http_part_headers());
    lines.push(String::new());
    lines.push(merge_request_line(cfg));
    lines.extend(merge_headers(cfg, body.len()));
    lines.push(String::new());
    lines.push(body);
    lines.push(cfg.changeset_close());
    lines.push(String::new());

    // standalone GET, no body
    lines.push(cfg.batch_delimiter());
    lines.extend(http_part_headers());
    lines.push(String::new());
    lines.push(get_request_line(filters, cfg));
    lines.extend(get_headers(cfg));
    lines.push(String::new());
    lines.push(cfg.batch_close());

    lines.join(CRLF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn example_filters() -> BatchFilters {
        BatchFilters {
            material_starts_with: "ABC".to_string(),
            plant: "140A".to_string(),
            sales_org: "142".to_string(),
            creation_date: "2026-01-13".to_string(),
        }
    }

    fn example_fields() -> UpdateFields {
        UpdateFields {
            requirement_segment: "X".to_string(),
            plant: "140A".to_string(),
            storage_location: "Y".to_string(),
        }
    }

    fn gateway_payload() -> String {
        build_batch_payload(&example_filters(), &example_fields(), &BatchConfig::default())
    }

    fn count_lines(payload: &str, line: &str) -> usize {
        payload.split(CRLF).filter(|l| *l == line).count()
    }

    #[test]
    fn test_payload_prefix_and_suffix() {
        let payload = gateway_payload();
        assert!(payload.starts_with(
            "--batch_Test01\r\nContent-Type: multipart/mixed; boundary=changeset_Ugo1\r\n\r\n--changeset_Ugo1\r\n"
        ));
        assert!(payload.ends_with("\r\n\r\n--batch_Test01--"));
        assert!(!payload.ends_with(CRLF));
    }

    #[test]
    fn test_only_crlf_line_endings() {
        for cfg in [
            BatchConfig::default(),
            BatchConfig::default().with_profile(HeaderProfile::Direct {
                host: "s4.example:44300".to_string(),
            }),
        ] {
            let payload = build_batch_payload(&example_filters(), &example_fields(), &cfg);
            let lf = payload.matches('\n').count();
            let crlf = payload.matches(CRLF).count();
            assert!(crlf > 0);
            assert_eq!(lf, crlf, "bare LF found");
            assert_eq!(payload.matches('\r').count(), crlf, "bare CR found");
        }
    }

    #[test]
    fn test_boundary_counts() {
        let payload = gateway_payload();
        assert_eq!(count_lines(&payload, "--batch_Test01"), 2);
        assert_eq!(payload.matches("--batch_Test01--").count(), 1);
        assert_eq!(payload.matches("--changeset_Ugo1").count(), 2);
        assert_eq!(payload.matches("--changeset_Ugo1--").count(), 1);
    }

    #[test]
    fn test_merge_body_round_trips() {
        let payload = gateway_payload();
        let body_line = payload
            .split(CRLF)
            .find(|l| l.starts_with('{'))
            .expect("json body line");
        let v: Value = serde_json::from_str(body_line).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj.len(), 7);
        assert_eq!(obj["RequirementSegment"], "X");
        assert_eq!(obj["Plant"], "140A");
        assert_eq!(obj["StorageLocation"], "Y");
        assert_eq!(obj["RFM_SD_ApplJobAction"], "01");
        assert_eq!(obj["InternalComment"], "Mass Field Update from Joule");
        assert_eq!(obj["SalesOrdItemIsSelected"], "X");
        assert_eq!(obj["SalesOrdItemsAreSelected"], "X");
    }

    #[test]
    fn test_structure_holds_for_varied_values() {
        let filter_cases = [
            ("", "", "", ""),
            ("J01AA0119J35002001", "142A", "142", "2026-01-13"),
            ("MAT-ü漢字", "Å1", "ß", "2026-12-31"),
            ("O'Brien\\x", "P\"1", "  ", "0000-00-00"),
        ];
        let field_cases = [
            ("", "", ""),
            ("PPCOMFR", "140A", "ROD"),
            ("seg\nment", "line\r\nbreak", "tab\there"),
            ("quo\"te", "back\\slash", "üñí©ødé 🚚"),
        ];
        let profiles = [
            HeaderProfile::Gateway,
            HeaderProfile::Direct {
                host: "s4.example:44300".to_string(),
            },
        ];

        for (material, plant, sales_org, date) in filter_cases {
            for (segment, to_plant, sloc) in field_cases {
                for profile in profiles.clone() {
                    let filters = BatchFilters {
                        material_starts_with: material.to_string(),
                        plant: plant.to_string(),
                        sales_org: sales_org.to_string(),
                        creation_date: date.to_string(),
                    };
                    let fields = UpdateFields {
                        requirement_segment: segment.to_string(),
                        plant: to_plant.to_string(),
                        storage_location: sloc.to_string(),
                    };
                    let cfg = BatchConfig::default().with_profile(profile);
                    let payload = build_batch_payload(&filters, &fields, &cfg);
                    let case = format!("{filters:?} / {fields:?} / {:?}", cfg.profile);

                    let crlf = payload.matches(CRLF).count();
                    assert_eq!(payload.matches('\n').count(), crlf, "bare LF: {case}");
                    assert_eq!(payload.matches('\r').count(), crlf, "bare CR: {case}");
                    assert!(!payload.ends_with(CRLF), "{case}");

                    assert_eq!(count_lines(&payload, "--batch_Test01"), 2, "{case}");
                    assert_eq!(payload.matches("--batch_Test01--").count(), 1, "{case}");
                    assert_eq!(payload.matches("--changeset_Ugo1").count(), 2, "{case}");
                    assert_eq!(payload.matches("--changeset_Ugo1--").count(), 1, "{case}");

                    let body_line = payload
                        .split(CRLF)
                        .find(|l| l.starts_with('{'))
                        .expect("json body line");
                    let v: Value = serde_json::from_str(body_line).unwrap();
                    assert_eq!(v.as_object().unwrap().len(), 7, "{case}");
                    assert_eq!(v["RequirementSegment"], segment, "{case}");
                    assert_eq!(v["Plant"], to_plant, "{case}");
                    assert_eq!(v["StorageLocation"], sloc, "{case}");
                }
            }
        }
    }

    #[test]
    fn test_merge_body_escapes_json() {
        let mut fields = example_fields();
        fields.storage_location = "R\"O\\D".to_string();
        let v: Value = serde_json::from_str(&merge_body(&fields)).unwrap();
        assert_eq!(v["StorageLocation"], "R\"O\\D");
    }

    #[test]
    fn test_get_filter_encoding() {
        let payload = gateway_payload();
        let get_line = payload
            .split(CRLF)
            .find(|l| l.starts_with("GET "))
            .unwrap();
        assert_eq!(
            get_line,
            "GET C_RFM_MaSaDoEditSlsOrdItm?sap-client=200&$top=1&$filter=\
             startswith(Material,%27ABC%27)%20and%20Plant%20eq%20%27140A%27\
             %20and%20SalesDocumentDate%20eq%20datetime%272026-01-13T00%3a00%3a00%27\
             %20and%20SalesOrganization%20eq%20%27142%27 HTTP/1.1"
        );
        assert_eq!(get_line.matches("%20and%20").count(), 3);
        assert!(get_line.contains("%27ABC%27"));
        assert!(get_line.contains("%27140A%27"));
        assert!(get_line.contains("%27142%27"));
    }

    #[test]
    fn test_gateway_merge_section() {
        let payload = gateway_payload();
        let lines: Vec<&str> = payload.split(CRLF).collect();
        let merge_idx = lines.iter().position(|l| l.starts_with("MERGE ")).unwrap();
        assert_eq!(
            lines[merge_idx],
            "MERGE C_RFM_MaSaDoEditSlsOrdItm(SalesOrder='100001681',SalesOrderItem='000010')?sap-client=200 HTTP/1.1"
        );
        assert_eq!(
            &lines[merge_idx + 1..merge_idx + 9],
            &[
                "sap-contextid-accept: header",
                "Accept: application/json",
                "Accept-Language: en",
                "DataServiceVersion: 2.0",
                "MaxDataServiceVersion: 2.0",
                "X-Requested-With: XMLHttpRequest",
                "Content-Type: application/json",
                "sap-message-scope: BusinessObject",
            ]
        );
        assert_eq!(lines[merge_idx + 9], "");
        assert!(lines[merge_idx + 10].starts_with('{'));
        assert_eq!(lines[merge_idx + 11], "--changeset_Ugo1--");
    }

    #[test]
    fn test_get_section_has_no_body() {
        let payload = gateway_payload();
        let lines: Vec<&str> = payload.split(CRLF).collect();
        let n = lines.len();
        assert_eq!(lines[n - 1], "--batch_Test01--");
        assert_eq!(lines[n - 2], "");
        assert_eq!(lines[n - 3], "sap-message-scope: BusinessObject");
        assert_eq!(lines[n - 10], "sap-cancel-on-close: true");
        assert!(lines[n - 11].starts_with("GET "));
    }

    #[test]
    fn test_custom_boundaries_and_client() {
        let cfg = BatchConfig {
            batch_boundary: "b42".to_string(),
            changeset_boundary: "cs42".to_string(),
            sap_client: "110".to_string(),
            top: 5,
            ..BatchConfig::default()
        };
        let payload = build_batch_payload(&example_filters(), &example_fields(), &cfg);
        assert!(payload.starts_with("--batch_b42\r\nContent-Type: multipart/mixed; boundary=changeset_cs42\r\n"));
        assert!(payload.ends_with("--batch_b42--"));
        assert!(payload.contains("?sap-client=110 HTTP/1.1"));
        assert!(payload.contains("?sap-client=110&$top=5&$filter="));
        assert!(!payload.contains("Test01"));
        assert_eq!(cfg.content_type(), "multipart/mixed; boundary=batch_b42");
    }

    #[test]
    fn test_direct_profile_headers() {
        let cfg = BatchConfig::default().with_profile(HeaderProfile::Direct {
            host: "s4.example:44300".to_string(),
        });
        let payload = build_batch_payload(&example_filters(), &example_fields(), &cfg);
        let body_len = merge_body(&example_fields()).len();

        assert!(payload.contains(&format!("Content-Length: {body_len}\r\n")));
        assert_eq!(payload.matches("Host: s4.example:44300").count(), 2);
        assert!(payload.contains("GET C_RFM_MaSaDoEditSlsOrdItm?$top=1&sap-client=200&$filter="));
        assert!(!payload.contains("sap-message-scope"));
        assert_eq!(count_lines(&payload, "--batch_Test01"), 2);
        assert!(payload.ends_with("Accept: application/json\r\n\r\n--batch_Test01--"));
    }

    #[test]
    fn test_filters_serde_names_match_service() {
        let v = serde_json::to_value(example_filters()).unwrap();
        assert_eq!(v["materialStartsWith"], "ABC");
        assert_eq!(v["salesOrg"], "142");
        assert_eq!(v["creationDate"], "2026-01-13");
        let f = serde_json::to_value(example_fields()).unwrap();
        assert_eq!(f["RequirementSegment"], "X");
        assert_eq!(f["StorageLocation"], "Y");
    }
}
