use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    grid::{Column, DateField, Record},
    render::{self, RenderTarget},
};

pub type Pk = i64;

pub type Timestamp = DateTime<FixedOffset>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Automation {
    #[serde(rename = "Auto Create")]
    pub create: bool,
    #[serde(rename = "Auto Start")]
    pub start: bool,
    #[serde(rename = "Auto Retrieve")]
    pub retrieve: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRow {
    #[serde(rename = "PK")]
    pub pk: Pk,
    #[serde(rename = "Scan Name")]
    pub scan_name: Link,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Automation")]
    pub automation: Automation,
    #[serde(rename = "Parent Scanner")]
    pub parent_scanner: Link,
    #[serde(rename = "Created On", default, deserialize_with = "timestamp")]
    pub created_on: Option<Timestamp>,
    #[serde(rename = "Started On", default, deserialize_with = "timestamp")]
    pub started_on: Option<Timestamp>,
    #[serde(rename = "Ended On", default, deserialize_with = "timestamp")]
    pub ended_on: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerRow {
    #[serde(rename = "PK")]
    pub pk: Pk,
    #[serde(rename = "Scanner Name")]
    pub scanner_name: Link,
    #[serde(rename = "# of Child Scans")]
    pub child_scans: i64,
    #[serde(rename = "Created On", default, deserialize_with = "timestamp")]
    pub created_on: Option<Timestamp>,
}

/// Envelope returned by the list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<R> {
    pub data: Vec<R>,
}

/// Accepts RFC 3339 or an offset-less ISO timestamp, which is read as local time.
fn timestamp<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| parse_timestamp(&s).map_err(serde::de::Error::custom))
        .transpose()
}

pub fn parse_timestamp(s: &str) -> Result<Timestamp, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts);
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|e| format!("invalid timestamp {s:?}: {e}"))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|ts| ts.fixed_offset())
        .ok_or_else(|| format!("timestamp {s:?} does not exist in the local timezone"))
}

fn scan_pk(r: &ScanRow, _: RenderTarget) -> String {
    r.pk.to_string()
}

fn scan_name(r: &ScanRow, target: RenderTarget) -> String {
    render::link(&r.scan_name, target)
}

fn scan_status(r: &ScanRow, _: RenderTarget) -> String {
    r.status.clone()
}

fn scan_automation(r: &ScanRow, _: RenderTarget) -> String {
    render::automation(&r.automation)
}

fn scan_parent(r: &ScanRow, target: RenderTarget) -> String {
    render::link(&r.parent_scanner, target)
}

fn scan_created(r: &ScanRow, _: RenderTarget) -> String {
    render::datetime(r.created_on.as_ref())
}

fn scan_started(r: &ScanRow, _: RenderTarget) -> String {
    render::datetime(r.started_on.as_ref())
}

fn scan_ended(r: &ScanRow, _: RenderTarget) -> String {
    render::datetime(r.ended_on.as_ref())
}

const SCAN_COLUMNS: &[Column<ScanRow>] = &[
    Column::new("PK", scan_pk),
    Column::new("Scan Name", scan_name),
    Column::new("Status", scan_status),
    Column::new("Automation", scan_automation),
    Column::new("Parent Scanner", scan_parent),
    Column::new("Created On", scan_created),
    Column::new("Started On", scan_started),
    Column::new("Ended On", scan_ended),
];

impl Record for ScanRow {
    fn pk(&self) -> Pk {
        self.pk
    }

    fn columns() -> &'static [Column<Self>] {
        SCAN_COLUMNS
    }

    fn date_fields() -> &'static [DateField] {
        &[DateField::Created, DateField::Started, DateField::Ended]
    }

    fn timestamp(&self, field: DateField) -> Option<&Timestamp> {
        match field {
            DateField::Created => self.created_on.as_ref(),
            DateField::Started => self.started_on.as_ref(),
            DateField::Ended => self.ended_on.as_ref(),
        }
    }
}

fn scanner_pk(r: &ScannerRow, _: RenderTarget) -> String {
    r.pk.to_string()
}

fn scanner_name(r: &ScannerRow, target: RenderTarget) -> String {
    render::link(&r.scanner_name, target)
}

fn scanner_children(r: &ScannerRow, _: RenderTarget) -> String {
    r.child_scans.to_string()
}

fn scanner_created(r: &ScannerRow, _: RenderTarget) -> String {
    render::datetime(r.created_on.as_ref())
}

const SCANNER_COLUMNS: &[Column<ScannerRow>] = &[
    Column::new("PK", scanner_pk),
    Column::new("Scanner Name", scanner_name),
    Column::new("# of Child Scans", scanner_children),
    Column::new("Created On", scanner_created),
];

impl Record for ScannerRow {
    fn pk(&self) -> Pk {
        self.pk
    }

    fn columns() -> &'static [Column<Self>] {
        SCANNER_COLUMNS
    }

    fn date_fields() -> &'static [DateField] {
        &[DateField::Created]
    }

    fn timestamp(&self, field: DateField) -> Option<&Timestamp> {
        match field {
            DateField::Created => self.created_on.as_ref(),
            DateField::Started | DateField::Ended => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCAN_JSON: &str = r#"{"data": [{
        "PK": 4,
        "Scan Name": {"URL": "http://h/scan/4/", "Name": "weekly &amp; nightly"},
        "Status": "Started",
        "Automation": {"Auto Create": true, "Auto Start": false, "Auto Retrieve": true},
        "Parent Scanner": {"URL": "http://h/scanner/1/", "Name": "nessus"},
        "Created On": "2024-03-05T07:08:09.123Z",
        "Started On": null,
        "Ended On": null
    }]}"#;

    #[test]
    fn scan_list_deserializes() {
        let list: ListResponse<ScanRow> = serde_json::from_str(SCAN_JSON).unwrap();
        let row = &list.data[0];
        assert_eq!(row.pk, 4);
        assert_eq!(row.scan_name.name, "weekly &amp; nightly");
        assert!(row.automation.create && !row.automation.start && row.automation.retrieve);
        assert!(row.created_on.is_some());
        assert!(row.started_on.is_none());
    }

    #[test]
    fn scanner_list_tolerates_missing_date() {
        let json = r##"{"data": [{"PK": 1, "Scanner Name": {"URL": "u", "Name": "n"}, "# of Child Scans": 3}]}"##;
        let list: ListResponse<ScannerRow> = serde_json::from_str(json).unwrap();
        assert_eq!(list.data[0].child_scans, 3);
        assert!(list.data[0].created_on.is_none());
    }

    #[test]
    fn offsetless_timestamp_is_accepted() {
        assert!(parse_timestamp("2024-03-05T07:08:09").is_ok());
        assert!(parse_timestamp("2024-03-05 07:08:09.5").is_ok());
        assert!(parse_timestamp("yesterday").is_err());
    }
}
