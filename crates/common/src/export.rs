use std::path::Path;

use anyhow::Result;
use csv::Writer;

use crate::{grid::Record, render::RenderTarget};

/// Writes `rows` as CSV using the plain cell renders, one column per grid column.
pub fn export_rows_to_csv<'a, R: Record>(path: &Path, rows: impl IntoIterator<Item = &'a R>) -> Result<usize> {
    let mut wtr = Writer::from_path(path)?;

    // Write header
    wtr.write_record(R::columns().iter().map(|c| c.title))?;

    let mut written = 0;
    for row in rows {
        wtr.write_record(R::columns().iter().map(|c| (c.render)(row, RenderTarget::Plain)))?;
        written += 1;
    }

    wtr.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Table, tests::scan};

    #[test]
    fn exports_visible_rows_with_header() {
        let mut table = Table::new(vec![
            scan(1, "alpha", "Created", None),
            scan(2, "beta, gamma", "Started", None),
        ]);
        table.search("beta", false, true).draw();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scans.csv");
        let written = export_rows_to_csv(&path, table.visible()).unwrap();
        assert_eq!(written, 1);

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("PK,Scan Name,Status,Automation,Parent Scanner,Created On,Started On,Ended On")
        );
        assert_eq!(lines.next(), Some("2,\"beta, gamma\",Started,   ,nessus,-,-,-"));
        assert_eq!(lines.next(), None);
    }
}
