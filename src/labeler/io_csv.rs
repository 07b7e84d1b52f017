// Primitives for reading and writing the record CSV files.

use std::io::Read;

use labeling_core::{Consensus, Record};

use crate::labeler::*;

pub fn read_records(path: &str) -> LabelerResult<Vec<Record>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    parse_records(rdr)
}

/// Reads the records and drops the ones without data.
pub fn parse_records<R: Read>(mut rdr: csv::Reader<R>) -> LabelerResult<Vec<Record>> {
    let mut res: Vec<Record> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        if line.len() < 4 {
            warn!("Line {}: no data column, dropping the record", lineno);
            continue;
        }
        let field = |i: usize| line.get(i).unwrap_or("").trim().to_string();

        // Unquoted arrays are split by the reader: put them back together.
        let tail: Vec<&str> = line.iter().skip(3).collect();
        let columns = split_array_columns(&tail.join(","));
        let mut arrays = columns.iter().map(|c| {
            let parsed = parse_array(c);
            if parsed.is_none() {
                warn!("Line {}: failed to parse array field {:?}", lineno, c);
            }
            parsed
        });

        let data = arrays.next().flatten().unwrap_or_default();
        let lat = arrays.next().flatten();
        let lon = arrays.next().flatten();
        if columns.is_empty() {
            warn!("Line {}: no data array found in {:?}", lineno, tail);
        }
        if data.is_empty() {
            debug!("Line {}: dropping record without data", lineno);
            continue;
        }
        res.push(Record {
            day: field(0),
            station: field(1),
            satellite: field(2),
            data,
            lat,
            lon,
        });
    }
    Ok(res)
}

/// Splits the text following the first three columns into the bracketed
/// arrays it contains. Whatever is outside brackets (separators, quotes) is
/// dropped.
pub fn split_array_columns(s: &str) -> Vec<String> {
    let mut res: Vec<String> = Vec::new();
    let mut depth = 0;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' if depth > 0 => {
                depth -= 1;
                current.push(c);
                if depth == 0 {
                    res.push(std::mem::take(&mut current));
                }
            }
            _ if depth > 0 => current.push(c),
            _ => {}
        }
    }
    // Unterminated array: keep it so that it gets reported.
    if !current.is_empty() {
        res.push(current);
    }
    res
}

/// Reads a textual array of numbers such as `[1.5, NaN, -2]`.
pub fn parse_array(s: &str) -> Option<Vec<f64>> {
    let inner = s.trim().strip_prefix('[')?.strip_suffix(']')?.trim();
    if inner.is_empty() {
        return Some(Vec::new());
    }
    inner
        .split(',')
        .map(|tok| tok.trim().trim_matches(|c| c == '"' || c == '\'').parse::<f64>().ok())
        .collect()
}

fn format_array(xs: &[f64]) -> String {
    let parts: Vec<String> = xs.iter().map(|x| x.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

/// Writes the records that reached a good consensus, with their statistics.
pub fn write_good_records(path: &str, good: &[(&Record, Consensus)]) -> LabelerResult<()> {
    let mut wtr = csv::Writer::from_path(path).context(CsvWriteSnafu { path })?;
    wtr.write_record([
        "day",
        "station",
        "satellite",
        "data",
        "lat",
        "lon",
        "consensus_percent",
        "total_labels",
        "good_labels",
    ])
    .context(CsvWriteSnafu { path })?;
    for (r, c) in good {
        wtr.write_record([
            r.day.clone(),
            r.station.clone(),
            r.satellite.clone(),
            format_array(&r.data),
            r.lat.as_deref().map(format_array).unwrap_or_default(),
            r.lon.as_deref().map(format_array).unwrap_or_default(),
            c.good_fraction.to_string(),
            c.total.to_string(),
            c.good_count.to_string(),
        ])
        .context(CsvWriteSnafu { path })?;
    }
    wtr.flush()
        .context(WritingFileSnafu { path })?;
    Ok(())
}
