// src/parsing/sheets.rs - spreadsheet tab parsing
use anyhow::{anyhow, Result};
use log::{debug, warn};
use std::collections::HashMap;

use crate::config::SheetTabConfig;
use crate::models::core::{within_singapore, SheetRecord};

/// Column name of the optional per-row bidet override. Tabs without the
/// column keep the default (all tabs are bidet inventories).
const BIDET_HEADER: &str = "Bidet";

#[derive(Debug, Default)]
pub struct ParsedTab {
    pub records: Vec<SheetRecord>,
    pub rows_dropped: usize,
}

/// Boolean-like cell values: `true`/`yes`/`1`/`y` (case-insensitive) parse
/// to true, everything else to false.
pub fn parse_bool_cell(cell: &str) -> bool {
    matches!(cell.trim().to_lowercase().as_str(), "true" | "yes" | "1" | "y")
}

/// Parse one tab's raw CSV export into sheet records.
///
/// The exports carry preamble/title rows above the real header, so the
/// header row is located by scanning for the first line containing both of
/// the tab's expected header tokens. Rows failing the record invariant
/// (non-empty name AND (non-empty address OR usable coordinates)) are
/// dropped and counted, never raised.
pub fn parse_sheet_tab(raw: &str, tab: &SheetTabConfig) -> Result<ParsedTab> {
    let header_offset = locate_header_row(raw, tab).ok_or_else(|| {
        anyhow!(
            "tab '{}': no header row containing '{}' and '{}'",
            tab.name,
            tab.name_header,
            tab.address_header
        )
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(raw[header_offset..].as_bytes());

    let headers = reader.headers()?.clone();
    let columns: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, header)| (header.trim().to_lowercase(), idx))
        .collect();

    let column = |name: &str| columns.get(&name.trim().to_lowercase()).copied();
    let name_col = column(&tab.name_header)
        .ok_or_else(|| anyhow!("tab '{}': missing column '{}'", tab.name, tab.name_header))?;
    let address_col = column(&tab.address_header);
    let remarks_col = column(&tab.remarks_header);
    let region_col = tab.region_header.as_deref().and_then(column);
    let lat_col = tab.lat_header.as_deref().and_then(column);
    let lng_col = tab.lng_header.as_deref().and_then(column);
    let bidet_col = column(BIDET_HEADER);

    let mut parsed = ParsedTab::default();
    for row in reader.records() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                debug!("tab '{}': unreadable row: {}", tab.name, e);
                parsed.rows_dropped += 1;
                continue;
            }
        };
        let cell = |col: Option<usize>| {
            col.and_then(|idx| row.get(idx)).map(str::trim).unwrap_or("")
        };

        let raw_name = cell(Some(name_col)).to_string();
        let raw_address = cell(address_col).to_string();
        let coordinates = parse_coordinates(cell(lng_col), cell(lat_col), &tab.name, &raw_name);

        if raw_name.is_empty() || (raw_address.is_empty() && coordinates.is_none()) {
            parsed.rows_dropped += 1;
            continue;
        }

        parsed.records.push(SheetRecord {
            raw_name,
            raw_address,
            remarks: cell(remarks_col).to_string(),
            gender: tab.gender,
            source_tab: tab.name.clone(),
            region_hint: Some(cell(region_col).to_string())
                .filter(|region| !region.is_empty()),
            coordinates,
            has_bidet: bidet_col
                .map(|idx| parse_bool_cell(row.get(idx).unwrap_or("")))
                .unwrap_or(true),
        });
    }

    debug!(
        "tab '{}': {} records, {} rows dropped",
        tab.name,
        parsed.records.len(),
        parsed.rows_dropped
    );
    Ok(parsed)
}

/// Byte offset of the true header row: the first line mentioning both the
/// name and address header tokens (case-insensitive).
fn locate_header_row(raw: &str, tab: &SheetTabConfig) -> Option<usize> {
    let name_token = tab.name_header.to_lowercase();
    let address_token = tab.address_header.to_lowercase();
    let mut offset = 0;
    for line in raw.split_inclusive('\n') {
        let lowered = line.to_lowercase();
        if lowered.contains(&name_token) && lowered.contains(&address_token) {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

fn parse_coordinates(lng: &str, lat: &str, tab_name: &str, row_name: &str) -> Option<(f64, f64)> {
    if lng.is_empty() || lat.is_empty() {
        return None;
    }
    let (lng, lat) = (lng.parse::<f64>().ok()?, lat.parse::<f64>().ok()?);
    if within_singapore(lng, lat) {
        Some((lng, lat))
    } else {
        warn!(
            "tab '{}': row '{}' has out-of-bounds coordinates ({}, {})",
            tab_name, row_name, lng, lat
        );
        None
    }
}
