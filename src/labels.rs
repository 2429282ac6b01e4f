use calamine::{open_workbook_auto, Data, Range, Reader};
use csv::{ReaderBuilder, Trim};
use std::{collections::BTreeMap, io, path::Path};
use thiserror::Error;

const INDEX_HEADER: &str = "Class Index";
const NAME_HEADER: &str = "Class Name";

#[derive(Error, Debug)]
pub enum LabelError {
    #[error("failed to read labels file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to read csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to read spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("spreadsheet has no worksheet")]
    NoWorksheet,
    #[error("missing `{0}` column")]
    MissingColumn(&'static str),
    #[error("invalid class index `{value}` on row {row}")]
    InvalidIndex { row: usize, value: String },
    #[error("empty class name on row {row}")]
    EmptyName { row: usize },
    #[error("labels file contains no classes")]
    Empty,
}

/// Class index to raw breed name, e.g. `12 -> "Maine_Coon"`.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTable {
    labels: BTreeMap<usize, String>,
}

impl LabelTable {
    pub fn from_entries<I, S>(entries: I) -> Result<Self, LabelError>
    where
        I: IntoIterator<Item = (usize, S)>,
        S: Into<String>,
    {
        let labels: BTreeMap<usize, String> = entries
            .into_iter()
            .map(|(index, name)| (index, name.into()))
            .collect();
        if labels.is_empty() {
            return Err(LabelError::Empty);
        }
        Ok(Self { labels })
    }

    /// Reads `.csv` files as text and anything else as a spreadsheet.
    pub fn load(path: &Path) -> Result<Self, LabelError> {
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

        if is_csv {
            let file = std::fs::File::open(path)?;
            Self::from_csv(file)
        } else {
            let mut workbook = open_workbook_auto(path)?;
            let range = workbook
                .worksheet_range_at(0)
                .ok_or(LabelError::NoWorksheet)??;
            Self::from_range(&range)
        }
    }

    pub fn from_range(range: &Range<Data>) -> Result<Self, LabelError> {
        let mut rows = range.rows();
        let header: Vec<String> = rows
            .next()
            .ok_or(LabelError::MissingColumn(INDEX_HEADER))?
            .iter()
            .map(|cell| cell.to_string())
            .collect();
        let (index_col, name_col) = header_columns(&header)?;

        let mut entries = Vec::new();
        for (offset, row) in rows.enumerate() {
            let row_number = offset + 2;
            let index = match row.get(index_col) {
                None | Some(Data::Empty) => continue,
                Some(cell) => parse_index_cell(cell).ok_or_else(|| LabelError::InvalidIndex {
                    row: row_number,
                    value: cell.to_string(),
                })?,
            };
            let name = row
                .get(name_col)
                .map(|cell| cell.to_string())
                .unwrap_or_default();
            entries.push((index, non_empty_name(&name, row_number)?));
        }

        Self::from_entries(entries)
    }

    pub fn from_csv<R: io::Read>(reader: R) -> Result<Self, LabelError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let header: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let (index_col, name_col) = header_columns(&header)?;

        let mut entries = Vec::new();
        for (offset, record) in rdr.records().enumerate() {
            let record = record?;
            let row_number = offset + 2;
            let index = match record.get(index_col) {
                None | Some("") => continue,
                Some(value) => value.parse::<usize>().map_err(|_| LabelError::InvalidIndex {
                    row: row_number,
                    value: value.to_string(),
                })?,
            };
            let name = record.get(name_col).unwrap_or("");
            entries.push((index, non_empty_name(name, row_number)?));
        }

        Self::from_entries(entries)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(&index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// True when the indices are exactly `0..len`.
    pub fn is_contiguous(&self) -> bool {
        self.labels.keys().copied().eq(0..self.labels.len())
    }
}

fn header_columns(header: &[String]) -> Result<(usize, usize), LabelError> {
    let find = |name: &'static str| {
        header
            .iter()
            .position(|cell| cell.trim_start_matches('\u{feff}').trim() == name)
            .ok_or(LabelError::MissingColumn(name))
    };
    Ok((find(INDEX_HEADER)?, find(NAME_HEADER)?))
}

fn non_empty_name(name: &str, row: usize) -> Result<String, LabelError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LabelError::EmptyName { row });
    }
    Ok(name.to_string())
}

fn parse_index_cell(cell: &Data) -> Option<usize> {
    match cell {
        Data::Int(i) => usize::try_from(*i).ok(),
        Data::Float(f) if f.fract() == 0.0 && *f >= 0.0 => Some(*f as usize),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
