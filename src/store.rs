use std::{fs::{self, File, OpenOptions}, io::Write, path::Path};

use tracing::warn;

use crate::{error::StoreError, record::{JobRecord, ListingIdentity}};

/// Column order of every dataset file.
pub(crate) const HEADERS: [&str; 7] = [
    "Job_Index",
    "Job_Title",
    "Company_Name",
    "Job_Location",
    "Tasks",
    "Skills",
    "Job_Search_Term"
];

const INDEX_COLUMN: &str = HEADERS[0];
const TITLE_COLUMN: &str = HEADERS[1];
const COMPANY_COLUMN: &str = HEADERS[2];


/// Whether `path` is a file with at least one byte in it.
pub(crate) fn has_content(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}


fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(StoreError::io(parent))
        }
        _ => Ok(())
    }
}


fn reader(path: &Path, delimiter: u8) -> Result<csv::Reader<File>, StoreError> {
    let file = File::open(path).map_err(StoreError::io(path))?;
    Ok(csv::ReaderBuilder::new().delimiter(delimiter).from_reader(file))
}


fn writer<W: Write>(inner: W, delimiter: u8) -> csv::Writer<W> {
    // Headers are written explicitly so that an empty dataset still gets them.
    csv::WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_writer(inner)
}


/// Every record in a dataset file.
pub(crate) fn read_records(path: &Path, delimiter: u8) -> Result<Vec<JobRecord>, StoreError> {
    reader(path, delimiter)?
        .deserialize::<JobRecord>()
        .collect::<Result<_, _>>()
        .map_err(StoreError::csv(path))
}


/// Records of `path`, or `None` if the file is missing or empty.
pub(crate) fn read_records_if_present(path: &Path, delimiter: u8) -> Result<Option<Vec<JobRecord>>, StoreError> {
    if has_content(path) {
        read_records(path, delimiter).map(Some)
    } else {
        Ok(None)
    }
}


fn layout_error(path: &Path, problem: String) -> StoreError {
    StoreError::Layout { path: path.to_path_buf(), problem }
}


/// Identities of all listings in `path`. A missing or empty file has none.
///
/// Only the two identity columns are read, so files from older layouts still count. A file
/// without them is an error, as it usually means the delimiter is wrong.
pub(crate) fn read_identities(path: &Path, delimiter: u8) -> Result<Vec<ListingIdentity>, StoreError> {
    if !has_content(path) {
        return Ok(Vec::new());
    }
    let mut reader = reader(path, delimiter)?;
    let headers = reader.headers().map_err(StoreError::csv(path))?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let (Some(title), Some(company)) = (column(TITLE_COLUMN), column(COMPANY_COLUMN)) else {
        return Err(layout_error(path, format!("no {TITLE_COLUMN} and {COMPANY_COLUMN} columns")));
    };

    let mut identities = Vec::new();
    for row in reader.records() {
        let row = row.map_err(StoreError::csv(path))?;
        identities.push(ListingIdentity::new(
            row.get(title).unwrap_or_default(),
            row.get(company).unwrap_or_default()
        ));
    }
    Ok(identities)
}


/// How rows appended to an existing file have to be laid out.
#[derive(Debug, PartialEq, Eq)]
enum Layout {
    /// Missing or empty, so it gets a header first.
    New,
    Current,
    /// Written by an older version; positions in [`HEADERS`] of its columns, in file order.
    Legacy(Vec<usize>)
}

fn layout(path: &Path, delimiter: u8) -> Result<Layout, StoreError> {
    if !has_content(path) {
        return Ok(Layout::New);
    }
    let headers = reader(path, delimiter)?.headers().map_err(StoreError::csv(path))?.clone();
    let positions = headers
        .iter()
        .map(|name| {
            HEADERS
                .iter()
                .position(|h| *h == name.trim())
                .ok_or_else(|| layout_error(path, format!("unknown column '{}'", name.trim())))
        })
        .collect::<Result<Vec<_>, _>>()?;

    for required in [INDEX_COLUMN, TITLE_COLUMN, COMPANY_COLUMN] {
        if !positions.iter().any(|&p| HEADERS[p] == required) {
            return Err(layout_error(path, format!("no {required} column")));
        }
    }
    if positions.iter().copied().eq(0..HEADERS.len()) {
        Ok(Layout::Current)
    } else {
        Ok(Layout::Legacy(positions))
    }
}

/// Column values of `record` in [`HEADERS`] order.
fn fields(record: &JobRecord) -> [String; 7] {
    [
        record.index.to_string(),
        record.title.clone(),
        record.company.clone(),
        record.location.clone(),
        record.tasks.to_column(),
        record.skills.to_column(),
        record.search_term.clone()
    ]
}


/// Appends records to `path`, creating it with a header row if it is missing or empty.
///
/// A file written with fewer or reordered columns keeps its header, and the rows follow it.
/// Nothing is written when the header has columns this crate does not know.
pub(crate) fn append_records<'a>(
    path: &Path,
    records: impl IntoIterator<Item = &'a JobRecord>,
    delimiter: u8
) -> Result<(), StoreError> {
    ensure_parent(path)?;
    let layout = layout(path, delimiter)?;
    if let Layout::Legacy(columns) = &layout {
        let dropped: Vec<_> = HEADERS
            .iter()
            .enumerate()
            .filter(|(i, _)| !columns.contains(i))
            .map(|(_, h)| *h)
            .collect();
        if !dropped.is_empty() {
            warn!("{} has no {} column(s), those values are not stored", path.display(), dropped.join(", "));
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(StoreError::io(path))?;

    let mut writer = writer(file, delimiter);
    if layout == Layout::New {
        writer.write_record(HEADERS).map_err(StoreError::csv(path))?;
    }
    for record in records {
        match &layout {
            Layout::Legacy(columns) => {
                let fields = fields(record);
                writer
                    .write_record(columns.iter().map(|&c| fields[c].as_str()))
                    .map_err(StoreError::csv(path))?;
            }
            Layout::New | Layout::Current => writer.serialize(record).map_err(StoreError::csv(path))?
        }
    }
    writer.flush().map_err(StoreError::io(path))
}


/// Appends one record and flushes it to disk before returning.
pub(crate) fn append_record(path: &Path, record: &JobRecord, delimiter: u8) -> Result<(), StoreError> {
    append_records(path, [record], delimiter)
}


/// Writes `records` to `path` with a header row, replacing whatever was there.
pub(crate) fn write_records(path: &Path, records: &[JobRecord], delimiter: u8) -> Result<(), StoreError> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(StoreError::io(path))?;
    let mut writer = writer(file, delimiter);
    writer.write_record(HEADERS).map_err(StoreError::csv(path))?;
    for record in records {
        writer.serialize(record).map_err(StoreError::csv(path))?;
    }
    writer.flush().map_err(StoreError::io(path))
}


/// Copies a delimited file to `output` with a different delimiter, keeping every column.
///
/// Returns the number of data rows written.
pub(crate) fn convert_delimiter(input: &Path, output: &Path, from: u8, to: u8) -> Result<usize, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(from)
        .has_headers(false)
        .flexible(true)
        .from_path(input)
        .map_err(StoreError::csv(input))?;

    ensure_parent(output)?;
    let file = File::create(output).map_err(StoreError::io(output))?;
    let mut writer = writer(file, to);

    let mut rows = 0usize;
    for row in reader.records() {
        let row = row.map_err(StoreError::csv(input))?;
        writer.write_record(&row).map_err(StoreError::csv(output))?;
        rows += 1;
    }
    writer.flush().map_err(StoreError::io(output))?;
    // the first row is the header
    Ok(rows.saturating_sub(1))
}
