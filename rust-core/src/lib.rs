//! lib.rs — ядро lead-sheet
//! Editing of xlsx packages in place (rows as inline strings) plus the
//! sales-lead layer built on top of it.

mod files_part;
mod read_part;
mod test;

pub mod config;
pub mod error;
pub mod leads;

use anyhow::{Result, bail};
use quick_xml::{
    Reader, Writer,
    events::{BytesStart, BytesText, Event},
};
use std::{ops::Range, path::PathBuf};

pub use config::{CONFIG_FILENAME, Config, resolve_target_path};
pub use error::LeadError;
pub use files_part::{create_workbook, scan};
pub use leads::{AppendOutcome, FIELDNAMES, LeadAppender, LeadRecord, SHEET_NAME, append_lead};
pub use read_part::SheetRow;

/// `XlsxEditor` opens an xlsx package, selects one worksheet and edits its rows.
///
/// Everything is kept in memory until [`XlsxEditor::save`] rewrites the package.
/// Parts that were not touched are copied raw from the source archive.
pub struct XlsxEditor {
    src_path: PathBuf,
    sheet_name: String,
    sheet_path: String,
    sheet_xml: Vec<u8>,
    last_row: u32,
    workbook_xml: Vec<u8>,             // содержимое workbook.xml (может изменяться)
    rels_xml: Vec<u8>,                 // содержимое workbook.xml.rels
    content_types_xml: Vec<u8>,        // [Content_Types].xml
    shared_strings: Vec<String>,
    new_files: Vec<(String, Vec<u8>)>, // новые или изменённые файлы для записи при save()
}

/// Last row number a worksheet can hold.
pub const MAX_ROWS: u32 = 1_048_576;

/// Where a row with a given number lives (or would live) in `sheetData`.
enum RowSlot {
    Existing(Range<usize>),
    InsertAt(usize),
}

/// Main
impl XlsxEditor {
    /// Opens an xlsx file and selects the sheet called `sheet_name`.
    ///
    /// Fails if the workbook has no sheet with that name.
    pub fn open<P: AsRef<std::path::Path>>(src: P, sheet_name: &str) -> Result<Self> {
        let mut editor = Self::open_workbook(src)?;
        editor.with_worksheet(sheet_name)?;
        Ok(editor)
    }

    /// Opens an xlsx file and selects `sheet_name`, appending an empty
    /// worksheet with that name when the workbook does not have one yet.
    ///
    /// Sheet names compare case-insensitively, as in Excel: an existing
    /// `Sales_Leads` is selected for `sales_leads`.
    pub fn open_or_create<P: AsRef<std::path::Path>>(src: P, sheet_name: &str) -> Result<Self> {
        let mut editor = Self::open_workbook(src)?;
        let existing = editor
            .sheet_names()?
            .into_iter()
            .find(|n| same_sheet_name(n, sheet_name));
        match existing {
            Some(name) => editor.with_worksheet(&name)?,
            None => editor.add_worksheet(sheet_name)?,
        };
        Ok(editor)
    }

    /// Name of the selected worksheet (empty before one is selected).
    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Number of the last row present in the selected sheet, 0 for an empty sheet.
    pub fn last_row(&self) -> u32 {
        self.last_row
    }

    /// Appends a single row after the last existing row and returns its number.
    ///
    /// Every value is written as an inline string, so text that looks like a
    /// number or a formula is kept verbatim.
    pub fn append_row<I, S>(&mut self, cells: I) -> Result<u32>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(row_num) = self.last_row.checked_add(1) else {
            bail!("sheet '{}' has no room after row {}", self.sheet_name, self.last_row);
        };
        self.put_row(row_num, cells)?;
        Ok(row_num)
    }

    /// Writes `cells` into row `row_num` starting at column A.
    ///
    /// An existing `<row>` with that number is replaced as a whole; otherwise
    /// the new row is inserted so that rows stay sorted by their `r` attribute.
    pub fn put_row<I, S>(&mut self, row_num: u32, cells: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ensure_sheet_selected()?;
        if row_num == 0 || row_num > MAX_ROWS {
            bail!("row {row_num} is outside 1..={MAX_ROWS}");
        }
        // строки пишутся с тем же префиксом пространства имён, что и sheetData
        let prefix = files_part::qualified_name(&self.sheet_xml, b"sheetData")?
            .map(|q| files_part::prefix_of(&q).to_owned())
            .unwrap_or_default();
        let new_row_xml = row_xml(&prefix, row_num, cells)?;

        match locate_row(&self.sheet_xml, row_num)? {
            RowSlot::Existing(span) => {
                self.sheet_xml.splice(span, new_row_xml);
            }
            RowSlot::InsertAt(pos) => {
                self.sheet_xml.splice(pos..pos, new_row_xml);
            }
        }

        if row_num > self.last_row {
            self.last_row = row_num;
        }
        tracing::debug!(sheet = %self.sheet_name, row = row_num, "row written");
        Ok(())
    }

    fn ensure_sheet_selected(&self) -> Result<()> {
        if self.sheet_path.is_empty() {
            bail!("no worksheet selected");
        }
        Ok(())
    }
}

/// Serialises one `<row>` with inline-string cells; `prefix` is `""` or e.g. `"x:"`.
fn row_xml<I, S>(prefix: &str, row_num: u32, cells: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut writer = Writer::new(Vec::new());

    writer
        .create_element(format!("{prefix}row"))
        .with_attribute(("r", row_num.to_string().as_str()))
        .write_inner_content(|w| {
            for (col_idx, val) in cells.into_iter().enumerate() {
                let coord = format!("{}{}", col_idx_to_letters(col_idx), row_num);
                let val_str = val.as_ref();

                w.create_element(format!("{prefix}c"))
                    .with_attribute(("r", coord.as_str()))
                    .with_attribute(("t", "inlineStr"))
                    .write_inner_content(|w2| {
                        w2.create_element(format!("{prefix}is")).write_inner_content(|w3| {
                            let mut t_elem = w3.create_element(format!("{prefix}t"));
                            // ведущие/хвостовые пробелы иначе теряются при чтении
                            if val_str.trim() != val_str {
                                t_elem = t_elem.with_attribute(("xml:space", "preserve"));
                            }
                            t_elem.write_text_content(BytesText::new(val_str))?;
                            Ok(())
                        })?;
                        Ok(())
                    })?;
            }
            Ok(())
        })?;

    Ok(writer.into_inner())
}

/// Finds row `row_num` in the sheet XML, or the position where it belongs.
fn locate_row(sheet_xml: &[u8], row_num: u32) -> Result<RowSlot> {
    let mut reader = Reader::from_reader(sheet_xml);
    let mut prev_row = 0u32;

    loop {
        let start = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Empty(ref e) if e.local_name().as_ref() == b"row" => {
                let r = row_number(e, prev_row);
                prev_row = r;
                if r == row_num {
                    return Ok(RowSlot::Existing(start..reader.buffer_position() as usize));
                }
                if r > row_num {
                    return Ok(RowSlot::InsertAt(start));
                }
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"row" => {
                let r = row_number(e, prev_row);
                prev_row = r;
                if r > row_num {
                    return Ok(RowSlot::InsertAt(start));
                }
                reader.read_to_end(e.name())?;
                if r == row_num {
                    return Ok(RowSlot::Existing(start..reader.buffer_position() as usize));
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"sheetData" => {
                return Ok(RowSlot::InsertAt(start));
            }
            Event::Eof => bail!("</sheetData> tag not found"),
            _ => {}
        }
    }
}

/// `r` attribute of a `<row>`; rows without one follow the previous row.
fn row_number(e: &BytesStart<'_>, prev_row: u32) -> u32 {
    e.attributes()
        .with_checks(false)
        .flatten()
        .find_map(|a| {
            (a.key.as_ref() == b"r").then(|| String::from_utf8_lossy(&a.value).into_owned())
        })
        .and_then(|r| r.parse::<u32>().ok())
        .unwrap_or(prev_row.saturating_add(1))
}

/// Excel's sheet names are case-insensitive.
pub(crate) fn same_sheet_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// 0-based column index to Excel letters (0 -> "A", 26 -> "AA").
fn col_idx_to_letters(mut idx: usize) -> String {
    let mut s = String::new();
    loop {
        let rem = idx % 26;
        s.insert(0, (b'A' + rem as u8) as char);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    s
}

/// Column part of a cell reference ("AB12" -> 27), `None` if it has no letters.
fn letters_to_col_idx(coord: &str) -> Option<usize> {
    let letters: Vec<u8> = coord
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }
    Some(
        letters.iter().fold(0usize, |acc, b| {
            acc * 26 + (b.to_ascii_uppercase() - b'A' + 1) as usize
        }) - 1,
    )
}
