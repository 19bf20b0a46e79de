//! Чтение значений ячеек выбранного листа.

use crate::{XlsxEditor, letters_to_col_idx, row_number};
use anyhow::Result;
use quick_xml::{Reader, escape::unescape, events::Event};

/// One non-empty row of the selected sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    /// 1-based row number.
    pub index: u32,
    /// Cell text from column A up to the last non-empty cell; gaps are "".
    pub cells: Vec<String>,
}

#[derive(Clone, Copy)]
enum Capture {
    None,
    Value,
    Formula,
}

struct CellState {
    col: usize,
    kind: String,
    value: String,
    formula: String,
}

impl XlsxEditor {
    /// Reads every row of the selected sheet that holds at least one value.
    ///
    /// Shared strings, inline strings (including rich-text runs) and cached
    /// values are resolved to text; a formula without a cached value reads as
    /// `=<formula>`.
    pub fn read_rows(&self) -> Result<Vec<SheetRow>> {
        self.ensure_sheet_selected()?;
        let mut reader = Reader::from_reader(self.sheet_xml.as_slice());

        let mut rows = Vec::new();
        let mut prev_row = 0u32;
        let mut row: Option<SheetRow> = None;
        let mut next_col = 0usize;
        let mut cell: Option<CellState> = None;
        let mut capture = Capture::None;
        let mut phonetic = false;

        loop {
            match reader.read_event()? {
                Event::Start(ref e) => match e.local_name().as_ref() {
                    b"row" => {
                        prev_row = row_number(e, prev_row);
                        row = Some(SheetRow { index: prev_row, cells: Vec::new() });
                        next_col = 0;
                    }
                    b"c" => {
                        let (col, kind) = cell_attrs(e, next_col);
                        next_col = col + 1;
                        cell = Some(CellState {
                            col,
                            kind,
                            value: String::new(),
                            formula: String::new(),
                        });
                    }
                    b"v" | b"t" if !phonetic => capture = Capture::Value,
                    b"f" => capture = Capture::Formula,
                    b"rPh" => phonetic = true,
                    _ => {}
                },
                Event::Empty(ref e) => match e.local_name().as_ref() {
                    b"row" => prev_row = row_number(e, prev_row),
                    b"c" => next_col = cell_attrs(e, next_col).0 + 1,
                    _ => {}
                },
                Event::Text(ref t) => {
                    if let Some(c) = cell.as_mut() {
                        let raw = std::str::from_utf8(t)?;
                        match capture {
                            Capture::Value => c.value.push_str(&unescape(raw)?),
                            Capture::Formula => c.formula.push_str(&unescape(raw)?),
                            Capture::None => {}
                        }
                    }
                }
                Event::CData(ref t) => {
                    if let Some(c) = cell.as_mut() {
                        let raw = std::str::from_utf8(t)?;
                        match capture {
                            Capture::Value => c.value.push_str(raw),
                            Capture::Formula => c.formula.push_str(raw),
                            Capture::None => {}
                        }
                    }
                }
                Event::GeneralRef(ref r) => {
                    if let Some(c) = cell.as_mut() {
                        let resolved = resolve_entity(r)?;
                        match capture {
                            Capture::Value => c.value.push_str(&resolved),
                            Capture::Formula => c.formula.push_str(&resolved),
                            Capture::None => {}
                        }
                    }
                }
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"v" | b"t" | b"f" => capture = Capture::None,
                    b"rPh" => phonetic = false,
                    b"c" => {
                        if let (Some(c), Some(r)) = (cell.take(), row.as_mut()) {
                            let col = c.col;
                            let text = self.cell_text(c);
                            if !text.is_empty() {
                                if r.cells.len() <= col {
                                    r.cells.resize(col + 1, String::new());
                                }
                                r.cells[col] = text;
                            }
                        }
                    }
                    b"row" => {
                        if let Some(r) = row.take() {
                            if !r.cells.is_empty() {
                                rows.push(r);
                            }
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(rows)
    }

    /// `true` when no cell of row `row_num` has a value.
    pub fn row_is_empty(&self, row_num: u32) -> Result<bool> {
        Ok(!self.read_rows()?.iter().any(|r| r.index == row_num))
    }

    fn cell_text(&self, c: CellState) -> String {
        let CellState { kind, value, formula, .. } = c;
        let text = match kind.as_str() {
            "s" => value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|i| self.shared_strings.get(i).cloned())
                .unwrap_or_default(),
            _ => value,
        };
        if text.is_empty() && !formula.is_empty() {
            format!("={formula}")
        } else {
            text
        }
    }
}

/// Column index and `t` attribute of a `<c>` element.
fn cell_attrs(e: &quick_xml::events::BytesStart<'_>, next_col: usize) -> (usize, String) {
    let mut col = next_col;
    let mut kind = String::new();
    for a in e.attributes().with_checks(false).flatten() {
        match a.key.as_ref() {
            b"r" => {
                if let Some(idx) = letters_to_col_idx(&String::from_utf8_lossy(&a.value)) {
                    col = idx;
                }
            }
            b"t" => kind = String::from_utf8_lossy(&a.value).into_owned(),
            _ => {}
        }
    }
    (col, kind)
}

/// `&amp;`, `&#10;` и т.п., пришедшие отдельным событием.
fn resolve_entity(name: &[u8]) -> Result<String> {
    let name = std::str::from_utf8(name)?;
    Ok(unescape(&format!("&{name};"))?.into_owned())
}

/// Parses xl/sharedStrings.xml into the string table, in index order.
pub(crate) fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);

    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut phonetic = false;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" if !phonetic => in_text = true,
                b"rPh" => phonetic = true,
                _ => {}
            },
            Event::Empty(ref e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(ref t) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&unescape(std::str::from_utf8(t)?)?);
                }
            }
            Event::CData(ref t) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(std::str::from_utf8(t)?);
                }
            }
            Event::GeneralRef(ref r) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&resolve_entity(r)?);
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"rPh" => phonetic = false,
                b"si" => {
                    if let Some(s) = current.take() {
                        strings.push(s);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}
