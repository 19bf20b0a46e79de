#![cfg(test)]
use crate::files_part::write_package;
use crate::{
    Config, FIELDNAMES, LeadAppender, LeadError, LeadRecord, MAX_ROWS, SHEET_NAME, SheetRow,
    XlsxEditor, append_lead, create_workbook, scan,
};
use anyhow::Result;
use std::{fs, fs::File, path::Path};
use tempfile::tempdir;

fn jane() -> LeadRecord {
    LeadRecord {
        visitor_name: "Jane Smith".into(),
        title: "CTO".into(),
        company: "Example Inc.".into(),
        interests_of_solutions: "Cloud storage, disaster recovery".into(),
        interested_in_pilot: "yes".into(),
        email: "jane.smith@example.com".into(),
        phone_number: "+1-555-0200".into(),
        next_steps: "Send proposal next week".into(),
    }
}

fn lead(n: usize) -> LeadRecord {
    LeadRecord {
        visitor_name: format!("Visitor {n}"),
        company: format!("Company {n}"),
        email: format!("visitor{n}@example.com"),
        ..jane()
    }
}

fn leads_rows(path: &Path) -> Result<Vec<SheetRow>> {
    XlsxEditor::open(path, SHEET_NAME)?.read_rows()
}

/// Cells padded to the eight lead columns.
fn padded(row: &SheetRow) -> Vec<String> {
    let mut cells = row.cells.clone();
    cells.resize(FIELDNAMES.len(), String::new());
    cells
}

fn header() -> Vec<String> {
    FIELDNAMES.iter().map(|s| s.to_string()).collect()
}

/// Single-sheet workbook with hand-written sheetData and shared strings.
fn fixture(path: &Path, sheet_name: &str, sheet_data: &str, shared: &[&str], absolute: bool) -> Result<()> {
    let target = if absolute {
        "/xl/worksheets/sheet1.xml"
    } else {
        "worksheets/sheet1.xml"
    };
    let content_types = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/></Types>"#;
    let root_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;
    // openpyxl кладёт xmlns:r прямо на <sheet>
    let workbook = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheets><sheet xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" name="{sheet_name}" sheetId="1" state="visible" r:id="rId1"/></sheets></workbook>"#
    );
    let rels = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="{target}"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#
    );
    let sheet = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1"/><sheetData>{sheet_data}</sheetData></worksheet>"#
    );
    let items: String = shared.iter().map(|s| format!("<si>{s}</si>")).collect();
    let shared_strings = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{n}" uniqueCount="{n}">{items}</sst>"#,
        n = shared.len()
    );

    write_package(
        File::create(path)?,
        &[
            ("[Content_Types].xml", content_types),
            ("_rels/.rels", root_rels),
            ("xl/workbook.xml", workbook.as_str()),
            ("xl/_rels/workbook.xml.rels", rels.as_str()),
            ("xl/worksheets/sheet1.xml", sheet.as_str()),
            ("xl/sharedStrings.xml", shared_strings.as_str()),
        ],
    )
}

/// Single-sheet workbook whose SpreadsheetML elements all carry an `x:` prefix.
fn prefixed_fixture(path: &Path, sheet_name: &str, sheet_data: &str) -> Result<()> {
    let main_ns = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    let rels_ns = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
    let content_types = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;
    let root_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;
    let workbook = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<x:workbook xmlns:x="{main_ns}" xmlns:r="{rels_ns}"><x:sheets><x:sheet name="{sheet_name}" sheetId="1" r:id="rId1"/></x:sheets></x:workbook>"#
    );
    let rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;
    let sheet_data = if sheet_data.is_empty() {
        "<x:sheetData/>".to_string()
    } else {
        format!("<x:sheetData>{sheet_data}</x:sheetData>")
    };
    let sheet = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<x:worksheet xmlns:x="{main_ns}">{sheet_data}</x:worksheet>"#
    );

    write_package(
        File::create(path)?,
        &[
            ("[Content_Types].xml", content_types),
            ("_rels/.rels", root_rels),
            ("xl/workbook.xml", workbook.as_str()),
            ("xl/_rels/workbook.xml.rels", rels),
            ("xl/worksheets/sheet1.xml", sheet.as_str()),
        ],
    )
}

/// Header row 1 stored as shared strings, the way Excel saves it.
fn shared_header_row() -> (String, Vec<String>) {
    let cells: String = ["A", "B", "C", "D", "E", "F", "G", "H"]
        .iter()
        .enumerate()
        .map(|(i, col)| format!(r#"<c r="{col}1" t="s"><v>{i}</v></c>"#))
        .collect();
    let shared = FIELDNAMES.iter().map(|f| format!("<t>{f}</t>")).collect();
    (format!(r#"<row r="1" spans="1:8">{cells}</row>"#), shared)
}

#[test]
fn test_first_lead_bootstraps_header() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("leads.xlsx");
    create_workbook(&path)?;

    let outcome = append_lead(&path, &jane())?;
    assert_eq!(outcome.row, 2);
    assert!(outcome.header_written);

    let rows = leads_rows(&path)?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].index, 1);
    assert_eq!(rows[0].cells, header());
    assert_eq!(rows[1].index, 2);
    assert_eq!(
        rows[1].cells,
        vec![
            "Jane Smith",
            "CTO",
            "Example Inc.",
            "Cloud storage, disaster recovery",
            "yes",
            "jane.smith@example.com",
            "+1-555-0200",
            "Send proposal next week",
        ]
    );
    assert_eq!(scan(&path)?, vec!["Sheet", SHEET_NAME]);
    Ok(())
}

#[test]
fn test_header_is_written_once() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("leads.xlsx");
    create_workbook(&path)?;

    append_lead(&path, &lead(1))?;
    let second = append_lead(&path, &lead(2))?;
    assert_eq!(second.row, 3);
    assert!(!second.header_written);

    let rows = leads_rows(&path)?;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.iter().filter(|r| r.cells == header()).count(), 1);
    assert_eq!(rows[1].cells[0], "Visitor 1");
    assert_eq!(rows[2].cells[0], "Visitor 2");
    // лист добавлен один раз
    assert_eq!(scan(&path)?, vec!["Sheet", SHEET_NAME]);
    Ok(())
}

#[test]
fn test_missing_fields_are_empty_cells() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("leads.xlsx");
    create_workbook(&path)?;

    let partial = LeadRecord {
        visitor_name: "Bob".into(),
        email: "bob@example.com".into(),
        ..Default::default()
    };
    append_lead(&path, &partial)?;

    let rows = leads_rows(&path)?;
    assert_eq!(padded(&rows[1]), vec!["Bob", "", "", "", "", "bob@example.com", "", ""]);
    Ok(())
}

#[test]
fn test_existing_header_is_kept() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("leads.xlsx");
    let (header_row, shared) = shared_header_row();
    let shared: Vec<&str> = shared.iter().map(String::as_str).collect();
    fixture(&path, SHEET_NAME, &header_row, &shared, false)?;

    for n in 1..=3 {
        let outcome = append_lead(&path, &lead(n))?;
        assert_eq!(outcome.row, 1 + n as u32);
        assert!(!outcome.header_written);
    }

    let rows = leads_rows(&path)?;
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].cells, header());
    for (n, row) in rows[1..].iter().enumerate() {
        assert_eq!(padded(row), lead(n + 1).values().to_vec());
    }
    Ok(())
}

#[test]
fn test_empty_first_row_element_receives_header() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("leads.xlsx");
    fixture(&path, SHEET_NAME, r#"<row r="1"><c r="A1" s="0"/></row>"#, &[], false)?;

    let outcome = append_lead(&path, &jane())?;
    assert!(outcome.header_written);
    assert_eq!(outcome.row, 2);

    let editor = XlsxEditor::open(&path, SHEET_NAME)?;
    let xml = String::from_utf8(editor.sheet_xml.clone())?;
    assert_eq!(xml.matches(r#"<row r="1""#).count(), 1);
    assert_eq!(editor.read_rows()?[0].cells, header());
    Ok(())
}

#[test]
fn test_absolute_relationship_targets() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("leads.xlsx");
    fixture(&path, SHEET_NAME, "", &[], true)?;

    append_lead(&path, &jane())?;
    let rows = leads_rows(&path)?;
    assert_eq!(rows.len(), 2);
    assert_eq!(scan(&path)?, vec![SHEET_NAME]);
    Ok(())
}

#[test]
fn test_text_is_stored_verbatim() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("leads.xlsx");
    create_workbook(&path)?;

    let tricky = LeadRecord {
        visitor_name: "  padded ".into(),
        title: "R&D <lead>".into(),
        company: "\"Quotes\" & 'apostrophes'".into(),
        interests_of_solutions: "line one\nline two".into(),
        interested_in_pilot: "=SUM(A1:A2)".into(),
        email: "ünïcødé@example.com".into(),
        phone_number: "00123".into(),
        next_steps: "1e5".into(),
    };
    append_lead(&path, &tricky)?;

    let rows = leads_rows(&path)?;
    assert_eq!(padded(&rows[1]), tricky.values().to_vec());

    let editor = XlsxEditor::open(&path, SHEET_NAME)?;
    let xml = String::from_utf8(editor.sheet_xml.clone())?;
    assert!(!xml.contains("<f>"));
    assert!(!xml.contains("<v>"));
    Ok(())
}

#[test]
fn test_appends_after_last_sparse_row() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("leads.xlsx");
    let (header_row, shared) = shared_header_row();
    let shared: Vec<&str> = shared.iter().map(String::as_str).collect();
    let data = format!(r#"{header_row}<row r="7"><c r="A7" t="inlineStr"><is><t>old</t></is></c></row>"#);
    fixture(&path, SHEET_NAME, &data, &shared, false)?;

    let outcome = append_lead(&path, &jane())?;
    assert_eq!(outcome.row, 8);

    let rows = leads_rows(&path)?;
    let indices: Vec<u32> = rows.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![1, 7, 8]);
    Ok(())
}

#[test]
fn test_rows_without_numbers_are_counted() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("plain.xlsx");
    let data = r#"<row><c t="inlineStr"><is><t>a</t></is></c></row><row><c t="inlineStr"><is><t>b</t></is></c><c t="inlineStr"><is><t>c</t></is></c></row>"#;
    fixture(&path, "Data", data, &[], false)?;

    let editor = XlsxEditor::open(&path, "Data")?;
    assert_eq!(editor.last_row(), 2);
    let rows = editor.read_rows()?;
    assert_eq!(rows[1], SheetRow { index: 2, cells: vec!["b".into(), "c".into()] });
    Ok(())
}

#[test]
fn test_shared_strings_rich_text_and_phonetic() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("rich.xlsx");
    let shared = [
        "<r><rPr><b/></rPr><t>Bold</t></r><r><t xml:space=\"preserve\"> tail</t></r>",
        "<t>東京</t><rPh sb=\"0\" eb=\"2\"><t>トウキョウ</t></rPh>",
        "<t>Tom &amp; Jerry</t>",
    ];
    let data = r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="C1" t="s"><v>1</v></c><c r="D1" t="s"><v>2</v></c><c r="E1"><v>42</v></c><c r="F1"><f>SUM(E1:E1)</f></c></row>"#;
    fixture(&path, "Data", data, &shared, false)?;

    let rows = XlsxEditor::open(&path, "Data")?.read_rows()?;
    assert_eq!(
        rows[0].cells,
        vec!["Bold tail", "", "東京", "Tom & Jerry", "42", "=SUM(E1:E1)"]
    );
    Ok(())
}

#[test]
fn test_put_row_keeps_rows_sorted() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sorted.xlsx");
    create_workbook(&path)?;

    let mut editor = XlsxEditor::open(&path, "Sheet")?;
    editor.put_row(3, ["third"])?;
    editor.put_row(1, ["first"])?;
    editor.put_row(2, ["second"])?;
    editor.put_row(3, ["third, again"])?;
    assert_eq!(editor.last_row(), 3);
    editor.save(&path)?;

    let rows = XlsxEditor::open(&path, "Sheet")?.read_rows()?;
    let firsts: Vec<(u32, &str)> = rows.iter().map(|r| (r.index, r.cells[0].as_str())).collect();
    assert_eq!(firsts, vec![(1, "first"), (2, "second"), (3, "third, again")]);
    Ok(())
}

#[test]
fn test_add_worksheet_rejects_duplicates() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("dup.xlsx");
    create_workbook(&path)?;

    let mut editor = XlsxEditor::open_workbook(&path)?;
    assert!(editor.add_worksheet("Sheet").is_err());
    editor.add_worksheet("Extra")?;
    assert!(editor.add_worksheet("Extra").is_err());
    assert_eq!(editor.sheet_names()?, vec!["Sheet", "Extra"]);
    Ok(())
}

#[test]
fn test_open_unknown_sheet_fails() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("book.xlsx");
    create_workbook(&path)?;
    assert!(XlsxEditor::open(&path, SHEET_NAME).is_err());
    Ok(())
}

#[test]
fn test_corrupt_workbook_is_io_failure() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("broken.xlsx");
    fs::write(&path, b"definitely not a zip archive")?;

    let err = append_lead(&path, &jane()).unwrap_err();
    assert!(matches!(err, LeadError::WorkbookIo { .. }), "{err}");
    assert_eq!(err.kind(), "WorkbookIOFailure");
    // исходный файл не тронут
    assert_eq!(fs::read(&path)?, b"definitely not a zip archive");
    Ok(())
}

#[test]
fn test_create_workbook_refuses_to_overwrite() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("book.xlsx");
    create_workbook(&path)?;
    assert!(create_workbook(&path).is_err());
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_save_keeps_permissions() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir()?;
    let path = dir.path().join("leads.xlsx");
    create_workbook(&path)?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o640))?;

    append_lead(&path, &jane())?;
    assert_eq!(fs::metadata(&path)?.permissions().mode() & 0o777, 0o640);
    Ok(())
}

#[test]
fn test_appender_from_config() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("leads.xlsx");
    create_workbook(&path)?;
    let cfg = dir.path().join("config.json");
    fs::write(&cfg, r#"{"target_excel_file": "leads.xlsx"}"#)?;

    let appender = LeadAppender::new(&Config::load(&cfg)?);
    assert_eq!(appender.target(), path.as_path());
    appender.append(&lead(1))?;
    let outcome = appender.append(&lead(2))?;
    assert_eq!(outcome.row, 3);
    Ok(())
}

#[test]
fn test_lead_record_defaults_missing_fields() -> Result<()> {
    let record: LeadRecord = serde_json::from_str(r#"{"visitor_name": "Ann", "title": "CEO"}"#)?;
    assert_eq!(record.values(), ["Ann", "CEO", "", "", "", "", "", ""]);
    Ok(())
}

#[test]
fn test_prefixed_namespace_sheet_gets_prefixed_rows() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sdk.xlsx");
    prefixed_fixture(&path, SHEET_NAME, "")?;

    let outcome = append_lead(&path, &jane())?;
    assert_eq!(outcome.row, 2);
    assert!(outcome.header_written);

    let editor = XlsxEditor::open(&path, SHEET_NAME)?;
    let xml = String::from_utf8(editor.sheet_xml.clone())?;
    assert!(xml.contains(r#"<x:sheetData><x:row r="1">"#), "{xml}");
    assert!(xml.contains(r#"<x:row r="2"><x:c r="A2" t="inlineStr"><x:is><x:t>Jane Smith</x:t>"#), "{xml}");
    assert!(!xml.contains("<row"), "{xml}");

    let rows = editor.read_rows()?;
    assert_eq!(rows[0].cells, header());
    assert_eq!(padded(&rows[1]), jane().values().to_vec());
    Ok(())
}

#[test]
fn test_prefixed_namespace_workbook_gets_new_sheet() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sdk.xlsx");
    prefixed_fixture(
        &path,
        "Data",
        r#"<x:row r="1"><x:c r="A1" t="inlineStr"><x:is><x:t>kept</x:t></x:is></x:c></x:row>"#,
    )?;

    append_lead(&path, &jane())?;
    assert_eq!(scan(&path)?, vec!["Data", SHEET_NAME]);
    assert_eq!(leads_rows(&path)?.len(), 2);

    let editor = XlsxEditor::open(&path, "Data")?;
    let workbook = String::from_utf8(editor.workbook_xml.clone())?;
    assert!(workbook.contains(r#"<x:sheet xmlns:r="#), "{workbook}");
    assert!(workbook.contains(r#"sheetId="2" r:id="rId2"/></x:sheets>"#), "{workbook}");
    assert_eq!(editor.read_rows()?[0].cells, vec!["kept"]);
    Ok(())
}

#[test]
fn test_sheet_names_match_case_insensitively() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("leads.xlsx");
    fixture(&path, "Sales_Leads", "", &[], false)?;

    let outcome = append_lead(&path, &jane())?;
    assert_eq!(outcome.row, 2);
    assert_eq!(scan(&path)?, vec!["Sales_Leads"]);
    assert_eq!(XlsxEditor::open(&path, "Sales_Leads")?.read_rows()?.len(), 2);

    let mut editor = XlsxEditor::open_workbook(&path)?;
    assert!(editor.add_worksheet("SALES_LEADS").is_err());
    Ok(())
}

#[test]
fn test_rows_past_sheet_limit_are_rejected() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("huge.xlsx");
    let data = r#"<row r="4294967295"><c r="A4294967295" t="inlineStr"><is><t>x</t></is></c></row><row><c t="inlineStr"><is><t>y</t></is></c></row>"#;
    fixture(&path, SHEET_NAME, data, &[], false)?;
    let before = fs::read(&path)?;

    let mut editor = XlsxEditor::open(&path, SHEET_NAME)?;
    assert_eq!(editor.last_row(), u32::MAX);
    assert!(editor.append_row(["z"]).is_err());
    assert!(editor.put_row(MAX_ROWS + 1, ["z"]).is_err());
    editor.put_row(MAX_ROWS, ["z"])?;

    let err = append_lead(&path, &jane()).unwrap_err();
    assert!(matches!(err, LeadError::WorkbookIo { .. }), "{err}");
    assert_eq!(fs::read(&path)?, before);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_save_writes_through_links() -> Result<()> {
    let dir = tempdir()?;
    let real = dir.path().join("real.xlsx");
    let link = dir.path().join("leads.xlsx");
    let alias = dir.path().join("alias.xlsx");
    create_workbook(&real)?;
    std::os::unix::fs::symlink(&real, &link)?;
    fs::hard_link(&real, &alias)?;
    let cfg = dir.path().join("config.json");
    fs::write(&cfg, r#"{"target_excel_file": "leads.xlsx"}"#)?;

    LeadAppender::new(&Config::load(&cfg)?).append(&jane())?;

    assert!(fs::symlink_metadata(&link)?.file_type().is_symlink());
    assert_eq!(scan(&real)?, vec!["Sheet", SHEET_NAME]);
    assert_eq!(leads_rows(&real)?.len(), 2);
    assert_eq!(fs::read(&alias)?, fs::read(&real)?);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_target_in_read_only_directory() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir()?;
    let locked = dir.path().join("locked");
    fs::create_dir(&locked)?;
    let path = locked.join("leads.xlsx");
    create_workbook(&path)?;
    let cfg = locked.join("config.json");
    fs::write(&cfg, r#"{"target_excel_file": "leads.xlsx"}"#)?;
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o555))?;

    let result = Config::load(&cfg).and_then(|config| LeadAppender::new(&config).append(&jane()));
    // вернуть права, иначе tempdir не удалит каталог
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;

    assert_eq!(result?.row, 2);
    assert_eq!(leads_rows(&path)?.len(), 2);
    assert_eq!(fs::read_dir(&locked)?.count(), 2);
    Ok(())
}
