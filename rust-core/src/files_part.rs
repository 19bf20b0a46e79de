use crate::XlsxEditor;
use crate::read_part::parse_shared_strings;
use ::zip as zip_crate;
use anyhow::{Context, Result, bail};
use quick_xml::{Reader, escape::unescape, events::Event};
use std::{
    collections::HashSet,
    fs::File,
    io::{Cursor, Read, Seek, Write},
    path::Path,
};
use tracing::debug;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

const RELS_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const WORKSHEET_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const WORKSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

const EMPTY_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData></sheetData></worksheet>"#;

/// Work with files
impl XlsxEditor {
    /// Открывает книгу без выбора листа: workbook.xml, rels, content types и
    /// shared strings читаются сразу, XML листа читается в `with_worksheet`.
    pub fn open_workbook<P: AsRef<Path>>(src: P) -> Result<Self> {
        let src_path = src.as_ref().to_path_buf();
        let file = File::open(&src_path)
            .with_context(|| format!("cannot open {}", src_path.display()))?;
        let mut zip = zip_crate::ZipArchive::new(file)
            .with_context(|| format!("{} is not an xlsx package", src_path.display()))?;

        let workbook_xml = read_part(&mut zip, WORKBOOK_PART)?;
        let rels_xml = read_part(&mut zip, WORKBOOK_RELS_PART)?;
        let content_types_xml = read_part(&mut zip, CONTENT_TYPES_PART)?;
        let shared_strings = match read_optional_part(&mut zip, SHARED_STRINGS_PART)? {
            Some(xml) => parse_shared_strings(&xml)?,
            None => Vec::new(),
        };
        debug!(
            path = %src_path.display(),
            parts = zip.len(),
            shared_strings = shared_strings.len(),
            "workbook opened"
        );

        Ok(Self {
            src_path,
            sheet_name: String::new(),
            sheet_path: String::new(),
            sheet_xml: Vec::new(),
            last_row: 0,
            workbook_xml,
            rels_xml,
            content_types_xml,
            shared_strings,
            new_files: Vec::new(),
        })
    }

    /// Имена листов в порядке вкладок (по текущему состоянию `workbook_xml`).
    pub fn sheet_names(&self) -> Result<Vec<String>> {
        let mut reader = Reader::from_reader(self.workbook_xml.as_slice());
        reader.config_mut().trim_text(true);

        let mut names = Vec::new();
        loop {
            match reader.read_event()? {
                Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"sheet" => {
                    if let Some(n) = e.attributes().with_checks(false).flatten().find_map(|a| {
                        (a.key.as_ref() == b"name")
                            .then(|| String::from_utf8_lossy(&a.value).into_owned())
                    }) {
                        names.push(unescape(&n)?.into_owned());
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(names)
    }

    /// Переключает редактор на лист `sheet_name`.
    ///
    /// The sheet part is found through the workbook relationship, so sheets
    /// that were reordered or renamed still resolve to the right file.
    pub fn with_worksheet(&mut self, sheet_name: &str) -> Result<&mut Self> {
        self.flush_current_sheet();

        // 1) r:id листа в workbook.xml
        let mut rdr = Reader::from_reader(self.workbook_xml.as_slice());
        rdr.config_mut().trim_text(true);

        let mut target_rid: Option<String> = None;
        loop {
            match rdr.read_event()? {
                Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"sheet" => {
                    let mut name: Option<String> = None;
                    let mut rid: Option<String> = None;

                    for a in e.attributes().with_checks(false).flatten() {
                        let v = String::from_utf8_lossy(&a.value).into_owned();
                        if a.key.as_ref() == b"name" {
                            name = Some(unescape(&v)?.into_owned());
                        } else if a.key.local_name().as_ref() == b"id" && a.key.prefix().is_some() {
                            rid = Some(v);
                        }
                    }

                    if let (Some(n), Some(r)) = (name, rid) {
                        if n == sheet_name {
                            target_rid = Some(r);
                            break;
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        let target_rid =
            target_rid.with_context(|| format!("Sheet '{sheet_name}' not found in workbook.xml"))?;

        // 2) Target по r:id в workbook.xml.rels
        let mut rdr = Reader::from_reader(self.rels_xml.as_slice());
        rdr.config_mut().trim_text(true);

        let mut target_rel: Option<String> = None;
        loop {
            match rdr.read_event()? {
                Event::Empty(ref e) | Event::Start(ref e)
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let mut id: Option<String> = None;
                    let mut target: Option<String> = None;

                    for a in e.attributes().with_checks(false).flatten() {
                        let v = String::from_utf8_lossy(&a.value).into_owned();
                        match a.key.as_ref() {
                            b"Id" => id = Some(v),
                            b"Target" => target = Some(v),
                            _ => {}
                        }
                    }

                    if let (Some(idv), Some(t)) = (id, target) {
                        if idv == target_rid {
                            target_rel = Some(t);
                            break;
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        let target_rel = target_rel.with_context(|| {
            format!("Relationship for '{sheet_name}' not found in workbook.xml.rels")
        })?;
        let sheet_path = part_path(&target_rel);

        // 3) XML листа: сперва new_files, иначе из архива
        let mut sheet_xml =
            if let Some((_, content)) = self.new_files.iter().find(|(p, _)| p == &sheet_path) {
                content.clone()
            } else {
                let mut zin = zip_crate::ZipArchive::new(File::open(&self.src_path)?)?;
                read_part(&mut zin, &sheet_path)?
            };
        expand_empty_sheet_data(&mut sheet_xml)?;

        let last_row = calc_last_row(&sheet_xml)?;
        debug!(sheet = sheet_name, part = %sheet_path, last_row, "worksheet selected");

        self.sheet_name = sheet_name.to_owned();
        self.sheet_path = sheet_path;
        self.sheet_xml = sheet_xml;
        self.last_row = last_row;

        Ok(self)
    }

    /// Добавляет новый пустой лист `sheet_name` в конец вкладок и переключается на него.
    pub fn add_worksheet(&mut self, sheet_name: &str) -> Result<&mut Self> {
        if sheet_name.is_empty() {
            bail!("Sheet name must not be empty");
        }
        if let Some(existing) = self
            .sheet_names()?
            .into_iter()
            .find(|n| crate::same_sheet_name(n, sheet_name))
        {
            bail!("Sheet {sheet_name} clashes with existing sheet {existing}");
        }

        // 1) свободные sheetId / rId
        let new_sheet_id = max_attr_number(&self.workbook_xml, b"sheet", b"sheetId", "")? + 1;
        let new_rid = max_attr_number(&self.rels_xml, b"Relationship", b"Id", "rId")? + 1;

        // 2) свободный sheet#.xml (архив + ещё не сохранённые файлы)
        let zin = zip_crate::ZipArchive::new(File::open(&self.src_path)?)?;
        let max_sheet_file = zin
            .file_names()
            .chain(self.new_files.iter().map(|(p, _)| p.as_str()))
            .filter_map(|name| {
                name.strip_prefix("xl/worksheets/sheet")
                    .and_then(|s| s.strip_suffix(".xml"))
                    .and_then(|s| s.parse::<usize>().ok())
            })
            .max()
            .unwrap_or(0);
        let new_sheet_file = max_sheet_file + 1;
        let new_sheet_path = format!("xl/worksheets/sheet{new_sheet_file}.xml");

        // 3) новые теги, с тем же префиксом, что у контейнера
        let (sheets_end, wb_prefix) = container_tags(&self.workbook_xml, "sheets", WORKBOOK_PART)?;
        let (rels_end, rels_prefix) =
            container_tags(&self.rels_xml, "Relationships", WORKBOOK_RELS_PART)?;
        let (types_end, ct_prefix) =
            container_tags(&self.content_types_xml, "Types", CONTENT_TYPES_PART)?;

        let sheet_tag = format!(
            r#"<{wb_prefix}sheet xmlns:r="{RELS_NS}" name="{}" sheetId="{new_sheet_id}" r:id="rId{new_rid}"/>"#,
            xml_escape(sheet_name),
        );
        let rel_tag = format!(
            r#"<{rels_prefix}Relationship Id="rId{new_rid}" Type="{WORKSHEET_REL_TYPE}" Target="worksheets/sheet{new_sheet_file}.xml"/>"#
        );
        let override_tag = format!(
            r#"<{ct_prefix}Override PartName="/{new_sheet_path}" ContentType="{WORKSHEET_CONTENT_TYPE}"/>"#
        );

        // 4) вставляем перед закрывающими тегами
        let mut wb_xml = self.workbook_xml.clone();
        let mut rels_xml = self.rels_xml.clone();
        let mut ct_xml = self.content_types_xml.clone();
        insert_before_last(&mut wb_xml, &sheets_end, sheet_tag.as_bytes(), WORKBOOK_PART)?;
        insert_before_last(&mut rels_xml, &rels_end, rel_tag.as_bytes(), WORKBOOK_RELS_PART)?;
        insert_before_last(&mut ct_xml, &types_end, override_tag.as_bytes(), CONTENT_TYPES_PART)?;

        // обновляем внутреннее состояние
        self.flush_current_sheet();
        self.workbook_xml = wb_xml;
        self.rels_xml = rels_xml;
        self.content_types_xml = ct_xml;
        self.new_files
            .push((new_sheet_path.clone(), EMPTY_SHEET.as_bytes().to_vec()));
        debug!(sheet = sheet_name, part = %new_sheet_path, "worksheet added");

        // переключаем редактор на новый лист
        self.sheet_name = sheet_name.to_owned();
        self.sheet_path = new_sheet_path;
        self.sheet_xml = EMPTY_SHEET.as_bytes().to_vec();
        self.last_row = 0;

        Ok(self)
    }

    fn flush_current_sheet(&mut self) {
        if self.sheet_path.is_empty() {
            return;
        }
        let cur_path = self.sheet_path.clone();
        let cur_xml = self.sheet_xml.clone();
        if let Some((_, c)) = self.new_files.iter_mut().find(|(p, _)| p == &cur_path) {
            *c = cur_xml;
        } else {
            self.new_files.push((cur_path, cur_xml));
        }
    }

    /// Part content that differs from the source archive, if any.
    fn modified_part(&self, name: &str) -> Option<&[u8]> {
        if let Some((_, content)) = self.new_files.iter().find(|(p, _)| p == name) {
            return Some(content.as_slice());
        }
        match name {
            WORKBOOK_PART => Some(self.workbook_xml.as_slice()),
            WORKBOOK_RELS_PART => Some(self.rels_xml.as_slice()),
            CONTENT_TYPES_PART => Some(self.content_types_xml.as_slice()),
            _ => None,
        }
    }

    /// Saves the package to `dst`, which may be the file it was opened from.
    ///
    /// The archive is assembled in memory and then written through the
    /// existing path, so symlinks, owner, permissions and hard links of `dst`
    /// stay as they were.
    pub fn save<P: AsRef<Path>>(&mut self, dst: P) -> Result<()> {
        self.flush_current_sheet();
        let dst = dst.as_ref();

        let mut buf = Cursor::new(Vec::new());
        {
            let mut zin = zip_crate::ZipArchive::new(File::open(&self.src_path)?)?;
            let mut zout = zip_crate::ZipWriter::new(&mut buf);

            let opt: zip_crate::write::FileOptions<'_, ()> = zip_crate::write::FileOptions::default()
                .compression_method(zip_crate::CompressionMethod::Deflated)
                .compression_level(Some(1));

            let mut written: HashSet<String> = HashSet::new();
            for i in 0..zin.len() {
                let file = zin.by_index_raw(i)?;
                let name = file.name().to_owned();

                if let Some(content) = self.modified_part(&name) {
                    zout.start_file(name.as_str(), opt)?;
                    zout.write_all(content)?;
                    written.insert(name);
                } else {
                    zout.raw_copy_file(file)?;
                }
            }

            // добавляем файлы, которых не было в исходном архиве
            for (path, content) in &self.new_files {
                if written.insert(path.clone()) {
                    zout.start_file(path.as_str(), opt)?;
                    zout.write_all(content)?;
                }
            }
            zout.finish()?;
        }

        // пишем поверх существующего файла, а не через rename
        let mut out = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(dst)
            .with_context(|| format!("cannot open {} for writing", dst.display()))?;
        out.write_all(buf.get_ref())
            .with_context(|| format!("cannot write {}", dst.display()))?;
        out.sync_all()?;
        debug!(path = %dst.display(), bytes = buf.get_ref().len(), "workbook saved");

        self.src_path = dst.to_path_buf();
        Ok(())
    }
}

/// Имена листов книги `src` в порядке вкладок.
pub fn scan<P: AsRef<Path>>(src: P) -> Result<Vec<String>> {
    XlsxEditor::open_workbook(src)?.sheet_names()
}

/// Writes a minimal blank workbook with one empty sheet named `Sheet`.
///
/// Refuses to overwrite an existing file.
pub fn create_workbook<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::options()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("cannot create {}", path.display()))?;
    write_package(file, BLANK_WORKBOOK)
}

/// Writes `parts` as a zip package; names are archive paths.
pub(crate) fn write_package<W: Write + Seek>(out: W, parts: &[(&str, &str)]) -> Result<()> {
    let mut zout = zip_crate::ZipWriter::new(out);
    let opt: zip_crate::write::FileOptions<'_, ()> = zip_crate::write::FileOptions::default()
        .compression_method(zip_crate::CompressionMethod::Deflated);
    for (name, content) in parts {
        zout.start_file(*name, opt)?;
        zout.write_all(content.as_bytes())?;
    }
    zout.finish()?;
    Ok(())
}

pub(crate) const BLANK_WORKBOOK: &[(&str, &str)] = &[
    (
        "[Content_Types].xml",
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#,
    ),
    (
        "_rels/.rels",
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
    ),
    (
        "xl/workbook.xml",
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
    ),
    (
        "xl/_rels/workbook.xml.rels",
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#,
    ),
    (
        "xl/styles.xml",
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#,
    ),
    (
        "xl/worksheets/sheet1.xml",
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData/></worksheet>"#,
    ),
];

fn read_part<R: Read + Seek>(zip: &mut zip_crate::ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut part = zip
        .by_name(name)
        .with_context(|| format!("{name} not found"))?;
    let mut buf = Vec::with_capacity(part.size() as usize);
    part.read_to_end(&mut buf)?;
    Ok(buf)
}

fn read_optional_part<R: Read + Seek>(
    zip: &mut zip_crate::ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>> {
    match zip.by_name(name) {
        Ok(mut part) => {
            let mut buf = Vec::with_capacity(part.size() as usize);
            part.read_to_end(&mut buf)?;
            Ok(Some(buf))
        }
        Err(zip_crate::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Archive path of a relationship target from workbook.xml.rels.
fn part_path(target: &str) -> String {
    if let Some(abs) = target.strip_prefix('/') {
        abs.to_owned()
    } else if target.starts_with("xl/") {
        target.to_owned()
    } else {
        format!("xl/{target}")
    }
}

/// `<sheetData/>` → `<sheetData></sheetData>`, чтобы было куда вставлять строки.
fn expand_empty_sheet_data(sheet_xml: &mut Vec<u8>) -> Result<()> {
    let Some(qname) = qualified_name(&sheet_xml[..], b"sheetData")? else {
        return Ok(());
    };
    let expanded = format!("<{qname}></{qname}>");
    for tag in [format!("<{qname}/>"), format!("<{qname} />")] {
        if let Some(pos) = memchr::memmem::find(&sheet_xml[..], tag.as_bytes()) {
            sheet_xml.splice(pos..pos + tag.len(), expanded.bytes());
            break;
        }
    }
    Ok(())
}

/// Qualified name (`x:sheetData` or `sheetData`) of the first element called `local`.
pub(crate) fn qualified_name(xml: &[u8], local: &[u8]) -> Result<Option<String>> {
    let mut rdr = Reader::from_reader(xml);
    loop {
        match rdr.read_event()? {
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == local => {
                return Ok(Some(String::from_utf8_lossy(e.name().as_ref()).into_owned()));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// `x:` for `x:sheets`, "" for an unprefixed name.
pub(crate) fn prefix_of(qname: &str) -> &str {
    qname.rfind(':').map_or("", |i| &qname[..=i])
}

/// Closing tag of the `local` container and the prefix its children carry.
fn container_tags(xml: &[u8], local: &str, part: &str) -> Result<(String, String)> {
    let qname = qualified_name(xml, local.as_bytes())?
        .with_context(|| format!("<{local}> not found in {part}"))?;
    Ok((format!("</{qname}>"), prefix_of(&qname).to_owned()))
}

fn insert_before_last(xml: &mut Vec<u8>, closing: &str, fragment: &[u8], part: &str) -> Result<()> {
    let pos = memchr::memmem::rfind(&xml[..], closing.as_bytes())
        .with_context(|| format!("{closing} not found in {part}"))?;
    xml.splice(pos..pos, fragment.iter().copied());
    Ok(())
}

/// Largest numeric value of `attr` on `tag` elements, after stripping `prefix`.
fn max_attr_number(xml: &[u8], tag: &[u8], attr: &[u8], prefix: &str) -> Result<u32> {
    let mut rdr = Reader::from_reader(xml);
    rdr.config_mut().trim_text(true);

    let mut max = 0u32;
    loop {
        match rdr.read_event()? {
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == tag => {
                if let Some(v) = e.attributes().with_checks(false).flatten().find_map(|a| {
                    (a.key.as_ref() == attr).then(|| String::from_utf8_lossy(&a.value).into_owned())
                }) {
                    if let Some(n) = v.strip_prefix(prefix).and_then(|s| s.parse::<u32>().ok()) {
                        max = max.max(n);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(max)
}

fn calc_last_row(sheet_xml: &[u8]) -> Result<u32> {
    let mut rdr = Reader::from_reader(sheet_xml);
    rdr.config_mut().trim_text(true);

    let mut prev_row = 0u32;
    let mut last_row = 0u32;
    loop {
        match rdr.read_event()? {
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"row" => {
                prev_row = crate::row_number(e, prev_row);
                last_row = last_row.max(prev_row);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(last_row)
}

// Простейший экранировщик для XML-атрибутов.
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
