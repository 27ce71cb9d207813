//! Mandragore dump layouts
//!
//! Two layouts are known: the reorganized tab-separated files, and the raw
//! BnF zoology export whose notice files are `;`-separated Latin-1 with one
//! line per image (or notice) followed by its linked ids.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::registry::{CLASSES, DESCRIPTORS, IMAGES, SCENES};
use crate::storage::CatalogStore;
use crate::{Error, Result};

use super::loader::{CsvSource, Encoding, ImportReport, RecordMode, RowAction, RowTransform};

/// One dump file and where its columns go
#[derive(Debug, Clone, Copy)]
pub struct DumpFile {
    pub filename: &'static str,
    pub table: &'static str,
    pub fields: &'static [&'static str],
    /// Source column feeding each field
    pub columns: &'static [usize],
    pub delimiter: u8,
    pub encoding: Encoding,
    pub mode: RecordMode,
    pub transform: Option<RowTransform>,
}

impl DumpFile {
    const fn tsv(
        filename: &'static str,
        table: &'static str,
        fields: &'static [&'static str],
        columns: &'static [usize],
        transform: Option<RowTransform>,
    ) -> Self {
        Self {
            filename,
            table,
            fields,
            columns,
            delimiter: b'\t',
            encoding: Encoding::Utf8,
            mode: RecordMode::Single,
            transform,
        }
    }

    const fn notices(
        filename: &'static str,
        table: &'static str,
        fields: &'static [&'static str],
        columns: &'static [usize],
        transform: RowTransform,
    ) -> Self {
        Self {
            filename,
            table,
            fields,
            columns,
            delimiter: b';',
            encoding: Encoding::Latin1,
            mode: RecordMode::Multi,
            transform: Some(transform),
        }
    }

    /// Reader configuration for this file inside `dir`
    pub fn source(&self, dir: &Path) -> CsvSource {
        let mut source = CsvSource::new(dir.join(self.filename))
            .delimiter(self.delimiter)
            .encoding(self.encoding)
            .mode(self.mode)
            .columns(self.columns);
        if let Some(transform) = self.transform {
            source = source.transform(transform);
        }
        source
    }
}

/// Tab-separated UTF-8 files rebuilt from the BnF export
pub const REORGANIZED_DUMPS: &[DumpFile] = &[
    // ".amphibiens"	"crapaud"
    DumpFile::tsv("classes.csv", CLASSES, &["classID", "superclassID"], &[1, 0], Some(class_row)),
    // 53138757-80	https://gallica.bnf.fr/iiif/ark:/12148/btv1b531387571/f80/full/pct:50/0/native.jpg
    DumpFile::tsv("documenturl-gallica.csv", IMAGES, &["imageID", "documentURL"], &[0, 1], None),
    DumpFile::tsv("documenturl-dre.csv", IMAGES, &["imageID", "documentURL"], &[0, 1], None),
    // "10020186-20"	"#51326"	"10020186"	"20"
    DumpFile::tsv("scenes-in-images.csv", SCENES, &["mandragoreID", "imageID"], &[1, 0], Some(scene_row)),
    // 643	".autres invertébrés"	"abeille"	51125	"faune: abeille"	"abeille (51125)"
    DumpFile::tsv("descriptors-in-scenes.csv", DESCRIPTORS, &["mandragoreID", "classID"], &[3, 2], None),
];

/// Raw BnF zoology export
pub const BNF_DUMPS: &[DumpFile] = &[
    DumpFile::tsv("Zoologie-URLs-Gallica.txt", IMAGES, &["imageID", "documentURL"], &[0, 1], None),
    DumpFile::tsv("Zoologie-URLs-DRE-Mandragore.txt", IMAGES, &["imageID", "documentURL"], &[0, 1], None),
    // 10507217-143;#78047;#78048;#78049
    DumpFile::notices("Zoologie-images-notices.csv", SCENES, &["mandragoreID", "imageID"], &[1, 0], image_notice_row),
    // #100327;chien (100327);faucon (100327);
    DumpFile::notices("Zoologie-notices-descripteurs.csv", DESCRIPTORS, &["mandragoreID", "classID"], &[0, 1], descriptor_notice_row),
    DumpFile::notices("Zoologie-notices-descripteurs.csv", CLASSES, &["classID"], &[1], descriptor_notice_row),
];

/// Known dump layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpLayout {
    Bnf,
    Reorganized,
}

impl DumpLayout {
    pub fn files(self) -> &'static [DumpFile] {
        match self {
            DumpLayout::Bnf => BNF_DUMPS,
            DumpLayout::Reorganized => REORGANIZED_DUMPS,
        }
    }
}

impl fmt::Display for DumpLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpLayout::Bnf => write!(f, "BnF"),
            DumpLayout::Reorganized => write!(f, "reorganized"),
        }
    }
}

fn strip_marker(id: &str) -> String {
    id.strip_prefix('#').unwrap_or(id).to_string()
}

/// Drop the class rows naming themselves as superclass
fn class_row(row: Vec<String>) -> RowAction {
    match row.as_slice() {
        [class, superclass, ..] if class == superclass => RowAction::Skip,
        _ => RowAction::Insert(row),
    }
}

/// Drop the image-to-itself rows and unmark the mandragore id
fn scene_row(mut row: Vec<String>) -> RowAction {
    if row.len() >= 2 {
        if row[0] == row[1] {
            return RowAction::Skip;
        }
        row[1] = strip_marker(&row[1]);
    }
    RowAction::Insert(row)
}

/// Drop the empty entry left by a trailing separator and unmark the notice id
fn image_notice_row(mut row: Vec<String>) -> RowAction {
    if row.len() >= 2 {
        if row[1].trim().is_empty() {
            return RowAction::Skip;
        }
        row[1] = strip_marker(&row[1]);
    }
    RowAction::Insert(row)
}

/// `#id, "label (id)"` to `id, label`
fn descriptor_notice_row(row: Vec<String>) -> RowAction {
    match row.as_slice() {
        [_, descriptor] if descriptor.trim().is_empty() => RowAction::Skip,
        [notice, descriptor] => {
            let label = descriptor.split(' ').next().unwrap_or_default();
            RowAction::Insert(vec![strip_marker(notice), label.to_string()])
        }
        _ => RowAction::Insert(row),
    }
}

/// Loads a set of dump files from one directory into the store
pub struct DumpImporter<'s> {
    dir: PathBuf,
    store: &'s mut CatalogStore,
}

impl<'s> DumpImporter<'s> {
    pub fn new(dir: impl Into<PathBuf>, store: &'s mut CatalogStore) -> Self {
        Self {
            dir: dir.into(),
            store,
        }
    }

    /// Import every file in order. Fails before importing anything if one
    /// of the files is missing.
    pub fn load(&mut self, dumps: &[DumpFile]) -> Result<Vec<ImportReport>> {
        for dump in dumps {
            let path = self.dir.join(dump.filename);
            if !path.is_file() {
                return Err(Error::MissingFile(path));
            }
        }

        let mut reports = Vec::with_capacity(dumps.len());
        for dump in dumps {
            let report = self
                .store
                .import_csv(dump.table, dump.fields, &dump.source(&self.dir))?;
            reports.push(report);
        }
        tracing::info!("imported {} dump file(s) from {}", reports.len(), self.dir.display());
        Ok(reports)
    }
}
