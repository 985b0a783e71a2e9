//! Atom フィード（arXiv API の応答）のパース。
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use thiserror::Error;

pub const ATOM_NS: &[u8] = b"http://www.w3.org/2005/Atom";

/// ラベルを持たないエントリに割り当てる値。
pub const UNKNOWN_LABEL: &str = "unknown";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    #[error("document has no root element")]
    NoRoot,
    #[error("document ended inside an open element")]
    Unclosed,
}

/// フィード直下の1エントリ。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomEntry {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub categories: Vec<String>,
}

impl AtomEntry {
    /// 最初のカテゴリをラベルとする。
    #[must_use]
    pub fn label(&self) -> &str {
        self.categories
            .first()
            .map_or(UNKNOWN_LABEL, String::as_str)
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Id,
    Title,
    Summary,
}

#[derive(Debug, Default)]
struct EntryBuilder {
    entry: AtomEntry,
    capture: Option<Field>,
    seen_id: bool,
    seen_title: bool,
    seen_summary: bool,
}

impl EntryBuilder {
    /// 同名の子要素は最初の1つだけを読む。
    fn begin(&mut self, field: Field) {
        let seen = match field {
            Field::Id => &mut self.seen_id,
            Field::Title => &mut self.seen_title,
            Field::Summary => &mut self.seen_summary,
        };
        if !*seen {
            *seen = true;
            self.capture = Some(field);
        }
    }

    fn push_text(&mut self, text: &str) {
        match self.capture {
            Some(Field::Id) => self.entry.id.push_str(text),
            Some(Field::Title) => self.entry.title.push_str(text),
            Some(Field::Summary) => self.entry.summary.push_str(text),
            None => {}
        }
    }

    /// `term` 属性の無いカテゴリは [`UNKNOWN_LABEL`] として数える。
    fn push_category(&mut self, element: &BytesStart<'_>) -> Result<(), quick_xml::Error> {
        let mut term = None;
        for attr in element.attributes() {
            let attr = attr?;
            if attr.key.local_name().as_ref() == b"term" {
                term = Some(attr.unescape_value()?.into_owned());
                break;
            }
        }
        self.entry
            .categories
            .push(term.unwrap_or_else(|| UNKNOWN_LABEL.to_string()));
        Ok(())
    }

    fn finish(self) -> AtomEntry {
        let mut entry = self.entry;
        entry.id = entry.id.trim().to_string();
        entry.title = entry.title.trim().to_string();
        entry.summary = entry.summary.trim().to_string();
        entry
    }
}

fn field_for(local_name: &[u8]) -> Option<Field> {
    match local_name {
        b"id" => Some(Field::Id),
        b"title" => Some(Field::Title),
        b"summary" => Some(Field::Summary),
        _ => None,
    }
}

fn is_atom(ns: &ResolveResult<'_>) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == ATOM_NS)
}

/// ルート直下の Atom `entry` を抽出する。
///
/// # Errors
/// XML として不正な場合は [`FeedError`] を返す。
pub fn parse_feed(xml: &str) -> Result<Vec<AtomEntry>, FeedError> {
    let mut reader = NsReader::from_str(xml);
    let mut entries = Vec::new();
    let mut current: Option<EntryBuilder> = None;
    let mut depth = 0usize;
    let mut saw_root = false;

    loop {
        let (ns, event) = reader.read_resolved_event()?;
        let atom = is_atom(&ns);
        match event {
            Event::Start(element) => {
                saw_root = true;
                let local = element.local_name();
                match (depth, local.as_ref()) {
                    (1, b"entry") if atom => current = Some(EntryBuilder::default()),
                    (2, name) if atom => {
                        if let Some(builder) = current.as_mut() {
                            match field_for(name) {
                                Some(field) => builder.begin(field),
                                None if name == b"category" => builder.push_category(&element)?,
                                None => {}
                            }
                        }
                    }
                    // only the text before the first nested element counts
                    (nested, _) if nested >= 3 => {
                        if let Some(builder) = current.as_mut() {
                            builder.capture = None;
                        }
                    }
                    _ => {}
                }
                depth += 1;
            }
            Event::Empty(element) => {
                saw_root = true;
                let local = element.local_name();
                match (depth, local.as_ref()) {
                    (1, b"entry") if atom => entries.push(AtomEntry::default()),
                    (2, name) if atom => {
                        if let Some(builder) = current.as_mut() {
                            match field_for(name) {
                                // an empty first element still shadows later ones
                                Some(field) => {
                                    builder.begin(field);
                                    builder.capture = None;
                                }
                                None if name == b"category" => builder.push_category(&element)?,
                                None => {}
                            }
                        }
                    }
                    (nested, _) if nested >= 3 => {
                        if let Some(builder) = current.as_mut() {
                            builder.capture = None;
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(text) if depth == 3 => {
                if let Some(builder) = current.as_mut() {
                    builder.push_text(&text.unescape()?);
                }
            }
            Event::CData(data) if depth == 3 => {
                if let Some(builder) = current.as_mut() {
                    builder.push_text(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                match depth {
                    2 => {
                        if let Some(builder) = current.as_mut() {
                            builder.capture = None;
                        }
                    }
                    1 => {
                        if let Some(builder) = current.take() {
                            entries.push(builder.finish());
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(FeedError::NoRoot);
    }
    if depth != 0 {
        return Err(FeedError::Unclosed);
    }
    Ok(entries)
}
