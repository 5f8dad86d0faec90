use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use thiserror::Error;

use crate::config::ChannelInfo;
use crate::feed::types::ArticleRecord;
use crate::util::strip_xml_invalid_chars;

/// Content type the generated document should be served with.
pub const RSS_CONTENT_TYPE: &str = "application/rss+xml; charset=utf-8";

/// A record lacks one of the fields every `<item>` needs.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Record {index} is missing required field `{field}`")]
pub struct MalformedRecordError {
    /// Position of the record in the input slice
    pub index: usize,
    /// `id`, `title` or `content`
    pub field: &'static str,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Malformed(#[from] MalformedRecordError),
    #[error("Failed to write RSS document: {0}")]
    Xml(#[from] std::io::Error),
    #[error("Generated RSS contains invalid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Renders records as an RSS 2.0 document.
///
/// Each record becomes one `<item>` in input order, with children
/// `title`, `author`, `category`, `tag`, `description` (the record's
/// content) and `guid` (the record's id). Absent optional fields are
/// written as empty elements, never omitted.
///
/// Text is escaped by the writer and stripped of characters XML 1.0 does
/// not allow, so the output always parses.
///
/// # Errors
///
/// [`BuildError::Malformed`] if any record lacks `id`, `title` or
/// `content`. Nothing is written for a partially valid input.
pub fn build(channel: &ChannelInfo, records: &[ArticleRecord]) -> Result<String, BuildError> {
    let items = records
        .iter()
        .enumerate()
        .map(|(index, record)| Item::from_record(index, record))
        .collect::<Result<Vec<_>, _>>()?;

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    writer.write_event(Event::Start(rss))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    write_text_element(&mut writer, "title", &channel.title)?;
    write_text_element(&mut writer, "description", &channel.description)?;
    write_text_element(&mut writer, "link", &channel.link)?;

    for item in &items {
        writer.write_event(Event::Start(BytesStart::new("item")))?;
        write_text_element(&mut writer, "title", item.title)?;
        write_text_element(&mut writer, "author", item.author)?;
        write_text_element(&mut writer, "category", item.category)?;
        write_text_element(&mut writer, "tag", item.tag)?;
        write_text_element(&mut writer, "description", item.description)?;
        write_text_element(&mut writer, "guid", &item.guid)?;
        writer.write_event(Event::End(BytesEnd::new("item")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    let xml = String::from_utf8(writer.into_inner().into_inner())?;
    tracing::debug!(items = items.len(), bytes = xml.len(), "Built RSS document");
    Ok(xml)
}

/// Borrowed view of a record with required fields resolved.
struct Item<'a> {
    title: &'a str,
    author: &'a str,
    category: &'a str,
    tag: &'a str,
    description: &'a str,
    guid: String,
}

impl<'a> Item<'a> {
    fn from_record(index: usize, record: &'a ArticleRecord) -> Result<Self, MalformedRecordError> {
        let missing = |field| MalformedRecordError { index, field };

        let guid = record.id.as_ref().ok_or_else(|| missing("id"))?.to_string();
        let title = record.title.as_deref().ok_or_else(|| missing("title"))?;
        let description = record.content.as_deref().ok_or_else(|| missing("content"))?;

        Ok(Self {
            title,
            author: record.author.as_deref().unwrap_or(""),
            category: record.category.as_deref().unwrap_or(""),
            tag: record.tag.as_deref().unwrap_or(""),
            description,
            guid,
        })
    }
}

fn write_text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> std::io::Result<()> {
    let text = strip_xml_invalid_chars(text);
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(&text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))
}
