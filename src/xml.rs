//! Owned-event cursor over `quick_xml` shared by the SCARF reader and the
//! assessment-summary parser. One buffer is reused for every event, so
//! memory stays flat no matter how large the document is.

use crate::error::{ConvertError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    attrs: Vec<(String, String)>,
}

impl Tag {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Start(Tag),
    Empty(Tag),
    End,
    Text(String),
    Eof,
}

pub struct XmlCursor<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    open: Vec<String>,
    source: String,
}

impl XmlCursor<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), &path.display().to_string()))
    }
}

impl<R: BufRead> XmlCursor<R> {
    pub fn new(input: R, source: &str) -> Self {
        Self {
            reader: Reader::from_reader(input),
            buf: Vec::new(),
            open: Vec::new(),
            source: source.to_string(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Slash-joined names of the currently open elements.
    pub fn location(&self) -> String {
        format!("/{}", self.open.join("/"))
    }

    pub fn next_node(&mut self) -> Result<Node> {
        self.buf.clear();
        let node = match self.reader.read_event_into(&mut self.buf)? {
            Event::Start(start) => {
                let tag = owned_tag(&start)?;
                self.open.push(tag.name.clone());
                Node::Start(tag)
            }
            Event::Empty(start) => Node::Empty(owned_tag(&start)?),
            Event::End(_) => {
                self.open.pop();
                Node::End
            }
            Event::Text(text) => Node::Text(text.unescape()?.into_owned()),
            Event::CData(cdata) => Node::Text(String::from_utf8_lossy(&cdata).into_owned()),
            Event::Eof => Node::Eof,
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {
                Node::Text(String::new())
            }
        };
        Ok(node)
    }

    /// Read the content of a text-only element whose start tag was just
    /// returned by [`next_node`](Self::next_node), consuming its end tag.
    pub fn text(&mut self) -> Result<String> {
        let element = self.location();
        let mut content = String::new();
        loop {
            match self.next_node()? {
                Node::Text(text) => content.push_str(&text),
                Node::End => return Ok(content),
                Node::Start(child) | Node::Empty(child) => {
                    return Err(ConvertError::Structural(format!(
                        "{}: element {element} must contain only text, found <{}> at byte {}",
                        self.source,
                        child.name,
                        self.reader.buffer_position()
                    )));
                }
                Node::Eof => return Err(self.unexpected_eof()),
            }
        }
    }

    /// Discard the subtree of the element whose start tag was just read.
    pub fn skip(&mut self) -> Result<()> {
        let mut depth = 1usize;
        loop {
            match self.next_node()? {
                Node::Start(_) => depth += 1,
                Node::End => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Node::Eof => return Err(self.unexpected_eof()),
                Node::Empty(_) | Node::Text(_) => {}
            }
        }
    }

    pub fn unexpected_eof(&self) -> ConvertError {
        ConvertError::malformed(
            self.source.clone(),
            format!("unexpected end of document inside {}", self.location()),
        )
    }
}

fn owned_tag(start: &BytesStart<'_>) -> Result<Tag> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        attrs.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            attr.unescape_value()?.into_owned(),
        ));
    }
    Ok(Tag { name, attrs })
}
