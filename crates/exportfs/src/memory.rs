//! In-process medium for verifying exporters without touching storage.
//!
//! Text entries and structured documents live in per-directory maps;
//! sub-directories are shared nodes, so every handle for the same directory
//! sees the same content. Raw binary sinks and nested archives are not
//! available here.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Cursor, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::document;
use crate::error::{Error, Result};
use crate::name::make_legal_name;
use crate::sink::{InputStream, TextSink};

const MEDIUM: &str = "in-memory destination";

/// Growable text buffer shared between a [`TextSink`] and its directory.
#[derive(Clone, Debug, Default)]
pub struct MemoryBuffer(Arc<Mutex<Vec<u8>>>);

impl MemoryBuffer {
    fn snapshot(&self) -> Result<Vec<u8>> {
        Ok(self.0.lock().map_err(|_| Error::Poisoned)?.clone())
    }
}

impl Write for MemoryBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.0.lock().map_err(|_| io::Error::from(Error::Poisoned))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Node {
    documents: BTreeMap<String, Vec<u8>>,
    texts: BTreeMap<String, MemoryBuffer>,
    dirs: BTreeMap<String, Arc<Mutex<Node>>>,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryDestination {
    node: Arc<Mutex<Node>>,
    path: String,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&self) -> Result<MutexGuard<'_, Node>> {
        self.node.lock().map_err(|_| Error::Poisoned)
    }

    pub fn location(&self) -> String {
        format!("memory:/{}", self.path)
    }

    pub fn make_legal_name<'n>(&self, name: &'n str) -> Cow<'n, str> {
        make_legal_name(name)
    }

    pub fn relative_path(&self, name: &str) -> String {
        format!("{}{}", self.path, make_legal_name(name))
    }

    /// Register a fresh buffer under `name`, replacing any earlier entry.
    pub fn text_sink<'a>(&self, name: &str) -> Result<TextSink<'a>> {
        let name = make_legal_name(name).into_owned();
        let buffer = MemoryBuffer::default();
        let mut node = self.node()?;
        node.documents.remove(&name);
        node.texts.insert(name, buffer.clone());
        Ok(TextSink::Memory(buffer))
    }

    pub fn input_stream(&self, name: &str) -> Result<Option<InputStream>> {
        let name = make_legal_name(name);
        let node = self.node()?;
        let content = match (node.texts.get(&*name), node.documents.get(&*name)) {
            (Some(buffer), _) => buffer.snapshot()?,
            (None, Some(document)) => document.clone(),
            (None, None) => return Ok(None),
        };
        Ok(Some(InputStream::Buffer(Cursor::new(content))))
    }

    pub fn write_document<T: Serialize + ?Sized>(&self, name: &str, doc: &T) -> Result<()> {
        let mut content = Vec::new();
        document::serialize(doc, &mut content)?;

        let name = make_legal_name(name).into_owned();
        let mut node = self.node()?;
        node.texts.remove(&name);
        node.documents.insert(name, content);
        Ok(())
    }

    pub fn read_document<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.input_stream(name)? {
            Some(stream) => document::parse(stream).map(Some),
            None => Ok(None),
        }
    }

    pub fn list_files(&self) -> Result<Vec<String>> {
        let node = self.node()?;
        let names: BTreeSet<&String> = node.texts.keys().chain(node.documents.keys()).collect();
        Ok(names.into_iter().cloned().collect())
    }

    pub fn list_dirs(&self) -> Result<Vec<String>> {
        Ok(self.node()?.dirs.keys().cloned().collect())
    }

    /// Remove a text entry, document or sub-directory named `name`.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let name = make_legal_name(name);
        let mut node = self.node()?;
        let removed = node.texts.remove(&*name).is_some()
            | node.documents.remove(&*name).is_some()
            | node.dirs.remove(&*name).is_some();
        Ok(removed)
    }

    pub fn dir(&self, name: &str) -> Result<Self> {
        let name = make_legal_name(name).into_owned();
        let child = Arc::clone(self.node()?.dirs.entry(name.clone()).or_default());
        Ok(Self {
            node: child,
            path: format!("{}{}/", self.path, name),
        })
    }

    pub(crate) fn unsupported(operation: &'static str) -> Error {
        Error::unsupported(operation, MEDIUM)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    fn read(dest: &MemoryDestination, name: &str) -> Option<String> {
        let mut stream = dest.input_stream(name).unwrap()?;
        let mut text = String::new();
        stream.read_to_string(&mut text).unwrap();
        Some(text)
    }

    #[test]
    fn text_round_trip() {
        let dest = MemoryDestination::new();
        let mut sink = dest.text_sink("a.txt").unwrap();
        sink.write_str("hello").unwrap();
        sink.close().unwrap();

        assert_eq!(read(&dest, "a.txt").as_deref(), Some("hello"));
    }

    #[test]
    fn missing_entry_is_none() {
        let dest = MemoryDestination::new();
        assert!(dest.input_stream("nope").unwrap().is_none());
    }

    #[test]
    fn reopening_text_sink_truncates() {
        let dest = MemoryDestination::new();
        dest.text_sink("a.txt").unwrap().write_str("first").unwrap();
        dest.text_sink("a.txt").unwrap().write_str("second").unwrap();
        assert_eq!(read(&dest, "a.txt").as_deref(), Some("second"));
    }

    #[test]
    fn dir_handles_share_content() {
        let dest = MemoryDestination::new();
        dest.dir("reports").unwrap().text_sink("one.txt").unwrap().write_str("1").unwrap();
        dest.dir("reports").unwrap().text_sink("two.txt").unwrap().write_str("2").unwrap();

        assert_eq!(dest.list_dirs().unwrap(), ["reports"]);
        assert_eq!(dest.dir("reports").unwrap().list_files().unwrap(), ["one.txt", "two.txt"]);
        assert!(dest.list_files().unwrap().is_empty());
    }

    #[test]
    fn documents_and_texts_listed_once() {
        let dest = MemoryDestination::new();
        dest.write_document("study.json", &vec![1, 2, 3]).unwrap();
        dest.text_sink("notes.txt").unwrap().write_str("n").unwrap();
        dest.text_sink("study.json").unwrap().write_str("[4]").unwrap();

        assert_eq!(dest.list_files().unwrap(), ["notes.txt", "study.json"]);
        assert_eq!(dest.read_document::<Vec<i32>>("study.json").unwrap(), Some(vec![4]));
    }

    #[test]
    fn delete_reports_presence() {
        let dest = MemoryDestination::new();
        dest.write_document("doc.json", "value").unwrap();
        assert!(dest.delete("doc.json").unwrap());
        assert!(!dest.delete("doc.json").unwrap());
    }

    #[test]
    fn locations_follow_dir_chain() {
        let dest = MemoryDestination::new();
        let nested = dest.dir("a").unwrap().dir("b").unwrap();
        assert_eq!(nested.location(), "memory:/a/b/");
        assert_eq!(nested.relative_path("c.txt"), "a/b/c.txt");
    }
}
