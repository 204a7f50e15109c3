//! Structured documents: any serde type, stored as pretty-printed UTF-8 JSON.

use std::io::{Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

pub fn serialize<T, W>(document: &T, mut sink: W) -> Result<()>
where
    T: Serialize + ?Sized,
    W: Write,
{
    serde_json::to_writer_pretty(&mut sink, document)?;
    sink.write_all(b"\n")?;
    Ok(())
}

pub fn parse<T, R>(source: R) -> Result<T>
where
    T: DeserializeOwned,
    R: Read,
{
    Ok(serde_json::from_reader(source)?)
}
