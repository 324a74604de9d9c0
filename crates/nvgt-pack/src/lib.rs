//! Indexed, optionally-encrypted, content-addressable container format.
//!
//! A pack is a sequence of named byte blobs (the data region) followed by a
//! checksummed table of contents. It can live as a standalone file or as a byte
//! range embedded inside a host binary — see [`Pack::open`]'s `pack_offset`/
//! `pack_size` parameters, which the payload loader crate uses to hand a pack
//! instance a slice of the running executable instead of its own file.
//!
//! ```no_run
//! use nvgt_pack::Pack;
//!
//! let mut pack = Pack::new();
//! pack.create("assets.pack", "").unwrap();
//! pack.add_memory("greeting.txt", b"hello").unwrap();
//! pack.close().unwrap();
//!
//! let mut pack = Pack::new();
//! pack.open("assets.pack", "", 0, 0).unwrap();
//! assert!(pack.file_exists("greeting.txt"));
//! ```

mod crypto;
mod error;
mod pack;
mod section;
mod toc;
pub mod varint;

pub use crypto::{ChaChaReader, ChaChaWriter};
pub use error::{PackError, Result};
pub use pack::{Pack, HEADER_LEN, MAGIC};
pub use section::SectionReader;
pub use toc::{Toc, TocEntry, MAX_NAME_LEN};
