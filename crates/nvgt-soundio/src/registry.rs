//! Per-process registry of protocols and filters, plus triplet resolution — the
//! uniform "open an input stream for a URI" layer the audio engine's resource
//! manager calls through.

use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::directive::Directive;
use crate::error::{Result, SoundIoError};
use crate::filter::{EncryptionFilter, Filter, NullFilter};
use crate::protocol::{FilesystemProtocol, MemoryProtocol, PackProtocol, Protocol};

/// The string key a triplet resolution is cached and looked up under:
/// `"{name}\x1e{protocol_slot}\x1e{suffix}"`.
pub fn triplet_key(name: &str, protocol_slot: usize, suffix: &str) -> String {
    format!("{name}\u{1e}{protocol_slot}\u{1e}{suffix}")
}

struct PendingTriplet {
    name: String,
    protocol_slot: usize,
    protocol_directive: Directive,
    filter_slot: usize,
    filter_directive: Directive,
}

/// Registration slots start at 1; slot 0 means "use the current default".
pub struct SoundService {
    protocols: Vec<Arc<dyn Protocol>>,
    filters: Vec<Arc<dyn Filter>>,
    default_protocol: AtomicUsize,
    default_filter: AtomicUsize,
    pending: DashMap<String, PendingTriplet>,
}

impl Default for SoundService {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundService {
    pub fn new() -> Self {
        // Slot 0 is reserved for "use default"; built-ins start at slot 1.
        let mut protocols: Vec<Arc<dyn Protocol>> = vec![Arc::new(FilesystemProtocol)];
        protocols.push(Arc::new(FilesystemProtocol));
        protocols.push(Arc::new(MemoryProtocol));
        protocols.push(Arc::new(PackProtocol));

        let mut filters: Vec<Arc<dyn Filter>> = vec![Arc::new(NullFilter)];
        filters.push(Arc::new(NullFilter));
        filters.push(Arc::new(EncryptionFilter));

        Self {
            protocols,
            filters,
            default_protocol: AtomicUsize::new(1),
            default_filter: AtomicUsize::new(1),
            pending: DashMap::new(),
        }
    }

    pub fn register_protocol(&mut self, protocol: Arc<dyn Protocol>) -> usize {
        self.protocols.push(protocol);
        self.protocols.len() - 1
    }

    pub fn register_filter(&mut self, filter: Arc<dyn Filter>) -> usize {
        self.filters.push(filter);
        self.filters.len() - 1
    }

    pub fn set_default_protocol(&self, slot: usize) {
        self.default_protocol.store(slot, Ordering::SeqCst);
    }

    pub fn set_default_filter(&self, slot: usize) {
        self.default_filter.store(slot, Ordering::SeqCst);
    }

    fn resolve_protocol_slot(&self, slot: usize) -> usize {
        if slot == 0 {
            self.default_protocol.load(Ordering::SeqCst)
        } else {
            slot
        }
    }

    fn resolve_filter_slot(&self, slot: usize) -> usize {
        if slot == 0 {
            self.default_filter.load(Ordering::SeqCst)
        } else {
            slot
        }
    }

    fn protocol(&self, slot: usize) -> Result<&Arc<dyn Protocol>> {
        self.protocols
            .get(slot)
            .ok_or(SoundIoError::NoSuchProtocol(slot))
    }

    fn filter(&self, slot: usize) -> Result<&Arc<dyn Filter>> {
        self.filters.get(slot).ok_or(SoundIoError::NoSuchFilter(slot))
    }

    /// Records a pending resolution and returns its triplet key.
    pub fn prepare_triplet(
        &self,
        name: &str,
        protocol_slot: usize,
        protocol_directive: Directive,
        filter_slot: usize,
        filter_directive: Directive,
    ) -> Result<String> {
        let resolved_protocol_slot = self.resolve_protocol_slot(protocol_slot);
        let protocol = self.protocol(resolved_protocol_slot)?;
        let suffix = protocol.suffix(&protocol_directive);
        let key = triplet_key(name, resolved_protocol_slot, &suffix);
        self.pending.insert(
            key.clone(),
            PendingTriplet {
                name: name.to_string(),
                protocol_slot: resolved_protocol_slot,
                protocol_directive,
                filter_slot: self.resolve_filter_slot(filter_slot),
                filter_directive,
            },
        );
        Ok(key)
    }

    /// Resolves a previously-prepared triplet into an input stream: opens the
    /// protocol, then applies the filter.
    pub fn open_triplet(&self, key: &str) -> Result<Box<dyn Read + Send>> {
        let pending = self
            .pending
            .get(key)
            .ok_or_else(|| SoundIoError::UnknownTriplet(key.to_string()))?;
        let protocol = self.protocol(pending.protocol_slot)?;
        let stream = protocol.open_uri(&pending.name, &pending.protocol_directive)?;
        let filter = self.filter(pending.filter_slot)?;
        filter.wrap(stream, &pending.filter_directive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn filesystem_triplet_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::File::create(&path).unwrap().write_all(b"hi").unwrap();

        let service = SoundService::new();
        let key = service
            .prepare_triplet(path.to_str().unwrap(), 0, Directive::None, 0, Directive::None)
            .unwrap();
        let mut stream = service.open_triplet(&key).unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hi");
    }

    #[test]
    fn memory_registrations_with_same_name_do_not_collide() {
        let service = SoundService::new();
        let reg_a = Directive::Memory(crate::directive::MemoryRegistration {
            bytes: Arc::new(b"aaa".to_vec()),
            tag: "a".into(),
        });
        let reg_b = Directive::Memory(crate::directive::MemoryRegistration {
            bytes: Arc::new(b"bbb".to_vec()),
            tag: "b".into(),
        });
        let key_a = service.prepare_triplet("buf", 2, reg_a, 0, Directive::None).unwrap();
        let key_b = service.prepare_triplet("buf", 2, reg_b, 0, Directive::None).unwrap();
        assert_ne!(key_a, key_b);

        let mut out_a = Vec::new();
        service.open_triplet(&key_a).unwrap().read_to_end(&mut out_a).unwrap();
        assert_eq!(out_a, b"aaa");
    }

    #[test]
    fn encryption_filter_is_registered_at_init() {
        use nvgt_pack::ChaChaWriter;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.bin");
        let mut sink = Vec::new();
        {
            let mut w = ChaChaWriter::new(std::io::Cursor::new(&mut sink), b"hunter2", None).unwrap();
            w.write_all(b"top secret payload").unwrap();
        }
        std::fs::write(&path, &sink).unwrap();

        let service = SoundService::new();
        let key = service
            .prepare_triplet(
                path.to_str().unwrap(),
                0,
                Directive::None,
                2,
                Directive::Key(Arc::from("hunter2")),
            )
            .unwrap();
        let mut out = Vec::new();
        service.open_triplet(&key).unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"top secret payload");
    }
}
