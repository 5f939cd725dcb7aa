use std::fs;
use std::path::Path;

use crate::config::ToolConfig;
use crate::error::FormatError;
use crate::lecode::Document;
use crate::lecode::header::HeaderLayout;
use crate::lecode::settings::{LparLayout, Settings};
use crate::lecode::slots::{SlotModel, SlotUsage};
use crate::lecode::template::default_binary;
use crate::lecode::types::{NO_SLOT, Region, SlotFlags};
use crate::lex::LexContainer;
use crate::lex::types::magic_name;

use super::compare::{CompareAxis, Comparison, compare_binaries, compare_documents};
use super::error::{CoreError, CoreErrorCode};
use super::types::{
    Capabilities, CapabilityIssue, FileKind, LeCodeSnapshot, LexSectionEntry, LexSnapshot,
    Snapshot, UsageCount,
};

#[derive(Debug, Default, Clone)]
pub struct Engine {
    config: ToolConfig,
}

#[derive(Debug)]
enum LoadedDocument {
    LeCode(Box<Document>),
    Lex {
        container: Box<LexContainer>,
        original: Vec<u8>,
    },
}

#[derive(Debug)]
pub struct Session {
    snapshot: Snapshot,
    capabilities: Capabilities,
    document: LoadedDocument,
    config: ToolConfig,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ToolConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    pub fn open_path<P: AsRef<Path>>(
        &self,
        path: P,
        hint: Option<FileKind>,
    ) -> Result<Session, CoreError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Io,
                format!("failed to read {}: {e}", path.display()),
            )
        })?;
        self.open_bytes(bytes, hint)
    }

    pub fn open_bytes<B: AsRef<[u8]>>(
        &self,
        bytes: B,
        hint: Option<FileKind>,
    ) -> Result<Session, CoreError> {
        let bytes = bytes.as_ref();

        match hint {
            Some(FileKind::LeCode) => Document::parse(bytes)
                .map(|doc| self.session_from_lecode(doc))
                .map_err(|e| CoreError::format("failed to parse as LE-CODE", e)),
            Some(FileKind::Lex) => LexContainer::decode(bytes)
                .map(|lex| self.session_from_lex(lex, bytes))
                .map_err(|e| CoreError::format("failed to parse as LEX", e)),
            None => {
                let lecode = Document::parse(bytes);
                let lex = LexContainer::decode(bytes);

                match (lecode, lex) {
                    (Ok(doc), Err(_)) => Ok(self.session_from_lecode(doc)),
                    (Err(_), Ok(lex)) => Ok(self.session_from_lex(lex, bytes)),
                    (Ok(_), Ok(_)) => Err(CoreError::new(
                        CoreErrorCode::DetectionAmbiguous,
                        "input parsed as both LE-CODE and LEX; supply a file kind hint",
                    )),
                    (Err(e1), Err(e2)) => Err(CoreError::new(
                        CoreErrorCode::Parse,
                        format!("failed to parse input: LE-CODE: {e1}; LEX: {e2}"),
                    )),
                }
            }
        }
    }

    /// Session over the built-in reference binary of `region`.
    pub fn open_default(&self, region: Region) -> Result<Session, CoreError> {
        self.open_bytes(default_binary(region), Some(FileKind::LeCode))
    }

    /// A session over an empty LEX container.
    pub fn new_lex(&self) -> Session {
        self.session_from_lex(LexContainer::new(), &[])
    }

    fn session_from_lecode(&self, doc: Document) -> Session {
        let capabilities = lecode_capabilities(&doc, &self.config);
        Session {
            snapshot: Snapshot::LeCode(lecode_snapshot(&doc, &self.config)),
            capabilities,
            document: LoadedDocument::LeCode(Box::new(doc)),
            config: self.config.clone(),
        }
    }

    fn session_from_lex(&self, lex: LexContainer, bytes: &[u8]) -> Session {
        Session {
            snapshot: Snapshot::Lex(lex_snapshot(&lex)),
            capabilities: Capabilities::editable(Vec::new()),
            document: LoadedDocument::Lex {
                container: Box::new(lex),
                original: bytes.to_vec(),
            },
            config: self.config.clone(),
        }
    }
}

impl Session {
    pub fn kind(&self) -> FileKind {
        self.snapshot.kind()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    pub fn document(&self) -> Option<&Document> {
        match &self.document {
            LoadedDocument::LeCode(doc) => Some(doc),
            LoadedDocument::Lex { .. } => None,
        }
    }

    pub fn lex(&self) -> Option<&LexContainer> {
        match &self.document {
            LoadedDocument::Lex { container, .. } => Some(container),
            LoadedDocument::LeCode(_) => None,
        }
    }

    pub fn settings(&self) -> Result<&Settings, CoreError> {
        Ok(self.lecode()?.settings())
    }

    pub fn slots(&self) -> Result<&SlotModel, CoreError> {
        Ok(self.lecode()?.slots())
    }

    pub fn usage_table(&self) -> Result<Vec<SlotUsage>, CoreError> {
        Ok(self.lecode()?.slots().usage_table().to_vec())
    }

    pub fn to_bytes_unmodified(&self) -> Vec<u8> {
        match &self.document {
            LoadedDocument::LeCode(doc) => doc.to_bytes_unmodified(),
            LoadedDocument::Lex { original, .. } => original.clone(),
        }
    }

    pub fn to_bytes_modified(&self) -> Result<Vec<u8>, CoreError> {
        match &self.document {
            LoadedDocument::LeCode(doc) => doc
                .to_bytes_modified(&self.config)
                .map_err(|e| CoreError::format("failed to serialize modified LE-CODE", e)),
            LoadedDocument::Lex { container, .. } => Ok(container.encode()),
        }
    }

    /// Replace the settings. Values are normalized into their valid ranges.
    pub fn set_settings(&mut self, mut settings: Settings) -> Result<(), CoreError> {
        self.ensure_editable("set settings")?;
        settings.normalize();
        *self.lecode_mut()?.settings_mut() = settings;
        self.refresh_snapshot();
        Ok(())
    }

    pub fn set_slot(
        &mut self,
        slot: usize,
        property: u8,
        music: u8,
        flags: SlotFlags,
    ) -> Result<(), CoreError> {
        self.ensure_editable("set slot")?;
        let slots = self.lecode_mut()?.slots_mut();
        let invalid = |e: FormatError| {
            CoreError::new(CoreErrorCode::InvalidInput, format!("slot {slot:#x}: {e}"))
        };
        slots.set_property(slot, property).map_err(invalid)?;
        slots.set_music(slot, music).map_err(invalid)?;
        slots.set_flags(slot, flags).map_err(invalid)?;
        self.refresh_snapshot();
        Ok(())
    }

    /// Replace both cup tables. Every entry must name an existing slot or
    /// be the `NO_SLOT` padding marker.
    pub fn set_cups(&mut self, track: Vec<u32>, arena: Vec<u32>) -> Result<(), CoreError> {
        self.ensure_editable("set cups")?;
        let slots = self.lecode_mut()?.slots_mut();
        let n_slot = slots.n_slot();
        if let Some(bad) = track
            .iter()
            .chain(&arena)
            .find(|&&s| s != NO_SLOT && s as usize >= n_slot)
        {
            return Err(CoreError::new(
                CoreErrorCode::InvalidInput,
                format!("cup entry {bad:#x} is not below the slot count {n_slot:#x}"),
            ));
        }
        slots.set_cup_track(track);
        slots.set_cup_arena(arena);
        self.refresh_snapshot();
        Ok(())
    }

    pub fn recompute_flags(&mut self) -> Result<(), CoreError> {
        self.ensure_editable("recompute flags")?;
        self.lecode_mut()?.slots_mut().recompute_flags();
        self.refresh_snapshot();
        Ok(())
    }

    pub fn lex_append(
        &mut self,
        magic: u32,
        payload: &[u8],
        overwrite: bool,
    ) -> Result<bool, CoreError> {
        if magic == 0 {
            return Err(CoreError::new(
                CoreErrorCode::InvalidInput,
                "section magic must not be zero",
            ));
        }
        let stored = self.lex_mut()?.append(magic, payload, overwrite);
        if !stored {
            log::debug!("section {} kept, overwrite not requested", magic_name(magic));
        }
        self.refresh_snapshot();
        Ok(stored)
    }

    pub fn lex_remove(&mut self, magic: u32) -> Result<bool, CoreError> {
        let removed = self.lex_mut()?.remove(magic);
        self.refresh_snapshot();
        Ok(removed)
    }

    pub fn lex_purge(&mut self) -> Result<(), CoreError> {
        self.lex_mut()?.purge();
        self.refresh_snapshot();
        Ok(())
    }

    /// Compare the current (modified) bytes with `other`.
    pub fn compare_with(
        &self,
        other: &[u8],
        axes: &[CompareAxis],
    ) -> Result<Comparison, CoreError> {
        self.lecode()?;
        let current = self.to_bytes_modified()?;
        compare_binaries(&current, other, axes)
    }

    /// Compare the loaded binary with the reference binary of its region.
    pub fn compare_with_default(&self, axes: &[CompareAxis]) -> Result<Comparison, CoreError> {
        let doc = self.lecode()?;
        let reference_bytes = default_binary(doc.header.region);
        let reference = Document::parse(&reference_bytes)
            .map_err(|e| CoreError::format("reference binary", e))?;
        let current = doc.to_bytes_unmodified();
        Ok(compare_documents(doc, &current, &reference, &reference_bytes, axes))
    }

    fn ensure_editable(&self, what: &str) -> Result<(), CoreError> {
        if self.capabilities.can_apply_edits {
            return Ok(());
        }
        Err(CoreError::new(
            CoreErrorCode::UnsupportedOperation,
            format!("cannot {what}: {:?}", self.capabilities.issues),
        ))
    }

    fn lecode(&self) -> Result<&Document, CoreError> {
        self.document().ok_or_else(|| not_lecode(self.kind()))
    }

    fn lecode_mut(&mut self) -> Result<&mut Document, CoreError> {
        match &mut self.document {
            LoadedDocument::LeCode(doc) => Ok(doc),
            LoadedDocument::Lex { .. } => Err(not_lecode(FileKind::Lex)),
        }
    }

    fn lex_mut(&mut self) -> Result<&mut LexContainer, CoreError> {
        match &mut self.document {
            LoadedDocument::Lex { container, .. } => Ok(container),
            LoadedDocument::LeCode(_) => Err(CoreError::new(
                CoreErrorCode::UnsupportedOperation,
                "operation needs a LEX container, session holds an LE-CODE binary",
            )),
        }
    }

    fn refresh_snapshot(&mut self) {
        self.snapshot = match &self.document {
            LoadedDocument::LeCode(doc) => Snapshot::LeCode(lecode_snapshot(doc, &self.config)),
            LoadedDocument::Lex { container, .. } => Snapshot::Lex(lex_snapshot(container)),
        };
    }
}

fn not_lecode(kind: FileKind) -> CoreError {
    CoreError::new(
        CoreErrorCode::UnsupportedOperation,
        format!("operation needs an LE-CODE binary, session holds {kind:?}"),
    )
}

fn lecode_capabilities(doc: &Document, config: &ToolConfig) -> Capabilities {
    let mut issues = Vec::new();
    let mut blocking = false;

    if !doc.is_compatible(config) {
        issues.push(CapabilityIssue::NewerToolRequired);
        blocking = true;
    }
    if matches!(doc.header.layout, HeaderLayout::Future(_)) {
        issues.push(CapabilityIssue::FutureHeader);
        blocking = true;
    }
    let param = doc.param();
    if param.declared_size > LparLayout::CURRENT.size() {
        issues.push(CapabilityIssue::UnknownParamLayout);
    }
    if param.layout.is_none() {
        issues.push(CapabilityIssue::SettingsAbsent);
    }
    if doc.slots().check_capacity().is_err() {
        issues.push(CapabilityIssue::TableOverflow);
    }

    if blocking {
        Capabilities::read_only(issues)
    } else {
        Capabilities::editable(issues)
    }
}

fn lecode_snapshot(doc: &Document, config: &ToolConfig) -> LeCodeSnapshot {
    let slots = doc.slots();
    LeCodeSnapshot {
        header: doc.header.clone(),
        compatible: doc.is_compatible(config),
        param_size: doc.param().declared_size,
        lpar_layout: doc.param().layout,
        n_slot: slots.n_slot(),
        max_slot: slots.max_slot(),
        n_cup_track: slots.n_cup_track(),
        n_cup_arena: slots.n_cup_arena(),
        flags_bits: slots.flags_bits(),
        usage: slots
            .usage_counts()
            .into_iter()
            .map(|(kind, count)| UsageCount { kind, count })
            .collect(),
        warnings: doc.warnings().to_vec(),
    }
}

fn lex_snapshot(lex: &LexContainer) -> LexSnapshot {
    let (major, minor) = lex.version();
    LexSnapshot {
        major,
        minor,
        sections: lex
            .sorted()
            .map(|e| LexSectionEntry {
                magic: e.name(),
                size: e.payload.len(),
                known: e.is_known(),
            })
            .collect(),
        features: lex.have_features().bits(),
        warnings: lex.warnings().to_vec(),
    }
}
