use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::analysis::{emit_symbols, DieWalker, NeededSymbols, WalkOptions, WalkState};
use crate::backends::{BinaryReader, LinkerQuery};
use crate::config::{GeneratorConfig, OutputLayout};
use crate::error::FactError;
use crate::fact;
use crate::facts::{FactBlock, FactDocument, FactSink, FactWriter};
use crate::model::Corpus;

/// Binaries handed to one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Binaries under ABI assessment; one fact file each.
    pub mains: Vec<PathBuf>,
    /// Dependency libraries providing context.
    pub libraries: Vec<PathBuf>,
    /// Compiler/toolchain binaries providing context.
    pub compilers: Vec<PathBuf>,
}

impl GenerationRequest {
    pub fn new(mains: Vec<PathBuf>) -> Self {
        Self { mains, ..Default::default() }
    }

    pub fn with_libraries(mut self, libraries: Vec<PathBuf>) -> Self {
        self.libraries = libraries;
        self
    }

    pub fn with_compilers(mut self, compilers: Vec<PathBuf>) -> Self {
        self.compilers = compilers;
        self
    }

    /// Every input path once, mains first, keeping first occurrence.
    pub fn corpus_paths(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        self.mains
            .iter()
            .chain(&self.libraries)
            .chain(&self.compilers)
            .filter(|p| seen.insert((*p).clone()))
            .cloned()
            .collect()
    }
}

/// One fact file written for a main binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactFileRecord {
    pub main: PathBuf,
    pub path: PathBuf,
    pub facts: usize,
}

/// Emit header-level facts describing a corpus.
pub fn emit_corpus_metadata<S: FactSink + ?Sized>(corpus: &Corpus, sink: &mut S) {
    let path = corpus.path_str();
    let header = &corpus.header;

    sink.push(fact!("corpus", &path));
    sink.push(fact!("corpus_name", &path, corpus.name()));
    if let Some(soname) = &corpus.soname {
        sink.push(fact!("corpus_soname", &path, soname));
    }
    sink.push(fact!("corpus_class", &path, &header.class));
    sink.push(fact!("corpus_data_encoding", &path, &header.data_encoding));
    sink.push(fact!("corpus_file_version", &path, &header.file_version));
    sink.push(fact!("corpus_osabi", &path, &header.osabi));
    sink.push(fact!("corpus_abiversion", &path, header.abi_version));
    sink.push(fact!("corpus_type", &path, &header.object_type));
    sink.push(fact!("corpus_machine", &path, &header.machine));
    sink.push(fact!("corpus_version", &path, &header.version));
}

/// Blocks computed once per input corpus and shared by every document.
struct CorpusBlocks {
    metadata: Arc<FactBlock>,
    symbols: Arc<FactBlock>,
    debug_info: Arc<FactBlock>,
}

/// Coordinator that loads corpora, derives the needed-symbol set and
/// assembles one fact document per main binary.
pub struct FactGenerator<'a> {
    pub reader: &'a dyn BinaryReader,
    pub linker: &'a dyn LinkerQuery,
    pub config: &'a GeneratorConfig,
}

impl<'a> FactGenerator<'a> {
    pub fn new(
        reader: &'a dyn BinaryReader,
        linker: &'a dyn LinkerQuery,
        config: &'a GeneratorConfig,
    ) -> Self {
        Self { reader, linker, config }
    }

    fn load(&self, path: &Path) -> Result<Corpus, FactError> {
        let corpus = self
            .reader
            .load(path)
            .map_err(|source| FactError::Reader { path: path.to_path_buf(), source })?;
        info!(
            path = %path.display(),
            reader = self.reader.name(),
            symbols = corpus.symbols.len(),
            units = corpus.units.len(),
            "loaded corpus"
        );
        Ok(corpus)
    }

    /// Build the fact documents for a request without touching the output directory.
    pub fn documents(&self, request: &GenerationRequest) -> Result<Vec<FactDocument>, FactError> {
        if request.mains.is_empty() {
            return Err(FactError::NoMainBinaries);
        }
        let paths = request.corpus_paths();
        for path in &paths {
            if !path.is_file() {
                return Err(FactError::MissingInput(path.clone()));
            }
        }

        let mut corpora: HashMap<PathBuf, Corpus> = HashMap::new();
        for path in &paths {
            let corpus = self.load(path)?;
            corpora.insert(path.clone(), corpus);
        }

        let main_set: HashSet<&PathBuf> = request.mains.iter().collect();
        let needed = NeededSymbols::from_mains(
            request.mains.iter().filter_map(|p| corpora.get(p)),
        );
        info!(mains = request.mains.len(), needed = needed.len(), "computed needed-symbol set");

        let options = WalkOptions::from(self.config);
        let mut state = WalkState::new();
        let mut blocks: HashMap<PathBuf, CorpusBlocks> = HashMap::new();
        for path in &paths {
            let Some(corpus) = corpora.get(path) else { continue };
            blocks.insert(path.clone(), self.corpus_blocks(corpus, &needed, &options, &mut state));
        }

        let mut auxiliary: HashMap<PathBuf, Arc<FactBlock>> = HashMap::new();
        let mut documents = Vec::with_capacity(request.mains.len());
        let mut emitted_mains = HashSet::new();
        for main in &request.mains {
            if !emitted_mains.insert(main.clone()) {
                continue;
            }
            let Some(main_corpus) = corpora.get(main) else { continue };
            let mut document = FactDocument::new(main.clone());

            let mut marker = FactBlock::new(format!("Main corpus: {}", main.display()));
            marker.push(fact!("is_main_corpus", main_corpus.path_str()));
            document.blocks.push(Arc::new(marker));

            for aux_path in self.needed_library_paths(main_corpus, &corpora) {
                if let Some(block) = auxiliary.get(&aux_path) {
                    document.blocks.push(Arc::clone(block));
                    continue;
                }
                let corpus = match self.reader.load(&aux_path) {
                    Ok(corpus) => corpus,
                    Err(e) => {
                        warn!(path = %aux_path.display(), error = %e, "skipping needed library");
                        continue;
                    }
                };
                let mut block =
                    FactBlock::new(format!("Needed library symbols: {}", aux_path.display()));
                emit_symbols(&corpus, &needed, &mut block);
                let block = Arc::new(block);
                auxiliary.insert(aux_path, Arc::clone(&block));
                document.blocks.push(block);
            }

            // The main binary first, then every non-main input in request order.
            let members: Vec<&PathBuf> = std::iter::once(main)
                .chain(paths.iter().filter(|p| !main_set.contains(p)))
                .collect();
            let sections: [fn(&CorpusBlocks) -> Arc<FactBlock>; 3] = [
                |b| Arc::clone(&b.metadata),
                |b| Arc::clone(&b.symbols),
                |b| Arc::clone(&b.debug_info),
            ];
            for select in sections {
                for member in &members {
                    if let Some(corpus_blocks) = blocks.get(*member) {
                        document.blocks.push(select(corpus_blocks));
                    }
                }
            }

            debug!(main = %main.display(), facts = document.fact_count(), "assembled fact document");
            documents.push(document);
        }

        Ok(documents)
    }

    fn corpus_blocks(
        &self,
        corpus: &Corpus,
        needed: &NeededSymbols,
        options: &WalkOptions,
        state: &mut WalkState,
    ) -> CorpusBlocks {
        let path = corpus.path.display();

        let mut metadata = FactBlock::new(format!("Corpus facts: {path}"));
        emit_corpus_metadata(corpus, &mut metadata);

        let mut symbols = FactBlock::new(format!("Corpus symbols: {path}"));
        let kept = emit_symbols(corpus, needed, &mut symbols);

        let mut debug_info = FactBlock::new(format!("Debug information entries: {path}"));
        let ledger = state.ledger_mut(&corpus.path);
        let stats = DieWalker::new(corpus, options, ledger).walk_corpus(&mut debug_info);

        info!(
            corpus = %path,
            symbols = kept,
            entries = stats.entries,
            duplicate_children = stats.duplicate_children,
            truncated = stats.truncated,
            unsupported_types = stats.unsupported_types,
            "generated corpus facts"
        );

        CorpusBlocks {
            metadata: Arc::new(metadata),
            symbols: Arc::new(symbols),
            debug_info: Arc::new(debug_info),
        }
    }

    /// Runtime libraries of `main` that it declares as needed and that exist
    /// on disk, excluding corpora already part of the request.
    fn needed_library_paths(
        &self,
        main: &Corpus,
        inputs: &HashMap<PathBuf, Corpus>,
    ) -> Vec<PathBuf> {
        if !self.config.resolve_needed_libraries {
            return Vec::new();
        }
        let resolved = match self.linker.resolve(&main.path) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(
                    main = %main.path.display(),
                    linker = self.linker.name(),
                    error = %e,
                    "dynamic linker query failed; continuing without needed libraries"
                );
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        resolved
            .into_iter()
            .filter(|lib| main.needed.iter().any(|n| n == &lib.name))
            .filter(|lib| lib.path.exists())
            .filter(|lib| !inputs.contains_key(&lib.path))
            .filter(|lib| seen.insert(lib.path.clone()))
            .map(|lib| lib.path)
            .collect()
    }

    /// Build documents and write one fact file per main binary.
    pub fn generate(
        &self,
        request: &GenerationRequest,
        layout: &OutputLayout,
    ) -> Result<Vec<FactFileRecord>, FactError> {
        let documents = self.documents(request)?;
        write_documents(&documents, layout)
    }
}

/// Write each document to its own file under the layout's output directory.
pub fn write_documents(
    documents: &[FactDocument],
    layout: &OutputLayout,
) -> Result<Vec<FactFileRecord>, FactError> {
    fs::create_dir_all(&layout.out_dir)
        .map_err(|source| FactError::Io { path: layout.out_dir.clone(), source })?;

    let mains: Vec<PathBuf> = documents.iter().map(|d| d.main.clone()).collect();
    let files = layout.fact_files(&mains);

    let mut records = Vec::with_capacity(documents.len());
    for (document, file) in documents.iter().zip(files) {
        let mut writer = FactWriter::create(&file)?;
        writer.write_document(document);
        let facts = writer.written();
        writer.finish()?;
        info!(main = %document.main.display(), file = %file.display(), facts, "wrote fact file");
        records.push(FactFileRecord { main: document.main.clone(), path: file, facts });
    }
    Ok(records)
}
