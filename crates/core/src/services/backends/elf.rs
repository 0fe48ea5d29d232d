use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use gimli::{AttributeValue, EndianSlice, RunTimeEndian};
use goblin::elf::{section_header, sym, Elf};
use tracing::debug;

use crate::analysis::split_versioned;
use crate::backends::BinaryReader;
use crate::error::ReaderError;
use crate::model::{AttrValue, CompileUnit, Corpus, DieIndex, ElfHeader, SymbolMeta};

type Reader<'input> = EndianSlice<'input, RunTimeEndian>;

const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;
const EI_VERSION: usize = 6;
const EI_OSABI: usize = 7;
const EI_ABIVERSION: usize = 8;

/// ELF reader: goblin for headers and symbol tables, gimli for `.debug_info`.
pub struct ElfReader;

impl BinaryReader for ElfReader {
    fn name(&self) -> &'static str {
        "elf"
    }

    fn load(&self, path: &Path) -> Result<Corpus, ReaderError> {
        let bytes = fs::read(path)?;
        let elf = Elf::parse(&bytes).map_err(|e| ReaderError::Parse(e.to_string()))?;

        let mut corpus = Corpus::new(path);
        corpus.header = header_fields(&elf);
        corpus.soname = elf.soname.map(str::to_string);
        corpus.needed = elf.libraries.iter().map(|lib| lib.to_string()).collect();
        corpus.symbols = collect_symbols(&elf);
        corpus.units = load_units(&elf, &bytes)?;
        debug!(
            path = %path.display(),
            symbols = corpus.symbols.len(),
            units = corpus.units.len(),
            "loaded ELF corpus"
        );
        Ok(corpus)
    }
}

fn header_fields(elf: &Elf) -> ElfHeader {
    let ident = &elf.header.e_ident;
    ElfHeader {
        class: match ident[EI_CLASS] {
            1 => "ELFCLASS32".into(),
            2 => "ELFCLASS64".into(),
            other => format!("ELFCLASS_{other}"),
        },
        data_encoding: match ident[EI_DATA] {
            1 => "ELFDATA2LSB".into(),
            2 => "ELFDATA2MSB".into(),
            other => format!("ELFDATA_{other}"),
        },
        file_version: version_name(u32::from(ident[EI_VERSION])),
        osabi: match ident[EI_OSABI] {
            0 => "ELFOSABI_SYSV".into(),
            1 => "ELFOSABI_HPUX".into(),
            2 => "ELFOSABI_NETBSD".into(),
            3 => "ELFOSABI_LINUX".into(),
            6 => "ELFOSABI_SOLARIS".into(),
            9 => "ELFOSABI_FREEBSD".into(),
            97 => "ELFOSABI_ARM".into(),
            255 => "ELFOSABI_STANDALONE".into(),
            other => format!("ELFOSABI_{other}"),
        },
        abi_version: u64::from(ident[EI_ABIVERSION]),
        object_type: match elf.header.e_type {
            0 => "ET_NONE".into(),
            1 => "ET_REL".into(),
            2 => "ET_EXEC".into(),
            3 => "ET_DYN".into(),
            4 => "ET_CORE".into(),
            other => format!("ET_{other:#x}"),
        },
        machine: match elf.header.e_machine {
            3 => "EM_386".into(),
            8 => "EM_MIPS".into(),
            20 => "EM_PPC".into(),
            21 => "EM_PPC64".into(),
            22 => "EM_S390".into(),
            40 => "EM_ARM".into(),
            62 => "EM_X86_64".into(),
            183 => "EM_AARCH64".into(),
            243 => "EM_RISCV".into(),
            258 => "EM_LOONGARCH".into(),
            other => format!("EM_{other}"),
        },
        version: version_name(elf.header.e_version),
    }
}

fn version_name(version: u32) -> String {
    match version {
        0 => "EV_NONE".into(),
        1 => "EV_CURRENT".into(),
        other => format!("EV_{other}"),
    }
}

fn symbol_meta(symbol: &sym::Sym, version: Option<String>) -> SymbolMeta {
    SymbolMeta {
        symbol_type: format!("STT_{}", sym::type_to_str(symbol.st_type())),
        binding: format!("STB_{}", sym::bind_to_str(symbol.st_bind())),
        visibility: format!("STV_{}", sym::visibility_to_str(symbol.st_visibility())),
        version,
        defined: symbol.st_shndx != section_header::SHN_UNDEF as usize,
    }
}

/// Symbols from `.dynsym` (with GNU versions), then `.symtab` for names not already seen.
fn collect_symbols(elf: &Elf) -> BTreeMap<String, SymbolMeta> {
    let mut symbols = BTreeMap::new();
    for (index, symbol) in elf.dynsyms.iter().enumerate() {
        let Some(name) = elf.dynstrtab.get_at(symbol.st_name) else { continue };
        if name.is_empty() {
            continue;
        }
        let version = symbol_version(elf, index);
        symbols.insert(name.to_string(), symbol_meta(&symbol, version));
    }

    let dynamic: HashSet<String> =
        symbols.keys().map(|name| split_versioned(name).0.to_string()).collect();
    for symbol in elf.syms.iter() {
        let Some(name) = elf.strtab.get_at(symbol.st_name) else { continue };
        if name.is_empty() || dynamic.contains(split_versioned(name).0) {
            continue;
        }
        symbols.entry(name.to_string()).or_insert_with(|| symbol_meta(&symbol, None));
    }
    symbols
}

/// GNU version name of dynamic symbol `index`, via versym and verdef/verneed.
fn symbol_version(elf: &Elf, index: usize) -> Option<String> {
    let version = elf.versym.as_ref()?.get_at(index)?.version();
    // 0 is local, 1 is the unversioned global base.
    if version <= 1 {
        return None;
    }
    if let Some(verdef) = &elf.verdef {
        for def in verdef.iter() {
            if def.vd_ndx == version {
                let aux = def.iter().next()?;
                return elf.dynstrtab.get_at(aux.vda_name).map(str::to_string);
            }
        }
    }
    if let Some(verneed) = &elf.verneed {
        for need in verneed.iter() {
            for aux in need.iter() {
                if aux.vna_other == version {
                    return elf.dynstrtab.get_at(aux.vna_name).map(str::to_string);
                }
            }
        }
    }
    None
}

fn section_data<'a>(elf: &Elf, bytes: &'a [u8], name: &str) -> &'a [u8] {
    for header in &elf.section_headers {
        if header.sh_type == section_header::SHT_NOBITS {
            continue;
        }
        if elf.shdr_strtab.get_at(header.sh_name) == Some(name) {
            let start = header.sh_offset as usize;
            let end = start.saturating_add(header.sh_size as usize);
            return bytes.get(start..end).unwrap_or(&[]);
        }
    }
    &[]
}

fn dwarf_err(e: gimli::Error) -> ReaderError {
    ReaderError::Dwarf(e.to_string())
}

fn load_units<'input>(
    elf: &Elf,
    bytes: &'input [u8],
) -> Result<Vec<CompileUnit>, ReaderError> {
    let endian = if elf.little_endian { RunTimeEndian::Little } else { RunTimeEndian::Big };
    let dwarf = gimli::Dwarf::load(|id: gimli::SectionId| -> Result<Reader<'input>, gimli::Error> {
        Ok(EndianSlice::new(section_data(elf, bytes, id.name()), endian))
    })
    .map_err(dwarf_err)?;

    let mut units = Vec::new();
    let mut headers = dwarf.units();
    while let Some(header) = headers.next().map_err(dwarf_err)? {
        let unit_offset = header.offset().as_debug_info_offset().map(|o| o.0 as u64).unwrap_or(0);
        let unit_end = header.length_including_self() as u64;
        let unit = dwarf.unit(header).map_err(dwarf_err)?;
        units.push(convert_unit(&dwarf, &unit, unit_offset, unit_end)?);
    }
    Ok(units)
}

/// Flatten one unit into the arena model, recording each entry's encoded size.
fn convert_unit<'input>(
    dwarf: &gimli::Dwarf<Reader<'input>>,
    unit: &gimli::Unit<Reader<'input>>,
    unit_offset: u64,
    unit_end: u64,
) -> Result<CompileUnit, ReaderError> {
    let mut out = CompileUnit::new(unit_offset);
    let mut stack: Vec<DieIndex> = Vec::new();
    let mut depth: isize = 0;
    // Previous entry whose size is known once the next offset is.
    let mut pending: Option<(DieIndex, u64, bool)> = None;

    let mut cursor = unit.entries();
    while let Some((delta, entry)) = cursor.next_dfs().map_err(dwarf_err)? {
        depth += delta;
        let offset = entry.offset().0 as u64;

        if let Some((index, start, has_children)) = pending.take() {
            // Null entries closing sibling lists sit between the two offsets.
            let nulls = (isize::from(has_children) - delta).max(0) as u64;
            out.set_size(index, offset.saturating_sub(start).saturating_sub(nulls));
        }

        stack.truncate(depth.max(0) as usize);
        let parent = stack.last().copied();
        let tag = entry
            .tag()
            .static_string()
            .map(str::to_string)
            .unwrap_or_else(|| format!("DW_TAG_{:#x}", entry.tag().0));

        let mut attributes = Vec::new();
        let mut attrs = entry.attrs();
        while let Some(attr) = attrs.next().map_err(dwarf_err)? {
            let name = attr
                .name()
                .static_string()
                .map(str::to_string)
                .unwrap_or_else(|| format!("DW_AT_{:#x}", attr.name().0));
            attributes.push((name, convert_value(dwarf, unit, attr.value())));
        }

        let index = out.push(parent, offset, tag, attributes);
        stack.push(index);
        pending = Some((index, offset, entry.has_children()));
    }

    if let Some((index, start, has_children)) = pending {
        let nulls = depth.max(0) as u64 + u64::from(has_children);
        out.set_size(index, unit_end.saturating_sub(start).saturating_sub(nulls));
    }
    Ok(out)
}

fn convert_value<'input>(
    dwarf: &gimli::Dwarf<Reader<'input>>,
    unit: &gimli::Unit<Reader<'input>>,
    value: AttributeValue<Reader<'input>>,
) -> AttrValue {
    match value {
        AttributeValue::UnitRef(offset) => AttrValue::UnitRef(offset.0 as u64),
        AttributeValue::DebugInfoRef(offset) => AttrValue::DebugInfoRef(offset.0 as u64),
        AttributeValue::Flag(flag) => AttrValue::Flag(flag),
        AttributeValue::Udata(v) => AttrValue::Udata(v),
        AttributeValue::Data1(v) => AttrValue::Udata(u64::from(v)),
        AttributeValue::Data2(v) => AttrValue::Udata(u64::from(v)),
        AttributeValue::Data4(v) => AttrValue::Udata(u64::from(v)),
        AttributeValue::Data8(v) => AttrValue::Udata(v),
        AttributeValue::Sdata(v) => AttrValue::Sdata(v),
        AttributeValue::Language(lang) => AttrValue::Str(
            lang.static_string()
                .map(str::to_string)
                .unwrap_or_else(|| format!("DW_LANG_{:#x}", lang.0)),
        ),
        other => match dwarf.attr_string(unit, other.clone()) {
            Ok(s) => AttrValue::Str(s.to_string_lossy().into_owned()),
            Err(_) => AttrValue::Other(format!("{other:?}")),
        },
    }
}
