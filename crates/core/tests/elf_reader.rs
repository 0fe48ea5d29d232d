#![cfg(feature = "elf-reader")]

use std::path::PathBuf;

use abi_facts_core::analysis::{DieWalker, WalkOptions, WalkState};
use abi_facts_core::backends::BinaryReader;
use abi_facts_core::error::ReaderError;
use abi_facts_core::facts::Fact;
use abi_facts_core::model::{AttrValue, DieIndex};
use abi_facts_core::services::backends::ElfReader;
use object::elf;
use object::write::elf::{FileHeader, ProgramHeader, Sym, Verdef, Verneed, Vernaux, Writer};
use object::write::{Object, Symbol, SymbolSection};
use object::{
    Architecture, BinaryFormat, Endianness, SectionKind, SymbolFlags, SymbolKind, SymbolScope,
};

fn write_fixture(dir: &std::path::Path) -> PathBuf {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);

    // .text with a single `ret`.
    let text_id = obj.add_section(Vec::new(), b".text".to_vec(), SectionKind::Text);
    obj.section_mut(text_id).append_data(&[0xC3], 1);

    obj.add_symbol(Symbol {
        name: b"exported_fn".to_vec(),
        value: 0,
        size: 1,
        kind: SymbolKind::Text,
        scope: SymbolScope::Dynamic,
        weak: false,
        section: SymbolSection::Section(text_id),
        flags: SymbolFlags::None,
    });
    obj.add_symbol(Symbol {
        name: b"imported_fn".to_vec(),
        value: 0,
        size: 0,
        kind: SymbolKind::Text,
        scope: SymbolScope::Dynamic,
        weak: false,
        section: SymbolSection::Undefined,
        flags: SymbolFlags::None,
    });

    let path = dir.join("fixture.o");
    std::fs::write(&path, obj.write().unwrap()).unwrap();
    path
}

#[test]
fn reads_header_fields_as_constant_names() {
    let temp = tempfile::tempdir().unwrap();
    let path = write_fixture(temp.path());

    let corpus = ElfReader.load(&path).expect("load elf");
    assert_eq!(corpus.path, path);
    assert_eq!(corpus.header.class, "ELFCLASS64");
    assert_eq!(corpus.header.data_encoding, "ELFDATA2LSB");
    assert_eq!(corpus.header.file_version, "EV_CURRENT");
    assert_eq!(corpus.header.object_type, "ET_REL");
    assert_eq!(corpus.header.machine, "EM_X86_64");
    assert_eq!(corpus.header.version, "EV_CURRENT");
    assert_eq!(corpus.soname, None);
    assert!(corpus.needed.is_empty());
    assert!(corpus.units.is_empty(), "fixture carries no debug info");
}

#[test]
fn reads_static_symbols_with_binding_and_definition() {
    let temp = tempfile::tempdir().unwrap();
    let path = write_fixture(temp.path());

    let corpus = ElfReader.load(&path).expect("load elf");
    let exported = corpus.symbols.get("exported_fn").expect("exported_fn");
    assert_eq!(exported.symbol_type, "STT_FUNC");
    assert_eq!(exported.binding, "STB_GLOBAL");
    assert!(exported.defined);
    assert_eq!(exported.version, None);

    let imported = corpus.symbols.get("imported_fn").expect("imported_fn");
    assert_eq!(imported.binding, "STB_GLOBAL");
    assert!(!imported.defined);
}

#[test]
fn non_elf_input_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("notes.txt");
    std::fs::write(&path, b"definitely not an ELF file").unwrap();

    assert!(matches!(ElfReader.load(&path), Err(ReaderError::Parse(_))));
}

#[test]
fn missing_file_is_an_io_error() {
    let temp = tempfile::tempdir().unwrap();
    assert!(matches!(ElfReader.load(&temp.path().join("absent")), Err(ReaderError::Io(_))));
}

/// Abbreviations for the unit in `DEBUG_INFO`.
const DEBUG_ABBREV: &[u8] = &[
    // 1: compile_unit, children, name:string, language:data2
    0x01, 0x11, 0x01, 0x03, 0x08, 0x13, 0x05, 0x00, 0x00,
    // 2: subprogram, children, name:string, type:ref4
    0x02, 0x2e, 0x01, 0x03, 0x08, 0x49, 0x13, 0x00, 0x00,
    // 3: formal_parameter, name:string, type:ref4
    0x03, 0x05, 0x00, 0x03, 0x08, 0x49, 0x13, 0x00, 0x00,
    // 4: base_type, name:string, byte_size:data1
    0x04, 0x24, 0x00, 0x03, 0x08, 0x0b, 0x0b, 0x00, 0x00,
    // 5: variable, name:string, type:ref_addr
    0x05, 0x34, 0x00, 0x03, 0x08, 0x49, 0x10, 0x00, 0x00,
    0x00,
];

/// DWARF 4 unit: `a.c { int add(int x, int y); int; g }`.
const DEBUG_INFO: &[u8] = &[
    // header: length 0x34, version 4, abbrev offset 0, address size 8
    0x34, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x08,
    // 0x0b compile_unit "a.c" DW_LANG_C99
    0x01, b'a', b'.', b'c', 0x00, 0x0c, 0x00,
    // 0x12 subprogram "add" -> 0x2a
    0x02, b'a', b'd', b'd', 0x00, 0x2a, 0x00, 0x00, 0x00,
    // 0x1b formal_parameter "x" -> 0x2a
    0x03, b'x', 0x00, 0x2a, 0x00, 0x00, 0x00,
    // 0x22 formal_parameter "y" -> 0x2a
    0x03, b'y', 0x00, 0x2a, 0x00, 0x00, 0x00,
    // 0x29 end of add's children
    0x00,
    // 0x2a base_type "int", 4 bytes
    0x04, b'i', b'n', b't', 0x00, 0x04,
    // 0x30 variable "g" -> .debug_info 0x2a
    0x05, b'g', 0x00, 0x2a, 0x00, 0x00, 0x00,
    // 0x37 end of the unit's children
    0x00,
];

fn write_debug_fixture(dir: &std::path::Path) -> PathBuf {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);
    for (name, data) in [(".debug_abbrev", DEBUG_ABBREV), (".debug_info", DEBUG_INFO)] {
        let id = obj.add_section(Vec::new(), name.as_bytes().to_vec(), SectionKind::Debug);
        obj.section_mut(id).append_data(data, 1);
    }
    let path = dir.join("debug.o");
    std::fs::write(&path, obj.write().unwrap()).unwrap();
    path
}

#[test]
fn debug_info_becomes_an_arena_with_offsets_parents_and_sizes() {
    let temp = tempfile::tempdir().unwrap();
    let corpus = ElfReader.load(&write_debug_fixture(temp.path())).expect("load elf");

    assert_eq!(corpus.units.len(), 1);
    let unit = &corpus.units[0];
    assert_eq!(unit.offset, 0);

    let tags: Vec<&str> = unit.entries.iter().map(|d| d.tag.as_str()).collect();
    assert_eq!(
        tags,
        vec![
            "DW_TAG_compile_unit",
            "DW_TAG_subprogram",
            "DW_TAG_formal_parameter",
            "DW_TAG_formal_parameter",
            "DW_TAG_base_type",
            "DW_TAG_variable",
        ]
    );
    let offsets: Vec<u64> = unit.entries.iter().map(|d| d.offset).collect();
    assert_eq!(offsets, vec![0x0b, 0x12, 0x1b, 0x22, 0x2a, 0x30]);
    // Null entries closing a sibling list are not part of any entry's size.
    let sizes: Vec<Option<u64>> = unit.entries.iter().map(|d| d.size).collect();
    assert_eq!(sizes, vec![Some(7), Some(9), Some(7), Some(7), Some(6), Some(7)]);
    let parents: Vec<Option<DieIndex>> = unit.entries.iter().map(|d| d.parent).collect();
    assert_eq!(
        parents,
        vec![
            None,
            Some(DieIndex(0)),
            Some(DieIndex(1)),
            Some(DieIndex(1)),
            Some(DieIndex(0)),
            Some(DieIndex(0)),
        ]
    );
    assert_eq!(unit.die(DieIndex(1)).children, vec![DieIndex(2), DieIndex(3)]);
}

#[test]
fn debug_info_attribute_values_are_decoded() {
    let temp = tempfile::tempdir().unwrap();
    let corpus = ElfReader.load(&write_debug_fixture(temp.path())).expect("load elf");
    let unit = &corpus.units[0];

    let cu = unit.die(DieIndex(0));
    assert_eq!(cu.attr_str("DW_AT_name"), Some("a.c"));
    assert_eq!(cu.attr("DW_AT_language"), Some(&AttrValue::Str("DW_LANG_C99".into())));
    assert_eq!(unit.die(DieIndex(2)).attr("DW_AT_type"), Some(&AttrValue::UnitRef(0x2a)));
    assert_eq!(unit.die(DieIndex(4)).byte_size(), Some(4));
    assert_eq!(unit.die(DieIndex(5)).attr("DW_AT_type"), Some(&AttrValue::DebugInfoRef(0x2a)));
    assert_eq!(unit.by_offset(0x2a), Some(DieIndex(4)));
}

#[test]
fn decoded_debug_info_walks_into_typed_parameter_facts() {
    let temp = tempfile::tempdir().unwrap();
    let corpus = ElfReader.load(&write_debug_fixture(temp.path())).expect("load elf");

    let options = WalkOptions::default();
    let mut state = WalkState::new();
    let mut facts: Vec<Fact> = Vec::new();
    let stats =
        DieWalker::new(&corpus, &options, state.ledger_mut(&corpus.path)).walk_corpus(&mut facts);

    assert_eq!(stats.entries, 6);
    let count = |predicate: &str| facts.iter().filter(|f| f.predicate == predicate).count();
    assert_eq!(count("dw_tag_function"), 1);
    assert_eq!(count("dw_tag_formal_parameter"), 2);
    assert_eq!(count("dw_tag_formal_parameter_order"), 2);
    assert!(facts
        .iter()
        .filter(|f| f.predicate == "dw_tag_formal_parameter_size_in_bits")
        .all(|f| f.arg_int(2) == Some(32)));
    assert!(facts
        .iter()
        .any(|f| f.predicate == "dw_tag_function_type_name" && f.arg_str(2) == Some("int")));
    assert!(facts
        .iter()
        .any(|f| f.predicate == "language" && f.arg_str(1) == Some("DW_LANG_C99")));
}

/// Dynamic symbols of `libver.so`: (name, defined, versym index).
const DYNAMIC_SYMBOLS: [(&[u8], bool, u16); 3] =
    [(b"api_v1", true, 2), (b"api_v2", true, 3), (b"puts", false, 4)];

/// A minimal shared object with `.dynsym`, GNU version definitions
/// (`VER_1`, `VER_2`) and one version requirement (`GLIBC_2.2.5` from libc).
fn write_versioned_shared_object(dir: &std::path::Path) -> PathBuf {
    let mut buffer = Vec::new();
    let mut writer = Writer::new(Endianness::Little, true, &mut buffer);

    let soname = writer.add_dynamic_string(b"libver.so");
    let libc = writer.add_dynamic_string(b"libc.so.6");
    let ver_1 = writer.add_dynamic_string(b"VER_1");
    let ver_2 = writer.add_dynamic_string(b"VER_2");
    let glibc = writer.add_dynamic_string(b"GLIBC_2.2.5");
    let names: Vec<_> =
        DYNAMIC_SYMBOLS.iter().map(|&(name, _, _)| writer.add_dynamic_string(name)).collect();

    writer.reserve_file_header();
    writer.reserve_program_headers(2);
    let hash_index = writer.reserve_hash_section_index();
    writer.reserve_dynsym_section_index();
    writer.reserve_dynstr_section_index();
    writer.reserve_gnu_versym_section_index();
    writer.reserve_gnu_verdef_section_index();
    writer.reserve_gnu_verneed_section_index();
    writer.reserve_dynamic_section_index();
    writer.reserve_shstrtab_section_index();

    for _ in DYNAMIC_SYMBOLS {
        writer.reserve_dynamic_symbol_index();
    }
    let symbol_count = writer.dynamic_symbol_count();
    let hash_offset = writer.reserve_hash(1, symbol_count);
    let dynsym_offset = writer.reserve_dynsym();
    let dynstr_offset = writer.reserve_dynstr();
    let versym_offset = writer.reserve_gnu_versym();
    let verdef_offset = writer.reserve_gnu_verdef(3, 3);
    let verneed_offset = writer.reserve_gnu_verneed(1, 1);
    let dynamic_count = 11;
    let dynamic_offset = writer.reserve_dynamic(dynamic_count);
    writer.reserve_shstrtab();
    writer.reserve_section_headers();
    let file_len = writer.reserved_len() as u64;

    writer
        .write_file_header(&FileHeader {
            os_abi: elf::ELFOSABI_NONE,
            abi_version: 0,
            e_type: elf::ET_DYN,
            e_machine: elf::EM_X86_64,
            e_entry: 0,
            e_flags: 0,
        })
        .unwrap();
    writer.write_align_program_headers();
    // Addresses equal file offsets.
    writer.write_program_header(&ProgramHeader {
        p_type: elf::PT_LOAD,
        p_flags: elf::PF_R,
        p_offset: 0,
        p_vaddr: 0,
        p_paddr: 0,
        p_filesz: file_len,
        p_memsz: file_len,
        p_align: 0x1000,
    });
    let dynamic_size = (dynamic_count * 16) as u64;
    writer.write_program_header(&ProgramHeader {
        p_type: elf::PT_DYNAMIC,
        p_flags: elf::PF_R,
        p_offset: dynamic_offset as u64,
        p_vaddr: dynamic_offset as u64,
        p_paddr: dynamic_offset as u64,
        p_filesz: dynamic_size,
        p_memsz: dynamic_size,
        p_align: 8,
    });

    writer.write_hash(1, symbol_count, |index| {
        let name = DYNAMIC_SYMBOLS.get(index.checked_sub(1)? as usize)?.0;
        Some(elf::hash(name))
    });

    writer.write_null_dynamic_symbol();
    for ((_, defined, _), name) in DYNAMIC_SYMBOLS.iter().zip(&names) {
        writer.write_dynamic_symbol(&Sym {
            name: Some(*name),
            section: if *defined { Some(hash_index) } else { None },
            st_info: (elf::STB_GLOBAL << 4) | elf::STT_FUNC,
            st_other: elf::STV_DEFAULT,
            st_shndx: elf::SHN_UNDEF,
            st_value: 0,
            st_size: 0,
        });
    }
    writer.write_dynstr();

    writer.write_null_gnu_versym();
    for (_, _, version) in DYNAMIC_SYMBOLS {
        writer.write_gnu_versym(version);
    }

    writer.write_align_gnu_verdef();
    writer.write_gnu_verdef(&Verdef {
        version: elf::VER_DEF_CURRENT,
        flags: elf::VER_FLG_BASE,
        index: elf::VER_NDX_GLOBAL,
        aux_count: 1,
        name: soname,
    });
    for (index, name) in [(2, ver_1), (3, ver_2)] {
        writer.write_gnu_verdef(&Verdef {
            version: elf::VER_DEF_CURRENT,
            flags: 0,
            index,
            aux_count: 1,
            name,
        });
    }

    writer.write_align_gnu_verneed();
    writer.write_gnu_verneed(&Verneed { version: elf::VER_NEED_CURRENT, aux_count: 1, file: libc });
    writer.write_gnu_vernaux(&Vernaux { flags: 0, index: 4, name: glibc });

    writer.write_align_dynamic();
    writer.write_dynamic(elf::DT_HASH, hash_offset as u64);
    writer.write_dynamic(elf::DT_STRTAB, dynstr_offset as u64);
    let dynstr_len = writer.dynstr_len() as u64;
    writer.write_dynamic(elf::DT_STRSZ, dynstr_len);
    writer.write_dynamic(elf::DT_SYMTAB, dynsym_offset as u64);
    writer.write_dynamic(elf::DT_SYMENT, 24);
    writer.write_dynamic_string(elf::DT_SONAME, soname);
    writer.write_dynamic_string(elf::DT_NEEDED, libc);
    writer.write_dynamic(elf::DT_VERSYM, versym_offset as u64);
    writer.write_dynamic(elf::DT_VERDEF, verdef_offset as u64);
    writer.write_dynamic(elf::DT_VERDEFNUM, 3);
    writer.write_dynamic(elf::DT_NULL, 0);

    writer.write_shstrtab();

    writer.write_null_section_header();
    writer.write_hash_section_header(hash_offset as u64);
    writer.write_dynsym_section_header(dynsym_offset as u64, 1);
    writer.write_dynstr_section_header(dynstr_offset as u64);
    writer.write_gnu_versym_section_header(versym_offset as u64);
    writer.write_gnu_verdef_section_header(verdef_offset as u64);
    writer.write_gnu_verneed_section_header(verneed_offset as u64);
    writer.write_dynamic_section_header(dynamic_offset as u64);
    writer.write_shstrtab_section_header();

    let path = dir.join("libver.so");
    std::fs::write(&path, &buffer).unwrap();
    path
}

#[test]
fn dynamic_symbols_carry_gnu_versions() {
    let temp = tempfile::tempdir().unwrap();
    let corpus = ElfReader.load(&write_versioned_shared_object(temp.path())).expect("load so");

    assert_eq!(corpus.header.object_type, "ET_DYN");
    assert_eq!(corpus.soname.as_deref(), Some("libver.so"));
    assert_eq!(corpus.needed, vec!["libc.so.6".to_string()]);
    assert_eq!(corpus.symbols.len(), 3);

    let api_v1 = corpus.symbols.get("api_v1").expect("api_v1");
    assert_eq!(api_v1.version.as_deref(), Some("VER_1"));
    assert_eq!(api_v1.symbol_type, "STT_FUNC");
    assert_eq!(api_v1.visibility, "STV_DEFAULT");
    assert!(api_v1.defined);

    assert_eq!(corpus.symbols["api_v2"].version.as_deref(), Some("VER_2"));

    let puts = corpus.symbols.get("puts").expect("puts");
    assert_eq!(puts.version.as_deref(), Some("GLIBC_2.2.5"));
    assert!(!puts.defined);
}
