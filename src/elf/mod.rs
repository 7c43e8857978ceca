//! ELF container: loading, querying and rewriting object images
//!
//! [`ElfFile`] holds an entire image in a normalised 64-bit form: headers and
//! symbols are widened on load and narrowed back on save, so no query ever
//! branches on the file's class. Section buffers keep the raw file bytes.

pub mod ident;
pub mod record;

mod codec;

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::warn;
use num_traits::FromPrimitive as _;

use crate::error::{Error, Result};

use ident::{ElfClass, ElfData, EI_CLASS, EI_DATA, EI_NIDENT, ELF_MAGIC, EV_CURRENT};
use record::{Ehdr, Phdr, SectionType, SegmentType, Shdr, Sym};

/// A section's materialised contents, parallel to the section header table
#[derive(Debug, Clone, Default)]
pub struct Section {
    /// File offset of the section's first byte
    pub offset: u64,
    /// Section size in bytes
    pub size: u64,
    /// Raw file bytes; empty for `NoBits` sections
    pub buf: Vec<u8>,
}

/// An ELF image normalised to a 64-bit in-memory representation
#[derive(Debug, Clone)]
pub struct ElfFile {
    /// Path the image was loaded from or last saved to
    pub path: PathBuf,
    /// Size of the backing file in bytes
    pub filesize: u64,
    /// Register-width class of the backing file
    pub class: ElfClass,
    /// Byte order of the backing file
    pub data: ElfData,
    /// The verbatim identification bytes, written back unchanged on save
    ident: [u8; EI_NIDENT],
    /// Normalised file header
    pub ehdr: Ehdr,
    /// Normalised program headers
    pub phdrs: Vec<Phdr>,
    /// Normalised section headers
    pub shdrs: Vec<Shdr>,
    /// Section contents, parallel to `shdrs`
    pub sections: Vec<Section>,
    /// Normalised symbol table
    pub symbols: Vec<Sym>,
    shstrtab: usize,
    symtab: usize,
    strtab: usize,
    addr_symbol_map: BTreeMap<u64, usize>,
    name_symbol_map: HashMap<String, usize>,
}

/// The C string starting at `off` in `buf`, or "" when out of range or not
/// valid UTF-8
fn cstr_at(buf: &[u8], off: usize) -> &str {
    let Some(tail) = buf.get(off..) else {
        return "";
    };
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    std::str::from_utf8(&tail[..end]).unwrap_or("")
}

impl ElfFile {
    /// Load an ELF image, materialising section contents and symbol indices
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(path.as_ref(), false)
    }

    /// Load only the file, program and section headers of an ELF image;
    /// section buffers stay empty and no symbols are indexed
    pub fn open_headers_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(path.as_ref(), true)
    }

    fn load(path: &Path, headers_only: bool) -> Result<Self> {
        let io = |source| Error::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(io)?;
        let filesize = file.metadata().map_err(io)?.len();

        if filesize < EI_NIDENT as u64 {
            return Err(Error::InvalidMagic {
                path: path.to_path_buf(),
            });
        }
        let mut ident = [0u8; EI_NIDENT];
        file.read_exact(&mut ident).map_err(io)?;
        if ident[..ELF_MAGIC.len()] != ELF_MAGIC {
            return Err(Error::InvalidMagic {
                path: path.to_path_buf(),
            });
        }
        let class = ElfClass::from_u8(ident[EI_CLASS]).ok_or(Error::BadClass {
            path: path.to_path_buf(),
            value: ident[EI_CLASS],
        })?;
        let data = ElfData::from_u8(ident[EI_DATA]).ok_or(Error::BadEndian {
            path: path.to_path_buf(),
            value: ident[EI_DATA],
        })?;

        // re-read the full header at the class width and normalise it
        let mut buf = vec![0u8; Ehdr::size(class) as usize];
        file.seek(SeekFrom::Start(0)).map_err(io)?;
        file.read_exact(&mut buf).map_err(io)?;
        let ehdr = Ehdr::decode(class, data, &buf);

        let phdr_end = ehdr
            .e_phoff
            .saturating_add(u64::from(ehdr.e_phnum).saturating_mul(Phdr::size(class)));
        let shdr_end = ehdr
            .e_shoff
            .saturating_add(u64::from(ehdr.e_shnum).saturating_mul(Shdr::size(class)));
        if phdr_end > filesize {
            return Err(Error::TruncatedHeaders {
                path: path.to_path_buf(),
                end: phdr_end,
                size: filesize,
            });
        }
        if shdr_end > filesize {
            return Err(Error::TruncatedHeaders {
                path: path.to_path_buf(),
                end: shdr_end,
                size: filesize,
            });
        }
        if ehdr.e_phoff < shdr_end && ehdr.e_shoff < phdr_end {
            return Err(Error::HeaderOverlap {
                path: path.to_path_buf(),
            });
        }
        if ehdr.e_version != EV_CURRENT {
            return Err(Error::BadVersion {
                path: path.to_path_buf(),
                value: ehdr.e_version,
            });
        }
        let mut bounds = vec![(ehdr.e_phoff, phdr_end), (ehdr.e_shoff, shdr_end)];

        let mut phdrs = Vec::with_capacity(usize::from(ehdr.e_phnum));
        let mut rec = vec![0u8; Phdr::size(class) as usize];
        for i in 0..u64::from(ehdr.e_phnum) {
            file.seek(SeekFrom::Start(ehdr.e_phoff + i * Phdr::size(class)))
                .map_err(io)?;
            file.read_exact(&mut rec).map_err(io)?;
            phdrs.push(Phdr::decode(class, data, &rec));
        }
        let mut shdrs = Vec::with_capacity(usize::from(ehdr.e_shnum));
        let mut rec = vec![0u8; Shdr::size(class) as usize];
        for i in 0..u64::from(ehdr.e_shnum) {
            file.seek(SeekFrom::Start(ehdr.e_shoff + i * Shdr::size(class)))
                .map_err(io)?;
            file.read_exact(&mut rec).map_err(io)?;
            shdrs.push(Shdr::decode(class, data, &rec));
        }

        let mut elf = Self {
            path: path.to_path_buf(),
            filesize,
            class,
            data,
            ident,
            ehdr,
            phdrs,
            shdrs,
            sections: Vec::new(),
            symbols: Vec::new(),
            shstrtab: 0,
            symtab: 0,
            strtab: 0,
            addr_symbol_map: BTreeMap::new(),
            name_symbol_map: HashMap::new(),
        };
        if headers_only {
            return Ok(elf);
        }

        // locate the section name string table and the first symbol table
        for i in 0..elf.shdrs.len() {
            let shdr = elf.shdrs[i];
            if elf.shstrtab == 0
                && matches!(shdr.kind(), Some(SectionType::StringTable))
                && usize::from(elf.ehdr.e_shstrndx) == i
            {
                elf.shstrtab = i;
            } else if elf.symtab == 0 && matches!(shdr.kind(), Some(SectionType::SymbolTable)) {
                elf.symtab = i;
                if shdr.sh_link > 0 {
                    if shdr.sh_link as usize > elf.shdrs.len() {
                        warn!(
                            "symtab sh_link value {} out of bounds ({} sections)",
                            shdr.sh_link,
                            elf.shdrs.len()
                        );
                    } else {
                        elf.strtab = shdr.sh_link as usize;
                    }
                }
            }
        }

        // materialise section contents, checking each region against every
        // previously occupied one
        elf.sections = vec![Section::default(); elf.shdrs.len()];
        for i in 0..elf.shdrs.len() {
            let shdr = elf.shdrs[i];
            let section_end = shdr.sh_offset.saturating_add(shdr.sh_size);
            elf.sections[i].offset = shdr.sh_offset;
            elf.sections[i].size = shdr.sh_size;
            if matches!(shdr.kind(), Some(SectionType::NoBits)) {
                continue;
            }
            for &(lo, hi) in &bounds {
                if shdr.sh_offset < hi && lo < section_end {
                    return Err(Error::SectionOverlap {
                        path: path.to_path_buf(),
                        section: i,
                    });
                }
            }
            if section_end > filesize {
                return Err(Error::SectionTruncated {
                    path: path.to_path_buf(),
                    section: i,
                    end: section_end,
                    size: filesize,
                });
            }
            let mut content = vec![0u8; shdr.sh_size as usize];
            file.seek(SeekFrom::Start(shdr.sh_offset)).map_err(io)?;
            file.read_exact(&mut content).map_err(io)?;
            elf.sections[i].buf = content;
            bounds.push((shdr.sh_offset, section_end));
        }

        elf.materialise_symbols(path)?;
        elf.rebuild_symbol_indices();
        Ok(elf)
    }

    /// Serialise the container back to `path` in its original class and byte
    /// order, flushing symbol edits and recomputing the section layout. The
    /// container must have been fully loaded, not headers-only.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let io = |source| Error::Io {
            path: path.to_path_buf(),
            source,
        };

        self.flush_symbols()?;
        self.recompute_offsets()?;

        let mut file = File::create(path).map_err(io)?;
        self.path = path.to_path_buf();

        let header = self.ehdr.encode(self.class, self.data, &self.ident)?;
        file.write_all(&header).map_err(io)?;

        for (i, phdr) in self.phdrs.iter().enumerate() {
            let rec = phdr.encode(self.class, self.data)?;
            file.seek(SeekFrom::Start(
                self.ehdr.e_phoff + i as u64 * Phdr::size(self.class),
            ))
            .map_err(io)?;
            file.write_all(&rec).map_err(io)?;
        }
        for (i, shdr) in self.shdrs.iter().enumerate() {
            let rec = shdr.encode(self.class, self.data)?;
            file.seek(SeekFrom::Start(
                self.ehdr.e_shoff + i as u64 * Shdr::size(self.class),
            ))
            .map_err(io)?;
            file.write_all(&rec).map_err(io)?;
        }

        for (i, section) in self.sections.iter().enumerate() {
            if matches!(self.shdrs[i].kind(), Some(SectionType::NoBits)) {
                continue;
            }
            file.seek(SeekFrom::Start(self.shdrs[i].sh_offset))
                .map_err(io)?;
            file.write_all(&section.buf).map_err(io)?;
        }
        Ok(())
    }

    /// Regenerate the symbol-table section buffer from the normalised symbol
    /// list, in the file's class and byte order
    fn flush_symbols(&mut self) -> Result<()> {
        if self.symtab == 0 {
            return Ok(());
        }
        let entsize = Sym::size(self.class) as usize;
        let mut buf = Vec::with_capacity(self.symbols.len() * entsize);
        for sym in &self.symbols {
            buf.extend_from_slice(&sym.encode(self.class, self.data)?);
        }
        let size = buf.len() as u64;
        self.shdrs[self.symtab].sh_size = size;
        self.sections[self.symtab].size = size;
        self.sections[self.symtab].buf = buf;
        Ok(())
    }

    /// The `PT_LOAD` segment whose virtual range covers `addr`; a sole
    /// program header is accepted as-is
    fn load_segment_for(&self, addr: u64) -> Option<Phdr> {
        self.phdrs
            .iter()
            .find(|p| {
                matches!(p.kind(), Some(SegmentType::Load))
                    && addr >= p.p_vaddr
                    && addr < p.p_vaddr.saturating_add(p.p_memsz)
            })
            .copied()
            .or_else(|| {
                if self.phdrs.len() == 1 {
                    Some(self.phdrs[0])
                } else {
                    None
                }
            })
    }

    /// Recompute every file offset: program headers follow the ELF header,
    /// sections follow in order (mapped `ProgramBits` sections keep their
    /// segment-relative position), the section header table comes last
    fn recompute_offsets(&mut self) -> Result<()> {
        self.ehdr.e_phnum =
            u16::try_from(self.phdrs.len()).map_err(|_| Error::NarrowOverflow {
                field: "e_phnum",
                value: self.phdrs.len() as u64,
            })?;
        self.ehdr.e_shnum =
            u16::try_from(self.shdrs.len()).map_err(|_| Error::NarrowOverflow {
                field: "e_shnum",
                value: self.shdrs.len() as u64,
            })?;

        self.ehdr.e_phoff = Ehdr::size(self.class);
        let mut next_offset =
            self.ehdr.e_phoff + u64::from(self.ehdr.e_phnum) * Phdr::size(self.class);

        for i in 0..self.shdrs.len() {
            let shdr = self.shdrs[i];
            if matches!(shdr.kind(), Some(SectionType::ProgramBits)) && shdr.sh_addr != 0 {
                let segment = self
                    .load_segment_for(shdr.sh_addr)
                    .ok_or(Error::NoLoadSegment { section: i })?;
                next_offset = shdr
                    .sh_addr
                    .wrapping_sub(segment.p_vaddr)
                    .wrapping_add(segment.p_offset);
            } else if shdr.sh_addralign > 0 {
                next_offset = next_offset
                    .wrapping_add(shdr.sh_addralign - 1)
                    & shdr.sh_addralign.wrapping_neg();
            }
            self.sections[i].offset = next_offset;
            self.shdrs[i].sh_offset = if i == 0 { 0 } else { next_offset };
            if !matches!(shdr.kind(), Some(SectionType::NoBits)) {
                self.sections[i].size = self.sections[i].buf.len() as u64;
            }
            self.shdrs[i].sh_size = self.sections[i].size;
            next_offset += self.shdrs[i].sh_size;
        }

        self.ehdr.e_shoff = next_offset;
        Ok(())
    }

    /// Widen every record of the symbol-table section into the symbol list
    fn materialise_symbols(&mut self, path: &Path) -> Result<()> {
        if self.symtab == 0 {
            return Ok(());
        }
        let shdr = self.shdrs[self.symtab];
        let entsize = Sym::size(self.class);
        if shdr.sh_entsize != entsize {
            return Err(Error::BadSymbolEntSize {
                path: path.to_path_buf(),
                expected: entsize,
                found: shdr.sh_entsize,
            });
        }
        let buf = &self.sections[self.symtab].buf;
        let count = (shdr.sh_size / entsize) as usize;
        let entsize = entsize as usize;
        for i in 0..count {
            self.symbols.push(Sym::decode(
                self.class,
                self.data,
                &buf[i * entsize..(i + 1) * entsize],
            ));
        }
        Ok(())
    }

    /// Rebuild the address and name indices from the symbol list. Symbols
    /// with a zero value or an empty name are not indexed; duplicate keys
    /// resolve to the later symbol.
    fn rebuild_symbol_indices(&mut self) {
        self.addr_symbol_map.clear();
        self.name_symbol_map.clear();
        if self.strtab == 0 {
            return;
        }
        for i in 0..self.symbols.len() {
            let sym = self.symbols[i];
            if sym.st_value == 0 {
                continue;
            }
            let name = cstr_at(&self.sections[self.strtab].buf, sym.st_name as usize);
            if name.is_empty() {
                continue;
            }
            self.name_symbol_map.insert(name.to_owned(), i);
            self.addr_symbol_map.insert(sym.st_value, i);
        }
    }

    /// Section-table index of the section name string table, 0 if absent
    pub fn shstrtab_index(&self) -> usize {
        self.shstrtab
    }

    /// Section-table index of the symbol table, 0 if absent
    pub fn symtab_index(&self) -> usize {
        self.symtab
    }

    /// Section-table index of the symbol string table, 0 if absent
    pub fn strtab_index(&self) -> usize {
        self.strtab
    }

    /// Name of section `i`, or "" when there is no name string table or the
    /// index is out of range
    pub fn section_name(&self, i: usize) -> &str {
        if self.shstrtab == 0 || i >= self.shdrs.len() {
            return "";
        }
        cstr_at(
            &self.sections[self.shstrtab].buf,
            self.shdrs[i].sh_name as usize,
        )
    }

    /// Name of symbol `i`, or "" when there is no string table or the index
    /// is out of range
    pub fn symbol_name(&self, i: usize) -> &str {
        if self.strtab == 0 || i >= self.symbols.len() {
            return "";
        }
        self.symbol_name_of(&self.symbols[i])
    }

    /// Name of `sym`, or "" when there is no string table
    pub fn symbol_name_of(&self, sym: &Sym) -> &str {
        if self.strtab == 0 {
            return "";
        }
        cstr_at(&self.sections[self.strtab].buf, sym.st_name as usize)
    }

    /// The symbol whose value is exactly `addr`
    pub fn symbol_by_address(&self, addr: u64) -> Option<&Sym> {
        self.addr_symbol_map.get(&addr).map(|&i| &self.symbols[i])
    }

    /// The symbol covering `addr`: an exact hit, else the greatest value
    /// below it. Queries below the lowest indexed symbol yield that symbol;
    /// queries above the highest yield `None`.
    pub fn symbol_by_nearest_address(&self, addr: u64) -> Option<&Sym> {
        let (&at_or_above, &i) = self.addr_symbol_map.range(addr..).next()?;
        if at_or_above == addr {
            return Some(&self.symbols[i]);
        }
        match self.addr_symbol_map.range(..addr).next_back() {
            Some((_, &below)) => Some(&self.symbols[below]),
            None => Some(&self.symbols[i]),
        }
    }

    /// The symbol named `name`
    pub fn symbol_by_name(&self, name: &str) -> Option<&Sym> {
        self.name_symbol_map.get(name).map(|&i| &self.symbols[i])
    }

    /// Index of the first section with the raw type `sh_type`, else 0
    pub fn section_index_by_type(&self, sh_type: u32) -> usize {
        self.shdrs
            .iter()
            .position(|s| s.sh_type == sh_type)
            .unwrap_or(0)
    }

    /// The section containing file offset `off` and the offset within it
    pub fn locate(&self, off: u64) -> Option<(usize, u64)> {
        self.sections.iter().enumerate().find_map(|(i, s)| {
            (off >= s.offset && off < s.offset + s.buf.len() as u64)
                .then(|| (i, off - s.offset))
        })
    }

    /// The byte at file offset `off`, if some section buffer covers it
    pub fn byte_at(&self, off: u64) -> Option<&u8> {
        let (i, inner) = self.locate(off)?;
        self.sections[i].buf.get(inner as usize)
    }

    /// Move the symbol indexed at address `old` to `new`, re-keying the
    /// address index and rewriting `st_value`. A no-op when `old` is not
    /// indexed or the addresses are equal.
    pub fn update_symbol_address(&mut self, old: u64, new: u64) {
        if old == new {
            return;
        }
        let Some(&i) = self.addr_symbol_map.get(&old) else {
            return;
        };
        self.addr_symbol_map.remove(&old);
        self.symbols[i].st_value = new;
        self.addr_symbol_map.insert(new, i);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Synthetic images for loader and writer tests

    use std::path::PathBuf;

    use super::ident::{ElfClass, ElfData, EI_NIDENT};
    use super::record::{Ehdr, Phdr, Shdr, Sym};

    pub(crate) struct ImageSpec {
        pub class: ElfClass,
        pub data: ElfData,
        pub ident: [u8; EI_NIDENT],
        pub ehdr: Ehdr,
        pub phdrs: Vec<Phdr>,
        pub shdrs: Vec<Shdr>,
        /// (file offset, content) pairs for section bytes
        pub blobs: Vec<(u64, Vec<u8>)>,
    }

    /// Place every part of `spec` at its stated offset
    #[allow(clippy::unwrap_used)]
    pub(crate) fn assemble(spec: &ImageSpec) -> Vec<u8> {
        let mut out = Vec::new();
        let mut put = |off: usize, bytes: &[u8]| {
            if out.len() < off + bytes.len() {
                out.resize(off + bytes.len(), 0);
            }
            out[off..off + bytes.len()].copy_from_slice(bytes);
        };
        put(
            0,
            &spec
                .ehdr
                .encode(spec.class, spec.data, &spec.ident)
                .unwrap(),
        );
        for (i, phdr) in spec.phdrs.iter().enumerate() {
            put(
                (spec.ehdr.e_phoff + i as u64 * Phdr::size(spec.class)) as usize,
                &phdr.encode(spec.class, spec.data).unwrap(),
            );
        }
        for (i, shdr) in spec.shdrs.iter().enumerate() {
            put(
                (spec.ehdr.e_shoff + i as u64 * Shdr::size(spec.class)) as usize,
                &shdr.encode(spec.class, spec.data).unwrap(),
            );
        }
        for (off, blob) in &spec.blobs {
            put(*off as usize, blob);
        }
        out
    }

    fn ident_for(class: ElfClass, data: ElfData) -> [u8; EI_NIDENT] {
        let mut ident = [0u8; EI_NIDENT];
        ident[..4].copy_from_slice(&super::ELF_MAGIC);
        ident[super::EI_CLASS] = class as u8;
        ident[super::EI_DATA] = data as u8;
        ident[6] = 1; // EI_VERSION
        ident
    }

    fn strtab() -> Vec<u8> {
        b"\0main\0other\0".to_vec()
    }

    fn shstrtab() -> Vec<u8> {
        b"\0.text\0.symtab\0.strtab\0.shstrtab\0".to_vec()
    }

    #[allow(clippy::unwrap_used)]
    fn symtab(class: ElfClass, data: ElfData, text_addr: u64, size: u64) -> Vec<u8> {
        let syms = [
            Sym::default(),
            Sym {
                st_name: 1,
                st_info: 0x12,
                st_other: 0,
                st_shndx: 1,
                st_value: text_addr,
                st_size: size,
            },
            Sym {
                st_name: 6,
                st_info: 0x12,
                st_other: 0,
                st_shndx: 1,
                st_value: text_addr + size,
                st_size: size,
            },
        ];
        let mut out = Vec::new();
        for sym in &syms {
            out.extend_from_slice(&sym.encode(class, data).unwrap());
        }
        out
    }

    /// A little-endian 64-bit static executable: one `PT_LOAD`, a .text at
    /// 0x10078, a three-entry symbol table. Laid out exactly as the writer
    /// would lay it out, so a save round-trips byte-for-byte.
    pub(crate) fn build_elf64() -> Vec<u8> {
        let class = ElfClass::Elf64;
        let data = ElfData::Lsb;
        let text = (0u8..16).collect::<Vec<_>>();
        assemble(&ImageSpec {
            class,
            data,
            ident: ident_for(class, data),
            ehdr: Ehdr {
                e_type: 2,
                e_machine: 243,
                e_version: 1,
                e_entry: 0x10078,
                e_phoff: 64,
                e_shoff: 253,
                e_flags: 0,
                e_ehsize: 64,
                e_phentsize: 56,
                e_phnum: 1,
                e_shentsize: 64,
                e_shnum: 5,
                e_shstrndx: 4,
            },
            phdrs: vec![Phdr {
                p_type: 1,
                p_flags: 5,
                p_offset: 0,
                p_vaddr: 0x10000,
                p_paddr: 0x10000,
                p_filesz: 136,
                p_memsz: 136,
                p_align: 0x1000,
            }],
            shdrs: vec![
                Shdr::default(),
                Shdr {
                    sh_name: 1,
                    sh_type: 1,
                    sh_flags: 6,
                    sh_addr: 0x10078,
                    sh_offset: 120,
                    sh_size: 16,
                    sh_addralign: 4,
                    ..Default::default()
                },
                Shdr {
                    sh_name: 7,
                    sh_type: 2,
                    sh_offset: 136,
                    sh_size: 72,
                    sh_link: 3,
                    sh_info: 1,
                    sh_addralign: 8,
                    sh_entsize: 24,
                    ..Default::default()
                },
                Shdr {
                    sh_name: 15,
                    sh_type: 3,
                    sh_offset: 208,
                    sh_size: 12,
                    sh_addralign: 1,
                    ..Default::default()
                },
                Shdr {
                    sh_name: 23,
                    sh_type: 3,
                    sh_offset: 220,
                    sh_size: 33,
                    sh_addralign: 1,
                    ..Default::default()
                },
            ],
            blobs: vec![
                (120, text),
                (136, symtab(class, data, 0x10078, 8)),
                (208, strtab()),
                (220, shstrtab()),
            ],
        })
    }

    /// A big-endian 32-bit counterpart with the same section roster
    pub(crate) fn build_elf32be() -> Vec<u8> {
        let class = ElfClass::Elf32;
        let data = ElfData::Msb;
        let text = (0u8..8).collect::<Vec<_>>();
        assemble(&ImageSpec {
            class,
            data,
            ident: ident_for(class, data),
            ehdr: Ehdr {
                e_type: 2,
                e_machine: 243,
                e_version: 1,
                e_entry: 0x10054,
                e_phoff: 52,
                e_shoff: 185,
                e_flags: 0,
                e_ehsize: 52,
                e_phentsize: 32,
                e_phnum: 1,
                e_shentsize: 40,
                e_shnum: 5,
                e_shstrndx: 4,
            },
            phdrs: vec![Phdr {
                p_type: 1,
                p_flags: 5,
                p_offset: 0,
                p_vaddr: 0x10000,
                p_paddr: 0x10000,
                p_filesz: 100,
                p_memsz: 100,
                p_align: 0x1000,
            }],
            shdrs: vec![
                Shdr::default(),
                Shdr {
                    sh_name: 1,
                    sh_type: 1,
                    sh_flags: 6,
                    sh_addr: 0x10054,
                    sh_offset: 84,
                    sh_size: 8,
                    sh_addralign: 4,
                    ..Default::default()
                },
                Shdr {
                    sh_name: 7,
                    sh_type: 2,
                    sh_offset: 92,
                    sh_size: 48,
                    sh_link: 3,
                    sh_info: 1,
                    sh_addralign: 4,
                    sh_entsize: 16,
                    ..Default::default()
                },
                Shdr {
                    sh_name: 15,
                    sh_type: 3,
                    sh_offset: 140,
                    sh_size: 12,
                    sh_addralign: 1,
                    ..Default::default()
                },
                Shdr {
                    sh_name: 23,
                    sh_type: 3,
                    sh_offset: 152,
                    sh_size: 33,
                    sh_addralign: 1,
                    ..Default::default()
                },
            ],
            blobs: vec![
                (84, text),
                (92, symtab(class, data, 0x10054, 4)),
                (140, strtab()),
                (152, shstrtab()),
            ],
        })
    }

    pub(crate) fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("rvsim-test-{}-{tag}", std::process::id()))
    }

    /// Write the canonical ELF64 image to a temp file and return its path
    #[allow(clippy::unwrap_used)]
    pub(crate) fn write_temp_elf64(tag: &str) -> PathBuf {
        let path = temp_path(tag);
        std::fs::write(&path, build_elf64()).unwrap();
        path
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::test_support::{assemble, build_elf32be, build_elf64, temp_path, ImageSpec};
    use super::*;

    fn write_temp(tag: &str, bytes: &[u8]) -> PathBuf {
        let path = temp_path(tag);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn cleanup(paths: &[&Path]) {
        for path in paths {
            let _ = std::fs::remove_file(path);
        }
    }

    #[test]
    fn rejects_short_and_bad_magic() {
        let path = write_temp("short", &[0x7f, b'E', b'L']);
        assert!(matches!(
            ElfFile::open(&path),
            Err(Error::InvalidMagic { .. })
        ));
        let path2 = write_temp("notelf", &[0u8; 64]);
        assert!(matches!(
            ElfFile::open(&path2),
            Err(Error::InvalidMagic { .. })
        ));
        cleanup(&[&path, &path2]);
    }

    #[test]
    fn rejects_bad_class_and_endian() {
        let mut image = build_elf64();
        image[ident::EI_CLASS] = 3;
        let path = write_temp("class", &image);
        assert!(matches!(
            ElfFile::open(&path),
            Err(Error::BadClass { value: 3, .. })
        ));

        let mut image = build_elf64();
        image[ident::EI_DATA] = 0;
        let path2 = write_temp("endian", &image);
        assert!(matches!(
            ElfFile::open(&path2),
            Err(Error::BadEndian { value: 0, .. })
        ));
        cleanup(&[&path, &path2]);
    }

    #[test]
    fn rejects_bad_version() {
        let mut image = build_elf64();
        image[20..24].copy_from_slice(&9u32.to_le_bytes());
        let path = write_temp("version", &image);
        assert!(matches!(
            ElfFile::open(&path),
            Err(Error::BadVersion { value: 9, .. })
        ));
        cleanup(&[&path]);
    }

    #[test]
    fn rejects_truncated_header_table() {
        let mut image = build_elf64();
        let size = image.len() as u64;
        image[40..48].copy_from_slice(&size.to_le_bytes());
        let path = write_temp("trunc-shdr", &image);
        assert!(matches!(
            ElfFile::open(&path),
            Err(Error::TruncatedHeaders { .. })
        ));
        cleanup(&[&path]);
    }

    #[test]
    fn rejects_overlapping_header_tables() {
        let mut image = build_elf64();
        image[40..48].copy_from_slice(&64u64.to_le_bytes());
        let path = write_temp("overlap-hdr", &image);
        assert!(matches!(
            ElfFile::open(&path),
            Err(Error::HeaderOverlap { .. })
        ));
        cleanup(&[&path]);
    }

    #[test]
    fn rejects_section_overlapping_headers() {
        let mut image = build_elf64();
        // move .text onto the program header table
        let shdr1 = 253 + 64;
        image[shdr1 + 24..shdr1 + 32].copy_from_slice(&100u64.to_le_bytes());
        let path = write_temp("overlap-sec", &image);
        assert!(matches!(
            ElfFile::open(&path),
            Err(Error::SectionOverlap { section: 1, .. })
        ));
        cleanup(&[&path]);
    }

    #[test]
    fn rejects_truncated_section() {
        // a bespoke image whose only real section runs past the end of file
        let class = ident::ElfClass::Elf64;
        let data = ident::ElfData::Lsb;
        let mut id = [0u8; ident::EI_NIDENT];
        id[..4].copy_from_slice(&ident::ELF_MAGIC);
        id[ident::EI_CLASS] = class as u8;
        id[ident::EI_DATA] = data as u8;
        let mut image = assemble(&ImageSpec {
            class,
            data,
            ident: id,
            ehdr: Ehdr {
                e_version: 1,
                e_phoff: 0,
                e_phnum: 0,
                e_shoff: 64,
                e_shnum: 2,
                e_ehsize: 64,
                e_shentsize: 64,
                ..Default::default()
            },
            phdrs: vec![],
            shdrs: vec![
                Shdr::default(),
                Shdr {
                    sh_type: 1,
                    sh_offset: 192,
                    sh_size: 1000,
                    ..Default::default()
                },
            ],
            blobs: vec![],
        });
        image.resize(200, 0);
        let path = write_temp("trunc-sec", &image);
        assert!(matches!(
            ElfFile::open(&path),
            Err(Error::SectionTruncated {
                section: 1,
                end: 1192,
                ..
            })
        ));
        cleanup(&[&path]);
    }

    #[test]
    fn rejects_bad_symbol_entsize() {
        let mut image = build_elf64();
        // corrupt .symtab sh_entsize (shdr 2, field at offset 56)
        let shdr2 = 253 + 2 * 64;
        image[shdr2 + 56..shdr2 + 64].copy_from_slice(&20u64.to_le_bytes());
        let path = write_temp("entsize", &image);
        assert!(matches!(
            ElfFile::open(&path),
            Err(Error::BadSymbolEntSize {
                expected: 24,
                found: 20,
                ..
            })
        ));
        cleanup(&[&path]);
    }

    #[test]
    fn loads_elf64_and_answers_queries() {
        let path = write_temp("load64", &build_elf64());
        let elf = ElfFile::open(&path).unwrap();

        assert_eq!(elf.class, ident::ElfClass::Elf64);
        assert_eq!(elf.data, ident::ElfData::Lsb);
        assert_eq!(elf.ehdr.e_entry, 0x10078);
        assert_eq!(elf.phdrs.len(), 1);
        assert_eq!(elf.shdrs.len(), 5);
        assert_eq!(elf.shstrtab_index(), 4);
        assert_eq!(elf.symtab_index(), 2);
        assert_eq!(elf.strtab_index(), 3);

        assert_eq!(elf.section_name(1), ".text");
        assert_eq!(elf.section_name(4), ".shstrtab");
        assert_eq!(elf.section_name(99), "");
        assert_eq!(elf.symbol_name(1), "main");
        assert_eq!(elf.symbol_name(0), "");
        assert_eq!(elf.symbol_name(99), "");

        let main = elf.symbol_by_name("main").unwrap();
        assert_eq!(main.st_value, 0x10078);
        assert!(elf.symbol_by_name("absent").is_none());
        assert_eq!(elf.symbol_by_address(0x10078).unwrap().st_name, 1);
        assert!(elf.symbol_by_address(0x10079).is_none());

        // nearest: exact, between, below the minimum, above the maximum
        assert_eq!(
            elf.symbol_by_nearest_address(0x10080).unwrap().st_name,
            6
        );
        assert_eq!(
            elf.symbol_by_nearest_address(0x1007c).unwrap().st_name,
            1
        );
        assert_eq!(elf.symbol_by_nearest_address(0x1).unwrap().st_name, 1);
        assert!(elf.symbol_by_nearest_address(0x20000).is_none());

        assert_eq!(elf.section_index_by_type(2), 2);
        assert_eq!(elf.section_index_by_type(3), 3);
        assert_eq!(elf.section_index_by_type(0x9999), 0);

        assert_eq!(elf.locate(120), Some((1, 0)));
        assert_eq!(*elf.byte_at(121).unwrap(), 1);
        assert!(elf.byte_at(64).is_none());
        assert!(elf.byte_at(100_000).is_none());

        cleanup(&[&path]);
    }

    #[test]
    fn headers_only_skips_contents() {
        let path = write_temp("hdronly", &build_elf64());
        let elf = ElfFile::open_headers_only(&path).unwrap();
        assert_eq!(elf.shdrs.len(), 5);
        assert!(elf.sections.is_empty());
        assert!(elf.symbols.is_empty());
        assert!(elf.symbol_by_name("main").is_none());
        assert_eq!(elf.symtab_index(), 0);
        cleanup(&[&path]);
    }

    #[test]
    fn save_round_trips_byte_for_byte() {
        for (tag, image) in [("rt64", build_elf64()), ("rt32", build_elf32be())] {
            let src = write_temp(tag, &image);
            let dst = temp_path(&format!("{tag}-out"));
            let mut elf = ElfFile::open(&src).unwrap();
            elf.save(&dst).unwrap();
            let rewritten = std::fs::read(&dst).unwrap();
            assert_eq!(rewritten, image, "{tag} not byte-identical");
            cleanup(&[&src, &dst]);
        }
    }

    #[test]
    fn loads_elf32be_normalised() {
        let path = write_temp("load32", &build_elf32be());
        let elf = ElfFile::open(&path).unwrap();
        assert_eq!(elf.class, ident::ElfClass::Elf32);
        assert_eq!(elf.data, ident::ElfData::Msb);
        assert_eq!(elf.ehdr.e_entry, 0x10054);
        assert_eq!(elf.shdrs[1].sh_addr, 0x10054);
        assert_eq!(elf.symbols.len(), 3);
        assert_eq!(elf.symbol_by_name("other").unwrap().st_value, 0x10058);
        cleanup(&[&path]);
    }

    #[test]
    fn update_symbol_address_survives_round_trip() {
        let src = write_temp("upd-src", &build_elf64());
        let dst = temp_path("upd-dst");
        let mut elf = ElfFile::open(&src).unwrap();

        elf.update_symbol_address(0x10078, 0x20000);
        elf.save(&dst).unwrap();

        let reloaded = ElfFile::open(&dst).unwrap();
        assert_eq!(reloaded.symbol_by_name("main").unwrap().st_value, 0x20000);
        assert_eq!(
            reloaded.symbol_name_of(reloaded.symbol_by_address(0x20000).unwrap()),
            "main"
        );
        assert!(reloaded.symbol_by_address(0x10078).is_none());
        cleanup(&[&src, &dst]);
    }

    #[test]
    fn update_symbol_address_ignores_unknown() {
        let path = write_temp("upd-noop", &build_elf64());
        let mut elf = ElfFile::open(&path).unwrap();
        elf.update_symbol_address(0xdead, 0xbeef);
        assert!(elf.symbol_by_address(0xbeef).is_none());
        elf.update_symbol_address(0x10078, 0x10078);
        assert_eq!(elf.symbol_by_address(0x10078).unwrap().st_name, 1);
        cleanup(&[&path]);
    }

    #[test]
    fn save_narrowing_overflow_leaves_container_intact() {
        let src = write_temp("narrow-src", &build_elf32be());
        let dst = temp_path("narrow-dst");
        let mut elf = ElfFile::open(&src).unwrap();
        elf.symbols[1].st_value = 0x2_0000_0000;
        assert!(matches!(
            elf.save(&dst),
            Err(Error::NarrowOverflow {
                field: "st_value",
                ..
            })
        ));
        assert_eq!(elf.symbols.len(), 3);
        cleanup(&[&src, &dst]);
    }

    #[test]
    fn save_maps_progbits_through_matching_load_segment() {
        let src = write_temp("multiload-src", &build_elf64());
        let dst = temp_path("multiload-dst");
        let mut elf = ElfFile::open(&src).unwrap();

        // a second, non-covering segment must not confuse the writer
        elf.phdrs.insert(
            0,
            Phdr {
                p_type: 1,
                p_flags: 6,
                p_offset: 0x4000,
                p_vaddr: 0x40000,
                p_paddr: 0x40000,
                p_filesz: 0,
                p_memsz: 0x100,
                p_align: 0x1000,
            },
        );
        elf.save(&dst).unwrap();
        let reloaded = ElfFile::open_headers_only(&dst).unwrap();
        assert_eq!(reloaded.shdrs[1].sh_offset, 120);

        cleanup(&[&src, &dst]);
    }

    #[test]
    fn save_rejects_unmapped_progbits() {
        let src = write_temp("unmapped-src", &build_elf64());
        let dst = temp_path("unmapped-dst");
        let mut elf = ElfFile::open(&src).unwrap();
        for phdr in &mut elf.phdrs {
            phdr.p_type = 4;
        }
        elf.phdrs.push(Phdr {
            p_type: 4,
            ..Default::default()
        });
        assert!(matches!(
            elf.save(&dst),
            Err(Error::NoLoadSegment { section: 1 })
        ));
        cleanup(&[&src, &dst]);
    }
}
