//! Endian- and class-aware decoding and encoding of external ELF records
//!
//! Decoding widens class-natural fields to the 64-bit normal form; encoding
//! narrows them back, failing with [`Error::NarrowOverflow`] when a value
//! does not fit the 32-bit record. Callers slice buffers to the exact record
//! size before handing them here.

use crate::error::{Error, Result};

use super::ident::{ElfClass, ElfData, EI_NIDENT};
use super::record::{Ehdr, Phdr, Shdr, Sym};

/// Positioned reader over one external record, honouring the file byte order
pub(crate) struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
    class: ElfClass,
    data: ElfData,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(class: ElfClass, data: ElfData, buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            class,
            data,
        }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut raw = [0u8; N];
        raw.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        raw
    }

    pub(crate) fn skip(&mut self, n: usize) {
        self.pos += n;
    }

    pub(crate) fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    pub(crate) fn u16(&mut self) -> u16 {
        let raw = self.take::<2>();
        match self.data {
            ElfData::Lsb => u16::from_le_bytes(raw),
            ElfData::Msb => u16::from_be_bytes(raw),
        }
    }

    pub(crate) fn u32(&mut self) -> u32 {
        let raw = self.take::<4>();
        match self.data {
            ElfData::Lsb => u32::from_le_bytes(raw),
            ElfData::Msb => u32::from_be_bytes(raw),
        }
    }

    pub(crate) fn u64(&mut self) -> u64 {
        let raw = self.take::<8>();
        match self.data {
            ElfData::Lsb => u64::from_le_bytes(raw),
            ElfData::Msb => u64::from_be_bytes(raw),
        }
    }

    /// Read a class-natural word, zero-extending the 32-bit form
    pub(crate) fn word(&mut self) -> u64 {
        match self.class {
            ElfClass::Elf32 => u64::from(self.u32()),
            ElfClass::Elf64 => self.u64(),
        }
    }
}

/// Writer producing one external record in the file byte order
pub(crate) struct FieldWriter {
    out: Vec<u8>,
    class: ElfClass,
    data: ElfData,
}

impl FieldWriter {
    pub(crate) fn new(class: ElfClass, data: ElfData) -> Self {
        Self {
            out: Vec::new(),
            class,
            data,
        }
    }

    pub(crate) fn bytes(&mut self, raw: &[u8]) {
        self.out.extend_from_slice(raw);
    }

    pub(crate) fn u8(&mut self, value: u8) {
        self.out.push(value);
    }

    pub(crate) fn u16(&mut self, value: u16) {
        match self.data {
            ElfData::Lsb => self.out.extend_from_slice(&value.to_le_bytes()),
            ElfData::Msb => self.out.extend_from_slice(&value.to_be_bytes()),
        }
    }

    pub(crate) fn u32(&mut self, value: u32) {
        match self.data {
            ElfData::Lsb => self.out.extend_from_slice(&value.to_le_bytes()),
            ElfData::Msb => self.out.extend_from_slice(&value.to_be_bytes()),
        }
    }

    pub(crate) fn u64(&mut self, value: u64) {
        match self.data {
            ElfData::Lsb => self.out.extend_from_slice(&value.to_le_bytes()),
            ElfData::Msb => self.out.extend_from_slice(&value.to_be_bytes()),
        }
    }

    /// Write a class-natural word, narrowing for ELF32
    pub(crate) fn word(&mut self, field: &'static str, value: u64) -> Result<()> {
        match self.class {
            ElfClass::Elf32 => {
                let narrow =
                    u32::try_from(value).map_err(|_| Error::NarrowOverflow { field, value })?;
                self.u32(narrow);
            }
            ElfClass::Elf64 => self.u64(value),
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.out
    }
}

impl Ehdr {
    /// Decode the header from a full-size buffer, skipping `e_ident`
    pub(crate) fn decode(class: ElfClass, data: ElfData, buf: &[u8]) -> Self {
        let mut r = FieldReader::new(class, data, buf);
        r.skip(EI_NIDENT);
        let e_type = r.u16();
        let e_machine = r.u16();
        let e_version = r.u32();
        let e_entry = r.word();
        let e_phoff = r.word();
        let e_shoff = r.word();
        let e_flags = r.u32();
        let e_ehsize = r.u16();
        let e_phentsize = r.u16();
        let e_phnum = r.u16();
        let e_shentsize = r.u16();
        let e_shnum = r.u16();
        let e_shstrndx = r.u16();
        Self {
            e_type,
            e_machine,
            e_version,
            e_entry,
            e_phoff,
            e_shoff,
            e_flags,
            e_ehsize,
            e_phentsize,
            e_phnum,
            e_shentsize,
            e_shnum,
            e_shstrndx,
        }
    }

    /// Encode the full on-disk header, `ident` first
    pub(crate) fn encode(
        &self,
        class: ElfClass,
        data: ElfData,
        ident: &[u8; EI_NIDENT],
    ) -> Result<Vec<u8>> {
        let mut w = FieldWriter::new(class, data);
        w.bytes(ident);
        w.u16(self.e_type);
        w.u16(self.e_machine);
        w.u32(self.e_version);
        w.word("e_entry", self.e_entry)?;
        w.word("e_phoff", self.e_phoff)?;
        w.word("e_shoff", self.e_shoff)?;
        w.u32(self.e_flags);
        w.u16(self.e_ehsize);
        w.u16(self.e_phentsize);
        w.u16(self.e_phnum);
        w.u16(self.e_shentsize);
        w.u16(self.e_shnum);
        w.u16(self.e_shstrndx);
        Ok(w.finish())
    }
}

impl Phdr {
    /// Decode one program header; the two classes order the fields
    /// differently
    pub(crate) fn decode(class: ElfClass, data: ElfData, buf: &[u8]) -> Self {
        let mut r = FieldReader::new(class, data, buf);
        match class {
            ElfClass::Elf32 => {
                let p_type = r.u32();
                let p_offset = r.word();
                let p_vaddr = r.word();
                let p_paddr = r.word();
                let p_filesz = r.word();
                let p_memsz = r.word();
                let p_flags = r.u32();
                let p_align = r.word();
                Self {
                    p_type,
                    p_flags,
                    p_offset,
                    p_vaddr,
                    p_paddr,
                    p_filesz,
                    p_memsz,
                    p_align,
                }
            }
            ElfClass::Elf64 => {
                let p_type = r.u32();
                let p_flags = r.u32();
                let p_offset = r.word();
                let p_vaddr = r.word();
                let p_paddr = r.word();
                let p_filesz = r.word();
                let p_memsz = r.word();
                let p_align = r.word();
                Self {
                    p_type,
                    p_flags,
                    p_offset,
                    p_vaddr,
                    p_paddr,
                    p_filesz,
                    p_memsz,
                    p_align,
                }
            }
        }
    }

    /// Encode one program header in the class field order
    pub(crate) fn encode(&self, class: ElfClass, data: ElfData) -> Result<Vec<u8>> {
        let mut w = FieldWriter::new(class, data);
        match class {
            ElfClass::Elf32 => {
                w.u32(self.p_type);
                w.word("p_offset", self.p_offset)?;
                w.word("p_vaddr", self.p_vaddr)?;
                w.word("p_paddr", self.p_paddr)?;
                w.word("p_filesz", self.p_filesz)?;
                w.word("p_memsz", self.p_memsz)?;
                w.u32(self.p_flags);
                w.word("p_align", self.p_align)?;
            }
            ElfClass::Elf64 => {
                w.u32(self.p_type);
                w.u32(self.p_flags);
                w.word("p_offset", self.p_offset)?;
                w.word("p_vaddr", self.p_vaddr)?;
                w.word("p_paddr", self.p_paddr)?;
                w.word("p_filesz", self.p_filesz)?;
                w.word("p_memsz", self.p_memsz)?;
                w.word("p_align", self.p_align)?;
            }
        }
        Ok(w.finish())
    }
}

impl Shdr {
    /// Decode one section header
    pub(crate) fn decode(class: ElfClass, data: ElfData, buf: &[u8]) -> Self {
        let mut r = FieldReader::new(class, data, buf);
        let sh_name = r.u32();
        let sh_type = r.u32();
        let sh_flags = r.word();
        let sh_addr = r.word();
        let sh_offset = r.word();
        let sh_size = r.word();
        let sh_link = r.u32();
        let sh_info = r.u32();
        let sh_addralign = r.word();
        let sh_entsize = r.word();
        Self {
            sh_name,
            sh_type,
            sh_flags,
            sh_addr,
            sh_offset,
            sh_size,
            sh_link,
            sh_info,
            sh_addralign,
            sh_entsize,
        }
    }

    /// Encode one section header
    pub(crate) fn encode(&self, class: ElfClass, data: ElfData) -> Result<Vec<u8>> {
        let mut w = FieldWriter::new(class, data);
        w.u32(self.sh_name);
        w.u32(self.sh_type);
        w.word("sh_flags", self.sh_flags)?;
        w.word("sh_addr", self.sh_addr)?;
        w.word("sh_offset", self.sh_offset)?;
        w.word("sh_size", self.sh_size)?;
        w.u32(self.sh_link);
        w.u32(self.sh_info);
        w.word("sh_addralign", self.sh_addralign)?;
        w.word("sh_entsize", self.sh_entsize)?;
        Ok(w.finish())
    }
}

impl Sym {
    /// Decode one symbol record; the packed `st_info`/`st_other` bytes pass
    /// through unchanged
    pub(crate) fn decode(class: ElfClass, data: ElfData, buf: &[u8]) -> Self {
        let mut r = FieldReader::new(class, data, buf);
        match class {
            ElfClass::Elf32 => {
                let st_name = r.u32();
                let st_value = r.word();
                let st_size = r.word();
                let st_info = r.u8();
                let st_other = r.u8();
                let st_shndx = r.u16();
                Self {
                    st_name,
                    st_info,
                    st_other,
                    st_shndx,
                    st_value,
                    st_size,
                }
            }
            ElfClass::Elf64 => {
                let st_name = r.u32();
                let st_info = r.u8();
                let st_other = r.u8();
                let st_shndx = r.u16();
                let st_value = r.word();
                let st_size = r.word();
                Self {
                    st_name,
                    st_info,
                    st_other,
                    st_shndx,
                    st_value,
                    st_size,
                }
            }
        }
    }

    /// Encode one symbol record in the class field order
    pub(crate) fn encode(&self, class: ElfClass, data: ElfData) -> Result<Vec<u8>> {
        let mut w = FieldWriter::new(class, data);
        match class {
            ElfClass::Elf32 => {
                w.u32(self.st_name);
                w.word("st_value", self.st_value)?;
                w.word("st_size", self.st_size)?;
                w.u8(self.st_info);
                w.u8(self.st_other);
                w.u16(self.st_shndx);
            }
            ElfClass::Elf64 => {
                w.u32(self.st_name);
                w.u8(self.st_info);
                w.u8(self.st_other);
                w.u16(self.st_shndx);
                w.word("st_value", self.st_value)?;
                w.word("st_size", self.st_size)?;
            }
        }
        Ok(w.finish())
    }
}
